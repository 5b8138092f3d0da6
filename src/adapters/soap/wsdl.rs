use super::envelope::{Operation, ParamKind, PORT_TYPE, SERVICE_NAME, SERVICE_NAMESPACE};
use quick_xml::escape::escape;

/// WSDL 1.1 description of the RPC/literal binding served at `endpoint`.
pub fn document(endpoint: &str) -> String {
    let mut messages = String::new();
    let mut port_ops = String::new();
    let mut binding_ops = String::new();

    for op in Operation::ALL {
        let name = op.name();

        messages.push_str(&format!(r#"<message name="{}">"#, name));
        for (param, kind) in op.parameters() {
            let xsd = match kind {
                ParamKind::Text => "xsd:string",
                ParamKind::Int => "xsd:int",
            };
            messages.push_str(&format!(r#"<part name="{}" type="{}"/>"#, param, xsd));
        }
        messages.push_str("</message>");
        messages.push_str(&format!(
            r#"<message name="{}Response"><part name="return" type="xsd:string"/></message>"#,
            name
        ));

        let order: Vec<&str> = op.parameters().iter().map(|(p, _)| *p).collect();
        port_ops.push_str(&format!(
            r#"<operation name="{0}" parameterOrder="{1}"><input message="tns:{0}"/><output message="tns:{0}Response"/></operation>"#,
            name,
            order.join(" ")
        ));

        binding_ops.push_str(&format!(
            r#"<operation name="{0}"><soap:operation soapAction=""/><input><soap:body use="literal" namespace="{1}"/></input><output><soap:body use="literal" namespace="{1}"/></output></operation>"#,
            name, SERVICE_NAMESPACE
        ));
    }

    format!(
        concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<definitions xmlns="http://schemas.xmlsoap.org/wsdl/" xmlns:soap="http://schemas.xmlsoap.org/wsdl/soap/" "#,
            r#"xmlns:xsd="http://www.w3.org/2001/XMLSchema" xmlns:tns="{ns}" targetNamespace="{ns}" name="{service}">"#,
            "{messages}",
            r#"<portType name="{port}">{port_ops}</portType>"#,
            r#"<binding name="ShareMarketServerImplPortBinding" type="tns:{port}">"#,
            r#"<soap:binding transport="http://schemas.xmlsoap.org/soap/http" style="rpc"/>{binding_ops}</binding>"#,
            r#"<service name="{service}"><port name="ShareMarketServerImplPort" binding="tns:ShareMarketServerImplPortBinding">"#,
            r#"<soap:address location="{endpoint}"/></port></service>"#,
            "</definitions>"
        ),
        ns = SERVICE_NAMESPACE,
        service = SERVICE_NAME,
        port = PORT_TYPE,
        messages = messages,
        port_ops = port_ops,
        binding_ops = binding_ops,
        endpoint = escape(endpoint),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_lists_every_operation() {
        let wsdl = document("http://localhost:8081/ShareMarketService");

        for op in Operation::ALL {
            assert!(wsdl.contains(&format!(r#"<operation name="{}""#, op.name())));
        }
        assert!(wsdl.contains(r#"<part name="capacity" type="xsd:int"/>"#));
        assert!(wsdl.contains(r#"style="rpc""#));
        assert!(wsdl.contains(r#"location="http://localhost:8081/ShareMarketService""#));
    }
}
