//! SOAP 1.1 envelopes for the RPC-style market binding.
//!
//! Requests carry the operation as the single child of `Body`, with one child
//! element per parameter. Responses wrap the reply text in
//! `<opResponse><return>..</return></opResponse>`; failures are `Fault`s.

use crate::utils::error::{MarketError, Result};
use quick_xml::escape::{escape, resolve_predefined_entity};
use quick_xml::events::Event;
use quick_xml::Reader;

pub const SOAP_ENV_NAMESPACE: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SERVICE_NAMESPACE: &str = "http://server.org/";
pub const SERVICE_NAME: &str = "ShareMarketServerImplService";
pub const PORT_TYPE: &str = "ShareMarketServer";

pub const CLIENT_FAULT: &str = "S:Client";
pub const SERVER_FAULT: &str = "S:Server";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Text,
    Int,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    AddShare,
    RemoveShare,
    ListShareAvailability,
    PurchaseRemoteShare,
    SellRemoteShare,
    PurchaseShare,
    GetShares,
    SellShare,
    SwapShares,
}

use ParamKind::{Int, Text};

impl Operation {
    pub const ALL: [Operation; 9] = [
        Operation::AddShare,
        Operation::RemoveShare,
        Operation::ListShareAvailability,
        Operation::PurchaseRemoteShare,
        Operation::SellRemoteShare,
        Operation::PurchaseShare,
        Operation::GetShares,
        Operation::SellShare,
        Operation::SwapShares,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Operation::AddShare => "addShare",
            Operation::RemoveShare => "removeShare",
            Operation::ListShareAvailability => "listShareAvailability",
            Operation::PurchaseRemoteShare => "purchaseRemoteShare",
            Operation::SellRemoteShare => "sellRemoteShare",
            Operation::PurchaseShare => "purchaseShare",
            Operation::GetShares => "getShares",
            Operation::SellShare => "sellShare",
            Operation::SwapShares => "swapShares",
        }
    }

    pub fn parameters(&self) -> &'static [(&'static str, ParamKind)] {
        match self {
            Operation::AddShare => &[("shareID", Text), ("shareType", Text), ("capacity", Int)],
            Operation::RemoveShare => &[("shareID", Text), ("shareType", Text)],
            Operation::ListShareAvailability => &[("shareType", Text)],
            Operation::PurchaseRemoteShare | Operation::SellRemoteShare => &[
                ("buyerID", Text),
                ("shareID", Text),
                ("shareType", Text),
                ("shareCount", Int),
                ("targetMarket", Text),
            ],
            Operation::PurchaseShare | Operation::SellShare => &[
                ("buyerID", Text),
                ("shareID", Text),
                ("shareType", Text),
                ("shareCount", Int),
            ],
            Operation::GetShares => &[("buyerID", Text)],
            Operation::SwapShares => &[
                ("buyerID", Text),
                ("oldShareID", Text),
                ("oldShareType", Text),
                ("newShareID", Text),
                ("newShareType", Text),
            ],
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Operation::ALL.into_iter().find(|op| op.name() == name)
    }
}

/// A decoded RPC invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapCall {
    pub operation: Operation,
    pub args: Vec<(String, String)>,
}

impl SoapCall {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, name: &str, value: impl ToString) -> Self {
        self.args.push((name.to_string(), value.to_string()));
        self
    }

    pub fn text(&self, name: &str) -> Result<&str> {
        self.args
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .ok_or_else(|| {
                MarketError::soap_client_fault(format!(
                    "Missing argument '{}' for {}",
                    name,
                    self.operation.name()
                ))
            })
    }

    pub fn int(&self, name: &str) -> Result<i32> {
        let raw = self.text(name)?;
        raw.trim().parse::<i32>().map_err(|_| {
            MarketError::soap_client_fault(format!("Argument '{}' is not an int: {}", name, raw))
        })
    }

    pub fn to_envelope(&self) -> String {
        let mut body = format!(
            r#"<ns2:{} xmlns:ns2="{}">"#,
            self.operation.name(),
            SERVICE_NAMESPACE
        );
        for (name, value) in &self.args {
            body.push_str(&format!("<{0}>{1}</{0}>", name, escape(value.as_str())));
        }
        body.push_str(&format!("</ns2:{}>", self.operation.name()));
        wrap(&body)
    }

    pub fn from_envelope(xml: &str) -> Result<Self> {
        let payload = body_payload(parse_document(xml)?)?;
        let operation = Operation::from_name(&payload.name).ok_or_else(|| {
            MarketError::soap_client_fault(format!("Unknown operation: {}", payload.name))
        })?;

        let args = payload
            .children
            .into_iter()
            .map(|child| (child.name, child.text))
            .collect();
        Ok(Self { operation, args })
    }
}

pub fn response_envelope(operation: Operation, value: &str) -> String {
    wrap(&format!(
        r#"<ns2:{0}Response xmlns:ns2="{1}"><return>{2}</return></ns2:{0}Response>"#,
        operation.name(),
        SERVICE_NAMESPACE,
        escape(value)
    ))
}

pub fn fault_envelope(code: &str, message: &str) -> String {
    wrap(&format!(
        "<S:Fault><faultcode>{}</faultcode><faultstring>{}</faultstring></S:Fault>",
        escape(code),
        escape(message)
    ))
}

/// Extracts the `return` text of a response, or the fault it carries.
pub fn parse_response(xml: &str) -> Result<String> {
    let payload = body_payload(parse_document(xml)?)?;

    if payload.name == "Fault" {
        let field = |name: &str| {
            payload
                .child(name)
                .map(|c| c.text.clone())
                .unwrap_or_default()
        };
        return Err(MarketError::SoapFault {
            code: field("faultcode"),
            message: field("faultstring"),
        });
    }

    Ok(payload
        .child("return")
        .map(|c| c.text.clone())
        .unwrap_or_default())
}

fn wrap(body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?><S:Envelope xmlns:S="{}"><S:Body>{}</S:Body></S:Envelope>"#,
        SOAP_ENV_NAMESPACE, body
    )
}

#[derive(Debug, Default)]
struct Element {
    name: String,
    text: String,
    children: Vec<Element>,
}

impl Element {
    fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }
}

fn body_payload(envelope: Element) -> Result<Element> {
    if envelope.name != "Envelope" {
        return Err(MarketError::soap_client_fault(format!(
            "Expected Envelope, found {}",
            envelope.name
        )));
    }
    envelope
        .children
        .into_iter()
        .find(|c| c.name == "Body")
        .and_then(|body| body.children.into_iter().next())
        .ok_or_else(|| MarketError::soap_client_fault("Envelope has an empty Body"))
}

fn local_name(raw: &[u8]) -> Result<String> {
    std::str::from_utf8(raw)
        .map(str::to_string)
        .map_err(|e| MarketError::soap_client_fault(format!("Invalid element name: {}", e)))
}

/// Namespace prefixes are dropped; only local names are kept.
fn parse_document(xml: &str) -> Result<Element> {
    let mut reader = Reader::from_str(xml);
    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;

    fn attach(stack: &mut [Element], root: &mut Option<Element>, element: Element) {
        match stack.last_mut() {
            Some(parent) => parent.children.push(element),
            None => *root = Some(element),
        }
    }

    loop {
        match reader.read_event()? {
            Event::Start(e) => stack.push(Element {
                name: local_name(e.local_name().as_ref())?,
                ..Element::default()
            }),
            Event::Empty(e) => {
                let element = Element {
                    name: local_name(e.local_name().as_ref())?,
                    ..Element::default()
                };
                attach(&mut stack, &mut root, element);
            }
            Event::End(_) => {
                let element = stack
                    .pop()
                    .ok_or_else(|| MarketError::soap_client_fault("Unbalanced end tag"))?;
                attach(&mut stack, &mut root, element);
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    let text = t
                        .decode()
                        .map_err(|e| MarketError::soap_client_fault(e.to_string()))?;
                    top.text.push_str(&text);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::GeneralRef(r) => {
                if let Some(top) = stack.last_mut() {
                    let resolved = match r
                        .resolve_char_ref()
                        .map_err(|e| MarketError::soap_client_fault(e.to_string()))?
                    {
                        Some(ch) => ch.to_string(),
                        None => {
                            let name = r
                                .decode()
                                .map_err(|e| MarketError::soap_client_fault(e.to_string()))?;
                            resolve_predefined_entity(&name)
                                .ok_or_else(|| {
                                    MarketError::soap_client_fault(format!(
                                        "Unknown entity &{};",
                                        name
                                    ))
                                })?
                                .to_string()
                        }
                    };
                    top.text.push_str(&resolved);
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(MarketError::soap_client_fault("Unexpected end of document"));
    }
    root.ok_or_else(|| MarketError::soap_client_fault("Empty document"))
}
