use super::envelope::{self, Operation, SoapCall};
use crate::domain::ports::ShareMarket;
use crate::utils::error::{MarketError, Result};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::time::Duration;

/// A remote market reached over its SOAP endpoint.
#[derive(Debug, Clone)]
pub struct SoapClient {
    endpoint: String,
    client: Client,
}

impl SoapClient {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(endpoint, client))
    }

    pub fn with_client(endpoint: impl Into<String>, client: Client) -> Self {
        Self {
            endpoint: endpoint.into(),
            client,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn call(&self, call: SoapCall) -> Result<String> {
        tracing::debug!("SOAP {} -> {}", call.operation.name(), self.endpoint);

        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "text/xml; charset=utf-8")
            .header("SOAPAction", "\"\"")
            .body(call.to_envelope())
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() && !body.contains("Fault>") {
            return Err(MarketError::SoapFault {
                code: format!("HTTP {}", status.as_u16()),
                message: truncate(&body, 200),
            });
        }
        envelope::parse_response(&body)
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[async_trait]
impl ShareMarket for SoapClient {
    async fn add_share(&self, share_id: &str, share_type: &str, capacity: i32) -> Result<String> {
        self.call(
            SoapCall::new(Operation::AddShare)
                .arg("shareID", share_id)
                .arg("shareType", share_type)
                .arg("capacity", capacity),
        )
        .await
    }

    async fn remove_share(&self, share_id: &str, share_type: &str) -> Result<String> {
        self.call(
            SoapCall::new(Operation::RemoveShare)
                .arg("shareID", share_id)
                .arg("shareType", share_type),
        )
        .await
    }

    async fn list_share_availability(&self, share_type: &str) -> Result<String> {
        self.call(SoapCall::new(Operation::ListShareAvailability).arg("shareType", share_type))
            .await
    }

    async fn purchase_share(
        &self,
        buyer_id: &str,
        share_id: &str,
        share_type: &str,
        share_count: i32,
    ) -> Result<String> {
        self.call(
            SoapCall::new(Operation::PurchaseShare)
                .arg("buyerID", buyer_id)
                .arg("shareID", share_id)
                .arg("shareType", share_type)
                .arg("shareCount", share_count),
        )
        .await
    }

    async fn get_shares(&self, buyer_id: &str) -> Result<String> {
        self.call(SoapCall::new(Operation::GetShares).arg("buyerID", buyer_id))
            .await
    }

    async fn sell_share(
        &self,
        buyer_id: &str,
        share_id: &str,
        share_type: &str,
        share_count: i32,
    ) -> Result<String> {
        self.call(
            SoapCall::new(Operation::SellShare)
                .arg("buyerID", buyer_id)
                .arg("shareID", share_id)
                .arg("shareType", share_type)
                .arg("shareCount", share_count),
        )
        .await
    }

    async fn swap_shares(
        &self,
        buyer_id: &str,
        old_share_id: &str,
        old_share_type: &str,
        new_share_id: &str,
        new_share_type: &str,
    ) -> Result<String> {
        self.call(
            SoapCall::new(Operation::SwapShares)
                .arg("buyerID", buyer_id)
                .arg("oldShareID", old_share_id)
                .arg("oldShareType", old_share_type)
                .arg("newShareID", new_share_id)
                .arg("newShareType", new_share_type),
        )
        .await
    }

    async fn purchase_remote_share(
        &self,
        buyer_id: &str,
        share_id: &str,
        share_type: &str,
        share_count: i32,
        target_market: &str,
    ) -> Result<String> {
        self.call(
            SoapCall::new(Operation::PurchaseRemoteShare)
                .arg("buyerID", buyer_id)
                .arg("shareID", share_id)
                .arg("shareType", share_type)
                .arg("shareCount", share_count)
                .arg("targetMarket", target_market),
        )
        .await
    }

    async fn sell_remote_share(
        &self,
        buyer_id: &str,
        share_id: &str,
        share_type: &str,
        share_count: i32,
        target_market: &str,
    ) -> Result<String> {
        self.call(
            SoapCall::new(Operation::SellRemoteShare)
                .arg("buyerID", buyer_id)
                .arg("shareID", share_id)
                .arg("shareType", share_type)
                .arg("shareCount", share_count)
                .arg("targetMarket", target_market),
        )
        .await
    }
}
