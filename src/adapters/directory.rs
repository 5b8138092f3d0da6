use super::soap::SoapClient;
use crate::config::MarketConfig;
use crate::domain::ports::{MarketDirectory, ShareMarket};
use crate::utils::error::Result;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;

/// Resolves market names to SOAP endpoints, in configuration order.
#[derive(Debug, Clone)]
pub struct SoapDirectory {
    markets: Vec<(String, String)>,
    client: Client,
}

impl SoapDirectory {
    pub fn new(markets: Vec<(String, String)>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { markets, client })
    }

    pub fn from_config(config: &MarketConfig) -> Result<Self> {
        let markets = config
            .markets
            .iter()
            .map(|m| (m.name.clone(), m.endpoint.clone()))
            .collect();
        Self::new(markets, config.request_timeout())
    }

    pub fn endpoint(&self, market: &str) -> Option<&str> {
        self.markets
            .iter()
            .find(|(name, _)| name == market)
            .map(|(_, endpoint)| endpoint.as_str())
    }
}

impl MarketDirectory for SoapDirectory {
    fn connect(&self, market: &str) -> Option<Arc<dyn ShareMarket>> {
        let endpoint = self.endpoint(market)?;
        tracing::debug!("Connecting to {} at {}", market, endpoint);
        Some(Arc::new(SoapClient::with_client(
            endpoint,
            self.client.clone(),
        )))
    }

    fn market_names(&self) -> Vec<String> {
        self.markets.iter().map(|(name, _)| name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directory_follows_config_order() {
        let directory = SoapDirectory::from_config(&MarketConfig::default()).unwrap();

        assert_eq!(directory.market_names(), vec!["NewYork", "London", "Tokyo"]);
        assert_eq!(
            directory.endpoint("Tokyo"),
            Some("http://localhost:8082/ShareMarketService")
        );
        assert!(directory.connect("Tokyo").is_some());
        assert!(directory.connect("Paris").is_none());
    }
}
