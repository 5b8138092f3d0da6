use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// The operations a market publishes. Replies are human-readable text; `Err` is
/// reserved for transport and protocol failures.
#[async_trait]
pub trait ShareMarket: Send + Sync {
    // Admin operations
    async fn add_share(&self, share_id: &str, share_type: &str, capacity: i32) -> Result<String>;
    async fn remove_share(&self, share_id: &str, share_type: &str) -> Result<String>;
    async fn list_share_availability(&self, share_type: &str) -> Result<String>;

    // Buyer operations
    async fn purchase_share(
        &self,
        buyer_id: &str,
        share_id: &str,
        share_type: &str,
        share_count: i32,
    ) -> Result<String>;
    async fn get_shares(&self, buyer_id: &str) -> Result<String>;
    async fn sell_share(
        &self,
        buyer_id: &str,
        share_id: &str,
        share_type: &str,
        share_count: i32,
    ) -> Result<String>;
    async fn swap_shares(
        &self,
        buyer_id: &str,
        old_share_id: &str,
        old_share_type: &str,
        new_share_id: &str,
        new_share_type: &str,
    ) -> Result<String>;

    // Cross-market operations
    async fn purchase_remote_share(
        &self,
        buyer_id: &str,
        share_id: &str,
        share_type: &str,
        share_count: i32,
        target_market: &str,
    ) -> Result<String>;
    async fn sell_remote_share(
        &self,
        buyer_id: &str,
        share_id: &str,
        share_type: &str,
        share_count: i32,
        target_market: &str,
    ) -> Result<String>;
}

/// Resolves a market name to a handle on that market's operations.
pub trait MarketDirectory: Send + Sync {
    fn connect(&self, market: &str) -> Option<Arc<dyn ShareMarket>>;

    fn market_names(&self) -> Vec<String>;
}
