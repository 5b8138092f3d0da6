use crate::adapters::audit::AuditLog;
use crate::core::ledger::{check_identifier, Ledger};
use crate::core::peer::{Peer, PeerClient, PeerReply, PeerRequest};
use crate::domain::model::{MarketInfo, ShareKey, ShareType};
use crate::domain::ports::{MarketDirectory, ShareMarket};
use crate::utils::error::{Result, TradeError, TradeResult};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy)]
enum RemoteTrade {
    Purchase,
    Sell,
}

impl RemoteTrade {
    fn action(&self) -> &'static str {
        match self {
            RemoteTrade::Purchase => "Purchase Remote Share",
            RemoteTrade::Sell => "Sell Remote Share",
        }
    }

    fn noun(&self) -> &'static str {
        match self {
            RemoteTrade::Purchase => "purchase",
            RemoteTrade::Sell => "sell",
        }
    }
}

/// What the first, lock-protected phase of a swap decided.
enum SwapStart {
    Done(ShareKey, u32),
    Escrowed(ShareKey, u32),
    Rejected(TradeError),
}

/// One market's operations: the ledger, the peers it swaps with, and the
/// directory used for cross-market purchases and sales.
pub struct ShareMarketService {
    market: MarketInfo,
    ledger: Arc<Mutex<Ledger>>,
    directory: Arc<dyn MarketDirectory>,
    peers: Vec<Peer>,
    peer_client: PeerClient,
    audit: AuditLog,
}

impl ShareMarketService {
    pub fn new(
        market: MarketInfo,
        directory: Arc<dyn MarketDirectory>,
        peers: Vec<Peer>,
        peer_client: PeerClient,
        audit: AuditLog,
    ) -> Self {
        let ledger = Arc::new(Mutex::new(Ledger::new(market.name.clone())));
        let peers = peers.into_iter().filter(|p| p.name != market.name).collect();
        Self {
            market,
            ledger,
            directory,
            peers,
            peer_client,
            audit,
        }
    }

    pub fn market(&self) -> &MarketInfo {
        &self.market
    }

    /// Shared with the UDP listener.
    pub fn ledger(&self) -> Arc<Mutex<Ledger>> {
        Arc::clone(&self.ledger)
    }

    pub fn peers(&self) -> &[Peer] {
        &self.peers
    }

    async fn settle<T>(
        &self,
        action: &str,
        params: String,
        outcome: TradeResult<T>,
        on_success: impl FnOnce(T) -> String,
    ) -> Result<String> {
        let (reply, success) = match outcome {
            Ok(value) => (on_success(value), true),
            Err(e) => (e.to_string(), false),
        };
        if success {
            tracing::info!("[{}] {}: {}", self.market.name, action, reply);
        } else {
            tracing::debug!("[{}] {} rejected: {}", self.market.name, action, reply);
        }
        self.audit.record(action, &params, success).await;
        Ok(reply)
    }

    async fn remote_trade(
        &self,
        kind: RemoteTrade,
        buyer_id: &str,
        share_id: &str,
        share_type: &str,
        share_count: i32,
        target_market: &str,
    ) -> Result<String> {
        let params = format!(
            "BuyerID: {}, ShareID: {}, Target: {}, Quantity: {}",
            buyer_id, share_id, target_market, share_count
        );

        if target_market == self.market.name {
            tracing::debug!(
                "Cross-server {} targets this market, serving locally",
                kind.noun()
            );
            let reply = self
                .local_trade(kind, buyer_id, share_id, share_type, share_count)
                .await?;
            return Ok(format!("Cross-server {}: {}", kind.noun(), reply));
        }

        let Some(remote) = self.directory.connect(target_market) else {
            self.audit.record(kind.action(), &params, false).await;
            let verb = match kind {
                RemoteTrade::Purchase => "Purchase",
                RemoteTrade::Sell => "Sell",
            };
            return Ok(format!("{} failed. Invalid target market.", verb));
        };

        let outcome = match kind {
            RemoteTrade::Purchase => {
                remote
                    .purchase_share(buyer_id, share_id, share_type, share_count)
                    .await
            }
            RemoteTrade::Sell => {
                remote
                    .sell_share(buyer_id, share_id, share_type, share_count)
                    .await
            }
        };

        match outcome {
            Ok(reply) => {
                let success = reply.starts_with(buyer_id);
                self.audit.record(kind.action(), &params, success).await;
                Ok(format!("Cross-server {}: {}", kind.noun(), reply))
            }
            Err(e) => {
                tracing::warn!(
                    "Cross-server {} to {} failed: {}",
                    kind.noun(),
                    target_market,
                    e
                );
                self.audit.record(kind.action(), &params, false).await;
                Ok(format!("Cross-server {} failed: {}", kind.noun(), e))
            }
        }
    }

    async fn local_trade(
        &self,
        kind: RemoteTrade,
        buyer_id: &str,
        share_id: &str,
        share_type: &str,
        share_count: i32,
    ) -> Result<String> {
        match kind {
            RemoteTrade::Purchase => {
                self.purchase_share(buyer_id, share_id, share_type, share_count)
                    .await
            }
            RemoteTrade::Sell => {
                self.sell_share(buyer_id, share_id, share_type, share_count)
                    .await
            }
        }
    }

    async fn start_swap(
        &self,
        buyer_id: &str,
        old: &ShareKey,
        new_share_id: &str,
        new_share_type: &str,
    ) -> SwapStart {
        let mut ledger = self.ledger.lock().await;
        if ledger.holding(buyer_id, old) == 0 {
            return SwapStart::Rejected(TradeError::NotOwned);
        }
        if let Err(e) = check_identifier(new_share_id) {
            return SwapStart::Rejected(e);
        }
        let Ok(new_type) = new_share_type.parse::<ShareType>() else {
            return SwapStart::Rejected(TradeError::SwapUnavailable);
        };
        let new = ShareKey::new(new_type, new_share_id);

        match ledger.swap_locally(buyer_id, old, &new) {
            Ok(count) => SwapStart::Done(new, count),
            Err(TradeError::SwapUnavailable) => match ledger.take_holding(buyer_id, old) {
                Some(count) => SwapStart::Escrowed(new, count),
                None => SwapStart::Rejected(TradeError::NotOwned),
            },
            Err(e) => SwapStart::Rejected(e),
        }
    }

    /// Returns `Ok(true)` once the peer has credited the buyer.
    async fn swap_with_peer(
        &self,
        peer: &Peer,
        buyer_id: &str,
        old: &ShareKey,
        new: &ShareKey,
        count: u32,
    ) -> Result<bool> {
        let check = PeerRequest::CheckSwapAvailability {
            share_id: new.share_id.clone(),
            share_type: new.share_type.to_string(),
            count,
        };
        match self.peer_client.request(peer, &check).await? {
            PeerReply::Available(_) => {}
            other => {
                tracing::debug!("{} cannot supply {}: {}", peer.name, new, other.encode());
                return Ok(false);
            }
        }

        let execute = PeerRequest::ExecuteSwap {
            buyer_id: buyer_id.to_string(),
            old_share_id: old.share_id.clone(),
            old_share_type: old.share_type.to_string(),
            new_share_id: new.share_id.clone(),
            new_share_type: new.share_type.to_string(),
            count,
        };
        match self.peer_client.request(peer, &execute).await? {
            PeerReply::Success(_) => Ok(true),
            other => {
                tracing::debug!("{} refused swap of {}: {}", peer.name, new, other.encode());
                Ok(false)
            }
        }
    }
}

#[async_trait]
impl ShareMarket for ShareMarketService {
    async fn add_share(&self, share_id: &str, share_type: &str, capacity: i32) -> Result<String> {
        let outcome = self
            .ledger
            .lock()
            .await
            .add_share(share_id, share_type, capacity);
        let params = format!(
            "ShareID: {}, ShareType: {}, Capacity: {}",
            share_id, share_type, capacity
        );
        self.settle("Add Share", params, outcome, |key| {
            format!("Share added successfully: {}", key)
        })
        .await
    }

    async fn remove_share(&self, share_id: &str, share_type: &str) -> Result<String> {
        let outcome = self.ledger.lock().await.remove_share(share_id, share_type);
        let params = format!("ShareID: {}, ShareType: {}", share_id, share_type);
        self.settle("Remove Share", params, outcome, |share| {
            format!("Share removed successfully: {}", share.key())
        })
        .await
    }

    async fn list_share_availability(&self, share_type: &str) -> Result<String> {
        let ledger = self.ledger.lock().await;
        let lines: Vec<String> = match share_type.parse::<ShareType>() {
            Ok(t) => ledger
                .listings(t)
                .map(|s| {
                    format!(
                        "Share: {}, Type: {}, Available: {}, Origin Market: {}",
                        s.share_id, s.share_type, s.available, s.origin_market
                    )
                })
                .collect(),
            Err(_) => Vec::new(),
        };

        if lines.is_empty() {
            return Ok(format!("No shares of type {} found.", share_type));
        }
        Ok(lines.join("\n"))
    }

    async fn purchase_share(
        &self,
        buyer_id: &str,
        share_id: &str,
        share_type: &str,
        share_count: i32,
    ) -> Result<String> {
        let outcome = self
            .ledger
            .lock()
            .await
            .purchase(buyer_id, share_id, share_type, share_count);
        let params = format!(
            "buyerID: {}, shareID: {}, shareType: {}, quantity: {}",
            buyer_id, share_id, share_type, share_count
        );
        self.settle("Purchase Share", params, outcome, |trade| {
            format!(
                "{} successfully purchased {} shares of {}",
                buyer_id, trade.quantity, trade.key
            )
        })
        .await
    }

    async fn get_shares(&self, buyer_id: &str) -> Result<String> {
        let holdings = self.ledger.lock().await.holdings_of(buyer_id);
        if holdings.is_empty() {
            return Ok("No shares found.".to_string());
        }
        let lines: Vec<String> = holdings
            .iter()
            .map(|(key, count)| {
                format!(
                    "Share: {}, Type: {}, Available: {}",
                    key.share_id, key.share_type, count
                )
            })
            .collect();
        Ok(lines.join("\n"))
    }

    async fn sell_share(
        &self,
        buyer_id: &str,
        share_id: &str,
        share_type: &str,
        share_count: i32,
    ) -> Result<String> {
        let outcome = self
            .ledger
            .lock()
            .await
            .sell(buyer_id, share_id, share_type, share_count);
        let params = format!(
            "buyerID: {}, shareID: {}, quantity: {}",
            buyer_id, share_id, share_count
        );
        self.settle("Sell Share", params, outcome, |trade| {
            format!(
                "{} successfully sold {} shares of {}",
                buyer_id, trade.quantity, trade.key.share_id
            )
        })
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
        let params = format!(
            "buyerID: {}, oldShare: {}-{}, newShare: {}-{}",
            buyer_id, old_share_type, old_share_id, new_share_type, new_share_id
        );
        let Ok(old_type) = old_share_type.parse::<ShareType>() else {
            let rejected = Err::<(), _>(TradeError::NotOwned);
            return self
                .settle("Swap Shares", params, rejected, |_| String::new())
                .await;
        };
        let old = ShareKey::new(old_type, old_share_id);

        let (new, count) = match self
            .start_swap(buyer_id, &old, new_share_id, new_share_type)
            .await
        {
            SwapStart::Done(new, count) => {
                let market = self.market.name.clone();
                return self
                    .settle("Local Swap", params, Ok(count), |n| {
                        format!(
                            "Successfully swapped {} shares of {} for {} in {}",
                            n, old, new, market
                        )
                    })
                    .await;
            }
            SwapStart::Rejected(e) => {
                return self
                    .settle("Swap Shares", params, Err::<(), _>(e), |_| String::new())
                    .await;
            }
            SwapStart::Escrowed(new, count) => (new, count),
        };

        for peer in &self.peers {
            match self.swap_with_peer(peer, buyer_id, &old, &new, count).await {
                Ok(true) => {
                    self.ledger.lock().await.return_capacity(&old, count);
                    let peer_name = peer.name.clone();
                    return self
                        .settle("Swap Shares", params, Ok(count), |n| {
                            format!(
                                "Successfully swapped {} shares of {} for {} in {}",
                                n, old, new, peer_name
                            )
                        })
                        .await;
                }
                Ok(false) => {}
                Err(e) => tracing::warn!("Error communicating with {}: {}", peer.name, e),
            }
        }

        self.ledger
            .lock()
            .await
            .restore_holding(buyer_id, &old, count);
        self.settle(
            "Swap Shares",
            params,
            Err::<(), _>(TradeError::SwapUnavailable),
            |_| String::new(),
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
        self.remote_trade(
            RemoteTrade::Purchase,
            buyer_id,
            share_id,
            share_type,
            share_count,
            target_market,
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
        self.remote_trade(
            RemoteTrade::Sell,
            buyer_id,
            share_id,
            share_type,
            share_count,
            target_market,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::soap::SoapClient;
    use crate::core::peer::PeerListener;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::net::{TcpListener, UdpSocket};

    #[derive(Default)]
    struct StaticDirectory {
        markets: HashMap<String, Arc<dyn ShareMarket>>,
    }

    impl MarketDirectory for StaticDirectory {
        fn connect(&self, market: &str) -> Option<Arc<dyn ShareMarket>> {
            self.markets.get(market).cloned()
        }

        fn market_names(&self) -> Vec<String> {
            self.markets.keys().cloned().collect()
        }
    }

    fn service(name: &str, code: &str, directory: StaticDirectory) -> ShareMarketService {
        with_peers(name, code, directory, Vec::new())
    }

    fn with_peers(
        name: &str,
        code: &str,
        directory: StaticDirectory,
        peers: Vec<Peer>,
    ) -> ShareMarketService {
        ShareMarketService::new(
            MarketInfo::new(name, code),
            Arc::new(directory),
            peers,
            PeerClient::new(Duration::from_millis(200)),
            AuditLog::disabled(),
        )
    }

    #[tokio::test]
    async fn test_admin_operations_reply_text() {
        let london = service("London", "LON", StaticDirectory::default());

        assert_eq!(
            london.add_share("LONM101025", "Equity", 10).await.unwrap(),
            "Share added successfully: Equity-LONM101025"
        );
        assert_eq!(
            london.add_share("LONM101025", "Equity", 10).await.unwrap(),
            "Share already exists with ID LONM101025 and Type Equity"
        );
        assert_eq!(
            london.list_share_availability("Equity").await.unwrap(),
            "Share: LONM101025, Type: Equity, Available: 10, Origin Market: London"
        );
        assert_eq!(
            london.list_share_availability("Bonus").await.unwrap(),
            "No shares of type Bonus found."
        );
        assert_eq!(
            london.remove_share("LONM101025", "Equity").await.unwrap(),
            "Share removed successfully: Equity-LONM101025"
        );
    }

    #[tokio::test]
    async fn test_buyer_operations_reply_text() {
        let london = service("London", "LON", StaticDirectory::default());
        london.add_share("LONM101025", "Equity", 10).await.unwrap();

        assert_eq!(
            london
                .purchase_share("LONB1111", "LONM101025", "Equity", 4)
                .await
                .unwrap(),
            "LONB1111 successfully purchased 4 shares of Equity-LONM101025"
        );
        assert_eq!(
            london.get_shares("LONB1111").await.unwrap(),
            "Share: LONM101025, Type: Equity, Available: 4"
        );
        assert_eq!(
            london
                .sell_share("LONB1111", "LONM101025", "Equity", 4)
                .await
                .unwrap(),
            "LONB1111 successfully sold 4 shares of LONM101025"
        );
        assert_eq!(london.get_shares("LONB1111").await.unwrap(), "No shares found.");
    }

    #[tokio::test]
    async fn test_remote_purchase_goes_through_directory() {
        let tokyo: Arc<dyn ShareMarket> =
            Arc::new(service("Tokyo", "TOK", StaticDirectory::default()));
        tokyo.add_share("TOKE101025", "Dividend", 3).await.unwrap();

        let mut directory = StaticDirectory::default();
        directory.markets.insert("Tokyo".to_string(), Arc::clone(&tokyo));
        let london = service("London", "LON", directory);

        assert_eq!(
            london
                .purchase_remote_share("LONB1111", "TOKE101025", "Dividend", 2, "Tokyo")
                .await
                .unwrap(),
            "Cross-server purchase: LONB1111 successfully purchased 2 shares of Dividend-TOKE101025"
        );
        assert_eq!(
            tokyo.get_shares("LONB1111").await.unwrap(),
            "Share: TOKE101025, Type: Dividend, Available: 2"
        );
        assert_eq!(
            london
                .sell_remote_share("LONB1111", "TOKE101025", "Dividend", 1, "Paris")
                .await
                .unwrap(),
            "Sell failed. Invalid target market."
        );
    }

    #[tokio::test]
    async fn test_remote_purchase_to_own_market_is_served_locally() {
        let london = service("London", "LON", StaticDirectory::default());
        london.add_share("LONM101025", "Equity", 2).await.unwrap();

        let reply = london
            .purchase_remote_share("LONB1111", "LONM101025", "Equity", 1, "London")
            .await
            .unwrap();
        assert_eq!(
            reply,
            "Cross-server purchase: LONB1111 successfully purchased 1 shares of Equity-LONM101025"
        );
    }

    #[tokio::test]
    async fn test_local_swap() {
        let london = service("London", "LON", StaticDirectory::default());
        london.add_share("LONM101025", "Equity", 10).await.unwrap();
        london.add_share("LONA101025", "Bonus", 10).await.unwrap();
        london
            .purchase_share("LONB1111", "LONM101025", "Equity", 3)
            .await
            .unwrap();

        assert_eq!(
            london
                .swap_shares("LONB1111", "LONM101025", "Equity", "LONA101025", "Bonus")
                .await
                .unwrap(),
            "Successfully swapped 3 shares of Equity-LONM101025 for Bonus-LONA101025 in London"
        );
        assert_eq!(
            london.get_shares("LONB1111").await.unwrap(),
            "Share: LONA101025, Type: Bonus, Available: 3"
        );
    }

    #[tokio::test]
    async fn test_swap_without_holding_or_supply() {
        let london = service("London", "LON", StaticDirectory::default());
        london.add_share("LONM101025", "Equity", 10).await.unwrap();

        assert_eq!(
            london
                .swap_shares("LONB1111", "LONM101025", "Equity", "TOKE101025", "Dividend")
                .await
                .unwrap(),
            "Buyer does not own the share to be swapped"
        );

        london
            .purchase_share("LONB1111", "LONM101025", "Equity", 3)
            .await
            .unwrap();
        assert_eq!(
            london
                .swap_shares("LONB1111", "LONM101025", "Equity", "TOKE101025", "Dividend")
                .await
                .unwrap(),
            "Unable to swap shares. New share not available in any market."
        );
        // Escrow is rolled back when no peer can supply the new share.
        assert_eq!(
            london.get_shares("LONB1111").await.unwrap(),
            "Share: LONM101025, Type: Equity, Available: 3"
        );
    }

    #[tokio::test]
    async fn test_remote_purchase_reports_unreachable_market() {
        let closed = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let endpoint = format!("http://{}/ShareMarketService", closed.local_addr().unwrap());
        drop(closed);

        let tokyo = SoapClient::new(endpoint, Duration::from_secs(2)).unwrap();
        let mut directory = StaticDirectory::default();
        directory
            .markets
            .insert("Tokyo".to_string(), Arc::new(tokyo) as Arc<dyn ShareMarket>);
        let london = service("London", "LON", directory);

        let reply = london
            .purchase_remote_share("LONB1111", "TOKE101025", "Dividend", 2, "Tokyo")
            .await
            .unwrap();
        assert!(
            reply.starts_with("Cross-server purchase failed: "),
            "unexpected reply: {}",
            reply
        );
    }

    #[tokio::test]
    async fn test_swap_moves_on_after_silent_peer() {
        let tokyo = service("Tokyo", "TOK", StaticDirectory::default());
        tokyo.add_share("TOKE101025", "Dividend", 5).await.unwrap();
        let udp = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let tokyo_addr = udp.local_addr().unwrap();
        let listener = tokio::spawn(PeerListener::from_socket(udp, tokyo.ledger()).serve());

        let silent = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let peers = vec![
            Peer {
                name: "NewYork".to_string(),
                addr: silent.local_addr().unwrap(),
            },
            Peer {
                name: "Tokyo".to_string(),
                addr: tokyo_addr,
            },
        ];
        let london = with_peers("London", "LON", StaticDirectory::default(), peers);
        london.add_share("LONM101025", "Equity", 10).await.unwrap();
        london
            .purchase_share("LONB1111", "LONM101025", "Equity", 2)
            .await
            .unwrap();

        let reply = london
            .swap_shares("LONB1111", "LONM101025", "Equity", "TOKE101025", "Dividend")
            .await
            .unwrap();
        assert_eq!(
            reply,
            "Successfully swapped 2 shares of Equity-LONM101025 for Dividend-TOKE101025 in Tokyo"
        );
        assert_eq!(london.get_shares("LONB1111").await.unwrap(), "No shares found.");
        assert_eq!(
            tokyo.get_shares("LONB1111").await.unwrap(),
            "Share: TOKE101025, Type: Dividend, Available: 2"
        );
        assert_eq!(
            london.list_share_availability("Equity").await.unwrap(),
            "Share: LONM101025, Type: Equity, Available: 10, Origin Market: London"
        );

        listener.abort();
    }
}
