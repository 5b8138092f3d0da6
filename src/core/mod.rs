pub mod ledger;
pub mod peer;
pub mod service;

pub use crate::domain::ports::{MarketDirectory, ShareMarket};
pub use crate::utils::error::Result;
pub use ledger::Ledger;
pub use peer::{Peer, PeerClient, PeerListener};
pub use service::ShareMarketService;
