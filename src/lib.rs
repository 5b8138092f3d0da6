pub mod adapters;
pub mod app;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{ClientArgs, ServerArgs};

pub use adapters::{audit::AuditLog, directory::SoapDirectory, soap::SoapClient};
pub use app::{AdminSession, BuyerSession, Console, MarketNode};
pub use config::MarketConfig;
pub use core::{ledger::Ledger, service::ShareMarketService};
pub use domain::{MarketDirectory, ShareMarket};
pub use utils::error::{MarketError, Result};
