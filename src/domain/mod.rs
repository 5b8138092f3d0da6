// Domain layer: market models and ports. No I/O here.

pub mod model;
pub mod ports;

pub use model::{MarketInfo, Role, Share, ShareKey, ShareType, UserId};
pub use ports::{MarketDirectory, ShareMarket};
