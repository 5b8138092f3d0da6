#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

#[cfg(feature = "cli")]
pub use cli::{ClientArgs, ServerArgs};
pub use toml_config::{LogFormat, MarketConfig, MarketEntry, ServerSettings};
