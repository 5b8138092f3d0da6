use super::MarketConfig;
use crate::utils::error::Result;
use clap::{Args, Parser};
use std::path::PathBuf;

/// Flags shared by the server and the console clients.
#[derive(Debug, Clone, Args)]
pub struct CommonArgs {
    #[arg(short, long, help = "TOML configuration file (defaults to the built-in three markets)")]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Directory for audit logs, overrides [server] log_dir")]
    pub log_dir: Option<String>,

    #[arg(short, long, help = "Enable verbose output")]
    pub verbose: bool,
}

impl CommonArgs {
    pub fn load_config(&self) -> Result<MarketConfig> {
        let mut config = MarketConfig::load(self.config.as_deref())?;
        if let Some(log_dir) = &self.log_dir {
            config.server.log_dir = log_dir.clone();
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, Parser)]
#[command(name = "share-market")]
#[command(about = "Runs one market node of the distributed share market")]
pub struct ServerArgs {
    #[arg(short, long, help = "Market to serve, e.g. London")]
    pub market: String,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Clone, Parser)]
#[command(about = "Interactive share market console")]
pub struct ClientArgs {
    #[arg(short, long, help = "User ID, e.g. LONB1234 (prompted for when omitted)")]
    pub user: Option<String>,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_server_args() {
        let args = ServerArgs::parse_from([
            "share-market",
            "--market",
            "London",
            "--log-dir",
            "/tmp/market",
            "-v",
        ]);
        assert_eq!(args.market, "London");
        assert!(args.common.verbose);

        let config = args.common.load_config().unwrap();
        assert_eq!(config.server.log_dir, "/tmp/market");
        assert_eq!(config.markets.len(), 3);
    }

    #[test]
    fn test_client_args_user_is_optional() {
        let args = ClientArgs::parse_from(["buyer-client"]);
        assert!(args.user.is_none());
        assert!(args.common.config.is_none());
    }
}
