use crate::core::peer::Peer;
use crate::domain::model::{MarketInfo, UserId};
use crate::utils::error::{MarketError, Result};
use crate::utils::validation::{self, Validate};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use url::Url;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    #[serde(default)]
    pub server: ServerSettings,
    #[serde(default = "defaults::markets")]
    pub markets: Vec<MarketEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    #[serde(default = "defaults::log_dir")]
    pub log_dir: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default = "defaults::peer_timeout_ms")]
    pub peer_timeout_ms: u64,
    #[serde(default = "defaults::request_timeout_ms")]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarketEntry {
    pub name: String,
    pub code: String,
    /// SOAP endpoint, e.g. `http://localhost:8081/ShareMarketService`.
    pub endpoint: String,
    pub udp_addr: String,
}

mod defaults {
    use super::MarketEntry;

    pub fn log_dir() -> String {
        "logs".to_string()
    }

    pub fn peer_timeout_ms() -> u64 {
        2000
    }

    pub fn request_timeout_ms() -> u64 {
        5000
    }

    pub fn markets() -> Vec<MarketEntry> {
        [
            ("NewYork", "NYK", 8080, 5000),
            ("London", "LON", 8081, 5001),
            ("Tokyo", "TOK", 8082, 5002),
        ]
        .into_iter()
        .map(|(name, code, http_port, udp_port)| MarketEntry {
            name: name.to_string(),
            code: code.to_string(),
            endpoint: format!("http://localhost:{}/ShareMarketService", http_port),
            udp_addr: format!("127.0.0.1:{}", udp_port),
        })
        .collect()
    }
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            log_dir: defaults::log_dir(),
            log_format: LogFormat::default(),
            peer_timeout_ms: defaults::peer_timeout_ms(),
            request_timeout_ms: defaults::request_timeout_ms(),
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            server: ServerSettings::default(),
            markets: defaults::markets(),
        }
    }
}

impl MarketEntry {
    pub fn info(&self) -> MarketInfo {
        MarketInfo::new(self.name.clone(), self.code.clone())
    }

    fn url(&self) -> Result<Url> {
        Url::parse(&self.endpoint).map_err(|e| MarketError::InvalidConfigValueError {
            field: format!("markets.{}.endpoint", self.name),
            value: self.endpoint.clone(),
            reason: e.to_string(),
        })
    }

    /// `host:port` the SOAP listener binds to.
    pub fn bind_address(&self) -> Result<String> {
        let url = self.url()?;
        let host = url.host_str().ok_or_else(|| MarketError::InvalidConfigValueError {
            field: format!("markets.{}.endpoint", self.name),
            value: self.endpoint.clone(),
            reason: "Endpoint has no host".to_string(),
        })?;
        let port = url.port_or_known_default().unwrap_or(80);
        Ok(format!("{}:{}", host, port))
    }

    pub fn service_path(&self) -> Result<String> {
        Ok(self.url()?.path().to_string())
    }

    pub fn udp_socket_addr(&self) -> Result<SocketAddr> {
        validation::validate_socket_addr(
            &format!("markets.{}.udp_addr", self.name),
            &self.udp_addr,
        )
    }
}

impl MarketConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(MarketError::IoError)?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content)?;

        toml::from_str(&processed_content).map_err(|e| MarketError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// Loads `path` when given, otherwise the built-in three-market layout.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Replaces `${VAR}` with the environment value; unknown variables are left as-is.
    fn substitute_env_vars(content: &str) -> Result<String> {
        let re = regex::Regex::new(r"\$\{([^}]+)\}").map_err(|e| MarketError::ConfigError {
            message: e.to_string(),
        })?;

        let result = re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        });

        Ok(result.to_string())
    }

    pub fn market(&self, name: &str) -> Option<&MarketEntry> {
        self.markets
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    pub fn market_by_code(&self, code: &str) -> Option<&MarketEntry> {
        self.markets.iter().find(|m| m.code == code)
    }

    /// Resolves a user ID like `LONB1234` to its home market.
    pub fn home_market(&self, user_id: &str) -> Option<(UserId, &MarketEntry)> {
        let user = UserId::parse(user_id, &self.codes())?;
        let entry = self.market_by_code(&user.market_code)?;
        Some((user, entry))
    }

    pub fn codes(&self) -> Vec<&str> {
        self.markets.iter().map(|m| m.code.as_str()).collect()
    }

    pub fn peers(&self) -> Result<Vec<Peer>> {
        self.markets
            .iter()
            .map(|m| {
                Ok(Peer {
                    name: m.name.clone(),
                    addr: m.udp_socket_addr()?,
                })
            })
            .collect()
    }

    pub fn peer_timeout(&self) -> Duration {
        Duration::from_millis(self.server.peer_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.server.request_timeout_ms)
    }
}

impl Validate for MarketConfig {
    fn validate(&self) -> Result<()> {
        if self.markets.is_empty() {
            return Err(MarketError::MissingConfigError {
                field: "markets".to_string(),
            });
        }

        validation::validate_path("server.log_dir", &self.server.log_dir)?;
        validation::validate_positive_number(
            "server.peer_timeout_ms",
            self.server.peer_timeout_ms,
            1,
        )?;
        validation::validate_positive_number(
            "server.request_timeout_ms",
            self.server.request_timeout_ms,
            1,
        )?;

        validation::validate_unique("markets.name", self.markets.iter().map(|m| m.name.as_str()))?;
        validation::validate_unique("markets.code", self.markets.iter().map(|m| m.code.as_str()))?;
        validation::validate_unique(
            "markets.udp_addr",
            self.markets.iter().map(|m| m.udp_addr.as_str()),
        )?;

        for market in &self.markets {
            validation::validate_non_empty_string("markets.name", &market.name)?;
            validation::validate_market_code(
                &format!("markets.{}.code", market.name),
                &market.code,
            )?;
            validation::validate_url(
                &format!("markets.{}.endpoint", market.name),
                &market.endpoint,
            )?;
            market.udp_socket_addr()?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_layout() {
        let config = MarketConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.codes(), vec!["NYK", "LON", "TOK"]);

        let london = config.market("london").unwrap();
        assert_eq!(london.bind_address().unwrap(), "localhost:8081");
        assert_eq!(london.service_path().unwrap(), "/ShareMarketService");
        assert_eq!(london.udp_socket_addr().unwrap().port(), 5001);
        assert_eq!(config.peer_timeout(), Duration::from_millis(2000));
    }

    #[test]
    fn test_home_market_from_user_id() {
        let config = MarketConfig::default();

        let (user, entry) = config.home_market("TOKB7777").unwrap();
        assert_eq!(user.market_code, "TOK");
        assert_eq!(entry.name, "Tokyo");
        assert!(config.home_market("PARB1234").is_none());
        assert!(config.home_market("TO").is_none());
    }

    #[test]
    fn test_parse_toml_config() {
        let toml_content = r#"
[server]
log_dir = "/var/log/market"
log_format = "json"
peer_timeout_ms = 500

[[markets]]
name = "London"
code = "LON"
endpoint = "http://127.0.0.1:9081/ShareMarketService"
udp_addr = "127.0.0.1:6001"

[[markets]]
name = "Tokyo"
code = "TOK"
endpoint = "http://127.0.0.1:9082/ShareMarketService"
udp_addr = "127.0.0.1:6002"
"#;

        let config = MarketConfig::from_toml_str(toml_content).unwrap();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.log_format, LogFormat::Json);
        assert_eq!(config.server.request_timeout_ms, 5000);
        assert_eq!(config.markets.len(), 2);
        assert_eq!(config.market_by_code("TOK").unwrap().name, "Tokyo");
        assert_eq!(config.peers().unwrap()[0].addr.port(), 6001);
    }

    #[test]
    fn test_missing_markets_fall_back_to_defaults() {
        let config = MarketConfig::from_toml_str("[server]\nlog_dir = \"out\"\n").unwrap();
        assert_eq!(config.markets.len(), 3);
        assert_eq!(config.server.log_dir, "out");
    }

    #[test]
    fn test_env_var_substitution() {
        std::env::set_var("SHARE_MARKET_TEST_LOG_DIR", "/tmp/market-logs");

        let config =
            MarketConfig::from_toml_str("[server]\nlog_dir = \"${SHARE_MARKET_TEST_LOG_DIR}\"\n")
                .unwrap();
        assert_eq!(config.server.log_dir, "/tmp/market-logs");

        std::env::remove_var("SHARE_MARKET_TEST_LOG_DIR");
    }

    #[test]
    fn test_validation_rejects_bad_entries() {
        let mut config = MarketConfig::default();
        config.markets[1].code = "NYK".to_string();
        assert!(config.validate().is_err());

        let mut config = MarketConfig::default();
        config.markets[0].udp_addr = "localhost:5000".to_string();
        assert!(config.validate().is_err());

        let mut config = MarketConfig::default();
        config.markets[2].endpoint = "tokyo:8082".to_string();
        assert!(config.validate().is_err());

        let mut config = MarketConfig::default();
        config.markets.clear();
        assert!(matches!(
            config.validate(),
            Err(MarketError::MissingConfigError { .. })
        ));
    }

    #[test]
    fn test_config_from_file() {
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file
            .write_all(b"[server]\npeer_timeout_ms = 750\n")
            .unwrap();

        let config = MarketConfig::load(Some(temp_file.path())).unwrap();
        assert_eq!(config.server.peer_timeout_ms, 750);
    }
}
