use thiserror::Error;

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("XML error: {0}")]
    XmlError(#[from] quick_xml::Error),

    #[error("SOAP fault {code}: {message}")]
    SoapFault { code: String, message: String },

    #[error("Peer protocol error: {message}")]
    ProtocolError { message: String },

    #[error("Peer {peer} did not answer within {timeout_ms}ms")]
    PeerTimeout { peer: String, timeout_ms: u64 },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Missing configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Validation error: {message}")]
    ValidationError { message: String },
}

impl MarketError {
    pub fn soap_client_fault(message: impl Into<String>) -> Self {
        MarketError::SoapFault {
            code: "S:Client".to_string(),
            message: message.into(),
        }
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        MarketError::ProtocolError {
            message: message.into(),
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            MarketError::HttpError(_) => "Could not reach the market server".to_string(),
            MarketError::IoError(e) => format!("I/O failure: {}", e),
            MarketError::XmlError(_) | MarketError::SoapFault { .. } => {
                format!("The market server rejected the request: {}", self)
            }
            MarketError::ProtocolError { .. } | MarketError::PeerTimeout { .. } => {
                format!("Inter-market communication failed: {}", self)
            }
            MarketError::ConfigError { .. }
            | MarketError::ConfigValidationError { .. }
            | MarketError::InvalidConfigValueError { .. }
            | MarketError::MissingConfigError { .. } => format!("Invalid configuration: {}", self),
            MarketError::ValidationError { message } => message.clone(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self {
            MarketError::HttpError(_) => {
                "Check that the target market server is running and its endpoint is correct"
            }
            MarketError::IoError(_) => {
                "Check file permissions and that the ports are not already in use"
            }
            MarketError::XmlError(_) | MarketError::SoapFault { .. } => {
                "Check that client and server run the same version"
            }
            MarketError::ProtocolError { .. } | MarketError::PeerTimeout { .. } => {
                "Check that all market nodes are running and udp_addr entries match"
            }
            MarketError::ConfigError { .. }
            | MarketError::ConfigValidationError { .. }
            | MarketError::InvalidConfigValueError { .. }
            | MarketError::MissingConfigError { .. } => "Fix the configuration file and restart",
            MarketError::ValidationError { .. } => "Correct the input and try again",
        }
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;

/// Business rejections. `Display` is the reply text sent back to clients.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TradeError {
    #[error("Share not added: {share_type}-{share_id}")]
    UnsupportedShareType { share_type: String, share_id: String },

    #[error("Share already exists with ID {share_id} and Type {share_type}")]
    ShareExists { share_id: String, share_type: String },

    #[error("Share not available: {0}")]
    ShareNotAvailable(String),

    #[error("Not enough shares available for {0}")]
    InsufficientCapacity(String),

    #[error("Share not found: {0}")]
    ShareNotFound(String),

    #[error("Not enough shares to sell")]
    InsufficientHoldings,

    #[error("Buyer does not own the share to be swapped")]
    NotOwned,

    #[error("Unable to swap shares. New share not available in any market.")]
    SwapUnavailable,

    #[error("Cannot swap a share for itself")]
    SameShare,

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i32),

    #[error("Invalid capacity: {0}")]
    InvalidCapacity(i32),

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),
}

pub type TradeResult<T> = std::result::Result<T, TradeError>;
