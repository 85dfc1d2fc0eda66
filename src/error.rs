use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ApiErrorType {
    InvalidRequestError,
    RateLimitError,
    AuthenticationError,
    ServerError,
    #[default]
    #[serde(other)]
    Unknown,
}

/// Error payload carried by an inbound `error` event.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq, Default)]
pub struct ServerError {
    #[serde(rename = "type", default)]
    pub error_type: ApiErrorType,
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub param: Option<String>,
    #[serde(default)]
    pub event_id: Option<String>,
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Failed to parse or serialize JSON: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("Header error: {0}")]
    Header(#[from] tokio_tungstenite::tungstenite::http::header::InvalidHeaderValue),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Failed to connect to the realtime service: {0}")]
    Connection(String),

    #[error("Not connected to the realtime service")]
    NotConnected,

    #[error("The connection was closed unexpectedly")]
    ConnectionClosed,

    #[error("Invalid client event: {0}")]
    InvalidClientEvent(String),

    #[error("{0}")]
    Validation(String),

    #[error("Script '{0}' not found")]
    ScriptNotFound(String),

    #[error("File {0} does not exist")]
    FileNotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Short machine-readable label used in soft-failure payloads.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::WebSocket(_) | Self::Connection(_) | Self::NotConnected | Self::ConnectionClosed => "transport_error",
            Self::Serialization(_) | Self::InvalidClientEvent(_) => "serialization_error",
            Self::Url(_) | Self::Header(_) | Self::Config(_) => "config_error",
            Self::Io(_) => "io_error",
            Self::Regex(_) | Self::Validation(_) => "validation_error",
            Self::ScriptNotFound(_) | Self::FileNotFound(_) => "not_found",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
