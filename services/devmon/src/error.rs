//! Error types for the devmon service

/// Errors that can occur in the devmon service
#[derive(Debug, thiserror::Error)]
pub enum DevmonError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("GET {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("State document parse error: {0}")]
    Parse(String),

    #[error("Channel '{channel}' failed: {message}")]
    Channel { channel: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Dashboard error: {0}")]
    Dashboard(String),
}

impl DevmonError {
    pub(crate) fn channel(channel: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Channel {
            channel: channel.into(),
            message: message.into(),
        }
    }

    /// True for failures that mean "no snapshot this cycle"
    pub fn is_fetch_error(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Status { .. } | Self::Parse(_))
    }
}

/// Result type alias for devmon operations
pub type Result<T> = std::result::Result<T, DevmonError>;
