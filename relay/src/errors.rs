use thiserror::Error;

/// Result type alias for relay operations
pub type Result<T, E = RelayError> = std::result::Result<T, E>;

/// Errors that can occur while handling a tracking request
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    #[error("Invalid value for parameter {name}: {value}")]
    InvalidParameter { name: String, value: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Whether the error was caused by bad client input. These map to a
    /// 400 response; everything else becomes a generic 500.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RelayError::MissingParameter(_) | RelayError::InvalidParameter { .. }
        )
    }
}
