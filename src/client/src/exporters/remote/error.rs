use std::fmt;

/// Categories of delivery failures, used as a structured log field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    NetworkFailure,
    Non2xxResponse,
    SerializationFailure,
    Rejected,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::NetworkFailure => "network_failure",
            ErrorCategory::Non2xxResponse => "non_2xx_response",
            ErrorCategory::SerializationFailure => "serialization_failure",
            ErrorCategory::Rejected => "rejected",
        }
    }
}

/// Errors that can occur while delivering a record to a sink
#[derive(Debug)]
pub enum SendError {
    /// Failed to serialize the record to JSON
    Serialization(serde_json::Error),

    /// Network request failed
    Network(reqwest::Error),

    /// Server returned non-2XX status code
    Server { status: u16, body: String },

    /// The transport refused the record without reaching a server
    Rejected(String),
}

impl fmt::Display for SendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SendError::Serialization(e) => write!(f, "Failed to serialize error record: {}", e),
            SendError::Network(e) => write!(f, "Network request failed: {}", e),
            SendError::Server { status, body } => write!(f, "Server error {}: {}", status, body),
            SendError::Rejected(reason) => write!(f, "Delivery rejected: {}", reason),
        }
    }
}

impl std::error::Error for SendError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SendError::Serialization(e) => Some(e),
            SendError::Network(e) => Some(e),
            SendError::Server { .. } | SendError::Rejected(_) => None,
        }
    }
}

impl From<serde_json::Error> for SendError {
    fn from(err: serde_json::Error) -> Self {
        SendError::Serialization(err)
    }
}

impl From<reqwest::Error> for SendError {
    fn from(err: reqwest::Error) -> Self {
        SendError::Network(err)
    }
}

impl SendError {
    pub fn error_category(&self) -> ErrorCategory {
        match self {
            SendError::Serialization(_) => ErrorCategory::SerializationFailure,
            SendError::Network(_) => ErrorCategory::NetworkFailure,
            SendError::Server { .. } => ErrorCategory::Non2xxResponse,
            SendError::Rejected(_) => ErrorCategory::Rejected,
        }
    }

    pub fn server_error(status: u16, body: String) -> Self {
        SendError::Server { status, body }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            SendError::Serialization(_) => "Failed to prepare error record for sending".to_string(),
            SendError::Network(_) => "Network connection failed while sending error record".to_string(),
            SendError::Server { status, .. } => {
                format!("Server rejected error record with status {}", status)
            }
            SendError::Rejected(reason) => format!("Error record was not sent: {}", reason),
        }
    }
}

/// Result type for delivery operations
pub type SendResult<T> = Result<T, SendError>;
