use thiserror::Error;

/// Failure raised before an envelope could be read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Connection refused, DNS failure, timeout.
    #[error("{0}")]
    Network(String),
    /// Non-2xx response. The body is never read.
    #[error("HTTP {status}: {status_text}")]
    Status { status: u16, status_text: String },
    /// Response body was not valid JSON.
    #[error("{0}")]
    Decode(String),
    /// The request itself could not be built.
    #[error("{0}")]
    Request(String),
}

/// Every way a backend call can fail, normalized to a human-readable reason.
///
/// Callers decide presentation (inline form error or notification) from the
/// reason alone; the variant only records where the failure came from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("{0}")]
    Transport(String),
    #[error("{0}")]
    Application(String),
    #[error("{0}")]
    Validation(String),
}

impl ApiError {
    pub fn reason(&self) -> &str {
        match self {
            ApiError::Transport(reason)
            | ApiError::Application(reason)
            | ApiError::Validation(reason) => reason,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, ApiError::Validation(_))
    }
}

impl From<TransportError> for ApiError {
    fn from(err: TransportError) -> Self {
        ApiError::Transport(err.to_string())
    }
}

pub type ApiResult<T> = std::result::Result<T, ApiError>;
