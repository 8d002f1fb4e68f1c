use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// The request never produced a response (connection refused, DNS, timeout)
    #[error("Failed to fetch: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Network response was not ok")]
    Http { status: StatusCode },

    #[error("Malformed response: {0}")]
    Decode(String),

    #[error(transparent)]
    Invalid(#[from] shared::Error),
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Http { status } => Some(*status),
            ApiError::Network(e) => e.status(),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}
