//! KIE client error types.

use thiserror::Error;

pub type KieResult<T> = Result<T, KieError>;

#[derive(Debug, Error)]
pub enum KieError {
    #[error("KIE API key not configured")]
    MissingApiKey,

    #[error("KIE returned HTTP {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl KieError {
    /// Whether a caller polling for status may simply try again later.
    ///
    /// Terminal errors (auth, malformed responses, 4xx) are not retryable;
    /// transport failures and server-side errors are.
    pub fn is_retryable(&self) -> bool {
        match self {
            KieError::Network(_) => true,
            KieError::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }
}
