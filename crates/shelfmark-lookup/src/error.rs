use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error from {0}: {1}")]
    ApiError(String, String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("invalid URL {0}: {1}")]
    InvalidUrl(String, String),
}

pub type Result<T> = std::result::Result<T, LookupError>;
