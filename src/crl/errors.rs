use thiserror::Error;

/// Reasons a CRL could not be fetched or was refused before any push.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("cannot fetch crl: {0}")]
    Network(#[from] reqwest::Error),

    /// Non-success status; the body is never inspected.
    #[error("cannot fetch crl due to http error: {0}")]
    HttpStatus(reqwest::StatusCode),

    #[error("cannot decode crl: {0}")]
    Decode(String),

    #[error("crl has expired (next update: {0})")]
    Expired(String),

    #[error("crl is not yet valid (this update: {0})")]
    NotYetValid(String),
}

impl FetchError {
    /// Short classification used in log lines and tests.
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::Network(_) => "network",
            FetchError::HttpStatus(_) => "http-status",
            FetchError::Decode(_) => "decode",
            FetchError::Expired(_) => "expired",
            FetchError::NotYetValid(_) => "not-yet-valid",
        }
    }
}

pub type FetchResult<T> = Result<T, FetchError>;
