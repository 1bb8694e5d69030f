use thiserror::Error;

/// Failures reported by a device target.
#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("http request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("http response error: {status}{}", excerpt(.body))]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("invalid device response: {0}")]
    InvalidResponse(String),

    #[error("authentication failed: {0}")]
    Auth(String),

    #[error("invalid device url: {0}")]
    InvalidUrl(String),

    #[error("{0}")]
    Custom(String),
}

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Longest part of an error body repeated in messages.
const MAX_BODY_EXCERPT: usize = 200;

/// `" (<body>)"`, cut to [`MAX_BODY_EXCERPT`] bytes, or nothing for an empty body.
fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return String::new();
    }
    if body.len() <= MAX_BODY_EXCERPT {
        return format!(" ({body})");
    }
    let mut end = MAX_BODY_EXCERPT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!(" ({}...)", &body[..end])
}
