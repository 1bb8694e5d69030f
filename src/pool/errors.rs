use thiserror::Error;

/// Fatal problems detected by [`super::Pool::start_all`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StartupError {
    #[error("no device target provided")]
    NoTargets,

    #[error("no crl source registered")]
    NoSources,

    #[error("pool already started")]
    AlreadyStarted,

    #[error("crl {0}: refresh interval must be greater than zero")]
    InvalidSource(String),
}
