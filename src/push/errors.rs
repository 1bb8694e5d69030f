use thiserror::Error;

use crate::device::DeviceError;

/// A failed push, attributed to the protocol step that failed.
#[derive(Error, Debug)]
pub enum PushError {
    #[error("cannot start transaction: {0}")]
    BeginTransaction(#[source] DeviceError),

    #[error("cannot import crl file: {0}")]
    Upload(#[source] DeviceError),

    #[error("cannot read profile: {0}")]
    ReadProfile(#[source] DeviceError),

    #[error("cannot modify profile: {0}")]
    WriteProfile(#[source] DeviceError),

    #[error("cannot commit transaction: {0}")]
    Commit(#[source] DeviceError),

    #[error("cannot verify: {0}")]
    Verify(#[source] DeviceError),

    /// The commit went through but the profile does not reference the upload.
    #[error("verification failed: profile references {found:?}, expected {expected:?}")]
    VerificationFailed { expected: String, found: String },
}

impl PushError {
    /// Short classification used in log lines and tests.
    pub fn kind(&self) -> &'static str {
        match self {
            PushError::BeginTransaction(_) => "begin-transaction",
            PushError::Upload(_) => "upload",
            PushError::ReadProfile(_) => "profile-read",
            PushError::WriteProfile(_) => "profile-write",
            PushError::Commit(_) => "commit",
            PushError::Verify(_) => "verify",
            PushError::VerificationFailed { .. } => "verification-failed",
        }
    }
}

pub type PushResult<T> = Result<T, PushError>;
