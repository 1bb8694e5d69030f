//! Transactional CRL push and post-commit verification
//!
//! A push uploads the CRL under a fresh artifact name, points the client-SSL
//! profile at it and commits, all inside one device transaction. The profile
//! is then read back outside the transaction to make sure the device really
//! applied the change.
//!
//! A step failing after the transaction was opened leaves the transaction
//! uncommitted; it is not aborted explicitly and expires on the device.

mod errors;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::crl::CrlDocument;
use crate::device::DeviceTarget;

pub use errors::{PushError, PushResult};

/// Extension the device appends to imported CRL files.
pub const CRL_FILE_EXTENSION: &str = ".crl";

/// Name under which a CRL is uploaded: `<source>_<unix seconds>`.
pub fn artifact_name(source_name: &str, at: DateTime<Utc>) -> String {
    format!("{source_name}_{}", at.timestamp())
}

/// The profile reference the device will use for an uploaded artifact.
pub fn crl_reference(artifact_name: &str) -> String {
    format!("{artifact_name}{CRL_FILE_EXTENSION}")
}

/// Whether `crl_file`, as reported by the device, names `expected`. The
/// device may prefix the reference with its partition path.
fn references(crl_file: &str, expected: &str) -> bool {
    crl_file == expected
        || crl_file
            .strip_suffix(expected)
            .is_some_and(|prefix| prefix.ends_with('/'))
}

/// Replace the CRL referenced by `profile_name` on `target`.
///
/// Returns the CRL reference read back from the device after commit.
pub async fn push_crl(
    target: &dyn DeviceTarget,
    document: &CrlDocument,
    profile_name: &str,
    artifact_name: &str,
) -> PushResult<String> {
    let mut transaction = target
        .begin_transaction()
        .await
        .map_err(PushError::BeginTransaction)?;

    transaction
        .upload_file(artifact_name, document.der())
        .await
        .map_err(PushError::Upload)?;

    let mut profile = transaction
        .get_profile(profile_name)
        .await
        .map_err(PushError::ReadProfile)?;

    let expected = crl_reference(artifact_name);
    debug!(
        "Switching profile {} on {} from {} to {}",
        profile_name,
        target.name(),
        profile.crl_file,
        expected
    );
    profile.crl_file = expected.clone();

    transaction
        .edit_profile(profile_name, &profile)
        .await
        .map_err(PushError::WriteProfile)?;

    transaction.commit().await.map_err(PushError::Commit)?;

    let applied = target
        .get_profile(profile_name)
        .await
        .map_err(PushError::Verify)?;

    if !references(&applied.crl_file, &expected) {
        return Err(PushError::VerificationFailed {
            expected,
            found: applied.crl_file,
        });
    }

    Ok(applied.crl_file)
}
