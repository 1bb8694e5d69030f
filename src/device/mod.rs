//! Device targets that receive CRLs.
//!
//! The push protocol only talks to the [`DeviceTarget`] and [`Transaction`]
//! traits. [`BigIpClient`] implements them over the iControl REST API; tests
//! provide their own doubles.

mod bigip;
mod errors;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use bigip::{AuthMethod, BigIpClient, BigIpConfig};
pub use errors::{DeviceError, DeviceResult};

/// A client-SSL profile as returned by the device.
///
/// Only the CRL reference is interpreted; every other attribute is kept
/// verbatim so that writing the profile back does not lose settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileConfig {
    #[serde(rename = "crlFile", default)]
    pub crl_file: String,
    #[serde(flatten)]
    pub other: Map<String, Value>,
}

impl ProfileConfig {
    pub fn with_crl_file(crl_file: impl Into<String>) -> Self {
        Self {
            crl_file: crl_file.into(),
            other: Map::new(),
        }
    }
}

/// A device-side unit of work; nothing takes effect before [`commit`].
///
/// [`commit`]: Transaction::commit
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transaction: Send {
    async fn upload_file(&mut self, name: &str, contents: &[u8]) -> DeviceResult<()>;

    async fn get_profile(&mut self, profile_name: &str) -> DeviceResult<ProfileConfig>;

    async fn edit_profile(&mut self, profile_name: &str, profile: &ProfileConfig)
    -> DeviceResult<()>;

    async fn commit(&mut self) -> DeviceResult<()>;
}

/// A TLS-terminating device whose client-SSL profiles reference CRLs.
///
/// Handles are shared by every worker, so implementations must be safe to
/// use concurrently.
#[async_trait]
pub trait DeviceTarget: Send + Sync {
    /// Human readable identifier used in log lines.
    fn name(&self) -> &str;

    async fn begin_transaction(&self) -> DeviceResult<Box<dyn Transaction>>;

    /// Read a profile outside of any transaction.
    async fn get_profile(&self, profile_name: &str) -> DeviceResult<ProfileConfig>;
}
