use std::time::Duration;

use chrono::{DateTime, Utc};

/// A configured CRL distribution point and where its CRL must land.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrlSource {
    pub url: String,
    /// Logical name, also the prefix of every uploaded artifact.
    pub name: String,
    /// Client-SSL profile whose CRL reference gets replaced.
    pub profile_name: String,
    pub refresh_interval: Duration,
    /// Enables the stricter freshness checks on top of parsing and expiry.
    pub validate: bool,
}

/// Encoding the distribution point served the CRL in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrlEncoding {
    Pem,
    Der,
}

/// A fetched CRL that passed validation.
///
/// The bytes are always DER, whatever the distribution point served.
#[derive(Debug, Clone)]
pub struct CrlDocument {
    der: Vec<u8>,
    source_encoding: CrlEncoding,
    next_update: DateTime<Utc>,
}

impl CrlDocument {
    pub(crate) fn new(
        der: Vec<u8>,
        source_encoding: CrlEncoding,
        next_update: DateTime<Utc>,
    ) -> Self {
        Self {
            der,
            source_encoding,
            next_update,
        }
    }

    pub fn der(&self) -> &[u8] {
        &self.der
    }

    pub fn source_encoding(&self) -> CrlEncoding {
        self.source_encoding
    }

    /// The CRL's "next update" time, always in the future at validation.
    pub fn next_update(&self) -> DateTime<Utc> {
        self.next_update
    }
}
