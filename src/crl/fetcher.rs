use std::time::Duration;

use chrono::Utc;
use reqwest::Client;
use tracing::{debug, info};

use super::errors::{FetchError, FetchResult};
use super::types::CrlDocument;
use super::validation::validate_crl;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

/// Downloads CRLs from distribution points and validates them.
#[derive(Debug, Clone)]
pub struct CrlFetcher {
    http_client: Client,
}

impl CrlFetcher {
    /// Create a fetcher whose requests give up after `request_timeout`.
    pub fn new(request_timeout: Duration) -> FetchResult<Self> {
        let http_client = Client::builder()
            .timeout(request_timeout)
            .user_agent(concat!("crl-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http_client })
    }

    /// Fetch the CRL at `url` and return it as DER once it passed validation.
    ///
    /// `strict` is the source's `validate` flag, see [`validate_crl`].
    pub async fn fetch(&self, url: &str, strict: bool) -> FetchResult<CrlDocument> {
        debug!("Fetching CRL from: {}", url);

        let response = self.http_client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus(status));
        }

        let body = response.bytes().await?;
        let document = validate_crl(&body, Utc::now(), strict)?;

        info!(
            "Fetched valid CRL from {} ({} bytes, {:?}, next update {})",
            url,
            document.der().len(),
            document.source_encoding(),
            document.next_update()
        );
        Ok(document)
    }
}
