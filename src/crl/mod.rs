//! Certificate Revocation List fetching and validation
//!
//! A CRL is downloaded from its distribution point, unwrapped from PEM when
//! needed, parsed, and refused if it already expired. Only the DER form ever
//! leaves this module.

mod errors;
mod fetcher;
mod types;
mod validation;

pub use errors::{FetchError, FetchResult};
pub use fetcher::{CrlFetcher, DEFAULT_FETCH_TIMEOUT};
pub use types::{CrlDocument, CrlEncoding, CrlSource};
pub use validation::{PEM_CRL_HEADER, is_pem, pem_to_der, validate_crl};
