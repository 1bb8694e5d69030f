use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use x509_parser::{parse_x509_crl, pem::parse_x509_pem, time::ASN1Time};

use super::errors::{FetchError, FetchResult};
use super::types::{CrlDocument, CrlEncoding};

pub const PEM_CRL_HEADER: &[u8] = b"-----BEGIN X509 CRL-----";
const PEM_CRL_LABEL: &str = "X509 CRL";

/// Reports whether `data` is a PEM envelope around a CRL.
pub fn is_pem(data: &[u8]) -> bool {
    data.starts_with(PEM_CRL_HEADER)
}

/// Unwraps the first PEM block of `data`, which must be labelled `X509 CRL`.
pub fn pem_to_der(data: &[u8]) -> FetchResult<Vec<u8>> {
    let (_, pem) = parse_x509_pem(data)
        .map_err(|e| FetchError::Decode(format!("cannot convert crl from pem to der: {e}")))?;

    if pem.label != PEM_CRL_LABEL {
        return Err(FetchError::Decode(format!(
            "failed to decode PEM block containing X.509 CRL (found {:?})",
            pem.label
        )));
    }

    Ok(pem.contents)
}

fn asn1_time_to_utc(time: ASN1Time) -> FetchResult<DateTime<Utc>> {
    DateTime::from_timestamp(time.timestamp(), 0)
        .ok_or_else(|| FetchError::Decode(format!("crl time out of range: {time}")))
}

/// Normalizes `body` to DER, parses it, and checks it is usable at `now`.
///
/// Expiry ("next update" already passed) is always enforced. With `strict`
/// set, a CRL whose "this update" lies in the future is refused as well.
pub fn validate_crl(body: &[u8], now: DateTime<Utc>, strict: bool) -> FetchResult<CrlDocument> {
    let (der, encoding) = if is_pem(body) {
        (pem_to_der(body)?, CrlEncoding::Pem)
    } else {
        (body.to_vec(), CrlEncoding::Der)
    };

    let (rest, crl) = parse_x509_crl(&der)
        .map_err(|e| FetchError::Decode(format!("cannot parse crl: {e}")))?;
    if !rest.is_empty() {
        return Err(FetchError::Decode(format!(
            "cannot parse crl: {} bytes of trailing data",
            rest.len()
        )));
    }

    if strict {
        let this_update = asn1_time_to_utc(crl.last_update())?;
        if this_update > now {
            warn!("CRL thisUpdate is in the future: {this_update} (current time: {now})");
            return Err(FetchError::NotYetValid(this_update.to_rfc3339()));
        }
    }

    // Without nextUpdate there is no point in time the CRL is known to be
    // current at, so it counts as expired.
    let Some(next_update) = crl.next_update() else {
        debug!("CRL from {} carries no nextUpdate", crl.issuer());
        return Err(FetchError::Expired("missing".to_string()));
    };
    let next_update = asn1_time_to_utc(next_update)?;
    if next_update <= now {
        return Err(FetchError::Expired(next_update.to_rfc3339()));
    }

    Ok(CrlDocument::new(der, encoding, next_update))
}
