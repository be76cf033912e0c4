//! Offline revocation data: OCSP responses and CRLs found in `/DSS`
//! dictionaries and CMS payloads, and selection of the most recent one
//! that applies to a certificate.
//!
//! Fetching revocation data over the network is out of scope; everything
//! here works on bytes that were already embedded in the document.

mod crl;
mod identifier;
mod ocsp;
mod selector;
mod source;
mod token;

pub use crl::{CrlResponse, RevokedEntry};
pub use identifier::RevocationIdentifier;
pub use ocsp::{OcspEntry, OcspResponse};
pub use selector::{select_best, RevocationResponse};
pub use source::{OfflineCrlSource, OfflineOcspSource, RevocationSource};
pub use token::{CertificateStatus, RevocationKind, RevocationReason, RevocationToken};

use chrono::{DateTime, Utc};

use crate::error::{Error, Result};

pub(crate) fn utc_from_unix(duration: std::time::Duration) -> Result<DateTime<Utc>> {
    let secs = i64::try_from(duration.as_secs()).map_err(|_| Error::Revocation("time out of range".to_string()))?;
    DateTime::from_timestamp(secs, duration.subsec_nanos())
        .ok_or_else(|| Error::Revocation("time out of range".to_string()))
}
