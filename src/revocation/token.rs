//! Revocation status assertions.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::signatures::SignatureAlgorithm;

/// Where a token came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RevocationKind {
    /// OCSP response
    Ocsp,
    /// Certificate revocation list
    Crl,
}

/// CRLReason (RFC 5280 §5.3.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum RevocationReason {
    Unspecified,
    KeyCompromise,
    CaCompromise,
    AffiliationChanged,
    Superseded,
    CessationOfOperation,
    CertificateHold,
    RemoveFromCrl,
    PrivilegeWithdrawn,
    AaCompromise,
}

impl RevocationReason {
    /// Map a reason code; 7 is unassigned.
    pub fn from_code(code: u32) -> Option<Self> {
        Some(match code {
            0 => Self::Unspecified,
            1 => Self::KeyCompromise,
            2 => Self::CaCompromise,
            3 => Self::AffiliationChanged,
            4 => Self::Superseded,
            5 => Self::CessationOfOperation,
            6 => Self::CertificateHold,
            8 => Self::RemoveFromCrl,
            9 => Self::PrivilegeWithdrawn,
            10 => Self::AaCompromise,
            _ => return None,
        })
    }
}

/// Status of one certificate according to one token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CertificateStatus {
    Good,
    Revoked {
        reason: Option<RevocationReason>,
        date: DateTime<Utc>,
    },
    Unknown,
}

impl CertificateStatus {
    pub fn is_revoked(&self) -> bool {
        matches!(self, CertificateStatus::Revoked { .. })
    }
}

/// One revocation-status assertion about a specific certificate.
///
/// Built once from a decoded response and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationToken {
    /// OCSP or CRL
    pub kind: RevocationKind,
    /// `producedAt` for OCSP; CRLs have none
    pub produced_at: Option<DateTime<Utc>>,
    /// Start of the validity window
    pub this_update: DateTime<Utc>,
    /// End of the validity window, when announced
    pub next_update: Option<DateTime<Utc>>,
    /// Status of the queried certificate
    pub status: CertificateStatus,
    /// Algorithm the response is signed with
    pub signature_algorithm: SignatureAlgorithm,
    /// Serial of the queried certificate, leading zeros stripped
    pub serial: Vec<u8>,
    /// The encoded response the token was read from
    pub encoded: Bytes,
}

impl RevocationToken {
    /// Whether `at` lies inside `[this_update, next_update]`. An open-ended
    /// window only has a lower bound.
    pub fn is_fresh_at(&self, at: DateTime<Utc>) -> bool {
        at >= self.this_update && self.next_update.map_or(true, |next| at <= next)
    }
}
