//! Certificate revocation lists (RFC 5280 §5).

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use x509_parser::prelude::FromDer;
use x509_parser::revocation_list::CertificateRevocationList;

use super::identifier::RevocationIdentifier;
use super::selector::RevocationResponse;
use super::token::{CertificateStatus, RevocationKind, RevocationReason, RevocationToken};
use crate::error::{Error, Result};
use crate::signatures::{strip_leading_zeros, SignatureAlgorithm};

/// One revoked serial.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevokedEntry {
    /// Serial, leading zeros stripped
    pub serial: Vec<u8>,
    pub date: DateTime<Utc>,
    pub reason: Option<RevocationReason>,
}

/// A decoded CRL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrlResponse {
    /// DER of the issuer Name
    pub issuer_raw: Vec<u8>,
    /// `thisUpdate`
    pub this_update: DateTime<Utc>,
    /// `nextUpdate`
    pub next_update: Option<DateTime<Utc>>,
    /// Dotted OID of the CRL signature algorithm
    pub signature_algorithm_oid: String,
    pub revoked: Vec<RevokedEntry>,
    /// The bytes this CRL was decoded from
    pub encoded: Bytes,
}

impl CrlResponse {
    /// Decode a DER `CertificateList`.
    pub fn from_der(encoded: Bytes) -> Result<Self> {
        let (_, crl) = CertificateRevocationList::from_der(&encoded).map_err(|e| Error::Revocation(e.to_string()))?;

        let revoked = crl
            .iter_revoked_certificates()
            .map(|entry| {
                Ok(RevokedEntry {
                    serial: strip_leading_zeros(entry.raw_serial()).to_vec(),
                    date: utc(entry.revocation_date.timestamp())?,
                    reason: entry
                        .reason_code()
                        .and_then(|(_, code)| RevocationReason::from_code(u32::from(code.0))),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            issuer_raw: crl.issuer().as_raw().to_vec(),
            this_update: utc(crl.last_update().timestamp())?,
            next_update: crl.next_update().map(|t| utc(t.timestamp())).transpose()?,
            signature_algorithm_oid: crl.signature_algorithm.algorithm.to_id_string(),
            revoked,
            encoded,
        })
    }
}

fn utc(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| Error::Revocation(format!("CRL time {} out of range", secs)))
}

impl RevocationResponse for CrlResponse {
    fn signature_algorithm(&self) -> Option<SignatureAlgorithm> {
        SignatureAlgorithm::from_oid_str(&self.signature_algorithm_oid, None)
    }

    fn token_for(&self, id: &RevocationIdentifier) -> Option<RevocationToken> {
        if !id.matches_crl_issuer(&self.issuer_raw) {
            return None;
        }
        let signature_algorithm = self.signature_algorithm()?;
        let status = match self.revoked.iter().find(|entry| id.matches_serial(&entry.serial)) {
            Some(entry) => CertificateStatus::Revoked {
                reason: entry.reason,
                date: entry.date,
            },
            None => CertificateStatus::Good,
        };
        Some(RevocationToken {
            kind: RevocationKind::Crl,
            produced_at: None,
            this_update: self.this_update,
            next_update: self.next_update,
            status,
            signature_algorithm,
            serial: id.serial().to_vec(),
            encoded: self.encoded.clone(),
        })
    }
}
