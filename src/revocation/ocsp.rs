//! OCSP responses (RFC 6960 §4.2).

use bytes::Bytes;
use chrono::{DateTime, Utc};
use der::asn1::{BitString, GeneralizedTime, Int, Null, ObjectIdentifier, OctetString};
use der::{Any, Choice, Decode, Enumerated, Sequence};
use spki::AlgorithmIdentifierOwned;

use super::identifier::RevocationIdentifier;
use super::selector::RevocationResponse;
use super::token::{CertificateStatus, RevocationKind, RevocationReason, RevocationToken};
use super::utc_from_unix;
use crate::error::{Error, Result};
use crate::signatures::{strip_leading_zeros, DigestAlgorithm, SignatureAlgorithm};

const OID_PKIX_OCSP_BASIC: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.48.1.1");

#[derive(Clone, Copy, Debug, PartialEq, Eq, Enumerated)]
#[repr(u32)]
enum ResponseStatusDer {
    Successful = 0,
    MalformedRequest = 1,
    InternalError = 2,
    TryLater = 3,
    SigRequired = 5,
    Unauthorized = 6,
}

#[derive(Clone, Debug, Sequence)]
struct OcspResponseDer {
    response_status: ResponseStatusDer,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    response_bytes: Option<ResponseBytesDer>,
}

#[derive(Clone, Debug, Sequence)]
struct ResponseBytesDer {
    response_type: ObjectIdentifier,
    response: OctetString,
}

#[derive(Clone, Debug, Sequence)]
struct BasicOcspResponseDer {
    tbs_response_data: ResponseDataDer,
    signature_algorithm: AlgorithmIdentifierOwned,
    signature: BitString,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    certs: Option<Vec<Any>>,
}

#[derive(Clone, Debug, Sequence)]
struct ResponseDataDer {
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    version: Option<u8>,
    responder_id: Any,
    produced_at: GeneralizedTime,
    responses: Vec<SingleResponseDer>,
    #[asn1(context_specific = "1", tag_mode = "EXPLICIT", optional = "true")]
    response_extensions: Option<Any>,
}

#[derive(Clone, Debug, Sequence)]
struct SingleResponseDer {
    cert_id: CertIdDer,
    cert_status: CertStatusDer,
    this_update: GeneralizedTime,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    next_update: Option<GeneralizedTime>,
    #[asn1(context_specific = "1", tag_mode = "EXPLICIT", optional = "true")]
    single_extensions: Option<Any>,
}

#[derive(Clone, Debug, Sequence)]
struct CertIdDer {
    hash_algorithm: AlgorithmIdentifierOwned,
    issuer_name_hash: OctetString,
    issuer_key_hash: OctetString,
    serial_number: Int,
}

#[derive(Clone, Debug, Choice)]
enum CertStatusDer {
    #[asn1(context_specific = "0", tag_mode = "IMPLICIT")]
    Good(Null),
    #[asn1(context_specific = "1", tag_mode = "IMPLICIT", constructed = "true")]
    Revoked(RevokedInfoDer),
    #[asn1(context_specific = "2", tag_mode = "IMPLICIT")]
    Unknown(Null),
}

#[derive(Clone, Debug, Sequence)]
struct RevokedInfoDer {
    revocation_time: GeneralizedTime,
    #[asn1(context_specific = "0", tag_mode = "EXPLICIT", optional = "true")]
    revocation_reason: Option<CrlReasonDer>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Enumerated)]
#[repr(u32)]
enum CrlReasonDer {
    Unspecified = 0,
    KeyCompromise = 1,
    CaCompromise = 2,
    AffiliationChanged = 3,
    Superseded = 4,
    CessationOfOperation = 5,
    CertificateHold = 6,
    RemoveFromCrl = 8,
    PrivilegeWithdrawn = 9,
    AaCompromise = 10,
}

/// One `SingleResponse`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcspEntry {
    /// CertID hash algorithm, when recognised
    pub hash_algorithm: Option<DigestAlgorithm>,
    /// CertID issuerNameHash
    pub issuer_name_hash: Vec<u8>,
    /// CertID issuerKeyHash
    pub issuer_key_hash: Vec<u8>,
    /// CertID serialNumber, leading zeros stripped
    pub serial: Vec<u8>,
    pub status: CertificateStatus,
    pub this_update: DateTime<Utc>,
    pub next_update: Option<DateTime<Utc>>,
}

/// A decoded basic OCSP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OcspResponse {
    /// `producedAt`
    pub produced_at: DateTime<Utc>,
    /// Dotted OID of the response signature algorithm
    pub signature_algorithm_oid: String,
    /// Every `SingleResponse`, in order
    pub entries: Vec<OcspEntry>,
    /// The bytes this response was decoded from
    pub encoded: Bytes,
}

impl OcspResponse {
    /// Decode an `OCSPResponse`, or a bare `BasicOCSPResponse` as `/DSS`
    /// writers sometimes store.
    pub fn from_der(encoded: Bytes) -> Result<Self> {
        let basic = match OcspResponseDer::from_der(&encoded) {
            Ok(response) => {
                if response.response_status != ResponseStatusDer::Successful {
                    return Err(Error::Revocation(format!(
                        "OCSP response status {:?}",
                        response.response_status
                    )));
                }
                let bytes = response
                    .response_bytes
                    .ok_or_else(|| Error::Revocation("successful OCSP response without body".to_string()))?;
                if bytes.response_type != OID_PKIX_OCSP_BASIC {
                    return Err(Error::Revocation(format!(
                        "unsupported OCSP response type {}",
                        bytes.response_type
                    )));
                }
                BasicOcspResponseDer::from_der(bytes.response.as_bytes())
            },
            Err(_) => BasicOcspResponseDer::from_der(&encoded),
        }
        .map_err(|e| Error::Revocation(e.to_string()))?;

        let data = basic.tbs_response_data;
        let entries = data
            .responses
            .into_iter()
            .map(OcspEntry::try_from)
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            produced_at: utc_from_unix(data.produced_at.to_unix_duration())?,
            signature_algorithm_oid: basic.signature_algorithm.oid.to_string(),
            entries,
            encoded,
        })
    }
}

impl TryFrom<SingleResponseDer> for OcspEntry {
    type Error = Error;

    fn try_from(single: SingleResponseDer) -> Result<Self> {
        let status = match single.cert_status {
            CertStatusDer::Good(_) => CertificateStatus::Good,
            CertStatusDer::Unknown(_) => CertificateStatus::Unknown,
            CertStatusDer::Revoked(info) => CertificateStatus::Revoked {
                reason: info
                    .revocation_reason
                    .and_then(|reason| RevocationReason::from_code(reason as u32)),
                date: utc_from_unix(info.revocation_time.to_unix_duration())?,
            },
        };
        Ok(Self {
            hash_algorithm: DigestAlgorithm::from_oid(&single.cert_id.hash_algorithm.oid),
            issuer_name_hash: single.cert_id.issuer_name_hash.as_bytes().to_vec(),
            issuer_key_hash: single.cert_id.issuer_key_hash.as_bytes().to_vec(),
            serial: strip_leading_zeros(single.cert_id.serial_number.as_bytes()).to_vec(),
            status,
            this_update: utc_from_unix(single.this_update.to_unix_duration())?,
            next_update: single
                .next_update
                .map(|t| utc_from_unix(t.to_unix_duration()))
                .transpose()?,
        })
    }
}

impl OcspEntry {
    fn applies_to(&self, id: &RevocationIdentifier) -> bool {
        match self.hash_algorithm {
            Some(alg) => id.matches_cert_id(alg, &self.issuer_name_hash, &self.issuer_key_hash, &self.serial),
            None => false,
        }
    }
}

impl RevocationResponse for OcspResponse {
    fn signature_algorithm(&self) -> Option<SignatureAlgorithm> {
        SignatureAlgorithm::from_oid_str(&self.signature_algorithm_oid, None)
    }

    fn token_for(&self, id: &RevocationIdentifier) -> Option<RevocationToken> {
        let signature_algorithm = self.signature_algorithm()?;
        let mut best: Option<&OcspEntry> = None;
        for entry in self.entries.iter().filter(|e| e.applies_to(id)) {
            if best.map_or(true, |b| entry.this_update >= b.this_update) {
                best = Some(entry);
            }
        }
        best.map(|entry| RevocationToken {
            kind: RevocationKind::Ocsp,
            produced_at: Some(self.produced_at),
            this_update: entry.this_update,
            next_update: entry.next_update,
            status: entry.status,
            signature_algorithm,
            serial: entry.serial.clone(),
            encoded: self.encoded.clone(),
        })
    }
}
