//! CMS (PKCS#7) payload decoding.
//!
//! Both PDF signatures and RFC 3161 document timestamps carry a DER
//! `ContentInfo` wrapping `SignedData` in their `/Contents` string. The
//! string is zero-padded to the size reserved when the slot was written,
//! so decoding stops at the end of the outer DER value.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use cms::cert::CertificateChoices;
use cms::content_info::ContentInfo;
use cms::revocation::RevocationInfoChoice;
use cms::signed_data::{SignedData, SignerIdentifier, SignerInfo};
use der::asn1::{GeneralizedTime, ObjectIdentifier, OctetString, UtcTime};
use der::{Any, Decode, Encode, SliceReader, Tag, Tagged};
use x509_tsp::TstInfo;

use super::certificate::{strip_leading_zeros, CertificateToken};
use super::types::{DigestAlgorithm, SignatureAlgorithm};
use crate::error::{Error, Result};

const OID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
const OID_TST_INFO: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.1.4");
const OID_MESSAGE_DIGEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");
const OID_SIGNING_TIME: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.5");
const OID_OCSP_RESPONSE_FORMAT: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.6.1.5.5.7.16.2");

/// Token details of an RFC 3161 timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampInfo {
    /// `genTime`
    pub gen_time: DateTime<Utc>,
    /// `messageImprint.hashedMessage`
    pub imprint: Vec<u8>,
    /// `messageImprint.hashAlgorithm`, when recognised
    pub imprint_algorithm: Option<DigestAlgorithm>,
}

/// What discovery and integrity checks need from a decoded payload.
#[derive(Debug, Clone, Default)]
pub struct SignedContent {
    /// Every certificate in `SignedData.certificates`
    pub certificates: Vec<CertificateToken>,
    /// Certificate named by the first signer info
    pub signing_certificate: Option<CertificateToken>,
    /// `signingTime` signed attribute
    pub signing_time: Option<DateTime<Utc>>,
    /// Signer info digest algorithm
    pub digest_algorithm: Option<DigestAlgorithm>,
    /// `messageDigest` signed attribute
    pub asserted_digest: Option<Vec<u8>>,
    /// DER `SET OF` encoding of the signed attributes
    pub signed_attributes: Option<Vec<u8>>,
    /// Signer info signature value
    pub signature_value: Vec<u8>,
    /// Signer info signature algorithm
    pub signature_algorithm: Option<SignatureAlgorithm>,
    /// Present when the encapsulated content is a `TSTInfo`
    pub timestamp: Option<TimestampInfo>,
    /// CRLs carried in `SignedData.crls`
    pub crls: Vec<Bytes>,
    /// OCSP responses carried in `SignedData.crls` as other revocation info
    pub ocsps: Vec<Bytes>,
}

/// Decodes an attestation's `/Contents` payload.
pub trait CmsParser: Send + Sync {
    /// Decode one payload.
    fn parse(&self, payload: &[u8]) -> Result<SignedContent>;
}

/// `cms`/`x509-tsp` backed parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct DerCmsParser;

impl CmsParser for DerCmsParser {
    fn parse(&self, payload: &[u8]) -> Result<SignedContent> {
        let mut reader = SliceReader::new(payload)?;
        let content_info = ContentInfo::decode(&mut reader)?;
        if content_info.content_type != OID_SIGNED_DATA {
            return Err(Error::Cms(format!(
                "expected SignedData content, found {}",
                content_info.content_type
            )));
        }
        let signed_data = content_info.content.decode_as::<SignedData>()?;

        let certificates = read_certificates(&signed_data);
        let (crls, ocsps) = read_revocation_values(&signed_data);
        let timestamp = read_tst_info(&signed_data)?;

        let mut content = SignedContent {
            certificates,
            timestamp,
            crls,
            ocsps,
            ..SignedContent::default()
        };

        let Some(signer_info) = signed_data.signer_infos.0.iter().next() else {
            log::warn!("SignedData without signer info");
            return Ok(content);
        };
        read_signer_info(signer_info, &mut content)?;
        Ok(content)
    }
}

fn read_certificates(signed_data: &SignedData) -> Vec<CertificateToken> {
    let Some(set) = signed_data.certificates.as_ref() else {
        return Vec::new();
    };
    set.0
        .iter()
        .filter_map(|choice| match choice {
            CertificateChoices::Certificate(cert) => cert.to_der().ok(),
            _ => None,
        })
        .filter_map(|der| match CertificateToken::from_der(der) {
            Ok(token) => Some(token),
            Err(e) => {
                log::warn!("skipping unreadable embedded certificate: {}", e);
                None
            },
        })
        .collect()
}

fn read_revocation_values(signed_data: &SignedData) -> (Vec<Bytes>, Vec<Bytes>) {
    let mut crls = Vec::new();
    let mut ocsps = Vec::new();
    let Some(choices) = signed_data.crls.as_ref() else {
        return (crls, ocsps);
    };
    for choice in choices.0.iter() {
        match choice {
            RevocationInfoChoice::Crl(crl) => {
                if let Ok(der) = crl.to_der() {
                    crls.push(Bytes::from(der));
                }
            },
            RevocationInfoChoice::Other(other) if other.other_format.oid == OID_OCSP_RESPONSE_FORMAT => {
                if let Ok(der) = other.other.to_der() {
                    ocsps.push(Bytes::from(der));
                }
            },
            RevocationInfoChoice::Other(other) => {
                log::debug!("ignoring revocation info of format {}", other.other_format.oid);
            },
        }
    }
    (crls, ocsps)
}

fn read_tst_info(signed_data: &SignedData) -> Result<Option<TimestampInfo>> {
    let encap = &signed_data.encap_content_info;
    if encap.econtent_type != OID_TST_INFO {
        return Ok(None);
    }
    let econtent = encap
        .econtent
        .as_ref()
        .ok_or_else(|| Error::Cms("timestamp token without TSTInfo content".to_string()))?;
    let octets = econtent.decode_as::<OctetString>()?;
    let tst_info = TstInfo::from_der(octets.as_bytes())?;

    Ok(Some(TimestampInfo {
        gen_time: unix_time(tst_info.gen_time.to_unix_duration())?,
        imprint: tst_info.message_imprint.hashed_message.as_bytes().to_vec(),
        imprint_algorithm: DigestAlgorithm::from_oid(&tst_info.message_imprint.hash_algorithm.oid),
    }))
}

fn read_signer_info(signer_info: &SignerInfo, content: &mut SignedContent) -> Result<()> {
    let digest_algorithm = DigestAlgorithm::from_oid(&signer_info.digest_alg.oid);
    if digest_algorithm.is_none() {
        log::warn!("unsupported digest algorithm {}", signer_info.digest_alg.oid);
    }
    content.digest_algorithm = digest_algorithm;
    content.signature_algorithm =
        SignatureAlgorithm::from_oid(&signer_info.signature_algorithm.oid, digest_algorithm);
    content.signature_value = signer_info.signature.as_bytes().to_vec();

    if let Some(attrs) = signer_info.signed_attrs.as_ref() {
        content.signed_attributes = Some(attrs.to_der()?);
        for attr in attrs.iter() {
            let Some(value) = attr.values.iter().next() else {
                continue;
            };
            if attr.oid == OID_MESSAGE_DIGEST {
                content.asserted_digest = Some(value.decode_as::<OctetString>()?.as_bytes().to_vec());
            } else if attr.oid == OID_SIGNING_TIME {
                content.signing_time = decode_time(value).ok();
            }
        }
    }

    content.signing_certificate = match &signer_info.sid {
        SignerIdentifier::IssuerAndSerialNumber(issuer_serial) => {
            let issuer = issuer_serial.issuer.to_der()?;
            let serial = strip_leading_zeros(issuer_serial.serial_number.as_bytes());
            content
                .certificates
                .iter()
                .find(|cert| cert.issuer_raw == issuer && cert.serial == serial)
                .cloned()
        },
        SignerIdentifier::SubjectKeyIdentifier(key_id) => content
            .certificates
            .iter()
            .find(|cert| cert.has_subject_key_id(key_id.0.as_bytes()))
            .cloned(),
    }
    .or_else(|| {
        log::debug!("signer identifier matches no embedded certificate, using the first one");
        content.certificates.first().cloned()
    });
    Ok(())
}

fn decode_time(value: &Any) -> Result<DateTime<Utc>> {
    let duration = match value.tag() {
        Tag::UtcTime => value.decode_as::<UtcTime>()?.to_unix_duration(),
        Tag::GeneralizedTime => value.decode_as::<GeneralizedTime>()?.to_unix_duration(),
        other => return Err(Error::Cms(format!("unexpected time tag {}", other))),
    };
    unix_time(duration)
}

fn unix_time(duration: std::time::Duration) -> Result<DateTime<Utc>> {
    let secs = i64::try_from(duration.as_secs()).map_err(|_| Error::Cms("time out of range".to_string()))?;
    DateTime::from_timestamp(secs, duration.subsec_nanos()).ok_or_else(|| Error::Cms("time out of range".to_string()))
}
