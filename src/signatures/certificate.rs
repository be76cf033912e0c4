//! X.509 certificates embedded in CMS payloads and `/DSS` dictionaries.

use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use x509_parser::extensions::ParsedExtension;
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::error::{Error, Result};

/// The parts of a certificate needed for signer matching, key access and
/// revocation lookups. The raw DER is kept alongside.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertificateToken {
    /// Full DER encoding
    pub der: Bytes,
    /// Serial number, leading zero octets stripped
    pub serial: Vec<u8>,
    /// DER of the issuer Name
    pub issuer_raw: Vec<u8>,
    /// DER of the subject Name
    pub subject_raw: Vec<u8>,
    /// Subject in RFC 4514 text form, for logs
    pub subject: String,
    /// DER `SubjectPublicKeyInfo`
    pub spki_der: Vec<u8>,
    /// Contents of the subjectPublicKey bit string
    pub public_key_bits: Vec<u8>,
    /// Start of validity
    pub not_before: DateTime<Utc>,
    /// End of validity
    pub not_after: DateTime<Utc>,
    /// Subject key identifier extension value
    pub subject_key_id: Option<Vec<u8>>,
}

impl CertificateToken {
    /// Parse a DER certificate.
    pub fn from_der(der: impl Into<Bytes>) -> Result<Self> {
        let der = der.into();
        let (_, cert) = X509Certificate::from_der(&der).map_err(|e| Error::Certificate(e.to_string()))?;

        let validity = cert.validity();
        let subject_key_id = cert.extensions().iter().find_map(|ext| match ext.parsed_extension() {
            ParsedExtension::SubjectKeyIdentifier(id) => Some(id.0.to_vec()),
            _ => None,
        });
        let token = Self {
            serial: strip_leading_zeros(cert.raw_serial()).to_vec(),
            issuer_raw: cert.issuer().as_raw().to_vec(),
            subject_raw: cert.subject().as_raw().to_vec(),
            subject: cert.subject().to_string(),
            spki_der: cert.public_key().raw.to_vec(),
            public_key_bits: cert.public_key().subject_public_key.data.to_vec(),
            not_before: timestamp(validity.not_before.timestamp())?,
            not_after: timestamp(validity.not_after.timestamp())?,
            subject_key_id,
            der: der.clone(),
        };
        Ok(token)
    }

    /// Whether `issuer`'s subject is this certificate's issuer name.
    pub fn is_issued_by(&self, issuer: &CertificateToken) -> bool {
        self.issuer_raw == issuer.subject_raw
    }

    /// Whether the certificate is its own issuer.
    pub fn is_self_issued(&self) -> bool {
        self.issuer_raw == self.subject_raw
    }

    /// Whether the certificate carries `key_id` as its subject key identifier.
    pub fn has_subject_key_id(&self, key_id: &[u8]) -> bool {
        self.subject_key_id.as_deref() == Some(key_id)
    }

    /// Whether `serial` (in any zero-padding) names this certificate.
    pub fn has_serial(&self, serial: &[u8]) -> bool {
        self.serial == strip_leading_zeros(serial)
    }
}

/// Drop the sign-padding octets DER adds to positive integers.
pub fn strip_leading_zeros(bytes: &[u8]) -> &[u8] {
    let start = bytes.iter().position(|b| *b != 0).unwrap_or(bytes.len());
    &bytes[start..]
}

fn timestamp(secs: i64) -> Result<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0)
        .single()
        .ok_or_else(|| Error::Certificate(format!("validity time {} out of range", secs)))
}
