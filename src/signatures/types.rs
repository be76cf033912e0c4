//! Algorithm identifiers and small value types shared by the signature layer.

use der::asn1::ObjectIdentifier;
use serde::Serialize;

const OID_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.14.3.2.26");
const OID_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.1");
const OID_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.2");
const OID_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("2.16.840.1.101.3.4.2.3");

const OID_RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const OID_SHA1_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.5");
const OID_SHA256_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.11");
const OID_SHA384_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.12");
const OID_SHA512_WITH_RSA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.13");
const OID_EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const OID_ECDSA_WITH_SHA1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.1");
const OID_ECDSA_WITH_SHA256: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.2");
const OID_ECDSA_WITH_SHA384: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.3");
const OID_ECDSA_WITH_SHA512: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.4.3.4");

/// Digest algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub enum DigestAlgorithm {
    /// SHA-1 (deprecated, but still common in legacy PDFs and OCSP CertIDs)
    Sha1,
    /// SHA-256
    #[default]
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
}

impl DigestAlgorithm {
    /// Object identifier of this algorithm.
    pub fn oid(&self) -> ObjectIdentifier {
        match self {
            DigestAlgorithm::Sha1 => OID_SHA1,
            DigestAlgorithm::Sha256 => OID_SHA256,
            DigestAlgorithm::Sha384 => OID_SHA384,
            DigestAlgorithm::Sha512 => OID_SHA512,
        }
    }

    /// Look up an algorithm by object identifier.
    pub fn from_oid(oid: &ObjectIdentifier) -> Option<Self> {
        [Self::Sha1, Self::Sha256, Self::Sha384, Self::Sha512]
            .into_iter()
            .find(|alg| alg.oid() == *oid)
    }

    /// Get the name of this algorithm.
    pub fn name(&self) -> &'static str {
        match self {
            DigestAlgorithm::Sha1 => "SHA-1",
            DigestAlgorithm::Sha256 => "SHA-256",
            DigestAlgorithm::Sha384 => "SHA-384",
            DigestAlgorithm::Sha512 => "SHA-512",
        }
    }

    /// Digest length in bytes.
    pub fn output_len(&self) -> usize {
        match self {
            DigestAlgorithm::Sha1 => 20,
            DigestAlgorithm::Sha256 => 32,
            DigestAlgorithm::Sha384 => 48,
            DigestAlgorithm::Sha512 => 64,
        }
    }
}

/// Public-key algorithm family of a signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum EncryptionAlgorithm {
    /// RSA PKCS#1 v1.5
    Rsa,
    /// ECDSA
    Ecdsa,
}

/// Signature algorithm: key family plus digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SignatureAlgorithm {
    /// Key family
    pub encryption: EncryptionAlgorithm,
    /// Digest applied to the signed bytes
    pub digest: DigestAlgorithm,
}

impl SignatureAlgorithm {
    /// Build a signature algorithm directly.
    pub fn new(encryption: EncryptionAlgorithm, digest: DigestAlgorithm) -> Self {
        Self { encryption, digest }
    }

    /// Parse a signature algorithm OID.
    ///
    /// Bare key OIDs (`rsaEncryption`, `id-ecPublicKey`), which CMS signer
    /// infos commonly carry, take their digest from `digest_hint`.
    pub fn from_oid(oid: &ObjectIdentifier, digest_hint: Option<DigestAlgorithm>) -> Option<Self> {
        use DigestAlgorithm::*;
        use EncryptionAlgorithm::*;
        let (encryption, digest) = match *oid {
            OID_RSA_ENCRYPTION => (Rsa, digest_hint?),
            OID_SHA1_WITH_RSA => (Rsa, Sha1),
            OID_SHA256_WITH_RSA => (Rsa, Sha256),
            OID_SHA384_WITH_RSA => (Rsa, Sha384),
            OID_SHA512_WITH_RSA => (Rsa, Sha512),
            OID_EC_PUBLIC_KEY => (Ecdsa, digest_hint?),
            OID_ECDSA_WITH_SHA1 => (Ecdsa, Sha1),
            OID_ECDSA_WITH_SHA256 => (Ecdsa, Sha256),
            OID_ECDSA_WITH_SHA384 => (Ecdsa, Sha384),
            OID_ECDSA_WITH_SHA512 => (Ecdsa, Sha512),
            _ => return None,
        };
        Some(Self { encryption, digest })
    }

    /// Parse a dotted-decimal OID string.
    pub fn from_oid_str(oid: &str, digest_hint: Option<DigestAlgorithm>) -> Option<Self> {
        let oid = ObjectIdentifier::new(oid).ok()?;
        Self::from_oid(&oid, digest_hint)
    }
}

impl std::fmt::Display for SignatureAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let family = match self.encryption {
            EncryptionAlgorithm::Rsa => "RSA",
            EncryptionAlgorithm::Ecdsa => "ECDSA",
        };
        write!(f, "{}with{}", self.digest.name().replace('-', ""), family)
    }
}

/// Signature sub-filter, the type discriminator of a signature dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum SignatureSubFilter {
    /// adbe.pkcs7.detached
    Pkcs7Detached,
    /// adbe.pkcs7.sha1
    Pkcs7Sha1,
    /// ETSI.CAdES.detached
    CadesDetached,
    /// ETSI.RFC3161, a document timestamp
    Rfc3161,
    /// Any other value; treated as a signature
    Other(String),
}

impl SignatureSubFilter {
    /// Get the PDF name for this sub-filter.
    pub fn as_pdf_name(&self) -> &str {
        match self {
            SignatureSubFilter::Pkcs7Detached => "adbe.pkcs7.detached",
            SignatureSubFilter::Pkcs7Sha1 => "adbe.pkcs7.sha1",
            SignatureSubFilter::CadesDetached => "ETSI.CAdES.detached",
            SignatureSubFilter::Rfc3161 => "ETSI.RFC3161",
            SignatureSubFilter::Other(name) => name,
        }
    }

    /// Parse a PDF name. Blank names yield `None`.
    pub fn from_pdf_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }
        Some(match name {
            "adbe.pkcs7.detached" => SignatureSubFilter::Pkcs7Detached,
            "adbe.pkcs7.sha1" => SignatureSubFilter::Pkcs7Sha1,
            "ETSI.CAdES.detached" => SignatureSubFilter::CadesDetached,
            "ETSI.RFC3161" => SignatureSubFilter::Rfc3161,
            other => SignatureSubFilter::Other(other.to_string()),
        })
    }

    /// Whether this sub-filter denotes a document timestamp.
    pub fn is_timestamp(&self) -> bool {
        matches!(self, SignatureSubFilter::Rfc3161)
    }
}

/// Role of a document timestamp.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum TimestampType {
    /// Covers signatures only; no validation data existed yet
    SignatureTimestamp,
    /// Covers a revision that already held a `/DSS` dictionary
    ArchiveTimestamp,
}

/// Outcome of an integrity check. Every field is independent of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct VerificationResult {
    /// The signed byte range could be read from the revision
    pub reference_data_found: bool,
    /// The digest of the signed bytes matches the digest the payload asserts
    pub reference_data_intact: bool,
    /// The payload's own signature verifies against the signer's key
    pub signature_intact: bool,
}

impl VerificationResult {
    /// All three checks passed.
    pub fn is_valid(&self) -> bool {
        self.reference_data_found && self.reference_data_intact && self.signature_intact
    }
}
