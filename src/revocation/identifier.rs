//! Certificate identity as revocation data sees it.

use std::collections::HashMap;

use crate::signatures::{strip_leading_zeros, CertificateToken, CryptoProvider, DigestAlgorithm};

const CERT_ID_DIGESTS: [DigestAlgorithm; 4] = [
    DigestAlgorithm::Sha1,
    DigestAlgorithm::Sha256,
    DigestAlgorithm::Sha384,
    DigestAlgorithm::Sha512,
];

/// Serial number plus issuer name and key hashes of a certificate.
///
/// OCSP `CertID`s may use any hash algorithm, so the hashes are computed
/// up front for every supported one; matching is then a pure comparison.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevocationIdentifier {
    serial: Vec<u8>,
    issuer_name: Vec<u8>,
    hashes: HashMap<DigestAlgorithm, (Vec<u8>, Vec<u8>)>,
}

impl RevocationIdentifier {
    /// Identify `cert` as issued by `issuer`.
    pub fn for_certificate(cert: &CertificateToken, issuer: &CertificateToken, crypto: &dyn CryptoProvider) -> Self {
        Self::new(&cert.serial, &cert.issuer_raw, &issuer.public_key_bits, crypto)
    }

    /// Build from raw parts: the certificate serial, the DER issuer name
    /// and the issuer's subjectPublicKey bits.
    pub fn new(serial: &[u8], issuer_name: &[u8], issuer_key_bits: &[u8], crypto: &dyn CryptoProvider) -> Self {
        let hashes = CERT_ID_DIGESTS
            .into_iter()
            .map(|alg| (alg, (crypto.digest(alg, issuer_name), crypto.digest(alg, issuer_key_bits))))
            .collect();
        Self {
            serial: strip_leading_zeros(serial).to_vec(),
            issuer_name: issuer_name.to_vec(),
            hashes,
        }
    }

    /// Serial number, leading zeros stripped.
    pub fn serial(&self) -> &[u8] {
        &self.serial
    }

    /// Hash of the issuer's DER name under `algorithm`.
    pub fn issuer_name_hash(&self, algorithm: DigestAlgorithm) -> Option<&[u8]> {
        self.hashes.get(&algorithm).map(|(name, _)| name.as_slice())
    }

    /// Whether an OCSP `CertID` names this certificate.
    pub fn matches_cert_id(
        &self,
        algorithm: DigestAlgorithm,
        issuer_name_hash: &[u8],
        issuer_key_hash: &[u8],
        serial: &[u8],
    ) -> bool {
        let Some((name, key)) = self.hashes.get(&algorithm) else {
            return false;
        };
        self.serial == strip_leading_zeros(serial) && name == issuer_name_hash && key == issuer_key_hash
    }

    /// Whether a CRL issued under `issuer_raw` can speak for this certificate.
    pub fn matches_crl_issuer(&self, issuer_raw: &[u8]) -> bool {
        self.issuer_name == issuer_raw
    }

    /// Whether `serial` is this certificate's serial.
    pub fn matches_serial(&self, serial: &[u8]) -> bool {
        self.serial == strip_leading_zeros(serial)
    }
}
