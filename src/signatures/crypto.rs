//! Digest and signature primitives behind a replaceable provider.

use der::Decode;
use pkcs1::DecodeRsaPublicKey;
use pkcs8::DecodePublicKey;
use rsa::pkcs1v15::{Signature, VerifyingKey};
use rsa::RsaPublicKey;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha384, Sha512};
use signature::hazmat::PrehashVerifier;
use signature::Verifier;
use spki::SubjectPublicKeyInfoRef;

use super::types::{DigestAlgorithm, EncryptionAlgorithm, SignatureAlgorithm};

/// Cryptographic operations needed by integrity checks and revocation matching.
///
/// Implementations must be usable from several threads since a frozen
/// attestation graph may be shared.
pub trait CryptoProvider: Send + Sync {
    /// Hash `data` with `algorithm`.
    fn digest(&self, algorithm: DigestAlgorithm, data: &[u8]) -> Vec<u8>;

    /// Verify `signature` over `signed` with the key in `spki_der`
    /// (a DER `SubjectPublicKeyInfo`). Any failure is reported as `false`.
    fn verify_signature(
        &self,
        algorithm: SignatureAlgorithm,
        spki_der: &[u8],
        signed: &[u8],
        signature: &[u8],
    ) -> bool;
}

/// RustCrypto-backed provider: SHA-1/2 digests, RSA PKCS#1 v1.5 and
/// ECDSA over P-256 or P-384.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCryptoProvider;

impl DefaultCryptoProvider {
    fn rsa_key(spki_der: &[u8]) -> Option<RsaPublicKey> {
        if let Ok(key) = RsaPublicKey::from_public_key_der(spki_der) {
            return Some(key);
        }
        // Some producers embed a bare PKCS#1 key in the SPKI bit string.
        let spki = SubjectPublicKeyInfoRef::from_der(spki_der).ok()?;
        RsaPublicKey::from_pkcs1_der(spki.subject_public_key.raw_bytes()).ok()
    }

    fn verify_rsa(digest: DigestAlgorithm, key: RsaPublicKey, signed: &[u8], signature: &[u8]) -> bool {
        let Ok(signature) = Signature::try_from(signature) else {
            return false;
        };
        match digest {
            DigestAlgorithm::Sha1 => VerifyingKey::<Sha1>::new(key).verify(signed, &signature).is_ok(),
            DigestAlgorithm::Sha256 => VerifyingKey::<Sha256>::new(key).verify(signed, &signature).is_ok(),
            DigestAlgorithm::Sha384 => VerifyingKey::<Sha384>::new(key).verify(signed, &signature).is_ok(),
            DigestAlgorithm::Sha512 => VerifyingKey::<Sha512>::new(key).verify(signed, &signature).is_ok(),
        }
    }

    /// `signature` is DER `ECDSA-Sig-Value`; the curve follows from the
    /// length of the SEC1 point.
    fn verify_ecdsa(&self, digest: DigestAlgorithm, spki_der: &[u8], signed: &[u8], signature: &[u8]) -> bool {
        let Ok(spki) = SubjectPublicKeyInfoRef::from_der(spki_der) else {
            return false;
        };
        let point = spki.subject_public_key.raw_bytes();
        // The signature covers the hash, so verify against the prehash.
        let prehash = self.digest(digest, signed);

        if let Ok(key) = p256::ecdsa::VerifyingKey::from_sec1_bytes(point) {
            return p256::ecdsa::Signature::from_der(signature)
                .map(|sig| key.verify_prehash(&prehash, &sig).is_ok())
                .unwrap_or(false);
        }
        if let Ok(key) = p384::ecdsa::VerifyingKey::from_sec1_bytes(point) {
            return p384::ecdsa::Signature::from_der(signature)
                .map(|sig| key.verify_prehash(&prehash, &sig).is_ok())
                .unwrap_or(false);
        }
        log::debug!("signer key is not a P-256 or P-384 point");
        false
    }
}

impl CryptoProvider for DefaultCryptoProvider {
    fn digest(&self, algorithm: DigestAlgorithm, data: &[u8]) -> Vec<u8> {
        match algorithm {
            DigestAlgorithm::Sha1 => Sha1::digest(data).to_vec(),
            DigestAlgorithm::Sha256 => Sha256::digest(data).to_vec(),
            DigestAlgorithm::Sha384 => Sha384::digest(data).to_vec(),
            DigestAlgorithm::Sha512 => Sha512::digest(data).to_vec(),
        }
    }

    fn verify_signature(
        &self,
        algorithm: SignatureAlgorithm,
        spki_der: &[u8],
        signed: &[u8],
        signature: &[u8],
    ) -> bool {
        match algorithm.encryption {
            EncryptionAlgorithm::Rsa => match Self::rsa_key(spki_der) {
                Some(key) => Self::verify_rsa(algorithm.digest, key, signed, signature),
                None => {
                    log::debug!("signer key is not a readable RSA public key");
                    false
                },
            },
            EncryptionAlgorithm::Ecdsa => self.verify_ecdsa(algorithm.digest, spki_der, signed, signature),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_lengths() {
        let provider = DefaultCryptoProvider;
        for alg in [
            DigestAlgorithm::Sha1,
            DigestAlgorithm::Sha256,
            DigestAlgorithm::Sha384,
            DigestAlgorithm::Sha512,
        ] {
            assert_eq!(provider.digest(alg, b"abc").len(), alg.output_len());
        }
    }

    #[test]
    fn test_sha256_known_value() {
        let digest = DefaultCryptoProvider.digest(DigestAlgorithm::Sha256, b"abc");
        assert_eq!(
            &digest[..4],
            &[0xba, 0x78, 0x16, 0xbf],
            "SHA-256(\"abc\") starts with ba7816bf"
        );
    }

    #[test]
    fn test_garbage_key_does_not_verify() {
        let alg = SignatureAlgorithm::new(EncryptionAlgorithm::Rsa, DigestAlgorithm::Sha256);
        assert!(!DefaultCryptoProvider.verify_signature(alg, b"\x30\x00", b"data", b"sig"));
    }

    #[test]
    fn test_ecdsa_garbage_key_does_not_verify() {
        let alg = SignatureAlgorithm::new(EncryptionAlgorithm::Ecdsa, DigestAlgorithm::Sha256);
        assert!(!DefaultCryptoProvider.verify_signature(alg, &[], b"data", b"sig"));
    }

    #[test]
    fn test_ecdsa_p256() {
        use p256::ecdsa::SigningKey;
        use p256::pkcs8::EncodePublicKey;
        use signature::Signer;

        let key = SigningKey::from_slice(&[0x11; 32]).unwrap();
        let spki = key.verifying_key().to_public_key_der().unwrap();
        let sig: p256::ecdsa::Signature = key.sign(b"signed attributes");
        let der = sig.to_der();
        let alg = SignatureAlgorithm::new(EncryptionAlgorithm::Ecdsa, DigestAlgorithm::Sha256);

        assert!(DefaultCryptoProvider.verify_signature(alg, spki.as_bytes(), b"signed attributes", der.as_bytes()));
        assert!(!DefaultCryptoProvider.verify_signature(alg, spki.as_bytes(), b"signed attributeS", der.as_bytes()));
    }

    #[test]
    fn test_ecdsa_p384() {
        use p384::ecdsa::SigningKey;
        use p384::pkcs8::EncodePublicKey;
        use signature::hazmat::PrehashSigner;

        let key = SigningKey::from_slice(&[0x22; 48]).unwrap();
        let spki = key.verifying_key().to_public_key_der().unwrap();
        let prehash = DefaultCryptoProvider.digest(DigestAlgorithm::Sha384, b"tst info");
        let sig: p384::ecdsa::Signature = key.sign_prehash(&prehash).unwrap();
        let der = sig.to_der();
        let alg = SignatureAlgorithm::new(EncryptionAlgorithm::Ecdsa, DigestAlgorithm::Sha384);

        assert!(DefaultCryptoProvider.verify_signature(alg, spki.as_bytes(), b"tst info", der.as_bytes()));
        let wrong = SignatureAlgorithm::new(EncryptionAlgorithm::Ecdsa, DigestAlgorithm::Sha256);
        assert!(!DefaultCryptoProvider.verify_signature(wrong, spki.as_bytes(), b"tst info", der.as_bytes()));
    }
}
