//! "Latest applicable" selection among revocation candidates.

use super::identifier::RevocationIdentifier;
use super::token::RevocationToken;
use crate::signatures::SignatureAlgorithm;

/// A decoded OCSP response or CRL that can speak for some certificates.
pub trait RevocationResponse {
    /// Algorithm the response is signed with; `None` when unrecognised.
    fn signature_algorithm(&self) -> Option<SignatureAlgorithm>;

    /// The status this response asserts for `id`, if it covers it.
    fn token_for(&self, id: &RevocationIdentifier) -> Option<RevocationToken>;
}

/// Pick the applicable token with the latest `thisUpdate`.
///
/// Candidates that do not cover `id` are ignored whatever their age, and a
/// candidate whose signature algorithm cannot be parsed is skipped without
/// affecting the others. On equal `thisUpdate` the later candidate wins.
pub fn select_best<'a, R>(candidates: impl IntoIterator<Item = &'a R>, id: &RevocationIdentifier) -> Option<RevocationToken>
where
    R: RevocationResponse + 'a,
{
    let mut best: Option<RevocationToken> = None;
    for candidate in candidates {
        if candidate.signature_algorithm().is_none() {
            log::debug!("skipping revocation data with an unrecognised signature algorithm");
            continue;
        }
        let Some(token) = candidate.token_for(id) else {
            continue;
        };
        if best.as_ref().map_or(true, |b| token.this_update >= b.this_update) {
            best = Some(token);
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revocation::token::{CertificateStatus, RevocationKind};
    use crate::signatures::{DefaultCryptoProvider, DigestAlgorithm, EncryptionAlgorithm};
    use bytes::Bytes;
    use chrono::{DateTime, TimeZone, Utc};

    struct Fixed {
        serial: u8,
        this_update: DateTime<Utc>,
        algorithm: Option<SignatureAlgorithm>,
        tag: &'static str,
    }

    impl RevocationResponse for Fixed {
        fn signature_algorithm(&self) -> Option<SignatureAlgorithm> {
            self.algorithm
        }

        fn token_for(&self, id: &RevocationIdentifier) -> Option<RevocationToken> {
            if !id.matches_serial(&[self.serial]) {
                return None;
            }
            Some(RevocationToken {
                kind: RevocationKind::Ocsp,
                produced_at: None,
                this_update: self.this_update,
                next_update: None,
                status: CertificateStatus::Good,
                signature_algorithm: self.algorithm?,
                serial: vec![self.serial],
                encoded: Bytes::from_static(self.tag.as_bytes()),
            })
        }
    }

    fn fixed(serial: u8, day: u32, tag: &'static str) -> Fixed {
        Fixed {
            serial,
            this_update: Utc.with_ymd_and_hms(2024, 3, day, 12, 0, 0).unwrap(),
            algorithm: Some(SignatureAlgorithm::new(EncryptionAlgorithm::Rsa, DigestAlgorithm::Sha256)),
            tag,
        }
    }

    fn id(serial: u8) -> RevocationIdentifier {
        RevocationIdentifier::new(&[serial], b"issuer", b"key", &DefaultCryptoProvider)
    }

    #[test]
    fn test_tie_goes_to_later_candidate() {
        let candidates = [fixed(1, 5, "first"), fixed(1, 5, "second")];
        let best = select_best(&candidates, &id(1)).unwrap();
        assert_eq!(best.encoded, Bytes::from_static(b"second"));
    }

    #[test]
    fn test_unparseable_algorithm_skipped() {
        let mut newest = fixed(1, 20, "broken");
        newest.algorithm = None;
        let candidates = [fixed(1, 2, "old"), newest];
        let best = select_best(&candidates, &id(1)).unwrap();
        assert_eq!(best.encoded, Bytes::from_static(b"old"));
    }

    #[test]
    fn test_empty_candidates() {
        assert!(select_best::<Fixed>(&[], &id(1)).is_none());
    }
}
