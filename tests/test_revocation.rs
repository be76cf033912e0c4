//! Offline revocation selection and the sources attestations draw from.

mod common;

use bytes::Bytes;
use chrono::{DateTime, Duration, TimeZone, Utc};
use common::IncrementalPdf;
use pades_oxide::revocation::{
    select_best, CertificateStatus, RevocationIdentifier, RevocationKind, RevocationReason, RevocationResponse,
    RevocationToken,
};
use pades_oxide::signatures::{
    DefaultCryptoProvider, DigestAlgorithm, EncryptionAlgorithm, SignatureAlgorithm, SignatureGraphBuilder,
};

/// A CRL-like response listing one serial.
struct Listing {
    serial: Vec<u8>,
    this_update: DateTime<Utc>,
    next_update: Option<DateTime<Utc>>,
    revoked: bool,
    algorithm: Option<SignatureAlgorithm>,
    label: &'static str,
}

impl RevocationResponse for Listing {
    fn signature_algorithm(&self) -> Option<SignatureAlgorithm> {
        self.algorithm
    }

    fn token_for(&self, id: &RevocationIdentifier) -> Option<RevocationToken> {
        if !id.matches_serial(&self.serial) {
            return None;
        }
        let status = if self.revoked {
            CertificateStatus::Revoked {
                reason: Some(RevocationReason::KeyCompromise),
                date: self.this_update - Duration::hours(1),
            }
        } else {
            CertificateStatus::Good
        };
        Some(RevocationToken {
            kind: RevocationKind::Crl,
            produced_at: None,
            this_update: self.this_update,
            next_update: self.next_update,
            status,
            signature_algorithm: self.algorithm?,
            serial: self.serial.clone(),
            encoded: Bytes::from_static(self.label.as_bytes()),
        })
    }
}

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn listing(serial: &[u8], hours: i64, label: &'static str) -> Listing {
    Listing {
        serial: serial.to_vec(),
        this_update: base() + Duration::hours(hours),
        next_update: Some(base() + Duration::hours(hours + 24)),
        revoked: false,
        algorithm: Some(SignatureAlgorithm::new(EncryptionAlgorithm::Rsa, DigestAlgorithm::Sha256)),
        label,
    }
}

fn id(serial: &[u8]) -> RevocationIdentifier {
    RevocationIdentifier::new(serial, b"CN=Issuing CA", b"issuer key", &DefaultCryptoProvider)
}

#[test]
fn test_latest_applicable_wins() {
    let candidates = [
        listing(&[0x0A], 1, "t1"),
        listing(&[0x0A], 3, "t3"),
        listing(&[0x0B], 100, "t4-other-serial"),
        listing(&[0x0A], 2, "t2"),
    ];
    let best = select_best(&candidates, &id(&[0x0A])).unwrap();
    assert_eq!(best.encoded, Bytes::from_static(b"t3"));
    assert_eq!(best.this_update, base() + Duration::hours(3));
    assert!(best.is_fresh_at(base() + Duration::hours(10)));
    assert!(!best.is_fresh_at(base() + Duration::hours(30)));
}

#[test]
fn test_leading_zero_serials_match() {
    let candidates = [listing(&[0x00, 0x80], 5, "padded")];
    let best = select_best(&candidates, &id(&[0x80])).unwrap();
    assert_eq!(best.serial, vec![0x00, 0x80]);
}

#[test]
fn test_newer_revocation_overrides_older_good() {
    let mut revoked = listing(&[0x0C], 9, "revoked");
    revoked.revoked = true;
    let candidates = [listing(&[0x0C], 1, "good"), revoked];
    let best = select_best(&candidates, &id(&[0x0C])).unwrap();
    assert!(best.status.is_revoked());
    assert!(matches!(
        best.status,
        CertificateStatus::Revoked {
            reason: Some(RevocationReason::KeyCompromise),
            ..
        }
    ));
}

#[test]
fn test_unrecognised_algorithm_does_not_poison_selection() {
    let mut newest = listing(&[0x0D], 50, "unparseable");
    newest.algorithm = None;
    let candidates = [listing(&[0x0D], 1, "older"), newest, listing(&[0x0D], 2, "newer")];
    let best = select_best(&candidates, &id(&[0x0D])).unwrap();
    assert_eq!(best.encoded, Bytes::from_static(b"newer"));
}

#[test]
fn test_no_applicable_candidate() {
    let candidates = [listing(&[0x01], 1, "a"), listing(&[0x02], 2, "b")];
    assert!(select_best(&candidates, &id(&[0x03])).is_none());
    assert!(select_best::<Listing>(&[], &id(&[0x03])).is_none());
}

#[test]
fn test_attestation_sources_skip_undecodable_dss_entries() {
    common::init_logging();
    let mut pdf = IncrementalPdf::new();
    pdf.sign("ETSI.CAdES.detached", b"signature")
        .add_dss(&[b"not an ocsp response", b"not an ocsp response"], &[b"not a crl"])
        .sign("ETSI.RFC3161", b"archive");

    let graph = SignatureGraphBuilder::default().discover(pdf.bytes(), |_| Ok(())).unwrap();
    assert_eq!(graph.len(), 2);
    for attestation in graph.attestations() {
        assert!(attestation.ocsp_source().is_empty());
        assert!(attestation.crl_source().is_empty());
    }

    let timestamp = graph.top_level().next().unwrap();
    let dss = timestamp.dss().unwrap();
    assert_eq!(dss.ocsps.len(), 2);
    assert_eq!(dss.crls.len(), 1);
}
