//! Discovery of signatures and document timestamps across revisions.

mod common;

use common::{init_logging, IncrementalPdf};
use pades_oxide::signatures::{Fingerprint, SignatureGraphBuilder, SignatureSubFilter, TimestampType};
use pades_oxide::{DiscoveryConfig, Error};

/// Fingerprint of a payload as written into a `/Contents` slot.
fn fingerprint(payload: &[u8]) -> Fingerprint {
    let mut slot = payload.to_vec();
    slot.resize(common::CONTENTS_SLOT, 0);
    Fingerprint::of(&slot)
}

#[test]
fn test_archive_timestamp_over_signature() {
    init_logging();
    let mut pdf = IncrementalPdf::new();
    pdf.sign("ETSI.CAdES.detached", b"signature-one")
        .add_dss(&[b"ocsp"], &[])
        .sign("ETSI.RFC3161", b"timestamp-one");

    let mut visited = Vec::new();
    let graph = SignatureGraphBuilder::default()
        .discover(pdf.bytes(), |attestation| {
            visited.push(attestation.fingerprint());
            Ok(())
        })
        .unwrap();

    let sig = fingerprint(b"signature-one");
    let ts = fingerprint(b"timestamp-one");
    assert_eq!(graph.len(), 2);
    assert_eq!(visited, vec![sig, ts]);

    let signature = graph.get(&sig).unwrap();
    let timestamp = graph.get(&ts).unwrap();
    assert_eq!(signature.outer_attestations().iter().copied().collect::<Vec<_>>(), vec![ts]);
    assert!(timestamp.outer_attestations().is_empty());
    assert_eq!(graph.is_top_level(&ts), Some(true));
    assert_eq!(graph.is_top_level(&sig), Some(false));
    assert_eq!(timestamp.timestamp_type(), Some(TimestampType::ArchiveTimestamp));
    assert_eq!(signature.sub_filter(), &SignatureSubFilter::CadesDetached);
    assert_eq!(signature.field_name(), Some("Signature1"));
    assert!(signature.signing_time().is_some());
    assert_eq!(graph.covered_attestations(&ts).len(), 1);
}

#[test]
fn test_signature_timestamp_without_dss() {
    let mut pdf = IncrementalPdf::new();
    pdf.sign("adbe.pkcs7.detached", b"sig").sign("ETSI.RFC3161", b"ts");

    let graph = SignatureGraphBuilder::default().discover(pdf.bytes(), |_| Ok(())).unwrap();
    let ts = graph.get(&fingerprint(b"ts")).unwrap();
    assert_eq!(ts.timestamp_type(), Some(TimestampType::SignatureTimestamp));
    assert!(ts.dss().is_none());
}

#[test]
fn test_shared_signature_visited_once() {
    init_logging();
    let mut pdf = IncrementalPdf::new();
    pdf.sign("ETSI.CAdES.detached", b"shared")
        .sign("ETSI.RFC3161", b"ts-1")
        .sign("ETSI.RFC3161", b"ts-2");

    let mut visits = 0;
    let graph = SignatureGraphBuilder::default()
        .discover(pdf.bytes(), |_| {
            visits += 1;
            Ok(())
        })
        .unwrap();
    assert_eq!(visits, 3);

    let shared = fingerprint(b"shared");
    let ts1 = fingerprint(b"ts-1");
    let ts2 = fingerprint(b"ts-2");
    let outer: Vec<_> = graph.get(&shared).unwrap().outer_attestations().iter().copied().collect();
    assert_eq!(outer.len(), 2);
    assert!(outer.contains(&ts1));
    assert!(outer.contains(&ts2));

    assert_eq!(graph.outer_attestations(&ts1).len(), 1);
    assert_eq!(graph.outer_attestations(&ts1)[0].fingerprint(), ts2);
    assert_eq!(graph.top_level().map(|a| a.fingerprint()).collect::<Vec<_>>(), vec![ts2]);
    assert_eq!(graph.covered().count(), 2);

    // The record kept for ts-1 is the one read from the whole file.
    let kept = graph.get(&ts1).unwrap();
    assert_eq!(kept.revision().len(), pdf.bytes().len());
    assert_eq!(kept.timestamp_type(), Some(TimestampType::SignatureTimestamp));
}

#[test]
fn test_blank_sub_filter_is_skipped() {
    init_logging();
    let mut pdf = IncrementalPdf::new();
    pdf.sign("adbe.pkcs7.detached", b"kept").sign("", b"blank");

    let graph = SignatureGraphBuilder::default().discover(pdf.bytes(), |_| Ok(())).unwrap();
    assert_eq!(graph.len(), 1);
    assert!(graph.get(&fingerprint(b"kept")).is_some());
    assert!(graph.get(&fingerprint(b"blank")).is_none());
}

#[test]
fn test_missing_contents_is_skipped() {
    let mut pdf = IncrementalPdf::new();
    pdf.sign("adbe.pkcs7.detached", b"real").sign_without_contents("adbe.pkcs7.detached");

    let graph = SignatureGraphBuilder::default().discover(pdf.bytes(), |_| Ok(())).unwrap();
    assert_eq!(graph.len(), 1);
    assert_eq!(graph.top_level().count(), 1);
}

#[test]
fn test_unsigned_document() {
    let pdf = IncrementalPdf::new();
    let graph = SignatureGraphBuilder::default().discover(pdf.bytes(), |_| Ok(())).unwrap();
    assert!(graph.is_empty());
}

#[test]
fn test_garbage_is_malformed_container() {
    let err = SignatureGraphBuilder::default()
        .discover(b"definitely not a pdf".to_vec(), |_| Ok(()))
        .unwrap_err();
    assert!(matches!(err, Error::MalformedContainer(_)));
}

#[test]
fn test_document_size_limit() {
    let mut pdf = IncrementalPdf::new();
    pdf.sign("adbe.pkcs7.detached", b"sig");
    let builder = SignatureGraphBuilder::new(DiscoveryConfig::default().with_max_document_size(16));
    assert!(matches!(
        builder.discover(pdf.bytes(), |_| Ok(())),
        Err(Error::MalformedContainer(_))
    ));
}

#[test]
fn test_visitor_error_aborts_remaining_visits() {
    let mut pdf = IncrementalPdf::new();
    pdf.sign("adbe.pkcs7.detached", b"a").sign("adbe.pkcs7.detached", b"b");

    let mut visits = 0;
    let err = SignatureGraphBuilder::default()
        .discover(pdf.bytes(), |_| {
            visits += 1;
            Err(Error::InvalidPdf("visitor gave up".into()))
        })
        .unwrap_err();
    assert_eq!(visits, 1);
    assert!(err.to_string().contains("visitor gave up"));
}

#[test]
fn test_summaries_serialize() {
    let mut pdf = IncrementalPdf::new();
    pdf.sign("adbe.pkcs7.detached", b"sig").sign("ETSI.RFC3161", b"ts");

    let graph = SignatureGraphBuilder::default().discover(pdf.bytes(), |_| Ok(())).unwrap();
    let summaries = graph.summaries();
    assert_eq!(summaries.len(), 2);
    assert_eq!(summaries[0].kind, "signature");
    assert_eq!(summaries[1].kind, "timestamp");
    assert!(!summaries[0].top_level);
    assert_eq!(summaries[0].covered_by, vec![fingerprint(b"ts")]);
    // The payloads are not CMS, so nothing verifies.
    assert!(summaries[0].integrity.reference_data_found);
    assert!(!summaries[0].integrity.signature_intact);

    let json = serde_json::to_value(&summaries).unwrap();
    assert_eq!(json[1]["sub_filter"], "ETSI.RFC3161");
    assert_eq!(json[1]["timestamp_type"], "SignatureTimestamp");
    assert_eq!(json[0]["fingerprint"].as_str().map(str::len), Some(64));
}

#[test]
fn test_open_from_file() {
    let mut pdf = IncrementalPdf::new();
    pdf.sign("adbe.pkcs7.detached", b"on-disk");
    let file = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(file.path(), pdf.bytes()).unwrap();

    let mut doc = pades_oxide::PdfDocument::open(file.path()).unwrap();
    assert_eq!(doc.signature_fields().unwrap().len(), 1);

    let bytes = std::fs::read(file.path()).unwrap();
    let graph = SignatureGraphBuilder::default().discover(bytes, |_| Ok(())).unwrap();
    assert_eq!(graph.len(), 1);
}
