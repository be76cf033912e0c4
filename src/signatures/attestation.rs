//! One signature or document timestamp found in a document.

use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use indexmap::IndexSet;
use serde::{Serialize, Serializer};
use sha2::{Digest, Sha256};

use super::byterange::ByteRange;
use super::cms::{CmsParser, SignedContent};
use super::crypto::CryptoProvider;
use super::dss::DssDictionary;
use super::peeler::SignatureDictionary;
use super::types::{SignatureSubFilter, TimestampType, VerificationResult};
use crate::error::{Error, Result};
use crate::revocation::{OfflineCrlSource, OfflineOcspSource};

/// Identity of an attestation: SHA-256 of its raw `/Contents` bytes.
///
/// Two dictionaries found through different revisions with byte-identical
/// payloads are the same attestation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Fingerprint of a raw payload.
    pub fn of(payload: &[u8]) -> Self {
        Self(Sha256::digest(payload).into())
    }

    /// The compact identifier: the first four digest bytes read as a
    /// big-endian signed integer. Not unique across large document sets.
    pub fn unique_id(&self) -> i32 {
        i32::from_be_bytes([self.0[0], self.0[1], self.0[2], self.0[3]])
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<[u8; 32]> for Fingerprint {
    fn from(digest: [u8; 32]) -> Self {
        Self(digest)
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprint({})", self)
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// What kind of attestation a node is, with the details only that kind has.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationKind {
    /// An approval or certification signature
    Signature {
        /// Subject of the signing certificate
        signer: Option<String>,
    },
    /// A document timestamp (`ETSI.RFC3161`)
    Timestamp {
        timestamp_type: TimestampType,
        /// TSTInfo `genTime`
        generation_time: Option<DateTime<Utc>>,
    },
}

/// A signature or document timestamp, its payload and its place in the
/// revision graph.
///
/// The integrity check and the offline revocation sources are computed on
/// first use and cached for the lifetime of the record.
pub struct Attestation {
    fingerprint: Fingerprint,
    kind: AttestationKind,
    sub_filter: SignatureSubFilter,
    byte_range: ByteRange,
    signing_time: Option<DateTime<Utc>>,
    field_name: Option<String>,
    name: Option<String>,
    reason: Option<String>,
    location: Option<String>,
    contact_info: Option<String>,
    revision: Bytes,
    contents: Bytes,
    cms: Option<Arc<SignedContent>>,
    own_dss: Option<Arc<DssDictionary>>,
    outer_dss: Option<Arc<DssDictionary>>,
    outer: IndexSet<Fingerprint>,
    integrity: OnceLock<VerificationResult>,
    ocsp_source: OnceLock<OfflineOcspSource>,
    crl_source: OnceLock<OfflineCrlSource>,
    crypto: Arc<dyn CryptoProvider>,
}

impl Attestation {
    /// Build a node from a signature dictionary found in `revision`.
    ///
    /// `own_dss` is the `/DSS` of `revision`; `outer_dss` that of the
    /// revision this one was peeled from. A payload that cannot be decoded
    /// still yields a node, whose integrity check then fails.
    pub(crate) fn from_dictionary(
        dictionary: &SignatureDictionary,
        revision: Bytes,
        own_dss: Option<Arc<DssDictionary>>,
        outer_dss: Option<Arc<DssDictionary>>,
        cms_parser: &dyn CmsParser,
        crypto: Arc<dyn CryptoProvider>,
    ) -> Result<Self> {
        let sub_filter = dictionary
            .sub_filter
            .clone()
            .ok_or_else(|| Error::InvalidPdf(format!("{} has a blank /SubFilter", dictionary.label())))?;
        if !dictionary.has_payload() {
            return Err(Error::NoSignatureFound);
        }
        let contents = dictionary.contents.clone().unwrap_or_default();
        let byte_range = dictionary
            .byte_range
            .ok_or_else(|| Error::InvalidByteRange(format!("{} has no /ByteRange", dictionary.label())))?;

        let cms = match cms_parser.parse(&contents) {
            Ok(content) => Some(Arc::new(content)),
            Err(e) => {
                log::warn!("payload of {} is not readable CMS: {}", dictionary.label(), e);
                None
            },
        };

        let (kind, signing_time) = if sub_filter.is_timestamp() {
            let generation_time = cms.as_ref().and_then(|c| c.timestamp.as_ref()).map(|t| t.gen_time);
            (
                AttestationKind::Timestamp {
                    timestamp_type: TimestampType::SignatureTimestamp,
                    generation_time,
                },
                generation_time,
            )
        } else {
            let signer = cms
                .as_ref()
                .and_then(|c| c.signing_certificate.as_ref())
                .map(|cert| cert.subject.clone());
            let claimed = cms.as_ref().and_then(|c| c.signing_time).or(dictionary.signing_date);
            (AttestationKind::Signature { signer }, claimed)
        };

        Ok(Self {
            fingerprint: Fingerprint::of(&contents),
            kind,
            sub_filter,
            byte_range,
            signing_time,
            field_name: dictionary.field_name.clone(),
            name: dictionary.name.clone(),
            reason: dictionary.reason.clone(),
            location: dictionary.location.clone(),
            contact_info: dictionary.contact_info.clone(),
            revision,
            contents,
            cms,
            own_dss,
            outer_dss,
            outer: IndexSet::new(),
            integrity: OnceLock::new(),
            ocsp_source: OnceLock::new(),
            crl_source: OnceLock::new(),
            crypto,
        })
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.fingerprint
    }

    /// See [`Fingerprint::unique_id`].
    pub fn unique_id(&self) -> i32 {
        self.fingerprint.unique_id()
    }

    pub fn kind(&self) -> &AttestationKind {
        &self.kind
    }

    pub fn is_timestamp(&self) -> bool {
        matches!(self.kind, AttestationKind::Timestamp { .. })
    }

    /// `None` for signatures.
    pub fn timestamp_type(&self) -> Option<TimestampType> {
        match self.kind {
            AttestationKind::Timestamp { timestamp_type, .. } => Some(timestamp_type),
            AttestationKind::Signature { .. } => None,
        }
    }

    pub fn sub_filter(&self) -> &SignatureSubFilter {
        &self.sub_filter
    }

    pub fn byte_range(&self) -> ByteRange {
        self.byte_range
    }

    /// Claimed signing time for signatures, production time for timestamps.
    pub fn signing_time(&self) -> Option<DateTime<Utc>> {
        self.signing_time
    }

    pub fn field_name(&self) -> Option<&str> {
        self.field_name.as_deref()
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    pub fn location(&self) -> Option<&str> {
        self.location.as_deref()
    }

    pub fn contact_info(&self) -> Option<&str> {
        self.contact_info.as_deref()
    }

    /// The raw `/Contents` value.
    pub fn contents(&self) -> &Bytes {
        &self.contents
    }

    /// The decoded payload, when it could be decoded.
    pub fn signed_content(&self) -> Option<&SignedContent> {
        self.cms.as_deref()
    }

    /// The bytes this attestation signs: both `/ByteRange` segments.
    pub fn original_bytes(&self) -> Result<Vec<u8>> {
        self.byte_range.signed_bytes(&self.revision)
    }

    /// The revision bytes the attestation was found in.
    pub fn revision(&self) -> &Bytes {
        &self.revision
    }

    /// `/DSS` of the revision holding this attestation.
    pub fn dss(&self) -> Option<&DssDictionary> {
        self.own_dss.as_deref()
    }

    /// `/DSS` of the later revision this one was discovered from.
    pub fn outer_dss(&self) -> Option<&DssDictionary> {
        self.outer_dss.as_deref()
    }

    /// Attestations whose byte ranges cover this one ("covered by").
    pub fn outer_attestations(&self) -> &IndexSet<Fingerprint> {
        &self.outer
    }

    /// Check the signed bytes and the payload signature, once.
    ///
    /// Later calls return the cached result without touching the crypto
    /// provider again.
    pub fn check_integrity(&self) -> &VerificationResult {
        self.integrity.get_or_init(|| self.compute_integrity())
    }

    /// Whether [`check_integrity`](Self::check_integrity) already ran.
    pub fn is_integrity_checked(&self) -> bool {
        self.integrity.get().is_some()
    }

    fn compute_integrity(&self) -> VerificationResult {
        let mut result = VerificationResult::default();
        let signed = match self.original_bytes() {
            Ok(signed) => signed,
            Err(e) => {
                log::debug!("signed bytes of {} unavailable: {}", self.fingerprint, e);
                return result;
            },
        };
        result.reference_data_found = true;

        let Some(cms) = self.cms.as_deref() else {
            return result;
        };
        let digest_algorithm = cms.digest_algorithm.unwrap_or_default();

        let signature_intact = match (&cms.signing_certificate, cms.signature_algorithm) {
            (Some(cert), Some(algorithm)) => {
                let message = cms.signed_attributes.as_deref().unwrap_or(&signed);
                self.crypto
                    .verify_signature(algorithm, &cert.spki_der, message, &cms.signature_value)
            },
            _ => {
                log::debug!("{} has no usable signer certificate or algorithm", self.fingerprint);
                false
            },
        };

        result.reference_data_intact = if self.is_timestamp() {
            cms.timestamp.as_ref().is_some_and(|tst| {
                let algorithm = tst.imprint_algorithm.unwrap_or(digest_algorithm);
                self.crypto.digest(algorithm, &signed) == tst.imprint
            })
        } else if let Some(asserted) = &cms.asserted_digest {
            self.crypto.digest(digest_algorithm, &signed) == *asserted
        } else {
            // Without signed attributes the signature itself is over the content.
            cms.signed_attributes.is_none() && signature_intact
        };
        result.signature_intact = signature_intact;
        result
    }

    /// OCSP responses available offline for this attestation's certificates.
    ///
    /// Taken from the outer revision's `/DSS` when there is one, else from
    /// this revision's, plus anything embedded in the payload.
    pub fn ocsp_source(&self) -> &OfflineOcspSource {
        self.ocsp_source.get_or_init(|| {
            let dss = self.validation_dss().map(|d| d.ocsps.clone()).unwrap_or_default();
            let embedded = self.cms.as_ref().map(|c| c.ocsps.clone()).unwrap_or_default();
            OfflineOcspSource::new(dss.into_iter().chain(embedded), Arc::clone(&self.crypto))
        })
    }

    /// CRLs available offline; same sources as [`ocsp_source`](Self::ocsp_source).
    pub fn crl_source(&self) -> &OfflineCrlSource {
        self.crl_source.get_or_init(|| {
            let dss = self.validation_dss().map(|d| d.crls.clone()).unwrap_or_default();
            let embedded = self.cms.as_ref().map(|c| c.crls.clone()).unwrap_or_default();
            OfflineCrlSource::new(dss.into_iter().chain(embedded), Arc::clone(&self.crypto))
        })
    }

    fn validation_dss(&self) -> Option<&DssDictionary> {
        self.outer_dss.as_deref().or(self.own_dss.as_deref())
    }

    pub(crate) fn add_outer(&mut self, fingerprint: Fingerprint) {
        if fingerprint != self.fingerprint {
            self.outer.insert(fingerprint);
        }
    }

    pub(crate) fn extend_outer(&mut self, fingerprints: impl IntoIterator<Item = Fingerprint>) {
        for fingerprint in fingerprints {
            self.add_outer(fingerprint);
        }
    }

    pub(crate) fn set_timestamp_type(&mut self, new_type: TimestampType) {
        if let AttestationKind::Timestamp { timestamp_type, .. } = &mut self.kind {
            *timestamp_type = new_type;
        }
    }
}

impl std::fmt::Debug for Attestation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Attestation")
            .field("fingerprint", &self.fingerprint)
            .field("kind", &self.kind)
            .field("sub_filter", &self.sub_filter)
            .field("byte_range", &self.byte_range)
            .field("field_name", &self.field_name)
            .field("outer", &self.outer)
            .field("integrity", &self.integrity.get())
            .finish_non_exhaustive()
    }
}
