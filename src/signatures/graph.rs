//! Discovery of every signature and document timestamp across the
//! incremental revisions of a document.
//!
//! Discovery starts from the latest revision, collects its signature
//! dictionaries and, for each of them, re-enters on the bytes that existed
//! before that dictionary was appended. Everything found in such an earlier
//! revision is covered by the attestation that led there, which becomes an
//! outer edge on the deeper node. Nodes reached along several paths are
//! merged by [`Fingerprint`].
//!
//! Revisions are scanned depth-first. Earlier revisions claimed by several
//! attestations through the same `/ByteRange` are scanned only once per
//! discovery run.

use std::collections::HashMap;
use std::rc::Rc;
use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use super::attestation::{Attestation, AttestationKind, Fingerprint};
use super::byterange::ByteRange;
use super::cms::{CmsParser, DerCmsParser};
use super::crypto::{CryptoProvider, DefaultCryptoProvider};
use super::dss::DssDictionary;
use super::peeler::{PdfRevisionPeeler, RevisionPeeler, SignatureDictionary};
use super::types::{TimestampType, VerificationResult};
use crate::config::DiscoveryConfig;
use crate::error::{Error, Result};

/// Walks the revisions of a document and builds its [`AttestationGraph`].
pub struct SignatureGraphBuilder<P: RevisionPeeler = PdfRevisionPeeler> {
    peeler: P,
    cms: Arc<dyn CmsParser>,
    crypto: Arc<dyn CryptoProvider>,
    config: DiscoveryConfig,
}

impl SignatureGraphBuilder<PdfRevisionPeeler> {
    /// Builder over the PDF parser, the DER CMS parser and the default
    /// crypto provider.
    pub fn new(config: DiscoveryConfig) -> Self {
        Self {
            peeler: PdfRevisionPeeler::new(config.parser),
            cms: Arc::new(DerCmsParser),
            crypto: Arc::new(DefaultCryptoProvider),
            config,
        }
    }
}

impl Default for SignatureGraphBuilder<PdfRevisionPeeler> {
    fn default() -> Self {
        Self::new(DiscoveryConfig::default())
    }
}

impl<P: RevisionPeeler> SignatureGraphBuilder<P> {
    /// Builder with caller-supplied collaborators.
    pub fn with_components(
        peeler: P,
        cms: Arc<dyn CmsParser>,
        crypto: Arc<dyn CryptoProvider>,
        config: DiscoveryConfig,
    ) -> Self {
        Self {
            peeler,
            cms,
            crypto,
            config,
        }
    }

    /// Replace the crypto provider.
    pub fn with_crypto(mut self, crypto: Arc<dyn CryptoProvider>) -> Self {
        self.crypto = crypto;
        self
    }

    /// Replace the CMS parser.
    pub fn with_cms_parser(mut self, cms: Arc<dyn CmsParser>) -> Self {
        self.cms = cms;
        self
    }

    pub fn peeler(&self) -> &P {
        &self.peeler
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.config
    }

    /// Discover all attestations of `bytes`, then call `visitor` once per
    /// distinct attestation in discovery order (deepest revision first).
    ///
    /// An error returned by the visitor stops the remaining visits and is
    /// returned as is.
    pub fn discover<F>(&self, bytes: impl Into<Bytes>, visitor: F) -> Result<AttestationGraph>
    where
        F: FnMut(&Arc<Attestation>) -> Result<()>,
    {
        self.discover_with_outer(bytes, None, visitor)
    }

    /// Like [`discover`](Self::discover), for a document that is itself an
    /// earlier revision of a document whose `/DSS` is `outer_dss`.
    pub fn discover_with_outer<F>(
        &self,
        bytes: impl Into<Bytes>,
        outer_dss: Option<Arc<DssDictionary>>,
        mut visitor: F,
    ) -> Result<AttestationGraph>
    where
        F: FnMut(&Arc<Attestation>) -> Result<()>,
    {
        let bytes = bytes.into();
        if bytes.len() > self.config.max_document_size {
            return Err(Error::MalformedContainer(format!(
                "document of {} bytes exceeds the {}-byte limit",
                bytes.len(),
                self.config.max_document_size
            )));
        }

        let mut discovery = Discovery {
            builder: self,
            arena: Vec::new(),
        };
        let mut memo = HashMap::new();
        let level = match discovery.scan(&bytes, outer_dss, 0, &mut memo) {
            Ok(level) => level,
            Err(e @ (Error::NonTerminatingRevisionChain { .. } | Error::RevisionLimitExceeded(_))) => return Err(e),
            Err(e) => return Err(Error::MalformedContainer(e.to_string())),
        };
        log::debug!(
            "{} distinct prior revisions scanned, {} attestation records",
            memo.len(),
            discovery.arena.len()
        );
        drop(memo);

        let graph = discovery.freeze(level.entries);
        log::info!(
            "discovered {} attestations ({} top-level)",
            graph.len(),
            graph.top_level().count()
        );
        for attestation in graph.attestations() {
            visitor(attestation)?;
        }
        Ok(graph)
    }

    /// Discover all attestations and check each one's integrity, calling
    /// `callback` with every attestation once its check has run.
    pub fn validate_signatures<F>(&self, bytes: impl Into<Bytes>, mut callback: F) -> Result<AttestationGraph>
    where
        F: FnMut(&Arc<Attestation>, &VerificationResult) -> Result<()>,
    {
        self.discover(bytes, |attestation| {
            let result = attestation.check_integrity();
            if !result.is_valid() {
                log::debug!("{} failed integrity: {:?}", attestation.fingerprint(), result);
            }
            callback(attestation, result)
        })
    }
}

/// Position of a node in one level's running result.
#[derive(Debug, Clone, Copy)]
struct LevelEntry {
    node: usize,
    top_level: bool,
}

/// Result of scanning one revision.
struct Level {
    entries: IndexMap<Fingerprint, LevelEntry>,
    has_dss: bool,
}

/// Everything found below one `/ByteRange`, shared between the siblings
/// that claim it.
#[derive(Debug, Default)]
struct NestedScan {
    nodes: Vec<usize>,
    has_dss: bool,
}

/// Byte range -> nested result, for the duration of one discovery.
type RangeMemo = HashMap<ByteRange, Rc<NestedScan>>;

struct Discovery<'a, P: RevisionPeeler> {
    builder: &'a SignatureGraphBuilder<P>,
    arena: Vec<Attestation>,
}

impl<P: RevisionPeeler> Discovery<'_, P> {
    fn scan(
        &mut self,
        revision: &Bytes,
        outer_dss: Option<Arc<DssDictionary>>,
        depth: usize,
        memo: &mut RangeMemo,
    ) -> Result<Level> {
        if depth > self.builder.config.max_revision_depth {
            return Err(Error::RevisionLimitExceeded(self.builder.config.max_revision_depth));
        }
        let view = self.builder.peeler.extract_attestations(revision)?;
        let mut found: IndexMap<Fingerprint, LevelEntry> = IndexMap::new();

        for dictionary in &view.dictionaries {
            if dictionary.sub_filter.is_none() {
                log::warn!("skipping signature {} with a blank /SubFilter", dictionary.label());
                continue;
            }
            let node = match Attestation::from_dictionary(
                dictionary,
                revision.clone(),
                view.dss.clone(),
                outer_dss.clone(),
                self.builder.cms.as_ref(),
                Arc::clone(&self.builder.crypto),
            ) {
                Ok(node) => node,
                Err(Error::NoSignatureFound) => {
                    log::debug!("no signature in {}, skipping", dictionary.label());
                    continue;
                },
                Err(e) => {
                    log::warn!("skipping signature {}: {}", dictionary.label(), e);
                    continue;
                },
            };
            let byte_range = node.byte_range();
            let current_fp = node.fingerprint();
            let candidate = self.push(node);

            let nested = match memo.get(&byte_range) {
                Some(hit) => {
                    log::debug!("reusing revision scan for {}", byte_range);
                    Rc::clone(hit)
                },
                None => {
                    let nested = Rc::new(self.scan_prior(dictionary, revision, view.dss.clone(), depth, memo)?);
                    memo.insert(byte_range, Rc::clone(&nested));
                    nested
                },
            };
            if nested.has_dss && self.arena[candidate].is_timestamp() {
                self.arena[candidate].set_timestamp_type(TimestampType::ArchiveTimestamp);
            }

            let (current, was_top_level) = self.already_in_list_or_self(&mut found, candidate);

            for &inner in &nested.nodes {
                let (inner, _) = self.already_in_list_or_self(&mut found, inner);
                let inner_fp = self.arena[inner].fingerprint();
                found
                    .entry(inner_fp)
                    .and_modify(|entry| entry.top_level = false)
                    .or_insert(LevelEntry {
                        node: inner,
                        top_level: false,
                    });
                self.arena[inner].add_outer(current_fp);
            }

            found.entry(current_fp).or_insert(LevelEntry {
                node: current,
                top_level: was_top_level.unwrap_or(true),
            });
        }

        Ok(Level {
            entries: found,
            has_dss: view.dss.is_some(),
        })
    }

    /// Scan the revision that preceded `dictionary`.
    ///
    /// Only a prior revision that does not shrink, whether claimed by the
    /// `/ByteRange` or returned by the peeler, or the depth limit, is a hard
    /// error; any other failure leaves that branch empty.
    fn scan_prior(
        &mut self,
        dictionary: &SignatureDictionary,
        revision: &Bytes,
        dss: Option<Arc<DssDictionary>>,
        depth: usize,
        memo: &mut RangeMemo,
    ) -> Result<NestedScan> {
        if let Some(claimed) = dictionary.byte_range.map(|range| range.prior_revision_len()) {
            if claimed >= revision.len() {
                return Err(Error::NonTerminatingRevisionChain {
                    previous: revision.len(),
                    claimed,
                });
            }
        }
        let prior = match self.builder.peeler.prior_revision_bytes(dictionary, revision) {
            Ok(prior) => prior,
            Err(e @ Error::NonTerminatingRevisionChain { .. }) => return Err(e),
            Err(e) => {
                log::warn!("no prior revision for {}: {}", dictionary.label(), e);
                return Ok(NestedScan::default());
            },
        };
        if prior.len() >= revision.len() {
            return Err(Error::NonTerminatingRevisionChain {
                previous: revision.len(),
                claimed: prior.len(),
            });
        }

        match self.scan(&prior, dss, depth + 1, memo) {
            Ok(level) => Ok(NestedScan {
                nodes: level.entries.values().map(|entry| entry.node).collect(),
                has_dss: level.has_dss,
            }),
            Err(e @ (Error::NonTerminatingRevisionChain { .. } | Error::RevisionLimitExceeded(_))) => Err(e),
            Err(e) => {
                log::error!(
                    "failed to read the {}-byte revision before {}: {}",
                    prior.len(),
                    dictionary.label(),
                    e
                );
                Ok(NestedScan::default())
            },
        }
    }

    fn push(&mut self, node: Attestation) -> usize {
        self.arena.push(node);
        self.arena.len() - 1
    }

    /// Resolve `candidate` against a node with the same fingerprint already
    /// in `found`.
    ///
    /// An existing signature timestamp stays in place and takes over the
    /// candidate's outer edges. Any other existing node hands its outer
    /// edges to the candidate and leaves `found`, so the caller re-inserts
    /// the candidate at the end. Returns the node to use and, when an entry
    /// was removed, its top-level flag.
    fn already_in_list_or_self(
        &mut self,
        found: &mut IndexMap<Fingerprint, LevelEntry>,
        candidate: usize,
    ) -> (usize, Option<bool>) {
        let fp = self.arena[candidate].fingerprint();
        let Some(existing) = found.get(&fp).copied() else {
            return (candidate, None);
        };
        if existing.node == candidate {
            return (candidate, None);
        }

        if self.arena[existing.node].timestamp_type() == Some(TimestampType::SignatureTimestamp) {
            log::debug!("merging {} into the existing signature timestamp", fp);
            let edges: Vec<_> = self.arena[candidate].outer_attestations().iter().copied().collect();
            self.arena[existing.node].extend_outer(edges);
            return (existing.node, None);
        }

        log::debug!("merging duplicate attestation {}", fp);
        let edges: Vec<_> = self.arena[existing.node].outer_attestations().iter().copied().collect();
        self.arena[candidate].extend_outer(edges);
        found.shift_remove(&fp);
        (candidate, Some(existing.top_level))
    }

    /// Turn the top-level result into an immutable graph.
    ///
    /// Outer edges recorded on superseded copies of a node are folded into
    /// the surviving one.
    fn freeze(self, entries: IndexMap<Fingerprint, LevelEntry>) -> AttestationGraph {
        let mut edges: HashMap<Fingerprint, IndexSet<Fingerprint>> = HashMap::new();
        for node in &self.arena {
            edges
                .entry(node.fingerprint())
                .or_default()
                .extend(node.outer_attestations().iter().copied());
        }

        let mut arena: Vec<Option<Attestation>> = self.arena.into_iter().map(Some).collect();
        let nodes = entries
            .into_iter()
            .filter_map(|(fp, entry)| {
                let mut node = arena.get_mut(entry.node)?.take()?;
                if let Some(extra) = edges.remove(&fp) {
                    node.extend_outer(extra);
                }
                Some((
                    fp,
                    GraphEntry {
                        attestation: Arc::new(node),
                        top_level: entry.top_level,
                    },
                ))
            })
            .collect();
        AttestationGraph { nodes }
    }
}

#[derive(Debug, Clone)]
struct GraphEntry {
    attestation: Arc<Attestation>,
    top_level: bool,
}

/// Every distinct attestation of a document with its cover relations.
///
/// An attestation is top-level when no other attestation's byte range
/// covers it.
#[derive(Debug, Clone, Default)]
pub struct AttestationGraph {
    nodes: IndexMap<Fingerprint, GraphEntry>,
}

impl AttestationGraph {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<&Arc<Attestation>> {
        self.nodes.get(fingerprint).map(|entry| &entry.attestation)
    }

    /// `None` when the fingerprint is unknown.
    pub fn is_top_level(&self, fingerprint: &Fingerprint) -> Option<bool> {
        self.nodes.get(fingerprint).map(|entry| entry.top_level)
    }

    /// Attestations in discovery order.
    pub fn attestations(&self) -> impl Iterator<Item = &Arc<Attestation>> {
        self.nodes.values().map(|entry| &entry.attestation)
    }

    /// Attestations with their top-level flag.
    pub fn iter(&self) -> impl Iterator<Item = (&Arc<Attestation>, bool)> {
        self.nodes.values().map(|entry| (&entry.attestation, entry.top_level))
    }

    pub fn top_level(&self) -> impl Iterator<Item = &Arc<Attestation>> {
        self.iter().filter(|(_, top)| *top).map(|(a, _)| a)
    }

    pub fn covered(&self) -> impl Iterator<Item = &Arc<Attestation>> {
        self.iter().filter(|(_, top)| !*top).map(|(a, _)| a)
    }

    /// Attestations covering `fingerprint`.
    pub fn outer_attestations(&self, fingerprint: &Fingerprint) -> Vec<&Arc<Attestation>> {
        self.get(fingerprint)
            .map(|a| a.outer_attestations().iter().filter_map(|fp| self.get(fp)).collect())
            .unwrap_or_default()
    }

    /// Attestations covered by `fingerprint`.
    pub fn covered_attestations(&self, fingerprint: &Fingerprint) -> Vec<&Arc<Attestation>> {
        self.attestations()
            .filter(|a| a.outer_attestations().contains(fingerprint))
            .collect()
    }

    /// One report line per attestation. Runs the integrity checks.
    pub fn summaries(&self) -> Vec<AttestationSummary> {
        self.iter()
            .map(|(attestation, top_level)| AttestationSummary::new(attestation, top_level))
            .collect()
    }
}

/// Serializable description of one attestation.
#[derive(Debug, Clone, Serialize)]
pub struct AttestationSummary {
    pub fingerprint: Fingerprint,
    pub unique_id: i32,
    pub kind: &'static str,
    pub timestamp_type: Option<TimestampType>,
    pub sub_filter: String,
    pub field_name: Option<String>,
    pub signer: Option<String>,
    pub signing_time: Option<DateTime<Utc>>,
    pub byte_range: [i64; 4],
    pub top_level: bool,
    pub covered_by: Vec<Fingerprint>,
    pub integrity: VerificationResult,
}

impl AttestationSummary {
    fn new(attestation: &Attestation, top_level: bool) -> Self {
        let (kind, signer) = match attestation.kind() {
            AttestationKind::Signature { signer } => ("signature", signer.clone()),
            AttestationKind::Timestamp { .. } => ("timestamp", None),
        };
        Self {
            fingerprint: attestation.fingerprint(),
            unique_id: attestation.unique_id(),
            kind,
            timestamp_type: attestation.timestamp_type(),
            sub_filter: attestation.sub_filter().as_pdf_name().to_string(),
            field_name: attestation.field_name().map(str::to_string),
            signer,
            signing_time: attestation.signing_time(),
            byte_range: attestation.byte_range().as_array(),
            top_level,
            covered_by: attestation.outer_attestations().iter().copied().collect(),
            integrity: *attestation.check_integrity(),
        }
    }
}
