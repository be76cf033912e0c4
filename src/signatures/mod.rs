//! Signatures and document timestamps of PDF documents.
//!
//! Discovery peels incremental revisions off a document, builds one
//! [`Attestation`] per distinct signature or document timestamp and links
//! each to the later attestations whose byte ranges cover it:
//!
//! ```ignore
//! use pades_oxide::signatures::SignatureGraphBuilder;
//!
//! let builder = SignatureGraphBuilder::default();
//! let graph = builder.validate_signatures(std::fs::read("signed.pdf")?, |attestation, result| {
//!     println!("{} valid={}", attestation.fingerprint(), result.is_valid());
//!     Ok(())
//! })?;
//! for ts in graph.top_level() {
//!     println!("top-level: {:?}", ts.kind());
//! }
//! ```
//!
//! ## PDF Specification Reference
//!
//! - ISO 32000-2:2020 Section 12.8 - Digital Signatures
//! - ETSI EN 319 142-1 - PAdES digital signatures

mod attestation;
mod byterange;
mod certificate;
mod cms;
mod crypto;
mod dss;
mod graph;
mod peeler;
mod types;

pub use attestation::{Attestation, AttestationKind, Fingerprint};
pub use byterange::ByteRange;
pub use certificate::{strip_leading_zeros, CertificateToken};
pub use cms::{CmsParser, DerCmsParser, SignedContent, TimestampInfo};
pub use crypto::{CryptoProvider, DefaultCryptoProvider};
pub use dss::DssDictionary;
pub use graph::{AttestationGraph, AttestationSummary, SignatureGraphBuilder};
pub use peeler::{parse_pdf_date, PdfRevisionPeeler, RevisionPeeler, RevisionView, SignatureDictionary};
pub use types::{
    DigestAlgorithm, EncryptionAlgorithm, SignatureAlgorithm, SignatureSubFilter, TimestampType, VerificationResult,
};
