//! Error types for signature discovery.
//!
//! Covers both the PDF container layer (header, cross-reference, object
//! resolution) and the attestation layer (payload extraction, revision
//! chains, CMS and revocation decoding).
//!
//! A failed digest or signature check is never an error: it is reported as
//! a [`VerificationResult`](crate::signatures::VerificationResult).

/// Result type alias for signature discovery operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while discovering and checking attestations.
#[derive(Debug, thiserror::Error)]
#[allow(clippy::enum_variant_names)]
pub enum Error {
    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where error occurred
        offset: usize,
        /// Reason for parse failure
        reason: String,
    },

    /// Invalid cross-reference table
    #[error("Invalid cross-reference table")]
    InvalidXref,

    /// Referenced object not found in cross-reference table
    #[error("Object not found: {0} {1} R")]
    ObjectNotFound(u32, u16),

    /// Object has wrong type
    #[error("Invalid object type: expected {expected}, found {found}")]
    InvalidObjectType {
        /// Expected object type
        expected: String,
        /// Actual object type found
        found: String,
    },

    /// Unexpected end of file
    #[error("End of file reached unexpectedly")]
    UnexpectedEof,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Circular reference detected in object graph
    #[error("Circular reference detected: object {0}")]
    CircularReference(crate::object::ObjectRef),

    /// Recursion depth limit exceeded
    #[error("Recursion depth limit exceeded (max: {0})")]
    RecursionLimitExceeded(u32),

    /// The top-level document cannot be read as a PDF at all
    #[error("Malformed container: {0}")]
    MalformedContainer(String),

    /// A signature slot exists but carries no `/Contents` payload
    #[error("No signature found in signature dictionary")]
    NoSignatureFound,

    /// A prior revision claimed to be as long as (or longer than) the revision containing it
    #[error("Non-terminating revision chain: prior revision of {claimed} bytes does not shrink a {previous}-byte revision")]
    NonTerminatingRevisionChain {
        /// Length of the revision being scanned
        previous: usize,
        /// Length claimed for its prior revision
        claimed: usize,
    },

    /// More nested revisions than the configured limit
    #[error("Revision depth limit exceeded (max: {0})")]
    RevisionLimitExceeded(usize),

    /// Malformed `/ByteRange` array
    #[error("Invalid byte range: {0}")]
    InvalidByteRange(String),

    /// CMS / PKCS#7 decoding error
    #[error("CMS error: {0}")]
    Cms(String),

    /// X.509 certificate decoding error
    #[error("Certificate error: {0}")]
    Certificate(String),

    /// OCSP / CRL decoding error
    #[error("Revocation data error: {0}")]
    Revocation(String),
}

impl From<der::Error> for Error {
    fn from(err: der::Error) -> Self {
        Error::Cms(err.to_string())
    }
}
