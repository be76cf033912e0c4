//! Configuration for signature discovery.

use crate::parser_config::ParserOptions;

/// Bounds applied by [`SignatureGraphBuilder`](crate::signatures::SignatureGraphBuilder).
///
/// Recursion depth is bounded by the number of incremental updates in a
/// document; `max_revision_depth` is the sanity threshold on top of that.
#[derive(Debug, Clone)]
pub struct DiscoveryConfig {
    /// Maximum number of nested prior revisions entered.
    pub max_revision_depth: usize,

    /// Documents larger than this are rejected as malformed.
    pub max_document_size: usize,

    /// Options handed to the PDF parser for every revision.
    pub parser: ParserOptions,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DiscoveryConfig {
    /// Create new configuration with defaults.
    pub fn new() -> Self {
        Self {
            max_revision_depth: 64,
            max_document_size: 512 * 1024 * 1024,
            parser: ParserOptions::default(),
        }
    }

    /// Limit the number of nested revisions.
    pub fn with_max_revision_depth(mut self, depth: usize) -> Self {
        self.max_revision_depth = depth;
        self
    }

    /// Limit the accepted document size.
    pub fn with_max_document_size(mut self, bytes: usize) -> Self {
        self.max_document_size = bytes;
        self
    }

    /// Use custom parser options.
    pub fn with_parser_options(mut self, parser: ParserOptions) -> Self {
        self.parser = parser;
        self
    }
}
