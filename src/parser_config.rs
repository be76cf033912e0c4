//! Parser options controlling how tolerant the container layer is.
//!
//! Signed documents found in the wild frequently carry broken cross-reference
//! offsets after an incremental update; the default is therefore lenient and
//! falls back to a regex object scan. Decompression limits apply to xref
//! streams, object streams and `/DSS` payloads alike.
//!
//! # Example
//!
//! ```
//! use pades_oxide::parser_config::ParserOptions;
//!
//! let strict = ParserOptions::strict();
//! assert!(!strict.reconstruct_xref);
//!
//! let custom = ParserOptions {
//!     max_xref_chain: 16,
//!     ..ParserOptions::lenient()
//! };
//! assert_eq!(custom.max_xref_chain, 16);
//! ```

/// Parser options for the PDF container layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParserOptions {
    /// Maximum object nesting depth (arrays / dictionaries).
    ///
    /// PDF Spec: ISO 32000-1:2008, Section H.1 - Implementation Limits
    pub max_nesting: usize,

    /// Maximum decompressed stream size in bytes. 0 disables the check.
    pub max_decompressed_size: usize,

    /// Maximum number of cross-reference sections followed through `/Prev`.
    pub max_xref_chain: u32,

    /// Maximum depth when resolving chains of indirect references.
    pub max_recursion_depth: u32,

    /// Rebuild the cross-reference table by scanning for `N G obj` when the
    /// declared one cannot be read.
    pub reconstruct_xref: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self::lenient()
    }
}

impl ParserOptions {
    /// Strict mode: a broken cross-reference table is a hard error.
    pub fn strict() -> Self {
        Self {
            max_nesting: 100,
            max_decompressed_size: 100 * 1024 * 1024,
            max_xref_chain: 100,
            max_recursion_depth: 100,
            reconstruct_xref: false,
        }
    }

    /// Lenient mode: recover from broken cross-reference data.
    pub fn lenient() -> Self {
        Self {
            reconstruct_xref: true,
            ..Self::strict()
        }
    }

    /// Override the decompression limit.
    pub fn with_max_decompressed_size(mut self, bytes: usize) -> Self {
        self.max_decompressed_size = bytes;
        self
    }

    /// Override the `/Prev` chain limit.
    pub fn with_max_xref_chain(mut self, sections: u32) -> Self {
        self.max_xref_chain = sections;
        self
    }
}
