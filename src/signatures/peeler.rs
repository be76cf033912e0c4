//! Peeling incremental revisions off a signed PDF.
//!
//! Every signature or document timestamp is appended as an incremental
//! update, and its `/ByteRange` starts with the whole file as it existed
//! just before the `/Contents` value was written. Cutting the bytes at the
//! end of that first segment yields an earlier document that parses on its
//! own, which is what lets discovery walk back through every revision.

use std::sync::Arc;

use bytes::Bytes;
use chrono::{DateTime, FixedOffset, NaiveDate, TimeZone, Utc};
use lazy_static::lazy_static;
use regex::Regex;

use super::byterange::ByteRange;
use super::dss::DssDictionary;
use super::types::SignatureSubFilter;
use crate::document::{PdfDocument, SignatureField};
use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::parser_config::ParserOptions;

lazy_static! {
    static ref RE_PDF_DATE: Regex = Regex::new(
        r"^(?:D:)?(\d{4})(\d{2})?(\d{2})?(\d{2})?(\d{2})?(\d{2})?(?:([Zz])|([+\-])(\d{2})'?(?:(\d{2})'?)?)?"
    )
    .unwrap();
}

/// The entries of one signature dictionary (`/Type /Sig` or `/DocTimeStamp`)
/// that discovery needs, with indirect values already resolved.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SignatureDictionary {
    /// Indirect reference of the dictionary, when it is not inline
    pub object_ref: Option<ObjectRef>,
    /// Fully qualified name of the form field holding it
    pub field_name: Option<String>,
    /// `/SubFilter`; `None` when missing or blank
    pub sub_filter: Option<SignatureSubFilter>,
    /// `/ByteRange`
    pub byte_range: Option<ByteRange>,
    /// `/Contents`, the raw CMS payload including trailing padding
    pub contents: Option<Bytes>,
    /// `/M`
    pub signing_date: Option<DateTime<Utc>>,
    /// `/Name`
    pub name: Option<String>,
    /// `/Reason`
    pub reason: Option<String>,
    /// `/Location`
    pub location: Option<String>,
    /// `/ContactInfo`
    pub contact_info: Option<String>,
}

impl SignatureDictionary {
    /// Extract the known entries of a resolved signature dictionary.
    pub fn from_dictionary(dict: &Dictionary, field_name: Option<String>, object_ref: Option<ObjectRef>) -> Self {
        let text = |key: &str| dict.get(key).and_then(Object::as_text);

        let byte_range = dict.get("ByteRange").and_then(|obj| match ByteRange::parse(obj) {
            Ok(range) => Some(range),
            Err(e) => {
                log::warn!("ignoring unusable /ByteRange: {}", e);
                None
            },
        });

        Self {
            object_ref,
            field_name,
            sub_filter: dict
                .get("SubFilter")
                .and_then(Object::as_name)
                .and_then(SignatureSubFilter::from_pdf_name),
            byte_range,
            contents: dict
                .get("Contents")
                .and_then(Object::as_string)
                .map(|s| Bytes::copy_from_slice(s)),
            signing_date: text("M").as_deref().and_then(parse_pdf_date),
            name: text("Name"),
            reason: text("Reason"),
            location: text("Location"),
            contact_info: text("ContactInfo"),
        }
    }

    /// `/Contents` holds something other than the zero-filled placeholder.
    pub fn has_payload(&self) -> bool {
        self.contents.as_ref().is_some_and(|c| c.iter().any(|&b| b != 0))
    }

    /// A short label for log messages.
    pub fn label(&self) -> String {
        match (&self.field_name, self.object_ref) {
            (Some(name), _) => name.clone(),
            (None, Some(r)) => r.to_string(),
            (None, None) => "<inline>".to_string(),
        }
    }
}

/// Parse a PDF date string (PDF Spec 7.9.4), e.g. `D:20240315120000+01'00'`.
///
/// Missing trailing fields default to their lowest value and a missing
/// offset means UTC.
pub fn parse_pdf_date(value: &str) -> Option<DateTime<Utc>> {
    let caps = RE_PDF_DATE.captures(value.trim())?;
    let field = |i: usize, default: u32| -> Option<u32> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(default),
        }
    };

    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, field(2, 1)?, field(3, 1)?)?;
    let naive = date.and_hms_opt(field(4, 0)?, field(5, 0)?, field(6, 0)?)?;

    let offset_secs = match caps.get(8) {
        Some(sign) => {
            let secs = (field(9, 0)? * 3600 + field(10, 0)? * 60) as i32;
            if sign.as_str() == "-" {
                -secs
            } else {
                secs
            }
        },
        None => 0,
    };
    let offset = FixedOffset::east_opt(offset_secs)?;
    offset.from_local_datetime(&naive).single().map(|dt| dt.with_timezone(&Utc))
}

/// What one revision exposes to discovery.
#[derive(Debug, Clone, Default)]
pub struct RevisionView {
    /// Signature dictionaries with a usable `/SubFilter`, in form-field order
    pub dictionaries: Vec<SignatureDictionary>,
    /// The revision's `/DSS`, if it has one
    pub dss: Option<Arc<DssDictionary>>,
}

/// Container access used by the graph builder.
///
/// The builder never looks at PDF syntax itself; it only asks for the
/// signature dictionaries of a revision and for the bytes that preceded one
/// of them.
pub trait RevisionPeeler {
    /// Signature dictionaries visible in the most recent revision of `revision`.
    fn extract_attestations(&self, revision: &Bytes) -> Result<RevisionView>;

    /// The document prefix that existed before `dictionary` was appended.
    ///
    /// Fails with [`Error::NoSignatureFound`] when the slot has no payload,
    /// and with [`Error::NonTerminatingRevisionChain`] when the claimed prefix
    /// is not shorter than `revision`.
    fn prior_revision_bytes(&self, dictionary: &SignatureDictionary, revision: &Bytes) -> Result<Bytes>;
}

/// [`RevisionPeeler`] over [`PdfDocument`].
#[derive(Debug, Clone, Default)]
pub struct PdfRevisionPeeler {
    options: ParserOptions,
}

impl PdfRevisionPeeler {
    /// Create a peeler with specific parser options.
    pub fn new(options: ParserOptions) -> Self {
        Self { options }
    }

    fn resolved_value(doc: &mut PdfDocument, field: &SignatureField) -> Dictionary {
        let mut value = field.value.clone();
        for key in ["SubFilter", "ByteRange", "Contents", "M", "Name", "Reason", "Location", "ContactInfo"] {
            if let Some(Object::Reference(_)) = value.get(key) {
                match doc.resolve_entry(&field.value, key) {
                    Some(resolved) => {
                        value.insert(key.to_string(), resolved);
                    },
                    None => {
                        value.remove(key);
                    },
                }
            }
        }
        value
    }
}

impl RevisionPeeler for PdfRevisionPeeler {
    fn extract_attestations(&self, revision: &Bytes) -> Result<RevisionView> {
        let mut doc = PdfDocument::from_bytes_with_options(revision.clone(), self.options)?;

        let dss = match doc.dss_dictionary() {
            Ok(dss) => dss.map(Arc::new),
            Err(e) => {
                log::warn!("ignoring unreadable /DSS: {}", e);
                None
            },
        };

        let mut dictionaries = Vec::new();
        for field in doc.signature_fields()? {
            let value = Self::resolved_value(&mut doc, &field);
            let dictionary = SignatureDictionary::from_dictionary(&value, field.name.clone(), field.value_ref);
            if dictionary.sub_filter.is_none() {
                log::warn!("skipping signature {} with a blank /SubFilter", dictionary.label());
                continue;
            }
            dictionaries.push(dictionary);
        }

        Ok(RevisionView { dictionaries, dss })
    }

    fn prior_revision_bytes(&self, dictionary: &SignatureDictionary, revision: &Bytes) -> Result<Bytes> {
        if !dictionary.has_payload() {
            return Err(Error::NoSignatureFound);
        }
        let byte_range = dictionary
            .byte_range
            .ok_or_else(|| Error::InvalidByteRange(format!("{} has no /ByteRange", dictionary.label())))?;
        let len = byte_range.prior_revision_len();
        if len >= revision.len() {
            return Err(Error::NonTerminatingRevisionChain {
                previous: revision.len(),
                claimed: len,
            });
        }
        Ok(revision.slice(..len))
    }
}
