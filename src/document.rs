//! In-memory PDF document.
//!
//! A [`PdfDocument`] is a read-only view over one byte snapshot of a file.
//! Because incremental updates only ever append, any prefix ending after a
//! revision's `%%EOF` opens as that earlier revision; signature discovery
//! relies on this to rewind a document one attestation at a time.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::rc::Rc;

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::objstm::ObjectStream;
use crate::parser::parse_indirect_object_at;
use crate::parser_config::ParserOptions;
use crate::signatures::DssDictionary;
use crate::xref::{find_startxref, read_xref_chain, CrossRefTable, XRefEntry};
use crate::xref_reconstruction::reconstruct_xref;

/// How far into the buffer `%PDF-` may appear.
const HEADER_SEARCH_WINDOW: usize = 1024;

/// A signature form field with a filled-in value (PDF Spec 12.7.4.5).
#[derive(Debug, Clone)]
pub struct SignatureField {
    /// Fully qualified field name (`parent.child`), when named
    pub name: Option<String>,
    /// Indirect reference of the `/V` dictionary, when indirect
    pub value_ref: Option<ObjectRef>,
    /// The signature (or document timestamp) dictionary
    pub value: Dictionary,
}

/// PDF document.
///
/// # Example
///
/// ```no_run
/// use pades_oxide::document::PdfDocument;
///
/// let mut doc = PdfDocument::open("signed.pdf")?;
/// println!("PDF version: {}.{}", doc.version().0, doc.version().1);
/// println!("signature fields: {}", doc.signature_fields()?.len());
/// # Ok::<(), pades_oxide::error::Error>(())
/// ```
pub struct PdfDocument {
    data: Bytes,
    version: (u8, u8),
    xref: CrossRefTable,
    options: ParserOptions,
    object_cache: HashMap<ObjectRef, Object>,
    object_streams: HashMap<u32, Rc<ObjectStream>>,
    resolving_stack: RefCell<HashSet<ObjectRef>>,
    recursion_depth: RefCell<u32>,
}

impl std::fmt::Debug for PdfDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PdfDocument")
            .field("len", &self.data.len())
            .field("version", &self.version)
            .field("xref_entries", &self.xref.len())
            .field("cached_objects", &self.object_cache.len())
            .finish_non_exhaustive()
    }
}

impl PdfDocument {
    /// Open a PDF document from a file path.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref())?;
        Self::from_bytes(data)
    }

    /// Open a document held in memory with default (lenient) options.
    pub fn from_bytes(data: impl Into<Bytes>) -> Result<Self> {
        Self::from_bytes_with_options(data, ParserOptions::default())
    }

    /// Open a document held in memory.
    ///
    /// The declared cross-reference chain is tried first; when it cannot be
    /// read, or its trailer does not lead to a catalog, the table is rebuilt
    /// by scanning if `options.reconstruct_xref` allows it.
    pub fn from_bytes_with_options(data: impl Into<Bytes>, options: ParserOptions) -> Result<Self> {
        let data = data.into();
        let (base, version) = parse_header(&data)?;

        let regular = find_startxref(&data).and_then(|offset| {
            read_xref_chain(&data, offset, base, &options)
                .or_else(|e| if base > 0 { read_xref_chain(&data, offset, 0, &options) } else { Err(e) })
        });

        let mut doc = Self {
            data,
            version,
            xref: CrossRefTable::new(),
            options,
            object_cache: HashMap::new(),
            object_streams: HashMap::new(),
            resolving_stack: RefCell::new(HashSet::new()),
            recursion_depth: RefCell::new(0),
        };

        match regular {
            Ok(xref) => {
                doc.xref = xref;
                match doc.catalog() {
                    Ok(_) => return Ok(doc),
                    Err(e) if options.reconstruct_xref => {
                        log::warn!("catalog unreachable through declared xref ({}), rebuilding", e);
                    },
                    Err(e) => return Err(e),
                }
            },
            Err(e) if options.reconstruct_xref => {
                log::warn!("declared xref unreadable ({}), rebuilding", e);
            },
            Err(e) => return Err(e),
        }

        doc.xref = reconstruct_xref(&doc.data, &options)?;
        doc.object_cache.clear();
        doc.object_streams.clear();
        doc.catalog()?;
        Ok(doc)
    }

    /// PDF version from the header.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// The bytes this document was opened from.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// Effective trailer dictionary.
    pub fn trailer(&self) -> &Dictionary {
        self.xref.trailer()
    }

    /// Parser options in effect.
    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Load an indirect object, using the cache when possible.
    pub fn load_object(&mut self, obj_ref: ObjectRef) -> Result<Object> {
        if let Some(cached) = self.object_cache.get(&obj_ref) {
            return Ok(cached.clone());
        }
        if *self.recursion_depth.borrow() >= self.options.max_recursion_depth {
            return Err(Error::RecursionLimitExceeded(self.options.max_recursion_depth));
        }
        if !self.resolving_stack.borrow_mut().insert(obj_ref) {
            log::error!("Circular reference detected for object {}", obj_ref);
            return Err(Error::CircularReference(obj_ref));
        }
        *self.recursion_depth.borrow_mut() += 1;

        let result = match self.xref.get(obj_ref.id).copied() {
            Some(XRefEntry::Uncompressed { offset, .. }) => self.load_uncompressed(obj_ref, offset),
            Some(XRefEntry::Compressed { stream_id, index }) => {
                self.load_compressed(obj_ref, stream_id, index as usize)
            },
            Some(XRefEntry::Free) | None => Err(Error::ObjectNotFound(obj_ref.id, obj_ref.gen)),
        };

        *self.recursion_depth.borrow_mut() -= 1;
        self.resolving_stack.borrow_mut().remove(&obj_ref);

        let object = result?;
        self.object_cache.insert(obj_ref, object.clone());
        Ok(object)
    }

    fn load_uncompressed(&mut self, obj_ref: ObjectRef, offset: usize) -> Result<Object> {
        let (found, object) = parse_indirect_object_at(&self.data, offset)?;
        if found.id != obj_ref.id {
            log::warn!("xref points {} at offset {} holding {}", obj_ref, offset, found);
            return Err(Error::ObjectNotFound(obj_ref.id, obj_ref.gen));
        }
        Ok(object)
    }

    fn load_compressed(&mut self, obj_ref: ObjectRef, stream_id: u32, index: usize) -> Result<Object> {
        let stream = match self.object_streams.get(&stream_id) {
            Some(stream) => Rc::clone(stream),
            None => {
                let container = self.load_object(ObjectRef::new(stream_id, 0))?;
                let parsed = Rc::new(ObjectStream::parse(&container, &self.options)?);
                self.object_streams.insert(stream_id, Rc::clone(&parsed));
                parsed
            },
        };
        stream
            .get(obj_ref.id)
            .or_else(|| stream.at(index).filter(|(id, _)| *id == obj_ref.id).map(|(_, o)| o))
            .cloned()
            .ok_or(Error::ObjectNotFound(obj_ref.id, obj_ref.gen))
    }

    /// Follow references until a direct object is reached.
    pub fn resolve(&mut self, obj: &Object) -> Result<Object> {
        let mut current = obj.clone();
        let mut hops = 0;
        while let Object::Reference(r) = current {
            hops += 1;
            if hops > self.options.max_recursion_depth {
                return Err(Error::RecursionLimitExceeded(self.options.max_recursion_depth));
            }
            current = self.load_object(r)?;
        }
        Ok(current)
    }

    /// Resolve `key` in `dict`, treating an unresolvable reference as absent.
    pub fn resolve_entry(&mut self, dict: &Dictionary, key: &str) -> Option<Object> {
        let value = dict.get(key)?;
        match self.resolve(value) {
            Ok(Object::Null) => None,
            Ok(obj) => Some(obj),
            Err(e) => {
                log::debug!("cannot resolve /{}: {}", key, e);
                None
            },
        }
    }

    /// The document catalog (`/Root`).
    pub fn catalog(&mut self) -> Result<Dictionary> {
        let root = self
            .trailer()
            .get("Root")
            .cloned()
            .ok_or_else(|| Error::InvalidPdf("trailer has no /Root".to_string()))?;
        match self.resolve(&root)? {
            Object::Dictionary(dict) => Ok(dict),
            other => Err(Error::InvalidObjectType {
                expected: "Dictionary".to_string(),
                found: other.type_name().to_string(),
            }),
        }
    }

    /// Decode a (possibly indirect) stream.
    pub fn stream_data(&mut self, obj: &Object) -> Result<Vec<u8>> {
        let resolved = self.resolve(obj)?;
        resolved.decode_stream_data(&self.options)
    }

    /// The `/DSS` dictionary of this revision, if any.
    pub fn dss_dictionary(&mut self) -> Result<Option<DssDictionary>> {
        let catalog = self.catalog()?;
        DssDictionary::from_catalog(self, &catalog)
    }

    /// Every signature field of the interactive form that has a value.
    ///
    /// The `/AcroForm /Fields` tree is walked depth-first in array order,
    /// inheriting `/FT` through `/Kids`. Values shared by several widgets
    /// are reported once.
    pub fn signature_fields(&mut self) -> Result<Vec<SignatureField>> {
        let catalog = self.catalog()?;
        let Some(acro_form) = self.resolve_entry(&catalog, "AcroForm") else {
            return Ok(Vec::new());
        };
        let Some(fields) = acro_form
            .as_dict()
            .and_then(|d| d.get("Fields").cloned())
            .map(|f| self.resolve(&f))
            .transpose()?
        else {
            return Ok(Vec::new());
        };

        let mut found = Vec::new();
        let mut seen_fields = HashSet::new();
        let mut seen_values = HashSet::new();
        for field in fields.as_array().cloned().unwrap_or_default() {
            self.collect_signature_fields(&field, None, None, 0, &mut seen_fields, &mut seen_values, &mut found)?;
        }
        Ok(found)
    }

    #[allow(clippy::too_many_arguments)]
    fn collect_signature_fields(
        &mut self,
        field: &Object,
        inherited_type: Option<&str>,
        parent_name: Option<&str>,
        depth: usize,
        seen_fields: &mut HashSet<ObjectRef>,
        seen_values: &mut HashSet<ObjectRef>,
        found: &mut Vec<SignatureField>,
    ) -> Result<()> {
        if depth > self.options.max_nesting {
            return Err(Error::RecursionLimitExceeded(self.options.max_nesting as u32));
        }
        if let Some(r) = field.as_reference() {
            if !seen_fields.insert(r) {
                return Ok(());
            }
        }
        let dict = match self.resolve(field) {
            Ok(Object::Dictionary(dict)) => dict,
            Ok(_) => return Ok(()),
            Err(e) => {
                log::warn!("skipping unreadable form field: {}", e);
                return Ok(());
            },
        };

        let field_type = dict.get("FT").and_then(Object::as_name).or(inherited_type).map(str::to_string);
        let partial = dict.get("T").and_then(Object::as_text);
        let name = match (parent_name, partial) {
            (Some(parent), Some(own)) => Some(format!("{}.{}", parent, own)),
            (None, Some(own)) => Some(own),
            (parent, None) => parent.map(str::to_string),
        };

        if field_type.as_deref() == Some("Sig") {
            if let Some(value) = dict.get("V") {
                let value_ref = value.as_reference();
                let fresh = value_ref.map(|r| seen_values.insert(r)).unwrap_or(true);
                if fresh {
                    match self.resolve(value) {
                        Ok(Object::Dictionary(value)) => found.push(SignatureField {
                            name: name.clone(),
                            value_ref,
                            value,
                        }),
                        Ok(_) => {},
                        Err(e) => log::warn!("signature field value unreadable: {}", e),
                    }
                }
            }
        }

        if let Some(kids) = self.resolve_entry(&dict, "Kids") {
            for kid in kids.as_array().cloned().unwrap_or_default() {
                self.collect_signature_fields(
                    &kid,
                    field_type.as_deref(),
                    name.as_deref(),
                    depth + 1,
                    seen_fields,
                    seen_values,
                    found,
                )?;
            }
        }
        Ok(())
    }
}

/// Locate `%PDF-M.m`; returns the header offset and version.
pub fn parse_header(data: &[u8]) -> Result<(usize, (u8, u8))> {
    let window = &data[..data.len().min(HEADER_SEARCH_WINDOW)];
    let pos = window
        .windows(5)
        .position(|w| w == b"%PDF-")
        .ok_or_else(|| {
            let shown = String::from_utf8_lossy(&window[..window.len().min(8)]).into_owned();
            Error::InvalidHeader(shown)
        })?;
    let digits = data.get(pos + 5..pos + 8).unwrap_or_default();
    let version = match digits {
        [major, b'.', minor] if major.is_ascii_digit() && minor.is_ascii_digit() => {
            (major - b'0', minor - b'0')
        },
        _ => {
            log::warn!("unreadable PDF version, assuming 1.7");
            (1, 7)
        },
    };
    Ok((pos, version))
}
