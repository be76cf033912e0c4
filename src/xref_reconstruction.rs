//! Cross-reference reconstruction for damaged revisions.
//!
//! Used when the declared xref cannot be read: every `N G obj` header in the
//! buffer is indexed (the last definition of an object number wins, as an
//! incremental update would), objects held by object streams are added as
//! compressed entries, and a trailer is recovered from the last `trailer`
//! keyword or, failing that, synthesised from the catalog object.

use std::collections::HashMap;

use bytes::Bytes;
use lazy_static::lazy_static;

use crate::error::{Error, Result};
use crate::object::{Dictionary, Object, ObjectRef};
use crate::objstm::ObjectStream;
use crate::parser::{parse_indirect_object_at, parse_object};
use crate::parser_config::ParserOptions;
use crate::xref::{CrossRefTable, XRefEntry};

lazy_static! {
    static ref RE_OBJ_HEADER: regex::bytes::Regex =
        regex::bytes::Regex::new(r"(?-u)(?:^|[\s\x00])(\d{1,10})\s+(\d{1,5})\s+obj\b").unwrap();
    static ref RE_TRAILER: regex::bytes::Regex = regex::bytes::Regex::new(r"trailer\s*<<").unwrap();
}

/// Rebuild a cross-reference table by scanning `data`.
pub fn reconstruct_xref(data: &Bytes, options: &ParserOptions) -> Result<CrossRefTable> {
    log::info!("Reconstructing xref by scanning {} bytes", data.len());

    let mut offsets: HashMap<u32, (usize, u16)> = HashMap::new();
    for caps in RE_OBJ_HEADER.captures_iter(data) {
        let (Some(id), Some(gen)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        let id = std::str::from_utf8(id.as_bytes()).ok().and_then(|s| s.parse::<u32>().ok());
        let gen = std::str::from_utf8(gen.as_bytes()).ok().and_then(|s| s.parse::<u16>().ok());
        if let (Some(id_num), Some(gen_num), Some(start)) = (id, gen, caps.get(1).map(|m| m.start())) {
            offsets.insert(id_num, (start, gen_num));
        }
    }
    if offsets.is_empty() {
        return Err(Error::InvalidPdf("no objects found while reconstructing xref".to_string()));
    }

    let mut table = CrossRefTable::new();
    let mut catalog = None;
    let mut xref_stream_trailer: Option<Dictionary> = None;

    let mut ids: Vec<_> = offsets.iter().map(|(&id, &(offset, gen))| (offset, id, gen)).collect();
    ids.sort_unstable();
    for (offset, id, gen) in ids {
        table.insert(id, XRefEntry::Uncompressed { offset, gen });
        let Ok((_, obj)) = parse_indirect_object_at(data, offset) else {
            continue;
        };
        let type_name = obj.as_dict().and_then(|d| d.get("Type")).and_then(Object::as_name);
        match type_name {
            Some("Catalog") => catalog = Some(ObjectRef::new(id, gen)),
            Some("XRef") if obj.as_dict().is_some_and(|d| d.contains_key("Root")) => {
                xref_stream_trailer = obj.as_dict().cloned();
            },
            Some("ObjStm") => match ObjectStream::parse(&obj, options) {
                Ok(stream) => {
                    for (index, inner) in stream.ids().enumerate() {
                        if !offsets.contains_key(&inner) {
                            table.insert(
                                inner,
                                XRefEntry::Compressed {
                                    stream_id: id,
                                    index: index as u32,
                                },
                            );
                        }
                        if catalog.is_none()
                            && stream
                                .get(inner)
                                .and_then(Object::as_dict)
                                .and_then(|d| d.get("Type"))
                                .and_then(Object::as_name)
                                == Some("Catalog")
                        {
                            catalog = Some(ObjectRef::new(inner, 0));
                        }
                    }
                },
                Err(e) => log::warn!("skipping unreadable object stream {}: {}", id, e),
            },
            _ => {},
        }
    }

    let trailer = last_trailer(data)
        .or(xref_stream_trailer)
        .filter(|t| t.contains_key("Root"))
        .or_else(|| {
            catalog.map(|root| {
                let mut t = Dictionary::new();
                t.insert("Root".to_string(), Object::Reference(root));
                t
            })
        })
        .ok_or_else(|| Error::InvalidPdf("no trailer or catalog found".to_string()))?;
    table.set_trailer(trailer);

    log::info!("Reconstructed xref with {} entries", table.len());
    Ok(table)
}

fn last_trailer(data: &[u8]) -> Option<Dictionary> {
    let m = RE_TRAILER.find_iter(data).last()?;
    let (_, obj) = parse_object(&data[m.start() + b"trailer".len()..]).ok()?;
    match obj {
        Object::Dictionary(dict) => Some(dict),
        _ => None,
    }
}
