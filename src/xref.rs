//! Cross-reference reading.
//!
//! PDF Spec: ISO 32000-1:2008, Section 7.5.4 (xref tables), 7.5.8 (xref
//! streams) and 7.5.6 (incremental updates).
//!
//! Signed documents are almost always incrementally updated, so a table is
//! the merge of a `/Prev` chain of sections where the newest entry for an
//! object number wins. Hybrid files add a `/XRefStm` section that ranks
//! just below the classic section it is attached to.

use std::collections::{HashMap, HashSet};

use bytes::Bytes;

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dictionary, Object};
use crate::parser::{parse_indirect_object_at, parse_object};
use crate::parser_config::ParserOptions;

/// Location of one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XRefEntry {
    /// Deleted object; shadows older definitions.
    Free,
    /// Object stored at a byte offset.
    Uncompressed {
        /// Offset of `N G obj`, relative to the start of the buffer
        offset: usize,
        /// Generation number
        gen: u16,
    },
    /// Object stored inside an object stream.
    Compressed {
        /// Object number of the containing object stream
        stream_id: u32,
        /// Index within that stream
        index: u32,
    },
}

/// Merged cross-reference table plus the effective trailer.
#[derive(Debug, Clone, Default)]
pub struct CrossRefTable {
    entries: HashMap<u32, XRefEntry>,
    trailer: Dictionary,
}

impl CrossRefTable {
    /// Create a new empty cross-reference table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace an entry.
    pub fn insert(&mut self, id: u32, entry: XRefEntry) {
        self.entries.insert(id, entry);
    }

    /// Entry for an object number.
    pub fn get(&self, id: u32) -> Option<&XRefEntry> {
        self.entries.get(&id)
    }

    /// Effective trailer dictionary.
    pub fn trailer(&self) -> &Dictionary {
        &self.trailer
    }

    /// Replace the trailer dictionary.
    pub fn set_trailer(&mut self, trailer: Dictionary) {
        self.trailer = trailer;
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the table has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Fold an older section underneath this one: existing entries and
    /// trailer keys are kept, missing ones are taken from `older`.
    pub fn merge_older(&mut self, older: CrossRefTable) {
        for (id, entry) in older.entries {
            self.entries.entry(id).or_insert(entry);
        }
        for (key, value) in older.trailer {
            self.trailer.entry(key).or_insert(value);
        }
    }
}

/// Locate the offset announced by the last `startxref` keyword.
///
/// The whole buffer is searched backwards: a prior-revision prefix ends in
/// the middle of the next revision's objects, far from its own trailer.
pub fn find_startxref(data: &[u8]) -> Result<usize> {
    const KEYWORD: &[u8] = b"startxref";
    let pos = data
        .windows(KEYWORD.len())
        .rposition(|w| w == KEYWORD)
        .ok_or(Error::InvalidXref)?;
    match token(&data[pos + KEYWORD.len()..]) {
        Ok((_, Token::Integer(offset))) if offset >= 0 => Ok(offset as usize),
        _ => Err(Error::InvalidXref),
    }
}

/// Read the cross-reference chain starting at `start`.
///
/// `base` is the position of `%PDF-` in the buffer; declared offsets are
/// shifted by it so that files with leading garbage still resolve.
pub fn read_xref_chain(
    data: &Bytes,
    start: usize,
    base: usize,
    options: &ParserOptions,
) -> Result<CrossRefTable> {
    let mut table = CrossRefTable::new();
    let mut visited = HashSet::new();
    let mut next = Some(start);
    let mut sections = 0u32;

    while let Some(offset) = next {
        if !visited.insert(offset) {
            log::warn!("xref /Prev loop at offset {}", offset);
            break;
        }
        sections += 1;
        if sections > options.max_xref_chain {
            return Err(Error::RecursionLimitExceeded(options.max_xref_chain));
        }

        let section = read_section(data, offset + base, base, options)?;
        next = section
            .trailer
            .get("Prev")
            .and_then(Object::as_integer)
            .and_then(|p| usize::try_from(p).ok());
        table.merge_older(section);
    }

    if !table.trailer.contains_key("Root") {
        return Err(Error::InvalidPdf("trailer has no /Root".to_string()));
    }
    // A merged trailer must not keep pointing backwards.
    table.trailer.remove("Prev");
    Ok(table)
}

fn read_section(data: &Bytes, at: usize, base: usize, options: &ParserOptions) -> Result<CrossRefTable> {
    let input = data.get(at..).ok_or(Error::InvalidXref)?;
    match token(input) {
        Ok((_, Token::Keyword(b"xref"))) => {
            let mut section = parse_classic_section(input, base)?;
            let hybrid = section
                .trailer
                .get("XRefStm")
                .and_then(Object::as_integer)
                .and_then(|p| usize::try_from(p).ok());
            if let Some(stm_offset) = hybrid {
                match parse_xref_stream(data, stm_offset + base, base, options) {
                    Ok(mut stm) => {
                        stm.trailer.clear();
                        section.merge_older(stm);
                    },
                    Err(e) => log::warn!("ignoring unreadable /XRefStm at {}: {}", stm_offset, e),
                }
            }
            Ok(section)
        },
        Ok((_, Token::Integer(_))) => parse_xref_stream(data, at, base, options),
        _ => Err(Error::InvalidXref),
    }
}

fn parse_classic_section(input: &[u8], base: usize) -> Result<CrossRefTable> {
    let (mut rest, _) = token(input).map_err(|_| Error::InvalidXref)?;
    let mut table = CrossRefTable::new();

    loop {
        let (after, first) = token(rest).map_err(|_| Error::InvalidXref)?;
        let first = match first {
            Token::Keyword(b"trailer") => {
                let (_, trailer) = parse_object(after).map_err(|_| Error::InvalidXref)?;
                match trailer {
                    Object::Dictionary(dict) => table.trailer = dict,
                    _ => return Err(Error::InvalidXref),
                }
                return Ok(table);
            },
            Token::Integer(first) if first >= 0 => first as u32,
            _ => return Err(Error::InvalidXref),
        };
        let (after, count) = match token(after) {
            Ok((after, Token::Integer(count))) if count >= 0 => (after, count as u32),
            _ => return Err(Error::InvalidXref),
        };
        rest = after;

        for i in 0..count {
            let (after, offset) = match token(rest) {
                Ok((after, Token::Integer(v))) => (after, v),
                _ => return Err(Error::InvalidXref),
            };
            let (after, gen) = match token(after) {
                Ok((after, Token::Integer(v))) => (after, v),
                _ => return Err(Error::InvalidXref),
            };
            let (after, kind) = match token(after) {
                Ok((after, Token::Keyword(kind))) => (after, kind),
                _ => return Err(Error::InvalidXref),
            };
            rest = after;

            let entry = match kind {
                b"n" if offset > 0 => XRefEntry::Uncompressed {
                    offset: offset as usize + base,
                    gen: gen.clamp(0, u16::MAX as i64) as u16,
                },
                b"n" | b"f" => XRefEntry::Free,
                _ => return Err(Error::InvalidXref),
            };
            table.entries.entry(first + i).or_insert(entry);
        }
    }
}

fn parse_xref_stream(data: &Bytes, at: usize, base: usize, options: &ParserOptions) -> Result<CrossRefTable> {
    let (_, stream) = parse_indirect_object_at(data, at)?;
    let dict = stream.as_dict().cloned().ok_or(Error::InvalidXref)?;
    if dict.get("Type").and_then(Object::as_name) != Some("XRef") {
        return Err(Error::InvalidXref);
    }
    let decoded = stream.decode_stream_data(options)?;

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(Object::as_array)
        .ok_or(Error::InvalidXref)?
        .iter()
        .map(|w| w.as_integer().and_then(|v| usize::try_from(v).ok()).ok_or(Error::InvalidXref))
        .collect::<Result<_>>()?;
    if widths.len() != 3 || widths.iter().any(|&w| w > 8) {
        return Err(Error::InvalidXref);
    }
    let row_len: usize = widths.iter().sum();
    if row_len == 0 {
        return Err(Error::InvalidXref);
    }

    let size = dict.get("Size").and_then(Object::as_integer).unwrap_or(0);
    let index: Vec<i64> = match dict.get("Index").and_then(Object::as_array) {
        Some(items) => items.iter().filter_map(Object::as_integer).collect(),
        None => vec![0, size],
    };

    let mut table = CrossRefTable::new();
    let mut rows = decoded.chunks_exact(row_len);
    for pair in index.chunks_exact(2) {
        let (first, count) = (pair[0].max(0) as u32, pair[1].max(0) as u32);
        for i in 0..count {
            let Some(row) = rows.next() else {
                log::warn!("xref stream shorter than its /Index claims");
                break;
            };
            let (f1, rest) = row.split_at(widths[0]);
            let (f2, f3) = rest.split_at(widths[1]);
            let kind = if widths[0] == 0 { 1 } else { read_int(f1) };
            let entry = match kind {
                0 => XRefEntry::Free,
                1 => XRefEntry::Uncompressed {
                    offset: read_int(f2) as usize + base,
                    gen: read_int(f3).min(u16::MAX as u64) as u16,
                },
                2 => XRefEntry::Compressed {
                    stream_id: read_int(f2) as u32,
                    index: read_int(f3) as u32,
                },
                // Unknown types are treated as null references (PDF Spec 7.5.8.3).
                _ => continue,
            };
            table.entries.entry(first + i).or_insert(entry);
        }
    }

    table.trailer = dict;
    Ok(table)
}

fn read_int(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classic(body: &str) -> Bytes {
        Bytes::from(body.as_bytes().to_vec())
    }

    #[test]
    fn test_find_startxref_uses_last_occurrence() {
        let data = b"%PDF-1.7\nstartxref\n10\n%%EOF\nmore\nstartxref\n  42\n%%EOF";
        assert_eq!(find_startxref(data).unwrap(), 42);
    }

    #[test]
    fn test_find_startxref_missing() {
        assert!(matches!(find_startxref(b"%PDF-1.7 nothing"), Err(Error::InvalidXref)));
    }

    #[test]
    fn test_classic_section_with_subsections() {
        let data = classic(
            "xref\n0 2\n0000000000 65535 f \n0000000017 00000 n \n5 1\n0000000200 00001 n \n\
             trailer\n<</Size 6/Root 1 0 R>>\n",
        );
        let table = read_xref_chain(&data, 0, 0, &ParserOptions::default()).unwrap();
        assert_eq!(table.get(0), Some(&XRefEntry::Free));
        assert_eq!(table.get(1), Some(&XRefEntry::Uncompressed { offset: 17, gen: 0 }));
        assert_eq!(table.get(5), Some(&XRefEntry::Uncompressed { offset: 200, gen: 1 }));
        assert!(table.trailer().contains_key("Root"));
    }

    #[test]
    fn test_prev_chain_newest_wins() {
        let older = "xref\n0 3\n0000000000 65535 f \n0000000100 00000 n \n0000000200 00000 n \n\
                     trailer\n<</Size 3/Root 1 0 R/Info 9 0 R>>\n";
        let newer = format!(
            "xref\n2 1\n0000000300 00000 n \ntrailer\n<</Size 3/Root 1 0 R/Prev {}>>\n",
            0
        );
        let mut body = older.to_string();
        let newer_at = body.len();
        body.push_str(&newer);
        let data = classic(&body);

        let table = read_xref_chain(&data, newer_at, 0, &ParserOptions::default()).unwrap();
        assert_eq!(table.get(2), Some(&XRefEntry::Uncompressed { offset: 300, gen: 0 }));
        assert_eq!(table.get(1), Some(&XRefEntry::Uncompressed { offset: 100, gen: 0 }));
        assert!(table.trailer().contains_key("Info"));
        assert!(!table.trailer().contains_key("Prev"));
    }

    #[test]
    fn test_prev_loop_is_broken() {
        let data = classic("xref\n0 1\n0000000000 65535 f \ntrailer\n<</Root 1 0 R/Prev 0>>\n");
        let table = read_xref_chain(&data, 0, 0, &ParserOptions::default()).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_missing_root_rejected() {
        let data = classic("xref\n0 1\n0000000000 65535 f \ntrailer\n<</Size 1>>\n");
        assert!(read_xref_chain(&data, 0, 0, &ParserOptions::default()).is_err());
    }

    #[test]
    fn test_xref_stream_uncompressed_rows() {
        // W [1 2 1]: type 1 at offset 0x0010 gen 0, type 2 in stream 7 index 3
        let rows: Vec<u8> = vec![1, 0x00, 0x10, 0, 2, 0x00, 0x07, 3];
        let mut body = format!(
            "9 0 obj\n<</Type/XRef/W[1 2 1]/Index[4 2]/Size 6/Root 1 0 R/Length {}>>\nstream\n",
            rows.len()
        )
        .into_bytes();
        body.extend_from_slice(&rows);
        body.extend_from_slice(b"\nendstream\nendobj\n");
        let data = Bytes::from(body);

        let table = read_xref_chain(&data, 0, 0, &ParserOptions::default()).unwrap();
        assert_eq!(table.get(4), Some(&XRefEntry::Uncompressed { offset: 16, gen: 0 }));
        assert_eq!(table.get(5), Some(&XRefEntry::Compressed { stream_id: 7, index: 3 }));
    }

    #[test]
    fn test_read_int() {
        assert_eq!(read_int(&[0x01, 0x00]), 256);
        assert_eq!(read_int(&[]), 0);
    }
}
