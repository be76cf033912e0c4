//! Object stream parsing (PDF Spec 7.5.7).
//!
//! The decoded payload starts with `/N` pairs of `object-number offset`,
//! offsets being relative to `/First`. Signature dictionaries of documents
//! produced by PDF 1.5+ writers usually live in such streams.

use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::Object;
use crate::parser::parse_object;
use crate::parser_config::ParserOptions;

/// Objects held by one object stream, in header order.
#[derive(Debug, Clone, Default)]
pub struct ObjectStream {
    objects: Vec<(u32, Object)>,
    by_id: HashMap<u32, usize>,
}

impl ObjectStream {
    /// Decode and parse an `/Type /ObjStm` stream.
    pub fn parse(stream: &Object, options: &ParserOptions) -> Result<Self> {
        let dict = stream.as_dict().ok_or_else(|| Error::InvalidObjectType {
            expected: "Stream".to_string(),
            found: stream.type_name().to_string(),
        })?;
        let count = dict
            .get("N")
            .and_then(Object::as_integer)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| Error::InvalidPdf("object stream without /N".to_string()))?;
        let first = dict
            .get("First")
            .and_then(Object::as_integer)
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| Error::InvalidPdf("object stream without /First".to_string()))?;

        let data = stream.decode_stream_data(options)?;
        let mut header: &[u8] = data.get(..first).ok_or(Error::UnexpectedEof)?;
        let mut offsets = Vec::with_capacity(count.min(4096));
        for _ in 0..count {
            let (rest, id) = match token(header) {
                Ok((rest, Token::Integer(id))) if id >= 0 => (rest, id as u32),
                _ => break,
            };
            let (rest, offset) = match token(rest) {
                Ok((rest, Token::Integer(off))) if off >= 0 => (rest, off as usize),
                _ => break,
            };
            offsets.push((id, offset));
            header = rest;
        }
        if offsets.len() != count {
            log::warn!("object stream header lists {} of {} objects", offsets.len(), count);
        }

        let mut objects = Vec::with_capacity(offsets.len());
        let mut by_id = HashMap::with_capacity(offsets.len());
        for (id, offset) in offsets {
            let Some(body) = data.get(first + offset..) else {
                log::warn!("object {} offset {} outside object stream", id, offset);
                continue;
            };
            match parse_object(body) {
                Ok((_, obj)) => {
                    by_id.insert(id, objects.len());
                    objects.push((id, obj));
                },
                Err(e) => log::warn!("failed to parse object {} in object stream: {:?}", id, e.map_input(|i: &[u8]| i.len())),
            }
        }
        Ok(Self { objects, by_id })
    }

    /// Object by number.
    pub fn get(&self, id: u32) -> Option<&Object> {
        self.by_id.get(&id).map(|&i| &self.objects[i].1)
    }

    /// Object by position in the header (the xref `index` field).
    pub fn at(&self, index: usize) -> Option<&(u32, Object)> {
        self.objects.get(index)
    }

    /// Object numbers held by this stream.
    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.objects.iter().map(|(id, _)| *id)
    }
}
