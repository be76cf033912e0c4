//! PDF object parser.
//!
//! Recursive descent over the token stream produced by [`crate::lexer`].
//! Integers are speculatively extended into `N G R` references, streams are
//! sliced out of the input using `/Length` when it is a direct integer that
//! lands on `endstream`, and by scanning for `endstream` otherwise.
//!
//! All entry points return nom's `IResult` so callers can continue from the
//! remaining input; `parse_indirect_object_at` wraps that into the crate
//! `Result` with a byte offset for error reporting.

use bytes::Bytes;
use nom::IResult;

use crate::error::{Error, Result};
use crate::lexer::{is_whitespace, skip_ws, token, Token};
use crate::object::{Dictionary, Object, ObjectRef};

const MAX_NESTING: usize = 100;

fn fail(input: &[u8], kind: nom::error::ErrorKind) -> nom::Err<nom::error::Error<&[u8]>> {
    nom::Err::Error(nom::error::Error::new(input, kind))
}

/// Decode escape sequences in literal strings (PDF Spec 7.3.4.2).
///
/// ```
/// # use pades_oxide::parser::decode_literal_string_escapes;
/// assert_eq!(decode_literal_string_escapes(b"a\\(b\\)\\101"), b"a(b)A");
/// ```
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        let c = raw[i];
        if c != b'\\' || i + 1 >= raw.len() {
            out.push(c);
            i += 1;
            continue;
        }
        let next = raw[i + 1];
        i += 2;
        match next {
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'\r' => {
                if raw.get(i) == Some(&b'\n') {
                    i += 1;
                }
            },
            b'\n' => {},
            b'0'..=b'7' => {
                let mut value = (next - b'0') as u32;
                let mut digits = 1;
                while digits < 3 && i < raw.len() && (b'0'..=b'7').contains(&raw[i]) {
                    value = value * 8 + (raw[i] - b'0') as u32;
                    i += 1;
                    digits += 1;
                }
                out.push((value & 0xFF) as u8);
            },
            other => out.push(other),
        }
    }
    out
}

/// Decode a hex string body; whitespace is ignored and an odd final digit is padded with 0.
pub fn decode_hex(hex: &[u8]) -> Result<Vec<u8>> {
    let digits: Vec<u8> = hex.iter().copied().filter(|c| !is_whitespace(*c)).collect();
    let mut out = Vec::with_capacity(digits.len().div_ceil(2));
    for pair in digits.chunks(2) {
        let hi = hex_value(pair[0])?;
        let lo = match pair.get(1) {
            Some(&c) => hex_value(c)?,
            None => 0,
        };
        out.push(hi << 4 | lo);
    }
    Ok(out)
}

fn hex_value(c: u8) -> Result<u8> {
    (c as char)
        .to_digit(16)
        .map(|d| d as u8)
        .ok_or_else(|| Error::Decode(format!("invalid hex digit 0x{:02X}", c)))
}

/// Parse one direct object (which may be a reference).
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    parse_nested(input, 0)
}

fn parse_nested(input: &[u8], depth: usize) -> IResult<&[u8], Object> {
    if depth > MAX_NESTING {
        return Err(nom::Err::Failure(nom::error::Error::new(input, nom::error::ErrorKind::TooLarge)));
    }
    let (rest, tok) = token(input)?;
    match tok {
        Token::Integer(n) => Ok(try_reference(rest, n).unwrap_or((rest, Object::Integer(n)))),
        Token::Real(r) => Ok((rest, Object::Real(r))),
        Token::LiteralString(raw) => Ok((rest, Object::String(decode_literal_string_escapes(raw)))),
        Token::HexString(raw) => {
            let bytes = decode_hex(raw).map_err(|_| fail(input, nom::error::ErrorKind::HexDigit))?;
            Ok((rest, Object::String(bytes)))
        },
        Token::Name(name) => Ok((rest, Object::Name(name))),
        Token::Keyword(b"true") => Ok((rest, Object::Boolean(true))),
        Token::Keyword(b"false") => Ok((rest, Object::Boolean(false))),
        Token::Keyword(b"null") => Ok((rest, Object::Null)),
        Token::ArrayStart => parse_array_body(rest, depth),
        Token::DictStart => parse_dictionary_body(rest, depth),
        _ => Err(fail(input, nom::error::ErrorKind::Alt)),
    }
}

fn try_reference(input: &[u8], id: i64) -> Option<(&[u8], Object)> {
    let (rest, gen) = match token(input).ok()? {
        (rest, Token::Integer(gen)) => (rest, gen),
        _ => return None,
    };
    match token(rest).ok()? {
        (rest, Token::Keyword(b"R")) => {
            let id = u32::try_from(id).ok()?;
            let gen = u16::try_from(gen).ok()?;
            Some((rest, Object::Reference(ObjectRef::new(id, gen))))
        },
        _ => None,
    }
}

fn parse_array_body(mut input: &[u8], depth: usize) -> IResult<&[u8], Object> {
    let mut items = Vec::new();
    loop {
        if let Ok((rest, Token::ArrayEnd)) = token(input) {
            return Ok((rest, Object::Array(items)));
        }
        let (rest, item) = parse_nested(input, depth + 1)?;
        items.push(item);
        input = rest;
    }
}

fn parse_dictionary_body(mut input: &[u8], depth: usize) -> IResult<&[u8], Object> {
    let mut dict = Dictionary::new();
    loop {
        let (rest, tok) = token(input)?;
        match tok {
            Token::DictEnd => return Ok((rest, Object::Dictionary(dict))),
            Token::Name(key) => {
                let (rest, value) = parse_nested(rest, depth + 1)?;
                // A null value is equivalent to an absent entry (PDF Spec 7.3.7).
                if !value.is_null() {
                    dict.insert(key, value);
                }
                input = rest;
            },
            _ => return Err(fail(input, nom::error::ErrorKind::Tag)),
        }
    }
}

/// Parse `N G obj ... endobj`, including stream payloads.
///
/// `source` must be the same buffer `input` was sliced from; stream data is
/// returned as a zero-copy slice of it.
pub fn parse_indirect_object<'a>(
    source: &Bytes,
    input: &'a [u8],
) -> IResult<&'a [u8], (ObjectRef, Object)> {
    let (rest, id) = match token(input)? {
        (rest, Token::Integer(id)) if id >= 0 => (rest, id),
        _ => return Err(fail(input, nom::error::ErrorKind::Digit)),
    };
    let (rest, gen) = match token(rest)? {
        (rest, Token::Integer(gen)) if gen >= 0 => (rest, gen),
        _ => return Err(fail(rest, nom::error::ErrorKind::Digit)),
    };
    let rest = match token(rest)? {
        (rest, Token::Keyword(b"obj")) => rest,
        _ => return Err(fail(rest, nom::error::ErrorKind::Tag)),
    };
    let obj_ref = ObjectRef::new(id as u32, gen.min(u16::MAX as i64) as u16);

    let (rest, object) = parse_object(rest)?;
    let (rest, object) = match (object, token(rest)) {
        (Object::Dictionary(dict), Ok((after, Token::Keyword(b"stream")))) => {
            let (after, data) = parse_stream_data(source, after, &dict)?;
            (after, Object::Stream { dict, data })
        },
        (object, _) => (rest, object),
    };

    // `endobj` is frequently missing in damaged files; tolerate its absence.
    let rest = match token(rest) {
        Ok((after, Token::Keyword(b"endobj"))) => after,
        _ => rest,
    };
    Ok((rest, (obj_ref, object)))
}

/// Parse the indirect object starting at `offset` of `source`.
pub fn parse_indirect_object_at(source: &Bytes, offset: usize) -> Result<(ObjectRef, Object)> {
    let input = source.get(offset..).ok_or(Error::UnexpectedEof)?;
    parse_indirect_object(source, input)
        .map(|(_, parsed)| parsed)
        .map_err(|e| Error::ParseError {
            offset,
            reason: format!("{:?}", e.map_input(|i: &[u8]| i.len())),
        })
}

fn parse_stream_data<'a>(
    source: &Bytes,
    input: &'a [u8],
    dict: &Dictionary,
) -> IResult<&'a [u8], Bytes> {
    // Keyword `stream` is followed by CRLF or LF (PDF Spec 7.3.8.1).
    let body = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        &input[1..]
    } else {
        input
    };

    let declared = dict
        .get("Length")
        .and_then(Object::as_integer)
        .and_then(|len| usize::try_from(len).ok())
        .filter(|&len| len <= body.len() && skip_ws(&body[len..]).starts_with(b"endstream"));

    let len = match declared.or_else(|| find_endstream(body)) {
        Some(len) => len,
        None => return Err(fail(input, nom::error::ErrorKind::Eof)),
    };

    let data = slice_of(source, &body[..len]);
    let after = skip_ws(&body[len..]);
    let after = after.strip_prefix(b"endstream".as_slice()).unwrap_or(after);
    Ok((after, data))
}

fn find_endstream(body: &[u8]) -> Option<usize> {
    let pos = body.windows(9).position(|w| w == b"endstream")?;
    let mut end = pos;
    if end > 0 && body[end - 1] == b'\n' {
        end -= 1;
    }
    if end > 0 && body[end - 1] == b'\r' {
        end -= 1;
    }
    Some(end)
}

/// Re-slice `sub` out of `source` without copying when it points into it.
fn slice_of(source: &Bytes, sub: &[u8]) -> Bytes {
    let base = source.as_ptr() as usize;
    let start = sub.as_ptr() as usize;
    if start >= base && start + sub.len() <= base + source.len() {
        source.slice(start - base..start - base + sub.len())
    } else {
        Bytes::copy_from_slice(sub)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference_vs_integers() {
        let (_, obj) = parse_object(b"12 0 R").unwrap();
        assert_eq!(obj, Object::Reference(ObjectRef::new(12, 0)));

        let (_, obj) = parse_object(b"[0 1234 5678 9]").unwrap();
        assert_eq!(
            obj,
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(1234),
                Object::Integer(5678),
                Object::Integer(9)
            ])
        );
    }

    #[test]
    fn test_parse_signature_dictionary() {
        let input = b"<</Type/Sig/Filter/Adobe.PPKLite/SubFilter/ETSI.CAdES.detached\
            /ByteRange[0 10 20 5]/Contents<3082ABCD>/M(D:20240101120000Z)/V 5 0 R>>";
        let (_, obj) = parse_object(input).unwrap();
        let dict = obj.as_dict().unwrap();
        assert_eq!(dict.get("SubFilter").and_then(Object::as_name), Some("ETSI.CAdES.detached"));
        assert_eq!(dict.get("Contents").and_then(Object::as_string), Some(&[0x30, 0x82, 0xAB, 0xCD][..]));
        assert_eq!(dict.get("V"), Some(&Object::Reference(ObjectRef::new(5, 0))));
        assert_eq!(dict.get("ByteRange").and_then(Object::as_array).map(Vec::len), Some(4));
    }

    #[test]
    fn test_null_values_dropped() {
        let (_, obj) = parse_object(b"<</A null/B 1>>").unwrap();
        let dict = obj.as_dict().unwrap();
        assert!(!dict.contains_key("A"));
        assert!(dict.contains_key("B"));
    }

    #[test]
    fn test_indirect_stream_with_length() {
        let src = Bytes::from_static(b"7 0 obj\n<</Length 5>>\nstream\nhello\nendstream\nendobj\n");
        let (obj_ref, obj) = parse_indirect_object_at(&src, 0).unwrap();
        assert_eq!(obj_ref, ObjectRef::new(7, 0));
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"hello"),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_indirect_stream_with_indirect_length() {
        let src = Bytes::from_static(b"3 0 obj <</Length 9 0 R>> stream\r\nab\ncd\r\nendstream endobj");
        let (_, obj) = parse_indirect_object_at(&src, 0).unwrap();
        match obj {
            Object::Stream { data, .. } => assert_eq!(&data[..], b"ab\ncd"),
            other => panic!("expected stream, got {:?}", other),
        }
    }

    #[test]
    fn test_literal_escapes() {
        assert_eq!(decode_literal_string_escapes(b"line\\nbreak"), b"line\nbreak");
        assert_eq!(decode_literal_string_escapes(b"\\247"), vec![0xA7]);
        assert_eq!(decode_literal_string_escapes(b"join\\\nme"), b"joinme");
    }

    #[test]
    fn test_decode_hex_odd_and_spaces() {
        assert_eq!(decode_hex(b"48 65 6C 6C 6F").unwrap(), b"Hello");
        assert_eq!(decode_hex(b"ABC").unwrap(), vec![0xAB, 0xC0]);
        assert!(decode_hex(b"ZZ").is_err());
    }

    #[test]
    fn test_missing_endobj_tolerated() {
        let src = Bytes::from_static(b"4 0 obj <</Type/Catalog>> 5 0 obj");
        let (obj_ref, obj) = parse_indirect_object_at(&src, 0).unwrap();
        assert_eq!(obj_ref.id, 4);
        assert!(obj.as_dict().is_some());
    }
}
