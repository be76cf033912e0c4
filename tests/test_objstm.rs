//! Tests for object stream parsing (PDF 1.5+ feature).
//!
//! Signature and `/DSS` dictionaries written by modern signing tools are
//! often stored compressed inside object streams.

use std::collections::HashMap;
use std::io::Write;

use bytes::Bytes;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use pades_oxide::object::Object;
use pades_oxide::objstm::ObjectStream;
use pades_oxide::ParserOptions;

/// Helper to create a test object stream, optionally FlateDecode compressed.
fn create_test_object_stream(n: i64, first: i64, data: &[u8], compress: bool) -> Object {
    let mut dict = HashMap::new();
    dict.insert("Type".to_string(), Object::Name("ObjStm".to_string()));
    dict.insert("N".to_string(), Object::Integer(n));
    dict.insert("First".to_string(), Object::Integer(first));

    let data = if compress {
        dict.insert("Filter".to_string(), Object::Name("FlateDecode".to_string()));
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    } else {
        data.to_vec()
    };
    dict.insert("Length".to_string(), Object::Integer(data.len() as i64));

    Object::Stream {
        dict,
        data: Bytes::from(data),
    }
}

fn stream_of(pairs: &[u8], objects: &[u8], n: i64, compress: bool) -> Object {
    let mut data = pairs.to_vec();
    data.extend_from_slice(objects);
    create_test_object_stream(n, pairs.len() as i64, &data, compress)
}

#[test]
fn test_parse_object_stream_basic() {
    // Object 10: integer 42, object 11: name /Test
    let stream = stream_of(b"10 0 11 3 ", b"42 /Test", 2, false);
    let result = ObjectStream::parse(&stream, &ParserOptions::default()).unwrap();

    assert_eq!(result.ids().collect::<Vec<_>>(), vec![10, 11]);
    assert_eq!(result.get(10).unwrap().as_integer(), Some(42));
    assert_eq!(result.get(11).unwrap().as_name(), Some("Test"));
    assert_eq!(result.at(1).map(|(id, _)| *id), Some(11));
}

#[test]
fn test_compressed_signature_dictionary() {
    let sig = b"<</Type/Sig/SubFilter/ETSI.CAdES.detached/ByteRange[0 10 20 5]/Contents<0102>>>";
    let field = b"<</FT/Sig/T(Signature1)/V 7 0 R>>";
    let pairs = format!("6 0 7 {} ", field.len() + 1);
    let mut objects = field.to_vec();
    objects.push(b' ');
    objects.extend_from_slice(sig);

    let stream = stream_of(pairs.as_bytes(), &objects, 2, true);
    let result = ObjectStream::parse(&stream, &ParserOptions::default()).unwrap();

    let value = result.get(7).unwrap().as_dict().unwrap();
    assert_eq!(value.get("SubFilter").and_then(Object::as_name), Some("ETSI.CAdES.detached"));
    assert_eq!(value.get("Contents").and_then(Object::as_string), Some(&[1u8, 2][..]));
    let field = result.get(6).unwrap().as_dict().unwrap();
    assert_eq!(field.get("V").and_then(Object::as_reference).map(|r| r.id), Some(7));
}

#[test]
fn test_short_header_keeps_parsed_objects() {
    // /N claims three objects, the header only lists two.
    let stream = stream_of(b"1 0 2 5 ", b"true false", 3, false);
    let result = ObjectStream::parse(&stream, &ParserOptions::default()).unwrap();
    assert_eq!(result.ids().count(), 2);
    assert!(result.get(3).is_none());
}

#[test]
fn test_offset_outside_stream_is_skipped() {
    let stream = stream_of(b"1 0 2 500 ", b"(kept)", 2, false);
    let result = ObjectStream::parse(&stream, &ParserOptions::default()).unwrap();
    assert!(result.get(1).is_some());
    assert!(result.get(2).is_none());
}

#[test]
fn test_missing_first_is_an_error() {
    let mut dict = HashMap::new();
    dict.insert("N".to_string(), Object::Integer(1));
    let stream = Object::Stream {
        dict,
        data: Bytes::from_static(b"1 0 42"),
    };
    assert!(ObjectStream::parse(&stream, &ParserOptions::default()).is_err());
}

#[test]
fn test_not_a_stream() {
    assert!(ObjectStream::parse(&Object::Integer(3), &ParserOptions::default()).is_err());
}
