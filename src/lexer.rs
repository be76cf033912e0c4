//! PDF tokenizer built on nom.
//!
//! PDF Spec: ISO 32000-1:2008, Section 7.2 - Lexical Conventions.
//!
//! Keywords are returned as raw byte slices (`obj`, `R`, `trailer`,
//! `startxref`, ...) so that the object parser and the cross-reference
//! reader can share a single token stream. Whitespace and `%` comments
//! are skipped before every token.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while, take_while1},
    character::complete::{char, digit0, digit1, one_of},
    combinator::{map, opt, recognize},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

/// Token types recognized by the lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),
    /// Real number (e.g., 3.14, -.5)
    Real(f64),
    /// Raw literal string content, escapes still encoded
    LiteralString(&'a [u8]),
    /// Raw hex string content, whitespace still present
    HexString(&'a [u8]),
    /// Name with `#XX` escapes decoded
    Name(String),
    /// Bare keyword: true, false, null, obj, endobj, stream, R, ...
    Keyword(&'a [u8]),
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
}

/// PDF whitespace characters (Table 1).
pub fn is_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// PDF delimiter characters (Table 2).
pub fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

fn is_regular(c: u8) -> bool {
    !is_whitespace(c) && !is_delimiter(c)
}

/// Skip whitespace and comments. Never fails.
pub fn skip_ws(input: &[u8]) -> &[u8] {
    let mut rest = input;
    loop {
        let trimmed = match rest.iter().position(|&c| !is_whitespace(c)) {
            Some(pos) => &rest[pos..],
            None => return &rest[rest.len()..],
        };
        if trimmed.first() == Some(&b'%') {
            let comment: IResult<&[u8], &[u8]> = take_till(|c| c == b'\r' || c == b'\n')(trimmed);
            rest = match comment {
                Ok((after, _)) => after,
                Err(_) => return &trimmed[trimmed.len()..],
            };
        } else {
            return trimmed;
        }
    }
}

fn number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, text) = recognize(tuple((
        opt(one_of("+-")),
        alt((
            recognize(pair(digit1, opt(pair(char('.'), digit0)))),
            recognize(pair(char('.'), digit1)),
        )),
    )))(input)?;

    // Numbers glued to regular characters ("12abc") are not numbers.
    if rest.first().copied().is_some_and(is_regular) {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)));
    }

    let text = std::str::from_utf8(text)
        .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)))?;
    if text.contains('.') {
        let normalized = text.replace("-.", "-0.").replace("+.", "0.");
        let value = normalized
            .trim_start_matches('+')
            .parse::<f64>()
            .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Float)))?;
        Ok((rest, Token::Real(value)))
    } else {
        let value = text
            .trim_start_matches('+')
            .parse::<i64>()
            .map_err(|_| nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)))?;
        Ok((rest, Token::Integer(value)))
    }
}

fn literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (body, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut i = 0;
    while i < body.len() {
        match body[i] {
            b'\\' => i += 2,
            b'(' => {
                depth += 1;
                i += 1;
            },
            b')' => {
                depth -= 1;
                if depth == 0 {
                    return Ok((&body[i + 1..], Token::LiteralString(&body[..i])));
                }
                i += 1;
            },
            _ => i += 1,
        }
    }
    Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Char)))
}

fn hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }
    map(
        delimited(
            char('<'),
            take_while(|c: u8| c.is_ascii_hexdigit() || is_whitespace(c)),
            char('>'),
        ),
        Token::HexString,
    )(input)
}

/// Decode `#XX` escapes in a name (PDF Spec 7.3.5). Invalid escapes are kept verbatim.
pub fn decode_name_escapes(raw: &[u8]) -> String {
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        if raw[i] == b'#' && i + 2 < raw.len() {
            let hex = std::str::from_utf8(&raw[i + 1..i + 3]).ok();
            if let Some(byte) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(raw[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    map(preceded(char('/'), take_while(is_regular)), |raw: &[u8]| {
        Token::Name(decode_name_escapes(raw))
    })(input)
}

fn keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    map(take_while1(is_regular), Token::Keyword)(input)
}

fn delimiter(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        map(tag("<<"), |_| Token::DictStart),
        map(tag(">>"), |_| Token::DictEnd),
        map(char('['), |_| Token::ArrayStart),
        map(char(']'), |_| Token::ArrayEnd),
    ))(input)
}

/// Read the next token, skipping leading whitespace and comments.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let input = skip_ws(input);
    alt((delimiter, hex_string, literal_string, name, number, keyword))(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers_and_reals() {
        assert_eq!(token(b"42 ").unwrap().1, Token::Integer(42));
        assert_eq!(token(b"-17]").unwrap().1, Token::Integer(-17));
        assert_eq!(token(b"3.5 ").unwrap().1, Token::Real(3.5));
        assert_eq!(token(b"-.25 ").unwrap().1, Token::Real(-0.25));
        assert_eq!(token(b"4. ").unwrap().1, Token::Real(4.0));
    }

    #[test]
    fn test_keywords() {
        assert_eq!(token(b"  obj\n").unwrap().1, Token::Keyword(b"obj"));
        assert_eq!(token(b"R>>").unwrap().1, Token::Keyword(b"R"));
        assert_eq!(token(b"startxref\n").unwrap().1, Token::Keyword(b"startxref"));
    }

    #[test]
    fn test_name_escapes() {
        assert_eq!(token(b"/Type/Sig").unwrap().1, Token::Name("Type".into()));
        assert_eq!(token(b"/adbe.pkcs7#2Edetached ").unwrap().1, Token::Name("adbe.pkcs7.detached".into()));
        assert_eq!(decode_name_escapes(b"A#"), "A#");
    }

    #[test]
    fn test_strings() {
        assert_eq!(token(b"(a(b)c)rest").unwrap(), (&b"rest"[..], Token::LiteralString(b"a(b)c")));
        assert_eq!(token(b"(x\\)y)").unwrap().1, Token::LiteralString(b"x\\)y"));
        assert_eq!(token(b"<30 82>").unwrap().1, Token::HexString(b"30 82"));
    }

    #[test]
    fn test_delimiters_and_comments() {
        assert_eq!(token(b"% comment\n<<").unwrap().1, Token::DictStart);
        assert_eq!(token(b">>").unwrap().1, Token::DictEnd);
        assert_eq!(token(b"[").unwrap().1, Token::ArrayStart);
    }

    #[test]
    fn test_unbalanced_literal_fails() {
        assert!(literal_string(b"(open").is_err());
    }
}
