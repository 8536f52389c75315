//! PDF tokenizer.
//!
//! Low-level tokenization of PDF byte streams: numbers, strings, names,
//! keywords, and delimiters. Content streams and the document body share
//! this lexer; page operators surface as [`Token::Keyword`].
//!
//! Malformed input never aborts tokenization. A byte that starts no valid
//! token is consumed as [`Token::Junk`] so the caller can skip it and
//! resynchronise, and an unparseable number falls back to a keyword token.
//!
//! Whitespace (space, \t, \r, \n, \0, \f) and comments (% to EOL) are
//! skipped before every token.

use nom::{
    branch::alt,
    bytes::complete::{take_till, take_while, take_while1},
    character::complete::char,
    combinator::{map, opt, value},
    sequence::preceded,
    IResult,
};

/// Token types recognized by the lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g., 42, -123)
    Integer(i64),
    /// Real number (e.g., 3.14, -.5)
    Real(f64),
    /// Literal string bytes, escapes still encoded (content of `(...)`)
    LiteralString(&'a [u8]),
    /// Hexadecimal string span, undecoded (content of `<...>`)
    HexString(&'a [u8]),
    /// Name with `#xx` escapes decoded (e.g., `Type` from `/Type`)
    Name(String),
    /// `true`
    True,
    /// `false`
    False,
    /// `null`
    Null,
    /// `[`
    ArrayStart,
    /// `]`
    ArrayEnd,
    /// `<<`
    DictStart,
    /// `>>`
    DictEnd,
    /// `obj`
    ObjStart,
    /// `endobj`
    ObjEnd,
    /// `stream`
    StreamStart,
    /// `endstream`
    StreamEnd,
    /// Any other bare keyword: `R`, `xref`, `trailer`, `startxref`,
    /// content-stream operators (`BT`, `Tj`, ...)
    Keyword(&'a str),
    /// A byte that starts no token, consumed for error recovery
    Junk(u8),
}

/// PDF delimiter characters (ISO 32000-1, Table 2).
fn is_delimiter(c: u8) -> bool {
    matches!(c, b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}' | b'/' | b'%')
}

/// Regular characters: anything that is neither whitespace nor a delimiter.
fn is_regular(c: u8) -> bool {
    !crate::object::is_pdf_whitespace(c) && !is_delimiter(c)
}

fn whitespace(input: &[u8]) -> IResult<&[u8], ()> {
    let (remaining, ws) = take_while(crate::object::is_pdf_whitespace)(input)?;
    if ws.is_empty() {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Space)));
    }
    Ok((remaining, ()))
}

fn comment(input: &[u8]) -> IResult<&[u8], ()> {
    value((), preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n')))(input)
}

/// Skip all whitespace and comments before a token.
pub fn skip_ws(input: &[u8]) -> IResult<&[u8], ()> {
    let mut remaining = input;
    loop {
        if let Ok((rest, _)) = whitespace(remaining) {
            remaining = rest;
            continue;
        }
        if let Ok((rest, _)) = comment(remaining) {
            remaining = rest;
            continue;
        }
        break;
    }
    Ok((remaining, ()))
}

/// Parse an integer or real number.
///
/// PDF allows leading `+`/`-` and numbers starting or ending with the
/// decimal point (`.5`, `5.`). Exactly one dot makes it a real.
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, sign) = opt(alt((char('+'), char('-'))))(input)?;
    let (rest, int_part) = take_while(|c: u8| c.is_ascii_digit())(rest)?;
    let (rest, dot) = opt(char('.'))(rest)?;
    let (rest, frac_part) = take_while(|c: u8| c.is_ascii_digit())(rest)?;

    if int_part.is_empty() && frac_part.is_empty() {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)));
    }
    // Trailing regular characters mean this is not a number (e.g. `12abc`);
    // let the keyword fallback take the whole run instead.
    if rest.first().copied().is_some_and(is_regular) {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit)));
    }

    let negative = sign == Some('-');
    if dot.is_some() {
        let mut text = String::with_capacity(int_part.len() + frac_part.len() + 2);
        if negative {
            text.push('-');
        }
        text.push_str(std::str::from_utf8(int_part).unwrap_or("0"));
        text.push('.');
        text.push_str(std::str::from_utf8(frac_part).unwrap_or("0"));
        match text.parse::<f64>() {
            Ok(v) => Ok((rest, Token::Real(v))),
            Err(_) => Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Digit,
            ))),
        }
    } else {
        let digits = std::str::from_utf8(int_part).unwrap_or("");
        match digits.parse::<i64>() {
            Ok(v) => Ok((rest, Token::Integer(if negative { -v } else { v }))),
            // Overflowing integers degrade to a real rather than failing.
            Err(_) => match digits.parse::<f64>() {
                Ok(v) => Ok((rest, Token::Real(if negative { -v } else { v }))),
                Err(_) => Err(nom::Err::Error(nom::error::Error::new(
                    input,
                    nom::error::ErrorKind::Digit,
                ))),
            },
        }
    }
}

/// Parse a literal string enclosed in parentheses.
///
/// Tracks balanced nesting and skips escape sequences; the returned span is
/// the raw bytes between the outer parentheses, escapes still encoded.
/// An unterminated string consumes to end of input rather than erroring.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (remaining, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut pos = 0usize;

    while depth > 0 && pos < remaining.len() {
        match remaining[pos] {
            b'\\' => {
                pos += 2; // escape consumes the next byte whatever it is
            }
            b'(' => {
                depth += 1;
                pos += 1;
            }
            b')' => {
                depth -= 1;
                pos += 1;
            }
            _ => pos += 1,
        }
    }

    if depth == 0 {
        let content = &remaining[..pos - 1];
        Ok((&remaining[pos..], Token::LiteralString(content)))
    } else {
        // Unbalanced: treat everything to EOF as the string body.
        let end = remaining.len().min(pos);
        Ok((&remaining[end..], Token::LiteralString(&remaining[..end])))
    }
}

/// Parse a hexadecimal string enclosed in angle brackets.
///
/// Non-hex bytes inside the brackets are kept in the span and skipped at
/// decode time, per the tolerant-reader contract.
fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.len() >= 2 && input[0] == b'<' && input[1] == b'<' {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }
    let (rest, _) = char('<')(input)?;
    let (rest, span) = take_till(|c| c == b'>')(rest)?;
    let (rest, _) = opt(char('>'))(rest)?;
    Ok((rest, Token::HexString(span)))
}

/// Decode `#xx` escape sequences in a name.
///
/// Malformed sequences (`#` followed by fewer than two hex digits) are kept
/// as literal characters.
pub fn decode_name_escapes(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let bytes = name.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'#' {
            if let Some(pair) = bytes.get(i + 1..i + 3) {
                if let Ok(hex) = std::str::from_utf8(pair) {
                    if let Ok(b) = u8::from_str_radix(hex, 16) {
                        result.push(b as char);
                        i += 3;
                        continue;
                    }
                }
            }
        }
        result.push(bytes[i] as char);
        i += 1;
    }
    result
}

fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(take_while(is_regular), |bytes: &[u8]| {
            let raw: String = bytes.iter().map(|&b| b as char).collect();
            Token::Name(decode_name_escapes(&raw))
        }),
    )(input)
}

/// Parse a run of regular characters as a keyword.
///
/// Reserved words map to dedicated tokens (whole-run match, so `objective`
/// never lexes as `obj`); anything else — `R`, `xref`, `trailer`, content
/// operators like `Tj`, `T*`, `'`, `"` — comes back as [`Token::Keyword`].
fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    // ' and " are delimiters per the PDF delimiter table but act as operators in
    // content streams; accept them as single-byte keywords.
    if let Some(&c) = input.first() {
        if c == b'\'' || c == b'"' {
            let s = std::str::from_utf8(&input[..1]).unwrap_or("'");
            return Ok((&input[1..], Token::Keyword(s)));
        }
    }
    let (rest, word) = take_while1(is_regular)(input)?;
    let tok = match word {
        b"true" => Token::True,
        b"false" => Token::False,
        b"null" => Token::Null,
        b"obj" => Token::ObjStart,
        b"endobj" => Token::ObjEnd,
        b"stream" => Token::StreamStart,
        b"endstream" => Token::StreamEnd,
        _ => match std::str::from_utf8(word) {
            Ok(s) => Token::Keyword(s),
            Err(_) => Token::Junk(word[0]),
        },
    };
    Ok((rest, tok))
}

fn parse_delimiter(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Ok((&input[2..], Token::DictStart));
    }
    if input.starts_with(b">>") {
        return Ok((&input[2..], Token::DictEnd));
    }
    match input.first() {
        Some(b'[') => Ok((&input[1..], Token::ArrayStart)),
        Some(b']') => Ok((&input[1..], Token::ArrayEnd)),
        _ => Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag))),
    }
}

/// Parse a single token, skipping leading whitespace and comments.
///
/// Returns `Err` only on empty input; any non-empty input yields a token,
/// with [`Token::Junk`] as the recovery case.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, _) = skip_ws(input)?;
    if input.is_empty() {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Eof)));
    }

    if let Ok(r) = parse_delimiter(input) {
        return Ok(r);
    }
    if let Ok(r) = parse_name(input) {
        return Ok(r);
    }
    if let Ok(r) = parse_number(input) {
        return Ok(r);
    }
    if let Ok(r) = parse_literal_string(input) {
        return Ok(r);
    }
    if let Ok(r) = parse_hex_string(input) {
        return Ok(r);
    }
    if let Ok(r) = parse_keyword(input) {
        return Ok(r);
    }
    // Stray delimiter byte (unmatched `)`, `>`, `{`, `}`): consume it so the
    // caller can resynchronise.
    Ok((&input[1..], Token::Junk(input[0])))
}

/// Peek at the next token without consuming input.
pub fn peek_token(input: &[u8]) -> Option<Token<'_>> {
    token(input).ok().map(|(_, t)| t)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers() {
        assert_eq!(token(b"42"), Ok((&b""[..], Token::Integer(42))));
        assert_eq!(token(b"-123"), Ok((&b""[..], Token::Integer(-123))));
        assert_eq!(token(b"+17"), Ok((&b""[..], Token::Integer(17))));
        assert_eq!(token(b"0"), Ok((&b""[..], Token::Integer(0))));
    }

    #[test]
    fn test_reals() {
        assert_eq!(token(b"-2.5"), Ok((&b""[..], Token::Real(-2.5))));
        assert_eq!(token(b".5"), Ok((&b""[..], Token::Real(0.5))));
        assert_eq!(token(b"5."), Ok((&b""[..], Token::Real(5.0))));
        assert_eq!(token(b"-.002"), Ok((&b""[..], Token::Real(-0.002))));
    }

    #[test]
    fn test_huge_integer_degrades_to_real() {
        match token(b"99999999999999999999") {
            Ok((_, Token::Real(v))) => assert!(v > 9.0e18),
            other => panic!("expected Real, got {:?}", other),
        }
    }

    #[test]
    fn test_literal_strings() {
        assert_eq!(token(b"(Hello)"), Ok((&b""[..], Token::LiteralString(b"Hello"))));
        assert_eq!(
            token(b"(Hello (nested) World)"),
            Ok((&b""[..], Token::LiteralString(b"Hello (nested) World")))
        );
        assert_eq!(token(b"()"), Ok((&b""[..], Token::LiteralString(b""))));
        assert_eq!(
            token(b"(Open \\( Close \\))"),
            Ok((&b""[..], Token::LiteralString(b"Open \\( Close \\)")))
        );
    }

    #[test]
    fn test_unterminated_literal_string_consumes_rest() {
        let (rest, tok) = token(b"(never closed").unwrap();
        assert_eq!(rest, b"");
        assert_eq!(tok, Token::LiteralString(b"never closed"));
    }

    #[test]
    fn test_hex_strings() {
        assert_eq!(token(b"<48656C6C6F>"), Ok((&b""[..], Token::HexString(b"48656C6C6F"))));
        assert_eq!(token(b"<48 65 6C>"), Ok((&b""[..], Token::HexString(b"48 65 6C"))));
        assert_eq!(token(b"<>"), Ok((&b""[..], Token::HexString(b""))));
    }

    #[test]
    fn test_hex_string_missing_close() {
        let (rest, tok) = token(b"<4865").unwrap();
        assert_eq!(rest, b"");
        assert_eq!(tok, Token::HexString(b"4865"));
    }

    #[test]
    fn test_names() {
        assert_eq!(token(b"/Type"), Ok((&b""[..], Token::Name("Type".to_string()))));
        assert_eq!(token(b"/A#20B"), Ok((&b""[..], Token::Name("A B".to_string()))));
        assert_eq!(token(b"/A#ZZ"), Ok((&b""[..], Token::Name("A#ZZ".to_string()))));
        assert_eq!(token(b"/ "), Ok((&b" "[..], Token::Name(String::new()))));
    }

    #[test]
    fn test_decode_name_escapes_directly() {
        assert_eq!(decode_name_escapes("Type"), "Type");
        assert_eq!(decode_name_escapes("A#20B#23C"), "A B#C");
        assert_eq!(decode_name_escapes("A#"), "A#");
        assert_eq!(decode_name_escapes("A#2"), "A#2");
    }

    #[test]
    fn test_reserved_keywords() {
        assert_eq!(token(b"true"), Ok((&b""[..], Token::True)));
        assert_eq!(token(b"false"), Ok((&b""[..], Token::False)));
        assert_eq!(token(b"null"), Ok((&b""[..], Token::Null)));
        assert_eq!(token(b"obj"), Ok((&b""[..], Token::ObjStart)));
        assert_eq!(token(b"endobj"), Ok((&b""[..], Token::ObjEnd)));
        assert_eq!(token(b"stream"), Ok((&b""[..], Token::StreamStart)));
        assert_eq!(token(b"endstream"), Ok((&b""[..], Token::StreamEnd)));
    }

    #[test]
    fn test_whole_run_keyword_match() {
        // A longer run must not match a reserved prefix.
        assert_eq!(token(b"objective"), Ok((&b""[..], Token::Keyword("objective"))));
        assert_eq!(token(b"streamy"), Ok((&b""[..], Token::Keyword("streamy"))));
    }

    #[test]
    fn test_bare_keywords() {
        assert_eq!(token(b"R"), Ok((&b""[..], Token::Keyword("R"))));
        assert_eq!(token(b"startxref"), Ok((&b""[..], Token::Keyword("startxref"))));
        assert_eq!(token(b"Tj"), Ok((&b""[..], Token::Keyword("Tj"))));
        assert_eq!(token(b"T*"), Ok((&b""[..], Token::Keyword("T*"))));
        assert_eq!(token(b"'"), Ok((&b""[..], Token::Keyword("'"))));
    }

    #[test]
    fn test_delimiters() {
        assert_eq!(token(b"["), Ok((&b""[..], Token::ArrayStart)));
        assert_eq!(token(b"]"), Ok((&b""[..], Token::ArrayEnd)));
        assert_eq!(token(b"<<"), Ok((&b""[..], Token::DictStart)));
        assert_eq!(token(b">>"), Ok((&b""[..], Token::DictEnd)));
    }

    #[test]
    fn test_junk_recovery() {
        let (rest, tok) = token(b") 42").unwrap();
        assert_eq!(tok, Token::Junk(b')'));
        assert_eq!(token(rest), Ok((&b""[..], Token::Integer(42))));
    }

    #[test]
    fn test_whitespace_and_comments() {
        assert_eq!(token(b"  \n\t42"), Ok((&b""[..], Token::Integer(42))));
        assert_eq!(token(b"% comment\n42"), Ok((&b""[..], Token::Integer(42))));
        assert_eq!(token(b"% a\n% b\n  42"), Ok((&b""[..], Token::Integer(42))));
    }

    #[test]
    fn test_token_sequence() {
        let mut input: &[u8] = b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj";
        let expected = [
            Token::Integer(1),
            Token::Integer(0),
            Token::ObjStart,
            Token::DictStart,
            Token::Name("Type".to_string()),
            Token::Name("Catalog".to_string()),
            Token::Name("Pages".to_string()),
            Token::Integer(2),
            Token::Integer(0),
            Token::Keyword("R"),
            Token::DictEnd,
            Token::ObjEnd,
        ];
        for want in &expected {
            let (rest, tok) = token(input).unwrap();
            assert_eq!(&tok, want);
            input = rest;
        }
        assert!(token(input).is_err());
    }

    #[test]
    fn test_dict_start_vs_hex() {
        assert_eq!(token(b"<<"), Ok((&b""[..], Token::DictStart)));
        assert_eq!(token(b"<ABC>"), Ok((&b""[..], Token::HexString(b"ABC"))));
    }
}
