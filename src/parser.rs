//! PDF object grammar.
//!
//! Combines lexer tokens into complete objects: primitives, arrays,
//! dictionaries, streams, and indirect references. Parsing is lenient
//! throughout — unclosed containers return what they have, junk bytes are
//! skipped, a malformed value degrades to `null`. Callers never see a panic
//! from malformed input; at worst they see `Object::Null`.

use crate::cancel::CancelChecker;
use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dict, Object, ObjectRef};
use nom::IResult;

/// Hard cap on array elements, defending against runaway malformed streams.
pub const MAX_ARRAY_LEN: usize = 100_000;

/// Default cap on decoded hex-string output (bytes).
pub const MAX_HEX_STRING_BYTES: usize = 100 * 1024 * 1024;

/// Hex digit lookup table: value 0-15, or -1 for non-hex bytes.
/// Built once at compile time; readable without locks.
static HEX_LUT: [i8; 256] = build_hex_lut();

const fn build_hex_lut() -> [i8; 256] {
    let mut lut = [-1i8; 256];
    let mut i = 0usize;
    while i < 10 {
        lut[b'0' as usize + i] = i as i8;
        i += 1;
    }
    let mut i = 0usize;
    while i < 6 {
        lut[b'a' as usize + i] = 10 + i as i8;
        lut[b'A' as usize + i] = 10 + i as i8;
        i += 1;
    }
    lut
}

/// Decode escape sequences in a literal string body.
///
/// Handles the single-character escapes `\n \r \t \b \f \( \) \\`, octal
/// escapes of one to three digits (masked to a byte), and line
/// continuations `\CR`, `\LF`, `\CRLF`. An unknown escape keeps the
/// backslash literally.
pub fn decode_literal_string_escapes(raw: &[u8]) -> Vec<u8> {
    let mut result = Vec::with_capacity(raw.len());
    let mut i = 0;

    while i < raw.len() {
        if raw[i] == b'\\' && i + 1 < raw.len() {
            match raw[i + 1] {
                b'n' => {
                    result.push(b'\n');
                    i += 2;
                }
                b'r' => {
                    result.push(b'\r');
                    i += 2;
                }
                b't' => {
                    result.push(b'\t');
                    i += 2;
                }
                b'b' => {
                    result.push(0x08);
                    i += 2;
                }
                b'f' => {
                    result.push(0x0C);
                    i += 2;
                }
                b'(' => {
                    result.push(b'(');
                    i += 2;
                }
                b')' => {
                    result.push(b')');
                    i += 2;
                }
                b'\\' => {
                    result.push(b'\\');
                    i += 2;
                }
                b'\n' => i += 2,
                b'\r' => {
                    i += 2;
                    if i < raw.len() && raw[i] == b'\n' {
                        i += 1;
                    }
                }
                c if (b'0'..b'8').contains(&c) => {
                    let mut value = 0u32;
                    let mut len = 0;
                    while len < 3 {
                        match raw.get(i + 1 + len) {
                            Some(&d) if (b'0'..b'8').contains(&d) => {
                                value = value * 8 + (d - b'0') as u32;
                                len += 1;
                            }
                            _ => break,
                        }
                    }
                    result.push((value & 0xFF) as u8);
                    i += 1 + len;
                }
                _ => {
                    result.push(b'\\');
                    i += 1;
                }
            }
        } else {
            result.push(raw[i]);
            i += 1;
        }
    }

    result
}

/// Decode a hex-string span to bytes.
///
/// Non-hex bytes are skipped; an odd trailing digit is right-padded with
/// zero. Unbounded variant of [`decode_hex_limited`].
pub fn decode_hex(span: &[u8]) -> Vec<u8> {
    decode_hex_limited(span, usize::MAX, None).unwrap_or_default()
}

/// Decode a hex-string span with an output cap and periodic cancellation.
///
/// Output never exceeds `limit` bytes; the checker (when supplied) is
/// ticked once per output byte so a cancelled extraction stops within its
/// configured interval even inside a pathological multi-megabyte string.
pub fn decode_hex_limited(
    span: &[u8],
    limit: usize,
    mut checker: Option<&mut CancelChecker>,
) -> Result<Vec<u8>> {
    let mut result = Vec::with_capacity((span.len() / 2).min(limit).min(4096));
    let mut hi: Option<u8> = None;

    for &byte in span {
        let digit = HEX_LUT[byte as usize];
        if digit < 0 {
            continue;
        }
        match hi {
            None => hi = Some(digit as u8),
            Some(h) => {
                if result.len() >= limit {
                    log::warn!("hex string truncated at {} bytes", limit);
                    return Ok(result);
                }
                result.push((h << 4) | digit as u8);
                hi = None;
                if let Some(c) = checker.as_deref_mut() {
                    c.tick()?;
                }
            }
        }
    }
    // Odd trailing digit pads with zero.
    if let Some(h) = hi {
        if result.len() < limit {
            result.push(h << 4);
            if let Some(c) = checker.as_deref_mut() {
                c.tick()?;
            }
        }
    }

    Ok(result)
}

/// Parse a PDF object from input bytes.
///
/// Handles all object kinds, including the `N G R` reference lookahead and
/// dictionaries directly followed by stream payloads. The only hard error
/// is running out of input before any token.
pub fn parse_object(input: &[u8]) -> IResult<&[u8], Object> {
    let (input, tok) = token(input)?;

    match tok {
        Token::Null => Ok((input, Object::Null)),
        Token::True => Ok((input, Object::Boolean(true))),
        Token::False => Ok((input, Object::Boolean(false))),
        Token::Real(r) => Ok((input, Object::Real(r))),

        Token::Integer(i) => {
            // Lookahead for `gen R` making this an indirect reference.
            if i >= 0 {
                if let Ok((input2, Token::Integer(gen))) = token(input) {
                    if (0..=u16::MAX as i64).contains(&gen) {
                        if let Ok((input3, Token::Keyword("R"))) = token(input2) {
                            return Ok((
                                input3,
                                Object::Reference(ObjectRef::new(i as u32, gen as u16)),
                            ));
                        }
                    }
                }
            }
            Ok((input, Object::Integer(i)))
        }

        Token::LiteralString(raw) => {
            Ok((input, Object::String(decode_literal_string_escapes(raw))))
        }
        Token::HexString(span) => Ok((input, Object::String(decode_hex(span)))),
        Token::Name(name) => Ok((input, Object::Name(name))),

        Token::ArrayStart => parse_array(input),
        Token::DictStart => parse_dictionary_or_stream(input),

        // Recovery: a stray delimiter or keyword where an object was
        // expected reads as null, so container parsing can continue.
        _ => Ok((input, Object::Null)),
    }
}

/// Parse array elements after `[`, up to [`MAX_ARRAY_LEN`].
fn parse_array(input: &[u8]) -> IResult<&[u8], Object> {
    let mut objects = Vec::new();
    let mut remaining = input;

    loop {
        match token(remaining) {
            Ok((rest, Token::ArrayEnd)) => return Ok((rest, Object::Array(objects))),
            Ok((rest, Token::Junk(_))) => {
                remaining = rest;
            }
            Ok(_) => {
                let (rest, obj) = parse_object(remaining)?;
                if objects.len() < MAX_ARRAY_LEN {
                    objects.push(obj);
                } else if objects.len() == MAX_ARRAY_LEN {
                    log::warn!("array truncated at {} elements", MAX_ARRAY_LEN);
                    objects.push(Object::Null); // mark truncation point
                }
                remaining = rest;
            }
            Err(_) => {
                // EOF before `]`: return what we have.
                return Ok((remaining, Object::Array(objects)));
            }
        }
    }
}

/// Parse dictionary entries after `<<`, then attach a stream payload when
/// the dictionary is followed by the `stream` keyword.
fn parse_dictionary_or_stream(input: &[u8]) -> IResult<&[u8], Object> {
    let (remaining, dict) = parse_dictionary_body(input)?;

    if let Ok((stream_input, Token::StreamStart)) = token(remaining) {
        let (rest, data) = parse_stream_payload(stream_input, &dict);
        return Ok((
            rest,
            Object::Stream {
                dict,
                data: bytes::Bytes::from(data),
            },
        ));
    }

    Ok((remaining, Object::Dictionary(dict)))
}

fn parse_dictionary_body(input: &[u8]) -> IResult<&[u8], Dict> {
    let mut dict = Dict::new();
    let mut remaining = input;

    loop {
        match token(remaining) {
            Ok((rest, Token::DictEnd)) => return Ok((rest, dict)),
            Ok((rest, Token::Name(key))) => match parse_object(rest) {
                Ok((rest, value)) => {
                    dict.insert(key, value);
                    remaining = rest;
                }
                Err(_) => return Ok((rest, dict)),
            },
            Ok((rest, _)) => {
                // Key position held by a non-name token: drop it and carry
                // on, so one bad entry does not lose the rest of the dict.
                remaining = rest;
            }
            Err(_) => return Ok((remaining, dict)),
        }
    }
}

/// Extract the raw payload after the `stream` keyword.
///
/// `/Length` drives the read when it is a plausible inline integer (an
/// indirect `/Length` cannot be resolved at this layer); the declared
/// length is trusted only when `endstream` actually follows it. Otherwise
/// scan for the `endstream` keyword.
fn parse_stream_payload<'a>(input: &'a [u8], dict: &Dict) -> (&'a [u8], Vec<u8>) {
    // The keyword must be followed by CRLF or LF; tolerate CR alone.
    let body = if input.starts_with(b"\r\n") {
        &input[2..]
    } else if input.starts_with(b"\n") || input.starts_with(b"\r") {
        &input[1..]
    } else {
        input
    };

    if let Some(length) = dict.get("Length").and_then(|o| o.as_integer()) {
        let length = length.max(0) as usize;
        if length <= body.len() && endstream_follows(&body[length..]) {
            let rest = skip_endstream(&body[length..]);
            return (rest, body[..length].to_vec());
        }
        log::debug!("declared /Length {} not confirmed by endstream, rescanning", length);
    }

    match find_endstream(body) {
        Some(pos) => {
            // Back off the EOL that precedes the keyword.
            let mut end = pos;
            if end > 0 && body[end - 1] == b'\n' {
                end -= 1;
            }
            if end > 0 && body[end - 1] == b'\r' {
                end -= 1;
            }
            let rest = skip_endstream(&body[pos..]);
            (rest, body[..end].to_vec())
        }
        None => {
            // Truncated file: the stream runs to EOF.
            (&body[body.len()..], body.to_vec())
        }
    }
}

fn endstream_follows(mut input: &[u8]) -> bool {
    while input.first().copied().is_some_and(crate::object::is_pdf_whitespace) {
        input = &input[1..];
    }
    input.starts_with(b"endstream")
}

fn skip_endstream(input: &[u8]) -> &[u8] {
    match token(input) {
        Ok((rest, Token::StreamEnd)) => rest,
        _ => input,
    }
}

fn find_endstream(input: &[u8]) -> Option<usize> {
    let keyword = b"endstream";
    input.windows(keyword.len()).position(|w| w == keyword)
}

/// Parse one indirect object definition: `N G obj <object> [endobj]`.
///
/// Returns the reference together with its object. A missing `endobj`
/// marker is tolerated. `offset` only feeds error messages.
pub fn parse_indirect_object(input: &[u8], offset: usize) -> Result<(ObjectRef, Object)> {
    let (rest, id_tok) = token(input).map_err(|_| Error::ParseError {
        offset,
        reason: "expected object number".to_string(),
    })?;
    let id = match id_tok {
        Token::Integer(i) if i >= 0 => i as u32,
        other => {
            return Err(Error::ParseError {
                offset,
                reason: format!("expected object number, found {:?}", other),
            })
        }
    };

    let (rest, gen_tok) = token(rest).map_err(|_| Error::ParseError {
        offset,
        reason: "expected generation number".to_string(),
    })?;
    let gen = match gen_tok {
        Token::Integer(g) if (0..=u16::MAX as i64).contains(&g) => g as u16,
        other => {
            return Err(Error::ParseError {
                offset,
                reason: format!("expected generation number, found {:?}", other),
            })
        }
    };

    let (rest, obj_tok) = token(rest).map_err(|_| Error::ParseError {
        offset,
        reason: "expected obj keyword".to_string(),
    })?;
    if obj_tok != Token::ObjStart {
        return Err(Error::ParseError {
            offset,
            reason: format!("expected obj keyword, found {:?}", obj_tok),
        });
    }

    let (rest, object) = parse_object(rest).map_err(|_| Error::ParseError {
        offset,
        reason: "unreadable object body".to_string(),
    })?;

    // endobj is optional in the wild.
    if !matches!(token(rest), Ok((_, Token::ObjEnd))) {
        log::debug!("object {} {} missing endobj marker", id, gen);
    }

    Ok((ObjectRef::new(id, gen), object))
}
