//! Compressed object streams (`/Type /ObjStm`).
//!
//! An object stream packs `N` non-stream objects into one compressed body:
//! a header of `N` `(id, relative-offset)` integer pairs, then the object
//! bodies starting at `/First`. Entries are parsed with a fresh pass of the
//! object grammar over the decoded bytes.
//!
//! Strings inside an object stream are never individually encrypted — the
//! container stream was, and the caller decodes it before handing the body
//! over.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dict, Object};
use crate::parser::parse_object;

/// Upper bound on `/N`, against malformed headers.
const MAX_ENTRIES: i64 = 100_000;

/// Parse every object out of a decoded object-stream body.
///
/// Returns entries in stream order, so `result[i]` answers an xref record
/// of the form "compressed at (this stream, index i)". A header pair whose
/// body is unreadable yields `Object::Null` at its index instead of
/// failing the whole stream.
pub fn parse_object_stream(body: &[u8], dict: &Dict) -> Result<Vec<(u32, Object)>> {
    let n = dict
        .get("N")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::InvalidPdf("ObjStm missing /N".to_string()))?;
    let first = dict
        .get("First")
        .and_then(|o| o.as_integer())
        .ok_or_else(|| Error::InvalidPdf("ObjStm missing /First".to_string()))?;

    if !(0..=MAX_ENTRIES).contains(&n) || first < 0 {
        return Err(Error::InvalidPdf(format!("ObjStm bounds out of range: N={} First={}", n, first)));
    }
    let first = (first as usize).min(body.len());

    // Header: N pairs of (object id, offset relative to /First).
    let mut pairs = Vec::with_capacity(n as usize);
    let mut header = &body[..first];
    for _ in 0..n {
        let (rest, id_tok) = match token(header) {
            Ok(r) => r,
            Err(_) => break,
        };
        let (rest, off_tok) = match token(rest) {
            Ok(r) => r,
            Err(_) => break,
        };
        match (id_tok, off_tok) {
            (Token::Integer(id), Token::Integer(off)) if id >= 0 && off >= 0 => {
                pairs.push((id as u32, off as usize));
            }
            _ => break,
        }
        header = rest;
    }
    if pairs.len() < n as usize {
        log::warn!("ObjStm header truncated: {} of {} pairs readable", pairs.len(), n);
    }

    let objects_region = &body[first..];
    let mut entries = Vec::with_capacity(pairs.len());
    for (id, rel_offset) in pairs {
        let obj = if rel_offset <= objects_region.len() {
            match parse_object(&objects_region[rel_offset..]) {
                Ok((_, obj)) => obj,
                Err(_) => {
                    log::warn!("ObjStm entry {} unreadable at relative offset {}", id, rel_offset);
                    Object::Null
                }
            }
        } else {
            Object::Null
        };
        entries.push((id, obj));
    }

    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::ObjectRef;

    fn objstm_dict(n: i64, first: i64) -> Dict {
        let mut dict = Dict::new();
        dict.insert("Type".to_string(), Object::Name("ObjStm".to_string()));
        dict.insert("N".to_string(), Object::Integer(n));
        dict.insert("First".to_string(), Object::Integer(first));
        dict
    }

    #[test]
    fn test_parse_two_objects() {
        // Header "10 0 11 15", bodies at First=12.
        let body = b"10 0 11 15  << /Kind /A >>   [ 1 2 3 ]";
        let first = 12;
        let entries = parse_object_stream(body, &objstm_dict(2, first)).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, 10);
        assert_eq!(
            entries[0].1.as_dict().unwrap().get("Kind").unwrap().as_name(),
            Some("A")
        );
        assert_eq!(entries[1].0, 11);
        assert_eq!(entries[1].1.as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_entries_can_hold_references() {
        let body = b"5 0  << /Parent 2 0 R >>";
        let entries = parse_object_stream(body, &objstm_dict(1, 4)).unwrap();
        let dict = entries[0].1.as_dict().unwrap();
        assert_eq!(dict.get("Parent").unwrap().as_reference(), Some(ObjectRef::new(2, 0)));
    }

    #[test]
    fn test_offset_beyond_body_yields_null() {
        let body = b"7 9999 ";
        let entries = parse_object_stream(body, &objstm_dict(1, 7)).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].1.is_null());
    }

    #[test]
    fn test_truncated_header_keeps_readable_prefix() {
        let body = b"10 0 11";
        let entries = parse_object_stream(body, &objstm_dict(2, 7)).unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].0, 10);
    }

    #[test]
    fn test_missing_n_is_error() {
        let mut dict = Dict::new();
        dict.insert("First".to_string(), Object::Integer(0));
        assert!(parse_object_stream(b"", &dict).is_err());
    }

    #[test]
    fn test_absurd_n_is_error() {
        assert!(parse_object_stream(b"", &objstm_dict(10_000_000, 0)).is_err());
    }
}
