//! Cross-reference table parsing.
//!
//! The xref maps `(id, generation)` to byte offsets (or to slots inside
//! compressed object streams), enabling random access. Both classic `xref`
//! tables and `/XRef` streams are supported, chained through `/Prev` with a
//! visited set to break cycles, plus the hybrid-file `/XRefStm` pointer.
//!
//! When the declared `startxref` offset is garbage, [`recover_by_scan`]
//! rebuilds a usable table by scanning the file for `N G obj` headers —
//! a corrupt xref downgrades to a slow open, not a failed one.

use crate::error::{Error, Result};
use crate::lexer::{token, Token};
use crate::object::{Dict, Object};
use crate::parser::{parse_indirect_object, parse_object};
use crate::reader::SliceSource;
use byteorder::{BigEndian, ByteOrder};
use std::collections::{HashMap, HashSet, VecDeque};

/// Window scanned from the end of the file for the `startxref` keyword.
const STARTXREF_WINDOW: usize = 1024;

/// Cap on entries in one classic subsection, against malformed counts.
const MAX_SUBSECTION_ENTRIES: u64 = 1_000_000;

/// Location of one indirect object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum XrefEntry {
    /// Object slot is free.
    Free {
        /// Next free object id (unused, kept for fidelity)
        next: u32,
        /// Generation the slot would have if reused
        gen: u16,
    },
    /// Object stored uncompressed at a byte offset.
    InUse {
        /// Absolute file offset of `N G obj`
        offset: u64,
        /// Generation number
        gen: u16,
    },
    /// Object stored inside a compressed object stream.
    Compressed {
        /// Object id of the containing `/ObjStm`
        stream_id: u32,
        /// Zero-based index within that stream
        index: u32,
    },
}

/// Merged cross-reference table plus the newest trailer dictionary.
#[derive(Debug, Default)]
pub struct XrefTable {
    entries: HashMap<u32, XrefEntry>,
    trailer: Dict,
}

impl XrefTable {
    /// Look up the location of object `id`.
    pub fn get(&self, id: u32) -> Option<&XrefEntry> {
        self.entries.get(&id)
    }

    /// The trailer dictionary of the newest section.
    pub fn trailer(&self) -> &Dict {
        &self.trailer
    }

    /// Number of known object slots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no entries were recovered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Largest known object id.
    pub fn max_id(&self) -> u32 {
        self.entries.keys().copied().max().unwrap_or(0)
    }

    /// Add entries from an older section; existing ids win.
    fn absorb(&mut self, entries: HashMap<u32, XrefEntry>) {
        for (id, entry) in entries {
            self.entries.entry(id).or_insert(entry);
        }
    }

    fn absorb_trailer(&mut self, trailer: Dict) {
        for (k, v) in trailer {
            self.trailer.entry(k).or_insert(v);
        }
    }
}

/// Find the offset of the newest xref section from the file tail.
///
/// Scans the last kilobyte for the last `startxref` keyword and parses the
/// integer that follows. A file ending right after the integer (missing
/// `%%EOF`) is accepted.
pub fn locate_startxref(src: &SliceSource) -> Result<u64> {
    let tail = src.tail(STARTXREF_WINDOW);
    let keyword = b"startxref";
    let pos = tail
        .windows(keyword.len())
        .rposition(|w| w == keyword)
        .ok_or_else(|| Error::InvalidXref("startxref not found".to_string()))?;

    match token(&tail[pos + keyword.len()..]) {
        Ok((_, Token::Integer(offset))) if offset >= 0 => Ok(offset as u64),
        _ => Err(Error::InvalidXref("startxref offset unreadable".to_string())),
    }
}

/// Load and merge every xref section reachable from `start_offset`.
///
/// Sections are visited breadth-first through `/Prev` and `/XRefStm`
/// pointers; the visited set breaks reference cycles. The newest section's
/// entries and trailer take precedence.
pub fn load_xref(src: &SliceSource, start_offset: u64) -> Result<XrefTable> {
    let mut table = XrefTable::default();
    let mut queue = VecDeque::new();
    let mut visited = HashSet::new();
    queue.push_back(start_offset);

    let mut first_error = None;
    while let Some(offset) = queue.pop_front() {
        if !visited.insert(offset) {
            continue;
        }
        let section = match parse_section(src, offset) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("xref section at offset {} unreadable: {}", offset, e);
                first_error.get_or_insert(e);
                continue;
            }
        };

        if let Some(prev) = section.trailer.get("Prev").and_then(|o| o.as_integer()) {
            if prev >= 0 {
                queue.push_back(prev as u64);
            }
        }
        // Hybrid-reference file: classic table pointing at an xref stream.
        if let Some(stm) = section.trailer.get("XRefStm").and_then(|o| o.as_integer()) {
            if stm >= 0 {
                queue.push_back(stm as u64);
            }
        }

        table.absorb(section.entries);
        table.absorb_trailer(section.trailer);
    }

    if table.is_empty() {
        return Err(first_error
            .unwrap_or_else(|| Error::InvalidXref("no usable xref section".to_string())));
    }
    Ok(table)
}

struct Section {
    entries: HashMap<u32, XrefEntry>,
    trailer: Dict,
}

/// Parse one section, auto-detecting classic table vs xref stream.
fn parse_section(src: &SliceSource, offset: u64) -> Result<Section> {
    let input = src.from_offset(offset);
    if input.is_empty() {
        return Err(Error::InvalidXref(format!("offset {} beyond end of file", offset)));
    }

    match token(input) {
        Ok((rest, Token::Keyword("xref"))) => parse_classic_section(rest),
        Ok((_, Token::Integer(_))) => parse_stream_section(input, offset),
        other => Err(Error::InvalidXref(format!(
            "unexpected content at xref offset {}: {:?}",
            offset,
            other.map(|(_, t)| t)
        ))),
    }
}

/// Parse a classic `xref` table: subsections of fixed-width entries
/// followed by `trailer << ... >>`.
fn parse_classic_section(mut input: &[u8]) -> Result<Section> {
    let mut entries = HashMap::new();

    loop {
        match token(input) {
            Ok((rest, Token::Keyword("trailer"))) => {
                let trailer = match parse_object(rest) {
                    Ok((_, Object::Dictionary(d))) => d,
                    _ => {
                        log::warn!("classic xref trailer dictionary unreadable");
                        Dict::new()
                    }
                };
                return Ok(Section { entries, trailer });
            }
            Ok((rest, Token::Integer(start))) => {
                let (rest, count_tok) = token(rest).map_err(|_| {
                    Error::InvalidXref("truncated xref subsection header".to_string())
                })?;
                let count = match count_tok {
                    Token::Integer(c) if c >= 0 => c as u64,
                    _ => return Err(Error::InvalidXref("bad subsection count".to_string())),
                };
                if start < 0 || count > MAX_SUBSECTION_ENTRIES {
                    return Err(Error::InvalidXref("subsection bounds out of range".to_string()));
                }

                input = rest;
                for i in 0..count {
                    let id = start as u32 + i as u32;
                    match parse_classic_entry(input) {
                        Some((rest, entry)) => {
                            entries.insert(id, entry);
                            input = rest;
                        }
                        None => {
                            // Malformed row: keep numbering with a free slot.
                            log::warn!("malformed xref entry for object {}", id);
                            entries.insert(id, XrefEntry::Free { next: 0, gen: 65535 });
                            break;
                        }
                    }
                }
            }
            // Section without a trailer (truncated incremental update).
            _ => return Ok(Section { entries, trailer: Dict::new() }),
        }
    }
}

fn parse_classic_entry(input: &[u8]) -> Option<(&[u8], XrefEntry)> {
    let (rest, offset_tok) = token(input).ok()?;
    let offset = match offset_tok {
        Token::Integer(v) if v >= 0 => v as u64,
        _ => return None,
    };
    let (rest, gen_tok) = token(rest).ok()?;
    let gen = match gen_tok {
        Token::Integer(v) if (0..=65535).contains(&v) => v as u16,
        _ => return None,
    };
    let (rest, kind) = token(rest).ok()?;
    let entry = match kind {
        Token::Keyword("n") => XrefEntry::InUse { offset, gen },
        Token::Keyword("f") => XrefEntry::Free { next: offset as u32, gen },
        _ => return None,
    };
    Some((rest, entry))
}

/// Parse a `/XRef` stream section: binary entry records with `/W` field
/// widths, optionally subsection ranges in `/Index`, body decoded through
/// the filter pipeline.
fn parse_stream_section(input: &[u8], offset: u64) -> Result<Section> {
    let (_, obj) = parse_indirect_object(input, offset as usize)?;
    let dict = match &obj {
        Object::Stream { dict, .. } => dict.clone(),
        _ => return Err(Error::InvalidXref("xref stream is not a stream object".to_string())),
    };

    if let Some(name) = dict.get("Type").and_then(|o| o.as_name()) {
        if name != "XRef" {
            return Err(Error::InvalidXref(format!("expected /Type /XRef, found /{}", name)));
        }
    }

    // Xref streams are never encrypted; decode failures here are fatal for
    // the section, unlike the soft truncation used for content streams.
    let chain = crate::object::filter_chain(&dict);
    let raw = obj.stream_data().cloned().unwrap_or_default();
    let body = crate::decoders::decode_chain_strict(&raw, &chain)
        .map_err(|e| Error::InvalidXref(format!("xref stream body undecodable: {}", e)))?;

    let widths: Vec<usize> = dict
        .get("W")
        .and_then(|o| o.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|o| o.as_integer())
                .map(|v| v.max(0) as usize)
                .collect()
        })
        .ok_or_else(|| Error::InvalidXref("missing /W in xref stream".to_string()))?;
    if widths.len() < 3 || widths.iter().any(|&w| w > 8) {
        return Err(Error::InvalidXref(format!("bad /W widths {:?}", widths)));
    }

    let size = dict
        .get("Size")
        .and_then(|o| o.as_integer())
        .unwrap_or(0)
        .max(0) as u32;

    // /Index defaults to one run covering [0, Size).
    let index: Vec<(u32, u32)> = match dict.get("Index").and_then(|o| o.as_array()) {
        Some(arr) => arr
            .chunks(2)
            .filter_map(|pair| {
                let start = pair.first()?.as_integer()?;
                let count = pair.get(1)?.as_integer()?;
                if start >= 0 && count >= 0 {
                    Some((start as u32, count as u32))
                } else {
                    None
                }
            })
            .collect(),
        None => vec![(0, size)],
    };

    let record_len: usize = widths.iter().sum();
    if record_len == 0 {
        return Err(Error::InvalidXref("zero-width xref records".to_string()));
    }

    let mut entries = HashMap::new();
    let mut cursor = 0usize;
    'runs: for (start, count) in index {
        for i in 0..count {
            if cursor + record_len > body.len() {
                log::warn!("xref stream body truncated at record for object {}", start + i);
                break 'runs;
            }
            let record = &body[cursor..cursor + record_len];
            cursor += record_len;

            let (f1, rest) = read_field(record, widths[0], 1);
            let (f2, rest) = read_field(rest, widths[1], 0);
            let (f3, _) = read_field(rest, widths[2], 0);

            let id = start + i;
            let entry = match f1 {
                0 => XrefEntry::Free { next: f2 as u32, gen: f3 as u16 },
                1 => XrefEntry::InUse { offset: f2, gen: f3 as u16 },
                2 => XrefEntry::Compressed { stream_id: f2 as u32, index: f3 as u32 },
                other => {
                    log::debug!("unknown xref entry type {} for object {}", other, id);
                    continue;
                }
            };
            entries.insert(id, entry);
        }
    }

    Ok(Section { entries, trailer: dict })
}

/// Read one big-endian field of `width` bytes; a zero-width field takes the
/// declared default (the type field defaults to 1 per ISO 32000-1).
fn read_field(record: &[u8], width: usize, default: u64) -> (u64, &[u8]) {
    if width == 0 {
        return (default, record);
    }
    let mut buf = [0u8; 8];
    buf[8 - width..].copy_from_slice(&record[..width]);
    (BigEndian::read_u64(&buf), &record[width..])
}

/// Rebuild a cross-reference table by scanning for `N G obj` headers.
///
/// Last resort for files whose declared xref is unusable. The scan keeps
/// the *last* definition of each id (later definitions supersede earlier
/// ones in incrementally-updated files) and takes the trailer from the last
/// `trailer` keyword it can read.
pub fn recover_by_scan(src: &SliceSource) -> XrefTable {
    let data = src.as_slice();
    let mut entries: HashMap<u32, XrefEntry> = HashMap::new();
    let mut trailer = Dict::new();

    let mut pos = 0usize;
    while pos + 3 <= data.len() {
        match find_keyword(data, pos, b"obj") {
            Some(kw) => {
                if let Some((header_start, id, gen)) = backtrack_object_header(data, kw) {
                    entries.insert(id, XrefEntry::InUse { offset: header_start as u64, gen });
                }
                pos = kw + 3;
            }
            None => break,
        }
    }

    // The newest trailer wins.
    let mut tpos = 0usize;
    while let Some(kw) = find_keyword(data, tpos, b"trailer") {
        if let Ok((_, Object::Dictionary(d))) = parse_object(&data[kw + 7..]) {
            trailer = d;
        }
        tpos = kw + 7;
    }

    log::info!("xref recovery scan found {} objects", entries.len());
    XrefTable { entries, trailer }
}

/// Find the next standalone occurrence of `keyword` at or after `from`.
fn find_keyword(data: &[u8], from: usize, keyword: &[u8]) -> Option<usize> {
    let mut pos = from;
    while pos + keyword.len() <= data.len() {
        let rel = data[pos..].windows(keyword.len()).position(|w| w == keyword)?;
        let at = pos + rel;
        let before_ok = at == 0 || !data[at - 1].is_ascii_alphanumeric();
        let after = at + keyword.len();
        let after_ok = after >= data.len() || !data[after].is_ascii_alphanumeric();
        if before_ok && after_ok {
            return Some(at);
        }
        pos = at + 1;
    }
    None
}

/// Walk backwards from an `obj` keyword over `N G `, returning the header
/// start offset and the parsed id/generation.
fn backtrack_object_header(data: &[u8], obj_at: usize) -> Option<(usize, u32, u16)> {
    let mut i = obj_at;
    let skip_ws_back = |i: &mut usize| {
        while *i > 0 && crate::object::is_pdf_whitespace(data[*i - 1]) {
            *i -= 1;
        }
    };
    let digits_back = |i: &mut usize| -> Option<(usize, usize)> {
        let end = *i;
        while *i > 0 && data[*i - 1].is_ascii_digit() {
            *i -= 1;
        }
        if *i == end {
            None
        } else {
            Some((*i, end))
        }
    };

    skip_ws_back(&mut i);
    let (gen_start, gen_end) = digits_back(&mut i)?;
    skip_ws_back(&mut i);
    let (id_start, id_end) = digits_back(&mut i)?;

    let gen: u16 = std::str::from_utf8(&data[gen_start..gen_end]).ok()?.parse().ok()?;
    let id: u32 = std::str::from_utf8(&data[id_start..id_end]).ok()?.parse().ok()?;
    Some((id_start, id, gen))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn src(bytes: &[u8]) -> SliceSource {
        SliceSource::new(bytes.to_vec())
    }

    const CLASSIC: &[u8] = b"xref\n0 3\n0000000000 65535 f \n0000000018 00000 n \n0000000120 00000 n \ntrailer\n<< /Size 3 /Root 1 0 R >>\nstartxref\n0\n%%EOF";

    #[test]
    fn test_locate_startxref() {
        let s = src(b"junk junk\nstartxref\n1234\n%%EOF");
        assert_eq!(locate_startxref(&s).unwrap(), 1234);
    }

    #[test]
    fn test_locate_startxref_without_eof_marker() {
        let s = src(b"header\nstartxref\n99");
        assert_eq!(locate_startxref(&s).unwrap(), 99);
    }

    #[test]
    fn test_locate_startxref_takes_last() {
        let s = src(b"startxref\n1\nstuff\nstartxref\n2\n%%EOF");
        assert_eq!(locate_startxref(&s).unwrap(), 2);
    }

    #[test]
    fn test_locate_startxref_missing() {
        let s = src(b"no keyword here");
        assert!(locate_startxref(&s).is_err());
    }

    #[test]
    fn test_parse_classic_table() {
        let table = load_xref(&src(CLASSIC), 0).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(0), Some(&XrefEntry::Free { next: 0, gen: 65535 }));
        assert_eq!(table.get(1), Some(&XrefEntry::InUse { offset: 18, gen: 0 }));
        assert_eq!(table.get(2), Some(&XrefEntry::InUse { offset: 120, gen: 0 }));
        assert_eq!(table.trailer().get("Size").unwrap().as_integer(), Some(3));
    }

    #[test]
    fn test_prev_chain_merging() {
        // Newer section redefines object 1 and chains to the older one.
        let old = b"xref\n0 2\n0000000000 65535 f \n0000000010 00000 n \ntrailer\n<< /Size 2 >>\n";
        let mut file = old.to_vec();
        let new_offset = file.len();
        file.extend_from_slice(
            b"xref\n1 1\n0000000099 00000 n \ntrailer\n<< /Size 2 /Prev 0 >>\n",
        );
        let table = load_xref(&src(&file), new_offset as u64).unwrap();
        assert_eq!(table.get(1), Some(&XrefEntry::InUse { offset: 99, gen: 0 }));
        assert_eq!(table.get(0), Some(&XrefEntry::Free { next: 0, gen: 65535 }));
    }

    #[test]
    fn test_prev_cycle_terminates() {
        // Section whose /Prev points at itself.
        let file = b"xref\n0 1\n0000000000 65535 f \ntrailer\n<< /Size 1 /Prev 0 >>\n";
        let table = load_xref(&src(file), 0).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_xref_stream_section() {
        // W [1 2 1], three entries: free, in-use @ 0x0102 gen 0, compressed.
        let body: Vec<u8> = vec![
            0, 0, 0, 0, // free
            1, 0x01, 0x02, 0, // in use at offset 258
            2, 0x00, 0x05, 3, // in stream 5, index 3
        ];
        let mut file = Vec::new();
        file.extend_from_slice(b"9 0 obj\n<< /Type /XRef /Size 3 /W [1 2 1] /Length 12 >>\nstream\n");
        file.extend_from_slice(&body);
        file.extend_from_slice(b"\nendstream\nendobj\n");

        let table = load_xref(&src(&file), 0).unwrap();
        assert_eq!(table.get(0), Some(&XrefEntry::Free { next: 0, gen: 0 }));
        assert_eq!(table.get(1), Some(&XrefEntry::InUse { offset: 258, gen: 0 }));
        assert_eq!(table.get(2), Some(&XrefEntry::Compressed { stream_id: 5, index: 3 }));
    }

    #[test]
    fn test_xref_stream_default_type_field() {
        // w1 == 0 means every record is type 1.
        let body: Vec<u8> = vec![0x00, 0x10, 0, 0x00, 0x20, 0];
        let mut file = Vec::new();
        file.extend_from_slice(
            b"9 0 obj\n<< /Type /XRef /Size 2 /W [0 2 1] /Length 6 >>\nstream\n",
        );
        file.extend_from_slice(&body);
        file.extend_from_slice(b"\nendstream\nendobj\n");

        let table = load_xref(&src(&file), 0).unwrap();
        assert_eq!(table.get(0), Some(&XrefEntry::InUse { offset: 0x10, gen: 0 }));
        assert_eq!(table.get(1), Some(&XrefEntry::InUse { offset: 0x20, gen: 0 }));
    }

    #[test]
    fn test_recover_by_scan() {
        let file = b"%PDF-1.4\n1 0 obj\n<< /Type /Catalog >>\nendobj\n2 0 obj\n42\nendobj\ntrailer\n<< /Root 1 0 R >>\n";
        let table = recover_by_scan(&src(file));
        assert_eq!(table.len(), 2);
        match table.get(1) {
            Some(XrefEntry::InUse { offset, gen: 0 }) => {
                assert_eq!(&file[*offset as usize..*offset as usize + 7], b"1 0 obj");
            }
            other => panic!("unexpected entry {:?}", other),
        }
        assert!(table.trailer().contains_key("Root"));
    }

    #[test]
    fn test_recover_last_definition_wins() {
        let file = b"1 0 obj 1 endobj\nmore\n1 0 obj 2 endobj\n";
        let table = recover_by_scan(&src(file));
        match table.get(1) {
            Some(XrefEntry::InUse { offset, .. }) => assert!(*offset > 16),
            other => panic!("unexpected entry {:?}", other),
        }
    }

    #[test]
    fn test_broken_offset_is_an_error() {
        let s = src(b"not an xref at all");
        assert!(load_xref(&s, 0).is_err());
        assert!(load_xref(&s, 9999).is_err());
    }
}
