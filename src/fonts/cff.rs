//! CFF (Compact Font Format) skeleton.
//!
//! Parsed only as deep as text extraction needs: when a font dictionary
//! carries no usable `/Widths` or `/W` table, glyph advances and the
//! GID-to-CID charset come from the embedded CFF program. That means the
//! header, the INDEX structures, the Top DICT operators we care about,
//! the Private DICT width defaults, the charset, and just enough Type 2
//! charstring decoding to read the leading width operand. Rendering-level
//! structures (subroutine execution, hints, the actual outlines) are out
//! of scope.

use crate::error::{Error, Result};
use byteorder::{BigEndian, ByteOrder};
use std::collections::HashMap;

/// Top DICT / Private DICT operators this skeleton understands.
const OP_CHARSET: u16 = 15;
const OP_CHARSTRINGS: u16 = 17;
const OP_PRIVATE: u16 = 18;
const OP_DEFAULT_WIDTH_X: u16 = 20;
const OP_NOMINAL_WIDTH_X: u16 = 21;
const OP_ROS: u16 = 0x0C1E;
const OP_FD_ARRAY: u16 = 0x0C24;

/// Parsed skeleton of one CFF font program.
#[derive(Debug)]
pub struct CffFont {
    charstrings: Vec<(usize, usize)>,
    data: Vec<u8>,
    default_width: f32,
    nominal_width: f32,
    /// GID -> CID (identity when the font has no charset or is not CID-keyed)
    charset: Vec<u32>,
    cid_to_gid: HashMap<u32, u16>,
    /// True when the Top DICT carried a ROS operator
    pub is_cid_keyed: bool,
}

impl CffFont {
    /// Parse a CFF program.
    pub fn parse(data: &[u8]) -> Result<CffFont> {
        if data.len() < 4 {
            return Err(Error::Font("CFF data too short".to_string()));
        }
        let header_size = data[2] as usize;
        if header_size > data.len() {
            return Err(Error::Font("CFF header size out of range".to_string()));
        }

        let mut pos = header_size;
        let (_names, next) = read_index(data, pos)?;
        pos = next;
        let (top_dicts, next) = read_index(data, pos)?;
        pos = next;
        let (_strings, next) = read_index(data, pos)?;
        pos = next;
        let (_gsubrs, _) = read_index(data, pos)?;

        let top = top_dicts
            .first()
            .ok_or_else(|| Error::Font("CFF has no Top DICT".to_string()))?;
        let top_dict = parse_dict(&data[top.0..top.1]);

        let charstrings_offset = dict_int(&top_dict, OP_CHARSTRINGS)
            .ok_or_else(|| Error::Font("CFF Top DICT missing CharStrings".to_string()))?;
        let (charstrings, _) = read_index(data, charstrings_offset as usize)?;
        let glyph_count = charstrings.len();

        let is_cid_keyed = top_dict.contains_key(&OP_ROS);

        // Width defaults come from the Private DICT; CID-keyed fonts keep
        // them per FD — the first FD covers the overwhelmingly common
        // single-FD subset case.
        let (default_width, nominal_width) = match dict_operands(&top_dict, OP_PRIVATE) {
            Some(ops) if ops.len() >= 2 => read_private(data, ops[1] as usize, ops[0] as usize),
            _ => match dict_int(&top_dict, OP_FD_ARRAY) {
                Some(fd_offset) => read_first_fd_private(data, fd_offset as usize),
                None => (0.0, 0.0),
            },
        };

        let charset = match dict_int(&top_dict, OP_CHARSET) {
            Some(offset) if offset > 2 => {
                parse_charset(data, offset as usize, glyph_count)
            }
            // 0/1/2 select predefined charsets; identity is the usable
            // approximation for width lookup purposes.
            _ => (0..glyph_count as u32).collect(),
        };

        let mut cid_to_gid = HashMap::with_capacity(charset.len());
        for (gid, &cid) in charset.iter().enumerate() {
            cid_to_gid.entry(cid).or_insert(gid as u16);
        }

        Ok(CffFont {
            charstrings: charstrings.clone(),
            data: data.to_vec(),
            default_width,
            nominal_width,
            charset,
            cid_to_gid,
            is_cid_keyed,
        })
    }

    /// Number of glyphs in the CharStrings INDEX.
    pub fn glyph_count(&self) -> usize {
        self.charstrings.len()
    }

    /// Advance width of a glyph in charstring units (usually 1/1000 em).
    pub fn glyph_width(&self, gid: u16) -> Option<f32> {
        let &(start, end) = self.charstrings.get(gid as usize)?;
        let charstring = self.data.get(start..end)?;
        Some(match charstring_width(charstring) {
            Some(delta) => self.nominal_width + delta,
            None => self.default_width,
        })
    }

    /// CID assigned to a glyph (identity when not CID-keyed).
    pub fn cid_for_gid(&self, gid: u16) -> Option<u32> {
        self.charset.get(gid as usize).copied()
    }

    /// Reverse charset lookup.
    pub fn gid_for_cid(&self, cid: u32) -> Option<u16> {
        self.cid_to_gid.get(&cid).copied()
    }
}

/// Read one INDEX, returning `(start, end)` spans into `data` and the
/// offset just past the structure.
fn read_index(data: &[u8], pos: usize) -> Result<(Vec<(usize, usize)>, usize)> {
    if pos + 2 > data.len() {
        return Err(Error::Font("CFF INDEX truncated".to_string()));
    }
    let count = BigEndian::read_u16(&data[pos..]) as usize;
    if count == 0 {
        return Ok((Vec::new(), pos + 2));
    }
    let off_size = *data.get(pos + 2).ok_or_else(|| Error::Font("CFF INDEX truncated".to_string()))? as usize;
    if !(1..=4).contains(&off_size) {
        return Err(Error::Font(format!("CFF INDEX offSize {} invalid", off_size)));
    }

    let offsets_start = pos + 3;
    let offsets_end = offsets_start + (count + 1) * off_size;
    if offsets_end > data.len() {
        return Err(Error::Font("CFF INDEX offsets truncated".to_string()));
    }

    let read_offset = |i: usize| -> usize {
        let p = offsets_start + i * off_size;
        data[p..p + off_size].iter().fold(0usize, |acc, &b| (acc << 8) | b as usize)
    };

    let data_start = offsets_end - 1; // offsets are 1-based
    let mut entries = Vec::with_capacity(count);
    for i in 0..count {
        let start = data_start + read_offset(i);
        let end = data_start + read_offset(i + 1);
        if start > end || end > data.len() {
            return Err(Error::Font("CFF INDEX entry out of range".to_string()));
        }
        entries.push((start, end));
    }
    let index_end = data_start + read_offset(count);
    Ok((entries, index_end))
}

/// Parse a DICT into operator -> operand list.
fn parse_dict(data: &[u8]) -> HashMap<u16, Vec<f64>> {
    let mut dict = HashMap::new();
    let mut operands: Vec<f64> = Vec::new();
    let mut pos = 0usize;

    while pos < data.len() {
        let b0 = data[pos];
        match b0 {
            0..=21 => {
                // Operator, possibly two-byte (escape 12).
                let op = if b0 == 12 {
                    pos += 1;
                    match data.get(pos) {
                        Some(&b1) => 0x0C00 | b1 as u16,
                        None => break,
                    }
                } else {
                    b0 as u16
                };
                pos += 1;
                dict.insert(op, std::mem::take(&mut operands));
            }
            28 => {
                if pos + 3 > data.len() {
                    break;
                }
                operands.push(BigEndian::read_i16(&data[pos + 1..]) as f64);
                pos += 3;
            }
            29 => {
                if pos + 5 > data.len() {
                    break;
                }
                operands.push(BigEndian::read_i32(&data[pos + 1..]) as f64);
                pos += 5;
            }
            30 => {
                let (value, consumed) = parse_real(&data[pos + 1..]);
                operands.push(value);
                pos += 1 + consumed;
            }
            32..=246 => {
                operands.push(b0 as f64 - 139.0);
                pos += 1;
            }
            247..=250 => {
                match data.get(pos + 1) {
                    Some(&b1) => {
                        operands.push((b0 as f64 - 247.0) * 256.0 + b1 as f64 + 108.0);
                        pos += 2;
                    }
                    None => break,
                }
            }
            251..=254 => {
                match data.get(pos + 1) {
                    Some(&b1) => {
                        operands.push(-(b0 as f64 - 251.0) * 256.0 - b1 as f64 - 108.0);
                        pos += 2;
                    }
                    None => break,
                }
            }
            _ => {
                pos += 1; // reserved byte, skip
            }
        }
    }
    dict
}

/// Nibble-encoded real number; returns (value, bytes consumed).
fn parse_real(data: &[u8]) -> (f64, usize) {
    let mut text = String::new();
    let mut consumed = 0usize;
    'outer: for &byte in data {
        consumed += 1;
        for nibble in [byte >> 4, byte & 0x0F] {
            match nibble {
                0..=9 => text.push((b'0' + nibble) as char),
                0xA => text.push('.'),
                0xB => text.push('E'),
                0xC => text.push_str("E-"),
                0xE => text.push('-'),
                0xF => break 'outer,
                _ => {}
            }
        }
    }
    (text.parse().unwrap_or(0.0), consumed)
}

fn dict_operands(dict: &HashMap<u16, Vec<f64>>, op: u16) -> Option<&Vec<f64>> {
    dict.get(&op)
}

fn dict_int(dict: &HashMap<u16, Vec<f64>>, op: u16) -> Option<i64> {
    dict.get(&op)?.last().map(|&v| v as i64)
}

fn read_private(data: &[u8], offset: usize, size: usize) -> (f32, f32) {
    let end = offset.saturating_add(size).min(data.len());
    if offset >= end {
        return (0.0, 0.0);
    }
    let private = parse_dict(&data[offset..end]);
    let default_width = dict_int(&private, OP_DEFAULT_WIDTH_X).unwrap_or(0) as f32;
    let nominal_width = dict_int(&private, OP_NOMINAL_WIDTH_X).unwrap_or(0) as f32;
    (default_width, nominal_width)
}

fn read_first_fd_private(data: &[u8], fd_array_offset: usize) -> (f32, f32) {
    match read_index(data, fd_array_offset) {
        Ok((fds, _)) => match fds.first() {
            Some(&(start, end)) => {
                let fd_dict = parse_dict(&data[start..end]);
                match dict_operands(&fd_dict, OP_PRIVATE) {
                    Some(ops) if ops.len() >= 2 => {
                        read_private(data, ops[1] as usize, ops[0] as usize)
                    }
                    _ => (0.0, 0.0),
                }
            }
            None => (0.0, 0.0),
        },
        Err(_) => (0.0, 0.0),
    }
}

/// Charset formats 0-2: GID -> CID (or SID) assignments.
fn parse_charset(data: &[u8], offset: usize, glyph_count: usize) -> Vec<u32> {
    let mut charset = Vec::with_capacity(glyph_count);
    charset.push(0); // glyph 0 is always .notdef / CID 0

    let format = match data.get(offset) {
        Some(&f) => f,
        None => return identity_charset(glyph_count),
    };
    let mut pos = offset + 1;

    match format {
        0 => {
            while charset.len() < glyph_count && pos + 2 <= data.len() {
                charset.push(BigEndian::read_u16(&data[pos..]) as u32);
                pos += 2;
            }
        }
        1 | 2 => {
            let n_left_size = if format == 1 { 1 } else { 2 };
            while charset.len() < glyph_count && pos + 2 + n_left_size <= data.len() {
                let first = BigEndian::read_u16(&data[pos..]) as u32;
                pos += 2;
                let n_left = if format == 1 {
                    data[pos] as u32
                } else {
                    BigEndian::read_u16(&data[pos..]) as u32
                };
                pos += n_left_size;
                for delta in 0..=n_left {
                    if charset.len() >= glyph_count {
                        break;
                    }
                    charset.push(first + delta);
                }
            }
        }
        other => {
            log::debug!("CFF charset format {} unsupported, using identity", other);
            return identity_charset(glyph_count);
        }
    }

    while charset.len() < glyph_count {
        let next = charset.len() as u32;
        charset.push(next);
    }
    charset
}

fn identity_charset(glyph_count: usize) -> Vec<u32> {
    (0..glyph_count as u32).collect()
}

/// Extract the leading width operand of a Type 2 charstring.
///
/// The width, when present, is the first operand before the first
/// stem/mask/moveto/endchar operator; it is present when that operator
/// sees one more operand than its signature takes. A charstring that
/// calls a subroutine before settling its width gives up and reports the
/// default.
fn charstring_width(charstring: &[u8]) -> Option<f32> {
    let mut operands: Vec<f32> = Vec::new();
    let mut pos = 0usize;

    while pos < charstring.len() {
        let b0 = charstring[pos];
        match b0 {
            // Operators that settle the width question.
            1 | 3 | 18 | 23 => return odd_width(&operands), // h/vstem(hm)
            19 | 20 => return odd_width(&operands),          // hintmask/cntrmask
            21 => return extra_width(&operands, 2),          // rmoveto
            22 | 4 => return extra_width(&operands, 1),      // h/vmoveto
            14 => {
                // endchar: zero args (ignoring deprecated seac form)
                return if operands.is_empty() {
                    None
                } else {
                    operands.first().copied()
                };
            }
            10 | 29 => return None, // call(g)subr before width: give up
            12 => {
                pos += 2; // escaped operator, not width-relevant
            }
            28 => {
                if pos + 3 > charstring.len() {
                    return None;
                }
                operands.push(BigEndian::read_i16(&charstring[pos + 1..]) as f32);
                pos += 3;
            }
            32..=246 => {
                operands.push(b0 as f32 - 139.0);
                pos += 1;
            }
            247..=250 => {
                let b1 = *charstring.get(pos + 1)? as f32;
                operands.push((b0 as f32 - 247.0) * 256.0 + b1 + 108.0);
                pos += 2;
            }
            251..=254 => {
                let b1 = *charstring.get(pos + 1)? as f32;
                operands.push(-(b0 as f32 - 251.0) * 256.0 - b1 - 108.0);
                pos += 2;
            }
            255 => {
                if pos + 5 > charstring.len() {
                    return None;
                }
                // 16.16 fixed point
                operands.push(BigEndian::read_i32(&charstring[pos + 1..]) as f32 / 65536.0);
                pos += 5;
            }
            _ => return None, // any other operator before a moveto: no width
        }
    }
    None
}

fn odd_width(operands: &[f32]) -> Option<f32> {
    if operands.len() % 2 == 1 {
        operands.first().copied()
    } else {
        None
    }
}

fn extra_width(operands: &[f32], arity: usize) -> Option<f32> {
    if operands.len() > arity {
        operands.first().copied()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a minimal single-glyph CFF by hand.
    fn build_test_cff(charstring: &[u8], private_dict: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&[1, 0, 4, 1]); // header: v1.0, hdrSize 4, offSize 1

        // Name INDEX: one entry "t".
        out.extend_from_slice(&[0, 1, 1, 1, 2, b't']);

        // Top DICT INDEX placeholder gets patched below; build the dict
        // body first so offsets are known. Operand layout:
        //   <charstrings offset> 17   <private size> <private offset> 18
        // Offsets are absolute, so assemble back to front with fixed-width
        // 5-byte integer encodings (op 29).
        let name_index_len = 6;
        let header_len = 4;
        // Top DICT body: two entries, each 5-byte int operands.
        let top_dict_body_len = (5 + 1) + (5 + 5 + 1);
        let top_index_len = 2 + 1 + 2 + top_dict_body_len;
        let string_index_len = 2;
        let gsubr_index_len = 2;
        let charstrings_offset = header_len + name_index_len + top_index_len + string_index_len + gsubr_index_len;
        let charstrings_len = 2 + 1 + 2 + charstring.len();
        let private_offset = charstrings_offset + charstrings_len;

        let int5 = |v: usize| -> [u8; 5] {
            let b = (v as i32).to_be_bytes();
            [29, b[0], b[1], b[2], b[3]]
        };

        // Top DICT INDEX: count 1, offSize 1, offsets [1, body+1].
        out.extend_from_slice(&[0, 1, 1, 1, (top_dict_body_len + 1) as u8]);
        out.extend_from_slice(&int5(charstrings_offset));
        out.push(17);
        out.extend_from_slice(&int5(private_dict.len()));
        out.extend_from_slice(&int5(private_offset));
        out.push(18);

        out.extend_from_slice(&[0, 0]); // String INDEX: empty
        out.extend_from_slice(&[0, 0]); // Global Subr INDEX: empty

        // CharStrings INDEX: one glyph.
        out.extend_from_slice(&[0, 1, 1, 1, (charstring.len() + 1) as u8]);
        out.extend_from_slice(charstring);

        out.extend_from_slice(private_dict);
        out
    }

    /// Private DICT: defaultWidthX 500, nominalWidthX 100.
    fn test_private() -> Vec<u8> {
        let mut d = Vec::new();
        d.extend_from_slice(&[28, 0x01, 0xF4, 20]); // 500 defaultWidthX
        d.extend_from_slice(&[28, 0x00, 0x64, 21]); // 100 nominalWidthX
        d
    }

    #[test]
    fn test_parse_minimal_font() {
        // Charstring: 50 hmoveto endchar — one extra operand => width 50.
        let charstring = [28, 0, 50, 28, 0, 10, 22, 14];
        let cff = CffFont::parse(&build_test_cff(&charstring, &test_private())).unwrap();
        assert_eq!(cff.glyph_count(), 1);
        assert!(!cff.is_cid_keyed);
        // width = nominal (100) + leading operand (50)
        assert_eq!(cff.glyph_width(0), Some(150.0));
    }

    #[test]
    fn test_default_width_when_no_leading_operand() {
        // hmoveto with exactly its one argument: no width operand.
        let charstring = [28, 0, 10, 22, 14];
        let cff = CffFont::parse(&build_test_cff(&charstring, &test_private())).unwrap();
        assert_eq!(cff.glyph_width(0), Some(500.0));
    }

    #[test]
    fn test_identity_charset_fallback() {
        let charstring = [14u8];
        let cff = CffFont::parse(&build_test_cff(&charstring, &test_private())).unwrap();
        assert_eq!(cff.cid_for_gid(0), Some(0));
        assert_eq!(cff.gid_for_cid(0), Some(0));
    }

    #[test]
    fn test_truncated_data_is_error() {
        assert!(CffFont::parse(&[1, 0]).is_err());
        assert!(CffFont::parse(&[1, 0, 4, 1, 0, 9]).is_err());
    }

    #[test]
    fn test_charstring_width_rules() {
        // rmoveto with 3 operands: first is the width.
        assert_eq!(charstring_width(&[28, 0, 77, 139, 139, 21]), Some(77.0));
        // rmoveto with 2 operands: no width.
        assert_eq!(charstring_width(&[139, 139, 21]), None);
        // hstem with odd operand count: width present.
        assert_eq!(charstring_width(&[28, 0, 33, 139, 139, 1]), Some(33.0));
        // callsubr first: give up.
        assert_eq!(charstring_width(&[139, 10]), None);
    }

    #[test]
    fn test_parse_real_nibbles() {
        // -2.25 encoded as nibbles: e 2 a 2 5 f
        let (value, consumed) = parse_real(&[0xE2, 0xA2, 0x5F]);
        assert!((value - -2.25).abs() < 1e-9);
        assert_eq!(consumed, 3);
    }
}
