//! Single-byte font encodings and PDF text-string decoding.
//!
//! Simple fonts (Type1, TrueType, Type3) map each byte through a base
//! encoding — WinAnsi, MacRoman, MacExpert or Adobe Standard — with an
//! optional `/Differences` array overriding individual codes by glyph
//! name. Metadata and outline strings use PDFDocEncoding unless they carry
//! a UTF-16BE byte-order mark.

use crate::fonts::glyph_list::glyph_name_to_char;
use crate::object::Object;

/// A base encoding identified by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BaseEncoding {
    /// Adobe standard encoding (the Type1 default)
    #[default]
    Standard,
    /// Windows code page 1252 flavour
    WinAnsi,
    /// Classic Mac OS Roman
    MacRoman,
    /// Expert set (small caps, fractions); sparse support
    MacExpert,
}

impl BaseEncoding {
    /// Map an encoding name from a font dictionary.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "WinAnsiEncoding" => Some(BaseEncoding::WinAnsi),
            "MacRomanEncoding" => Some(BaseEncoding::MacRoman),
            "MacExpertEncoding" => Some(BaseEncoding::MacExpert),
            "StandardEncoding" => Some(BaseEncoding::Standard),
            _ => None,
        }
    }

    /// Decode one byte to a char, `None` when the code is unmapped.
    pub fn decode_byte(&self, byte: u8) -> Option<char> {
        let table: &[u16; 256] = match self {
            BaseEncoding::Standard => &STANDARD_TABLE,
            BaseEncoding::WinAnsi => &WIN_ANSI_TABLE,
            BaseEncoding::MacRoman => &MAC_ROMAN_TABLE,
            BaseEncoding::MacExpert => &MAC_EXPERT_TABLE,
        };
        match table[byte as usize] {
            0 => None,
            code => char::from_u32(code as u32),
        }
    }
}

/// One simple-font encoding: base table plus `/Differences` overrides.
#[derive(Debug, Clone, Default)]
pub struct SimpleEncoding {
    /// Base table the differences override
    pub base: BaseEncoding,
    /// Per-code overrides resolved through the glyph list
    pub differences: Vec<(u8, Option<char>)>,
}

impl SimpleEncoding {
    /// Build from an `/Encoding` entry: a bare name, or a dictionary with
    /// `/BaseEncoding` and `/Differences`.
    pub fn from_object(obj: &Object) -> Self {
        match obj {
            Object::Name(name) => SimpleEncoding {
                base: BaseEncoding::from_name(name).unwrap_or_default(),
                differences: Vec::new(),
            },
            Object::Dictionary(dict) => {
                let base = dict
                    .get("BaseEncoding")
                    .and_then(|o| o.as_name())
                    .and_then(BaseEncoding::from_name)
                    .unwrap_or_default();
                let mut differences = Vec::new();
                if let Some(arr) = dict.get("Differences").and_then(|o| o.as_array()) {
                    let mut code: i64 = 0;
                    for item in arr {
                        match item {
                            Object::Integer(i) => code = *i,
                            Object::Name(name) => {
                                if (0..=255).contains(&code) {
                                    differences.push((code as u8, glyph_name_to_char(name)));
                                }
                                code += 1;
                            }
                            _ => {}
                        }
                    }
                }
                SimpleEncoding { base, differences }
            }
            _ => SimpleEncoding::default(),
        }
    }

    /// Decode one byte, differences first, then the base table.
    pub fn decode_byte(&self, byte: u8) -> Option<char> {
        for &(code, ch) in &self.differences {
            if code == byte {
                return ch;
            }
        }
        self.base.decode_byte(byte)
    }
}

/// Decode a PDF text string: UTF-16BE with BOM, or PDFDocEncoding.
///
/// Used for `/Info` values, outline titles, and anywhere else the file
/// stores human-readable text outside content streams.
pub fn decode_text_string(bytes: &[u8]) -> String {
    if bytes.len() >= 2 && bytes[0] == 0xFE && bytes[1] == 0xFF {
        return decode_utf16_be(&bytes[2..]);
    }
    bytes
        .iter()
        .filter_map(|&b| match PDF_DOC_TABLE[b as usize] {
            0 => None,
            code => char::from_u32(code as u32),
        })
        .collect()
}

/// Decode UTF-16BE, pairing surrogates and dropping malformed units.
pub fn decode_utf16_be(bytes: &[u8]) -> String {
    let units: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
        .collect();
    String::from_utf16_lossy(&units)
}

// ---------------------------------------------------------------------------
// Encoding tables. Built at startup: a base fill plus the handful of codes
// where the encoding disagrees with Latin-1 / ASCII.
// ---------------------------------------------------------------------------

lazy_static::lazy_static! {
    static ref STANDARD_TABLE: [u16; 256] = build_standard();
    static ref WIN_ANSI_TABLE: [u16; 256] = build_win_ansi();
    static ref MAC_ROMAN_TABLE: [u16; 256] = build_mac_roman();
    static ref MAC_EXPERT_TABLE: [u16; 256] = build_mac_expert();
    static ref PDF_DOC_TABLE: [u16; 256] = build_pdf_doc();
}

fn ascii_fill(table: &mut [u16; 256]) {
    for code in 0x20..=0x7E {
        table[code as usize] = code;
    }
}

fn apply(table: &mut [u16; 256], overrides: &[(u8, u16)]) {
    for &(code, value) in overrides {
        table[code as usize] = value;
    }
}

fn build_standard() -> [u16; 256] {
    let mut t = [0u16; 256];
    ascii_fill(&mut t);
    apply(
        &mut t,
        &[
            (0x27, 0x2019), // quoteright
            (0x60, 0x2018), // quoteleft
            (0xA1, 0x00A1),
            (0xA2, 0x00A2),
            (0xA3, 0x00A3),
            (0xA4, 0x2044),
            (0xA5, 0x00A5),
            (0xA6, 0x0192),
            (0xA7, 0x00A7),
            (0xA8, 0x00A4),
            (0xA9, 0x0027),
            (0xAA, 0x201C),
            (0xAB, 0x00AB),
            (0xAC, 0x2039),
            (0xAD, 0x203A),
            (0xAE, 0xFB01),
            (0xAF, 0xFB02),
            (0xB1, 0x2013),
            (0xB2, 0x2020),
            (0xB3, 0x2021),
            (0xB4, 0x00B7),
            (0xB6, 0x00B6),
            (0xB7, 0x2022),
            (0xB8, 0x201A),
            (0xB9, 0x201E),
            (0xBA, 0x201D),
            (0xBB, 0x00BB),
            (0xBC, 0x2026),
            (0xBD, 0x2030),
            (0xBF, 0x00BF),
            (0xC1, 0x0060),
            (0xC2, 0x00B4),
            (0xC3, 0x02C6),
            (0xC4, 0x02DC),
            (0xC5, 0x00AF),
            (0xC6, 0x02D8),
            (0xC7, 0x02D9),
            (0xC8, 0x00A8),
            (0xCA, 0x02DA),
            (0xCB, 0x00B8),
            (0xCD, 0x02DD),
            (0xCE, 0x02DB),
            (0xCF, 0x02C7),
            (0xD0, 0x2014),
            (0xE1, 0x00C6),
            (0xE3, 0x00AA),
            (0xE8, 0x0141),
            (0xE9, 0x00D8),
            (0xEA, 0x0152),
            (0xEB, 0x00BA),
            (0xF1, 0x00E6),
            (0xF5, 0x0131),
            (0xF8, 0x0142),
            (0xF9, 0x00F8),
            (0xFA, 0x0153),
            (0xFB, 0x00DF),
        ],
    );
    t
}

fn build_win_ansi() -> [u16; 256] {
    let mut t = [0u16; 256];
    ascii_fill(&mut t);
    // Latin-1 upper half.
    for code in 0xA0..=0xFF_u16 {
        t[code as usize] = code;
    }
    // CP1252's 0x80-0x9F block.
    apply(
        &mut t,
        &[
            (0x80, 0x20AC),
            (0x82, 0x201A),
            (0x83, 0x0192),
            (0x84, 0x201E),
            (0x85, 0x2026),
            (0x86, 0x2020),
            (0x87, 0x2021),
            (0x88, 0x02C6),
            (0x89, 0x2030),
            (0x8A, 0x0160),
            (0x8B, 0x2039),
            (0x8C, 0x0152),
            (0x8E, 0x017D),
            (0x91, 0x2018),
            (0x92, 0x2019),
            (0x93, 0x201C),
            (0x94, 0x201D),
            (0x95, 0x2022),
            (0x96, 0x2013),
            (0x97, 0x2014),
            (0x98, 0x02DC),
            (0x99, 0x2122),
            (0x9A, 0x0161),
            (0x9B, 0x203A),
            (0x9C, 0x0153),
            (0x9E, 0x017E),
            (0x9F, 0x0178),
        ],
    );
    t
}

fn build_mac_roman() -> [u16; 256] {
    let mut t = [0u16; 256];
    ascii_fill(&mut t);
    const HIGH: [u16; 128] = [
        0x00C4, 0x00C5, 0x00C7, 0x00C9, 0x00D1, 0x00D6, 0x00DC, 0x00E1, 0x00E0, 0x00E2, 0x00E4,
        0x00E3, 0x00E5, 0x00E7, 0x00E9, 0x00E8, 0x00EA, 0x00EB, 0x00ED, 0x00EC, 0x00EE, 0x00EF,
        0x00F1, 0x00F3, 0x00F2, 0x00F4, 0x00F6, 0x00F5, 0x00FA, 0x00F9, 0x00FB, 0x00FC, 0x2020,
        0x00B0, 0x00A2, 0x00A3, 0x00A7, 0x2022, 0x00B6, 0x00DF, 0x00AE, 0x00A9, 0x2122, 0x00B4,
        0x00A8, 0x2260, 0x00C6, 0x00D8, 0x221E, 0x00B1, 0x2264, 0x2265, 0x00A5, 0x00B5, 0x2202,
        0x2211, 0x220F, 0x03C0, 0x222B, 0x00AA, 0x00BA, 0x03A9, 0x00E6, 0x00F8, 0x00BF, 0x00A1,
        0x00AC, 0x221A, 0x0192, 0x2248, 0x2206, 0x00AB, 0x00BB, 0x2026, 0x00A0, 0x00C0, 0x00C3,
        0x00D5, 0x0152, 0x0153, 0x2013, 0x2014, 0x201C, 0x201D, 0x2018, 0x2019, 0x00F7, 0x25CA,
        0x00FF, 0x0178, 0x2044, 0x20AC, 0x2039, 0x203A, 0xFB01, 0xFB02, 0x2021, 0x00B7, 0x201A,
        0x201E, 0x2030, 0x00C2, 0x00CA, 0x00C1, 0x00CB, 0x00C8, 0x00CD, 0x00CE, 0x00CF, 0x00CC,
        0x00D3, 0x00D4, 0xF8FF, 0x00D2, 0x00DA, 0x00DB, 0x00D9, 0x0131, 0x02C6, 0x02DC, 0x00AF,
        0x02D8, 0x02D9, 0x02DA, 0x00B8, 0x02DD, 0x02DB, 0x02C7,
    ];
    for (i, &code) in HIGH.iter().enumerate() {
        t[0x80 + i] = code;
    }
    t
}

fn build_mac_expert() -> [u16; 256] {
    // The expert set is small caps and fiddly figures; map the handful of
    // codes that carry over to ordinary text and leave the rest unmapped.
    let mut t = [0u16; 256];
    apply(
        &mut t,
        &[
            (0x20, 0x0020),
            (0x21, 0xF721),
            (0x56, 0xFB00), // ff
            (0x57, 0xFB01), // fi
            (0x58, 0xFB02), // fl
            (0x59, 0xFB03), // ffi
            (0x5A, 0xFB04), // ffl
            (0x2D, 0x002D),
            (0x2E, 0x002E),
            (0x2F, 0x2044),
        ],
    );
    // Oldstyle figures decode as plain digits.
    for i in 0..10u16 {
        t[(0x30 + i) as usize] = 0x0030 + i;
    }
    t
}

fn build_pdf_doc() -> [u16; 256] {
    let mut t = [0u16; 256];
    ascii_fill(&mut t);
    for code in 0xA0..=0xFF_u16 {
        t[code as usize] = code;
    }
    apply(
        &mut t,
        &[
            (0x18, 0x02D8),
            (0x19, 0x02C7),
            (0x1A, 0x02C6),
            (0x1B, 0x02D9),
            (0x1C, 0x02DD),
            (0x1D, 0x02DB),
            (0x1E, 0x02DA),
            (0x1F, 0x02DC),
            (0x80, 0x2022),
            (0x81, 0x2020),
            (0x82, 0x2021),
            (0x83, 0x2026),
            (0x84, 0x2014),
            (0x85, 0x2013),
            (0x86, 0x0192),
            (0x87, 0x2044),
            (0x88, 0x2039),
            (0x89, 0x203A),
            (0x8A, 0x2212),
            (0x8B, 0x2030),
            (0x8C, 0x201E),
            (0x8D, 0x201C),
            (0x8E, 0x201D),
            (0x8F, 0x2018),
            (0x90, 0x2019),
            (0x91, 0x201A),
            (0x92, 0x2122),
            (0x93, 0xFB01),
            (0x94, 0xFB02),
            (0x95, 0x0141),
            (0x96, 0x0152),
            (0x97, 0x0160),
            (0x98, 0x0178),
            (0x99, 0x017D),
            (0x9A, 0x0131),
            (0x9B, 0x0142),
            (0x9C, 0x0153),
            (0x9D, 0x0161),
            (0x9E, 0x017E),
            (0xA0, 0x20AC),
        ],
    );
    t
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Dict;

    #[test]
    fn test_win_ansi_ascii_passthrough() {
        let enc = BaseEncoding::WinAnsi;
        assert_eq!(enc.decode_byte(b'H'), Some('H'));
        assert_eq!(enc.decode_byte(b' '), Some(' '));
        assert_eq!(enc.decode_byte(b'~'), Some('~'));
    }

    #[test]
    fn test_win_ansi_high_range() {
        let enc = BaseEncoding::WinAnsi;
        assert_eq!(enc.decode_byte(0x80), Some('€'));
        assert_eq!(enc.decode_byte(0x93), Some('\u{201C}'));
        assert_eq!(enc.decode_byte(0xE9), Some('é'));
        assert_eq!(enc.decode_byte(0x9F), Some('Ÿ'));
    }

    #[test]
    fn test_win_ansi_unmapped_control() {
        assert_eq!(BaseEncoding::WinAnsi.decode_byte(0x00), None);
        assert_eq!(BaseEncoding::WinAnsi.decode_byte(0x81), None);
    }

    #[test]
    fn test_mac_roman_high_range() {
        let enc = BaseEncoding::MacRoman;
        assert_eq!(enc.decode_byte(0x80), Some('Ä'));
        assert_eq!(enc.decode_byte(0x8E), Some('é'));
        assert_eq!(enc.decode_byte(0xD0), Some('–'));
    }

    #[test]
    fn test_standard_quotes() {
        let enc = BaseEncoding::Standard;
        assert_eq!(enc.decode_byte(0x27), Some('\u{2019}'));
        assert_eq!(enc.decode_byte(0x60), Some('\u{2018}'));
        assert_eq!(enc.decode_byte(0xAE), Some('\u{FB01}'));
    }

    #[test]
    fn test_encoding_name_mapping() {
        assert_eq!(BaseEncoding::from_name("WinAnsiEncoding"), Some(BaseEncoding::WinAnsi));
        assert_eq!(BaseEncoding::from_name("NoSuchEncoding"), None);
    }

    #[test]
    fn test_differences_override() {
        let mut dict = Dict::new();
        dict.insert(
            "BaseEncoding".to_string(),
            Object::Name("WinAnsiEncoding".to_string()),
        );
        dict.insert(
            "Differences".to_string(),
            Object::Array(vec![
                Object::Integer(65),
                Object::Name("eacute".to_string()),
                Object::Name("egrave".to_string()),
                Object::Integer(200),
                Object::Name("fi".to_string()),
            ]),
        );
        let enc = SimpleEncoding::from_object(&Object::Dictionary(dict));
        assert_eq!(enc.decode_byte(65), Some('é'));
        assert_eq!(enc.decode_byte(66), Some('è'));
        assert_eq!(enc.decode_byte(200), Some('\u{FB01}'));
        // Untouched codes fall through to the base encoding.
        assert_eq!(enc.decode_byte(b'C'), Some('C'));
    }

    #[test]
    fn test_encoding_from_bare_name() {
        let enc = SimpleEncoding::from_object(&Object::Name("MacRomanEncoding".to_string()));
        assert_eq!(enc.base, BaseEncoding::MacRoman);
        assert!(enc.differences.is_empty());
    }

    #[test]
    fn test_text_string_pdfdoc() {
        assert_eq!(decode_text_string(b"Hello"), "Hello");
        assert_eq!(decode_text_string(&[0x93]), "\u{FB01}");
    }

    #[test]
    fn test_text_string_utf16() {
        let bytes = [0xFE, 0xFF, 0x00, 0x48, 0x00, 0x69, 0x20, 0x14];
        assert_eq!(decode_text_string(&bytes), "Hi\u{2014}");
    }

    #[test]
    fn test_utf16_surrogate_pair() {
        // U+1D70C as a surrogate pair D835 DF0C.
        let bytes = [0xFE, 0xFF, 0xD8, 0x35, 0xDF, 0x0C];
        assert_eq!(decode_text_string(&bytes), "\u{1D70C}");
    }
}
