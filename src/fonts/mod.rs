//! Font loading and glyph-to-Unicode decoding.
//!
//! A [`Font`] is built once from its dictionary (and cached per batch),
//! then answers the interpreter's only question: given the raw bytes of a
//! text-showing operator, what text do they spell and how far does each
//! glyph advance?
//!
//! Unicode resolution order, per glyph: the font's `/ToUnicode` CMap,
//! then the simple-font encoding (differences over a base table), then
//! the character-collection tables for CID fonts, then a conservative
//! ASCII passthrough. Widths come from `/Widths` or `/W`, falling back to
//! an embedded CFF program, then to the `/MissingWidth`-style defaults.

pub mod cff;
pub mod cid_mappings;
pub mod cmap;
pub mod encoding;
pub mod glyph_list;
pub mod predefined;

use crate::object::{Dict, Object, Resolve};
use cmap::{CMap, CMapKind};
use encoding::SimpleEncoding;
use std::collections::HashMap;
use std::sync::Arc;

/// Font subtype, as far as extraction cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontKind {
    /// Type1 / MMType1 simple font
    Type1,
    /// TrueType simple font
    TrueType,
    /// Type3 (glyphs are content streams; widths in glyph space)
    Type3,
    /// Type0 composite font with a CID-keyed descendant
    Type0,
    /// Anything unrecognised, treated as a simple font
    Unknown,
}

/// One decoded glyph cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedGlyph {
    /// Unicode text for the glyph (may be empty when unmappable,
    /// several chars for ligature expansions)
    pub text: String,
    /// Advance width in thousandths of an em
    pub width: f32,
    /// The raw character code
    pub code: u32,
    /// True when this glyph is the single-byte space (word spacing applies)
    pub is_space: bool,
}

/// A loaded font ready for decoding.
#[derive(Debug)]
pub struct Font {
    /// `/BaseFont` name, subset tag and all
    pub name: String,
    /// Subtype
    pub kind: FontKind,
    /// Vertical writing mode (Identity-V and friends)
    pub vertical: bool,

    encoding: SimpleEncoding,
    first_char: u32,
    widths: Vec<f32>,
    default_width: f32,
    /// Type3 glyph-space scale: FontMatrix[0] * 1000
    type3_scale: f32,

    to_unicode: Option<Arc<CMap>>,
    encoding_cmap: Option<Arc<CMap>>,
    ordering: String,
    cid_widths: HashMap<u32, f32>,
    cid_default_width: f32,
    cff: Option<cff::CffFont>,
}

impl Default for Font {
    fn default() -> Self {
        Self {
            name: String::new(),
            kind: FontKind::Unknown,
            vertical: false,
            encoding: SimpleEncoding::default(),
            first_char: 0,
            widths: Vec::new(),
            default_width: 500.0,
            type3_scale: 1.0,
            to_unicode: None,
            encoding_cmap: None,
            ordering: String::new(),
            cid_widths: HashMap::new(),
            cid_default_width: 1000.0,
            cff: None,
        }
    }
}

impl Font {
    /// Build a font from its dictionary.
    ///
    /// Never fails: a hostile or vacuous dictionary yields a font that
    /// decodes nothing but still advances by the default width, keeping
    /// layout stable for the glyphs around it.
    pub fn from_dict(dict: &Dict, resolver: &dyn Resolve) -> Font {
        let mut font = Font {
            name: dict
                .get("BaseFont")
                .and_then(|o| o.as_name())
                .unwrap_or("")
                .to_string(),
            ..Font::default()
        };

        font.kind = match dict.get("Subtype").and_then(|o| o.as_name()) {
            Some("Type1") | Some("MMType1") => FontKind::Type1,
            Some("TrueType") => FontKind::TrueType,
            Some("Type3") => FontKind::Type3,
            Some("Type0") => FontKind::Type0,
            _ => FontKind::Unknown,
        };

        // ToUnicode applies to every subtype.
        if let Some(obj) = dict.get("ToUnicode") {
            let resolved = resolver.resolve(obj);
            if let Some(bytes) = resolver.decoded_stream(&resolved) {
                match CMap::parse(&bytes, CMapKind::ToUnicode) {
                    Ok(cmap) if !cmap.is_empty() => font.to_unicode = Some(Arc::new(cmap)),
                    Ok(_) => log::debug!("empty ToUnicode CMap on {}", font.name),
                    Err(e) => log::warn!("unreadable ToUnicode CMap on {}: {}", font.name, e),
                }
            }
        }

        if font.kind == FontKind::Type0 {
            font.load_type0(dict, resolver);
        } else {
            font.load_simple(dict, resolver);
        }

        font
    }

    fn load_simple(&mut self, dict: &Dict, resolver: &dyn Resolve) {
        if let Some(obj) = dict.get("Encoding") {
            let resolved = resolver.resolve(obj);
            self.encoding = SimpleEncoding::from_object(&resolved);
        }

        self.first_char = dict
            .get("FirstChar")
            .and_then(|o| o.as_integer())
            .unwrap_or(0)
            .max(0) as u32;

        if let Some(arr) = as_resolved_array(dict.get("Widths"), resolver) {
            self.widths = arr
                .iter()
                .map(|o| resolver.resolve(o).as_number().unwrap_or(0.0) as f32)
                .collect();
        }

        if self.kind == FontKind::Type3 {
            if let Some(matrix) = dict.get("FontMatrix").and_then(|o| o.as_array()) {
                let a = matrix
                    .first()
                    .and_then(|o| o.as_number())
                    .unwrap_or(0.001);
                self.type3_scale = (a * 1000.0) as f32;
            } else {
                self.type3_scale = 1.0;
            }
        }

        self.load_descriptor(dict.get("FontDescriptor"), resolver);
    }

    fn load_type0(&mut self, dict: &Dict, resolver: &dyn Resolve) {
        // Encoding: a predefined CMap name or an embedded CMap stream.
        match dict.get("Encoding").map(|o| resolver.resolve(o)) {
            Some(Object::Name(name)) => {
                self.encoding_cmap = predefined::predefined_cmap(&name);
                self.vertical = name.ends_with("-V");
                if self.encoding_cmap.is_none() {
                    log::warn!("unknown encoding CMap /{}, assuming Identity-H", name);
                }
            }
            Some(stream @ Object::Stream { .. }) => {
                if let Some(bytes) = resolver.decoded_stream(&stream) {
                    if let Ok(mut cmap) = CMap::parse(&bytes, CMapKind::Cid) {
                        // Chase usecmap into the predefined registry.
                        if let Some(parent) = cmap
                            .use_cmap
                            .as_deref()
                            .and_then(predefined::predefined_cmap)
                        {
                            cmap.set_parent(parent);
                        }
                        self.vertical = cmap.wmode == 1;
                        self.encoding_cmap = Some(Arc::new(cmap));
                    }
                }
            }
            _ => {}
        }
        if self.encoding_cmap.is_none() {
            self.encoding_cmap = predefined::predefined_cmap("Identity-H");
        }

        // Descendant CIDFont: system info, widths, embedded program.
        let descendant = as_resolved_array(dict.get("DescendantFonts"), resolver)
            .and_then(|arr| arr.first().map(|o| resolver.resolve(o)));
        let descendant = match descendant {
            Some(Object::Dictionary(d)) => d,
            _ => {
                log::warn!("Type0 font {} has no descendant font", self.name);
                return;
            }
        };

        if let Object::Dictionary(info) =
            resolver.resolve(descendant.get("CIDSystemInfo").unwrap_or(&Object::Null))
        {
            if let Some(ordering) = info.get("Ordering").and_then(|o| o.as_string()) {
                self.ordering = String::from_utf8_lossy(ordering).into_owned();
            }
        }
        if self.ordering.is_empty() {
            if let Some(cmap) = &self.encoding_cmap {
                self.ordering = cmap.ordering.clone();
            }
        }

        self.cid_default_width = descendant
            .get("DW")
            .and_then(|o| o.as_number())
            .unwrap_or(1000.0) as f32;

        if let Some(w) = as_resolved_array(descendant.get("W"), resolver) {
            self.cid_widths = parse_cid_widths(&w, resolver);
        }

        self.load_descriptor(descendant.get("FontDescriptor"), resolver);
    }

    /// Pull defaults and the embedded CFF program out of the descriptor.
    fn load_descriptor(&mut self, descriptor: Option<&Object>, resolver: &dyn Resolve) {
        let descriptor = match descriptor.map(|o| resolver.resolve(o)) {
            Some(Object::Dictionary(d)) => d,
            _ => return,
        };

        if let Some(missing) = descriptor.get("MissingWidth").and_then(|o| o.as_number()) {
            self.default_width = missing as f32;
        }

        // FontFile3 carries CFF (bare or inside OpenType); FontFile is
        // Type1 and FontFile2 TrueType, neither needed for widths when a
        // width table exists, and width extraction from them is out of
        // scope.
        if self.widths.is_empty() && self.cid_widths.is_empty() {
            if let Some(obj) = descriptor.get("FontFile3") {
                let resolved = resolver.resolve(obj);
                if let Some(bytes) = resolver.decoded_stream(&resolved) {
                    match cff::CffFont::parse(&bytes) {
                        Ok(cff) => self.cff = Some(cff),
                        Err(e) => log::debug!("embedded CFF unreadable on {}: {}", self.name, e),
                    }
                }
            }
        }
    }

    /// True when this is a composite (multi-byte) font.
    pub fn is_composite(&self) -> bool {
        self.kind == FontKind::Type0
    }

    /// Decode a raw string from a text-showing operator into glyphs.
    pub fn decode_text(&self, bytes: &[u8]) -> Vec<DecodedGlyph> {
        if self.is_composite() {
            self.decode_composite(bytes)
        } else {
            self.decode_simple(bytes)
        }
    }

    fn decode_simple(&self, bytes: &[u8]) -> Vec<DecodedGlyph> {
        bytes
            .iter()
            .map(|&byte| {
                let code = byte as u32;
                let text = self
                    .to_unicode
                    .as_ref()
                    .and_then(|cmap| cmap.to_unicode(code))
                    .or_else(|| self.encoding.decode_byte(byte).map(String::from))
                    .or_else(|| ascii_passthrough(byte))
                    .unwrap_or_default();
                DecodedGlyph {
                    text,
                    width: self.simple_width(code),
                    code,
                    is_space: byte == b' ',
                }
            })
            .collect()
    }

    fn decode_composite(&self, bytes: &[u8]) -> Vec<DecodedGlyph> {
        let cmap = match &self.encoding_cmap {
            Some(cmap) => cmap,
            None => return Vec::new(),
        };

        cmap.split_codes(bytes)
            .into_iter()
            .map(|code| {
                let cid = if code.passthrough {
                    code.value
                } else {
                    cmap.to_cid(code.value).unwrap_or(code.value)
                };
                let text = self
                    .to_unicode
                    .as_ref()
                    .and_then(|tu| tu.to_unicode(code.value))
                    .or_else(|| {
                        cid_mappings::cid_to_unicode(&self.ordering, cid).map(String::from)
                    })
                    .unwrap_or_default();
                DecodedGlyph {
                    text,
                    width: self.cid_width(cid),
                    code: code.value,
                    is_space: code.byte_len == 1 && code.value == 0x20,
                }
            })
            .collect()
    }

    fn simple_width(&self, code: u32) -> f32 {
        let index = code.wrapping_sub(self.first_char) as usize;
        let table_width = if code >= self.first_char {
            self.widths.get(index).copied().filter(|&w| w > 0.0)
        } else {
            None
        };
        let width = table_width
            .or_else(|| {
                self.cff
                    .as_ref()
                    .and_then(|cff| cff.glyph_width(code as u16))
            })
            .unwrap_or(self.default_width);
        if self.kind == FontKind::Type3 {
            width * self.type3_scale
        } else {
            width
        }
    }

    fn cid_width(&self, cid: u32) -> f32 {
        if let Some(&w) = self.cid_widths.get(&cid) {
            return w;
        }
        if let Some(cff) = &self.cff {
            if let Some(gid) = cff.gid_for_cid(cid) {
                if let Some(w) = cff.glyph_width(gid) {
                    return w;
                }
            }
        }
        self.cid_default_width
    }
}

/// Printable ASCII passes through when no mapping claims the byte.
fn ascii_passthrough(byte: u8) -> Option<String> {
    if (0x20..0x7F).contains(&byte) {
        Some((byte as char).to_string())
    } else {
        None
    }
}

fn as_resolved_array(obj: Option<&Object>, resolver: &dyn Resolve) -> Option<Vec<Object>> {
    match resolver.resolve(obj?) {
        Object::Array(arr) => Some(arr),
        _ => None,
    }
}

/// Parse the `/W` array of a CIDFont: runs of `c [w1 w2 ...]` and
/// `c_first c_last w`.
fn parse_cid_widths(array: &[Object], resolver: &dyn Resolve) -> HashMap<u32, f32> {
    let mut widths = HashMap::new();
    let mut i = 0usize;

    while i < array.len() {
        let first = match array[i].as_integer() {
            Some(v) if v >= 0 => v as u32,
            _ => break,
        };
        match array.get(i + 1).map(|o| resolver.resolve(o)) {
            Some(Object::Array(per_cid)) => {
                for (offset, w) in per_cid.iter().enumerate() {
                    if let Some(w) = w.as_number() {
                        widths.insert(first + offset as u32, w as f32);
                    }
                }
                i += 2;
            }
            Some(last_obj) => {
                let last = match last_obj.as_integer() {
                    Some(v) if v >= first as i64 => v as u32,
                    _ => break,
                };
                let w = match array.get(i + 2).and_then(|o| o.as_number()) {
                    Some(w) => w as f32,
                    None => break,
                };
                // Guard the span so a malformed pair cannot allocate the
                // whole address space.
                for cid in first..=last.min(first + 65_535) {
                    widths.insert(cid, w);
                }
                i += 3;
            }
            None => break,
        }
    }

    widths
}
