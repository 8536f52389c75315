//! CMap parsing and code mapping.
//!
//! A CMap maps raw input byte sequences either to CIDs (the encoding CMap
//! of a Type0 font) or to Unicode (a `/ToUnicode` CMap). Both speak the
//! same PostScript-flavoured language, parsed here with the shared lexer:
//! `begincodespacerange`, `beginbfchar`, `beginbfrange`, `begincidchar`,
//! `begincidrange`, `usecmap`, and the `def`-bound header keys.
//!
//! Input is split into codes greedily, attempting code-space lengths in
//! the fixed priority 2, 1, 4, 3 bytes; bytes matching no code space pass
//! through unmapped. Small ranges are flattened into the single-code map
//! after parsing so the hot lookup path is one hash probe, and full
//! input-to-output decodes are memoised per CMap.

use crate::error::Result;
use crate::lexer::{token, Token};
use crate::object::Object;
use crate::parser::{decode_hex, parse_object};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// What the CMap maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CMapKind {
    /// Character codes to Unicode text
    ToUnicode,
    /// Character codes to CIDs
    Cid,
}

/// One allowed input byte-sequence range.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CodespaceRange {
    /// Code length in bytes (1-4)
    pub byte_len: u8,
    /// Lowest code value
    pub low: u32,
    /// Highest code value
    pub high: u32,
}

#[derive(Debug, Clone)]
enum RangeTarget {
    /// Destination CIDs starting here
    CidStart(u32),
    /// Destination code points starting at this UTF-16BE value
    UnicodeStart(u32),
    /// Explicit destination per code in the range
    UnicodeArray(Vec<String>),
}

#[derive(Debug, Clone)]
struct MappedRange {
    byte_len: u8,
    low: u32,
    high: u32,
    target: RangeTarget,
}

/// One code split out of an input byte string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Code {
    /// Code value, big-endian over its bytes
    pub value: u32,
    /// How many input bytes the code consumed
    pub byte_len: u8,
    /// True when no code space matched and the byte passed through
    pub passthrough: bool,
}

/// Ranges no larger than this are flattened into the single-code map.
const FLATTEN_LIMIT: u32 = 1024;

/// Decode-cache admission bounds.
const CACHE_MAX_INPUT: usize = 256;
const CACHE_MAX_OUTPUT: usize = 1024;

/// A parsed CMap.
#[derive(Debug)]
pub struct CMap {
    /// `/CMapName`, empty when the file does not declare one
    pub name: String,
    /// Mapping kind
    pub kind: CMapKind,
    /// CIDSystemInfo registry (e.g. `Adobe`)
    pub registry: String,
    /// CIDSystemInfo ordering (e.g. `Japan1`)
    pub ordering: String,
    /// CIDSystemInfo supplement
    pub supplement: i64,
    /// Writing mode: 0 horizontal, 1 vertical
    pub wmode: u8,
    /// Parent CMap name from `usecmap`, resolved by the font layer
    pub use_cmap: Option<String>,

    codespaces: Vec<CodespaceRange>,
    singles_text: HashMap<u32, String>,
    singles_cid: HashMap<u32, u32>,
    ranges: Vec<MappedRange>,
    parent: Option<Arc<CMap>>,
    decode_cache: Mutex<HashMap<Vec<u8>, String>>,
}

impl CMap {
    fn new(kind: CMapKind) -> Self {
        Self {
            name: String::new(),
            kind,
            registry: String::new(),
            ordering: String::new(),
            supplement: 0,
            wmode: 0,
            use_cmap: None,
            codespaces: Vec::new(),
            singles_text: HashMap::new(),
            singles_cid: HashMap::new(),
            ranges: Vec::new(),
            parent: None,
            decode_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Identity mapping over two-byte codes (`Identity-H` / `Identity-V`).
    pub fn identity(name: &str, wmode: u8) -> Self {
        let mut cmap = CMap::new(CMapKind::Cid);
        cmap.name = name.to_string();
        cmap.registry = "Adobe".to_string();
        cmap.ordering = "Identity".to_string();
        cmap.wmode = wmode;
        cmap.codespaces.push(CodespaceRange {
            byte_len: 2,
            low: 0,
            high: 0xFFFF,
        });
        cmap.ranges.push(MappedRange {
            byte_len: 2,
            low: 0,
            high: 0xFFFF,
            target: RangeTarget::CidStart(0),
        });
        cmap
    }

    /// Attach the resolved `usecmap` parent.
    pub fn set_parent(&mut self, parent: Arc<CMap>) {
        self.parent = Some(parent);
    }

    /// True when nothing was mapped (useful to detect junk streams).
    pub fn is_empty(&self) -> bool {
        self.singles_text.is_empty() && self.singles_cid.is_empty() && self.ranges.is_empty()
    }

    /// Number of single-code mappings plus ranges.
    pub fn len(&self) -> usize {
        self.singles_text.len() + self.singles_cid.len() + self.ranges.len()
    }

    /// Split an input byte string into codes, greedily matching the code
    /// spaces with length priority 2, 1, 4, 3. A byte matching nothing
    /// passes through as a one-byte code flagged `passthrough`.
    pub fn split_codes(&self, bytes: &[u8]) -> Vec<Code> {
        let mut codes = Vec::with_capacity(bytes.len() / 2 + 1);
        let mut pos = 0usize;

        while pos < bytes.len() {
            match self.match_code(&bytes[pos..]) {
                Some(code) => {
                    pos += code.byte_len as usize;
                    codes.push(code);
                }
                None => {
                    codes.push(Code {
                        value: bytes[pos] as u32,
                        byte_len: 1,
                        passthrough: true,
                    });
                    pos += 1;
                }
            }
        }
        codes
    }

    fn match_code(&self, bytes: &[u8]) -> Option<Code> {
        for &len in &[2u8, 1, 4, 3] {
            let len_usize = len as usize;
            if bytes.len() < len_usize {
                continue;
            }
            let value = be_value(&bytes[..len_usize]);
            let in_space = self
                .all_codespaces()
                .any(|cs| cs.byte_len == len && (cs.low..=cs.high).contains(&value));
            if in_space {
                return Some(Code {
                    value,
                    byte_len: len,
                    passthrough: false,
                });
            }
        }
        None
    }

    fn all_codespaces(&self) -> impl Iterator<Item = &CodespaceRange> {
        self.codespaces
            .iter()
            .chain(self.parent.iter().flat_map(|p| p.codespaces.iter()))
    }

    /// Map one code to Unicode text.
    pub fn to_unicode(&self, code: u32) -> Option<String> {
        if let Some(text) = self.singles_text.get(&code) {
            return Some(text.clone());
        }
        for range in &self.ranges {
            if (range.low..=range.high).contains(&code) {
                let delta = code - range.low;
                match &range.target {
                    RangeTarget::UnicodeStart(start) => {
                        return Some(utf16_value_to_string(start.wrapping_add(delta)));
                    }
                    RangeTarget::UnicodeArray(items) => {
                        return items.get(delta as usize).cloned();
                    }
                    RangeTarget::CidStart(_) => {}
                }
            }
        }
        self.parent.as_ref().and_then(|p| p.to_unicode(code))
    }

    /// Map one code to a CID.
    pub fn to_cid(&self, code: u32) -> Option<u32> {
        if let Some(&cid) = self.singles_cid.get(&code) {
            return Some(cid);
        }
        for range in &self.ranges {
            if (range.low..=range.high).contains(&code) {
                if let RangeTarget::CidStart(start) = range.target {
                    return Some(start + (code - range.low));
                }
            }
        }
        self.parent.as_ref().and_then(|p| p.to_cid(code))
    }

    /// Decode a whole input string through a ToUnicode mapping.
    ///
    /// Unmapped codes pass through: one-byte codes as their Latin-1 value,
    /// wider codes as a replacement character. Results are memoised for
    /// short inputs.
    pub fn decode_to_string(&self, bytes: &[u8]) -> String {
        let cacheable = bytes.len() <= CACHE_MAX_INPUT;
        if cacheable {
            if let Ok(cache) = self.decode_cache.lock() {
                if let Some(hit) = cache.get(bytes) {
                    return hit.clone();
                }
            }
        }

        let mut out = String::with_capacity(bytes.len());
        for code in self.split_codes(bytes) {
            match self.to_unicode(code.value) {
                Some(text) => out.push_str(&text),
                None => {
                    if code.byte_len == 1 {
                        if let Some(ch) = char::from_u32(code.value) {
                            out.push(ch);
                        }
                    } else {
                        out.push('\u{FFFD}');
                    }
                }
            }
        }

        if cacheable && out.len() <= CACHE_MAX_OUTPUT {
            if let Ok(mut cache) = self.decode_cache.lock() {
                cache.insert(bytes.to_vec(), out.clone());
            }
        }
        out
    }

    /// Flatten small ranges into the single-code maps for O(1) lookup.
    ///
    /// Only 1-2 byte codes qualify, and only ranges spanning at most
    /// [`FLATTEN_LIMIT`] codes; wide ideograph ranges stay interval-coded.
    pub fn optimize(&mut self) {
        let mut kept = Vec::with_capacity(self.ranges.len());
        for range in self.ranges.drain(..) {
            let span = range.high.saturating_sub(range.low) + 1;
            if range.byte_len > 2 || span > FLATTEN_LIMIT {
                kept.push(range);
                continue;
            }
            match &range.target {
                RangeTarget::CidStart(start) => {
                    for delta in 0..span {
                        self.singles_cid
                            .entry(range.low + delta)
                            .or_insert(start + delta);
                    }
                }
                RangeTarget::UnicodeStart(start) => {
                    for delta in 0..span {
                        self.singles_text
                            .entry(range.low + delta)
                            .or_insert_with(|| utf16_value_to_string(start.wrapping_add(delta)));
                    }
                }
                RangeTarget::UnicodeArray(items) => {
                    for (delta, text) in items.iter().enumerate() {
                        self.singles_text
                            .entry(range.low + delta as u32)
                            .or_insert_with(|| text.clone());
                    }
                }
            }
        }
        self.ranges = kept;
    }

    /// Parse a CMap stream.
    ///
    /// Lenient throughout: an unterminated section keeps its readable
    /// prefix, junk between sections is skipped. A stream yielding no
    /// mappings at all still parses (some fonts ship empty ToUnicode).
    pub fn parse(data: &[u8], kind: CMapKind) -> Result<CMap> {
        let mut cmap = CMap::new(kind);
        let mut input: &[u8] = data;
        // Operand stack of recently seen simple tokens, for `def`/`usecmap`.
        let mut stack: Vec<Object> = Vec::new();

        loop {
            let before = input;
            let (rest, tok) = match token(input) {
                Ok(r) => r,
                Err(_) => break,
            };
            input = rest;

            match tok {
                Token::Keyword("begincodespacerange") => {
                    input = parse_codespaces(input, &mut cmap);
                }
                Token::Keyword("beginbfchar") => {
                    input = parse_bfchars(input, &mut cmap);
                }
                Token::Keyword("beginbfrange") => {
                    input = parse_bfranges(input, &mut cmap);
                }
                Token::Keyword("begincidchar") => {
                    input = parse_cidchars(input, &mut cmap);
                }
                Token::Keyword("begincidrange") => {
                    input = parse_cidranges(input, &mut cmap);
                }
                Token::Keyword("beginnotdefrange") => {
                    input = parse_notdefranges(input, &mut cmap);
                }
                Token::Keyword("usecmap") => {
                    if let Some(Object::Name(name)) = stack.pop() {
                        cmap.use_cmap = Some(name);
                    }
                }
                Token::Keyword("def") => {
                    apply_def(&mut cmap, &mut stack);
                }
                Token::Keyword("endcmap") => break,
                Token::DictStart => {
                    // CIDSystemInfo and friends: re-parse as an object so
                    // nested dictionaries land on the stack whole.
                    if let Ok((rest, obj)) = parse_object(before) {
                        input = rest;
                        stack.push(obj);
                    }
                }
                Token::Name(name) => stack.push(Object::Name(name)),
                Token::Integer(i) => stack.push(Object::Integer(i)),
                Token::Real(r) => stack.push(Object::Real(r)),
                Token::HexString(span) => stack.push(Object::String(decode_hex(span))),
                Token::LiteralString(raw) => stack.push(Object::String(raw.to_vec())),
                _ => {
                    // Other keywords and delimiters are operators we do not
                    // model; the operand stack resets to stay bounded.
                    if stack.len() > 32 {
                        stack.clear();
                    }
                }
            }
        }

        cmap.optimize();
        Ok(cmap)
    }
}

fn be_value(bytes: &[u8]) -> u32 {
    bytes.iter().take(4).fold(0u32, |acc, &b| (acc << 8) | b as u32)
}

fn is_surrogate_value(value: u32) -> bool {
    let high = (value >> 16) as u16;
    let low = (value & 0xFFFF) as u16;
    (0xD800..=0xDBFF).contains(&high) && (0xDC00..=0xDFFF).contains(&low)
}

/// Turn a raw UTF-16BE numeric value into text, decoding surrogate pairs
/// packed into the high and low halves of a 32-bit value.
fn utf16_value_to_string(value: u32) -> String {
    if value > 0xFFFF {
        let high = (value >> 16) as u16;
        let low = (value & 0xFFFF) as u16;
        if (0xD800..=0xDBFF).contains(&high) && (0xDC00..=0xDFFF).contains(&low) {
            let cp = 0x10000 + (((high & 0x3FF) as u32) << 10) + (low & 0x3FF) as u32;
            return char::from_u32(cp).map(String::from).unwrap_or_default();
        }
    }
    char::from_u32(value).map(String::from).unwrap_or_default()
}

/// Decode a destination hex string (UTF-16BE, possibly several code
/// units — ligature expansions like `fi`).
fn hex_bytes_to_text(bytes: &[u8]) -> String {
    crate::fonts::encoding::decode_utf16_be(bytes)
}

fn apply_def(cmap: &mut CMap, stack: &mut Vec<Object>) {
    let value = stack.pop();
    let key = stack.pop();
    let (key, value) = match (key, value) {
        (Some(Object::Name(k)), Some(v)) => (k, v),
        _ => return,
    };
    match (key.as_str(), &value) {
        ("CMapName", Object::Name(name)) => cmap.name = name.clone(),
        ("WMode", Object::Integer(mode)) => cmap.wmode = (*mode == 1) as u8,
        ("CIDSystemInfo", Object::Dictionary(dict)) => {
            if let Some(reg) = dict.get("Registry").and_then(|o| o.as_string()) {
                cmap.registry = String::from_utf8_lossy(reg).into_owned();
            }
            if let Some(ord) = dict.get("Ordering").and_then(|o| o.as_string()) {
                cmap.ordering = String::from_utf8_lossy(ord).into_owned();
            }
            if let Some(sup) = dict.get("Supplement").and_then(|o| o.as_integer()) {
                cmap.supplement = sup;
            }
        }
        _ => {}
    }
}

/// Pull hex-string tokens until the end keyword, in `arity`-sized groups.
/// Returns the consumed groups and the remaining input.
fn collect_section<'a>(
    mut input: &'a [u8],
    end_keyword: &str,
    arity: usize,
) -> (Vec<Vec<Object>>, &'a [u8]) {
    let mut groups = Vec::new();
    let mut current: Vec<Object> = Vec::new();

    loop {
        let before = input;
        let (rest, tok) = match token(input) {
            Ok(r) => r,
            Err(_) => break,
        };
        input = rest;

        match tok {
            Token::Keyword(kw) if kw == end_keyword => break,
            Token::HexString(span) => current.push(Object::String(decode_hex(span))),
            Token::Integer(i) => current.push(Object::Integer(i)),
            Token::Name(name) => current.push(Object::Name(name)),
            Token::ArrayStart => {
                if let Ok((rest, obj)) = parse_object(before) {
                    input = rest;
                    current.push(obj);
                }
            }
            // Anything else inside a section is junk to skip.
            _ => continue,
        }
        if current.len() == arity {
            groups.push(std::mem::take(&mut current));
        }
    }

    (groups, input)
}

fn parse_codespaces<'a>(input: &'a [u8], cmap: &mut CMap) -> &'a [u8] {
    let (groups, rest) = collect_section(input, "endcodespacerange", 2);
    for group in groups {
        if let (Object::String(low), Object::String(high)) = (&group[0], &group[1]) {
            let byte_len = low.len().clamp(1, 4) as u8;
            cmap.codespaces.push(CodespaceRange {
                byte_len,
                low: be_value(low),
                high: be_value(high),
            });
        }
    }
    rest
}

fn parse_bfchars<'a>(input: &'a [u8], cmap: &mut CMap) -> &'a [u8] {
    let (groups, rest) = collect_section(input, "endbfchar", 2);
    for group in groups {
        let src = match &group[0] {
            Object::String(s) => be_value(s),
            _ => continue,
        };
        match &group[1] {
            Object::String(dst) => {
                cmap.singles_text.insert(src, hex_bytes_to_text(dst));
            }
            Object::Name(name) => {
                if let Some(ch) = crate::fonts::glyph_list::glyph_name_to_char(name) {
                    cmap.singles_text.insert(src, ch.to_string());
                }
            }
            _ => {}
        }
    }
    rest
}

fn parse_bfranges<'a>(input: &'a [u8], cmap: &mut CMap) -> &'a [u8] {
    let (groups, rest) = collect_section(input, "endbfrange", 3);
    for group in groups {
        let (low, high) = match (&group[0], &group[1]) {
            (Object::String(l), Object::String(h)) => (l, h),
            _ => continue,
        };
        let byte_len = low.len().clamp(1, 4) as u8;
        let (low, high) = (be_value(low), be_value(high));
        if high < low {
            continue;
        }
        let target = match &group[2] {
            Object::String(dst) => {
                let value = be_value(dst);
                if dst.len() <= 2 || (dst.len() == 4 && is_surrogate_value(value)) {
                    // Destination start value; offsets add across the range.
                    RangeTarget::UnicodeStart(value)
                } else {
                    // Multi-unit destination (ligatures): the offset applies
                    // to the final UTF-16 unit. Materialise the expansions.
                    let span = (high - low + 1).min(FLATTEN_LIMIT);
                    let items = (0..span)
                        .map(|delta| {
                            let mut bytes = dst.clone();
                            let n = bytes.len();
                            let last = u16::from_be_bytes([bytes[n - 2], bytes[n - 1]]);
                            let bumped = last.wrapping_add(delta as u16).to_be_bytes();
                            bytes[n - 2] = bumped[0];
                            bytes[n - 1] = bumped[1];
                            hex_bytes_to_text(&bytes)
                        })
                        .collect();
                    RangeTarget::UnicodeArray(items)
                }
            }
            Object::Array(items) => RangeTarget::UnicodeArray(
                items
                    .iter()
                    .map(|item| match item {
                        Object::String(s) => hex_bytes_to_text(s),
                        Object::Name(n) => crate::fonts::glyph_list::glyph_name_to_char(n)
                            .map(String::from)
                            .unwrap_or_default(),
                        _ => String::new(),
                    })
                    .collect(),
            ),
            _ => continue,
        };
        cmap.ranges.push(MappedRange {
            byte_len,
            low,
            high,
            target,
        });
    }
    rest
}

fn parse_cidchars<'a>(input: &'a [u8], cmap: &mut CMap) -> &'a [u8] {
    let (groups, rest) = collect_section(input, "endcidchar", 2);
    for group in groups {
        if let (Object::String(src), Object::Integer(cid)) = (&group[0], &group[1]) {
            if *cid >= 0 {
                cmap.singles_cid.insert(be_value(src), *cid as u32);
            }
        }
    }
    rest
}

fn parse_cidranges<'a>(input: &'a [u8], cmap: &mut CMap) -> &'a [u8] {
    let (groups, rest) = collect_section(input, "endcidrange", 3);
    for group in groups {
        if let (Object::String(low), Object::String(high), Object::Integer(cid)) =
            (&group[0], &group[1], &group[2])
        {
            if *cid < 0 {
                continue;
            }
            let byte_len = low.len().clamp(1, 4) as u8;
            let (low, high) = (be_value(low), be_value(high));
            if high < low {
                continue;
            }
            cmap.ranges.push(MappedRange {
                byte_len,
                low,
                high,
                target: RangeTarget::CidStart(*cid as u32),
            });
        }
    }
    rest
}

fn parse_notdefranges<'a>(input: &'a [u8], cmap: &mut CMap) -> &'a [u8] {
    let (groups, rest) = collect_section(input, "endnotdefrange", 3);
    for group in groups {
        if let (Object::String(low), Object::String(high), Object::String(dst)) =
            (&group[0], &group[1], &group[2])
        {
            let byte_len = low.len().clamp(1, 4) as u8;
            let (low, high) = (be_value(low), be_value(high));
            if high < low {
                continue;
            }
            // Every code in a notdef range maps to the single destination.
            let text = hex_bytes_to_text(dst);
            cmap.ranges.push(MappedRange {
                byte_len,
                low,
                high,
                target: RangeTarget::UnicodeArray(vec![
                    text;
                    (high - low + 1).min(FLATTEN_LIMIT) as usize
                ]),
            });
        }
    }
    rest
}
