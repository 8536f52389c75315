//! Content-stream interpreter.
//!
//! A stack machine over one page's content: operands accumulate from the
//! token stream until a keyword arrives, the keyword's handler consumes
//! them, unknown keywords discard them. Text-showing operators emit
//! positioned [`TextRun`]s; everything painterly (paths, colour, images)
//! is dispatched to no-ops.
//!
//! Failure semantics: malformed operands become defaults, an unreadable
//! nested stream skips its `Do`, and only cancellation or a page deadline
//! aborts interpretation.

use crate::cancel::{CancelChecker, CancelToken, HEX_CHECK_INTERVAL, TOKEN_CHECK_INTERVAL};
use crate::content::graphics_state::{GraphicsState, Matrix, TextState};
use crate::error::Result;
use crate::fonts::Font;
use crate::lexer::{token, Token};
use crate::object::{Dict, Object, Resolve};
use crate::parser::{
    decode_hex_limited, decode_literal_string_escapes, parse_object, MAX_HEX_STRING_BYTES,
};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Form XObjects deeper than this are skipped.
pub const MAX_FORM_DEPTH: usize = 50;

/// One positioned glyph cluster, in device (page) space.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TextRun {
    /// Decoded UTF-8 text
    pub text: String,
    /// Origin x in page space
    pub x: f32,
    /// Origin y in page space
    pub y: f32,
    /// Advance width in page space
    pub width: f32,
    /// Base font name
    pub font_name: String,
    /// Effective (device-space) font size
    pub font_size: f32,
    /// Orientation in quarter turns (0, 90, 180, 270 degrees)
    pub rotation: u16,
}

/// Supplies fonts for `Tf`, caching behind the scenes.
pub trait FontLoader {
    /// Load the font the given resource-dictionary entry points at.
    fn load(&self, font_obj: &Object) -> Option<Arc<Font>>;
}

/// Interprets content streams for one page.
pub struct Interpreter<'a> {
    resolver: &'a dyn Resolve,
    fonts: &'a dyn FontLoader,
    checker: CancelChecker,
    runs: Vec<TextRun>,
    /// Object ids of form XObjects on the current recursion path.
    forms_on_path: HashSet<u32>,
}

impl<'a> Interpreter<'a> {
    /// Create an interpreter with the given collaborators.
    pub fn new(resolver: &'a dyn Resolve, fonts: &'a dyn FontLoader, cancel: CancelToken) -> Self {
        Self {
            resolver,
            fonts,
            checker: CancelChecker::new(cancel, TOKEN_CHECK_INTERVAL),
            runs: Vec::new(),
            forms_on_path: HashSet::new(),
        }
    }

    /// Interpret one content stream and return the text runs it paints.
    pub fn interpret(mut self, content: &[u8], resources: &Dict) -> Result<Vec<TextRun>> {
        let state = GraphicsState::default();
        self.execute_stream(content, resources, state, 0)?;
        Ok(self.runs)
    }

    fn execute_stream(
        &mut self,
        content: &[u8],
        resources: &Dict,
        initial_state: GraphicsState,
        depth: usize,
    ) -> Result<()> {
        let mut state_stack: Vec<GraphicsState> = Vec::new();
        let mut gs = initial_state;
        let mut ts = TextState::default();
        let mut operands: Vec<Object> = Vec::new();
        let mut input = content;

        loop {
            let before = input;
            let (rest, tok) = match token(input) {
                Ok(r) => r,
                Err(_) => break,
            };
            input = rest;
            self.checker.tick()?;

            match tok {
                Token::Keyword(op) => {
                    input = self.execute_operator(
                        op,
                        &operands,
                        input,
                        resources,
                        &mut state_stack,
                        &mut gs,
                        &mut ts,
                        depth,
                    )?;
                    operands.clear();
                }
                Token::Integer(i) => operands.push(Object::Integer(i)),
                Token::Real(r) => operands.push(Object::Real(r)),
                Token::Name(name) => operands.push(Object::Name(name)),
                Token::True => operands.push(Object::Boolean(true)),
                Token::False => operands.push(Object::Boolean(false)),
                Token::Null => operands.push(Object::Null),
                Token::LiteralString(raw) => {
                    operands.push(Object::String(decode_literal_string_escapes(raw)));
                }
                Token::HexString(span) => {
                    // Hex strings check cancellation on their own, denser
                    // interval: a pathological string is one token.
                    let mut hex_checker =
                        CancelChecker::new(self.checker.token().clone(), HEX_CHECK_INTERVAL);
                    let bytes =
                        decode_hex_limited(span, MAX_HEX_STRING_BYTES, Some(&mut hex_checker))?;
                    operands.push(Object::String(bytes));
                }
                Token::ArrayStart | Token::DictStart => {
                    // Re-parse the whole container through the object
                    // grammar (arrays for TJ, dictionaries for BDC etc.).
                    match parse_object(before) {
                        Ok((rest, obj)) => {
                            input = rest;
                            operands.push(obj);
                        }
                        Err(_) => {}
                    }
                }
                Token::Junk(_) => {}
                // Stray structural keywords in a content stream carry no
                // meaning; drop any half-gathered operands.
                _ => operands.clear(),
            }

            // A malformed stream can pile up operands without ever naming
            // an operator; keep the stack bounded.
            if operands.len() > 64 {
                operands.drain(..operands.len() - 64);
            }
        }

        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn execute_operator<'c>(
        &mut self,
        op: &str,
        operands: &[Object],
        input: &'c [u8],
        resources: &Dict,
        state_stack: &mut Vec<GraphicsState>,
        gs: &mut GraphicsState,
        ts: &mut TextState,
        depth: usize,
    ) -> Result<&'c [u8]> {
        match op {
            // Text object brackets
            "BT" => ts.reset(),
            "ET" => ts.reset(),

            // Text positioning
            "Td" => ts.next_line(number(operands, 0), number(operands, 1)),
            "TD" => {
                let ty = number(operands, 1);
                gs.leading = -ty;
                ts.next_line(number(operands, 0), ty);
            }
            "Tm" => {
                let m = Matrix::from_parts(
                    number(operands, 0),
                    number(operands, 1),
                    number(operands, 2),
                    number(operands, 3),
                    number(operands, 4),
                    number(operands, 5),
                );
                ts.matrix = m;
                ts.line_matrix = m;
            }
            "T*" => ts.next_line(0.0, -gs.leading),

            // Text state
            "Tc" => gs.char_spacing = number(operands, 0),
            "Tw" => gs.word_spacing = number(operands, 0),
            "Tz" => gs.horizontal_scaling = number_or(operands, 0, 100.0) / 100.0,
            "TL" => gs.leading = number(operands, 0),
            "Ts" => gs.text_rise = number(operands, 0),
            "Tr" => gs.render_mode = number(operands, 0) as u8,
            "Tf" => {
                gs.font_size = number_or(operands, 1, 12.0);
                gs.font = self.resolve_font(operands.first(), resources);
            }

            // Text showing
            "Tj" => {
                if let Some(Object::String(bytes)) = operands.first() {
                    self.show_text(bytes, gs, ts);
                }
            }
            "'" => {
                ts.next_line(0.0, -gs.leading);
                if let Some(Object::String(bytes)) = operands.first() {
                    self.show_text(bytes, gs, ts);
                }
            }
            "\"" => {
                gs.word_spacing = number(operands, 0);
                gs.char_spacing = number(operands, 1);
                ts.next_line(0.0, -gs.leading);
                if let Some(Object::String(bytes)) = operands.get(2) {
                    self.show_text(bytes, gs, ts);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    for item in items {
                        match item {
                            Object::String(bytes) => self.show_text(bytes, gs, ts),
                            Object::Integer(_) | Object::Real(_) => {
                                let n = item.as_number().unwrap_or(0.0) as f32;
                                self.apply_tj_offset(n, gs, ts);
                            }
                            _ => {}
                        }
                    }
                }
            }

            // Graphics state
            "q" => state_stack.push(gs.clone()),
            "Q" => {
                if let Some(saved) = state_stack.pop() {
                    *gs = saved;
                }
            }
            "cm" => {
                let m = Matrix::from_parts(
                    number_or(operands, 0, 1.0),
                    number(operands, 1),
                    number(operands, 2),
                    number_or(operands, 3, 1.0),
                    number(operands, 4),
                    number(operands, 5),
                );
                gs.ctm = m.multiply(&gs.ctm);
            }
            "gs" => self.apply_ext_gstate(operands.first(), resources, gs),

            // XObjects
            "Do" => self.invoke_xobject(operands.first(), resources, gs, depth)?,

            // Inline images: skip the binary payload.
            "BI" => return Ok(skip_inline_image(input)),

            // Every path, colour, shading, and marked-content operator
            // lands here as a no-op.
            _ => {}
        }
        Ok(input)
    }

    fn resolve_font(&self, name: Option<&Object>, resources: &Dict) -> Option<Arc<Font>> {
        let name = name?.as_name()?;
        let fonts_dict = match self.resolver.resolve(resources.get("Font")?) {
            Object::Dictionary(d) => d,
            _ => return None,
        };
        let entry = fonts_dict.get(name)?;
        let font = self.fonts.load(entry);
        if font.is_none() {
            log::debug!("font /{} not resolvable from resources", name);
        }
        font
    }

    fn apply_ext_gstate(&self, name: Option<&Object>, resources: &Dict, gs: &mut GraphicsState) {
        let lookup = || -> Option<Dict> {
            let name = name?.as_name()?;
            let states = match self.resolver.resolve(resources.get("ExtGState")?) {
                Object::Dictionary(d) => d,
                _ => return None,
            };
            match self.resolver.resolve(states.get(name)?) {
                Object::Dictionary(d) => Some(d),
                _ => None,
            }
        };
        let Some(ext) = lookup() else { return };
        // The only ExtGState entry that affects text extraction is /Font.
        if let Some(Object::Array(pair)) = ext.get("Font").map(|o| self.resolver.resolve(o)) {
            if let Some(font) = pair.first().and_then(|entry| self.fonts.load(entry)) {
                gs.font = Some(font);
            }
            if let Some(size) = pair.get(1).and_then(|o| o.as_number()) {
                gs.font_size = size as f32;
            }
        }
    }

    fn invoke_xobject(
        &mut self,
        name: Option<&Object>,
        resources: &Dict,
        gs: &GraphicsState,
        depth: usize,
    ) -> Result<()> {
        if depth >= MAX_FORM_DEPTH {
            log::warn!("form XObject depth {} reached, skipping", depth);
            return Ok(());
        }

        let Some(name) = name.and_then(|o| o.as_name()) else {
            return Ok(());
        };
        let Some(xobjects) = resources.get("XObject") else {
            return Ok(());
        };
        let xobjects = match self.resolver.resolve(xobjects) {
            Object::Dictionary(d) => d,
            _ => return Ok(()),
        };
        let Some(entry) = xobjects.get(name) else {
            return Ok(());
        };

        // Cycle defence: a form already on the call path is skipped.
        let form_id = entry.as_reference().map(|r| r.id);
        if let Some(id) = form_id {
            if !self.forms_on_path.insert(id) {
                log::warn!("circular form XObject {} skipped", id);
                return Ok(());
            }
        }

        let result = self.invoke_resolved_form(entry, resources, gs, depth);

        if let Some(id) = form_id {
            self.forms_on_path.remove(&id);
        }
        result
    }

    fn invoke_resolved_form(
        &mut self,
        entry: &Object,
        outer_resources: &Dict,
        gs: &GraphicsState,
        depth: usize,
    ) -> Result<()> {
        let resolved = self.resolver.resolve(entry);
        let dict = match resolved.as_dict() {
            Some(d) => d.clone(),
            None => return Ok(()),
        };
        match dict.get("Subtype").and_then(|o| o.as_name()) {
            Some("Form") => {}
            // Images and anything else paint no text.
            _ => return Ok(()),
        }

        let Some(content) = self.resolver.decoded_stream(&resolved) else {
            log::debug!("form XObject stream unreadable, skipping");
            return Ok(());
        };

        let mut inner_state = gs.clone();
        if let Some(matrix) = dict.get("Matrix").and_then(|o| o.as_array()) {
            let get = |i: usize, d: f32| -> f32 {
                matrix.get(i).and_then(|o| o.as_number()).unwrap_or(d as f64) as f32
            };
            let m = Matrix::from_parts(get(0, 1.0), get(1, 0.0), get(2, 0.0), get(3, 1.0), get(4, 0.0), get(5, 0.0));
            inner_state.ctm = m.multiply(&inner_state.ctm);
        }

        let inner_resources = match dict.get("Resources").map(|o| self.resolver.resolve(o)) {
            Some(Object::Dictionary(d)) => d,
            _ => outer_resources.clone(),
        };

        self.execute_stream(&content, &inner_resources, inner_state, depth + 1)
    }

    /// Emit one text run for a shown string and advance the text matrix.
    fn show_text(&mut self, bytes: &[u8], gs: &GraphicsState, ts: &mut TextState) {
        let Some(font) = gs.font.as_ref() else {
            log::trace!("text shown with no font set, skipped");
            return;
        };
        if bytes.is_empty() {
            return;
        }

        let glyphs = font.decode_text(bytes);
        if glyphs.is_empty() {
            return;
        }

        // Total advance in unscaled text space.
        let mut advance = 0.0f32;
        let mut text = String::new();
        for glyph in &glyphs {
            let mut glyph_advance = glyph.width / 1000.0 * gs.font_size + gs.char_spacing;
            if glyph.is_space {
                glyph_advance += gs.word_spacing;
            }
            advance += glyph_advance;
            text.push_str(&glyph.text);
        }

        let trm = ts.matrix.multiply(&gs.ctm);
        let (x, y) = trm.apply(0.0, gs.text_rise);
        let (sx, sy) = trm.apply_vector(0.0, gs.font_size);
        let effective_size = (sx * sx + sy * sy).sqrt();

        if font.vertical {
            let (wx, wy) = trm.apply_vector(0.0, advance);
            let width = (wx * wx + wy * wy).sqrt();
            if !text.is_empty() {
                self.runs.push(TextRun {
                    text,
                    x,
                    y,
                    width,
                    font_name: font.name.clone(),
                    font_size: effective_size,
                    rotation: trm.quadrant_rotation(),
                });
            }
            ts.matrix = Matrix::translation(0.0, -advance).multiply(&ts.matrix);
        } else {
            let scaled = advance * gs.horizontal_scaling;
            let (wx, wy) = trm.apply_vector(scaled, 0.0);
            let width = (wx * wx + wy * wy).sqrt();
            if !text.is_empty() {
                self.runs.push(TextRun {
                    text,
                    x,
                    y,
                    width,
                    font_name: font.name.clone(),
                    font_size: effective_size,
                    rotation: trm.quadrant_rotation(),
                });
            }
            ts.matrix = Matrix::translation(scaled, 0.0).multiply(&ts.matrix);
        }
    }

    /// A `TJ` numeric element: thousandths of an em, negative values
    /// increase the advance.
    fn apply_tj_offset(&self, amount: f32, gs: &GraphicsState, ts: &mut TextState) {
        let delta = -amount / 1000.0 * gs.font_size;
        if gs.font.as_ref().is_some_and(|f| f.vertical) {
            ts.matrix = Matrix::translation(0.0, -delta).multiply(&ts.matrix);
        } else {
            ts.matrix =
                Matrix::translation(delta * gs.horizontal_scaling, 0.0).multiply(&ts.matrix);
        }
    }
}

fn number(operands: &[Object], index: usize) -> f32 {
    number_or(operands, index, 0.0)
}

fn number_or(operands: &[Object], index: usize, default: f32) -> f32 {
    operands
        .get(index)
        .and_then(|o| o.as_number())
        .unwrap_or(default as f64) as f32
}

/// Skip an inline image: scan past `ID` and the binary payload to the
/// `EI` marker bounded by whitespace.
fn skip_inline_image(input: &[u8]) -> &[u8] {
    // Find the ID keyword first (the parameter dict is textual).
    let mut pos = 0usize;
    let id_at = loop {
        if pos + 2 > input.len() {
            return &input[input.len()..];
        }
        if &input[pos..pos + 2] == b"ID"
            && (pos == 0 || !input[pos - 1].is_ascii_alphanumeric())
        {
            break pos + 2;
        }
        pos += 1;
    };

    // One whitespace byte separates ID from the data.
    let data_start = if id_at < input.len() && crate::object::is_pdf_whitespace(input[id_at]) {
        id_at + 1
    } else {
        id_at
    };

    let mut pos = data_start;
    while pos + 2 <= input.len() {
        if &input[pos..pos + 2] == b"EI"
            && pos > data_start
            && crate::object::is_pdf_whitespace(input[pos - 1])
        {
            let after = pos + 2;
            if after >= input.len()
                || crate::object::is_pdf_whitespace(input[after])
                || input[after] == b'/'
                || input[after] == b'['
                || input[after] == b'<'
            {
                return &input[after..];
            }
        }
        pos += 1;
    }
    &input[input.len()..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fonts::Font;

    struct NullResolver;
    impl Resolve for NullResolver {
        fn resolve(&self, obj: &Object) -> Object {
            match obj {
                Object::Reference(_) => Object::Null,
                other => other.clone(),
            }
        }
        fn decoded_stream(&self, obj: &Object) -> Option<Vec<u8>> {
            obj.stream_data().map(|d| d.to_vec())
        }
    }

    /// Loads every font as WinAnsi Helvetica.
    struct FixedLoader;
    impl FontLoader for FixedLoader {
        fn load(&self, _font_obj: &Object) -> Option<Arc<Font>> {
            let mut dict = Dict::new();
            dict.insert("Subtype".to_string(), Object::Name("Type1".to_string()));
            dict.insert("BaseFont".to_string(), Object::Name("Helvetica".to_string()));
            dict.insert(
                "Encoding".to_string(),
                Object::Name("WinAnsiEncoding".to_string()),
            );
            Some(Arc::new(Font::from_dict(&dict, &NullResolver)))
        }
    }

    fn resources_with_font() -> Dict {
        let mut fonts = Dict::new();
        fonts.insert("F1".to_string(), Object::Dictionary(Dict::new()));
        let mut resources = Dict::new();
        resources.insert("Font".to_string(), Object::Dictionary(fonts));
        resources
    }

    fn interpret(content: &[u8]) -> Vec<TextRun> {
        let interp = Interpreter::new(&NullResolver, &FixedLoader, CancelToken::new());
        interp.interpret(content, &resources_with_font()).unwrap()
    }

    #[test]
    fn test_hello_world() {
        let runs = interpret(b"BT /F1 12 Tf 100 700 Td (Hello World) Tj ET");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "Hello World");
        assert_eq!(runs[0].x, 100.0);
        assert_eq!(runs[0].y, 700.0);
        assert_eq!(runs[0].font_size, 12.0);
        assert_eq!(runs[0].rotation, 0);
        assert!(runs[0].width > 0.0);
    }

    #[test]
    fn test_td_advances_lines() {
        let runs = interpret(b"BT /F1 10 Tf 0 100 Td (one) Tj 0 -20 Td (two) Tj ET");
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[0].y, 100.0);
        assert_eq!(runs[1].y, 80.0);
        // Second Td is relative to the line start, not the shown text end.
        assert_eq!(runs[1].x, 0.0);
    }

    #[test]
    fn test_tj_array_offsets_advance() {
        let runs = interpret(b"BT /F1 10 Tf 0 0 Td [(AB) -2000 (CD)] TJ ET");
        assert_eq!(runs.len(), 2);
        // -2000/1000 * 10 = +20 extra advance between the two runs.
        let gap = runs[1].x - (runs[0].x + runs[0].width);
        assert!((gap - 20.0).abs() < 0.1, "gap was {}", gap);
    }

    #[test]
    fn test_quote_operator_advances_leading() {
        let runs = interpret(b"BT /F1 10 Tf 14 TL 0 100 Td (a) Tj (b) ' ET");
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].y, 86.0);
    }

    #[test]
    fn test_double_quote_sets_spacing() {
        let runs = interpret(b"BT /F1 10 Tf 12 TL 0 50 Td 5 1 (a b) \" ET");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].y, 38.0);
        // Word spacing 5 applies to the space: width grows accordingly.
        let runs_plain = interpret(b"BT /F1 10 Tf 12 TL 0 50 Td 0 1 (a b) \" ET");
        assert!(runs[0].width > runs_plain[0].width + 4.9);
    }

    #[test]
    fn test_cm_scales_text() {
        let runs = interpret(b"2 0 0 2 0 0 cm BT /F1 12 Tf 10 10 Td (x) Tj ET");
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].x, 20.0);
        assert_eq!(runs[0].y, 20.0);
        assert_eq!(runs[0].font_size, 24.0);
    }

    #[test]
    fn test_q_big_q_restore() {
        let runs = interpret(
            b"BT /F1 12 Tf ET q 3 0 0 3 0 0 cm Q BT /F1 12 Tf 5 5 Td (x) Tj ET",
        );
        // The cm inside q/Q must not leak.
        assert_eq!(runs[0].x, 5.0);
        assert_eq!(runs[0].font_size, 12.0);
    }

    #[test]
    fn test_tm_overrides_position() {
        let runs = interpret(b"BT /F1 12 Tf 1 0 0 1 250 600 Tm (x) Tj ET");
        assert_eq!(runs[0].x, 250.0);
        assert_eq!(runs[0].y, 600.0);
    }

    #[test]
    fn test_rotated_text_reports_quadrant() {
        let runs = interpret(b"BT /F1 12 Tf 0 1 -1 0 100 100 Tm (x) Tj ET");
        assert_eq!(runs[0].rotation, 90);
    }

    #[test]
    fn test_unknown_operators_ignored() {
        let runs = interpret(
            b"0.5 0.5 0.5 rg 1 w 10 10 m 50 50 l S BT /F1 9 Tf 1 1 Td (ok) Tj ET 99 nonsense",
        );
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "ok");
    }

    #[test]
    fn test_text_without_font_is_skipped() {
        let runs = interpret(b"BT (orphan) Tj ET");
        assert!(runs.is_empty());
    }

    #[test]
    fn test_inline_image_skipped() {
        let mut content = b"BT /F1 12 Tf 0 0 Td (pre) Tj ET BI /W 4 /H 4 /BPC 8 ID ".to_vec();
        content.extend_from_slice(&[0xFF, b'E', b'I', 0x00, 0x41]); // traps: fake EI inside data
        content.extend_from_slice(b" EI BT /F1 12 Tf 0 0 Td (post) Tj ET");
        let runs = interpret(&content);
        let texts: Vec<&str> = runs.iter().map(|r| r.text.as_str()).collect();
        assert_eq!(texts, vec!["pre", "post"]);
    }

    #[test]
    fn test_cancellation_stops_interpretation() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let interp = Interpreter::new(&NullResolver, &FixedLoader, cancel);
        // Enough tokens to trip the periodic check.
        let mut content = Vec::new();
        for _ in 0..2000 {
            content.extend_from_slice(b"1 0 0 1 0 0 cm ");
        }
        assert!(interp.interpret(&content, &Dict::new()).is_err());
    }

    #[test]
    fn test_hex_string_show() {
        let runs = interpret(b"BT /F1 12 Tf 0 0 Td <48656C6C6F> Tj ET");
        assert_eq!(runs[0].text, "Hello");
    }

    #[test]
    fn test_skip_inline_image_boundaries() {
        let rest = skip_inline_image(b"/W 2 ID \xde\xad EI 42");
        assert_eq!(rest, b" 42");
        // Missing EI consumes the remainder.
        assert!(skip_inline_image(b"/W 2 ID \xde\xad").is_empty());
    }
}
