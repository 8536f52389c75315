//! Per-page extraction wiring.
//!
//! A [`PageExtractor`] binds one document, one cancellation token, and a
//! shared font cache, and turns a page number into runs, blocks, or
//! reading-order text. Fonts resolve through the sharded cache so a batch
//! of pages using the same ten fonts parses each of them once.

use crate::cache::ShardedCache;
use crate::cancel::CancelToken;
use crate::content::{FontLoader, Interpreter, TextRun};
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::fonts::Font;
use crate::layout::{self, TextBlock};
use crate::object::{Object, Resolve};
use serde::Serialize;
use std::sync::Arc;

/// How a page's runs are ordered into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TextMode {
    /// Cluster into blocks, serialise blocks in reading order
    #[default]
    Blocks,
    /// Pure row bins, top to bottom
    Rows,
    /// Pure column bins, left to right
    Columns,
}

/// Styled output: one positioned span with its page number.
#[derive(Debug, Clone, Serialize)]
pub struct Span {
    /// Decoded text
    pub text: String,
    /// Origin x in page space
    pub x: f32,
    /// Origin y in page space
    pub y: f32,
    /// Advance width in page space
    pub width: f32,
    /// Base font name
    pub font_name: String,
    /// Effective font size
    pub font_size: f32,
    /// One-based page number
    pub page: usize,
}

/// Shared per-batch font cache.
pub type FontCache = ShardedCache<Font>;

/// Default capacity of a batch font cache.
pub const FONT_CACHE_CAPACITY: usize = 256;

/// Extracts text from individual pages of one document.
pub struct PageExtractor<'a> {
    doc: &'a PdfDocument,
    fonts: Arc<FontCache>,
    cancel: CancelToken,
}

impl<'a> PageExtractor<'a> {
    /// Extractor with a private font cache.
    pub fn new(doc: &'a PdfDocument) -> Self {
        Self::with_cache(doc, Arc::new(ShardedCache::new(FONT_CACHE_CAPACITY)))
    }

    /// Extractor sharing a batch-wide font cache.
    pub fn with_cache(doc: &'a PdfDocument, fonts: Arc<FontCache>) -> Self {
        Self {
            doc,
            fonts,
            cancel: CancelToken::new(),
        }
    }

    /// Replace the cancellation token (page-scoped deadlines).
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Raw positioned runs of a zero-based page.
    pub fn extract_runs(&self, page_index: usize) -> Result<Vec<TextRun>> {
        let page = self
            .doc
            .page(page_index)
            .ok_or_else(|| Error::InvalidPdf(format!("page {} out of range", page_index)))?;

        let content = self.doc.page_content(page);
        if content.is_empty() {
            return Ok(Vec::new());
        }

        let loader = CachingFontLoader {
            doc: self.doc,
            fonts: self.fonts.as_ref(),
        };
        let interpreter = Interpreter::new(self.doc, &loader, self.cancel.clone());
        interpreter.interpret(&content, &page.resources)
    }

    /// Reading-order text of a page under the given mode.
    pub fn extract_text_mode(&self, page_index: usize, mode: TextMode) -> Result<String> {
        let runs = self.extract_runs(page_index)?;
        Ok(match mode {
            TextMode::Blocks => layout::reconstruct_text(runs),
            TextMode::Rows => layout::text_by_rows(runs),
            TextMode::Columns => layout::text_by_columns(runs),
        })
    }

    /// Reading-order text of a page (block clustering).
    pub fn extract_text(&self, page_index: usize) -> Result<String> {
        self.extract_text_mode(page_index, TextMode::Blocks)
    }

    /// Ordered block structure of a page.
    pub fn extract_blocks(&self, page_index: usize) -> Result<Vec<TextBlock>> {
        Ok(layout::reconstruct_blocks(self.extract_runs(page_index)?))
    }

    /// Styled spans of a page, tagged with its one-based number.
    pub fn extract_spans(&self, page_index: usize) -> Result<Vec<Span>> {
        let runs = self.extract_runs(page_index)?;
        Ok(runs
            .into_iter()
            .map(|run| Span {
                text: run.text,
                x: run.x,
                y: run.y,
                width: run.width,
                font_name: run.font_name,
                font_size: run.font_size,
                page: page_index + 1,
            })
            .collect())
    }
}

/// Resolves `Tf` entries through the batch font cache.
struct CachingFontLoader<'a> {
    doc: &'a PdfDocument,
    fonts: &'a FontCache,
}

impl FontLoader for CachingFontLoader<'_> {
    fn load(&self, font_obj: &Object) -> Option<Arc<Font>> {
        match font_obj.as_reference() {
            Some(reference) => {
                let key = format!("{}:{}", reference.id, reference.gen);
                if let Some(hit) = self.fonts.get(&key) {
                    return Some(hit);
                }
                let resolved = self.doc.resolve(font_obj);
                let dict = resolved.as_dict()?;
                let font = Arc::new(Font::from_dict(dict, self.doc));
                self.fonts.insert(key, Arc::clone(&font));
                Some(font)
            }
            None => {
                // Inline font dictionary: rare, built uncached.
                let dict = font_obj.as_dict()?;
                Some(Arc::new(Font::from_dict(dict, self.doc)))
            }
        }
    }
}
