//! Extraction orchestration: per-page wiring and document-level modes.

pub mod document;
pub mod page;

pub use document::{
    extract_document_text, DocumentExtractor, ExtractOptions, PageResult, DEFAULT_MAX_PARSE_TIME,
    DEFAULT_PAGE_TIMEOUT,
};
pub use page::{FontCache, PageExtractor, Span, TextMode, FONT_CACHE_CAPACITY};
