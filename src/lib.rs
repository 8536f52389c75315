#![allow(clippy::type_complexity)]
#![allow(clippy::too_many_arguments)]
#![warn(missing_docs)]

//! # pdf_sift
//!
//! Structured plain-text extraction from PDF 1.x documents, built for
//! ingestion pipelines that chew through large, heterogeneous, and
//! frequently malformed corpora.
//!
//! The pipeline: a random-access object layer (cross-reference tables and
//! streams, compressed object streams, RC4/AES decryption) feeds a chained
//! filter pipeline (Flate, LZW, ASCII85/Hex, RunLength, CCITT, JBIG2
//! skeleton), whose content streams run through a stack-machine
//! interpreter emitting positioned glyph runs; runs are decoded to
//! Unicode through ToUnicode CMaps, predefined CJK collections, standard
//! encodings and embedded CFF programs, then clustered into blocks and
//! serialised in reading order. Document-level extraction fans pages out
//! over a bounded worker pool with per-page timeouts and cooperative
//! cancellation.
//!
//! ## Quick start
//!
//! ```no_run
//! use pdf_sift::{DocumentExtractor, PdfDocument};
//! use std::sync::Arc;
//!
//! # fn main() -> pdf_sift::Result<()> {
//! let bytes = std::fs::read("report.pdf")?;
//! let doc = Arc::new(PdfDocument::open(bytes)?);
//! let text = DocumentExtractor::new(doc).extract_text_batched()?;
//! println!("{}", text);
//! # Ok(())
//! # }
//! ```
//!
//! Tolerance policy, end to end: errors that mean the *file* is corrupt
//! (header, xref, crypto) surface at open; errors inside a single object,
//! stream, or page are absorbed locally, so one bad page never poisons
//! the document.

// Error handling
pub mod error;

// Cancellation and deadlines
pub mod cancel;

// Byte sources
pub mod reader;

// Core object layer
pub mod document;
pub mod lexer;
pub mod object;
pub mod objstm;
pub mod parser;
pub mod xref;

// Caches and pools
pub mod cache;

// Stream decoders
pub mod decoders;

// Encryption support
pub mod encryption;

// Text decoding
pub mod fonts;

// Content interpretation
pub mod content;

// Layout analysis
pub mod layout;

// Document structure
pub mod outline;

// Extraction orchestration
pub mod extract;

// Test fixtures (in-memory PDF builders)
#[doc(hidden)]
pub mod test_pdf;

// Re-exports
pub use cancel::CancelToken;
pub use content::TextRun;
pub use document::{Page, PdfDocument};
pub use error::{Error, Result};
pub use extract::{
    extract_document_text, DocumentExtractor, ExtractOptions, PageExtractor, PageResult, Span,
    TextMode,
};
pub use layout::TextBlock;
pub use outline::{extract_outline, OutlineItem};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
