//! Error types for the extraction library.
//!
//! The taxonomy follows one rule: errors that indicate a corrupt *file*
//! (header, xref, crypto) reach the caller; errors inside a single object,
//! stream, or content stream are handled locally and never surface.

/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while opening or extracting a document.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid PDF header (expected '%PDF-')
    #[error("Invalid PDF header: expected '%PDF-', found '{0}'")]
    InvalidHeader(String),

    /// Cross-reference table corrupt beyond recovery
    #[error("Invalid cross-reference table: {0}")]
    InvalidXref(String),

    /// Invalid PDF structure (generic)
    #[error("Invalid PDF: {0}")]
    InvalidPdf(String),

    /// Parse error at specific byte offset
    #[error("Failed to parse object at byte {offset}: {reason}")]
    ParseError {
        /// Byte offset where the error occurred
        offset: usize,
        /// Reason for the parse failure
        reason: String,
    },

    /// Wrong password or unsupported encryption revision
    #[error("Encryption error: {0}")]
    Crypto(String),

    /// Stream decoding error
    #[error("Stream decoding error: {0}")]
    Decode(String),

    /// Unsupported stream filter
    #[error("Unsupported filter: {0}")]
    UnsupportedFilter(String),

    /// Font or CMap error
    #[error("Font error: {0}")]
    Font(String),

    /// Per-page extraction exceeded its deadline
    #[error("Page {0} extraction timed out")]
    PageTimeout(usize),

    /// Cooperative cancellation was observed
    #[error("Operation cancelled")]
    Cancelled,

    /// Unexpected end of file
    #[error("End of file reached unexpectedly")]
    UnexpectedEof,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Unsupported feature
    #[error("Unsupported feature: {0}")]
    Unsupported(String),
}

impl Error {
    /// True when the error terminates the whole operation rather than one page.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_header_error() {
        let err = Error::InvalidHeader("NotAPDF".to_string());
        let msg = format!("{}", err);
        assert!(msg.contains("Invalid PDF header"));
        assert!(msg.contains("NotAPDF"));
    }

    #[test]
    fn test_parse_error() {
        let err = Error::ParseError {
            offset: 1234,
            reason: "invalid token".to_string(),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("1234"));
        assert!(msg.contains("invalid token"));
    }

    #[test]
    fn test_page_timeout_mentions_page() {
        let msg = format!("{}", Error::PageTimeout(7));
        assert!(msg.contains('7'));
    }

    #[test]
    fn test_cancellation_classification() {
        assert!(Error::Cancelled.is_cancellation());
        assert!(!Error::PageTimeout(1).is_cancellation());
    }

    #[test]
    fn test_error_is_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Error>();
    }
}
