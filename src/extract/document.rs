//! Whole-document extraction: sequential, concurrent, and batched modes.
//!
//! The concurrent modes fan page numbers out over a bounded work channel
//! to a fixed pool of workers and collect `(page, text, error)` records
//! over a bounded result channel, restoring input order by page number
//! before concatenation. Cancellation is cooperative end to end: workers
//! check the token before starting a page and every in-flight page checks
//! it inside the lexer loop; nothing is killed mid-parse.

use crate::cancel::CancelToken;
use crate::document::PdfDocument;
use crate::error::{Error, Result};
use crate::extract::page::{FontCache, PageExtractor, TextMode, FONT_CACHE_CAPACITY};
use crossbeam_channel::bounded;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Default per-page extraction deadline.
pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default cumulative document parse guard.
pub const DEFAULT_MAX_PARSE_TIME: Duration = Duration::from_secs(45);

/// Extraction settings shared by all modes.
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    /// Worker count for the concurrent modes; 0 selects
    /// `min(available cores, 4)`
    pub workers: usize,
    /// Per-page deadline for the batched mode
    pub page_timeout: Duration,
    /// Overall parse guard applied at document open
    pub max_parse_time: Duration,
    /// Share one font cache across the batch
    pub use_font_cache: bool,
    /// Run ordering mode
    pub mode: TextMode,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            workers: 0,
            page_timeout: DEFAULT_PAGE_TIMEOUT,
            max_parse_time: DEFAULT_MAX_PARSE_TIME,
            use_font_cache: true,
            mode: TextMode::Blocks,
        }
    }
}

impl ExtractOptions {
    fn effective_workers(&self) -> usize {
        if self.workers > 0 {
            self.workers
        } else {
            num_cpus::get().min(4).max(1)
        }
    }
}

/// Outcome of one page's extraction.
#[derive(Debug, Serialize)]
pub struct PageResult {
    /// One-based page number
    pub page: usize,
    /// Extracted text (possibly partial on error)
    pub text: String,
    /// Per-page failure, when any; the document carries on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Extracts every page of one document.
pub struct DocumentExtractor {
    doc: Arc<PdfDocument>,
    options: ExtractOptions,
    cancel: CancelToken,
}

impl DocumentExtractor {
    /// Wrap an open document with default options.
    pub fn new(doc: Arc<PdfDocument>) -> Self {
        Self::with_options(doc, ExtractOptions::default())
    }

    /// Wrap an open document.
    pub fn with_options(doc: Arc<PdfDocument>, options: ExtractOptions) -> Self {
        Self {
            doc,
            options,
            cancel: CancelToken::new(),
        }
    }

    /// Thread an external cancellation token through the extraction.
    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    fn font_cache(&self) -> Arc<FontCache> {
        Arc::new(FontCache::new(FONT_CACHE_CAPACITY))
    }

    fn extractor_for<'d>(&self, doc: &'d PdfDocument, cache: &Arc<FontCache>) -> PageExtractor<'d> {
        if self.options.use_font_cache {
            PageExtractor::with_cache(doc, Arc::clone(cache))
        } else {
            PageExtractor::new(doc)
        }
    }

    /// Sequential mode: pages in order into one string, a newline
    /// between pages.
    pub fn extract_text(&self) -> Result<String> {
        let cache = self.font_cache();
        let mut out = String::new();
        for page in 0..self.doc.num_pages() {
            self.cancel.check()?;
            let extractor = self
                .extractor_for(&self.doc, &cache)
                .with_cancel(self.cancel.clone());
            match extractor.extract_text_mode(page, self.options.mode) {
                Ok(text) => {
                    if page > 0 {
                        out.push('\n');
                    }
                    out.push_str(&text);
                }
                Err(e) if e.is_cancellation() => return Err(e),
                Err(e) => {
                    log::warn!("page {} failed: {}", page + 1, e);
                    if page > 0 {
                        out.push('\n');
                    }
                }
            }
        }
        self.finish_batch(&cache);
        Ok(out)
    }

    /// Concurrent streaming mode: results arrive in completion order.
    ///
    /// The caller receives every page's result including failures; page
    /// numbers restore the document order.
    pub fn extract_streaming(&self) -> Result<Vec<PageResult>> {
        self.run_workers(None)
    }

    /// Batched mode with per-page timeouts: a timed-out page yields a
    /// [`PageResult`] carrying the timeout error, the rest of the
    /// document still extracts, and results come back sorted by page.
    pub fn extract_batched(&self) -> Result<Vec<PageResult>> {
        let mut results = self.run_workers(Some(self.options.page_timeout))?;
        results.sort_by_key(|r| r.page);
        Ok(results)
    }

    /// Batched mode concatenated into the combined document text.
    pub fn extract_text_batched(&self) -> Result<String> {
        let results = self.extract_batched()?;
        let mut out = String::new();
        for result in results {
            if result.page > 1 {
                out.push('\n');
            }
            out.push_str(&result.text);
        }
        Ok(out)
    }

    fn run_workers(&self, page_timeout: Option<Duration>) -> Result<Vec<PageResult>> {
        let pages = self.doc.num_pages();
        if pages == 0 {
            return Ok(Vec::new());
        }

        // Bound the object cache for the batch so large documents cannot
        // accumulate every object they ever touch.
        self.doc.set_cache_capacity(1000.min(pages * 5).max(1));

        let workers = self.options.effective_workers().min(pages);
        let cache = self.font_cache();
        let (work_tx, work_rx) = bounded::<usize>(workers * 2);
        let (result_tx, result_rx) = bounded::<PageResult>((workers * 2).min(64));

        let mut results = Vec::with_capacity(pages);
        let mut cancelled = false;

        std::thread::scope(|scope| {
            for _ in 0..workers {
                let work_rx = work_rx.clone();
                let result_tx = result_tx.clone();
                let cache = Arc::clone(&cache);
                let cancel = self.cancel.clone();
                let doc = Arc::clone(&self.doc);
                let mode = self.options.mode;
                let use_font_cache = self.options.use_font_cache;

                scope.spawn(move || {
                    for page in work_rx.iter() {
                        // Checked before dispatching each page; in-flight
                        // pages notice through their own checker.
                        if cancel.is_cancelled() {
                            let _ = result_tx.send(PageResult {
                                page: page + 1,
                                text: String::new(),
                                error: Some(Error::Cancelled.to_string()),
                            });
                            continue;
                        }
                        let page_cancel = match page_timeout {
                            Some(timeout) => cancel.child_with_timeout(timeout, page + 1),
                            None => cancel.clone(),
                        };
                        let extractor = if use_font_cache {
                            PageExtractor::with_cache(&doc, Arc::clone(&cache))
                        } else {
                            PageExtractor::new(&doc)
                        }
                        .with_cancel(page_cancel);

                        let result = match extractor.extract_text_mode(page, mode) {
                            Ok(text) => PageResult {
                                page: page + 1,
                                text,
                                error: None,
                            },
                            Err(e) => PageResult {
                                page: page + 1,
                                text: String::new(),
                                error: Some(e.to_string()),
                            },
                        };
                        if result_tx.send(result).is_err() {
                            break;
                        }
                    }
                });
            }
            drop(result_tx);

            // Dispatch page numbers; cancellation stops unstarted pages.
            let dispatcher_cancel = self.cancel.clone();
            scope.spawn(move || {
                for page in 0..pages {
                    if dispatcher_cancel.is_cancelled() {
                        break;
                    }
                    if work_tx.send(page).is_err() {
                        break;
                    }
                }
                // Dropping the sender terminates the worker loops.
            });

            for result in result_rx.iter() {
                if result
                    .error
                    .as_deref()
                    .is_some_and(|e| e == Error::Cancelled.to_string())
                {
                    cancelled = true;
                }
                results.push(result);
            }
        });

        self.finish_batch(&cache);

        if cancelled || self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(results)
    }

    /// Batch teardown: release the font cache and the accumulated
    /// object cache.
    fn finish_batch(&self, cache: &Arc<FontCache>) {
        cache.clear();
        self.doc.clear_object_cache();
    }
}

/// One-call convenience: open and extract a whole document.
pub fn extract_document_text(bytes: impl Into<bytes::Bytes>, password: &[u8]) -> Result<String> {
    let options = ExtractOptions::default();
    let cancel = CancelToken::with_timeout(options.max_parse_time);
    let doc = Arc::new(PdfDocument::open_with_cancel(bytes, password, &cancel)?);
    DocumentExtractor::with_options(doc, options)
        .with_cancel(cancel)
        .extract_text_batched()
}
