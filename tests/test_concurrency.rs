//! Concurrent extraction: ordering, cancellation, worker hygiene.

use pdf_sift::test_pdf::multi_page_pdf;
use pdf_sift::{CancelToken, DocumentExtractor, Error, ExtractOptions, PdfDocument};
use std::sync::Arc;
use std::time::Duration;

fn open_pages(n: usize) -> Arc<PdfDocument> {
    let texts: Vec<String> = (1..=n).map(|i| format!("page number {}", i)).collect();
    let refs: Vec<&str> = texts.iter().map(|s| s.as_str()).collect();
    Arc::new(PdfDocument::open(multi_page_pdf(&refs)).unwrap())
}

#[test]
fn batched_restores_page_order() {
    let doc = open_pages(12);
    let options = ExtractOptions {
        workers: 4,
        ..ExtractOptions::default()
    };
    let results = DocumentExtractor::with_options(doc, options)
        .extract_batched()
        .unwrap();
    assert_eq!(results.len(), 12);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.page, i + 1);
        assert_eq!(result.text, format!("page number {}", i + 1));
        assert!(result.error.is_none());
    }
}

#[test]
fn streaming_exposes_page_numbers() {
    let doc = open_pages(6);
    let results = DocumentExtractor::new(doc).extract_streaming().unwrap();
    assert_eq!(results.len(), 6);
    let mut pages: Vec<usize> = results.iter().map(|r| r.page).collect();
    pages.sort_unstable();
    assert_eq!(pages, vec![1, 2, 3, 4, 5, 6]);
    for result in &results {
        assert_eq!(result.text, format!("page number {}", result.page));
    }
}

#[test]
fn concurrent_and_sequential_agree() {
    let doc = open_pages(8);
    let extractor = DocumentExtractor::new(doc);
    let sequential = extractor.extract_text().unwrap();
    let concurrent = extractor.extract_text_batched().unwrap();
    assert_eq!(sequential, concurrent);
}

#[test]
fn single_worker_still_completes() {
    let doc = open_pages(4);
    let options = ExtractOptions {
        workers: 1,
        ..ExtractOptions::default()
    };
    let results = DocumentExtractor::with_options(doc, options)
        .extract_batched()
        .unwrap();
    assert_eq!(results.len(), 4);
}

#[test]
fn more_workers_than_pages_is_fine() {
    let doc = open_pages(2);
    let options = ExtractOptions {
        workers: 8,
        ..ExtractOptions::default()
    };
    let results = DocumentExtractor::with_options(doc, options)
        .extract_batched()
        .unwrap();
    assert_eq!(results.len(), 2);
}

#[test]
fn pre_cancelled_extraction_returns_cancelled() {
    let doc = open_pages(4);
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = DocumentExtractor::new(doc)
        .with_cancel(cancel)
        .extract_batched();
    assert!(matches!(result, Err(Error::Cancelled)));
}

#[test]
fn cancellation_beats_page_timeout_in_error() {
    // With both the flag raised and an expired per-page deadline, the
    // cancellation wins.
    let cancel = CancelToken::new();
    cancel.cancel();
    let child = cancel.child_with_timeout(Duration::from_secs(0), 3);
    assert!(matches!(child.check(), Err(Error::Cancelled)));
}

#[test]
fn shared_document_across_threads() {
    // The document itself is shared by reference across worker threads;
    // hammer the same page from several threads directly.
    let doc = open_pages(3);
    let mut handles = Vec::new();
    for _ in 0..4 {
        let doc = Arc::clone(&doc);
        handles.push(std::thread::spawn(move || {
            let extractor = pdf_sift::PageExtractor::new(&doc);
            for page in 0..3 {
                let text = extractor.extract_text(page).unwrap();
                assert_eq!(text, format!("page number {}", page + 1));
            }
        }));
    }
    for handle in handles {
        handle.join().unwrap();
    }
}

#[test]
fn page_results_serialise() {
    let doc = open_pages(1);
    let results = DocumentExtractor::new(doc).extract_batched().unwrap();
    let json = serde_json::to_string(&results).unwrap();
    assert!(json.contains("page number 1"));
}
