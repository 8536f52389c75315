//! End-to-end extraction scenarios over in-memory documents.

use pdf_sift::test_pdf::{hello_world_pdf, minimal_pdf, multi_page_pdf, PdfBuilder};
use pdf_sift::{DocumentExtractor, PageExtractor, PdfDocument, TextMode};
use std::sync::Arc;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn minimal_document_has_one_empty_page() {
    init_logging();
    let doc = PdfDocument::open(minimal_pdf()).unwrap();
    assert_eq!(doc.num_pages(), 1);
    let extractor = PageExtractor::new(&doc);
    assert_eq!(extractor.extract_text(0).unwrap(), "");
}

#[test]
fn hello_world_extracts_exactly() {
    init_logging();
    let doc = PdfDocument::open(hello_world_pdf("Hello World")).unwrap();
    let extractor = PageExtractor::new(&doc);
    assert_eq!(extractor.extract_text(0).unwrap(), "Hello World");
}

#[test]
fn multi_page_concatenates_with_newlines() {
    init_logging();
    let doc = Arc::new(PdfDocument::open(multi_page_pdf(&["first", "second"])).unwrap());
    let text = DocumentExtractor::new(doc).extract_text_batched().unwrap();
    assert_eq!(text, "first\nsecond");
}

#[test]
fn tj_array_renders_with_kerning() {
    init_logging();
    let content = "BT /F1 12 Tf 72 700 Td [(Kern) -20 (ed)] TJ ET";
    let mut builder = PdfBuilder::new();
    builder
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>",
        )
        .object(
            4,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
        )
        .stream(5, "", content.as_bytes());
    let doc = PdfDocument::open(builder.build(1)).unwrap();
    let text = PageExtractor::new(&doc).extract_text(0).unwrap();
    // Small kerning adjustments must not split the word.
    assert_eq!(text, "Kerned");
}

#[test]
fn two_lines_stack_top_to_bottom() {
    init_logging();
    let content = "BT /F1 12 Tf 72 700 Td (upper line) Tj 0 -16 Td (lower line) Tj ET";
    let mut builder = PdfBuilder::new();
    builder
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>",
        )
        .object(
            4,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
        )
        .stream(5, "", content.as_bytes());
    let doc = PdfDocument::open(builder.build(1)).unwrap();
    let text = PageExtractor::new(&doc).extract_text(0).unwrap();
    assert_eq!(text, "upper line\nlower line");
}

#[test]
fn multiple_content_streams_concatenate() {
    init_logging();
    let mut builder = PdfBuilder::new();
    builder
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 4 0 R >> >> /Contents [5 0 R 6 0 R] >>",
        )
        .object(
            4,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
        )
        .stream(5, "", b"BT /F1 12 Tf 72 700 Td (part one) Tj")
        .stream(6, "", b"ET");
    let doc = PdfDocument::open(builder.build(1)).unwrap();
    let text = PageExtractor::new(&doc).extract_text(0).unwrap();
    assert_eq!(text, "part one");
}

#[test]
fn circular_form_xobjects_terminate() {
    init_logging();
    // Page -> Form1 -> Form2 -> Form1 (cycle). Extraction must terminate
    // with the partial text and without blowing the stack.
    let mut builder = PdfBuilder::new();
    builder
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 4 0 R >> /XObject << /Fo1 6 0 R >> >> \
             /Contents 5 0 R >>",
        )
        .object(
            4,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
        )
        .stream(5, "", b"BT /F1 12 Tf 10 700 Td (outer) Tj ET /Fo1 Do")
        .stream(
            6,
            "/Type /XObject /Subtype /Form \
             /Resources << /Font << /F1 4 0 R >> /XObject << /Fo2 7 0 R >> >>",
            b"BT /F1 12 Tf 10 650 Td (form one) Tj ET /Fo2 Do",
        )
        .stream(
            7,
            "/Type /XObject /Subtype /Form \
             /Resources << /Font << /F1 4 0 R >> /XObject << /Fo1 6 0 R >> >>",
            b"BT /F1 12 Tf 10 600 Td (form two) Tj ET /Fo1 Do",
        );
    let doc = PdfDocument::open(builder.build(1)).unwrap();
    let text = PageExtractor::new(&doc).extract_text(0).unwrap();
    assert!(text.contains("outer"));
    assert!(text.contains("form one"));
    assert!(text.contains("form two"));
}

#[test]
fn hex_string_text_shows() {
    init_logging();
    let content = "BT /F1 12 Tf 72 700 Td <48656C6C6F> Tj ET";
    let mut builder = PdfBuilder::new();
    builder
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>",
        )
        .object(
            4,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
        )
        .stream(5, "", content.as_bytes());
    let doc = PdfDocument::open(builder.build(1)).unwrap();
    assert_eq!(PageExtractor::new(&doc).extract_text(0).unwrap(), "Hello");
}

#[test]
fn flate_compressed_content_decodes() {
    init_logging();
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    let content = b"BT /F1 12 Tf 72 700 Td (compressed) Tj ET";
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(content).unwrap();
    let compressed = encoder.finish().unwrap();

    let mut builder = PdfBuilder::new();
    builder
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>",
        )
        .object(
            4,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
        )
        .stream(5, "/Filter /FlateDecode", &compressed);
    let doc = PdfDocument::open(builder.build(1)).unwrap();
    assert_eq!(PageExtractor::new(&doc).extract_text(0).unwrap(), "compressed");
}

#[test]
fn corrupt_content_stream_yields_empty_page_not_error() {
    init_logging();
    let mut builder = PdfBuilder::new();
    builder
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 5 0 R >>",
        )
        .stream(5, "/Filter /FlateDecode", b"this is not deflate data");
    let doc = PdfDocument::open(builder.build(1)).unwrap();
    // Stream errors stay local: the page is empty, the call succeeds.
    assert_eq!(PageExtractor::new(&doc).extract_text(0).unwrap(), "");
}

#[test]
fn rows_and_columns_modes() {
    init_logging();
    let content = "BT /F1 10 Tf 0 100 Td (r1c1) Tj 200 0 Td (r1c2) Tj \
                   -200 -50 Td (r2c1) Tj 200 0 Td (r2c2) Tj ET";
    let mut builder = PdfBuilder::new();
    builder
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>",
        )
        .object(
            4,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
        )
        .stream(5, "", content.as_bytes());
    let doc = PdfDocument::open(builder.build(1)).unwrap();
    let extractor = PageExtractor::new(&doc);

    let by_rows = extractor.extract_text_mode(0, TextMode::Rows).unwrap();
    assert_eq!(by_rows, "r1c1 r1c2\nr2c1 r2c2");

    let by_columns = extractor.extract_text_mode(0, TextMode::Columns).unwrap();
    assert_eq!(by_columns, "r1c1 r2c1\nr1c2 r2c2");
}

#[test]
fn open_from_disk() {
    init_logging();
    use std::io::Write;
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(&hello_world_pdf("on disk")).unwrap();

    let source = pdf_sift::reader::SliceSource::from_path(file.path()).unwrap();
    let doc = PdfDocument::open(source.as_slice().to_vec()).unwrap();
    assert_eq!(PageExtractor::new(&doc).extract_text(0).unwrap(), "on disk");
}

#[test]
fn spans_carry_position_and_style() {
    init_logging();
    let doc = PdfDocument::open(hello_world_pdf("styled")).unwrap();
    let spans = PageExtractor::new(&doc).extract_spans(0).unwrap();
    assert_eq!(spans.len(), 1);
    let span = &spans[0];
    assert_eq!(span.text, "styled");
    assert_eq!((span.x, span.y), (100.0, 700.0));
    assert_eq!(span.font_name, "Helvetica");
    assert_eq!(span.font_size, 12.0);
    assert_eq!(span.page, 1);
    // Styled output serialises for ingestion pipelines.
    let json = serde_json::to_string(span).unwrap();
    assert!(json.contains("\"styled\""));
}
