//! Object store behaviour: xref streams, object streams, caching.

use pdf_sift::object::{Object, ObjectRef, Resolve};
use pdf_sift::{PageExtractor, PdfDocument};

/// Hand-assemble a PDF 1.5 file whose document structure lives inside an
/// object stream, indexed by a cross-reference stream.
fn build_objstm_pdf(text: &str) -> Vec<u8> {
    let mut out = b"%PDF-1.5\n".to_vec();

    // Object 5: the content stream, stored plainly.
    let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", text);
    let offset_5 = out.len();
    out.extend_from_slice(
        format!(
            "5 0 obj\n<< /Length {} >>\nstream\n{}\nendstream\nendobj\n",
            content.len(),
            content
        )
        .as_bytes(),
    );

    // Object 6: an ObjStm holding objects 1-4.
    let bodies = [
        (1u32, "<< /Type /Catalog /Pages 2 0 R >>".to_string()),
        (2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string()),
        (
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] \
             /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
                .to_string(),
        ),
        (
            4,
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica \
             /Encoding /WinAnsiEncoding >>"
                .to_string(),
        ),
    ];
    let mut header = String::new();
    let mut payload = String::new();
    for (id, body) in &bodies {
        header.push_str(&format!("{} {} ", id, payload.len()));
        payload.push_str(body);
        payload.push(' ');
    }
    let stm_body = format!("{}{}", header, payload);
    let first = header.len();
    let offset_6 = out.len();
    out.extend_from_slice(
        format!(
            "6 0 obj\n<< /Type /ObjStm /N 4 /First {} /Length {} >>\nstream\n{}\nendstream\nendobj\n",
            first,
            stm_body.len(),
            stm_body
        )
        .as_bytes(),
    );

    // Object 7: the cross-reference stream. W [1 2 2], Size 8.
    let offset_7 = out.len();
    let mut records: Vec<u8> = Vec::new();
    let mut push = |t: u8, f2: u16, f3: u16| {
        records.push(t);
        records.extend_from_slice(&f2.to_be_bytes());
        records.extend_from_slice(&f3.to_be_bytes());
    };
    push(0, 0, 0xFFFF); // 0: free
    push(2, 6, 0); // 1: in stream 6, index 0
    push(2, 6, 1); // 2
    push(2, 6, 2); // 3
    push(2, 6, 3); // 4
    push(1, offset_5 as u16, 0); // 5
    push(1, offset_6 as u16, 0); // 6
    push(1, offset_7 as u16, 0); // 7

    out.extend_from_slice(
        format!(
            "7 0 obj\n<< /Type /XRef /Size 8 /W [1 2 2] /Root 1 0 R /Length {} >>\nstream\n",
            records.len()
        )
        .as_bytes(),
    );
    out.extend_from_slice(&records);
    out.extend_from_slice(b"\nendstream\nendobj\n");

    out.extend_from_slice(format!("startxref\n{}\n%%EOF", offset_7).as_bytes());
    out
}

#[test]
fn xref_stream_and_objstm_document_extracts() {
    let pdf = build_objstm_pdf("from the object stream");
    let doc = PdfDocument::open(pdf).unwrap();
    assert_eq!(doc.num_pages(), 1);
    let text = PageExtractor::new(&doc).extract_text(0).unwrap();
    assert_eq!(text, "from the object stream");
}

#[test]
fn objstm_materialisation_caches_siblings() {
    let pdf = build_objstm_pdf("x");
    let doc = PdfDocument::open(pdf).unwrap();
    // Resolving one compressed object brings its siblings along.
    let catalog = doc.resolve_ref(ObjectRef::new(1, 0));
    assert_eq!(
        catalog.as_dict().unwrap().get("Type").unwrap().as_name(),
        Some("Catalog")
    );
    let font = doc.resolve_ref(ObjectRef::new(4, 0));
    assert_eq!(
        font.as_dict().unwrap().get("BaseFont").unwrap().as_name(),
        Some("Helvetica")
    );
}

#[test]
fn free_and_absent_objects_resolve_to_null() {
    let pdf = build_objstm_pdf("x");
    let doc = PdfDocument::open(pdf).unwrap();
    assert!(doc.resolve_ref(ObjectRef::new(0, 65535)).is_null());
    assert!(doc.resolve_ref(ObjectRef::new(99, 0)).is_null());
}

#[test]
fn reference_chain_resolution_is_bounded() {
    // 1 -> catalog; 8 -> 9 -> 8 cycle must resolve to null, not hang.
    let mut builder = pdf_sift::test_pdf::PdfBuilder::new();
    builder
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>")
        .object(8, "9 0 R")
        .object(9, "8 0 R");
    let doc = PdfDocument::open(builder.build(1)).unwrap();
    let resolved = doc.resolve(&Object::Reference(ObjectRef::new(8, 0)));
    assert!(resolved.is_null());
}

#[test]
fn metadata_text_strings_decode() {
    let mut builder = pdf_sift::test_pdf::PdfBuilder::new();
    builder
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(3, "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>")
        .object(
            10,
            "<< /Title (Ingestion Report) /Author <FEFF004A006F> >>",
        )
        .trailer_entries("/Info 10 0 R");
    let doc = PdfDocument::open(builder.build(1)).unwrap();
    let metadata = doc.metadata();
    assert!(metadata.contains(&("Title".to_string(), "Ingestion Report".to_string())));
    assert!(metadata.contains(&("Author".to_string(), "Jo".to_string())));
}

#[test]
fn mixed_line_endings_tolerated() {
    // Rebuild the minimal file with CR and CRLF endings around the xref.
    let pdf = pdf_sift::test_pdf::minimal_pdf();
    let crlf: Vec<u8> = String::from_utf8(pdf)
        .unwrap()
        .replace("xref\n", "xref\r\n")
        .replace("trailer\n", "trailer\r")
        .into_bytes();
    let doc = PdfDocument::open(crlf).unwrap();
    assert_eq!(doc.num_pages(), 1);
}
