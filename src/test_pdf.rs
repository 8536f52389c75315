//! In-memory PDF builders for tests.
//!
//! Offsets in the cross-reference table are computed while assembling, so
//! fixtures stay valid as test content changes.

/// Assembles a classic-xref PDF from numbered objects.
pub struct PdfBuilder {
    version: &'static str,
    objects: Vec<(u32, Vec<u8>)>,
    trailer_extra: String,
}

impl PdfBuilder {
    /// Builder for a PDF 1.4 file.
    pub fn new() -> Self {
        Self {
            version: "1.4",
            objects: Vec::new(),
            trailer_extra: String::new(),
        }
    }

    /// Append extra entries to the trailer dictionary (`/Encrypt`, `/ID`).
    pub fn trailer_entries(&mut self, entries: &str) -> &mut Self {
        self.trailer_extra.push(' ');
        self.trailer_extra.push_str(entries);
        self
    }

    /// Add object `id` with the given body (everything between
    /// `N 0 obj` and `endobj`).
    pub fn object(&mut self, id: u32, body: &str) -> &mut Self {
        self.objects.push((id, body.as_bytes().to_vec()));
        self
    }

    /// Add a stream object with the given extra dictionary entries.
    pub fn stream(&mut self, id: u32, dict_extra: &str, payload: &[u8]) -> &mut Self {
        let mut body = format!("<< /Length {} {} >>\nstream\n", payload.len(), dict_extra)
            .into_bytes();
        body.extend_from_slice(payload);
        body.extend_from_slice(b"\nendstream");
        self.objects.push((id, body));
        self
    }

    /// Assemble header, objects, xref table, and trailer.
    pub fn build(&self, root_id: u32) -> Vec<u8> {
        let mut out = format!("%PDF-{}\n", self.version).into_bytes();

        let mut offsets: Vec<(u32, usize)> = Vec::new();
        for (id, body) in &self.objects {
            offsets.push((*id, out.len()));
            out.extend_from_slice(format!("{} 0 obj\n", id).as_bytes());
            out.extend_from_slice(body);
            out.extend_from_slice(b"\nendobj\n");
        }

        let max_id = self.objects.iter().map(|(id, _)| *id).max().unwrap_or(0);
        let xref_offset = out.len();
        out.extend_from_slice(format!("xref\n0 {}\n", max_id + 1).as_bytes());
        out.extend_from_slice(b"0000000000 65535 f \n");
        for id in 1..=max_id {
            match offsets.iter().find(|(oid, _)| *oid == id) {
                Some((_, offset)) => {
                    out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
                }
                None => out.extend_from_slice(b"0000000000 65535 f \n"),
            }
        }
        out.extend_from_slice(
            format!(
                "trailer\n<< /Size {} /Root {} 0 R{} >>\nstartxref\n{}\n%%EOF",
                max_id + 1,
                root_id,
                self.trailer_extra,
                xref_offset
            )
            .as_bytes(),
        );
        out
    }
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Header + catalog + pages + one empty page: the smallest valid file.
pub fn minimal_pdf() -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    builder
        .object(1, "<< /Type /Catalog /Pages 2 0 R >>")
        .object(2, "<< /Type /Pages /Kids [3 0 R] /Count 1 >>")
        .object(
            3,
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >>",
        );
    builder.build(1)
}

/// One page whose content stream paints `text` in WinAnsi Helvetica.
pub fn hello_world_pdf(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 12 Tf 100 700 Td ({}) Tj ET", text);
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
            "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica \
             /Encoding /WinAnsiEncoding >>",
        )
        .stream(5, "", content.as_bytes());
    builder.build(1)
}

/// A multi-page document, one line of text per page.
pub fn multi_page_pdf(page_texts: &[&str]) -> Vec<u8> {
    let mut builder = PdfBuilder::new();
    builder.object(1, "<< /Type /Catalog /Pages 2 0 R >>");

    let n = page_texts.len() as u32;
    let kids: Vec<String> = (0..n).map(|i| format!("{} 0 R", 3 + i * 2)).collect();
    builder.object(
        2,
        &format!(
            "<< /Type /Pages /Kids [{}] /Count {} \
             /Resources << /Font << /F1 {} 0 R >> >> >>",
            kids.join(" "),
            n,
            3 + n * 2
        ),
    );

    for (i, text) in page_texts.iter().enumerate() {
        let page_id = 3 + i as u32 * 2;
        let content_id = page_id + 1;
        builder.object(
            page_id,
            &format!(
                "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents {} 0 R >>",
                content_id
            ),
        );
        let content = format!("BT /F1 12 Tf 72 720 Td ({}) Tj ET", text);
        builder.stream(content_id, "", content.as_bytes());
    }
    builder.object(
        3 + n * 2,
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>",
    );
    builder.build(1)
}
