//! Document object store.
//!
//! [`PdfDocument`] owns the byte source, the merged cross-reference
//! table, the encryption state, and the bounded object cache. It is the
//! only component that touches file offsets: everything above it asks for
//! objects by reference and gets typed [`Object`]s back.
//!
//! Resolution rules: a pointer to a free or missing object is null, never
//! an error; pointer chains stop after [`MAX_REF_HOPS`] hops; compressed
//! objects materialise their containing object stream on demand; when the
//! document is encrypted, strings and stream payloads are decrypted at
//! materialisation time so cached objects are always plaintext (still
//! filtered — the filter pipeline runs per read).

use crate::cache::LruCache;
use crate::cancel::CancelToken;
use crate::encryption::EncryptionHandler;
use crate::error::{Error, Result};
use crate::object::{filter_chain, Dict, Object, ObjectRef, Resolve};
use crate::reader::SliceSource;
use crate::xref::{self, XrefEntry, XrefTable};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// Maximum pointer hops before resolution gives up on a cycle.
pub const MAX_REF_HOPS: usize = 10;

/// Maximum pages-tree depth.
const MAX_PAGE_TREE_DEPTH: usize = 64;

/// One page, resources and geometry already inherited.
#[derive(Debug, Clone)]
pub struct Page {
    /// The page dictionary itself
    pub dict: Dict,
    /// Inherited and local resources
    pub resources: Dict,
    /// Inherited `/MediaBox` (default US Letter)
    pub media_box: [f32; 4],
    /// Inherited `/Rotate`, normalised to 0/90/180/270
    pub rotate: i32,
}

/// An open document: byte source, xref, caches, encryption.
pub struct PdfDocument {
    src: SliceSource,
    xref: XrefTable,
    cache: Mutex<LruCache<ObjectRef, Arc<Object>>>,
    encryption: Option<EncryptionHandler>,
    pages: Vec<Page>,
    version: (u8, u8),
}

impl PdfDocument {
    /// Open a document from raw bytes with the default empty password.
    pub fn open(bytes: impl Into<bytes::Bytes>) -> Result<PdfDocument> {
        Self::open_with_password(bytes, b"")
    }

    /// Open a document, authenticating with `password` when encrypted.
    pub fn open_with_password(
        bytes: impl Into<bytes::Bytes>,
        password: &[u8],
    ) -> Result<PdfDocument> {
        Self::open_inner(SliceSource::new(bytes.into()), password, &CancelToken::new())
    }

    /// Open with cooperative cancellation threaded through the load.
    pub fn open_with_cancel(
        bytes: impl Into<bytes::Bytes>,
        password: &[u8],
        cancel: &CancelToken,
    ) -> Result<PdfDocument> {
        Self::open_inner(SliceSource::new(bytes.into()), password, cancel)
    }

    fn open_inner(src: SliceSource, password: &[u8], cancel: &CancelToken) -> Result<PdfDocument> {
        let version = parse_header(&src)?;
        cancel.check()?;

        let xref = match xref::locate_startxref(&src).and_then(|offset| xref::load_xref(&src, offset))
        {
            Ok(table) => table,
            Err(e) => {
                log::warn!("declared xref unusable ({}), scanning for objects", e);
                let table = xref::recover_by_scan(&src);
                if table.is_empty() {
                    return Err(e);
                }
                table
            }
        };
        cancel.check()?;

        let mut doc = PdfDocument {
            src,
            xref,
            cache: Mutex::new(LruCache::new()),
            encryption: None,
            pages: Vec::new(),
            version,
        };

        doc.setup_encryption(password)?;
        cancel.check()?;
        doc.pages = doc.collect_pages(cancel)?;
        Ok(doc)
    }

    /// PDF version from the header, e.g. `(1, 7)`.
    pub fn version(&self) -> (u8, u8) {
        self.version
    }

    /// Number of pages.
    pub fn num_pages(&self) -> usize {
        self.pages.len()
    }

    /// Page by zero-based index.
    pub fn page(&self, index: usize) -> Option<&Page> {
        self.pages.get(index)
    }

    /// The trailer dictionary.
    pub fn trailer(&self) -> &Dict {
        self.xref.trailer()
    }

    /// Encryption state, when the document is encrypted.
    pub fn encryption(&self) -> Option<&EncryptionHandler> {
        self.encryption.as_ref()
    }

    /// Cap the object cache; batch extraction uses `min(1000, pages x 5)`.
    pub fn set_cache_capacity(&self, capacity: usize) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.set_capacity(capacity);
        }
    }

    /// Drop every cached object, releasing their memory.
    pub fn clear_object_cache(&self) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.clear();
        }
    }

    /// Document information dictionary (`/Info`), values decoded from
    /// PDFDocEncoding / UTF-16BE text strings.
    pub fn metadata(&self) -> Vec<(String, String)> {
        let info = match self.trailer().get("Info") {
            Some(obj) => self.resolve(obj),
            None => return Vec::new(),
        };
        let dict = match info.as_dict() {
            Some(d) => d,
            None => return Vec::new(),
        };
        let mut entries: Vec<(String, String)> = dict
            .iter()
            .filter_map(|(key, value)| {
                let value = self.resolve(value);
                let bytes = value.as_string()?;
                Some((key.clone(), crate::fonts::encoding::decode_text_string(bytes)))
            })
            .collect();
        entries.sort();
        entries
    }

    /// Resolve an object reference to its cached object.
    pub fn resolve_ref(&self, reference: ObjectRef) -> Arc<Object> {
        if let Ok(mut cache) = self.cache.lock() {
            if let Some(hit) = cache.get(&reference) {
                return Arc::clone(hit);
            }
        }

        let loaded = Arc::new(self.load_object(reference));
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(reference, Arc::clone(&loaded));
        }
        loaded
    }

    fn load_object(&self, reference: ObjectRef) -> Object {
        match self.xref.get(reference.id) {
            Some(&XrefEntry::InUse { offset, gen }) => {
                // Highest-generation in-use entry wins; a stale pointer to
                // an older generation still yields the live object.
                if gen != reference.gen {
                    log::debug!(
                        "reference {} resolved against generation {}",
                        reference,
                        gen
                    );
                }
                self.load_at_offset(offset, reference.id, gen)
            }
            Some(&XrefEntry::Compressed { stream_id, index }) => {
                self.load_compressed(stream_id, index)
            }
            Some(&XrefEntry::Free { .. }) | None => Object::Null,
        }
    }

    fn load_at_offset(&self, offset: u64, id: u32, gen: u16) -> Object {
        let input = self.src.from_offset(offset);
        match crate::parser::parse_indirect_object(input, offset as usize) {
            Ok((parsed_ref, mut object)) => {
                if parsed_ref.id != id {
                    log::warn!(
                        "xref points object {} at offset {} but found {}",
                        id,
                        offset,
                        parsed_ref
                    );
                    return Object::Null;
                }
                if let Some(enc) = &self.encryption {
                    decrypt_in_place(&mut object, enc, id, gen);
                }
                object
            }
            Err(e) => {
                log::warn!("object {} {} unreadable: {}", id, gen, e);
                Object::Null
            }
        }
    }

    /// Materialise an object stream and return the indexed entry.
    ///
    /// Every entry of the stream lands in the cache in one pass, since a
    /// document that compresses one object there compresses its
    /// neighbours too.
    fn load_compressed(&self, stream_id: u32, index: u32) -> Object {
        let container_ref = ObjectRef::new(stream_id, 0);
        let container = self.resolve_ref(container_ref);
        let dict = match container.as_dict() {
            Some(d) => d.clone(),
            None => {
                log::warn!("object stream {} is not a stream", stream_id);
                return Object::Null;
            }
        };
        let body = match self.decoded_stream(container.as_ref()) {
            Some(b) => b,
            None => return Object::Null,
        };

        let entries = match crate::objstm::parse_object_stream(&body, &dict) {
            Ok(entries) => entries,
            Err(e) => {
                log::warn!("object stream {} unreadable: {}", stream_id, e);
                return Object::Null;
            }
        };

        let mut wanted = Object::Null;
        if let Ok(mut cache) = self.cache.lock() {
            for (i, (id, obj)) in entries.into_iter().enumerate() {
                if i == index as usize {
                    wanted = obj.clone();
                }
                let reference = ObjectRef::new(id, 0);
                if !cache.contains(&reference) {
                    cache.insert(reference, Arc::new(obj));
                }
            }
        }
        wanted
    }

    fn setup_encryption(&mut self, password: &[u8]) -> Result<()> {
        let encrypt_obj = match self.trailer().get("Encrypt") {
            Some(obj) => obj.clone(),
            None => return Ok(()),
        };
        // The /Encrypt dictionary itself is never encrypted; resolve it
        // before the handler exists.
        let encrypt_obj = self.resolve(&encrypt_obj);
        if encrypt_obj.is_null() {
            return Ok(());
        }

        let file_id = self
            .trailer()
            .get("ID")
            .and_then(|o| o.as_array())
            .and_then(|arr| arr.first())
            .and_then(|o| o.as_string())
            .unwrap_or(b"")
            .to_vec();

        let handler = EncryptionHandler::open(&encrypt_obj, &file_id, password)?;
        log::info!("document decryption ready ({:?})", handler.algorithm());
        self.encryption = Some(handler);
        // Anything cached before the handler existed is ciphertext.
        self.clear_object_cache();
        Ok(())
    }

    /// Walk the pages tree, inheriting resources and geometry.
    fn collect_pages(&self, cancel: &CancelToken) -> Result<Vec<Page>> {
        let root = self.resolve(self.trailer().get("Root").unwrap_or(&Object::Null));
        let catalog = match root.as_dict() {
            Some(d) => d.clone(),
            None => {
                // Recovery-scanned files may lack a trailer: find any
                // catalog among the known objects.
                match self.find_catalog() {
                    Some(d) => d,
                    None => return Err(Error::InvalidPdf("no document catalog".to_string())),
                }
            }
        };

        let pages_root = self.resolve(catalog.get("Pages").unwrap_or(&Object::Null));
        let mut pages = Vec::new();
        let mut visited = HashSet::new();
        let inherited = Inherited::default();
        match pages_root.as_dict() {
            Some(dict) => {
                self.walk_pages_tree(dict, inherited, &mut pages, &mut visited, 0, cancel)?;
            }
            None => return Err(Error::InvalidPdf("catalog has no /Pages tree".to_string())),
        }
        Ok(pages)
    }

    fn find_catalog(&self) -> Option<Dict> {
        for id in 1..=self.xref.max_id() {
            let obj = self.resolve_ref(ObjectRef::new(id, 0));
            if let Some(dict) = obj.as_dict() {
                if dict.get("Type").and_then(|o| o.as_name()) == Some("Catalog") {
                    return Some(dict.clone());
                }
            }
        }
        None
    }

    fn walk_pages_tree(
        &self,
        node: &Dict,
        inherited: Inherited,
        pages: &mut Vec<Page>,
        visited: &mut HashSet<u32>,
        depth: usize,
        cancel: &CancelToken,
    ) -> Result<()> {
        if depth > MAX_PAGE_TREE_DEPTH {
            log::warn!("pages tree deeper than {}, pruning", MAX_PAGE_TREE_DEPTH);
            return Ok(());
        }
        cancel.check()?;

        let inherited = inherited.absorb(node, self);

        let node_type = node.get("Type").and_then(|o| o.as_name());
        let is_leaf = node_type == Some("Page") || (node_type.is_none() && !node.contains_key("Kids"));
        if is_leaf {
            pages.push(Page {
                dict: node.clone(),
                resources: inherited.resources.clone().unwrap_or_default(),
                media_box: inherited.media_box.unwrap_or([0.0, 0.0, 612.0, 792.0]),
                rotate: inherited.rotate.unwrap_or(0).rem_euclid(360),
            });
            return Ok(());
        }

        let kids = match node.get("Kids").map(|o| self.resolve(o)) {
            Some(Object::Array(kids)) => kids,
            _ => return Ok(()),
        };
        for kid in kids {
            // Cycle guard: a node may appear once on any path.
            if let Some(reference) = kid.as_reference() {
                if !visited.insert(reference.id) {
                    log::warn!("pages tree cycle at object {}", reference.id);
                    continue;
                }
            }
            let resolved = self.resolve(&kid);
            if let Some(kid_dict) = resolved.as_dict() {
                self.walk_pages_tree(kid_dict, inherited.clone(), pages, visited, depth + 1, cancel)?;
            }
        }
        Ok(())
    }

    /// Concatenated, decoded content streams of a page.
    ///
    /// Multiple `/Contents` streams join with a newline so an operator
    /// split across stream boundaries cannot fuse with its neighbour.
    pub fn page_content(&self, page: &Page) -> Vec<u8> {
        let contents = match page.dict.get("Contents") {
            Some(obj) => obj.clone(),
            None => return Vec::new(),
        };

        let mut out = Vec::new();
        match self.resolve(&contents) {
            stream @ Object::Stream { .. } => {
                if let Some(bytes) = self.decoded_stream(&stream) {
                    out = bytes;
                }
            }
            Object::Array(items) => {
                for item in items {
                    let resolved = self.resolve(&item);
                    if let Some(bytes) = self.decoded_stream(&resolved) {
                        if !out.is_empty() {
                            out.push(b'\n');
                        }
                        out.extend_from_slice(&bytes);
                    }
                }
            }
            _ => {}
        }
        out
    }
}

impl Resolve for PdfDocument {
    fn resolve(&self, obj: &Object) -> Object {
        let mut current = obj.clone();
        for _ in 0..MAX_REF_HOPS {
            match current {
                Object::Reference(reference) => {
                    current = self.resolve_ref(reference).as_ref().clone();
                }
                other => return other,
            }
        }
        log::warn!("reference chain exceeded {} hops, treating as null", MAX_REF_HOPS);
        Object::Null
    }

    fn decoded_stream(&self, obj: &Object) -> Option<Vec<u8>> {
        let resolved = match obj {
            Object::Reference(_) => self.resolve(obj),
            other => other.clone(),
        };
        let (dict, data) = match &resolved {
            Object::Stream { dict, data } => (dict, data),
            _ => return None,
        };
        // Payloads were decrypted at materialisation; only filters remain.
        let chain = filter_chain(dict);
        match crate::decoders::decode_chain(data, &chain) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log::warn!("stream decode failed: {}", e);
                Some(Vec::new())
            }
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Inherited {
    resources: Option<Dict>,
    media_box: Option<[f32; 4]>,
    rotate: Option<i32>,
}

impl Inherited {
    /// Overlay this node's inheritable attributes over the parent's.
    fn absorb(&self, node: &Dict, doc: &PdfDocument) -> Inherited {
        let mut next = self.clone();
        if let Some(obj) = node.get("Resources") {
            if let Object::Dictionary(d) = doc.resolve(obj) {
                next.resources = Some(d);
            }
        }
        if let Some(obj) = node.get("MediaBox") {
            if let Some(rect) = parse_rect(&doc.resolve(obj)) {
                next.media_box = Some(rect);
            }
        }
        if let Some(obj) = node.get("Rotate") {
            if let Some(rotate) = doc.resolve(obj).as_integer() {
                next.rotate = Some(rotate as i32);
            }
        }
        next
    }
}

fn parse_rect(obj: &Object) -> Option<[f32; 4]> {
    let arr = obj.as_array()?;
    if arr.len() < 4 {
        return None;
    }
    let mut rect = [0.0f32; 4];
    for (slot, value) in rect.iter_mut().zip(arr.iter()) {
        *slot = value.as_number()? as f32;
    }
    Some(rect)
}

/// Parse the `%PDF-M.m` header, leniently.
///
/// The header must appear in the first kilobyte (preceding junk is
/// tolerated); the version digits only influence logging and permitted
/// encryption, so unparseable digits default to 1.7.
fn parse_header(src: &SliceSource) -> Result<(u8, u8)> {
    let head = src.window(0, 1024);
    let marker = b"%PDF-";
    let pos = head
        .windows(marker.len())
        .position(|w| w == marker)
        .ok_or_else(|| {
            let prefix: String = head
                .iter()
                .take(16)
                .map(|&b| if b.is_ascii_graphic() { b as char } else { '.' })
                .collect();
            Error::InvalidHeader(prefix)
        })?;

    let rest = &head[pos + marker.len()..];
    let major = rest.first().map(|b| b.wrapping_sub(b'0')).filter(|&v| v <= 9);
    let minor = rest.get(2).map(|b| b.wrapping_sub(b'0')).filter(|&v| v <= 9);
    match (major, minor) {
        (Some(major), Some(minor)) => Ok((major, minor)),
        _ => {
            log::warn!("unreadable PDF version digits, assuming 1.7");
            Ok((1, 7))
        }
    }
}

/// Decrypt every string in the object, and the stream payload, in place.
fn decrypt_in_place(object: &mut Object, enc: &EncryptionHandler, id: u32, gen: u16) {
    match object {
        Object::String(bytes) => {
            if let Ok(plain) = enc.decrypt_string(bytes, id, gen) {
                *bytes = plain;
            }
        }
        Object::Array(items) => {
            for item in items {
                decrypt_in_place(item, enc, id, gen);
            }
        }
        Object::Dictionary(dict) => {
            for value in dict.values_mut() {
                decrypt_in_place(value, enc, id, gen);
            }
        }
        Object::Stream { dict, data } => {
            let is_exempt_metadata = !enc.encrypt_metadata()
                && dict.get("Type").and_then(|o| o.as_name()) == Some("Metadata");
            for value in dict.values_mut() {
                decrypt_in_place(value, enc, id, gen);
            }
            if !is_exempt_metadata {
                if let Ok(plain) = enc.decrypt_stream(data, id, gen) {
                    *data = bytes::Bytes::from(plain);
                }
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_pdf::{hello_world_pdf, minimal_pdf, multi_page_pdf};

    #[test]
    fn test_open_minimal_pdf() {
        let doc = PdfDocument::open(minimal_pdf()).unwrap();
        assert_eq!(doc.num_pages(), 1);
        assert_eq!(doc.version(), (1, 4));
        let page = doc.page(0).unwrap();
        assert_eq!(page.media_box, [0.0, 0.0, 612.0, 792.0]);
        assert_eq!(page.rotate, 0);
    }

    #[test]
    fn test_missing_header_is_format_error() {
        let result = PdfDocument::open(b"not a pdf at all".to_vec());
        assert!(matches!(result, Err(Error::InvalidHeader(_))));
    }

    #[test]
    fn test_header_with_leading_junk() {
        let mut bytes = b"junk bytes here\n".to_vec();
        bytes.extend_from_slice(&minimal_pdf());
        // Offsets no longer line up, so the scan recovery path kicks in.
        let doc = PdfDocument::open(bytes).unwrap();
        assert_eq!(doc.num_pages(), 1);
    }

    #[test]
    fn test_resolve_missing_object_is_null() {
        let doc = PdfDocument::open(minimal_pdf()).unwrap();
        let obj = doc.resolve(&Object::Reference(ObjectRef::new(999, 0)));
        assert!(obj.is_null());
    }

    #[test]
    fn test_resolve_non_reference_passthrough() {
        let doc = PdfDocument::open(minimal_pdf()).unwrap();
        assert_eq!(doc.resolve(&Object::Integer(5)), Object::Integer(5));
    }

    #[test]
    fn test_object_cache_reuse() {
        let doc = PdfDocument::open(minimal_pdf()).unwrap();
        let a = doc.resolve_ref(ObjectRef::new(1, 0));
        let b = doc.resolve_ref(ObjectRef::new(1, 0));
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_cache_capacity_cap() {
        let doc = PdfDocument::open(minimal_pdf()).unwrap();
        doc.set_cache_capacity(2);
        for id in 1..=3 {
            let _ = doc.resolve_ref(ObjectRef::new(id, 0));
        }
        let cache = doc.cache.lock().unwrap();
        assert!(cache.len() <= 2);
    }

    #[test]
    fn test_broken_xref_offset_recovers_by_scan() {
        let pdf = String::from_utf8(minimal_pdf()).unwrap();
        let at = pdf.find("startxref\n").unwrap() + "startxref\n".len();
        let end = pdf[at..].find('\n').unwrap() + at;
        let broken = format!("{}999999{}", &pdf[..at], &pdf[end..]);
        let doc = PdfDocument::open(broken.into_bytes()).unwrap();
        assert_eq!(doc.num_pages(), 1);
    }

    #[test]
    fn test_page_content_empty_for_contentless_page() {
        let doc = PdfDocument::open(minimal_pdf()).unwrap();
        let page = doc.page(0).unwrap().clone();
        assert!(doc.page_content(&page).is_empty());
    }

    #[test]
    fn test_page_content_decodes_stream() {
        let doc = PdfDocument::open(hello_world_pdf("Hi")).unwrap();
        let page = doc.page(0).unwrap().clone();
        let content = doc.page_content(&page);
        assert!(String::from_utf8_lossy(&content).contains("(Hi) Tj"));
        // Resources resolved onto the page.
        assert!(page.resources.contains_key("Font"));
    }

    #[test]
    fn test_resources_inherited_from_pages_node() {
        let doc = PdfDocument::open(multi_page_pdf(&["a", "b"])).unwrap();
        assert_eq!(doc.num_pages(), 2);
        for i in 0..2 {
            assert!(doc.page(i).unwrap().resources.contains_key("Font"));
        }
    }

    #[test]
    fn test_cancel_during_open() {
        let cancel = CancelToken::new();
        cancel.cancel();
        let result = PdfDocument::open_with_cancel(minimal_pdf(), b"", &cancel);
        assert!(matches!(result, Err(Error::Cancelled)));
    }
}
