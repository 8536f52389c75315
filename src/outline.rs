//! Document outline (bookmark) extraction.
//!
//! The outline is an author-defined tree and arrives with every defect a
//! tree can have: cycles through `/Next`, sibling chains that never end,
//! depth bombs. Traversal therefore carries a visited set, a depth bound
//! of [`MAX_OUTLINE_DEPTH`], and a sibling cap of [`MAX_SIBLINGS`] — a
//! deeper or wider tree yields a truncated outline, never a hang.

use crate::document::PdfDocument;
use crate::fonts::encoding::decode_text_string;
use crate::object::{Object, Resolve};
use serde::Serialize;
use std::collections::HashSet;

/// Maximum outline nesting depth.
pub const MAX_OUTLINE_DEPTH: usize = 128;

/// Maximum siblings walked at one level.
pub const MAX_SIBLINGS: usize = 1000;

/// One outline entry.
#[derive(Debug, Clone, Serialize)]
pub struct OutlineItem {
    /// Decoded title
    pub title: String,
    /// Nesting depth, root items at zero
    pub depth: usize,
    /// Children in document order
    pub children: Vec<OutlineItem>,
}

/// Extract the outline tree, bounded and cycle-safe.
///
/// Documents without an outline return an empty list.
pub fn extract_outline(doc: &PdfDocument) -> Vec<OutlineItem> {
    let root = doc.resolve(doc.trailer().get("Root").unwrap_or(&Object::Null));
    let Some(catalog) = root.as_dict() else {
        return Vec::new();
    };
    let Some(outlines_obj) = catalog.get("Outlines") else {
        return Vec::new();
    };
    let outlines = doc.resolve(outlines_obj);
    let Some(outlines) = outlines.as_dict() else {
        return Vec::new();
    };

    let mut visited = HashSet::new();
    match outlines.get("First") {
        Some(first) => walk_siblings(doc, first, 0, &mut visited),
        None => Vec::new(),
    }
}

fn walk_siblings(
    doc: &PdfDocument,
    first: &Object,
    depth: usize,
    visited: &mut HashSet<u32>,
) -> Vec<OutlineItem> {
    if depth >= MAX_OUTLINE_DEPTH {
        log::warn!("outline deeper than {}, pruning", MAX_OUTLINE_DEPTH);
        return Vec::new();
    }

    let mut items = Vec::new();
    let mut current = first.clone();

    for _ in 0..MAX_SIBLINGS {
        if let Some(reference) = current.as_reference() {
            if !visited.insert(reference.id) {
                log::warn!("outline cycle at object {}", reference.id);
                break;
            }
        }
        let node = doc.resolve(&current);
        let Some(dict) = node.as_dict() else { break };

        let title = dict
            .get("Title")
            .map(|o| doc.resolve(o))
            .as_ref()
            .and_then(|o| o.as_string())
            .map(decode_text_string)
            .unwrap_or_default();

        let children = match dict.get("First") {
            Some(first_child) => walk_siblings(doc, first_child, depth + 1, visited),
            None => Vec::new(),
        };

        items.push(OutlineItem {
            title,
            depth,
            children,
        });

        match dict.get("Next") {
            Some(next) => current = next.clone(),
            None => break,
        }
    }

    items
}
