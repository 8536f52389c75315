//! Geometric reconstruction: runs to blocks to reading-order text.

pub mod cluster;
pub mod grid;
pub mod reading_order;
pub mod text_block;
pub mod union_find;

pub use cluster::{cluster_runs, PARALLEL_THRESHOLD};
pub use reading_order::{serialize_blocks, sort_blocks, text_by_columns, text_by_rows};
pub use text_block::TextBlock;

use crate::content::TextRun;

/// Cluster runs and serialise them in reading order.
pub fn reconstruct_text(runs: Vec<TextRun>) -> String {
    let mut blocks = cluster_runs(runs);
    serialize_blocks(&mut blocks)
}

/// Cluster runs and return the ordered block structure.
pub fn reconstruct_blocks(runs: Vec<TextRun>) -> Vec<TextBlock> {
    let mut blocks = cluster_runs(runs);
    sort_blocks(&mut blocks);
    blocks
}
