//! Union-find clustering of text runs into blocks.
//!
//! Every run seeds a singleton block; a spatial grid proposes nearby
//! pairs; a cheap bounding-box gap test prunes before the geometric merge
//! predicate decides; union-find accumulates the verdicts; finally each
//! cluster collapses into one block with hull bounds and a weighted mean
//! font size.
//!
//! Above [`PARALLEL_THRESHOLD`] runs, edge discovery fans out across
//! rayon workers with per-worker scratch buffers and the discovered edges
//! merge into the union-find sequentially — the union-find itself is
//! never written concurrently.

use crate::cache::VecPool;
use crate::content::TextRun;
use crate::layout::grid::SpatialGrid;
use crate::layout::text_block::TextBlock;
use crate::layout::union_find::UnionFind;
use rayon::prelude::*;
use std::collections::HashMap;

/// Run counts above this use parallel edge discovery.
pub const PARALLEL_THRESHOLD: usize = 1000;

lazy_static::lazy_static! {
    /// Neighbour-query scratch buffers, reused across pages.
    static ref SCRATCH_POOL: VecPool<usize> = VecPool::new(16);
    /// Edge accumulators, reused across pages.
    static ref EDGE_POOL: VecPool<(usize, usize)> = VecPool::new(16);
}

/// Cluster positioned runs into merged text blocks.
pub fn cluster_runs(runs: Vec<TextRun>) -> Vec<TextBlock> {
    if runs.is_empty() {
        return Vec::new();
    }

    let blocks: Vec<TextBlock> = runs.into_iter().map(TextBlock::from_run).collect();
    let avg_font_size = page_average_font_size(&blocks);

    // Cell size of roughly four times the average glyph height keeps the
    // 3x3 neighbourhood larger than any merge the predicate can accept.
    let mut grid = SpatialGrid::new(avg_font_size * 4.0);
    for (i, block) in blocks.iter().enumerate() {
        grid.insert(i, block.center());
    }

    let edges = if blocks.len() > PARALLEL_THRESHOLD {
        discover_edges_parallel(&blocks, &grid)
    } else {
        let mut scratch = SCRATCH_POOL.take();
        let mut edges = EDGE_POOL.take();
        for i in 0..blocks.len() {
            discover_edges_for(&blocks, &grid, i, &mut scratch, &mut edges);
        }
        SCRATCH_POOL.give(scratch);
        edges
    };

    let mut uf = UnionFind::new(blocks.len());
    for &(a, b) in &edges {
        uf.union(a, b);
    }
    EDGE_POOL.give(edges);

    collapse(blocks, &mut uf)
}

fn page_average_font_size(blocks: &[TextBlock]) -> f32 {
    let sum: f32 = blocks.iter().map(|b| b.avg_font_size).sum();
    (sum / blocks.len() as f32).max(1.0)
}

fn discover_edges_for(
    blocks: &[TextBlock],
    grid: &SpatialGrid,
    i: usize,
    scratch: &mut Vec<usize>,
    edges: &mut Vec<(usize, usize)>,
) {
    grid.neighbors_into(blocks[i].center(), scratch);
    for &j in scratch.iter() {
        if j <= i {
            continue;
        }
        let (a, b) = (&blocks[i], &blocks[j]);
        if can_merge_coarse(a, b) && should_merge_clusters(a, b) {
            edges.push((i, j));
        }
    }
}

/// Parallel edge discovery: each worker scans a chunk of the index space
/// with its own scratch buffer and edge list; the lists concatenate at the
/// end. Trades peak memory for zero lock contention.
fn discover_edges_parallel(blocks: &[TextBlock], grid: &SpatialGrid) -> Vec<(usize, usize)> {
    let chunk = (blocks.len() / rayon::current_num_threads().max(1)).max(64);
    (0..blocks.len())
        .into_par_iter()
        .chunks(chunk)
        .map(|indices| {
            let mut scratch = Vec::new();
            let mut edges = Vec::new();
            for i in indices {
                discover_edges_for(blocks, grid, i, &mut scratch, &mut edges);
            }
            edges
        })
        .reduce(Vec::new, |mut acc, mut part| {
            acc.append(&mut part);
            acc
        })
}

/// Cheap pre-filter on bounding-box gaps.
///
/// Threshold is twice the pair's average font size: the horizontal gap
/// must fit it, the vertical gap 1.5x it, and the combined gap stays
/// under twice the threshold so two borderline gaps do not slip through
/// together.
pub fn can_merge_coarse(a: &TextBlock, b: &TextBlock) -> bool {
    let threshold = a.avg_font_size + b.avg_font_size; // 2 x average
    let h_gap = a.horizontal_gap(b);
    let v_gap = a.vertical_gap(b);
    h_gap <= threshold && v_gap <= 1.5 * threshold && h_gap + v_gap <= 2.0 * threshold
}

/// The geometric merge predicate.
///
/// Merges same-line neighbours (vertical overlap with a small horizontal
/// gap) and successive lines of a paragraph (horizontal overlap with a
/// small vertical gap); otherwise keeps column-mates apart and refuses
/// anything whose centres are further than twice the average block
/// dimension.
pub fn should_merge_clusters(a: &TextBlock, b: &TextBlock) -> bool {
    let avg_font_size = (a.avg_font_size + b.avg_font_size) / 2.0;

    // Same line: significant vertical overlap, close horizontally.
    let v_overlap = a.vertical_overlap(b);
    if v_overlap > 0.3 * a.avg_font_size.min(b.avg_font_size)
        && a.horizontal_gap(b) < 2.0 * avg_font_size
    {
        return true;
    }

    // Successive lines: significant horizontal overlap, close vertically.
    let h_overlap = a.horizontal_overlap(b);
    if h_overlap > 0.6 * a.width().min(b.width()) && a.vertical_gap(b) < 3.0 * avg_font_size {
        return true;
    }

    // Different columns read as wide-but-close: reject when horizontal
    // distance dominates.
    let h_dist = a.horizontal_gap(b);
    let v_dist = a.vertical_gap(b);
    if h_dist > 2.0 * v_dist.max(0.5) {
        return false;
    }

    let (acx, acy) = a.center();
    let (bcx, bcy) = b.center();
    let avg_width = (a.width() + b.width()) / 2.0;
    let avg_height = (a.height() + b.height()) / 2.0;
    if (acx - bcx).abs() > 2.0 * avg_width.max(1.0)
        || (acy - bcy).abs() > 2.0 * avg_height.max(1.0)
    {
        return false;
    }

    true
}

/// Collapse union-find clusters into merged blocks.
fn collapse(blocks: Vec<TextBlock>, uf: &mut UnionFind) -> Vec<TextBlock> {
    let mut by_root: HashMap<usize, Vec<TextBlock>> = HashMap::new();
    for (i, block) in blocks.into_iter().enumerate() {
        by_root.entry(uf.find(i)).or_default().push(block);
    }

    let mut merged = Vec::with_capacity(by_root.len());
    for (_, mut members) in by_root {
        let mut base = members.remove(0);
        for member in members {
            base.absorb(member);
        }
        merged.push(base);
    }
    merged
}
