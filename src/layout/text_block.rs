//! Text blocks: clusters of runs with a bounding box.

use crate::content::TextRun;
use serde::Serialize;

/// A cluster of text runs forming a line or paragraph region.
///
/// Invariants kept by construction: the bounding box is the tight hull of
/// the member runs, and the average font size is the run-count-weighted
/// mean.
#[derive(Debug, Clone, Serialize)]
pub struct TextBlock {
    /// Left edge
    pub min_x: f32,
    /// Right edge
    pub max_x: f32,
    /// Bottom edge (page-up coordinates)
    pub min_y: f32,
    /// Top edge
    pub max_y: f32,
    /// Run-count-weighted mean font size
    pub avg_font_size: f32,
    /// Member runs, in insertion order until serialisation sorts them
    pub runs: Vec<TextRun>,
}

impl TextBlock {
    /// Seed a singleton block from one run.
    pub fn from_run(run: TextRun) -> Self {
        let height = run.font_size.max(1.0);
        Self {
            min_x: run.x,
            max_x: run.x + run.width.max(0.0),
            min_y: run.y,
            max_y: run.y + height,
            avg_font_size: run.font_size.max(1.0),
            runs: vec![run],
        }
    }

    /// Width of the bounding box.
    pub fn width(&self) -> f32 {
        self.max_x - self.min_x
    }

    /// Height of the bounding box.
    pub fn height(&self) -> f32 {
        self.max_y - self.min_y
    }

    /// Centre point of the bounding box.
    pub fn center(&self) -> (f32, f32) {
        (
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }

    /// Absorb another block: hull bounds, weighted font size, moved runs.
    pub fn absorb(&mut self, other: TextBlock) {
        let self_count = self.runs.len() as f32;
        let other_count = other.runs.len() as f32;
        self.avg_font_size = (self.avg_font_size * self_count
            + other.avg_font_size * other_count)
            / (self_count + other_count).max(1.0);
        self.min_x = self.min_x.min(other.min_x);
        self.max_x = self.max_x.max(other.max_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_y = self.max_y.max(other.max_y);
        self.runs.extend(other.runs);
    }

    /// Gap between the horizontal extents; zero when they overlap.
    pub fn horizontal_gap(&self, other: &TextBlock) -> f32 {
        (self.min_x.max(other.min_x) - self.max_x.min(other.max_x)).max(0.0)
    }

    /// Gap between the vertical extents; zero when they overlap.
    pub fn vertical_gap(&self, other: &TextBlock) -> f32 {
        (self.min_y.max(other.min_y) - self.max_y.min(other.max_y)).max(0.0)
    }

    /// Length of the vertical overlap, zero or negative when disjoint.
    pub fn vertical_overlap(&self, other: &TextBlock) -> f32 {
        self.max_y.min(other.max_y) - self.min_y.max(other.min_y)
    }

    /// Length of the horizontal overlap, zero or negative when disjoint.
    pub fn horizontal_overlap(&self, other: &TextBlock) -> f32 {
        self.max_x.min(other.max_x) - self.min_x.max(other.min_x)
    }

    /// True when the bounding boxes intersect.
    pub fn overlaps(&self, other: &TextBlock) -> bool {
        self.horizontal_overlap(other) > 0.0 && self.vertical_overlap(other) > 0.0
    }
}
