//! Spatial grid for neighbour queries during clustering.
//!
//! Blocks are bucketed by their centre into square cells; a neighbour
//! query returns everything in the 3x3 cell neighbourhood. With the cell
//! sized to a few multiples of the page's average font size, the merge
//! predicates only ever look at genuinely nearby blocks.

use std::collections::HashMap;

/// Uniform grid over block indices.
pub struct SpatialGrid {
    cell_size: f32,
    cells: HashMap<(i32, i32), Vec<usize>>,
}

impl SpatialGrid {
    /// Grid with the given cell size (clamped away from zero).
    pub fn new(cell_size: f32) -> Self {
        Self {
            cell_size: cell_size.max(1.0),
            cells: HashMap::new(),
        }
    }

    fn cell_of(&self, x: f32, y: f32) -> (i32, i32) {
        (
            (x / self.cell_size).floor() as i32,
            (y / self.cell_size).floor() as i32,
        )
    }

    /// Insert a block index at its centre point.
    pub fn insert(&mut self, index: usize, center: (f32, f32)) {
        let cell = self.cell_of(center.0, center.1);
        self.cells.entry(cell).or_default().push(index);
    }

    /// Collect indices in the 3x3 neighbourhood of `center` into `out`.
    ///
    /// `out` is a caller-owned scratch buffer so the parallel variant can
    /// keep one per worker.
    pub fn neighbors_into(&self, center: (f32, f32), out: &mut Vec<usize>) {
        out.clear();
        let (cx, cy) = self.cell_of(center.0, center.1);
        for dx in -1..=1 {
            for dy in -1..=1 {
                if let Some(bucket) = self.cells.get(&(cx + dx, cy + dy)) {
                    out.extend_from_slice(bucket);
                }
            }
        }
    }

    /// Number of occupied cells.
    pub fn occupied_cells(&self) -> usize {
        self.cells.len()
    }
}
