//! Reading-order serialisation of text blocks.
//!
//! Coordinates here are PDF-native page-up: y grows towards the top of
//! the page, so reading order sorts by *descending* top edge. Blocks
//! whose vertical ranges overlap form a horizontal band and read left to
//! right within it. Inside a block, runs sort into rows by y and columns
//! by x; a space is inserted between runs on the same row when the gap
//! exceeds a fraction of the font size, a newline between rows and
//! between blocks.

use crate::content::TextRun;
use crate::layout::text_block::TextBlock;

/// Horizontal gap beyond `SPACE_GAP_FACTOR x font size` becomes a space.
const SPACE_GAP_FACTOR: f32 = 0.25;

/// Runs within this fraction of a font size vertically share a row.
const ROW_TOLERANCE_FACTOR: f32 = 0.5;

/// Sort blocks into reading order: top-to-bottom bands, left-to-right
/// within a band.
pub fn sort_blocks(blocks: &mut [TextBlock]) {
    blocks.sort_by(|a, b| {
        b.max_y
            .partial_cmp(&a.max_y)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    // Partition into bands of vertically-overlapping blocks, then order
    // each band by its left edge.
    let mut start = 0usize;
    while start < blocks.len() {
        let mut band_min_y = blocks[start].min_y;
        let mut end = start + 1;
        while end < blocks.len() && blocks[end].max_y > band_min_y {
            band_min_y = band_min_y.min(blocks[end].min_y);
            end += 1;
        }
        blocks[start..end].sort_by(|a, b| {
            a.min_x
                .partial_cmp(&b.min_x)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        start = end;
    }
}

/// Serialise sorted blocks to text: rows inside a block joined by
/// newlines, blocks separated by newlines.
pub fn serialize_blocks(blocks: &mut [TextBlock]) -> String {
    sort_blocks(blocks);
    let mut out = String::new();
    for block in blocks.iter_mut() {
        if !out.is_empty() {
            out.push('\n');
        }
        out.push_str(&serialize_block(block));
    }
    out
}

fn serialize_block(block: &mut TextBlock) -> String {
    let tolerance = block.avg_font_size.max(1.0) * ROW_TOLERANCE_FACTOR;
    // Rows: descending y with tolerance, then ascending x.
    block.runs.sort_by(|a, b| {
        let dy = b.y - a.y;
        if dy.abs() > tolerance {
            dy.partial_cmp(&0.0).unwrap_or(std::cmp::Ordering::Equal)
        } else {
            a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal)
        }
    });

    let mut out = String::new();
    let mut row_y: Option<f32> = None;
    let mut last_end: f32 = 0.0;

    for run in &block.runs {
        if run.text.is_empty() {
            continue;
        }
        match row_y {
            Some(y) if (run.y - y).abs() <= tolerance => {
                // Same row: add a space across significant gaps.
                let gap = run.x - last_end;
                let space_width = run.font_size.max(1.0) * SPACE_GAP_FACTOR;
                if gap > space_width && !out.ends_with(' ') && !out.is_empty() {
                    out.push(' ');
                }
            }
            Some(_) => out.push('\n'),
            None => {}
        }
        out.push_str(&run.text);
        row_y = Some(run.y);
        last_end = run.x + run.width;
    }
    out
}

/// Serialise runs purely by row bins, skipping block clustering.
///
/// Kept distinct from the block path: callers that want strict
/// top-to-bottom text (tables, forms) use this directly.
pub fn text_by_rows(mut runs: Vec<TextRun>) -> String {
    if runs.is_empty() {
        return String::new();
    }
    let tolerance = average_font_size(&runs) * ROW_TOLERANCE_FACTOR;
    runs.sort_by(|a, b| {
        let dy = b.y - a.y;
        if dy.abs() > tolerance {
            dy.partial_cmp(&0.0).unwrap_or(std::cmp::Ordering::Equal)
        } else {
            a.x.partial_cmp(&b.x).unwrap_or(std::cmp::Ordering::Equal)
        }
    });

    let mut out = String::new();
    let mut row_y: Option<f32> = None;
    for run in &runs {
        if run.text.is_empty() {
            continue;
        }
        match row_y {
            Some(y) if (run.y - y).abs() > tolerance => out.push('\n'),
            Some(_) => {
                if !out.ends_with(' ') {
                    out.push(' ');
                }
            }
            None => {}
        }
        out.push_str(&run.text);
        row_y = Some(run.y);
    }
    out
}

/// Serialise runs by column bins: left-to-right columns, top-to-bottom
/// within each column.
pub fn text_by_columns(mut runs: Vec<TextRun>) -> String {
    if runs.is_empty() {
        return String::new();
    }
    let tolerance = average_font_size(&runs) * 2.0;
    runs.sort_by(|a, b| {
        let dx = a.x - b.x;
        if dx.abs() > tolerance {
            dx.partial_cmp(&0.0).unwrap_or(std::cmp::Ordering::Equal)
        } else {
            b.y.partial_cmp(&a.y).unwrap_or(std::cmp::Ordering::Equal)
        }
    });

    let mut out = String::new();
    let mut col_x: Option<f32> = None;
    for run in &runs {
        if run.text.is_empty() {
            continue;
        }
        match col_x {
            Some(x) if (run.x - x).abs() > tolerance => out.push('\n'),
            Some(_) => {
                if !out.ends_with(' ') {
                    out.push(' ');
                }
            }
            None => {}
        }
        out.push_str(&run.text);
        col_x = Some(run.x);
    }
    out
}

fn average_font_size(runs: &[TextRun]) -> f32 {
    let sum: f32 = runs.iter().map(|r| r.font_size).sum();
    (sum / runs.len() as f32).max(1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::cluster::cluster_runs;

    fn run(text: &str, x: f32, y: f32, width: f32, size: f32) -> TextRun {
        TextRun {
            text: text.to_string(),
            x,
            y,
            width,
            font_name: "F1".to_string(),
            font_size: size,
            rotation: 0,
        }
    }

    #[test]
    fn test_top_to_bottom() {
        let mut blocks = cluster_runs(vec![
            run("bottom", 0.0, 30.0, 60.0, 12.0),
            run("top", 0.0, 700.0, 40.0, 12.0),
        ]);
        let text = serialize_blocks(&mut blocks);
        assert_eq!(text, "top\nbottom");
    }

    #[test]
    fn test_band_left_to_right() {
        // Two columns at the same height: left reads first.
        let mut blocks = cluster_runs(vec![
            run("right", 300.0, 500.0, 50.0, 12.0),
            run("left", 0.0, 500.0, 40.0, 12.0),
        ]);
        let text = serialize_blocks(&mut blocks);
        assert_eq!(text, "left\nright");
    }

    #[test]
    fn test_same_row_gap_becomes_space() {
        let mut blocks = cluster_runs(vec![
            run("Hello", 0.0, 100.0, 30.0, 12.0),
            run("World", 40.0, 100.0, 30.0, 12.0),
        ]);
        let text = serialize_blocks(&mut blocks);
        assert_eq!(text, "Hello World");
    }

    #[test]
    fn test_adjacent_runs_no_space() {
        // Runs that abut (split mid-word by the generator) concatenate.
        let mut blocks = cluster_runs(vec![
            run("Hel", 0.0, 100.0, 18.0, 12.0),
            run("lo", 18.5, 100.0, 12.0, 12.0),
        ]);
        let text = serialize_blocks(&mut blocks);
        assert_eq!(text, "Hello");
    }

    #[test]
    fn test_rows_within_block() {
        let mut blocks = cluster_runs(vec![
            run("line one", 0.0, 114.0, 90.0, 12.0),
            run("line two", 0.0, 100.0, 90.0, 12.0),
        ]);
        assert_eq!(blocks.len(), 1);
        let text = serialize_blocks(&mut blocks);
        assert_eq!(text, "line one\nline two");
    }

    #[test]
    fn test_text_by_rows() {
        let runs = vec![
            run("b1", 50.0, 100.0, 10.0, 10.0),
            run("a1", 0.0, 100.0, 10.0, 10.0),
            run("a2", 0.0, 50.0, 10.0, 10.0),
        ];
        assert_eq!(text_by_rows(runs), "a1 b1\na2");
    }

    #[test]
    fn test_text_by_columns() {
        let runs = vec![
            run("c2b", 100.0, 50.0, 10.0, 10.0),
            run("c1a", 0.0, 100.0, 10.0, 10.0),
            run("c1b", 0.0, 50.0, 10.0, 10.0),
            run("c2a", 100.0, 100.0, 10.0, 10.0),
        ];
        assert_eq!(text_by_columns(runs), "c1a c1b\nc2a c2b");
    }

    #[test]
    fn test_empty() {
        assert_eq!(serialize_blocks(&mut Vec::new()), "");
        assert_eq!(text_by_rows(Vec::new()), "");
        assert_eq!(text_by_columns(Vec::new()), "");
    }
}
