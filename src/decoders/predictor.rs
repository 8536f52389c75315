//! Predictor post-processing for Flate and LZW streams.
//!
//! Predictors transform per row after decompression. TIFF Predictor 2
//! differences each component against the same component one pixel to the
//! left; PNG predictors (10-15) prefix every row with a filter-type byte
//! selecting None/Sub/Up/Average/Paeth. Row width is
//! `(columns * colors * bits_per_component + 7) / 8` bytes and the row
//! above the first is all zeroes.

use crate::decoders::DecodeParams;
use crate::error::{Error, Result};

/// Undo the declared predictor over the decompressed bytes.
///
/// Predictor 1 (or anything unrecognised) passes the data through.
pub fn apply_predictor(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    match params.predictor {
        2 => undo_tiff(data, params),
        10..=15 => undo_png(data, params),
        1 => Ok(data.to_vec()),
        other => {
            log::warn!("unknown predictor {}, passing data through", other);
            Ok(data.to_vec())
        }
    }
}

fn row_bytes(params: &DecodeParams) -> usize {
    (params.columns * params.colors * params.bits_per_component + 7) / 8
}

/// Bytes per whole pixel, minimum one (sub-byte components round up).
fn pixel_bytes(params: &DecodeParams) -> usize {
    ((params.colors * params.bits_per_component) / 8).max(1)
}

fn undo_tiff(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    if params.bits_per_component != 8 {
        // Sub-byte TIFF differencing is vanishingly rare in the wild;
        // pass it through rather than corrupt the data guessing.
        log::warn!(
            "TIFF predictor with {} bits per component not supported, passing through",
            params.bits_per_component
        );
        return Ok(data.to_vec());
    }

    let row_len = row_bytes(params);
    if row_len == 0 {
        return Ok(data.to_vec());
    }
    let colors = params.colors;
    let mut output = data.to_vec();

    for row in output.chunks_mut(row_len) {
        for i in colors..row.len() {
            row[i] = row[i].wrapping_add(row[i - colors]);
        }
    }
    Ok(output)
}

fn undo_png(data: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
    let row_len = row_bytes(params);
    if row_len == 0 {
        return Ok(data.to_vec());
    }
    let stride = row_len + 1; // leading filter-type byte
    let bpp = pixel_bytes(params);

    let rows = data.len() / stride;
    if rows == 0 {
        return Err(Error::Decode(format!(
            "predictor input shorter than one row ({} bytes, stride {})",
            data.len(),
            stride
        )));
    }
    if data.len() % stride != 0 {
        log::debug!("predictor input not a whole number of rows, trailing bytes dropped");
    }

    let mut output = Vec::with_capacity(rows * row_len);
    let mut previous = vec![0u8; row_len];

    for chunk in data.chunks_exact(stride) {
        let filter = chunk[0];
        let mut row = chunk[1..].to_vec();

        match filter {
            0 => {}
            1 => {
                // Sub: add the byte one pixel to the left.
                for i in bpp..row_len {
                    row[i] = row[i].wrapping_add(row[i - bpp]);
                }
            }
            2 => {
                // Up: add the byte directly above.
                for i in 0..row_len {
                    row[i] = row[i].wrapping_add(previous[i]);
                }
            }
            3 => {
                // Average of left and above.
                for i in 0..row_len {
                    let left = if i >= bpp { row[i - bpp] as u16 } else { 0 };
                    let above = previous[i] as u16;
                    row[i] = row[i].wrapping_add(((left + above) / 2) as u8);
                }
            }
            4 => {
                // Paeth.
                for i in 0..row_len {
                    let left = if i >= bpp { row[i - bpp] } else { 0 };
                    let above = previous[i];
                    let upper_left = if i >= bpp { previous[i - bpp] } else { 0 };
                    row[i] = row[i].wrapping_add(paeth(left, above, upper_left));
                }
            }
            other => {
                log::debug!("unknown PNG filter type {}, leaving row untouched", other);
            }
        }

        output.extend_from_slice(&row);
        previous = row;
    }

    Ok(output)
}

fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = a as i16 + b as i16 - c as i16;
    let pa = (p - a as i16).abs();
    let pb = (p - b as i16).abs();
    let pc = (p - c as i16).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}
