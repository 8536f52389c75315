//! JBIG2Decode skeleton.
//!
//! Full JBIG2 decoding is out of scope — the payloads are bilevel images
//! that text extraction skips. This decoder walks the embedded-stream
//! segment headers so malformed documents cannot wedge the pipeline, then
//! yields no image data.

use crate::decoders::{DecodeParams, StreamDecoder};
use crate::error::Result;

/// JBIG2Decode filter skeleton.
pub struct Jbig2Decoder;

/// One parsed segment header.
#[derive(Debug, PartialEq, Eq)]
pub struct Segment {
    /// Segment number
    pub number: u32,
    /// Segment type (low six bits of the flags byte)
    pub kind: u8,
    /// Referred-to segment count
    pub referred: u32,
    /// Page association
    pub page: u32,
    /// Payload length in bytes (0xFFFFFFFF = unknown)
    pub data_length: u32,
}

impl StreamDecoder for Jbig2Decoder {
    fn decode(&self, input: &[u8], _params: &DecodeParams) -> Result<Vec<u8>> {
        let segments = parse_segments(input);
        log::debug!("JBIG2 stream: {} segments parsed, image data skipped", segments.len());
        Ok(Vec::new())
    }

    fn name(&self) -> &str {
        "JBIG2Decode"
    }
}

/// Walk segment headers in an embedded (PDF-style) JBIG2 stream.
///
/// Stops at the first header that does not fit; a garbage stream just
/// produces an empty list.
pub fn parse_segments(input: &[u8]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let mut pos = 0usize;

    while pos + 11 <= input.len() {
        let number = u32::from_be_bytes([input[pos], input[pos + 1], input[pos + 2], input[pos + 3]]);
        let flags = input[pos + 4];
        let kind = flags & 0x3F;
        let page_assoc_wide = flags & 0x40 != 0;
        pos += 5;

        // Referred-to segment count and retain flags.
        let rts = input[pos];
        let referred = if rts >> 5 == 7 {
            // Long form: count in the low 29 bits, then retain bits.
            if pos + 4 > input.len() {
                break;
            }
            let count = u32::from_be_bytes([input[pos] & 0x1F, input[pos + 1], input[pos + 2], input[pos + 3]]);
            pos += 4 + (count as usize + 8) / 8;
            count
        } else {
            pos += 1;
            (rts >> 5) as u32
        };

        // Referred segment numbers: 1, 2 or 4 bytes each by segment number.
        let ref_size = if number <= 256 {
            1
        } else if number <= 65536 {
            2
        } else {
            4
        };
        pos += referred as usize * ref_size;

        // Page association.
        let page_size = if page_assoc_wide { 4 } else { 1 };
        if pos + page_size + 4 > input.len() {
            break;
        }
        let page = if page_assoc_wide {
            u32::from_be_bytes([input[pos], input[pos + 1], input[pos + 2], input[pos + 3]])
        } else {
            input[pos] as u32
        };
        pos += page_size;

        let data_length =
            u32::from_be_bytes([input[pos], input[pos + 1], input[pos + 2], input[pos + 3]]);
        pos += 4;

        segments.push(Segment {
            number,
            kind,
            referred,
            page,
            data_length,
        });

        if data_length == u32::MAX {
            // Unknown length: cannot skip reliably, stop scanning.
            break;
        }
        pos = match pos.checked_add(data_length as usize) {
            Some(next) if next <= input.len() => next,
            _ => break,
        };
    }

    segments
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_yields_no_bytes() {
        let out = Jbig2Decoder
            .decode(b"anything at all", &DecodeParams::default())
            .unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn test_parse_single_segment() {
        // number=1, flags=0x30 (kind 48, page-immediate), no referred,
        // page=1, length=0.
        let data = [0u8, 0, 0, 1, 0x30, 0x00, 0x01, 0, 0, 0, 0];
        let segments = parse_segments(&data);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].number, 1);
        assert_eq!(segments[0].kind, 48);
        assert_eq!(segments[0].page, 1);
        assert_eq!(segments[0].data_length, 0);
    }

    #[test]
    fn test_parse_segment_with_payload_skips_it() {
        let mut data = vec![0u8, 0, 0, 1, 0x30, 0x00, 0x01, 0, 0, 0, 3];
        data.extend_from_slice(&[0xAA, 0xBB, 0xCC]);
        // Second segment after the payload.
        data.extend_from_slice(&[0u8, 0, 0, 2, 0x30, 0x00, 0x01, 0, 0, 0, 0]);
        let segments = parse_segments(&data);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[1].number, 2);
    }

    #[test]
    fn test_garbage_is_empty() {
        assert!(parse_segments(b"short").is_empty());
    }

    #[test]
    fn test_unknown_length_stops_scan() {
        let data = [0u8, 0, 0, 1, 0x30, 0x00, 0x01, 0xFF, 0xFF, 0xFF, 0xFF, 1, 2, 3];
        let segments = parse_segments(&data);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].data_length, u32::MAX);
    }
}
