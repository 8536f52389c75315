//! RunLengthDecode filter.
//!
//! Header byte semantics: 0-127 copy the next N+1 bytes literally,
//! 129-255 repeat the next byte 257-N times, 128 is end of data.

use crate::decoders::{DecodeParams, StreamDecoder};
use crate::error::Result;

/// RunLengthDecode filter implementation.
pub struct RunLengthDecoder;

impl StreamDecoder for RunLengthDecoder {
    fn decode(&self, input: &[u8], _params: &DecodeParams) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() * 2);
        let mut pos = 0usize;

        while pos < input.len() {
            let header = input[pos];
            pos += 1;
            match header {
                128 => break,
                0..=127 => {
                    let count = header as usize + 1;
                    let available = count.min(input.len() - pos);
                    output.extend_from_slice(&input[pos..pos + available]);
                    pos += available;
                    if available < count {
                        log::debug!("run-length literal truncated by end of data");
                        break;
                    }
                }
                129..=255 => {
                    let count = 257 - header as usize;
                    match input.get(pos) {
                        Some(&byte) => {
                            output.extend(std::iter::repeat(byte).take(count));
                            pos += 1;
                        }
                        None => {
                            log::debug!("run-length repeat truncated by end of data");
                            break;
                        }
                    }
                }
            }
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        "RunLengthDecode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &[u8]) -> Vec<u8> {
        RunLengthDecoder.decode(input, &DecodeParams::default()).unwrap()
    }

    #[test]
    fn test_literal_then_repeat() {
        // 0x02 "ABC" literal, 0xFE 'D' repeated 3 times, 0x80 EOD
        assert_eq!(decode(&[0x02, b'A', b'B', b'C', 0xFE, b'D', 0x80]), b"ABCDDD");
    }

    #[test]
    fn test_single_literal() {
        assert_eq!(decode(&[0x00, b'X', 0x80]), b"X");
    }

    #[test]
    fn test_max_repeat() {
        // Header 129 repeats 257-129 = 128 times.
        let out = decode(&[129, b'Q', 0x80]);
        assert_eq!(out.len(), 128);
        assert!(out.iter().all(|&b| b == b'Q'));
    }

    #[test]
    fn test_data_after_eod_ignored() {
        assert_eq!(decode(&[0x00, b'A', 0x80, 0x00, b'B']), b"A");
    }

    #[test]
    fn test_truncated_literal() {
        assert_eq!(decode(&[0x05, b'A', b'B']), b"AB");
    }

    #[test]
    fn test_truncated_repeat() {
        assert_eq!(decode(&[0xFE]), b"");
    }

    #[test]
    fn test_missing_eod() {
        assert_eq!(decode(&[0x01, b'A', b'B']), b"AB");
    }

    #[test]
    fn test_empty() {
        assert_eq!(decode(&[]), b"");
    }
}
