//! ASCIIHexDecode filter.
//!
//! Pairs of hex digits become one byte. Whitespace is ignored, any other
//! non-hex byte is skipped, `>` ends the data, and an odd trailing digit is
//! right-padded with zero.

use crate::decoders::{DecodeParams, StreamDecoder};
use crate::error::Result;

/// ASCIIHexDecode filter implementation.
pub struct AsciiHexDecoder;

impl StreamDecoder for AsciiHexDecoder {
    fn decode(&self, input: &[u8], _params: &DecodeParams) -> Result<Vec<u8>> {
        let mut output = Vec::with_capacity(input.len() / 2);
        let mut hi: Option<u8> = None;

        for &byte in input {
            if byte == b'>' {
                break;
            }
            let digit = match byte {
                b'0'..=b'9' => byte - b'0',
                b'a'..=b'f' => byte - b'a' + 10,
                b'A'..=b'F' => byte - b'A' + 10,
                _ => continue,
            };
            match hi {
                None => hi = Some(digit),
                Some(h) => {
                    output.push((h << 4) | digit);
                    hi = None;
                }
            }
        }
        if let Some(h) = hi {
            output.push(h << 4);
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        "ASCIIHexDecode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &[u8]) -> Vec<u8> {
        AsciiHexDecoder.decode(input, &DecodeParams::default()).unwrap()
    }

    #[test]
    fn test_basic() {
        assert_eq!(decode(b"48656C6C6F>"), b"Hello");
    }

    #[test]
    fn test_whitespace_ignored() {
        assert_eq!(decode(b"48 65 6C 6C 6F 20 57 6F 72 6C 64 >"), b"Hello World");
    }

    #[test]
    fn test_odd_digit_padded() {
        assert_eq!(decode(b"ABC>"), vec![0xAB, 0xC0]);
        assert_eq!(decode(b"4>"), vec![0x40]);
    }

    #[test]
    fn test_missing_eod_marker() {
        assert_eq!(decode(b"4865"), b"He");
    }

    #[test]
    fn test_data_after_eod_ignored() {
        assert_eq!(decode(b"48>65"), b"H");
    }

    #[test]
    fn test_garbage_bytes_skipped() {
        assert_eq!(decode(b"4!8@65>"), b"He");
    }

    #[test]
    fn test_empty() {
        assert_eq!(decode(b">"), b"");
        assert_eq!(decode(b""), b"");
    }
}
