//! ASCII85Decode filter.
//!
//! Groups of five base-85 characters become four bytes. `z` is shorthand
//! for four zero bytes, `~>` marks end of data, whitespace is ignored, and
//! a final partial group of n characters yields n-1 bytes.

use crate::decoders::{DecodeParams, StreamDecoder};
use crate::error::{Error, Result};

/// ASCII85Decode filter implementation.
pub struct Ascii85Decoder;

impl StreamDecoder for Ascii85Decoder {
    fn decode(&self, input: &[u8], _params: &DecodeParams) -> Result<Vec<u8>> {
        // Some producers emit the PostScript-style <~ leader.
        let input = input.strip_prefix(b"<~").unwrap_or(input);

        let mut output = Vec::with_capacity(input.len() * 4 / 5 + 4);
        let mut group = [0u8; 5];
        let mut group_len = 0usize;
        let mut iter = input.iter().peekable();

        while let Some(&byte) = iter.next() {
            match byte {
                b'~' => break, // `~>` end marker (the `>` may be missing)
                b'z' if group_len == 0 => {
                    output.extend_from_slice(&[0, 0, 0, 0]);
                }
                b'!'..=b'u' => {
                    group[group_len] = byte - b'!';
                    group_len += 1;
                    if group_len == 5 {
                        decode_group(&group, 5, &mut output)?;
                        group_len = 0;
                    }
                }
                b if crate::object::is_pdf_whitespace(b) => continue,
                other => {
                    return Err(Error::Decode(format!(
                        "invalid ASCII85 byte 0x{:02X}",
                        other
                    )))
                }
            }
        }

        // Final partial group: pad with 'u' (84) and drop the padding bytes.
        if group_len == 1 {
            return Err(Error::Decode("dangling single ASCII85 character".to_string()));
        }
        if group_len >= 2 {
            for slot in group.iter_mut().skip(group_len) {
                *slot = 84;
            }
            decode_group(&group, group_len, &mut output)?;
        }

        Ok(output)
    }

    fn name(&self) -> &str {
        "ASCII85Decode"
    }
}

fn decode_group(group: &[u8; 5], significant: usize, output: &mut Vec<u8>) -> Result<()> {
    let mut value: u64 = 0;
    for &digit in group.iter() {
        value = value * 85 + digit as u64;
    }
    if value > u32::MAX as u64 {
        return Err(Error::Decode("ASCII85 group overflows 32 bits".to_string()));
    }
    let bytes = (value as u32).to_be_bytes();
    output.extend_from_slice(&bytes[..significant - 1]);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode(input: &[u8]) -> Result<Vec<u8>> {
        Ascii85Decoder.decode(input, &DecodeParams::default())
    }

    #[test]
    fn test_full_group() {
        // "Hell" encodes to 87cUR
        assert_eq!(decode(b"87cUR~>").unwrap(), b"Hell");
    }

    #[test]
    fn test_partial_group() {
        // "Hello" = one full group + 2 bytes
        assert_eq!(decode(b"87cURDZ~>").unwrap(), b"Hello");
    }

    #[test]
    fn test_z_shorthand() {
        assert_eq!(decode(b"z~>").unwrap(), vec![0, 0, 0, 0]);
    }

    #[test]
    fn test_whitespace_ignored() {
        assert_eq!(decode(b"87c\n UR\t~>").unwrap(), b"Hell");
    }

    #[test]
    fn test_leader_accepted() {
        assert_eq!(decode(b"<~87cUR~>").unwrap(), b"Hell");
    }

    #[test]
    fn test_missing_end_marker() {
        assert_eq!(decode(b"87cUR").unwrap(), b"Hell");
    }

    #[test]
    fn test_empty() {
        assert_eq!(decode(b"~>").unwrap(), b"");
    }

    #[test]
    fn test_invalid_byte_is_error() {
        assert!(decode(b"87c\x7fUR~>").is_err());
    }

    #[test]
    fn test_round_trip_printable() {
        // Encode by hand: 4 bytes -> 5 digits base 85.
        let plain = b"Wikipedia";
        let mut encoded = Vec::new();
        for chunk in plain.chunks(4) {
            let mut padded = [0u8; 4];
            padded[..chunk.len()].copy_from_slice(chunk);
            let mut value = u32::from_be_bytes(padded) as u64;
            let mut digits = [0u8; 5];
            for slot in digits.iter_mut().rev() {
                *slot = (value % 85) as u8 + b'!';
                value /= 85;
            }
            encoded.extend_from_slice(&digits[..chunk.len() + 1]);
        }
        encoded.extend_from_slice(b"~>");
        assert_eq!(decode(&encoded).unwrap(), plain);
    }
}
