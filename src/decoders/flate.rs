//! FlateDecode (zlib/deflate).
//!
//! The workhorse filter, present in the vast majority of real documents —
//! and the one most often corrupt. Recovery ladder, in order:
//!
//! 1. standard zlib; partial output before a corruption is kept;
//! 2. raw deflate (producers that dropped the zlib wrapper);
//! 3. deflate after skipping a corrupt two-byte zlib header;
//! 4. zlib after patching an invalid compression-method nibble.
//!
//! A stream that yields nothing on every rung is a hard error; the chain
//! layer turns that into soft truncation for content streams.

use crate::decoders::{DecodeParams, StreamDecoder};
use crate::error::{Error, Result};
use flate2::read::{DeflateDecoder, ZlibDecoder};
use std::io::Read;

/// FlateDecode filter implementation.
pub struct FlateDecoder;

impl StreamDecoder for FlateDecoder {
    fn decode(&self, input: &[u8], _params: &DecodeParams) -> Result<Vec<u8>> {
        let mut output = Vec::new();

        match ZlibDecoder::new(input).read_to_end(&mut output) {
            Ok(_) => return Ok(output),
            Err(e) => {
                if !output.is_empty() {
                    log::warn!(
                        "FlateDecode partial recovery: kept {} bytes before corruption ({})",
                        output.len(),
                        e
                    );
                    return Ok(output);
                }
            }
        }

        // Raw deflate without the zlib wrapper.
        output.clear();
        match DeflateDecoder::new(input).read_to_end(&mut output) {
            Ok(_) if !output.is_empty() => {
                log::info!("FlateDecode recovered via raw deflate: {} bytes", output.len());
                return Ok(output);
            }
            Err(_) if !output.is_empty() => {
                log::warn!("raw deflate partial recovery: {} bytes", output.len());
                return Ok(output);
            }
            _ => {}
        }

        // Valid deflate behind a corrupt zlib header.
        if input.len() > 2 {
            output.clear();
            match DeflateDecoder::new(&input[2..]).read_to_end(&mut output) {
                Ok(_) if !output.is_empty() => {
                    log::info!("FlateDecode recovered after skipping header: {} bytes", output.len());
                    return Ok(output);
                }
                Err(_) if !output.is_empty() => {
                    log::warn!("header-skip partial recovery: {} bytes", output.len());
                    return Ok(output);
                }
                _ => {}
            }
        }

        // Patch an invalid compression-method nibble and retry zlib.
        if input.len() >= 2 && input[0] & 0x0F != 8 {
            let mut patched = input.to_vec();
            patched[0] = (input[0] & 0xF0) | 0x08;
            output.clear();
            match ZlibDecoder::new(&patched[..]).read_to_end(&mut output) {
                Ok(_) if !output.is_empty() => {
                    log::info!("FlateDecode recovered via header patch: {} bytes", output.len());
                    return Ok(output);
                }
                Err(_) if !output.is_empty() => {
                    log::warn!("header-patch partial recovery: {} bytes", output.len());
                    return Ok(output);
                }
                _ => {}
            }
        }

        Err(Error::Decode(format!(
            "FlateDecode: no recovery strategy produced output ({} input bytes)",
            input.len()
        )))
    }

    fn name(&self) -> &str {
        "FlateDecode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::ZlibEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn compress(data: &[u8]) -> Vec<u8> {
        let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(data).unwrap();
        encoder.finish().unwrap()
    }

    fn decode(input: &[u8]) -> Result<Vec<u8>> {
        FlateDecoder.decode(input, &DecodeParams::default())
    }

    #[test]
    fn test_round_trip() {
        let original = b"Hello, FlateDecode!";
        assert_eq!(decode(&compress(original)).unwrap(), original);
    }

    #[test]
    fn test_round_trip_large() {
        let original = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ".repeat(1000);
        assert_eq!(decode(&compress(&original)).unwrap(), original);
    }

    #[test]
    fn test_empty_round_trip() {
        assert_eq!(decode(&compress(b"")).unwrap(), b"");
    }

    #[test]
    fn test_raw_deflate_recovery() {
        use flate2::write::DeflateEncoder;
        let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"wrapperless stream").unwrap();
        let raw = encoder.finish().unwrap();
        assert_eq!(decode(&raw).unwrap(), b"wrapperless stream");
    }

    #[test]
    fn test_corrupt_header_patch_recovery() {
        let mut data = compress(b"patched header survives");
        data[0] = (data[0] & 0xF0) | 0x03; // invalid compression method
        assert_eq!(decode(&data).unwrap(), b"patched header survives");
    }

    #[test]
    fn test_truncated_stream_keeps_prefix() {
        let full = compress(&b"A".repeat(10_000));
        let truncated = &full[..full.len() / 2];
        let out = decode(truncated).unwrap();
        assert!(!out.is_empty());
        assert!(out.iter().all(|&b| b == b'A'));
    }

    #[test]
    fn test_garbage_is_error() {
        assert!(decode(b"This is not zlib compressed data").is_err());
    }

    #[test]
    fn test_name() {
        assert_eq!(FlateDecoder.name(), "FlateDecode");
    }
}
