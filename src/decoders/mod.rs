//! Stream filter pipeline.
//!
//! A stream's `/Filter` entry names one or more decoders applied left to
//! right; `/DecodeParms` supplies per-filter parameters. Each decoder is a
//! whole-buffer transformer behind the [`StreamDecoder`] trait, so chunking
//! concerns never leak into filter logic — a chain always produces the same
//! bytes for the same input.
//!
//! Failure is soft at the chain boundary: an unsupported filter or a decode
//! error truncates the stream's output (possibly to nothing) instead of
//! failing the page. Decoders themselves return hard errors so tests and
//! the xref layer can distinguish.

use crate::error::{Error, Result};
use crate::object::{Dict, FilterStep};

mod ascii85;
mod ascii_hex;
mod ccitt;
mod flate;
mod jbig2;
mod lzw;
mod predictor;
mod runlength;

pub use ascii85::Ascii85Decoder;
pub use ascii_hex::AsciiHexDecoder;
pub use ccitt::CcittFaxDecoder;
pub use flate::FlateDecoder;
pub use jbig2::Jbig2Decoder;
pub use lzw::LzwDecoder;
pub use predictor::apply_predictor;
pub use runlength::RunLengthDecoder;

/// Cap on decoded output per filter application (decompression bombs).
pub const MAX_DECODED_BYTES: usize = 512 * 1024 * 1024;

/// Parameters from one `/DecodeParms` dictionary.
///
/// One struct covers every filter's knobs; each decoder reads the fields
/// it understands and ignores the rest.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeParams {
    /// Predictor algorithm: 1 = none, 2 = TIFF, 10-15 = PNG family
    pub predictor: i64,
    /// Samples per row
    pub columns: usize,
    /// Colour components per sample
    pub colors: usize,
    /// Bits per colour component
    pub bits_per_component: usize,
    /// LZW early code-width change (default 1, matching TIFF)
    pub early_change: bool,
    /// CCITT coding scheme: 0 = 1D, > 0 = mixed, < 0 = pure 2D (Group 4)
    pub k: i64,
    /// CCITT row count (0 = unbounded)
    pub rows: usize,
    /// CCITT: 1 bits are black when true
    pub black_is_1: bool,
    /// CCITT: rows are byte aligned
    pub encoded_byte_align: bool,
    /// CCITT: rows are prefixed with EOL codes
    pub end_of_line: bool,
    /// CCITT: data ends with an end-of-block pattern
    pub end_of_block: bool,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            predictor: 1,
            columns: 1,
            colors: 1,
            bits_per_component: 8,
            early_change: true,
            k: 0,
            rows: 0,
            black_is_1: false,
            encoded_byte_align: false,
            end_of_line: false,
            end_of_block: true,
        }
    }
}

impl DecodeParams {
    /// Read the recognised keys out of a `/DecodeParms` dictionary.
    pub fn from_dict(dict: &Dict) -> Self {
        let int = |key: &str, default: i64| -> i64 {
            dict.get(key).and_then(|o| o.as_integer()).unwrap_or(default)
        };
        let flag = |key: &str, default: bool| -> bool {
            dict.get(key).and_then(|o| o.as_bool()).unwrap_or(default)
        };
        // CCITT's /Columns defaults to 1728; predictors default to 1.
        // Using the larger default is harmless for predictors because they
        // only consult /Columns when /Predictor > 1 (which PDFs set
        // explicitly alongside /Columns).
        let columns_default = if dict.contains_key("K") { 1728 } else { 1 };
        Self {
            predictor: int("Predictor", 1),
            columns: int("Columns", columns_default).max(1) as usize,
            colors: int("Colors", 1).clamp(1, 64) as usize,
            bits_per_component: int("BitsPerComponent", 8).clamp(1, 32) as usize,
            early_change: int("EarlyChange", 1) != 0,
            k: int("K", 0),
            rows: int("Rows", 0).max(0) as usize,
            black_is_1: flag("BlackIs1", false),
            encoded_byte_align: flag("EncodedByteAlign", false),
            end_of_line: flag("EndOfLine", false),
            end_of_block: flag("EndOfBlock", true),
        }
    }
}

/// Whole-buffer stream decoder.
pub trait StreamDecoder {
    /// Decode `input`, honouring `params` where the filter has any.
    fn decode(&self, input: &[u8], params: &DecodeParams) -> Result<Vec<u8>>;

    /// Filter name as written in `/Filter`.
    fn name(&self) -> &str;
}

fn decoder_for(name: &str) -> Option<Box<dyn StreamDecoder>> {
    match name {
        "FlateDecode" | "Fl" => Some(Box::new(FlateDecoder)),
        "LZWDecode" | "LZW" => Some(Box::new(LzwDecoder)),
        "ASCII85Decode" | "A85" => Some(Box::new(Ascii85Decoder)),
        "ASCIIHexDecode" | "AHx" => Some(Box::new(AsciiHexDecoder)),
        "RunLengthDecode" | "RL" => Some(Box::new(RunLengthDecoder)),
        "CCITTFaxDecode" | "CCF" => Some(Box::new(CcittFaxDecoder)),
        "JBIG2Decode" => Some(Box::new(Jbig2Decoder)),
        _ => None,
    }
}

/// Run `data` through the whole filter chain.
///
/// `Crypt` is a pass-through (decryption happened at the object boundary);
/// `DCTDecode`/`JPXDecode` payloads are raw image codestreams that text
/// extraction skips, so they pass through untouched too. Unknown filters
/// and decode failures truncate softly.
pub fn decode_chain(data: &[u8], chain: &[FilterStep]) -> Result<Vec<u8>> {
    let mut current: Vec<u8> = data.to_vec();
    let default_params = DecodeParams::default();

    for step in chain {
        let params = step.params.as_ref().unwrap_or(&default_params);

        match step.name.as_str() {
            "Crypt" | "DCTDecode" | "DCT" | "JPXDecode" => continue,
            name => match decoder_for(name) {
                Some(decoder) => match decoder.decode(&current, params) {
                    Ok(output) => {
                        if output.len() > MAX_DECODED_BYTES {
                            log::warn!(
                                "{} output {} bytes exceeds cap, truncating stream",
                                name,
                                output.len()
                            );
                            return Ok(Vec::new());
                        }
                        current = output;
                    }
                    Err(e) => {
                        log::warn!("{} failed ({}), truncating stream output", name, e);
                        return Ok(Vec::new());
                    }
                },
                None => {
                    log::warn!("unsupported filter {}, truncating stream output", name);
                    return Ok(Vec::new());
                }
            },
        }

        // Predictors post-process Flate and LZW output.
        if params.predictor > 1 && matches!(step.name.as_str(), "FlateDecode" | "Fl" | "LZWDecode" | "LZW")
        {
            current = apply_predictor(&current, params)?;
        }
    }

    Ok(current)
}

/// Convenience for callers holding bare filter names.
pub fn decode_named(data: &[u8], names: &[&str]) -> Result<Vec<u8>> {
    let chain: Vec<FilterStep> = names
        .iter()
        .map(|n| FilterStep {
            name: n.to_string(),
            params: None,
        })
        .collect();
    decode_chain(data, &chain)
}

/// Hard-error variant used where an undecodable stream must fail loudly
/// (xref streams): unsupported filters and decoder failures propagate.
pub fn decode_chain_strict(data: &[u8], chain: &[FilterStep]) -> Result<Vec<u8>> {
    let mut current: Vec<u8> = data.to_vec();
    let default_params = DecodeParams::default();

    for step in chain {
        let params = step.params.as_ref().unwrap_or(&default_params);
        match step.name.as_str() {
            "Crypt" => continue,
            name => {
                let decoder =
                    decoder_for(name).ok_or_else(|| Error::UnsupportedFilter(name.to_string()))?;
                current = decoder.decode(&current, params)?;
            }
        }
        if params.predictor > 1 {
            current = apply_predictor(&current, params)?;
        }
    }
    Ok(current)
}
