//! LZWDecode filter.
//!
//! Variable-width LZW as PDF specifies it: MSB-first bit order, 9-bit
//! codes growing to 12, clear code 256, EOD 257, and `EarlyChange=1` by
//! default (the code width grows one code earlier than vanilla LZW).
//!
//! The `weezl` decoder handles the default case; a local decoder covers
//! `EarlyChange=0` and the malformed tails weezl rejects outright.

use crate::decoders::{DecodeParams, StreamDecoder};
use crate::error::{Error, Result};

const CLEAR_CODE: u16 = 256;
const EOD_CODE: u16 = 257;
const FIRST_CODE: u16 = 258;
const MAX_CODE_BITS: u32 = 12;

/// LZWDecode filter implementation.
pub struct LzwDecoder;

impl StreamDecoder for LzwDecoder {
    fn decode(&self, input: &[u8], params: &DecodeParams) -> Result<Vec<u8>> {
        if params.early_change {
            if let Ok(output) = decode_weezl(input) {
                return Ok(output);
            }
        }
        decode_local(input, params.early_change)
    }

    fn name(&self) -> &str {
        "LZWDecode"
    }
}

fn decode_weezl(input: &[u8]) -> Result<Vec<u8>> {
    use weezl::{decode::Decoder, BitOrder};
    // The TIFF size switch is exactly PDF's EarlyChange=1 behaviour.
    let mut decoder = Decoder::with_tiff_size_switch(BitOrder::Msb, 8);
    decoder
        .decode(input)
        .map_err(|e| Error::Decode(format!("LZWDecode: {:?}", e)))
}

fn decode_local(input: &[u8], early_change: bool) -> Result<Vec<u8>> {
    let mut output = Vec::with_capacity(input.len() * 3);
    let mut table = SymbolTable::new();
    let mut code_bits: u32 = 9;
    let mut reader = MsbBitReader::new(input);
    let mut prev: Option<u16> = None;

    loop {
        let code = match reader.read_bits(code_bits) {
            Some(c) => c as u16,
            None => break,
        };

        if code == EOD_CODE {
            break;
        }
        if code == CLEAR_CODE {
            table.reset();
            code_bits = 9;
            prev = None;
            continue;
        }

        let entry = match table.expand(code, prev) {
            Some(e) => e,
            None => {
                // Out-of-range code: treat as a truncated stream.
                log::debug!("LZW code {} out of table range, truncating", code);
                break;
            }
        };
        output.extend_from_slice(&entry);

        if let Some(prev_code) = prev {
            table.append(prev_code, entry[0]);
        }
        prev = Some(code);

        // Grow the code width; EarlyChange switches one code sooner.
        let threshold = (1u32 << code_bits) - if early_change { 1 } else { 0 };
        if code_bits < MAX_CODE_BITS && table.next_code() as u32 >= threshold {
            code_bits += 1;
        }
    }

    Ok(output)
}

/// Dictionary of decoded strings, indexed by code.
struct SymbolTable {
    entries: Vec<Vec<u8>>,
}

impl SymbolTable {
    fn new() -> Self {
        let mut table = Self { entries: Vec::with_capacity(4096) };
        table.reset();
        table
    }

    fn reset(&mut self) {
        self.entries.clear();
        for b in 0u16..=255 {
            self.entries.push(vec![b as u8]);
        }
        // Placeholders for the clear and EOD codes.
        self.entries.push(Vec::new());
        self.entries.push(Vec::new());
    }

    fn next_code(&self) -> u16 {
        self.entries.len() as u16
    }

    /// String for `code`, handling the `code == next` self-reference case
    /// (previous string plus its own first byte).
    fn expand(&self, code: u16, prev: Option<u16>) -> Option<Vec<u8>> {
        let next = self.next_code();
        if code < next && code != CLEAR_CODE && code != EOD_CODE {
            Some(self.entries[code as usize].clone())
        } else if code == next {
            let prev_entry = &self.entries[prev? as usize];
            let mut s = prev_entry.clone();
            s.push(prev_entry[0]);
            Some(s)
        } else {
            None
        }
    }

    fn append(&mut self, prev: u16, first_byte: u8) {
        if self.entries.len() < (1 << MAX_CODE_BITS) {
            let mut entry = self.entries[prev as usize].clone();
            entry.push(first_byte);
            self.entries.push(entry);
        }
    }
}

struct MsbBitReader<'a> {
    data: &'a [u8],
    bit_pos: usize,
}

impl<'a> MsbBitReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, bit_pos: 0 }
    }

    fn read_bits(&mut self, n: u32) -> Option<u32> {
        let end = self.bit_pos.checked_add(n as usize)?;
        if end > self.data.len() * 8 {
            return None;
        }
        let mut value = 0u32;
        for _ in 0..n {
            let byte = self.data[self.bit_pos / 8];
            let bit = (byte >> (7 - (self.bit_pos % 8))) & 1;
            value = (value << 1) | bit as u32;
            self.bit_pos += 1;
        }
        Some(value)
    }
}
