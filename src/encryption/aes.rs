//! AES-CBC for PDF strings and streams.
//!
//! The wire format prefixes each ciphertext with a 16-byte IV. Decryption
//! is deliberately lenient, matching how widely-deployed readers behave on
//! malformed documents:
//!
//! - a ciphertext (minus IV) that is not a multiple of the block size is
//!   returned unchanged;
//! - PKCS#7 padding is stripped only when well formed (final byte in
//!   `1..=16` and the last `n` bytes all equal `n`); otherwise the raw
//!   decrypted bytes are returned.

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use aes::{Aes128, Aes256};

type Aes128CbcEnc = cbc::Encryptor<Aes128>;
type Aes128CbcDec = cbc::Decryptor<Aes128>;
type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Decrypt an IV-prefixed AES-CBC payload.
///
/// The cipher width follows the key: 16 bytes selects AES-128, 32 selects
/// AES-256. Anything unrecoverable (short data, bad key size, misaligned
/// ciphertext) returns the input unchanged — string decryption must never
/// fail a page.
pub fn aes_cbc_decrypt(key: &[u8], data: &[u8]) -> Vec<u8> {
    if data.len() < 16 {
        return data.to_vec();
    }
    let (iv, ciphertext) = data.split_at(16);
    if ciphertext.is_empty() {
        return Vec::new();
    }
    if ciphertext.len() % 16 != 0 {
        log::debug!("AES ciphertext length {} not block aligned, passing through", data.len());
        return data.to_vec();
    }

    let mut buffer = ciphertext.to_vec();
    let decrypted_ok = match key.len() {
        16 => Aes128CbcDec::new(key.into(), iv.into())
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .is_ok(),
        32 => Aes256CbcDec::new(key.into(), iv.into())
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .is_ok(),
        other => {
            log::warn!("unsupported AES key length {}", other);
            false
        }
    };
    if !decrypted_ok {
        return data.to_vec();
    }

    strip_pkcs7(buffer)
}

/// Encrypt with AES-CBC, prefixing the given IV and adding PKCS#7 padding.
///
/// Exercised by the round-trip invariants in the tests; extraction itself
/// only decrypts.
pub fn aes_cbc_encrypt(key: &[u8], iv: &[u8; 16], data: &[u8]) -> Option<Vec<u8>> {
    let pad = 16 - data.len() % 16;
    let mut buffer = Vec::with_capacity(16 + data.len() + pad);
    buffer.extend_from_slice(iv);
    buffer.extend_from_slice(data);
    buffer.extend(std::iter::repeat(pad as u8).take(pad));

    let len = buffer.len() - 16;
    let body = &mut buffer[16..];
    match key.len() {
        16 => Aes128CbcEnc::new(key.into(), iv.into())
            .encrypt_padded_mut::<NoPadding>(body, len)
            .ok()?,
        32 => Aes256CbcEnc::new(key.into(), iv.into())
            .encrypt_padded_mut::<NoPadding>(body, len)
            .ok()?,
        _ => return None,
    };
    Some(buffer)
}

/// AES-CBC without the IV prefix and without padding, used by key
/// derivation (R5/6 intermediate keys, the R6 hash) where the standard
/// fixes a zero IV and exact block counts.
pub fn aes_cbc_no_padding(key: &[u8], iv: &[u8; 16], data: &[u8], encrypt: bool) -> Option<Vec<u8>> {
    if data.len() % 16 != 0 {
        return None;
    }
    let mut buffer = data.to_vec();
    let len = buffer.len();
    match (key.len(), encrypt) {
        (16, true) => Aes128CbcEnc::new(key.into(), iv.into())
            .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
            .ok()?,
        (16, false) => Aes128CbcDec::new(key.into(), iv.into())
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .ok()?,
        (32, true) => Aes256CbcEnc::new(key.into(), iv.into())
            .encrypt_padded_mut::<NoPadding>(&mut buffer, len)
            .ok()?,
        (32, false) => Aes256CbcDec::new(key.into(), iv.into())
            .decrypt_padded_mut::<NoPadding>(&mut buffer)
            .ok()?,
        _ => return None,
    };
    Some(buffer)
}

fn strip_pkcs7(mut buffer: Vec<u8>) -> Vec<u8> {
    let len = buffer.len();
    if len == 0 {
        return buffer;
    }
    let pad = buffer[len - 1] as usize;
    if (1..=16).contains(&pad) && pad <= len && buffer[len - pad..].iter().all(|&b| b == pad as u8)
    {
        buffer.truncate(len - pad);
    } else {
        log::debug!("malformed PKCS#7 padding, keeping raw decrypted bytes");
    }
    buffer
}
