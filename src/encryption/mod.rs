//! PDF encryption support (Standard security handler, revisions 2-6).
//!
//! The encryption layer decorates the object store: every string and every
//! stream read passes through [`EncryptionHandler`] when the document
//! carries an `/Encrypt` dictionary. The file key is derived once at open;
//! per-object keys are derived from it and `(id, gen)`.
//!
//! Supported algorithms: RC4-40, RC4-128, AES-128 and AES-256 in CBC mode.

use crate::error::{Error, Result};
use crate::object::Object;

mod aes;
mod algorithms;
mod handler;
mod rc4;

pub use aes::{aes_cbc_decrypt, aes_cbc_encrypt};
pub use algorithms::{
    authenticate_aes256, authenticate_owner_password, authenticate_user_password,
    compute_file_key, compute_user_check, hash_r6, pad_password, PASSWORD_PAD,
};
pub use handler::{derive_object_key, EncryptionHandler};
pub use rc4::rc4_crypt;

/// Encryption algorithm selected by `/V` and `/R`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// RC4 with a 40-bit key (V=1, R=2)
    Rc4_40,
    /// RC4 with a key of up to 128 bits (V=2, R=3)
    Rc4_128,
    /// AES-128 in CBC mode (V=4, R=4)
    Aes128,
    /// AES-256 in CBC mode (V=5, R=5/6)
    Aes256,
}

impl Algorithm {
    /// Default key length in bytes.
    pub fn key_length(&self) -> usize {
        match self {
            Algorithm::Rc4_40 => 5,
            Algorithm::Rc4_128 => 16,
            Algorithm::Aes128 => 16,
            Algorithm::Aes256 => 32,
        }
    }

    /// True for the AES variants.
    pub fn is_aes(&self) -> bool {
        matches!(self, Algorithm::Aes128 | Algorithm::Aes256)
    }
}

bitflags::bitflags! {
    /// User access permissions from the `/P` entry (ISO 32000-1, Table 22).
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Permissions: u32 {
        /// Print the document
        const PRINT = 1 << 2;
        /// Modify contents
        const MODIFY = 1 << 3;
        /// Copy text and graphics
        const COPY = 1 << 4;
        /// Add or modify annotations
        const ANNOTATE = 1 << 5;
        /// Fill in form fields (R >= 3)
        const FILL_FORMS = 1 << 8;
        /// Extract for accessibility (R >= 3)
        const EXTRACT_ACCESSIBLE = 1 << 9;
        /// Assemble the document (R >= 3)
        const ASSEMBLE = 1 << 10;
        /// Print at full quality (R >= 3)
        const PRINT_HIGH_QUALITY = 1 << 11;
    }
}

impl Permissions {
    /// Interpret the signed `/P` value.
    pub fn from_p(p: i32) -> Self {
        Permissions::from_bits_truncate(p as u32)
    }
}

/// Parsed `/Encrypt` dictionary.
#[derive(Debug, Clone)]
pub struct EncryptDict {
    /// Security handler name (`Standard` is the only supported one)
    pub filter: String,
    /// Algorithm version `/V`
    pub version: u32,
    /// Revision `/R`
    pub revision: u32,
    /// Declared key length in bits `/Length`
    pub length: Option<u32>,
    /// Owner entry `/O` (32 bytes for R2-4, 48 for R5/6)
    pub owner_entry: Vec<u8>,
    /// User entry `/U`
    pub user_entry: Vec<u8>,
    /// Owner key blob `/OE` (R5/6)
    pub owner_key: Vec<u8>,
    /// User key blob `/UE` (R5/6)
    pub user_key: Vec<u8>,
    /// Permission bits `/P`
    pub permissions: i32,
    /// `/EncryptMetadata` (defaults true)
    pub encrypt_metadata: bool,
}

impl EncryptDict {
    /// Parse the `/Encrypt` dictionary object.
    pub fn from_object(obj: &Object) -> Result<Self> {
        let dict = obj
            .as_dict()
            .ok_or_else(|| Error::Crypto("/Encrypt is not a dictionary".to_string()))?;

        let filter = dict
            .get("Filter")
            .and_then(|o| o.as_name())
            .unwrap_or("Standard")
            .to_string();
        if filter != "Standard" {
            return Err(Error::Crypto(format!("unsupported security handler /{}", filter)));
        }

        let int = |key: &str| -> Option<i64> { dict.get(key).and_then(|o| o.as_integer()) };
        let bytes = |key: &str| -> Vec<u8> {
            dict.get(key)
                .and_then(|o| o.as_string())
                .map(|s| s.to_vec())
                .unwrap_or_default()
        };

        let version = int("V").unwrap_or(0).max(0) as u32;
        let revision = int("R")
            .ok_or_else(|| Error::Crypto("/Encrypt missing /R".to_string()))?
            .max(0) as u32;
        let permissions = int("P").unwrap_or(-1) as i32;

        Ok(EncryptDict {
            filter,
            version,
            revision,
            length: int("Length").map(|v| v.max(0) as u32),
            owner_entry: bytes("O"),
            user_entry: bytes("U"),
            owner_key: bytes("OE"),
            user_key: bytes("UE"),
            permissions,
            encrypt_metadata: dict
                .get("EncryptMetadata")
                .and_then(|o| o.as_bool())
                .unwrap_or(true),
        })
    }

    /// Map `/V`/`/R` to an algorithm.
    pub fn algorithm(&self) -> Result<Algorithm> {
        match (self.version, self.revision) {
            (1, 2) | (1, 3) => Ok(Algorithm::Rc4_40),
            (2, 2) | (2, 3) => Ok(Algorithm::Rc4_128),
            (4, 4) => Ok(Algorithm::Aes128),
            (5, 5) | (5, 6) => Ok(Algorithm::Aes256),
            (v, r) => Err(Error::Crypto(format!("unsupported encryption V={} R={}", v, r))),
        }
    }

    /// Effective key length in bytes.
    pub fn key_length_bytes(&self) -> usize {
        match self.length {
            Some(bits) if bits >= 40 => (bits as usize) / 8,
            _ => self
                .algorithm()
                .map(|a| a.key_length())
                .unwrap_or(16),
        }
    }
}

/// Build a `Dict`-backed `/Encrypt` object for tests.
#[cfg(test)]
pub(crate) fn encrypt_dict_object(version: i64, revision: i64, o: &[u8], u: &[u8], p: i32) -> Object {
    use crate::object::Dict;
    let mut dict = Dict::new();
    dict.insert("Filter".to_string(), Object::Name("Standard".to_string()));
    dict.insert("V".to_string(), Object::Integer(version));
    dict.insert("R".to_string(), Object::Integer(revision));
    dict.insert("O".to_string(), Object::String(o.to_vec()));
    dict.insert("U".to_string(), Object::String(u.to_vec()));
    dict.insert("P".to_string(), Object::Integer(p as i64));
    Object::Dictionary(dict)
}
