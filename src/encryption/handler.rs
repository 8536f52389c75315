//! Document-level encryption state.
//!
//! [`EncryptionHandler`] owns the file encryption key (derived once at
//! open) and decrypts strings and streams on behalf of the object store.

use super::{aes, algorithms, rc4, Algorithm, EncryptDict, Permissions};
use crate::error::{Error, Result};
use crate::object::Object;
use md5::{Digest, Md5};

/// Derive the per-object key from the file key and `(id, gen)`.
///
/// `MD5(fileKey || id[0..3] || gen[0..2])`, with the salt literal appended
/// for AES variants (`"sAlT"` for AES-128, `"AESsalT"` for AES-256), the
/// result truncated to `min(16, fileKeyLen + 5)` bytes. Identical inputs
/// always produce identical keys.
pub fn derive_object_key(file_key: &[u8], id: u32, gen: u16, algorithm: Algorithm) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(file_key);
    hasher.update(&id.to_le_bytes()[..3]);
    hasher.update(&gen.to_le_bytes()[..2]);
    match algorithm {
        Algorithm::Aes128 => hasher.update(b"sAlT"),
        Algorithm::Aes256 => hasher.update(b"AESsalT"),
        _ => {}
    }
    let hash = hasher.finalize();
    let key_len = (file_key.len() + 5).min(16);
    hash[..key_len].to_vec()
}

/// Authenticated encryption state for one document.
#[derive(Debug, Clone)]
pub struct EncryptionHandler {
    dict: EncryptDict,
    algorithm: Algorithm,
    file_key: Vec<u8>,
}

impl EncryptionHandler {
    /// Build a handler from the `/Encrypt` object and the first `/ID`
    /// element, authenticating `password` (empty for the default).
    ///
    /// Fails with [`Error::Crypto`] on an unsupported revision or a wrong
    /// password — both surface at document open.
    pub fn open(encrypt_obj: &Object, file_id: &[u8], password: &[u8]) -> Result<Self> {
        let dict = EncryptDict::from_object(encrypt_obj)?;
        let algorithm = dict.algorithm()?;
        log::info!(
            "document encrypted with {:?} (V={}, R={})",
            algorithm,
            dict.version,
            dict.revision
        );

        let file_key = match algorithm {
            Algorithm::Aes256 => algorithms::authenticate_aes256(
                password,
                &dict.user_entry,
                &dict.owner_entry,
                &dict.user_key,
                &dict.owner_key,
                dict.revision,
            ),
            _ => algorithms::authenticate_user_password(
                password,
                &dict.user_entry,
                &dict.owner_entry,
                dict.permissions,
                file_id,
                dict.revision,
                dict.key_length_bytes(),
                dict.encrypt_metadata,
            )
            .or_else(|| {
                algorithms::authenticate_owner_password(
                    password,
                    &dict.user_entry,
                    &dict.owner_entry,
                    dict.permissions,
                    file_id,
                    dict.revision,
                    dict.key_length_bytes(),
                    dict.encrypt_metadata,
                )
            }),
        }
        .ok_or_else(|| Error::Crypto("password authentication failed".to_string()))?;

        Ok(Self {
            dict,
            algorithm,
            file_key,
        })
    }

    /// Build a handler directly from a known file key (tests, tooling).
    pub fn from_key(file_key: Vec<u8>, algorithm: Algorithm) -> Self {
        Self {
            dict: EncryptDict {
                filter: "Standard".to_string(),
                version: 0,
                revision: 0,
                length: None,
                owner_entry: Vec::new(),
                user_entry: Vec::new(),
                owner_key: Vec::new(),
                user_key: Vec::new(),
                permissions: -1,
                encrypt_metadata: true,
            },
            algorithm,
            file_key,
        }
    }

    /// The negotiated algorithm.
    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Whether the Metadata stream is encrypted too.
    pub fn encrypt_metadata(&self) -> bool {
        self.dict.encrypt_metadata
    }

    /// User permissions from `/P`.
    pub fn permissions(&self) -> Permissions {
        Permissions::from_p(self.dict.permissions)
    }

    /// Decrypt stream bytes belonging to object `(id, gen)`.
    pub fn decrypt_stream(&self, data: &[u8], id: u32, gen: u16) -> Result<Vec<u8>> {
        let key = derive_object_key(&self.file_key, id, gen, self.algorithm);
        Ok(match self.algorithm {
            Algorithm::Rc4_40 | Algorithm::Rc4_128 => rc4::rc4_crypt(&key, data),
            Algorithm::Aes128 | Algorithm::Aes256 => aes::aes_cbc_decrypt(&key, data),
        })
    }

    /// Decrypt string bytes belonging to object `(id, gen)`.
    ///
    /// Strings use the same per-object key and cipher as streams.
    pub fn decrypt_string(&self, data: &[u8], id: u32, gen: u16) -> Result<Vec<u8>> {
        self.decrypt_stream(data, id, gen)
    }

    /// Encrypt bytes for object `(id, gen)` — the inverse used by the
    /// round-trip invariants. For AES `iv` seeds the wire format.
    pub fn encrypt_with_iv(&self, data: &[u8], id: u32, gen: u16, iv: &[u8; 16]) -> Vec<u8> {
        let key = derive_object_key(&self.file_key, id, gen, self.algorithm);
        match self.algorithm {
            Algorithm::Rc4_40 | Algorithm::Rc4_128 => rc4::rc4_crypt(&key, data),
            Algorithm::Aes128 | Algorithm::Aes256 => {
                aes::aes_cbc_encrypt(&key, iv, data).unwrap_or_else(|| data.to_vec())
            }
        }
    }
}
