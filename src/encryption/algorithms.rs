//! Standard security handler key derivation and password authentication.
//!
//! Revisions 2-4 follow the MD5/RC4 lineage (ISO 32000-1 algorithms 2, 4,
//! 5 and 7); revisions 5 and 6 are the SHA-2 family, with the revision 6
//! hardened hash. Everything here is pure: bytes in, bytes out.

use super::aes::aes_cbc_no_padding;
use super::rc4::rc4_crypt;
use md5::{Digest, Md5};
use sha2::{Sha256, Sha384, Sha512};

/// Standard 32-byte password padding (ISO 32000-1, Table 21 lineage).
pub const PASSWORD_PAD: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01,
    0x08, 0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53,
    0x69, 0x7A,
];

/// Pad or truncate a password to exactly 32 bytes.
pub fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let n = password.len().min(32);
    padded[..n].copy_from_slice(&password[..n]);
    padded[n..].copy_from_slice(&PASSWORD_PAD[..32 - n]);
    padded
}

/// Algorithm 2: derive the file encryption key for revisions 2-4.
#[allow(clippy::too_many_arguments)]
pub fn compute_file_key(
    password: &[u8],
    owner_hash: &[u8],
    permissions: i32,
    file_id: &[u8],
    revision: u32,
    key_length: usize,
    encrypt_metadata: bool,
) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(pad_password(password));
    hasher.update(owner_hash);
    hasher.update(permissions.to_le_bytes());
    hasher.update(file_id);
    if revision >= 4 && !encrypt_metadata {
        hasher.update([0xFF, 0xFF, 0xFF, 0xFF]);
    }
    let mut hash = hasher.finalize().to_vec();

    let key_length = key_length.clamp(5, 16);
    if revision >= 3 {
        for _ in 0..50 {
            let mut rehash = Md5::new();
            rehash.update(&hash[..key_length]);
            hash = rehash.finalize().to_vec();
        }
    }
    hash.truncate(key_length);
    hash
}

/// Algorithm 4/5 check value: what `/U` should contain for a given key.
pub fn compute_user_check(key: &[u8], file_id: &[u8], revision: u32) -> Vec<u8> {
    if revision == 2 {
        return rc4_crypt(key, &PASSWORD_PAD);
    }
    // R3/4: MD5(pad || id), RC4 once, then 19 passes with key XOR i.
    let mut hasher = Md5::new();
    hasher.update(PASSWORD_PAD);
    hasher.update(file_id);
    let mut value = rc4_crypt(key, &hasher.finalize());
    for i in 1..=19u8 {
        let xored: Vec<u8> = key.iter().map(|&b| b ^ i).collect();
        value = rc4_crypt(&xored, &value);
    }
    value
}

/// Authenticate a user password for revisions 2-4.
///
/// Returns the file encryption key on success. Revision 3/4 documents only
/// store 16 significant bytes of `/U`, so only those are compared.
#[allow(clippy::too_many_arguments)]
pub fn authenticate_user_password(
    password: &[u8],
    user_hash: &[u8],
    owner_hash: &[u8],
    permissions: i32,
    file_id: &[u8],
    revision: u32,
    key_length: usize,
    encrypt_metadata: bool,
) -> Option<Vec<u8>> {
    let key = compute_file_key(
        password,
        owner_hash,
        permissions,
        file_id,
        revision,
        key_length,
        encrypt_metadata,
    );
    let check = compute_user_check(&key, file_id, revision);

    let matches = if revision == 2 {
        user_hash.len() >= 32 && check[..32] == user_hash[..32]
    } else {
        user_hash.len() >= 16 && check[..16] == user_hash[..16]
    };
    if matches {
        Some(key)
    } else {
        None
    }
}

/// Algorithm 7 setup: recover the user password from `/O` with the owner
/// password, then authenticate it. Returns the file key on success.
#[allow(clippy::too_many_arguments)]
pub fn authenticate_owner_password(
    password: &[u8],
    user_hash: &[u8],
    owner_hash: &[u8],
    permissions: i32,
    file_id: &[u8],
    revision: u32,
    key_length: usize,
    encrypt_metadata: bool,
) -> Option<Vec<u8>> {
    let key_length = key_length.clamp(5, 16);
    let mut hash = Md5::digest(pad_password(password)).to_vec();
    if revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash[..key_length]).to_vec();
        }
    }
    let rc4_key = &hash[..key_length];

    let mut user_password = owner_hash.to_vec();
    if revision == 2 {
        user_password = rc4_crypt(rc4_key, &user_password);
    } else {
        for i in (0..=19u8).rev() {
            let xored: Vec<u8> = rc4_key.iter().map(|&b| b ^ i).collect();
            user_password = rc4_crypt(&xored, &user_password);
        }
    }

    authenticate_user_password(
        &user_password,
        user_hash,
        owner_hash,
        permissions,
        file_id,
        revision,
        key_length,
        encrypt_metadata,
    )
}

/// Revision 6 hardened hash (ISO 32000-2, algorithm 2.B).
///
/// `extra` is empty for user-password hashing and the 48-byte `/U` entry
/// when hashing an owner password.
pub fn hash_r6(password: &[u8], salt: &[u8], extra: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::new();
    hasher.update(password);
    hasher.update(salt);
    hasher.update(extra);
    let mut k: Vec<u8> = hasher.finalize().to_vec();

    let mut round = 0usize;
    loop {
        // K1 = (password || K || extra) repeated 64 times; the repeat
        // count keeps the length a block multiple for the raw CBC pass.
        let mut unit = Vec::with_capacity(password.len() + k.len() + extra.len());
        unit.extend_from_slice(password);
        unit.extend_from_slice(&k);
        unit.extend_from_slice(extra);
        let mut k1 = Vec::with_capacity(unit.len() * 64);
        for _ in 0..64 {
            k1.extend_from_slice(&unit);
        }

        let aes_key = &k[..16];
        let mut iv = [0u8; 16];
        iv.copy_from_slice(&k[16..32]);
        let e = match aes_cbc_no_padding(aes_key, &iv, &k1, true) {
            Some(e) => e,
            None => return k, // unreachable for well-formed K1
        };

        let selector: u32 = e[..16].iter().map(|&b| b as u32).sum();
        k = match selector % 3 {
            0 => Sha256::digest(&e).to_vec(),
            1 => Sha384::digest(&e).to_vec(),
            _ => Sha512::digest(&e).to_vec(),
        };

        round += 1;
        if round >= 64 && (*e.last().unwrap_or(&0) as usize) <= round - 32 {
            return k;
        }
    }
}

/// Authenticate a password for revisions 5/6 and recover the 32-byte file
/// key from `/UE` / `/OE`.
///
/// `/U` and `/O` are 48 bytes: 32-byte hash, 8-byte validation salt,
/// 8-byte key salt.
pub fn authenticate_aes256(
    password: &[u8],
    user_entry: &[u8],
    owner_entry: &[u8],
    user_key: &[u8],
    owner_key: &[u8],
    revision: u32,
) -> Option<Vec<u8>> {
    // ISO 32000-2 truncates passwords at 127 bytes of UTF-8.
    let password = &password[..password.len().min(127)];

    let hash_with = |salt: &[u8], extra: &[u8]| -> Vec<u8> {
        if revision == 6 {
            hash_r6(password, salt, extra)
        } else {
            let mut hasher = Sha256::new();
            hasher.update(password);
            hasher.update(salt);
            hasher.update(extra);
            hasher.finalize().to_vec()
        }
    };

    // User password path.
    if user_entry.len() >= 48 {
        let (hash, salts) = user_entry.split_at(32);
        let (validation_salt, key_salt) = salts.split_at(8);
        if hash_with(validation_salt, &[]) == hash {
            let intermediate = hash_with(key_salt, &[]);
            let iv = [0u8; 16];
            if user_key.len() == 32 {
                return aes_cbc_no_padding(&intermediate, &iv, user_key, false);
            }
        }
    }

    // Owner password path: the hash mixes in the full 48-byte /U entry.
    if owner_entry.len() >= 48 && user_entry.len() >= 48 {
        let (hash, salts) = owner_entry.split_at(32);
        let (validation_salt, key_salt) = salts.split_at(8);
        if hash_with(validation_salt, &user_entry[..48]) == hash {
            let intermediate = hash_with(key_salt, &user_entry[..48]);
            let iv = [0u8; 16];
            if owner_key.len() == 32 {
                return aes_cbc_no_padding(&intermediate, &iv, owner_key, false);
            }
        }
    }

    None
}
