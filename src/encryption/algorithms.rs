//! Key derivation and password authentication for the standard security
//! handler (PDF 32000-1:2008 section 7.6.3).
//!
//! Covers Algorithm 2 (file key from user password), Algorithm 3 (the /O
//! owner hash), and Algorithms 4/5 (the /U user hash for revisions 2 and 3).

use md5::{Digest, Md5};

use super::rc4::rc4_crypt;
use super::EncryptDict;

/// Standard 32-byte padding string from the PDF specification.
pub const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

/// Pad or truncate a password to exactly 32 bytes (Algorithm 2 step a).
pub fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    padded[len..].copy_from_slice(&PADDING[..32 - len]);
    padded
}

/// Algorithm 2: compute the file encryption key from the user password.
pub fn compute_encryption_key(password: &[u8], dict: &EncryptDict, file_id: &[u8]) -> Vec<u8> {
    let key_len = dict.key_length_bytes();

    let mut hasher = Md5::new();
    hasher.update(pad_password(password));
    hasher.update(&dict.owner_password);
    hasher.update(dict.permissions.to_le_bytes());
    hasher.update(file_id);
    let mut hash = hasher.finalize().to_vec();

    // Revision 3: re-hash the truncated key 50 times
    if dict.revision >= 3 {
        for _ in 0..50 {
            let mut hasher = Md5::new();
            hasher.update(&hash[..key_len]);
            hash = hasher.finalize().to_vec();
        }
    }

    hash.truncate(key_len);
    hash
}

/// Algorithm 3: compute the /O owner password hash.
///
/// Used when generating encrypted files; authentication only needs the
/// stored value.
pub fn compute_owner_hash(
    owner_password: &[u8],
    user_password: &[u8],
    revision: u32,
    key_len: usize,
) -> Vec<u8> {
    let mut hash = Md5::digest(pad_password(owner_password)).to_vec();
    if revision >= 3 {
        for _ in 0..50 {
            hash = Md5::digest(&hash).to_vec();
        }
    }
    let rc4_key = &hash[..key_len];

    let mut result = rc4_crypt(rc4_key, &pad_password(user_password));
    if revision >= 3 {
        for i in 1..=19u8 {
            let xored: Vec<u8> = rc4_key.iter().map(|b| b ^ i).collect();
            result = rc4_crypt(&xored, &result);
        }
    }
    result
}

/// Algorithm 4: the /U value for revision 2.
pub fn compute_user_hash_r2(key: &[u8]) -> Vec<u8> {
    rc4_crypt(key, &PADDING)
}

/// Algorithm 5: the /U value for revision 3 or greater.
///
/// Only the first 16 bytes are significant; the remaining 16 are arbitrary
/// and written as zeros here.
pub fn compute_user_hash_r3(key: &[u8], file_id: &[u8]) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(PADDING);
    hasher.update(file_id);
    let hash = hasher.finalize();

    let mut result = rc4_crypt(key, &hash);
    for i in 1..=19u8 {
        let xored: Vec<u8> = key.iter().map(|b| b ^ i).collect();
        result = rc4_crypt(&xored, &result);
    }

    result.extend_from_slice(&[0u8; 16]);
    result
}

/// Algorithm 6: check whether `password` is the document's user password.
///
/// Returns the file encryption key on success.
pub fn authenticate_user_password(
    password: &[u8],
    dict: &EncryptDict,
    file_id: &[u8],
) -> Option<Vec<u8>> {
    let key = compute_encryption_key(password, dict, file_id);

    let matches = if dict.revision == 2 {
        let expected = compute_user_hash_r2(&key);
        constant_time_compare(&expected, &dict.user_password)
    } else {
        // Revision 3: only the first 16 bytes are compared
        if dict.user_password.len() < 16 {
            return None;
        }
        let expected = compute_user_hash_r3(&key, file_id);
        constant_time_compare(&expected[..16], &dict.user_password[..16])
    };

    if matches {
        Some(key)
    } else {
        None
    }
}

/// Per-object key (Algorithm 1): the file key salted with the object and
/// generation numbers.
pub fn compute_object_key(base_key: &[u8], obj_num: u32, gen_num: u16) -> Vec<u8> {
    let mut hasher = Md5::new();
    hasher.update(base_key);
    hasher.update(&obj_num.to_le_bytes()[..3]);
    hasher.update(gen_num.to_le_bytes());
    let hash = hasher.finalize();

    let key_len = (base_key.len() + 5).min(16);
    hash[..key_len].to_vec()
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}
