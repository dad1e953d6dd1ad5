//! PDF encryption support.
//!
//! Implements the standard security handler for RC4-encrypted documents
//! (V=1/R=2 with 40-bit keys, V=2/R=3 with up to 128-bit keys). Newer
//! AES-based revisions (V>=4) are detected and reported as
//! `Error::Unsupported` so callers can fail cleanly instead of producing
//! garbage.
//!
//! Decryption applies per object: the file key is derived once from the
//! password, then each string and stream is decrypted with an object-specific
//! key mixed from the object and generation numbers.

use crate::error::{Error, Result};
use crate::object::{Dict, Object};

pub mod algorithms;
mod handler;
mod rc4;

pub use handler::EncryptionHandler;
pub use rc4::rc4_crypt;

/// Encryption algorithm used in the PDF.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    /// RC4 with 40-bit key (V=1, R=2)
    Rc4_40,
    /// RC4 with up to 128-bit key (V=2, R=3)
    Rc4_128,
}

/// Parsed /Encrypt dictionary fields for the standard security handler.
#[derive(Debug, Clone)]
pub struct EncryptDict {
    /// Filter name (must be "Standard")
    pub filter: String,
    /// Algorithm version (V)
    pub version: u32,
    /// Key length in bits (Length), 40 by default
    pub length: Option<u32>,
    /// Revision number (R)
    pub revision: u32,
    /// Owner password hash (O), 32 bytes
    pub owner_password: Vec<u8>,
    /// User password hash (U), 32 bytes
    pub user_password: Vec<u8>,
    /// User access permissions (P)
    pub permissions: i32,
    /// Whether document metadata is encrypted (EncryptMetadata)
    pub encrypt_metadata: bool,
}

impl EncryptDict {
    /// Parse an encryption dictionary from a PDF object.
    pub fn from_object(obj: &Object) -> Result<Self> {
        let dict = obj
            .as_dict()
            .ok_or_else(|| Error::InvalidPdf("Encrypt entry is not a dictionary".to_string()))?;

        let filter = require_name(dict, "Filter")?.to_string();
        if filter != "Standard" {
            return Err(Error::Unsupported(format!(
                "Unsupported security handler: {}",
                filter
            )));
        }

        let version = require_int(dict, "V")? as u32;
        let revision = require_int(dict, "R")? as u32;
        let owner_password = require_string(dict, "O")?.to_vec();
        let user_password = require_string(dict, "U")?.to_vec();
        let permissions = require_int(dict, "P")? as i32;

        let length = dict
            .get_raw("Length")
            .and_then(Object::as_integer)
            .map(|l| l as u32);

        let encrypt_metadata = dict
            .get_raw("EncryptMetadata")
            .and_then(Object::as_bool)
            .unwrap_or(true);

        Ok(EncryptDict {
            filter,
            version,
            length,
            revision,
            owner_password,
            user_password,
            permissions,
            encrypt_metadata,
        })
    }

    /// Determine the encryption algorithm from V and R values.
    pub fn algorithm(&self) -> Result<Algorithm> {
        match (self.version, self.revision) {
            (1, 2) => Ok(Algorithm::Rc4_40),
            (2, 3) => Ok(Algorithm::Rc4_128),
            _ => Err(Error::Unsupported(format!(
                "Unsupported encryption version V={}, R={}",
                self.version, self.revision
            ))),
        }
    }

    /// Effective key length in bytes.
    pub fn key_length_bytes(&self) -> usize {
        match self.length {
            Some(length) => (length / 8) as usize,
            None => match self.version {
                1 => 5,
                _ => 16,
            },
        }
    }
}

fn require_name<'a>(dict: &'a Dict, key: &str) -> Result<&'a str> {
    dict.get_raw(key)
        .and_then(Object::as_name)
        .ok_or_else(|| Error::InvalidPdf(format!("Encrypt dictionary missing /{}", key)))
}

fn require_int(dict: &Dict, key: &str) -> Result<i64> {
    dict.get_raw(key)
        .and_then(Object::as_integer)
        .ok_or_else(|| Error::InvalidPdf(format!("Encrypt dictionary missing /{}", key)))
}

fn require_string<'a>(dict: &'a Dict, key: &str) -> Result<&'a [u8]> {
    dict.get_raw(key)
        .and_then(Object::as_string)
        .ok_or_else(|| Error::InvalidPdf(format!("Encrypt dictionary missing /{}", key)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn standard_encrypt_dict(version: i64, revision: i64) -> Object {
        let mut dict = Dict::new();
        dict.insert("Filter", Object::Name("Standard".to_string()));
        dict.insert("V", Object::Integer(version));
        dict.insert("R", Object::Integer(revision));
        dict.insert("O", Object::String(vec![0; 32]));
        dict.insert("U", Object::String(vec![0; 32]));
        dict.insert("P", Object::Integer(-44));
        Object::Dictionary(dict)
    }

    #[test]
    fn test_parse_standard_encrypt_dict() {
        let parsed = EncryptDict::from_object(&standard_encrypt_dict(1, 2)).unwrap();
        assert_eq!(parsed.version, 1);
        assert_eq!(parsed.revision, 2);
        assert_eq!(parsed.permissions, -44);
        assert!(parsed.encrypt_metadata);
        assert_eq!(parsed.algorithm().unwrap(), Algorithm::Rc4_40);
        assert_eq!(parsed.key_length_bytes(), 5);
    }

    #[test]
    fn test_aes_revision_is_unsupported() {
        let mut dict = Dict::new();
        dict.insert("Filter", Object::Name("Standard".to_string()));
        dict.insert("V", Object::Integer(4));
        dict.insert("R", Object::Integer(4));
        dict.insert("O", Object::String(vec![0; 32]));
        dict.insert("U", Object::String(vec![0; 32]));
        dict.insert("P", Object::Integer(-1));
        let parsed = EncryptDict::from_object(&Object::Dictionary(dict)).unwrap();
        assert!(matches!(parsed.algorithm(), Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_non_standard_filter_rejected() {
        let mut dict = Dict::new();
        dict.insert("Filter", Object::Name("PubSec".to_string()));
        let result = EncryptDict::from_object(&Object::Dictionary(dict));
        assert!(matches!(result, Err(Error::Unsupported(_))));
    }
}
