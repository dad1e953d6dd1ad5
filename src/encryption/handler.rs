//! Document decryption handler.
//!
//! Owns the parsed /Encrypt dictionary and the derived file key, and
//! decrypts individual strings and streams on request. For the RC4
//! revisions supported here strings and streams use the same cipher, so a
//! single `decrypt` entry point serves both.

use log::debug;

use super::algorithms::{authenticate_user_password, compute_object_key};
use super::rc4::rc4_crypt;
use super::{Algorithm, EncryptDict};
use crate::error::{Error, Result};
use crate::object::Object;

/// Handles decryption for an encrypted document.
#[derive(Debug, Clone)]
pub struct EncryptionHandler {
    dict: EncryptDict,
    algorithm: Algorithm,
    file_id: Vec<u8>,
    /// Derived file key, set after successful authentication
    encryption_key: Option<Vec<u8>>,
}

impl EncryptionHandler {
    /// Create a handler from the trailer's /Encrypt object and the first
    /// element of the /ID array.
    ///
    /// Fails with `Error::Unsupported` for AES or revision 4+ documents.
    pub fn new(encrypt_obj: &Object, file_id: Vec<u8>) -> Result<Self> {
        let dict = EncryptDict::from_object(encrypt_obj)?;
        let algorithm = dict.algorithm()?;

        debug!(
            "Encrypted document: V={} R={} key={} bits",
            dict.version,
            dict.revision,
            dict.key_length_bytes() * 8
        );

        Ok(Self {
            dict,
            algorithm,
            file_id,
            encryption_key: None,
        })
    }

    /// Attempt to authenticate with a user password. An empty slice tries
    /// the default (blank) password most encrypted files use.
    ///
    /// Returns true and unlocks decryption on success.
    pub fn authenticate(&mut self, password: &[u8]) -> bool {
        match authenticate_user_password(password, &self.dict, &self.file_id) {
            Some(key) => {
                self.encryption_key = Some(key);
                true
            },
            None => false,
        }
    }

    /// Whether a password has been successfully authenticated.
    pub fn is_authenticated(&self) -> bool {
        self.encryption_key.is_some()
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// Decrypt string or stream data belonging to object `obj_num` /
    /// generation `gen_num`.
    pub fn decrypt(&self, data: &[u8], obj_num: u32, gen_num: u16) -> Result<Vec<u8>> {
        let base_key = self
            .encryption_key
            .as_ref()
            .ok_or(Error::PasswordIncorrect)?;
        let object_key = compute_object_key(base_key, obj_num, gen_num);
        Ok(rc4_crypt(&object_key, data))
    }
}
