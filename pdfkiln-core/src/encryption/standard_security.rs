//! Standard security handler, revisions 2 and 3 (ISO 32000-1 §7.6.3)

#![allow(clippy::needless_range_loop)]

use super::permissions::Permissions;
use super::rc4::rc4;
use crate::error::{PdfError, Result};
use lopdf::{Dictionary, Object, ObjectId, StringFormat};
use serde::{Deserialize, Serialize};

/// Padding used in password processing
const PADDING: [u8; 32] = [
    0x28, 0xBF, 0x4E, 0x5E, 0x4E, 0x75, 0x8A, 0x41, 0x64, 0x00, 0x4E, 0x56, 0xFF, 0xFA, 0x01, 0x08,
    0x2E, 0x2E, 0x00, 0xB6, 0xD0, 0x68, 0x3E, 0x80, 0x2F, 0x0C, 0xA9, 0xFE, 0x64, 0x53, 0x69, 0x7A,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Serialize, Deserialize)]
pub enum EncryptionMethod {
    /// Revision 2, 40-bit key
    Rc4_40,
    /// Revision 3, 128-bit key
    Rc4_128,
}

impl Default for EncryptionMethod {
    fn default() -> Self {
        EncryptionMethod::Rc4_128
    }
}

/// Which password unlocked the document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuthResult {
    Denied,
    User,
    Owner,
}

impl AuthResult {
    pub fn is_granted(self) -> bool {
        self != AuthResult::Denied
    }
}

/// Parameters of one standard-security encryption dictionary
#[derive(Debug, Clone)]
pub struct SecurityHandler {
    revision: u8,
    key_length: usize,
    owner_entry: Vec<u8>,
    user_entry: Vec<u8>,
    permissions: Permissions,
    file_id: Vec<u8>,
}

impl SecurityHandler {
    /// Derive `/O` and `/U` for a new encryption dictionary
    pub fn create(
        method: EncryptionMethod,
        owner_password: &str,
        user_password: &str,
        permissions: Permissions,
        file_id: Vec<u8>,
    ) -> Self {
        let (revision, key_length) = match method {
            EncryptionMethod::Rc4_40 => (2, 5),
            EncryptionMethod::Rc4_128 => (3, 16),
        };
        // An empty owner password falls back to the user password
        let owner_password = if owner_password.is_empty() {
            user_password
        } else {
            owner_password
        };

        let mut handler = Self {
            revision,
            key_length,
            owner_entry: Vec::new(),
            user_entry: Vec::new(),
            permissions,
            file_id,
        };
        handler.owner_entry = handler.compute_owner_entry(
            &pad_password(owner_password.as_bytes()),
            &pad_password(user_password.as_bytes()),
        );
        let key = handler.compute_key(&pad_password(user_password.as_bytes()));
        handler.user_entry = handler.compute_user_entry(&key);
        handler
    }

    /// Read an existing `/Encrypt` dictionary
    pub fn from_dictionary(dict: &Dictionary, file_id: Vec<u8>) -> Result<Self> {
        let filter = dict
            .get(b"Filter")
            .ok()
            .and_then(crate::objects::name_of)
            .unwrap_or_default();
        if filter != "Standard" {
            return Err(PdfError::Encryption(format!(
                "unsupported security handler /{filter}"
            )));
        }

        let revision = dict
            .get(b"R")
            .and_then(Object::as_i64)
            .map_err(|_| PdfError::Encryption("missing /R".to_string()))?;
        let version = dict.get(b"V").and_then(Object::as_i64).unwrap_or(0);
        if !(2..=3).contains(&revision) || version > 2 {
            return Err(PdfError::Encryption(format!(
                "unsupported encryption V{version} R{revision}"
            )));
        }

        let key_length = if revision == 2 {
            5
        } else {
            let bits = dict.get(b"Length").and_then(Object::as_i64).unwrap_or(40);
            (bits / 8).clamp(5, 16) as usize
        };
        let string_entry = |key: &[u8]| -> Result<Vec<u8>> {
            match dict.get(key) {
                Ok(Object::String(bytes, _)) => Ok(bytes.clone()),
                _ => Err(PdfError::Encryption(format!(
                    "missing /{}",
                    String::from_utf8_lossy(key)
                ))),
            }
        };
        let p = dict
            .get(b"P")
            .and_then(Object::as_i64)
            .map_err(|_| PdfError::Encryption("missing /P".to_string()))?;

        Ok(Self {
            revision: revision as u8,
            key_length,
            owner_entry: string_entry(b"O")?,
            user_entry: string_entry(b"U")?,
            permissions: Permissions::from_p_value(p),
            file_id,
        })
    }

    pub fn to_dictionary(&self) -> Dictionary {
        let mut dict = Dictionary::new();
        dict.set("Filter", Object::Name(b"Standard".to_vec()));
        dict.set("V", Object::Integer(if self.revision == 2 { 1 } else { 2 }));
        dict.set("R", Object::Integer(self.revision as i64));
        dict.set("Length", Object::Integer((self.key_length * 8) as i64));
        dict.set(
            "O",
            Object::String(self.owner_entry.clone(), StringFormat::Hexadecimal),
        );
        dict.set(
            "U",
            Object::String(self.user_entry.clone(), StringFormat::Hexadecimal),
        );
        dict.set("P", Object::Integer(self.permissions.p_value() as i64));
        dict
    }

    pub fn permissions(&self) -> Permissions {
        self.permissions
    }

    pub fn revision(&self) -> u8 {
        self.revision
    }

    /// Try `password` as user password, then as owner password. Returns the
    /// file key on success.
    pub fn authenticate(&self, password: &str) -> (AuthResult, Option<Vec<u8>>) {
        let padded = pad_password(password.as_bytes());
        if let Some(key) = self.check_user(&padded) {
            return (AuthResult::User, Some(key));
        }
        let recovered = self.recover_user_password(&padded);
        if let Some(key) = self.check_user(&recovered) {
            return (AuthResult::Owner, Some(key));
        }
        (AuthResult::Denied, None)
    }

    /// Algorithm 2: file encryption key from a padded user password
    pub fn compute_key(&self, padded_user: &[u8; 32]) -> Vec<u8> {
        let mut data = Vec::with_capacity(32 + self.owner_entry.len() + 4 + self.file_id.len());
        data.extend_from_slice(padded_user);
        data.extend_from_slice(&self.owner_entry);
        data.extend_from_slice(&(self.permissions.p_value() as u32).to_le_bytes());
        data.extend_from_slice(&self.file_id);

        let mut hash = md5::compute(&data).to_vec();
        if self.revision >= 3 {
            for _ in 0..50 {
                hash = md5::compute(&hash[..self.key_length]).to_vec();
            }
        }
        hash.truncate(self.key_length);
        hash
    }

    /// Algorithm 1: per-object key
    pub fn object_key(&self, file_key: &[u8], id: ObjectId) -> Vec<u8> {
        let mut data = file_key.to_vec();
        data.extend_from_slice(&id.0.to_le_bytes()[..3]);
        data.extend_from_slice(&id.1.to_le_bytes());
        let hash = md5::compute(&data);
        let len = (file_key.len() + 5).min(16);
        hash[..len].to_vec()
    }

    /// Algorithm 3: `/O` entry
    fn compute_owner_entry(&self, padded_owner: &[u8; 32], padded_user: &[u8; 32]) -> Vec<u8> {
        let rc4_key = self.owner_rc4_key(padded_owner);
        let mut result = rc4(&rc4_key, padded_user);
        if self.revision >= 3 {
            for i in 1..=19u8 {
                let iter_key: Vec<u8> = rc4_key.iter().map(|b| b ^ i).collect();
                result = rc4(&iter_key, &result);
            }
        }
        result
    }

    fn owner_rc4_key(&self, padded_owner: &[u8; 32]) -> Vec<u8> {
        let mut hash = md5::compute(padded_owner).to_vec();
        if self.revision >= 3 {
            for _ in 0..50 {
                hash = md5::compute(&hash).to_vec();
            }
        }
        hash.truncate(self.key_length);
        hash
    }

    /// Algorithms 4 and 5: `/U` entry
    fn compute_user_entry(&self, key: &[u8]) -> Vec<u8> {
        if self.revision == 2 {
            return rc4(key, &PADDING);
        }

        let mut data = PADDING.to_vec();
        data.extend_from_slice(&self.file_id);
        let hash = md5::compute(&data);

        let mut result = rc4(key, &hash.0);
        for i in 1..=19u8 {
            let iter_key: Vec<u8> = key.iter().map(|b| b ^ i).collect();
            result = rc4(&iter_key, &result);
        }
        result.resize(32, 0);
        result
    }

    /// Algorithm 6
    fn check_user(&self, padded_user: &[u8; 32]) -> Option<Vec<u8>> {
        let key = self.compute_key(padded_user);
        let expected = self.compute_user_entry(&key);
        let compared = if self.revision == 2 { 32 } else { 16 };
        if self.user_entry.len() >= compared && expected[..compared] == self.user_entry[..compared]
        {
            Some(key)
        } else {
            None
        }
    }

    /// Algorithm 7: decrypt `/O` with a candidate owner password to recover
    /// the padded user password
    fn recover_user_password(&self, padded_owner: &[u8; 32]) -> [u8; 32] {
        let rc4_key = self.owner_rc4_key(padded_owner);
        let mut result = self.owner_entry.clone();
        if self.revision == 2 {
            result = rc4(&rc4_key, &result);
        } else {
            for i in (0..=19u8).rev() {
                let iter_key: Vec<u8> = rc4_key.iter().map(|b| b ^ i).collect();
                result = rc4(&iter_key, &result);
            }
        }
        let mut padded = [0u8; 32];
        let len = result.len().min(32);
        padded[..len].copy_from_slice(&result[..len]);
        padded
    }
}

/// Pad or truncate a password to 32 bytes
fn pad_password(password: &[u8]) -> [u8; 32] {
    let mut padded = [0u8; 32];
    let len = password.len().min(32);
    padded[..len].copy_from_slice(&password[..len]);
    if len < 32 {
        padded[len..].copy_from_slice(&PADDING[..32 - len]);
    }
    padded
}
