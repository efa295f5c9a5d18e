//! Password protection with the standard security handler
//!
//! Only the RC4 revisions (R2 and R3) are produced and understood. Documents
//! using AES or a public-key handler are reported as encrypted but cannot be
//! opened.

mod object_encryption;
mod permissions;
mod rc4;
mod standard_security;

pub use object_encryption::{decrypt_document, encrypt_document, trailer_file_id};
pub use permissions::{PermissionOptions, Permissions};
pub use rc4::{rc4, Rc4};
pub use standard_security::{AuthResult, EncryptionMethod, SecurityHandler};

use serde::{Deserialize, Serialize};

/// Encryption settings for `SaveOptions`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncryptionOptions {
    pub owner_password: String,
    pub user_password: String,
    pub permissions: PermissionOptions,
    pub method: EncryptionMethod,
}

impl EncryptionOptions {
    pub fn new(owner_password: impl Into<String>) -> Self {
        Self {
            owner_password: owner_password.into(),
            ..Default::default()
        }
    }

    pub fn with_user_password(mut self, password: impl Into<String>) -> Self {
        self.user_password = password.into();
        self
    }

    pub fn with_permissions(mut self, permissions: PermissionOptions) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_method(mut self, method: EncryptionMethod) -> Self {
        self.method = method;
        self
    }
}
