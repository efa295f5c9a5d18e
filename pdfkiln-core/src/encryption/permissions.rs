//! Permission bits of the `/P` entry (ISO 32000-1 Table 22)

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

/// Bits 7-8 and 13-32 are reserved and must be set
const RESERVED_BITS: u32 = 0xFFFF_F0C0;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Permissions: u32 {
        const PRINT = 1 << 2;
        const MODIFY = 1 << 3;
        const COPY = 1 << 4;
        const ANNOTATE = 1 << 5;
        const FILL_FORMS = 1 << 8;
        const ACCESSIBILITY = 1 << 9;
        const ASSEMBLE = 1 << 10;
        const PRINT_HIGH_QUALITY = 1 << 11;
    }
}

impl Permissions {
    /// Signed value as stored in the encryption dictionary
    pub fn p_value(self) -> i32 {
        (self.bits() | RESERVED_BITS) as i32
    }

    pub fn from_p_value(p: i64) -> Self {
        Self::from_bits_truncate(p as u32)
    }
}

impl Default for Permissions {
    fn default() -> Self {
        Permissions::all()
    }
}

/// The four user-facing switches; everything not listed stays allowed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionOptions {
    pub print: bool,
    pub modify: bool,
    pub copy: bool,
    pub annotate: bool,
}

impl Default for PermissionOptions {
    fn default() -> Self {
        Self {
            print: true,
            modify: true,
            copy: true,
            annotate: true,
        }
    }
}

impl From<PermissionOptions> for Permissions {
    fn from(options: PermissionOptions) -> Self {
        let mut perms = Permissions::all();
        if !options.print {
            perms.remove(Permissions::PRINT | Permissions::PRINT_HIGH_QUALITY);
        }
        if !options.modify {
            perms.remove(Permissions::MODIFY);
        }
        if !options.copy {
            perms.remove(Permissions::COPY);
        }
        if !options.annotate {
            perms.remove(Permissions::ANNOTATE);
        }
        perms
    }
}

impl From<Permissions> for PermissionOptions {
    fn from(perms: Permissions) -> Self {
        Self {
            print: perms.contains(Permissions::PRINT),
            modify: perms.contains(Permissions::MODIFY),
            copy: perms.contains(Permissions::COPY),
            annotate: perms.contains(Permissions::ANNOTATE),
        }
    }
}
