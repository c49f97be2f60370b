//! Permission bits and their combination rules.
//!
//! Permissions are stored exactly as granted. The two super bits
//! (`CAN_ANYTHING`, `CAN_ANYTHING_ACL`) are only expanded when a check is
//! evaluated, so a stored `CAN_ANYTHING | CAN_ANYTHING_ACL` reads back as that
//! literal value rather than as its expansion.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A permission bitmask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(u32);

impl Permission {
    pub const NONE: Self = Self(0);
    pub const CAN_READ: Self = Self(0x0001);
    pub const CAN_WRITE: Self = Self(0x0002);
    pub const CAN_DELETE: Self = Self(0x0004);
    pub const CAN_MANAGE: Self = Self(0x0008);
    /// Satisfies every content permission check.
    pub const CAN_ANYTHING: Self = Self(0x0080);
    pub const CAN_READ_ACL: Self = Self(0x1000);
    pub const CAN_WRITE_ACL: Self = Self(0x2000);
    pub const CAN_DELETE_ACL: Self = Self(0x4000);
    /// Satisfies every ACL permission check.
    pub const CAN_ANYTHING_ACL: Self = Self(0x8000);
    /// Every content and ACL bit. The super bits are not part of `ALL`.
    pub const ALL: Self = Self(Self::CONTENT_BITS | Self::ACL_BITS);

    const CONTENT_BITS: u32 = 0x0001 | 0x0002 | 0x0004 | 0x0008;
    const ACL_BITS: u32 = 0x1000 | 0x2000 | 0x4000;

    const NAMED: [(Self, &'static str); 10] = [
        (Self::CAN_READ, "read"),
        (Self::CAN_WRITE, "write"),
        (Self::CAN_DELETE, "delete"),
        (Self::CAN_READ_ACL, "read_acl"),
        (Self::CAN_WRITE_ACL, "write_acl"),
        (Self::CAN_DELETE_ACL, "delete_acl"),
        (Self::CAN_MANAGE, "manage"),
        (Self::ALL, "all"),
        (Self::CAN_ANYTHING, "anything"),
        (Self::CAN_ANYTHING_ACL, "anything_acl"),
    ];

    #[must_use]
    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Bitwise OR of two permissions.
    #[must_use]
    pub const fn combine(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Bits of `self` not present in `other`.
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// The bitmask with super bits expanded into the bits they stand for.
    #[must_use]
    pub const fn expand(self) -> Self {
        let mut bits = self.0;
        if bits & Self::CAN_ANYTHING.0 != 0 {
            bits |= Self::CONTENT_BITS;
        }
        if bits & Self::CAN_ANYTHING_ACL.0 != 0 {
            bits |= Self::ACL_BITS;
        }
        Self(bits)
    }

    /// True when every wanted bit is held, either directly or through a super bit.
    #[must_use]
    pub const fn satisfies(self, wanted: Self) -> bool {
        self.expand().contains(wanted)
    }

    /// Permissions reported by permission enumeration, in reporting order.
    #[must_use]
    pub fn named() -> [Self; 8] {
        [
            Self::CAN_READ,
            Self::CAN_WRITE,
            Self::CAN_DELETE,
            Self::CAN_READ_ACL,
            Self::CAN_WRITE_ACL,
            Self::CAN_DELETE_ACL,
            Self::CAN_MANAGE,
            Self::ALL,
        ]
    }

    #[must_use]
    pub fn name(self) -> Option<&'static str> {
        Self::NAMED
            .iter()
            .find(|(permission, _)| *permission == self)
            .map(|(_, name)| *name)
    }

    /// Parse a permission name such as `read` or `write_acl` (case-insensitive).
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let wanted = name.trim().to_ascii_lowercase();
        let wanted = wanted.strip_prefix("can_").unwrap_or(&wanted);
        Self::NAMED
            .iter()
            .find(|(_, candidate)| *candidate == wanted)
            .map(|(permission, _)| *permission)
    }
}

/// Bitwise OR of two raw masks.
#[must_use]
pub const fn combine(a: u32, b: u32) -> u32 {
    a | b
}

/// True when `have` covers every bit of `want`, honouring super bits.
#[must_use]
pub const fn satisfies(have: u32, want: u32) -> bool {
    Permission::from_bits(have).satisfies(Permission::from_bits(want))
}

impl std::ops::BitOr for Permission {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        self.combine(rhs)
    }
}

impl std::ops::BitOrAssign for Permission {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl From<Permission> for u32 {
    fn from(permission: Permission) -> Self {
        permission.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "{:#x}", self.0),
        }
    }
}
