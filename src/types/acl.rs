//! ACL entries and the modification protocol.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{DENY_SUFFIX, GRANT_SUFFIX};
use crate::error::{ArborError, Result};
use crate::types::permission::Permission;

/// Stored ACL for one `(zone, path)`: principal entry key to permission bits.
pub type Acl = BTreeMap<String, u32>;

/// Entry key granting permissions to `principal_id`.
#[must_use]
pub fn grant_key(principal_id: &str) -> String {
    format!("{principal_id}{GRANT_SUFFIX}")
}

/// Entry key denying permissions to `principal_id`.
#[must_use]
pub fn deny_key(principal_id: &str) -> String {
    format!("{principal_id}{DENY_SUFFIX}")
}

/// Polarity of an ACL entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Polarity {
    Grant,
    Deny,
}

/// A parsed entry key. Keys without a polarity suffix are not entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryKey<'a> {
    pub principal_id: &'a str,
    pub polarity: Polarity,
}

impl<'a> EntryKey<'a> {
    #[must_use]
    pub fn parse(key: &'a str) -> Option<Self> {
        if let Some(principal_id) = key.strip_suffix(GRANT_SUFFIX) {
            return Some(Self {
                principal_id,
                polarity: Polarity::Grant,
            });
        }
        key.strip_suffix(DENY_SUFFIX).map(|principal_id| Self {
            principal_id,
            polarity: Polarity::Deny,
        })
    }
}

/// How a modification combines with the stored bits for its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AclOperation {
    /// Stored bits become exactly the given bits.
    Replace,
    /// Stored bits gain the given bits.
    Or,
    /// Stored bits lose the given bits; the key stays.
    AndNot,
    /// The key is removed; the given bits are ignored.
    Delete,
}

impl AclOperation {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Replace => "replace",
            Self::Or => "or",
            Self::AndNot => "and_not",
            Self::Delete => "delete",
        }
    }

    /// Apply this operation to the current value of a key.
    /// `None` in and out means the key is absent.
    #[must_use]
    pub fn apply(self, current: Option<u32>, bits: u32) -> Option<u32> {
        match self {
            Self::Replace => Some(bits),
            Self::Or => Some(current.unwrap_or(0) | bits),
            Self::AndNot => Some(current.unwrap_or(0) & !bits),
            Self::Delete => None,
        }
    }
}

impl FromStr for AclOperation {
    type Err = ArborError;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "replace" | "op_replace" => Ok(Self::Replace),
            "or" | "op_or" => Ok(Self::Or),
            "and_not" | "op_and_not" => Ok(Self::AndNot),
            "delete" | "op_del" => Ok(Self::Delete),
            other => Err(ArborError::InvalidModification {
                reason: format!("unknown operation {other:?}"),
            }),
        }
    }
}

impl fmt::Display for AclOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One unit of an ACL modification batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AclModification {
    pub key: String,
    pub bits: u32,
    pub operation: AclOperation,
}

impl AclModification {
    #[must_use]
    pub fn new(key: impl Into<String>, bits: u32, operation: AclOperation) -> Self {
        Self {
            key: key.into(),
            bits,
            operation,
        }
    }

    #[must_use]
    pub fn grant(principal_id: &str, permission: Permission, operation: AclOperation) -> Self {
        Self::new(grant_key(principal_id), permission.bits(), operation)
    }

    #[must_use]
    pub fn deny(principal_id: &str, permission: Permission, operation: AclOperation) -> Self {
        Self::new(deny_key(principal_id), permission.bits(), operation)
    }

    /// Parse a JSON array of modifications, e.g.
    /// `[{"key":"u1@g","bits":1,"operation":"or"}]`.
    ///
    /// The `operation` field also accepts `op_`-prefixed spellings such as
    /// `op_replace`; anything unrecognised is rejected.
    pub fn batch_from_json(raw: &str) -> Result<Vec<Self>> {
        let values: Vec<RawModification> =
            serde_json::from_str(raw).map_err(|err| ArborError::InvalidModification {
                reason: err.to_string(),
            })?;
        values
            .into_iter()
            .map(|value| {
                Ok(Self {
                    key: value.key,
                    bits: value.bits,
                    operation: value.operation.parse()?,
                })
            })
            .collect()
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.key.trim().is_empty() {
            return Err(ArborError::InvalidModification {
                reason: "entry key must not be empty".to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Deserialize)]
struct RawModification {
    key: String,
    #[serde(default)]
    bits: u32,
    operation: String,
}

/// Apply a batch to an ACL in batch order.
pub fn apply_modifications(acl: &mut Acl, modifications: &[AclModification]) {
    for modification in modifications {
        let current = acl.get(&modification.key).copied();
        match modification.operation.apply(current, modification.bits) {
            Some(bits) => {
                acl.insert(modification.key.clone(), bits);
            }
            None => {
                acl.remove(&modification.key);
            }
        }
    }
}
