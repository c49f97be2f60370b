//! Authenticated principals as seen by the access control core.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::constants::{ADMIN_USER, ANON_USER, EVERYONE, PRINCIPAL_KIND_SEPARATOR};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "snake_case")]
pub enum PrincipalKind {
    #[default]
    User,
    Group,
}

/// A user or group identity with its declared group memberships.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    pub id: String,
    #[serde(default)]
    pub kind: PrincipalKind,
    /// Groups this principal directly belongs to.
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub groups: BTreeSet<String>,
}

impl Principal {
    #[must_use]
    pub fn user(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: PrincipalKind::User,
            groups: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn group(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind: PrincipalKind::Group,
            groups: BTreeSet::new(),
        }
    }

    #[must_use]
    pub fn admin() -> Self {
        Self::user(ADMIN_USER)
    }

    #[must_use]
    pub fn anonymous() -> Self {
        Self::user(ANON_USER)
    }

    #[must_use]
    pub fn everyone() -> Self {
        Self::group(EVERYONE)
    }

    #[must_use]
    pub fn with_group(mut self, group: impl Into<String>) -> Self {
        self.groups.insert(group.into());
        self
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.id == ADMIN_USER
    }
}

/// Kind prefix of a principal id (`token:abc` has kind `token`).
#[must_use]
pub fn principal_kind_prefix(principal_id: &str) -> Option<&str> {
    principal_id
        .split_once(PRINCIPAL_KIND_SEPARATOR)
        .map(|(kind, _)| kind)
        .filter(|kind| !kind.is_empty())
}
