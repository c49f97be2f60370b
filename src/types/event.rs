//! Events emitted to access listeners.

use serde::{Deserialize, Serialize};

use super::acl::AclModification;
use super::permission::Permission;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AccessEvent {
    AclUpdated {
        zone: String,
        path: String,
        actor: String,
        modifications: Vec<AclModification>,
    },
    AccessDenied {
        zone: String,
        path: String,
        actor: String,
        permission: Permission,
    },
}

impl AccessEvent {
    #[must_use]
    pub fn zone(&self) -> &str {
        match self {
            Self::AclUpdated { zone, .. } | Self::AccessDenied { zone, .. } => zone,
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        match self {
            Self::AclUpdated { path, .. } | Self::AccessDenied { path, .. } => path,
        }
    }

    #[must_use]
    pub fn actor(&self) -> &str {
        match self {
            Self::AclUpdated { actor, .. } | Self::AccessDenied { actor, .. } => actor,
        }
    }
}
