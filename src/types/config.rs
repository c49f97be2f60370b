//! Configuration for the access control service.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_ACL_CACHE_CAPACITY, DEFAULT_ACL_COLUMN_FAMILY, DEFAULT_KEYSPACE};
use crate::error::{ArborError, Result};

fn default_true() -> bool {
    true
}

fn default_cache_capacity() -> usize {
    DEFAULT_ACL_CACHE_CAPACITY
}

fn default_keyspace() -> String {
    DEFAULT_KEYSPACE.to_string()
}

fn default_acl_column_family() -> String {
    DEFAULT_ACL_COLUMN_FAMILY.to_string()
}

/// Storage naming and runtime switches. Field names accept the kebab-case
/// spelling used by property files (`acl-column-family`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub struct AccessControlConfig {
    #[serde(default = "default_keyspace")]
    pub keyspace: String,
    #[serde(default = "default_acl_column_family")]
    pub acl_column_family: String,
    /// Keep decoded ACLs in memory; entries are dropped on every write to their key.
    #[serde(default = "default_true")]
    pub cache_acls: bool,
    /// Most decoded ACLs kept at once; least recently used entries go first.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Send an event to the listener for every failed `check`.
    #[serde(default)]
    pub audit_denied_access: bool,
}

impl Default for AccessControlConfig {
    fn default() -> Self {
        Self {
            keyspace: default_keyspace(),
            acl_column_family: default_acl_column_family(),
            cache_acls: true,
            cache_capacity: DEFAULT_ACL_CACHE_CAPACITY,
            audit_denied_access: false,
        }
    }
}

impl AccessControlConfig {
    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw).map_err(|err| ArborError::Config {
            reason: err.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("keyspace", &self.keyspace),
            ("acl-column-family", &self.acl_column_family),
        ] {
            if value.trim().is_empty() {
                return Err(ArborError::Config {
                    reason: format!("{name} must not be empty"),
                });
            }
        }
        if self.cache_acls && self.cache_capacity == 0 {
            return Err(ArborError::Config {
                reason: "cache-capacity must be positive while cache-acls is on".into(),
            });
        }
        Ok(())
    }

    /// Capacity handed to the ACL cache, or `None` when caching is off.
    #[must_use]
    pub fn effective_cache_capacity(&self) -> Option<NonZeroUsize> {
        if self.cache_acls {
            NonZeroUsize::new(self.cache_capacity)
        } else {
            None
        }
    }

    #[must_use]
    pub fn with_acl_column_family(mut self, column_family: impl Into<String>) -> Self {
        self.acl_column_family = column_family.into();
        self
    }

    #[must_use]
    pub fn with_cache(mut self, enabled: bool) -> Self {
        self.cache_acls = enabled;
        self
    }

    #[must_use]
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    #[must_use]
    pub fn with_denied_audit(mut self, enabled: bool) -> Self {
        self.audit_denied_access = enabled;
        self
    }

    /// Column family holding ACL rows, qualified by keyspace.
    #[must_use]
    pub fn acl_namespace(&self) -> String {
        format!("{}.{}", self.keyspace, self.acl_column_family)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_property_style_keys_with_defaults() {
        let config = AccessControlConfig::from_json_str(
            r#"{"keyspace":"n","acl-column-family":"acl","audit-denied-access":true}"#,
        )
        .expect("config");
        assert_eq!(config.acl_column_family, "acl");
        assert_eq!(config.keyspace, "n");
        assert!(config.cache_acls);
        assert!(config.audit_denied_access);
        assert_eq!(config.acl_namespace(), "n.acl");
        assert_eq!(config.cache_capacity, DEFAULT_ACL_CACHE_CAPACITY);
    }

    #[test]
    fn cache_capacity_must_be_positive_when_caching() {
        let err = AccessControlConfig::from_json_str(r#"{"cache-capacity":0}"#)
            .expect_err("zero capacity");
        assert!(matches!(err, ArborError::Config { .. }));

        let off = AccessControlConfig::from_json_str(r#"{"cache-acls":false,"cache-capacity":0}"#)
            .expect("cache off");
        assert_eq!(off.effective_cache_capacity(), None);
        assert_eq!(
            AccessControlConfig::default()
                .with_cache_capacity(16)
                .effective_cache_capacity(),
            NonZeroUsize::new(16)
        );
    }

    #[test]
    fn rejects_empty_column_family() {
        let err = AccessControlConfig::from_json_str(r#"{"acl-column-family":" "}"#)
            .expect_err("empty column family");
        assert!(matches!(err, ArborError::Config { .. }));
    }
}
