//! Validators for conditional principals.
//!
//! A principal id of the form `kind:rest` is conditional when a validator is
//! registered for `kind`. Its grant entries only count while the validator
//! accepts them; its deny entries always count.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::principal_kind_prefix;

/// Request-scoped facts a validator may consult.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ValidationContext {
    pub now: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
}

impl Default for ValidationContext {
    fn default() -> Self {
        Self {
            now: Utc::now(),
            attributes: BTreeMap::new(),
        }
    }
}

impl ValidationContext {
    #[must_use]
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now,
            attributes: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// Decides whether a conditional principal's entry is currently in force.
pub trait PrincipalValidator: Send + Sync {
    /// Principal kind prefix this validator handles.
    fn kind(&self) -> &'static str;

    fn validate(&self, entry_key: &str, principal_id: &str, context: &ValidationContext) -> bool;
}

/// Registry of validators keyed by principal kind.
#[derive(Default)]
pub struct PrincipalValidatorResolver {
    validators: BTreeMap<&'static str, Box<dyn PrincipalValidator>>,
}

impl PrincipalValidatorResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a validator, replacing any previous one for the same kind.
    pub fn register<V>(&mut self, validator: V)
    where
        V: PrincipalValidator + 'static,
    {
        self.validators.insert(validator.kind(), Box::new(validator));
    }

    #[must_use]
    pub fn validator_for(&self, principal_id: &str) -> Option<&dyn PrincipalValidator> {
        let kind = principal_kind_prefix(principal_id)?;
        self.validators.get(kind).map(AsRef::as_ref)
    }

    /// True unless a registered validator rejects the entry.
    #[must_use]
    pub fn is_valid(&self, entry_key: &str, principal_id: &str, context: &ValidationContext) -> bool {
        match self.validator_for(principal_id) {
            Some(validator) => {
                let valid = validator.validate(entry_key, principal_id, context);
                if !valid {
                    tracing::debug!(
                        principal = principal_id,
                        validator = validator.kind(),
                        "conditional principal rejected"
                    );
                }
                valid
            }
            None => true,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.validators.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.validators.is_empty()
    }
}
