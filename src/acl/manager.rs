//! Effective permission resolution, ACL mutation, and reverse lookup.
//!
//! Resolution for one principal walks the path's ancestors from the most
//! specific to the root and stops at the first ACL holding any grant or deny
//! entry for a principal in the caller's chain. That ACL decides alone:
//! deny bits of every chain principal are removed from the union of their
//! grant bits, and nothing from farther ancestors is blended in.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use crate::acl::chain::{AuthorizableLookup, MemoryAuthorizables, PrincipalChainResolver};
use crate::acl::listener::{AccessListener, LoggingAccessListener};
use crate::acl::path::{ancestors, normalize};
use crate::acl::store::AclStore;
use crate::acl::validator::{PrincipalValidator, PrincipalValidatorResolver, ValidationContext};
use crate::constants::ADMIN_USER;
use crate::error::{ArborError, Result};
use crate::io::AclStorage;
use crate::types::{
    AccessControlConfig, AccessEvent, Acl, AclModification, EntryKey, Permission, Polarity,
    Principal, PrincipalKind, deny_key, grant_key,
};

struct ServiceInner {
    store: AclStore,
    chains: PrincipalChainResolver,
    authorizables: Arc<dyn AuthorizableLookup>,
    validators: PrincipalValidatorResolver,
    listener: Arc<dyn AccessListener>,
    config: AccessControlConfig,
}

/// Shared, cheaply clonable state behind every [`AccessControlManager`].
#[derive(Clone)]
pub struct AccessControlService {
    inner: Arc<ServiceInner>,
}

pub struct AccessControlServiceBuilder {
    storage: Arc<dyn AclStorage>,
    authorizables: Option<Arc<dyn AuthorizableLookup>>,
    validators: PrincipalValidatorResolver,
    listener: Option<Arc<dyn AccessListener>>,
    config: AccessControlConfig,
}

impl AccessControlServiceBuilder {
    #[must_use]
    pub fn authorizables(mut self, authorizables: Arc<dyn AuthorizableLookup>) -> Self {
        self.authorizables = Some(authorizables);
        self
    }

    #[must_use]
    pub fn validator<V>(mut self, validator: V) -> Self
    where
        V: PrincipalValidator + 'static,
    {
        self.validators.register(validator);
        self
    }

    #[must_use]
    pub fn listener(mut self, listener: Arc<dyn AccessListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    #[must_use]
    pub fn config(mut self, config: AccessControlConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<AccessControlService> {
        self.config.validate()?;
        let authorizables = self
            .authorizables
            .unwrap_or_else(|| Arc::new(MemoryAuthorizables::new()));
        let store = AclStore::new(
            self.storage,
            self.config.acl_namespace(),
            self.config.effective_cache_capacity(),
        );
        tracing::debug!(
            acl.storage = store.storage_name(),
            acl.namespace = %self.config.acl_namespace(),
            acl.cache = self.config.cache_acls,
            acl.cache_capacity = self.config.cache_capacity,
            acl.validators = self.validators.len(),
            "access control service ready"
        );
        Ok(AccessControlService {
            inner: Arc::new(ServiceInner {
                store,
                chains: PrincipalChainResolver::new(Arc::clone(&authorizables)),
                authorizables,
                validators: self.validators,
                listener: self
                    .listener
                    .unwrap_or_else(|| Arc::new(LoggingAccessListener)),
                config: self.config,
            }),
        })
    }
}

impl AccessControlService {
    #[must_use]
    pub fn builder(storage: Arc<dyn AclStorage>) -> AccessControlServiceBuilder {
        AccessControlServiceBuilder {
            storage,
            authorizables: None,
            validators: PrincipalValidatorResolver::new(),
            listener: None,
            config: AccessControlConfig::default(),
        }
    }

    /// A manager acting on behalf of `caller`.
    #[must_use]
    pub fn manager(&self, caller: Principal) -> AccessControlManager {
        AccessControlManager {
            service: self.clone(),
            caller,
            context: ValidationContext::default(),
        }
    }

    /// A manager for a user looked up by id. Groups never act as callers, so
    /// a group id yields `None` just like an unknown one.
    pub fn manager_for(&self, principal_id: &str) -> Result<Option<AccessControlManager>> {
        Ok(self
            .inner
            .authorizables
            .find_authorizable(principal_id)?
            .filter(|principal| principal.kind == PrincipalKind::User)
            .map(|principal| self.manager(principal)))
    }

    #[must_use]
    pub fn config(&self) -> &AccessControlConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn authorizables(&self) -> &Arc<dyn AuthorizableLookup> {
        &self.inner.authorizables
    }

    pub(crate) fn store(&self) -> &AclStore {
        &self.inner.store
    }
}

/// Grant and deny bits one principal holds at the ancestor that resolved it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct ResolvedEntry {
    grant: Option<u32>,
    deny: Option<u32>,
}

impl ResolvedEntry {
    fn record(&mut self, polarity: Polarity, bits: u32) {
        match polarity {
            Polarity::Grant => self.grant = Some(bits),
            Polarity::Deny => self.deny = Some(bits),
        }
    }
}

/// Request-scoped access control bound to one caller.
pub struct AccessControlManager {
    service: AccessControlService,
    caller: Principal,
    context: ValidationContext,
}

impl AccessControlManager {
    /// Use `context` when validating conditional principals.
    #[must_use]
    pub fn with_context(mut self, context: ValidationContext) -> Self {
        self.context = context;
        self
    }

    #[must_use]
    pub fn caller(&self) -> &Principal {
        &self.caller
    }

    #[must_use]
    pub fn service(&self) -> &AccessControlService {
        &self.service
    }

    /// Whether `principal` holds every bit of `wanted` at `(zone, path)`.
    pub fn can(&self, principal: &Principal, zone: &str, path: &str, wanted: Permission) -> Result<bool> {
        if principal.is_admin() {
            return Ok(true);
        }
        let effective = self.effective_permission(principal, zone, path)?;
        let allowed = effective.satisfies(wanted);
        tracing::trace!(
            principal = %principal.id,
            acl.zone = zone,
            acl.path = path,
            acl.wanted = %wanted,
            acl.effective = format_args!("{:#x}", effective.bits()),
            allowed,
            "permission evaluated"
        );
        Ok(allowed)
    }

    /// Fail with [`ArborError::AccessDenied`] unless the caller holds `wanted`.
    pub fn check(&self, zone: &str, path: &str, wanted: Permission) -> Result<()> {
        if self.can(&self.caller, zone, path, wanted)? {
            return Ok(());
        }
        Err(self.denied(zone, path, wanted))
    }

    /// Apply a modification batch to the ACL at exactly `(zone, path)`.
    ///
    /// Requires `CAN_WRITE_ACL` (or `CAN_ANYTHING_ACL`) for the caller.
    pub fn set_acl(&self, zone: &str, path: &str, modifications: &[AclModification]) -> Result<()> {
        let path = normalize(path);
        self.check(zone, &path, Permission::CAN_WRITE_ACL)?;
        self.service.store().apply(zone, &path, modifications)?;

        self.service.inner.listener.on_event(&AccessEvent::AclUpdated {
            zone: zone.to_string(),
            path,
            actor: self.caller.id.clone(),
            modifications: modifications.to_vec(),
        });
        Ok(())
    }

    /// The ACL stored at exactly `(zone, path)`. Ancestors are not consulted.
    pub fn get_acl(&self, zone: &str, path: &str) -> Result<Acl> {
        Ok(Acl::clone(&*self.service.store().get(zone, path)?))
    }

    /// The named permissions the caller holds at `(zone, path)`, in
    /// [`Permission::named`] order.
    pub fn get_permissions(&self, zone: &str, path: &str) -> Result<Vec<Permission>> {
        let effective = if self.caller.is_admin() {
            Permission::ALL
                .combine(Permission::CAN_ANYTHING)
                .combine(Permission::CAN_ANYTHING_ACL)
        } else {
            self.effective_permission(&self.caller, zone, path)?
        };
        Ok(Permission::named()
            .into_iter()
            .filter(|permission| effective.satisfies(*permission))
            .collect())
    }

    /// Principal ids granted (or denied) every bit of `permission` at `(zone, path)`.
    ///
    /// Each principal mentioned along the ancestor chain is judged at the
    /// nearest ancestor mentioning it. `admin` is always granted and never denied.
    pub fn find_principals(
        &self,
        zone: &str,
        path: &str,
        permission: Permission,
        granted: bool,
    ) -> Result<Vec<String>> {
        let entries = self.resolve_entries(zone, path)?;
        let mut found = BTreeSet::new();
        if granted {
            found.insert(ADMIN_USER.to_string());
        }
        for (principal_id, entry) in entries {
            if principal_id == ADMIN_USER {
                continue;
            }
            let deny = Permission::from_bits(entry.deny.unwrap_or(0));
            let matches = if granted {
                let grant = self.valid_grant(&principal_id, entry.grant);
                grant.without(deny.expand()).satisfies(permission)
            } else {
                entry.deny.is_some() && deny.satisfies(permission)
            };
            if matches {
                found.insert(principal_id);
            }
        }
        Ok(found.into_iter().collect())
    }

    /// Entries in force at `(zone, path)`: for every principal mentioned along
    /// the ancestor chain, the grant and deny entries of the nearest ancestor
    /// that mentions it.
    pub fn effective_acl(&self, zone: &str, path: &str) -> Result<Acl> {
        let mut acl = Acl::new();
        for (principal_id, entry) in self.resolve_entries(zone, path)? {
            if let Some(bits) = entry.grant {
                acl.insert(grant_key(&principal_id), bits);
            }
            if let Some(bits) = entry.deny {
                acl.insert(deny_key(&principal_id), bits);
            }
        }
        Ok(acl)
    }

    fn effective_permission(&self, principal: &Principal, zone: &str, path: &str) -> Result<Permission> {
        let chain = self.service.inner.chains.resolve(principal)?;
        for ancestor in ancestors(path) {
            let acl = self.service.store().get(zone, &ancestor)?;
            if let Some(effective) = self.resolve_at(&acl, &chain) {
                tracing::trace!(
                    principal = %principal.id,
                    acl.zone = zone,
                    acl.resolved_at = %ancestor,
                    "acl ancestor matched"
                );
                return Ok(effective);
            }
        }
        Ok(Permission::NONE)
    }

    /// Effective bits at one ACL, or `None` when it mentions no chain principal.
    fn resolve_at(&self, acl: &Acl, chain: &[String]) -> Option<Permission> {
        let mut matched = false;
        let mut grant = Permission::NONE;
        let mut deny = Permission::NONE;
        for principal_id in chain {
            if let Some(&bits) = acl.get(&grant_key(principal_id)) {
                matched = true;
                grant |= self.valid_grant(principal_id, Some(bits));
            }
            if let Some(&bits) = acl.get(&deny_key(principal_id)) {
                matched = true;
                deny |= Permission::from_bits(bits);
            }
        }
        matched.then(|| grant.without(deny.expand()))
    }

    fn valid_grant(&self, principal_id: &str, bits: Option<u32>) -> Permission {
        match bits {
            Some(bits)
                if self.service.inner.validators.is_valid(
                    &grant_key(principal_id),
                    principal_id,
                    &self.context,
                ) =>
            {
                Permission::from_bits(bits)
            }
            _ => Permission::NONE,
        }
    }

    fn resolve_entries(&self, zone: &str, path: &str) -> Result<BTreeMap<String, ResolvedEntry>> {
        let mut resolved: BTreeMap<String, ResolvedEntry> = BTreeMap::new();
        for ancestor in ancestors(path) {
            let acl = self.service.store().get(zone, &ancestor)?;
            let mut here: BTreeMap<String, ResolvedEntry> = BTreeMap::new();
            for (key, &bits) in acl.iter() {
                let Some(entry_key) = EntryKey::parse(key) else {
                    continue;
                };
                if resolved.contains_key(entry_key.principal_id) {
                    continue;
                }
                here.entry(entry_key.principal_id.to_string())
                    .or_default()
                    .record(entry_key.polarity, bits);
            }
            resolved.extend(here);
        }
        Ok(resolved)
    }

    fn denied(&self, zone: &str, path: &str, wanted: Permission) -> ArborError {
        if self.service.inner.config.audit_denied_access {
            self.service.inner.listener.on_event(&AccessEvent::AccessDenied {
                zone: zone.to_string(),
                path: path.to_string(),
                actor: self.caller.id.clone(),
                permission: wanted,
            });
        }
        ArborError::AccessDenied {
            zone: zone.to_string(),
            path: path.to_string(),
            principal: self.caller.id.clone(),
            permission: wanted.to_string(),
        }
    }
}
