//! Principal chain resolution: self, transitive groups, then `everyone`.

use std::collections::{BTreeMap, BTreeSet, HashSet, VecDeque};
use std::sync::{Arc, RwLock};

use crate::constants::{ADMIN_USER, ANON_USER, EVERYONE};
use crate::error::{ArborError, Result};
use crate::types::Principal;

/// Source of authorizable records and group memberships.
pub trait AuthorizableLookup: Send + Sync {
    fn find_authorizable(&self, id: &str) -> Result<Option<Principal>>;

    /// Groups `id` directly belongs to. Unknown ids have no memberships.
    fn memberships(&self, id: &str) -> Result<BTreeSet<String>>;
}

/// In-memory authorizable registry. Seeded with `admin`, `anonymous` and `everyone`.
#[derive(Debug)]
pub struct MemoryAuthorizables {
    records: RwLock<BTreeMap<String, Principal>>,
}

impl Default for MemoryAuthorizables {
    fn default() -> Self {
        let records = [Principal::admin(), Principal::anonymous(), Principal::everyone()]
            .into_iter()
            .map(|principal| (principal.id.clone(), principal))
            .collect();
        Self {
            records: RwLock::new(records),
        }
    }
}

impl MemoryAuthorizables {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, principal: Principal) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| ArborError::Lock("authorizable registry poisoned".into()))?;
        records.insert(principal.id.clone(), principal);
        Ok(())
    }

    /// Add `member` to `group`, creating a bare group record if needed.
    pub fn add_member(&self, group: &str, member: &str) -> Result<()> {
        let mut records = self
            .records
            .write()
            .map_err(|_| ArborError::Lock("authorizable registry poisoned".into()))?;
        records
            .entry(group.to_string())
            .or_insert_with(|| Principal::group(group));
        records
            .entry(member.to_string())
            .or_insert_with(|| Principal::user(member))
            .groups
            .insert(group.to_string());
        Ok(())
    }
}

impl AuthorizableLookup for MemoryAuthorizables {
    fn find_authorizable(&self, id: &str) -> Result<Option<Principal>> {
        let records = self
            .records
            .read()
            .map_err(|_| ArborError::Lock("authorizable registry poisoned".into()))?;
        Ok(records.get(id).cloned())
    }

    fn memberships(&self, id: &str) -> Result<BTreeSet<String>> {
        Ok(self
            .find_authorizable(id)?
            .map(|principal| principal.groups)
            .unwrap_or_default())
    }
}

/// Expands a principal into the ordered ids its permissions are evaluated for.
#[derive(Clone)]
pub struct PrincipalChainResolver {
    authorizables: Arc<dyn AuthorizableLookup>,
}

impl PrincipalChainResolver {
    #[must_use]
    pub fn new(authorizables: Arc<dyn AuthorizableLookup>) -> Self {
        Self { authorizables }
    }

    /// `[principal.id] ++ transitive groups ++ [everyone]`, without duplicates.
    ///
    /// Groups are walked breadth first, starting from the groups declared on
    /// `principal` together with those the lookup records for its id;
    /// already visited ids are skipped so membership cycles terminate.
    pub fn resolve(&self, principal: &Principal) -> Result<Vec<String>> {
        let mut chain = vec![principal.id.clone()];
        let mut seen: HashSet<String> = HashSet::from([principal.id.clone()]);
        let mut direct = principal.groups.clone();
        direct.extend(self.authorizables.memberships(&principal.id)?);
        let mut queue: VecDeque<String> = direct.into_iter().collect();

        while let Some(group) = queue.pop_front() {
            if !seen.insert(group.clone()) {
                continue;
            }
            // The sentinel users are never groups, whatever a record claims.
            if group == ADMIN_USER || group == ANON_USER {
                continue;
            }
            for parent in self.authorizables.memberships(&group)? {
                if !seen.contains(&parent) {
                    queue.push_back(parent);
                }
            }
            chain.push(group);
        }

        if seen.insert(EVERYONE.to_string()) {
            chain.push(EVERYONE.to_string());
        } else if let Some(position) = chain.iter().position(|id| id == EVERYONE) {
            // Keep `everyone` last even when it was also listed as a group.
            let everyone = chain.remove(position);
            chain.push(everyone);
        }

        tracing::trace!(
            principal = %principal.id,
            chain.len = chain.len(),
            "principal chain resolved"
        );
        Ok(chain)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver(registry: MemoryAuthorizables) -> PrincipalChainResolver {
        PrincipalChainResolver::new(Arc::new(registry))
    }

    #[test]
    fn plain_user_gets_everyone() {
        let chain = resolver(MemoryAuthorizables::new())
            .resolve(&Principal::user("alice"))
            .expect("chain");
        assert_eq!(chain, vec!["alice", "everyone"]);
    }

    #[test]
    fn anonymous_resolves_like_any_principal() {
        let chain = resolver(MemoryAuthorizables::new())
            .resolve(&Principal::anonymous())
            .expect("chain");
        assert_eq!(chain, vec!["anonymous", "everyone"]);
    }

    #[test]
    fn everyone_is_not_duplicated() {
        let chain = resolver(MemoryAuthorizables::new())
            .resolve(&Principal::everyone().with_group("everyone"))
            .expect("chain");
        assert_eq!(chain, vec!["everyone"]);
    }

    #[test]
    fn transitive_groups_in_breadth_first_order() {
        let registry = MemoryAuthorizables::new();
        registry.add_member("staff", "eng").expect("member");
        registry.add_member("eng", "backend").expect("member");
        let chain = resolver(registry)
            .resolve(&Principal::user("alice").with_group("backend").with_group("everyone"))
            .expect("chain");
        assert_eq!(chain, vec!["alice", "backend", "eng", "staff", "everyone"]);
    }

    #[test]
    fn registry_memberships_apply_to_bare_principals() {
        let registry = MemoryAuthorizables::new();
        registry.add_member("eng", "alice").expect("member");
        registry.add_member("staff", "eng").expect("member");
        let chain = resolver(registry)
            .resolve(&Principal::user("alice").with_group("oncall"))
            .expect("chain");
        assert_eq!(chain, vec!["alice", "eng", "oncall", "staff", "everyone"]);
    }

    #[test]
    fn membership_cycles_terminate() {
        let registry = MemoryAuthorizables::new();
        registry.add_member("a", "b").expect("member");
        registry.add_member("b", "c").expect("member");
        registry.add_member("c", "a").expect("member");
        let chain = resolver(registry)
            .resolve(&Principal::user("bob").with_group("a"))
            .expect("chain");
        assert_eq!(chain, vec!["bob", "a", "c", "b", "everyone"]);
    }
}
