//! Root default ACLs installed when a repository is first set up.

use crate::acl::manager::AccessControlService;
use crate::constants::{ANON_USER, EVERYONE, ROOT_PATH, ZONE_AUTHORIZABLES, ZONE_CONTENT};
use crate::error::Result;
use crate::types::{AclModification, AclOperation, Permission};

/// Zones that receive a readable root by default.
pub const DEFAULT_READABLE_ZONES: [&str; 2] = [ZONE_CONTENT, ZONE_AUTHORIZABLES];

/// Grant `CAN_READ` to `anonymous` and `everyone` at the root of each default zone.
///
/// Existing root entries for other principals are left alone, and an
/// existing deny for either principal is preserved; running this twice is
/// harmless. Writes bypass the `CAN_WRITE_ACL` check.
pub fn install_default_acls(service: &AccessControlService) -> Result<()> {
    let modifications = [
        AclModification::grant(ANON_USER, Permission::CAN_READ, AclOperation::Or),
        AclModification::grant(EVERYONE, Permission::CAN_READ, AclOperation::Or),
    ];
    for zone in DEFAULT_READABLE_ZONES {
        service.store().apply(zone, ROOT_PATH, &modifications)?;
        tracing::info!(acl.zone = zone, "default root acl installed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::acl::listener::NoopAccessListener;
    use crate::io::MemoryStorage;
    use crate::types::{Principal, grant_key};

    #[test]
    fn root_becomes_readable_everywhere() {
        let service = AccessControlService::builder(Arc::new(MemoryStorage::new()))
            .listener(Arc::new(NoopAccessListener))
            .build()
            .expect("service");
        install_default_acls(&service).expect("bootstrap");
        install_default_acls(&service).expect("bootstrap twice");

        let acm = service.manager(Principal::admin());
        let root = acm.get_acl(ZONE_CONTENT, ROOT_PATH).expect("root");
        assert_eq!(root.get(&grant_key(EVERYONE)), Some(&Permission::CAN_READ.bits()));
        assert_eq!(root.len(), 2);
        for zone in DEFAULT_READABLE_ZONES {
            assert!(acm
                .can(&Principal::user("someone"), zone, "deep/down/here", Permission::CAN_READ)
                .expect("can"));
        }
        assert!(!acm
            .can(&Principal::user("someone"), ZONE_CONTENT, "x", Permission::CAN_WRITE)
            .expect("can"));
    }
}
