#![deny(clippy::all, clippy::pedantic)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
#![cfg_attr(test, allow(clippy::uninlined_format_args, clippy::too_many_lines))]
#![allow(clippy::module_name_repetitions)]
//
// Documentation lints: internal helpers are self-describing; public entry
// points carry their own docs.
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]
//
// Row headers in the log format are fixed-width; lengths are bounded by u32.
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_lossless)]
//
#![allow(clippy::manual_let_else)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)] // Builders take owned values
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::struct_excessive_bools)] // Config structs naturally have many flags
#![allow(clippy::unreadable_literal)] // Permission bits read better as hex
#![allow(clippy::implicit_hasher)]
#![allow(clippy::len_without_is_empty)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::unused_self)]

//! `arbor-core`: hierarchical access control for a path-addressed store.
//!
//! ACLs are attached to `(zone, path)` pairs and hold grant and deny bitmasks
//! per principal. Permission checks walk the path towards the root and let
//! the nearest ACL that mentions the caller (or one of its groups) decide.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use arbor_core::{
//!     AccessControlService, AclModification, AclOperation, MemoryStorage, Permission, Principal,
//!     ZONE_CONTENT,
//! };
//!
//! # fn main() -> arbor_core::Result<()> {
//! let service = AccessControlService::builder(Arc::new(MemoryStorage::new())).build()?;
//! let admin = service.manager(Principal::admin());
//! admin.set_acl(
//!     ZONE_CONTENT,
//!     "/docs",
//!     &[AclModification::grant("alice", Permission::CAN_READ, AclOperation::Or)],
//! )?;
//! assert!(admin.can(&Principal::user("alice"), ZONE_CONTENT, "docs/a", Permission::CAN_READ)?);
//! # Ok(())
//! # }
//! ```

/// The arbor-core crate version (matches `Cargo.toml`).
pub const ARBOR_CORE_VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod acl;
pub mod constants;
pub mod error;
pub mod io;
pub mod types;

pub use acl::{
    AccessControlManager, AccessControlService, AccessControlServiceBuilder, AccessListener,
    AclStore, AuthorizableLookup, LoggingAccessListener, MemoryAuthorizables, NoopAccessListener,
    PrincipalChainResolver, PrincipalValidator, PrincipalValidatorResolver, ValidationContext,
    install_default_acls,
};
pub use constants::*;
pub use error::{ArborError, Result};
pub use io::{AclStorage, LogStats, LogStorage, MemoryStorage, UpdateFn};
pub use types::{
    AccessControlConfig, AccessEvent, Acl, AclModification, AclOperation, EntryKey, Permission,
    Polarity, Principal, PrincipalKind, apply_modifications, deny_key, grant_key,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crate_version_matches_manifest() {
        assert_eq!(ARBOR_CORE_VERSION, env!("CARGO_PKG_VERSION"));
    }
}
