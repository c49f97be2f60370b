//! Public types exposed by the `arbor-core` crate.

pub mod acl;
pub mod config;
pub mod event;
pub mod permission;
pub mod principal;

pub use acl::{
    Acl, AclModification, AclOperation, EntryKey, Polarity, apply_modifications, deny_key,
    grant_key,
};
pub use config::AccessControlConfig;
pub use event::AccessEvent;
pub use permission::{Permission, combine, satisfies};
pub use principal::{Principal, PrincipalKind, principal_kind_prefix};
