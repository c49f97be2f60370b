//! Access control engine: ACL storage, path inheritance, principal chains.

pub mod bootstrap;
pub mod chain;
pub mod listener;
pub mod manager;
pub mod path;
pub mod store;
pub mod validator;

pub use bootstrap::install_default_acls;
pub use chain::{AuthorizableLookup, MemoryAuthorizables, PrincipalChainResolver};
pub use listener::{AccessListener, LoggingAccessListener, NoopAccessListener};
pub use manager::{AccessControlManager, AccessControlService, AccessControlServiceBuilder};
pub use path::{ancestors, normalize};
pub use store::AclStore;
pub use validator::{PrincipalValidator, PrincipalValidatorResolver, ValidationContext};
