//! Storage backends and the on-disk encoding of ACL values.

pub mod codec;
pub mod log;
pub mod storage;

pub use codec::{decode_acl, encode_acl};
pub use log::{LogStats, LogStorage};
pub use storage::{AclStorage, MemoryStorage, UpdateFn};
