//! Error types shared across the crate.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, ArborError>;

#[derive(Debug, Error)]
pub enum ArborError {
    /// The caller lacks the permission required for the requested operation.
    #[error("{principal} lacks {permission} on {zone}:{path}")]
    AccessDenied {
        zone: String,
        path: String,
        principal: String,
        permission: String,
    },

    #[error("storage failure: {reason}")]
    Storage { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("acl log corrupted at offset {offset}: {reason}")]
    LogCorruption { offset: u64, reason: String },

    #[error("lock unavailable: {0}")]
    Lock(String),

    #[error("failed to decode stored value: {reason}")]
    Decode { reason: String },

    /// A modification batch was rejected before anything was written.
    #[error("invalid acl modification: {reason}")]
    InvalidModification { reason: String },

    #[error("invalid zone {zone:?}")]
    InvalidZone { zone: String },

    #[error("invalid configuration: {reason}")]
    Config { reason: String },
}

impl ArborError {
    #[must_use]
    pub fn is_access_denied(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }
}

impl From<bincode::error::EncodeError> for ArborError {
    fn from(err: bincode::error::EncodeError) -> Self {
        Self::Storage {
            reason: format!("encode failed: {err}"),
        }
    }
}

impl From<bincode::error::DecodeError> for ArborError {
    fn from(err: bincode::error::DecodeError) -> Self {
        Self::Decode {
            reason: err.to_string(),
        }
    }
}
