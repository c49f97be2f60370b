//! Audit hooks for ACL mutations and denied access.
//!
//! Listeners run inline on the caller's thread, after the ACL write has been
//! stored and before `set_acl` or `check` returns. Their outcome never
//! affects the operation, but a slow listener delays it; listeners that do
//! real work should hand events off to their own queue.

use crate::types::AccessEvent;

/// Receives access events synchronously, on the thread that caused them.
pub trait AccessListener: Send + Sync {
    fn on_event(&self, event: &AccessEvent);
}

/// Listener that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopAccessListener;

impl AccessListener for NoopAccessListener {
    fn on_event(&self, _event: &AccessEvent) {}
}

/// Listener that writes events through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingAccessListener;

impl AccessListener for LoggingAccessListener {
    fn on_event(&self, event: &AccessEvent) {
        match event {
            AccessEvent::AclUpdated {
                zone,
                path,
                actor,
                modifications,
            } => {
                for modification in modifications {
                    tracing::info!(
                        acl.zone = %zone,
                        acl.path = %path,
                        acl.actor = %actor,
                        acl.key = %modification.key,
                        acl.bits = format_args!("{:#x}", modification.bits),
                        acl.op = modification.operation.label(),
                        "acl updated"
                    );
                }
            }
            AccessEvent::AccessDenied {
                zone,
                path,
                actor,
                permission,
            } => {
                tracing::warn!(
                    acl.zone = %zone,
                    acl.path = %path,
                    acl.actor = %actor,
                    acl.permission = %permission,
                    "access denied"
                );
            }
        }
    }
}
