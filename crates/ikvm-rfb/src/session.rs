//! Session registry integration.
//!
//! The reference platform registers every RFB connection with a session
//! manager over the property bus (service type KVM, privilege Admin) so
//! other BMC services can see and revoke active KVM sessions. That bus call
//! is implemented by `ikvm-manager` (which shares the monitor's connection);
//! this crate only depends on the trait, so client lifecycle can be unit
//! tested against a fake registry.

use crate::error::Result;

/// Reason passed to [`SessionRegistry::unregister`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnregisterReason {
    Logout,
}

/// Collaborator that registers/unregisters RFB sessions with the platform
/// session manager.
pub trait SessionRegistry: Send + Sync {
    /// Registers a new KVM session (service type KVM, privilege Admin, user
    /// id 0, user "local", ip "~") and returns the session id the registry
    /// assigned, truncated to 8 bits on ingest.
    fn register(&self) -> Result<u8>;

    fn unregister(&self, session_id: u8, reason: UnregisterReason) -> Result<()>;
}

/// In-memory registry used by tests and standalone deployments where no
/// session manager is present on the bus.
#[derive(Default)]
pub struct LocalSessionRegistry {
    next_id: std::sync::atomic::AtomicU8,
}

impl SessionRegistry for LocalSessionRegistry {
    fn register(&self) -> Result<u8> {
        let id = self.next_id.fetch_add(1, std::sync::atomic::Ordering::Relaxed).wrapping_add(1);
        Ok(id)
    }

    fn unregister(&self, _session_id: u8, _reason: UnregisterReason) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_registry_assigns_increasing_ids() {
        let registry = LocalSessionRegistry::default();
        let first = registry.register().unwrap();
        let second = registry.register().unwrap();
        assert_ne!(first, second);
    }
}
