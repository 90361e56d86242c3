//! Platform state the server adapter reacts to but does not own.
//!
//! The reference design keeps crash detection and session-list membership
//! in shared platform state (`kvmStatus`, `activeSessionIds`) fed by the
//! async event monitor. `ikvm-manager` owns that state and the bus
//! subscriptions that mutate it; this crate only depends on the trait, so
//! `Server` can be driven in tests without a bus connection.

/// Collaborator exposing the platform state `Server::send_frame` consults
/// each tick: whether a crash/BSOD was observed (triggers a mass
/// disconnect) and whether a given session is still present in the
/// platform's active session list (session gating).
pub trait CoreSignal: Send + Sync {
    /// True once the host crash/BSOD sensor has fired; every connected
    /// client is sent `STOP_SESSION_IMMEDIATE` and dropped.
    fn kvm_status(&self) -> bool;

    /// False if `session_id` has been revoked from outside (e.g. an
    /// operator forcing a logout through another BMC interface).
    fn session_is_active(&self, session_id: u8) -> bool;
}

/// Fixed-answer [`CoreSignal`] for tests and standalone deployments with no
/// platform monitor attached.
pub struct AlwaysActiveCoreSignal;

impl CoreSignal for AlwaysActiveCoreSignal {
    fn kvm_status(&self) -> bool {
        false
    }

    fn session_is_active(&self, _session_id: u8) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_always_active_signal() {
        let signal = AlwaysActiveCoreSignal;
        assert!(!signal.kvm_status());
        assert!(signal.session_is_active(7));
    }
}
