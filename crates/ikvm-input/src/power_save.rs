//! USB power-save toggle collaborator.
//!
//! On the reference platform this is a D-Bus call to
//! `xyz.openbmc_project.Settings`'s `xyz.openbmc_project.USB` interface,
//! `SetUSBPowerSaveMode(status)`. That call lives on the same bus connection
//! the monitor owns, so it is modeled here as a trait the manager crate
//! implements, keeping this crate free of a bus dependency for testing.

use crate::error::Result;

/// Collaborator that disables/re-enables host USB power save on the
/// first-client-connects / last-client-disconnects transitions.
pub trait PowerSaveControl: Send + Sync {
    fn set_power_save(&self, enabled: bool) -> Result<()>;
}

/// No-op implementation used when no power-save backend is configured.
#[derive(Debug, Default)]
pub struct NullPowerSaveControl;

impl PowerSaveControl for NullPowerSaveControl {
    fn set_power_save(&self, _enabled: bool) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_null_control_always_succeeds() {
        let control = NullPowerSaveControl;
        assert!(control.set_power_save(true).is_ok());
        assert!(control.set_power_save(false).is_ok());
    }
}
