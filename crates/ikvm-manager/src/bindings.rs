//! Glue implementing `ikvm-rfb`/`ikvm-input`'s collaborator traits on top of
//! `ikvm-monitor`'s shared state and D-Bus connection.
//!
//! `Server`/`Input` call these synchronously from T_server, while the bus
//! connection itself is driven asynchronously by T_bus; `handle.block_on`
//! bridges the two, the same way the reference implementation's
//! synchronous `sdbusplus` calls blocked inside the boost::asio reactor
//! thread they were issued from.

use ikvm_input::PowerSaveControl;
use ikvm_monitor::CoreContext;
use ikvm_rfb::{CoreSignal, SessionRegistry, UnregisterReason};
use tokio::runtime::Handle;
use tracing::warn;
use zbus::Connection;

/// [`CoreSignal`] backed by the monitor's shared state.
pub struct ContextCoreSignal {
    context: CoreContext,
}

impl ContextCoreSignal {
    pub fn new(context: CoreContext) -> Self {
        Self { context }
    }
}

impl CoreSignal for ContextCoreSignal {
    fn kvm_status(&self) -> bool {
        !self.context.service_enabled()
    }

    fn session_is_active(&self, session_id: u8) -> bool {
        self.context.session_is_active(session_id)
    }
}

/// [`SessionRegistry`] backed by the platform session manager.
pub struct DbusSessionRegistry {
    connection: Connection,
    handle: Handle,
    service: String,
    path: String,
}

impl DbusSessionRegistry {
    pub fn new(connection: Connection, handle: Handle) -> Self {
        Self {
            connection,
            handle,
            service: "xyz.openbmc_project.User.SessionManager".to_string(),
            path: "/xyz/openbmc_project/ikvm/sessions".to_string(),
        }
    }
}

impl SessionRegistry for DbusSessionRegistry {
    fn register(&self) -> ikvm_rfb::Result<u8> {
        let connection = self.connection.clone();
        let service = self.service.clone();
        let path = self.path.clone();
        self.handle
            .block_on(async move {
                let reply = connection
                    .call_method(Some(service.as_str()), path.as_str(), Some("xyz.openbmc_project.Ikvm.Sessions"), "SessionRegister", &(1u8, "Admin", 0u32, "local", "~"))
                    .await?;
                reply.body::<u32>()
            })
            .map(|id| u8::try_from(id).unwrap_or(u8::MAX))
            .map_err(|e: zbus::Error| ikvm_rfb::RfbError::SessionRegistry(e.to_string()))
    }

    fn unregister(&self, session_id: u8, _reason: UnregisterReason) -> ikvm_rfb::Result<()> {
        let connection = self.connection.clone();
        let service = self.service.clone();
        let path = self.path.clone();
        self.handle
            .block_on(async move {
                connection
                    .call_method(Some(service.as_str()), path.as_str(), Some("xyz.openbmc_project.Ikvm.Sessions"), "SessionUnregister", &(session_id,))
                    .await
            })
            .map(|_| ())
            .map_err(|e| ikvm_rfb::RfbError::SessionRegistry(e.to_string()))
    }
}

/// [`PowerSaveControl`] backed by the platform USB settings object.
pub struct DbusPowerSaveControl {
    connection: Connection,
    handle: Handle,
}

impl DbusPowerSaveControl {
    pub fn new(connection: Connection, handle: Handle) -> Self {
        Self { connection, handle }
    }
}

impl PowerSaveControl for DbusPowerSaveControl {
    fn set_power_save(&self, enabled: bool) -> ikvm_input::Result<()> {
        let connection = self.connection.clone();
        self.handle
            .block_on(async move {
                connection
                    .call_method(
                        Some("xyz.openbmc_project.Settings"),
                        "/xyz/openbmc_project/control/usb",
                        Some("xyz.openbmc_project.USB"),
                        "SetUSBPowerSaveMode",
                        &(enabled,),
                    )
                    .await
            })
            .map(|_| ())
            .map_err(|e| {
                warn!(error = %e, "SetUSBPowerSaveMode failed");
                ikvm_input::InputError::PowerSave(e.to_string())
            })
    }
}
