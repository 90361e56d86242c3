//! Async monitor for the host power state, crash sensor, session lifecycle
//! properties and service-enable switch that live on the platform's D-Bus.
//!
//! The monitor owns one [`zbus::Connection`] and spawns one task per
//! watched property. Each task loops over `PropertiesChanged` signals for
//! its object and folds updates into a shared [`CoreContext`]; a task that
//! hits a transient D-Bus error logs it and keeps watching rather than
//! tearing the whole monitor down.

mod config;
mod core_state;
mod error;

pub use config::{MonitorConfig, MonitorConfigBuilder};
pub use core_state::{CoreContext, HostPowerState};
pub use error::{MonitorError, Result};

use futures_util::StreamExt;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use zbus::fdo::PropertiesProxy;
use zbus::zvariant::OwnedValue;
use zbus::Connection;

/// Handle to the running monitor. Dropping it aborts all subscription
/// tasks and the exported object server interface.
pub struct Monitor {
    connection: Connection,
    context: CoreContext,
    tasks: Vec<JoinHandle<()>>,
}

impl Monitor {
    /// Connects to the system bus, exports the screenshot-trigger object
    /// and spawns the property-watch tasks. Returns once the connection
    /// and an initial synchronous read of the host power state succeed.
    pub async fn connect(config: MonitorConfig) -> Result<Self> {
        let connection = Connection::system().await?;
        let context = CoreContext::new();

        prime_host_power_state(&connection, &config, &context).await;

        connection
            .object_server()
            .at(config.snapshot_object_path.clone(), ScreenshotTrigger { context: context.clone() })
            .await?;

        let mut tasks = Vec::new();
        tasks.push(spawn_host_power_watch(connection.clone(), config.clone(), context.clone()));
        tasks.push(spawn_crash_sensor_watch(connection.clone(), config.clone(), context.clone()));
        tasks.push(spawn_session_list_watch(connection.clone(), config.clone(), context.clone()));
        tasks.push(spawn_session_timeout_watch(connection.clone(), config.clone(), context.clone()));
        tasks.push(spawn_service_enable_watch(connection.clone(), config.clone(), context.clone()));

        Ok(Self { connection, context, tasks })
    }

    /// The connection backing this monitor, reusable by callers that need
    /// to export or watch additional interfaces on the same bus.
    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn context(&self) -> &CoreContext {
        &self.context
    }
}

impl Drop for Monitor {
    fn drop(&mut self) {
        for task in &self.tasks {
            task.abort();
        }
    }
}

async fn prime_host_power_state(connection: &Connection, config: &MonitorConfig, context: &CoreContext) {
    match read_property(connection, &config.host_power_service, &config.host_power_path, "xyz.openbmc_project.State.Host", "CurrentHostState").await {
        Ok(value) => context.set_host_power_state(power_state_from_value(&value)),
        Err(err) => warn!(error = %err, "could not read initial host power state"),
    }
}

fn power_state_from_value(value: &OwnedValue) -> HostPowerState {
    let Ok(state) = <&str>::try_from(value) else {
        return HostPowerState::Unknown;
    };
    let suffix = state.rsplit('.').next().unwrap_or(state);
    HostPowerState::from_state_suffix(suffix)
}

async fn build_properties_proxy<'a>(connection: &Connection, service: &str, path: &str) -> zbus::Result<PropertiesProxy<'a>> {
    PropertiesProxy::builder(connection)
        .destination(service.to_string())?
        .path(path.to_string())?
        .build()
        .await
}

async fn read_property(connection: &Connection, service: &str, path: &str, interface: &str, property: &str) -> Result<OwnedValue> {
    let proxy = build_properties_proxy(connection, service, path).await?;
    let interface = zbus::names::InterfaceName::try_from(interface).map_err(|_| MonitorError::object_server_export(path))?;
    Ok(proxy.get(interface, property).await?)
}

/// Subscribes to `PropertiesChanged` on `path`/`interface` and hands each
/// changed property to `on_change`. Runs until the connection closes; a
/// decode error on one signal is logged and skipped, not fatal.
async fn watch_properties<F>(connection: Connection, service: String, path: String, interface: String, mut on_change: F)
where
    F: FnMut(&str, &OwnedValue) + Send,
{
    let proxy = match build_properties_proxy(&connection, &service, &path).await {
        Ok(proxy) => proxy,
        Err(err) => {
            warn!(error = %err, %path, "failed to build properties proxy");
            return;
        }
    };

    let mut stream = match proxy.receive_properties_changed().await {
        Ok(stream) => stream,
        Err(err) => {
            warn!(error = %err, %path, "failed to subscribe to PropertiesChanged");
            return;
        }
    };

    while let Some(signal) = stream.next().await {
        let args = match signal.args() {
            Ok(args) => args,
            Err(err) => {
                warn!(error = %err, %path, "malformed PropertiesChanged signal");
                continue;
            }
        };
        if args.interface_name() != interface {
            continue;
        }
        for (name, value) in args.changed_properties() {
            on_change(name, value);
        }
    }

    debug!(%path, "PropertiesChanged stream ended");
}

fn spawn_host_power_watch(connection: Connection, config: MonitorConfig, context: CoreContext) -> JoinHandle<()> {
    tokio::spawn(async move {
        watch_properties(connection, config.host_power_service, config.host_power_path, "xyz.openbmc_project.State.Host".to_string(), move |name, value| {
            if name != "CurrentHostState" {
                return;
            }
            let state = power_state_from_value(value);
            info!(?state, "host power state changed");
            context.set_host_power_state(state);
        })
        .await;
    })
}

fn spawn_crash_sensor_watch(connection: Connection, config: MonitorConfig, context: CoreContext) -> JoinHandle<()> {
    tokio::spawn(async move {
        watch_properties(connection, config.crash_sensor_service, config.crash_sensor_path, "xyz.openbmc_project.Sensor.Value".to_string(), move |name, value| {
            if name != "Value" {
                return;
            }
            let crashed = i64::try_from(value).map(|v| v == 2).unwrap_or(false);
            if crashed {
                warn!("host crash sensor tripped, requesting screenshot");
                context.request_screenshot();
            }
        })
        .await;
    })
}

fn spawn_session_list_watch(connection: Connection, config: MonitorConfig, context: CoreContext) -> JoinHandle<()> {
    tokio::spawn(async move {
        watch_properties(connection, config.session_list_service, config.session_list_path, "xyz.openbmc_project.Ikvm.Sessions".to_string(), move |name, value| {
            if name != "ActiveSessionIds" {
                return;
            }
            match <Vec<u8>>::try_from(value.clone()) {
                Ok(ids) => {
                    debug!(count = ids.len(), "active session list changed");
                    context.set_active_session_ids(ids);
                }
                Err(err) => warn!(error = %err, "malformed ActiveSessionIds property"),
            }
        })
        .await;
    })
}

fn spawn_session_timeout_watch(connection: Connection, config: MonitorConfig, context: CoreContext) -> JoinHandle<()> {
    tokio::spawn(async move {
        watch_properties(connection, config.session_timeout_service, config.session_timeout_path, "xyz.openbmc_project.Ikvm.Sessions".to_string(), move |name, value| {
            if name != "SessionTimeout" {
                return;
            }
            match u64::try_from(value.clone()) {
                Ok(seconds) => {
                    info!(seconds, "session timeout changed");
                    context.set_session_timeout(seconds);
                }
                Err(err) => warn!(error = %err, "malformed SessionTimeout property"),
            }
        })
        .await;
    })
}

fn spawn_service_enable_watch(connection: Connection, config: MonitorConfig, context: CoreContext) -> JoinHandle<()> {
    tokio::spawn(async move {
        watch_properties(connection, config.service_enable_service, config.service_enable_path, "xyz.openbmc_project.Ikvm.Control".to_string(), move |name, value| {
            if name != "Enabled" {
                return;
            }
            match bool::try_from(value.clone()) {
                Ok(enabled) => {
                    info!(enabled, "kvm service enable switch changed");
                    context.set_service_enabled(enabled);
                }
                Err(err) => warn!(error = %err, "malformed Enabled property"),
            }
        })
        .await;
    })
}

/// Object this crate exports so other BMC interfaces can request an
/// out-of-band screenshot. Mirrors the `Trigger` bool property plus
/// `TriggerScreenshot` method shape used on the platform's own
/// screenshot-request objects.
struct ScreenshotTrigger {
    context: CoreContext,
}

#[zbus::interface(name = "xyz.openbmc_project.Ikvm.Snapshot")]
impl ScreenshotTrigger {
    #[zbus(property)]
    fn trigger(&self) -> bool {
        false
    }

    #[zbus(property)]
    async fn set_trigger(&mut self, value: bool) {
        if value {
            self.context.request_screenshot();
        }
    }

    async fn trigger_screenshot(&mut self, _client_id: i32) -> String {
        self.context.request_screenshot();
        "requested".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_state_from_value_unrecognized_is_unknown() {
        let value = OwnedValue::try_from("not-a-state").unwrap();
        assert_eq!(power_state_from_value(&value), HostPowerState::Unknown);
    }
}
