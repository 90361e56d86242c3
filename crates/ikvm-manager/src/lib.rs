//! # ikvm-manager
//!
//! Coordinates the capture engine, RFB server and platform monitor across
//! exactly three OS threads: T_server (RFB accept/event pump), T_video
//! (capture/screenshot/send, the status-render loop), and T_bus (the
//! tokio runtime driving every `ikvm-monitor` subscription). T_server and
//! T_video alternate around a [`RendezvousGate`]; see [`Manager::run`] for
//! the exact ordering this enforces.

#![cfg_attr(docsrs, feature(doc_cfg))]

mod bindings;
mod config;
mod error;
mod rendezvous;

pub use config::{ManagerConfig, ManagerConfigBuilder};
pub use error::{ManagerError, Result};
pub use rendezvous::RendezvousGate;

use bindings::{ContextCoreSignal, DbusPowerSaveControl, DbusSessionRegistry};
use ikvm_input::Input;
use ikvm_monitor::{CoreContext, Monitor};
use ikvm_rfb::Server;
use ikvm_video::{CaptureEngine, FrameFormat};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
use tracing::{error, warn};

/// Owns the three threads and their shared collaborators. Dropping or
/// calling [`Manager::shutdown`] lets T_server/T_video exit at their next
/// rendezvous and stops the bus runtime.
pub struct Manager {
    core: CoreContext,
    gate: Arc<RendezvousGate>,
    server_handle: Option<thread::JoinHandle<()>>,
    video_handle: Option<thread::JoinHandle<()>>,
    runtime: tokio::runtime::Runtime,
    monitor: Monitor,
}

impl Manager {
    /// Connects to the platform bus, binds the RFB listener, and spawns
    /// T_server and T_video. Returns once both threads are running;
    /// T_bus's tasks were already spawned by [`Monitor::connect`].
    pub fn start(config: ManagerConfig) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread().enable_all().build()?;
        let handle = runtime.handle().clone();

        let monitor = runtime.block_on(Monitor::connect(config.monitor.clone()))?;
        let core = monitor.context().clone();
        let connection = monitor.connection().clone();

        let capture = Arc::new(Mutex::new(CaptureEngine::new(config.capture.clone())));
        let input = Arc::new(Mutex::new(Input::with_power_save(
            config.hid.clone(),
            Arc::new(DbusPowerSaveControl::new(connection.clone(), handle.clone())),
        )));
        let server = Arc::new(Mutex::new(Server::bind(
            config.server.clone(),
            Arc::new(DbusSessionRegistry::new(connection.clone(), handle.clone())),
            Arc::new(ContextCoreSignal::new(core.clone())),
        )?));

        let gate = Arc::new(RendezvousGate::new());
        let process_time = Duration::from_micros(config.server.process_time_micros());

        let server_handle = spawn_server_thread(Arc::clone(&gate), Arc::clone(&server), Arc::clone(&input), core.clone(), process_time);
        let video_handle = spawn_video_thread(Arc::clone(&gate), Arc::clone(&server), Arc::clone(&input), capture, core.clone(), config);

        Ok(Self { core, gate, server_handle: Some(server_handle), video_handle: Some(video_handle), runtime, monitor })
    }

    /// Requests cooperative shutdown and blocks until both render threads
    /// have exited.
    pub fn shutdown(&mut self) {
        self.core.request_shutdown();
        self.gate.set_server_done();
        self.gate.set_video_done();
        if let Some(handle) = self.server_handle.take() {
            let _ = handle.join();
        }
        if let Some(handle) = self.video_handle.take() {
            let _ = handle.join();
        }
    }

    pub fn context(&self) -> &CoreContext {
        &self.core
    }

    /// The platform monitor, kept alive here so its subscription tasks
    /// keep running for the lifetime of the manager.
    pub fn monitor(&self) -> &Monitor {
        &self.monitor
    }

    /// Blocks on SIGINT/SIGTERM using T_bus's own runtime, then runs
    /// [`Manager::shutdown`]. Convenience for a daemon's `main`.
    pub fn run_until_signal(&mut self) {
        self.runtime.block_on(async {
            let mut terminate = match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(signal) => signal,
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler");
                    return;
                }
            };
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        });
        self.shutdown();
    }
}

impl Drop for Manager {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn spawn_server_thread(
    gate: Arc<RendezvousGate>,
    server: Arc<Mutex<Server>>,
    input: Arc<Mutex<Input>>,
    core: CoreContext,
    process_time: Duration,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while core.continue_executing() {
            {
                let mut server = server.lock().unwrap_or_else(|e| e.into_inner());
                let mut input = input.lock().unwrap_or_else(|e| e.into_inner());
                if let Err(e) = server.accept_new_clients(&mut input) {
                    warn!(error = %e, "RFB accept failed");
                }
                if let Err(e) = server.poll_client_events(&mut input) {
                    warn!(error = %e, "RFB event pump failed");
                }
            }
            thread::sleep(process_time);
            gate.set_server_done();
            gate.wait_video();
        }
    })
}

fn spawn_video_thread(
    gate: Arc<RendezvousGate>,
    server: Arc<Mutex<Server>>,
    input: Arc<Mutex<Input>>,
    capture: Arc<Mutex<CaptureEngine>>,
    core: CoreContext,
    config: ManagerConfig,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        while core.continue_executing() {
            video_iteration(&gate, &server, &input, &capture, &core, &config);
        }
    })
}

/// The four-step status/render loop described for T_video: run capture
/// only while a client wants frames or a screenshot is pending, otherwise
/// idle the capture device; resize only at a rendezvous boundary that
/// blocks T_server first.
fn video_iteration(
    gate: &RendezvousGate,
    server: &Mutex<Server>,
    input: &Mutex<Input>,
    capture: &Mutex<CaptureEngine>,
    core: &CoreContext,
    config: &ManagerConfig,
) {
    let wants_frame = server.lock().unwrap_or_else(|e| e.into_inner()).wants_frame();
    let screenshot_requested = core.screenshot_requested();

    if wants_frame || screenshot_requested {
        let mut capture = capture.lock().unwrap_or_else(|e| e.into_inner());

        if let Err(e) = capture.start() {
            error!(error = %e, "capture start failed");
        }

        if screenshot_requested && capture.state().frame_format == FrameFormat::PartialJpeg {
            if let Err(e) = capture.format_change(FrameFormat::StandardJpeg) {
                warn!(error = %e, "format change to StandardJpeg for screenshot failed");
            }
        } else if !screenshot_requested && capture.state().frame_format != capture.state().original_frame_format {
            let original = capture.state().original_frame_format;
            if let Err(e) = capture.format_change(original) {
                warn!(error = %e, "format change back to steady-state encoding failed");
            }
        }

        if let Err(e) = capture.get_frame() {
            warn!(error = %e, "get_frame failed");
        }

        if screenshot_requested && capture.state().frame_format != FrameFormat::PartialJpeg {
            let host_power_is_off = core.host_power_state() == ikvm_monitor::HostPowerState::Off;
            let result = capture.screenshot(
                std::path::Path::new(&config.snapshot_path),
                std::path::Path::new(&config.no_signal_path),
                std::path::Path::new(&config.power_off_path),
                host_power_is_off,
            );
            if let Err(e) = result {
                error!(error = %e, "screenshot write failed");
            }
            core.clear_screenshot_request();
        }

        if wants_frame {
            let mut server = server.lock().unwrap_or_else(|e| e.into_inner());
            let mut input = input.lock().unwrap_or_else(|e| e.into_inner());
            if let Err(e) = server.send_frame(&mut capture, &mut input) {
                warn!(error = %e, "send_frame failed");
            }
        } else {
            capture.release_frames();
        }
    } else {
        let mut capture = capture.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = capture.stop() {
            warn!(error = %e, "capture stop failed");
        }
    }

    let needs_resize = {
        let mut capture = capture.lock().unwrap_or_else(|e| e.into_inner());
        capture.needs_resize().unwrap_or(false)
    };

    if needs_resize {
        gate.clear_video_done();
        gate.wait_server();

        let mut capture = capture.lock().unwrap_or_else(|e| e.into_inner());
        if let Err(e) = capture.resize() {
            error!(error = %e, "capture resize failed");
        }
        let width = capture.state().width;
        let height = capture.state().height;
        drop(capture);

        let mut server = server.lock().unwrap_or_else(|e| e.into_inner());
        server.do_resize(width.try_into().unwrap_or(u16::MAX), height.try_into().unwrap_or(u16::MAX));
        drop(server);

        gate.set_video_done();
    } else {
        gate.set_video_done();
        gate.wait_server();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manager_config_default_roundtrip() {
        let config = ManagerConfig::default();
        assert_eq!(config.capture.video_path, "/dev/video0");
    }
}
