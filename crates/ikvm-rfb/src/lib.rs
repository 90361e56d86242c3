//! # ikvm-rfb
//!
//! RFB (VNC) server adapter: accepts connections, negotiates the handshake,
//! and on every render tick pushes whatever frame the capture engine last
//! produced to every client that wants one. Carries the vendor Tight/JPEG
//! framing, the Keyboard-LED-State and LastRect extensions, and the IVTP
//! out-of-band control channel used to force-disconnect sessions.
//!
//! [`Server`] does not own a socket-accept thread or the capture/input
//! devices: it is driven one tick at a time by `ikvm-manager`, which also
//! owns the real [`SessionRegistry`] and [`CoreSignal`] implementations
//! backed by the platform's property bus.

#![cfg_attr(docsrs, feature(doc_cfg))]

mod client;
mod config;
mod core_signal;
mod error;
mod handshake;
mod ident_crc;
mod ivtp;
mod protocol;
mod session;

pub use client::{ClientCapabilities, ClientData};
pub use config::{ServerConfig, ServerConfigBuilder, FALLBACK_SESSION_TIMEOUT};
pub use core_signal::{AlwaysActiveCoreSignal, CoreSignal};
pub use error::{Result, RfbError};
pub use session::{LocalSessionRegistry, SessionRegistry, UnregisterReason};

use ikvm_input::Input;
use ikvm_video::{CaptureEngine, FrameFormat};
use std::collections::HashMap;
use std::io::Write;
use std::net::{TcpListener, TcpStream};
use std::os::fd::AsFd;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

type ClientId = u32;

struct Client {
    stream: TcpStream,
    data: ClientData,
}

/// RFB server adapter. Mirrors the reference `Server` class, minus the
/// framebuffer/cursor bitmap plumbing this core has no use for.
pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
    clients: HashMap<ClientId, Client>,
    next_client_id: ClientId,
    active_session_ids: Vec<u8>,
    session_registry: Arc<dyn SessionRegistry>,
    core_signal: Arc<dyn CoreSignal>,
    width: u16,
    height: u16,
}

impl Server {
    pub fn bind(
        config: ServerConfig,
        session_registry: Arc<dyn SessionRegistry>,
        core_signal: Arc<dyn CoreSignal>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            config,
            listener,
            clients: HashMap::new(),
            next_client_id: 0,
            active_session_ids: Vec::new(),
            session_registry,
            core_signal,
            width: 0,
            height: 0,
        })
    }

    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Whether any client currently wants frames pushed to it. Drives the
    /// manager's status/render loop: capture only runs while this is true
    /// (or a screenshot has been requested).
    pub fn wants_frame(&self) -> bool {
        !self.clients.is_empty()
    }

    /// Accepts every connection currently pending, performing the RFB
    /// handshake and the 0→1 client-count `Input::connect` transition.
    pub fn accept_new_clients(&mut self, input: &mut Input) -> Result<()> {
        loop {
            match self.listener.accept() {
                Ok((stream, addr)) => {
                    debug!(%addr, "accepted RFB connection");
                    if let Err(e) = self.new_client(stream, input) {
                        warn!(%addr, error = %e, "client handshake failed");
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn new_client(&mut self, mut stream: TcpStream, input: &mut Input) -> Result<()> {
        handshake::perform(&mut stream, self.width, self.height, &self.config.desktop_name)?;
        let _ = stream.set_nodelay(true);

        if self.clients.is_empty() {
            input.connect()?;
            input.send_wakeup_packet()?;
        }

        let session_id = self.session_registry.register()?;
        self.active_session_ids.push(session_id);

        let mut data = ClientData::new(self.config.frame_rate);
        data.session_id = session_id;
        data.need_update = true;

        let id = self.next_client_id;
        self.next_client_id = self.next_client_id.wrapping_add(1);
        self.clients.insert(id, Client { stream, data });
        Ok(())
    }

    /// Drains every client socket that currently has a message waiting,
    /// without blocking. A client whose socket errors or closes is dropped.
    pub fn poll_client_events(&mut self, input: &mut Input) -> Result<()> {
        if self.clients.is_empty() {
            return Ok(());
        }

        let ids: Vec<ClientId> = self.clients.keys().copied().collect();
        let mut poll_fds: Vec<nix::poll::PollFd> = ids
            .iter()
            .map(|id| nix::poll::PollFd::new(self.clients[id].stream.as_fd(), nix::poll::PollFlags::POLLIN))
            .collect();

        match nix::poll::poll(&mut poll_fds, 0) {
            Ok(0) => return Ok(()),
            Ok(_) => {}
            Err(e) => {
                warn!(errno = e as i32, "poll() on RFB client sockets failed");
                return Ok(());
            }
        }

        for (id, poll_fd) in ids.iter().zip(poll_fds.iter()) {
            let readable = poll_fd.revents().map(|r| r.contains(nix::poll::PollFlags::POLLIN)).unwrap_or(false);
            if !readable {
                continue;
            }
            if let Err(e) = self.handle_client_event(*id, input) {
                debug!(client = id, error = %e, "RFB client connection closed");
                self.client_gone(*id, input);
            }
        }
        Ok(())
    }

    fn handle_client_event(&mut self, id: ClientId, input: &mut Input) -> Result<()> {
        let event = {
            let client = self.clients.get_mut(&id).expect("id came from self.clients keys");
            protocol::read_event(&mut client.stream)?
        };

        let client = self.clients.get_mut(&id).expect("id came from self.clients keys");
        client.data.touch_activity();

        match event {
            protocol::Event::SetEncodings { tight, keyboard_led_state, last_rect } => {
                client.data.capabilities = ClientCapabilities { tight, keyboard_led_state, last_rect };
            }
            protocol::Event::FramebufferUpdateRequest { .. } => {
                client.data.need_update = true;
            }
            protocol::Event::KeyEvent { down, keysym } => {
                input.key_event(down, keysym, id)?;
            }
            protocol::Event::PointerEvent { button_mask, x, y } => {
                input.pointer_event(button_mask, x, y, id)?;
            }
            protocol::Event::ClientCutText => {}
        }
        Ok(())
    }

    /// The render tick: for each client, gate on timeout and session
    /// liveness, skip/need-update bookkeeping, suppress identical frames by
    /// CRC, probe NumLock on a client's first frame, push the frame in the
    /// negotiated encoding, then the LED-state/LastRect extension messages.
    /// Releases the capture engine's current frame back to the driver once
    /// every client has been serviced, matching the reference `sendFrame`.
    pub fn send_frame(&mut self, capture: &mut CaptureEngine, input: &mut Input) -> Result<()> {
        if self.core_signal.kvm_status() {
            self.disconnect_all(input);
            capture.release_frames();
            return Ok(());
        }

        let data = capture.data().map(<[u8]>::to_vec);
        let bbox = capture.bounding_box();
        let state = capture.state();
        let width = state.width as u16;
        let height = state.height as u16;
        let frame_format = state.frame_format;

        let ids: Vec<ClientId> = self.clients.keys().copied().collect();
        for id in ids {
            if let Err(e) = self.service_client(id, data.as_deref(), bbox, width, height, frame_format, input) {
                debug!(client = id, error = %e, "dropping RFB client after send failure");
                self.client_gone(id, input);
            }
        }

        capture.release_frames();
        Ok(())
    }

    fn service_client(
        &mut self,
        id: ClientId,
        data: Option<&[u8]>,
        bbox: Option<ikvm_video::BoundingBox>,
        width: u16,
        height: u16,
        frame_format: FrameFormat,
        input: &mut Input,
    ) -> Result<()> {
        let session_id = {
            let client = self.clients.get(&id).expect("id came from self.clients keys");
            if client.data.idle_for() >= self.config.session_timeout {
                self.send_stop_session(id);
                self.client_gone(id, input);
                return Ok(());
            }
            client.data.session_id
        };

        if session_id != 0 && !self.core_signal.session_is_active(session_id) {
            self.send_stop_session(id);
            self.client_gone(id, input);
            return Ok(());
        }

        let client = self.clients.get_mut(&id).expect("id came from self.clients keys");

        if client.data.skip_frame > 0 {
            client.data.skip_frame -= 1;
            return Ok(());
        }

        if !client.data.need_update {
            return Ok(());
        }

        let Some(data) = data else { return Ok(()) };
        if !ikvm_video::is_valid_jpeg_trailer(data) && frame_format != FrameFormat::Reserved {
            debug!(client = id, "dropping frame without valid JPEG trailer");
            return Ok(());
        }

        let crc = if self.config.calc_frame_crc { ident_crc::frame_crc(data) } else { None };
        if let Some(crc) = crc {
            if crc == client.data.last_crc {
                return Ok(());
            }
        }

        if client.data.last_led_byte == ikvm_input::INITIAL_LED_STATE {
            self.probe_num_lock(input, id)?;
        }

        let client = self.clients.get_mut(&id).expect("id came from self.clients keys");
        let rects = protocol::rect_count_field(client.data.capabilities.keyboard_led_state || client.data.capabilities.last_rect);
        protocol::write_framebuffer_update_header(&mut client.stream, rects)?;

        match frame_format {
            FrameFormat::Reserved => {
                protocol::write_raw_rect(&mut client.stream, width, height, data)?;
            }
            FrameFormat::StandardJpeg | FrameFormat::PartialJpeg => {
                let (x, y, w, h) = bbox
                    .map(|b| (b.left as u16, b.top as u16, b.width as u16, b.height as u16))
                    .unwrap_or((0, 0, width, height));
                protocol::write_tight_jpeg_rect(&mut client.stream, x, y, w, h, data)?;
            }
        }

        if client.data.capabilities.keyboard_led_state {
            let led = input.keyboard_led_byte();
            if led != client.data.last_led_byte {
                protocol::write_led_state_rect(&mut client.stream, led)?;
                client.data.last_led_byte = led;
            }
        }

        if client.data.capabilities.last_rect {
            protocol::write_last_rect_marker(&mut client.stream)?;
        }

        client.stream.flush()?;

        if let Some(crc) = crc {
            client.data.last_crc = crc;
        }
        client.data.need_update = false;
        client.data.frame_sent = true;
        Ok(())
    }

    /// Synthetic toggle-and-restore NumLock probe: two key events to learn
    /// the host's current LED state via the out-report readback, then two
    /// more to put NumLock back the way it was.
    fn probe_num_lock(&self, input: &mut Input, client: ClientId) -> Result<()> {
        input.key_event(true, ikvm_input::keysym::XK_NUM_LOCK, client)?;
        input.key_event(false, ikvm_input::keysym::XK_NUM_LOCK, client)?;
        input.read_keyboard_out_report(Duration::from_millis(50))?;
        input.key_event(true, ikvm_input::keysym::XK_NUM_LOCK, client)?;
        input.key_event(false, ikvm_input::keysym::XK_NUM_LOCK, client)?;
        Ok(())
    }

    fn send_stop_session(&mut self, id: ClientId) {
        if let Some(client) = self.clients.get_mut(&id) {
            let frame = ivtp::stop_session_immediate();
            let _ = client.stream.write_all(&frame);
        }
    }

    fn disconnect_all(&mut self, input: &mut Input) {
        let ids: Vec<ClientId> = self.clients.keys().copied().collect();
        for id in ids {
            self.send_stop_session(id);
            self.client_gone(id, input);
        }
    }

    /// Unregisters the session, drops the socket, and on the 1→0 transition
    /// disconnects the HID relay and re-enables USB power save.
    fn client_gone(&mut self, id: ClientId, input: &mut Input) {
        let Some(client) = self.clients.remove(&id) else { return };
        if let Err(e) = self.session_registry.unregister(client.data.session_id, UnregisterReason::Logout) {
            warn!(client = id, error = %e, "session unregister failed");
        }
        self.active_session_ids.retain(|&s| s != client.data.session_id);
        let _ = client.stream.shutdown(std::net::Shutdown::Both);

        if self.clients.is_empty() {
            if let Err(e) = input.disconnect() {
                warn!(error = %e, "input disconnect failed after last client left");
            }
        }
    }

    /// Records new capture dimensions and re-arms every client's resize
    /// grace period (`skip_frame` back to `frame_rate`, full-rect forced).
    pub fn do_resize(&mut self, width: u16, height: u16) {
        self.width = width;
        self.height = height;
        for client in self.clients.values_mut() {
            client.data.reset_for_resize(self.config.frame_rate);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct NeverActiveCoreSignal;

    impl CoreSignal for NeverActiveCoreSignal {
        fn kvm_status(&self) -> bool {
            false
        }

        fn session_is_active(&self, _session_id: u8) -> bool {
            false
        }
    }

    fn test_config() -> ServerConfig {
        ServerConfig::builder().bind_addr("127.0.0.1:0").session_timeout(Duration::from_secs(5)).build()
    }

    fn attach_client(server: &mut Server, id: ClientId, data: ClientData) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let stream = TcpStream::connect(addr).unwrap();
        server.clients.insert(id, Client { stream, data });
    }

    #[test]
    fn test_bind_picks_ephemeral_port() {
        let server = Server::bind(test_config(), Arc::new(LocalSessionRegistry::default()), Arc::new(AlwaysActiveCoreSignal)).unwrap();
        assert_eq!(server.client_count(), 0);
    }

    #[test]
    fn test_do_resize_resets_client_skip_frame() {
        let mut server =
            Server::bind(test_config(), Arc::new(LocalSessionRegistry::default()), Arc::new(AlwaysActiveCoreSignal)).unwrap();
        let mut data = ClientData::new(30);
        data.skip_frame = 0;
        attach_client(&mut server, 0, data);
        server.do_resize(1024, 768);
        assert_eq!(server.clients[&0].data.skip_frame, 24);
        assert!(server.clients[&0].data.need_update);
    }

    #[test]
    fn test_service_client_drops_on_session_revoked() {
        let mut server =
            Server::bind(test_config(), Arc::new(LocalSessionRegistry::default()), Arc::new(NeverActiveCoreSignal)).unwrap();
        let mut data = ClientData::new(30);
        data.session_id = 3;
        data.need_update = true;
        attach_client(&mut server, 0, data);

        let mut input = Input::new(ikvm_input::HidConfig::default());
        server.service_client(0, None, None, 0, 0, FrameFormat::Reserved, &mut input).unwrap();

        assert_eq!(server.client_count(), 0);
    }

    #[test]
    fn test_service_client_drops_on_idle_timeout() {
        let config = ServerConfig::builder().bind_addr("127.0.0.1:0").session_timeout(Duration::from_millis(0)).build();
        let mut server = Server::bind(config, Arc::new(LocalSessionRegistry::default()), Arc::new(AlwaysActiveCoreSignal)).unwrap();
        let mut data = ClientData::new(30);
        data.need_update = true;
        attach_client(&mut server, 0, data);

        std::thread::sleep(Duration::from_millis(5));

        let mut input = Input::new(ikvm_input::HidConfig::default());
        server.service_client(0, None, None, 0, 0, FrameFormat::Reserved, &mut input).unwrap();

        assert_eq!(server.client_count(), 0);
    }
}
