//! Rendezvous primitive alternating T_server and T_video.
//!
//! `wait_server` clears `server_done` after observing it; `wait_video` does
//! not clear `video_done`, so video is free to race ahead across iterations
//! that need no resize. This asymmetry is load-bearing: see `Manager::run`
//! for why T_video must own `server_done == false` before touching capture
//! dimensions.

use std::sync::{Condvar, Mutex};

#[derive(Default)]
struct RendezvousState {
    server_done: bool,
    video_done: bool,
}

pub struct RendezvousGate {
    state: Mutex<RendezvousState>,
    condvar: Condvar,
}

impl Default for RendezvousGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RendezvousGate {
    pub fn new() -> Self {
        Self { state: Mutex::new(RendezvousState::default()), condvar: Condvar::new() }
    }

    pub fn set_server_done(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.server_done = true;
        self.condvar.notify_all();
    }

    pub fn set_video_done(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.video_done = true;
        self.condvar.notify_all();
    }

    /// Marks video not-done without notifying; used when T_video is about
    /// to start a resize and must be waited on by T_server.
    pub fn clear_video_done(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        state.video_done = false;
    }

    pub fn wait_server(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        while !state.server_done {
            state = self.condvar.wait(state).unwrap_or_else(|e| e.into_inner());
        }
        state.server_done = false;
    }

    pub fn wait_video(&self) {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        while !state.video_done {
            state = self.condvar.wait(state).unwrap_or_else(|e| e.into_inner());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_wait_server_clears_flag() {
        let gate = RendezvousGate::new();
        gate.set_server_done();
        gate.wait_server();
        let state = gate.state.lock().unwrap();
        assert!(!state.server_done);
    }

    #[test]
    fn test_wait_video_does_not_clear_flag() {
        let gate = RendezvousGate::new();
        gate.set_video_done();
        gate.wait_video();
        let state = gate.state.lock().unwrap();
        assert!(state.video_done);
    }

    #[test]
    fn test_rendezvous_round_trip_across_threads() {
        let gate = Arc::new(RendezvousGate::new());
        let gate2 = Arc::clone(&gate);
        let handle = thread::spawn(move || {
            gate2.wait_server();
            gate2.set_video_done();
        });
        thread::sleep(Duration::from_millis(10));
        gate.set_server_done();
        gate.wait_video();
        handle.join().unwrap();
    }
}
