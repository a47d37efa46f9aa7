//
// Copyright 2017-2026 Hans W. Uhlig. All Rights Reserved.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//

//! Scripted in-memory transport
//!
//! Inbound traffic is a queue of steps consumed by `receive_available`: a
//! chunk is handed out (split if the caller's buffer is smaller), a silence
//! makes exactly one receive return nothing, and end-of-stream makes the
//! transport report itself dead.

use super::Transport;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

#[derive(Debug)]
enum Inbound {
    Chunk(Vec<u8>),
    Silence,
    Eof,
}

#[derive(Debug, Default)]
struct MemoryState {
    inbound: VecDeque<Inbound>,
    sent: Vec<Vec<u8>>,
    connect_error: Option<io::ErrorKind>,
    send_error: Option<io::ErrorKind>,
    connected: bool,
    shut_down: bool,
    released: bool,
    connect_attempts: usize,
}

type SharedState = Arc<Mutex<MemoryState>>;

fn lock(state: &SharedState) -> MutexGuard<'_, MemoryState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// In-memory [`Transport`] driven through a [`MemoryTransportHandle`]
#[derive(Debug)]
pub struct MemoryTransport {
    state: SharedState,
    remote: Option<SocketAddr>,
}

impl MemoryTransport {
    /// Create a transport and the handle scripting it
    pub fn new() -> (Self, MemoryTransportHandle) {
        let state = SharedState::default();
        let handle = MemoryTransportHandle {
            state: state.clone(),
        };
        (
            Self {
                state,
                remote: None,
            },
            handle,
        )
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&mut self, host: &str, port: u16) -> io::Result<SocketAddr> {
        let mut state = lock(&self.state);
        state.connect_attempts += 1;
        if let Some(kind) = state.connect_error {
            return Err(io::Error::new(kind, "scripted connect failure"));
        }
        let ip = host
            .parse::<IpAddr>()
            .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
        let remote = SocketAddr::new(ip, port);
        state.connected = true;
        self.remote = Some(remote);
        Ok(remote)
    }

    async fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(io::ErrorKind::NotConnected.into());
        }
        if let Some(kind) = state.send_error {
            return Err(io::Error::new(kind, "scripted send failure"));
        }
        state.sent.push(data.to_vec());
        Ok(data.len())
    }

    fn receive_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut state = lock(&self.state);
        if !state.connected {
            return Err(io::ErrorKind::NotConnected.into());
        }
        match state.inbound.pop_front() {
            None => Ok(0),
            Some(Inbound::Silence) => Ok(0),
            Some(Inbound::Eof) => {
                state.inbound.push_front(Inbound::Eof);
                Ok(0)
            }
            Some(Inbound::Chunk(mut chunk)) => {
                let n = chunk.len().min(buf.len());
                buf[..n].copy_from_slice(&chunk[..n]);
                if n < chunk.len() {
                    state.inbound.push_front(Inbound::Chunk(chunk.split_off(n)));
                }
                Ok(n)
            }
        }
    }

    fn is_readable(&mut self) -> bool {
        let state = lock(&self.state);
        !state.connected
            || matches!(
                state.inbound.front(),
                Some(Inbound::Chunk(_)) | Some(Inbound::Eof)
            )
    }

    fn available(&mut self) -> usize {
        let state = lock(&self.state);
        match state.inbound.front() {
            Some(Inbound::Chunk(chunk)) if state.connected => chunk.len(),
            _ => 0,
        }
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        let mut state = lock(&self.state);
        state.connected = false;
        state.shut_down = true;
        Ok(())
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote
    }
}

impl Drop for MemoryTransport {
    fn drop(&mut self) {
        let mut state = lock(&self.state);
        state.connected = false;
        state.released = true;
    }
}

/// Scripting and inspection handle for a [`MemoryTransport`]
#[derive(Debug, Clone)]
pub struct MemoryTransportHandle {
    state: SharedState,
}

impl MemoryTransportHandle {
    /// Queue an inbound chunk
    pub fn push_chunk(&self, chunk: impl AsRef<[u8]>) {
        lock(&self.state)
            .inbound
            .push_back(Inbound::Chunk(chunk.as_ref().to_vec()));
    }

    /// Queue `count` receives that return nothing
    pub fn push_silence(&self, count: usize) {
        let mut state = lock(&self.state);
        for _ in 0..count {
            state.inbound.push_back(Inbound::Silence);
        }
    }

    /// Queue end-of-stream; the transport reports dead once it is reached
    pub fn push_eof(&self) {
        lock(&self.state).inbound.push_back(Inbound::Eof);
    }

    /// Make every subsequent connect fail with `kind`
    pub fn fail_connect(&self, kind: io::ErrorKind) {
        lock(&self.state).connect_error = Some(kind);
    }

    /// Make every subsequent send fail with `kind`
    pub fn fail_send(&self, kind: io::ErrorKind) {
        lock(&self.state).send_error = Some(kind);
    }

    /// Payload of every successful send call, in order
    pub fn sent(&self) -> Vec<Vec<u8>> {
        lock(&self.state).sent.clone()
    }

    /// All sent bytes concatenated
    pub fn sent_bytes(&self) -> Vec<u8> {
        lock(&self.state).sent.concat()
    }

    /// Number of successful send calls
    pub fn send_count(&self) -> usize {
        lock(&self.state).sent.len()
    }

    /// Number of connect calls made
    pub fn connect_attempts(&self) -> usize {
        lock(&self.state).connect_attempts
    }

    /// Whether the transport is currently connected
    pub fn is_connected(&self) -> bool {
        lock(&self.state).connected
    }

    /// Whether `shutdown` has been called
    pub fn is_shut_down(&self) -> bool {
        lock(&self.state).shut_down
    }

    /// Whether the transport itself has been dropped
    pub fn is_released(&self) -> bool {
        lock(&self.state).released
    }

    /// Number of inbound steps not yet consumed
    pub fn pending_inbound(&self) -> usize {
        lock(&self.state).inbound.len()
    }
}
