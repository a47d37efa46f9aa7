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

//! Socket capability used by the console client
//!
//! The client never touches a socket directly. Everything goes through
//! [`Transport`], which keeps the readiness probes non-blocking and bounds the
//! blocking operations by the configured timeouts. [`TcpTransport`] is the
//! production implementation; [`MemoryTransport`] is a scripted fake for
//! deterministic tests.

mod memory;
mod tcp;

pub use self::memory::{MemoryTransport, MemoryTransportHandle};
pub use self::tcp::TcpTransport;

use async_trait::async_trait;
use std::io;
use std::net::SocketAddr;

/// Minimal socket capability
#[async_trait]
pub trait Transport: Send + 'static {
    /// Connect to `host:port` and return the resolved remote address
    async fn connect(&mut self, host: &str, port: u16) -> io::Result<SocketAddr>;

    /// Send the whole buffer, returning the number of bytes sent
    async fn send(&mut self, data: &[u8]) -> io::Result<usize>;

    /// Read whatever is available without blocking
    ///
    /// Returns `Ok(0)` when nothing is ready.
    fn receive_available(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Non-blocking poll: data or end-of-stream is pending
    fn is_readable(&mut self) -> bool;

    /// Number of bytes that can be read without blocking
    fn available(&mut self) -> usize;

    /// Shut down both directions and release the socket
    async fn shutdown(&mut self) -> io::Result<()>;

    /// Remote address once connected
    fn remote_addr(&self) -> Option<SocketAddr>;

    /// Whether the peer is still there
    ///
    /// A socket that polls readable yet has nothing to read has reached
    /// end-of-stream.
    fn is_alive(&mut self) -> bool {
        !(self.is_readable() && self.available() == 0)
    }
}
