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

//! TCP transport backed by a tokio socket

use super::Transport;
use crate::ClientConfig;
use async_trait::async_trait;
use futures::FutureExt;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::trace;

/// Outcome of a single readiness probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Probe {
    /// Nothing pending
    Idle,
    /// Bytes can be read without blocking
    Data(usize),
    /// End-of-stream, socket error or no socket at all
    Closed,
}

/// TCP transport
pub struct TcpTransport {
    stream: Option<TcpStream>,
    remote: Option<SocketAddr>,
    connect_timeout: Duration,
    io_timeout: Duration,
    scratch: Vec<u8>,
}

impl TcpTransport {
    /// Create an unconnected transport using the timeouts and buffer size of `config`
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            stream: None,
            remote: None,
            connect_timeout: config.connect_timeout,
            io_timeout: config.receive_timeout,
            scratch: vec![0; config.receive_buffer_size.max(1)],
        }
    }

    /// Poll the socket once without waiting
    fn probe(&mut self) -> Probe {
        let Some(stream) = self.stream.as_ref() else {
            return Probe::Closed;
        };
        match stream.peek(&mut self.scratch).now_or_never() {
            None => Probe::Idle,
            Some(Ok(0)) => Probe::Closed,
            Some(Ok(n)) => Probe::Data(n),
            Some(Err(e)) => {
                trace!(error = %e, "Readiness probe failed");
                Probe::Closed
            }
        }
    }

    fn stream(&self) -> io::Result<&TcpStream> {
        self.stream
            .as_ref()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&mut self, host: &str, port: u16) -> io::Result<SocketAddr> {
        let stream = timeout(self.connect_timeout, TcpStream::connect((host, port)))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
        stream.set_nodelay(true)?;
        let remote = stream.peer_addr()?;
        self.stream = Some(stream);
        self.remote = Some(remote);
        Ok(remote)
    }

    async fn send(&mut self, data: &[u8]) -> io::Result<usize> {
        let io_timeout = self.io_timeout;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| io::Error::from(io::ErrorKind::NotConnected))?;
        timeout(io_timeout, stream.write_all(data))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "send timed out"))??;
        Ok(data.len())
    }

    fn receive_available(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stream()?.try_read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(0),
            Err(e) => Err(e),
        }
    }

    fn is_readable(&mut self) -> bool {
        self.probe() != Probe::Idle
    }

    fn available(&mut self) -> usize {
        match self.probe() {
            Probe::Data(n) => n,
            Probe::Idle | Probe::Closed => 0,
        }
    }

    fn is_alive(&mut self) -> bool {
        self.probe() != Probe::Closed
    }

    async fn shutdown(&mut self) -> io::Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        timeout(self.io_timeout, stream.shutdown())
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "shutdown timed out"))?
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        self.remote
    }
}
