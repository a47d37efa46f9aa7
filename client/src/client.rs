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

//! Console telnet client implementation
//!
//! A [`TelnetClient`] owns one transport behind a single mutex. Two kinds of
//! callers share it:
//!
//! - the background log task, which polls the socket, assembles lines and
//!   publishes them to subscribers;
//! - foreground operations (`write`, `read`, `exchange`), which run on the
//!   caller's task.
//!
//! A foreground exchange claims the incoming bytes by raising the suppression
//! flag for its duration. The background task keeps checking liveness while
//! the flag is raised but stops reading, so no byte is consumed twice.

use crate::handler::ChannelHandler;
use crate::{
    BoundedPoller, ClientConfig, LineAssembler, Result, TcpTransport, TelnetEvent, TelnetHandler,
    Transport,
};
use metrics::{counter, histogram};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, instrument, trace, warn};

/// Telnet line terminator
pub const CRLF: &[u8] = b"\r\n";

/// Client lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientState {
    /// Constructed, not yet connected
    Idle = 0,
    /// Transport established
    Connected = 1,
    /// Transport released; terminal
    Disposed = 2,
}

impl ClientState {
    /// Convert from u8 (for atomic operations)
    pub fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Idle,
            1 => Self::Connected,
            _ => Self::Disposed,
        }
    }

    /// Convert to u8 (for atomic operations)
    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

/// Connection state as observed on the transport
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Peer reachable
    Connected,
    /// Not connected, peer gone, or client disposed
    Disconnected,
}

/// Result of a synchronous command exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandResponse {
    /// Text received, NUL padding removed
    Line(String),
    /// Bytes received, but only whitespace and line terminators
    Blank(String),
    /// Nothing arrived within the wait budget
    TimedOut,
}

impl CommandResponse {
    fn from_received(text: &str) -> Self {
        if text.trim().is_empty() {
            CommandResponse::Blank(text.to_string())
        } else {
            CommandResponse::Line(text.to_string())
        }
    }

    /// Received text; empty when timed out
    pub fn text(&self) -> &str {
        match self {
            CommandResponse::Line(text) | CommandResponse::Blank(text) => text,
            CommandResponse::TimedOut => "",
        }
    }

    /// Consume into the received text; empty when timed out
    pub fn into_text(self) -> String {
        match self {
            CommandResponse::Line(text) | CommandResponse::Blank(text) => text,
            CommandResponse::TimedOut => String::new(),
        }
    }

    /// Whether the wait budget ran out
    pub fn is_timed_out(&self) -> bool {
        matches!(self, CommandResponse::TimedOut)
    }
}

/// Pauses background log delivery while alive
///
/// Returned by [`TelnetClient::suppress_streaming`].
#[must_use = "streaming resumes as soon as the guard is dropped"]
pub struct SuppressionGuard<'a> {
    depth: &'a AtomicUsize,
}

impl Drop for SuppressionGuard<'_> {
    fn drop(&mut self) {
        self.depth.fetch_sub(1, Ordering::AcqRel);
    }
}

struct ClientInner {
    config: ClientConfig,
    transport: Mutex<Option<Box<dyn Transport>>>,
    state: AtomicU8,
    suppression: AtomicUsize,
    streaming: AtomicBool,
    handlers: RwLock<Vec<Arc<dyn TelnetHandler>>>,
    remote: RwLock<Option<SocketAddr>>,
}

impl ClientInner {
    fn state(&self) -> ClientState {
        ClientState::from_u8(self.state.load(Ordering::Acquire))
    }

    fn is_suppressed(&self) -> bool {
        self.suppression.load(Ordering::Acquire) > 0
    }

    fn handlers(&self) -> Vec<Arc<dyn TelnetHandler>> {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn has_log_subscribers(&self) -> bool {
        self.handlers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .any(|handler| handler.wants_log())
    }

    async fn notify(&self, event: &TelnetEvent) {
        for handler in self.handlers() {
            match event {
                TelnetEvent::Started { remote } => handler.on_started(*remote).await,
                TelnetEvent::Log { remote, line } => {
                    if handler.wants_log() {
                        handler.on_log(*remote, line).await;
                    }
                }
                TelnetEvent::Finished { remote } => handler.on_finished(*remote).await,
            }
        }
    }

    /// Read whatever the transport has ready into `buf`
    ///
    /// Returns `None` once the transport is dead.
    fn receive(&self, transport: &mut dyn Transport, buf: &mut [u8]) -> Option<usize> {
        if !transport.is_alive() {
            return None;
        }
        match transport.receive_available(buf) {
            Ok(0) => Some(0),
            Ok(n) => {
                counter!("svconsole.bytes.received").increment(n as u64);
                trace!(bytes = n, "Received");
                Some(n)
            }
            Err(e) => {
                debug!(error = %e, "Receive failed");
                None
            }
        }
    }
}

/// Telnet client for a remote server console
///
/// # Example
///
/// ```no_run
/// use svconsole_client::{ClientConfig, TelnetClient};
///
/// # async fn example() -> svconsole_client::Result<()> {
/// let client = TelnetClient::new(ClientConfig::default())?;
/// let mut events = client.subscribe_events();
///
/// if client.connect("127.0.0.1", 8081).await {
///     let response = client.exchange("gettime").await?;
///     println!("{}", response.text());
///
///     while let Some(event) = events.recv().await {
///         print!("{}", event);
///     }
/// }
/// client.dispose().await;
/// # Ok(())
/// # }
/// ```
pub struct TelnetClient {
    inner: Arc<ClientInner>,
}

impl TelnetClient {
    /// Create a client using a TCP transport
    pub fn new(config: ClientConfig) -> Result<Self> {
        let transport = TcpTransport::new(&config);
        Self::with_transport(config, transport)
    }

    /// Create a client using the given transport
    pub fn with_transport<T: Transport>(config: ClientConfig, transport: T) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                transport: Mutex::new(Some(Box::new(transport))),
                state: AtomicU8::new(ClientState::Idle.as_u8()),
                suppression: AtomicUsize::new(0),
                streaming: AtomicBool::new(false),
                handlers: RwLock::new(Vec::new()),
                remote: RwLock::new(None),
            }),
        })
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Lifecycle state
    pub fn state(&self) -> ClientState {
        self.inner.state()
    }

    /// Remote address resolved by `connect`
    pub fn remote_addr(&self) -> Option<SocketAddr> {
        *self
            .inner
            .remote
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a handler
    ///
    /// Register before calling [`connect`](Self::connect): the background log
    /// task is only started if a handler wanting log lines exists by then.
    pub fn subscribe(&self, handler: Arc<dyn TelnetHandler>) {
        self.inner
            .handlers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(handler);
    }

    /// Register a channel receiving every notification in FIFO order
    pub fn subscribe_events(&self) -> mpsc::UnboundedReceiver<TelnetEvent> {
        let (handler, rx) = ChannelHandler::new();
        self.subscribe(Arc::new(handler));
        rx
    }

    /// Whether the background log task is running
    pub fn is_streaming(&self) -> bool {
        self.inner.streaming.load(Ordering::Acquire)
    }

    /// Whether background log delivery is currently paused
    pub fn is_suppressed(&self) -> bool {
        self.inner.is_suppressed()
    }

    /// Pause background log delivery until the guard is dropped
    pub fn suppress_streaming(&self) -> SuppressionGuard<'_> {
        self.inner.suppression.fetch_add(1, Ordering::AcqRel);
        SuppressionGuard {
            depth: &self.inner.suppression,
        }
    }

    /// Connect to the console at `host:port`
    ///
    /// Returns `false` if the client is not idle or the transport fails; the
    /// client then stays as it was and no notification is sent.
    #[instrument(skip(self))]
    pub async fn connect(&self, host: &str, port: u16) -> bool {
        let state = self.state();
        if state != ClientState::Idle {
            warn!(?state, "Connect rejected");
            return false;
        }

        let remote = {
            let mut guard = self.inner.transport.lock().await;
            let Some(transport) = guard.as_mut() else {
                return false;
            };
            if self.state() != ClientState::Idle {
                return false;
            }
            match transport.connect(host, port).await {
                Ok(remote) => remote,
                Err(e) => {
                    counter!("svconsole.connections.failed").increment(1);
                    warn!(error = %e, "Connection attempt failed");
                    return false;
                }
            }
        };

        if self
            .inner
            .state
            .compare_exchange(
                ClientState::Idle.as_u8(),
                ClientState::Connected.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_err()
        {
            return false;
        }
        *self
            .inner
            .remote
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(remote);

        counter!("svconsole.connections.total").increment(1);
        info!(%remote, "Connected");
        self.inner.notify(&TelnetEvent::Started { remote }).await;

        if self.inner.has_log_subscribers() {
            self.inner.streaming.store(true, Ordering::Release);
            tokio::spawn(stream_logs(self.inner.clone(), remote));
        } else {
            debug!("No log subscribers, background log task not started");
        }
        true
    }

    /// Connection state observed on the transport right now
    pub async fn connection_state(&self) -> ConnectionState {
        if self.state() != ClientState::Connected {
            return ConnectionState::Disconnected;
        }
        let mut guard = self.inner.transport.lock().await;
        match guard.as_mut() {
            Some(transport) => {
                if transport.is_alive() {
                    ConnectionState::Connected
                } else {
                    ConnectionState::Disconnected
                }
            }
            None => ConnectionState::Disconnected,
        }
    }

    /// Whether the peer is currently reachable
    pub async fn is_connected(&self) -> bool {
        self.connection_state().await == ConnectionState::Connected
    }

    /// Send text without a line terminator
    pub async fn write(&self, text: &str) -> Result<usize> {
        let data = self.inner.config.encoding.encode(text);
        self.write_bytes(&data).await
    }

    /// Send raw bytes without a line terminator
    ///
    /// Returns the number of bytes sent, or `0` once disposed.
    pub async fn write_bytes(&self, data: &[u8]) -> Result<usize> {
        let mut guard = self.inner.transport.lock().await;
        let Some(transport) = guard.as_mut() else {
            debug!("Write on disposed client ignored");
            return Ok(0);
        };
        let sent = transport.send(data).await?;
        counter!("svconsole.bytes.sent").increment(sent as u64);
        trace!(bytes = sent, "Sent");
        Ok(sent)
    }

    /// Send text followed by CR LF
    pub async fn write_line(&self, text: &str) -> Result<usize> {
        let data = self.inner.config.encoding.encode(text);
        self.write_line_bytes(&data).await
    }

    /// Send raw bytes followed by CR LF as a second send
    ///
    /// Returns the payload byte count; the terminator is not counted.
    pub async fn write_line_bytes(&self, data: &[u8]) -> Result<usize> {
        let mut guard = self.inner.transport.lock().await;
        let Some(transport) = guard.as_mut() else {
            debug!("Write on disposed client ignored");
            return Ok(0);
        };
        let sent = transport.send(data).await?;
        let terminator = transport.send(CRLF).await?;
        counter!("svconsole.bytes.sent").increment((sent + terminator) as u64);
        trace!(bytes = sent, "Sent line");
        Ok(sent)
    }

    /// Decode whatever is available right now
    ///
    /// Returns an empty string when not connected or nothing is pending.
    /// Bypasses line assembly; the text is passed through as received.
    pub async fn read(&self) -> String {
        if self.state() != ClientState::Connected {
            return String::new();
        }
        let mut buf = vec![0u8; self.inner.config.receive_buffer_size];
        let received = {
            let mut guard = self.inner.transport.lock().await;
            match guard.as_mut() {
                Some(transport) => self.inner.receive(&mut **transport, &mut buf),
                None => None,
            }
        };
        match received {
            Some(n) if n > 0 => self.inner.config.encoding.decode(&buf[..n]),
            _ => String::new(),
        }
    }

    /// Send `command` and wait for its response
    ///
    /// Waits at most the configured `event_wait_time`.
    pub async fn exchange(&self, command: &str) -> Result<CommandResponse> {
        self.exchange_within(command, self.inner.config.event_wait_time)
            .await
    }

    /// Send `command` and wait at most `max_wait` for its response
    ///
    /// Background log delivery is paused for the duration. Running out of
    /// time yields [`CommandResponse::TimedOut`]; only send failures are
    /// errors.
    pub async fn exchange_within(&self, command: &str, max_wait: Duration) -> Result<CommandResponse> {
        let (response, _) = self.guarded_exchange(command, max_wait).await?;
        Ok(response)
    }

    /// Send the probe command and count the wait attempts until a response
    ///
    /// Lets callers calibrate their own timeouts against observed latency.
    pub async fn estimate_round_trip_budget(&self, max_wait: Duration) -> Result<usize> {
        let command = self.inner.config.probe_command.clone();
        let (_, attempts) = self.guarded_exchange(&command, max_wait).await?;
        Ok(attempts)
    }

    #[instrument(skip(self))]
    async fn guarded_exchange(
        &self,
        command: &str,
        max_wait: Duration,
    ) -> Result<(CommandResponse, usize)> {
        let _suppression = self.suppress_streaming();
        let started = Instant::now();
        counter!("svconsole.exchanges.total").increment(1);

        self.write_line(command).await?;

        let mut poller = BoundedPoller::new(max_wait, self.inner.config.wait_step);
        let mut response = CommandResponse::TimedOut;
        while poller.can_continue() {
            let received = self.read().await;
            let received = received.trim_end_matches('\0');
            if !received.is_empty() {
                response = CommandResponse::from_received(received);
                break;
            }
            poller.wait().await;
        }

        if response.is_timed_out() {
            counter!("svconsole.exchanges.timed_out").increment(1);
            debug!(attempts = poller.count(), "No response within wait budget");
        }
        histogram!("svconsole.exchange.duration").record(started.elapsed().as_secs_f64());
        Ok((response, poller.count()))
    }

    /// Release the transport
    ///
    /// Shuts the connection down if it is still alive. Safe to call any number
    /// of times; every later operation behaves as disconnected.
    pub async fn dispose(&self) {
        let previous = ClientState::from_u8(
            self.inner
                .state
                .swap(ClientState::Disposed.as_u8(), Ordering::AcqRel),
        );
        if previous == ClientState::Disposed {
            trace!("Already disposed");
            return;
        }

        let mut guard = self.inner.transport.lock().await;
        if let Some(mut transport) = guard.take() {
            if transport.is_alive() {
                if let Err(e) = transport.shutdown().await {
                    debug!(error = %e, "Transport shutdown failed");
                }
            }
        }
        info!(remote = ?self.remote_addr(), "Client disposed");
    }
}

impl Drop for TelnetClient {
    fn drop(&mut self) {
        let previous = ClientState::from_u8(
            self.inner
                .state
                .swap(ClientState::Disposed.as_u8(), Ordering::AcqRel),
        );
        if previous == ClientState::Disposed {
            return;
        }
        // If the log task holds the lock it releases the transport itself on
        // its next iteration.
        if let Ok(mut guard) = self.inner.transport.try_lock() {
            guard.take();
        }
        debug!("Client dropped without dispose");
    }
}

/// Background log task
async fn stream_logs(inner: Arc<ClientInner>, remote: SocketAddr) {
    debug!(%remote, "Log stream started");
    let mut assembler = LineAssembler::new(inner.config.encoding);
    let mut buf = vec![0u8; inner.config.receive_buffer_size];

    loop {
        if inner.state() == ClientState::Disposed {
            break;
        }

        {
            let mut guard = inner.transport.lock().await;
            let Some(transport) = guard.as_mut() else {
                break;
            };
            if !transport.is_alive() {
                break;
            }
            if !inner.is_suppressed() {
                match inner.receive(&mut **transport, &mut buf) {
                    Some(n) => assembler.append(&buf[..n]),
                    None => break,
                }
            }
        }

        while let Some(line) = assembler.take_completed_line() {
            counter!("svconsole.lines.received").increment(1);
            inner.notify(&TelnetEvent::Log { remote, line }).await;
        }

        tokio::time::sleep(inner.config.poll_interval).await;
    }

    let fragment = assembler.pending_fragment();
    if !fragment.is_empty() {
        trace!("Flushing unterminated trailing line");
        inner
            .notify(&TelnetEvent::Log {
                remote,
                line: fragment,
            })
            .await;
    }

    if inner.state() == ClientState::Disposed {
        // Released here when drop found the lock busy.
        inner.transport.lock().await.take();
    }

    inner.streaming.store(false, Ordering::Release);
    debug!(%remote, "Log stream finished");
    inner.notify(&TelnetEvent::Finished { remote }).await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryTransport;
    use std::io;
    use tracing_test::traced_test;

    fn test_config() -> ClientConfig {
        ClientConfig::default()
            .with_wait_step(Duration::from_millis(10))
            .with_poll_interval(Duration::from_millis(5))
    }

    #[test]
    fn test_client_state_conversion() {
        for state in [
            ClientState::Idle,
            ClientState::Connected,
            ClientState::Disposed,
        ] {
            assert_eq!(ClientState::from_u8(state.as_u8()), state);
        }
        assert_eq!(ClientState::from_u8(200), ClientState::Disposed);
    }

    #[test]
    fn test_command_response() {
        assert_eq!(
            CommandResponse::from_received("Day 3\r\n"),
            CommandResponse::Line("Day 3\r\n".to_string())
        );
        assert_eq!(
            CommandResponse::from_received("\r\n"),
            CommandResponse::Blank("\r\n".to_string())
        );
        assert_eq!(CommandResponse::TimedOut.text(), "");
        assert!(CommandResponse::TimedOut.is_timed_out());
        assert_eq!(CommandResponse::Line("x".into()).into_text(), "x");
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let (transport, _) = MemoryTransport::new();
        let result = TelnetClient::with_transport(
            ClientConfig::default().with_receive_buffer_size(0),
            transport,
        );
        assert!(result.err().unwrap().is_config_error());
    }

    #[tokio::test]
    #[traced_test]
    async fn test_connect_failure_is_logged() {
        let (transport, handle) = MemoryTransport::new();
        handle.fail_connect(io::ErrorKind::ConnectionRefused);
        let client = TelnetClient::with_transport(test_config(), transport).unwrap();

        assert!(!client.connect("127.0.0.1", 8081).await);
        assert!(logs_contain("Connection attempt failed"));
    }

    #[tokio::test]
    async fn test_suppression_guard_nests() {
        let (transport, _) = MemoryTransport::new();
        let client = TelnetClient::with_transport(test_config(), transport).unwrap();

        let outer = client.suppress_streaming();
        let inner = client.suppress_streaming();
        drop(inner);
        assert!(client.is_suppressed());
        drop(outer);
        assert!(!client.is_suppressed());
    }

    #[tokio::test]
    async fn test_connect_rejected_when_not_idle() {
        let (transport, handle) = MemoryTransport::new();
        let client = TelnetClient::with_transport(test_config(), transport).unwrap();

        assert!(client.connect("127.0.0.1", 8081).await);
        assert!(!client.connect("127.0.0.1", 8081).await);
        assert_eq!(handle.connect_attempts(), 1);

        client.dispose().await;
        assert!(!client.connect("127.0.0.1", 8081).await);
        assert_eq!(handle.connect_attempts(), 1);
    }

    #[tokio::test]
    async fn test_drop_releases_transport() {
        let (transport, handle) = MemoryTransport::new();
        let client = TelnetClient::with_transport(test_config(), transport).unwrap();
        assert!(client.connect("127.0.0.1", 8081).await);

        drop(client);
        assert!(handle.is_released());
        assert!(!handle.is_shut_down());
    }
}
