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

//! Client notification types and handler traits

use async_trait::async_trait;
use std::fmt;
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// Notification published by a [`TelnetClient`](crate::TelnetClient)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TelnetEvent {
    /// Connection established
    Started {
        /// Resolved remote address
        remote: SocketAddr,
    },
    /// One completed console log line
    Log {
        /// Remote address the line came from
        remote: SocketAddr,
        /// Line text without its terminator
        line: String,
    },
    /// Log streaming ended because the connection went away
    Finished {
        /// Remote address of the closed connection
        remote: SocketAddr,
    },
}

impl TelnetEvent {
    /// Remote address the event refers to
    pub fn remote(&self) -> SocketAddr {
        match self {
            TelnetEvent::Started { remote }
            | TelnetEvent::Log { remote, .. }
            | TelnetEvent::Finished { remote } => *remote,
        }
    }

    /// Log line carried by the event, if any
    pub fn line(&self) -> Option<&str> {
        match self {
            TelnetEvent::Log { line, .. } => Some(line),
            _ => None,
        }
    }
}

impl fmt::Display for TelnetEvent {
    /// Log events render as their line with a trailing newline, ready to be
    /// appended to a console view.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelnetEvent::Started { remote } => write!(f, "Connected to {}", remote),
            TelnetEvent::Log { line, .. } => writeln!(f, "{}", line),
            TelnetEvent::Finished { remote } => write!(f, "Disconnected from {}", remote),
        }
    }
}

/// Telnet client handler trait
///
/// Implement this trait to observe a console session. All methods have
/// default implementations that do nothing. Handlers are called from the
/// background log task and from `connect` without any client lock held.
///
/// # Example
///
/// ```no_run
/// use async_trait::async_trait;
/// use std::net::SocketAddr;
/// use svconsole_client::TelnetHandler;
///
/// struct PrintHandler;
///
/// #[async_trait]
/// impl TelnetHandler for PrintHandler {
///     async fn on_log(&self, remote: SocketAddr, line: &str) {
///         println!("[{}] {}", remote, line);
///     }
/// }
/// ```
#[async_trait]
pub trait TelnetHandler: Send + Sync + 'static {
    /// Whether this handler consumes log lines
    ///
    /// The background log task only runs when at least one subscribed
    /// handler returns `true`.
    fn wants_log(&self) -> bool {
        true
    }

    /// Called once the connection is established
    async fn on_started(&self, _remote: SocketAddr) {}

    /// Called for every completed log line, in arrival order
    async fn on_log(&self, _remote: SocketAddr, _line: &str) {}

    /// Called once when the background log task observes the connection is gone
    async fn on_finished(&self, _remote: SocketAddr) {}
}

/// Closure-based handler
///
/// # Example
///
/// ```no_run
/// use svconsole_client::CallbackHandler;
/// use std::sync::Arc;
///
/// let handler = Arc::new(CallbackHandler {
///     on_log: Some(Box::new(|_remote, line: &str| println!("{}", line))),
///     ..Default::default()
/// });
/// ```
#[derive(Default)]
pub struct CallbackHandler {
    /// Called on connection establishment
    pub on_started: Option<Box<dyn Fn(SocketAddr) + Send + Sync + 'static>>,

    /// Called on each log line
    pub on_log: Option<Box<dyn Fn(SocketAddr, &str) + Send + Sync + 'static>>,

    /// Called when streaming ends
    pub on_finished: Option<Box<dyn Fn(SocketAddr) + Send + Sync + 'static>>,
}

#[async_trait]
impl TelnetHandler for CallbackHandler {
    fn wants_log(&self) -> bool {
        self.on_log.is_some()
    }

    async fn on_started(&self, remote: SocketAddr) {
        if let Some(ref f) = self.on_started {
            f(remote);
        }
    }

    async fn on_log(&self, remote: SocketAddr, line: &str) {
        if let Some(ref f) = self.on_log {
            f(remote, line);
        }
    }

    async fn on_finished(&self, remote: SocketAddr) {
        if let Some(ref f) = self.on_finished {
            f(remote);
        }
    }
}

/// Handler forwarding every notification into a single FIFO channel
pub(crate) struct ChannelHandler {
    tx: mpsc::UnboundedSender<TelnetEvent>,
}

impl ChannelHandler {
    pub(crate) fn new() -> (Self, mpsc::UnboundedReceiver<TelnetEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl TelnetHandler for ChannelHandler {
    fn wants_log(&self) -> bool {
        !self.tx.is_closed()
    }

    async fn on_started(&self, remote: SocketAddr) {
        let _ = self.tx.send(TelnetEvent::Started { remote });
    }

    async fn on_log(&self, remote: SocketAddr, line: &str) {
        let _ = self.tx.send(TelnetEvent::Log {
            remote,
            line: line.to_string(),
        });
    }

    async fn on_finished(&self, remote: SocketAddr) {
        let _ = self.tx.send(TelnetEvent::Finished { remote });
    }
}
