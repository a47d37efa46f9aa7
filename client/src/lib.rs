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

//! # Server Console Telnet Client
//!
//! Line-oriented telnet client for administering a dedicated game server
//! through its remote console.
//!
//! ## Features
//!
//! - **Live Log Streaming** - A background task assembles console output into
//!   lines and publishes them to subscribers
//! - **Synchronous Commands** - Send a command and wait, bounded, for its
//!   response on the same stream
//! - **Pluggable Transport** - TCP in production, scripted in-memory transport
//!   for tests
//! - **Deterministic Teardown** - Idempotent `dispose`, with release on drop as
//!   the fallback
//!
//! No telnet option negotiation is performed. Commands are terminated with
//! CR LF and IAC sequences pass through as payload.
//!
//! ## Quick Start
//!
//! ```no_run
//! use svconsole_client::{ClientConfig, TelnetClient, TelnetEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = TelnetClient::new(ClientConfig::default())?;
//!     let mut events = client.subscribe_events();
//!
//!     if !client.connect("127.0.0.1", 8081).await {
//!         return Ok(());
//!     }
//!
//!     let response = client.exchange("version").await?;
//!     println!("{}", response.text());
//!
//!     while let Some(event) = events.recv().await {
//!         if let TelnetEvent::Finished { .. } = event {
//!             break;
//!         }
//!         print!("{}", event);
//!     }
//!
//!     client.dispose().await;
//!     Ok(())
//! }
//! ```

mod assembler;
mod client;
mod config;
mod encoding;
mod error;
mod handler;
mod poller;
mod transport;

pub use assembler::LineAssembler;
pub use client::{
    CRLF, ClientState, CommandResponse, ConnectionState, SuppressionGuard, TelnetClient,
};
pub use config::ClientConfig;
pub use encoding::TextEncoding;
pub use error::{ClientError, Result};
pub use handler::{CallbackHandler, TelnetEvent, TelnetHandler};
pub use poller::BoundedPoller;
pub use transport::{MemoryTransport, MemoryTransportHandle, TcpTransport, Transport};
