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

//! Loopback console server used by the end-to-end tests
//!
//! [`ConsoleServer`] accepts a single client, greets it with a banner, answers
//! known commands with canned responses and can push log lines or hang up on
//! request.

use std::collections::HashMap;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::{Mutex, Notify, mpsc};
use tracing::debug;

enum ServerCommand {
    Log(String),
    Close,
}

/// Single-connection fake game server console
pub struct ConsoleServer {
    addr: SocketAddr,
    commands: mpsc::UnboundedSender<ServerCommand>,
    received: Arc<Mutex<Vec<String>>>,
    disconnected: Arc<Notify>,
}

impl ConsoleServer {
    /// Bind to an ephemeral loopback port and serve one client
    pub async fn start(banner: &[&str], responses: &[(&str, &str)]) -> io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let (tx, rx) = mpsc::unbounded_channel();
        let received = Arc::new(Mutex::new(Vec::new()));
        let disconnected = Arc::new(Notify::new());

        let banner: Vec<String> = banner.iter().map(|line| line.to_string()).collect();
        let responses: HashMap<String, String> = responses
            .iter()
            .map(|(command, response)| (command.to_string(), response.to_string()))
            .collect();

        tokio::spawn(serve(
            listener,
            banner,
            responses,
            rx,
            received.clone(),
            disconnected.clone(),
        ));

        Ok(Self {
            addr,
            commands: tx,
            received,
            disconnected,
        })
    }

    /// Address the server listens on
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Port the server listens on
    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Push a log line to the connected client
    pub fn log(&self, line: &str) {
        let _ = self.commands.send(ServerCommand::Log(line.to_string()));
    }

    /// Hang up on the connected client
    pub fn close(&self) {
        let _ = self.commands.send(ServerCommand::Close);
    }

    /// Command lines received so far
    pub async fn received(&self) -> Vec<String> {
        self.received.lock().await.clone()
    }

    /// Wait until the client has closed its side
    pub async fn wait_disconnected(&self) {
        self.disconnected.notified().await;
    }
}

async fn serve(
    listener: TcpListener,
    banner: Vec<String>,
    responses: HashMap<String, String>,
    mut commands: mpsc::UnboundedReceiver<ServerCommand>,
    received: Arc<Mutex<Vec<String>>>,
    disconnected: Arc<Notify>,
) -> io::Result<()> {
    let (stream, peer) = listener.accept().await?;
    debug!(%peer, "Console client connected");
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    for line in &banner {
        writer.write_all(format!("{}\r\n", line).as_bytes()).await?;
    }

    loop {
        tokio::select! {
            line = lines.next_line() => match line? {
                Some(line) => {
                    let command = line.trim_end_matches('\r').to_string();
                    received.lock().await.push(command.clone());
                    if let Some(response) = responses.get(&command) {
                        writer.write_all(format!("{}\r\n", response).as_bytes()).await?;
                    }
                }
                None => {
                    debug!(%peer, "Console client hung up");
                    disconnected.notify_one();
                    break;
                }
            },
            command = commands.recv() => match command {
                Some(ServerCommand::Log(line)) => {
                    writer.write_all(format!("{}\r\n", line).as_bytes()).await?;
                }
                Some(ServerCommand::Close) | None => {
                    debug!(%peer, "Closing console connection");
                    writer.shutdown().await?;
                    break;
                }
            },
        }
    }
    Ok(())
}
