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

//! Console Tail
//!
//! Connects to a server console, prints its log stream and sends each line
//! typed on stdin as a command, printing the response.
//!
//! Usage:
//!   cargo run --example console_tail -- 127.0.0.1 8081 [encoding]
//!
//! Set `RUST_LOG=svconsole_client=debug` for client diagnostics.

use std::time::Duration;
use svconsole_client::{ClientConfig, CommandResponse, TelnetClient, TelnetEvent, TextEncoding};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let host = args.get(1).cloned().unwrap_or_else(|| "127.0.0.1".to_string());
    let port: u16 = match args.get(2) {
        Some(port) => port.parse()?,
        None => 8081,
    };
    let encoding: TextEncoding = match args.get(3) {
        Some(name) => name.parse()?,
        None => TextEncoding::default(),
    };

    let config = ClientConfig::new()
        .with_encoding(encoding)
        .with_event_wait_time(Duration::from_secs(3));
    let client = TelnetClient::new(config)?;
    let mut events = client.subscribe_events();

    println!("Connecting to {}:{}...", host, port);
    if !client.connect(&host, port).await {
        eprintln!("Connection failed");
        return Ok(());
    }

    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                TelnetEvent::Started { remote } => println!("[Connected to {}]", remote),
                TelnetEvent::Log { line, .. } => println!("{}", line),
                TelnetEvent::Finished { remote } => {
                    println!("[Disconnected from {}]", remote);
                    break;
                }
            }
        }
    });

    let attempts = client
        .estimate_round_trip_budget(Duration::from_secs(10))
        .await?;
    println!("[Round trip took {} wait steps]", attempts);

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = stdin.next_line().await? {
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        if command == "exit" {
            break;
        }
        match client.exchange(command).await? {
            CommandResponse::Line(text) => print!("{}", text),
            CommandResponse::Blank(_) => println!("[Empty response]"),
            CommandResponse::TimedOut => println!("[No response]"),
        }
        if !client.is_connected().await {
            break;
        }
    }

    client.dispose().await;
    printer.await?;
    Ok(())
}
