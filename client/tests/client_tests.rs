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

//! Client behaviour against the scripted in-memory transport

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use svconsole_client::{
    CallbackHandler, ClientConfig, ClientState, CommandResponse, ConnectionState,
    MemoryTransport, MemoryTransportHandle, TelnetClient, TelnetEvent, TextEncoding,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::timeout;

const HOST: &str = "127.0.0.1";
const PORT: u16 = 8081;

fn remote() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], PORT))
}

fn test_config() -> ClientConfig {
    ClientConfig::default()
        .with_wait_step(Duration::from_millis(10))
        .with_poll_interval(Duration::from_millis(5))
}

/// Helper to create a client over a fresh memory transport
fn create_client() -> (TelnetClient, MemoryTransportHandle) {
    let (transport, handle) = MemoryTransport::new();
    let client = TelnetClient::with_transport(test_config(), transport).unwrap();
    (client, handle)
}

async fn next_event(rx: &mut UnboundedReceiver<TelnetEvent>) -> TelnetEvent {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

#[tokio::test(start_paused = true)]
async fn test_write_line_sends_payload_then_crlf() {
    let (client, handle) = create_client();
    assert!(client.connect(HOST, PORT).await);

    let sent = client.write_line("status").await.unwrap();
    assert_eq!(sent, 6);
    assert_eq!(handle.sent(), vec![b"status".to_vec(), b"\r\n".to_vec()]);
}

#[tokio::test(start_paused = true)]
async fn test_write_has_no_terminator() {
    let (client, handle) = create_client();
    assert!(client.connect(HOST, PORT).await);

    assert_eq!(client.write("say hi").await.unwrap(), 6);
    assert_eq!(client.write_bytes(&[0xFF, 0xF1]).await.unwrap(), 2);
    assert_eq!(handle.send_count(), 2);
    assert_eq!(handle.sent_bytes(), b"say hi\xFF\xF1".to_vec());
}

#[tokio::test(start_paused = true)]
async fn test_write_uses_configured_encoding() {
    let (transport, handle) = MemoryTransport::new();
    let config = test_config().with_encoding(TextEncoding::Latin1);
    let client = TelnetClient::with_transport(config, transport).unwrap();
    assert!(client.connect(HOST, PORT).await);

    assert_eq!(client.write_line("say Grüße").await.unwrap(), 9);
    assert_eq!(handle.sent()[0], b"say Gr\xFC\xDFe".to_vec());
}

#[tokio::test(start_paused = true)]
async fn test_streams_assembled_lines() {
    let (client, handle) = create_client();
    let mut events = client.subscribe_events();

    handle.push_chunk("OK\r\n");
    handle.push_chunk("partial");
    handle.push_chunk("-line\r\n");

    assert!(client.connect(HOST, PORT).await);
    assert!(client.is_streaming());

    assert_eq!(next_event(&mut events).await, TelnetEvent::Started { remote: remote() });
    assert_eq!(
        next_event(&mut events).await,
        TelnetEvent::Log {
            remote: remote(),
            line: "OK".to_string()
        }
    );
    let event = next_event(&mut events).await;
    assert_eq!(event.line(), Some("partial-line"));
    assert_eq!(event.to_string(), "partial-line\n");

    client.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_exchange_returns_nul_trimmed_response() {
    let (client, handle) = create_client();
    assert!(client.connect(HOST, PORT).await);

    handle.push_silence(3);
    handle.push_chunk(b"Commands:\0\0\0");

    let observe = async {
        tokio::time::sleep(Duration::from_millis(15)).await;
        client.is_suppressed()
    };
    let (response, suppressed_during) = tokio::join!(client.exchange("help"), observe);

    assert_eq!(response.unwrap(), CommandResponse::Line("Commands:".to_string()));
    assert!(suppressed_during);
    assert!(!client.is_suppressed());
    assert_eq!(handle.sent(), vec![b"help".to_vec(), b"\r\n".to_vec()]);
}

#[tokio::test(start_paused = true)]
async fn test_exchange_does_not_leak_response_to_log_stream() {
    let (client, handle) = create_client();
    let mut events = client.subscribe_events();
    assert!(client.connect(HOST, PORT).await);
    assert!(matches!(next_event(&mut events).await, TelnetEvent::Started { .. }));

    handle.push_silence(2);
    handle.push_chunk("Day 12, 06:41\r\n");
    let response = client.exchange("gettime").await.unwrap();
    assert_eq!(response.text(), "Day 12, 06:41\r\n");

    handle.push_chunk("INF Player joined\n");
    let event = next_event(&mut events).await;
    assert_eq!(event.line(), Some("INF Player joined"));

    client.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_exchange_times_out_without_data() {
    let (client, _handle) = create_client();
    assert!(client.connect(HOST, PORT).await);

    let response = client
        .exchange_within("lp", Duration::from_millis(200))
        .await
        .unwrap();
    assert!(response.is_timed_out());
    assert_eq!(response.into_text(), "");
    assert!(!client.is_suppressed());
}

#[tokio::test(start_paused = true)]
async fn test_exchange_reports_blank_response() {
    let (client, handle) = create_client();
    assert!(client.connect(HOST, PORT).await);

    handle.push_chunk("\r\n");
    let response = client.exchange("saveworld").await.unwrap();
    assert_eq!(response, CommandResponse::Blank("\r\n".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_exchange_send_failure_clears_suppression() {
    let (client, handle) = create_client();
    assert!(client.connect(HOST, PORT).await);

    handle.fail_send(io::ErrorKind::BrokenPipe);
    let err = client.exchange("help").await.unwrap_err();
    assert!(err.is_connection_error());
    assert!(!client.is_suppressed());
}

#[tokio::test(start_paused = true)]
async fn test_estimate_round_trip_budget_counts_attempts() {
    let (client, handle) = create_client();
    assert!(client.connect(HOST, PORT).await);

    handle.push_silence(4);
    handle.push_chunk("*** List of Commands: ***\r\n");
    let attempts = client
        .estimate_round_trip_budget(Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(attempts, 4);
    assert_eq!(handle.sent()[0], b"help".to_vec());

    let attempts = client
        .estimate_round_trip_budget(Duration::from_millis(50))
        .await
        .unwrap();
    assert_eq!(attempts, 5);
}

#[tokio::test(start_paused = true)]
async fn test_suppression_holds_back_log_lines() {
    let (client, handle) = create_client();
    let mut events = client.subscribe_events();
    assert!(client.connect(HOST, PORT).await);
    assert!(matches!(next_event(&mut events).await, TelnetEvent::Started { .. }));

    let guard = client.suppress_streaming();
    handle.push_chunk("held back\n");
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(events.try_recv().is_err());
    assert_eq!(handle.pending_inbound(), 1);

    drop(guard);
    assert_eq!(next_event(&mut events).await.line(), Some("held back"));

    client.dispose().await;
}

#[tokio::test(start_paused = true)]
async fn test_connect_failure_stays_idle() {
    let (client, handle) = create_client();
    let mut events = client.subscribe_events();
    handle.fail_connect(io::ErrorKind::ConnectionRefused);

    assert!(!client.connect(HOST, PORT).await);
    assert_eq!(client.state(), ClientState::Idle);
    assert!(client.remote_addr().is_none());
    assert!(!client.is_streaming());
    assert!(events.try_recv().is_err());
    assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_log_task_requires_log_subscriber() {
    let (client, _handle) = create_client();
    let started = Arc::new(AtomicUsize::new(0));
    let counter = started.clone();
    client.subscribe(Arc::new(CallbackHandler {
        on_started: Some(Box::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        })),
        ..Default::default()
    }));

    assert!(client.connect(HOST, PORT).await);
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert!(!client.is_streaming());
    assert!(client.is_connected().await);
}

#[tokio::test(start_paused = true)]
async fn test_end_of_stream_finishes_once() {
    let (client, handle) = create_client();
    let mut events = client.subscribe_events();
    handle.push_chunk("last words\ntail");
    handle.push_eof();

    assert!(client.connect(HOST, PORT).await);
    assert!(matches!(next_event(&mut events).await, TelnetEvent::Started { .. }));
    assert_eq!(next_event(&mut events).await.line(), Some("last words"));
    assert_eq!(next_event(&mut events).await.line(), Some("tail"));
    assert_eq!(
        next_event(&mut events).await,
        TelnetEvent::Finished { remote: remote() }
    );

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(events.try_recv().is_err());
    assert!(!client.is_streaming());
    assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
    assert_eq!(client.state(), ClientState::Connected);
}

#[tokio::test(start_paused = true)]
async fn test_dispose_twice() {
    let (client, handle) = create_client();
    let mut events = client.subscribe_events();
    assert!(client.connect(HOST, PORT).await);
    assert!(matches!(next_event(&mut events).await, TelnetEvent::Started { .. }));

    client.dispose().await;
    assert_eq!(client.connection_state().await, ConnectionState::Disconnected);
    client.dispose().await;
    assert_eq!(client.connection_state().await, ConnectionState::Disconnected);

    assert_eq!(client.state(), ClientState::Disposed);
    assert!(handle.is_shut_down());
    assert!(handle.is_released());
    assert_eq!(
        next_event(&mut events).await,
        TelnetEvent::Finished { remote: remote() }
    );
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(events.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_dispose_before_connect() {
    let (client, handle) = create_client();
    client.dispose().await;
    client.dispose().await;

    assert!(!client.connect(HOST, PORT).await);
    assert_eq!(handle.connect_attempts(), 0);
    assert!(!handle.is_shut_down());
    assert!(!client.is_connected().await);
}

#[tokio::test(start_paused = true)]
async fn test_operations_after_dispose_behave_disconnected() {
    let (client, handle) = create_client();
    assert!(client.connect(HOST, PORT).await);
    client.dispose().await;

    handle.push_chunk("ignored\n");
    assert_eq!(client.read().await, "");
    assert_eq!(client.write("x").await.unwrap(), 0);
    assert_eq!(client.write_line("x").await.unwrap(), 0);
    let response = client
        .exchange_within("help", Duration::from_millis(30))
        .await
        .unwrap();
    assert!(response.is_timed_out());
    assert_eq!(handle.send_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_read_passes_raw_text_through() {
    let (client, handle) = create_client();
    assert_eq!(client.read().await, "");
    assert!(client.connect(HOST, PORT).await);

    assert_eq!(client.read().await, "");
    handle.push_chunk("a\r\nb");
    assert_eq!(client.read().await, "a\r\nb");
}

#[tokio::test(start_paused = true)]
async fn test_write_failure_propagates() {
    let (client, handle) = create_client();
    assert!(client.connect(HOST, PORT).await);

    handle.fail_send(io::ErrorKind::ConnectionReset);
    let err = client.write_line("shutdown").await.unwrap_err();
    assert!(err.is_connection_error());
    assert_eq!(handle.send_count(), 0);
}
