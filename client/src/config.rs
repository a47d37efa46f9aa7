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

//! Client configuration

use crate::{ClientError, Result, TextEncoding};
use std::time::Duration;

/// Console client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Upper bound for a single send or shutdown
    pub receive_timeout: Duration,

    /// Upper bound for establishing the connection
    pub connect_timeout: Duration,

    /// Size of one non-blocking receive
    pub receive_buffer_size: usize,

    /// Text encoding for both directions
    pub encoding: TextEncoding,

    /// How long a synchronous exchange waits for its response
    pub event_wait_time: Duration,

    /// Step between attempts of a bounded wait
    pub wait_step: Duration,

    /// Sleep between iterations of the background log loop
    pub poll_interval: Duration,

    /// Command sent when estimating the round trip budget
    pub probe_command: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            receive_timeout: Duration::from_millis(5000),
            connect_timeout: Duration::from_millis(5000),
            receive_buffer_size: 10240,
            encoding: TextEncoding::Utf8,
            event_wait_time: Duration::from_millis(2000),
            wait_step: Duration::from_millis(100),
            poll_interval: Duration::from_millis(10),
            probe_command: "help".to_string(),
        }
    }
}

impl ClientConfig {
    /// Create a configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the receive timeout
    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    /// Set the connection timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the receive buffer size
    pub fn with_receive_buffer_size(mut self, size: usize) -> Self {
        self.receive_buffer_size = size;
        self
    }

    /// Set the text encoding
    pub fn with_encoding(mut self, encoding: TextEncoding) -> Self {
        self.encoding = encoding;
        self
    }

    /// Set the wait budget for synchronous exchanges
    pub fn with_event_wait_time(mut self, wait: Duration) -> Self {
        self.event_wait_time = wait;
        self
    }

    /// Set the bounded wait step
    pub fn with_wait_step(mut self, step: Duration) -> Self {
        self.wait_step = step;
        self
    }

    /// Set the background loop poll interval
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Set the round trip probe command
    pub fn with_probe_command(mut self, command: impl Into<String>) -> Self {
        self.probe_command = command.into();
        self
    }

    /// Reject values the client cannot operate with
    pub fn validate(&self) -> Result<()> {
        if self.receive_buffer_size == 0 {
            return Err(ClientError::InvalidConfig(
                "receive_buffer_size must be non-zero".into(),
            ));
        }
        if self.wait_step.is_zero() {
            return Err(ClientError::InvalidConfig(
                "wait_step must be non-zero".into(),
            ));
        }
        if self.poll_interval.is_zero() {
            return Err(ClientError::InvalidConfig(
                "poll_interval must be non-zero".into(),
            ));
        }
        if self.receive_timeout.is_zero() || self.connect_timeout.is_zero() {
            return Err(ClientError::InvalidConfig(
                "timeouts must be non-zero".into(),
            ));
        }
        Ok(())
    }
}
