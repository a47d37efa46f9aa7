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

//! Client error types

use thiserror::Error;

/// Client result type
pub type Result<T> = std::result::Result<T, ClientError>;

/// Console client error type
///
/// Only conditions the caller has to act on are reported here. Timeouts,
/// disconnection and "no response yet" are expressed through return values.
#[derive(Debug, Error)]
pub enum ClientError {
    /// I/O error raised by the transport while sending
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration value out of range
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Text encoding name not recognised
    #[error("Unknown text encoding: {0}")]
    UnknownEncoding(String),

    /// Transport has not been connected
    #[error("Not connected")]
    NotConnected,
}

impl ClientError {
    /// Check if the error originates from the connection itself
    pub fn is_connection_error(&self) -> bool {
        matches!(self, ClientError::Io(_) | ClientError::NotConnected)
    }

    /// Check if the error was caused by a malformed configuration
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            ClientError::InvalidConfig(_) | ClientError::UnknownEncoding(_)
        )
    }
}
