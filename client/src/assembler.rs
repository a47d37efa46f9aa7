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

//! Line assembly for the console log stream
//!
//! Receive chunks arrive with arbitrary boundaries. [`LineAssembler`] keeps the
//! unterminated tail of the stream as raw bytes and only decodes a line once
//! its line feed has been seen, so a multi-byte character that straddles two
//! chunks is never split.

use crate::TextEncoding;
use bytes::BytesMut;
use std::collections::VecDeque;

const LINE_FEED: u8 = b'\n';
const CARRIAGE_RETURN: u8 = b'\r';

/// Turns a stream of raw receive chunks into complete text lines
#[derive(Debug, Default)]
pub struct LineAssembler {
    encoding: TextEncoding,
    pending: BytesMut,
    completed: VecDeque<String>,
}

impl LineAssembler {
    /// Create an empty assembler decoding with `encoding`
    pub fn new(encoding: TextEncoding) -> Self {
        Self {
            encoding,
            pending: BytesMut::new(),
            completed: VecDeque::new(),
        }
    }

    /// Append one receive chunk
    ///
    /// Trailing NUL padding left by fixed-size receive buffers is dropped.
    /// Every line feed completes a line; whatever follows the last one becomes
    /// the new pending fragment.
    pub fn append(&mut self, chunk: &[u8]) {
        let chunk = trim_nul_padding(chunk);
        if chunk.is_empty() {
            return;
        }

        // Only the newly appended bytes can contain a new delimiter.
        let mut search_from = self.pending.len();
        self.pending.extend_from_slice(chunk);

        while let Some(offset) = self.pending[search_from..]
            .iter()
            .position(|&b| b == LINE_FEED)
        {
            let line = self.pending.split_to(search_from + offset + 1);
            let mut body = &line[..line.len() - 1];
            if let [rest @ .., CARRIAGE_RETURN] = body {
                body = rest;
            }
            self.completed.push_back(self.encoding.decode(body));
            search_from = 0;
        }
    }

    /// Remove and return the oldest completed line
    pub fn take_completed_line(&mut self) -> Option<String> {
        self.completed.pop_front()
    }

    /// Iterate over and remove all completed lines in arrival order
    pub fn drain_completed(&mut self) -> impl Iterator<Item = String> + '_ {
        self.completed.drain(..)
    }

    /// Number of completed lines waiting to be taken
    pub fn completed_len(&self) -> usize {
        self.completed.len()
    }

    /// The unterminated tail of the stream, decoded
    pub fn pending_fragment(&self) -> String {
        self.encoding.decode(&self.pending)
    }

    /// Whether neither completed lines nor a pending fragment are held
    pub fn is_empty(&self) -> bool {
        self.completed.is_empty() && self.pending.is_empty()
    }

    /// Discard all buffered state
    pub fn clear(&mut self) {
        self.completed.clear();
        self.pending.clear();
    }
}

fn trim_nul_padding(chunk: &[u8]) -> &[u8] {
    let end = chunk
        .iter()
        .rposition(|&b| b != 0)
        .map_or(0, |last| last + 1);
    &chunk[..end]
}
