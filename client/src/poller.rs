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

//! Bounded "try until timeout" polling

use std::time::Duration;

/// Attempt counter for a wait bounded by a total budget
///
/// ```
/// use std::time::Duration;
/// use svconsole_client::BoundedPoller;
///
/// let mut poller = BoundedPoller::new(Duration::from_millis(200), Duration::from_millis(50));
/// let mut probes = 0;
/// while poller.can_continue() {
///     probes += 1;
///     poller.advance();
/// }
/// assert_eq!(probes, 4);
/// ```
#[derive(Debug, Clone)]
pub struct BoundedPoller {
    max: Duration,
    step: Duration,
    attempts: usize,
}

impl BoundedPoller {
    /// Create a poller allowing `max` in total, one `step` per attempt
    ///
    /// A zero step is raised to one millisecond so the attempt count stays
    /// finite.
    pub fn new(max: Duration, step: Duration) -> Self {
        Self {
            max,
            step: step.max(Duration::from_millis(1)),
            attempts: 0,
        }
    }

    /// Whether the budget allows another attempt
    pub fn can_continue(&self) -> bool {
        self.elapsed() < self.max
    }

    /// Record one spent attempt
    pub fn advance(&mut self) {
        self.attempts += 1;
    }

    /// Record one spent attempt and sleep for one step
    pub async fn wait(&mut self) {
        self.advance();
        tokio::time::sleep(self.step).await;
    }

    /// Attempts recorded so far
    pub fn count(&self) -> usize {
        self.attempts
    }

    /// Step between attempts
    pub fn step(&self) -> Duration {
        self.step
    }

    /// Budget consumed by the recorded attempts
    pub fn elapsed(&self) -> Duration {
        self.step
            .saturating_mul(u32::try_from(self.attempts).unwrap_or(u32::MAX))
    }

    /// Largest number of attempts this poller will allow
    pub fn max_attempts(&self) -> usize {
        let step = self.step.as_nanos();
        let max = self.max.as_nanos();
        usize::try_from(max.div_ceil(step)).unwrap_or(usize::MAX)
    }
}
