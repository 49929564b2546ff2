// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-instance request throttling.

use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Enforces a minimum interval between successive requests issued by one
/// source instance. Not shared across instances, intentionally: two jobs
/// instantiating the same source type do not share throttling state.
pub struct Throttle {
    min_interval: Duration,
    last_request: Mutex<Option<Instant>>,
}

impl Throttle {
    /// Construct a throttle enforcing `min_interval` between requests.
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_request: Mutex::new(None),
        }
    }

    /// Sleep if the previous request finished too recently, then record
    /// this request's start time.
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}
