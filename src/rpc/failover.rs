//! Failover controller
//!
//! When a selection is rejected, the controller hands out the statically
//! configured fallback endpoint — a bounded number of times. The attempt
//! counter lives for the life of the process and is reset only after a
//! subsequent selection succeeds.

use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, warn};

use crate::types::{Result, SwitchboardError};

pub struct FailoverController {
    attempts: AtomicU32,
    max_attempts: u32,
    fallback_endpoint: String,
}

impl FailoverController {
    pub fn new(max_attempts: u32, fallback_endpoint: String) -> Self {
        Self {
            attempts: AtomicU32::new(0),
            max_attempts,
            fallback_endpoint,
        }
    }

    /// Count one failover and return the fallback endpoint, unless the
    /// attempt budget is exhausted.
    ///
    /// With a maximum of 3: two calls return the fallback, the third fails
    /// with `MaxFailoverAttemptsExceeded`.
    pub fn handle_failover(&self) -> Result<String> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if attempt >= self.max_attempts {
            warn!(attempt, "Max failover attempts reached");
            return Err(SwitchboardError::MaxFailoverAttemptsExceeded {
                attempts: attempt,
            });
        }

        warn!(
            attempt,
            fallback = %self.fallback_endpoint,
            "Falling back to configured RPC endpoint"
        );
        Ok(self.fallback_endpoint.clone())
    }

    /// Reset the attempt counter after a successful selection
    pub fn reset(&self) {
        if self.attempts.swap(0, Ordering::SeqCst) > 0 {
            debug!("Failover counter reset");
        }
    }

    /// Current attempt count
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// The configured fallback endpoint
    pub fn fallback_endpoint(&self) -> &str {
        &self.fallback_endpoint
    }
}
