//! Request pacing to stay within the rate limit of a public API.
use std::time::Duration;

use log::{debug, info};

/// Thresholds for pausing between iterations.
///
/// Defaults suit the anonymous BlockCypher limits (a few requests per second,
/// a couple of hundred per hour).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    /// Number of iterations after which the long cooldown is taken and the counter reset.
    /// Zero is treated as one.
    pub cooldown_every: u64,
    pub cooldown: Duration,
    /// Iterations whose counter is a multiple of this take the short pause.
    /// Zero disables the short pause.
    pub pause_every: u64,
    pub pause: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            cooldown_every: 200,
            cooldown: Duration::from_secs(60 * 60 + 10),
            pause_every: 3,
            pause: Duration::from_secs(10),
        }
    }
}

/// Counts iterations and decides how long to wait after each one.
#[derive(Debug, Clone)]
pub struct Pacer {
    policy: PacingPolicy,
    requests: u64,
}

impl Pacer {
    pub fn new(mut policy: PacingPolicy) -> Self {
        policy.cooldown_every = policy.cooldown_every.max(1);
        Self {
            policy,
            requests: 0,
        }
    }

    pub fn policy(&self) -> &PacingPolicy {
        &self.policy
    }

    /// Iterations counted since the last cooldown.
    pub fn requests(&self) -> u64 {
        self.requests
    }

    /// Counts one iteration and returns the pause it earns, if any.
    ///
    /// The cooldown check comes first, so an iteration that reaches the
    /// cooldown threshold never also takes the short pause.
    pub fn record(&mut self) -> Option<Duration> {
        self.requests += 1;
        if self.requests >= self.policy.cooldown_every {
            self.requests = 0;
            Some(self.policy.cooldown)
        } else if self.policy.pause_every != 0 && self.requests % self.policy.pause_every == 0 {
            Some(self.policy.pause)
        } else {
            None
        }
    }

    /// Counts one iteration and sleeps for the pause it earns.
    pub async fn pace(&mut self) {
        let Some(duration) = self.record() else {
            return;
        };
        // Counter is only zero right after a cooldown.
        if self.requests == 0 {
            info!("Cooling down for {}s", duration.as_secs());
        } else {
            debug!("Pausing for {}s", duration.as_secs());
        }
        tokio::time::sleep(duration).await;
    }
}

impl Default for Pacer {
    fn default() -> Self {
        Self::new(PacingPolicy::default())
    }
}
