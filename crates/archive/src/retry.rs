//! What to do with a transaction id whose fetch failed.
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Put the id back on the queue, waiting `delay` first.
    Retry { delay: Duration },
    /// Drop the id.
    GiveUp,
}

/// Decides whether a failed transaction fetch is attempted again.
pub trait RetryPolicy {
    /// `attempts` counts every failed fetch of the id so far, including this one.
    fn on_failure(&self, attempts: u32) -> RetryDecision;
}

/// Retries forever with no delay.
///
/// A transaction that can never be fetched stalls the walk.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl RetryPolicy for Unbounded {
    fn on_failure(&self, _attempts: u32) -> RetryDecision {
        RetryDecision::Retry {
            delay: Duration::ZERO,
        }
    }
}

/// Gives up after `max_attempts` failures, waiting `backoff` after each one before that.
#[derive(Debug, Clone, Copy)]
pub struct Bounded {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy for Bounded {
    fn on_failure(&self, attempts: u32) -> RetryDecision {
        if attempts >= self.max_attempts {
            RetryDecision::GiveUp
        } else {
            RetryDecision::Retry {
                delay: self.backoff,
            }
        }
    }
}

impl<P: RetryPolicy + ?Sized> RetryPolicy for Box<P> {
    fn on_failure(&self, attempts: u32) -> RetryDecision {
        (**self).on_failure(attempts)
    }
}
