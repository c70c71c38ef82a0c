//! Retry bookkeeping for the erase and commit loops

use std::thread;

use crate::config::RetryPolicy;
use crate::error::{KvError, Result};

/// Counts submissions of one erase/commit call against its policy
pub(crate) struct RetryLoop {
    policy: RetryPolicy,
    operation: &'static str,
    attempts: u32,
}

impl RetryLoop {
    pub(crate) fn new(policy: RetryPolicy, operation: &'static str) -> Self {
        Self {
            policy,
            operation,
            attempts: 0,
        }
    }

    /// Record that a batch is about to be submitted
    pub(crate) fn submit(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    /// A structural race invalidated the last batch. Waits out the backoff,
    /// or fails once the policy allows no more submissions.
    pub(crate) fn race(&mut self, target: &str) -> Result<()> {
        if !self.policy.allows(self.attempts) {
            tracing::debug!(
                "{} on {} gave up after {} attempts",
                self.operation,
                target,
                self.attempts
            );
            return Err(KvError::RetriesExhausted {
                attempts: self.attempts,
            });
        }

        let delay = self.policy.backoff(self.attempts);
        tracing::debug!(
            "{} on {} raced with a concurrent change (attempt {}), retrying in {:?}",
            self.operation,
            target,
            self.attempts,
            delay
        );
        if !delay.is_zero() {
            thread::sleep(delay);
        }
        Ok(())
    }
}
