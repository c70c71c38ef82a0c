//! Configuration for treekv
//!
//! Centralized client configuration with sensible defaults.

use std::time::Duration;

use crate::error::{KvError, Result};
use crate::key;

/// Client configuration
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Connection Configuration
    // -------------------------------------------------------------------------
    /// Address of the coordination service, e.g. `mem://local`.
    /// Interpretation is up to the `Connector` in use.
    pub address: String,

    /// Session timeout handed to the connector (milliseconds)
    pub session_timeout_ms: u64,

    // -------------------------------------------------------------------------
    // Namespace Configuration
    // -------------------------------------------------------------------------
    /// Every key lives under this prefix. `""` and `"/"` mean no prefix.
    /// The prefix nodes are created on construction if missing.
    pub prefix: String,

    // -------------------------------------------------------------------------
    // Retry Configuration
    // -------------------------------------------------------------------------
    /// How erase and commit react to structural races
    pub retry: RetryPolicy,
}

/// Retry behaviour for the erase and commit loops.
///
/// Only structural races (a subtree changing shape between listing and
/// submission) are retried. Version conflicts and backend failures never are.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryPolicy {
    /// Rebuild and resubmit immediately, forever
    Unbounded,

    /// At most `max_attempts` submissions, sleeping between them with an
    /// exponential backoff starting at `base_backoff_ms`, capped at
    /// `max_backoff_ms`
    Bounded {
        max_attempts: u32,
        base_backoff_ms: u64,
        max_backoff_ms: u64,
    },
}

impl RetryPolicy {
    /// Delay to sleep before submission number `attempt + 1`
    /// (`attempt` counts submissions already made, starting at 1)
    pub fn backoff(&self, attempt: u32) -> Duration {
        match *self {
            RetryPolicy::Unbounded => Duration::ZERO,
            RetryPolicy::Bounded {
                base_backoff_ms,
                max_backoff_ms,
                ..
            } => {
                let shift = attempt.saturating_sub(1).min(32);
                let ms = base_backoff_ms
                    .saturating_mul(1u64 << shift)
                    .min(max_backoff_ms);
                Duration::from_millis(ms)
            }
        }
    }

    /// Whether another submission is allowed after `attempt` submissions
    pub fn allows(&self, attempt: u32) -> bool {
        match *self {
            RetryPolicy::Unbounded => true,
            RetryPolicy::Bounded { max_attempts, .. } => attempt < max_attempts,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::Unbounded
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            address: "mem://local".to_string(),
            session_timeout_ms: 10_000,
            prefix: String::new(),
            retry: RetryPolicy::Unbounded,
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    /// Check the config before any connection is attempted
    pub fn validate(&self) -> Result<()> {
        if self.address.is_empty() {
            return Err(KvError::Config("address must not be empty".to_string()));
        }
        if let RetryPolicy::Bounded { max_attempts: 0, .. } = self.retry {
            return Err(KvError::Config(
                "bounded retry policy needs at least one attempt".to_string(),
            ));
        }
        key::disassemble_prefix(&self.prefix)
            .map_err(|e| KvError::Config(format!("bad prefix: {}", e)))?;
        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the service address
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.config.address = address.into();
        self
    }

    /// Set the namespace prefix
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.prefix = prefix.into();
        self
    }

    /// Set the session timeout (in milliseconds)
    pub fn session_timeout_ms(mut self, ms: u64) -> Self {
        self.config.session_timeout_ms = ms;
        self
    }

    /// Set the retry policy for erase and commit
    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.config.retry = policy;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
