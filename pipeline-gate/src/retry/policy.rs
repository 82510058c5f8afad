//! Retry policy with configurable backoff and jitter strategies.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Total attempts made for one operation, the initial call included.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// Backoff strategy for retry delays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * 2^(retry - 1)
    #[default]
    Exponential,
    /// delay = base * retry
    Linear,
    /// delay = base (constant)
    Constant,
}

impl BackoffStrategy {
    /// Calculates the un-jittered delay in milliseconds for a 1-based retry.
    #[must_use]
    pub fn delay_ms(self, base_ms: u64, retry: u32) -> u64 {
        let retry = retry.max(1);
        match self {
            Self::Exponential => {
                base_ms.saturating_mul(2u64.saturating_pow(retry - 1))
            }
            Self::Linear => base_ms.saturating_mul(u64::from(retry)),
            Self::Constant => base_ms,
        }
    }
}

/// Jitter strategy to prevent thundering herd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JitterStrategy {
    /// No jitter
    None,
    /// Random from 0 to delay
    Full,
    /// Half fixed, half random
    #[default]
    Equal,
}

impl JitterStrategy {
    /// Applies jitter to a delay in milliseconds.
    #[must_use]
    pub fn apply_ms(self, delay: u64) -> u64 {
        match self {
            Self::None => delay,
            Self::Full => {
                if delay == 0 {
                    0
                } else {
                    rand::thread_rng().gen_range(0..=delay)
                }
            }
            Self::Equal => {
                let half = delay / 2;
                if half == 0 {
                    delay
                } else {
                    (delay - half) + rand::thread_rng().gen_range(0..=half)
                }
            }
        }
    }
}

/// Configuration for retry behavior.
///
/// The default is the process-wide policy used by
/// [`PipelineClient`](crate::PipelineClient): five attempts, exponential
/// backoff from 500ms with equal jitter, capped at one minute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum attempts, including the initial one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Base delay before the first retry in milliseconds.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Maximum delay cap in milliseconds.
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Backoff strategy.
    #[serde(default)]
    pub backoff: BackoffStrategy,
    /// Jitter strategy.
    #[serde(default)]
    pub jitter: JitterStrategy,
}

const fn default_max_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

const fn default_base_delay_ms() -> u64 {
    500
}

const fn default_max_delay_ms() -> u64 {
    60_000
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            backoff: BackoffStrategy::Exponential,
            jitter: JitterStrategy::Equal,
        }
    }
}

impl RetryPolicy {
    /// Creates the default policy.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A policy with the default attempt ceiling and no waiting between
    /// attempts.
    #[must_use]
    pub fn immediate() -> Self {
        Self::default()
            .with_base_delay_ms(0)
            .with_jitter(JitterStrategy::None)
    }

    /// Sets the maximum attempts.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay_ms(mut self, delay: u64) -> Self {
        self.base_delay_ms = delay;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max_delay_ms(mut self, delay: u64) -> Self {
        self.max_delay_ms = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, strategy: BackoffStrategy) -> Self {
        self.backoff = strategy;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, strategy: JitterStrategy) -> Self {
        self.jitter = strategy;
        self
    }

    /// Attempt ceiling, never below one.
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Calculates the delay before the given 1-based retry.
    #[must_use]
    pub fn delay_for_retry(&self, retry: u32) -> Duration {
        let delay = self
            .backoff
            .delay_ms(self.base_delay_ms, retry)
            .min(self.max_delay_ms);
        Duration::from_millis(self.jitter.apply_ms(delay))
    }
}
