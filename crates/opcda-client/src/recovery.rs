// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Reconnect pacing.
//!
//! The recovery loop of a [`Connection`](crate::Connection) never gives up.
//! [`RecoveryPolicy`] only decides how long it sleeps between attempts.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default pause between reconnect attempts.
pub const DEFAULT_RECOVERY_INTERVAL: Duration = Duration::from_millis(100);

/// Default upper bound for growing pauses.
pub const DEFAULT_MAX_RECOVERY_INTERVAL: Duration = Duration::from_secs(30);

// =============================================================================
// RetryStrategy
// =============================================================================

/// How the pause grows with the attempt number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryStrategy {
    /// Same pause every time.
    #[default]
    Fixed,

    /// Linear backoff (interval * (attempt + 1)).
    Linear,

    /// Exponential backoff (interval * 2^attempt).
    Exponential,
}

impl RetryStrategy {
    /// Calculates the pause for a given attempt, starting at 0.
    pub fn delay(&self, interval: Duration, attempt: u32) -> Duration {
        match self {
            Self::Fixed => interval,
            Self::Linear => interval.saturating_mul(attempt.saturating_add(1)),
            Self::Exponential => interval.saturating_mul(2u32.saturating_pow(attempt)),
        }
    }
}

impl fmt::Display for RetryStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed => write!(f, "fixed"),
            Self::Linear => write!(f, "linear"),
            Self::Exponential => write!(f, "exponential"),
        }
    }
}

// =============================================================================
// RecoveryPolicy
// =============================================================================

/// Pause schedule of the recovery loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryPolicy {
    /// Base pause between attempts.
    #[serde(default = "default_interval", with = "humantime_serde")]
    pub interval: Duration,

    /// Cap applied to growing pauses.
    #[serde(default = "default_max_interval", with = "humantime_serde")]
    pub max_interval: Duration,

    /// Growth strategy.
    #[serde(default)]
    pub strategy: RetryStrategy,
}

fn default_interval() -> Duration {
    DEFAULT_RECOVERY_INTERVAL
}

fn default_max_interval() -> Duration {
    DEFAULT_MAX_RECOVERY_INTERVAL
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_RECOVERY_INTERVAL,
            max_interval: DEFAULT_MAX_RECOVERY_INTERVAL,
            strategy: RetryStrategy::Fixed,
        }
    }
}

impl RecoveryPolicy {
    /// Fixed pause of `interval`.
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    /// Sets the base pause.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Sets the cap.
    pub fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
    }

    /// Sets the strategy.
    pub fn with_strategy(mut self, strategy: RetryStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    /// Pause after the failed attempt `attempt` (0-based).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.strategy.delay(self.interval, attempt);
        delay.min(self.max_interval.max(self.interval))
    }
}
