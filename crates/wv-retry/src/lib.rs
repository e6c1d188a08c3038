//! wv-retry
//!
//! Retry state machine shared by the scale poller and the print channel.
//!
//! # State diagram
//!
//! ```text
//!              failure (n < max)             failure (n == max)
//!    Idle ─────────────────────► Retrying(n) ──────────────────► Offline
//!     ▲                              │                              │
//!     └──────── success ─────────────┘                              │
//!     └──────────────────────── manual_retry() ─────────────────────┘
//! ```
//!
//! `Offline` is sticky: further failures and successes do not leave it. Only
//! an explicit [`RetryTracker::manual_retry`] resets the counter to zero.
//!
//! Pure logic. The caller supplies `now`; nothing here sleeps or reads a clock.

use std::time::{Duration, Instant};

use serde::Serialize;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// Delay growth between consecutive failed attempts.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Backoff {
    /// Every retry waits `interval`.
    Fixed,
    /// Retry `n` waits `interval * factor^(n-1)`, capped at `max`.
    Exponential { factor: f64, max: Duration },
}

/// Bound and pacing for one polled resource.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Consecutive failures that take the resource offline. Minimum 1.
    pub max_attempts: u32,
    pub interval: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            backoff: Backoff::Fixed,
        }
    }

    pub fn exponential(max_attempts: u32, interval: Duration, factor: f64, max: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            backoff: Backoff::Exponential { factor, max },
        }
    }

    fn bound(&self) -> u32 {
        self.max_attempts.max(1)
    }

    /// Delay before the retry that follows failure number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential { factor, max } => {
                let exp = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
                let secs = self.interval.as_secs_f64() * factor.max(1.0).powi(exp);
                if !secs.is_finite() || secs >= max.as_secs_f64() {
                    max
                } else {
                    Duration::from_secs_f64(secs)
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::fixed(3, Duration::from_millis(1000))
    }
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Externally visible phase of a polled resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum RetryPhase {
    Idle,
    Retrying { attempt: u32 },
    Offline,
}

/// Ephemeral per-resource retry bookkeeping.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RetryState {
    /// Consecutive failures since the last success or manual retry.
    pub attempts: u32,
    pub last_error: Option<String>,
    pub next_retry_at: Option<Instant>,
}

/// What the caller should do after a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    /// Bound reached (or already offline): stop until a manual retry.
    GiveUp,
}

#[derive(Debug, Clone)]
pub struct RetryTracker {
    policy: RetryPolicy,
    state: RetryState,
    offline: bool,
}

impl RetryTracker {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            state: RetryState::default(),
            offline: false,
        }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn state(&self) -> &RetryState {
        &self.state
    }

    pub fn phase(&self) -> RetryPhase {
        if self.offline {
            RetryPhase::Offline
        } else if self.state.attempts > 0 {
            RetryPhase::Retrying {
                attempt: self.state.attempts,
            }
        } else {
            RetryPhase::Idle
        }
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// A successful attempt clears the counter. No effect while offline.
    pub fn record_success(&mut self) {
        if self.offline {
            return;
        }
        self.state = RetryState::default();
    }

    /// Count one failure and decide whether to keep going.
    pub fn record_failure(&mut self, error: impl Into<String>, now: Instant) -> RetryDecision {
        self.state.last_error = Some(error.into());
        if self.offline {
            return RetryDecision::GiveUp;
        }

        self.state.attempts = self.state.attempts.saturating_add(1);
        if self.state.attempts >= self.policy.bound() {
            self.offline = true;
            self.state.next_retry_at = None;
            return RetryDecision::GiveUp;
        }

        let delay = self.policy.delay_for(self.state.attempts);
        self.state.next_retry_at = Some(now + delay);
        RetryDecision::RetryAfter(delay)
    }

    /// Operator escape from any phase: counter to zero, error cleared.
    pub fn manual_retry(&mut self) {
        self.offline = false;
        self.state = RetryState::default();
    }
}
