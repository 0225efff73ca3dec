//! Retry policy and the per-dispatch delivery state machine.
//!
//! ```text
//! Pending -> Attempting -> Delivered
//!                       -> RetryScheduled -> Attempting
//!                       -> Exhausted
//!                       -> Rejected
//! ```
//!
//! Every transient failure is retried until the attempt budget runs out; the
//! failure classification is diagnostic only. A message that cannot be built
//! at all is `Rejected` immediately.

use std::time::Duration;

use serde::Serialize;

use crate::config::MailerConfig;
use crate::error::{DeliveryError, FailureKind};

/// Linear backoff: retry `n` waits `base_delay * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay: Duration) -> Self {
        Self {
            max_retries,
            base_delay,
        }
    }

    /// Total attempts including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.base_delay * retry
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

impl From<&MailerConfig> for RetryPolicy {
    fn from(config: &MailerConfig) -> Self {
        Self::new(config.max_retries, config.retry_base_delay)
    }
}

/// Result of one attempt, folded into the next state then discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    TransientFailure(FailureKind),
    FatalFailure(FailureKind),
}

impl From<&Result<String, DeliveryError>> for AttemptOutcome {
    fn from(result: &Result<String, DeliveryError>) -> Self {
        match result {
            Ok(_) => AttemptOutcome::Success,
            Err(e) if e.is_fatal() => AttemptOutcome::FatalFailure(e.kind()),
            Err(e) => AttemptOutcome::TransientFailure(e.kind()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryAttempt {
    /// Zero-based: 0 is the first attempt, 1 the first retry.
    pub attempt_number: u32,
    pub outcome: AttemptOutcome,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum DispatchState {
    Pending,
    Attempting { attempt: u32 },
    RetryScheduled { next_attempt: u32, delay_ms: u64 },
    Delivered,
    Exhausted,
    Rejected,
}

impl DispatchState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DispatchState::Delivered | DispatchState::Exhausted | DispatchState::Rejected
        )
    }

    /// Start (or resume after a scheduled retry) an attempt.
    pub fn begin(self) -> DispatchState {
        match self {
            DispatchState::Pending => DispatchState::Attempting { attempt: 0 },
            DispatchState::RetryScheduled { next_attempt, .. } => DispatchState::Attempting {
                attempt: next_attempt,
            },
            other => other,
        }
    }

    /// Fold an attempt's outcome into the next state.
    pub fn advance(self, attempt: &DeliveryAttempt, policy: &RetryPolicy) -> DispatchState {
        if !matches!(self, DispatchState::Attempting { .. }) {
            return self;
        }

        match attempt.outcome {
            AttemptOutcome::Success => DispatchState::Delivered,
            AttemptOutcome::FatalFailure(_) => DispatchState::Rejected,
            AttemptOutcome::TransientFailure(_) => {
                let retry = attempt.attempt_number + 1;
                if retry > policy.max_retries {
                    DispatchState::Exhausted
                } else {
                    DispatchState::RetryScheduled {
                        next_attempt: retry,
                        delay_ms: policy.delay_for(retry).as_millis() as u64,
                    }
                }
            }
        }
    }
}

impl std::fmt::Display for DispatchState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DispatchState::Pending => write!(f, "pending"),
            DispatchState::Attempting { attempt } => write!(f, "attempting({})", attempt),
            DispatchState::RetryScheduled { next_attempt, .. } => {
                write!(f, "retry_scheduled({})", next_attempt)
            }
            DispatchState::Delivered => write!(f, "delivered"),
            DispatchState::Exhausted => write!(f, "exhausted"),
            DispatchState::Rejected => write!(f, "rejected"),
        }
    }
}
