//! Retry policy and HTTP outcome classification

use rand::Rng;
use std::time::Duration;

use super::error::MintError;

/// Lower and upper bound of the jitter factor applied to each delay
const JITTER_RANGE: (f64, f64) = (0.6, 1.4);

/// Statuses that clear up on their own
const TRANSIENT_STATUSES: [u16; 7] = [408, 425, 429, 500, 502, 503, 504];

/// Statuses that will never turn into a 200
const PERMANENT_STATUSES: [u16; 2] = [404, 410];

/// Configuration for the per-unit retry loop.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of requests per unit (1 = no retry)
    pub max_attempts: u32,
    /// Delay after the first failed attempt
    pub base_delay: Duration,
    /// Upper bound on the un-jittered delay
    pub cap_delay: Duration,
    /// Randomize delays to desynchronize concurrent accounts
    pub jitter: bool,
    /// Give up with `MintError::Unpaid` after this many consecutive paid 402s
    pub unpaid_escalation_after: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 12,
            base_delay: Duration::from_millis(400),
            cap_delay: Duration::from_secs(6),
            jitter: true,
            unpaid_escalation_after: None,
        }
    }
}

impl RetryPolicy {
    pub fn validate(&self) -> Result<(), MintError> {
        if self.max_attempts == 0 {
            return Err(MintError::Validation("max_attempts must be > 0".to_string()));
        }
        if self.unpaid_escalation_after == Some(0) {
            return Err(MintError::Validation(
                "unpaid_escalation_after must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Delay before the next request after `attempt` (1-based) failed.
    ///
    /// `min(cap, base * 2^(attempt-1))`, scaled by a factor in [0.6, 1.4) when
    /// jitter is enabled.
    pub fn delay_for_attempt<R: Rng>(&self, attempt: u32, rng: &mut R) -> Duration {
        let delay = self.capped_delay(attempt);
        if self.jitter {
            delay.mul_f64(rng.gen_range(JITTER_RANGE.0..JITTER_RANGE.1))
        } else {
            delay
        }
    }

    fn capped_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt.saturating_sub(1)).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.cap_delay)
    }
}

/// How an HTTP status code affects the retry loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusClass {
    Success,
    PaymentRequired,
    Transient,
    Permanent,
    Unexpected,
}

impl StatusClass {
    pub fn classify(status: u16) -> Self {
        match status {
            200 => StatusClass::Success,
            402 => StatusClass::PaymentRequired,
            s if TRANSIENT_STATUSES.contains(&s) => StatusClass::Transient,
            s if PERMANENT_STATUSES.contains(&s) => StatusClass::Permanent,
            _ => StatusClass::Unexpected,
        }
    }
}

/// Result of a single request attempt
#[derive(Debug)]
pub enum AttemptOutcome {
    Success(String),
    Retry(String),
    Fatal(MintError),
}
