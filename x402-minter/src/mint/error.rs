//! Failure taxonomy for mint sessions

use std::fmt;

/// Why a unit, and with it the account's session, could not complete.
///
/// Retryable failures never appear here; the requester absorbs them until its
/// attempt budget runs out, which surfaces as `Exhausted`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintError {
    /// Malformed input, rejected before any network or signing cost
    Validation(String),
    /// The server signalled the resource will never be served (404, 410)
    Permanent { status: u16, body_preview: String },
    /// Attempt budget consumed without success
    Exhausted { attempts: u32, last_failure: String },
    /// Paid requests kept receiving 402 past the configured escalation limit
    Unpaid { attempts: u32 },
    /// Anything else: signing faults, client construction, crashed tasks
    Unexpected(String),
}

impl MintError {
    /// Stable label written to the report's `error_type` field
    pub fn kind(&self) -> &'static str {
        match self {
            MintError::Validation(_) => "ValidationError",
            MintError::Permanent { .. } => "PermanentFailure",
            MintError::Exhausted { .. } => "ExhaustedError",
            MintError::Unpaid { .. } => "UnpaidError",
            MintError::Unexpected(_) => "UnexpectedError",
        }
    }

    /// Failures the protocol anticipates, as opposed to faults worth a loud log line
    pub fn is_expected(&self) -> bool {
        !matches!(self, MintError::Unexpected(_))
    }
}

impl fmt::Display for MintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MintError::Validation(msg) => write!(f, "{}", msg),
            MintError::Permanent { status, .. } => write!(f, "Permanent failure: {}", status),
            MintError::Exhausted { attempts, last_failure } => {
                write!(f, "Mint failed after {} attempts (last: {})", attempts, last_failure)
            }
            MintError::Unpaid { attempts } => {
                write!(f, "Payment still not accepted after {} paid attempts", attempts)
            }
            MintError::Unexpected(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for MintError {}
