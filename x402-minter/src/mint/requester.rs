//! Single-unit request loop with exponential backoff

use rand::rngs::StdRng;
use serde_json::Value;
use std::time::Instant;

use super::error::MintError;
use super::retry::{AttemptOutcome, RetryPolicy, StatusClass};
use crate::x402::{MintTransport, PaymentHeaderBuilder, PaymentRequirement, TransportError};

/// Characters of a response body kept in log lines and errors
const BODY_PREVIEW_CHARS: usize = 200;

/// Drives request attempts for one account until a unit is minted or fails for good.
///
/// Owns the account's transport, signer and random source; nothing here is
/// shared with other accounts.
pub struct X402Requester {
    transport: Box<dyn MintTransport>,
    header_builder: PaymentHeaderBuilder,
    policy: RetryPolicy,
    requirement: Option<PaymentRequirement>,
    rng: StdRng,
    unpaid_streak: u32,
    tag: String,
}

impl X402Requester {
    pub fn new(
        transport: Box<dyn MintTransport>,
        header_builder: PaymentHeaderBuilder,
        policy: RetryPolicy,
        requirement: Option<PaymentRequirement>,
        rng: StdRng,
        tag: String,
    ) -> Self {
        Self {
            transport,
            header_builder,
            policy,
            requirement,
            rng,
            unpaid_streak: 0,
            tag,
        }
    }

    pub fn address(&self) -> &str {
        self.header_builder.address()
    }

    /// Mint one unit, returning the body of the 200 response.
    ///
    /// Sends at most `max_attempts` requests, each with a newly signed
    /// authorization once the payment requirements are known.
    pub async fn execute(&mut self, url: &str) -> Result<String, MintError> {
        self.policy.validate()?;

        let start = Instant::now();
        let max_attempts = self.policy.max_attempts;
        let mut last_failure = String::new();
        self.unpaid_streak = 0;

        for attempt in 1..=max_attempts {
            match self.attempt(url, attempt).await {
                AttemptOutcome::Success(body) => {
                    log::info!(
                        "{} Mint OK (HTTP 200) in {} ms",
                        self.tag,
                        start.elapsed().as_millis()
                    );
                    return Ok(body);
                }
                AttemptOutcome::Fatal(e) => return Err(e),
                AttemptOutcome::Retry(reason) => last_failure = reason,
            }

            if attempt < max_attempts {
                let delay = self.policy.delay_for_attempt(attempt, &mut self.rng);
                tokio::time::sleep(delay).await;
            }
        }

        log::error!(
            "{} Giving up after {} attempts (last: {})",
            self.tag,
            max_attempts,
            last_failure
        );
        Err(MintError::Exhausted {
            attempts: max_attempts,
            last_failure,
        })
    }

    async fn attempt(&mut self, url: &str, attempt: u32) -> AttemptOutcome {
        let max_attempts = self.policy.max_attempts;

        let header = match &self.requirement {
            Some(requirement) => match self.header_builder.build(requirement, &mut self.rng) {
                Ok(header) => Some(header),
                Err(e) => {
                    return AttemptOutcome::Fatal(MintError::Unexpected(format!(
                        "Failed to build payment header: {}",
                        e
                    )));
                }
            },
            None => None,
        };
        let paid = header.is_some();

        let response = match self.transport.get(url, header.as_deref()).await {
            Ok(response) => response,
            Err(e) => {
                self.unpaid_streak = 0;
                let kind = match e {
                    TransportError::Timeout(_) => "Timeout",
                    TransportError::Connection(_) => "Request error",
                };
                log::warn!(
                    "{} {} (attempt {}/{}): {}",
                    self.tag,
                    kind,
                    attempt,
                    max_attempts,
                    e
                );
                return AttemptOutcome::Retry(e.to_string());
            }
        };

        let code = response.status;
        let class = StatusClass::classify(code);
        if class != StatusClass::PaymentRequired {
            self.unpaid_streak = 0;
        }

        match class {
            StatusClass::Success => AttemptOutcome::Success(response.body),
            StatusClass::PaymentRequired => {
                if let Err(e) = self.learn_requirement(&response.body) {
                    log::error!("{} Invalid payment requirements in 402 body: {}", self.tag, e);
                    return AttemptOutcome::Fatal(e);
                }

                if paid {
                    self.unpaid_streak += 1;
                    if let Some(limit) = self.policy.unpaid_escalation_after {
                        if self.unpaid_streak >= limit {
                            log::error!(
                                "{} Payment not accepted after {} paid attempts; abort",
                                self.tag,
                                self.unpaid_streak
                            );
                            return AttemptOutcome::Fatal(MintError::Unpaid {
                                attempts: self.unpaid_streak,
                            });
                        }
                    }
                }

                log::info!(
                    "{} HTTP 402 (Payment Required); retrying ({}/{})",
                    self.tag,
                    attempt,
                    max_attempts
                );
                AttemptOutcome::Retry("HTTP 402".to_string())
            }
            StatusClass::Transient => {
                log::info!(
                    "{} HTTP {}; transient server error; retrying ({}/{})",
                    self.tag,
                    code,
                    attempt,
                    max_attempts
                );
                AttemptOutcome::Retry(format!("HTTP {}", code))
            }
            StatusClass::Permanent => {
                let body_preview = preview(&response.body, BODY_PREVIEW_CHARS);
                log::error!(
                    "{} Permanent failure HTTP {}; abort. Body: {:?}",
                    self.tag,
                    code,
                    body_preview
                );
                AttemptOutcome::Fatal(MintError::Permanent {
                    status: code,
                    body_preview,
                })
            }
            StatusClass::Unexpected => {
                log::warn!(
                    "{} Unexpected HTTP {}; body: {:?} (retry if quota remains)",
                    self.tag,
                    code,
                    preview(&response.body, BODY_PREVIEW_CHARS)
                );
                AttemptOutcome::Retry(format!("unexpected HTTP {}", code))
            }
        }
    }

    /// Pick up payment requirements advertised in a 402 body.
    ///
    /// Bodies without an `accepts` list leave the known requirements untouched.
    fn learn_requirement(&mut self, body: &str) -> Result<(), MintError> {
        let Ok(value) = serde_json::from_str::<Value>(body) else {
            return Ok(());
        };
        if value.get("accepts").is_none() {
            return Ok(());
        }

        let requirement = PaymentRequirement::from_body(&value).map_err(MintError::Validation)?;
        if self.requirement.as_ref() != Some(&requirement) {
            log::info!(
                "{} Payment requirements: {} to {}",
                self.tag,
                requirement.max_amount_required(),
                requirement.pay_to()
            );
            self.requirement = Some(requirement);
        }
        Ok(())
    }
}

/// First `max` characters of `text` on a single line
pub fn preview(text: &str, max: usize) -> String {
    text.chars().take(max).collect::<String>().replace('\n', " ")
}
