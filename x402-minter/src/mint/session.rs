//! Sequential minting of N units for one account

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use super::error::MintError;
use super::requester::{X402Requester, preview};

/// Parsed body of one successful mint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitResult(pub Value);

impl UnitResult {
    /// JSON bodies are kept as-is; anything else is wrapped as `{"raw_text": ...}`
    pub fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(value) => Self(value),
            Err(_) => Self(json!({ "raw_text": body })),
        }
    }
}

/// A session that stopped early, with the units minted before the failure
#[derive(Debug)]
pub struct SessionFailure {
    pub completed: Vec<UnitResult>,
    pub error: MintError,
}

impl From<MintError> for SessionFailure {
    fn from(error: MintError) -> Self {
        Self {
            completed: Vec::new(),
            error,
        }
    }
}

pub struct MintSession {
    requester: X402Requester,
    tag: String,
}

impl MintSession {
    pub fn new(requester: X402Requester, tag: String) -> Self {
        Self { requester, tag }
    }

    pub fn address(&self) -> &str {
        self.requester.address()
    }

    /// Mint `unit_count` units one after another.
    ///
    /// The first unit that fails ends the session; later units are never attempted.
    pub async fn run(
        &mut self,
        url: &str,
        unit_count: u32,
    ) -> Result<Vec<UnitResult>, SessionFailure> {
        if unit_count == 0 {
            return Err(MintError::Validation("amount must be > 0".to_string()).into());
        }

        log::info!("{} Starting mint: {}x to {}", self.tag, unit_count, url);
        let mut results = Vec::with_capacity(unit_count as usize);

        for i in 1..=unit_count {
            let body = match self.requester.execute(url).await {
                Ok(body) => body,
                Err(error) => {
                    log::error!(
                        "{} Mint {}/{} failed permanently: {}",
                        self.tag,
                        i,
                        unit_count,
                        error
                    );
                    return Err(SessionFailure {
                        completed: results,
                        error,
                    });
                }
            };

            let unit = UnitResult::from_body(&body);
            log::info!(
                "{} Minted {}/{} • preview: {:?}",
                self.tag,
                i,
                unit_count,
                preview(&unit.0.to_string(), 160)
            );
            results.push(unit);
        }

        log::info!("{} Done. Total successful mints: {}", self.tag, results.len());
        Ok(results)
    }
}
