use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::mint::{MintSettings, RetryPolicy};
use crate::x402::{EnvelopeParams, PaymentRequirement};

const DEFAULT_MINT_URL: &str = "https://api.ping.observer/mint";

#[derive(Clone)]
pub struct Config {
    pub private_keys: Vec<String>,
    pub mint_url: String,
    pub amount_per_account: u32,
    pub max_workers: usize,
    pub envelope: EnvelopeParams,
    pub requirement: Option<PaymentRequirement>,
    pub request_timeout: Duration,
    pub retry: RetryPolicy,
    pub results_path: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        Self::from_vars(|key| env::var(key).ok())
    }

    /// Build the configuration from any variable source
    pub fn from_vars<F>(var: F) -> Result<Self, String>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut private_keys = split_keys(&var("PRIVATE_KEYS").unwrap_or_default());
        if let Some(path) = var("PRIVATE_KEYS_FILE") {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| format!("Failed to read PRIVATE_KEYS_FILE {}: {}", path, e))?;
            private_keys.extend(
                contents
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty() && !line.starts_with('#'))
                    .map(str::to_string),
            );
        }

        let amount_per_account: u32 = parse_or(&var, "AMOUNT_PER_ACCOUNT", 1)?;
        if amount_per_account == 0 {
            return Err("AMOUNT_PER_ACCOUNT must be > 0".to_string());
        }
        let max_workers: usize = parse_or(&var, "MAX_WORKERS", 10)?;
        if max_workers == 0 {
            return Err("MAX_WORKERS must be > 0".to_string());
        }

        let defaults = EnvelopeParams::default();
        let envelope = EnvelopeParams {
            network: var("X402_NETWORK").unwrap_or(defaults.network),
            scheme: var("X402_SCHEME").unwrap_or(defaults.scheme),
            x402_version: parse_or(&var, "X402_VERSION", defaults.x402_version)?,
        };

        let requirement = match (var("X402_PAY_TO"), var("X402_MAX_AMOUNT")) {
            (Some(pay_to), Some(amount)) => Some(PaymentRequirement::new(&pay_to, &amount)?),
            (None, None) => None,
            _ => return Err("X402_PAY_TO and X402_MAX_AMOUNT must be set together".to_string()),
        };

        let defaults = RetryPolicy::default();
        let retry = RetryPolicy {
            max_attempts: parse_or(&var, "MAX_ATTEMPTS", defaults.max_attempts)?,
            base_delay: Duration::from_millis(parse_or(&var, "BACKOFF_BASE_MS", 400)?),
            cap_delay: Duration::from_millis(parse_or(&var, "BACKOFF_CAP_MS", 6000)?),
            jitter: defaults.jitter,
            unpaid_escalation_after: parse_opt(&var, "UNPAID_ESCALATION_AFTER")?,
        };
        retry.validate().map_err(|e| e.to_string())?;
        // Without known requirements the first request of each unit only discovers them
        if requirement.is_none() && retry.max_attempts < 2 {
            return Err(
                "MAX_ATTEMPTS must be >= 2 unless X402_PAY_TO and X402_MAX_AMOUNT are set"
                    .to_string(),
            );
        }

        Ok(Self {
            private_keys,
            mint_url: var("MINT_URL").unwrap_or_else(|| DEFAULT_MINT_URL.to_string()),
            amount_per_account,
            max_workers,
            envelope,
            requirement,
            request_timeout: Duration::from_secs(parse_or(&var, "REQUEST_TIMEOUT_SECS", 10)?),
            retry,
            results_path: var("RESULTS_PATH").map(PathBuf::from),
        })
    }

    pub fn mint_settings(&self) -> MintSettings {
        MintSettings {
            url: self.mint_url.clone(),
            units_per_account: self.amount_per_account,
            envelope: self.envelope.clone(),
            retry: self.retry.clone(),
            requirement: self.requirement.clone(),
            rng_seed: None,
        }
    }
}

fn split_keys(raw: &str) -> Vec<String> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_opt<F, T>(var: &F, key: &str) -> Result<Option<T>, String>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match var(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| format!("{} must be a valid number", key)),
        None => Ok(None),
    }
}

fn parse_or<F, T>(var: &F, key: &str, default: T) -> Result<T, String>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    Ok(parse_opt(var, key)?.unwrap_or(default))
}
