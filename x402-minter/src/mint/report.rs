//! Per-account results and their JSON persistence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::error::MintError;
use super::session::UnitResult;

/// Number of trailing credential characters used to identify an account
const SUFFIX_CHARS: usize = 6;

/// Outcome of one account's session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountResult {
    #[serde(rename = "private_key_suffix")]
    pub account_suffix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    pub ok: bool,
    pub elapsed_sec: f64,
    /// Units minted; on failure, the ones completed before it
    #[serde(default)]
    pub results: Vec<UnitResult>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_type: Option<String>,
}

impl AccountResult {
    pub fn success(
        account_suffix: String,
        address: Option<String>,
        elapsed: Duration,
        results: Vec<UnitResult>,
    ) -> Self {
        Self {
            account_suffix,
            address,
            ok: true,
            elapsed_sec: round_millis(elapsed),
            results,
            error: None,
            error_type: None,
        }
    }

    pub fn failure(
        account_suffix: String,
        address: Option<String>,
        elapsed: Duration,
        results: Vec<UnitResult>,
        error: &MintError,
    ) -> Self {
        Self {
            account_suffix,
            address,
            ok: false,
            elapsed_sec: round_millis(elapsed),
            results,
            error: Some(error.to_string()),
            error_type: Some(error.kind().to_string()),
        }
    }
}

fn round_millis(elapsed: Duration) -> f64 {
    (elapsed.as_secs_f64() * 1000.0).round() / 1000.0
}

/// Identify an account in logs and reports without exposing its key
pub fn account_suffix(credential: &str) -> String {
    let chars: Vec<char> = credential.trim().chars().collect();
    let start = chars.len().saturating_sub(SUFFIX_CHARS);
    chars[start..].iter().collect()
}

/// All account results, in the order the sessions finished
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AggregateReport {
    pub accounts: Vec<AccountResult>,
}

impl AggregateReport {
    pub fn push(&mut self, result: AccountResult) {
        self.accounts.push(result);
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn success_count(&self) -> usize {
        self.accounts.iter().filter(|r| r.ok).count()
    }

    pub fn failure_count(&self) -> usize {
        self.len() - self.success_count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &AccountResult> {
        self.accounts.iter().filter(|r| !r.ok)
    }
}

/// Default report file name, e.g. `x402_results_20250101-120000.json`
pub fn default_results_path(now: DateTime<Utc>) -> PathBuf {
    PathBuf::from(format!("x402_results_{}.json", now.format("%Y%m%d-%H%M%S")))
}

/// Write the report as a pretty-printed JSON array and return the path used
pub fn write_json(report: &AggregateReport, path: Option<&Path>) -> Result<PathBuf, String> {
    let path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_results_path(Utc::now()));

    let json = serde_json::to_string_pretty(report)
        .map_err(|e| format!("Failed to serialize results: {}", e))?;
    std::fs::write(&path, json)
        .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;

    log::info!("[MINTER] Saved results JSON to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn sample_report() -> AggregateReport {
        let mut report = AggregateReport::default();
        report.push(AccountResult::success(
            "2ff80a".to_string(),
            Some("0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".to_string()),
            Duration::from_millis(1500),
            vec![UnitResult(json!({ "id": 1 })), UnitResult(json!({ "raw_text": "ok" }))],
        ));
        report.push(AccountResult::failure(
            "b6786d".to_string(),
            None,
            Duration::from_millis(250),
            vec![UnitResult(json!({ "id": 2 }))],
            &MintError::Permanent { status: 410, body_preview: String::new() },
        ));
        report
    }

    #[test]
    fn test_counts() {
        let report = sample_report();
        assert_eq!(report.success_count(), 1);
        assert_eq!(report.failure_count(), 1);
        assert_eq!(report.success_count() + report.failure_count(), report.len());
        assert_eq!(report.failures().next().unwrap().account_suffix, "b6786d");
        assert!(!report.is_empty());
        assert!(AggregateReport::default().is_empty());
    }

    #[test]
    fn test_json_shape() {
        let value = serde_json::to_value(sample_report()).unwrap();
        let accounts = value.as_array().unwrap();
        assert_eq!(accounts.len(), 2);

        assert_eq!(accounts[0]["private_key_suffix"], "2ff80a");
        assert_eq!(accounts[0]["ok"], true);
        assert_eq!(accounts[0]["elapsed_sec"], 1.5);
        assert!(accounts[0].get("error").is_none());

        assert_eq!(accounts[1]["ok"], false);
        assert_eq!(accounts[1]["error"], "Permanent failure: 410");
        assert_eq!(accounts[1]["error_type"], "PermanentFailure");
        assert!(accounts[1].get("address").is_none());
    }

    #[test]
    fn test_round_trip_preserves_every_field() {
        let report = sample_report();
        let json = serde_json::to_string(&report).unwrap();
        let parsed: AggregateReport = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, report);
    }

    #[test]
    fn test_account_suffix() {
        assert_eq!(account_suffix("0xabcdef123456"), "123456");
        assert_eq!(account_suffix("  0xabcdef123456\n"), "123456");
        assert_eq!(account_suffix("abc"), "abc");
    }

    #[test]
    fn test_elapsed_rounded_to_millis() {
        let result = AccountResult::success("x".into(), None, Duration::from_micros(1_234_567), vec![]);
        assert_eq!(result.elapsed_sec, 1.235);
    }

    #[test]
    fn test_default_results_path() {
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 7, 5, 1).unwrap();
        assert_eq!(default_results_path(now), PathBuf::from("x402_results_20250309-070501.json"));
    }

    #[test]
    fn test_write_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");

        let written = write_json(&sample_report(), Some(&path)).unwrap();
        assert_eq!(written, path);

        let contents = std::fs::read_to_string(&path).unwrap();
        let parsed: AggregateReport = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed, sample_report());
        assert!(contents.starts_with("[\n"));
    }

    #[test]
    fn test_write_json_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("results.json");
        assert!(write_json(&AggregateReport::default(), Some(&path)).is_err());
    }
}
