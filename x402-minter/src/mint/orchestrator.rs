//! Runs one mint session per account under a bounded worker pool
//!
//! Workers pull accounts from a shared queue, so at most `worker_limit`
//! sessions are in flight. Results flow back over a channel and are recorded
//! in completion order. Each session runs in its own task; a panic there is
//! reported as that account's failure and the worker moves on.

use parking_lot::Mutex;
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use super::error::MintError;
use super::report::{AccountResult, AggregateReport, account_suffix};
use super::requester::X402Requester;
use super::retry::RetryPolicy;
use super::session::MintSession;
use crate::x402::{
    EnvelopeParams, PaymentHeaderBuilder, PaymentRequirement, TransportFactory, X402Signer,
};

/// Everything a session needs besides its credential
#[derive(Debug, Clone)]
pub struct MintSettings {
    pub url: String,
    pub units_per_account: u32,
    pub envelope: EnvelopeParams,
    pub retry: RetryPolicy,
    /// Requirements known up front; otherwise learned from the first 402
    pub requirement: Option<PaymentRequirement>,
    /// Fixed seed for nonces and jitter (account index is mixed in)
    pub rng_seed: Option<u64>,
}

struct AccountJob {
    index: usize,
    credential: String,
}

pub struct Orchestrator {
    settings: Arc<MintSettings>,
    worker_limit: usize,
    transports: Arc<dyn TransportFactory>,
}

impl Orchestrator {
    pub fn new(
        settings: MintSettings,
        worker_limit: usize,
        transports: Arc<dyn TransportFactory>,
    ) -> Self {
        Self {
            settings: Arc::new(settings),
            worker_limit: worker_limit.max(1),
            transports,
        }
    }

    pub async fn run(&self, credentials: Vec<String>) -> AggregateReport {
        let total = credentials.len();
        log::info!(
            "[MINTER] Starting parallel mints: accounts={}, amount_per_account={}, workers={}",
            total,
            self.settings.units_per_account,
            self.worker_limit
        );

        let queue: Arc<Mutex<VecDeque<AccountJob>>> = Arc::new(Mutex::new(
            credentials
                .into_iter()
                .enumerate()
                .map(|(index, credential)| AccountJob { index, credential })
                .collect(),
        ));
        let (tx, mut rx) = mpsc::unbounded_channel::<AccountResult>();

        for worker_id in 0..self.worker_limit.min(total) {
            let queue = Arc::clone(&queue);
            let tx = tx.clone();
            let settings = Arc::clone(&self.settings);
            let transports = Arc::clone(&self.transports);

            tokio::spawn(async move {
                log::debug!("[MINTER] Worker {} started", worker_id);
                loop {
                    let next = queue.lock().pop_front();
                    let Some(job) = next else {
                        break;
                    };
                    let result = run_guarded(job, &settings, &transports).await;
                    if tx.send(result).is_err() {
                        break;
                    }
                }
                log::debug!("[MINTER] Worker {} finished", worker_id);
            });
        }
        drop(tx);

        let mut report = AggregateReport::default();
        while let Some(result) = rx.recv().await {
            if result.ok {
                log::info!("[MINTER] Account {} OK", result.account_suffix);
            } else {
                log::warn!(
                    "[MINTER] Account {} error: {}",
                    result.account_suffix,
                    result.error.as_deref().unwrap_or("unknown")
                );
            }
            report.push(result);
        }

        if report.is_empty() {
            log::warn!("[MINTER] No accounts to mint");
        }
        log::info!(
            "[MINTER] Summary: {} success, {} failed",
            report.success_count(),
            report.failure_count()
        );
        report
    }
}

/// Run one account in its own task so a panic cannot take the worker down
async fn run_guarded(
    job: AccountJob,
    settings: &Arc<MintSettings>,
    transports: &Arc<dyn TransportFactory>,
) -> AccountResult {
    let suffix = account_suffix(&job.credential);
    let started = Instant::now();

    let handle = tokio::spawn(run_account(job, Arc::clone(settings), Arc::clone(transports)));
    match handle.await {
        Ok(result) => result,
        Err(e) => {
            let message = if e.is_panic() {
                panic_message(e.into_panic())
            } else {
                e.to_string()
            };
            log::error!("[MINTER] Account {} crashed with unexpected error: {}", suffix, message);
            AccountResult::failure(
                suffix,
                None,
                started.elapsed(),
                Vec::new(),
                &MintError::Unexpected(message),
            )
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "session panicked".to_string()
    }
}

async fn run_account(
    job: AccountJob,
    settings: Arc<MintSettings>,
    transports: Arc<dyn TransportFactory>,
) -> AccountResult {
    let suffix = account_suffix(&job.credential);
    let tag = format!("[X402 {}]", suffix);
    let started = Instant::now();

    let mut session = match open_session(&job, &settings, transports.as_ref(), &tag) {
        Ok(session) => session,
        Err(e) => {
            log_failure(&suffix, &e);
            return AccountResult::failure(suffix, None, started.elapsed(), Vec::new(), &e);
        }
    };
    let address = Some(session.address().to_string());

    // The session, and with it the account's HTTP client, is released on return
    match session.run(&settings.url, settings.units_per_account).await {
        Ok(units) => {
            let elapsed = started.elapsed();
            log::info!(
                "[MINTER] Account {} finished OK in {:.2}s (items={})",
                suffix,
                elapsed.as_secs_f64(),
                units.len()
            );
            AccountResult::success(suffix, address, elapsed, units)
        }
        Err(failure) => {
            log_failure(&suffix, &failure.error);
            AccountResult::failure(
                suffix,
                address,
                started.elapsed(),
                failure.completed,
                &failure.error,
            )
        }
    }
}

fn open_session(
    job: &AccountJob,
    settings: &MintSettings,
    transports: &dyn TransportFactory,
    tag: &str,
) -> Result<MintSession, MintError> {
    settings.retry.validate()?;

    let signer = X402Signer::new(&job.credential).map_err(MintError::Validation)?;
    let transport = transports.connect().map_err(MintError::Unexpected)?;
    let rng = match settings.rng_seed {
        Some(seed) => StdRng::seed_from_u64(seed.wrapping_add(job.index as u64)),
        None => StdRng::from_entropy(),
    };

    log::info!("{} Session opened for {}", tag, signer.address());

    let requester = X402Requester::new(
        transport,
        PaymentHeaderBuilder::new(signer, settings.envelope.clone()),
        settings.retry.clone(),
        settings.requirement.clone(),
        rng,
        tag.to_string(),
    );
    Ok(MintSession::new(requester, tag.to_string()))
}

fn log_failure(suffix: &str, error: &MintError) {
    if error.is_expected() {
        log::warn!("[MINTER] Account {} finished with expected error: {}", suffix, error);
    } else {
        log::error!("[MINTER] Account {} crashed with unexpected error: {}", suffix, error);
    }
}
