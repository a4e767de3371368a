//! Scripted transports for exercising the mint loop without a network

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::x402::{
    MintTransport, SignedPaymentEnvelope, TransportError, TransportFactory, TransportResponse,
};

/// Hardhat's default development keys
pub const TEST_KEYS: [&str; 5] = [
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
    "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
    "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
    "0x7c852118294e51e653712a81e05800f419141751be58f605c371e15141b007a6",
    "0x47e179ec197488593b187f80a00eb0da91f1b9d0b13f8733639f19c30a34926a",
];

pub const PAY_TO: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";

pub fn payment_required_body() -> String {
    json!({
        "x402Version": 1,
        "error": "X-PAYMENT header is required",
        "accepts": [{
            "scheme": "exact",
            "network": "base",
            "payTo": PAY_TO,
            "maxAmountRequired": "1000000",
            "asset": "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"
        }]
    })
    .to_string()
}

#[derive(Debug, Clone)]
pub enum Reply {
    Status(u16, String),
    Timeout,
    ConnectionRefused,
    Panic,
}

impl Reply {
    pub fn ok(body: Value) -> Self {
        Reply::Status(200, body.to_string())
    }

    pub fn status(code: u16) -> Self {
        Reply::Status(code, String::new())
    }
}

/// Payment headers of every request seen, in order (`None` for unpaid requests)
#[derive(Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<Option<String>>>>);

impl RequestLog {
    pub fn count(&self) -> usize {
        self.0.lock().len()
    }

    pub fn headers(&self) -> Vec<Option<String>> {
        self.0.lock().clone()
    }

    pub fn envelopes(&self) -> Vec<SignedPaymentEnvelope> {
        self.headers()
            .iter()
            .flatten()
            .map(|h| SignedPaymentEnvelope::from_header_value(h).unwrap())
            .collect()
    }
}

/// Tracks how many requests are in flight at once across transports
#[derive(Default)]
pub struct ConcurrencyProbe {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyProbe {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Replays a fixed list of replies, then keeps answering with the fallback
pub struct ScriptedTransport {
    replies: Mutex<VecDeque<Reply>>,
    fallback: Reply,
    log: RequestLog,
    probe: Option<Arc<ConcurrencyProbe>>,
    latency: Duration,
}

impl ScriptedTransport {
    pub fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback: Reply::ok(json!({ "minted": true })),
            log: RequestLog::default(),
            probe: None,
            latency: Duration::ZERO,
        }
    }

    pub fn with_fallback(mut self, reply: Reply) -> Self {
        self.fallback = reply;
        self
    }

    pub fn with_probe(mut self, probe: Arc<ConcurrencyProbe>, latency: Duration) -> Self {
        self.probe = Some(probe);
        self.latency = latency;
        self
    }

    pub fn log(&self) -> RequestLog {
        self.log.clone()
    }
}

#[async_trait]
impl MintTransport for ScriptedTransport {
    async fn get(
        &self,
        _url: &str,
        payment_header: Option<&str>,
    ) -> Result<TransportResponse, TransportError> {
        self.log.0.lock().push(payment_header.map(str::to_string));

        if let Some(probe) = &self.probe {
            let now = probe.current.fetch_add(1, Ordering::SeqCst) + 1;
            probe.peak.fetch_max(now, Ordering::SeqCst);
        }
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if let Some(probe) = &self.probe {
            probe.current.fetch_sub(1, Ordering::SeqCst);
        }

        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone());

        match reply {
            Reply::Status(status, body) => Ok(TransportResponse { status, body }),
            Reply::Timeout => Err(TransportError::Timeout("operation timed out".to_string())),
            Reply::ConnectionRefused => {
                Err(TransportError::Connection("connection refused".to_string()))
            }
            Reply::Panic => panic!("transport exploded"),
        }
    }
}

/// Builds a transport per session from a closure
pub struct ScriptedFactory<F>(pub F);

impl<F> TransportFactory for ScriptedFactory<F>
where
    F: Fn() -> ScriptedTransport + Send + Sync,
{
    fn connect(&self) -> Result<Box<dyn MintTransport>, String> {
        Ok(Box::new((self.0)()))
    }
}
