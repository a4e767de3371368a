//! HTTP transport for payment-gated requests

use async_trait::async_trait;
use reqwest::Client;
use std::fmt;
use std::time::Duration;

use super::types::X_PAYMENT_HEADER;

/// Status and body of one completed HTTP exchange
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

/// Failure below the HTTP layer; always worth another attempt
#[derive(Debug, Clone)]
pub enum TransportError {
    Timeout(String),
    Connection(String),
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Timeout(e) => write!(f, "Timeout: {}", e),
            TransportError::Connection(e) => write!(f, "Request error: {}", e),
        }
    }
}

/// One GET against the minting resource, optionally carrying an X-PAYMENT header
#[async_trait]
pub trait MintTransport: Send + Sync {
    async fn get(
        &self,
        url: &str,
        payment_header: Option<&str>,
    ) -> Result<TransportResponse, TransportError>;
}

/// Creates the transport owned by a single account's session
pub trait TransportFactory: Send + Sync {
    fn connect(&self) -> Result<Box<dyn MintTransport>, String>;
}

/// reqwest-backed transport with a fixed per-call timeout
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, String> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl MintTransport for HttpTransport {
    async fn get(
        &self,
        url: &str,
        payment_header: Option<&str>,
    ) -> Result<TransportResponse, TransportError> {
        let mut request = self.client.get(url);
        if let Some(value) = payment_header {
            request = request.header(X_PAYMENT_HEADER, value);
        }

        let response = request.send().await.map_err(classify_reqwest_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(classify_reqwest_error)?;

        Ok(TransportResponse { status, body })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::Timeout(e.to_string())
    } else {
        TransportError::Connection(e.to_string())
    }
}

/// Hands every session its own reqwest client
pub struct HttpTransportFactory {
    timeout: Duration,
}

impl HttpTransportFactory {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl TransportFactory for HttpTransportFactory {
    fn connect(&self) -> Result<Box<dyn MintTransport>, String> {
        Ok(Box::new(HttpTransport::new(self.timeout)?))
    }
}
