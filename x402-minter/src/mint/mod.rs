//! Multi-account minting against x402 payment-gated resources

mod error;
mod orchestrator;
mod report;
mod requester;
mod retry;
mod session;

#[cfg(test)]
mod testing;

pub use orchestrator::{MintSettings, Orchestrator};
pub use report::write_json;
pub use retry::RetryPolicy;
