//! x402 Protocol client side for payment-gated minting
//!
//! Every request attempt carries a freshly signed authorization:
//! 1. Validate the advertised payment requirements
//! 2. Sign a 15-minute transfer authorization with the account key
//! 3. Send it base64-encoded in the X-PAYMENT header

mod client;
mod header;
mod signer;
mod types;

pub use client::{HttpTransportFactory, MintTransport, TransportError, TransportFactory};
#[cfg(test)]
pub use client::TransportResponse;
pub use header::{EnvelopeParams, PaymentHeaderBuilder};
pub use signer::X402Signer;
pub use types::*;
