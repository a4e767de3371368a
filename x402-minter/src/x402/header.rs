//! Construction of the X-PAYMENT header value

use rand::RngCore;
use std::time::{SystemTime, UNIX_EPOCH};

use super::signer::X402Signer;
use super::types::*;

/// Protocol parameters copied into every envelope
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvelopeParams {
    pub network: String,
    pub scheme: String,
    pub x402_version: u32,
}

impl Default for EnvelopeParams {
    fn default() -> Self {
        Self {
            network: "base".to_string(),
            scheme: "exact".to_string(),
            x402_version: 1,
        }
    }
}

/// Builds a freshly signed payment envelope for each request attempt
pub struct PaymentHeaderBuilder {
    signer: X402Signer,
    params: EnvelopeParams,
}

impl PaymentHeaderBuilder {
    pub fn new(signer: X402Signer, params: EnvelopeParams) -> Self {
        Self { signer, params }
    }

    pub fn address(&self) -> &str {
        self.signer.address()
    }

    /// Sign a new authorization and encode it as a header value.
    ///
    /// Each call draws a new nonce from `rng` and opens a new validity window
    /// starting now.
    pub fn build<R: RngCore>(
        &self,
        requirement: &PaymentRequirement,
        rng: &mut R,
    ) -> Result<String, String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| format!("Time error: {}", e))?
            .as_secs();

        let mut nonce = [0u8; 32];
        rng.fill_bytes(&mut nonce);

        let envelope = self.build_envelope(requirement, now, nonce)?;

        log::debug!(
            "[X402] x-payment header built; nonce={}… valid for {} seconds",
            &envelope.payload.authorization.nonce[..10],
            AUTHORIZATION_VALIDITY_SECS
        );

        envelope.to_header_value()
    }

    /// Sign an authorization for an explicit validity start and nonce
    pub fn build_envelope(
        &self,
        requirement: &PaymentRequirement,
        valid_after: u64,
        nonce: [u8; 32],
    ) -> Result<SignedPaymentEnvelope, String> {
        let authorization = Authorization {
            from: self.signer.address().to_string(),
            nonce: format!("0x{}", hex::encode(nonce)),
            to: requirement.pay_to().to_string(),
            valid_after,
            valid_before: valid_after + AUTHORIZATION_VALIDITY_SECS,
            value: requirement.max_amount_required().to_string(),
        };

        // The signature covers the canonical text, so servers can re-derive it
        let canonical = canonical_json(&authorization)?;
        let signature = self.signer.sign_message(&canonical)?;

        Ok(SignedPaymentEnvelope {
            network: self.params.network.clone(),
            payload: SignedPayload {
                authorization,
                signature,
            },
            scheme: self.params.scheme.clone(),
            x402_version: self.params.x402_version,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ethers::types::Signature;
    use ethers::utils::{hash_message, to_checksum};
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::str::FromStr;

    const PRIVATE_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const PAY_TO: &str = "0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913";

    fn builder() -> PaymentHeaderBuilder {
        let params = EnvelopeParams {
            network: "base-sepolia".to_string(),
            scheme: "exact".to_string(),
            x402_version: 1,
        };
        PaymentHeaderBuilder::new(X402Signer::new(PRIVATE_KEY).unwrap(), params)
    }

    fn requirement() -> PaymentRequirement {
        PaymentRequirement::new(PAY_TO, "10000").unwrap()
    }

    #[test]
    fn test_validity_window_is_fifteen_minutes() {
        let mut rng = StdRng::seed_from_u64(1);
        let header = builder().build(&requirement(), &mut rng).unwrap();
        let envelope = SignedPaymentEnvelope::from_header_value(&header).unwrap();
        let auth = &envelope.payload.authorization;

        assert_eq!(auth.valid_before - auth.valid_after, 900);
        assert_eq!(auth.from, "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266");
        assert_eq!(auth.to, PAY_TO);
        assert_eq!(auth.value, "10000");
        assert_eq!(auth.nonce.len(), 2 + 64);
    }

    #[test]
    fn test_envelope_carries_session_params() {
        let mut rng = StdRng::seed_from_u64(2);
        let header = builder().build(&requirement(), &mut rng).unwrap();
        let envelope = SignedPaymentEnvelope::from_header_value(&header).unwrap();

        assert_eq!(envelope.network, "base-sepolia");
        assert_eq!(envelope.scheme, "exact");
        assert_eq!(envelope.x402_version, 1);
    }

    #[test]
    fn test_signature_verifies_over_canonical_authorization() {
        let envelope = builder()
            .build_envelope(&requirement(), 1_700_000_000, [7u8; 32])
            .unwrap();
        let canonical = canonical_json(&envelope.payload.authorization).unwrap();

        let signature = Signature::from_str(&envelope.payload.signature).unwrap();
        let recovered = signature.recover(hash_message(&canonical)).unwrap();
        assert_eq!(to_checksum(&recovered, None), envelope.payload.authorization.from);
    }

    #[test]
    fn test_consecutive_builds_use_fresh_nonces() {
        let builder = builder();
        let mut rng = StdRng::seed_from_u64(3);

        let first = SignedPaymentEnvelope::from_header_value(
            &builder.build(&requirement(), &mut rng).unwrap(),
        )
        .unwrap();
        let second = SignedPaymentEnvelope::from_header_value(
            &builder.build(&requirement(), &mut rng).unwrap(),
        )
        .unwrap();

        assert_ne!(first.payload.authorization.nonce, second.payload.authorization.nonce);
        assert_ne!(first.payload.signature, second.payload.signature);
    }

    #[test]
    fn test_seeded_rng_gives_reproducible_nonce() {
        let builder = builder();
        let a = builder.build(&requirement(), &mut StdRng::seed_from_u64(9)).unwrap();
        let b = builder.build(&requirement(), &mut StdRng::seed_from_u64(9)).unwrap();

        let a = SignedPaymentEnvelope::from_header_value(&a).unwrap();
        let b = SignedPaymentEnvelope::from_header_value(&b).unwrap();
        assert_eq!(a.payload.authorization.nonce, b.payload.authorization.nonce);
    }
}
