//! Account signer for x402 payment authorizations

use ethers::core::k256::ecdsa::SigningKey;
use ethers::signers::{LocalWallet, Signer};
use ethers::utils::{hash_message, to_checksum};

/// Signs payment authorizations on behalf of one account.
///
/// The wallet never leaves this struct; callers only see the address and
/// signatures.
pub struct X402Signer {
    wallet: LocalWallet,
    address: String,
}

impl X402Signer {
    /// Create a new signer from a private key (hex string with or without 0x prefix)
    pub fn new(private_key: &str) -> Result<Self, String> {
        let key_hex = private_key.trim();
        let key_hex = key_hex.strip_prefix("0x").unwrap_or(key_hex);
        let key_bytes = hex::decode(key_hex)
            .map_err(|e| format!("Invalid private key hex: {}", e))?;

        if key_bytes.len() != 32 {
            return Err(format!(
                "Invalid private key length: expected 32 bytes, got {}",
                key_bytes.len()
            ));
        }

        let signing_key = SigningKey::from_bytes(key_bytes.as_slice().into())
            .map_err(|e| format!("Invalid private key: {}", e))?;

        let wallet = LocalWallet::from(signing_key);
        let address = to_checksum(&wallet.address(), None);

        Ok(Self { wallet, address })
    }

    /// Checksummed wallet address
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Sign text as an EIP-191 personal message.
    ///
    /// Returns the 65-byte `r || s || v` signature as 0x-prefixed hex.
    pub fn sign_message(&self, text: &str) -> Result<String, String> {
        let digest = hash_message(text);
        let signature = self
            .wallet
            .sign_hash(digest)
            .map_err(|e| format!("Failed to sign: {}", e))?;

        Ok(format!("0x{}", hex::encode(signature.to_vec())))
    }
}
