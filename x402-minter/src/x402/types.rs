//! x402 Protocol data types

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request header carrying the signed payment envelope
pub const X_PAYMENT_HEADER: &str = "X-PAYMENT";

/// Lifetime of a signed authorization (15 minutes)
pub const AUTHORIZATION_VALIDITY_SECS: u64 = 900;

/// Address lengths accepted for `payTo` (20-byte account or 32-byte hash, hex with 0x)
const PAY_TO_LENGTHS: [usize; 2] = [42, 66];

/// The first payment option advertised by a payment-gated resource.
///
/// Only constructed through validation, so every instance is safe to sign.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequirement {
    pay_to: String,
    max_amount_required: String,
}

impl PaymentRequirement {
    pub fn new(pay_to: &str, max_amount_required: &str) -> Result<Self, String> {
        if !(pay_to.starts_with("0x") && PAY_TO_LENGTHS.contains(&pay_to.len())) {
            return Err("payTo must be a valid Ethereum address string".to_string());
        }
        Ok(Self {
            pay_to: pay_to.to_string(),
            max_amount_required: max_amount_required.to_string(),
        })
    }

    /// Validate a server-provided requirements body and take its first `accepts` entry.
    pub fn from_body(body: &Value) -> Result<Self, String> {
        let body = body
            .as_object()
            .ok_or_else(|| "body must be a JSON object".to_string())?;

        let entry = match body.get("accepts").and_then(Value::as_array) {
            Some(accepts) if !accepts.is_empty() => &accepts[0],
            _ => return Err("body['accepts'] must be a non-empty list".to_string()),
        };

        for key in ["payTo", "maxAmountRequired"] {
            if entry.get(key).is_none() {
                return Err(format!("Missing required field: body['accepts'][0]['{}']", key));
            }
        }

        let pay_to = entry["payTo"]
            .as_str()
            .ok_or_else(|| "payTo must be a valid Ethereum address string".to_string())?;
        let value = entry["maxAmountRequired"].as_str().ok_or_else(|| {
            "maxAmountRequired must be a string (e.g., '0x...' or decimal string)".to_string()
        })?;

        Self::new(pay_to, value)
    }

    pub fn pay_to(&self) -> &str {
        &self.pay_to
    }

    pub fn max_amount_required(&self) -> &str {
        &self.max_amount_required
    }
}

/// Transfer authorization signed by the paying account.
///
/// Fields are declared in lexicographic key order so the serialized form is
/// canonical on its own.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Authorization {
    pub from: String,
    pub nonce: String,
    pub to: String,
    #[serde(with = "u64_string")]
    pub valid_after: u64,
    #[serde(with = "u64_string")]
    pub valid_before: u64,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedPayload {
    pub authorization: Authorization,
    pub signature: String,
}

/// Envelope sent base64-encoded in the X-PAYMENT header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignedPaymentEnvelope {
    pub network: String,
    pub payload: SignedPayload,
    pub scheme: String,
    pub x402_version: u32,
}

impl SignedPaymentEnvelope {
    /// Encode the canonical JSON form to base64 for the X-PAYMENT header
    pub fn to_header_value(&self) -> Result<String, String> {
        let json = canonical_json(self)?;
        Ok(base64::engine::general_purpose::STANDARD.encode(json))
    }

    /// Decode an X-PAYMENT header value back into an envelope
    #[cfg(test)]
    pub fn from_header_value(encoded: &str) -> Result<Self, String> {
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| format!("Failed to decode payment header: {}", e))?;
        serde_json::from_slice(&decoded)
            .map_err(|e| format!("Failed to parse payment envelope: {}", e))
    }
}

/// Serialize with sorted keys and no whitespace.
///
/// Going through `Value` sorts object keys regardless of struct field order.
pub fn canonical_json<T: Serialize>(value: &T) -> Result<String, String> {
    let value = serde_json::to_value(value).map_err(|e| format!("Failed to serialize: {}", e))?;
    serde_json::to_string(&value).map_err(|e| format!("Failed to serialize: {}", e))
}

/// Unix timestamps travel as decimal strings on the wire.
mod u64_string {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &u64, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
