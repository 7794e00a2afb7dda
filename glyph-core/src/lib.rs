use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Transport-neutral error kinds, mapped to HTTP status codes by
/// `glyph-gateway`'s `IntoResponse` impl (spec.md §7).
#[derive(Debug, Error)]
pub enum GlyphError {
    #[error("invalid ethereum address: {0}")]
    InvalidAddress(String),
    #[error("insufficient balance: have {have}, need {need}")]
    InsufficientBalance { have: u64, need: u64 },
    #[error("no nodes registered")]
    NoNodes,
    #[error("upstream node error: {0}")]
    UpstreamNodeError(String),
    #[error("bad countersignature")]
    BadCountersignature,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("bad signature")]
    BadSignature,
    #[error("value out of range: {0}")]
    OutOfRange(String),
    #[error("transient failure: {0}")]
    Transient(String),
    #[error("storage error: {0}")]
    Storage(String),
    #[error("{0}")]
    Other(String),
}

/// Recursively sorts JSON object keys and drops nothing else, producing the
/// canonical byte form used for both signing and hashing. Serializes with
/// serde_json's compact (no-whitespace) writer.
pub fn canonicalize(value: &Value) -> Vec<u8> {
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<String, Value> =
                    map.iter().map(|(k, v)| (k.clone(), sort(v))).collect();
                serde_json::to_value(sorted).expect("BTreeMap<String, Value> always serializes")
            }
            Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    serde_json::to_vec(&sort(value)).expect("canonical value always serializes")
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    hex::encode(digest)
}

/// Immutable, two-party-signed record of one inference (spec.md §3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Receipt {
    pub gateway_pubkey: String,
    pub node_pubkey: String,
    pub session_id: String,
    pub route: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub wall_time_ms: u64,
    pub created_at: u64,
    pub gateway_sig: Option<String>,
    pub node_sig: Option<String>,
}

impl Receipt {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway_pubkey: String,
        node_pubkey: String,
        session_id: String,
        route: String,
        input_tokens: u64,
        output_tokens: u64,
        wall_time_ms: u64,
        created_at: u64,
    ) -> Self {
        Self {
            gateway_pubkey,
            node_pubkey,
            session_id,
            route,
            input_tokens,
            output_tokens,
            wall_time_ms,
            created_at,
            gateway_sig: None,
            node_sig: None,
        }
    }

    /// The canonical payload is the receipt fields excluding both
    /// signatures, serialized deterministically (spec.md §3).
    pub fn canonical_payload(&self) -> Vec<u8> {
        let mut value = serde_json::to_value(self).expect("Receipt always serializes");
        if let Value::Object(map) = &mut value {
            map.remove("gateway_sig");
            map.remove("node_sig");
        }
        canonicalize(&value)
    }

    pub fn receipt_id(&self) -> String {
        sha256_hex(&self.canonical_payload())
    }

    pub fn sign_gateway(&mut self, identity: &glyph_crypto::Identity) {
        let payload = self.canonical_payload();
        self.gateway_sig = Some(identity.sign(&payload));
    }

    pub fn sign_node(&mut self, identity: &glyph_crypto::Identity) {
        let payload = self.canonical_payload();
        self.node_sig = Some(identity.sign(&payload));
    }

    /// True iff both signatures are present and valid over the canonical
    /// payload (spec.md §3 invariant).
    pub fn verify(&self) -> bool {
        let (Some(gateway_sig), Some(node_sig)) = (&self.gateway_sig, &self.node_sig) else {
            return false;
        };
        let payload = self.canonical_payload();
        glyph_crypto::verify(&self.gateway_pubkey, &payload, gateway_sig)
            && glyph_crypto::verify(&self.node_pubkey, &payload, node_sig)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glyph_crypto::Identity;

    fn now() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_secs()
    }

    #[test]
    fn canonical_payload_is_order_independent() {
        let a = serde_json::json!({"b": 1, "a": 2, "c": {"z": 1, "y": 2}});
        let b = serde_json::json!({"a": 2, "c": {"y": 2, "z": 1}, "b": 1});
        assert_eq!(canonicalize(&a), canonicalize(&b));
    }

    #[test]
    fn receipt_round_trip_verifies() {
        let gateway = Identity::generate();
        let node = Identity::generate();
        let mut r = Receipt::new(
            gateway.public_key_b64(),
            node.public_key_b64(),
            "session-1".into(),
            "route-a".into(),
            10,
            20,
            500,
            now(),
        );
        r.sign_gateway(&gateway);
        r.sign_node(&node);
        assert!(r.verify());
        assert_eq!(r.receipt_id().len(), 64);
    }

    #[test]
    fn receipt_missing_signature_does_not_verify() {
        let gateway = Identity::generate();
        let node = Identity::generate();
        let mut r = Receipt::new(
            gateway.public_key_b64(),
            node.public_key_b64(),
            "session-1".into(),
            "route-a".into(),
            10,
            20,
            500,
            now(),
        );
        r.sign_gateway(&gateway);
        assert!(!r.verify());
    }

    #[test]
    fn receipt_id_is_stable_across_field_construction_order() {
        let gateway = Identity::generate();
        let node = Identity::generate();
        let r1 = Receipt::new(
            gateway.public_key_b64(),
            node.public_key_b64(),
            "s".into(),
            "r".into(),
            1,
            2,
            3,
            42,
        );
        // Rebuild via JSON round-trip to simulate a different wire ordering.
        let value = serde_json::to_value(&r1).unwrap();
        let r2: Receipt = serde_json::from_value(value).unwrap();
        assert_eq!(r1.receipt_id(), r2.receipt_id());
    }
}
