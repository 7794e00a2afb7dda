use axum::extract::{Path, State};
use axum::Json;
use glyph_core::{canonicalize, sha256_hex, GlyphError};
use glyph_ledger::{Epoch, Payout};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;
use crate::state::{now_secs, AppState};

#[derive(Debug, Deserialize)]
pub struct SettleRequest {
    pub token_ticker: String,
    pub total_amount: u64,
    pub start_time: Option<u64>,
    pub end_time: Option<u64>,
}

/// `root = H(canonical(snapshot without root_hash/gateway_sig))` (spec.md
/// §3).
fn epoch_root(epoch: &Epoch) -> String {
    let mut value = serde_json::to_value(epoch).expect("Epoch always serializes");
    if let Value::Object(map) = &mut value {
        map.remove("root_hash");
        map.remove("gateway_sig");
    }
    sha256_hex(&canonicalize(&value))
}

/// `gateway_sig = sign(sk_gateway, canonical(snapshot without gateway_sig))`
/// — the root hash itself is part of the signed payload (spec.md §3).
fn epoch_sig_payload(epoch: &Epoch) -> Vec<u8> {
    let mut value = serde_json::to_value(epoch).expect("Epoch always serializes");
    if let Value::Object(map) = &mut value {
        map.remove("gateway_sig");
    }
    canonicalize(&value)
}

/// Aggregates quality-weighted contributions over `[start_time, end_time)`
/// into a new, gateway-signed epoch snapshot (spec.md §4.F).
pub async fn settle(
    State(state): State<AppState>,
    Json(req): Json<SettleRequest>,
) -> Result<Json<Value>, ApiError> {
    let now = now_secs();
    let start_time = req.start_time.unwrap_or(0);
    let end_time = req.end_time.unwrap_or(now);
    if end_time < start_time {
        return Err(GlyphError::OutOfRange("end_time must be >= start_time".into()).into());
    }

    let weights = state.ledger.aggregate_weighted(start_time, end_time)?;
    if weights.is_empty() {
        return Ok(Json(serde_json::json!({ "error": "no receipts" })));
    }
    let total_weight: u64 = weights.values().sum();

    let mut payouts = Vec::new();
    for (node_pubkey, weight) in &weights {
        let Some(eth_address) = state.ledger.get_node_address(node_pubkey)? else {
            continue;
        };
        let amount = if total_weight == 0 {
            0
        } else {
            ((req.total_amount as u128) * (*weight as u128) / (total_weight as u128)) as u64
        };
        payouts.push(Payout {
            node_pubkey: node_pubkey.clone(),
            eth_address,
            amount,
        });
    }

    let epoch_id = format!("{start_time}-{end_time}-{}", req.token_ticker);
    let mut epoch = Epoch {
        epoch_id: epoch_id.clone(),
        created_at: now,
        start_time,
        end_time,
        token_ticker: req.token_ticker,
        total_amount: req.total_amount,
        payouts,
        root_hash: String::new(),
        gateway_sig: None,
        anchor_tx: None,
        finalized: false,
    };
    epoch.root_hash = epoch_root(&epoch);
    epoch.gateway_sig = Some(state.identity.sign(&epoch_sig_payload(&epoch)));

    state.ledger.save_epoch(&epoch)?;
    state.dht.publish(
        "epochs",
        &epoch_id,
        serde_json::to_vec(&epoch).unwrap_or_default(),
        state.dht_ttl,
    );

    Ok(Json(serde_json::to_value(&epoch).expect("Epoch always serializes")))
}

#[derive(Debug, Deserialize)]
pub struct SignEpochRequest {
    pub epoch_id: String,
    pub validator_pubkey: String,
    pub signature: String,
}

/// Records one validator's signature over the epoch snapshot. Quorum is a
/// raw signature count against a configured threshold, not a weighted
/// vote — Byzantine-fault weighting is explicitly out of scope (spec.md §9,
/// non-goals). `finalized` is only set at anchor time, per the epoch state
/// machine `Created → Signed(T) → Anchored(txid) → Finalized` (spec.md
/// §4.I).
pub async fn sign(
    State(state): State<AppState>,
    Json(req): Json<SignEpochRequest>,
) -> Result<Json<Value>, ApiError> {
    let epoch = state
        .ledger
        .get_epoch(&req.epoch_id)?
        .ok_or_else(|| GlyphError::NotFound(format!("epoch {}", req.epoch_id)))?;

    let is_validator = state
        .ledger
        .list_validators()?
        .iter()
        .any(|v| v.pubkey == req.validator_pubkey);
    if !is_validator {
        return Err(GlyphError::Forbidden("not a registered validator".into()).into());
    }

    let snapshot = canonicalize(&serde_json::to_value(&epoch).expect("Epoch always serializes"));
    if !glyph_crypto::verify(&req.validator_pubkey, &snapshot, &req.signature) {
        return Err(GlyphError::BadSignature.into());
    }

    state
        .ledger
        .add_epoch_signature(&req.epoch_id, &req.validator_pubkey, &req.signature)?;
    let signatures = state.ledger.epoch_signature_count(&req.epoch_id)?;
    let quorum = state.ledger.has_quorum(&req.epoch_id)?;
    Ok(Json(
        serde_json::json!({ "ok": true, "signatures": signatures, "quorum": quorum }),
    ))
}

#[derive(Debug, Serialize)]
pub struct EpochStatus {
    pub epoch: Epoch,
    pub signature_count: usize,
    pub quorum_threshold: u32,
    pub has_quorum: bool,
}

pub async fn status(
    State(state): State<AppState>,
    Path(epoch_id): Path<String>,
) -> Result<Json<EpochStatus>, ApiError> {
    let epoch = state
        .ledger
        .get_epoch(&epoch_id)?
        .ok_or_else(|| GlyphError::NotFound(format!("epoch {epoch_id}")))?;
    let signature_count = state.ledger.epoch_signature_count(&epoch_id)?;
    let quorum_threshold = state.ledger.quorum_threshold()?;
    let has_quorum = state.ledger.has_quorum(&epoch_id)?;
    Ok(Json(EpochStatus {
        epoch,
        signature_count,
        quorum_threshold,
        has_quorum,
    }))
}

#[derive(Debug, Serialize)]
pub struct TokenConfig {
    pub token_address: Option<String>,
    pub token_network: Option<String>,
    pub rpc_url: Option<String>,
}

pub async fn get_token_config(State(state): State<AppState>) -> Result<Json<TokenConfig>, ApiError> {
    Ok(Json(TokenConfig {
        token_address: state.ledger.token_address()?,
        token_network: state.ledger.token_network()?,
        rpc_url: state.ledger.rpc_url()?,
    }))
}

#[derive(Debug, Deserialize)]
pub struct SetTokenConfigRequest {
    pub token_address: String,
    pub token_network: String,
    pub rpc_url: Option<String>,
}

pub async fn set_token_config(
    State(state): State<AppState>,
    Json(req): Json<SetTokenConfigRequest>,
) -> Result<Json<Value>, ApiError> {
    state.ledger.set_token_address(&req.token_address)?;
    state.ledger.set_token_network(&req.token_network)?;
    if let Some(rpc_url) = &req.rpc_url {
        state.ledger.set_rpc_url(rpc_url)?;
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}
