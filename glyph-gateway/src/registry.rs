use axum::extract::{Query, State};
use axum::Json;
use glyph_core::GlyphError;
use glyph_ledger::ReceiptRow;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::{now_secs, AppState, NodeInfo};

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub pubkey: String,
    pub url: String,
}

pub async fn register(
    State(state): State<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Json<serde_json::Value> {
    let mut nodes = state.nodes.write();
    if let Some(existing) = nodes.iter_mut().find(|n| n.pubkey == req.pubkey) {
        existing.url = req.url;
    } else {
        nodes.push(NodeInfo {
            pubkey: req.pubkey,
            url: req.url,
            registered_at: now_secs(),
        });
    }
    Json(serde_json::json!({ "ok": true }))
}

pub async fn nodes(State(state): State<AppState>) -> Json<Vec<NodeInfo>> {
    Json(state.nodes.read().clone())
}

#[derive(Debug, Deserialize)]
pub struct AddPeerRequest {
    pub url: String,
}

pub async fn add_peer(
    State(state): State<AppState>,
    Json(req): Json<AddPeerRequest>,
) -> Json<serde_json::Value> {
    let mut peers = state.peers.write();
    if !peers.contains(&req.url) {
        peers.push(req.url);
    }
    Json(serde_json::json!({ "ok": true }))
}

pub async fn peers(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.peers.read().clone())
}

#[derive(Debug, Deserialize)]
pub struct QuoteQuery {
    pub input_tokens: u64,
    pub output_tokens: u64,
    #[serde(default)]
    pub wall_time_ms: u64,
}

pub async fn price_quote(
    State(state): State<AppState>,
    Query(q): Query<QuoteQuery>,
) -> Json<glyph_pricing::Quote> {
    let asks: Vec<u64> = state
        .dht
        .fetch_all("prices")
        .into_iter()
        .filter_map(|(_, bytes)| String::from_utf8(bytes).ok()?.parse().ok())
        .collect();
    Json(glyph_pricing::quote(
        q.input_tokens,
        q.output_tokens,
        q.wall_time_ms,
        &asks,
    ))
}

#[derive(Debug, Deserialize)]
pub struct SetEthAddressRequest {
    pub pubkey: String,
    pub eth_address: String,
}

pub async fn set_eth_address(
    State(state): State<AppState>,
    Json(req): Json<SetEthAddressRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state
        .ledger
        .set_node_address(&req.pubkey, &req.eth_address)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn list_receipts(State(state): State<AppState>) -> Result<Json<Vec<ReceiptRow>>, ApiError> {
    Ok(Json(state.ledger.list_receipts()?))
}

#[derive(Debug, Deserialize)]
pub struct SinceQuery {
    #[serde(default)]
    pub since: u64,
}

pub async fn pull_receipts(
    State(state): State<AppState>,
    Query(q): Query<SinceQuery>,
) -> Result<Json<Vec<ReceiptRow>>, ApiError> {
    Ok(Json(state.ledger.list_receipts_since(q.since)?))
}

/// Receives gossiped receipt rows from a peer gateway. Insertion is
/// idempotent, so re-delivery from multiple peers is harmless (spec.md
/// §4.H, testable property: gossip-idempotence).
pub async fn gossip_receipts(
    State(state): State<AppState>,
    Json(rows): Json<Vec<ReceiptRow>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    for row in rows {
        state.ledger.add_receipt(row.receipt)?;
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct ValidateQualityRequest {
    pub receipt_id: String,
    pub node_pubkey: String,
    pub score: f64,
}

pub async fn validate_quality(
    State(state): State<AppState>,
    Json(req): Json<ValidateQualityRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if !(0.0..=1.0).contains(&req.score) {
        return Err(GlyphError::OutOfRange("score must be within [0, 1]".into()).into());
    }
    state.ledger.record_quality(&req.receipt_id, req.score)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize, Serialize)]
pub struct ValidatorRequest {
    pub pubkey: String,
}

pub async fn add_validator(
    State(state): State<AppState>,
    Json(req): Json<ValidatorRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.ledger.add_validator(&req.pubkey, now_secs())?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn remove_validator(
    State(state): State<AppState>,
    Json(req): Json<ValidatorRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    state.ledger.remove_validator(&req.pubkey)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn list_validators(
    State(state): State<AppState>,
) -> Result<Json<Vec<glyph_ledger::Validator>>, ApiError> {
    Ok(Json(state.ledger.list_validators()?))
}
