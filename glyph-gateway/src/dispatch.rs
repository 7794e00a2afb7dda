use std::time::Duration;

use axum::extract::State;
use axum::Json;
use glyph_core::{GlyphError, Receipt};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::{now_secs, AppState};

const GENERATE_TIMEOUT: Duration = Duration::from_secs(60);
const COUNTERSIGN_TIMEOUT: Duration = Duration::from_secs(30);

fn default_max_new_tokens() -> u32 {
    256
}

fn default_temperature() -> f64 {
    0.7
}

#[derive(Debug, Deserialize)]
pub struct InferenceRequest {
    pub prompt: String,
    #[serde(default)]
    pub route: String,
    /// Accepted but unused by the synthetic node (spec.md §1, non-goal: no
    /// real model execution).
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    pub user_pubkey: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct InferenceResponse {
    pub text: String,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    prompt: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    text: String,
    input_tokens: u64,
    output_tokens: u64,
    wall_time_ms: u64,
}

#[derive(Debug, Serialize)]
struct SignReceiptRequest<'a> {
    receipt: &'a Receipt,
}

#[derive(Debug, Deserialize)]
struct SignReceiptResponse {
    node_sig: String,
}

/// Implements the nine-step billed-inference dispatch (spec.md §4.E-G):
/// pick a node, call it, price the call, debit the client, build and sign
/// the receipt, have the node countersign it, verify and commit it, then
/// replicate it in the background.
pub async fn inference(
    State(state): State<AppState>,
    Json(req): Json<InferenceRequest>,
) -> Result<Json<InferenceResponse>, ApiError> {
    // 1. pick a node
    let node = state.pick_node().ok_or(GlyphError::NoNodes)?;

    // 2. session id
    let session_id = Uuid::new_v4().to_string();

    // 3. call the node
    let generated: GenerateResponse = state
        .http
        .post(format!("{}/generate", node.url.trim_end_matches('/')))
        .timeout(GENERATE_TIMEOUT)
        .json(&GenerateRequest { prompt: &req.prompt })
        .send()
        .await
        .map_err(|e| GlyphError::UpstreamNodeError(e.to_string()))?
        .error_for_status()
        .map_err(|e| GlyphError::UpstreamNodeError(e.to_string()))?
        .json()
        .await
        .map_err(|e| GlyphError::UpstreamNodeError(e.to_string()))?;

    // 4. price the call
    let asks: Vec<u64> = state
        .dht
        .fetch_all("prices")
        .into_iter()
        .filter_map(|(_, bytes)| String::from_utf8(bytes).ok()?.parse().ok())
        .collect();
    let quote = glyph_pricing::quote(
        generated.input_tokens,
        generated.output_tokens,
        generated.wall_time_ms,
        &asks,
    );

    // 5. debit the client, if one is named; a best-effort request with no
    // user_pubkey proceeds unbilled (spec.md §4.E step 5).
    if let Some(user_pubkey) = &req.user_pubkey {
        state
            .ledger
            .debit(user_pubkey, quote.milli_glyph, "inference", now_secs())?;
    }

    // 6. build and gateway-sign the receipt
    let route = if req.route.is_empty() {
        node.pubkey.clone()
    } else {
        req.route.clone()
    };
    let mut receipt = Receipt::new(
        state.identity.public_key_b64(),
        node.pubkey.clone(),
        session_id.clone(),
        route,
        generated.input_tokens,
        generated.output_tokens,
        generated.wall_time_ms,
        now_secs(),
    );
    receipt.sign_gateway(&state.identity);

    // 7. have the node countersign it
    let signed: SignReceiptResponse = state
        .http
        .post(format!("{}/sign_receipt", node.url.trim_end_matches('/')))
        .timeout(COUNTERSIGN_TIMEOUT)
        .json(&SignReceiptRequest { receipt: &receipt })
        .send()
        .await
        .map_err(|e| GlyphError::UpstreamNodeError(e.to_string()))?
        .error_for_status()
        .map_err(|e| GlyphError::UpstreamNodeError(e.to_string()))?
        .json()
        .await
        .map_err(|e| GlyphError::UpstreamNodeError(e.to_string()))?;
    receipt.node_sig = Some(signed.node_sig);

    // 8. verify and commit
    if !receipt.verify() {
        return Err(GlyphError::BadCountersignature.into());
    }
    let row = state.ledger.add_receipt(receipt)?;

    // 9. fire-and-forget replication; never fails the response
    let peers = state.peers.read().clone();
    let gossip = state.gossip.clone();
    let dht = state.dht.clone();
    let dht_ttl = state.dht_ttl;
    let chain_head = state.ledger.chain_head().unwrap_or_default();
    let gw_pubkey = state.identity.public_key_b64();
    tokio::spawn(async move {
        gossip.broadcast_receipts(&peers, &[row]).await;
        dht.publish("receipts", &gw_pubkey, chain_head.into_bytes(), dht_ttl);
    });

    Ok(Json(InferenceResponse { text: generated.text }))
}
