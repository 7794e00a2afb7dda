use axum::extract::State;
use axum::Json;
use glyph_core::GlyphError;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::{now_secs, AppState, MintProposal};

#[derive(Debug, Deserialize)]
pub struct EpochIdRequest {
    pub epoch_id: String,
}

#[derive(Debug, Serialize)]
pub struct MintPreview {
    pub epoch_id: String,
    pub payouts: Vec<glyph_ledger::SelectedPayout>,
    pub total: u64,
}

pub async fn preview(
    State(state): State<AppState>,
    Json(req): Json<EpochIdRequest>,
) -> Result<Json<MintPreview>, ApiError> {
    let epoch = state
        .ledger
        .get_epoch(&req.epoch_id)?
        .ok_or_else(|| GlyphError::NotFound(format!("epoch {}", req.epoch_id)))?;
    let payouts = epoch.select_payouts();
    let total = payouts.iter().map(|p| p.amount).sum();
    Ok(Json(MintPreview {
        epoch_id: epoch.epoch_id,
        payouts,
        total,
    }))
}

/// `anchor(epoch_id, txid)` requires the snapshot to exist; sets the anchor
/// txid and finalizes the epoch in one step (spec.md §4.I).
pub async fn anchor(
    State(state): State<AppState>,
    Json(req): Json<EpochIdRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let epoch = state
        .ledger
        .get_epoch(&req.epoch_id)?
        .ok_or_else(|| GlyphError::NotFound(format!("epoch {}", req.epoch_id)))?;
    if !state.ledger.has_quorum(&req.epoch_id)? {
        return Err(GlyphError::Forbidden("epoch lacks validator quorum".into()).into());
    }
    let tx = state.mint_executor.anchor(&epoch).await?;
    state.ledger.set_anchor(&req.epoch_id, &tx)?;
    state.ledger.set_finalized(&req.epoch_id)?;
    Ok(Json(serde_json::json!({ "anchor_tx": tx })))
}

pub async fn execute(
    State(state): State<AppState>,
    Json(req): Json<EpochIdRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let epoch = state
        .ledger
        .get_epoch(&req.epoch_id)?
        .ok_or_else(|| GlyphError::NotFound(format!("epoch {}", req.epoch_id)))?;
    if epoch.anchor_tx.is_none() {
        return Err(GlyphError::Forbidden("epoch has not been anchored".into()).into());
    }
    let tx = state.mint_executor.execute(&epoch).await?;
    Ok(Json(serde_json::json!({ "mint_tx": tx })))
}

pub async fn token_supply(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({ "supply": state.mint_executor.token_supply() }))
}

#[derive(Debug, Deserialize)]
pub struct ProposePsbtRequest {
    pub epoch_id: String,
    pub epoch_root: String,
    pub psbt_base64: String,
    pub proposer_pubkey: String,
}

/// Stands in for PSBT construction: records a mint proposal other
/// validators countersign, without building a real Bitcoin PSBT (the
/// on-chain minter's real execution is out of scope, spec.md §1).
pub async fn propose_psbt(
    State(state): State<AppState>,
    Json(req): Json<ProposePsbtRequest>,
) -> Result<Json<MintProposal>, ApiError> {
    let epoch = state
        .ledger
        .get_epoch(&req.epoch_id)?
        .ok_or_else(|| GlyphError::NotFound(format!("epoch {}", req.epoch_id)))?;
    if req.epoch_root != epoch.root_hash {
        return Err(GlyphError::OutOfRange("epoch_root does not match the local snapshot".into()).into());
    }
    let proposal = MintProposal {
        id: uuid::Uuid::new_v4().to_string(),
        epoch_id: req.epoch_id,
        epoch_root: req.epoch_root,
        psbt_base64: req.psbt_base64,
        proposer_pubkey: req.proposer_pubkey,
        signatures: Default::default(),
        created_at: now_secs(),
    };
    state
        .mint_proposals
        .write()
        .insert(proposal.id.clone(), proposal.clone());
    Ok(Json(proposal))
}

#[derive(Debug, Deserialize)]
pub struct SubmitSignatureRequest {
    pub proposal_id: String,
    pub validator_pubkey: String,
    pub signature: String,
}

pub async fn submit_signature(
    State(state): State<AppState>,
    Json(req): Json<SubmitSignatureRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut proposals = state.mint_proposals.write();
    let proposal = proposals
        .get_mut(&req.proposal_id)
        .ok_or_else(|| GlyphError::NotFound(format!("proposal {}", req.proposal_id)))?;
    proposal
        .signatures
        .insert(req.validator_pubkey.clone(), req.signature.clone());
    let broadcast = proposal.clone();
    drop(proposals);

    let peers = state.peers.read().clone();
    let gossip = state.gossip.clone();
    tokio::spawn(async move {
        gossip.broadcast_mint_proposals(&peers, &[broadcast]).await;
    });
    Ok(Json(serde_json::json!({ "ok": true })))
}

pub async fn proposals(State(state): State<AppState>) -> Json<Vec<MintProposal>> {
    Json(state.mint_proposals.read().values().cloned().collect())
}

/// Accepts a gossiped mint proposal only if its `epoch_id` is known locally
/// and its `epoch_root` matches the local snapshot's root hash — otherwise
/// it is silently dropped rather than merged (spec.md §4.H).
pub async fn gossip_mint_proposals(
    State(state): State<AppState>,
    Json(incoming): Json<Vec<MintProposal>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut accepted = 0usize;
    let mut proposals = state.mint_proposals.write();
    for proposal in incoming {
        let Some(epoch) = state.ledger.get_epoch(&proposal.epoch_id)? else {
            continue;
        };
        if proposal.epoch_root != epoch.root_hash {
            continue;
        }
        proposals
            .entry(proposal.id.clone())
            .and_modify(|existing| existing.signatures.extend(proposal.signatures.clone()))
            .or_insert(proposal);
        accepted += 1;
    }
    Ok(Json(serde_json::json!({ "accepted": accepted })))
}
