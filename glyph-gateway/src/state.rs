use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use glyph_crypto::Identity;
use glyph_ledger::Ledger;
use glyph_network::{Dht, PeerGossip};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::mint::MintExecutor;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NodeInfo {
    pub pubkey: String,
    pub url: String,
    pub registered_at: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MintProposal {
    pub id: String,
    pub epoch_id: String,
    pub epoch_root: String,
    pub psbt_base64: String,
    pub proposer_pubkey: String,
    pub signatures: BTreeMap<String, String>,
    pub created_at: u64,
}

/// Shared state threaded through every axum handler (spec.md §5). Cheap to
/// clone: every field is an `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<Ledger>,
    pub dht: Arc<dyn Dht>,
    pub gossip: Arc<PeerGossip>,
    pub identity: Arc<Identity>,
    pub http: reqwest::Client,
    pub nodes: Arc<RwLock<Vec<NodeInfo>>>,
    pub next_node: Arc<AtomicUsize>,
    pub peers: Arc<RwLock<Vec<String>>>,
    pub mint_proposals: Arc<RwLock<HashMap<String, MintProposal>>>,
    pub mint_executor: Arc<dyn MintExecutor>,
    pub dht_ttl: Duration,
}

impl AppState {
    /// Picks the next registered node, round-robin, wrapping on overflow.
    /// Returns `None` if no nodes are registered (spec.md §4.E).
    pub fn pick_node(&self) -> Option<NodeInfo> {
        let nodes = self.nodes.read();
        if nodes.is_empty() {
            return None;
        }
        let idx = self
            .next_node
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed)
            % nodes.len();
        nodes.get(idx).cloned()
    }
}

pub fn now_secs() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}
