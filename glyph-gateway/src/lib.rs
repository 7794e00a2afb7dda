pub mod dispatch;
pub mod epoch;
pub mod error;
pub mod mint;
pub mod mint_routes;
pub mod registry;
pub mod state;

use std::net::SocketAddr;
use std::sync::atomic::AtomicUsize;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::routing::{get, post};
use axum::{Json, Router};
use glyph_config::GatewayConfig;
use glyph_crypto::Identity;
use glyph_ledger::Ledger;
use glyph_network::{InMemoryDht, PeerGossip};
use parking_lot::RwLock;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::mint::{MintExecutor, StubMintExecutor};
use crate::state::AppState;

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub fn build_state(cfg: &GatewayConfig, identity: Identity) -> Result<AppState> {
    let ledger = Ledger::open(&cfg.ledger_path)?;
    ledger.set_quorum_threshold(cfg.quorum_threshold_default)?;
    ledger.set_token_ticker(&cfg.token_ticker)?;
    Ok(AppState {
        ledger: Arc::new(ledger),
        dht: Arc::new(InMemoryDht::new()),
        gossip: Arc::new(PeerGossip::new()),
        identity: Arc::new(identity),
        http: reqwest::Client::new(),
        nodes: Arc::new(RwLock::new(Vec::new())),
        next_node: Arc::new(AtomicUsize::new(0)),
        peers: Arc::new(RwLock::new(cfg.peers.clone())),
        mint_proposals: Arc::new(RwLock::new(Default::default())),
        mint_executor: Arc::new(StubMintExecutor::default()) as Arc<dyn MintExecutor>,
        dht_ttl: Duration::from_secs(cfg.dht_ttl_secs),
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/register", post(registry::register))
        .route("/nodes", get(registry::nodes))
        .route("/add_peer", post(registry::add_peer))
        .route("/peers", get(registry::peers))
        .route("/price/quote", get(registry::price_quote))
        .route("/set_eth_address", post(registry::set_eth_address))
        .route("/inference", post(dispatch::inference))
        .route("/receipts", get(registry::list_receipts))
        .route("/pull/receipts", get(registry::pull_receipts))
        .route("/gossip/receipts", post(registry::gossip_receipts))
        .route("/validate/quality", post(registry::validate_quality))
        .route("/validators/add", post(registry::add_validator))
        .route("/validators/remove", post(registry::remove_validator))
        .route("/validators", get(registry::list_validators))
        .route("/epoch/settle", post(epoch::settle))
        .route("/epoch/sign", post(epoch::sign))
        .route("/epoch/status/:id", get(epoch::status))
        .route(
            "/config/token",
            get(epoch::get_token_config).post(epoch::set_token_config),
        )
        .route("/mint/preview", post(mint_routes::preview))
        .route("/mint/anchor", post(mint_routes::anchor))
        .route("/mint/execute", post(mint_routes::execute))
        .route("/mint/propose_psbt", post(mint_routes::propose_psbt))
        .route("/mint/submit_signature", post(mint_routes::submit_signature))
        .route("/mint/proposals", get(mint_routes::proposals))
        .route("/gossip/mint_proposals", post(mint_routes::gossip_mint_proposals))
        .route("/token/supply", get(mint_routes::token_supply))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn serve(listen_addr: &str, state: AppState) -> Result<()> {
    let addr: SocketAddr = listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("glyph-gateway listening on {addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    fn test_cfg(dir: &std::path::Path) -> GatewayConfig {
        GatewayConfig {
            listen_addr: "127.0.0.1:0".into(),
            ledger_path: dir.join("ledger").to_string_lossy().into_owned(),
            identity_path: dir.join("identity").to_string_lossy().into_owned(),
            peers: vec![],
            dht_ttl_secs: 300,
            quorum_threshold_default: 1,
            token_ticker: "GLYPH".into(),
        }
    }

    #[tokio::test]
    async fn health_check_returns_ok() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_cfg(dir.path());
        let state = build_state(&cfg, Identity::generate()).unwrap();
        let app = router(state);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn register_then_list_nodes() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_cfg(dir.path());
        let state = build_state(&cfg, Identity::generate()).unwrap();
        let app = router(state);
        let body = serde_json::json!({ "pubkey": "node-1", "url": "http://127.0.0.1:9001" });
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/register")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::builder().uri("/nodes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let nodes: Vec<state::NodeInfo> = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].pubkey, "node-1");
    }

    #[tokio::test]
    async fn inference_rejects_when_no_nodes_registered() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_cfg(dir.path());
        let state = build_state(&cfg, Identity::generate()).unwrap();
        let app = router(state);
        let body = serde_json::json!({ "prompt": "hi" });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/inference")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn set_eth_address_rejects_malformed_address() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = test_cfg(dir.path());
        let state = build_state(&cfg, Identity::generate()).unwrap();
        let app = router(state);
        let body = serde_json::json!({ "pubkey": "node-1", "eth_address": "not-an-address" });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/set_eth_address")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn settle_then_sign_reaches_quorum_without_finalizing() {
        use axum::extract::State as ExtractState;
        use glyph_core::{canonicalize, Receipt};

        let dir = tempfile::tempdir().unwrap();
        let cfg = test_cfg(dir.path());
        let state = build_state(&cfg, Identity::generate()).unwrap();

        state
            .ledger
            .set_node_address("node-pub", "0x1111111111111111111111111111111111111111")
            .unwrap();
        let mut receipt = Receipt::new(
            state.identity.public_key_b64(),
            "node-pub".into(),
            "s1".into(),
            "r".into(),
            10,
            20,
            100,
            1,
        );
        receipt.sign_gateway(&state.identity);
        state.ledger.add_receipt(receipt).unwrap();
        state.ledger.set_quorum_threshold(1).unwrap();

        let validator = Identity::generate();
        state.ledger.add_validator(&validator.public_key_b64(), 1).unwrap();

        let settled = epoch::settle(
            ExtractState(state.clone()),
            Json(epoch::SettleRequest {
                token_ticker: "GLYPH".into(),
                total_amount: 100,
                start_time: Some(0),
                end_time: Some(2),
            }),
        )
        .await
        .unwrap();
        let epoch_id = settled.0["epoch_id"].as_str().unwrap().to_string();

        let snapshot = state.ledger.get_epoch(&epoch_id).unwrap().unwrap();
        let signed_bytes = canonicalize(&serde_json::to_value(&snapshot).unwrap());
        let signature = validator.sign(&signed_bytes);

        let signed = epoch::sign(
            ExtractState(state.clone()),
            Json(epoch::SignEpochRequest {
                epoch_id: epoch_id.clone(),
                validator_pubkey: validator.public_key_b64(),
                signature,
            }),
        )
        .await
        .unwrap();
        assert_eq!(signed.0["quorum"], true);
        assert!(!state.ledger.is_finalized(&epoch_id).unwrap());
    }
}
