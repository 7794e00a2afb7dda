use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use glyph_core::Receipt;
use glyph_crypto::Identity;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

#[derive(Clone)]
pub struct NodeState {
    pub identity: Arc<Identity>,
}

#[derive(Deserialize)]
struct GenerateRequest {
    prompt: String,
}

#[derive(Serialize)]
struct GenerateResponse {
    text: String,
    input_tokens: u64,
    output_tokens: u64,
    wall_time_ms: u64,
}

fn token_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64
}

/// Stands in for real model execution (spec.md §1, non-goal): echoes the
/// prompt back wrapped in a fixed template, with token counts derived from
/// whitespace splitting rather than a real tokenizer.
async fn generate(Json(req): Json<GenerateRequest>) -> Json<GenerateResponse> {
    let start = Instant::now();
    let text = format!("[glyph-node synthetic response] {}", req.prompt);
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    Json(GenerateResponse {
        input_tokens: token_count(&req.prompt),
        output_tokens: token_count(&text),
        wall_time_ms: start.elapsed().as_millis() as u64,
        text,
    })
}

#[derive(Deserialize)]
struct SignReceiptRequest {
    receipt: Receipt,
}

#[derive(Serialize, Deserialize)]
struct SignReceiptResponse {
    node_sig: String,
}

async fn sign_receipt(
    State(state): State<NodeState>,
    Json(req): Json<SignReceiptRequest>,
) -> Json<SignReceiptResponse> {
    let mut receipt = req.receipt;
    receipt.sign_node(&state.identity);
    Json(SignReceiptResponse {
        node_sig: receipt.node_sig.expect("just signed"),
    })
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

pub fn router(state: NodeState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/generate", post(generate))
        .route("/sign_receipt", post(sign_receipt))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve(listen_addr: &str, state: NodeState) -> Result<()> {
    let addr: SocketAddr = listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("glyph-node listening on {addr}");
    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn generate_counts_whitespace_tokens() {
        let state = NodeState {
            identity: Arc::new(Identity::generate()),
        };
        let app = router(state);
        let body = serde_json::json!({ "prompt": "one two three" });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/generate")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(parsed["input_tokens"], 3);
    }

    #[tokio::test]
    async fn sign_receipt_produces_valid_node_signature() {
        let gateway = Identity::generate();
        let state = NodeState {
            identity: Arc::new(Identity::generate()),
        };
        let mut receipt = Receipt::new(
            gateway.public_key_b64(),
            state.identity.public_key_b64(),
            "s1".into(),
            "r".into(),
            1,
            2,
            3,
            1,
        );
        receipt.sign_gateway(&gateway);
        let app = router(state.clone());
        let body = serde_json::json!({ "receipt": receipt });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/sign_receipt")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let parsed: SignReceiptResponse = serde_json::from_slice(&bytes).unwrap();
        receipt.node_sig = Some(parsed.node_sig);
        assert!(receipt.verify());
    }
}
