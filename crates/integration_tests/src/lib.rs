//! Fake Ergo node serving `/info`, `/blocks/at/{height}` and `/blocks/{headerId}`

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use tipwatch_scanner::test_helpers::make_block;

#[derive(Default)]
pub struct FakeChain {
    pub full_height: Option<u64>,
    pub header_ids: HashMap<u64, Vec<String>>,
    pub blocks: HashMap<String, serde_json::Value>,
    /// Served verbatim from `/info` instead of JSON when set
    pub raw_info: Option<String>,
    pub info_delay: Option<Duration>,
    /// `(content-type, charset)` headers of every request received
    pub request_headers: Vec<(Option<String>, Option<String>)>,
    pub requested_paths: Vec<String>,
}

/// Handle to a running fake node
#[derive(Clone)]
pub struct FakeNode {
    pub url: String,
    chain: Arc<Mutex<FakeChain>>,
}

impl FakeNode {
    /// Bind to an ephemeral local port and serve in the background
    pub async fn start() -> FakeNode {
        let chain = Arc::new(Mutex::new(FakeChain::default()));

        let app = Router::new()
            .route("/info", get(info))
            .route("/blocks/at/:height", get(header_ids_at))
            .route("/blocks/:header_id", get(block))
            .with_state(Arc::clone(&chain));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind fake node");
        let addr = listener.local_addr().expect("Fake node has no address");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("Fake node stopped");
        });

        FakeNode {
            url: format!("http://{}", addr),
            chain,
        }
    }

    pub fn chain(&self) -> MutexGuard<'_, FakeChain> {
        self.chain.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Move the tip to `height` and serve a single canonical block there
    pub fn mine(&self, height: u64, header_id: &str, tx_ids: &[&str]) {
        let block = serde_json::to_value(make_block(height, header_id, tx_ids))
            .expect("Block serializes");
        let mut chain = self.chain();
        chain.header_ids.insert(height, vec![header_id.to_string()]);
        chain.blocks.insert(header_id.to_string(), block);
        chain.full_height = Some(height);
    }
}

type SharedChain = Arc<Mutex<FakeChain>>;

fn lock(chain: &SharedChain) -> MutexGuard<'_, FakeChain> {
    chain.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn record(chain: &SharedChain, path: String, headers: &HeaderMap) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    let mut chain = lock(chain);
    chain
        .request_headers
        .push((header("content-type"), header("charset")));
    chain.requested_paths.push(path);
}

async fn info(State(chain): State<SharedChain>, headers: HeaderMap) -> Response {
    record(&chain, "/info".to_string(), &headers);
    let (delay, raw, height) = {
        let chain = lock(&chain);
        (chain.info_delay, chain.raw_info.clone(), chain.full_height)
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    match raw {
        Some(body) => (StatusCode::OK, body).into_response(),
        None => Json(json!({
            "name": "fake-node",
            "appVersion": "5.0.0",
            "fullHeight": height,
            "headersHeight": height,
        }))
        .into_response(),
    }
}

async fn header_ids_at(
    State(chain): State<SharedChain>,
    Path(height): Path<u64>,
    headers: HeaderMap,
) -> Response {
    record(&chain, format!("/blocks/at/{}", height), &headers);
    let ids = lock(&chain)
        .header_ids
        .get(&height)
        .cloned()
        .unwrap_or_default();
    Json(ids).into_response()
}

async fn block(
    State(chain): State<SharedChain>,
    Path(header_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    record(&chain, format!("/blocks/{}", header_id), &headers);
    let found = lock(&chain).blocks.get(&header_id).cloned();
    match found {
        Some(block) => Json(block).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": 404, "reason": "not-found", "detail": header_id})),
        )
            .into_response(),
    }
}
