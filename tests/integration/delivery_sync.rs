//! Integration tests for the at-least-once delivery sweep against a live
//! HTTP server: fetch, acknowledge, redelivery of unacknowledged
//! messages, and idempotent re-acknowledgement.
//!
//! Verification command: `cargo test --test delivery_sync`

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};

use huddle::auth::AuthExecutor;
use huddle::http::remote::RemoteClient;
use huddle::session::{MemorySessionStore, Session};
use huddle::sync::{AckBatcher, DeliverySync, SyncError};

// =============================================================================
// Test server
// =============================================================================

/// Messages the server still holds for the user, oldest first.
type Outbox = Arc<Mutex<Vec<Value>>>;

async fn fetch_undelivered(State(outbox): State<Outbox>) -> Json<Value> {
    Json(json!({ "messages": *outbox.lock() }))
}

async fn acknowledge(
    State(outbox): State<Outbox>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let Some(ids) = body["messageIds"].as_array() else {
        return (StatusCode::BAD_REQUEST, Json(json!({})));
    };
    // Unknown identifiers are a no-op; that is what makes redelivery safe.
    outbox
        .lock()
        .retain(|message| !ids.contains(&message["messageId"]));
    (StatusCode::OK, Json(json!({})))
}

async fn start_server(outbox: Outbox) -> std::net::SocketAddr {
    let app = Router::new()
        .route("/fetchUndeliveredMessages", get(fetch_undelivered))
        .route("/acknowledgeMessages", post(acknowledge))
        .with_state(outbox);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

fn message(id: &str, tag: &str, content: &str) -> Value {
    json!({ "messageId": id, "type": tag, "content": content })
}

async fn harness(
    outstanding: Vec<Value>,
) -> (Outbox, DeliverySync<RemoteClient, MemorySessionStore>) {
    let outbox: Outbox = Arc::new(Mutex::new(outstanding));
    let addr = start_server(Arc::clone(&outbox)).await;

    let store = Arc::new(MemorySessionStore::new());
    store.sign_in(Session {
        access_token: "access-0".to_string(),
        refresh_token: "refresh-0".to_string(),
        user_id: 7,
    });
    let http = Arc::new(
        RemoteClient::new(&format!("http://{addr}"), Duration::from_secs(5)).expect("client"),
    );
    let executor = Arc::new(AuthExecutor::new(
        http,
        Arc::clone(&store),
        Duration::from_secs(5),
    ));
    (outbox, DeliverySync::new(executor, store))
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn fetch_then_acknowledge_drains_the_server() {
    let (_, sync) = harness(vec![
        message("m1", "dText", "first"),
        message("m2", "pText", "second"),
    ])
    .await;

    let messages = sync.fetch_undelivered().await.expect("fetch");
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].message_id, "m1");
    assert_eq!(messages[1].message_id, "m2");

    let ids: Vec<String> = messages.iter().map(|m| m.message_id.clone()).collect();
    sync.acknowledge(&ids).await.expect("acknowledge");

    assert!(sync.fetch_undelivered().await.expect("refetch").is_empty());
}

#[tokio::test]
async fn unacknowledged_messages_are_redelivered() {
    let (_, sync) = harness(vec![message("m1", "dText", "first")]).await;

    let first = sync.fetch_undelivered().await.expect("fetch");
    let second = sync.fetch_undelivered().await.expect("refetch");
    assert_eq!(first.len(), 1);
    assert_eq!(second.len(), 1);
    assert_eq!(first[0].message_id, second[0].message_id);
}

#[tokio::test]
async fn partial_acknowledgement_leaves_the_rest() {
    let (_, sync) = harness(vec![
        message("m1", "dText", "first"),
        message("m2", "dText", "second"),
    ])
    .await;

    sync.acknowledge(&["m1".to_string()]).await.expect("ack m1");

    let remaining = sync.fetch_undelivered().await.expect("refetch");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].message_id, "m2");
}

#[tokio::test]
async fn re_acknowledgement_is_idempotent() {
    let (_, sync) = harness(vec![message("m1", "dText", "first")]).await;

    sync.acknowledge(&["m1".to_string()]).await.expect("ack");
    // A redelivered message acked twice must not fail the second time.
    sync.acknowledge(&["m1".to_string()]).await.expect("re-ack");
    assert!(sync.fetch_undelivered().await.expect("refetch").is_empty());
}

#[tokio::test]
async fn fetch_while_signed_out_is_rejected_locally() {
    // No server needed; the sync layer refuses before touching the network.
    let store = Arc::new(MemorySessionStore::new());
    let http =
        Arc::new(RemoteClient::new("http://127.0.0.1:9", Duration::from_secs(1)).expect("client"));
    let executor = Arc::new(AuthExecutor::new(
        http,
        Arc::clone(&store),
        Duration::from_secs(1),
    ));
    let sync = DeliverySync::new(executor, store);

    assert!(matches!(
        sync.fetch_undelivered().await,
        Err(SyncError::SignedOut)
    ));
}

#[tokio::test]
async fn batcher_acknowledges_fetched_messages_end_to_end() {
    let (outbox, sync) = harness(vec![
        message("m1", "dText", "first"),
        message("m2", "dText", "second"),
        message("m3", "pText", "third"),
    ])
    .await;
    let sync = Arc::new(sync);
    let batcher = AckBatcher::spawn(Arc::clone(&sync), Duration::from_millis(50));

    let messages = sync.fetch_undelivered().await.expect("fetch");
    for message in &messages {
        batcher.add(message.message_id.clone());
    }

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(outbox.lock().is_empty(), "batched ack should drain the server");
    assert!(sync.fetch_undelivered().await.expect("refetch").is_empty());
}
