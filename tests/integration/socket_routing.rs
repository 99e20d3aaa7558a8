//! Integration tests for the realtime socket against an in-process
//! WebSocket server: identity query parameters, category routing,
//! malformed-frame tolerance, the offline queue, and lifecycle guards.
//!
//! Verification command: `cargo test --test socket_routing`

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;

use huddle::registry::DispatchRegistry;
use huddle::socket::{ConnectParams, Connection, ConnectionState, SocketConfig, SocketError};
use huddle_proto::envelope::Envelope;
use huddle_proto::taxonomy::Category;

// =============================================================================
// Test server
// =============================================================================

/// Handles to a one-connection WebSocket server.
struct TestServer {
    url: String,
    /// Push frames here to have the server send them to the client.
    outgoing: mpsc::UnboundedSender<String>,
    /// Text frames the server received from the client, in order.
    inbound: mpsc::UnboundedReceiver<String>,
    /// Resolves with the request URI once the client has connected.
    uri: Option<oneshot::Receiver<String>>,
}

/// Starts a server that accepts a single connection and then shuttles
/// frames both ways until either side closes.
async fn spawn_server() -> TestServer {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test server");
    let addr = listener.local_addr().expect("local addr");
    let (outgoing_tx, mut outgoing_rx) = mpsc::unbounded_channel::<String>();
    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<String>();
    let (uri_tx, uri_rx) = oneshot::channel::<String>();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.expect("accept");
        let mut ws =
            tokio_tungstenite::accept_hdr_async(stream, move |req: &Request, resp: Response| {
                let _ = uri_tx.send(req.uri().to_string());
                Ok(resp)
            })
            .await
            .expect("handshake");

        loop {
            tokio::select! {
                frame = outgoing_rx.recv() => match frame {
                    Some(text) => {
                        if ws.send(Message::Text(text.into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                },
                item = ws.next() => match item {
                    Some(Ok(Message::Text(text))) => {
                        let _ = inbound_tx.send(text.to_string());
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                    Some(Ok(_)) => {}
                },
            }
        }
    });

    TestServer {
        url: format!("ws://{addr}/socket"),
        outgoing: outgoing_tx,
        inbound: inbound_rx,
        uri: Some(uri_rx),
    }
}

fn params() -> ConnectParams {
    ConnectParams {
        user_id: 42,
        display_name: "Ada L".to_string(),
        access_token: Some("tok-42".to_string()),
    }
}

/// Registers a listener that forwards every routed tag to a channel.
fn tag_collector(
    registry: &DispatchRegistry,
    listener_id: &str,
    category: Category,
) -> (
    huddle::registry::RegistrationHandle,
    mpsc::UnboundedReceiver<String>,
) {
    let (tx, rx) = mpsc::unbounded_channel::<String>();
    let handle = registry.register(listener_id, category, move |envelope: &Envelope| {
        let _ = tx.send(envelope.tag().to_string());
    });
    (handle, rx)
}

async fn recv_tag(rx: &mut mpsc::UnboundedReceiver<String>) -> String {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for routed frame")
        .expect("listener channel closed")
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn connect_sends_identity_query_params() {
    let mut server = spawn_server().await;
    let connection = Connection::new(SocketConfig::new(&server.url), DispatchRegistry::new());

    connection.connect(&params()).await.expect("connect");
    assert_eq!(connection.state(), ConnectionState::Connected);

    let uri = server.uri.take().expect("uri receiver").await.expect("uri");
    assert!(uri.contains("customer_id=42"), "uri was {uri}");
    assert!(uri.contains("full_name=Ada"), "uri was {uri}");
    assert!(uri.contains("token=tok-42"), "uri was {uri}");

    connection.close().await;
}

#[tokio::test]
async fn inbound_frames_route_to_category_listeners_in_order() {
    let mut server = spawn_server().await;
    let registry = DispatchRegistry::new();
    let (_dm, mut dm_rx) = tag_collector(&registry, "dm-screen", Category::DirectMessage);
    let connection = Connection::new(SocketConfig::new(&server.url), Arc::clone(&registry));

    connection.connect(&params()).await.expect("connect");
    server
        .outgoing
        .send(r#"{"type":"dText","content":"a"}"#.to_string())
        .expect("send");
    server
        .outgoing
        .send(r#"{"type":"pText","content":"b"}"#.to_string())
        .expect("send");
    server
        .outgoing
        .send(r#"{"type":"dImage","content":"c"}"#.to_string())
        .expect("send");

    // The private-chat frame has no listener and vanishes; direct-message
    // frames arrive in order.
    assert_eq!(recv_tag(&mut dm_rx).await, "dText");
    assert_eq!(recv_tag(&mut dm_rx).await, "dImage");

    connection.close().await;
}

#[tokio::test]
async fn malformed_and_unknown_frames_are_dropped_without_killing_the_reader() {
    let mut server = spawn_server().await;
    let registry = DispatchRegistry::new();
    let (_dm, mut dm_rx) = tag_collector(&registry, "dm-screen", Category::DirectMessage);
    let connection = Connection::new(SocketConfig::new(&server.url), Arc::clone(&registry));

    connection.connect(&params()).await.expect("connect");
    server.outgoing.send("{not json at all".to_string()).expect("send");
    server
        .outgoing
        .send(r#"{"content":"no type field"}"#.to_string())
        .expect("send");
    server
        .outgoing
        .send(r#"{"type":"notInTheCatalogue"}"#.to_string())
        .expect("send");
    server
        .outgoing
        .send(r#"{"type":"dText","content":"still alive"}"#.to_string())
        .expect("send");

    assert_eq!(recv_tag(&mut dm_rx).await, "dText");
    assert_eq!(connection.state(), ConnectionState::Connected);

    connection.close().await;
}

#[tokio::test]
async fn offline_frames_flush_in_order_on_connect() {
    let mut server = spawn_server().await;
    let connection = Connection::new(SocketConfig::new(&server.url), DispatchRegistry::new());

    connection
        .send_queued(r#"{"type":"dText","content":"first"}"#.to_string())
        .await;
    connection
        .send_queued(r#"{"type":"dText","content":"second"}"#.to_string())
        .await;
    assert_eq!(connection.queued_len(), 2);

    connection.connect(&params()).await.expect("connect");

    let first = tokio::time::timeout(Duration::from_secs(2), server.inbound.recv())
        .await
        .expect("flush timed out")
        .expect("server closed");
    let second = tokio::time::timeout(Duration::from_secs(2), server.inbound.recv())
        .await
        .expect("flush timed out")
        .expect("server closed");
    assert!(first.contains("first"));
    assert!(second.contains("second"));
    assert_eq!(connection.queued_len(), 0);

    connection.close().await;
}

#[tokio::test]
async fn send_reaches_the_server_while_connected() {
    let mut server = spawn_server().await;
    let connection = Connection::new(SocketConfig::new(&server.url), DispatchRegistry::new());

    connection.connect(&params()).await.expect("connect");
    connection
        .send(r#"{"type":"dText","content":"hello"}"#)
        .await
        .expect("send");

    let received = tokio::time::timeout(Duration::from_secs(2), server.inbound.recv())
        .await
        .expect("send timed out")
        .expect("server closed");
    assert!(received.contains("hello"));

    connection.close().await;
}

#[tokio::test]
async fn lifecycle_guards_reject_out_of_order_calls() {
    let server = spawn_server().await;
    let connection = Connection::new(SocketConfig::new(&server.url), DispatchRegistry::new());

    assert!(matches!(
        connection.send("{}").await,
        Err(SocketError::NotConnected)
    ));

    connection.connect(&params()).await.expect("connect");
    assert!(matches!(
        connection.connect(&params()).await,
        Err(SocketError::AlreadyConnected)
    ));

    connection.close().await;
    assert_eq!(connection.state(), ConnectionState::Disconnected);
    assert!(matches!(
        connection.send("{}").await,
        Err(SocketError::NotConnected)
    ));
}

#[tokio::test]
async fn connect_to_a_dead_port_fails_and_returns_to_disconnected() {
    let connection = Connection::new(
        SocketConfig::new("ws://127.0.0.1:9/socket"),
        DispatchRegistry::new(),
    );

    let result = connection.connect(&params()).await;
    assert!(result.is_err());
    assert_eq!(connection.state(), ConnectionState::Disconnected);

    // A failed attempt must not wedge the guard; a retry is allowed.
    let retry = connection.connect(&params()).await;
    assert!(retry.is_err());
}
