//! Realtime WebSocket connection.
//!
//! One [`Connection`] owns the socket lifecycle: connect with identity
//! query parameters, a reader task that parses inbound frames and hands
//! them to the [`DispatchRegistry`], immediate sends while connected, and
//! a bounded queue for frames produced while offline, flushed on the next
//! successful connect.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use huddle_proto::envelope::Envelope;

use crate::registry::DispatchRegistry;

type WsSink = SplitSink<WebSocketStream<MaybeTlsStream<TcpStream>>, Message>;
type WsReader = SplitStream<WebSocketStream<MaybeTlsStream<TcpStream>>>;

/// Where the connection is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Closing,
}

/// Errors from connection operations.
#[derive(Debug, thiserror::Error)]
pub enum SocketError {
    #[error("socket is not connected")]
    NotConnected,

    #[error("a connection attempt is already in progress")]
    AlreadyConnecting,

    #[error("socket is already connected")]
    AlreadyConnected,

    #[error("socket is closing")]
    Closing,

    #[error("connect attempt timed out")]
    Timeout,

    #[error("invalid socket url: {0}")]
    InvalidUrl(String),

    #[error("websocket failure: {0}")]
    Ws(String),
}

/// Static connection settings.
#[derive(Debug, Clone)]
pub struct SocketConfig {
    /// WebSocket endpoint, `ws://` or `wss://`.
    pub url: String,
    pub connect_timeout: Duration,
    /// Maximum frames held for offline senders; the oldest frame is
    /// dropped when the queue is full.
    pub queue_capacity: usize,
}

impl SocketConfig {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connect_timeout: Duration::from_secs(10),
            queue_capacity: 64,
        }
    }
}

/// Identity presented to the server at connect time.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub user_id: u64,
    pub display_name: String,
    /// Access token, when the server requires an authenticated socket.
    pub access_token: Option<String>,
}

/// Append the identity query parameters to the endpoint URL.
fn connect_url(endpoint: &str, params: &ConnectParams) -> Result<url::Url, SocketError> {
    let mut url = url::Url::parse(endpoint).map_err(|e| SocketError::InvalidUrl(e.to_string()))?;
    url.query_pairs_mut()
        .append_pair("customer_id", &params.user_id.to_string())
        .append_pair("full_name", &params.display_name);
    if let Some(token) = &params.access_token {
        url.query_pairs_mut().append_pair("token", token);
    }
    Ok(url)
}

/// A managed WebSocket connection.
pub struct Connection {
    config: SocketConfig,
    registry: Arc<DispatchRegistry>,
    state: Arc<parking_lot::Mutex<ConnectionState>>,
    sink: tokio::sync::Mutex<Option<WsSink>>,
    reader: tokio::sync::Mutex<Option<tokio::task::JoinHandle<()>>>,
    queue: parking_lot::Mutex<VecDeque<String>>,
}

impl Connection {
    #[must_use]
    pub fn new(config: SocketConfig, registry: Arc<DispatchRegistry>) -> Self {
        Self {
            config,
            registry,
            state: Arc::new(parking_lot::Mutex::new(ConnectionState::Disconnected)),
            sink: tokio::sync::Mutex::new(None),
            reader: tokio::sync::Mutex::new(None),
            queue: parking_lot::Mutex::new(VecDeque::new()),
        }
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// Open the socket and start the reader task.
    ///
    /// Only one attempt may run at a time; calls while connecting,
    /// connected, or closing fail fast. On success any queued offline
    /// frames are flushed in order.
    ///
    /// # Errors
    ///
    /// Returns [`SocketError`] when the state does not permit a new
    /// attempt, the URL is invalid, or the handshake fails or times out.
    pub async fn connect(&self, params: &ConnectParams) -> Result<(), SocketError> {
        {
            let mut state = self.state.lock();
            match *state {
                ConnectionState::Disconnected => *state = ConnectionState::Connecting,
                ConnectionState::Connecting => return Err(SocketError::AlreadyConnecting),
                ConnectionState::Connected => return Err(SocketError::AlreadyConnected),
                ConnectionState::Closing => return Err(SocketError::Closing),
            }
        }

        match self.try_connect(params).await {
            Ok(()) => {
                *self.state.lock() = ConnectionState::Connected;
                tracing::info!(user_id = params.user_id, "socket connected");
                self.flush_queue().await;
                Ok(())
            }
            Err(e) => {
                *self.state.lock() = ConnectionState::Disconnected;
                tracing::warn!(error = %e, "socket connect failed");
                Err(e)
            }
        }
    }

    async fn try_connect(&self, params: &ConnectParams) -> Result<(), SocketError> {
        let url = connect_url(&self.config.url, params)?;
        let handshake = connect_async(url.as_str());
        let (stream, _) = match tokio::time::timeout(self.config.connect_timeout, handshake).await {
            Ok(Ok(connected)) => connected,
            Ok(Err(e)) => return Err(SocketError::Ws(e.to_string())),
            Err(_) => return Err(SocketError::Timeout),
        };

        let (ws_sink, ws_reader) = stream.split();
        *self.sink.lock().await = Some(ws_sink);

        let registry = Arc::clone(&self.registry);
        let state = Arc::clone(&self.state);
        let handle = tokio::spawn(reader_loop(ws_reader, registry, state));
        *self.reader.lock().await = Some(handle);
        Ok(())
    }

    /// Send a text frame immediately.
    ///
    /// # Errors
    ///
    /// Returns [`SocketError::NotConnected`] when the socket is not
    /// connected, or [`SocketError::Ws`] when the write fails, in which
    /// case the connection is marked disconnected.
    pub async fn send(&self, text: &str) -> Result<(), SocketError> {
        if self.state() != ConnectionState::Connected {
            return Err(SocketError::NotConnected);
        }
        let mut sink = self.sink.lock().await;
        let Some(sink) = sink.as_mut() else {
            return Err(SocketError::NotConnected);
        };
        match sink.send(Message::Text(text.into())).await {
            Ok(()) => Ok(()),
            Err(e) => {
                *self.state.lock() = ConnectionState::Disconnected;
                Err(SocketError::Ws(e.to_string()))
            }
        }
    }

    /// Send a text frame, queueing it if the socket is offline or the
    /// write fails. Queued frames go out on the next successful connect.
    pub async fn send_queued(&self, text: String) {
        if self.state() == ConnectionState::Connected {
            match self.send(&text).await {
                Ok(()) => return,
                Err(e) => tracing::debug!(error = %e, "send failed, queueing frame"),
            }
        }
        let mut queue = self.queue.lock();
        if queue.len() >= self.config.queue_capacity {
            queue.pop_front();
            tracing::warn!("offline queue full, dropping oldest frame");
        }
        queue.push_back(text);
    }

    /// Number of frames waiting in the offline queue.
    #[must_use]
    pub fn queued_len(&self) -> usize {
        self.queue.lock().len()
    }

    async fn flush_queue(&self) {
        loop {
            let Some(frame) = self.queue.lock().pop_front() else {
                return;
            };
            if let Err(e) = self.send(&frame).await {
                tracing::warn!(error = %e, "flush interrupted, requeueing frame");
                self.queue.lock().push_front(frame);
                return;
            }
        }
    }

    /// Close the socket cleanly.
    ///
    /// Sends a close frame, stops routing further inbound frames, waits
    /// for the reader to finish, and lands in `Disconnected`. A no-op
    /// when not connected.
    pub async fn close(&self) {
        {
            let mut state = self.state.lock();
            if *state != ConnectionState::Connected {
                return;
            }
            *state = ConnectionState::Closing;
        }

        if let Some(mut sink) = self.sink.lock().await.take() {
            let _ = sink.send(Message::Close(None)).await;
            let _ = sink.close().await;
        }

        if let Some(mut handle) = self.reader.lock().await.take() {
            if tokio::time::timeout(Duration::from_secs(2), &mut handle)
                .await
                .is_err()
            {
                handle.abort();
            }
        }

        *self.state.lock() = ConnectionState::Disconnected;
        tracing::info!("socket closed");
    }
}

/// Reads frames until the stream ends, routing each parsed envelope.
/// Malformed frames are logged and dropped without disturbing the stream.
async fn reader_loop(
    mut reader: WsReader,
    registry: Arc<DispatchRegistry>,
    state: Arc<parking_lot::Mutex<ConnectionState>>,
) {
    while let Some(item) = reader.next().await {
        // Once close() has begun, nothing further reaches listeners.
        if *state.lock() != ConnectionState::Connected {
            break;
        }
        match item {
            Ok(Message::Text(text)) => match Envelope::parse(text.as_str()) {
                Ok(envelope) => registry.route(&envelope),
                Err(e) => tracing::warn!(error = %e, "malformed frame dropped"),
            },
            Ok(Message::Close(_)) => {
                tracing::info!("socket closed by server");
                break;
            }
            Ok(Message::Ping(_) | Message::Pong(_) | Message::Binary(_) | Message::Frame(_)) => {}
            Err(e) => {
                tracing::warn!(error = %e, "socket read failed");
                break;
            }
        }
    }

    // A server-initiated close lands back in Disconnected so the caller
    // can reconnect; a local close() owns the transition itself.
    let mut state = state.lock();
    if *state == ConnectionState::Connected {
        *state = ConnectionState::Disconnected;
    }
}
