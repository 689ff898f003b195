use super::{decode_frame, encode_frame};
use crate::binary::Node;
use crate::error::{ConnectionError, Error};
use crate::transport::{Connection, Dialer, Transport};
use crate::Result;
use async_trait::async_trait;
use futures::sink::SinkExt;
use futures::stream::{SplitSink, SplitStream, StreamExt};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

type Pending = Arc<StdMutex<HashMap<String, oneshot::Sender<Node>>>>;

/// Inbound nodes buffered before the client drains them.
const INCOMING_CAPACITY: usize = 128;

/// Dials a WebSocket endpoint that exchanges framed protocol nodes.
pub struct WsDialer {
    url: String,
}

impl WsDialer {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Dialer for WsDialer {
    async fn dial(&self, hello: Node) -> Result<Connection> {
        let (ws_stream, _response) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(dial_error)?;
        let (write_half, read_half) = ws_stream.split();
        let pending: Pending = Arc::new(StdMutex::new(HashMap::new()));
        let (incoming_tx, incoming) = mpsc::channel(INCOMING_CAPACITY);
        tokio::spawn(read_loop(read_half, Arc::clone(&pending), incoming_tx));

        let transport = Arc::new(WsTransport {
            writer: Mutex::new(write_half),
            pending,
            next_id: AtomicU64::new(1),
        });
        transport.send(hello).await?;
        tracing::debug!(url = %self.url, "websocket transport established");
        Ok(Connection {
            transport,
            incoming,
        })
    }
}

/// An HTTP rejection of the upgrade carries the gateway's verdict on the session (401 means
/// logged out); anything else is a plain transport failure.
fn dial_error(e: WsError) -> Error {
    match e {
        WsError::Http(resp) => Error::Connection(ConnectionError::Closed(resp.status().as_u16())),
        other => Error::Connection(ConnectionError::WebSocket(other.to_string())),
    }
}

/// Send half of the WebSocket plus the table of in-flight queries.
pub struct WsTransport {
    writer: Mutex<SplitSink<WsStream, Message>>,
    pending: Pending,
    next_id: AtomicU64,
}

impl WsTransport {
    async fn write(&self, node: &Node) -> Result<()> {
        let frame = encode_frame(node)?;
        let mut w = self.writer.lock().await;
        w.send(Message::Binary(frame))
            .await
            .map_err(|e| Error::Connection(ConnectionError::WebSocket(e.to_string())))
    }
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&self, node: Node) -> Result<()> {
        self.write(&node).await
    }

    async fn query(&self, mut node: Node) -> Result<Node> {
        let id = match node.attr("id") {
            Some(id) => id.to_string(),
            None => {
                let id = format!("q.{}", self.next_id.fetch_add(1, Ordering::Relaxed));
                node.attrs.insert("id".into(), id.clone());
                id
            }
        };
        let (tx, rx) = oneshot::channel();
        self.pending
            .lock()
            .map_err(|_| Error::Connection(ConnectionError::Disconnected))?
            .insert(id.clone(), tx);
        if let Err(e) = self.write(&node).await {
            if let Ok(mut pending) = self.pending.lock() {
                pending.remove(&id);
            }
            return Err(e);
        }
        let resp = rx
            .await
            .map_err(|_| Error::Connection(ConnectionError::Disconnected))?;
        if resp.attr("type") == Some("error") {
            let code = resp
                .get_child_by_tag("error")
                .and_then(|e| e.attr("code"))
                .unwrap_or("unknown");
            return Err(Error::Connection(ConnectionError::WebSocket(format!(
                "query {} failed with code {}",
                id, code
            ))));
        }
        Ok(resp)
    }

    async fn close(&self) -> Result<()> {
        let mut w = self.writer.lock().await;
        w.close()
            .await
            .map_err(|e| Error::Connection(ConnectionError::WebSocket(e.to_string())))
    }
}

/// Route query responses to their waiters; forward everything else.
async fn read_loop(
    mut reader: SplitStream<WsStream>,
    pending: Pending,
    incoming: mpsc::Sender<Node>,
) {
    while let Some(msg) = reader.next().await {
        let data = match msg {
            Ok(Message::Binary(d)) => d,
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                tracing::debug!(error = %e, "websocket read failed");
                break;
            }
        };
        let node = match decode_frame(&data) {
            Ok(node) => node,
            Err(e) => {
                tracing::warn!(error = %e, "dropping undecodable frame");
                continue;
            }
        };
        let waiter = match (node.tag.as_str(), node.attr("id")) {
            ("iq", Some(id)) => pending.lock().ok().and_then(|mut p| p.remove(id)),
            _ => None,
        };
        match waiter {
            Some(tx) => {
                let _ = tx.send(node);
            }
            None => {
                if incoming.send(node).await.is_err() {
                    break;
                }
            }
        }
    }
    if let Ok(mut p) = pending.lock() {
        p.clear();
    }
}
