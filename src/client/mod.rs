//! Messaging client: the socket surface the bridge drives, and its transport-backed implementation.

mod groups;
mod recv;
mod send;

use crate::auth::AuthCreds;
use crate::binary::Node;
use crate::error::{Error, SendError};
use crate::events::{ConnectionState, ConnectionUpdate, Event, EventSender};
use crate::transport::{Dialer, Transport};
use crate::types::{GroupMetadata, Jid, MessageId, MessageKey, UpsertType, WebMessageInfo};
use crate::version::WaVersion;
use async_trait::async_trait;
use recv::NodeHandler;
use sha2::Digest;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, RwLock};

pub use groups::{parse_participating, participating_query};
pub use send::{MessageContent, SendResponse};

/// Default URL of the JSON-node gateway dialed by [WsDialer](crate::socket::WsDialer). Not a WhatsApp endpoint.
pub const DEFAULT_WS_URL: &str = "ws://127.0.0.1:3001/ws";

/// Operations the bridge needs from a connected messaging client.
#[async_trait]
pub trait WaSocket: Send + Sync {
    /// Every group the account participates in, keyed by group JID.
    async fn group_fetch_all_participating(&self) -> crate::Result<BTreeMap<Jid, GroupMetadata>>;

    /// Send a message and return once the client accepted it.
    async fn send_message(&self, to: &Jid, content: MessageContent)
        -> crate::Result<SendResponse>;

    /// Close the connection. A `close` update follows on the event channel.
    async fn close(&self) -> crate::Result<()>;

    fn is_connected(&self) -> bool;
}

/// Everything a socket is bound to.
#[derive(Clone, Debug)]
pub struct SocketConfig {
    pub creds: AuthCreds,
    pub version: WaVersion,
    pub events: EventSender,
}

/// Builds sockets for the bootstrapper.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, config: SocketConfig) -> crate::Result<Arc<dyn WaSocket>>;
}

/// [Connector] that dials a [Transport] and wraps it in a [Client].
pub struct ClientConnector {
    dialer: Arc<dyn Dialer>,
}

impl ClientConnector {
    pub fn new(dialer: Arc<dyn Dialer>) -> Self {
        Self { dialer }
    }
}

#[async_trait]
impl Connector for ClientConnector {
    async fn connect(&self, config: SocketConfig) -> crate::Result<Arc<dyn WaSocket>> {
        let client: Arc<dyn WaSocket> = Client::connect(self.dialer.as_ref(), config).await?;
        Ok(client)
    }
}

/// Client for the WhatsApp web multidevice API over a pluggable transport.
pub struct Client {
    transport: Arc<dyn Transport>,
    events: EventSender,
    me: Arc<RwLock<Option<Jid>>>,
    connected: Arc<AtomicBool>,
}

impl Client {
    /// Dial, announce the session and start the receive loop.
    /// Emits `connecting` first; `open` follows once the server accepts the session.
    pub async fn connect(dialer: &dyn Dialer, config: SocketConfig) -> crate::Result<Arc<Self>> {
        let SocketConfig {
            creds,
            version,
            events,
        } = config;
        emit(
            &events,
            Event::ConnectionUpdate(ConnectionUpdate::state(ConnectionState::Connecting)),
        )
        .await;

        let conn = dialer.dial(hello_node(&creds, version)).await?;
        let client = Arc::new(Self {
            transport: conn.transport,
            events,
            me: Arc::new(RwLock::new(creds.me.clone())),
            connected: Arc::new(AtomicBool::new(false)),
        });
        tokio::spawn(Self::recv_loop(
            NodeHandler::new(creds),
            conn.incoming,
            Arc::clone(&client.transport),
            client.events.clone(),
            Arc::clone(&client.me),
            Arc::clone(&client.connected),
        ));
        tracing::info!(%version, "client connecting");
        Ok(client)
    }

    async fn recv_loop(
        mut handler: NodeHandler,
        mut incoming: mpsc::Receiver<Node>,
        transport: Arc<dyn Transport>,
        events: EventSender,
        me: Arc<RwLock<Option<Jid>>>,
        connected: Arc<AtomicBool>,
    ) {
        while let Some(node) = incoming.recv().await {
            tracing::debug!(tag = %node.tag, "incoming node");
            for evt in handler.handle(&node) {
                if let Event::ConnectionUpdate(u) = &evt {
                    match u.connection {
                        Some(ConnectionState::Open) => connected.store(true, Ordering::SeqCst),
                        Some(ConnectionState::Close) => connected.store(false, Ordering::SeqCst),
                        _ => {}
                    }
                }
                if let Event::CredsUpdate(u) = &evt {
                    if let Some(jid) = &u.me {
                        *me.write().await = Some(jid.clone());
                    }
                }
                emit(&events, evt).await;
            }
            if handler.is_closed() {
                if let Err(e) = transport.close().await {
                    tracing::debug!(error = %e, "closing transport after server close");
                }
                break;
            }
        }
        connected.store(false, Ordering::SeqCst);
        for evt in handler.terminated() {
            emit(&events, evt).await;
        }
    }

    /// Our JID if paired.
    pub async fn own_id(&self) -> Option<Jid> {
        self.me.read().await.clone()
    }

    /// Generate a message ID (3EB0 + hex of hash).
    pub async fn generate_message_id(&self) -> MessageId {
        let mut data = Vec::with_capacity(8 + 32 + 16);
        data.extend_from_slice(&unix_now().to_be_bytes());
        if let Some(me) = self.own_id().await {
            data.extend_from_slice(me.user.as_bytes());
            data.extend_from_slice(b"@c.us");
        }
        data.extend_from_slice(&rand::random::<[u8; 16]>());
        let hash = sha2::Sha256::digest(&data);
        format!("3EB0{}", hex::encode(&hash[..9]).to_uppercase())
    }
}

#[async_trait]
impl WaSocket for Client {
    async fn group_fetch_all_participating(&self) -> crate::Result<BTreeMap<Jid, GroupMetadata>> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        let resp = self.transport.query(participating_query()).await?;
        let groups = parse_participating(&resp)?;
        emit(&self.events, Event::GroupsUpsert(groups.clone())).await;
        Ok(groups.into_iter().map(|g| (g.id.clone(), g)).collect())
    }

    async fn send_message(
        &self,
        to: &Jid,
        content: MessageContent,
    ) -> crate::Result<SendResponse> {
        if !self.is_connected() {
            return Err(Error::NotConnected);
        }
        if !to.is_addressable() {
            return Err(Error::InvalidJid(to.to_string()));
        }
        if content.text.is_empty() {
            return Err(SendError::EmptyBody.into());
        }
        let id = self.generate_message_id().await;
        let timestamp = unix_now();
        let node = Node::new("message")
            .with_attr("to", to)
            .with_attr("id", &id)
            .with_attr("type", "text")
            .with_attr("t", timestamp)
            .with_children(vec![Node::new("body").with_content(content.text.clone())]);
        self.transport.send(node).await?;
        tracing::debug!(%to, %id, "message sent");

        let echo = WebMessageInfo {
            key: MessageKey {
                remote_jid: to.clone(),
                from_me: true,
                id: id.clone(),
                participant: None,
            },
            message_timestamp: timestamp,
            push_name: None,
            message: Some(serde_json::json!({ "conversation": content.text })),
        };
        emit(
            &self.events,
            Event::MessagesUpsert {
                messages: vec![echo],
                kind: UpsertType::Append,
            },
        )
        .await;
        Ok(SendResponse {
            timestamp,
            id,
            to: to.clone(),
        })
    }

    async fn close(&self) -> crate::Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.transport.close().await
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

/// First node on a new connection: who we are and which version we speak.
fn hello_node(creds: &AuthCreds, version: WaVersion) -> Node {
    let mut node = Node::new("hello")
        .with_attr("version", version)
        .with_attr("registration_id", creds.registration_id)
        .with_attr("registered", creds.registered)
        .with_attr("noise_key", crate::b64::encode(&creds.noise_key.public));
    if let Some(me) = &creds.me {
        node = node.with_attr("jid", me);
    }
    node
}

async fn emit(events: &EventSender, evt: Event) {
    let name = evt.name();
    if events.send(evt).await.is_err() {
        tracing::debug!(event = name, "event dropped: no consumer");
    }
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
