//! Transport abstraction for the connection layer.
//!
//! Implement [Dialer] to plug in a WebSocket, a Noise-wrapped socket, or an in-process
//! fake. The client sends and queries through [Transport]; inbound nodes that are not
//! query responses arrive on [Connection::incoming].

use crate::binary::Node;
use crate::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Async trait for an established connection.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a node without waiting for a reply.
    async fn send(&self, node: Node) -> Result<()>;

    /// Send an `iq` node and wait for the response carrying the same `id`.
    async fn query(&self, node: Node) -> Result<Node>;

    /// Close the connection. Inbound delivery stops afterwards.
    async fn close(&self) -> Result<()>;
}

/// A dialed connection: outbound handle plus the inbound node stream.
pub struct Connection {
    pub transport: Arc<dyn Transport>,
    pub incoming: mpsc::Receiver<Node>,
}

/// Opens connections. `hello` is the first node sent once the link is up.
#[async_trait]
pub trait Dialer: Send + Sync {
    async fn dial(&self, hello: Node) -> Result<Connection>;
}
