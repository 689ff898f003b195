//! # whatsapp-bridge
//!
//! Long-running bridge between a WhatsApp multidevice account and a small HTTP API.
//!
//! ## Features
//!
//! - QR pairing with credentials persisted under an auth directory
//! - Automatic reconnect with capped exponential backoff; logout is final
//! - Bounded mirror of inbound messages
//! - JSON endpoints to list messages and groups, send text and dump the event store
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use whatsapp_bridge::{
//!     auth::MultiFileAuthState, client::ClientConnector, config::Config, mirror::Mirror,
//!     server, session::{Session, SessionConfig}, socket::WsDialer, store::Store,
//!     version::VersionSource,
//! };
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     let (session, handles) = Session::new(SessionConfig {
//!         auth: Arc::new(MultiFileAuthState::new(&config.auth.dir)),
//!         connector: Arc::new(ClientConnector::new(Arc::new(WsDialer::new(&config.transport.url)))),
//!         version: VersionSource::remote(&config.version.url),
//!         reconnect: config.reconnect.clone(),
//!         mirror: Mirror::new(config.mirror.capacity, config.mirror.first_only).shared(),
//!         store: Store::new(config.mirror.messages_per_chat).shared(),
//!         print_qr: true,
//!         event_capacity: 256,
//!     });
//!     let _session_task = session.spawn();
//!     let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
//!     server::serve(listener, handles.into(), std::future::pending()).await
//! }
//! ```

pub mod auth;
pub(crate) mod b64;
pub mod binary;
pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod mirror;
pub mod server;
pub mod session;
pub mod socket;
pub mod store;
pub mod transport;
pub mod types;
pub mod version;

pub use client::{Client, MessageContent, SendResponse, WaSocket};
pub use error::{Error, Result};
pub use events::Event;
pub use mirror::Mirror;
pub use session::{Session, SessionConfig, SessionHandles};
pub use store::Store;
pub use transport::Transport;
pub use types::{Jid, MessageId};
