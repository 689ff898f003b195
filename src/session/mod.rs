//! Session lifecycle: bootstrap, event processing and reconnects.
//!
//! One task owns the event receiver. It applies every event to the store and the mirror,
//! persists credential updates, and feeds connection updates to the [ReconnectPolicy].
//! Bootstraps only ever run from that task, so at most one is in flight.

mod reconnect;

pub use reconnect::{Decision, FinalReason, ReconnectPolicy, ReconnectState};

use crate::auth::{self, AuthCreds, SharedAuthStore};
use crate::client::{Connector, SocketConfig, WaSocket};
use crate::config::ReconnectConfig;
use crate::events::{self, ConnectionState, ConnectionUpdate, Event, EventReceiver, EventSender};
use crate::mirror::SharedMirror;
use crate::store::SharedStore;
use crate::version::VersionSource;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// The socket currently in use, if any.
pub type SharedSocket = Arc<RwLock<Option<Arc<dyn WaSocket>>>>;

/// Loads credentials, resolves the protocol version and asks the connector for a socket.
/// Safe to call repeatedly: stored credentials are reused.
pub struct Bootstrapper {
    auth: SharedAuthStore,
    connector: Arc<dyn Connector>,
    version: VersionSource,
    events: EventSender,
}

impl Bootstrapper {
    pub fn new(
        auth: SharedAuthStore,
        connector: Arc<dyn Connector>,
        version: VersionSource,
        events: EventSender,
    ) -> Self {
        Self {
            auth,
            connector,
            version,
            events,
        }
    }

    pub async fn bootstrap(&self) -> crate::Result<(Arc<dyn WaSocket>, AuthCreds)> {
        let creds = auth::load_or_init(self.auth.as_ref()).await?;
        let info = self.version.resolve().await;
        tracing::info!(
            version = %info.version,
            is_latest = info.is_latest,
            registered = creds.registered,
            "bootstrapping session"
        );
        let socket = self
            .connector
            .connect(SocketConfig {
                creds: creds.clone(),
                version: info.version,
                events: self.events.clone(),
            })
            .await?;
        Ok((socket, creds))
    }
}

/// Everything needed to start a [Session].
pub struct SessionConfig {
    pub auth: SharedAuthStore,
    pub connector: Arc<dyn Connector>,
    pub version: VersionSource,
    pub reconnect: ReconnectConfig,
    pub mirror: SharedMirror,
    pub store: SharedStore,
    pub print_qr: bool,
    pub event_capacity: usize,
}

/// Read side handed to the HTTP façade.
#[derive(Clone)]
pub struct SessionHandles {
    pub mirror: SharedMirror,
    pub store: SharedStore,
    pub socket: SharedSocket,
    pub state: watch::Receiver<ReconnectState>,
}

/// Event loop owning the reconnect policy.
pub struct Session {
    bootstrapper: Bootstrapper,
    events: EventReceiver,
    policy: ReconnectPolicy,
    auth: SharedAuthStore,
    creds: Option<AuthCreds>,
    mirror: SharedMirror,
    store: SharedStore,
    socket: SharedSocket,
    state_tx: watch::Sender<ReconnectState>,
    print_qr: bool,
}

impl Session {
    pub fn new(config: SessionConfig) -> (Self, SessionHandles) {
        let (events_tx, events_rx) = events::channel(config.event_capacity);
        let policy = ReconnectPolicy::new(config.reconnect);
        let (state_tx, state_rx) = watch::channel(policy.state().clone());
        let socket: SharedSocket = Arc::new(RwLock::new(None));
        let handles = SessionHandles {
            mirror: Arc::clone(&config.mirror),
            store: Arc::clone(&config.store),
            socket: Arc::clone(&socket),
            state: state_rx,
        };
        let session = Self {
            bootstrapper: Bootstrapper::new(
                Arc::clone(&config.auth),
                config.connector,
                config.version,
                events_tx,
            ),
            events: events_rx,
            policy,
            auth: config.auth,
            creds: None,
            mirror: config.mirror,
            store: config.store,
            socket,
            state_tx,
            print_qr: config.print_qr,
        };
        (session, handles)
    }

    /// Run on a separate task. The handle resolves to the final state, or `None` when the
    /// session task panicked or was cancelled; both outcomes are logged.
    pub fn spawn(self) -> JoinHandle<Option<ReconnectState>> {
        tokio::spawn(supervise(tokio::spawn(self.run())))
    }

    /// Run until the policy reaches a final state; returns that state.
    pub async fn run(mut self) -> ReconnectState {
        let mut deadline = self.connect().await.map(|d| Instant::now() + d);
        loop {
            if self.policy.state().is_final() {
                break;
            }
            tokio::select! {
                evt = self.events.recv() => {
                    let Some(evt) = evt else { break };
                    if let Some(delay) = self.handle_event(evt).await {
                        deadline = Some(Instant::now() + delay);
                    }
                }
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    deadline = self.connect().await.map(|d| Instant::now() + d);
                }
            }
        }
        let state = self.policy.state().clone();
        tracing::warn!(?state, "session stopped; HTTP API stays up without a client");
        state
    }

    /// Run the bootstrapper once. Returns the delay before the next attempt on failure.
    async fn connect(&mut self) -> Option<Duration> {
        self.policy.on_connecting();
        self.publish_state().await;
        match self.bootstrapper.bootstrap().await {
            Ok((socket, creds)) => {
                self.creds = Some(creds);
                *self.socket.write().await = Some(socket);
                None
            }
            Err(e) => {
                tracing::error!(error = %e, "error starting session");
                self.on_close(e.status_code()).await
            }
        }
    }

    /// Apply one event. Returns a reconnect delay when the event closed the connection.
    async fn handle_event(&mut self, evt: Event) -> Option<Duration> {
        tracing::trace!(event = evt.name(), "event");
        self.store.write().await.apply(&evt);
        match evt {
            Event::MessagesUpsert { messages, kind } => {
                let mut mirror = self.mirror.write().await;
                let appended = mirror.record_upsert(&messages, kind);
                tracing::debug!(
                    batch = messages.len(),
                    appended,
                    len = mirror.len(),
                    evicted = mirror.evicted(),
                    "messages.upsert"
                );
                None
            }
            Event::CredsUpdate(update) => {
                self.save_creds(&update).await;
                None
            }
            Event::ConnectionUpdate(update) => self.on_connection_update(update).await,
            _ => None,
        }
    }

    async fn save_creds(&mut self, update: &auth::CredsUpdate) {
        let Some(creds) = self.creds.as_mut() else {
            tracing::warn!("creds.update before bootstrap; ignored");
            return;
        };
        creds.apply(update);
        if let Err(e) = self.auth.save_creds(creds).await {
            tracing::error!(error = %e, "failed to persist credentials");
        }
    }

    async fn on_connection_update(&mut self, update: ConnectionUpdate) -> Option<Duration> {
        if let Some(qr) = &update.qr {
            tracing::info!("scan the QR code with WhatsApp > Linked devices");
            if self.print_qr {
                if let Err(e) = qr2term::print_qr(qr) {
                    tracing::warn!(error = %e, qr = %qr, "could not render QR code");
                }
            }
        }
        match update.connection {
            Some(ConnectionState::Open) => {
                self.policy.on_open();
                self.publish_state().await;
                tracing::info!("connected to WhatsApp");
                None
            }
            Some(ConnectionState::Connecting) => {
                self.policy.on_connecting();
                self.publish_state().await;
                None
            }
            Some(ConnectionState::Close) => {
                *self.socket.write().await = None;
                if let Some(d) = &update.last_disconnect {
                    match d.reason() {
                        Some(reason) => {
                            tracing::info!(%reason, message = %d.message, "connection closed")
                        }
                        None => tracing::info!(
                            status_code = d.status_code,
                            message = %d.message,
                            "connection closed"
                        ),
                    }
                }
                let code = update.last_disconnect.and_then(|d| d.status_code);
                self.on_close(code).await
            }
            None => None,
        }
    }

    async fn on_close(&mut self, status_code: Option<u16>) -> Option<Duration> {
        let decision = self.policy.on_close(status_code);
        self.publish_state().await;
        match decision {
            Decision::Reconnect { after, attempt } => {
                tracing::warn!(
                    status_code,
                    attempt,
                    delay_ms = after.as_millis() as u64,
                    "connection closed, reconnecting"
                );
                Some(after)
            }
            Decision::Halt(FinalReason::LoggedOut) => {
                tracing::error!(status_code, "logged out, restart process to pair again");
                None
            }
            Decision::Halt(FinalReason::RetriesExhausted) => {
                tracing::error!(status_code, "reconnect attempts exhausted");
                None
            }
            Decision::Ignore => None,
        }
    }

    async fn publish_state(&self) {
        let state = self.policy.state().clone();
        self.store.write().await.set_reconnect_state(state.clone());
        self.state_tx.send_replace(state);
    }
}

async fn supervise(task: JoinHandle<ReconnectState>) -> Option<ReconnectState> {
    match task.await {
        Ok(state) => {
            tracing::debug!(?state, "session task finished");
            Some(state)
        }
        Err(e) if e.is_panic() => {
            tracing::error!(error = %e, "session task panicked");
            None
        }
        Err(e) => {
            tracing::error!(error = %e, "session task cancelled");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::{AuthStore, CredsUpdate, MemoryAuthStore};
    use crate::client::{MessageContent, SendResponse};
    use crate::error::ConnectionError;
    use crate::mirror::Mirror;
    use crate::store::Store;
    use crate::types::{GroupMetadata, Jid, MessageKey, UpsertType, WebMessageInfo};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    struct IdleSocket;

    #[async_trait]
    impl WaSocket for IdleSocket {
        async fn group_fetch_all_participating(
            &self,
        ) -> crate::Result<BTreeMap<Jid, GroupMetadata>> {
            Ok(BTreeMap::new())
        }

        async fn send_message(
            &self,
            _to: &Jid,
            _content: MessageContent,
        ) -> crate::Result<SendResponse> {
            Err(crate::Error::NotConnected)
        }

        async fn close(&self) -> crate::Result<()> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }
    }

    /// Hands every socket's event sender to the test; optionally fails every connect.
    struct FakeConnector {
        calls: AtomicUsize,
        fail: bool,
        reject: Option<u16>,
        senders: mpsc::UnboundedSender<EventSender>,
    }

    #[async_trait]
    impl Connector for FakeConnector {
        async fn connect(&self, config: SocketConfig) -> crate::Result<Arc<dyn WaSocket>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(code) = self.reject {
                return Err(ConnectionError::Closed(code).into());
            }
            if self.fail {
                return Err(ConnectionError::Dial("refused".into()).into());
            }
            let _ = self.senders.send(config.events);
            Ok(Arc::new(IdleSocket))
        }
    }

    type Fixture = (
        Session,
        SessionHandles,
        Arc<FakeConnector>,
        Arc<MemoryAuthStore>,
        mpsc::UnboundedReceiver<EventSender>,
    );

    fn session(fail: bool, max_attempts: Option<u32>) -> Fixture {
        session_with(fail, None, max_attempts)
    }

    fn session_with(fail: bool, reject: Option<u16>, max_attempts: Option<u32>) -> Fixture {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(FakeConnector {
            calls: AtomicUsize::new(0),
            fail,
            reject,
            senders: tx,
        });
        let auth = Arc::new(MemoryAuthStore::new());
        let (session, handles) = Session::new(SessionConfig {
            auth: auth.clone(),
            connector: connector.clone(),
            version: VersionSource::Fixed(crate::version::BUNDLED_VERSION),
            reconnect: ReconnectConfig {
                initial_delay_ms: 1,
                max_delay_ms: 5,
                factor: 2.0,
                max_attempts,
            },
            mirror: Mirror::new(10, true).shared(),
            store: Store::default().shared(),
            print_qr: false,
            event_capacity: 16,
        });
        (session, handles, connector, auth, rx)
    }

    async fn next_socket(rx: &mut mpsc::UnboundedReceiver<EventSender>) -> EventSender {
        timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("bootstrap in time")
            .expect("connector alive")
    }

    fn inbound(id: &str) -> WebMessageInfo {
        WebMessageInfo {
            key: MessageKey {
                remote_jid: Jid::new("2", "s.whatsapp.net"),
                from_me: false,
                id: id.to_string(),
                participant: None,
            },
            message_timestamp: 1,
            push_name: None,
            message: Some(serde_json::json!({ "conversation": "hi" })),
        }
    }

    fn update(u: ConnectionUpdate) -> Event {
        Event::ConnectionUpdate(u)
    }

    #[tokio::test]
    async fn logged_out_close_is_final() {
        let (session, handles, connector, _auth, mut sockets) = session(false, None);
        let run = tokio::spawn(session.run());

        let events = next_socket(&mut sockets).await;
        events
            .send(update(ConnectionUpdate::state(ConnectionState::Open)))
            .await
            .unwrap();
        events
            .send(update(ConnectionUpdate::closed(Some(401), "logged out")))
            .await
            .unwrap();

        let state = timeout(Duration::from_secs(2), run).await.unwrap().unwrap();
        assert_eq!(
            state,
            ReconnectState::ClosedFinal {
                reason: FinalReason::LoggedOut,
                status_code: Some(401)
            }
        );
        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);
        assert!(handles.socket.read().await.is_none());
        assert!(handles.state.borrow().is_final());
    }

    #[tokio::test]
    async fn other_close_bootstraps_exactly_once_more() {
        let (session, handles, connector, _auth, mut sockets) = session(false, None);
        let run = tokio::spawn(session.run());

        let events = next_socket(&mut sockets).await;
        events
            .send(update(ConnectionUpdate::closed(Some(428), "connection closed")))
            .await
            .unwrap();
        let events = next_socket(&mut sockets).await;
        assert_eq!(connector.calls.load(Ordering::SeqCst), 2);

        events
            .send(update(ConnectionUpdate::state(ConnectionState::Open)))
            .await
            .unwrap();
        events
            .send(update(ConnectionUpdate::closed(Some(401), "logged out")))
            .await
            .unwrap();
        timeout(Duration::from_secs(2), run).await.unwrap().unwrap();
        assert_eq!(connector.calls.load(Ordering::SeqCst), 2);
        let dump = handles.store.read().await.to_json();
        assert_eq!(dump["state"]["reconnect"]["state"], "closedFinal");
    }

    #[tokio::test]
    async fn upserts_reach_mirror_and_creds_are_persisted() {
        let (session, handles, _connector, auth, mut sockets) = session(false, None);
        let run = tokio::spawn(session.run());

        let events = next_socket(&mut sockets).await;
        events
            .send(Event::MessagesUpsert {
                messages: vec![inbound("a")],
                kind: UpsertType::Notify,
            })
            .await
            .unwrap();
        let me = Jid::new("5511999999999", "s.whatsapp.net");
        events
            .send(Event::CredsUpdate(CredsUpdate {
                me: Some(me.clone()),
                registered: Some(true),
                ..Default::default()
            }))
            .await
            .unwrap();
        events
            .send(update(ConnectionUpdate::closed(Some(401), "logged out")))
            .await
            .unwrap();
        timeout(Duration::from_secs(2), run).await.unwrap().unwrap();

        let mirrored = handles.mirror.read().await.snapshot();
        assert_eq!(mirrored.len(), 1);
        assert_eq!(mirrored[0].key.id, "a");

        let stored = auth.load_creds().await.unwrap().unwrap();
        assert_eq!(stored.me, Some(me));
        assert!(stored.registered);
        // fresh creds on bootstrap, then the update
        assert_eq!(auth.save_count(), 2);
    }

    #[tokio::test]
    async fn failing_bootstrap_stops_after_attempt_limit() {
        let (session, handles, connector, _auth, _sockets) = session(true, Some(2));
        let state = timeout(Duration::from_secs(2), session.run())
            .await
            .unwrap();
        assert_eq!(
            state,
            ReconnectState::ClosedFinal {
                reason: FinalReason::RetriesExhausted,
                status_code: None
            }
        );
        assert_eq!(connector.calls.load(Ordering::SeqCst), 3);
        assert!(handles.socket.read().await.is_none());
    }

    #[tokio::test]
    async fn bootstrap_rejected_as_logged_out_is_final() {
        let (session, _handles, connector, _auth, _sockets) = session_with(false, Some(401), None);
        let state = timeout(Duration::from_secs(2), session.run())
            .await
            .unwrap();
        assert_eq!(
            state,
            ReconnectState::ClosedFinal {
                reason: FinalReason::LoggedOut,
                status_code: Some(401)
            }
        );
        assert_eq!(connector.calls.load(Ordering::SeqCst), 1);
    }

    async fn crashing_loop() -> ReconnectState {
        panic!("event loop crashed")
    }

    #[tokio::test]
    async fn panicking_session_task_is_reported() {
        assert_eq!(supervise(tokio::spawn(crashing_loop())).await, None);
    }

    #[tokio::test]
    async fn spawned_session_resolves_to_final_state() {
        let (session, _handles, _connector, _auth, _sockets) = session_with(false, Some(401), None);
        let state = timeout(Duration::from_secs(2), session.spawn())
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            state,
            Some(ReconnectState::ClosedFinal {
                reason: FinalReason::LoggedOut,
                ..
            })
        ));
    }
}
