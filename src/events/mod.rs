//! Event types emitted by the client and consumed by the session loop.

use crate::auth::CredsUpdate;
use crate::types::{Contact, GroupMetadata, UpsertType, WebMessageInfo};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Default capacity of the event channel. A full channel makes the client wait.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Sending half handed to the client.
pub type EventSender = mpsc::Sender<Event>;
/// Receiving half owned by the session loop.
pub type EventReceiver = mpsc::Receiver<Event>;

/// Bounded event channel between the client and its single consumer.
pub fn channel(capacity: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(capacity.max(1))
}

/// Events emitted by a [WaSocket](crate::client::WaSocket).
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// `connection.update`: state transition, disconnect metadata or a pairing QR.
    ConnectionUpdate(ConnectionUpdate),

    /// `creds.update`: partial credential change to persist.
    CredsUpdate(CredsUpdate),

    /// `messages.upsert`: a batch of envelopes and its upsert type.
    MessagesUpsert {
        messages: Vec<WebMessageInfo>,
        kind: UpsertType,
    },

    /// `contacts.upsert`
    ContactsUpsert(Vec<Contact>),

    /// `groups.upsert`: metadata learned from a group query or notification.
    GroupsUpsert(Vec<GroupMetadata>),
}

impl Event {
    /// Event name as used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Event::ConnectionUpdate(_) => "connection.update",
            Event::CredsUpdate(_) => "creds.update",
            Event::MessagesUpsert { .. } => "messages.upsert",
            Event::ContactsUpsert(_) => "contacts.upsert",
            Event::GroupsUpsert(_) => "groups.upsert",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Connecting,
    Open,
    Close,
}

/// Payload of `connection.update`. Absent fields did not change.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection: Option<ConnectionState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_disconnect: Option<LastDisconnect>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_new_login: Option<bool>,
}

impl ConnectionUpdate {
    pub fn state(connection: ConnectionState) -> Self {
        Self {
            connection: Some(connection),
            ..Default::default()
        }
    }

    /// `close` update carrying a status code and message.
    pub fn closed(status_code: Option<u16>, message: impl Into<String>) -> Self {
        Self {
            connection: Some(ConnectionState::Close),
            last_disconnect: Some(LastDisconnect::new(status_code, message)),
            ..Default::default()
        }
    }

    pub fn qr(code: impl Into<String>) -> Self {
        Self {
            qr: Some(code.into()),
            ..Default::default()
        }
    }
}

/// Why the last connection ended.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastDisconnect {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub message: String,
    /// Unix milliseconds.
    pub date: u64,
}

impl LastDisconnect {
    pub fn new(status_code: Option<u16>, message: impl Into<String>) -> Self {
        let date = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            status_code,
            message: message.into(),
            date,
        }
    }

    pub fn reason(&self) -> Option<DisconnectReason> {
        self.status_code.and_then(DisconnectReason::from_code)
    }
}

/// Disconnect status codes reported with a `close` update.
#[derive(Clone, Debug, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum DisconnectReason {
    /// Also reported as `timedOut`.
    ConnectionLost = 408,
    ConnectionClosed = 428,
    MultideviceMismatch = 411,
    ConnectionReplaced = 440,
    LoggedOut = 401,
    Forbidden = 403,
    BadSession = 500,
    UnavailableService = 503,
    RestartRequired = 515,
}

impl DisconnectReason {
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            408 => Some(Self::ConnectionLost),
            428 => Some(Self::ConnectionClosed),
            411 => Some(Self::MultideviceMismatch),
            440 => Some(Self::ConnectionReplaced),
            401 => Some(Self::LoggedOut),
            403 => Some(Self::Forbidden),
            500 => Some(Self::BadSession),
            503 => Some(Self::UnavailableService),
            515 => Some(Self::RestartRequired),
            _ => None,
        }
    }

    pub fn code(self) -> u16 {
        self as u16
    }

    pub fn is_logged_out(self) -> bool {
        self == Self::LoggedOut
    }
}

impl std::fmt::Display for DisconnectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            Self::ConnectionLost => "connection lost",
            Self::ConnectionClosed => "connection closed",
            Self::MultideviceMismatch => "multidevice mismatch",
            Self::ConnectionReplaced => "connection replaced by another session",
            Self::LoggedOut => "logged out",
            Self::Forbidden => "forbidden",
            Self::BadSession => "bad session",
            Self::UnavailableService => "service unavailable",
            Self::RestartRequired => "restart required",
        };
        write!(f, "{} (code {})", msg, self.code())
    }
}
