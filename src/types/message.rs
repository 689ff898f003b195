//! Inbound message envelopes as delivered by `messages.upsert`.

use super::{Jid, MessageId};
use serde::{Deserialize, Serialize};

/// Identifies one message within a chat.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageKey {
    pub remote_jid: Jid,
    pub from_me: bool,
    pub id: MessageId,
    /// Sender inside a group chat.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub participant: Option<Jid>,
}

/// One message envelope. `message` is the decoded content, kept as opaque JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebMessageInfo {
    pub key: MessageKey,
    /// Unix seconds.
    pub message_timestamp: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub push_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<serde_json::Value>,
}

impl WebMessageInfo {
    /// Plain text carried by the message, if any.
    pub fn text(&self) -> Option<&str> {
        let message = self.message.as_ref()?;
        message
            .get("conversation")
            .and_then(|v| v.as_str())
            .or_else(|| {
                message
                    .get("extendedTextMessage")
                    .and_then(|m| m.get("text"))
                    .and_then(|v| v.as_str())
            })
    }
}

/// Tag attached to an upsert batch.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpsertType {
    /// New messages arriving live.
    Notify,
    /// Messages appended from history or other devices.
    Append,
}
