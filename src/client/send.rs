//! Send message types.

use crate::types::{Jid, MessageId};
use serde::{Deserialize, Serialize};

/// Outgoing message content. Only text is supported.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageContent {
    pub text: String,
}

impl MessageContent {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Response from sending a message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SendResponse {
    /// Unix seconds.
    pub timestamp: u64,
    pub id: MessageId,
    pub to: Jid,
}
