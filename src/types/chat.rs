use super::Jid;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: Jid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_timestamp: Option<u64>,
}

impl Chat {
    pub fn new(id: Jid) -> Self {
        Self {
            id,
            name: None,
            unread_count: 0,
            conversation_timestamp: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    pub id: Jid,
    /// Name saved in the address book.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Push name the contact set for themselves.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notify: Option<String>,
}
