//! In-memory projection of the event stream (chats, contacts, messages, groups, connection).
//!
//! Bound to the session loop, which applies every event; `GET /api/updates` serializes it whole.

use crate::events::{ConnectionState, ConnectionUpdate, Event};
use crate::session::ReconnectState;
use crate::types::{Chat, Contact, GroupMetadata, Jid, UpsertType, WebMessageInfo};
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Default number of messages kept per chat.
pub const DEFAULT_MESSAGES_PER_CHAT: usize = 1_000;

pub type SharedStore = Arc<RwLock<Store>>;

/// Connection state as last reported, plus the reconnect policy's view.
#[derive(Clone, Debug, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreState {
    #[serde(flatten)]
    pub connection: ConnectionUpdate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reconnect: Option<ReconnectState>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Store {
    chats: BTreeMap<Jid, Chat>,
    contacts: BTreeMap<Jid, Contact>,
    messages: BTreeMap<Jid, Vec<WebMessageInfo>>,
    group_metadata: BTreeMap<Jid, GroupMetadata>,
    state: StoreState,
    #[serde(skip)]
    messages_per_chat: usize,
}

impl Default for Store {
    fn default() -> Self {
        Self::new(DEFAULT_MESSAGES_PER_CHAT)
    }
}

impl Store {
    pub fn new(messages_per_chat: usize) -> Self {
        Self {
            chats: BTreeMap::new(),
            contacts: BTreeMap::new(),
            messages: BTreeMap::new(),
            group_metadata: BTreeMap::new(),
            state: StoreState::default(),
            messages_per_chat: messages_per_chat.max(1),
        }
    }

    pub fn shared(self) -> SharedStore {
        Arc::new(RwLock::new(self))
    }

    /// Apply one event.
    pub fn apply(&mut self, evt: &Event) {
        match evt {
            Event::ConnectionUpdate(update) => self.apply_connection(update),
            Event::MessagesUpsert { messages, kind } => {
                for msg in messages {
                    self.upsert_message(msg, *kind);
                }
            }
            Event::ContactsUpsert(contacts) => {
                for contact in contacts {
                    self.upsert_contact(contact);
                }
            }
            Event::GroupsUpsert(groups) => {
                for group in groups {
                    if let Some(chat) = self.chats.get_mut(&group.id) {
                        chat.name = Some(group.subject.clone());
                    }
                    self.group_metadata.insert(group.id.clone(), group.clone());
                }
            }
            Event::CredsUpdate(_) => {}
        }
    }

    pub fn set_reconnect_state(&mut self, state: ReconnectState) {
        self.state.reconnect = Some(state);
    }

    fn apply_connection(&mut self, update: &ConnectionUpdate) {
        let current = &mut self.state.connection;
        if let Some(connection) = update.connection {
            current.connection = Some(connection);
            if connection == ConnectionState::Open {
                current.qr = None;
            }
        }
        if update.last_disconnect.is_some() {
            current.last_disconnect = update.last_disconnect.clone();
        }
        if update.qr.is_some() {
            current.qr = update.qr.clone();
        }
        if update.is_new_login.is_some() {
            current.is_new_login = update.is_new_login;
        }
    }

    fn upsert_message(&mut self, msg: &WebMessageInfo, kind: UpsertType) {
        let jid = msg.key.remote_jid.clone();
        let list = self.messages.entry(jid.clone()).or_default();
        match list.iter_mut().find(|m| m.key.id == msg.key.id) {
            Some(existing) => *existing = msg.clone(),
            None => {
                list.push(msg.clone());
                if list.len() > self.messages_per_chat {
                    let excess = list.len() - self.messages_per_chat;
                    list.drain(..excess);
                }
            }
        }

        let chat = self
            .chats
            .entry(jid.clone())
            .or_insert_with(|| Chat::new(jid));
        chat.conversation_timestamp = Some(msg.message_timestamp);
        if kind == UpsertType::Notify && !msg.key.from_me {
            chat.unread_count += 1;
        }
    }

    fn upsert_contact(&mut self, contact: &Contact) {
        let entry = self
            .contacts
            .entry(contact.id.clone())
            .or_insert_with(|| contact.clone());
        if contact.name.is_some() {
            entry.name = contact.name.clone();
        }
        if contact.notify.is_some() {
            entry.notify = contact.notify.clone();
        }
    }

    /// Whole store as JSON.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or_else(|e| {
            tracing::error!(error = %e, "store serialization failed");
            serde_json::Value::Null
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::MessageKey;

    fn msg(chat: &str, id: &str, from_me: bool) -> WebMessageInfo {
        WebMessageInfo {
            key: MessageKey {
                remote_jid: chat.parse().unwrap(),
                from_me,
                id: id.to_string(),
                participant: None,
            },
            message_timestamp: 10,
            push_name: None,
            message: Some(serde_json::json!({ "conversation": id })),
        }
    }

    #[test]
    fn upsert_groups_messages_by_chat_and_counts_unread() {
        let mut store = Store::default();
        store.apply(&Event::MessagesUpsert {
            messages: vec![
                msg("2@s.whatsapp.net", "a", false),
                msg("2@s.whatsapp.net", "b", true),
                msg("3@s.whatsapp.net", "c", false),
            ],
            kind: UpsertType::Notify,
        });
        let two: Jid = "2@s.whatsapp.net".parse().unwrap();
        assert_eq!(store.messages[&two].len(), 2);
        let chat = &store.chats[&two];
        assert_eq!(chat.unread_count, 1);
    }

    #[test]
    fn same_id_replaces_instead_of_duplicating() {
        let mut store = Store::default();
        let first = msg("2@s.whatsapp.net", "a", false);
        let mut edited = first.clone();
        edited.message = Some(serde_json::json!({ "conversation": "edited" }));
        for m in [first, edited] {
            store.apply(&Event::MessagesUpsert {
                messages: vec![m],
                kind: UpsertType::Append,
            });
        }
        let two: Jid = "2@s.whatsapp.net".parse().unwrap();
        assert_eq!(store.messages[&two].len(), 1);
        assert_eq!(store.messages[&two][0].text(), Some("edited"));
    }

    #[test]
    fn per_chat_history_is_bounded() {
        let mut store = Store::new(2);
        for id in ["a", "b", "c"] {
            store.apply(&Event::MessagesUpsert {
                messages: vec![msg("2@s.whatsapp.net", id, false)],
                kind: UpsertType::Notify,
            });
        }
        let two: Jid = "2@s.whatsapp.net".parse().unwrap();
        let ids: Vec<_> = store.messages[&two].iter().map(|m| m.key.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn contacts_merge_names() {
        let mut store = Store::default();
        let id: Jid = "2@s.whatsapp.net".parse().unwrap();
        store.apply(&Event::ContactsUpsert(vec![Contact {
            id: id.clone(),
            name: Some("Ana Souza".into()),
            notify: None,
        }]));
        store.apply(&Event::ContactsUpsert(vec![Contact {
            id: id.clone(),
            name: None,
            notify: Some("Ana".into()),
        }]));
        let c = &store.contacts[&id];
        assert_eq!(c.name.as_deref(), Some("Ana Souza"));
        assert_eq!(c.notify.as_deref(), Some("Ana"));
    }

    #[test]
    fn open_clears_qr_and_snapshot_has_all_sections() {
        let mut store = Store::default();
        store.apply(&Event::ConnectionUpdate(ConnectionUpdate::qr("ref,a,b,c")));
        assert!(store.state.connection.qr.is_some());
        store.apply(&Event::ConnectionUpdate(ConnectionUpdate::state(
            ConnectionState::Open,
        )));
        assert!(store.state.connection.qr.is_none());

        let v = store.to_json();
        for key in ["chats", "contacts", "messages", "groupMetadata", "state"] {
            assert!(v.get(key).is_some(), "missing {}", key);
        }
        assert_eq!(v["state"]["connection"], "open");
    }
}
