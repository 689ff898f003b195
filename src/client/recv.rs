//! Translation of inbound protocol nodes into [Event]s.

use crate::auth::{AuthCreds, CredsUpdate};
use crate::binary::Node;
use crate::events::{ConnectionState, ConnectionUpdate, DisconnectReason, Event};
use crate::types::{Contact, Jid, MessageKey, UpsertType, WebMessageInfo};
use serde_json::json;

/// Stateful decoder for one connection.
pub(crate) struct NodeHandler {
    creds: AuthCreds,
    me: Option<Jid>,
    closed: bool,
}

impl NodeHandler {
    pub(crate) fn new(creds: AuthCreds) -> Self {
        let me = creds.me.clone();
        Self {
            creds,
            me,
            closed: false,
        }
    }

    /// Whether a `close` update has already been produced for this connection.
    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    /// Events produced by one inbound node, in emission order.
    pub(crate) fn handle(&mut self, node: &Node) -> Vec<Event> {
        match node.tag.as_str() {
            "success" => vec![Event::ConnectionUpdate(ConnectionUpdate::state(
                ConnectionState::Open,
            ))],
            "pair-device" => node
                .children_by_tag("ref")
                .find_map(Node::text)
                .map(|r| {
                    vec![Event::ConnectionUpdate(ConnectionUpdate::qr(
                        self.creds.qr_payload(&r),
                    ))]
                })
                .unwrap_or_default(),
            "pair-success" => self.pair_success(node),
            "failure" => {
                let code = node.attr_parsed::<u16>("reason");
                self.close(code, "Connection Failure")
            }
            "stream:error" => {
                let code = if node.get_child_by_tag("conflict").is_some() {
                    Some(DisconnectReason::ConnectionReplaced.code())
                } else {
                    node.attr_parsed::<u16>("code")
                };
                self.close(code, "Stream Errored")
            }
            "message" => self.messages(std::slice::from_ref(node), UpsertType::Notify),
            "offline" => {
                let batch: Vec<Node> = node.children_by_tag("message").cloned().collect();
                self.messages(&batch, UpsertType::Append)
            }
            other => {
                tracing::trace!(tag = %other, "ignoring node");
                Vec::new()
            }
        }
    }

    /// `close` update for a transport that ended without an explicit reason.
    pub(crate) fn terminated(&mut self) -> Vec<Event> {
        if self.closed {
            return Vec::new();
        }
        self.close(
            Some(DisconnectReason::ConnectionClosed.code()),
            "Connection Terminated",
        )
    }

    fn close(&mut self, code: Option<u16>, message: &str) -> Vec<Event> {
        self.closed = true;
        vec![Event::ConnectionUpdate(ConnectionUpdate::closed(code, message))]
    }

    fn pair_success(&mut self, node: &Node) -> Vec<Event> {
        let Some(jid) = node.attr("jid").and_then(|j| j.parse::<Jid>().ok()) else {
            tracing::warn!("pair-success without a valid jid");
            return Vec::new();
        };
        self.me = Some(jid.clone());
        let update = CredsUpdate {
            me: Some(jid),
            platform: node.attr("platform").map(str::to_string),
            registered: Some(true),
            ..Default::default()
        };
        self.creds.apply(&update);
        vec![
            Event::CredsUpdate(update),
            Event::ConnectionUpdate(ConnectionUpdate {
                is_new_login: Some(true),
                ..Default::default()
            }),
        ]
    }

    fn messages(&self, nodes: &[Node], kind: UpsertType) -> Vec<Event> {
        let messages: Vec<WebMessageInfo> =
            nodes.iter().filter_map(|n| self.parse_message(n)).collect();
        if messages.is_empty() {
            return Vec::new();
        }
        let contacts: Vec<Contact> = messages
            .iter()
            .filter(|m| !m.key.from_me)
            .filter_map(|m| {
                let name = m.push_name.clone()?;
                let sender = m.key.participant.as_ref().unwrap_or(&m.key.remote_jid);
                Some(Contact {
                    id: sender.to_non_device(),
                    name: None,
                    notify: Some(name),
                })
            })
            .collect();
        let mut events = vec![Event::MessagesUpsert { messages, kind }];
        if !contacts.is_empty() {
            events.push(Event::ContactsUpsert(contacts));
        }
        events
    }

    fn parse_message(&self, node: &Node) -> Option<WebMessageInfo> {
        let remote_jid: Jid = node.attr("from")?.parse().ok()?;
        let id = node.attr("id")?.to_string();
        let participant: Option<Jid> = remote_jid
            .is_group()
            .then(|| node.attr("participant").and_then(|p| p.parse().ok()))
            .flatten();
        let sender = participant.as_ref().unwrap_or(&remote_jid);
        let from_me = self.me.as_ref().is_some_and(|me| me.same_user(sender));
        let message = node
            .get_child_by_tag("body")
            .and_then(Node::text)
            .map(|text| json!({ "conversation": text }));
        Some(WebMessageInfo {
            key: MessageKey {
                remote_jid: remote_jid.to_non_device(),
                from_me,
                id,
                participant,
            },
            message_timestamp: node.attr_parsed("t").unwrap_or(0),
            push_name: node.attr("notify").map(str::to_string),
            message,
        })
    }
}
