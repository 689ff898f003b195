mod chat;
mod group;
mod jid;
mod message;

pub use chat::{Chat, Contact};
pub use group::{GroupMetadata, GroupParticipant, GroupSummary};
pub use jid::{Jid, JidParseError, BROADCAST_SERVER, DEFAULT_USER_SERVER, GROUP_SERVER};
pub use message::{MessageKey, UpsertType, WebMessageInfo};

/// Message ID type (WhatsApp internal ID string).
pub type MessageId = String;
