use std::fmt;
use std::str::FromStr;

/// Server for regular user accounts.
pub const DEFAULT_USER_SERVER: &str = "s.whatsapp.net";
/// Server for groups.
pub const GROUP_SERVER: &str = "g.us";
/// Legacy user server still accepted in recipients.
pub const LEGACY_USER_SERVER: &str = "c.us";
pub const BROADCAST_SERVER: &str = "broadcast";

/// WhatsApp identifier: `user@server`, optionally with a device (`user:device@server`).
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Jid {
    pub user: String,
    pub device: u16,
    pub server: String,
}

impl Jid {
    pub fn new(user: impl Into<String>, server: impl Into<String>) -> Self {
        Self {
            user: user.into(),
            device: 0,
            server: server.into(),
        }
    }

    /// Group JID from the bare group id the server reports (`12036...` -> `12036...@g.us`).
    pub fn group(id: impl Into<String>) -> Self {
        Self::new(id, GROUP_SERVER)
    }

    /// Server JID (no user), e.g. the `@g.us` query target.
    pub fn server(server: impl Into<String>) -> Self {
        Self::new("", server)
    }

    pub fn is_group(&self) -> bool {
        self.server == GROUP_SERVER
    }

    /// Whether this JID can be the target of a sent message.
    pub fn is_addressable(&self) -> bool {
        !self.user.is_empty()
            && matches!(
                self.server.as_str(),
                DEFAULT_USER_SERVER | LEGACY_USER_SERVER | GROUP_SERVER | BROADCAST_SERVER
            )
    }

    /// Same account, any device.
    pub fn same_user(&self, other: &Jid) -> bool {
        self.user == other.user && self.server == other.server
    }

    /// JID without device suffix.
    pub fn to_non_device(&self) -> Self {
        Self::new(self.user.clone(), self.server.clone())
    }
}

impl FromStr for Jid {
    type Err = JidParseError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() {
            return Err(JidParseError(s.to_string()));
        }
        let Some((user_part, server)) = s.split_once('@') else {
            return Ok(Self::server(s));
        };
        if server.is_empty() || server.contains('@') {
            return Err(JidParseError(s.to_string()));
        }
        let (user, device) = match user_part.split_once(':') {
            Some((user, device)) => (
                user,
                device.parse().map_err(|_| JidParseError(s.to_string()))?,
            ),
            None => (user_part, 0),
        };
        Ok(Self {
            user: user.to_string(),
            device,
            server: server.to_string(),
        })
    }
}

#[derive(Debug)]
pub struct JidParseError(pub String);

impl fmt::Display for JidParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid JID format: {:?}", self.0)
    }
}

impl std::error::Error for JidParseError {}

impl From<JidParseError> for crate::Error {
    fn from(e: JidParseError) -> Self {
        crate::Error::InvalidJid(e.0)
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.device > 0 {
            write!(f, "{}:{}@{}", self.user, self.device, self.server)
        } else if !self.user.is_empty() {
            write!(f, "{}@{}", self.user, self.server)
        } else {
            write!(f, "{}", self.server)
        }
    }
}

impl serde::Serialize for Jid {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for Jid {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Jid::from_str(&s).map_err(serde::de::Error::custom)
    }
}
