use thiserror::Error;

/// Library result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while running the bridge.
#[derive(Error, Debug)]
pub enum Error {
    #[error("connection: {0}")]
    Connection(#[from] ConnectionError),

    #[error("auth state: {0}")]
    Auth(#[from] AuthError),

    #[error("send: {0}")]
    Send(#[from] SendError),

    #[error("protocol node: {0}")]
    Binary(String),

    #[error("invalid JID: {0}")]
    InvalidJid(String),

    #[error("version lookup: {0}")]
    Version(String),

    #[error("not connected")]
    NotConnected,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Connection-related errors.
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("websocket: {0}")]
    WebSocket(String),

    #[error("no transport: {0}")]
    Dial(String),

    #[error("disconnected")]
    Disconnected,

    #[error("closed by server (code {0})")]
    Closed(u16),
}

/// Credential persistence errors.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("save failed: {0}")]
    Save(String),

    #[error("load failed: {0}")]
    Load(String),

    #[error("corrupt credentials: {0}")]
    Corrupt(String),
}

/// Send message errors.
#[derive(Error, Debug)]
pub enum SendError {
    #[error("empty message body")]
    EmptyBody,
}

impl Error {
    /// Disconnect status code carried by this error, when it stems from a server close.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Connection(ConnectionError::Closed(code)) => Some(*code),
            _ => None,
        }
    }
}
