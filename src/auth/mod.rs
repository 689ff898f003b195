//! Credential state: load at bootstrap, persist on every `creds.update`.

mod creds;
mod file;
mod memory;

pub use creds::{AuthCreds, CredsUpdate, KeyPair, SignedKeyPair};
pub use file::MultiFileAuthState;
pub use memory::MemoryAuthStore;

use async_trait::async_trait;
use std::sync::Arc;

/// Store trait: persist and load session credentials.
#[async_trait]
pub trait AuthStore: Send + Sync {
    /// Stored credentials, or `None` when no session has been created yet.
    async fn load_creds(&self) -> crate::Result<Option<AuthCreds>>;

    /// Overwrite the stored credentials.
    async fn save_creds(&self, creds: &AuthCreds) -> crate::Result<()>;
}

/// Shared handle to a credential store.
pub type SharedAuthStore = Arc<dyn AuthStore>;

/// Load stored credentials, or create and persist fresh ones.
pub async fn load_or_init(store: &dyn AuthStore) -> crate::Result<AuthCreds> {
    if let Some(creds) = store.load_creds().await? {
        tracing::debug!(registered = creds.registered, "loaded stored credentials");
        return Ok(creds);
    }
    let creds = AuthCreds::generate();
    store.save_creds(&creds).await?;
    tracing::info!("created fresh credentials");
    Ok(creds)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn load_or_init_is_stable_across_calls() {
        let store = MemoryAuthStore::new();
        let first = load_or_init(&store).await.unwrap();
        let second = load_or_init(&store).await.unwrap();
        assert_eq!(first, second);
    }
}
