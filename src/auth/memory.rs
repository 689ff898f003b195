use super::{AuthCreds, AuthStore};
use crate::{error::AuthError, Result};
use async_trait::async_trait;
use std::sync::RwLock;

/// In-memory credential store (for testing or single-run; not persistent).
#[derive(Default)]
pub struct MemoryAuthStore {
    creds: RwLock<Option<AuthCreds>>,
    saves: RwLock<usize>,
}

impl MemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save_creds` calls so far.
    pub fn save_count(&self) -> usize {
        self.saves.read().map(|n| *n).unwrap_or(0)
    }
}

#[async_trait]
impl AuthStore for MemoryAuthStore {
    async fn load_creds(&self) -> Result<Option<AuthCreds>> {
        let creds = self
            .creds
            .read()
            .map_err(|e| AuthError::Load(e.to_string()))?;
        Ok(creds.clone())
    }

    async fn save_creds(&self, creds: &AuthCreds) -> Result<()> {
        *self
            .creds
            .write()
            .map_err(|e| AuthError::Save(e.to_string()))? = Some(creds.clone());
        *self
            .saves
            .write()
            .map_err(|e| AuthError::Save(e.to_string()))? += 1;
        Ok(())
    }
}
