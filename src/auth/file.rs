use super::{AuthCreds, AuthStore};
use crate::{error::AuthError, Result};
use async_trait::async_trait;
use std::path::PathBuf;

const CREDS_FILE: &str = "creds.json";

/// Credentials kept as JSON files in a local directory (`<dir>/creds.json`).
///
/// Writes go to a temporary file in the same directory and are renamed into place,
/// so a crash mid-write leaves the previous credentials intact.
pub struct MultiFileAuthState {
    dir: PathBuf,
}

impl MultiFileAuthState {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn creds_path(&self) -> PathBuf {
        self.dir.join(CREDS_FILE)
    }
}

#[async_trait]
impl AuthStore for MultiFileAuthState {
    async fn load_creds(&self) -> Result<Option<AuthCreds>> {
        let path = self.creds_path();
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(AuthError::Load(format!("{}: {}", path.display(), e)).into()),
        };
        let creds = serde_json::from_slice(&raw)
            .map_err(|e| AuthError::Corrupt(format!("{}: {}", path.display(), e)))?;
        Ok(Some(creds))
    }

    async fn save_creds(&self, creds: &AuthCreds) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| AuthError::Save(format!("{}: {}", self.dir.display(), e)))?;
        let data =
            serde_json::to_vec_pretty(creds).map_err(|e| AuthError::Save(e.to_string()))?;
        let tmp = self
            .dir
            .join(format!(".{}.{}.tmp", CREDS_FILE, uuid::Uuid::new_v4()));
        tokio::fs::write(&tmp, &data)
            .await
            .map_err(|e| AuthError::Save(format!("{}: {}", tmp.display(), e)))?;
        tokio::fs::rename(&tmp, self.creds_path())
            .await
            .map_err(|e| AuthError::Save(format!("{}: {}", self.creds_path().display(), e)))?;
        tracing::debug!(dir = %self.dir.display(), "credentials saved");
        Ok(())
    }
}
