//! WhatsApp Web protocol version lookup.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Published version descriptor (`{"version":[2,3000,1015901307]}`).
pub const DEFAULT_VERSION_URL: &str =
    "https://raw.githubusercontent.com/WhiskeySockets/Baileys/master/src/Defaults/baileys-version.json";

/// Version used when the lookup fails.
pub const BUNDLED_VERSION: WaVersion = WaVersion([2, 3000, 1015901307]);

/// WhatsApp Web client version triple.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WaVersion(pub [u32; 3]);

impl fmt::Display for WaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.0[0], self.0[1], self.0[2])
    }
}

/// Result of a version lookup.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VersionInfo {
    pub version: WaVersion,
    /// False when the bundled fallback was used.
    pub is_latest: bool,
    pub error: Option<String>,
}

#[derive(Deserialize)]
struct VersionDescriptor {
    version: WaVersion,
}

/// Where the bootstrapper gets its protocol version from.
#[derive(Clone, Debug)]
pub enum VersionSource {
    /// Fetch from a URL serving the descriptor JSON.
    Remote { client: reqwest::Client, url: String },
    /// Always use this version.
    Fixed(WaVersion),
}

impl VersionSource {
    pub fn remote(url: impl Into<String>) -> Self {
        Self::Remote {
            client: reqwest::Client::new(),
            url: url.into(),
        }
    }

    /// Resolve the version. Never fails: lookup errors fall back to [BUNDLED_VERSION].
    pub async fn resolve(&self) -> VersionInfo {
        match self {
            Self::Fixed(version) => VersionInfo {
                version: *version,
                is_latest: true,
                error: None,
            },
            Self::Remote { client, url } => match fetch_latest_version(client, url).await {
                Ok(version) => VersionInfo {
                    version,
                    is_latest: true,
                    error: None,
                },
                Err(e) => {
                    tracing::warn!(%url, error = %e, fallback = %BUNDLED_VERSION, "version lookup failed");
                    VersionInfo {
                        version: BUNDLED_VERSION,
                        is_latest: false,
                        error: Some(e.to_string()),
                    }
                }
            },
        }
    }
}

/// Fetch the latest version descriptor from `url`.
pub async fn fetch_latest_version(client: &reqwest::Client, url: &str) -> crate::Result<WaVersion> {
    let resp = client
        .get(url)
        .send()
        .await
        .map_err(|e| crate::Error::Version(e.to_string()))?;
    if !resp.status().is_success() {
        return Err(crate::Error::Version(format!("HTTP {}", resp.status())));
    }
    let descriptor: VersionDescriptor = resp
        .json()
        .await
        .map_err(|e| crate::Error::Version(e.to_string()))?;
    Ok(descriptor.version)
}
