use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info};

/// Token pair as persisted between application runs
///
/// One canonical document with one pair of keys, so every component reads
/// and writes the same values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
}

/// Structure for storing the credential pair with integrity checks
#[derive(Debug, Clone, Serialize, Deserialize)]
struct CredentialStoragePayload {
    /// The persisted token pair
    credentials: StoredCredentials,
    /// When this storage entry was written
    created_at: DateTime<Utc>,
    /// Hash to verify credential integrity
    integrity_hash: String,
}

/// Storage provider for the session's credential pair
#[async_trait::async_trait]
pub trait TokenStore: Send + Sync {
    /// Load the persisted pair, if any
    async fn load(&self) -> Result<Option<StoredCredentials>>;

    /// Persist a pair, replacing whatever was stored before
    async fn store(&self, credentials: &StoredCredentials) -> Result<()>;

    /// Remove the persisted pair
    async fn clear(&self) -> Result<()>;
}

/// File-backed token store writing a single JSON document
pub struct JsonFileTokenStore {
    path: PathBuf,
}

impl JsonFileTokenStore {
    /// Create a store backed by the given file path
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Calculate an integrity hash over the critical credential fields
    fn calculate_integrity_hash(credentials: &StoredCredentials) -> String {
        let credential_string = format!(
            "{}:{}",
            credentials.access_token,
            credentials.refresh_token.as_deref().unwrap_or("")
        );

        let mut hasher = Sha256::new();
        hasher.update(credential_string.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

#[async_trait::async_trait]
impl TokenStore for JsonFileTokenStore {
    async fn load(&self) -> Result<Option<StoredCredentials>> {
        let raw = match tokio::fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No token store file found");
                return Ok(None);
            }
            Err(e) => return Err(anyhow!("failed to read token store: {}", e)),
        };

        let payload: CredentialStoragePayload = serde_json::from_slice(&raw)
            .map_err(|e| anyhow!("failed to deserialize token store: {}", e))?;

        // Verify integrity
        let expected_hash = Self::calculate_integrity_hash(&payload.credentials);
        if expected_hash != payload.integrity_hash {
            error!(
                path = %self.path.display(),
                "Credential integrity check failed, possible tampering"
            );
            return Err(anyhow!("credential integrity check failed"));
        }

        debug!(path = %self.path.display(), "Credentials restored from token store");
        Ok(Some(payload.credentials))
    }

    async fn store(&self, credentials: &StoredCredentials) -> Result<()> {
        let payload = CredentialStoragePayload {
            credentials: credentials.clone(),
            created_at: Utc::now(),
            integrity_hash: Self::calculate_integrity_hash(credentials),
        };

        let raw = serde_json::to_vec_pretty(&payload)?;
        tokio::fs::write(&self.path, raw)
            .await
            .map_err(|e| anyhow!("failed to write token store: {}", e))?;

        info!(path = %self.path.display(), "Credentials stored");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                info!(path = %self.path.display(), "Credentials removed from token store");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No credentials to remove");
                Ok(())
            }
            Err(e) => Err(anyhow!("failed to remove token store: {}", e)),
        }
    }
}

/// In-memory store for tests
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::sync::Mutex;

    /// A token store that only lives as long as the process
    #[derive(Default)]
    pub struct MemoryTokenStore {
        credentials: Mutex<Option<StoredCredentials>>,
    }

    impl MemoryTokenStore {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seed the store with a pair, as if a previous run had persisted it
        pub fn with_credentials(credentials: StoredCredentials) -> Self {
            Self {
                credentials: Mutex::new(Some(credentials)),
            }
        }

        /// Snapshot of the stored pair, for assertions
        pub fn stored(&self) -> Option<StoredCredentials> {
            self.credentials.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl TokenStore for MemoryTokenStore {
        async fn load(&self) -> Result<Option<StoredCredentials>> {
            Ok(self.credentials.lock().unwrap().clone())
        }

        async fn store(&self, credentials: &StoredCredentials) -> Result<()> {
            *self.credentials.lock().unwrap() = Some(credentials.clone());
            Ok(())
        }

        async fn clear(&self) -> Result<()> {
            *self.credentials.lock().unwrap() = None;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileTokenStore::new(dir.path().join("session.json"));

        assert!(store.load().await.unwrap().is_none());

        let credentials = StoredCredentials {
            access_token: "access-1".to_string(),
            refresh_token: Some("refresh-1".to_string()),
        };
        store.store(&credentials).await.unwrap();

        let loaded = store.load().await.unwrap().unwrap();
        assert_eq!(loaded, credentials);

        store.clear().await.unwrap();
        assert!(store.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear_is_safe_when_nothing_stored() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileTokenStore::new(dir.path().join("missing.json"));
        store.clear().await.unwrap();
    }

    #[tokio::test]
    async fn test_tampered_store_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        let store = JsonFileTokenStore::new(&path);

        let credentials = StoredCredentials {
            access_token: "access-1".to_string(),
            refresh_token: None,
        };
        store.store(&credentials).await.unwrap();

        // Flip the stored access token without updating the hash
        let raw = tokio::fs::read_to_string(&path).await.unwrap();
        let tampered = raw.replace("access-1", "access-2");
        tokio::fs::write(&path, tampered).await.unwrap();

        assert!(store.load().await.is_err());
    }
}
