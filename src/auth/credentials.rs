use std::sync::Arc;

use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::auth::claims::{decode_claims, AccessClaims, Role};
use crate::auth::storage::{StoredCredentials, TokenStore};
use crate::error::{ClientError, ClientResult};

/// Single source of truth for the session's token pair
///
/// Every other component reads credentials through this store; nothing
/// else holds tokens. Both tokens are written through to the persistent
/// store so a restart (or page reload, in the original client) does not
/// force a fresh login.
pub struct CredentialStore {
    /// Current access token
    access_token: Arc<RwLock<Option<String>>>,
    /// Current refresh token
    refresh_token: Arc<RwLock<Option<String>>>,
    /// Persistent backing store
    store: Arc<dyn TokenStore>,
    /// Observable login flag, true iff a non-empty access token is present
    logged_in: watch::Sender<bool>,
}

impl CredentialStore {
    /// Create a store backed by the given persistence provider
    pub fn new(store: Arc<dyn TokenStore>) -> Self {
        let (logged_in, _) = watch::channel(false);
        Self {
            access_token: Arc::new(RwLock::new(None)),
            refresh_token: Arc::new(RwLock::new(None)),
            store,
            logged_in,
        }
    }

    /// Restore a persisted pair, if one exists
    pub async fn load(&self) -> ClientResult<()> {
        match self.store.load().await {
            Ok(Some(credentials)) => {
                info!("Restored credentials from token store");
                *self.access_token.write().await = Some(credentials.access_token);
                *self.refresh_token.write().await = credentials.refresh_token;
                self.emit_logged_in().await;
                Ok(())
            }
            Ok(None) => {
                debug!("No persisted credentials found");
                Ok(())
            }
            Err(e) => Err(ClientError::storage(e)),
        }
    }

    /// Get the current access token
    pub async fn access_token(&self) -> Option<String> {
        self.access_token.read().await.clone()
    }

    /// Get the current refresh token
    pub async fn refresh_token(&self) -> Option<String> {
        self.refresh_token.read().await.clone()
    }

    /// Overwrite the access token in place and persist the pair
    pub async fn set_access_token(&self, token: impl Into<String>) -> ClientResult<()> {
        *self.access_token.write().await = Some(token.into());
        self.persist().await?;
        self.emit_logged_in().await;
        Ok(())
    }

    /// Overwrite the refresh token in place and persist the pair
    pub async fn set_refresh_token(&self, token: impl Into<String>) -> ClientResult<()> {
        *self.refresh_token.write().await = Some(token.into());
        self.persist().await?;
        self.emit_logged_in().await;
        Ok(())
    }

    /// Replace the pair atomically: one write, one persistence operation.
    ///
    /// A refresh response that does not rotate the refresh token passes
    /// `None` and the existing refresh token is kept.
    pub async fn store_pair(
        &self,
        access_token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> ClientResult<()> {
        {
            let mut access = self.access_token.write().await;
            let mut refresh = self.refresh_token.write().await;
            *access = Some(access_token.into());
            if let Some(token) = refresh_token {
                *refresh = Some(token);
            }
        }
        self.persist().await?;
        self.emit_logged_in().await;
        Ok(())
    }

    /// Clear both tokens and the persisted copy
    ///
    /// Emits `logged_in = false`. Does not touch the realtime channel;
    /// tearing that down is the caller's responsibility.
    pub async fn clear(&self) -> ClientResult<()> {
        {
            let mut access = self.access_token.write().await;
            let mut refresh = self.refresh_token.write().await;
            *access = None;
            *refresh = None;
        }
        self.store.clear().await.map_err(ClientError::storage)?;
        self.emit_logged_in().await;
        info!("Credentials cleared");
        Ok(())
    }

    /// Check if a non-empty access token is present
    pub async fn is_logged_in(&self) -> bool {
        self.access_token
            .read()
            .await
            .as_deref()
            .map_or(false, |token| !token.is_empty())
    }

    /// Subscribe to the login flag
    ///
    /// Consumers must treat `false` as "redirect to login".
    pub fn watch_logged_in(&self) -> watch::Receiver<bool> {
        self.logged_in.subscribe()
    }

    /// Decode the claims of the current access token
    pub async fn claims(&self) -> ClientResult<Option<AccessClaims>> {
        match self.access_token.read().await.as_deref() {
            Some(token) if !token.is_empty() => decode_claims(token).map(Some),
            _ => Ok(None),
        }
    }

    /// Role claim of the current access token, if decodable
    pub async fn role(&self) -> Option<Role> {
        match self.claims().await {
            Ok(claims) => claims.and_then(|c| c.role),
            Err(e) => {
                warn!(error = %e, "Could not decode role from access token");
                None
            }
        }
    }

    /// Write the current in-memory pair through to the backing store
    async fn persist(&self) -> ClientResult<()> {
        let access = self.access_token.read().await.clone();
        let refresh = self.refresh_token.read().await.clone();

        match access {
            Some(access_token) => {
                let credentials = StoredCredentials {
                    access_token,
                    refresh_token: refresh,
                };
                self.store
                    .store(&credentials)
                    .await
                    .map_err(ClientError::storage)
            }
            None => self.store.clear().await.map_err(ClientError::storage),
        }
    }

    async fn emit_logged_in(&self) {
        let value = self.is_logged_in().await;
        self.logged_in.send_replace(value);
    }
}

impl Clone for CredentialStore {
    fn clone(&self) -> Self {
        Self {
            access_token: Arc::clone(&self.access_token),
            refresh_token: Arc::clone(&self.refresh_token),
            store: Arc::clone(&self.store),
            logged_in: self.logged_in.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::storage::mock::MemoryTokenStore;

    fn make_store() -> (CredentialStore, Arc<MemoryTokenStore>) {
        let backing = Arc::new(MemoryTokenStore::new());
        (CredentialStore::new(backing.clone()), backing)
    }

    #[tokio::test]
    async fn test_store_pair_persists_and_flips_flag() {
        let (credentials, backing) = make_store();
        let mut logged_in = credentials.watch_logged_in();
        assert!(!*logged_in.borrow());

        credentials
            .store_pair("access-1", Some("refresh-1".to_string()))
            .await
            .unwrap();

        logged_in.changed().await.unwrap();
        assert!(*logged_in.borrow());
        assert_eq!(
            backing.stored().unwrap(),
            StoredCredentials {
                access_token: "access-1".to_string(),
                refresh_token: Some("refresh-1".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_store_pair_keeps_refresh_token_when_not_rotated() {
        let (credentials, _backing) = make_store();
        credentials
            .store_pair("access-1", Some("refresh-1".to_string()))
            .await
            .unwrap();

        credentials.store_pair("access-2", None).await.unwrap();

        assert_eq!(credentials.access_token().await.as_deref(), Some("access-2"));
        assert_eq!(
            credentials.refresh_token().await.as_deref(),
            Some("refresh-1")
        );
    }

    #[tokio::test]
    async fn test_individual_setters_overwrite_in_place() {
        let (credentials, backing) = make_store();
        credentials.set_access_token("access-1").await.unwrap();
        credentials.set_refresh_token("refresh-1").await.unwrap();

        assert!(credentials.is_logged_in().await);
        assert_eq!(
            backing.stored().unwrap(),
            StoredCredentials {
                access_token: "access-1".to_string(),
                refresh_token: Some("refresh-1".to_string()),
            }
        );
    }

    #[tokio::test]
    async fn test_clear_wipes_memory_and_storage() {
        let (credentials, backing) = make_store();
        credentials
            .store_pair("access-1", Some("refresh-1".to_string()))
            .await
            .unwrap();

        credentials.clear().await.unwrap();

        assert!(!credentials.is_logged_in().await);
        assert_eq!(credentials.access_token().await, None);
        assert_eq!(credentials.refresh_token().await, None);
        assert!(backing.stored().is_none());
    }

    #[tokio::test]
    async fn test_load_restores_persisted_pair() {
        let backing = Arc::new(MemoryTokenStore::with_credentials(StoredCredentials {
            access_token: "persisted-access".to_string(),
            refresh_token: Some("persisted-refresh".to_string()),
        }));
        let credentials = CredentialStore::new(backing);

        credentials.load().await.unwrap();

        assert!(credentials.is_logged_in().await);
        assert_eq!(
            credentials.access_token().await.as_deref(),
            Some("persisted-access")
        );
    }
}
