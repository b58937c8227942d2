use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::warn;

// Export modules
pub mod auth;
pub mod config;
pub mod error;
pub mod events;
pub mod http;
pub mod notifications;

#[cfg(test)]
mod tests;

pub use auth::{AccessClaims, CredentialStore, JsonFileTokenStore, Role, TokenStore};
pub use auth::{LoginRequest, LoginResponse, SessionManager};
pub use config::ClientConfig;
pub use error::{ClientError, ClientResult, LoginFailure};
pub use events::{SessionEvent, Subscriber};
pub use http::{ApiClient, HttpClient, HttpResponse, ReqwestHttpClient};
pub use notifications::{Notification, NotificationChannel, NotificationFeed};

use events::{EventStream, EVENT_BUFFER_SIZE, EVENT_STREAM_CAPACITY};

/// Initialize tracing for binaries and examples embedding the client
pub fn init_tracing() {
    use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let _ = tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,ayr_client=debug")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .try_init();
}

/// Top-level client state
///
/// Wires the credential store, the authenticated API client, the session
/// flows and the notification channel together, and owns the hook
/// registrations that let the API client drive the channel across a
/// token change.
pub struct Client {
    config: Arc<ClientConfig>,
    credentials: CredentialStore,
    api: Arc<ApiClient>,
    session: Arc<SessionManager>,
    feed: Arc<NotificationFeed>,
    channel: Arc<NotificationChannel>,
    events: EventStream<SessionEvent>,
}

impl Client {
    /// Create a client with the default transport and file-backed store
    pub fn new(config: ClientConfig) -> Self {
        let store: Arc<dyn TokenStore> =
            Arc::new(JsonFileTokenStore::new(config.token_store_path.clone()));
        Self::with_parts(config, Arc::new(ReqwestHttpClient::new()), store)
    }

    /// Create a client from explicit parts, used by tests to inject a
    /// mock transport and an in-memory store
    pub fn with_parts(
        config: ClientConfig,
        http: Arc<dyn HttpClient>,
        store: Arc<dyn TokenStore>,
    ) -> Self {
        let config = Arc::new(config);
        let events = EventStream::new(EVENT_STREAM_CAPACITY, EVENT_BUFFER_SIZE);
        let credentials = CredentialStore::new(store);

        let api = Arc::new(ApiClient::new(
            http,
            credentials.clone(),
            Arc::clone(&config),
            events.clone(),
        ));
        let feed = Arc::new(NotificationFeed::new(Arc::clone(&api)));
        let channel = Arc::new(NotificationChannel::new(
            Arc::clone(&config),
            credentials.clone(),
            Arc::clone(&feed),
        ));
        let session = Arc::new(SessionManager::new(
            Arc::clone(&api),
            credentials.clone(),
            events.clone(),
        ));

        Self {
            config,
            credentials,
            api,
            session,
            feed,
            channel,
            events,
        }
    }

    /// Initialize the client
    ///
    /// Registers the channel hooks on the API client, restores a
    /// persisted session, and when one is present starts the
    /// notification channel so a restart behaves like the original
    /// page reload: no fresh login required.
    pub async fn initialize(&self) -> ClientResult<()> {
        let channel = Arc::clone(&self.channel);
        self.api
            .set_reconnect_hook(Arc::new(move || -> BoxFuture<'static, ()> {
                let channel = Arc::clone(&channel);
                Box::pin(async move { channel.reconnect().await })
            }))
            .await;

        let channel = Arc::clone(&self.channel);
        self.api
            .set_teardown_hook(Arc::new(move || -> BoxFuture<'static, ()> {
                let channel = Arc::clone(&channel);
                Box::pin(async move { channel.teardown().await })
            }))
            .await;

        self.credentials.load().await?;

        if self.credentials.is_logged_in().await {
            if let Err(e) = self.channel.init().await {
                // A stale restored session may fail here; the session
                // expiry path has already taken care of the cleanup
                warn!(error = %e, "Could not start notification channel from restored session");
            }
        }

        Ok(())
    }

    /// Log in and bring up the notification channel
    pub async fn login(&self, request: &LoginRequest) -> ClientResult<LoginResponse> {
        let response = self.session.login(request).await?;

        // A successful login triggers the channel's first connection
        if let Err(e) = self.channel.init().await {
            warn!(error = %e, "Could not start notification channel after login");
        }

        Ok(response)
    }

    /// Log out and close the notification channel
    pub async fn logout(&self) -> ClientResult<()> {
        // The channel must not outlive the credential it connected with
        self.channel.teardown().await;
        self.session.logout().await
    }

    /// Subscribe to session lifecycle events
    pub fn subscribe_events(&self) -> Subscriber<SessionEvent> {
        self.events.subscribe()
    }

    /// Client configuration
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Credential store
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Authenticated API client, for feature code issuing its own calls
    pub fn api(&self) -> Arc<ApiClient> {
        Arc::clone(&self.api)
    }

    /// Session flows
    pub fn session(&self) -> Arc<SessionManager> {
        Arc::clone(&self.session)
    }

    /// Notification feed
    pub fn feed(&self) -> Arc<NotificationFeed> {
        Arc::clone(&self.feed)
    }

    /// Notification channel manager
    pub fn notifications(&self) -> Arc<NotificationChannel> {
        Arc::clone(&self.channel)
    }
}
