use std::sync::Arc;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::auth::credentials::CredentialStore;
use crate::config::ClientConfig;
use crate::error::{ClientError, ClientResult};
use crate::events::{EventStream, SessionEvent};
use crate::http::client::{HttpClient, HttpMethod, HttpResponse};
use crate::http::routes::{bearer_headers, is_public_path, REFRESH_TOKEN_PATH};

/// Callback hook into the realtime channel
///
/// Registered by the top-level wiring so the coordinator can drive the
/// channel without depending on the notifications module.
pub type ChannelHook = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Body of the refresh call
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenRequest {
    refresh_token: String,
}

/// Token pair returned by the refresh endpoint
///
/// The server may or may not rotate the refresh token.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshTokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Refresh protocol state
///
/// The boolean-flag-plus-subject pattern of the original client is made
/// explicit: either no refresh is running, or exactly one is and every
/// request that hits 401 in the meantime parks a waiter here instead of
/// issuing a second refresh call.
enum RefreshState {
    Idle,
    Refreshing {
        waiters: Vec<oneshot::Sender<ClientResult<String>>>,
    },
}

/// Authenticated API client
///
/// Wraps every outbound REST call: attaches the bearer token to protected
/// paths, passes public paths through untouched, and recovers from 401 by
/// running the single-flight token refresh protocol. Every other error
/// status is forwarded unchanged to the caller.
pub struct ApiClient {
    /// Underlying HTTP transport
    http: Arc<dyn HttpClient>,
    /// Source of truth for the token pair
    credentials: CredentialStore,
    /// Client configuration
    config: Arc<ClientConfig>,
    /// Session event stream
    events: EventStream<SessionEvent>,
    /// Refresh protocol state, the one mutual-exclusion point of the crate
    refresh_state: Arc<Mutex<RefreshState>>,
    /// Invoked after a successful refresh so the channel re-authenticates
    reconnect_hook: Arc<RwLock<Option<ChannelHook>>>,
    /// Invoked on terminal refresh failure to close the channel
    teardown_hook: Arc<RwLock<Option<ChannelHook>>>,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(
        http: Arc<dyn HttpClient>,
        credentials: CredentialStore,
        config: Arc<ClientConfig>,
        events: EventStream<SessionEvent>,
    ) -> Self {
        Self {
            http,
            credentials,
            config,
            events,
            refresh_state: Arc::new(Mutex::new(RefreshState::Idle)),
            reconnect_hook: Arc::new(RwLock::new(None)),
            teardown_hook: Arc::new(RwLock::new(None)),
        }
    }

    /// Register the hook that reconnects the realtime channel
    pub async fn set_reconnect_hook(&self, hook: ChannelHook) {
        *self.reconnect_hook.write().await = Some(hook);
    }

    /// Register the hook that tears the realtime channel down
    pub async fn set_teardown_hook(&self, hook: ChannelHook) {
        *self.teardown_hook.write().await = Some(hook);
    }

    /// Perform a GET request
    pub async fn get(&self, path: &str) -> ClientResult<HttpResponse> {
        self.request(HttpMethod::GET, path, None).await
    }

    /// Perform a POST request with an optional JSON body
    pub async fn post(
        &self,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ClientResult<HttpResponse> {
        self.request(HttpMethod::POST, path, body).await
    }

    /// Perform a PATCH request with an optional JSON body
    pub async fn patch(
        &self,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ClientResult<HttpResponse> {
        self.request(HttpMethod::PATCH, path, body).await
    }

    /// Main request path
    pub async fn request(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> ClientResult<HttpResponse> {
        let url = self.config.api_url(path);

        // Public paths skip token attachment and 401 recovery entirely
        if is_public_path(path) {
            return self.send(method, &url, None, body.as_ref()).await;
        }

        let token = self.credentials.access_token().await;
        let response = self.send(method, &url, token.as_deref(), body.as_ref()).await?;

        if response.status() != 401 {
            return Ok(response);
        }

        debug!(path = path, "Protected call returned 401, entering refresh protocol");
        let new_token = self.refresh_access_token().await?;

        // Exactly one replay per original request. If the replay comes
        // back 401 again the status is returned to the caller instead of
        // re-entering the protocol, so a persistently rejected token
        // cannot loop.
        self.send(method, &url, Some(&new_token), body.as_ref()).await
    }

    /// Dispatch a single HTTP call through the transport
    async fn send(
        &self,
        method: HttpMethod,
        url: &str,
        access_token: Option<&str>,
        body: Option<&serde_json::Value>,
    ) -> ClientResult<HttpResponse> {
        let headers = bearer_headers(access_token);
        let payload = match body {
            Some(value) => serde_json::to_string(value).map_err(ClientError::decode)?,
            None => String::new(),
        };

        let result = match method {
            HttpMethod::GET => self.http.get(url, headers).await,
            HttpMethod::POST => self.http.post(url, headers, payload).await,
            HttpMethod::PATCH => self.http.patch(url, headers, payload).await,
        };

        result.map_err(ClientError::transport)
    }

    /// Obtain a fresh access token, joining an in-flight refresh if one
    /// is already running.
    ///
    /// Exactly one refresh network call is issued no matter how many
    /// concurrent requests hit 401; the rest suspend until the owner
    /// resolves the shared outcome.
    async fn refresh_access_token(&self) -> ClientResult<String> {
        let waiter = {
            let mut state = self.refresh_state.lock().await;
            match &mut *state {
                RefreshState::Refreshing { waiters } => {
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    Some(rx)
                }
                RefreshState::Idle => {
                    *state = RefreshState::Refreshing {
                        waiters: Vec::new(),
                    };
                    None
                }
            }
        };

        if let Some(rx) = waiter {
            debug!("Refresh already in flight, queueing request");
            return rx
                .await
                .unwrap_or_else(|_| Err(ClientError::refresh_failed("refresh owner went away")));
        }

        match self.perform_refresh().await {
            Ok(access_token) => {
                self.release_waiters(Ok(access_token.clone())).await;
                Ok(access_token)
            }
            Err(e) => {
                self.release_waiters(Err(e.clone())).await;
                self.handle_terminal_refresh_failure(&e).await;
                Err(e)
            }
        }
    }

    /// Issue the one refresh network call and store the resulting pair
    ///
    /// The new pair is persisted before the function returns, so it is
    /// durable before any queued request replays with it.
    async fn perform_refresh(&self) -> ClientResult<String> {
        let refresh_token = self
            .credentials
            .refresh_token()
            .await
            .ok_or(ClientError::MissingRefreshToken)?;

        let url = self.config.api_url(REFRESH_TOKEN_PATH);
        let payload = serde_json::to_string(&RefreshTokenRequest { refresh_token })
            .map_err(ClientError::decode)?;

        let response = self
            .http
            .post(&url, bearer_headers(None), payload)
            .await
            .map_err(|e| ClientError::refresh_failed(e.to_string()))?;

        if !response.is_success() {
            return Err(ClientError::refresh_failed(format!(
                "refresh endpoint returned {}: {}",
                response.status(),
                response.body()
            )));
        }

        let pair: RefreshTokenResponse = response
            .json()
            .map_err(|e| ClientError::refresh_failed(e.to_string()))?;

        self.credentials
            .store_pair(&pair.access_token, pair.refresh_token)
            .await?;

        info!("Access token refreshed");
        self.events.publish(SessionEvent::TokenRefreshed).await;

        // The channel's credential is fixed at connect time, so a token
        // change always means teardown + reconnect. The hook debounces
        // internally; no need to hold up the waiting requests for it.
        if let Some(hook) = self.reconnect_hook.read().await.clone() {
            tokio::spawn(hook());
        }

        Ok(pair.access_token)
    }

    /// Drain the waiter queue exactly once with the shared outcome
    async fn release_waiters(&self, outcome: ClientResult<String>) {
        let waiters = {
            let mut state = self.refresh_state.lock().await;
            match std::mem::replace(&mut *state, RefreshState::Idle) {
                RefreshState::Refreshing { waiters } => waiters,
                RefreshState::Idle => Vec::new(),
            }
        };

        if !waiters.is_empty() {
            debug!(waiters = waiters.len(), "Releasing queued requests");
        }
        for waiter in waiters {
            // A waiter whose caller gave up is not an error
            let _ = waiter.send(outcome.clone());
        }
    }

    /// Terminal refresh failure: close the channel, clear the session,
    /// tell the user. Runs once per failed refresh, on the owner only.
    async fn handle_terminal_refresh_failure(&self, err: &ClientError) {
        error!(error = %err, "Token refresh failed, logging out");

        // Spawned, not awaited: the failed request may itself be the
        // channel's own snapshot fetch, which is still holding the
        // channel's lifecycle gate
        if let Some(hook) = self.teardown_hook.read().await.clone() {
            tokio::spawn(hook());
        }

        if let Err(e) = self.credentials.clear().await {
            warn!(error = %e, "Failed to clear credentials during logout");
        }

        self.events
            .publish(SessionEvent::SessionExpired {
                message: "Session expired, please log in again".to_string(),
            })
            .await;
        self.events.publish(SessionEvent::LoggedOut).await;
    }
}

impl Clone for ApiClient {
    fn clone(&self) -> Self {
        Self {
            http: Arc::clone(&self.http),
            credentials: self.credentials.clone(),
            config: Arc::clone(&self.config),
            events: self.events.clone(),
            refresh_state: Arc::clone(&self.refresh_state),
            reconnect_hook: Arc::clone(&self.reconnect_hook),
            teardown_hook: Arc::clone(&self.teardown_hook),
        }
    }
}
