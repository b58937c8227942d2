use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

use crate::auth::claims::Role;
use crate::auth::credentials::CredentialStore;
use crate::error::{classify_login_failure, ClientError, ClientResult};
use crate::events::{EventStream, SessionEvent};
use crate::http::api::ApiClient;
use crate::http::routes::{LOGIN_PATH, SEND_OTP_PATH, VERIFY_OTP_PATH};

/// Login form payload
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Successful login response
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub role: Option<Role>,
}

/// Session bootstrapper
///
/// Owns the public authentication flows: login seeds the credential
/// store, OTP calls pass through untouched, logout clears the store. The
/// realtime channel is deliberately not touched here; the top-level
/// client starts it after a successful login.
pub struct SessionManager {
    api: Arc<ApiClient>,
    credentials: CredentialStore,
    events: EventStream<SessionEvent>,
}

impl SessionManager {
    /// Create a new session manager
    pub fn new(
        api: Arc<ApiClient>,
        credentials: CredentialStore,
        events: EventStream<SessionEvent>,
    ) -> Self {
        Self {
            api,
            credentials,
            events,
        }
    }

    /// Authenticate with email and password
    ///
    /// A non-2xx response is mapped to a human-readable `LoginFailure` by
    /// pattern-matching the server's error text.
    pub async fn login(&self, request: &LoginRequest) -> ClientResult<LoginResponse> {
        let body = serde_json::to_value(request).map_err(ClientError::decode)?;
        let response = self.api.post(LOGIN_PATH, Some(body)).await?;

        if !response.is_success() {
            let failure = classify_login_failure(response.status(), response.body());
            warn!(status = response.status(), failure = %failure, "Login rejected");
            return Err(ClientError::Login(failure));
        }

        let login: LoginResponse = response.json().map_err(ClientError::decode)?;

        self.credentials
            .store_pair(&login.access_token, login.refresh_token.clone())
            .await?;

        // Prefer the explicit role from the response, fall back to the
        // role claim embedded in the token
        let role = match login.role {
            Some(role) => Some(role),
            None => self.credentials.role().await,
        };

        info!(role = ?role, "Login successful");
        self.events.publish(SessionEvent::LoggedIn { role }).await;

        Ok(login)
    }

    /// Request a one-time password for the given address
    pub async fn send_otp(&self, email: &str) -> ClientResult<()> {
        let response = self
            .api
            .post(SEND_OTP_PATH, Some(json!({ "email": email })))
            .await?;

        if !response.is_success() {
            return Err(ClientError::api(response.status(), response.body()));
        }
        Ok(())
    }

    /// Verify a one-time password
    pub async fn verify_otp(&self, email: &str, otp: &str) -> ClientResult<()> {
        let response = self
            .api
            .post(VERIFY_OTP_PATH, Some(json!({ "email": email, "otp": otp })))
            .await?;

        if !response.is_success() {
            return Err(ClientError::api(response.status(), response.body()));
        }
        Ok(())
    }

    /// Clear the session
    ///
    /// Emits `LoggedOut` so navigation can redirect to the login screen.
    /// Closing the realtime channel is the caller's responsibility.
    pub async fn logout(&self) -> ClientResult<()> {
        self.credentials.clear().await?;
        self.events.publish(SessionEvent::LoggedOut).await;
        info!("Logged out");
        Ok(())
    }

    /// Role of the currently authenticated user, if any
    pub async fn role(&self) -> Option<Role> {
        self.credentials.role().await
    }
}
