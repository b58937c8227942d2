use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Environment variable name for the REST API base URL
const API_BASE_ENV: &str = "AYR_API_BASE";
/// Environment variable name for the WebSocket base URL
const WS_BASE_ENV: &str = "AYR_WS_BASE";
/// Environment variable name for the token store file path
const TOKEN_STORE_ENV: &str = "AYR_TOKEN_STORE";

/// Default REST API base URL
const DEFAULT_API_BASE: &str = "http://localhost:8080/api";
/// Default WebSocket base URL
const DEFAULT_WS_BASE: &str = "ws://localhost:8080/ws";
/// Default token store filename
const DEFAULT_TOKEN_STORE: &str = "ayr.session.json";

/// Path appended to the WebSocket base to upgrade the broker connection
const WEBSOCKET_UPGRADE_PATH: &str = "/websocket";
/// Per-user queue the notification subscription targets
const NOTIFICATION_DESTINATION: &str = "/user/queue/notifications";

/// Delay between teardown and reconnect of the notification channel.
/// Exists so the old socket's close handshake can complete before the
/// replacement connection forms; it is not a retry backoff.
const DEFAULT_RECONNECT_DEBOUNCE_MS: u64 = 500;
/// Fixed delay between transport-level reconnect attempts
const DEFAULT_TRANSPORT_RECONNECT_DELAY_SECS: u64 = 5;
/// Interval for broker heart-beats in both directions
const DEFAULT_HEARTBEAT_INTERVAL_SECS: u64 = 25;

/// Configuration for the AreYouReporting client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// REST API base URL, without a trailing slash
    pub api_base: String,
    /// WebSocket base URL, without a trailing slash
    pub ws_base: String,
    /// Path of the persisted token store file
    pub token_store_path: PathBuf,
    /// Destination of the per-user notification queue
    pub notification_destination: String,
    /// Debounce between channel teardown and reconnect, in milliseconds
    pub reconnect_debounce_ms: u64,
    /// Fixed delay between transport reconnect attempts, in seconds
    pub transport_reconnect_delay_secs: u64,
    /// Broker heart-beat interval, in seconds
    pub heartbeat_interval_secs: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.to_string(),
            ws_base: DEFAULT_WS_BASE.to_string(),
            token_store_path: PathBuf::from(DEFAULT_TOKEN_STORE),
            notification_destination: NOTIFICATION_DESTINATION.to_string(),
            reconnect_debounce_ms: DEFAULT_RECONNECT_DEBOUNCE_MS,
            transport_reconnect_delay_secs: DEFAULT_TRANSPORT_RECONNECT_DELAY_SECS,
            heartbeat_interval_secs: DEFAULT_HEARTBEAT_INTERVAL_SECS,
        }
    }
}

impl ClientConfig {
    /// Build a configuration from environment variables, falling back to
    /// defaults for anything unset. A `.env` file is honored if present.
    pub fn from_env() -> ClientResult<Self> {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Ok(api_base) = env::var(API_BASE_ENV) {
            if api_base.is_empty() {
                return Err(ClientError::Config {
                    key: API_BASE_ENV.to_string(),
                    reason: "value is empty".to_string(),
                });
            }
            config.api_base = api_base;
        }

        if let Ok(ws_base) = env::var(WS_BASE_ENV) {
            if ws_base.is_empty() {
                return Err(ClientError::Config {
                    key: WS_BASE_ENV.to_string(),
                    reason: "value is empty".to_string(),
                });
            }
            config.ws_base = ws_base;
        }

        if let Ok(store_path) = env::var(TOKEN_STORE_ENV) {
            config.token_store_path = PathBuf::from(store_path);
        }

        Ok(config)
    }

    /// Resolve a request path against the API base
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.api_base.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Resolve the WebSocket upgrade URL, appending the access token as a
    /// query parameter when one is available. The token also travels in
    /// the `Authorization` header; the query parameter covers transports
    /// that strip headers on upgrade.
    pub fn ws_url(&self, access_token: Option<&str>) -> String {
        let base = format!(
            "{}{}",
            self.ws_base.trim_end_matches('/'),
            WEBSOCKET_UPGRADE_PATH
        );
        match access_token {
            Some(token) => format!("{}?access_token={}", base, token),
            None => base,
        }
    }

    /// Debounce between channel teardown and reconnect
    pub fn reconnect_debounce(&self) -> Duration {
        Duration::from_millis(self.reconnect_debounce_ms)
    }

    /// Fixed delay between transport reconnect attempts
    pub fn transport_reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.transport_reconnect_delay_secs)
    }

    /// Broker heart-beat interval
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}
