//! Cross-module scenario tests
//!
//! These exercise the session core end to end against the mock HTTP
//! transport and the in-memory token store: the refresh protocol under
//! concurrency, the login/logout flows, and the notification feed and
//! channel semantics.


use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;

use crate::auth::storage::mock::MemoryTokenStore;
use crate::config::ClientConfig;
use crate::http::client::mock::MockHttpClient;
use crate::Client;

/// API base every test config points at
pub(crate) const TEST_API_BASE: &str = "http://api.test";

/// Config with short timings so tests settle quickly
pub(crate) fn test_config() -> ClientConfig {
    ClientConfig {
        api_base: TEST_API_BASE.to_string(),
        reconnect_debounce_ms: 50,
        transport_reconnect_delay_secs: 1,
        heartbeat_interval_secs: 1,
        ..ClientConfig::default()
    }
}

/// Absolute URL for a path, as the mock transport sees it
pub(crate) fn test_url(path: &str) -> String {
    format!("{}{}", TEST_API_BASE, path)
}

/// A syntactically valid JWT with the given claims payload
pub(crate) fn make_jwt(payload: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string().as_bytes());
    format!("{}.{}.sig", header, body)
}

/// A wired client over the mock transport and an in-memory store
pub(crate) async fn make_client() -> (Client, Arc<MockHttpClient>, Arc<MemoryTokenStore>) {
    make_client_with_config(test_config()).await
}

pub(crate) async fn make_client_with_config(
    config: ClientConfig,
) -> (Client, Arc<MockHttpClient>, Arc<MemoryTokenStore>) {
    let http = Arc::new(MockHttpClient::new());
    let store = Arc::new(MemoryTokenStore::new());
    let client = Client::with_parts(config, http.clone(), store.clone());
    client.initialize().await.unwrap();
    (client, http, store)
}
