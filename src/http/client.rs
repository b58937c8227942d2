use anyhow::Result;
use std::collections::HashMap;

/// HTTP method enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    GET,
    POST,
    PATCH,
}

/// A very simple response type that only holds response data
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status code
    status_code: u16,
    /// Response body
    body: String,
}

impl HttpResponse {
    /// Create a new response
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status_code: status,
            body: body.into(),
        }
    }

    /// Get the status code
    pub fn status(&self) -> u16 {
        self.status_code
    }

    /// Get a reference to the response body
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Get the body as text (consumes the response)
    pub fn text(self) -> String {
        self.body
    }

    /// Parse body as JSON
    pub fn json<T: serde::de::DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.body)?)
    }

    /// Check if successful (2xx status)
    pub fn is_success(&self) -> bool {
        self.status_code >= 200 && self.status_code < 300
    }
}

/// Trait for HTTP client operations, allowing for mocking
#[async_trait::async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform HTTP GET request and return an HttpResponse
    async fn get(&self, url: &str, headers: HashMap<String, String>) -> Result<HttpResponse>;

    /// Perform HTTP POST request and return an HttpResponse
    async fn post(
        &self,
        url: &str,
        headers: HashMap<String, String>,
        body: String,
    ) -> Result<HttpResponse>;

    /// Perform HTTP PATCH request and return an HttpResponse
    async fn patch(
        &self,
        url: &str,
        headers: HashMap<String, String>,
        body: String,
    ) -> Result<HttpResponse>;
}

/// Implementation of HttpClient using reqwest
pub struct ReqwestHttpClient {
    /// Internal reqwest client
    client: reqwest::Client,
}

impl ReqwestHttpClient {
    /// Create a new ReqwestHttpClient
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Create a new client with custom configuration
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn dispatch(&self, request: reqwest::RequestBuilder) -> Result<HttpResponse> {
        let response = request.send().await?;
        let status = response.status().as_u16();
        let body = response.text().await?;
        Ok(HttpResponse::new(status, body))
    }
}

impl Default for ReqwestHttpClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl HttpClient for ReqwestHttpClient {
    async fn get(&self, url: &str, headers: HashMap<String, String>) -> Result<HttpResponse> {
        let mut request = self.client.get(url);
        for (key, value) in headers {
            request = request.header(key, value);
        }
        self.dispatch(request).await
    }

    async fn post(
        &self,
        url: &str,
        headers: HashMap<String, String>,
        body: String,
    ) -> Result<HttpResponse> {
        let mut request = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .body(body);
        for (key, value) in headers {
            request = request.header(key, value);
        }
        self.dispatch(request).await
    }

    async fn patch(
        &self,
        url: &str,
        headers: HashMap<String, String>,
        body: String,
    ) -> Result<HttpResponse> {
        let mut request = self
            .client
            .patch(url)
            .header("content-type", "application/json")
            .body(body);
        for (key, value) in headers {
            request = request.header(key, value);
        }
        self.dispatch(request).await
    }
}

/// Mock implementation of HttpClient for testing
#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    /// Outcome a mock can be scripted to produce
    ///
    /// The optional delay simulates network latency, which tests use to
    /// hold a refresh call in flight while other requests pile up.
    #[derive(Debug, Clone)]
    enum MockOutcome {
        Response(HttpResponse, Option<std::time::Duration>),
        TransportError(String, Option<std::time::Duration>),
    }

    impl MockOutcome {
        fn delay(&self) -> Option<std::time::Duration> {
            match self {
                MockOutcome::Response(_, delay) => *delay,
                MockOutcome::TransportError(_, delay) => *delay,
            }
        }
    }

    /// A request as recorded by the mock
    #[derive(Debug, Clone)]
    pub struct RecordedRequest {
        pub url: String,
        pub method: HttpMethod,
        pub headers: HashMap<String, String>,
        pub body: Option<String>,
    }

    impl RecordedRequest {
        /// The bearer token of the `Authorization` header, if present
        pub fn bearer_token(&self) -> Option<&str> {
            self.headers
                .get("Authorization")
                .and_then(|value| value.strip_prefix("Bearer "))
        }
    }

    /// A mock HTTP client that replays scripted responses per URL
    ///
    /// Each URL holds a queue of outcomes; the final entry is sticky so a
    /// URL scripted with `[401, 200]` keeps answering 200 after the queue
    /// drains. Every request is recorded with its headers for assertions.
    pub struct MockHttpClient {
        scripts: Arc<Mutex<HashMap<String, VecDeque<MockOutcome>>>>,
        sticky: Arc<Mutex<HashMap<String, MockOutcome>>>,
        requests: Arc<Mutex<Vec<RecordedRequest>>>,
    }

    impl MockHttpClient {
        /// Create a new mock client
        pub fn new() -> Self {
            Self {
                scripts: Arc::new(Mutex::new(HashMap::new())),
                sticky: Arc::new(Mutex::new(HashMap::new())),
                requests: Arc::new(Mutex::new(Vec::new())),
            }
        }

        /// Queue a response for a URL
        pub fn push_response(&self, url: impl Into<String>, status: u16, body: impl Into<String>) {
            self.scripts
                .lock()
                .unwrap()
                .entry(url.into())
                .or_default()
                .push_back(MockOutcome::Response(HttpResponse::new(status, body), None));
        }

        /// Queue a response that resolves only after a delay
        pub fn push_response_delayed(
            &self,
            url: impl Into<String>,
            status: u16,
            body: impl Into<String>,
            delay: std::time::Duration,
        ) {
            self.scripts
                .lock()
                .unwrap()
                .entry(url.into())
                .or_default()
                .push_back(MockOutcome::Response(
                    HttpResponse::new(status, body),
                    Some(delay),
                ));
        }

        /// Queue a JSON response for a URL
        pub fn push_json<T: serde::Serialize>(
            &self,
            url: impl Into<String>,
            status: u16,
            data: &T,
        ) {
            let body = serde_json::to_string(data).expect("mock body serializes");
            self.push_response(url, status, body);
        }

        /// Queue a simulated network failure for a URL
        pub fn push_transport_error(&self, url: impl Into<String>, message: impl Into<String>) {
            self.scripts
                .lock()
                .unwrap()
                .entry(url.into())
                .or_default()
                .push_back(MockOutcome::TransportError(message.into(), None));
        }

        /// Queue a simulated network failure that resolves after a delay
        pub fn push_transport_error_delayed(
            &self,
            url: impl Into<String>,
            message: impl Into<String>,
            delay: std::time::Duration,
        ) {
            self.scripts
                .lock()
                .unwrap()
                .entry(url.into())
                .or_default()
                .push_back(MockOutcome::TransportError(message.into(), Some(delay)));
        }

        /// Get the list of recorded requests
        pub fn requests(&self) -> Vec<RecordedRequest> {
            self.requests.lock().unwrap().clone()
        }

        /// Recorded requests against one URL
        pub fn requests_for(&self, url: &str) -> Vec<RecordedRequest> {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|request| request.url == url)
                .cloned()
                .collect()
        }

        /// Number of times a URL was hit
        pub fn hit_count(&self, url: &str) -> usize {
            self.requests_for(url).len()
        }

        fn record(&self, request: RecordedRequest) {
            self.requests.lock().unwrap().push(request);
        }

        async fn next_outcome(&self, url: &str) -> Result<HttpResponse> {
            let outcome = {
                let mut scripts = self.scripts.lock().unwrap();
                let mut sticky = self.sticky.lock().unwrap();
                match scripts.get_mut(url).and_then(|queue| queue.pop_front()) {
                    // Consume the next scripted outcome; remember it as the
                    // sticky fallback so a drained URL keeps answering with it.
                    Some(outcome) => {
                        sticky.insert(url.to_string(), outcome.clone());
                        outcome
                    }
                    // Queue drained: replay the last outcome scripted for this URL.
                    None => sticky.get(url).cloned().ok_or_else(|| {
                        anyhow::anyhow!("no mock response configured for URL: {}", url)
                    })?,
                }
            };

            if let Some(delay) = outcome.delay() {
                tokio::time::sleep(delay).await;
            }

            match outcome {
                MockOutcome::Response(response, _) => Ok(response),
                MockOutcome::TransportError(message, _) => Err(anyhow::anyhow!(message)),
            }
        }
    }

    impl Default for MockHttpClient {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait::async_trait]
    impl HttpClient for MockHttpClient {
        async fn get(&self, url: &str, headers: HashMap<String, String>) -> Result<HttpResponse> {
            self.record(RecordedRequest {
                url: url.to_string(),
                method: HttpMethod::GET,
                headers,
                body: None,
            });
            self.next_outcome(url).await
        }

        async fn post(
            &self,
            url: &str,
            headers: HashMap<String, String>,
            body: String,
        ) -> Result<HttpResponse> {
            self.record(RecordedRequest {
                url: url.to_string(),
                method: HttpMethod::POST,
                headers,
                body: Some(body),
            });
            self.next_outcome(url).await
        }

        async fn patch(
            &self,
            url: &str,
            headers: HashMap<String, String>,
            body: String,
        ) -> Result<HttpResponse> {
            self.record(RecordedRequest {
                url: url.to_string(),
                method: HttpMethod::PATCH,
                headers,
                body: Some(body),
            });
            self.next_outcome(url).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::mock::MockHttpClient;

    #[tokio::test]
    async fn test_mock_scripted_responses_in_order() {
        let client = MockHttpClient::new();
        client.push_response("https://example.com/api", 401, "expired");
        client.push_response("https://example.com/api", 200, "ok");

        let first = client
            .get("https://example.com/api", HashMap::new())
            .await
            .unwrap();
        assert_eq!(first.status(), 401);

        // Final response is sticky
        for _ in 0..3 {
            let next = client
                .get("https://example.com/api", HashMap::new())
                .await
                .unwrap();
            assert_eq!(next.status(), 200);
            assert_eq!(next.body(), "ok");
        }

        assert_eq!(client.hit_count("https://example.com/api"), 4);
    }

    #[tokio::test]
    async fn test_mock_records_headers_and_transport_errors() {
        let client = MockHttpClient::new();
        client.push_transport_error("https://example.com/down", "connection refused");

        let mut headers = HashMap::new();
        headers.insert("Authorization".to_string(), "Bearer tok".to_string());
        let result = client.get("https://example.com/down", headers).await;
        assert!(result.is_err());

        let recorded = client.requests();
        assert_eq!(recorded.len(), 1);
        assert_eq!(recorded[0].bearer_token(), Some("tok"));
        assert!(matches!(recorded[0].method, HttpMethod::GET));
    }

    #[tokio::test]
    async fn test_reqwest_client_against_local_server() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/ping")
            .with_status(200)
            .with_body(r#"{"pong":true}"#)
            .create_async()
            .await;

        let client = ReqwestHttpClient::new();
        let response = client
            .get(&format!("{}/ping", server.url()), HashMap::new())
            .await
            .unwrap();

        assert!(response.is_success());
        let parsed: serde_json::Value = response.json().unwrap();
        assert_eq!(parsed["pong"], true);
        mock.assert_async().await;
    }
}
