use std::collections::HashMap;

/// Login endpoint, public
pub const LOGIN_PATH: &str = "/auth/login";
/// Token refresh endpoint, public
pub const REFRESH_TOKEN_PATH: &str = "/auth/refresh-token";
/// OTP dispatch endpoint, public
pub const SEND_OTP_PATH: &str = "/auth/send-otp";
/// OTP verification endpoint, public
pub const VERIFY_OTP_PATH: &str = "/auth/verify-otp";

/// Unread notification snapshot, protected
pub const UNREAD_NOTIFICATIONS_PATH: &str = "/notifications/unread";
/// Mark-all-read endpoint, protected
pub const READ_ALL_NOTIFICATIONS_PATH: &str = "/notifications/read-all";

/// Path suffixes that must be callable without an access token.
/// Matched by suffix so the classification is independent of the API base
/// the paths are mounted under.
const PUBLIC_PATH_SUFFIXES: [&str; 4] = [
    LOGIN_PATH,
    REFRESH_TOKEN_PATH,
    SEND_OTP_PATH,
    VERIFY_OTP_PATH,
];

/// Mark-one-read endpoint for a specific notification
pub fn notification_read_path(id: &str) -> String {
    format!("/notifications/{}/read", id)
}

/// Classify a request path as public (no token, no 401 handling)
pub fn is_public_path(path: &str) -> bool {
    let bare = path.split('?').next().unwrap_or(path);
    PUBLIC_PATH_SUFFIXES
        .iter()
        .any(|suffix| bare.ends_with(suffix))
}

/// Build the header map for a request, attaching the bearer token when
/// one is available. No token means no header at all; the request is sent
/// anyway and fails naturally downstream.
pub fn bearer_headers(access_token: Option<&str>) -> HashMap<String, String> {
    let mut headers = HashMap::new();
    if let Some(token) = access_token {
        headers.insert("Authorization".to_string(), format!("Bearer {}", token));
    }
    headers
}
