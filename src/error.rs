use thiserror::Error;

/// Structured error type for the AreYouReporting client
///
/// All variants carry owned strings so an error can be cloned and fanned
/// out to every request waiting on a shared token refresh.
#[derive(Error, Debug, Clone)]
pub enum ClientError {
    // Transport errors
    #[error("HTTP transport error: {reason}")]
    Transport { reason: String },

    // API related errors
    #[error("API request failed with status {status}: {message}")]
    Api { status: u16, message: String },

    #[error("failed to decode API response: {reason}")]
    Decode { reason: String },

    // Authentication errors
    #[error("login rejected: {0}")]
    Login(LoginFailure),

    #[error("no refresh token available")]
    MissingRefreshToken,

    #[error("failed to refresh session token: {reason}")]
    RefreshFailed { reason: String },

    #[error("session expired, please log in again")]
    SessionExpired,

    #[error("access token is malformed: {reason}")]
    Claims { reason: String },

    // Realtime channel errors
    #[error("notification channel error: {reason}")]
    Channel { reason: String },

    #[error("malformed broker frame: {reason}")]
    Frame { reason: String },

    // Storage related errors
    #[error("token storage error: {reason}")]
    Storage { reason: String },

    // Configuration related errors
    #[error("invalid configuration value for '{key}': {reason}")]
    Config { key: String, reason: String },
}

impl ClientError {
    pub fn transport(err: impl std::fmt::Display) -> Self {
        ClientError::Transport {
            reason: err.to_string(),
        }
    }

    pub fn api(status: u16, message: impl Into<String>) -> Self {
        ClientError::Api {
            status,
            message: message.into(),
        }
    }

    pub fn decode(err: impl std::fmt::Display) -> Self {
        ClientError::Decode {
            reason: err.to_string(),
        }
    }

    pub fn refresh_failed(reason: impl Into<String>) -> Self {
        ClientError::RefreshFailed {
            reason: reason.into(),
        }
    }

    pub fn channel(err: impl std::fmt::Display) -> Self {
        ClientError::Channel {
            reason: err.to_string(),
        }
    }

    pub fn frame(reason: impl Into<String>) -> Self {
        ClientError::Frame {
            reason: reason.into(),
        }
    }

    pub fn storage(err: impl std::fmt::Display) -> Self {
        ClientError::Storage {
            reason: err.to_string(),
        }
    }

    pub fn claims(err: impl std::fmt::Display) -> Self {
        ClientError::Claims {
            reason: err.to_string(),
        }
    }

    /// Whether this error should be presented as a terminal session failure
    pub fn is_session_expired(&self) -> bool {
        matches!(
            self,
            ClientError::SessionExpired
                | ClientError::MissingRefreshToken
                | ClientError::RefreshFailed { .. }
        )
    }
}

/// Human-readable classification of a failed login attempt
///
/// The backend signals these conditions through free-form error text, so
/// the variants are derived by pattern-matching the response body.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoginFailure {
    #[error("account is not verified yet")]
    NotVerified,

    #[error("account has been deactivated")]
    Inactive,

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("{0}")]
    Other(String),
}

/// Map a non-2xx login response to a user-facing failure
pub fn classify_login_failure(status: u16, body: &str) -> LoginFailure {
    let lowered = body.to_lowercase();

    if lowered.contains("not verified") || lowered.contains("verify") {
        LoginFailure::NotVerified
    } else if lowered.contains("inactive")
        || lowered.contains("disabled")
        || lowered.contains("deactivated")
    {
        LoginFailure::Inactive
    } else if status == 401 || status == 403 || lowered.contains("invalid credentials") {
        LoginFailure::InvalidCredentials
    } else if body.is_empty() {
        LoginFailure::Other(format!("login failed with status {}", status))
    } else {
        LoginFailure::Other(body.to_string())
    }
}

/// Convenience alias used throughout the crate
pub type ClientResult<T> = Result<T, ClientError>;
