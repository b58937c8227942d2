use serde::{Deserialize, Serialize};

pub mod streams;
pub use streams::{EventStream, EventStreamStats, Subscriber};

use crate::auth::claims::Role;

// Session event stream sizing
pub const EVENT_STREAM_CAPACITY: usize = 100;
pub const EVENT_BUFFER_SIZE: usize = 50;

/// Lifecycle events of the authenticated session
///
/// Consumers subscribe to react to session changes: navigation layers
/// redirect to the login screen on `LoggedOut`, toast layers surface the
/// message carried by `SessionExpired`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionEvent {
    /// A login completed and a token pair was stored
    LoggedIn { role: Option<Role> },

    /// The access token was replaced after a successful refresh
    TokenRefreshed,

    /// The session could not be recovered; the user must log in again
    SessionExpired { message: String },

    /// Tokens were cleared, either explicitly or after a terminal failure
    LoggedOut,
}

impl SessionEvent {
    /// Get a string representation of the event type
    pub fn event_type(&self) -> &'static str {
        match self {
            SessionEvent::LoggedIn { .. } => "logged_in",
            SessionEvent::TokenRefreshed => "token_refreshed",
            SessionEvent::SessionExpired { .. } => "session_expired",
            SessionEvent::LoggedOut => "logged_out",
        }
    }
}
