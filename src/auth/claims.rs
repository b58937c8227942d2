use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ClientError, ClientResult};

/// Role claim carried inside the access token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    Admin,
    #[serde(alias = "HOD")]
    HeadOfDepartment,
    Teacher,
}

/// Claims embedded in the access token payload
///
/// Decoded without signature verification: the client only needs `exp`
/// and `role` for display and guard logic, and never treats the decoded
/// values as proof of anything. The server re-validates every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessClaims {
    /// Subject, the authenticated user's identifier
    #[serde(default)]
    pub sub: Option<String>,
    /// Role driving which dashboard the user lands on
    #[serde(default)]
    pub role: Option<Role>,
    /// Expiry as epoch seconds
    #[serde(default)]
    pub exp: Option<i64>,
}

impl AccessClaims {
    /// Expiry instant, if the token carries one
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.exp.and_then(|secs| DateTime::from_timestamp(secs, 0))
    }

    /// Check if the token is expired
    pub fn is_expired(&self) -> bool {
        self.expires_at().map_or(false, |exp| exp <= Utc::now())
    }

    /// Seconds until expiration, negative when already expired
    pub fn seconds_until_expiration(&self) -> Option<i64> {
        self.expires_at().map(|exp| (exp - Utc::now()).num_seconds())
    }
}

/// Decode the payload segment of a JWT-shaped access token
pub fn decode_claims(token: &str) -> ClientResult<AccessClaims> {
    let mut segments = token.split('.');
    let payload = match (segments.next(), segments.next()) {
        (Some(_header), Some(payload)) if !payload.is_empty() => payload,
        _ => {
            return Err(ClientError::claims("token is not in header.payload.signature form"));
        }
    };

    let decoded = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(ClientError::claims)?;

    serde_json::from_slice(&decoded).map_err(ClientError::claims)
}
