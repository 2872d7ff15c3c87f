//! Local decoding of access token claims.
//!
//! The signature is not checked here; the API verifies it on every call.
//! Decoding exists so the client can show who is signed in and avoid
//! presenting a token it already knows to be expired.

use std::fmt;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AuthError;

use super::tokens::AccessToken;

/// Opaque account identifier carried in the `user_id` claim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SubjectId(String);

impl SubjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Who the current access token was issued to.
///
/// Always derived from a token, never stored on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub subject: SubjectId,
    pub username: String,
}

/// Claims read from an access token payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub subject: SubjectId,
    pub username: String,
    pub expires_at: DateTime<Utc>,
}

impl Claims {
    pub fn identity(&self) -> Identity {
        Identity {
            subject: self.subject.clone(),
            username: self.username.clone(),
        }
    }
}

#[derive(Deserialize)]
struct RawClaims {
    user_id: RawSubject,
    #[serde(default)]
    username: String,
    exp: i64,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawSubject {
    Number(i64),
    Text(String),
}

impl From<RawSubject> for SubjectId {
    fn from(raw: RawSubject) -> Self {
        match raw {
            RawSubject::Number(n) => SubjectId(n.to_string()),
            RawSubject::Text(s) => SubjectId(s),
        }
    }
}

/// Extract the claims from an access token without verifying it.
///
/// # Errors
///
/// Returns [`AuthError::MalformedCredential`] if the token is not three
/// dot-separated segments, the payload is not base64url JSON, or the
/// `user_id` / `exp` claims are missing.
pub fn decode(token: &AccessToken) -> Result<Claims, AuthError> {
    let mut segments = token.as_str().split('.');
    let (Some(header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(AuthError::malformed("expected three dot-separated segments"));
    };

    if header.is_empty() || payload.is_empty() {
        return Err(AuthError::malformed("empty header or payload segment"));
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .map_err(|e| AuthError::malformed(format!("payload is not base64url: {}", e)))?;

    let raw: RawClaims = serde_json::from_slice(&bytes)
        .map_err(|e| AuthError::malformed(format!("invalid claims: {}", e)))?;

    let expires_at = DateTime::from_timestamp(raw.exp, 0)
        .ok_or_else(|| AuthError::malformed("exp claim out of range"))?;

    Ok(Claims {
        subject: raw.user_id.into(),
        username: raw.username,
        expires_at,
    })
}

/// Whether the token had expired at `now`.
///
/// `now` is passed in rather than read so callers control the clock.
pub fn is_expired(claims: &Claims, now: DateTime<Utc>) -> bool {
    claims.expires_at < now
}
