//! Anonymous per-browser session identity carried in the `sessionId` cookie.

use axum::http::header::COOKIE;
use axum::http::HeaderMap;
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "sessionId";

/// 30 days.
pub const SESSION_MAX_AGE_SECS: u64 = 60 * 60 * 24 * 30;

/// The session id from the request's cookies, if any.
pub fn session_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// A session resolved for a write path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionGrant {
    pub id: String,
    /// True when the id was minted for this request.
    pub created: bool,
}

impl SessionGrant {
    /// `Set-Cookie` value that (re)issues this session for another 30 days.
    pub fn cookie(&self) -> String {
        format!(
            "{}={}; Max-Age={}; Path=/; HttpOnly",
            SESSION_COOKIE, self.id, SESSION_MAX_AGE_SECS
        )
    }
}

/// Reuse the caller's session or mint a fresh random one.
pub fn get_or_create_session_id(headers: &HeaderMap) -> SessionGrant {
    match session_id(headers) {
        Some(id) => SessionGrant { id, created: false },
        None => SessionGrant {
            id: Uuid::new_v4().to_string(),
            created: true,
        },
    }
}
