use axum::http::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use axum::http::{HeaderMap, HeaderValue};
use tracing::warn;

use crate::config::{CookieSameSite, GuardConfig};

/// Lifetime of a persisted refresh cookie. Session cookie lifetime is
/// configurable; the refresh credential outlives it by design of the
/// authority's rotation scheme.
const REFRESH_COOKIE_MAX_AGE: u32 = 86_400;

/// Opaque bearer credentials issued by the identity authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenPair {
    pub session: String,
    pub refresh: Option<String>,
}

impl TokenPair {
    pub fn new(session: impl Into<String>, refresh: Option<String>) -> Self {
        Self {
            session: session.into(),
            refresh,
        }
    }
}

/// How the credentials arrived; decides whether rejection redirects or 401s
/// and whether refreshed tokens are written back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Cookie,
    Bearer,
}

/// Reads and writes the [`TokenPair`] at the transport level.
///
/// Absence of credentials is `None`, never an error; write failures are
/// logged and dropped rather than surfaced, since the response itself must
/// still go out.
#[derive(Debug, Clone)]
pub struct TokenStore {
    session_cookie: String,
    refresh_cookie: String,
    secure: bool,
    same_site: CookieSameSite,
    session_max_age: u32,
}

impl TokenStore {
    pub fn from_config(config: &GuardConfig) -> Self {
        Self {
            session_cookie: config.session_cookie.clone(),
            refresh_cookie: config.refresh_cookie.clone(),
            secure: config.cookie_secure,
            same_site: config.cookie_same_site,
            session_max_age: config.session_cookie_max_age,
        }
    }

    /// Pull the token pair out of the request. A bearer Authorization header
    /// wins over cookies; bearer transport never carries a refresh token.
    pub fn extract(&self, headers: &HeaderMap) -> Option<(TokenPair, Transport)> {
        if let Some(token) = bearer_token(headers) {
            return Some((TokenPair::new(token, None), Transport::Bearer));
        }

        let session = cookie_value(headers, &self.session_cookie)?;
        let refresh = cookie_value(headers, &self.refresh_cookie);
        Some((TokenPair::new(session, refresh), Transport::Cookie))
    }

    /// Write the (possibly rotated) pair onto the outbound response.
    pub fn persist(&self, headers: &mut HeaderMap, pair: &TokenPair) {
        self.append_cookie(
            headers,
            &self.session_cookie,
            &pair.session,
            self.session_max_age,
        );
        if let Some(refresh) = &pair.refresh {
            self.append_cookie(headers, &self.refresh_cookie, refresh, REFRESH_COOKIE_MAX_AGE);
        }
    }

    /// Expire both cookies on the outbound response (logout).
    pub fn clear(&self, headers: &mut HeaderMap) {
        self.append_cookie(headers, &self.session_cookie, "", 0);
        self.append_cookie(headers, &self.refresh_cookie, "", 0);
    }

    fn append_cookie(&self, headers: &mut HeaderMap, name: &str, value: &str, max_age: u32) {
        let secure = if self.secure { "; Secure" } else { "" };
        let cookie = format!(
            "{name}={value}; Path=/; Max-Age={max_age}; HttpOnly; SameSite={same_site}{secure}",
            same_site = self.same_site.as_str(),
        );
        match HeaderValue::from_str(&cookie) {
            Ok(header) => {
                headers.append(SET_COOKIE, header);
            }
            Err(_) => warn!(cookie = name, "dropping cookie with non-ASCII value"),
        }
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(AUTHORIZATION)?.to_str().ok()?.trim();
    let token = raw.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_owned())
    }
}

fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    for header in headers.get_all(COOKIE) {
        let Ok(raw) = header.to_str() else { continue };
        for pair in raw.split(';') {
            if let Some((key, value)) = pair.trim().split_once('=') {
                if key == name && !value.is_empty() {
                    return Some(value.to_string());
                }
            }
        }
    }
    None
}
