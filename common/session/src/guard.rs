use std::sync::Arc;

use axum::body::Body;
use axum::http::{header::LOCATION, HeaderMap, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::config::GuardConfig;
use crate::error::AuthError;
use crate::project::{project, UserContext};
use crate::tokens::{TokenPair, TokenStore, Transport};
use crate::verifier::IdentityVerifier;

/// Result of guarding one request.
pub enum Outcome {
    /// Proceed into the protected handler with this user attached. The pair,
    /// when present, must be persisted on the outbound response.
    Continue(UserContext, Option<TokenPair>),
    /// Stop here and return this response.
    ShortCircuit(Response),
}

/// Per-request session gate: extract credentials, verify, project claims,
/// and rewrite the outbound token store when a refresh happened.
///
/// Each request is evaluated independently; the guard holds no mutable state.
#[derive(Clone)]
pub struct SessionGuard {
    config: Arc<GuardConfig>,
    store: TokenStore,
    verifier: Arc<dyn IdentityVerifier>,
}

impl SessionGuard {
    pub fn new(config: Arc<GuardConfig>, verifier: Arc<dyn IdentityVerifier>) -> Self {
        let store = TokenStore::from_config(&config);
        Self {
            config,
            store,
            verifier,
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn store(&self) -> &TokenStore {
        &self.store
    }

    /// Evaluate one protected request. Public routes must be filtered out by
    /// the caller (see [`session_guard`]); a missing token pair rejects
    /// without ever reaching the verifier.
    pub async fn handle(&self, path: &str, headers: &HeaderMap) -> Outcome {
        let Some((tokens, transport)) = self.store.extract(headers) else {
            debug!(path, "no session credentials presented");
            return Outcome::ShortCircuit(self.reject(None, AuthError::MissingCredentials));
        };

        match self.verifier.verify(&tokens).await {
            Ok(verification) => {
                let user = project(&verification.claims, &self.config);
                debug!(
                    user = %user.username,
                    admin = user.is_admin,
                    refreshed = verification.was_refreshed(),
                    path,
                    "session accepted"
                );
                // Bearer callers manage their own credentials; only cookie
                // transport gets the rotated pair written back.
                let refreshed = match transport {
                    Transport::Cookie => verification.refreshed,
                    Transport::Bearer => None,
                };
                Outcome::Continue(user, refreshed)
            }
            Err(err) => {
                warn!(path, code = err.code(), error = %err, "session rejected");
                Outcome::ShortCircuit(self.reject(Some(transport), err))
            }
        }
    }

    fn reject(&self, transport: Option<Transport>, err: AuthError) -> Response {
        match transport {
            Some(Transport::Bearer) => err.into_response(),
            _ => {
                let location = match &err {
                    AuthError::Unavailable(_) => {
                        format!("{}?error=unavailable", self.config.login_path)
                    }
                    _ => self.config.login_path.clone(),
                };
                (StatusCode::FOUND, [(LOCATION, location)]).into_response()
            }
        }
    }
}

/// Axum middleware wrapper around [`SessionGuard::handle`]. Compose with
/// `axum::middleware::from_fn` and a cloned guard.
pub async fn session_guard(
    guard: Arc<SessionGuard>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let path = request.uri().path().to_owned();
    if guard.config.is_public_route(&path) {
        return next.run(request).await;
    }

    match guard.handle(&path, request.headers()).await {
        Outcome::ShortCircuit(response) => response,
        Outcome::Continue(user, refreshed) => {
            request.extensions_mut().insert(user);
            let mut response = next.run(request).await;
            if let Some(pair) = refreshed {
                guard.store.persist(response.headers_mut(), &pair);
            }
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claims::Claims;
    use crate::error::AuthResult;
    use crate::verifier::Verification;
    use async_trait::async_trait;
    use axum::http::header::{AUTHORIZATION, COOKIE};
    use axum::http::HeaderValue;
    use chrono::{TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    type Script = Box<dyn Fn() -> AuthResult<Verification> + Send + Sync>;

    struct ScriptedVerifier {
        script: Script,
        calls: AtomicUsize,
    }

    impl ScriptedVerifier {
        fn new(script: Script) -> Self {
            Self {
                script,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl IdentityVerifier for ScriptedVerifier {
        async fn verify(&self, _tokens: &TokenPair) -> AuthResult<Verification> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.script)()
        }
    }

    fn claims() -> Claims {
        Claims {
            subject: "U2abc".to_string(),
            email: None,
            display_name: None,
            roles: vec!["admin".to_string()],
            permissions: Vec::new(),
            tenants: Vec::new(),
            expires_at: Utc.timestamp_opt(1_900_000_000, 0).single().unwrap(),
            issued_at: None,
            issuer: "P1".to_string(),
            raw: serde_json::Value::Null,
        }
    }

    fn guard_with(script: Script) -> (SessionGuard, Arc<ScriptedVerifier>) {
        let verifier = Arc::new(ScriptedVerifier::new(script));
        let config = Arc::new(GuardConfig::new("P1", "https://auth.example.com"));
        (SessionGuard::new(config, verifier.clone()), verifier)
    }

    #[tokio::test]
    async fn missing_credentials_reject_without_calling_verifier() {
        let (guard, verifier) = guard_with(Box::new(|| {
            panic!("verifier must not be called");
        }));

        let outcome = guard.handle("/api/runs", &HeaderMap::new()).await;
        let Outcome::ShortCircuit(response) = outcome else {
            panic!("expected rejection");
        };
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            &HeaderValue::from_static("/auth/login")
        );
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn bearer_rejection_is_a_401_not_a_redirect() {
        let (guard, _) = guard_with(Box::new(|| {
            Err(AuthError::Invalid("bad signature".to_string()))
        }));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer bad"));
        let Outcome::ShortCircuit(response) = guard.handle("/api/runs", &headers).await else {
            panic!("expected rejection");
        };
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unavailable_authority_fails_closed_with_redirect() {
        let (guard, _) = guard_with(Box::new(|| {
            Err(AuthError::Unavailable("timed out".to_string()))
        }));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("session=tok"));
        let Outcome::ShortCircuit(response) = guard.handle("/api/runs", &headers).await else {
            panic!("expected rejection");
        };
        assert_eq!(response.status(), StatusCode::FOUND);
        assert_eq!(
            response.headers().get(LOCATION).unwrap(),
            &HeaderValue::from_static("/auth/login?error=unavailable")
        );
    }

    #[tokio::test]
    async fn accepted_cookie_session_carries_refreshed_pair() {
        let (guard, verifier) = guard_with(Box::new(|| {
            Ok(Verification {
                claims: claims(),
                refreshed: Some(TokenPair::new("new-session", Some("new-refresh".into()))),
            })
        }));

        let mut headers = HeaderMap::new();
        headers.insert(COOKIE, HeaderValue::from_static("session=old; refresh=r1"));
        let Outcome::Continue(user, refreshed) = guard.handle("/api/runs", &headers).await else {
            panic!("expected acceptance");
        };
        assert_eq!(user.username, "U2abc");
        assert!(user.is_admin);
        assert_eq!(refreshed.expect("pair").session, "new-session");
        assert_eq!(verifier.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn bearer_transport_never_writes_tokens_back() {
        let (guard, _) = guard_with(Box::new(|| {
            Ok(Verification {
                claims: claims(),
                refreshed: Some(TokenPair::new("new-session", None)),
            })
        }));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok"));
        let Outcome::Continue(_, refreshed) = guard.handle("/api/runs", &headers).await else {
            panic!("expected acceptance");
        };
        assert!(refreshed.is_none());
    }
}
