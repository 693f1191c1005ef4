use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{decode, decode_header, errors::ErrorKind, Algorithm, DecodingKey, Validation};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::claims::Claims;
use crate::config::GuardConfig;
use crate::error::{AuthError, AuthResult};
use crate::keyset::{KeyCache, KeySetClient};
use crate::tokens::TokenPair;

/// Result of a successful verification. `refreshed` carries the replacement
/// pair when the session token was renewed during the call; the caller must
/// persist whichever tokens are returned.
#[derive(Debug, Clone)]
pub struct Verification {
    pub claims: Claims,
    pub refreshed: Option<TokenPair>,
}

impl Verification {
    pub fn was_refreshed(&self) -> bool {
        self.refreshed.is_some()
    }
}

/// Validates a [`TokenPair`] against the identity authority, refreshing an
/// expired session at most once per call.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, tokens: &TokenPair) -> AuthResult<Verification>;
}

/// Production verifier: session tokens are RS256 JWTs validated locally
/// against the authority's published key set; expired sessions are exchanged
/// through the authority's refresh endpoint under a bounded timeout.
pub struct RemoteVerifier {
    project_id: String,
    leeway_seconds: u32,
    keys: KeyCache,
    keyset: Option<KeySetClient>,
    http: Client,
    refresh_url: String,
}

enum Checked {
    Valid(Claims),
    Expired,
}

impl RemoteVerifier {
    pub fn builder(config: &GuardConfig) -> RemoteVerifierBuilder {
        RemoteVerifierBuilder::new(config)
    }

    pub fn keys(&self) -> &KeyCache {
        &self.keys
    }

    pub fn keyset(&self) -> Option<&KeySetClient> {
        self.keyset.as_ref()
    }

    /// Refetch the authority's key set, replacing the cache on success.
    pub async fn reload_keys(&self) -> AuthResult<usize> {
        let Some(keyset) = &self.keyset else {
            return Ok(0);
        };
        let keys = keyset.fetch().await?;
        let count = keys.len();
        if count > 0 {
            self.keys.replace_all(keys);
        }
        Ok(count)
    }

    async fn decoding_key(&self, token: &str) -> AuthResult<DecodingKey> {
        let header = decode_header(token)
            .map_err(|err| AuthError::Invalid(format!("bad token header: {err}")))?;
        let kid = header
            .kid
            .ok_or_else(|| AuthError::Invalid("token missing kid header".to_string()))?;

        if let Some(key) = self.keys.get(&kid) {
            return Ok(key);
        }
        if self.keyset.is_some() {
            // Key rotation at the authority: one refetch before giving up.
            self.reload_keys().await?;
            if let Some(key) = self.keys.get(&kid) {
                return Ok(key);
            }
        }
        Err(AuthError::Invalid(format!("no decoding key for kid '{kid}'")))
    }

    fn check(&self, token: &str, key: &DecodingKey) -> AuthResult<Checked> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[self.project_id.clone()]);
        validation.validate_aud = false;
        validation.leeway = self.leeway_seconds.into();

        match decode::<Value>(token, key, &validation) {
            Ok(data) => Ok(Checked::Valid(Claims::try_from(data.claims)?)),
            Err(err) if matches!(err.kind(), ErrorKind::ExpiredSignature) => Ok(Checked::Expired),
            Err(err) => Err(AuthError::Invalid(err.to_string())),
        }
    }

    async fn check_token(&self, token: &str) -> AuthResult<Checked> {
        let key = self.decoding_key(token).await?;
        self.check(token, &key)
    }

    async fn refresh_session(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let response = self
            .http
            .post(&self.refresh_url)
            .bearer_auth(refresh_token)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    AuthError::Unavailable("refresh call timed out".to_string())
                } else {
                    AuthError::Unavailable(format!("refresh call failed: {err}"))
                }
            })?;

        match response.status() {
            status if status.is_success() => {}
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                return Err(AuthError::Invalid(
                    "refresh token rejected by authority".to_string(),
                ));
            }
            status => {
                return Err(AuthError::Unavailable(format!(
                    "refresh endpoint returned HTTP {status}"
                )));
            }
        }

        let body: RefreshDoc = response
            .json()
            .await
            .map_err(|err| AuthError::Unavailable(format!("unreadable refresh response: {err}")))?;

        // The authority may rotate the refresh token or leave it in place;
        // either way the caller persists what comes back.
        Ok(TokenPair::new(
            body.session_jwt,
            body.refresh_jwt.or_else(|| Some(refresh_token.to_string())),
        ))
    }
}

#[async_trait]
impl IdentityVerifier for RemoteVerifier {
    async fn verify(&self, tokens: &TokenPair) -> AuthResult<Verification> {
        match self.check_token(&tokens.session).await? {
            Checked::Valid(claims) => {
                debug!(subject = %claims.subject, "session token accepted");
                Ok(Verification {
                    claims,
                    refreshed: None,
                })
            }
            Checked::Expired => {
                let Some(refresh) = tokens.refresh.as_deref() else {
                    return Err(AuthError::Expired);
                };
                let pair = self.refresh_session(refresh).await?;
                match self.check_token(&pair.session).await? {
                    Checked::Valid(claims) => {
                        debug!(subject = %claims.subject, "session token refreshed");
                        Ok(Verification {
                            claims,
                            refreshed: Some(pair),
                        })
                    }
                    Checked::Expired => Err(AuthError::Invalid(
                        "authority returned an already-expired session token".to_string(),
                    )),
                }
            }
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshDoc {
    session_jwt: String,
    #[serde(default)]
    refresh_jwt: Option<String>,
}

pub struct RemoteVerifierBuilder {
    project_id: String,
    leeway_seconds: u32,
    refresh_url: String,
    timeout: Duration,
    keys: KeyCache,
    jwks_url: Option<String>,
}

impl RemoteVerifierBuilder {
    fn new(config: &GuardConfig) -> Self {
        Self {
            project_id: config.project_id.clone(),
            leeway_seconds: config.leeway_seconds,
            refresh_url: config.refresh_url.clone(),
            timeout: config.verify_timeout,
            keys: KeyCache::new(),
            jwks_url: Some(config.jwks_url.clone()),
        }
    }

    /// Skip JWKS fetching entirely; keys must be provided explicitly.
    pub fn without_keyset(mut self) -> Self {
        self.jwks_url = None;
        self
    }

    pub fn with_jwks_url(mut self, url: impl Into<String>) -> Self {
        self.jwks_url = Some(url.into());
        self
    }

    pub fn with_keys(mut self, keys: KeyCache) -> Self {
        self.keys = keys;
        self
    }

    pub fn with_decoding_key(self, kid: impl Into<String>, key: DecodingKey) -> Self {
        self.keys.insert(kid, key);
        self
    }

    pub fn with_rsa_pem(self, kid: impl Into<String>, pem: &[u8]) -> AuthResult<Self> {
        self.keys.insert_rsa_pem(kid, pem)?;
        Ok(self)
    }

    pub async fn build(self) -> AuthResult<RemoteVerifier> {
        let http = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|err| AuthError::Misconfigured(format!("HTTP client build failed: {err}")))?;

        let verifier = RemoteVerifier {
            project_id: self.project_id,
            leeway_seconds: self.leeway_seconds,
            keys: self.keys,
            keyset: self
                .jwks_url
                .map(|url| KeySetClient::new(http.clone(), url)),
            http,
            refresh_url: self.refresh_url,
        };

        if verifier.keyset.is_some() {
            verifier.reload_keys().await?;
        }

        Ok(verifier)
    }
}
