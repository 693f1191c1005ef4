use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use jsonwebtoken::DecodingKey;
use reqwest::Client;
use serde::Deserialize;
use tracing::warn;

use crate::error::{AuthError, AuthResult};

/// Thread-safe cache of decoding keys published by the identity authority,
/// keyed by `kid`.
#[derive(Clone, Default)]
pub struct KeyCache {
    inner: Arc<RwLock<HashMap<String, DecodingKey>>>,
}

impl KeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, kid: impl Into<String>, key: DecodingKey) {
        let mut guard = self.inner.write().expect("rwlock poisoned");
        guard.insert(kid.into(), key);
    }

    pub fn insert_rsa_pem(&self, kid: impl Into<String>, pem: &[u8]) -> AuthResult<()> {
        let kid = kid.into();
        let key = DecodingKey::from_rsa_pem(pem).map_err(|err| {
            AuthError::Misconfigured(format!("failed to parse PEM for kid '{kid}': {err}"))
        })?;
        self.insert(kid, key);
        Ok(())
    }

    pub fn get(&self, kid: &str) -> Option<DecodingKey> {
        let guard = self.inner.read().expect("rwlock poisoned");
        guard.get(kid).cloned()
    }

    pub fn contains(&self, kid: &str) -> bool {
        let guard = self.inner.read().expect("rwlock poisoned");
        guard.contains_key(kid)
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.read().expect("rwlock poisoned");
        guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn replace_all<I>(&self, entries: I)
    where
        I: IntoIterator<Item = (String, DecodingKey)>,
    {
        let mut guard = self.inner.write().expect("rwlock poisoned");
        guard.clear();
        for (kid, key) in entries {
            guard.insert(kid, key);
        }
    }
}

/// Fetches the authority's published JWKS document.
#[derive(Clone)]
pub struct KeySetClient {
    client: Client,
    url: String,
}

impl KeySetClient {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Fetch and decode the key set. Entries that are not RS256 RSA keys are
    /// skipped with a warning; tokens signed with them will fail `kid` lookup.
    pub async fn fetch(&self) -> AuthResult<Vec<(String, DecodingKey)>> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|err| AuthError::Unavailable(format!("JWKS fetch failed: {err}")))?;

        if !response.status().is_success() {
            return Err(AuthError::Unavailable(format!(
                "JWKS endpoint returned HTTP {} from {}",
                response.status(),
                self.url
            )));
        }

        let body: KeySetDoc = response
            .json()
            .await
            .map_err(|err| AuthError::Misconfigured(format!("unusable JWKS document: {err}")))?;

        let mut keys = Vec::new();
        for entry in body.keys {
            let Some(kid) = entry.kid else {
                warn!("skipping JWKS entry without kid");
                continue;
            };
            let kty = entry.kty.as_deref().unwrap_or("RSA");
            if kty != "RSA" || entry.alg.as_deref().is_some_and(|alg| alg != "RS256") {
                warn!(kid, kty, alg = ?entry.alg, "skipping unsupported JWKS entry");
                continue;
            }
            let (Some(modulus), Some(exponent)) = (entry.n, entry.e) else {
                warn!(kid, "skipping JWKS entry missing RSA components");
                continue;
            };
            let key = DecodingKey::from_rsa_components(&modulus, &exponent).map_err(|err| {
                AuthError::Misconfigured(format!("unusable JWKS key '{kid}': {err}"))
            })?;
            keys.push((kid, key));
        }

        Ok(keys)
    }
}

#[derive(Debug, Deserialize)]
struct KeySetDoc {
    keys: Vec<KeyEntry>,
}

#[derive(Debug, Deserialize)]
struct KeyEntry {
    kid: Option<String>,
    kty: Option<String>,
    alg: Option<String>,
    n: Option<String>,
    e: Option<String>,
}
