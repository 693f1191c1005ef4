#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use common_session::{
    AuthResult, Claims, GuardConfig, IdentityVerifier, SessionGuard, TokenPair, Verification,
};
use reqwest::Client;
use tracegate::{AppState, GatewayConfig};

pub type Script = Box<dyn Fn() -> AuthResult<Verification> + Send + Sync>;

/// Verifier stand-in that replays a scripted outcome and counts calls.
pub struct ScriptedVerifier {
    script: Script,
    calls: AtomicUsize,
}

impl ScriptedVerifier {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityVerifier for ScriptedVerifier {
    async fn verify(&self, _tokens: &TokenPair) -> AuthResult<Verification> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        (self.script)()
    }
}

pub fn sample_claims(roles: &[&str], permissions: &[&str]) -> Claims {
    Claims {
        subject: "U2abc".to_string(),
        email: Some("dev@example.com".to_string()),
        display_name: Some("Dev One".to_string()),
        roles: roles.iter().map(|r| r.to_string()).collect(),
        permissions: permissions.iter().map(|p| p.to_string()).collect(),
        tenants: Vec::new(),
        expires_at: Utc.timestamp_opt(1_900_000_000, 0).single().unwrap(),
        issued_at: None,
        issuer: "test-proj".to_string(),
        raw: serde_json::Value::Null,
    }
}

pub fn guard_config() -> GuardConfig {
    GuardConfig::new("test-proj", "https://auth.example.com")
}

pub fn gateway_config(upstream: &str) -> GatewayConfig {
    GatewayConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        upstream_url: upstream.trim_end_matches('/').to_string(),
        login_flow_id: "sign-up-or-in".to_string(),
        redirect_url: "/".to_string(),
        widget_url: None,
    }
}

/// Full gateway state wired to a scripted verifier instead of the identity
/// authority.
pub fn app_state(verifier: Arc<ScriptedVerifier>, upstream: &str) -> AppState {
    let config = Arc::new(guard_config());
    let dyn_verifier: Arc<dyn IdentityVerifier> = verifier;
    AppState {
        guard: Arc::new(SessionGuard::new(config.clone(), dyn_verifier)),
        config,
        gateway: Arc::new(gateway_config(upstream)),
        http_client: Client::new(),
    }
}
