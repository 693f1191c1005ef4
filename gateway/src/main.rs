use std::env;
use std::sync::Arc;
use std::time::Duration;

use common_session::{GuardConfig, IdentityVerifier, RemoteVerifier, SessionGuard};
use reqwest::Client;
use tokio::net::TcpListener;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use tracegate::app::{build_router, AppState};
use tracegate::config::load_gateway_config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // Misconfiguration is fatal: the process must not serve protected routes
    // without a working guard.
    let config = Arc::new(GuardConfig::from_env()?);
    let gateway = Arc::new(load_gateway_config()?);

    let verifier = Arc::new(RemoteVerifier::builder(&config).build().await?);
    info!(
        keys = verifier.keys().len(),
        project = %config.project_id,
        "identity verifier ready"
    );
    spawn_keyset_refresh(verifier.clone());

    let dyn_verifier: Arc<dyn IdentityVerifier> = verifier;
    let guard = Arc::new(SessionGuard::new(config.clone(), dyn_verifier));

    let state = AppState {
        guard,
        config: config.clone(),
        gateway: gateway.clone(),
        http_client: Client::new(),
    };
    let router = build_router(state);

    let addr = gateway.addr()?;
    info!(%addr, upstream = %gateway.upstream_url, "starting tracegate");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

/// Periodically refetch the authority's key set so signing-key rotation does
/// not require a restart.
fn spawn_keyset_refresh(verifier: Arc<RemoteVerifier>) {
    if verifier.keyset().is_none() {
        return;
    }

    let refresh_secs: u64 = env::var("IDENTITY_JWKS_REFRESH_SECONDS")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(300);

    tokio::spawn(async move {
        let mut ticker = interval(Duration::from_secs(refresh_secs.max(30)));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match verifier.reload_keys().await {
                Ok(count) => debug!(count, "refreshed identity key set"),
                Err(err) => warn!(error = %err, "failed to refresh identity key set"),
            }
        }
    });
}
