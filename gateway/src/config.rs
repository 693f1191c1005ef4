use anyhow::{Context, Result};
use std::env;
use std::net::SocketAddr;

/// Gateway-level settings: where to listen and where the protected tracking
/// server lives. Session and identity settings live in
/// [`common_session::GuardConfig`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub host: String,
    pub port: u16,
    /// Base URL of the upstream tracking server every admitted request is
    /// forwarded to.
    pub upstream_url: String,
    /// Authentication flow the hosted login widget should run.
    pub login_flow_id: String,
    /// Where the login page sends the browser after a successful sign-in.
    pub redirect_url: String,
    /// Script URL for the authority's hosted login widget; derived from the
    /// authority base URL when unset.
    pub widget_url: Option<String>,
}

pub fn load_gateway_config() -> Result<GatewayConfig> {
    let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port = env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(5000);

    let upstream_url = env::var("TRACKING_UPSTREAM_URL")
        .context("TRACKING_UPSTREAM_URL must be set")?
        .trim_end_matches('/')
        .to_string();

    let login_flow_id =
        env::var("AUTH_LOGIN_FLOW_ID").unwrap_or_else(|_| "sign-up-or-in".to_string());
    let redirect_url = env::var("AUTH_REDIRECT_URL").unwrap_or_else(|_| "/".to_string());
    let widget_url = env::var("IDENTITY_LOGIN_WIDGET_URL")
        .ok()
        .filter(|value| !value.trim().is_empty());

    Ok(GatewayConfig {
        host,
        port,
        upstream_url,
        login_flow_id,
        redirect_url,
        widget_url,
    })
}

impl GatewayConfig {
    pub fn addr(&self) -> Result<SocketAddr> {
        let ip: std::net::IpAddr = self
            .host
            .parse()
            .with_context(|| format!("Invalid HOST '{}'", self.host))?;
        Ok(SocketAddr::from((ip, self.port)))
    }
}
