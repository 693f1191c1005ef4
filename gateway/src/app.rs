use std::sync::Arc;

use axum::extract::FromRef;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    Method,
};
use axum::routing::get;
use axum::{middleware, Router};
use common_session::{session_guard, GuardConfig, SessionGuard};
use reqwest::Client;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::GatewayConfig;
use crate::proxy::forward;
use crate::routes::{current_user, health, login_page, logout};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub guard: Arc<SessionGuard>,
    pub config: Arc<GuardConfig>,
    pub gateway: Arc<GatewayConfig>,
    pub http_client: Client,
}

impl FromRef<AppState> for Arc<SessionGuard> {
    fn from_ref(state: &AppState) -> Self {
        state.guard.clone()
    }
}

impl FromRef<AppState> for Arc<GuardConfig> {
    fn from_ref(state: &AppState) -> Self {
        state.config.clone()
    }
}

/// Assemble the full router: public auth routes, the health endpoint, and a
/// catch-all proxy to the tracking upstream, everything behind the session
/// guard (which lets its configured public routes through untouched).
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::mirror_request())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([ACCEPT, AUTHORIZATION, CONTENT_TYPE]);

    let guard = state.guard.clone();

    Router::new()
        .route("/auth/login", get(login_page))
        .route("/auth/logout", get(logout))
        .route("/auth/user", get(current_user))
        .route("/health", get(health))
        .fallback(forward)
        .with_state(state)
        .layer(middleware::from_fn(move |request, next| {
            let guard = guard.clone();
            async move { session_guard(guard, request, next).await }
        }))
        .layer(cors)
}
