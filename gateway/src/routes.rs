use axum::extract::State;
use axum::http::{header::LOCATION, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use common_session::{AuthContext, UserContext};
use serde_json::json;
use tracing::info;

use crate::app::AppState;

/// Login page embedding the authority's hosted login widget. On success the
/// widget's tokens are written into the session/refresh cookies client-side
/// and the browser is sent back into the tracking UI.
const LOGIN_TEMPLATE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="UTF-8">
  <meta name="viewport" content="width=device-width, initial-scale=1.0">
  <title>Sign in</title>
  <script src="__WIDGET_URL__"></script>
  <style>
    body { font-family: system-ui, sans-serif; display: flex; justify-content: center;
           align-items: center; min-height: 100vh; margin: 0; background: #f4f4f8; }
    .container { background: white; padding: 2.5rem; border-radius: 12px;
                 box-shadow: 0 4px 24px rgba(0, 0, 0, 0.12); max-width: 400px; width: 90%; }
    .error { background: #fee2e2; color: #dc2626; padding: 0.75rem;
             border-radius: 6px; margin-bottom: 1rem; font-size: 0.875rem; }
  </style>
</head>
<body>
  <div class="container">
    <h1>Sign in to continue</h1>
    <div id="error-container"></div>
    <hosted-login project-id="__PROJECT_ID__" flow-id="__FLOW_ID__"></hosted-login>
  </div>
  <script>
    const widget = document.querySelector('hosted-login');
    const errors = document.getElementById('error-container');

    if (new URLSearchParams(window.location.search).get('error')) {
      errors.innerHTML = '<div class="error">Authentication failed. Please try again.</div>';
    }

    widget.addEventListener('success', (e) => {
      const secure = window.location.protocol === 'https:' ? '; secure' : '';
      const base = 'path=/; max-age=86400; samesite=lax' + secure;
      document.cookie = '__SESSION_COOKIE__=' + e.detail.sessionJwt + '; ' + base;
      if (e.detail.refreshJwt) {
        document.cookie = '__REFRESH_COOKIE__=' + e.detail.refreshJwt + '; ' + base;
      }
      window.location.href = '__REDIRECT_URL__';
    });

    widget.addEventListener('error', (e) => {
      errors.innerHTML = '<div class="error">Login failed: ' +
        ((e.detail && e.detail.message) || 'Unknown error') + '</div>';
    });
  </script>
</body>
</html>"#;

pub async fn login_page(State(state): State<AppState>) -> Html<String> {
    let widget_url = state
        .gateway
        .widget_url
        .clone()
        .unwrap_or_else(|| format!("{}/static/login-widget.js", state.config.base_url));

    let html = LOGIN_TEMPLATE
        .replace("__WIDGET_URL__", &widget_url)
        .replace("__PROJECT_ID__", &state.config.project_id)
        .replace("__FLOW_ID__", &state.gateway.login_flow_id)
        .replace("__SESSION_COOKIE__", &state.config.session_cookie)
        .replace("__REFRESH_COOKIE__", &state.config.refresh_cookie)
        .replace("__REDIRECT_URL__", &state.gateway.redirect_url);

    Html(html)
}

/// Clear both auth cookies and send the browser back to the login page.
pub async fn logout(State(state): State<AppState>) -> Response {
    let mut response =
        (StatusCode::FOUND, [(LOCATION, state.config.login_path.clone())]).into_response();
    state.guard.store().clear(response.headers_mut());
    info!("user logged out");
    response
}

/// Current authenticated user, as attached by the session guard.
pub async fn current_user(auth: AuthContext) -> Json<UserContext> {
    Json(auth.into_user())
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "healthy",
        "service": "tracegate",
        "project_id": state.config.project_id,
    }))
}
