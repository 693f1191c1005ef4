mod support;

use std::sync::Arc;

use axum::body::Body;
use axum::http::header::{COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Request, StatusCode};
use common_session::Verification;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tracegate::build_router;

use support::{app_state, sample_claims, ScriptedVerifier};

fn unreachable_verifier() -> Arc<ScriptedVerifier> {
    Arc::new(ScriptedVerifier::new(Box::new(|| {
        panic!("verifier must not run for public auth routes");
    })))
}

#[tokio::test]
async fn login_page_embeds_project_and_cookie_names() {
    let app = build_router(app_state(unreachable_verifier(), "http://127.0.0.1:1"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/login")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let html = String::from_utf8(body.to_vec()).unwrap();
    assert!(html.contains(r#"project-id="test-proj""#));
    assert!(html.contains(r#"flow-id="sign-up-or-in""#));
    assert!(html.contains("'session='"));
    assert!(html.contains("'refresh='"));
    assert!(html.contains("https://auth.example.com/static/login-widget.js"));
}

#[tokio::test]
async fn logout_clears_both_cookies_and_redirects() {
    let app = build_router(app_state(unreachable_verifier(), "http://127.0.0.1:1"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/logout")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(
        response.headers().get(LOCATION).unwrap().to_str().unwrap(),
        "/auth/login"
    );

    let cookies: Vec<_> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .map(|v| v.to_str().unwrap().to_string())
        .collect();
    assert_eq!(cookies.len(), 2);
    assert!(cookies.iter().any(|c| c.starts_with("session=;")));
    assert!(cookies.iter().any(|c| c.starts_with("refresh=;")));
    assert!(cookies.iter().all(|c| c.contains("Max-Age=0")));
}

#[tokio::test]
async fn current_user_requires_a_session() {
    let verifier = Arc::new(ScriptedVerifier::new(Box::new(|| {
        panic!("verifier must not run without credentials");
    })));
    let app = build_router(app_state(verifier.clone(), "http://127.0.0.1:1"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/user")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(verifier.calls(), 0);
}

#[tokio::test]
async fn current_user_returns_the_projected_identity() {
    let verifier = Arc::new(ScriptedVerifier::new(Box::new(|| {
        Ok(Verification {
            claims: sample_claims(&["mlflow-editor"], &[]),
            refreshed: None,
        })
    })));
    let app = build_router(app_state(verifier, "http://127.0.0.1:1"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/auth/user")
                .header(COOKIE, "session=valid-session")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(doc["username"], "U2abc");
    assert_eq!(doc["is_admin"], false);
    assert_eq!(doc["permission_level"], "EDIT");
    assert_eq!(doc["claims"]["email"], "dev@example.com");
}

#[tokio::test]
async fn health_reports_the_service_identity() {
    let app = build_router(app_state(unreachable_verifier(), "http://127.0.0.1:1"));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = response.into_body().collect().await.unwrap().to_bytes();
    let doc: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(doc["service"], "tracegate");
    assert_eq!(doc["project_id"], "test-proj");
}
