use axum::body::{to_bytes, Body};
use axum::extract::State;
use axum::http::header::{self, HeaderName};
use axum::http::{Request, StatusCode};
use axum::response::{IntoResponse, Response};
use common_session::{identity_headers, UserContext};
use tracing::error;

use crate::app::AppState;

/// Upper bound on a buffered request or response body; artifact uploads can
/// be large.
const MAX_BODY_BYTES: usize = 256 * 1024 * 1024;

/// Headers never forwarded in either direction.
const HOP_BY_HOP: &[HeaderName] = &[
    header::CONNECTION,
    header::TRANSFER_ENCODING,
    header::UPGRADE,
    header::TE,
    header::TRAILER,
];

/// Forward an admitted request to the tracking upstream.
///
/// Inbound credentials (cookies, client Authorization) are stripped; the
/// verified identity travels as `X-User-*` headers instead, so the upstream
/// never sees raw tokens and never needs to re-verify.
pub async fn forward(State(state): State<AppState>, request: Request<Body>) -> Response {
    match forward_inner(state, request).await {
        Ok(response) => response,
        Err(err) => {
            error!(error = %err, "upstream request failed");
            (StatusCode::BAD_GATEWAY, "upstream unavailable").into_response()
        }
    }
}

async fn forward_inner(state: AppState, request: Request<Body>) -> anyhow::Result<Response> {
    let (parts, body) = request.into_parts();

    let path_query = parts
        .uri
        .path_and_query()
        .map(|pq| pq.as_str())
        .unwrap_or("/");
    let url = format!("{}{}", state.gateway.upstream_url, path_query);

    let body = to_bytes(body, MAX_BODY_BYTES).await?;
    let mut builder = state.http_client.request(parts.method.clone(), &url);

    for (name, value) in parts.headers.iter() {
        if strip_inbound(name) {
            continue;
        }
        builder = builder.header(name, value);
    }

    if let Some(user) = parts.extensions.get::<UserContext>() {
        for (name, value) in identity_headers(user).iter() {
            builder = builder.header(name, value);
        }
    }

    let upstream = builder.body(body).send().await?;

    let mut response = Response::builder().status(upstream.status());
    for (name, value) in upstream.headers() {
        if HOP_BY_HOP.contains(name) || name == header::CONTENT_LENGTH {
            continue;
        }
        response = response.header(name, value);
    }

    let bytes = upstream.bytes().await?;
    Ok(response.body(Body::from(bytes))?)
}

fn strip_inbound(name: &HeaderName) -> bool {
    HOP_BY_HOP.contains(name)
        || *name == header::HOST
        || *name == header::COOKIE
        || *name == header::AUTHORIZATION
        || *name == header::CONTENT_LENGTH
}
