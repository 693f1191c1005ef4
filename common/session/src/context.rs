use std::collections::BTreeMap;

use http::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

use crate::project::UserContext;

pub const HEADER_USER_ID: &str = "x-user-id";
pub const HEADER_USER_NAME: &str = "x-user-name";
pub const HEADER_USER_EMAIL: &str = "x-user-email";
pub const HEADER_USER_ROLES: &str = "x-user-roles";
pub const HEADER_USER_PERMISSIONS: &str = "x-user-permissions";
pub const HEADER_USER_TENANTS: &str = "x-user-tenants";
pub const HEADER_USER_ADMIN: &str = "x-user-admin";

/// Project a verified user into identity headers for the upstream
/// application. Values that cannot be represented as header bytes are
/// dropped with a warning rather than failing the request.
pub fn identity_headers(user: &UserContext) -> HeaderMap {
    let mut headers = HeaderMap::new();
    append(&mut headers, HEADER_USER_ID, &user.claims.subject);
    append(&mut headers, HEADER_USER_NAME, &user.username);
    if let Some(email) = &user.claims.email {
        append(&mut headers, HEADER_USER_EMAIL, email);
    }
    if !user.claims.roles.is_empty() {
        append(&mut headers, HEADER_USER_ROLES, &user.claims.roles.join(","));
    }
    if !user.claims.permissions.is_empty() {
        append(
            &mut headers,
            HEADER_USER_PERMISSIONS,
            &user.claims.permissions.join(","),
        );
    }
    if !user.claims.tenants.is_empty() {
        append(
            &mut headers,
            HEADER_USER_TENANTS,
            &user.claims.tenants.join(","),
        );
    }
    if user.is_admin {
        append(&mut headers, HEADER_USER_ADMIN, "true");
    }
    headers
}

/// Tags attached to a run record so experiment history carries the identity
/// of whoever produced it.
pub fn run_tags(user: &UserContext) -> BTreeMap<String, String> {
    let mut tags = BTreeMap::new();
    tags.insert("user.user_id".to_string(), user.claims.subject.clone());
    tags.insert("user.username".to_string(), user.username.clone());
    if let Some(email) = &user.claims.email {
        tags.insert("user.email".to_string(), email.clone());
    }
    if !user.claims.roles.is_empty() {
        tags.insert("user.roles".to_string(), user.claims.roles.join(","));
    }
    if !user.claims.permissions.is_empty() {
        tags.insert(
            "user.permissions".to_string(),
            user.claims.permissions.join(","),
        );
    }
    if !user.claims.tenants.is_empty() {
        tags.insert("user.tenants".to_string(), user.claims.tenants.join(","));
    }
    tags
}

fn append(headers: &mut HeaderMap, name: &'static str, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(header) => {
            headers.insert(HeaderName::from_static(name), header);
        }
        Err(_) => warn!(header = name, "dropping identity header with invalid value"),
    }
}
