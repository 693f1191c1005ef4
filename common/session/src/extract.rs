use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::{request::Parts, StatusCode};

use crate::error::AuthError;
use crate::project::UserContext;

/// Extracts the verified user attached by the session guard.
///
/// Only requests that passed the guard carry a [`UserContext`]; a handler
/// reachable without the guard sees a rejection, never a partial context.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user: UserContext,
}

impl AuthContext {
    pub fn has_role(&self, role: &str) -> bool {
        self.user.claims.has_role(role)
    }

    pub fn into_user(self) -> UserContext {
        self.user
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<UserContext>()
            .cloned()
            .map(|user| Self { user })
            .ok_or(AuthError::MissingCredentials)
    }
}

#[derive(Debug, Clone)]
pub enum GuardError {
    NotAuthenticated,
    MissingRole { required: Vec<String> },
    MissingPermission { required: String },
}

impl GuardError {
    pub fn into_response(self) -> (StatusCode, String) {
        match self {
            GuardError::NotAuthenticated => {
                (StatusCode::UNAUTHORIZED, "Not authenticated".to_string())
            }
            GuardError::MissingRole { required } => (
                StatusCode::FORBIDDEN,
                if required.is_empty() {
                    "Insufficient role".to_string()
                } else {
                    format!("Insufficient role. Required one of: {}", required.join(", "))
                },
            ),
            GuardError::MissingPermission { required } => (
                StatusCode::FORBIDDEN,
                format!("Missing required permission: {required}"),
            ),
        }
    }
}

impl From<GuardError> for (StatusCode, String) {
    fn from(value: GuardError) -> Self {
        value.into_response()
    }
}

pub fn ensure_role(user: &UserContext, allowed: &[&str]) -> Result<(), GuardError> {
    if allowed.is_empty() {
        return Ok(());
    }

    let has_role = user
        .claims
        .roles
        .iter()
        .any(|role| allowed.iter().any(|required| role == required));

    if has_role {
        Ok(())
    } else {
        Err(GuardError::MissingRole {
            required: allowed.iter().map(|value| value.to_string()).collect(),
        })
    }
}

pub fn ensure_permission(user: &UserContext, permission: &str) -> Result<(), GuardError> {
    if user.claims.has_permission(permission) {
        Ok(())
    } else {
        Err(GuardError::MissingPermission {
            required: permission.to_string(),
        })
    }
}

pub fn ensure_admin(user: &UserContext) -> Result<(), GuardError> {
    if user.is_admin {
        Ok(())
    } else {
        Err(GuardError::MissingRole {
            required: Vec::new(),
        })
    }
}
