use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

pub type AuthResult<T> = Result<T, AuthError>;

/// Failure taxonomy for session verification.
///
/// Every rejection a caller can observe maps onto one of these variants;
/// nothing falls through to anonymous access.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no session credentials presented")]
    MissingCredentials,
    #[error("credential rejected: {0}")]
    Invalid(String),
    #[error("session expired and no usable refresh token")]
    Expired,
    #[error("identity authority unavailable: {0}")]
    Unavailable(String),
    #[error("configuration error: {0}")]
    Misconfigured(String),
    #[error("invalid claim '{0}' with value '{1}'")]
    InvalidClaim(&'static str, String),
    #[error("malformed claim payload: {0}")]
    InvalidJson(String),
}

impl AuthError {
    /// Stable machine-readable code for response bodies and logs.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::MissingCredentials => "AUTH_REQUIRED",
            AuthError::Invalid(_) => "AUTH_INVALID",
            AuthError::Expired => "AUTH_EXPIRED",
            AuthError::Unavailable(_) => "AUTH_UPSTREAM",
            AuthError::Misconfigured(_) => "AUTH_CONFIG",
            AuthError::InvalidClaim(_, _) | AuthError::InvalidJson(_) => "AUTH_CLAIMS",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AuthError::MissingCredentials
            | AuthError::Invalid(_)
            | AuthError::Expired
            | AuthError::Unavailable(_)
            | AuthError::InvalidClaim(_, _)
            | AuthError::InvalidJson(_) => StatusCode::UNAUTHORIZED,
            AuthError::Misconfigured(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verification_failures_are_unauthorized() {
        for err in [
            AuthError::MissingCredentials,
            AuthError::Invalid("bad signature".into()),
            AuthError::Expired,
            AuthError::Unavailable("timed out".into()),
        ] {
            assert_eq!(err.status(), StatusCode::UNAUTHORIZED, "{err}");
        }
    }

    #[test]
    fn misconfiguration_is_a_server_error() {
        let err = AuthError::Misconfigured("IDENTITY_PROJECT_ID missing".into());
        assert_eq!(err.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.code(), "AUTH_CONFIG");
    }
}
