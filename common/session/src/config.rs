use std::collections::HashSet;
use std::env;
use std::time::Duration;

use crate::error::{AuthError, AuthResult};
use crate::project::PermissionLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CookieSameSite {
    Lax,
    Strict,
    None,
}

impl CookieSameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            CookieSameSite::Lax => "Lax",
            CookieSameSite::Strict => "Strict",
            CookieSameSite::None => "None",
        }
    }
}

/// Which claim supplies the username. Resolved once at configuration build
/// time; the guard never compares claim names per request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UsernameClaim {
    Subject,
    Email,
}

/// Immutable runtime configuration for the session guard.
///
/// Built once at process start and passed by reference; there is no ambient
/// global lookup anywhere in the crate.
#[derive(Debug, Clone)]
pub struct GuardConfig {
    /// Project identifier at the identity authority; doubles as the expected
    /// token issuer.
    pub project_id: String,
    /// Base URL of the identity authority API.
    pub base_url: String,
    pub jwks_url: String,
    pub refresh_url: String,
    pub admin_roles: HashSet<String>,
    pub default_permission: PermissionLevel,
    pub username_claim: UsernameClaim,
    pub session_cookie: String,
    pub refresh_cookie: String,
    pub cookie_secure: bool,
    pub cookie_same_site: CookieSameSite,
    pub session_cookie_max_age: u32,
    pub login_path: String,
    pub public_routes: HashSet<String>,
    pub public_prefixes: Vec<String>,
    /// Upper bound on any single call to the identity authority.
    pub verify_timeout: Duration,
    /// Allowable clock skew in seconds when validating exp/nbf.
    pub leeway_seconds: u32,
}

impl GuardConfig {
    /// Construct config with defaults for everything except the identity
    /// project and authority base URL.
    pub fn new(project_id: impl Into<String>, base_url: impl Into<String>) -> Self {
        let project_id = project_id.into();
        let base_url = base_url.into();
        let jwks_url = format!("{base_url}/{project_id}/.well-known/jwks.json");
        let refresh_url = format!("{base_url}/v1/auth/refresh");
        Self {
            project_id,
            base_url,
            jwks_url,
            refresh_url,
            admin_roles: default_admin_roles(),
            default_permission: PermissionLevel::Read,
            username_claim: UsernameClaim::Subject,
            session_cookie: "session".to_string(),
            refresh_cookie: "refresh".to_string(),
            cookie_secure: false,
            cookie_same_site: CookieSameSite::Lax,
            session_cookie_max_age: 3600,
            login_path: "/auth/login".to_string(),
            public_routes: default_public_routes(),
            public_prefixes: vec!["/static/".to_string(), "/_static/".to_string()],
            verify_timeout: Duration::from_secs(5),
            leeway_seconds: 30,
        }
    }

    /// Load configuration from environment variables. Missing required
    /// variables are fatal; the process must not serve protected routes.
    pub fn from_env() -> AuthResult<Self> {
        let project_id = require_env("IDENTITY_PROJECT_ID")?;
        let base_url = require_env("IDENTITY_BASE_URL")?;
        let mut config = Self::new(project_id, base_url.trim_end_matches('/'));

        if let Some(url) = env::var("IDENTITY_JWKS_URL").ok().as_deref().and_then(normalize_optional) {
            config.jwks_url = url;
        }
        if let Some(url) = env::var("IDENTITY_REFRESH_URL").ok().as_deref().and_then(normalize_optional) {
            config.refresh_url = url;
        }
        if let Ok(value) = env::var("AUTH_ADMIN_ROLES") {
            config.admin_roles = parse_list(&value);
        }
        if let Ok(value) = env::var("AUTH_DEFAULT_PERMISSION") {
            config.default_permission = parse_permission(&value)?;
        }
        if let Ok(value) = env::var("AUTH_USERNAME_CLAIM") {
            config.username_claim = parse_username_claim(&value)?;
        }
        if let Some(name) = env::var("AUTH_SESSION_COOKIE").ok().as_deref().and_then(normalize_optional) {
            config.session_cookie = name;
        }
        if let Some(name) = env::var("AUTH_REFRESH_COOKIE").ok().as_deref().and_then(normalize_optional) {
            config.refresh_cookie = name;
        }
        if let Some(secure) = bool_from_env("AUTH_COOKIE_SECURE") {
            config.cookie_secure = secure;
        }
        if let Ok(value) = env::var("AUTH_COOKIE_SAMESITE") {
            config.cookie_same_site = parse_same_site(&value)?;
        }
        if let Ok(value) = env::var("AUTH_SESSION_COOKIE_MAX_AGE") {
            config.session_cookie_max_age = value.trim().parse().map_err(|_| {
                AuthError::Misconfigured(format!(
                    "AUTH_SESSION_COOKIE_MAX_AGE must be a number of seconds, got '{value}'"
                ))
            })?;
        }
        if let Ok(value) = env::var("AUTH_PUBLIC_ROUTES") {
            config.public_routes.extend(parse_list(&value));
        }
        if let Ok(value) = env::var("AUTH_VERIFY_TIMEOUT_MS") {
            let millis: u64 = value.trim().parse().map_err(|_| {
                AuthError::Misconfigured(format!(
                    "AUTH_VERIFY_TIMEOUT_MS must be a number of milliseconds, got '{value}'"
                ))
            })?;
            config.verify_timeout = Duration::from_millis(millis);
        }
        if let Ok(value) = env::var("AUTH_JWT_LEEWAY_SECONDS") {
            if let Ok(leeway) = value.trim().parse() {
                config.leeway_seconds = leeway;
            }
        }

        Ok(config)
    }

    pub fn is_admin_role(&self, roles: &[String]) -> bool {
        roles.iter().any(|role| self.admin_roles.contains(role))
    }

    /// Public routes bypass the session guard entirely.
    pub fn is_public_route(&self, path: &str) -> bool {
        if self.public_routes.contains(path) {
            return true;
        }
        self.public_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

fn require_env(key: &'static str) -> AuthResult<String> {
    env::var(key)
        .ok()
        .as_deref()
        .and_then(normalize_optional)
        .ok_or_else(|| AuthError::Misconfigured(format!("{key} environment variable is required")))
}

fn default_admin_roles() -> HashSet<String> {
    HashSet::from(["admin".to_string(), "mlflow-admin".to_string()])
}

fn default_public_routes() -> HashSet<String> {
    HashSet::from([
        "/auth/login".to_string(),
        "/auth/logout".to_string(),
        "/health".to_string(),
        "/version".to_string(),
    ])
}

fn bool_from_env(key: &str) -> Option<bool> {
    env::var(key).ok().map(|value| {
        matches!(
            value.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "on"
        )
    })
}

fn parse_list(value: &str) -> HashSet<String> {
    value
        .split([',', ';', ' '])
        .filter_map(|item| {
            let entry = item.trim();
            if entry.is_empty() {
                None
            } else {
                Some(entry.to_string())
            }
        })
        .collect()
}

fn normalize_optional(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn parse_same_site(value: &str) -> AuthResult<CookieSameSite> {
    match value.trim().to_ascii_lowercase().as_str() {
        "lax" => Ok(CookieSameSite::Lax),
        "strict" => Ok(CookieSameSite::Strict),
        "none" => Ok(CookieSameSite::None),
        other => Err(AuthError::Misconfigured(format!(
            "Unsupported cookie same-site policy '{other}'. Use Lax, Strict, or None."
        ))),
    }
}

fn parse_username_claim(value: &str) -> AuthResult<UsernameClaim> {
    match value.trim().to_ascii_lowercase().as_str() {
        "sub" | "subject" => Ok(UsernameClaim::Subject),
        "email" => Ok(UsernameClaim::Email),
        other => Err(AuthError::Misconfigured(format!(
            "Unsupported username claim '{other}'. Use sub or email."
        ))),
    }
}

fn parse_permission(value: &str) -> AuthResult<PermissionLevel> {
    match value.trim().to_ascii_uppercase().as_str() {
        "READ" => Ok(PermissionLevel::Read),
        "EDIT" => Ok(PermissionLevel::Edit),
        "MANAGE" => Ok(PermissionLevel::Manage),
        other => Err(AuthError::Misconfigured(format!(
            "Unsupported permission level '{other}'. Use READ, EDIT, or MANAGE."
        ))),
    }
}
