use serde::Serialize;

use crate::claims::Claims;
use crate::config::{GuardConfig, UsernameClaim};

pub const PERM_MANAGE: &str = "mlflow:manage";
pub const PERM_EDIT: &str = "mlflow:edit";
pub const PERM_WRITE: &str = "mlflow:write";
pub const PERM_READ: &str = "mlflow:read";

/// Roles that carry an implicit permission level, consulted after explicit
/// permission strings and before the configured default.
const ROLE_LEVELS: &[(&str, PermissionLevel)] = &[
    ("mlflow-manager", PermissionLevel::Manage),
    ("mlflow-editor", PermissionLevel::Edit),
    ("mlflow-viewer", PermissionLevel::Read),
];

/// Tracking-server permission level, ordered from weakest to strongest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PermissionLevel {
    Read,
    Edit,
    Manage,
}

impl PermissionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::Read => "READ",
            PermissionLevel::Edit => "EDIT",
            PermissionLevel::Manage => "MANAGE",
        }
    }
}

/// Per-request user record derived from verified claims. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct UserContext {
    pub claims: Claims,
    pub username: String,
    pub is_admin: bool,
    pub permission_level: PermissionLevel,
}

/// Map verified claims into a [`UserContext`]. Pure; same input always yields
/// the same output.
pub fn project(claims: &Claims, config: &GuardConfig) -> UserContext {
    let is_admin = config.is_admin_role(&claims.roles);

    let username = match config.username_claim {
        UsernameClaim::Subject => claims.subject.clone(),
        UsernameClaim::Email => claims
            .email
            .clone()
            .unwrap_or_else(|| claims.subject.clone()),
    };

    UserContext {
        claims: claims.clone(),
        username,
        is_admin,
        permission_level: permission_level(claims, config, is_admin),
    }
}

fn permission_level(claims: &Claims, config: &GuardConfig, is_admin: bool) -> PermissionLevel {
    if is_admin || claims.has_permission(PERM_MANAGE) {
        return PermissionLevel::Manage;
    }
    if claims.has_permission(PERM_EDIT) || claims.has_permission(PERM_WRITE) {
        return PermissionLevel::Edit;
    }
    if claims.has_permission(PERM_READ) {
        return PermissionLevel::Read;
    }
    for (role, level) in ROLE_LEVELS {
        if claims.has_role(role) {
            return *level;
        }
    }
    config.default_permission
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn claims(roles: &[&str], permissions: &[&str]) -> Claims {
        Claims {
            subject: "U2abc".to_string(),
            email: Some("dev@example.com".to_string()),
            display_name: Some("Dev One".to_string()),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            permissions: permissions.iter().map(|p| p.to_string()).collect(),
            tenants: Vec::new(),
            expires_at: Utc.timestamp_opt(1_900_000_000, 0).single().unwrap(),
            issued_at: None,
            issuer: "P2proj".to_string(),
            raw: serde_json::Value::Null,
        }
    }

    fn config() -> GuardConfig {
        GuardConfig::new("P2proj", "https://auth.example.com")
    }

    #[test]
    fn admin_role_intersection_grants_manage() {
        let user = project(&claims(&["admin"], &[]), &config());
        assert!(user.is_admin);
        assert_eq!(user.permission_level, PermissionLevel::Manage);
    }

    #[test]
    fn manage_permission_beats_read_default_without_admin() {
        let user = project(&claims(&[], &["mlflow:manage"]), &config());
        assert!(!user.is_admin);
        assert_eq!(user.permission_level, PermissionLevel::Manage);
    }

    #[test]
    fn edit_permission_overrides_default() {
        let mut cfg = config();
        cfg.default_permission = PermissionLevel::Read;
        let user = project(&claims(&[], &["mlflow:edit"]), &cfg);
        assert_eq!(user.permission_level, PermissionLevel::Edit);
    }

    #[test]
    fn write_is_an_alias_for_edit() {
        let user = project(&claims(&[], &["mlflow:write"]), &config());
        assert_eq!(user.permission_level, PermissionLevel::Edit);
    }

    #[test]
    fn role_map_applies_after_permissions() {
        let user = project(&claims(&["mlflow-editor"], &[]), &config());
        assert_eq!(user.permission_level, PermissionLevel::Edit);

        // An explicit permission wins over a weaker mapped role.
        let user = project(&claims(&["mlflow-viewer"], &["mlflow:manage"]), &config());
        assert_eq!(user.permission_level, PermissionLevel::Manage);
    }

    #[test]
    fn falls_back_to_configured_default() {
        let mut cfg = config();
        cfg.default_permission = PermissionLevel::Edit;
        let user = project(&claims(&[], &[]), &cfg);
        assert_eq!(user.permission_level, PermissionLevel::Edit);
    }

    #[test]
    fn projection_is_deterministic() {
        let input = claims(&["admin"], &["mlflow:read"]);
        let cfg = config();
        let first = project(&input, &cfg);
        let second = project(&input, &cfg);
        assert_eq!(first.username, second.username);
        assert_eq!(first.is_admin, second.is_admin);
        assert_eq!(first.permission_level, second.permission_level);
    }

    #[test]
    fn email_username_claim_falls_back_to_subject() {
        let mut cfg = config();
        cfg.username_claim = crate::config::UsernameClaim::Email;
        let user = project(&claims(&[], &[]), &cfg);
        assert_eq!(user.username, "dev@example.com");

        let mut anonymous = claims(&[], &[]);
        anonymous.email = None;
        let user = project(&anonymous, &cfg);
        assert_eq!(user.username, "U2abc");
    }
}
