use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AuthError, AuthResult};

/// Application-focused representation of claims from a verified session token.
///
/// Subjects are opaque identifiers minted by the identity authority; they are
/// never parsed beyond string equality.
#[derive(Debug, Clone, Serialize)]
pub struct Claims {
    pub subject: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
    pub roles: Vec<String>,
    pub permissions: Vec<String>,
    pub tenants: Vec<String>,
    pub expires_at: DateTime<Utc>,
    pub issued_at: Option<DateTime<Utc>>,
    pub issuer: String,
    pub raw: serde_json::Value,
}

impl Claims {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|value| value == role)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|value| value == permission)
    }
}

#[derive(Debug, Deserialize)]
struct ClaimsRepr {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
    #[serde(default)]
    permissions: Vec<String>,
    #[serde(default)]
    tenants: Option<TenantsRepr>,
    exp: i64,
    #[serde(default)]
    iat: Option<i64>,
    iss: String,
}

/// The authority emits tenants either as a plain list of ids or as a map of
/// tenant id to per-tenant metadata. Only the ids are kept.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum TenantsRepr {
    Many(Vec<String>),
    Map(serde_json::Map<String, serde_json::Value>),
}

impl TryFrom<ClaimsRepr> for Claims {
    type Error = AuthError;

    fn try_from(value: ClaimsRepr) -> AuthResult<Self> {
        let expires_at = Utc
            .timestamp_opt(value.exp, 0)
            .single()
            .ok_or_else(|| AuthError::InvalidClaim("exp", value.exp.to_string()))?;

        let issued_at = match value.iat {
            Some(iat) => Some(
                Utc.timestamp_opt(iat, 0)
                    .single()
                    .ok_or_else(|| AuthError::InvalidClaim("iat", iat.to_string()))?,
            ),
            None => None,
        };

        let tenants = match value.tenants {
            Some(TenantsRepr::Many(ids)) => ids,
            Some(TenantsRepr::Map(entries)) => entries.keys().cloned().collect(),
            None => Vec::new(),
        };

        Ok(Self {
            subject: value.sub,
            email: value.email,
            display_name: value.name,
            roles: value.roles,
            permissions: value.permissions,
            tenants,
            expires_at,
            issued_at,
            issuer: value.iss,
            raw: serde_json::Value::Null,
        })
    }
}

impl TryFrom<serde_json::Value> for Claims {
    type Error = AuthError;

    fn try_from(value: serde_json::Value) -> AuthResult<Self> {
        let repr: ClaimsRepr = serde_json::from_value(value.clone())
            .map_err(|err| AuthError::InvalidJson(err.to_string()))?;
        let mut claims = Claims::try_from(repr)?;
        claims.raw = value;
        Ok(claims)
    }
}
