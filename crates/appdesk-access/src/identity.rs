//! Acting identity
//!
//! Built from already-decoded session claims. Decoding the token is the session layer's job.

use crate::grant::{AccessGrant, ProfileAccessLevel};
use crate::resolver::resolve_grant;
use appdesk_row::{PersonSummary, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role name carried by administrators
pub const ADMIN_ROLE: &str = "admin";

/// Errors reading session claims
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentityError {
    /// Claims are not a JSON object
    #[error("session claims must be an object")]
    NotAnObject,

    /// Neither `id` nor `_id` is present
    #[error("session claims carry no user id")]
    MissingId,
}

/// The user the workspace acts for
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    /// User id
    pub id: UserId,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Role name
    #[serde(default)]
    pub role: Option<String>,
    /// Raw permission claims, keyed by area (`applications`, `profiles`, ...)
    #[serde(default)]
    pub permissions: Value,
}

impl Identity {
    /// Identity with no role and no permissions
    #[inline]
    #[must_use]
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: id.into(),
            name: None,
            role: None,
            permissions: Value::Null,
        }
    }

    /// Set the display name
    #[inline]
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Set the role
    #[inline]
    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// Set the raw permission claims
    #[inline]
    #[must_use]
    pub fn with_permissions(mut self, permissions: Value) -> Self {
        self.permissions = permissions;
        self
    }

    /// Read an identity from decoded claims
    ///
    /// # Errors
    /// - [`IdentityError::NotAnObject`] if `claims` is not an object
    /// - [`IdentityError::MissingId`] if neither `id` nor `_id` holds a non-empty string
    pub fn from_claims(claims: &Value) -> Result<Self, IdentityError> {
        let map = claims.as_object().ok_or(IdentityError::NotAnObject)?;
        let id = ["id", "_id"]
            .iter()
            .filter_map(|key| map.get(*key).and_then(Value::as_str))
            .map(str::trim)
            .find(|id| !id.is_empty())
            .ok_or(IdentityError::MissingId)?;

        let text = |key: &str| map.get(key).and_then(Value::as_str).map(str::to_string);
        Ok(Self {
            id: UserId::new(id),
            name: text("name"),
            role: text("role"),
            permissions: map.get("permissions").cloned().unwrap_or(Value::Null),
        })
    }

    /// Whether the role is administrator
    #[inline]
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some(ADMIN_ROLE)
    }

    /// Raw applications permission payload
    #[must_use]
    pub fn applications_permissions(&self) -> Option<&Value> {
        self.permissions.get("applications")
    }

    /// Profiles screen level from the claims
    #[must_use]
    pub fn profile_access(&self) -> ProfileAccessLevel {
        ProfileAccessLevel::from_claim(self.permissions.get("profiles"))
    }

    /// Grant derived from the claims alone
    ///
    /// Used until the server has answered with its own `meta.access`.
    #[must_use]
    pub fn client_grant(&self) -> AccessGrant {
        resolve_grant(self.applications_permissions()).with_profile_access(self.profile_access())
    }

    /// This identity as a person reference
    #[must_use]
    pub fn as_person(&self) -> PersonSummary {
        PersonSummary {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}
