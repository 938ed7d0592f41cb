//! Normalized permission snapshot

use appdesk_row::ProfileId;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Access level for the profiles screen
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProfileAccessLevel {
    /// May edit profiles
    Edit,
    /// May only look
    #[default]
    View,
    /// No access
    None,
}

impl ProfileAccessLevel {
    /// Read a level from a raw claim value
    ///
    /// Anything other than the three known strings reads as [`ProfileAccessLevel::View`].
    #[must_use]
    pub fn from_claim(raw: Option<&Value>) -> Self {
        match raw.and_then(Value::as_str) {
            Some("edit") => Self::Edit,
            Some("none") => Self::None,
            _ => Self::View,
        }
    }

    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Edit => "edit",
            Self::View => "view",
            Self::None => "none",
        }
    }
}

impl fmt::Display for ProfileAccessLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Normalized permission snapshot for the acting identity
///
/// Every field is always present. Scoped lists are deduplicated and sorted, so two grants
/// built from equivalent payloads compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessGrant {
    /// Manage every application
    #[serde(rename = "manageAllApplications")]
    pub manage_all: bool,
    /// Profiles whose applications may be managed
    #[serde(rename = "manageApplications")]
    pub manage_scoped: BTreeSet<ProfileId>,
    /// Check every application
    #[serde(rename = "checkAllApplications")]
    pub check_all: bool,
    /// Profiles whose applications may be checked
    #[serde(rename = "checkApplications")]
    pub check_scoped: BTreeSet<ProfileId>,
    /// Profiles screen access
    #[serde(rename = "profileAccessLevel", default)]
    pub profile_access: ProfileAccessLevel,
}

impl AccessGrant {
    /// Grant with no access to applications
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Grant for the `"all"` marker: manage everything, check nothing
    #[must_use]
    pub fn manage_everything() -> Self {
        Self {
            manage_all: true,
            ..Self::default()
        }
    }

    /// Set the profiles screen level
    #[inline]
    #[must_use]
    pub fn with_profile_access(mut self, level: ProfileAccessLevel) -> Self {
        self.profile_access = level;
        self
    }

    /// Whether any scoped management list is present
    #[inline]
    #[must_use]
    pub fn has_scoped_manage(&self) -> bool {
        !self.manage_scoped.is_empty()
    }

    /// Whether any scoped check list is present
    #[inline]
    #[must_use]
    pub fn has_scoped_check(&self) -> bool {
        !self.check_scoped.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn profile_level_from_claim() {
        assert_eq!(
            ProfileAccessLevel::from_claim(Some(&json!("edit"))),
            ProfileAccessLevel::Edit
        );
        assert_eq!(
            ProfileAccessLevel::from_claim(Some(&json!("none"))),
            ProfileAccessLevel::None
        );
        assert_eq!(ProfileAccessLevel::from_claim(None), ProfileAccessLevel::View);
        assert_eq!(
            ProfileAccessLevel::from_claim(Some(&json!("admin"))),
            ProfileAccessLevel::View
        );
        assert_eq!(
            ProfileAccessLevel::from_claim(Some(&json!(3))),
            ProfileAccessLevel::View
        );
    }

    #[test]
    fn serializes_with_current_names() {
        let grant = AccessGrant {
            manage_scoped: [ProfileId::new("b"), ProfileId::new("a")].into_iter().collect(),
            ..AccessGrant::manage_everything()
        };
        assert_eq!(
            serde_json::to_value(&grant).unwrap(),
            json!({
                "manageAllApplications": true,
                "manageApplications": ["a", "b"],
                "checkAllApplications": false,
                "checkApplications": [],
                "profileAccessLevel": "view"
            })
        );
    }
}
