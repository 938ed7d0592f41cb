//! Capability predicates
//!
//! [`AccessPolicy`] is a pure view over a grant, the admin flag and any server-declared
//! capability overrides. It is rebuilt whenever one of those changes.

use crate::grant::{AccessGrant, ProfileAccessLevel};
use crate::identity::Identity;
use crate::resolver::resolve_grant;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Capability overrides declared by the server in `meta.capabilities`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    /// Whether the identity may set another user as bidder
    #[serde(default)]
    pub can_assign_other_bidders: Option<bool>,
}

/// Boolean capability predicates for the acting identity
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccessPolicy {
    grant: AccessGrant,
    is_admin: bool,
    capabilities: Capabilities,
}

impl AccessPolicy {
    /// Policy over a grant
    #[inline]
    #[must_use]
    pub fn new(grant: AccessGrant, is_admin: bool) -> Self {
        Self {
            grant,
            is_admin,
            capabilities: Capabilities::default(),
        }
    }

    /// Policy from the identity's own claims
    #[must_use]
    pub fn for_identity(identity: &Identity) -> Self {
        Self::new(identity.client_grant(), identity.is_admin())
    }

    /// Attach server capability overrides
    #[inline]
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Underlying grant
    #[inline]
    #[must_use]
    pub fn grant(&self) -> &AccessGrant {
        &self.grant
    }

    /// Whether the identity is an administrator
    #[inline]
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.is_admin
    }

    /// Server overrides in effect
    #[inline]
    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// May see the applications table
    ///
    /// Display only: the workspace never gates a fetch on it. The server filters what it
    /// returns, and its `meta.access` can widen the session's own claims.
    #[must_use]
    pub fn can_view(&self) -> bool {
        self.is_admin
            || self.grant.manage_all
            || self.grant.check_all
            || self.grant.has_scoped_manage()
            || self.grant.has_scoped_check()
    }

    /// May create rows and edit content fields
    ///
    /// Currently the same disjunction as [`can_view`](Self::can_view), kept separate so the
    /// two can diverge.
    #[must_use]
    pub fn can_manage(&self) -> bool {
        self.is_admin
            || self.grant.manage_all
            || self.grant.check_all
            || self.grant.has_scoped_manage()
            || self.grant.has_scoped_check()
    }

    /// May drive the review workflow
    #[must_use]
    pub fn can_check(&self) -> bool {
        self.grant.check_all || self.grant.has_scoped_check()
    }

    /// May set a bidder other than themselves
    #[must_use]
    pub fn can_assign_other_bidders(&self) -> bool {
        self.capabilities
            .can_assign_other_bidders
            .unwrap_or(self.is_admin || self.grant.manage_all || self.grant.check_all)
    }

    /// May edit profiles
    #[must_use]
    pub fn can_edit_profiles(&self) -> bool {
        self.is_admin || self.grant.profile_access == ProfileAccessLevel::Edit
    }

    /// May see profiles
    #[must_use]
    pub fn can_view_profiles(&self) -> bool {
        self.grant.profile_access != ProfileAccessLevel::None
    }
}

/// Memoized resolution of the server's `meta.access` payload
///
/// The grant is re-resolved only when the raw payload differs from the last one seen, so a
/// refresh carrying the same payload keeps the same grant.
#[derive(Debug, Clone, Default)]
pub struct GrantMemo {
    raw: Option<Value>,
    grant: Option<AccessGrant>,
}

impl GrantMemo {
    /// Empty memo
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve `raw`, reusing the previous grant if the payload is unchanged
    ///
    /// Returns the grant and whether it was re-resolved. The profiles level is copied from
    /// `profile_access` since the server payload does not carry it.
    pub fn resolve(
        &mut self,
        raw: &Value,
        profile_access: ProfileAccessLevel,
    ) -> (AccessGrant, bool) {
        if let (Some(previous), Some(grant)) = (&self.raw, &self.grant) {
            if previous == raw && grant.profile_access == profile_access {
                return (grant.clone(), false);
            }
        }
        let grant = resolve_grant(Some(raw)).with_profile_access(profile_access);
        tracing::debug!(
            "resolved server grant: manage_all={} manage_scoped={} check_all={} check_scoped={}",
            grant.manage_all,
            grant.manage_scoped.len(),
            grant.check_all,
            grant.check_scoped.len()
        );
        self.raw = Some(raw.clone());
        self.grant = Some(grant.clone());
        (grant, true)
    }

    /// Forget the last payload
    pub fn clear(&mut self) {
        self.raw = None;
        self.grant = None;
    }
}
