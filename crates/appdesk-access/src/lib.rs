//! Appdesk access control
//!
//! Turns loosely-typed permission payloads into a closed [`AccessGrant`] and exposes the
//! boolean predicates every mutating workspace operation is gated on.
//!
//! # Core Concepts
//!
//! - [`Identity`]: the acting user, read from decoded session claims
//! - [`resolve_grant`]: total parser for the applications permission payload
//! - [`AccessPolicy`]: `can_view`, `can_manage`, `can_check`, `can_assign_other_bidders`
//! - [`GrantMemo`]: re-resolves the server grant only when its payload changes
//!
//! # Example
//!
//! ```rust
//! use appdesk_access::{AccessPolicy, Identity};
//! use serde_json::json;
//!
//! let identity = Identity::new("u1").with_permissions(json!({
//!     "applications": {"checkProfiles": ["p1"]}
//! }));
//! let policy = AccessPolicy::for_identity(&identity);
//! assert!(policy.can_check());
//! assert!(!policy.can_assign_other_bidders());
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod grant;
mod identity;
mod policy;
mod resolver;

pub use grant::{AccessGrant, ProfileAccessLevel};
pub use identity::{Identity, IdentityError, ADMIN_ROLE};
pub use policy::{AccessPolicy, Capabilities, GrantMemo};
pub use resolver::{normalize_id_list, resolve_grant, ALL_ACCESS};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
