//! Identifier newtypes
//!
//! Every reference the workspace handles is an opaque server-issued string. Wrapping them
//! keeps a profile id from being passed where a row id is expected.

use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw id
            #[inline]
            #[must_use]
            pub fn new(raw: impl Into<String>) -> Self {
                Self(raw.into())
            }

            /// Borrow the raw id
            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(raw: &str) -> Self {
                Self(raw.to_string())
            }
        }

        impl From<String> for $name {
            fn from(raw: String) -> Self {
                Self(raw)
            }
        }
    };
}

string_id!(
    /// Id assigned by the server once an application is persisted
    ServerId
);

string_id!(
    /// Profile reference (also the unit of scoped permissions)
    ProfileId
);

string_id!(
    /// Resume reference
    ResumeId
);

string_id!(
    /// User reference: bidders, checkers and the acting identity
    UserId
);

/// Key of a server document: `_id` when present and non-blank, otherwise `id`
///
/// Documents serialized with virtuals carry both keys, so neither may be a serde alias of
/// the other.
pub(crate) fn document_key(primary: Option<String>, fallback: Option<String>) -> Option<String> {
    [primary, fallback]
        .into_iter()
        .flatten()
        .find(|key| !key.trim().is_empty())
}

/// Referenced document carries neither `_id` nor `id`
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("referenced document has no id")]
pub(crate) struct MissingKey;

/// Prefix carried by locally generated row keys
pub const TEMP_PREFIX: &str = "temp-";

/// Stable client-side row key
///
/// Equals the server id once one is assigned, otherwise a `temp-` token that lives only
/// as long as the draft.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocalId(String);

impl LocalId {
    /// Generate a fresh temporary key for a draft row
    #[must_use]
    pub fn temporary() -> Self {
        Self(format!("{TEMP_PREFIX}{}", Ulid::new()))
    }

    /// Borrow the raw key
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this key was generated locally
    #[inline]
    #[must_use]
    pub fn is_temporary(&self) -> bool {
        self.0.starts_with(TEMP_PREFIX)
    }
}

impl From<&ServerId> for LocalId {
    fn from(id: &ServerId) -> Self {
        Self(id.as_str().to_string())
    }
}

impl From<&str> for LocalId {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl fmt::Display for LocalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
