//! Error types for the Applications workspace
//!
//! Failures fall into four groups:
//! - validation: detected locally, no network call
//! - permission: the access policy blocks the action before dispatch
//! - conflict: the server (or the local view of its review lock) refuses a row operation
//! - transport: the server could not be reached or answered badly; a full re-fetch follows
//!
//! None of them is fatal. After any error the workspace is still usable.

use crate::check::CheckAction;
use appdesk_row::{CheckStatus, LocalId, NormalizeError};
use std::path::PathBuf;

/// Fallback message when the server gives none
pub const DEFAULT_SERVER_MESSAGE: &str = "Request failed";

/// Errors from the REST collaborator
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ApiError {
    /// Non-success response other than 401
    #[error("{message}")]
    Status {
        /// HTTP status code
        status: u16,
        /// The body's `error` field, or a generic message
        message: String,
    },

    /// 401: the session is no longer valid
    #[error("session is no longer authorized")]
    Unauthorized,

    /// Connection or protocol failure
    #[error("transport error: {0}")]
    Transport(String),

    /// Response body could not be decoded
    #[error("invalid response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Status error with the server's message
    #[inline]
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            status,
            message: message.into(),
        }
    }

    /// HTTP status, if the server answered
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Unauthorized => Some(401),
            Self::Transport(_) | Self::Decode(_) => None,
        }
    }

    /// Whether the server refused the operation on this row (403 or 409)
    #[inline]
    #[must_use]
    pub fn is_refusal(&self) -> bool {
        matches!(self, Self::Status { status: 403 | 409, .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            Self::Decode(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Coarse error category, for callers that only route on kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad local input
    Validation,
    /// Blocked by the access policy
    Permission,
    /// Refused because of another user's claim on the row
    Conflict,
    /// Server unreachable or misbehaving
    Transport,
    /// Session invalid
    Unauthorized,
    /// Operation does not apply to the row's current state
    State,
    /// Workspace torn down
    Closed,
}

/// Main workspace error type
#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    /// Local input rejected
    #[error("{0}")]
    Validation(String),

    /// Access policy forbids the action
    #[error("{0}")]
    Permission(String),

    /// Another checker holds the review lock (detected locally)
    #[error("{message}")]
    LockHeld {
        /// Affected row
        row: LocalId,
        /// Message for the user
        message: String,
    },

    /// Server refused the operation on a row
    #[error("{message}")]
    Conflict {
        /// Affected row
        row: LocalId,
        /// Server message
        message: String,
    },

    /// Server unreachable or failing
    #[error(transparent)]
    Transport(ApiError),

    /// Session invalidated by the server
    #[error("session is no longer authorized")]
    Unauthorized,

    /// No row with this key
    #[error("no application row {0}")]
    RowNotFound(LocalId),

    /// Row has a request in flight
    #[error("application row {0} is being saved")]
    Busy(LocalId),

    /// Review action not available from the row's status
    #[error("cannot {action} a review that is {from}")]
    InvalidTransition {
        /// Current status
        from: CheckStatus,
        /// Attempted action
        action: CheckAction,
    },

    /// No active editor or edit mode for the operation
    #[error("row {0} is not being edited")]
    NothingToEdit(LocalId),

    /// Workspace closed while the operation was pending
    #[error("workspace is closed")]
    Closed,

    /// Server response could not be normalized
    #[error(transparent)]
    Malformed(#[from] NormalizeError),
}

impl WorkspaceError {
    /// Validation error
    #[inline]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Permission error
    #[inline]
    pub fn permission(message: impl Into<String>) -> Self {
        Self::Permission(message.into())
    }

    /// Map a collaborator failure on `row`
    ///
    /// 401 invalidates the session, 403/409 are row conflicts, anything else is transport.
    #[must_use]
    pub fn from_api(row: Option<&LocalId>, error: ApiError) -> Self {
        match (row, error) {
            (_, ApiError::Unauthorized) => Self::Unauthorized,
            (Some(row), ApiError::Status { status: 403 | 409, message }) => Self::Conflict {
                row: row.clone(),
                message,
            },
            (_, other) => Self::Transport(other),
        }
    }

    /// Category of this error
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Permission(_) => ErrorKind::Permission,
            Self::LockHeld { .. } | Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Transport(_) | Self::Malformed(_) => ErrorKind::Transport,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::RowNotFound(_)
            | Self::Busy(_)
            | Self::InvalidTransition { .. }
            | Self::NothingToEdit(_) => ErrorKind::State,
            Self::Closed => ErrorKind::Closed,
        }
    }

    /// Whether the error was raised before any network call
    #[must_use]
    pub fn is_local(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::Permission(_)
                | Self::LockHeld { .. }
                | Self::RowNotFound(_)
                | Self::Busy(_)
                | Self::InvalidTransition { .. }
                | Self::NothingToEdit(_)
        )
    }

    /// Whether a full re-fetch follows this error
    #[must_use]
    pub fn requires_resync(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Conflict { .. } | Self::Malformed(_)
        )
    }

    /// Row the error is scoped to, if any
    #[must_use]
    pub fn row(&self) -> Option<&LocalId> {
        match self {
            Self::LockHeld { row, .. }
            | Self::Conflict { row, .. }
            | Self::RowNotFound(row)
            | Self::Busy(row)
            | Self::NothingToEdit(row) => Some(row),
            _ => None,
        }
    }
}

/// Configuration loading errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        /// Config path
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// File is not valid TOML for the config schema
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Result alias for workspace operations
pub type Result<T, E = WorkspaceError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_errors_map_to_taxonomy() {
        let row = LocalId::from("a1");
        assert!(matches!(
            WorkspaceError::from_api(Some(&row), ApiError::Unauthorized),
            WorkspaceError::Unauthorized
        ));
        let conflict =
            WorkspaceError::from_api(Some(&row), ApiError::status(409, "Already in review"));
        assert_eq!(conflict.kind(), ErrorKind::Conflict);
        assert_eq!(conflict.to_string(), "Already in review");
        assert!(conflict.requires_resync());
        assert!(!conflict.is_local());

        let page = WorkspaceError::from_api(None, ApiError::status(409, "x"));
        assert_eq!(page.kind(), ErrorKind::Transport);

        let down = WorkspaceError::from_api(Some(&row), ApiError::Transport("refused".into()));
        assert_eq!(down.kind(), ErrorKind::Transport);
        assert!(down.requires_resync());
    }

    #[test]
    fn local_errors_do_not_resync() {
        let errors = [
            WorkspaceError::validation("Select a check result before saving"),
            WorkspaceError::permission("no"),
            WorkspaceError::LockHeld {
                row: LocalId::from("a1"),
                message: "held".into(),
            },
            WorkspaceError::Busy(LocalId::from("a1")),
        ];
        for e in errors {
            assert!(e.is_local(), "{e:?}");
            assert!(!e.requires_resync(), "{e:?}");
        }
        assert!(!WorkspaceError::Unauthorized.requires_resync());
    }

    #[test]
    fn status_codes() {
        assert_eq!(ApiError::Unauthorized.status_code(), Some(401));
        assert_eq!(ApiError::status(500, "boom").status_code(), Some(500));
        assert!(ApiError::status(403, "no").is_refusal());
        assert!(!ApiError::Decode("x".into()).is_refusal());
    }
}
