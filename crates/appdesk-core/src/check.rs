//! Review workflow guards
//!
//! ```text
//!   pending ──start──▶ in_review ──complete──▶ reviewed
//!      ▲                   │
//!      └──────cancel───────┘
//! ```
//!
//! Nothing leaves `reviewed`. Guards here are pure: they inspect the row and the caller's
//! policy and either produce the request body or a local error. The status only changes
//! once the server has answered.

use crate::config::ReviewConfig;
use crate::error::WorkspaceError;
use appdesk_access::AccessPolicy;
use appdesk_row::{ApplicationRow, CheckPatch, CheckStatus, ReviewLock, UserId};
use std::fmt;

/// User-triggered review transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CheckAction {
    /// pending → `in_review`
    Start,
    /// `in_review` → reviewed
    Complete,
    /// `in_review` → pending
    Cancel,
}

impl CheckAction {
    /// Status the action applies to
    #[must_use]
    pub fn source_status(self) -> CheckStatus {
        match self {
            Self::Start => CheckStatus::Pending,
            Self::Complete | Self::Cancel => CheckStatus::InReview,
        }
    }

    /// Status the server moves the row to
    #[must_use]
    pub fn target_status(self) -> CheckStatus {
        match self {
            Self::Start => CheckStatus::InReview,
            Self::Complete => CheckStatus::Reviewed,
            Self::Cancel => CheckStatus::Pending,
        }
    }

    /// Lower-case verb
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
        }
    }
}

impl fmt::Display for CheckAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Statuses reachable from `from`
#[must_use]
pub fn allowed_transitions(from: CheckStatus) -> Vec<CheckStatus> {
    match from {
        CheckStatus::Pending => vec![CheckStatus::InReview],
        CheckStatus::InReview => vec![CheckStatus::Reviewed, CheckStatus::Pending],
        CheckStatus::Reviewed => vec![],
    }
}

/// Actions available from `from`
#[must_use]
pub fn available_actions(from: CheckStatus) -> Vec<CheckAction> {
    [CheckAction::Start, CheckAction::Complete, CheckAction::Cancel]
        .into_iter()
        .filter(|action| action.source_status() == from)
        .collect()
}

/// Who is acting and under which rules
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    /// Current policy
    pub policy: &'a AccessPolicy,
    /// Acting user
    pub actor: &'a UserId,
    /// Review settings
    pub review: &'a ReviewConfig,
}

/// Check every guard for `action` on `row` and build the request body
///
/// # Errors
/// - [`WorkspaceError::Validation`] for drafts, a missing result or a missing note
/// - [`WorkspaceError::InvalidTransition`] if the row is not in the action's source status
/// - [`WorkspaceError::Permission`] without `can_check`
/// - [`WorkspaceError::LockHeld`] if another checker holds the review
pub fn plan_check(
    action: CheckAction,
    row: &ApplicationRow,
    ctx: CheckContext<'_>,
) -> Result<CheckPatch, WorkspaceError> {
    if !row.is_persisted() {
        return Err(WorkspaceError::validation(
            "Save the application before reviewing it",
        ));
    }
    let from = row.record.check_status;
    if from != action.source_status() {
        return Err(WorkspaceError::InvalidTransition { from, action });
    }
    if !ctx.policy.can_check() {
        return Err(WorkspaceError::permission(
            "You do not have permission to check applications",
        ));
    }

    match action {
        CheckAction::Start => Ok(CheckPatch::start()),
        CheckAction::Complete => {
            ensure_lock(row, ctx.actor, "Only the assigned checker can complete this review")?;
            let result = &row.record.check_result;
            if result.is_pending() {
                return Err(WorkspaceError::validation(
                    "Select a check result before saving",
                ));
            }
            let note = row.record.check_note.trim();
            if ctx.review.requires_note(result) && note.is_empty() {
                return Err(WorkspaceError::validation(
                    "Check note is required before saving",
                ));
            }
            Ok(CheckPatch::complete(result.clone(), note))
        }
        CheckAction::Cancel => {
            ensure_lock(row, ctx.actor, "Only the assigned checker can cancel this review")?;
            Ok(CheckPatch::cancel())
        }
    }
}

/// Check that `actor` may stage a result or note on `row`
///
/// # Errors
/// [`WorkspaceError::Validation`] outside `in_review`, [`WorkspaceError::Permission`] without
/// `can_check`, [`WorkspaceError::LockHeld`] if another checker holds the review
pub fn ensure_can_stage_review(
    row: &ApplicationRow,
    policy: &AccessPolicy,
    actor: &UserId,
) -> Result<(), WorkspaceError> {
    if row.record.check_status != CheckStatus::InReview {
        return Err(WorkspaceError::validation(
            "Start the review before recording a result",
        ));
    }
    if !policy.can_check() {
        return Err(WorkspaceError::permission(
            "You do not have permission to check applications",
        ));
    }
    ensure_lock(row, actor, "Only the assigned checker can edit this review")
}

fn ensure_lock(row: &ApplicationRow, actor: &UserId, message: &str) -> Result<(), WorkspaceError> {
    let lock = row.review_lock();
    if lock.admits(actor) {
        return Ok(());
    }
    if let ReviewLock::HeldBy(holder) = &lock {
        tracing::debug!("row {} is held by {}, rejecting {}", row.local_id, holder, actor);
    }
    Err(WorkspaceError::LockHeld {
        row: row.local_id.clone(),
        message: message.to_string(),
    })
}
