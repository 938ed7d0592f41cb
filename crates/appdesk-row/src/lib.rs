//! Appdesk row model
//!
//! Canonical application rows and everything that touches their shape.
//!
//! # Core Concepts
//!
//! - [`ApplicationRow`]: a row with identity, dirty set and last known server state
//! - [`FieldKey`] / [`DirtyFields`]: addressable fields and unsaved-edit bookkeeping
//! - [`normalize_row`]: wire document → canonical row
//! - [`FieldPatch`]: sparse request body
//! - [`RowSet`]: ordered, keyed collection the workspace owns

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod field;
mod ids;
mod normalize;
mod patch;
mod row;
mod store;

pub use field::{DirtyFields, FieldKey, UnknownField};
pub use ids::{LocalId, ProfileId, ResumeId, ServerId, UserId, TEMP_PREFIX};
pub use normalize::{normalize_row, normalize_rows, NormalizeError, NormalizedBatch};
pub use patch::{CheckPatch, FieldPatch};
pub use row::{
    ApplicationRecord, ApplicationRow, CheckResult, CheckStatus, PersonSummary, ProfileSummary,
    ResumeSummary, ReviewLock, RowError, UnknownStatus,
};
pub use store::RowSet;

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
