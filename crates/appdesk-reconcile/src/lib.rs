//! Appdesk reconciliation
//!
//! Merges a freshly fetched row set with the workspace's local rows without losing unsaved
//! work. The merge is a pure function of `(previous, fetched)` so it can be tested apart from
//! any I/O.
//!
//! # Example
//!
//! ```rust
//! use appdesk_reconcile::reconcile;
//! use appdesk_row::{ApplicationRecord, ApplicationRow, RowSet, ServerId};
//!
//! let fetched = vec![ApplicationRow::persisted(ServerId::new("a1"), ApplicationRecord::default())];
//! let out = reconcile(&RowSet::new(), fetched.clone());
//! assert_eq!(out.rows.into_vec(), fetched);
//! ```

#![warn(missing_docs)]
#![warn(unreachable_pub)]

mod overlay;
mod reconcile;

pub use overlay::{overlay_field, overlay_row};
pub use reconcile::{reconcile, ReconcileReport, Reconciled, Reconciler};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
