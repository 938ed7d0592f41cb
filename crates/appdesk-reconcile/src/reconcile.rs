//! `(previous, fetched) -> next`
//!
//! # Rules
//! - A fetched row with no edited local counterpart is taken as-is (server wins)
//! - A fetched row with an edited counterpart gets the counterpart's dirty fields overlaid
//! - An edited row the server no longer reports is dropped
//! - Drafts (no server id) are kept verbatim after the fetched rows, in their prior order
//!
//! Clean local rows carry nothing the server does not already know, so they are simply
//! replaced.

use crate::overlay::overlay_row;
use appdesk_row::{ApplicationRow, LocalId, RowSet, ServerId};
use std::collections::HashMap;

/// What a reconciliation did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Rows the server returned
    pub fetched: usize,
    /// Fetched rows that received local edits
    pub overlaid: usize,
    /// Edited rows dropped because the server no longer has them
    pub dropped_dirty: Vec<LocalId>,
    /// Drafts carried over
    pub drafts_kept: usize,
}

impl ReconcileReport {
    /// Whether any unsaved work was discarded
    #[inline]
    #[must_use]
    pub fn lost_edits(&self) -> bool {
        !self.dropped_dirty.is_empty()
    }
}

/// Output of [`Reconciler::reconcile`]
#[derive(Debug, Clone)]
pub struct Reconciled {
    /// Next row set
    pub rows: RowSet,
    /// Summary
    pub report: ReconcileReport,
}

/// Merge engine for refreshed row sets
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler;

impl Reconciler {
    /// Create a reconciler
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Merge a freshly fetched page into the previous local rows
    #[must_use]
    pub fn reconcile(&self, previous: &RowSet, fetched: Vec<ApplicationRow>) -> Reconciled {
        let mut edited: HashMap<&ServerId, &ApplicationRow> = HashMap::new();
        let mut drafts: Vec<&ApplicationRow> = Vec::new();
        for row in previous.iter() {
            match &row.server_id {
                None => drafts.push(row),
                Some(id) if row.is_dirty() => {
                    edited.insert(id, row);
                }
                Some(_) => {}
            }
        }

        let mut report = ReconcileReport {
            fetched: fetched.len(),
            drafts_kept: drafts.len(),
            ..ReconcileReport::default()
        };

        let mut rows = RowSet::new();
        for row in fetched {
            let local = row.server_id.as_ref().and_then(|id| edited.remove(id));
            match local {
                Some(local) => {
                    report.overlaid += 1;
                    rows.push(overlay_row(row, local));
                }
                None => rows.push(row),
            }
        }

        // Whatever is left in `edited` was deleted server-side; keep previous order.
        report.dropped_dirty = previous
            .iter()
            .filter(|row| {
                row.server_id
                    .as_ref()
                    .is_some_and(|id| edited.contains_key(id))
            })
            .map(|row| row.local_id.clone())
            .collect();

        for draft in drafts {
            rows.push(draft.clone());
        }

        tracing::debug!(
            "reconciled {} fetched rows: {} overlaid, {} dirty dropped, {} drafts kept",
            report.fetched,
            report.overlaid,
            report.dropped_dirty.len(),
            report.drafts_kept
        );

        Reconciled { rows, report }
    }
}

/// [`Reconciler::reconcile`] with the default reconciler
#[must_use]
pub fn reconcile(previous: &RowSet, fetched: Vec<ApplicationRow>) -> Reconciled {
    Reconciler::new().reconcile(previous, fetched)
}
