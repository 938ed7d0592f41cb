//! The Applications workspace
//!
//! [`Workspace`] is the single owner of the row set, the access policy and the edit session.
//! Every operation runs its local computation under one lock and releases it before touching
//! the network, so state is never observed half-updated and nothing is held across `.await`.
//!
//! Server responses are the only source of truth for review fields: a transition is applied
//! when the server answers, and any failed mutation is followed by a full re-fetch.

use crate::api::{ApplicationsApi, ListResponse};
use crate::check::{ensure_can_stage_review, plan_check, CheckAction, CheckContext};
use crate::config::WorkspaceConfig;
use crate::error::{ApiError, ErrorKind, Result, WorkspaceError};
use crate::meta::WorkspaceMeta;
use crate::session::{EditSession, EditorToken, SavePlan};
use appdesk_access::{AccessPolicy, GrantMemo, Identity};
use appdesk_reconcile::{ReconcileReport, Reconciled, Reconciler};
use appdesk_row::{
    normalize_row, normalize_rows, ApplicationRecord, ApplicationRow, FieldKey, FieldPatch,
    LocalId, RowSet, ServerId,
};
use parking_lot::{Mutex, MutexGuard};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Where a notice belongs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoticeScope {
    /// Whole page (fetch failures, session problems)
    Page,
    /// A single row
    Row(LocalId),
}

/// Latest error surfaced to the user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    /// Placement
    pub scope: NoticeScope,
    /// Category
    pub kind: ErrorKind,
    /// Message
    pub message: String,
}

impl Notice {
    fn from_error(error: &WorkspaceError, row: Option<&LocalId>) -> Self {
        let scope = match error.row().or(row) {
            Some(id) => NoticeScope::Row(id.clone()),
            None => NoticeScope::Page,
        };
        Self {
            scope,
            kind: error.kind(),
            message: error.to_string(),
        }
    }
}

/// Result of [`Workspace::save`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Draft created; the row now lives under this key
    Created(LocalId),
    /// Existing row updated
    Updated(LocalId),
    /// No field differed from the server state; nothing was sent
    Unchanged,
}

#[derive(Debug, Clone, Copy)]
enum Mutation {
    Save,
    Check(CheckAction),
}

impl fmt::Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Save => f.write_str("save"),
            Self::Check(action) => write!(f, "{action} check"),
        }
    }
}

#[derive(Debug)]
struct State {
    rows: RowSet,
    session: EditSession,
    meta: WorkspaceMeta,
    policy: AccessPolicy,
    grant_memo: GrantMemo,
    saving: HashSet<LocalId>,
    notice: Option<Notice>,
    last_report: Option<ReconcileReport>,
}

impl State {
    fn surface(&mut self, error: &WorkspaceError, row: Option<&LocalId>) {
        self.notice = Some(Notice::from_error(error, row));
    }

    fn ensure_idle(&self, id: &LocalId) -> Result<()> {
        if self.saving.contains(id) {
            Err(WorkspaceError::Busy(id.clone()))
        } else {
            Ok(())
        }
    }

    fn row(&self, id: &LocalId) -> Result<&ApplicationRow> {
        self.rows
            .get(id)
            .ok_or_else(|| WorkspaceError::RowNotFound(id.clone()))
    }
}

struct Inner<A> {
    api: A,
    identity: Identity,
    config: WorkspaceConfig,
    reconciler: Reconciler,
    state: Mutex<State>,
    closed: AtomicBool,
}

/// Applications workspace over a REST collaborator
///
/// Cheap to clone; clones share state.
pub struct Workspace<A> {
    inner: Arc<Inner<A>>,
}

impl<A> Clone for Workspace<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<A> fmt::Debug for Workspace<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Workspace")
            .field("identity", &self.inner.identity.id)
            .field("rows", &state.rows.len())
            .field("closed", &self.inner.closed.load(Ordering::Acquire))
            .finish_non_exhaustive()
    }
}

impl<A: ApplicationsApi> Workspace<A> {
    /// Create a workspace for `identity`
    ///
    /// Until the first fetch answers, access comes from the identity's own claims.
    #[must_use]
    pub fn new(api: A, identity: Identity, config: WorkspaceConfig) -> Self {
        let state = State {
            rows: RowSet::new(),
            session: EditSession::new(),
            meta: WorkspaceMeta::fallback(&config.review),
            policy: AccessPolicy::for_identity(&identity),
            grant_memo: GrantMemo::new(),
            saving: HashSet::new(),
            notice: None,
            last_report: None,
        };
        Self {
            inner: Arc::new(Inner {
                api,
                identity,
                config,
                reconciler: Reconciler::new(),
                state: Mutex::new(state),
                closed: AtomicBool::new(false),
            }),
        }
    }

    // ---- Accessors ----

    /// Acting identity
    #[inline]
    #[must_use]
    pub fn identity(&self) -> &Identity {
        &self.inner.identity
    }

    /// Configuration
    #[inline]
    #[must_use]
    pub fn config(&self) -> &WorkspaceConfig {
        &self.inner.config
    }

    /// The REST collaborator
    #[inline]
    #[must_use]
    pub fn api(&self) -> &A {
        &self.inner.api
    }

    /// Copy of the rows, in display order
    #[must_use]
    pub fn rows(&self) -> Vec<ApplicationRow> {
        self.inner.state.lock().rows.iter().cloned().collect()
    }

    /// Copy of one row
    #[must_use]
    pub fn row(&self, id: &LocalId) -> Option<ApplicationRow> {
        self.inner.state.lock().rows.get(id).cloned()
    }

    /// Copy of the row with this server id
    #[must_use]
    pub fn find(&self, id: &ServerId) -> Option<ApplicationRow> {
        self.inner.state.lock().rows.find_server(id).cloned()
    }

    /// Current access policy
    #[must_use]
    pub fn policy(&self) -> AccessPolicy {
        self.inner.state.lock().policy.clone()
    }

    /// Current catalogue
    #[must_use]
    pub fn meta(&self) -> WorkspaceMeta {
        self.inner.state.lock().meta.clone()
    }

    /// Latest surfaced error
    #[must_use]
    pub fn notice(&self) -> Option<Notice> {
        self.inner.state.lock().notice.clone()
    }

    /// Dismiss the current notice
    pub fn clear_notice(&self) {
        self.inner.state.lock().notice = None;
    }

    /// Report of the last successful refresh
    #[must_use]
    pub fn last_report(&self) -> Option<ReconcileReport> {
        self.inner.state.lock().last_report.clone()
    }

    /// Row in row-level edit mode
    #[must_use]
    pub fn editing_row(&self) -> Option<LocalId> {
        self.inner.state.lock().session.editing_row().cloned()
    }

    /// Active editor token
    #[must_use]
    pub fn active_editor(&self) -> Option<EditorToken> {
        self.inner.state.lock().session.active_editor().cloned()
    }

    /// Whether `id` has a request in flight
    #[must_use]
    pub fn is_saving(&self, id: &LocalId) -> bool {
        self.inner.state.lock().saving.contains(id)
    }

    /// Whether [`Workspace::close`] has been called
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Stop applying results; every pending and later operation fails with `Closed`
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            tracing::info!("Workspace closed for {}", self.inner.identity.id);
        }
    }

    fn open_state(&self) -> Result<MutexGuard<'_, State>> {
        if self.is_closed() {
            return Err(WorkspaceError::Closed);
        }
        Ok(self.inner.state.lock())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(WorkspaceError::Closed)
        } else {
            Ok(())
        }
    }

    // ---- Fetch ----

    /// Re-fetch every row and merge it with local state
    ///
    /// Clears the current notice first. On failure the rows are kept, the error is surfaced
    /// page-wide and access falls back to the identity's own claims.
    ///
    /// # Errors
    /// `Transport`, `Unauthorized` or `Closed`
    pub async fn refresh(&self) -> Result<ReconcileReport> {
        self.open_state()?.notice = None;
        self.resync().await
    }

    async fn resync(&self) -> Result<ReconcileReport> {
        self.ensure_open()?;
        let fetched = self.inner.api.fetch_applications().await;
        self.ensure_open()?;

        match fetched {
            Ok(list) => Ok(self.apply_fetch(list)),
            Err(e) => {
                let error = WorkspaceError::from_api(None, e);
                self.fetch_failed(&error);
                Err(error)
            }
        }
    }

    fn apply_fetch(&self, list: ListResponse) -> ReconcileReport {
        let ListResponse { items, meta } = list;
        let batch = normalize_rows(items);
        for (index, error) in &batch.rejected {
            tracing::warn!("Skipping application #{}: {}", index, error);
        }

        let identity = &self.inner.identity;
        let mut state = self.inner.state.lock();

        // The merge reads the rows as they are now, not as they were when the fetch started
        let Reconciled { rows, report } = self.inner.reconciler.reconcile(&state.rows, batch.rows);
        for id in &report.dropped_dirty {
            tracing::warn!("Unsaved edits on {} dropped: removed on the server", id);
        }
        state.rows = rows;
        let State { rows, session, .. } = &mut *state;
        session.prune(rows);

        let grant = match &meta.access {
            Some(raw) => state.grant_memo.resolve(raw, identity.profile_access()).0,
            None => {
                state.grant_memo.clear();
                identity.client_grant()
            }
        };
        state.policy = AccessPolicy::new(grant, identity.is_admin())
            .with_capabilities(meta.capabilities.clone());
        state.meta = WorkspaceMeta::from_wire(&meta, &self.inner.config.review);
        state.last_report = Some(report.clone());

        tracing::info!(
            "Refreshed {} applications ({} with local edits, {} drafts)",
            report.fetched,
            report.overlaid,
            report.drafts_kept
        );
        report
    }

    fn fetch_failed(&self, error: &WorkspaceError) {
        tracing::warn!("Failed to load applications: {}", error);
        let mut state = self.inner.state.lock();
        state.surface(error, None);
        state.grant_memo.clear();
        state.policy = AccessPolicy::for_identity(&self.inner.identity);
    }

    /// Fetch one application for a detail view
    ///
    /// The row set is not modified.
    ///
    /// # Errors
    /// `Transport`, `Unauthorized`, `Malformed` or `Closed`
    pub async fn load_detail(&self, id: &ServerId) -> Result<ApplicationRow> {
        self.ensure_open()?;
        let doc = self.inner.api.fetch_application(id).await;
        self.ensure_open()?;
        let doc = doc.map_err(|e| WorkspaceError::from_api(None, e))?;
        Ok(normalize_row(doc)?)
    }

    /// Refresh every `period` until the workspace closes
    ///
    /// The first refresh runs one period after the call. Failures are surfaced as notices and
    /// do not stop the loop.
    pub fn spawn_auto_refresh(&self, period: Duration) -> JoinHandle<()>
    where
        A: 'static,
    {
        let workspace = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if workspace.is_closed() {
                    break;
                }
                match workspace.refresh().await {
                    Ok(_) => {}
                    Err(WorkspaceError::Closed) => break,
                    Err(e) => tracing::debug!("Periodic refresh failed: {}", e),
                }
            }
            tracing::debug!("Periodic refresh stopped");
        })
    }

    // ---- Drafts and edit mode ----

    /// Add an empty draft in edit mode
    ///
    /// The bidder defaults to the acting identity.
    ///
    /// # Errors
    /// `Permission` without `can_manage`, `Closed`
    pub fn begin_draft(&self) -> Result<LocalId> {
        let mut state = self.open_state()?;
        if !state.policy.can_manage() {
            return Err(WorkspaceError::permission(
                "You do not have permission to create applications",
            ));
        }
        let identity = &self.inner.identity;
        let bidder = state
            .meta
            .bidder(&identity.id)
            .cloned()
            .unwrap_or_else(|| identity.as_person());
        let draft = ApplicationRow::draft(ApplicationRecord {
            bidder_id: Some(identity.id.clone()),
            bidder: Some(bidder),
            ..ApplicationRecord::default()
        });
        let State { rows, session, .. } = &mut *state;
        let id = session.begin_draft(rows, draft);
        tracing::debug!("Started draft {}", id);
        Ok(id)
    }

    /// Enter row-level edit mode for an existing row
    ///
    /// # Errors
    /// `Permission`, `RowNotFound`, `Busy`, `Closed`
    pub fn begin_edit_mode(&self, id: &LocalId) -> Result<()> {
        let mut state = self.open_state()?;
        state.ensure_idle(id)?;
        let State {
            rows,
            session,
            policy,
            ..
        } = &mut *state;
        session.begin_edit_mode(rows, id, policy)
    }

    /// Open one field for input
    ///
    /// # Errors
    /// `Permission`, `Validation`, `NothingToEdit`, `RowNotFound`, `Busy`, `Closed`
    pub fn start_editing(&self, id: &LocalId, field: FieldKey) -> Result<()> {
        let mut state = self.open_state()?;
        state.ensure_idle(id)?;
        let State {
            rows,
            session,
            policy,
            ..
        } = &mut *state;
        session.start_editing(rows, id, field, policy)
    }

    /// Close the active editor
    pub fn stop_editing(&self) {
        self.inner.state.lock().session.stop_editing();
    }

    /// Type into the active editor
    ///
    /// # Errors
    /// `NothingToEdit` unless `(id, field)` is the active editor, `Busy`, `Closed`
    pub fn edit_field(&self, id: &LocalId, field: FieldKey, value: &str) -> Result<()> {
        let mut state = self.open_state()?;
        state.ensure_idle(id)?;
        let State {
            rows,
            session,
            meta,
            ..
        } = &mut *state;
        session.edit_field(rows, id, field, value, meta)
    }

    /// Stage a review result or note on a row in review
    ///
    /// Staged values are dirty, survive refreshes and are sent by
    /// [`Workspace::complete_check`].
    ///
    /// # Errors
    /// `Validation` for other fields or outside review, `Permission`, `LockHeld`, `Busy`,
    /// `RowNotFound`, `Closed`
    pub fn stage_review(&self, id: &LocalId, field: FieldKey, value: &str) -> Result<()> {
        if !matches!(field, FieldKey::CheckResult | FieldKey::CheckNote) {
            return Err(WorkspaceError::validation(format!(
                "'{field}' cannot be staged for review"
            )));
        }
        let mut state = self.open_state()?;
        state.ensure_idle(id)?;
        ensure_can_stage_review(state.row(id)?, &state.policy, &self.inner.identity.id)?;

        let row = state
            .rows
            .get_mut(id)
            .ok_or_else(|| WorkspaceError::RowNotFound(id.clone()))?;
        row.record
            .set_text(field, value.to_string())
            .map_err(|e| WorkspaceError::validation(e.to_string()))?;
        row.dirty.mark(field);
        Ok(())
    }

    /// Revert a row and leave edit mode
    ///
    /// Existing rows return to their pre-edit snapshot; drafts are removed.
    ///
    /// # Errors
    /// `RowNotFound`, `Busy`, `Closed`
    pub fn reset(&self, id: &LocalId) -> Result<()> {
        let mut state = self.open_state()?;
        state.ensure_idle(id)?;
        state.row(id)?;
        let State { rows, session, .. } = &mut *state;
        session.reset(rows, id);
        Ok(())
    }

    /// Discard an unsaved draft
    ///
    /// # Errors
    /// `Validation` for persisted rows, `RowNotFound`, `Busy`, `Closed`
    pub fn remove_draft(&self, id: &LocalId) -> Result<()> {
        let mut state = self.open_state()?;
        state.ensure_idle(id)?;
        let State { rows, session, .. } = &mut *state;
        session.remove_draft(rows, id)
    }

    // ---- Mutations ----

    /// Save a row: create a draft or patch the changed fields of an existing row
    ///
    /// On success the row is replaced by the server's copy and edit mode ends. On failure the
    /// error is surfaced on the row and, unless it was local, the rows are re-fetched.
    ///
    /// # Errors
    /// Local: `Validation`, `Permission`, `RowNotFound`, `Busy`.
    /// Remote: `Conflict`, `Transport`, `Unauthorized`, `Malformed`. Also `Closed`.
    pub async fn save(&self, id: &LocalId) -> Result<SaveOutcome> {
        let plan = {
            let mut state = self.open_state()?;
            state.notice = None;
            let planned = state
                .ensure_idle(id)
                .and_then(|()| state.session.plan_save(&state.rows, id, &state.policy));
            // Unchanged returns here without marking the row busy
            match planned {
                Ok(SavePlan::Unchanged) => {
                    tracing::debug!("Nothing to save for {}", id);
                    return Ok(SaveOutcome::Unchanged);
                }
                Ok(plan) => {
                    state.saving.insert(id.clone());
                    plan
                }
                Err(e) => {
                    tracing::debug!("Save of {} rejected: {}", id, e);
                    state.surface(&e, Some(id));
                    return Err(e);
                }
            }
        };

        let (response, created) = match &plan {
            SavePlan::Create(patch) => (self.inner.api.create_application(patch).await, true),
            SavePlan::Update(server_id, patch) => (
                self.inner.api.update_application(server_id, patch).await,
                false,
            ),
            SavePlan::Unchanged => return Ok(SaveOutcome::Unchanged),
        };

        let row = self.settle(id, Mutation::Save, response).await?;
        Ok(if created {
            SaveOutcome::Created(row.local_id)
        } else {
            SaveOutcome::Updated(row.local_id)
        })
    }

    /// Claim a pending row for review
    ///
    /// # Errors
    /// See [`plan_check`]; remote failures as for [`Workspace::save`]
    pub async fn start_check(&self, id: &LocalId) -> Result<ApplicationRow> {
        self.transition(id, CheckAction::Start).await
    }

    /// Record the staged result and note and finish the review
    ///
    /// # Errors
    /// See [`plan_check`]; remote failures as for [`Workspace::save`]
    pub async fn complete_check(&self, id: &LocalId) -> Result<ApplicationRow> {
        self.transition(id, CheckAction::Complete).await
    }

    /// Release a review back to pending
    ///
    /// # Errors
    /// See [`plan_check`]; remote failures as for [`Workspace::save`]
    pub async fn cancel_check(&self, id: &LocalId) -> Result<ApplicationRow> {
        self.transition(id, CheckAction::Cancel).await
    }

    async fn transition(&self, id: &LocalId, action: CheckAction) -> Result<ApplicationRow> {
        let (server_id, body) = {
            let mut state = self.open_state()?;
            state.notice = None;
            match self.plan_transition(&state, id, action) {
                Ok(planned) => {
                    state.saving.insert(id.clone());
                    planned
                }
                Err(e) => {
                    tracing::debug!("{} check on {} rejected: {}", action, id, e);
                    state.surface(&e, Some(id));
                    return Err(e);
                }
            }
        };

        let response = self.inner.api.update_application(&server_id, &body).await;
        self.settle(id, Mutation::Check(action), response).await
    }

    fn plan_transition(
        &self,
        state: &State,
        id: &LocalId,
        action: CheckAction,
    ) -> Result<(ServerId, FieldPatch)> {
        state.ensure_idle(id)?;
        let row = state.row(id)?;
        let ctx = CheckContext {
            policy: &state.policy,
            actor: &self.inner.identity.id,
            review: &self.inner.config.review,
        };
        let patch = plan_check(action, row, ctx)?;
        let server_id = row
            .server_id
            .clone()
            .ok_or_else(|| WorkspaceError::validation("Save the application before reviewing it"))?;
        Ok((server_id, FieldPatch::from(patch)))
    }

    /// Apply a mutation response, or surface its failure and re-fetch
    async fn settle(
        &self,
        id: &LocalId,
        mutation: Mutation,
        response: std::result::Result<Value, ApiError>,
    ) -> Result<ApplicationRow> {
        self.ensure_open()?;
        let outcome = response
            .map_err(|e| WorkspaceError::from_api(Some(id), e))
            .and_then(|doc| normalize_row(doc).map_err(WorkspaceError::from));

        let error = {
            let mut state = self.inner.state.lock();
            state.saving.remove(id);
            match outcome {
                Ok(row) => {
                    if state.rows.replace(id, row.clone()).is_none() {
                        state.rows.push(row.clone());
                    }
                    if matches!(mutation, Mutation::Save) {
                        state.session.exit(id);
                    }
                    tracing::info!(
                        "{} of {} confirmed ({})",
                        mutation,
                        row.local_id,
                        row.record.check_status
                    );
                    return Ok(row);
                }
                Err(e) => {
                    state.surface(&e, Some(id));
                    e
                }
            }
        };

        tracing::warn!("{} of {} failed: {}", mutation, id, error);
        if error.requires_resync() {
            // Keep the mutation's notice: resync, not refresh
            if let Err(resync) = self.resync().await {
                tracing::warn!("Re-fetch after failed {} also failed: {}", mutation, resync);
            }
        }
        Err(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockApplicationsApi;
    use appdesk_row::{CheckStatus, UserId};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn identity(id: &str, permissions: Value) -> Identity {
        Identity::new(id)
            .with_name("Reviewer")
            .with_permissions(json!({ "applications": permissions }))
    }

    fn list(items: Value) -> ListResponse {
        serde_json::from_value(json!({ "items": items })).unwrap()
    }

    fn doc(id: &str, status: &str, checked_by: Option<&str>) -> Value {
        json!({
            "_id": id,
            "company": "Acme",
            "roleTitle": "Engineer",
            "profileId": "p1",
            "checkStatus": status,
            "checkedBy": checked_by.map(|u| json!({"_id": u}))
        })
    }

    fn loaded(mut api: MockApplicationsApi, rows: Value, who: Identity) -> Workspace<MockApplicationsApi> {
        let rows = list(rows);
        api.expect_fetch_applications()
            .times(1)
            .returning(move || Ok(rows.clone()));
        Workspace::new(api, who, WorkspaceConfig::default())
    }

    #[tokio::test]
    async fn refresh_loads_rows_and_client_grant() {
        let workspace = loaded(
            MockApplicationsApi::new(),
            json!([doc("a1", "pending", None), {"company": "no id"}]),
            identity("u1", json!({"checkAll": true})),
        );
        let report = workspace.refresh().await.unwrap();
        assert_eq!(report.fetched, 1);
        assert_eq!(workspace.rows().len(), 1);
        assert!(workspace.policy().can_check());
        assert_eq!(workspace.last_report(), Some(report));
    }

    #[tokio::test]
    async fn lock_held_elsewhere_makes_no_call() {
        // The mock has no update expectation: any call would panic
        let workspace = loaded(
            MockApplicationsApi::new(),
            json!([doc("a1", "in_review", Some("u1"))]),
            identity("u2", json!({"checkAll": true})),
        );
        workspace.refresh().await.unwrap();
        let id = LocalId::from("a1");

        let err = workspace.cancel_check(&id).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::LockHeld { .. }));
        let notice = workspace.notice().unwrap();
        assert_eq!(notice.scope, NoticeScope::Row(id.clone()));
        assert_eq!(notice.kind, ErrorKind::Conflict);
        assert!(!workspace.is_saving(&id));
    }

    #[tokio::test]
    async fn complete_gate_makes_no_call() {
        let workspace = loaded(
            MockApplicationsApi::new(),
            json!([doc("a1", "in_review", Some("u1"))]),
            identity("u1", json!({"checkAll": true})),
        );
        workspace.refresh().await.unwrap();
        let id = LocalId::from("a1");

        let err = workspace.complete_check(&id).await.unwrap_err();
        assert_eq!(err.to_string(), "Select a check result before saving");

        workspace.stage_review(&id, FieldKey::CheckResult, "bad").unwrap();
        let err = workspace.complete_check(&id).await.unwrap_err();
        assert_eq!(err.to_string(), "Check note is required before saving");
    }

    #[tokio::test]
    async fn start_check_applies_server_row() {
        let mut api = MockApplicationsApi::new();
        api.expect_update_application()
            .withf(|id, patch| {
                id.as_str() == "a1" && patch.to_json() == json!({"checkStatus": "in_review"})
            })
            .times(1)
            .returning(|_, _| Ok(doc("a1", "in_review", Some("u1"))));
        let workspace = loaded(
            api,
            json!([doc("a1", "pending", None)]),
            identity("u1", json!({"checkProfiles": ["p1"]})),
        );
        workspace.refresh().await.unwrap();

        let row = workspace.start_check(&LocalId::from("a1")).await.unwrap();
        assert_eq!(row.record.check_status, CheckStatus::InReview);
        assert_eq!(
            row.record.checked_by.as_ref().map(|p| p.id.clone()),
            Some(UserId::new("u1"))
        );
        assert!(!row.is_dirty());
    }

    #[tokio::test]
    async fn conflict_surfaces_on_row_and_resyncs() {
        let mut api = MockApplicationsApi::new();
        api.expect_update_application()
            .times(1)
            .returning(|_, _| Err(ApiError::status(409, "Already in review")));
        let stale = list(json!([doc("a1", "pending", None)]));
        let fresh = list(json!([doc("a1", "in_review", Some("u9"))]));
        let mut seq = mockall::Sequence::new();
        api.expect_fetch_applications()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || Ok(stale.clone()));
        api.expect_fetch_applications()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || Ok(fresh.clone()));
        let workspace = Workspace::new(
            api,
            identity("u1", json!({"checkAll": true})),
            WorkspaceConfig::default(),
        );
        workspace.refresh().await.unwrap();
        let id = LocalId::from("a1");

        let err = workspace.start_check(&id).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::Conflict { .. }));
        assert_eq!(
            workspace.row(&id).unwrap().record.check_status,
            CheckStatus::InReview
        );
        let notice = workspace.notice().unwrap();
        assert_eq!(notice.message, "Already in review");
        assert_eq!(notice.scope, NoticeScope::Row(id));
    }

    #[tokio::test]
    async fn unauthorized_does_not_resync() {
        let mut api = MockApplicationsApi::new();
        api.expect_update_application()
            .times(1)
            .returning(|_, _| Err(ApiError::Unauthorized));
        let workspace = loaded(
            api,
            json!([doc("a1", "pending", None)]),
            identity("u1", json!({"checkAll": true})),
        );
        workspace.refresh().await.unwrap();
        let err = workspace.start_check(&LocalId::from("a1")).await.unwrap_err();
        assert!(matches!(err, WorkspaceError::Unauthorized));
    }

    #[tokio::test]
    async fn fetch_failure_keeps_rows_and_reverts_access() {
        let mut api = MockApplicationsApi::new();
        let first: ListResponse = serde_json::from_value(json!({
            "items": [doc("a1", "pending", None)],
            "meta": {"access": {"checkAll": true}, "capabilities": {"canAssignOtherBidders": true}}
        }))
        .unwrap();
        let mut seq = mockall::Sequence::new();
        api.expect_fetch_applications()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move || Ok(first.clone()));
        api.expect_fetch_applications()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(ApiError::Transport("connection refused".into())));
        let workspace = Workspace::new(api, identity("u1", json!(null)), WorkspaceConfig::default());

        assert!(!workspace.policy().can_check());
        workspace.refresh().await.unwrap();
        assert!(workspace.policy().can_check());
        assert!(workspace.policy().can_assign_other_bidders());

        assert!(workspace.refresh().await.is_err());
        assert_eq!(workspace.rows().len(), 1);
        assert!(!workspace.policy().can_check());
        assert!(!workspace.policy().can_assign_other_bidders());
        assert_eq!(workspace.notice().unwrap().scope, NoticeScope::Page);
    }

    #[tokio::test]
    async fn unchanged_save_sends_nothing() {
        let workspace = loaded(
            MockApplicationsApi::new(),
            json!([doc("a1", "pending", None)]),
            identity("u1", json!("all")),
        );
        workspace.refresh().await.unwrap();
        let id = LocalId::from("a1");
        workspace.begin_edit_mode(&id).unwrap();
        workspace.start_editing(&id, FieldKey::Company).unwrap();
        workspace.edit_field(&id, FieldKey::Company, "Acme").unwrap();

        assert_eq!(workspace.save(&id).await.unwrap(), SaveOutcome::Unchanged);
        assert_eq!(workspace.editing_row(), Some(id));
    }

    #[tokio::test]
    async fn draft_without_manage_is_refused() {
        let workspace = Workspace::new(
            MockApplicationsApi::new(),
            identity("u1", json!(null)),
            WorkspaceConfig::default(),
        );
        assert!(matches!(
            workspace.begin_draft(),
            Err(WorkspaceError::Permission(_))
        ));
    }

    #[tokio::test]
    async fn closed_workspace_rejects_everything() {
        let workspace = Workspace::new(
            MockApplicationsApi::new(),
            identity("u1", json!("all")),
            WorkspaceConfig::default(),
        );
        workspace.close();
        assert!(workspace.is_closed());
        assert!(matches!(workspace.refresh().await, Err(WorkspaceError::Closed)));
        assert!(matches!(workspace.begin_draft(), Err(WorkspaceError::Closed)));
    }
}
