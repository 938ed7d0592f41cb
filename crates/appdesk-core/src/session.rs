//! Draft and edit bookkeeping
//!
//! [`EditSession`] owns the answer to "what is being edited right now":
//! - at most one row in row-level edit mode
//! - at most one active editor, a `(row, field)` token every field edit must match
//! - a snapshot per existing row, taken when it first enters edit mode, used by reset
//!
//! It never talks to the server. The workspace calls into it while holding its state lock
//! and performs the network half itself.

use crate::error::WorkspaceError;
use crate::meta::WorkspaceMeta;
use appdesk_access::AccessPolicy;
use appdesk_row::{
    ApplicationRow, FieldKey, FieldPatch, LocalId, ProfileId, ResumeId, RowSet, ServerId, UserId,
};
use std::collections::HashMap;

/// The single field currently open for input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorToken {
    /// Row being edited
    pub row: LocalId,
    /// Field being edited
    pub field: FieldKey,
}

/// What a save has to send
#[derive(Debug, Clone, PartialEq)]
pub enum SavePlan {
    /// `POST` a new row
    Create(FieldPatch),
    /// `PATCH` the changed fields of an existing row
    Update(ServerId, FieldPatch),
    /// Nothing differs from the server state
    Unchanged,
}

/// Edit-mode state for the workspace
#[derive(Debug, Clone, Default)]
pub struct EditSession {
    editing_row: Option<LocalId>,
    active: Option<EditorToken>,
    snapshots: HashMap<LocalId, ApplicationRow>,
}

fn require_manage(policy: &AccessPolicy) -> Result<(), WorkspaceError> {
    if policy.can_manage() {
        Ok(())
    } else {
        Err(WorkspaceError::permission(
            "You do not have permission to edit applications",
        ))
    }
}

fn optional_id(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

impl EditSession {
    /// Empty session
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Row in row-level edit mode
    #[inline]
    #[must_use]
    pub fn editing_row(&self) -> Option<&LocalId> {
        self.editing_row.as_ref()
    }

    /// Active editor token
    #[inline]
    #[must_use]
    pub fn active_editor(&self) -> Option<&EditorToken> {
        self.active.as_ref()
    }

    /// Whether a revert snapshot is held for `id`
    #[inline]
    #[must_use]
    pub fn has_snapshot(&self, id: &LocalId) -> bool {
        self.snapshots.contains_key(id)
    }

    /// Add a draft and put it in edit mode, with no field open yet
    pub fn begin_draft(&mut self, rows: &mut RowSet, draft: ApplicationRow) -> LocalId {
        let id = draft.local_id.clone();
        rows.push(draft);
        self.editing_row = Some(id.clone());
        self.active = None;
        id
    }

    /// Enter row-level edit mode
    ///
    /// The first entry for an existing row snapshots it for reset; later entries keep the
    /// original snapshot.
    ///
    /// # Errors
    /// [`WorkspaceError::Permission`] without `can_manage`, [`WorkspaceError::RowNotFound`]
    pub fn begin_edit_mode(
        &mut self,
        rows: &RowSet,
        id: &LocalId,
        policy: &AccessPolicy,
    ) -> Result<(), WorkspaceError> {
        require_manage(policy)?;
        let row = rows
            .get(id)
            .ok_or_else(|| WorkspaceError::RowNotFound(id.clone()))?;
        if !row.is_new && !self.snapshots.contains_key(id) {
            self.snapshots.insert(id.clone(), row.clone());
        }
        self.editing_row = Some(id.clone());
        self.active = None;
        Ok(())
    }

    /// Open `field` of `id` for input
    ///
    /// New rows enter edit mode implicitly. Existing rows must already be in edit mode.
    ///
    /// # Errors
    /// - [`WorkspaceError::RowNotFound`]
    /// - [`WorkspaceError::Validation`] for review and server-assigned fields
    /// - [`WorkspaceError::Permission`] without `can_manage`, or for the bidder field without
    ///   `can_assign_other_bidders`
    /// - [`WorkspaceError::NothingToEdit`] if an existing row is not in edit mode
    pub fn start_editing(
        &mut self,
        rows: &RowSet,
        id: &LocalId,
        field: FieldKey,
        policy: &AccessPolicy,
    ) -> Result<(), WorkspaceError> {
        let row = rows
            .get(id)
            .ok_or_else(|| WorkspaceError::RowNotFound(id.clone()))?;
        if field.is_review() {
            return Err(WorkspaceError::validation(
                "Review fields are edited through the review workflow",
            ));
        }
        require_manage(policy)?;
        if field == FieldKey::BidderId && !policy.can_assign_other_bidders() {
            return Err(WorkspaceError::permission(
                "You cannot assign applications to other bidders",
            ));
        }

        if row.is_new {
            self.editing_row = Some(id.clone());
        } else if self.editing_row.as_ref() != Some(id) {
            return Err(WorkspaceError::NothingToEdit(id.clone()));
        }
        self.active = Some(EditorToken {
            row: id.clone(),
            field,
        });
        Ok(())
    }

    /// Close the active editor, keeping edit mode
    pub fn stop_editing(&mut self) {
        self.active = None;
    }

    /// Apply typed input to the active editor's field
    ///
    /// Relation fields take an id (empty clears) and refresh their denormalized summary
    /// from `meta`. Changing the profile also clears the resume.
    ///
    /// # Errors
    /// [`WorkspaceError::NothingToEdit`] unless `(id, field)` is the active editor,
    /// [`WorkspaceError::RowNotFound`]
    pub fn edit_field(
        &mut self,
        rows: &mut RowSet,
        id: &LocalId,
        field: FieldKey,
        value: &str,
        meta: &WorkspaceMeta,
    ) -> Result<(), WorkspaceError> {
        let token = EditorToken {
            row: id.clone(),
            field,
        };
        if self.active.as_ref() != Some(&token) {
            return Err(WorkspaceError::NothingToEdit(id.clone()));
        }
        let row = rows
            .get_mut(id)
            .ok_or_else(|| WorkspaceError::RowNotFound(id.clone()))?;
        let record = &mut row.record;

        match field {
            FieldKey::ProfileId => {
                let profile = optional_id(value).map(ProfileId::new);
                record.profile = profile.as_ref().and_then(|p| meta.profile(p)).cloned();
                record.profile_id = profile;
                record.resume_id = None;
                record.resume = None;
                row.dirty.mark(FieldKey::ResumeId);
            }
            FieldKey::ResumeId => {
                let resume = optional_id(value).map(ResumeId::new);
                record.resume = resume.as_ref().and_then(|r| meta.resume(r)).cloned();
                record.resume_id = resume;
            }
            FieldKey::BidderId => {
                let bidder = optional_id(value).map(UserId::new);
                record.bidder = bidder.as_ref().and_then(|b| meta.bidder(b)).cloned();
                record.bidder_id = bidder;
            }
            other => record
                .set_text(other, value.to_string())
                .map_err(|e| WorkspaceError::validation(e.to_string()))?,
        }
        row.dirty.mark(field);
        Ok(())
    }

    /// Work out what saving `id` would send
    ///
    /// # Errors
    /// - [`WorkspaceError::RowNotFound`]
    /// - [`WorkspaceError::Permission`] without `can_manage`
    /// - [`WorkspaceError::Validation`] for a new row missing company, role title or profile
    pub fn plan_save(
        &self,
        rows: &RowSet,
        id: &LocalId,
        policy: &AccessPolicy,
    ) -> Result<SavePlan, WorkspaceError> {
        let row = rows
            .get(id)
            .ok_or_else(|| WorkspaceError::RowNotFound(id.clone()))?;
        require_manage(policy)?;

        match &row.server_id {
            None => {
                let record = &row.record;
                if record.company.trim().is_empty()
                    || record.role_title.trim().is_empty()
                    || record.profile_id.is_none()
                {
                    return Err(WorkspaceError::validation(
                        "Company, position and profile are required",
                    ));
                }
                Ok(SavePlan::Create(FieldPatch::from_record(
                    record,
                    FieldKey::EDITABLE,
                )))
            }
            Some(server_id) => {
                let changed = row.changed_content_fields();
                if changed.is_empty() {
                    return Ok(SavePlan::Unchanged);
                }
                Ok(SavePlan::Update(
                    server_id.clone(),
                    FieldPatch::from_record(&row.record, changed),
                ))
            }
        }
    }

    /// Revert `id` and leave edit mode
    ///
    /// Existing rows get their snapshot's content fields back with those edits forgotten;
    /// drafts are removed. Review fields keep their current value, including staged ones,
    /// since only the check workflow moves them.
    pub fn reset(&mut self, rows: &mut RowSet, id: &LocalId) {
        let Some(current) = rows.get(id) else {
            self.exit(id);
            return;
        };
        if current.is_new {
            rows.remove(id);
        } else if let Some(mut snapshot) = self.snapshots.remove(id) {
            for key in FieldKey::REVIEW {
                snapshot.record.copy_field_from(&current.record, key);
            }
            snapshot.dirty = current.dirty.iter().filter(|key| key.is_review()).collect();
            rows.replace(id, snapshot);
        }
        self.exit(id);
    }

    /// Drop a draft that was never saved
    ///
    /// # Errors
    /// [`WorkspaceError::Validation`] if the row has been persisted
    pub fn remove_draft(&mut self, rows: &mut RowSet, id: &LocalId) -> Result<(), WorkspaceError> {
        match rows.get(id) {
            None => return Err(WorkspaceError::RowNotFound(id.clone())),
            Some(row) if !row.is_new => {
                return Err(WorkspaceError::validation(
                    "Only unsaved applications can be removed",
                ))
            }
            Some(_) => {}
        }
        rows.remove(id);
        self.exit(id);
        Ok(())
    }

    /// Leave edit mode for `id` and forget its snapshot
    pub fn exit(&mut self, id: &LocalId) {
        if self.active.as_ref().is_some_and(|token| &token.row == id) {
            self.active = None;
        }
        if self.editing_row.as_ref() == Some(id) {
            self.editing_row = None;
        }
        self.snapshots.remove(id);
    }

    /// Discard state for rows no longer in `rows`
    pub fn prune(&mut self, rows: &RowSet) {
        self.snapshots.retain(|id, _| rows.contains(id));
        if self.editing_row.as_ref().is_some_and(|id| !rows.contains(id)) {
            self.editing_row = None;
        }
        if self.active.as_ref().is_some_and(|token| !rows.contains(&token.row)) {
            self.active = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReviewConfig;
    use crate::meta::WireMeta;
    use appdesk_access::{AccessGrant, Capabilities};
    use appdesk_row::{ApplicationRecord, CheckStatus, PersonSummary};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn manager() -> AccessPolicy {
        AccessPolicy::new(AccessGrant::manage_everything(), false)
    }

    fn scoped() -> AccessPolicy {
        AccessPolicy::new(
            AccessGrant {
                manage_scoped: [ProfileId::new("p1")].into_iter().collect(),
                ..AccessGrant::none()
            },
            false,
        )
    }

    fn meta() -> WorkspaceMeta {
        let wire: WireMeta = serde_json::from_value(json!({
            "profiles": [{"_id": "p1", "alias": "PJ"}, {"_id": "p2", "alias": "QK"}],
            "bidders": [{"_id": "u1", "name": "Bea"}, {"_id": "u2", "name": "Bo"}],
            "resumesByProfile": {"p1": [{"_id": "r1", "title": "Backend"}]}
        }))
        .unwrap();
        WorkspaceMeta::from_wire(&wire, &ReviewConfig::default())
    }

    fn existing() -> ApplicationRow {
        ApplicationRow::persisted(
            ServerId::new("a1"),
            ApplicationRecord {
                company: "Acme".to_string(),
                role_title: "Engineer".to_string(),
                profile_id: Some(ProfileId::new("p1")),
                resume_id: Some(ResumeId::new("r1")),
                ..ApplicationRecord::default()
            },
        )
    }

    fn setup() -> (EditSession, RowSet, LocalId) {
        let row = existing();
        let id = row.local_id.clone();
        (EditSession::new(), vec![row].into(), id)
    }

    #[test]
    fn existing_row_needs_edit_mode_first() {
        let (mut session, rows, id) = setup();
        assert!(matches!(
            session.start_editing(&rows, &id, FieldKey::Company, &manager()),
            Err(WorkspaceError::NothingToEdit(_))
        ));

        session.begin_edit_mode(&rows, &id, &manager()).unwrap();
        assert!(session.has_snapshot(&id));
        session
            .start_editing(&rows, &id, FieldKey::Company, &manager())
            .unwrap();
        assert_eq!(
            session.active_editor(),
            Some(&EditorToken {
                row: id.clone(),
                field: FieldKey::Company
            })
        );
    }

    #[test]
    fn edit_mode_requires_manage() {
        let (mut session, rows, id) = setup();
        let none = AccessPolicy::new(AccessGrant::none(), false);
        assert!(matches!(
            session.begin_edit_mode(&rows, &id, &none),
            Err(WorkspaceError::Permission(_))
        ));
        assert!(session.editing_row().is_none());
    }

    #[test]
    fn snapshot_taken_once() {
        let (mut session, mut rows, id) = setup();
        session.begin_edit_mode(&rows, &id, &manager()).unwrap();
        session
            .start_editing(&rows, &id, FieldKey::Company, &manager())
            .unwrap();
        session
            .edit_field(&mut rows, &id, FieldKey::Company, "Globex", &meta())
            .unwrap();

        // Re-entering edit mode keeps the first snapshot
        session.begin_edit_mode(&rows, &id, &manager()).unwrap();
        session.reset(&mut rows, &id);

        let restored = rows.get(&id).unwrap();
        assert_eq!(restored.record.company, "Acme");
        assert!(!restored.is_dirty());
        assert!(session.editing_row().is_none());
        assert!(!session.has_snapshot(&id));
    }

    #[test]
    fn reset_keeps_review_fields_confirmed_after_the_snapshot() {
        let (mut session, mut rows, id) = setup();
        session.begin_edit_mode(&rows, &id, &manager()).unwrap();

        let mut confirmed = rows.get(&id).unwrap().clone();
        confirmed.record.company = "Server Co".to_string();
        confirmed.record.check_status = CheckStatus::InReview;
        confirmed.record.checked_by = Some(PersonSummary {
            id: UserId::new("u1"),
            name: None,
        });
        rows.replace(&id, confirmed);
        session.reset(&mut rows, &id);

        let restored = rows.get(&id).unwrap();
        assert_eq!(restored.record.company, "Acme");
        assert_eq!(restored.record.check_status, CheckStatus::InReview);
        assert_eq!(
            restored.record.checked_by.as_ref().map(|p| p.id.clone()),
            Some(UserId::new("u1"))
        );
        assert!(!restored.is_dirty());
    }

    #[test]
    fn edits_need_the_active_token() {
        let (mut session, mut rows, id) = setup();
        session.begin_edit_mode(&rows, &id, &manager()).unwrap();
        session
            .start_editing(&rows, &id, FieldKey::Company, &manager())
            .unwrap();
        assert!(matches!(
            session.edit_field(&mut rows, &id, FieldKey::RoleTitle, "x", &meta()),
            Err(WorkspaceError::NothingToEdit(_))
        ));
        session.stop_editing();
        assert!(session
            .edit_field(&mut rows, &id, FieldKey::Company, "x", &meta())
            .is_err());
    }

    #[test]
    fn profile_change_clears_resume() {
        let (mut session, mut rows, id) = setup();
        session.begin_edit_mode(&rows, &id, &manager()).unwrap();
        session
            .start_editing(&rows, &id, FieldKey::ProfileId, &manager())
            .unwrap();
        session
            .edit_field(&mut rows, &id, FieldKey::ProfileId, "p2", &meta())
            .unwrap();

        let row = rows.get(&id).unwrap();
        assert_eq!(row.record.profile.as_ref().unwrap().display_name(), "QK");
        assert!(row.record.resume_id.is_none());
        assert!(row.dirty.contains(FieldKey::ProfileId));
        assert!(row.dirty.contains(FieldKey::ResumeId));
    }

    #[test]
    fn resume_and_bidder_refresh_summaries() {
        let (mut session, mut rows, id) = setup();
        session.begin_edit_mode(&rows, &id, &manager()).unwrap();
        session
            .start_editing(&rows, &id, FieldKey::ResumeId, &manager())
            .unwrap();
        session
            .edit_field(&mut rows, &id, FieldKey::ResumeId, "r1", &meta())
            .unwrap();
        assert_eq!(
            rows.get(&id).unwrap().record.resume.as_ref().unwrap().title.as_deref(),
            Some("Backend")
        );

        session
            .start_editing(&rows, &id, FieldKey::BidderId, &manager())
            .unwrap();
        session
            .edit_field(&mut rows, &id, FieldKey::BidderId, "u2", &meta())
            .unwrap();
        let row = rows.get(&id).unwrap();
        assert_eq!(row.record.bidder_id, Some(UserId::new("u2")));
        assert_eq!(row.record.bidder.as_ref().unwrap().name.as_deref(), Some("Bo"));
    }

    #[test]
    fn bidder_field_needs_assign_capability() {
        let (mut session, rows, id) = setup();
        session.begin_edit_mode(&rows, &id, &scoped()).unwrap();
        assert!(matches!(
            session.start_editing(&rows, &id, FieldKey::BidderId, &scoped()),
            Err(WorkspaceError::Permission(_))
        ));

        let allowed = scoped().with_capabilities(Capabilities {
            can_assign_other_bidders: Some(true),
        });
        assert!(session
            .start_editing(&rows, &id, FieldKey::BidderId, &allowed)
            .is_ok());
    }

    #[test]
    fn review_fields_are_not_session_editable() {
        let (mut session, rows, id) = setup();
        session.begin_edit_mode(&rows, &id, &manager()).unwrap();
        assert!(matches!(
            session.start_editing(&rows, &id, FieldKey::CheckNote, &manager()),
            Err(WorkspaceError::Validation(_))
        ));
    }

    #[test]
    fn draft_flow() {
        let mut session = EditSession::new();
        let mut rows = RowSet::new();
        let id = session.begin_draft(&mut rows, ApplicationRow::draft(ApplicationRecord::default()));
        assert_eq!(session.editing_row(), Some(&id));
        assert!(session.active_editor().is_none());

        assert!(matches!(
            session.plan_save(&rows, &id, &manager()),
            Err(WorkspaceError::Validation(_))
        ));

        for (field, value) in [
            (FieldKey::Company, "Acme"),
            (FieldKey::RoleTitle, "Engineer"),
            (FieldKey::ProfileId, "p1"),
        ] {
            session.start_editing(&rows, &id, field, &manager()).unwrap();
            session.edit_field(&mut rows, &id, field, value, &meta()).unwrap();
        }
        let SavePlan::Create(patch) = session.plan_save(&rows, &id, &manager()).unwrap() else {
            panic!("expected a create plan");
        };
        assert_eq!(patch.len(), FieldKey::EDITABLE.len());
        assert_eq!(patch.get(FieldKey::ProfileId), Some(&json!("p1")));
        assert_eq!(patch.get(FieldKey::ResumeId), Some(&json!(null)));

        session.reset(&mut rows, &id);
        assert!(rows.is_empty());
        assert!(session.editing_row().is_none());
    }

    #[test]
    fn blank_company_blocks_create() {
        let mut session = EditSession::new();
        let mut rows = RowSet::new();
        let mut draft = ApplicationRow::draft(ApplicationRecord::default());
        draft.record.company = "   ".to_string();
        draft.record.role_title = "Engineer".to_string();
        draft.record.profile_id = Some(ProfileId::new("p1"));
        let id = session.begin_draft(&mut rows, draft);
        assert!(session.plan_save(&rows, &id, &manager()).is_err());
    }

    #[test]
    fn update_sends_only_changed_content() {
        let (mut session, mut rows, id) = setup();
        session.begin_edit_mode(&rows, &id, &manager()).unwrap();
        session
            .start_editing(&rows, &id, FieldKey::Company, &manager())
            .unwrap();
        session
            .edit_field(&mut rows, &id, FieldKey::Company, "Acme", &meta())
            .unwrap();
        assert_eq!(
            session.plan_save(&rows, &id, &manager()).unwrap(),
            SavePlan::Unchanged
        );

        session
            .edit_field(&mut rows, &id, FieldKey::Company, "Globex", &meta())
            .unwrap();
        rows.get_mut(&id).unwrap().dirty.mark(FieldKey::CheckNote);
        match session.plan_save(&rows, &id, &manager()).unwrap() {
            SavePlan::Update(server_id, patch) => {
                assert_eq!(server_id, ServerId::new("a1"));
                assert_eq!(patch.to_json(), json!({"company": "Globex"}));
            }
            other => panic!("unexpected plan {other:?}"),
        }
    }

    #[test]
    fn remove_draft_only_for_unsaved_rows() {
        let (mut session, mut rows, id) = setup();
        assert!(session.remove_draft(&mut rows, &id).is_err());
        let draft = session.begin_draft(&mut rows, ApplicationRow::draft(ApplicationRecord::default()));
        session.remove_draft(&mut rows, &draft).unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[test]
    fn prune_forgets_missing_rows() {
        let (mut session, rows, id) = setup();
        session.begin_edit_mode(&rows, &id, &manager()).unwrap();
        session.prune(&RowSet::new());
        assert!(session.editing_row().is_none());
        assert!(!session.has_snapshot(&id));
    }
}
