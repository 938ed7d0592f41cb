//! Canonical application rows
//!
//! An [`ApplicationRow`] wraps the field data ([`ApplicationRecord`]) with the bookkeeping
//! the workspace needs: identity, the dirty set and the last known server state.
//!
//! # Invariants
//! - `is_new` implies `server_id` is `None`
//! - `dirty` is empty right after a server response has been applied

use crate::field::{DirtyFields, FieldKey};
use crate::ids::{document_key, LocalId, MissingKey, ProfileId, ResumeId, ServerId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Review lifecycle state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckStatus {
    /// Not yet picked up by a checker
    #[default]
    Pending,
    /// Claimed by a checker
    InReview,
    /// Verdict recorded
    Reviewed,
}

impl CheckStatus {
    /// All states, in lifecycle order
    pub const ALL: [CheckStatus; 3] = [
        CheckStatus::Pending,
        CheckStatus::InReview,
        CheckStatus::Reviewed,
    ];

    /// Wire name
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CheckStatus::Pending => "pending",
            CheckStatus::InReview => "in_review",
            CheckStatus::Reviewed => "reviewed",
        }
    }

    /// Display label ("In Review")
    #[must_use]
    pub fn label(self) -> String {
        title_case(self.as_str())
    }
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a check status
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown check status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for CheckStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .iter()
            .copied()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

/// Review verdict
///
/// The set of verdicts is server-supplied, so this is an open string rather than an enum.
/// Only the `pending` sentinel has meaning to the client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckResult(String);

impl CheckResult {
    /// Sentinel for "no verdict chosen"
    pub const PENDING: &'static str = "pending";

    /// Wrap a verdict value
    #[inline]
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The pending sentinel
    #[inline]
    #[must_use]
    pub fn pending() -> Self {
        Self(Self::PENDING.to_string())
    }

    /// Whether no verdict has been chosen
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.0.is_empty() || self.0 == Self::PENDING
    }

    /// Raw value
    #[inline]
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Display label ("OK", "Not Perfect")
    #[must_use]
    pub fn label(&self) -> String {
        if self.0 == "ok" {
            "OK".to_string()
        } else {
            title_case(&self.0)
        }
    }
}

impl Default for CheckResult {
    fn default() -> Self {
        Self::pending()
    }
}

impl fmt::Display for CheckResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn title_case(raw: &str) -> String {
    raw.split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Denormalized profile shown next to a profile reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "WireProfileSummary")]
pub struct ProfileSummary {
    /// Profile id
    #[serde(rename = "_id")]
    pub id: ProfileId,
    /// Short alias
    pub alias: Option<String>,
    /// Person behind the profile
    pub person_name: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireProfileSummary {
    #[serde(rename = "_id", default)]
    primary_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    alias: Option<String>,
    #[serde(default)]
    person_name: Option<String>,
}

impl TryFrom<WireProfileSummary> for ProfileSummary {
    type Error = MissingKey;

    fn try_from(wire: WireProfileSummary) -> Result<Self, MissingKey> {
        Ok(Self {
            id: ProfileId::new(document_key(wire.primary_id, wire.id).ok_or(MissingKey)?),
            alias: wire.alias,
            person_name: wire.person_name,
        })
    }
}

impl ProfileSummary {
    /// Best display name
    #[must_use]
    pub fn display_name(&self) -> &str {
        self.alias
            .as_deref()
            .or(self.person_name.as_deref())
            .unwrap_or("Unnamed")
    }
}

/// Denormalized resume shown next to a resume reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireResumeSummary")]
pub struct ResumeSummary {
    /// Resume id
    #[serde(rename = "_id")]
    pub id: ResumeId,
    /// Title
    pub title: Option<String>,
    /// Optional note
    pub note: Option<String>,
}

#[derive(Deserialize)]
struct WireResumeSummary {
    #[serde(rename = "_id", default)]
    primary_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    note: Option<String>,
}

impl TryFrom<WireResumeSummary> for ResumeSummary {
    type Error = MissingKey;

    fn try_from(wire: WireResumeSummary) -> Result<Self, MissingKey> {
        Ok(Self {
            id: ResumeId::new(document_key(wire.primary_id, wire.id).ok_or(MissingKey)?),
            title: wire.title,
            note: wire.note,
        })
    }
}

/// Denormalized user (bidder or checker)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WirePersonSummary")]
pub struct PersonSummary {
    /// User id
    #[serde(rename = "_id")]
    pub id: UserId,
    /// Display name
    pub name: Option<String>,
}

#[derive(Deserialize)]
struct WirePersonSummary {
    #[serde(rename = "_id", default)]
    primary_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

impl TryFrom<WirePersonSummary> for PersonSummary {
    type Error = MissingKey;

    fn try_from(wire: WirePersonSummary) -> Result<Self, MissingKey> {
        Ok(Self {
            id: UserId::new(document_key(wire.primary_id, wire.id).ok_or(MissingKey)?),
            name: wire.name,
        })
    }
}

/// Field data of an application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationRecord {
    /// Company name
    pub company: String,
    /// Role title
    pub role_title: String,
    /// Job posting URL
    pub job_url: String,
    /// Bidder note
    pub bidder_note: String,
    /// Profile reference
    pub profile_id: Option<ProfileId>,
    /// Profile summary (companion of `profile_id`)
    pub profile: Option<ProfileSummary>,
    /// Resume reference
    pub resume_id: Option<ResumeId>,
    /// Resume summary (companion of `resume_id`)
    pub resume: Option<ResumeSummary>,
    /// Bidder reference
    pub bidder_id: Option<UserId>,
    /// Bidder summary (companion of `bidder_id`)
    pub bidder: Option<PersonSummary>,
    /// Review state
    pub check_status: CheckStatus,
    /// Review verdict
    pub check_result: CheckResult,
    /// Review note
    pub check_note: String,
    /// Review lock holder / reviewer
    pub checked_by: Option<PersonSummary>,
    /// Review completion time
    pub checked_at: Option<DateTime<Utc>>,
    /// Server creation time
    pub created_at: Option<DateTime<Utc>>,
    /// Server update time
    pub updated_at: Option<DateTime<Utc>>,
    /// Application time (falls back to creation time)
    pub applied_at: Option<DateTime<Utc>>,
}

impl ApplicationRecord {
    /// JSON value of a field, as it would travel in a patch
    ///
    /// Empty relations serialize as `null`.
    #[must_use]
    pub fn field_value(&self, key: FieldKey) -> Value {
        fn opt<T: ToString>(value: Option<&T>) -> Value {
            value.map_or(Value::Null, |v| Value::String(v.to_string()))
        }

        match key {
            FieldKey::Company => Value::String(self.company.clone()),
            FieldKey::RoleTitle => Value::String(self.role_title.clone()),
            FieldKey::JobUrl => Value::String(self.job_url.clone()),
            FieldKey::BidderNote => Value::String(self.bidder_note.clone()),
            FieldKey::ProfileId => opt(self.profile_id.as_ref()),
            FieldKey::ResumeId => opt(self.resume_id.as_ref()),
            FieldKey::BidderId => opt(self.bidder_id.as_ref()),
            FieldKey::CheckStatus => Value::String(self.check_status.as_str().to_string()),
            FieldKey::CheckResult => Value::String(self.check_result.as_str().to_string()),
            FieldKey::CheckNote => Value::String(self.check_note.clone()),
            FieldKey::CheckedBy => opt(self.checked_by.as_ref().map(|p| &p.id)),
            FieldKey::CheckedAt => self
                .checked_at
                .map_or(Value::Null, |at| Value::String(at.to_rfc3339())),
        }
    }

    /// Copy one field's value from `other`
    ///
    /// Only the named field moves; denormalized companions are the caller's concern.
    pub fn copy_field_from(&mut self, other: &ApplicationRecord, key: FieldKey) {
        match key {
            FieldKey::Company => self.company.clone_from(&other.company),
            FieldKey::RoleTitle => self.role_title.clone_from(&other.role_title),
            FieldKey::JobUrl => self.job_url.clone_from(&other.job_url),
            FieldKey::BidderNote => self.bidder_note.clone_from(&other.bidder_note),
            FieldKey::ProfileId => self.profile_id.clone_from(&other.profile_id),
            FieldKey::ResumeId => self.resume_id.clone_from(&other.resume_id),
            FieldKey::BidderId => self.bidder_id.clone_from(&other.bidder_id),
            FieldKey::CheckStatus => self.check_status = other.check_status,
            FieldKey::CheckResult => self.check_result.clone_from(&other.check_result),
            FieldKey::CheckNote => self.check_note.clone_from(&other.check_note),
            FieldKey::CheckedBy => self.checked_by.clone_from(&other.checked_by),
            FieldKey::CheckedAt => self.checked_at = other.checked_at,
        }
    }

    /// Set a free-text field
    ///
    /// # Errors
    /// [`RowError::NotText`] for relation and server-assigned fields
    pub fn set_text(&mut self, key: FieldKey, value: String) -> Result<(), RowError> {
        match key {
            FieldKey::Company => self.company = value,
            FieldKey::RoleTitle => self.role_title = value,
            FieldKey::JobUrl => self.job_url = value,
            FieldKey::BidderNote => self.bidder_note = value,
            FieldKey::CheckNote => self.check_note = value,
            FieldKey::CheckResult => self.check_result = CheckResult::new(value),
            other => return Err(RowError::NotText(other)),
        }
        Ok(())
    }
}

/// Review lock, derived from status and `checked_by`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReviewLock {
    /// Row is not in review
    Unlocked,
    /// In review without a named checker: open to any checker
    Open,
    /// In review, held by this user
    HeldBy(UserId),
}

impl ReviewLock {
    /// Whether `user` may act on the review
    #[must_use]
    pub fn admits(&self, user: &UserId) -> bool {
        match self {
            ReviewLock::Unlocked => false,
            ReviewLock::Open => true,
            ReviewLock::HeldBy(holder) => holder == user,
        }
    }
}

/// An application as held by the workspace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationRow {
    /// Server id, absent for drafts
    pub server_id: Option<ServerId>,
    /// Stable client key
    pub local_id: LocalId,
    /// True until the first successful create
    pub is_new: bool,
    /// Field data
    pub record: ApplicationRecord,
    /// Fields with unsaved local edits
    pub dirty: DirtyFields,
    /// Last known server state
    pub origin: Option<Box<ApplicationRecord>>,
}

impl ApplicationRow {
    /// Row mirroring server state
    #[must_use]
    pub fn persisted(server_id: ServerId, record: ApplicationRecord) -> Self {
        Self {
            local_id: LocalId::from(&server_id),
            server_id: Some(server_id),
            is_new: false,
            origin: Some(Box::new(record.clone())),
            record,
            dirty: DirtyFields::new(),
        }
    }

    /// Unsaved draft with a temporary key
    #[must_use]
    pub fn draft(record: ApplicationRecord) -> Self {
        Self {
            server_id: None,
            local_id: LocalId::temporary(),
            is_new: true,
            record,
            dirty: DirtyFields::new(),
            origin: None,
        }
    }

    /// Whether the server knows this row
    #[inline]
    #[must_use]
    pub fn is_persisted(&self) -> bool {
        self.server_id.is_some()
    }

    /// Whether there are unsaved edits
    #[inline]
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Current review lock
    #[must_use]
    pub fn review_lock(&self) -> ReviewLock {
        if self.record.check_status != CheckStatus::InReview {
            return ReviewLock::Unlocked;
        }
        match &self.record.checked_by {
            Some(checker) => ReviewLock::HeldBy(checker.id.clone()),
            None => ReviewLock::Open,
        }
    }

    /// Dirty content fields whose value differs from the last known server state
    ///
    /// Without an origin every dirty content field counts as changed.
    #[must_use]
    pub fn changed_content_fields(&self) -> Vec<FieldKey> {
        self.dirty
            .content_fields()
            .filter(|key| match &self.origin {
                Some(origin) => origin.field_value(*key) != self.record.field_value(*key),
                None => true,
            })
            .collect()
    }
}

/// Row-level errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    /// Field does not hold free text
    #[error("field '{0}' is not a text field")]
    NotText(FieldKey),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> ApplicationRecord {
        ApplicationRecord {
            company: "Acme".to_string(),
            role_title: "Engineer".to_string(),
            profile_id: Some(ProfileId::new("p1")),
            ..ApplicationRecord::default()
        }
    }

    #[test]
    fn labels() {
        assert_eq!(CheckStatus::InReview.label(), "In Review");
        assert_eq!(CheckResult::new("ok").label(), "OK");
        assert_eq!(CheckResult::new("not_perfect").label(), "Not Perfect");
    }

    #[test]
    fn status_parses_wire_names() {
        assert_eq!("in_review".parse::<CheckStatus>().unwrap(), CheckStatus::InReview);
        assert!("archived".parse::<CheckStatus>().is_err());
    }

    #[test]
    fn persisted_row_starts_clean() {
        let row = ApplicationRow::persisted(ServerId::new("a1"), record());
        assert_eq!(row.local_id.as_str(), "a1");
        assert!(!row.is_new);
        assert!(!row.is_dirty());
        assert_eq!(row.origin.as_deref(), Some(&row.record));
    }

    #[test]
    fn draft_has_no_server_id() {
        let row = ApplicationRow::draft(record());
        assert!(row.is_new);
        assert!(row.server_id.is_none());
        assert!(row.local_id.is_temporary());
    }

    #[test]
    fn review_lock_derivation() {
        let mut row = ApplicationRow::persisted(ServerId::new("a1"), record());
        assert_eq!(row.review_lock(), ReviewLock::Unlocked);

        row.record.check_status = CheckStatus::InReview;
        assert_eq!(row.review_lock(), ReviewLock::Open);
        assert!(row.review_lock().admits(&UserId::new("anyone")));

        row.record.checked_by = Some(PersonSummary {
            id: UserId::new("u1"),
            name: None,
        });
        assert!(row.review_lock().admits(&UserId::new("u1")));
        assert!(!row.review_lock().admits(&UserId::new("u2")));
    }

    #[test]
    fn changed_fields_ignore_edits_back_to_origin() {
        let mut row = ApplicationRow::persisted(ServerId::new("a1"), record());
        row.record.company = "Globex".to_string();
        row.dirty.mark(FieldKey::Company);
        row.dirty.mark(FieldKey::RoleTitle);
        row.dirty.mark(FieldKey::CheckNote);
        assert_eq!(row.changed_content_fields(), vec![FieldKey::Company]);
    }

    #[test]
    fn set_text_rejects_relations() {
        let mut rec = record();
        assert!(rec.set_text(FieldKey::Company, "X".to_string()).is_ok());
        assert_eq!(
            rec.set_text(FieldKey::ProfileId, "p2".to_string()),
            Err(RowError::NotText(FieldKey::ProfileId))
        );
    }

    #[test]
    fn empty_relation_serializes_as_null() {
        let rec = ApplicationRecord::default();
        assert_eq!(rec.field_value(FieldKey::ResumeId), Value::Null);
        assert_eq!(record().field_value(FieldKey::ProfileId), Value::from("p1"));
    }
}
