//! Wire → row normalization
//!
//! The server sends application documents whose relation fields are either a bare id or a
//! populated sub-document, with nullable text fields and ISO timestamps. [`normalize_row`]
//! turns one document into the canonical [`ApplicationRow`].

use crate::ids::{document_key, ProfileId, ResumeId, ServerId, UserId};
use crate::row::{
    ApplicationRecord, ApplicationRow, CheckResult, CheckStatus, PersonSummary, ProfileSummary,
    ResumeSummary,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

/// Errors turning a wire document into a row
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    /// Document carries no `_id`
    #[error("application document has no id")]
    MissingId,

    /// Status outside the known lifecycle
    #[error("application {id}: unknown check status '{status}'")]
    UnknownStatus {
        /// Offending document
        id: String,
        /// Raw status
        status: String,
    },

    /// Document shape does not match
    #[error("malformed application document: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A relation that may or may not be populated
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Reference<T> {
    Doc(T),
    Id(String),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireApplication {
    #[serde(rename = "_id", default)]
    primary_id: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    company: Option<String>,
    #[serde(default)]
    role_title: Option<String>,
    #[serde(default)]
    job_url: Option<String>,
    #[serde(default)]
    bidder_note: Option<String>,
    #[serde(default)]
    check_note: Option<String>,
    #[serde(default)]
    check_result: Option<String>,
    #[serde(default)]
    check_status: Option<String>,
    #[serde(default)]
    profile_id: Option<Reference<ProfileSummary>>,
    #[serde(default)]
    resume_id: Option<Reference<ResumeSummary>>,
    #[serde(default)]
    bidder_id: Option<Reference<PersonSummary>>,
    #[serde(default)]
    checked_by: Option<Reference<PersonSummary>>,
    #[serde(default)]
    checked_at: Option<String>,
    #[serde(default)]
    created_at: Option<String>,
    #[serde(default)]
    updated_at: Option<String>,
    #[serde(default)]
    applied_at: Option<String>,
}

/// Split a reference into (id, summary)
fn split<T, I>(
    reference: Option<Reference<T>>,
    id_of: impl Fn(&T) -> I,
    from_raw: impl Fn(String) -> I,
) -> (Option<I>, Option<T>) {
    match reference {
        Some(Reference::Doc(doc)) => (Some(id_of(&doc)), Some(doc)),
        Some(Reference::Id(raw)) if !raw.trim().is_empty() => (Some(from_raw(raw)), None),
        _ => (None, None),
    }
}

fn timestamp(raw: Option<&str>) -> Option<DateTime<Utc>> {
    raw.and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|at| at.with_timezone(&Utc))
}

/// Normalize one wire document
///
/// # Errors
/// - [`NormalizeError::MissingId`] if the document has no id
/// - [`NormalizeError::UnknownStatus`] for a status outside the lifecycle
/// - [`NormalizeError::Malformed`] if the shape does not deserialize
pub fn normalize_row(doc: Value) -> Result<ApplicationRow, NormalizeError> {
    let wire: WireApplication = serde_json::from_value(doc)?;
    let id = document_key(wire.primary_id, wire.id).ok_or(NormalizeError::MissingId)?;

    let check_status = match wire.check_status.as_deref() {
        None | Some("") => CheckStatus::Pending,
        Some(raw) => raw.parse().map_err(|_| NormalizeError::UnknownStatus {
            id: id.clone(),
            status: raw.to_string(),
        })?,
    };

    let (profile_id, profile) =
        split(wire.profile_id, |p| p.id.clone(), |raw| ProfileId::new(raw));
    let (resume_id, resume) = split(wire.resume_id, |r| r.id.clone(), |raw| ResumeId::new(raw));
    let (bidder_id, bidder) = split(wire.bidder_id, |b| b.id.clone(), |raw| UserId::new(raw));
    let checked_by = match wire.checked_by {
        Some(Reference::Doc(person)) => Some(person),
        Some(Reference::Id(raw)) if !raw.trim().is_empty() => Some(PersonSummary {
            id: UserId::new(raw),
            name: None,
        }),
        _ => None,
    };

    let created_at = timestamp(wire.created_at.as_deref());
    let record = ApplicationRecord {
        company: wire.company.unwrap_or_default(),
        role_title: wire.role_title.unwrap_or_default(),
        job_url: wire.job_url.unwrap_or_default(),
        bidder_note: wire.bidder_note.unwrap_or_default(),
        profile_id,
        profile,
        resume_id,
        resume,
        bidder_id,
        bidder,
        check_status,
        check_result: wire
            .check_result
            .filter(|r| !r.is_empty())
            .map_or_else(CheckResult::pending, CheckResult::new),
        check_note: wire.check_note.unwrap_or_default(),
        checked_by,
        checked_at: timestamp(wire.checked_at.as_deref()),
        created_at,
        updated_at: timestamp(wire.updated_at.as_deref()),
        applied_at: timestamp(wire.applied_at.as_deref()).or(created_at),
    };

    Ok(ApplicationRow::persisted(ServerId::new(id), record))
}

/// Result of normalizing a fetched page
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    /// Rows in server order
    pub rows: Vec<ApplicationRow>,
    /// Documents that could not be normalized, by position
    pub rejected: Vec<(usize, NormalizeError)>,
}

/// Normalize a page of documents, keeping server order
///
/// A malformed document never fails the batch; it is reported in `rejected`.
#[must_use]
pub fn normalize_rows(docs: Vec<Value>) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for (index, doc) in docs.into_iter().enumerate() {
        match normalize_row(doc) {
            Ok(row) => batch.rows.push(row),
            Err(e) => batch.rejected.push((index, e)),
        }
    }
    batch
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn populated_relations_keep_summaries() {
        let row = normalize_row(json!({
            "_id": "a1",
            "company": "Acme",
            "roleTitle": "Engineer",
            "profileId": {"_id": "p1", "alias": "PJ", "personName": "Pat Jones"},
            "resumeId": {"_id": "r1", "title": "Backend"},
            "bidderId": {"_id": "u1", "name": "Bea"},
            "checkStatus": "in_review",
            "checkedBy": {"_id": "u9", "name": "Cal"},
            "createdAt": "2024-03-01T10:00:00Z"
        }))
        .unwrap();

        assert_eq!(row.server_id, Some(ServerId::new("a1")));
        assert_eq!(row.record.profile_id, Some(ProfileId::new("p1")));
        assert_eq!(
            row.record.profile.as_ref().and_then(|p| p.alias.as_deref()),
            Some("PJ")
        );
        assert_eq!(row.record.resume_id, Some(ResumeId::new("r1")));
        assert_eq!(row.record.bidder.as_ref().unwrap().name.as_deref(), Some("Bea"));
        assert_eq!(row.record.check_status, CheckStatus::InReview);
        assert_eq!(row.record.checked_by.as_ref().unwrap().id, UserId::new("u9"));
        assert_eq!(row.record.applied_at, row.record.created_at);
        assert!(row.record.applied_at.is_some());
    }

    #[test]
    fn bare_ids_and_nulls_get_defaults() {
        let row = normalize_row(json!({
            "_id": "a2",
            "company": null,
            "profileId": "p2",
            "resumeId": "",
            "bidderId": null
        }))
        .unwrap();

        assert_eq!(row.record.company, "");
        assert_eq!(row.record.profile_id, Some(ProfileId::new("p2")));
        assert!(row.record.profile.is_none());
        assert!(row.record.resume_id.is_none());
        assert!(row.record.bidder_id.is_none());
        assert_eq!(row.record.check_status, CheckStatus::Pending);
        assert!(row.record.check_result.is_pending());
        assert!(row.record.checked_by.is_none());
    }

    #[test]
    fn invalid_timestamp_is_dropped() {
        let row = normalize_row(json!({"_id": "a3", "checkedAt": "yesterday"})).unwrap();
        assert!(row.record.checked_at.is_none());
    }

    #[test]
    fn missing_id_is_rejected() {
        assert!(matches!(
            normalize_row(json!({"company": "Acme"})),
            Err(NormalizeError::MissingId)
        ));
    }

    #[test]
    fn documents_with_virtual_id_read_underscore_id() {
        let row = normalize_row(json!({
            "_id": "a1",
            "id": "a1",
            "company": "Acme",
            "profileId": {"_id": "p1", "id": "p1", "alias": "PJ"},
            "checkedBy": {"_id": "u9", "id": "ignored", "name": "Cal"}
        }))
        .unwrap();

        assert_eq!(row.server_id, Some(ServerId::new("a1")));
        assert_eq!(row.record.profile_id, Some(ProfileId::new("p1")));
        assert_eq!(row.record.checked_by.unwrap().id, UserId::new("u9"));
    }

    #[test]
    fn plain_id_is_the_fallback() {
        let row = normalize_row(json!({
            "_id": " ",
            "id": "a5",
            "resumeId": {"id": "r5", "title": "Data"}
        }))
        .unwrap();

        assert_eq!(row.server_id, Some(ServerId::new("a5")));
        assert_eq!(row.record.resume_id, Some(ResumeId::new("r5")));
    }

    #[test]
    fn unknown_status_is_rejected() {
        assert!(matches!(
            normalize_row(json!({"_id": "a4", "checkStatus": "archived"})),
            Err(NormalizeError::UnknownStatus { .. })
        ));
    }

    #[test]
    fn batch_keeps_order_and_reports_rejects() {
        let batch = normalize_rows(vec![
            json!({"_id": "b"}),
            json!({"company": 42}),
            json!({"_id": "a"}),
        ]);
        let ids: Vec<_> = batch
            .rows
            .iter()
            .map(|r| r.local_id.as_str().to_string())
            .collect();
        assert_eq!(ids, vec!["b", "a"]);
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].0, 1);
    }
}
