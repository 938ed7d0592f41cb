//! Catalogue data delivered with every fetch
//!
//! `GET /applications` returns a `meta` object next to the rows: option lists for the relation
//! fields, the review vocabularies and the server's view of the caller's access. Entries that
//! do not parse are skipped rather than failing the whole page.

use crate::config::ReviewConfig;
use appdesk_access::Capabilities;
use appdesk_row::{
    CheckResult, PersonSummary, ProfileId, ProfileSummary, ResumeId, ResumeSummary, UserId,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

fn lenient_vec<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let raw: Option<Vec<Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect())
}

fn lenient_resumes<'de, D>(deserializer: D) -> Result<BTreeMap<String, Vec<ResumeSummary>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<BTreeMap<String, Value>> = Option::deserialize(deserializer)?;
    Ok(raw
        .unwrap_or_default()
        .into_iter()
        .map(|(profile, list)| {
            let resumes = match list {
                Value::Array(items) => items
                    .into_iter()
                    .filter_map(|item| serde_json::from_value(item).ok())
                    .collect(),
                _ => Vec::new(),
            };
            (profile, resumes)
        })
        .collect())
}

fn lenient_capabilities<'de, D>(deserializer: D) -> Result<Capabilities, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Value> = Option::deserialize(deserializer)?;
    Ok(raw
        .and_then(|value| serde_json::from_value(value).ok())
        .unwrap_or_default())
}

/// `meta` object as sent by the server
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WireMeta {
    /// Raw applications permission payload, as the server sees it
    pub access: Option<Value>,
    /// Capability overrides
    #[serde(deserialize_with = "lenient_capabilities")]
    pub capabilities: Capabilities,
    /// Profile options
    #[serde(deserialize_with = "lenient_vec")]
    pub profiles: Vec<ProfileSummary>,
    /// Bidder options
    #[serde(deserialize_with = "lenient_vec")]
    pub bidders: Vec<PersonSummary>,
    /// Review status vocabulary
    #[serde(deserialize_with = "lenient_vec")]
    pub check_statuses: Vec<String>,
    /// Review result vocabulary
    #[serde(deserialize_with = "lenient_vec")]
    pub check_results: Vec<String>,
    /// Resume options per profile id
    #[serde(deserialize_with = "lenient_resumes")]
    pub resumes_by_profile: BTreeMap<String, Vec<ResumeSummary>>,
}

/// Processed catalogue used for lookups and option lists
#[derive(Debug, Clone, Default)]
pub struct WorkspaceMeta {
    profiles: Vec<ProfileSummary>,
    bidders: Vec<PersonSummary>,
    check_statuses: Vec<String>,
    check_results: Vec<CheckResult>,
    resumes_by_profile: BTreeMap<ProfileId, Vec<ResumeSummary>>,
    resume_index: HashMap<ResumeId, ResumeSummary>,
}

impl WorkspaceMeta {
    /// Empty catalogue with the configured result vocabulary
    #[must_use]
    pub fn fallback(review: &ReviewConfig) -> Self {
        Self {
            check_results: review
                .default_results
                .iter()
                .map(CheckResult::new)
                .collect(),
            ..Self::default()
        }
    }

    /// Build from the wire catalogue
    ///
    /// An empty result vocabulary falls back to the configured defaults.
    #[must_use]
    pub fn from_wire(wire: &WireMeta, review: &ReviewConfig) -> Self {
        let results = if wire.check_results.is_empty() {
            &review.default_results
        } else {
            &wire.check_results
        };

        let resumes_by_profile: BTreeMap<ProfileId, Vec<ResumeSummary>> = wire
            .resumes_by_profile
            .iter()
            .map(|(profile, list)| (ProfileId::new(profile.as_str()), list.clone()))
            .collect();
        let resume_index = resumes_by_profile
            .values()
            .flatten()
            .map(|resume| (resume.id.clone(), resume.clone()))
            .collect();

        Self {
            profiles: wire.profiles.clone(),
            bidders: wire.bidders.clone(),
            check_statuses: wire.check_statuses.clone(),
            check_results: results.iter().map(CheckResult::new).collect(),
            resumes_by_profile,
            resume_index,
        }
    }

    /// Profile options
    #[inline]
    #[must_use]
    pub fn profiles(&self) -> &[ProfileSummary] {
        &self.profiles
    }

    /// Bidder options
    #[inline]
    #[must_use]
    pub fn bidders(&self) -> &[PersonSummary] {
        &self.bidders
    }

    /// Review status vocabulary from the server
    #[inline]
    #[must_use]
    pub fn check_statuses(&self) -> &[String] {
        &self.check_statuses
    }

    /// Review results to offer
    #[inline]
    #[must_use]
    pub fn check_results(&self) -> &[CheckResult] {
        &self.check_results
    }

    /// Profile by id
    #[must_use]
    pub fn profile(&self, id: &ProfileId) -> Option<&ProfileSummary> {
        self.profiles.iter().find(|p| &p.id == id)
    }

    /// Bidder by id
    #[must_use]
    pub fn bidder(&self, id: &UserId) -> Option<&PersonSummary> {
        self.bidders.iter().find(|b| &b.id == id)
    }

    /// Resume by id, across every profile
    #[must_use]
    pub fn resume(&self, id: &ResumeId) -> Option<&ResumeSummary> {
        self.resume_index.get(id)
    }

    /// Resume options for a profile
    #[must_use]
    pub fn resumes_for(&self, profile: &ProfileId) -> &[ResumeSummary] {
        self.resumes_by_profile
            .get(profile)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire() -> WireMeta {
        serde_json::from_value(json!({
            "access": {"checkAll": true},
            "capabilities": {"canAssignOtherBidders": false},
            "profiles": [{"_id": "p1", "alias": "PJ"}, {"alias": "no id"}],
            "bidders": [{"_id": "u1", "name": "Bea"}],
            "checkStatuses": ["pending", "in_review", "reviewed"],
            "resumesByProfile": {
                "p1": [{"_id": "r1", "title": "Backend"}, 5],
                "p2": null
            }
        }))
        .unwrap()
    }

    #[test]
    fn malformed_entries_are_skipped() {
        let wire = wire();
        assert_eq!(wire.profiles.len(), 1);
        assert_eq!(wire.capabilities.can_assign_other_bidders, Some(false));
        assert_eq!(wire.resumes_by_profile["p1"].len(), 1);
        assert!(wire.resumes_by_profile["p2"].is_empty());
    }

    #[test]
    fn lookups() {
        let meta = WorkspaceMeta::from_wire(&wire(), &ReviewConfig::default());
        assert_eq!(meta.profile(&ProfileId::new("p1")).unwrap().display_name(), "PJ");
        assert!(meta.bidder(&UserId::new("u1")).is_some());
        assert_eq!(
            meta.resume(&ResumeId::new("r1")).unwrap().title.as_deref(),
            Some("Backend")
        );
        assert_eq!(meta.resumes_for(&ProfileId::new("p1")).len(), 1);
        assert!(meta.resumes_for(&ProfileId::new("zz")).is_empty());
    }

    #[test]
    fn catalogue_entries_with_both_keys_are_kept() {
        let wire: WireMeta = serde_json::from_value(json!({
            "profiles": [{"_id": "p1", "id": "p1", "alias": "PJ"}],
            "bidders": [{"_id": "u1", "id": "u1", "name": "Bea"}]
        }))
        .unwrap();
        let meta = WorkspaceMeta::from_wire(&wire, &ReviewConfig::default());
        assert_eq!(meta.profile(&ProfileId::new("p1")).unwrap().display_name(), "PJ");
        assert!(meta.bidder(&UserId::new("u1")).is_some());
    }

    #[test]
    fn result_vocabulary_falls_back_to_config() {
        let meta = WorkspaceMeta::from_wire(&wire(), &ReviewConfig::default());
        let results: Vec<_> = meta.check_results().iter().map(CheckResult::as_str).collect();
        assert_eq!(results, vec!["pending", "ok", "bad", "not_perfect"]);

        let served: WireMeta =
            serde_json::from_value(json!({"checkResults": ["pending", "pass"]})).unwrap();
        let meta = WorkspaceMeta::from_wire(&served, &ReviewConfig::default());
        assert_eq!(meta.check_results().len(), 2);
    }

    #[test]
    fn missing_meta_fields_default() {
        let wire: WireMeta = serde_json::from_value(json!({"capabilities": null})).unwrap();
        assert!(wire.access.is_none());
        assert_eq!(wire.capabilities, Capabilities::default());
    }
}
