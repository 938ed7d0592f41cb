//! Sparse field patches
//!
//! A [`FieldPatch`] is the body of a create or update request: only the fields being sent,
//! keyed by their wire names. [`CheckPatch`] is the narrower body of a review transition.

use crate::field::FieldKey;
use crate::row::{ApplicationRecord, CheckResult, CheckStatus};
use indexmap::IndexMap;
use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::{Map, Value};

/// Sparse map of field → new value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldPatch {
    fields: IndexMap<FieldKey, Value>,
}

impl FieldPatch {
    /// Empty patch
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Patch carrying the current value of each listed field
    #[must_use]
    pub fn from_record(
        record: &ApplicationRecord,
        keys: impl IntoIterator<Item = FieldKey>,
    ) -> Self {
        let fields = keys
            .into_iter()
            .map(|key| (key, record.field_value(key)))
            .collect();
        Self { fields }
    }

    /// Set one field
    #[inline]
    #[must_use]
    pub fn with(mut self, key: FieldKey, value: impl Into<Value>) -> Self {
        self.fields.insert(key, value.into());
        self
    }

    /// Value sent for a field
    #[inline]
    #[must_use]
    pub fn get(&self, key: FieldKey) -> Option<&Value> {
        self.fields.get(&key)
    }

    /// Fields in insertion order
    pub fn keys(&self) -> impl Iterator<Item = FieldKey> + '_ {
        self.fields.keys().copied()
    }

    /// Whether nothing would be sent
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether any review field is included
    #[must_use]
    pub fn touches_review(&self) -> bool {
        self.keys().any(FieldKey::is_review)
    }

    /// JSON object body
    #[must_use]
    pub fn to_json(&self) -> Value {
        let map: Map<String, Value> = self
            .fields
            .iter()
            .map(|(key, value)| (key.as_str().to_string(), value.clone()))
            .collect();
        Value::Object(map)
    }
}

impl Serialize for FieldPatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (key, value) in &self.fields {
            map.serialize_entry(key.as_str(), value)?;
        }
        map.end()
    }
}

/// Body of a review transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckPatch {
    /// Target status
    pub status: CheckStatus,
    /// Verdict, sent only when completing
    pub result: Option<CheckResult>,
    /// Note, sent when completing or cancelling
    pub note: Option<String>,
}

impl CheckPatch {
    /// pending → `in_review`
    #[must_use]
    pub fn start() -> Self {
        Self {
            status: CheckStatus::InReview,
            result: None,
            note: None,
        }
    }

    /// `in_review` → reviewed
    #[must_use]
    pub fn complete(result: CheckResult, note: impl Into<String>) -> Self {
        Self {
            status: CheckStatus::Reviewed,
            result: Some(result),
            note: Some(note.into()),
        }
    }

    /// `in_review` → pending, clearing the note
    #[must_use]
    pub fn cancel() -> Self {
        Self {
            status: CheckStatus::Pending,
            result: None,
            note: Some(String::new()),
        }
    }
}

impl From<CheckPatch> for FieldPatch {
    fn from(patch: CheckPatch) -> Self {
        let mut out = FieldPatch::new().with(FieldKey::CheckStatus, patch.status.as_str());
        if let Some(result) = patch.result {
            out = out.with(FieldKey::CheckResult, result.as_str());
        }
        if let Some(note) = patch.note {
            out = out.with(FieldKey::CheckNote, note);
        }
        out
    }
}
