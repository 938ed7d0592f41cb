//! Field keys for application rows
//!
//! [`FieldKey`] names every addressable field of a row, the way dirty sets, patches and
//! editor tokens refer to them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Addressable field of an application row
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldKey {
    /// Company name
    Company,
    /// Role title
    RoleTitle,
    /// Job posting URL
    JobUrl,
    /// Free text from the bidder
    BidderNote,
    /// Profile reference
    ProfileId,
    /// Resume reference
    ResumeId,
    /// Bidder reference
    BidderId,
    /// Review lifecycle state
    CheckStatus,
    /// Review verdict
    CheckResult,
    /// Review note
    CheckNote,
    /// Review lock holder
    CheckedBy,
    /// Review completion time
    CheckedAt,
}

impl FieldKey {
    /// Content fields a draft sends on creation, in wire order
    pub const EDITABLE: [FieldKey; 7] = [
        FieldKey::Company,
        FieldKey::RoleTitle,
        FieldKey::JobUrl,
        FieldKey::BidderNote,
        FieldKey::ProfileId,
        FieldKey::BidderId,
        FieldKey::ResumeId,
    ];

    /// Review fields, only ever mutated through the check workflow
    pub const REVIEW: [FieldKey; 5] = [
        FieldKey::CheckStatus,
        FieldKey::CheckResult,
        FieldKey::CheckNote,
        FieldKey::CheckedBy,
        FieldKey::CheckedAt,
    ];

    /// Wire name (camelCase, as the server spells it)
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            FieldKey::Company => "company",
            FieldKey::RoleTitle => "roleTitle",
            FieldKey::JobUrl => "jobUrl",
            FieldKey::BidderNote => "bidderNote",
            FieldKey::ProfileId => "profileId",
            FieldKey::ResumeId => "resumeId",
            FieldKey::BidderId => "bidderId",
            FieldKey::CheckStatus => "checkStatus",
            FieldKey::CheckResult => "checkResult",
            FieldKey::CheckNote => "checkNote",
            FieldKey::CheckedBy => "checkedBy",
            FieldKey::CheckedAt => "checkedAt",
        }
    }

    /// Whether this is a review field
    #[inline]
    #[must_use]
    pub fn is_review(self) -> bool {
        Self::REVIEW.contains(&self)
    }

    /// Whether this field references another document
    #[inline]
    #[must_use]
    pub fn is_relation(self) -> bool {
        matches!(
            self,
            FieldKey::ProfileId | FieldKey::ResumeId | FieldKey::BidderId
        )
    }

    /// Whether a user may type into this field directly
    ///
    /// Review status, lock holder and completion time are server-assigned.
    #[inline]
    #[must_use]
    pub fn is_user_editable(self) -> bool {
        !matches!(
            self,
            FieldKey::CheckStatus | FieldKey::CheckedBy | FieldKey::CheckedAt
        )
    }
}

impl Display for FieldKey {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error parsing a field key
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown field: {0}")]
pub struct UnknownField(pub String);

impl FromStr for FieldKey {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::EDITABLE
            .iter()
            .chain(Self::REVIEW.iter())
            .copied()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| UnknownField(s.to_string()))
    }
}

/// Set of fields carrying unsaved local edits
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DirtyFields(BTreeSet<FieldKey>);

impl DirtyFields {
    /// Empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a field dirty
    #[inline]
    pub fn mark(&mut self, key: FieldKey) {
        self.0.insert(key);
    }

    /// Whether a field is dirty
    #[inline]
    #[must_use]
    pub fn contains(&self, key: FieldKey) -> bool {
        self.0.contains(&key)
    }

    /// Whether nothing is dirty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of dirty fields
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Forget every edit
    #[inline]
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Iterate in field order
    pub fn iter(&self) -> impl Iterator<Item = FieldKey> + '_ {
        self.0.iter().copied()
    }

    /// Dirty fields outside the review group
    pub fn content_fields(&self) -> impl Iterator<Item = FieldKey> + '_ {
        self.iter().filter(|key| !key.is_review())
    }
}

impl FromIterator<FieldKey> for DirtyFields {
    fn from_iter<I: IntoIterator<Item = FieldKey>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_names_round_trip() {
        for key in FieldKey::EDITABLE.iter().chain(FieldKey::REVIEW.iter()) {
            assert_eq!(key.as_str().parse::<FieldKey>().unwrap(), *key);
        }
        assert!("salary".parse::<FieldKey>().is_err());
    }

    #[test]
    fn review_and_relation_groups() {
        assert!(FieldKey::CheckNote.is_review());
        assert!(!FieldKey::Company.is_review());
        assert!(FieldKey::BidderId.is_relation());
        assert!(!FieldKey::JobUrl.is_relation());
        assert!(FieldKey::CheckResult.is_user_editable());
        assert!(!FieldKey::CheckedBy.is_user_editable());
    }

    #[test]
    fn content_fields_skip_review() {
        let dirty: DirtyFields = [FieldKey::Company, FieldKey::CheckNote, FieldKey::ProfileId]
            .into_iter()
            .collect();
        let content: Vec<_> = dirty.content_fields().collect();
        assert_eq!(content, vec![FieldKey::Company, FieldKey::ProfileId]);
    }
}
