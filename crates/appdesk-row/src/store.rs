//! Ordered row set
//!
//! [`RowSet`] keeps rows in display order (server order, then drafts) and indexes them by
//! [`LocalId`]. Every mutation of the workspace's rows goes through one of these methods.

use crate::ids::{LocalId, ServerId};
use crate::row::ApplicationRow;
use indexmap::IndexMap;

/// Rows keyed by local id, in display order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowSet {
    rows: IndexMap<LocalId, ApplicationRow>,
}

impl RowSet {
    /// Empty set
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Row by local id
    #[inline]
    #[must_use]
    pub fn get(&self, id: &LocalId) -> Option<&ApplicationRow> {
        self.rows.get(id)
    }

    /// Mutable row by local id
    #[inline]
    pub fn get_mut(&mut self, id: &LocalId) -> Option<&mut ApplicationRow> {
        self.rows.get_mut(id)
    }

    /// Row by server id
    #[must_use]
    pub fn find_server(&self, id: &ServerId) -> Option<&ApplicationRow> {
        self.rows
            .values()
            .find(|row| row.server_id.as_ref() == Some(id))
    }

    /// Whether a row with this local id exists
    #[inline]
    #[must_use]
    pub fn contains(&self, id: &LocalId) -> bool {
        self.rows.contains_key(id)
    }

    /// Append a row, or replace the row with the same key in place
    pub fn push(&mut self, row: ApplicationRow) {
        self.rows.insert(row.local_id.clone(), row);
    }

    /// Replace the row at `id` keeping its position
    ///
    /// The replacement may carry a different key (a draft promoted to a persisted row).
    /// Returns the previous row, or `None` if `id` was not present (nothing is inserted).
    pub fn replace(&mut self, id: &LocalId, row: ApplicationRow) -> Option<ApplicationRow> {
        let index = self.rows.get_index_of(id)?;
        let (_, previous) = self.rows.shift_remove_index(index)?;
        let mut at = index;
        // A persisted copy of the same server row elsewhere would duplicate it.
        if let Some(other) = self.rows.get_index_of(&row.local_id) {
            self.rows.shift_remove_index(other);
            if other < at {
                at -= 1;
            }
        }
        let at = at.min(self.rows.len());
        self.rows.shift_insert(at, row.local_id.clone(), row);
        Some(previous)
    }

    /// Remove a row, keeping the order of the rest
    pub fn remove(&mut self, id: &LocalId) -> Option<ApplicationRow> {
        self.rows.shift_remove(id)
    }

    /// Rows in display order
    pub fn iter(&self) -> impl Iterator<Item = &ApplicationRow> + '_ {
        self.rows.values()
    }

    /// Number of rows
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the set is empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows in display order, consuming the set
    #[must_use]
    pub fn into_vec(self) -> Vec<ApplicationRow> {
        self.rows.into_values().collect()
    }
}

impl From<Vec<ApplicationRow>> for RowSet {
    fn from(rows: Vec<ApplicationRow>) -> Self {
        rows.into_iter().collect()
    }
}

impl FromIterator<ApplicationRow> for RowSet {
    fn from_iter<I: IntoIterator<Item = ApplicationRow>>(iter: I) -> Self {
        let mut set = RowSet::new();
        for row in iter {
            set.push(row);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::ApplicationRecord;

    fn persisted(id: &str) -> ApplicationRow {
        ApplicationRow::persisted(ServerId::new(id), ApplicationRecord::default())
    }

    fn keys(set: &RowSet) -> Vec<String> {
        set.iter().map(|r| r.local_id.to_string()).collect()
    }

    #[test]
    fn keeps_insertion_order() {
        let set: RowSet = vec![persisted("b"), persisted("a"), persisted("c")].into();
        assert_eq!(keys(&set), vec!["b", "a", "c"]);
        assert!(set.find_server(&ServerId::new("a")).is_some());
    }

    #[test]
    fn replace_promotes_draft_in_place() {
        let draft = ApplicationRow::draft(ApplicationRecord::default());
        let temp = draft.local_id.clone();
        let mut set: RowSet = vec![persisted("a"), draft, persisted("c")].into();

        let previous = set.replace(&temp, persisted("b")).unwrap();
        assert!(previous.is_new);
        assert_eq!(keys(&set), vec!["a", "b", "c"]);
        assert!(!set.contains(&temp));
    }

    #[test]
    fn replace_missing_is_noop() {
        let mut set: RowSet = vec![persisted("a")].into();
        assert!(set.replace(&LocalId::from("zz"), persisted("b")).is_none());
        assert_eq!(keys(&set), vec!["a"]);
    }

    #[test]
    fn remove_keeps_order() {
        let mut set: RowSet = vec![persisted("a"), persisted("b"), persisted("c")].into();
        set.remove(&LocalId::from("b"));
        assert_eq!(keys(&set), vec!["a", "c"]);
        assert_eq!(set.len(), 2);
    }
}
