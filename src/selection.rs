use std::collections::HashSet;

use tracing::debug;

use crate::record::ContactRecord;

/// Records chosen in multi-select mode, unique by id, in the order they were
/// chosen.
///
/// Records without an id cannot be matched by identity and are never tracked.
#[derive(Debug, Default, Clone)]
pub struct SelectionTracker {
    members: Vec<ContactRecord>,
    ids: HashSet<String>,
}

impl SelectionTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remove `record` if its id is selected, otherwise append it.
    /// Returns whether the record is selected afterwards.
    pub fn toggle(&mut self, record: &ContactRecord) -> bool {
        let Some(id) = record.id() else {
            debug!(name = %record.display_name(), "record has no id; not tracking selection");
            return false;
        };

        if self.ids.remove(id) {
            self.members.retain(|member| member.id() != Some(id));
            false
        } else {
            self.ids.insert(id.to_string());
            self.members.push(record.clone());
            true
        }
    }

    pub fn is_selected(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn contains(&self, record: &ContactRecord) -> bool {
        record.id().is_some_and(|id| self.is_selected(id))
    }

    /// Selected records in selection order.
    pub fn members(&self) -> &[ContactRecord] {
        &self.members
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn reset(&mut self) {
        self.members.clear();
        self.ids.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn contact(id: &str) -> ContactRecord {
        ContactRecord::new(id, "").with_id(id)
    }

    fn ids(tracker: &SelectionTracker) -> Vec<&str> {
        tracker.members().iter().filter_map(ContactRecord::id).collect()
    }

    #[test]
    fn toggle_appends_in_selection_order() {
        let mut tracker = SelectionTracker::new();
        assert!(tracker.toggle(&contact("c")));
        assert!(tracker.toggle(&contact("a")));
        assert!(tracker.toggle(&contact("b")));
        assert_eq!(ids(&tracker), ["c", "a", "b"]);
        assert!(tracker.is_selected("a"));
        assert!(!tracker.is_selected("z"));
    }

    #[test]
    fn toggle_is_its_own_inverse() {
        let mut tracker = SelectionTracker::new();
        tracker.toggle(&contact("a"));
        tracker.toggle(&contact("b"));
        let before = ids(&tracker).join(",");

        assert!(tracker.toggle(&contact("x")));
        assert!(!tracker.toggle(&contact("x")));
        assert_eq!(ids(&tracker).join(","), before);

        assert!(!tracker.toggle(&contact("a")));
        assert_eq!(ids(&tracker), ["b"]);
        assert!(tracker.toggle(&contact("a")));
        assert_eq!(ids(&tracker), ["b", "a"]);
    }

    #[test]
    fn identity_is_by_id_not_by_value() {
        let mut tracker = SelectionTracker::new();
        tracker.toggle(&ContactRecord::new("Amy", "Zed").with_id("1"));
        assert!(!tracker.toggle(&ContactRecord::new("Amy", "Renamed").with_id("1")));
        assert!(tracker.is_empty());
    }

    #[test]
    fn records_without_id_are_not_tracked() {
        let mut tracker = SelectionTracker::new();
        let ephemeral = ContactRecord::new("Amy", "Zed");
        assert!(!tracker.toggle(&ephemeral));
        assert!(!tracker.contains(&ephemeral));
        assert!(tracker.is_empty());
    }

    #[test]
    fn reset_clears_everything() {
        let mut tracker = SelectionTracker::new();
        tracker.toggle(&contact("a"));
        tracker.reset();
        assert!(tracker.is_empty());
        assert!(!tracker.is_selected("a"));
        assert!(tracker.toggle(&contact("a")));
    }
}
