//! Read model for list renderers.
//!
//! A [`PickerView`] borrows the controller's state and answers the questions a
//! sectioned list asks: how many sections, how many rows, what goes in each
//! row. While a filter is active the list collapses into one untitled section
//! holding the search results.

use serde::Serialize;

use crate::directory::DirectoryIndex;
use crate::filter::FilterView;
use crate::record::{ContactRecord, SubtitleField};
use crate::selection::SelectionTracker;

pub const NO_PHONE_NUMBERS: &str = "No phone numbers available";
pub const NO_EMAILS: &str = "No emails available";

/// Position of a row in the list currently shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowRef {
    pub section: usize,
    pub row: usize,
}

impl RowRef {
    pub fn new(section: usize, row: usize) -> Self {
        Self { section, row }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RowView {
    pub title: String,
    pub subtitle: String,
    pub initials: Option<String>,
    /// Only ever set in multi-select mode.
    pub checked: bool,
}

#[derive(Debug, Clone, Copy)]
pub struct PickerView<'a> {
    pub(crate) index: &'a DirectoryIndex,
    pub(crate) filter: FilterView<'a>,
    pub(crate) selection: &'a SelectionTracker,
    pub(crate) multi_select: bool,
    pub(crate) show_index_bar: bool,
    pub(crate) subtitle: SubtitleField,
}

impl<'a> PickerView<'a> {
    pub fn is_filtering(&self) -> bool {
        matches!(self.filter, FilterView::Active(_))
    }

    pub fn section_count(&self) -> usize {
        match self.filter {
            FilterView::Active(_) => 1,
            FilterView::Inactive => self.index.keys().len(),
        }
    }

    pub fn rows_in_section(&self, section: usize) -> usize {
        self.section_records(section).map_or(0, <[ContactRecord]>::len)
    }

    pub fn record_at(&self, at: RowRef) -> Option<&'a ContactRecord> {
        self.section_records(at.section)?.get(at.row)
    }

    pub fn section_title(&self, section: usize) -> Option<&'a str> {
        match self.filter {
            FilterView::Active(_) => None,
            FilterView::Inactive => self.index.keys().get(section).map(String::as_str),
        }
    }

    /// Titles for the index bar.
    pub fn index_titles(&self) -> Option<&'a [String]> {
        match self.filter {
            FilterView::Inactive if self.show_index_bar => Some(self.index.keys()),
            _ => None,
        }
    }

    /// Section an index-bar title jumps to. Unknown titles and any title
    /// while filtering map to the first section.
    pub fn section_for_index_title(&self, title: &str) -> usize {
        match self.filter {
            FilterView::Active(_) => 0,
            FilterView::Inactive => self.index.position_of(title).unwrap_or(0),
        }
    }

    pub fn row(&self, at: RowRef) -> Option<RowView> {
        let record = self.record_at(at)?;
        Some(RowView {
            title: record.display_name(),
            subtitle: self.subtitle_for(record),
            initials: record.initials(),
            checked: self.multi_select && self.selection.contains(record),
        })
    }

    /// Count of every indexed record, independent of the filter.
    pub fn total_records(&self) -> usize {
        self.index.len()
    }

    /// Every visible row in display order.
    pub fn rows(&self) -> impl Iterator<Item = (RowRef, &'a ContactRecord)> + 'a {
        let view = *self;
        (0..view.section_count()).flat_map(move |section| {
            view.section_records(section)
                .unwrap_or_default()
                .iter()
                .enumerate()
                .map(move |(row, record)| (RowRef::new(section, row), record))
        })
    }

    fn section_records(&self, section: usize) -> Option<&'a [ContactRecord]> {
        match self.filter {
            FilterView::Active(records) => (section == 0).then_some(records),
            FilterView::Inactive => self.index.section_at(section),
        }
    }

    fn subtitle_for(&self, record: &ContactRecord) -> String {
        match record.subtitle(self.subtitle) {
            Some(value) => value.to_string(),
            None => match self.subtitle {
                SubtitleField::PhoneNumber => NO_PHONE_NUMBERS.to_string(),
                SubtitleField::Email => NO_EMAILS.to_string(),
                SubtitleField::Birthday | SubtitleField::Organization => String::new(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::SortOrder;

    fn index() -> DirectoryIndex {
        DirectoryIndex::build(
            vec![
                ContactRecord::new("Zed", "Al").with_id("1"),
                ContactRecord::new("amy", "Zed")
                    .with_id("2")
                    .with_phone("555-0100", "cell"),
                ContactRecord::new("#1", "Zed").with_id("3"),
            ],
            SortOrder::GivenName,
            None,
        )
    }

    fn view<'a>(
        index: &'a DirectoryIndex,
        filter: FilterView<'a>,
        selection: &'a SelectionTracker,
    ) -> PickerView<'a> {
        PickerView {
            index,
            filter,
            selection,
            multi_select: true,
            show_index_bar: true,
            subtitle: SubtitleField::PhoneNumber,
        }
    }

    #[test]
    fn sections_follow_index_when_not_filtering() {
        let index = index();
        let selection = SelectionTracker::new();
        let view = view(&index, FilterView::Inactive, &selection);

        assert_eq!(view.section_count(), 3);
        assert_eq!(view.section_title(0), Some("A"));
        assert_eq!(view.section_title(2), Some("#"));
        assert_eq!(view.rows_in_section(1), 1);
        assert_eq!(view.rows_in_section(9), 0);
        assert_eq!(view.index_titles().map(<[String]>::len), Some(3));
        assert_eq!(view.section_for_index_title("Z"), 1);
        assert_eq!(view.total_records(), 3);
    }

    #[test]
    fn filtering_collapses_to_one_untitled_section() {
        let index = index();
        let selection = SelectionTracker::new();
        let results = vec![ContactRecord::new("Amy", "Zed")];
        let view = view(&index, FilterView::Active(&results), &selection);

        assert!(view.is_filtering());
        assert_eq!(view.section_count(), 1);
        assert_eq!(view.rows_in_section(0), 1);
        assert_eq!(view.rows_in_section(1), 0);
        assert_eq!(view.section_title(0), None);
        assert_eq!(view.index_titles(), None);
        assert_eq!(view.section_for_index_title("Z"), 0);
        assert_eq!(view.total_records(), 3);
    }

    #[test]
    fn row_uses_subtitle_fallbacks_and_selection() {
        let index = index();
        let mut selection = SelectionTracker::new();
        selection.toggle(index.section("A").unwrap().first().unwrap());
        let view = view(&index, FilterView::Inactive, &selection);

        let amy = view.row(RowRef::new(0, 0)).unwrap();
        assert_eq!(amy.title, "amy Zed");
        assert_eq!(amy.subtitle, "555-0100");
        assert_eq!(amy.initials.as_deref(), Some("aZ"));
        assert!(amy.checked);

        let zed = view.row(RowRef::new(1, 0)).unwrap();
        assert_eq!(zed.subtitle, NO_PHONE_NUMBERS);
        assert!(!zed.checked);

        assert_eq!(view.row(RowRef::new(5, 0)), None);
    }

    #[test]
    fn checkmarks_only_in_multi_select() {
        let index = index();
        let mut selection = SelectionTracker::new();
        selection.toggle(index.section("A").unwrap().first().unwrap());
        let mut view = view(&index, FilterView::Inactive, &selection);
        view.multi_select = false;
        assert!(!view.row(RowRef::new(0, 0)).unwrap().checked);
    }

    #[test]
    fn hidden_index_bar_has_no_titles() {
        let index = index();
        let selection = SelectionTracker::new();
        let mut view = view(&index, FilterView::Inactive, &selection);
        view.show_index_bar = false;
        assert_eq!(view.index_titles(), None);
        assert_eq!(view.section_title(0), Some("A"));
    }

    #[test]
    fn rows_walk_sections_in_order() {
        let index = index();
        let selection = SelectionTracker::new();
        let view = view(&index, FilterView::Inactive, &selection);
        let ids: Vec<_> = view.rows().filter_map(|(_, record)| record.id()).collect();
        assert_eq!(ids, ["2", "1", "3"]);
        let refs: Vec<_> = view.rows().map(|(at, _)| at).collect();
        assert_eq!(refs[2], RowRef::new(2, 0));
    }
}
