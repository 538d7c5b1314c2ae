//! Live text filter over the contact store.
//!
//! Matching is delegated to the store's own search; the inclusion predicate is
//! applied afterwards and the store's result order is kept. The filtered view
//! is independent of the [`DirectoryIndex`](crate::directory::DirectoryIndex).

use tracing::debug;

use crate::error::PickerError;
use crate::record::ContactRecord;
use crate::search;
use crate::source::{is_included, ContactSource, FetchField, InclusionPredicate};

/// Result of running a query.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterOutcome {
    /// The query was blank: no filter is active and consumers should show
    /// the full index. Distinct from a query that matched nothing.
    Inactive,
    Matches(Vec<ContactRecord>),
}

/// What a consumer should display right now.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FilterView<'a> {
    Inactive,
    Active(&'a [ContactRecord]),
}

#[derive(Debug, Default)]
pub struct SearchFilter {
    query: String,
    results: Vec<ContactRecord>,
}

impl SearchFilter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `query` against `source`, then drop records rejected by `include`.
    pub async fn apply<S>(
        source: &S,
        query: &str,
        include: Option<&InclusionPredicate>,
    ) -> Result<FilterOutcome, PickerError>
    where
        S: ContactSource + ?Sized,
    {
        if search::normalize_query(query).is_none() {
            return Ok(FilterOutcome::Inactive);
        }

        let found = source
            .search(query.trim(), FetchField::ALL)
            .await
            .map_err(|err| PickerError::search(&err))?;
        let total = found.len();
        let matches: Vec<ContactRecord> = found
            .into_iter()
            .filter(|record| is_included(include, record))
            .collect();
        debug!(query, total, kept = matches.len(), "search finished");
        Ok(FilterOutcome::Matches(matches))
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn is_active(&self) -> bool {
        search::normalize_query(&self.query).is_some()
    }

    /// Record a new query. Clearing the query drops any held results.
    /// Returns whether a filter is active afterwards.
    pub fn set_query(&mut self, query: &str) -> bool {
        self.query = query.to_string();
        if !self.is_active() {
            self.results.clear();
        }
        self.is_active()
    }

    /// Store the outcome of the latest query.
    pub fn store(&mut self, outcome: FilterOutcome) {
        match outcome {
            FilterOutcome::Inactive => self.results.clear(),
            FilterOutcome::Matches(records) => self.results = records,
        }
    }

    /// Empty the result set, e.g. after a failed query.
    pub fn clear_results(&mut self) {
        self.results.clear();
    }

    pub fn view(&self) -> FilterView<'_> {
        if self.is_active() {
            FilterView::Active(&self.results)
        } else {
            FilterView::Inactive
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;
    use std::sync::Arc;

    fn source() -> MemorySource {
        MemorySource::new(vec![
            ContactRecord::new("Amy", "Zed").with_phone("1", ""),
            ContactRecord::new("Bob", "Amsel"),
            ContactRecord::new("Carl", "Ray"),
        ])
    }

    #[tokio::test]
    async fn blank_query_signals_no_filter() {
        let outcome = SearchFilter::apply(&source(), "  ", None).await.unwrap();
        assert_eq!(outcome, FilterOutcome::Inactive);
    }

    #[tokio::test]
    async fn unmatched_query_is_an_empty_match() {
        let outcome = SearchFilter::apply(&source(), "xyz", None).await.unwrap();
        assert_eq!(outcome, FilterOutcome::Matches(Vec::new()));
    }

    #[tokio::test]
    async fn predicate_runs_after_store_search() {
        let has_phone: InclusionPredicate =
            Arc::new(|record: &ContactRecord| !record.phone_numbers().is_empty());
        let outcome = SearchFilter::apply(&source(), "am", Some(&has_phone))
            .await
            .unwrap();
        match outcome {
            FilterOutcome::Matches(records) => {
                assert_eq!(records.len(), 1);
                assert_eq!(records[0].given_name(), "Amy");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test]
    async fn repeated_queries_are_idempotent() {
        let source = source();
        let first = SearchFilter::apply(&source, "am", None).await.unwrap();
        let second = SearchFilter::apply(&source, "am", None).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn store_failure_is_search_failed() {
        let source = source();
        source.fail_search(Some("index corrupt"));
        let err = SearchFilter::apply(&source, "am", None).await.unwrap_err();
        assert_eq!(
            err,
            PickerError::SearchFailed {
                message: "index corrupt".to_string()
            }
        );
    }

    #[test]
    fn clearing_query_falls_back_to_index() {
        let mut filter = SearchFilter::new();
        assert!(filter.set_query("am"));
        filter.store(FilterOutcome::Matches(vec![ContactRecord::new("Amy", "")]));
        assert!(matches!(filter.view(), FilterView::Active(records) if records.len() == 1));

        assert!(!filter.set_query(""));
        assert_eq!(filter.view(), FilterView::Inactive);
    }
}
