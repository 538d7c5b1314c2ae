//! In-memory contact store.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use anyhow::{bail, Result};
use async_trait::async_trait;

use super::{is_included, AuthorizationStatus, ContactSource, FetchField, InclusionPredicate};
use crate::directory::SortOrder;
use crate::record::ContactRecord;
use crate::search;

/// A [`ContactSource`] over records the host already holds.
///
/// Authorization, the prompt answer and failures are configurable so a host
/// can mirror whatever its real store reports.
pub struct MemorySource {
    records: Mutex<Vec<ContactRecord>>,
    status: Mutex<AuthorizationStatus>,
    grant_on_prompt: bool,
    default_order: SortOrder,
    latency: Option<Duration>,
    enumeration_failure: Mutex<Option<String>>,
    search_failure: Mutex<Option<String>>,
    prompts: AtomicUsize,
}

impl MemorySource {
    /// An authorized store holding `records` in enumeration order.
    pub fn new(records: Vec<ContactRecord>) -> Self {
        Self {
            records: Mutex::new(records),
            status: Mutex::new(AuthorizationStatus::Authorized),
            grant_on_prompt: true,
            default_order: SortOrder::GivenName,
            latency: None,
            enumeration_failure: Mutex::new(None),
            search_failure: Mutex::new(None),
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn with_status(self, status: AuthorizationStatus) -> Self {
        *lock(&self.status) = status;
        self
    }

    /// Answer given when the user is prompted for access.
    pub fn with_prompt_answer(mut self, grant: bool) -> Self {
        self.grant_on_prompt = grant;
        self
    }

    pub fn with_default_sort_order(mut self, order: SortOrder) -> Self {
        self.default_order = match order {
            SortOrder::SystemDefault => SortOrder::GivenName,
            other => other,
        };
        self
    }

    /// Delay every enumeration and search by `latency`.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_records(&self, records: Vec<ContactRecord>) {
        *lock(&self.records) = records;
    }

    /// Status change reported by the store outside of a prompt.
    pub fn set_status(&self, status: AuthorizationStatus) {
        *lock(&self.status) = status;
    }

    /// Make subsequent enumerations fail with `message`, or succeed again
    /// with `None`.
    pub fn fail_enumeration(&self, message: Option<&str>) {
        *lock(&self.enumeration_failure) = message.map(str::to_string);
    }

    pub fn fail_search(&self, message: Option<&str>) {
        *lock(&self.search_failure) = message.map(str::to_string);
    }

    /// Number of times the user was prompted.
    pub fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }

    async fn simulate_latency(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

#[async_trait]
impl ContactSource for MemorySource {
    fn check_authorization(&self) -> AuthorizationStatus {
        *lock(&self.status)
    }

    async fn request_access(&self) -> AuthorizationStatus {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        let mut status = lock(&self.status);
        if *status == AuthorizationStatus::Undetermined {
            *status = if self.grant_on_prompt {
                AuthorizationStatus::Authorized
            } else {
                AuthorizationStatus::Denied
            };
        }
        *status
    }

    fn default_sort_order(&self) -> SortOrder {
        self.default_order
    }

    async fn enumerate_all(
        &self,
        fields: &[FetchField],
        include: Option<&InclusionPredicate>,
    ) -> Result<Vec<ContactRecord>> {
        self.simulate_latency().await;
        if let Some(message) = lock(&self.enumeration_failure).clone() {
            bail!(message);
        }
        let records = lock(&self.records).clone();
        Ok(records
            .into_iter()
            .map(|record| record.restricted_to(fields))
            .filter(|record| is_included(include, record))
            .collect())
    }

    async fn search(&self, query: &str, fields: &[FetchField]) -> Result<Vec<ContactRecord>> {
        self.simulate_latency().await;
        if let Some(message) = lock(&self.search_failure).clone() {
            bail!(message);
        }
        let Some(normalized) = search::normalize_query(query) else {
            return Ok(Vec::new());
        };
        let records = lock(&self.records).clone();
        Ok(records
            .into_iter()
            .filter(|record| search::record_matches(record, &normalized))
            .map(|record| record.restricted_to(fields))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test]
    async fn prompt_resolves_undetermined_once() {
        let source = MemorySource::new(Vec::new())
            .with_status(AuthorizationStatus::Undetermined)
            .with_prompt_answer(false);
        assert_eq!(source.request_access().await, AuthorizationStatus::Denied);
        source.set_status(AuthorizationStatus::Authorized);
        assert_eq!(source.request_access().await, AuthorizationStatus::Authorized);
        assert_eq!(source.prompt_count(), 2);
    }

    #[tokio::test]
    async fn enumeration_applies_predicate_in_order() {
        let source = MemorySource::new(vec![
            ContactRecord::new("Zed", "Al").with_phone("1", ""),
            ContactRecord::new("amy", "Zed"),
            ContactRecord::new("Bob", "Ray").with_phone("2", ""),
        ]);
        let has_phone: InclusionPredicate =
            Arc::new(|record: &ContactRecord| !record.phone_numbers().is_empty());
        let records = source
            .enumerate_all(FetchField::ALL, Some(&has_phone))
            .await
            .unwrap();
        let names: Vec<_> = records.iter().map(|r| r.given_name()).collect();
        assert_eq!(names, vec!["Zed", "Bob"]);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_errors() {
        let source = MemorySource::new(vec![ContactRecord::new("Amy", "Zed")]);
        source.fail_enumeration(Some("store busy"));
        let err = source.enumerate_all(FetchField::ALL, None).await.unwrap_err();
        assert_eq!(err.to_string(), "store busy");

        source.fail_enumeration(None);
        assert_eq!(source.enumerate_all(FetchField::ALL, None).await.unwrap().len(), 1);

        source.fail_search(Some("query failed"));
        assert!(source.search("amy", FetchField::ALL).await.is_err());
    }

    #[tokio::test]
    async fn search_matches_names() {
        let source = MemorySource::new(vec![
            ContactRecord::new("Amy", "Zed"),
            ContactRecord::new("Bob", "Amsel"),
            ContactRecord::new("Carl", "Ray"),
        ]);
        let found = source.search("am", FetchField::ALL).await.unwrap();
        let names: Vec<_> = found.iter().map(|r| r.display_name()).collect();
        assert_eq!(names, vec!["Amy Zed", "Bob Amsel"]);
    }
}
