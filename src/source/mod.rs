//! Contact store abstraction.
//!
//! This module provides:
//! - `ContactSource` trait for the device-level store the picker reads from
//! - `AuthorizationStatus` reported by the store's permission system
//! - `FetchField`, the fixed set of attributes the picker asks for
//! - `MemorySource`, a store backed by records the host already holds

pub mod memory;

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::directory::SortOrder;
use crate::record::ContactRecord;

pub use memory::MemorySource;

/// Caller-supplied filter deciding whether a record is visible at all.
///
/// Must be pure: it is called repeatedly, and from background tasks while the
/// foreground holds read-only references to the same records.
pub type InclusionPredicate = Arc<dyn Fn(&ContactRecord) -> bool + Send + Sync>;

/// Apply an optional inclusion predicate. No predicate includes everything.
pub fn is_included(include: Option<&InclusionPredicate>, record: &ContactRecord) -> bool {
    include.map_or(true, |predicate| predicate(record))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuthorizationStatus {
    /// The user has not been asked yet.
    Undetermined,
    Authorized,
    Denied,
    /// Access is blocked by policy and the user cannot grant it.
    Restricted,
}

impl AuthorizationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorizationStatus::Undetermined => "undetermined",
            AuthorizationStatus::Authorized => "authorized",
            AuthorizationStatus::Denied => "denied",
            AuthorizationStatus::Restricted => "restricted",
        }
    }
}

/// Record attributes a source is asked to populate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FetchField {
    GivenName,
    FamilyName,
    Organization,
    Birthday,
    Thumbnail,
    Image,
    PhoneNumbers,
    EmailAddresses,
    PostalAddresses,
}

impl FetchField {
    pub const ALL: &'static [FetchField] = &[
        FetchField::GivenName,
        FetchField::FamilyName,
        FetchField::Organization,
        FetchField::Birthday,
        FetchField::Thumbnail,
        FetchField::Image,
        FetchField::PhoneNumbers,
        FetchField::EmailAddresses,
        FetchField::PostalAddresses,
    ];
}

/// Trait for contact store implementations
#[async_trait]
pub trait ContactSource: Send + Sync {
    /// Current authorization status, without prompting
    fn check_authorization(&self) -> AuthorizationStatus;

    /// Ask the user for access. Resolves to the status after the prompt;
    /// a source that cannot prompt resolves to its current status.
    async fn request_access(&self) -> AuthorizationStatus;

    /// Sort order the user configured for the store as a whole. Never
    /// returns `SortOrder::SystemDefault`.
    fn default_sort_order(&self) -> SortOrder;

    /// Every record in the store, in the store's enumeration order
    async fn enumerate_all(
        &self,
        fields: &[FetchField],
        include: Option<&InclusionPredicate>,
    ) -> Result<Vec<ContactRecord>>;

    /// Records whose name matches `query`, in the store's result order
    async fn search(&self, query: &str, fields: &[FetchField]) -> Result<Vec<ContactRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_predicate_includes_everything() {
        let record = ContactRecord::new("Amy", "Zed");
        assert!(is_included(None, &record));

        let has_phone: InclusionPredicate =
            Arc::new(|record: &ContactRecord| !record.phone_numbers().is_empty());
        assert!(!is_included(Some(&has_phone), &record));
        assert!(is_included(
            Some(&has_phone),
            &record.clone().with_phone("555", "")
        ));
    }

    #[test]
    fn all_fields_include_postal_addresses() {
        assert_eq!(FetchField::ALL.len(), 9);
        assert!(FetchField::ALL.contains(&FetchField::PostalAddresses));
    }
}
