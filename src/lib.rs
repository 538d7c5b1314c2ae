//! Searchable, alphabetically sectioned contact picking.
//!
//! The engine reads records from a [`ContactSource`](source::ContactSource)
//! behind a [`PermissionGate`](permission::PermissionGate), groups them into a
//! [`DirectoryIndex`](directory::DirectoryIndex), filters them live with
//! [`SearchFilter`](filter::SearchFilter) and tracks choices with
//! [`SelectionTracker`](selection::SelectionTracker). A
//! [`PickerController`](picker::PickerController) ties these together and
//! reports outcomes to a [`PickerDelegate`](picker::PickerDelegate).

pub mod config;
pub mod directory;
pub mod error;
pub mod filter;
pub mod generation;
pub mod permission;
pub mod photo;
pub mod picker;
pub mod record;
pub mod search;
pub mod selection;
pub mod source;
pub mod vcard_io;
pub mod vdir;
pub mod view;

/// Default host application name, also used for config and cache paths.
pub const APP_NAME: &str = "contact-picker";

pub use directory::{DirectoryIndex, SortOrder};
pub use error::PickerError;
pub use picker::{Completion, PickerConfig, PickerController, PickerDelegate, PickerState};
pub use record::{ContactRecord, LabeledValue, PostalAddress, SubtitleField};
pub use source::{AuthorizationStatus, ContactSource, FetchField, InclusionPredicate};
pub use view::{PickerView, RowRef, RowView};
