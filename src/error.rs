use thiserror::Error;

/// Failures the picker reports outward through its delegate.
///
/// Source errors arrive as `anyhow::Error` and are flattened into a message at
/// the engine boundary so a single value can be handed to the delegate and
/// kept for inspection.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PickerError {
    /// Access was refused at the prompt, or the source reports it as denied
    /// or restricted.
    #[error("{message}")]
    AccessDenied { message: String },

    /// Enumerating the contact store failed. The previous index is kept.
    #[error("failed to fetch contacts: {message}")]
    EnumerationFailed { message: String },

    /// Running a query against the contact store failed.
    #[error("failed to search contacts: {message}")]
    SearchFailed { message: String },
}

impl PickerError {
    pub fn enumeration(err: &anyhow::Error) -> Self {
        PickerError::EnumerationFailed {
            message: format!("{err:#}"),
        }
    }

    pub fn search(err: &anyhow::Error) -> Self {
        PickerError::SearchFailed {
            message: format!("{err:#}"),
        }
    }

    pub fn is_access_denied(&self) -> bool {
        matches!(self, PickerError::AccessDenied { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{anyhow, Context};

    #[test]
    fn enumeration_error_keeps_context_chain() {
        let err = Err::<(), _>(anyhow!("store busy"))
            .context("reading address book")
            .unwrap_err();
        let picker = PickerError::enumeration(&err);
        assert_eq!(
            picker.to_string(),
            "failed to fetch contacts: reading address book: store busy"
        );
    }

    #[test]
    fn access_denied_displays_message_verbatim() {
        let err = PickerError::AccessDenied {
            message: "No Contacts Access".to_string(),
        };
        assert_eq!(err.to_string(), "No Contacts Access");
        assert!(err.is_access_denied());
    }
}
