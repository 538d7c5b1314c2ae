//! Authorization handshake with the contact store.
//!
//! Every record read goes through [`PermissionGate`]. The gate caches the
//! store's authorization status and owns the one-time user prompt:
//! `Undetermined` moves to `Authorized` or `Denied` only through that prompt.
//! `Denied` and `Restricted` stay put until the store itself reports a
//! different status.

use tracing::{debug, info};

use crate::error::PickerError;
use crate::source::{AuthorizationStatus, ContactSource};

/// Reported when the user refuses (or dismisses) the access prompt.
pub const NO_ACCESS_MESSAGE: &str = "No Contacts Access";

/// What the caller must do next to read records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AccessDecision {
    /// Records may be read now.
    Ready,
    /// Access is refused; report the error and stop.
    Denied(PickerError),
    /// The user has to be asked. Run the store's prompt and hand its answer
    /// to [`PermissionGate::resolve_prompt`].
    Prompt,
    /// A prompt is already outstanding; wait for its answer.
    Pending,
}

#[derive(Debug)]
pub struct PermissionGate {
    status: AuthorizationStatus,
    app_name: String,
    prompting: bool,
}

impl PermissionGate {
    /// `app_name` names the host application in the remediation message.
    pub fn new(app_name: impl Into<String>) -> Self {
        Self {
            status: AuthorizationStatus::Undetermined,
            app_name: app_name.into(),
            prompting: false,
        }
    }

    /// Cached status. Does not consult the store.
    pub fn current_status(&self) -> AuthorizationStatus {
        self.status
    }

    /// Refresh the cached status from `source` and decide how to proceed.
    ///
    /// Returning [`AccessDecision::Prompt`] marks the prompt as outstanding;
    /// later calls return [`AccessDecision::Pending`] until it is resolved.
    pub fn check<S>(&mut self, source: &S) -> AccessDecision
    where
        S: ContactSource + ?Sized,
    {
        if self.prompting {
            return AccessDecision::Pending;
        }

        let reported = source.check_authorization();
        if reported != self.status {
            info!(
                from = self.status.as_str(),
                to = reported.as_str(),
                "contacts authorization changed"
            );
            self.status = reported;
        }

        match self.status {
            AuthorizationStatus::Authorized => AccessDecision::Ready,
            AuthorizationStatus::Denied | AuthorizationStatus::Restricted => {
                AccessDecision::Denied(self.denied_error())
            }
            AuthorizationStatus::Undetermined => {
                self.prompting = true;
                AccessDecision::Prompt
            }
        }
    }

    /// Apply the answer of the access prompt.
    pub fn resolve_prompt(&mut self, answer: AuthorizationStatus) -> Result<(), PickerError> {
        if !self.prompting {
            debug!(answer = answer.as_str(), "ignoring prompt answer with no prompt outstanding");
            return match self.status {
                AuthorizationStatus::Authorized => Ok(()),
                AuthorizationStatus::Denied | AuthorizationStatus::Restricted => {
                    Err(self.denied_error())
                }
                AuthorizationStatus::Undetermined => Err(no_access()),
            };
        }
        self.prompting = false;

        match answer {
            AuthorizationStatus::Authorized => {
                info!("contacts access granted");
                self.status = AuthorizationStatus::Authorized;
                Ok(())
            }
            AuthorizationStatus::Denied | AuthorizationStatus::Restricted => {
                info!(status = answer.as_str(), "contacts access refused");
                self.status = answer;
                Err(no_access())
            }
            // Dismissed without an answer: ask again on the next check.
            AuthorizationStatus::Undetermined => Err(no_access()),
        }
    }

    /// Check access, prompting the user through `source` when needed.
    ///
    /// `Ok` means records may be read. An outstanding prompt abandoned by a
    /// dropped caller is replaced with a fresh one.
    pub async fn ensure_access<S>(&mut self, source: &S) -> Result<(), PickerError>
    where
        S: ContactSource + ?Sized,
    {
        match self.check(source) {
            AccessDecision::Ready => Ok(()),
            AccessDecision::Denied(err) => Err(err),
            AccessDecision::Prompt | AccessDecision::Pending => {
                self.prompting = true;
                let answer = source.request_access().await;
                self.resolve_prompt(answer)
            }
        }
    }

    fn denied_error(&self) -> PickerError {
        PickerError::AccessDenied {
            message: format!(
                "{} does not have access to contacts. Kindly enable it in privacy settings",
                self.app_name
            ),
        }
    }
}

fn no_access() -> PickerError {
    PickerError::AccessDenied {
        message: NO_ACCESS_MESSAGE.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::MemorySource;

    fn undetermined(grant: bool) -> MemorySource {
        MemorySource::new(Vec::new())
            .with_status(AuthorizationStatus::Undetermined)
            .with_prompt_answer(grant)
    }

    #[test]
    fn starts_undetermined_without_side_effects() {
        let gate = PermissionGate::new("Demo");
        assert_eq!(gate.current_status(), AuthorizationStatus::Undetermined);
        assert!(!gate.prompting);
    }

    #[test]
    fn authorized_source_is_ready() {
        let source = MemorySource::new(Vec::new());
        let mut gate = PermissionGate::new("Demo");
        assert_eq!(gate.check(&source), AccessDecision::Ready);
        assert_eq!(gate.current_status(), AuthorizationStatus::Authorized);
    }

    #[test]
    fn denied_and_restricted_name_the_host_application() {
        for status in [AuthorizationStatus::Denied, AuthorizationStatus::Restricted] {
            let source = MemorySource::new(Vec::new()).with_status(status);
            let mut gate = PermissionGate::new("Demo");
            match gate.check(&source) {
                AccessDecision::Denied(PickerError::AccessDenied { message }) => {
                    assert!(message.starts_with("Demo does not have access to contacts"));
                    assert!(message.contains("privacy settings"));
                }
                other => panic!("unexpected decision: {other:?}"),
            }
            assert_eq!(source.prompt_count(), 0);
        }
    }

    #[test]
    fn second_check_while_prompting_is_pending() {
        let source = undetermined(true);
        let mut gate = PermissionGate::new("Demo");
        assert_eq!(gate.check(&source), AccessDecision::Prompt);
        assert_eq!(gate.check(&source), AccessDecision::Pending);
        assert!(gate.resolve_prompt(AuthorizationStatus::Authorized).is_ok());
        assert_eq!(gate.current_status(), AuthorizationStatus::Authorized);
    }

    #[test]
    fn denied_stays_denied_until_store_reports_change() {
        let source = MemorySource::new(Vec::new()).with_status(AuthorizationStatus::Denied);
        let mut gate = PermissionGate::new("Demo");
        assert!(matches!(gate.check(&source), AccessDecision::Denied(_)));
        assert!(matches!(gate.check(&source), AccessDecision::Denied(_)));

        source.set_status(AuthorizationStatus::Authorized);
        assert_eq!(gate.check(&source), AccessDecision::Ready);
    }

    #[tokio::test]
    async fn prompt_grant_transitions_to_authorized() {
        let source = undetermined(true);
        let mut gate = PermissionGate::new("Demo");
        assert_eq!(gate.ensure_access(&source).await, Ok(()));
        assert_eq!(gate.current_status(), AuthorizationStatus::Authorized);
        assert_eq!(gate.ensure_access(&source).await, Ok(()));
        assert_eq!(source.prompt_count(), 1);
    }

    #[tokio::test]
    async fn prompt_refusal_reports_no_access_and_is_terminal() {
        let source = undetermined(false);
        let mut gate = PermissionGate::new("Demo");
        let err = gate.ensure_access(&source).await.unwrap_err();
        assert_eq!(err.to_string(), NO_ACCESS_MESSAGE);
        assert_eq!(gate.current_status(), AuthorizationStatus::Denied);

        let again = gate.ensure_access(&source).await.unwrap_err();
        assert!(again.to_string().contains("privacy settings"));
        assert_eq!(source.prompt_count(), 1);
    }

    #[test]
    fn dismissed_prompt_is_asked_again() {
        let source = undetermined(true);
        let mut gate = PermissionGate::new("Demo");
        assert_eq!(gate.check(&source), AccessDecision::Prompt);
        assert!(gate.resolve_prompt(AuthorizationStatus::Undetermined).is_err());
        assert_eq!(gate.current_status(), AuthorizationStatus::Undetermined);
        assert_eq!(gate.check(&source), AccessDecision::Prompt);
    }
}
