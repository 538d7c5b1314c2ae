//! The picking session.
//!
//! [`PickerController`] owns all engine state and is driven from a single
//! foreground task. Work that touches the contact store (the access prompt,
//! enumeration and search) runs on spawned tokio tasks; each task sends one
//! [`Completion`] back over a channel and nothing changes until the foreground
//! hands it to [`PickerController::apply`]. Rebuilds and searches carry a
//! [`Generation`] so results of superseded requests are dropped on arrival.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinError;
use tracing::{debug, info, warn};

use crate::directory::{DirectoryIndex, SortOrder};
use crate::error::PickerError;
use crate::filter::{FilterOutcome, SearchFilter};
use crate::generation::{Generation, GenerationCounter};
use crate::permission::{AccessDecision, PermissionGate};
use crate::record::{ContactRecord, SubtitleField};
use crate::selection::SelectionTracker;
use crate::source::{AuthorizationStatus, ContactSource, FetchField, InclusionPredicate};
use crate::view::{PickerView, RowRef};

/// Outward interface of a picking session. Every method is required.
pub trait PickerDelegate {
    /// Access was refused, or the store failed to enumerate or search.
    fn on_fetch_failed(&mut self, error: &PickerError);

    /// The session was cancelled, optionally with a reason.
    fn on_cancelled(&mut self, reason: Option<&PickerError>);

    /// A row was activated in single-select mode.
    fn on_single_selected(&mut self, record: &ContactRecord);

    /// Multi-select commit. Never called with an empty slice.
    fn on_multi_selected(&mut self, records: &[ContactRecord]);
}

#[derive(Clone)]
pub struct PickerConfig {
    pub multi_select: bool,
    pub show_index_bar: bool,
    pub subtitle: SubtitleField,
    pub sort_order: SortOrder,
    pub include: Option<InclusionPredicate>,
    /// Host application named in access-denied messages.
    pub app_name: String,
}

impl Default for PickerConfig {
    fn default() -> Self {
        Self {
            multi_select: false,
            show_index_bar: true,
            subtitle: SubtitleField::PhoneNumber,
            sort_order: SortOrder::SystemDefault,
            include: None,
            app_name: crate::APP_NAME.to_string(),
        }
    }
}

impl std::fmt::Debug for PickerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PickerConfig")
            .field("multi_select", &self.multi_select)
            .field("show_index_bar", &self.show_index_bar)
            .field("subtitle", &self.subtitle)
            .field("sort_order", &self.sort_order)
            .field("include", &self.include.as_ref().map(|_| "<predicate>"))
            .field("app_name", &self.app_name)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickerState {
    /// Not displayed yet, or stopped after a denial or a failed enumeration.
    Idle,
    Loading,
    Ready,
    Searching,
}

/// Result of background work, delivered to the foreground.
#[derive(Debug)]
pub enum Completion {
    AccessResolved {
        status: AuthorizationStatus,
    },
    IndexBuilt {
        generation: Generation,
        result: Result<DirectoryIndex, PickerError>,
    },
    SearchFinished {
        generation: Generation,
        result: Result<FilterOutcome, PickerError>,
    },
}

pub struct PickerController<S, D>
where
    S: ContactSource + 'static,
    D: PickerDelegate,
{
    source: Arc<S>,
    delegate: D,
    config: PickerConfig,
    gate: PermissionGate,
    index: DirectoryIndex,
    filter: SearchFilter,
    selection: SelectionTracker,
    state: PickerState,
    rebuilds: GenerationCounter,
    searches: GenerationCounter,
    tx: UnboundedSender<Completion>,
    rx: UnboundedReceiver<Completion>,
    in_flight: usize,
    displayed: bool,
    finished: bool,
}

impl<S, D> PickerController<S, D>
where
    S: ContactSource + 'static,
    D: PickerDelegate,
{
    pub fn new(source: Arc<S>, delegate: D, config: PickerConfig) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            source,
            delegate,
            gate: PermissionGate::new(config.app_name.clone()),
            config,
            index: DirectoryIndex::default(),
            filter: SearchFilter::new(),
            selection: SelectionTracker::new(),
            state: PickerState::Idle,
            rebuilds: GenerationCounter::new(),
            searches: GenerationCounter::new(),
            tx,
            rx,
            in_flight: 0,
            displayed: false,
            finished: false,
        }
    }

    pub fn state(&self) -> PickerState {
        self.state
    }

    pub fn config(&self) -> &PickerConfig {
        &self.config
    }

    pub fn index(&self) -> &DirectoryIndex {
        &self.index
    }

    pub fn selection(&self) -> &SelectionTracker {
        &self.selection
    }

    pub fn query(&self) -> &str {
        self.filter.query()
    }

    pub fn authorization(&self) -> AuthorizationStatus {
        self.gate.current_status()
    }

    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    pub fn delegate_mut(&mut self) -> &mut D {
        &mut self.delegate
    }

    pub fn into_delegate(self) -> D {
        self.delegate
    }

    /// Whether a selection, commit or cancel has ended the session.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Background tasks whose completions have not been applied yet.
    pub fn pending_work(&self) -> usize {
        self.in_flight
    }

    pub fn view(&self) -> PickerView<'_> {
        PickerView {
            index: &self.index,
            filter: self.filter.view(),
            selection: &self.selection,
            multi_select: self.config.multi_select,
            show_index_bar: self.config.show_index_bar,
            subtitle: self.config.subtitle,
        }
    }

    /// First display: start loading through the permission gate. Also retries
    /// after the session stopped in `Idle`.
    pub fn display(&mut self) {
        if self.finished || self.state != PickerState::Idle {
            return;
        }
        self.displayed = true;
        self.request_rebuild();
    }

    /// Rebuild the index from the store. Selection is kept.
    pub fn reload(&mut self) {
        if self.finished {
            return;
        }
        self.displayed = true;
        self.request_rebuild();
    }

    pub fn set_sort_order(&mut self, order: SortOrder) {
        if self.config.sort_order == order {
            return;
        }
        self.config.sort_order = order;
        if self.displayed && !self.finished {
            self.request_rebuild();
        }
    }

    pub fn set_inclusion(&mut self, include: Option<InclusionPredicate>) {
        self.config.include = include;
        if self.displayed && !self.finished {
            self.request_rebuild();
        }
    }

    /// Update the live filter. A blank query returns to the index view and
    /// invalidates any search still in flight.
    pub fn set_query(&mut self, query: &str) {
        if self.finished {
            return;
        }
        let generation = self.searches.advance();

        if !self.filter.set_query(query) {
            if self.state == PickerState::Searching {
                self.state = PickerState::Ready;
            }
            return;
        }

        match self.state {
            PickerState::Ready | PickerState::Searching => {
                self.state = PickerState::Searching;
                self.issue_search(generation);
            }
            // Issued once the index is ready.
            PickerState::Idle | PickerState::Loading => {
                debug!(query, "deferring search until contacts are loaded")
            }
        }
    }

    /// Activate the row at `at` in the list currently shown.
    pub fn activate(&mut self, at: RowRef) {
        let Some(record) = self.view().record_at(at).cloned() else {
            debug!(section = at.section, row = at.row, "no record at activated row");
            return;
        };
        self.activate_record(&record);
    }

    /// Toggle `record` in multi-select mode, or report it and end the session
    /// in single-select mode.
    pub fn activate_record(&mut self, record: &ContactRecord) {
        if self.finished {
            return;
        }
        if self.config.multi_select {
            let selected = self.selection.toggle(record);
            debug!(name = %record.display_name(), selected, "toggled selection");
        } else {
            self.finished = true;
            self.delegate.on_single_selected(record);
        }
    }

    /// Commit the multi-select selection. An empty selection reports nothing
    /// and leaves the session open.
    pub fn done(&mut self) {
        if self.finished || !self.config.multi_select {
            return;
        }
        if self.selection.is_empty() {
            debug!("nothing selected; ignoring commit");
            return;
        }
        self.finished = true;
        self.delegate.on_multi_selected(self.selection.members());
    }

    pub fn cancel(&mut self) {
        self.finish_cancelled(None);
    }

    pub fn cancel_with(&mut self, reason: PickerError) {
        self.finish_cancelled(Some(reason));
    }

    /// Leaving multi-select drops the current selection.
    pub fn set_multi_select(&mut self, enabled: bool) {
        if self.config.multi_select && !enabled {
            self.selection.reset();
        }
        self.config.multi_select = enabled;
    }

    pub fn reset_selection(&mut self) {
        self.selection.reset();
    }

    /// Wait for the next background completion.
    pub async fn next_completion(&mut self) -> Option<Completion> {
        if self.in_flight == 0 {
            return None;
        }
        self.rx.recv().await
    }

    /// Apply completions until no background work is outstanding.
    pub async fn settle(&mut self) {
        while let Some(completion) = self.next_completion().await {
            self.apply(completion);
        }
    }

    /// Fold a background result into the engine state.
    pub fn apply(&mut self, completion: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);
        if self.finished {
            debug!("session finished; dropping completion");
            return;
        }

        match completion {
            Completion::AccessResolved { status } => self.on_access_resolved(status),
            Completion::IndexBuilt { generation, result } => {
                self.on_index_built(generation, result)
            }
            Completion::SearchFinished { generation, result } => {
                self.on_search_finished(generation, result)
            }
        }
    }

    fn finish_cancelled(&mut self, reason: Option<PickerError>) {
        if self.finished {
            return;
        }
        self.finished = true;
        info!("picker cancelled");
        self.delegate.on_cancelled(reason.as_ref());
    }

    fn request_rebuild(&mut self) {
        let generation = self.rebuilds.advance();
        self.state = PickerState::Loading;
        if self.gate_ready() {
            self.spawn_enumeration(generation);
        }
    }

    /// Whether records may be read now. Otherwise a denial has been reported,
    /// or a prompt is outstanding and its answer will start the rebuild.
    fn gate_ready(&mut self) -> bool {
        match self.gate.check(&*self.source) {
            AccessDecision::Ready => true,
            AccessDecision::Denied(err) => {
                self.fail(err);
                false
            }
            AccessDecision::Prompt => {
                self.state = PickerState::Loading;
                self.spawn_prompt();
                false
            }
            AccessDecision::Pending => {
                self.state = PickerState::Loading;
                false
            }
        }
    }

    fn issue_search(&mut self, generation: Generation) {
        if !self.gate_ready() {
            return;
        }
        let query = self.filter.query().to_string();
        self.spawn_search(generation, query);
    }

    fn fail(&mut self, err: PickerError) {
        warn!("{err}");
        self.state = PickerState::Idle;
        self.delegate.on_fetch_failed(&err);
    }

    fn on_access_resolved(&mut self, status: AuthorizationStatus) {
        match self.gate.resolve_prompt(status) {
            Ok(()) => {
                let generation = self.rebuilds.latest();
                self.spawn_enumeration(generation);
            }
            Err(err) => self.fail(err),
        }
    }

    fn on_index_built(
        &mut self,
        generation: Generation,
        result: Result<DirectoryIndex, PickerError>,
    ) {
        if !self.rebuilds.is_current(generation) {
            debug!(%generation, latest = %self.rebuilds.latest(), "dropping stale index");
            return;
        }

        match result {
            Ok(index) => {
                info!(
                    records = index.len(),
                    sections = index.keys().len(),
                    "contacts indexed"
                );
                self.index = index;
                if self.filter.is_active() {
                    self.state = PickerState::Searching;
                    let generation = self.searches.advance();
                    self.issue_search(generation);
                } else {
                    self.state = PickerState::Ready;
                }
            }
            Err(err) => self.fail(err),
        }
    }

    fn on_search_finished(
        &mut self,
        generation: Generation,
        result: Result<FilterOutcome, PickerError>,
    ) {
        if !self.searches.is_current(generation) || !self.filter.is_active() {
            debug!(%generation, "dropping stale search results");
            return;
        }

        match result {
            Ok(outcome) => self.filter.store(outcome),
            Err(err) => {
                warn!("{err}");
                self.filter.clear_results();
                self.delegate.on_fetch_failed(&err);
            }
        }
    }

    fn spawn_prompt(&mut self) {
        let source = Arc::clone(&self.source);
        debug!("requesting contacts access");
        self.spawn_task(
            async move { source.request_access().await },
            |outcome| Completion::AccessResolved {
                status: outcome.unwrap_or_else(|err| {
                    warn!("access prompt task failed: {err}");
                    AuthorizationStatus::Undetermined
                }),
            },
        );
    }

    fn spawn_enumeration(&mut self, generation: Generation) {
        let source = Arc::clone(&self.source);
        let include = self.config.include.clone();
        let order = self
            .config
            .sort_order
            .resolve(self.source.default_sort_order());
        debug!(%generation, ?order, "rebuilding index");
        self.spawn_task(
            async move {
                source
                    .enumerate_all(FetchField::ALL, None)
                    .await
                    .map(|records| DirectoryIndex::build(records, order, include.as_ref()))
                    .map_err(|err| PickerError::enumeration(&err))
            },
            move |outcome| Completion::IndexBuilt {
                generation,
                result: outcome.unwrap_or_else(|err| {
                    Err(PickerError::EnumerationFailed {
                        message: format!("enumeration task failed: {err}"),
                    })
                }),
            },
        );
    }

    fn spawn_search(&mut self, generation: Generation, query: String) {
        let source = Arc::clone(&self.source);
        let include = self.config.include.clone();
        debug!(%generation, query = %query, "searching contacts");
        self.spawn_task(
            async move { SearchFilter::apply(&*source, &query, include.as_ref()).await },
            move |outcome| Completion::SearchFinished {
                generation,
                result: outcome.unwrap_or_else(|err| {
                    Err(PickerError::SearchFailed {
                        message: format!("search task failed: {err}"),
                    })
                }),
            },
        );
    }

    /// Run `work` on its own task. Exactly one completion is sent back, built
    /// by `complete`, even when `work` panics.
    fn spawn_task<T, F, C>(&mut self, work: F, complete: C)
    where
        T: Send + 'static,
        F: Future<Output = T> + Send + 'static,
        C: FnOnce(Result<T, JoinError>) -> Completion + Send + 'static,
    {
        let tx = self.tx.clone();
        self.in_flight += 1;
        tokio::spawn(async move {
            let outcome = tokio::spawn(work).await;
            let _ = tx.send(complete(outcome));
        });
    }
}
