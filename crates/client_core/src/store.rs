//! Demo state store: the single source of truth the presentation layer reads.
//!
//! State lives behind a plain mutex that is only held for short synchronous
//! updates, never across a backend call. Each orchestrator stamps its
//! invocation with a monotonically increasing token; a response that comes
//! back after a newer invocation (or a cancel) is dropped instead of being
//! committed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use shared::{
    domain::{ClassMask, ImageId, ModelInfo, TestImage},
    protocol::{DescribeResponse, PredictResponse},
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::{
    bootstrap::{load_catalog, Catalog},
    config::OverlapPolicy,
    error::{DemoError, TransportError},
    selection::{Selection, UploadedFile},
    transport::SegmentationApi,
};

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Default)]
pub struct DemoState {
    pub catalog: Catalog,
    pub selection: Selection,
    pub result: Option<PredictResponse>,
    pub description: Option<DescribeResponse>,
    pub selected_mask_url: Option<String>,
    pub predicting: bool,
    pub describing: bool,
    pub error: Option<String>,
}

impl DemoState {
    pub fn models(&self) -> &[ModelInfo] {
        &self.catalog.models
    }

    pub fn test_images(&self) -> &[TestImage] {
        &self.catalog.images
    }

    pub fn selected_model(&self) -> Option<&ModelInfo> {
        self.catalog.primary_model()
    }

    pub fn selected_image(&self) -> Option<&TestImage> {
        self.selection.selected_catalog_image(&self.catalog.images)
    }

    pub fn input_display_name(&self) -> Option<&str> {
        self.selection.display_name(&self.catalog.images)
    }

    pub fn selected_mask(&self) -> Option<&ClassMask> {
        let mask_url = self.selected_mask_url.as_deref()?;
        self.result.as_ref()?.mask_by_url(mask_url)
    }

    pub fn class_masks(&self) -> &[ClassMask] {
        self.result
            .as_ref()
            .map(|result| result.class_masks.as_slice())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    Prediction,
    Description,
}

impl RunKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Prediction => "prediction",
            Self::Description => "description",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DemoEvent {
    SelectionChanged,
    MaskSelected(Option<String>),
    RunStarted { kind: RunKind, token: u64 },
    RunCommitted { kind: RunKind, token: u64 },
    RunFailed { kind: RunKind, message: String },
    RunDiscarded { kind: RunKind, token: u64 },
    RunCancelled { kind: RunKind, token: u64 },
}

/// How an orchestrator invocation ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Committed,
    /// A newer invocation or a cancel superseded this one; nothing was written.
    Discarded,
    /// Preconditions for a request were not met; nothing happened.
    Skipped,
}

pub(crate) struct StoreInner {
    pub(crate) state: DemoState,
    pub(crate) prediction_token: u64,
    pub(crate) description_token: u64,
}

impl StoreInner {
    pub(crate) fn token(&self, kind: RunKind) -> u64 {
        match kind {
            RunKind::Prediction => self.prediction_token,
            RunKind::Description => self.description_token,
        }
    }

    pub(crate) fn next_token(&mut self, kind: RunKind) -> u64 {
        let token = match kind {
            RunKind::Prediction => &mut self.prediction_token,
            RunKind::Description => &mut self.description_token,
        };
        *token += 1;
        *token
    }

    pub(crate) fn busy(&self, kind: RunKind) -> bool {
        match kind {
            RunKind::Prediction => self.state.predicting,
            RunKind::Description => self.state.describing,
        }
    }

    pub(crate) fn set_busy(&mut self, kind: RunKind, busy: bool) {
        match kind {
            RunKind::Prediction => self.state.predicting = busy,
            RunKind::Description => self.state.describing = busy,
        }
    }
}

pub struct DemoStore {
    pub(crate) api: Arc<dyn SegmentationApi>,
    pub(crate) overlap_policy: OverlapPolicy,
    inner: Mutex<StoreInner>,
    events: broadcast::Sender<DemoEvent>,
}

impl DemoStore {
    /// Load both catalogs and build the store. There is no store, and so no
    /// selection or prediction, until this succeeds.
    pub async fn bootstrap(
        api: Arc<dyn SegmentationApi>,
        overlap_policy: OverlapPolicy,
    ) -> Result<Self, DemoError> {
        let catalog = load_catalog(api.as_ref()).await?;
        Ok(Self::new(api, catalog, overlap_policy))
    }

    pub fn new(
        api: Arc<dyn SegmentationApi>,
        catalog: Catalog,
        overlap_policy: OverlapPolicy,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let state = DemoState {
            selection: catalog.default_selection(),
            catalog,
            ..DemoState::default()
        };
        Self {
            api,
            overlap_policy,
            inner: Mutex::new(StoreInner {
                state,
                prediction_token: 0,
                description_token: 0,
            }),
            events,
        }
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn emit(&self, event: DemoEvent) {
        let _ = self.events.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DemoEvent> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> DemoState {
        self.lock().state.clone()
    }

    pub fn choose_catalog_image(&self, image_id: impl Into<ImageId>) {
        self.lock().state.selection.choose_catalog_image(image_id);
        self.emit(DemoEvent::SelectionChanged);
    }

    pub fn choose_uploaded_file(&self, file: Option<UploadedFile>) {
        self.lock().state.selection.choose_uploaded_file(file);
        self.emit(DemoEvent::SelectionChanged);
    }

    /// Highlight one of the current result's masks. Unknown URLs are
    /// rejected and leave the highlight as it was.
    pub fn select_mask(&self, mask_url: &str) -> Result<(), DemoError> {
        {
            let mut inner = self.lock();
            let known = inner
                .state
                .result
                .as_ref()
                .is_some_and(|result| result.mask_by_url(mask_url).is_some());
            if !known {
                return Err(DemoError::UnknownMask(mask_url.to_string()));
            }
            inner.state.selected_mask_url = Some(mask_url.to_string());
        }
        self.emit(DemoEvent::MaskSelected(Some(mask_url.to_string())));
        Ok(())
    }

    pub fn clear_mask(&self) {
        self.lock().state.selected_mask_url = None;
        self.emit(DemoEvent::MaskSelected(None));
    }

    /// Abandon the in-flight prediction. Its response is discarded on arrival.
    pub fn cancel_prediction(&self) -> bool {
        self.cancel(RunKind::Prediction)
    }

    pub fn cancel_description(&self) -> bool {
        self.cancel(RunKind::Description)
    }

    fn cancel(&self, kind: RunKind) -> bool {
        let token = {
            let mut inner = self.lock();
            if !inner.busy(kind) {
                return false;
            }
            inner.set_busy(kind, false);
            inner.next_token(kind)
        };
        info!(kind = kind.as_str(), token, "in-flight run cancelled");
        self.emit(DemoEvent::RunCancelled { kind, token });
        true
    }

    pub(crate) fn check_overlap(
        &self,
        inner: &StoreInner,
        kind: RunKind,
    ) -> Result<(), DemoError> {
        if inner.busy(kind) && self.overlap_policy == OverlapPolicy::Reject {
            debug!(kind = kind.as_str(), "rejecting overlapping invocation");
            return Err(DemoError::Busy(kind.as_str()));
        }
        Ok(())
    }

    pub(crate) fn record_rejection(&self, kind: RunKind, err: DemoError) -> DemoError {
        let message = err.to_string();
        warn!(kind = kind.as_str(), error = %message, "run rejected");
        self.lock().state.error = Some(message.clone());
        self.emit(DemoEvent::RunFailed { kind, message });
        err
    }

    /// Commit the response of invocation `token`, unless it has been
    /// superseded. Clears the busy flag on the way out.
    pub(crate) fn settle<T>(
        &self,
        mut flight: InFlight<'_>,
        outcome: Result<T, TransportError>,
        apply: impl FnOnce(&mut StoreInner, T),
    ) -> Result<RunOutcome, DemoError> {
        flight.disarm();
        let (kind, token) = (flight.kind, flight.token);

        let mut inner = self.lock();
        if inner.token(kind) != token {
            drop(inner);
            debug!(kind = kind.as_str(), token, "discarding stale response");
            self.emit(DemoEvent::RunDiscarded { kind, token });
            return Ok(RunOutcome::Discarded);
        }

        inner.set_busy(kind, false);
        match outcome {
            Ok(value) => {
                apply(&mut *inner, value);
                drop(inner);
                info!(kind = kind.as_str(), token, "run committed");
                self.emit(DemoEvent::RunCommitted { kind, token });
                Ok(RunOutcome::Committed)
            }
            Err(err) => {
                let err = DemoError::from(err);
                let message = err.to_string();
                inner.state.error = Some(message.clone());
                drop(inner);
                warn!(kind = kind.as_str(), token, error = %message, "run failed");
                self.emit(DemoEvent::RunFailed { kind, message });
                Err(err)
            }
        }
    }
}

/// Holds an orchestrator's busy flag for one invocation. If the invocation
/// future is dropped before [`DemoStore::settle`] runs, the flag is released
/// here, provided no newer invocation owns it.
pub(crate) struct InFlight<'a> {
    store: &'a DemoStore,
    kind: RunKind,
    token: u64,
    armed: bool,
}

impl<'a> InFlight<'a> {
    pub(crate) fn new(store: &'a DemoStore, kind: RunKind, token: u64) -> Self {
        Self {
            store,
            kind,
            token,
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.store.lock();
        if inner.token(self.kind) == self.token {
            inner.set_busy(self.kind, false);
            debug!(
                kind = self.kind.as_str(),
                token = self.token,
                "released busy flag of abandoned run"
            );
        }
    }
}

#[cfg(test)]
#[path = "tests/store_tests.rs"]
mod tests;
