use shared::domain::ImageId;
use tracing::info;

use crate::{
    error::DemoError,
    selection::{Selection, UploadedFile},
    store::{DemoEvent, DemoStore, InFlight, RunKind, RunOutcome},
};

const NO_CATALOG_IMAGE: &str = "no catalog image selected";
const NO_FILE: &str = "no file selected";
const NO_INPUT: &str = "no input selected";

enum PredictionInput {
    Catalog(ImageId),
    Upload(UploadedFile),
}

impl PredictionInput {
    fn from_catalog(selection: &Selection) -> Result<Self, DemoError> {
        match selection.catalog_id() {
            Some(image_id) if !image_id.is_empty() => Ok(Self::Catalog(image_id.clone())),
            _ => Err(DemoError::Validation(NO_CATALOG_IMAGE)),
        }
    }

    fn from_upload(selection: &Selection) -> Result<Self, DemoError> {
        selection
            .uploaded_file()
            .cloned()
            .map(Self::Upload)
            .ok_or(DemoError::Validation(NO_FILE))
    }

    fn from_any(selection: &Selection) -> Result<Self, DemoError> {
        match selection {
            Selection::Unselected => Err(DemoError::Validation(NO_INPUT)),
            Selection::CatalogImage(_) => Self::from_catalog(selection),
            Selection::Upload(_) => Self::from_upload(selection),
        }
    }
}

impl DemoStore {
    /// Run inference on the selected catalog image.
    pub async fn predict_from_catalog(&self) -> Result<RunOutcome, DemoError> {
        self.run_prediction(PredictionInput::from_catalog).await
    }

    /// Run inference on the selected upload.
    pub async fn predict_from_upload(&self) -> Result<RunOutcome, DemoError> {
        self.run_prediction(PredictionInput::from_upload).await
    }

    /// Run inference on whatever the selection currently holds.
    pub async fn predict_selected(&self) -> Result<RunOutcome, DemoError> {
        self.run_prediction(PredictionInput::from_any).await
    }

    async fn run_prediction(
        &self,
        pick: fn(&Selection) -> Result<PredictionInput, DemoError>,
    ) -> Result<RunOutcome, DemoError> {
        let kind = RunKind::Prediction;
        let started = {
            let mut inner = self.lock();
            let checked = pick(&inner.state.selection)
                .and_then(|input| self.check_overlap(&inner, kind).map(|()| input));
            match checked {
                Err(err) => Err(err),
                Ok(input) => {
                    let token = inner.next_token(kind);
                    // A description belongs to the result it was generated
                    // from, so any in-flight one is invalidated as well.
                    inner.next_token(RunKind::Description);
                    let state = &mut inner.state;
                    state.predicting = true;
                    state.describing = false;
                    state.error = None;
                    state.description = None;
                    state.selected_mask_url = None;
                    Ok((token, input))
                }
            }
        };
        let (token, input) = match started {
            Ok(started) => started,
            Err(err) => return Err(self.record_rejection(kind, err)),
        };
        self.emit(DemoEvent::RunStarted { kind, token });

        let flight = InFlight::new(self, kind, token);
        let outcome = match &input {
            PredictionInput::Catalog(image_id) => {
                info!(image_id = %image_id, token, "predicting catalog image");
                self.api.predict_by_id(image_id).await
            }
            PredictionInput::Upload(file) => {
                info!(
                    file = %file.file_name,
                    size = file.len(),
                    token,
                    "predicting uploaded image"
                );
                self.api.predict_upload(file).await
            }
        };

        self.settle(flight, outcome, |inner, result| {
            // A description started while this run was in flight narrates
            // the previous result.
            inner.next_token(RunKind::Description);
            let state = &mut inner.state;
            state.result = Some(result);
            state.description = None;
            state.describing = false;
            state.selected_mask_url = None;
        })
    }
}
