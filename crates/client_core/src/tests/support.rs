//! Fixtures shared by the transport and store tests.

use std::{collections::VecDeque, sync::Mutex};

use async_trait::async_trait;
use serde_json::{json, Value};
use shared::{
    domain::{ImageId, ModelInfo, TestImage},
    protocol::{DescribeRequest, DescribeResponse, HealthResponse, PredictResponse},
};
use tokio::sync::oneshot;

use crate::{error::TransportError, selection::UploadedFile, transport::SegmentationApi};

pub(crate) fn prediction_json(tag: &str, top_classes: usize, masks: usize) -> Value {
    let labels = ["wall", "floor", "ceiling", "bed", "window", "table"];
    let top: Vec<Value> = labels
        .iter()
        .take(top_classes)
        .enumerate()
        .map(|(idx, label)| json!({"class_id": idx, "label": label, "confidence": 0.9 - idx as f64 * 0.1}))
        .collect();
    let areas: Vec<Value> = labels
        .iter()
        .take(top_classes)
        .enumerate()
        .map(|(idx, label)| json!({"class_id": idx, "label": label, "area_ratio": 40.0 - idx as f64 * 5.0}))
        .collect();
    let class_masks: Vec<Value> = labels
        .iter()
        .take(masks)
        .enumerate()
        .map(|(idx, label)| {
            json!({"class_id": idx, "label": label, "mask_url": format!("/static/results/{tag}_mask_{label}.png")})
        })
        .collect();
    let label_rows: Vec<Value> = top
        .iter()
        .map(|row| json!({"class_id": row["class_id"], "label": row["label"]}))
        .collect();

    json!({
        "model_key": "ade20k_official",
        "model_hf_id": "facebook/mask2former-swin-large-ade-semantic",
        "inference_ms": 734.21,
        "original_url": format!("/static/results/{tag}_orig.png"),
        "overlay_url": format!("/static/results/{tag}_overlay.png"),
        "labels": label_rows,
        "top_classes": top,
        "area_stats": areas,
        "class_masks": class_masks,
        "width": 683,
        "height": 512
    })
}

pub(crate) fn prediction(tag: &str, top_classes: usize, masks: usize) -> PredictResponse {
    serde_json::from_value(prediction_json(tag, top_classes, masks)).expect("fixture prediction")
}

pub(crate) fn description(summary: &str) -> DescribeResponse {
    DescribeResponse {
        summary_ja: summary.to_string(),
        highlights: vec!["wall dominates the frame".into()],
        cautions: vec!["small objects may be missed".into()],
    }
}

pub(crate) fn catalog_images(ids: &[&str]) -> Vec<TestImage> {
    ids.iter()
        .map(|id| TestImage {
            id: ImageId::from(*id),
            name: id.to_string(),
            thumbnail_url: format!("/static/test_images/{id}.jpg"),
            image_url: format!("/static/test_images/{id}.jpg"),
            tags: vec!["ade20k".into(), "validation".into()],
        })
        .collect()
}

pub(crate) fn ade20k_model() -> ModelInfo {
    serde_json::from_value(json!({
        "model_key": "ade20k_official",
        "hf_id": "facebook/mask2former-swin-large-ade-semantic",
        "label_space": "ADE20K-150",
        "note": "Official Mask2Former checkpoint on ADE20K semantic segmentation."
    }))
    .expect("fixture model")
}

pub(crate) fn http_error(status: u16, message: &str) -> TransportError {
    TransportError::Http {
        status,
        url: "http://scripted.test".into(),
        message: message.into(),
    }
}

pub(crate) fn parse_error() -> TransportError {
    TransportError::Parse {
        status: 200,
        url: "http://scripted.test".into(),
        content_type: "text/html".into(),
        source: serde_json::from_str::<Value>("<html>").unwrap_err(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum ApiCall {
    Health,
    ListModels,
    ListTestImages,
    PredictById(ImageId),
    PredictUpload(String),
    Describe(DescribeRequest),
}

pub(crate) enum Scripted<T> {
    Ready(Result<T, TransportError>),
    Gated(oneshot::Receiver<Result<T, TransportError>>),
}

impl<T> Scripted<T> {
    async fn resolve(self) -> Result<T, TransportError> {
        match self {
            Self::Ready(outcome) => outcome,
            Self::Gated(rx) => rx
                .await
                .unwrap_or_else(|_| Err(http_error(599, "gate dropped"))),
        }
    }
}

/// In-memory backend with queued responses. Records every call it receives.
#[derive(Default)]
pub(crate) struct ScriptedApi {
    models: Vec<ModelInfo>,
    images: Vec<TestImage>,
    fail_images_with: Option<(u16, String)>,
    calls: Mutex<Vec<ApiCall>>,
    predictions: Mutex<VecDeque<Scripted<PredictResponse>>>,
    descriptions: Mutex<VecDeque<Scripted<DescribeResponse>>>,
}

impl ScriptedApi {
    pub(crate) fn with_catalog(ids: &[&str]) -> Self {
        Self {
            models: vec![ade20k_model()],
            images: catalog_images(ids),
            ..Self::default()
        }
    }

    pub(crate) fn failing_images(mut self, status: u16, message: &str) -> Self {
        self.fail_images_with = Some((status, message.to_string()));
        self
    }

    pub(crate) fn push_prediction(&self, outcome: Result<PredictResponse, TransportError>) {
        self.predictions
            .lock()
            .unwrap()
            .push_back(Scripted::Ready(outcome));
    }

    pub(crate) fn gate_prediction(&self) -> oneshot::Sender<Result<PredictResponse, TransportError>> {
        let (tx, rx) = oneshot::channel();
        self.predictions.lock().unwrap().push_back(Scripted::Gated(rx));
        tx
    }

    pub(crate) fn push_description(&self, outcome: Result<DescribeResponse, TransportError>) {
        self.descriptions
            .lock()
            .unwrap()
            .push_back(Scripted::Ready(outcome));
    }

    pub(crate) fn gate_description(
        &self,
    ) -> oneshot::Sender<Result<DescribeResponse, TransportError>> {
        let (tx, rx) = oneshot::channel();
        self.descriptions.lock().unwrap().push_back(Scripted::Gated(rx));
        tx
    }

    pub(crate) fn calls(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn network_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl SegmentationApi for ScriptedApi {
    async fn health(&self) -> Result<HealthResponse, TransportError> {
        self.record(ApiCall::Health);
        Ok(HealthResponse {
            status: "ok".into(),
        })
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, TransportError> {
        self.record(ApiCall::ListModels);
        Ok(self.models.clone())
    }

    async fn list_test_images(&self) -> Result<Vec<TestImage>, TransportError> {
        self.record(ApiCall::ListTestImages);
        match &self.fail_images_with {
            Some((status, message)) => Err(http_error(*status, message)),
            None => Ok(self.images.clone()),
        }
    }

    async fn predict_by_id(&self, image_id: &ImageId) -> Result<PredictResponse, TransportError> {
        self.record(ApiCall::PredictById(image_id.clone()));
        let next = self.predictions.lock().unwrap().pop_front();
        match next {
            Some(scripted) => scripted.resolve().await,
            None => Err(http_error(500, "no scripted prediction")),
        }
    }

    async fn predict_upload(&self, file: &UploadedFile) -> Result<PredictResponse, TransportError> {
        self.record(ApiCall::PredictUpload(file.file_name.clone()));
        let next = self.predictions.lock().unwrap().pop_front();
        match next {
            Some(scripted) => scripted.resolve().await,
            None => Err(http_error(500, "no scripted prediction")),
        }
    }

    async fn describe(
        &self,
        request: &DescribeRequest,
    ) -> Result<DescribeResponse, TransportError> {
        self.record(ApiCall::Describe(request.clone()));
        let next = self.descriptions.lock().unwrap().pop_front();
        match next {
            Some(scripted) => scripted.resolve().await,
            None => Err(http_error(500, "no scripted description")),
        }
    }
}
