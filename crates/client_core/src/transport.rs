//! HTTP transport to the segmentation backend.
//!
//! Every response body is decoded as JSON before the status is inspected, so
//! a non-JSON error page surfaces as [`TransportError::Parse`] rather than as
//! an HTTP failure with a made up message.

use std::{
    sync::Arc,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use reqwest::{header::CONTENT_TYPE, multipart, Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Deserialize};
use serde_json::Value;
use shared::{
    domain::{ImageId, ModelInfo, TestImage, MODEL_KEY_ADE20K},
    error::ErrorBody,
    protocol::{
        DescribeRequest, DescribeResponse, HealthResponse, ModelsResponse, PredictByIdRequest,
        PredictResponse, TestImagesResponse,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::{
    config::Settings,
    diagnostics::{sink_from_settings, DiagnosticEvent, DiagnosticSink, RequestStage},
    error::{ConfigError, TransportError},
    selection::UploadedFile,
};

const HEALTH_FALLBACK: &str = "health check failed";
const MODELS_FALLBACK: &str = "failed to fetch model catalog";
const TEST_IMAGES_FALLBACK: &str = "failed to fetch test image catalog";
const PREDICT_FALLBACK: &str = "inference failed";
const DESCRIBE_FALLBACK: &str = "description generation failed";

#[async_trait]
pub trait SegmentationApi: Send + Sync {
    async fn health(&self) -> Result<HealthResponse, TransportError>;
    async fn list_models(&self) -> Result<Vec<ModelInfo>, TransportError>;
    async fn list_test_images(&self) -> Result<Vec<TestImage>, TransportError>;
    async fn predict_by_id(&self, image_id: &ImageId) -> Result<PredictResponse, TransportError>;
    async fn predict_upload(&self, file: &UploadedFile) -> Result<PredictResponse, TransportError>;
    async fn describe(&self, request: &DescribeRequest)
        -> Result<DescribeResponse, TransportError>;
}

pub struct HttpTransport {
    http: Client,
    api_base: String,
    request_timeout: Duration,
    diagnostics: Arc<dyn DiagnosticSink>,
}

impl HttpTransport {
    pub fn new(settings: &Settings) -> Result<Self, ConfigError> {
        Self::with_diagnostics(settings, sink_from_settings(settings))
    }

    pub fn with_diagnostics(
        settings: &Settings,
        diagnostics: Arc<dyn DiagnosticSink>,
    ) -> Result<Self, ConfigError> {
        let api_base = settings.api_base.trim_end_matches('/').to_string();
        Url::parse(&api_base).map_err(|source| ConfigError::InvalidApiBase {
            value: settings.api_base.clone(),
            source,
        })?;
        let http = Client::builder().build().map_err(ConfigError::HttpClient)?;

        Ok(Self {
            http,
            api_base,
            request_timeout: settings.request_timeout,
            diagnostics,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Turn an asset reference from a response (`/static/results/..`) into a
    /// fetchable URL. Absolute URLs are returned unchanged.
    pub fn resolve_asset_url(&self, path: &str) -> String {
        if Url::parse(path).is_ok() {
            return path.to_string();
        }
        if path.starts_with('/') {
            format!("{}{path}", self.api_base)
        } else {
            format!("{}/{path}", self.api_base)
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.api_base)
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: &'static str,
        url: String,
        request: RequestBuilder,
        fallback: &str,
    ) -> Result<T, TransportError> {
        let started = Instant::now();
        debug!(method, url = %url, "backend request start");
        self.diagnostics
            .record(&DiagnosticEvent::new(RequestStage::RequestStart, method, &url));

        let exchange = async {
            let response = match request.send().await {
                Ok(response) => response,
                Err(source) => return Err(self.network_error(method, &url, started, source)),
            };
            self.read_json_or_error(method, &url, response, fallback, started)
                .await
        };

        let outcome = tokio::time::timeout(self.request_timeout, exchange).await;
        match outcome {
            Ok(outcome) => outcome,
            Err(_) => {
                warn!(
                    method,
                    url = %url,
                    timeout_secs = self.request_timeout.as_secs(),
                    "backend request timed out"
                );
                self.diagnostics.record(
                    &DiagnosticEvent::new(RequestStage::Timeout, method, &url)
                        .with_elapsed(started.elapsed()),
                );
                Err(TransportError::Timeout {
                    url,
                    after: self.request_timeout,
                })
            }
        }
    }

    fn network_error(
        &self,
        method: &'static str,
        url: &str,
        started: Instant,
        source: reqwest::Error,
    ) -> TransportError {
        warn!(method, url = %url, error = %source, "backend request failed to complete");
        self.diagnostics.record(
            &DiagnosticEvent::new(RequestStage::NetworkError, method, url)
                .with_elapsed(started.elapsed())
                .with_detail(source.to_string()),
        );
        TransportError::Network {
            url: url.to_string(),
            source,
        }
    }

    async fn read_json_or_error<T: DeserializeOwned>(
        &self,
        method: &'static str,
        url: &str,
        response: Response,
        fallback: &str,
        started: Instant,
    ) -> Result<T, TransportError> {
        let status = response.status();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(source) => return Err(self.network_error(method, url, started, source)),
        };

        let parse_failure = |source: serde_json::Error| {
            warn!(
                method,
                url = %url,
                status = status.as_u16(),
                content_type = %content_type,
                error = %source,
                "backend response is not valid JSON"
            );
            self.diagnostics.record(
                &DiagnosticEvent::new(RequestStage::ParseError, method, url)
                    .with_status(status.as_u16())
                    .with_content_type(content_type.clone())
                    .with_elapsed(started.elapsed())
                    .with_detail(source.to_string()),
            );
            TransportError::Parse {
                status: status.as_u16(),
                url: url.to_string(),
                content_type: content_type.clone(),
                source,
            }
        };

        let body: Value = serde_json::from_slice(&bytes).map_err(&parse_failure)?;

        if !status.is_success() {
            let message = ErrorBody::deserialize(&body)
                .ok()
                .and_then(|body| body.detail_message().map(str::to_string))
                .unwrap_or_else(|| fallback.to_string());
            warn!(
                method,
                url = %url,
                status = status.as_u16(),
                detail = %message,
                "backend returned error status"
            );
            self.diagnostics.record(
                &DiagnosticEvent::new(RequestStage::HttpError, method, url)
                    .with_status(status.as_u16())
                    .with_content_type(content_type.clone())
                    .with_elapsed(started.elapsed())
                    .with_detail(message.clone()),
            );
            return Err(TransportError::Http {
                status: status.as_u16(),
                url: url.to_string(),
                message,
            });
        }

        let decoded = serde_json::from_value::<T>(body).map_err(&parse_failure)?;
        debug!(
            method,
            url = %url,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "backend request done"
        );
        self.diagnostics.record(
            &DiagnosticEvent::new(RequestStage::Response, method, url)
                .with_status(status.as_u16())
                .with_content_type(content_type.clone())
                .with_elapsed(started.elapsed()),
        );
        Ok(decoded)
    }
}

fn upload_part(file: &UploadedFile) -> multipart::Part {
    let part = multipart::Part::bytes(file.bytes.to_vec()).file_name(file.file_name.clone());
    match part.mime_str(&file.content_type) {
        Ok(part) => part,
        Err(err) => {
            warn!(
                file = %file.file_name,
                content_type = %file.content_type,
                error = %err,
                "sending upload without content type"
            );
            multipart::Part::bytes(file.bytes.to_vec()).file_name(file.file_name.clone())
        }
    }
}

#[async_trait]
impl SegmentationApi for HttpTransport {
    async fn health(&self) -> Result<HealthResponse, TransportError> {
        let url = self.endpoint("/health");
        let request = self.http.get(&url);
        self.execute("GET", url, request, HEALTH_FALLBACK).await
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, TransportError> {
        let url = self.endpoint("/models");
        let request = self.http.get(&url);
        let body: ModelsResponse = self.execute("GET", url, request, MODELS_FALLBACK).await?;
        Ok(body.models)
    }

    async fn list_test_images(&self) -> Result<Vec<TestImage>, TransportError> {
        let url = self.endpoint("/test-images");
        let request = self.http.get(&url);
        let body: TestImagesResponse = self
            .execute("GET", url, request, TEST_IMAGES_FALLBACK)
            .await?;
        Ok(body.images)
    }

    async fn predict_by_id(&self, image_id: &ImageId) -> Result<PredictResponse, TransportError> {
        let url = self.endpoint("/predict-by-id");
        let request = self.http.post(&url).json(&PredictByIdRequest {
            image_id: image_id.clone(),
        });
        self.execute("POST", url, request, PREDICT_FALLBACK).await
    }

    async fn predict_upload(&self, file: &UploadedFile) -> Result<PredictResponse, TransportError> {
        let url = self.endpoint("/predict");
        let form = multipart::Form::new()
            .part("file", upload_part(file))
            .text("model_key", MODEL_KEY_ADE20K);
        debug!(file = %file.file_name, size = file.bytes.len(), "uploading image for inference");
        let request = self.http.post(&url).multipart(form);
        self.execute("POST", url, request, PREDICT_FALLBACK).await
    }

    async fn describe(
        &self,
        request: &DescribeRequest,
    ) -> Result<DescribeResponse, TransportError> {
        let url = self.endpoint("/describe");
        let builder = self.http.post(&url).json(request);
        self.execute("POST", url, builder, DESCRIBE_FALLBACK).await
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
