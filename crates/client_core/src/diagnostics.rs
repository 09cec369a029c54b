//! Observability port for transport calls.
//!
//! The transport reports every request through a [`DiagnosticSink`]. Nothing
//! is sent anywhere unless the caller supplies a sink that does so.

use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::Level;

use crate::config::Settings;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStage {
    RequestStart,
    Response,
    NetworkError,
    HttpError,
    ParseError,
    Timeout,
}

#[derive(Debug, Clone, Serialize)]
pub struct DiagnosticEvent {
    pub stage: RequestStage,
    pub method: &'static str,
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub elapsed_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl DiagnosticEvent {
    pub fn new(stage: RequestStage, method: &'static str, url: impl Into<String>) -> Self {
        Self {
            stage,
            method,
            url: url.into(),
            status: None,
            content_type: None,
            elapsed_ms: None,
            detail: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    pub fn with_elapsed(mut self, elapsed: Duration) -> Self {
        self.elapsed_ms = Some(elapsed.as_millis() as u64);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

pub trait DiagnosticSink: Send + Sync {
    fn record(&self, event: &DiagnosticEvent);
}

pub struct NoopDiagnostics;

impl DiagnosticSink for NoopDiagnostics {
    fn record(&self, _event: &DiagnosticEvent) {}
}

/// Forwards events into the tracing pipeline at `trace` level.
pub struct TracingDiagnostics;

impl DiagnosticSink for TracingDiagnostics {
    fn record(&self, event: &DiagnosticEvent) {
        tracing::trace!(
            stage = ?event.stage,
            method = event.method,
            url = %event.url,
            status = ?event.status,
            elapsed_ms = ?event.elapsed_ms,
            detail = ?event.detail,
            "transport diagnostic"
        );
    }
}

/// Posts each event as JSON to a collector endpoint. Delivery is best effort:
/// posts run on a spawned task and failures are dropped.
pub struct HttpDiagnostics {
    http: Client,
    endpoint: String,
}

impl HttpDiagnostics {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: Client::new(),
            endpoint: endpoint.into(),
        }
    }
}

impl DiagnosticSink for HttpDiagnostics {
    fn record(&self, event: &DiagnosticEvent) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let request = self.http.post(&self.endpoint).json(event);
        runtime.spawn(async move {
            let _ = request.send().await;
        });
    }
}

/// Sink matching the configured `diagnostics_url`. Without one, events go to
/// the tracing pipeline when it has `trace` enabled and are dropped otherwise.
pub fn sink_from_settings(settings: &Settings) -> Arc<dyn DiagnosticSink> {
    match settings.diagnostics_url.as_deref() {
        Some(endpoint) => Arc::new(HttpDiagnostics::new(endpoint)),
        None if tracing::enabled!(Level::TRACE) => Arc::new(TracingDiagnostics),
        None => Arc::new(NoopDiagnostics),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serializes_without_empty_fields() {
        let event = DiagnosticEvent::new(RequestStage::HttpError, "POST", "http://h/predict")
            .with_status(500)
            .with_detail("model unavailable");
        let encoded = serde_json::to_value(&event).expect("encode");

        assert_eq!(encoded["stage"], "http_error");
        assert_eq!(encoded["status"], 500);
        assert!(encoded.get("content_type").is_none());
        assert!(encoded.get("timestamp").is_some());
    }
}
