use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid api base url '{value}': {source}")]
    InvalidApiBase {
        value: String,
        source: url::ParseError,
    },
    #[error("failed to build http client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Failure of a single backend call.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("network error calling {url}: {source}")]
    Network {
        url: String,
        source: reqwest::Error,
    },
    /// Displays exactly the backend `detail` (or the caller fallback) so the
    /// message can be shown to the user as is.
    #[error("{message}")]
    Http {
        status: u16,
        url: String,
        message: String,
    },
    #[error("invalid JSON from {url} (status {status}, content-type '{content_type}'): {source}")]
    Parse {
        status: u16,
        url: String,
        content_type: String,
        source: serde_json::Error,
    },
    #[error("request to {url} timed out after {:.1}s", .after.as_secs_f32())]
    Timeout { url: String, after: Duration },
}

impl TransportError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } | Self::Parse { status, .. } => Some(*status),
            Self::Network { .. } | Self::Timeout { .. } => None,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            Self::Network { url, .. }
            | Self::Http { url, .. }
            | Self::Parse { url, .. }
            | Self::Timeout { url, .. } => url,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DemoErrorKind {
    Validation,
    Network,
    Http,
    Parse,
    Timeout,
    Busy,
    UnknownMask,
}

/// Errors surfaced by the store's entry points. Every one of them is also
/// recorded as the latest error message (except `UnknownMask`, which leaves
/// state untouched).
#[derive(Debug, Error)]
pub enum DemoError {
    #[error("{0}")]
    Validation(&'static str),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("{0} is already in progress")]
    Busy(&'static str),
    #[error("mask '{0}' is not part of the current result")]
    UnknownMask(String),
}

impl DemoError {
    pub fn kind(&self) -> DemoErrorKind {
        match self {
            Self::Validation(_) => DemoErrorKind::Validation,
            Self::Transport(TransportError::Network { .. }) => DemoErrorKind::Network,
            Self::Transport(TransportError::Http { .. }) => DemoErrorKind::Http,
            Self::Transport(TransportError::Parse { .. }) => DemoErrorKind::Parse,
            Self::Transport(TransportError::Timeout { .. }) => DemoErrorKind::Timeout,
            Self::Busy(_) => DemoErrorKind::Busy,
            Self::UnknownMask(_) => DemoErrorKind::UnknownMask,
        }
    }
}
