use std::{fs, time::Duration};

pub const DEFAULT_API_BASE: &str = "http://localhost:8000";
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
pub const SETTINGS_FILE: &str = "segdemo.toml";

/// What the store does when an orchestrator is invoked while its previous
/// invocation is still in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverlapPolicy {
    /// The newer invocation wins; the older response is discarded on arrival.
    #[default]
    Supersede,
    /// The newer invocation fails with `DemoError::Busy` without a network call.
    Reject,
}

impl OverlapPolicy {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "supersede" => Some(Self::Supersede),
            "reject" => Some(Self::Reject),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_base: String,
    pub request_timeout: Duration,
    pub diagnostics_url: Option<String>,
    pub overlap_policy: OverlapPolicy,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base: DEFAULT_API_BASE.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            diagnostics_url: None,
            overlap_policy: OverlapPolicy::default(),
        }
    }
}

impl Settings {
    pub fn with_api_base(api_base: impl Into<String>) -> Self {
        let mut settings = Self {
            api_base: api_base.into(),
            ..Self::default()
        };
        settings.normalize();
        settings
    }

    fn normalize(&mut self) {
        let api_base = self.api_base.trim().trim_end_matches('/');
        self.api_base = if api_base.is_empty() {
            DEFAULT_API_BASE.into()
        } else {
            api_base.to_string()
        };

        self.diagnostics_url = self
            .diagnostics_url
            .take()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty());
    }
}

/// Resolve settings from `segdemo.toml` in the working directory and the
/// process environment. Call once at startup and inject the result.
pub fn load_settings() -> Settings {
    let file = fs::read_to_string(SETTINGS_FILE).ok();
    settings_from_sources(file.as_deref(), |key| std::env::var(key).ok())
}

pub fn settings_from_sources<F>(file: Option<&str>, env: F) -> Settings
where
    F: Fn(&str) -> Option<String>,
{
    let mut settings = Settings::default();

    if let Some(raw) = file {
        match raw.parse::<toml::Table>() {
            Ok(file_cfg) => {
                if let Some(v) = file_cfg.get("api_base").and_then(toml::Value::as_str) {
                    settings.api_base = v.to_string();
                }
                if let Some(v) = file_cfg.get("diagnostics_url").and_then(toml::Value::as_str) {
                    settings.diagnostics_url = Some(v.to_string());
                }
                if let Some(v) = file_cfg
                    .get("request_timeout_secs")
                    .and_then(toml::Value::as_integer)
                    .filter(|secs| *secs > 0)
                {
                    settings.request_timeout = Duration::from_secs(v as u64);
                }
                if let Some(v) = file_cfg
                    .get("overlap_policy")
                    .and_then(toml::Value::as_str)
                    .and_then(OverlapPolicy::parse)
                {
                    settings.overlap_policy = v;
                }
            }
            Err(err) => {
                tracing::warn!(file = SETTINGS_FILE, %err, "ignoring unreadable settings file");
            }
        }
    }

    if let Some(v) = env("API_BASE") {
        settings.api_base = v;
    }
    if let Some(v) = env("APP__API_BASE") {
        settings.api_base = v;
    }

    if let Some(v) = env("DIAGNOSTICS_URL") {
        settings.diagnostics_url = Some(v);
    }
    if let Some(v) = env("APP__DIAGNOSTICS_URL") {
        settings.diagnostics_url = Some(v);
    }

    if let Some(v) = env("APP__REQUEST_TIMEOUT_SECS") {
        if let Ok(parsed) = v.trim().parse::<u64>() {
            if parsed > 0 {
                settings.request_timeout = Duration::from_secs(parsed);
            }
        }
    }

    if let Some(v) = env("APP__OVERLAP_POLICY").as_deref().and_then(OverlapPolicy::parse) {
        settings.overlap_policy = v;
    }

    settings.normalize();
    settings
}
