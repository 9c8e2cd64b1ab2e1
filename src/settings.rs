//! Runtime settings: provider endpoints, API keys and the scratch directory
//! used for audio uploads.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::providers::ApiProvider;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const STABILITY_BASE_URL: &str = "https://api.stability.ai";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoint {
    pub api_key: Option<String>,
    pub base_url: String,
}

impl ProviderEndpoint {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            api_key: None,
            base_url: base_url.into(),
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub openai: ProviderEndpoint,
    pub stability_ai: ProviderEndpoint,
    /// Directory where in-memory audio uploads are spilled before upload.
    pub media_root: PathBuf,
    /// No timeout when unset; a slow provider blocks the save.
    pub request_timeout_secs: Option<u64>,
    pub user_agent: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            openai: ProviderEndpoint::new(OPENAI_BASE_URL),
            stability_ai: ProviderEndpoint::new(STABILITY_BASE_URL),
            media_root: std::env::temp_dir(),
            request_timeout_secs: None,
            user_agent: format!("smart-models/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Settings {
    /// Defaults overlaid with `OPENAI_API_KEY`, `OPENAI_BASE_URL`,
    /// `STABILITY_API_KEY`, `STABILITY_BASE_URL`, `SMART_MODELS_MEDIA_ROOT`
    /// and `SMART_MODELS_TIMEOUT_SECS`.
    pub fn from_env() -> Self {
        let mut settings = Self::default();
        if let Some(key) = env_value("OPENAI_API_KEY") {
            settings.openai.api_key = Some(key);
        }
        if let Some(url) = env_value("OPENAI_BASE_URL") {
            settings.openai.base_url = url;
        }
        if let Some(key) = env_value("STABILITY_API_KEY") {
            settings.stability_ai.api_key = Some(key);
        }
        if let Some(url) = env_value("STABILITY_BASE_URL") {
            settings.stability_ai.base_url = url;
        }
        if let Some(root) = env_value("SMART_MODELS_MEDIA_ROOT") {
            settings.media_root = PathBuf::from(root);
        }
        if let Some(raw) = env_value("SMART_MODELS_TIMEOUT_SECS") {
            match raw.parse::<u64>() {
                Ok(secs) => settings.request_timeout_secs = Some(secs),
                Err(_) => log::warn!("ignoring SMART_MODELS_TIMEOUT_SECS={raw}: not a number"),
            }
        }
        settings
    }

    /// Endpoint for providers that have an HTTP integration.
    pub fn endpoint(&self, provider: ApiProvider) -> Option<&ProviderEndpoint> {
        match provider {
            ApiProvider::OpenAi => Some(&self.openai),
            ApiProvider::StabilityAi => Some(&self.stability_ai),
            _ => None,
        }
    }

    pub fn endpoint_mut(&mut self, provider: ApiProvider) -> Option<&mut ProviderEndpoint> {
        match provider {
            ApiProvider::OpenAi => Some(&mut self.openai),
            ApiProvider::StabilityAi => Some(&mut self.stability_ai),
            _ => None,
        }
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
