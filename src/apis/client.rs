use std::path::Path;
use std::time::Duration;

use base64::engine::general_purpose::STANDARD as B64_ENGINE;
use base64::Engine;
use reqwest::{multipart, Client, RequestBuilder, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{Result, SmartModelsError};
use crate::providers::ApiProvider;
use crate::settings::{ProviderEndpoint, Settings};

/// Seed used for every Stability generation so thumbnails are reproducible.
pub const STABILITY_SEED: u64 = 992446758;
const STABILITY_GUIDANCE_PRESET: &str = "FAST_GREEN";
const STABILITY_FILTERED: &str = "CONTENT_FILTERED";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".into(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioMode {
    Transcribe,
    Translate,
}

impl AudioMode {
    fn endpoint(&self) -> &'static str {
        match self {
            Self::Transcribe => "transcriptions",
            Self::Translate => "translations",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageGeneration {
    pub prompt: String,
    pub width: u32,
    pub height: u32,
    pub steps: u32,
    pub cfg_scale: f32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageArtifact {
    pub bytes: Vec<u8>,
    pub filtered: bool,
}

#[derive(Debug, Deserialize)]
struct StabilityResponse {
    #[serde(default)]
    artifacts: Vec<StabilityArtifact>,
}

#[derive(Debug, Deserialize)]
struct StabilityArtifact {
    base64: Option<String>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

/// Thin HTTP layer over the provider REST APIs.
pub struct ProviderClient {
    client: Client,
    openai: ProviderEndpoint,
    stability_ai: ProviderEndpoint,
}

impl ProviderClient {
    pub fn new(settings: &Settings) -> Result<Self> {
        let mut builder = Client::builder().user_agent(settings.user_agent.clone());
        if let Some(secs) = settings.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        Ok(Self {
            client: builder.build()?,
            openai: settings.openai.clone(),
            stability_ai: settings.stability_ai.clone(),
        })
    }

    /// Chat completion; returns the first choice's content.
    pub async fn chat(&self, model: &str, messages: &[ChatMessage]) -> Result<String> {
        let payload = serde_json::json!({
            "model": model,
            "messages": messages,
        });
        let request = self
            .authorized(ApiProvider::OpenAi, "/v1/chat/completions")?
            .json(&payload);
        let body: Value = send(ApiProvider::OpenAi, request).await?.json().await?;
        Ok(body
            .pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string())
    }

    /// Upload an audio file for transcription or translation to English.
    pub async fn audio(&self, model: &str, path: &Path, mode: AudioMode) -> Result<Option<String>> {
        let data = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "audio".to_string());
        let form = multipart::Form::new()
            .part("file", multipart::Part::bytes(data).file_name(file_name))
            .text("model", model.to_string());

        let route = format!("/v1/audio/{}", mode.endpoint());
        let request = self.authorized(ApiProvider::OpenAi, &route)?.multipart(form);
        let body: Value = send(ApiProvider::OpenAi, request).await?.json().await?;
        Ok(body.get("text").and_then(Value::as_str).map(str::to_string))
    }

    /// Text-to-image generation with a single sample.
    pub async fn text_to_image(
        &self,
        model: &str,
        generation: &ImageGeneration,
    ) -> Result<Vec<ImageArtifact>> {
        let payload = serde_json::json!({
            "text_prompts": [{ "text": generation.prompt }],
            "cfg_scale": generation.cfg_scale,
            "width": generation.width,
            "height": generation.height,
            "samples": 1,
            "steps": generation.steps,
            "seed": STABILITY_SEED,
            "clip_guidance_preset": STABILITY_GUIDANCE_PRESET,
        });
        let route = format!("/v1/generation/{model}/text-to-image");
        let request = self
            .authorized(ApiProvider::StabilityAi, &route)?
            .header("Accept", "application/json")
            .json(&payload);
        let body: StabilityResponse = send(ApiProvider::StabilityAi, request).await?.json().await?;

        let mut artifacts = Vec::new();
        for artifact in body.artifacts {
            let Some(encoded) = artifact.base64 else {
                continue;
            };
            let bytes = B64_ENGINE
                .decode(encoded.as_bytes())
                .map_err(|err| SmartModelsError::Provider {
                    provider: ApiProvider::StabilityAi,
                    message: format!("artifact is not valid base64: {err}"),
                })?;
            artifacts.push(ImageArtifact {
                bytes,
                filtered: artifact.finish_reason.as_deref() == Some(STABILITY_FILTERED),
            });
        }
        Ok(artifacts)
    }

    fn authorized(&self, provider: ApiProvider, route: &str) -> Result<RequestBuilder> {
        let endpoint = match provider {
            ApiProvider::OpenAi => &self.openai,
            ApiProvider::StabilityAi => &self.stability_ai,
            other => {
                return Err(SmartModelsError::Provider {
                    provider: other,
                    message: "no HTTP integration".into(),
                })
            }
        };
        let secret = endpoint
            .api_key
            .as_ref()
            .ok_or(SmartModelsError::MissingCredential(provider))?;
        let url = format!("{}{}", endpoint.base_url.trim_end_matches('/'), route);
        Ok(self.client.post(url).bearer_auth(secret))
    }
}

async fn send(provider: ApiProvider, request: RequestBuilder) -> Result<Response> {
    let response = request.send().await?;
    if !response.status().is_success() {
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        return Err(SmartModelsError::Provider {
            provider,
            message: format!("{status} -> {text}"),
        });
    }
    Ok(response)
}
