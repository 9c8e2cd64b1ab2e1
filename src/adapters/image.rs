use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use crate::apis::client::ImageGeneration;
use crate::apis::template::SlotValues;
use crate::errors::Result;
use crate::model_manager::ModelManager;
use crate::providers::{ApiProvider, ContentType, Task};

#[async_trait]
pub trait ImageAdapter: Send + Sync {
    /// Raw image bytes, or `None` when nothing usable was generated.
    async fn generate_thumbnail(
        &self,
        text: &str,
        image_width: u32,
        image_height: u32,
        provider: ApiProvider,
    ) -> Result<Option<Vec<u8>>>;
}

pub struct ProviderImageAdapter {
    models: Arc<ModelManager>,
}

impl ProviderImageAdapter {
    pub fn new(models: Arc<ModelManager>) -> Self {
        Self { models }
    }
}

#[async_trait]
impl ImageAdapter for ProviderImageAdapter {
    async fn generate_thumbnail(
        &self,
        text: &str,
        image_width: u32,
        image_height: u32,
        provider: ApiProvider,
    ) -> Result<Option<Vec<u8>>> {
        if provider != ApiProvider::StabilityAi {
            return Ok(None);
        }
        let Some(configuration) = self
            .models
            .resolve(Task::Thumbnail, ContentType::Image, provider)
            .await
        else {
            return Ok(None);
        };
        let (Some(template), Some(sampling)) = (
            configuration.image_prompt(Task::Thumbnail),
            configuration.sampling,
        ) else {
            return Ok(None);
        };

        let generation = ImageGeneration {
            prompt: template.render(&SlotValues {
                article: Some(text),
                ..Default::default()
            }),
            width: image_width,
            height: image_height,
            steps: sampling.steps,
            cfg_scale: sampling.cfg_scale,
        };
        let artifacts = match self
            .models
            .client()
            .text_to_image(&configuration.model, &generation)
            .await
        {
            Ok(artifacts) => artifacts,
            Err(err) => {
                self.models
                    .log_invocation_failure(&configuration, Task::Thumbnail, &err)
                    .await;
                return Err(err);
            }
        };
        self.models
            .log_invocation_success(&configuration, Task::Thumbnail)
            .await;

        let filtered = artifacts.iter().filter(|a| a.filtered).count();
        if filtered > 0 {
            self.models
                .audit(
                    "warn",
                    "SMF-0300",
                    "Generated image was filtered by the provider",
                    Some("Filtered artifacts are dropped without retry"),
                    json!({ "configuration": configuration.name, "filtered": filtered }),
                )
                .await;
        }
        Ok(artifacts
            .into_iter()
            .find(|a| !a.filtered && !a.bytes.is_empty())
            .map(|a| a.bytes))
    }
}
