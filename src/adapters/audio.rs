use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

pub use crate::apis::client::AudioMode;
use crate::errors::{Result, SmartModelsError};
use crate::model_manager::ModelManager;
use crate::providers::{ApiProvider, ContentType, Task};

pub const SUPPORTED_AUDIO_EXTENSIONS: [&str; 7] =
    [".mp3", ".mp4", ".mpeg", ".mpga", ".m4a", ".wav", ".webm"];

#[async_trait]
pub trait AudioAdapter: Send + Sync {
    async fn run(&self, mode: AudioMode, audio_file: &Path, provider: ApiProvider) -> Result<Option<String>>;

    async fn transcribe(&self, audio_file: &Path, provider: ApiProvider) -> Result<Option<String>> {
        self.run(AudioMode::Transcribe, audio_file, provider).await
    }

    async fn translate(&self, audio_file: &Path, provider: ApiProvider) -> Result<Option<String>> {
        self.run(AudioMode::Translate, audio_file, provider).await
    }
}

pub struct ProviderAudioAdapter {
    models: Arc<ModelManager>,
}

impl ProviderAudioAdapter {
    pub fn new(models: Arc<ModelManager>) -> Self {
        Self { models }
    }
}

#[async_trait]
impl AudioAdapter for ProviderAudioAdapter {
    async fn run(&self, mode: AudioMode, audio_file: &Path, provider: ApiProvider) -> Result<Option<String>> {
        let task = match mode {
            AudioMode::Transcribe => Task::Transcribe,
            AudioMode::Translate => Task::Translate,
        };
        if provider != ApiProvider::OpenAi {
            return Ok(None);
        }
        let Some(configuration) = self.models.resolve(task, ContentType::Audio, provider).await else {
            return Ok(None);
        };
        check_audio_extension(audio_file, provider)?;

        match self
            .models
            .client()
            .audio(&configuration.model, audio_file, mode)
            .await
        {
            Ok(text) => {
                self.models.log_invocation_success(&configuration, task).await;
                Ok(text)
            }
            Err(err) => {
                self.models
                    .log_invocation_failure(&configuration, task, &err)
                    .await;
                Err(err)
            }
        }
    }
}

/// Reject files whose extension (with its dot, case-sensitive) is not in
/// [`SUPPORTED_AUDIO_EXTENSIONS`].
pub fn check_audio_extension(audio_file: &Path, provider: ApiProvider) -> Result<()> {
    let extension = audio_file
        .extension()
        .map(|ext| format!(".{}", ext.to_string_lossy()))
        .unwrap_or_default();
    if SUPPORTED_AUDIO_EXTENSIONS.contains(&extension.as_str()) {
        Ok(())
    } else {
        Err(SmartModelsError::UnsupportedAudioFormat { extension, provider })
    }
}
