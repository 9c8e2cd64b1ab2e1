//! Save-time orchestration.
//!
//! [`SmartFields`] is the explicit pre-save transform of a record type: it
//! reads a [`RecordSnapshot`], runs the audio, text and image orchestrators
//! in that order (each sees the updates of the previous one) and returns the
//! [`FieldUpdate`]s to apply before persisting. [`save_with`] composes that
//! transform with the application's own persistence call.

pub mod audio;
pub mod image;
pub mod text;

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::json;

use crate::adapters::audio::{AudioAdapter, ProviderAudioAdapter};
use crate::adapters::image::{ImageAdapter, ProviderImageAdapter};
use crate::adapters::text::{ProviderTextAdapter, TextAdapter};
use crate::errors::{Result, SmartModelsError};
use crate::fields::{AudioToTextField, SmartImageField, SmartTextField};
use crate::model_manager::ModelManager;
use crate::record::{AttributeValue, FieldUpdate, RecordSnapshot, SmartRecord};

/// Adapters and scratch space shared by the orchestrators.
#[derive(Clone)]
pub struct SmartContext {
    text: Arc<dyn TextAdapter>,
    audio: Arc<dyn AudioAdapter>,
    image: Arc<dyn ImageAdapter>,
    media_root: PathBuf,
    models: Option<Arc<ModelManager>>,
}

impl SmartContext {
    pub fn new(models: Arc<ModelManager>) -> Self {
        Self {
            text: Arc::new(ProviderTextAdapter::new(Arc::clone(&models))),
            audio: Arc::new(ProviderAudioAdapter::new(Arc::clone(&models))),
            image: Arc::new(ProviderImageAdapter::new(Arc::clone(&models))),
            media_root: models.settings().media_root.clone(),
            models: Some(models),
        }
    }

    pub fn with_adapters(
        text: Arc<dyn TextAdapter>,
        audio: Arc<dyn AudioAdapter>,
        image: Arc<dyn ImageAdapter>,
        media_root: PathBuf,
    ) -> Self {
        Self {
            text,
            audio,
            image,
            media_root,
            models: None,
        }
    }

    pub fn text(&self) -> &dyn TextAdapter {
        self.text.as_ref()
    }

    pub fn audio(&self) -> &dyn AudioAdapter {
        self.audio.as_ref()
    }

    pub fn image(&self) -> &dyn ImageAdapter {
        self.image.as_ref()
    }

    pub fn media_root(&self) -> &PathBuf {
        &self.media_root
    }

    async fn record_update(&self, update: &FieldUpdate, kind: &str) {
        log::debug!("{kind} field '{}' transformed", update.attribute());
        if let Some(models) = &self.models {
            models.audit(
                "info",
                "SMF-0100",
                "Smart field transformed",
                None,
                json!({ "attribute": update.attribute(), "kind": kind }),
            )
            .await;
        }
    }
}

/// The smart fields a record type declares; at most one of each kind.
#[derive(Debug, Clone, Default)]
pub struct SmartFields {
    text: Option<SmartTextField>,
    image: Option<SmartImageField>,
    audio: Option<AudioToTextField>,
}

impl SmartFields {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, field: SmartTextField) -> Self {
        self.text = Some(field);
        self
    }

    pub fn with_image(mut self, field: SmartImageField) -> Self {
        self.image = Some(field);
        self
    }

    pub fn with_audio(mut self, field: AudioToTextField) -> Self {
        self.audio = Some(field);
        self
    }

    pub fn text_field(&self) -> Option<&SmartTextField> {
        self.text.as_ref()
    }

    pub fn image_field(&self) -> Option<&SmartImageField> {
        self.image.as_ref()
    }

    pub fn audio_field(&self) -> Option<&AudioToTextField> {
        self.audio.as_ref()
    }

    pub async fn pre_save(
        &self,
        ctx: &SmartContext,
        snapshot: &RecordSnapshot,
    ) -> Result<Vec<FieldUpdate>> {
        let mut working = snapshot.clone();
        let mut updates = Vec::new();

        if let Some(field) = &self.audio {
            if let Some(update) = audio::transform_audio(field, ctx, &working).await? {
                ctx.record_update(&update, "audio").await;
                working.apply(&update);
                updates.push(update);
            }
        }
        if let Some(field) = &self.text {
            if let Some(update) = text::transform_text(field, ctx, &working).await? {
                ctx.record_update(&update, "text").await;
                working.apply(&update);
                updates.push(update);
            }
        }
        if let Some(field) = &self.image {
            if let Some(update) = image::transform_image(field, ctx, &working).await? {
                ctx.record_update(&update, "image").await;
                working.apply(&update);
                updates.push(update);
            }
        }
        Ok(updates)
    }
}

/// Run the pre-save transform on `record`, apply its updates, then hand the
/// record to `persist`. Nothing is applied if the transform fails.
pub async fn save_with<R, T, E, F>(
    record: &mut R,
    fields: &SmartFields,
    ctx: &SmartContext,
    persist: F,
) -> std::result::Result<T, E>
where
    R: SmartRecord,
    E: From<SmartModelsError>,
    F: FnOnce(&R) -> std::result::Result<T, E>,
{
    let updates = fields.pre_save(ctx, &record.snapshot()).await?;
    for update in updates {
        record.apply_update(update);
    }
    persist(record)
}

/// Join the text values of `sources` with newlines; null values are skipped.
/// `None` when nothing was gathered.
pub(crate) fn gather_text(snapshot: &RecordSnapshot, sources: &[String]) -> Result<Option<String>> {
    let mut gathered: Option<String> = None;
    for source in sources {
        let value = match snapshot.get(source) {
            Some(AttributeValue::Text(value)) => value.as_deref(),
            None => None,
            Some(_) => {
                return Err(SmartModelsError::InvalidFieldType {
                    attribute: source.clone(),
                    expected: "a text attribute",
                })
            }
        };
        if let Some(value) = value {
            match gathered.as_mut() {
                Some(text) => {
                    text.push('\n');
                    text.push_str(value);
                }
                None => gathered = Some(value.to_string()),
            }
        }
    }
    Ok(gathered)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Recording fakes for the adapter traits.

    use std::path::{Path, PathBuf};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use crate::adapters::audio::{AudioAdapter, AudioMode};
    use crate::adapters::image::ImageAdapter;
    use crate::adapters::text::{TextAdapter, TextTask};
    use crate::errors::{Result, SmartModelsError};
    use crate::providers::ApiProvider;

    /// Tags each input with the task name, e.g. `summarize(text)`. Tasks in
    /// `decline` return `None`.
    #[derive(Default)]
    pub struct FakeText {
        pub calls: Mutex<Vec<(TextTask, String)>>,
        pub decline: Vec<&'static str>,
    }

    #[async_trait]
    impl TextAdapter for FakeText {
        async fn run(&self, task: TextTask, original_text: &str, _provider: ApiProvider) -> Result<Option<String>> {
            self.calls
                .lock()
                .unwrap()
                .push((task.clone(), original_text.to_string()));
            let name = task.task().as_str();
            if self.decline.contains(&name) {
                return Ok(None);
            }
            Ok(Some(format!("{name}({original_text})")))
        }
    }

    /// Returns the queued answers in call order and records each path and
    /// whether it existed at call time.
    #[derive(Default)]
    pub struct FakeAudio {
        pub answers: Mutex<Vec<Option<String>>>,
        pub calls: Mutex<Vec<(AudioMode, PathBuf, bool)>>,
        pub fail: bool,
    }

    #[async_trait]
    impl AudioAdapter for FakeAudio {
        async fn run(&self, mode: AudioMode, audio_file: &Path, provider: ApiProvider) -> Result<Option<String>> {
            self.calls
                .lock()
                .unwrap()
                .push((mode, audio_file.to_path_buf(), audio_file.exists()));
            if self.fail {
                return Err(SmartModelsError::Provider {
                    provider,
                    message: "boom".into(),
                });
            }
            let mut answers = self.answers.lock().unwrap();
            Ok(if answers.is_empty() { None } else { answers.remove(0) })
        }
    }

    #[derive(Default)]
    pub struct FakeImage {
        pub prompts: Mutex<Vec<(String, u32, u32)>>,
        pub image: Option<Vec<u8>>,
    }

    #[async_trait]
    impl ImageAdapter for FakeImage {
        async fn generate_thumbnail(
            &self,
            text: &str,
            image_width: u32,
            image_height: u32,
            _provider: ApiProvider,
        ) -> Result<Option<Vec<u8>>> {
            self.prompts
                .lock()
                .unwrap()
                .push((text.to_string(), image_width, image_height));
            Ok(self.image.clone())
        }
    }
}
