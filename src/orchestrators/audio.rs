use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::adapters::audio::AudioAdapter;
use crate::errors::{Result, SmartModelsError};
use crate::fields::AudioToTextField;
use crate::orchestrators::SmartContext;
use crate::record::{AttributeValue, FieldUpdate, FileSource, RecordSnapshot};

/// A file handed to the audio adapter. Scratch copies are removed once the
/// adapter calls are done.
struct Materialized {
    path: PathBuf,
    scratch: bool,
}

pub async fn transform_audio(
    field: &AudioToTextField,
    ctx: &SmartContext,
    snapshot: &RecordSnapshot,
) -> Result<Option<FieldUpdate>> {
    let mut files = Vec::new();
    if let Err(err) = materialize(field, ctx, snapshot, &mut files).await {
        cleanup(&files).await;
        return Err(err);
    }
    if files.is_empty() {
        return Ok(None);
    }

    let outcome = convert_all(field, ctx.audio(), &files).await;
    cleanup(&files).await;

    Ok(Some(FieldUpdate::Text {
        attribute: field.attribute().to_string(),
        value: outcome?,
    }))
}

async fn materialize(
    field: &AudioToTextField,
    ctx: &SmartContext,
    snapshot: &RecordSnapshot,
    files: &mut Vec<Materialized>,
) -> Result<()> {
    for source in &field.options().data_fields {
        match snapshot.get(source) {
            Some(AttributeValue::File(Some(FileSource::InMemory { name, bytes }))) => {
                let extension = Path::new(name)
                    .extension()
                    .map(|ext| format!(".{}", ext.to_string_lossy()))
                    .unwrap_or_default();
                tokio::fs::create_dir_all(ctx.media_root()).await?;
                let path = ctx.media_root().join(format!("{}{}", Uuid::new_v4(), extension));
                tokio::fs::write(&path, bytes).await?;
                files.push(Materialized {
                    path,
                    scratch: true,
                });
            }
            Some(AttributeValue::File(Some(FileSource::TemporaryUpload { path }))) => {
                files.push(Materialized {
                    path: path.clone(),
                    scratch: false,
                });
            }
            Some(AttributeValue::File(Some(FileSource::Stored { .. })))
            | Some(AttributeValue::File(None))
            | None => {}
            Some(_) => {
                return Err(SmartModelsError::InvalidFieldType {
                    attribute: source.clone(),
                    expected: "a file attribute",
                })
            }
        }
    }
    Ok(())
}

async fn convert_all(
    field: &AudioToTextField,
    adapter: &dyn AudioAdapter,
    files: &[Materialized],
) -> Result<Option<String>> {
    let options = field.options();
    let mut parts = Vec::new();
    for (index, file) in files.iter().enumerate() {
        let text = if options.transcribe {
            adapter.transcribe(&file.path, options.api_provider).await?
        } else if options.translate {
            adapter.translate(&file.path, options.api_provider).await?
        } else {
            None
        };
        if let Some(text) = text {
            if files.len() == 1 {
                parts.push(text);
            } else {
                parts.push(format!("Audio {}: {}", index + 1, text));
            }
        }
    }
    Ok(if parts.is_empty() {
        None
    } else {
        Some(parts.join("\n"))
    })
}

async fn cleanup(files: &[Materialized]) {
    for file in files.iter().filter(|file| file.scratch) {
        if let Err(err) = tokio::fs::remove_file(&file.path).await {
            log::warn!("could not remove scratch audio {}: {err}", file.path.display());
        }
    }
}
