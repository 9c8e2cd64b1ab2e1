//! Record-side types: declared attribute kinds, the snapshot handed to the
//! pre-save transform and the updates it returns.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SmartModelsError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttributeKind {
    /// Text-like storage (char/text columns).
    Text,
    /// File-like storage (uploads).
    File,
    /// Image storage; file-like, but the target of thumbnail generation.
    Image,
}

impl AttributeKind {
    pub fn is_text_like(&self) -> bool {
        matches!(self, Self::Text)
    }

    pub fn is_file_like(&self) -> bool {
        matches!(self, Self::File | Self::Image)
    }
}

/// Attributes a record type declares, with their storage kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSchema {
    attributes: BTreeMap<String, AttributeKind>,
}

impl RecordSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), AttributeKind::Text);
        self
    }

    pub fn file(mut self, name: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), AttributeKind::File);
        self
    }

    pub fn image(mut self, name: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), AttributeKind::Image);
        self
    }

    pub fn kind_of(&self, name: &str) -> Option<AttributeKind> {
        self.attributes.get(name).copied()
    }

    pub(crate) fn require(&self, name: &str) -> Result<AttributeKind> {
        self.kind_of(name)
            .ok_or_else(|| SmartModelsError::UnknownAttribute(name.to_string()))
    }
}

/// Where an uploaded file currently lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    /// Upload held in memory; spilled to a scratch file for processing.
    InMemory { name: String, bytes: Vec<u8> },
    /// Upload already streamed to a temporary file owned by the caller.
    TemporaryUpload { path: PathBuf },
    /// File committed to storage by an earlier save; not processed again.
    Stored { name: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredImage {
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributeValue {
    Text(Option<String>),
    File(Option<FileSource>),
    Image(Option<StoredImage>),
}

/// In-memory values of a record about to be saved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordSnapshot {
    values: BTreeMap<String, AttributeValue>,
}

impl RecordSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.values
            .insert(name.into(), AttributeValue::Text(Some(value.into())));
        self
    }

    pub fn with_file(mut self, name: impl Into<String>, source: FileSource) -> Self {
        self.values
            .insert(name.into(), AttributeValue::File(Some(source)));
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: AttributeValue) {
        self.values.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&AttributeValue> {
        self.values.get(name)
    }

    pub fn text(&self, name: &str) -> Option<&str> {
        match self.values.get(name) {
            Some(AttributeValue::Text(value)) => value.as_deref(),
            _ => None,
        }
    }

    pub fn file(&self, name: &str) -> Option<&FileSource> {
        match self.values.get(name) {
            Some(AttributeValue::File(source)) => source.as_ref(),
            _ => None,
        }
    }

    /// Fold an update back in so later transforms see it.
    pub fn apply(&mut self, update: &FieldUpdate) {
        match update {
            FieldUpdate::Text { attribute, value } => {
                self.values
                    .insert(attribute.clone(), AttributeValue::Text(value.clone()));
            }
            FieldUpdate::Image { attribute, image } => {
                self.values.insert(
                    attribute.clone(),
                    AttributeValue::Image(Some(StoredImage {
                        name: image.file_name.clone(),
                    })),
                );
            }
        }
    }
}

/// Generated image waiting for the persistence call to commit it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingImage {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUpdate {
    Text {
        attribute: String,
        value: Option<String>,
    },
    Image {
        attribute: String,
        image: PendingImage,
    },
}

impl FieldUpdate {
    pub fn attribute(&self) -> &str {
        match self {
            Self::Text { attribute, .. } | Self::Image { attribute, .. } => attribute,
        }
    }
}

/// Implemented by application records that carry smart fields.
pub trait SmartRecord {
    fn snapshot(&self) -> RecordSnapshot;
    fn apply_update(&mut self, update: FieldUpdate);
}
