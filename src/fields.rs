//! Field descriptors. Each is validated once, against the record schema, when
//! the record type declares it.

use crate::errors::{Result, SmartModelsError};
use crate::providers::ApiProvider;
use crate::record::{AttributeKind, RecordSchema};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextFieldOptions {
    pub data_fields: Vec<String>,
    pub spell_correct: bool,
    pub translate: bool,
    pub target_lang: Option<String>,
    pub generate_title: bool,
    /// In characters.
    pub max_title_length: usize,
    pub summarize: bool,
    pub emojify: bool,
    pub api_provider: ApiProvider,
}

impl Default for TextFieldOptions {
    fn default() -> Self {
        Self {
            data_fields: Vec::new(),
            spell_correct: false,
            translate: false,
            target_lang: None,
            generate_title: false,
            max_title_length: 100,
            summarize: false,
            emojify: false,
            api_provider: ApiProvider::OpenAi,
        }
    }
}

/// Text attribute rewritten on save by the enabled text tasks, applied in
/// the order spell-correct, generate-title, summarize, translate, emojify.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartTextField {
    attribute: String,
    options: TextFieldOptions,
}

impl SmartTextField {
    pub fn new(
        attribute: impl Into<String>,
        options: TextFieldOptions,
        schema: &RecordSchema,
    ) -> Result<Self> {
        let attribute = attribute.into();
        if options.translate
            && options
                .target_lang
                .as_deref()
                .map_or(true, |lang| lang.trim().is_empty())
        {
            return Err(SmartModelsError::InvalidDescriptor(
                "value for 'target_lang' has to be specified when translate=true".into(),
            ));
        }
        if options.generate_title && options.max_title_length <= 2 {
            return Err(SmartModelsError::InvalidDescriptor(
                "'max_title_length' should be at least 3 when generate_title=true".into(),
            ));
        }
        if options.generate_title && options.summarize {
            return Err(SmartModelsError::InvalidDescriptor(
                "only one of 'generate_title' or 'summarize' can be set to true".into(),
            ));
        }
        expect_kind(schema, &attribute, AttributeKind::is_text_like, "a text attribute")?;
        for source in &options.data_fields {
            expect_kind(schema, source, AttributeKind::is_text_like, "a text attribute")?;
        }
        Ok(Self { attribute, options })
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn options(&self) -> &TextFieldOptions {
        &self.options
    }

    pub fn describe(&self) -> String {
        let o = &self.options;
        format!(
            "spell_correct={}; translate={}; target_lang={}; summarize={}; emojify={}; generate_title={}; max_title_length={}; api={}",
            o.spell_correct,
            o.translate,
            o.target_lang.as_deref().unwrap_or("none"),
            o.summarize,
            o.emojify,
            o.generate_title,
            o.max_title_length,
            o.api_provider,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageFieldOptions {
    pub data_fields: Vec<String>,
    pub thumbnail: bool,
    pub image_width: u32,
    pub image_height: u32,
    pub image_extension: String,
    pub api_provider: ApiProvider,
}

impl Default for ImageFieldOptions {
    fn default() -> Self {
        Self {
            data_fields: Vec::new(),
            thumbnail: true,
            image_width: 512,
            image_height: 512,
            image_extension: "png".into(),
            api_provider: ApiProvider::StabilityAi,
        }
    }
}

/// Image attribute filled with a generated thumbnail of its text sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmartImageField {
    attribute: String,
    options: ImageFieldOptions,
}

impl SmartImageField {
    pub fn new(
        attribute: impl Into<String>,
        options: ImageFieldOptions,
        schema: &RecordSchema,
    ) -> Result<Self> {
        let attribute = attribute.into();
        if options.image_width == 0 || options.image_height == 0 {
            return Err(SmartModelsError::InvalidDescriptor(
                "'image_width' and 'image_height' must be positive".into(),
            ));
        }
        let extension = options.image_extension.trim_start_matches('.').to_string();
        if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(SmartModelsError::InvalidDescriptor(format!(
                "'{}' is not a valid image extension",
                options.image_extension
            )));
        }
        expect_kind(
            schema,
            &attribute,
            |kind| *kind == AttributeKind::Image,
            "an image attribute",
        )?;
        if options.thumbnail {
            for source in &options.data_fields {
                expect_kind(schema, source, AttributeKind::is_text_like, "a text attribute")?;
            }
        }
        let options = ImageFieldOptions {
            image_extension: extension,
            ..options
        };
        Ok(Self { attribute, options })
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn options(&self) -> &ImageFieldOptions {
        &self.options
    }

    pub fn describe(&self) -> String {
        format!(
            "thumbnail={};api={}",
            self.options.thumbnail, self.options.api_provider
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFieldOptions {
    pub data_fields: Vec<String>,
    pub transcribe: bool,
    pub translate: bool,
    pub api_provider: ApiProvider,
}

impl Default for AudioFieldOptions {
    fn default() -> Self {
        Self {
            data_fields: Vec::new(),
            transcribe: false,
            translate: false,
            api_provider: ApiProvider::OpenAi,
        }
    }
}

/// Text attribute filled with the transcription (or English translation) of
/// its audio sources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioToTextField {
    attribute: String,
    options: AudioFieldOptions,
}

impl AudioToTextField {
    pub fn new(
        attribute: impl Into<String>,
        options: AudioFieldOptions,
        schema: &RecordSchema,
    ) -> Result<Self> {
        let attribute = attribute.into();
        if options.translate && options.transcribe {
            return Err(SmartModelsError::InvalidDescriptor(
                "only one of 'translate' or 'transcribe' can be set to true".into(),
            ));
        }
        expect_kind(schema, &attribute, AttributeKind::is_text_like, "a text attribute")?;
        for source in &options.data_fields {
            expect_kind(schema, source, AttributeKind::is_file_like, "a file attribute")?;
        }
        Ok(Self { attribute, options })
    }

    pub fn attribute(&self) -> &str {
        &self.attribute
    }

    pub fn options(&self) -> &AudioFieldOptions {
        &self.options
    }

    pub fn describe(&self) -> String {
        format!("api={}", self.options.api_provider)
    }
}

fn expect_kind(
    schema: &RecordSchema,
    attribute: &str,
    accepts: impl Fn(&AttributeKind) -> bool,
    expected: &'static str,
) -> Result<()> {
    let kind = schema.require(attribute)?;
    if accepts(&kind) {
        Ok(())
    } else {
        Err(SmartModelsError::InvalidFieldType {
            attribute: attribute.to_string(),
            expected,
        })
    }
}
