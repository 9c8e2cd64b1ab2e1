//! Provider, content-type and task identifiers shared by fields, adapters
//! and the configuration registry.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// External AI services a field can be routed to. The serialised form is the
/// short code stored in the `ai_api.provider` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ApiProvider {
    #[serde(rename = "OPAI")]
    OpenAi,
    #[serde(rename = "STBAI")]
    StabilityAi,
    #[serde(rename = "GCP")]
    Gcp,
    #[serde(rename = "AZC")]
    Azure,
    #[serde(rename = "AWS")]
    Aws,
}

impl ApiProvider {
    pub const ALL: [ApiProvider; 5] = [
        ApiProvider::OpenAi,
        ApiProvider::StabilityAi,
        ApiProvider::Gcp,
        ApiProvider::Azure,
        ApiProvider::Aws,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            Self::OpenAi => "OPAI",
            Self::StabilityAi => "STBAI",
            Self::Gcp => "GCP",
            Self::Azure => "AZC",
            Self::Aws => "AWS",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::OpenAi => "OpenAI",
            Self::StabilityAi => "Stability AI",
            Self::Gcp => "Google Cloud",
            Self::Azure => "Azure Cloud",
            Self::Aws => "Amazon Web Services",
        }
    }
}

impl fmt::Display for ApiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for ApiProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ApiProvider::ALL
            .into_iter()
            .find(|p| p.code() == s)
            .ok_or_else(|| format!("unknown api provider code: {s}"))
    }
}

/// Kind of content a configuration record serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Text,
    Image,
    Audio,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Image => "image",
            Self::Audio => "audio",
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Named transformation. `Translate` is shared by text and audio; the content
/// type disambiguates it in the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    SpellCorrect,
    GenerateTitle,
    Summarize,
    Translate,
    Emojify,
    Transcribe,
    Thumbnail,
}

impl Task {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SpellCorrect => "spell_correct",
            Self::GenerateTitle => "generate_title",
            Self::Summarize => "summarize",
            Self::Translate => "translate",
            Self::Emojify => "emojify",
            Self::Transcribe => "transcribe",
            Self::Thumbnail => "thumbnail",
        }
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Task {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spell_correct" => Ok(Self::SpellCorrect),
            "generate_title" => Ok(Self::GenerateTitle),
            "summarize" => Ok(Self::Summarize),
            "translate" => Ok(Self::Translate),
            "emojify" => Ok(Self::Emojify),
            "transcribe" => Ok(Self::Transcribe),
            "thumbnail" => Ok(Self::Thumbnail),
            other => Err(format!("unknown task: {other}")),
        }
    }
}
