use thiserror::Error;

use crate::providers::ApiProvider;

#[derive(Debug, Error)]
pub enum SmartModelsError {
    #[error("Invalid field declaration: {0}")]
    InvalidDescriptor(String),
    #[error("Attribute '{attribute}' is not {expected}")]
    InvalidFieldType {
        attribute: String,
        expected: &'static str,
    },
    #[error("Unknown attribute '{0}'")]
    UnknownAttribute(String),
    #[error("max_title_length should be greater than or equal to three, got {0}")]
    InvalidTitleLength(usize),
    #[error("audio format {extension} is not supported by {provider}")]
    UnsupportedAudioFormat {
        extension: String,
        provider: ApiProvider,
    },
    #[error("Invalid configuration '{name}': {reason}")]
    InvalidConfiguration { name: String, reason: String },
    #[error("No API key configured for {0}")]
    MissingCredential(ApiProvider),
    #[error("{provider} request failed: {message}")]
    Provider {
        provider: ApiProvider,
        message: String,
    },
    #[error(transparent)]
    Http(#[from] reqwest::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Database(#[from] rusqlite::Error),
    #[error(transparent)]
    Pool(#[from] r2d2::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = SmartModelsError> = std::result::Result<T, E>;

impl SmartModelsError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidDescriptor(_) => "FLD-1001",
            Self::InvalidFieldType { .. } => "FLD-1002",
            Self::UnknownAttribute(_) => "FLD-1003",
            Self::InvalidTitleLength(_) => "FLD-1004",
            Self::UnsupportedAudioFormat { .. } => "AUD-1001",
            Self::InvalidConfiguration { .. } => "CFG-1001",
            Self::MissingCredential(_) => "CFG-1002",
            Self::Provider { .. } => "API-1001",
            Self::Http(_) => "API-1002",
            Self::Io(_) => "GEN-1001",
            Self::Database(_) => "DB-1001",
            Self::Pool(_) => "DB-1002",
            Self::Json(_) => "GEN-1002",
        }
    }

    pub fn explain(&self) -> &'static str {
        match self {
            Self::InvalidDescriptor(_) => "A smart field was declared with conflicting options.",
            Self::InvalidFieldType { .. } => {
                "A source attribute does not have the storage kind the field needs."
            }
            Self::UnknownAttribute(_) => "A field refers to an attribute the record does not declare.",
            Self::InvalidTitleLength(_) => "Titles need room for at least three characters.",
            Self::UnsupportedAudioFormat { .. } => {
                "The provider only accepts mp3, mp4, mpeg, mpga, m4a, wav and webm audio."
            }
            Self::InvalidConfiguration { .. } => "A seeded provider configuration is malformed.",
            Self::MissingCredential(_) => "The provider needs an API key before it can be called.",
            Self::Provider { .. } => "The AI provider rejected the request.",
            Self::Http(_) => "The AI provider could not be reached.",
            Self::Io(_) => "A temporary file could not be written, read or removed.",
            Self::Database(_) => "The SQLite configuration store returned an error.",
            Self::Pool(_) => "The SQLite configuration store is unavailable.",
            Self::Json(_) => "A configuration or provider payload was not valid JSON.",
        }
    }
}
