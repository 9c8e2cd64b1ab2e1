//! Smart persistence fields backed by hosted AI providers.
//!
//! A record type declares its smart fields once; on every save the pre-save
//! transform fills them from the record's other attributes:
//! - [`fields`] validates the field descriptors against the record schema.
//! - [`record`] holds the snapshot and update types exchanged with the record.
//! - [`orchestrators`] runs the audio, text and image transforms before persisting.
//! - [`adapters`] turns one task into a provider call and post-processes the answer.
//! - [`apis`] parses the seeded provider configurations and owns the HTTP client.
//! - [`model_manager`] resolves configurations and audits provider calls.
//! - [`db`] initialises the SQLite store, applies migrations and seeds defaults.
//! - [`errors`] keeps the central error catalogue with human friendly metadata.
//! - [`logging`] writes structured diagnostics to the event log table.
//! - [`settings`] reads endpoints, keys and the scratch directory.

pub mod adapters;
pub mod apis;
pub mod db;
pub mod errors;
pub mod fields;
pub mod logging;
pub mod model_manager;
pub mod orchestrators;
pub mod providers;
pub mod record;
pub mod settings;

pub use errors::{Result, SmartModelsError};
pub use fields::{
    AudioFieldOptions, AudioToTextField, ImageFieldOptions, SmartImageField, SmartTextField,
    TextFieldOptions,
};
pub use model_manager::ModelManager;
pub use orchestrators::{save_with, SmartContext, SmartFields};
pub use providers::{ApiProvider, ContentType, Task};
pub use record::{FieldUpdate, RecordSchema, RecordSnapshot, SmartRecord};
pub use settings::Settings;
