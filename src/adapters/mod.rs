pub mod audio;
pub mod image;
pub mod text;

pub use audio::{AudioAdapter, ProviderAudioAdapter};
pub use image::{ImageAdapter, ProviderImageAdapter};
pub use text::{ProviderTextAdapter, TextAdapter, TextTask};
