//! Provider configurations and the HTTP client that talks to the providers.

pub mod client;
pub mod config;
pub mod seeds;
pub mod template;
