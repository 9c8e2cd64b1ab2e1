use crate::providers::ApiProvider;

/// Configurations compiled into the crate so a fresh database is usable
/// without a seed directory on disk.
pub const BUILTIN_SEEDS: &[(ApiProvider, &str)] = &[
    (
        ApiProvider::OpenAi,
        include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/api_configurations/openai.json"
        )),
    ),
    (
        ApiProvider::StabilityAi,
        include_str!(concat!(
            env!("CARGO_MANIFEST_DIR"),
            "/api_configurations/stabilityai.json"
        )),
    ),
];
