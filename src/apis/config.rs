use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context};
use base64::engine::general_purpose::STANDARD as B64_ENGINE;
use base64::Engine;
use rusqlite::{params, OptionalExtension};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use time::OffsetDateTime;
use uuid::Uuid;

use super::seeds::BUILTIN_SEEDS;
use super::template::{PromptTemplate, Slot};
use crate::errors::{Result, SmartModelsError};
use crate::logging::log_event;
use crate::providers::{ApiProvider, ContentType, Task};

/// Prompt pieces for one chat-completion task.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatTemplate {
    pub system: PromptTemplate,
    pub user: PromptTemplate,
    pub result_format_rules: String,
    pub default_result_key: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TaskTemplate {
    Chat(ChatTemplate),
    Audio,
    Image(PromptTemplate),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSampling {
    pub steps: u32,
    pub cfg_scale: f32,
}

/// Validated row of the `ai_api` table.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderConfiguration {
    pub name: String,
    pub provider: ApiProvider,
    pub content_type: ContentType,
    pub model: String,
    pub tasks: BTreeMap<Task, TaskTemplate>,
    pub sampling: Option<ImageSampling>,
}

#[derive(Debug, Deserialize)]
struct RawConfiguration {
    #[serde(rename = "type")]
    content_type: ContentType,
    model: String,
    tasks: Map<String, Value>,
    steps: Option<u32>,
    cfg_scale: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct RawChatTemplate {
    system: String,
    user: String,
    #[serde(default)]
    result_format_rules: String,
    default_result_key: String,
}

impl ProviderConfiguration {
    /// Parse and validate the JSON blob stored for a configuration row.
    pub fn from_json(name: &str, provider: ApiProvider, value: &Value) -> Result<Self> {
        let invalid = |reason: String| SmartModelsError::InvalidConfiguration {
            name: name.to_string(),
            reason,
        };
        let raw: RawConfiguration =
            serde_json::from_value(value.clone()).map_err(|err| invalid(err.to_string()))?;
        if raw.model.trim().is_empty() {
            return Err(invalid("model must not be empty".into()));
        }
        if raw.tasks.is_empty() {
            return Err(invalid("at least one task is required".into()));
        }

        let mut tasks = BTreeMap::new();
        for (key, body) in &raw.tasks {
            let task: Task = key.parse().map_err(invalid)?;
            if !task_supports(raw.content_type, task) {
                return Err(invalid(format!(
                    "task '{task}' is not available for {} content",
                    raw.content_type
                )));
            }
            let template = match raw.content_type {
                ContentType::Text => {
                    TaskTemplate::Chat(parse_chat_template(task, body).map_err(invalid)?)
                }
                ContentType::Audio => TaskTemplate::Audio,
                ContentType::Image => {
                    let prompt = body
                        .as_str()
                        .ok_or_else(|| invalid(format!("task '{task}' must be a prompt string")))?;
                    let prompt = PromptTemplate::parse(prompt);
                    prompt
                        .check(&[Slot::Article], &[Slot::Article])
                        .map_err(|reason| invalid(format!("{task}: {reason}")))?;
                    TaskTemplate::Image(prompt)
                }
            };
            tasks.insert(task, template);
        }

        let sampling = match raw.content_type {
            ContentType::Image => {
                let steps = raw
                    .steps
                    .ok_or_else(|| invalid("image configurations need 'steps'".into()))?;
                let cfg_scale = raw
                    .cfg_scale
                    .ok_or_else(|| invalid("image configurations need 'cfg_scale'".into()))?;
                Some(ImageSampling { steps, cfg_scale })
            }
            _ => None,
        };

        Ok(Self {
            name: name.to_string(),
            provider,
            content_type: raw.content_type,
            model: raw.model,
            tasks,
            sampling,
        })
    }

    pub fn chat_template(&self, task: Task) -> Option<&ChatTemplate> {
        match self.tasks.get(&task) {
            Some(TaskTemplate::Chat(template)) => Some(template),
            _ => None,
        }
    }

    pub fn image_prompt(&self, task: Task) -> Option<&PromptTemplate> {
        match self.tasks.get(&task) {
            Some(TaskTemplate::Image(prompt)) => Some(prompt),
            _ => None,
        }
    }
}

fn task_supports(content_type: ContentType, task: Task) -> bool {
    match content_type {
        ContentType::Text => matches!(
            task,
            Task::SpellCorrect | Task::GenerateTitle | Task::Summarize | Task::Translate | Task::Emojify
        ),
        ContentType::Audio => matches!(task, Task::Transcribe | Task::Translate),
        ContentType::Image => matches!(task, Task::Thumbnail),
    }
}

fn parse_chat_template(task: Task, body: &Value) -> std::result::Result<ChatTemplate, String> {
    let raw: RawChatTemplate =
        serde_json::from_value(body.clone()).map_err(|err| format!("{task}: {err}"))?;
    if raw.default_result_key.trim().is_empty() {
        return Err(format!("{task}: default_result_key must not be empty"));
    }

    // (system allowed, user allowed, user required)
    let (system_slots, user_slots, user_required): (&[Slot], &[Slot], &[Slot]) = match task {
        Task::Translate => (
            &[Slot::SourceLanguage, Slot::TargetLanguage],
            &[Slot::SourceLanguage, Slot::TargetLanguage, Slot::OriginalText],
            &[Slot::TargetLanguage, Slot::OriginalText],
        ),
        Task::GenerateTitle => (
            &[Slot::DefaultLanguage],
            &[Slot::DefaultLanguage, Slot::OriginalText, Slot::MaxTitleLength],
            &[Slot::OriginalText, Slot::MaxTitleLength],
        ),
        _ => (
            &[Slot::DefaultLanguage],
            &[Slot::DefaultLanguage, Slot::OriginalText],
            &[Slot::OriginalText],
        ),
    };

    let system = PromptTemplate::parse(&raw.system);
    system
        .check(system_slots, &[])
        .map_err(|reason| format!("{task} system prompt: {reason}"))?;
    let user = PromptTemplate::parse(&raw.user);
    user.check(user_slots, user_required)
        .map_err(|reason| format!("{task} user prompt: {reason}"))?;

    Ok(ChatTemplate {
        system,
        user,
        result_format_rules: raw.result_format_rules,
        default_result_key: raw.default_result_key,
    })
}

type RegistryKey = (ApiProvider, ContentType, Task);

/// Immutable lookup of configurations by (provider, content type, task).
#[derive(Debug, Default, Clone)]
pub struct ConfigRegistry {
    entries: HashMap<RegistryKey, Vec<Arc<ProviderConfiguration>>>,
}

impl ConfigRegistry {
    pub fn new(configurations: impl IntoIterator<Item = ProviderConfiguration>) -> Self {
        let mut entries: HashMap<RegistryKey, Vec<Arc<ProviderConfiguration>>> = HashMap::new();
        for configuration in configurations {
            let configuration = Arc::new(configuration);
            for task in configuration.tasks.keys() {
                entries
                    .entry((configuration.provider, configuration.content_type, *task))
                    .or_default()
                    .push(Arc::clone(&configuration));
            }
        }
        Self { entries }
    }

    /// Build the registry from every `ai_api` row. A malformed row aborts the
    /// load.
    pub fn load(conn: &rusqlite::Connection) -> Result<Self> {
        let mut stmt =
            conn.prepare("SELECT name, provider, configurations FROM ai_api ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut configurations = Vec::new();
        for row in rows {
            let (name, provider, blob) = row?;
            let provider: ApiProvider =
                provider
                    .parse()
                    .map_err(|reason| SmartModelsError::InvalidConfiguration {
                        name: name.clone(),
                        reason,
                    })?;
            let value: Value = serde_json::from_str(&blob)?;
            configurations.push(ProviderConfiguration::from_json(&name, provider, &value)?);
        }
        Ok(Self::new(configurations))
    }

    /// Return the single configuration serving `task`. Missing and ambiguous
    /// lookups both yield `None`.
    pub fn resolve(
        &self,
        task: Task,
        content_type: ContentType,
        provider: ApiProvider,
    ) -> Option<Arc<ProviderConfiguration>> {
        match self.entries.get(&(provider, content_type, task)).map(Vec::as_slice) {
            Some([single]) => Some(Arc::clone(single)),
            Some(many) if many.len() > 1 => {
                log::warn!(
                    "{} configurations serve {task}/{content_type} for {provider}; skipping",
                    many.len()
                );
                None
            }
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct SeedRef {
    configs: Option<String>,
}

/// Seed the compiled-in configurations. Safe to run on every start.
pub fn seed_defaults(conn: &rusqlite::Connection) -> anyhow::Result<usize> {
    let mut seeded = 0;
    for (provider, json) in BUILTIN_SEEDS {
        seeded += seed_provider(conn, *provider, json)
            .with_context(|| format!("failed to seed built-in {provider} configurations"))?;
    }
    Ok(seeded)
}

/// Seed from a directory holding a `configs.json` index and the per-provider
/// files it names.
pub fn seed_from_dir(conn: &rusqlite::Connection, dir: &Path) -> anyhow::Result<usize> {
    let index_path = dir.join("configs.json");
    let index = std::fs::read_to_string(&index_path)
        .with_context(|| format!("failed to read {}", index_path.display()))?;
    let index: HashMap<String, SeedRef> = serde_json::from_str(&index)
        .with_context(|| format!("failed to parse {}", index_path.display()))?;

    let mut seeded = 0;
    for provider in ApiProvider::ALL {
        let Some(file) = index.get(provider.code()).and_then(|r| r.configs.as_deref()) else {
            continue;
        };
        let path = dir.join(file);
        let json = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        seeded += seed_provider(conn, provider, &json)
            .with_context(|| format!("failed to seed {}", path.display()))?;
    }
    Ok(seeded)
}

fn seed_provider(conn: &rusqlite::Connection, provider: ApiProvider, json: &str) -> anyhow::Result<usize> {
    let entries: Map<String, Value> = serde_json::from_str(json)?;
    let now = OffsetDateTime::now_utc().unix_timestamp();
    let mut seeded = 0;
    for (key, value) in &entries {
        let name = format!("{key}-{}", provider.display_name());
        ProviderConfiguration::from_json(&name, provider, value)?;
        conn.execute(
            "INSERT INTO ai_api (id, name, provider, configurations, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?5)
             ON CONFLICT(name) DO UPDATE SET
                 provider = excluded.provider,
                 configurations = excluded.configurations,
                 updated_at = excluded.updated_at",
            params![
                Uuid::new_v4().to_string(),
                name,
                provider.code(),
                value.to_string(),
                now
            ],
        )?;
        seeded += 1;
    }

    let _ = log_event(
        conn,
        "info",
        Some("SMF-0400"),
        "config.seed",
        "Provider configurations seeded",
        None,
        Some(json!({ "provider": provider.code(), "count": seeded })),
    );
    Ok(seeded)
}

/// Store (or clear, when blank) the API key used for `provider`.
pub fn store_credential(
    conn: &rusqlite::Connection,
    provider: ApiProvider,
    api_key: &str,
) -> anyhow::Result<()> {
    let trimmed = api_key.trim();
    if trimmed.is_empty() {
        conn.execute(
            "DELETE FROM ai_credentials WHERE provider = ?1",
            params![provider.code()],
        )?;
        return Ok(());
    }
    let encoded = B64_ENGINE.encode(trimmed.as_bytes());
    let now = OffsetDateTime::now_utc().unix_timestamp();
    conn.execute(
        "INSERT INTO ai_credentials (provider, secret, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?3)
         ON CONFLICT(provider) DO UPDATE SET secret = excluded.secret, updated_at = excluded.updated_at",
        params![provider.code(), encoded, now],
    )?;
    Ok(())
}

pub fn load_credential(
    conn: &rusqlite::Connection,
    provider: ApiProvider,
) -> anyhow::Result<Option<String>> {
    let secret: Option<String> = conn
        .query_row(
            "SELECT secret FROM ai_credentials WHERE provider = ?1",
            params![provider.code()],
            |row| row.get(0),
        )
        .optional()?;

    match secret {
        Some(s) => {
            let decoded = B64_ENGINE
                .decode(s.as_bytes())
                .map_err(|_| anyhow!("Failed to decode stored credential"))?;
            let value = String::from_utf8(decoded)
                .map_err(|_| anyhow!("Stored credential was not valid UTF-8"))?;
            Ok(Some(value))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::apply_migrations;

    fn conn() -> rusqlite::Connection {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        apply_migrations(&conn).unwrap();
        conn
    }

    fn chat_config() -> Value {
        json!({
            "type": "text",
            "model": "gpt-test",
            "tasks": {
                "summarize": {
                    "system": "Summarize default_language text.",
                    "user": "original_text",
                    "result_format_rules": " Use 'Result:'.",
                    "default_result_key": "NONE"
                }
            }
        })
    }

    #[test]
    fn builtin_seeds_parse_and_resolve() {
        let conn = conn();
        let seeded = seed_defaults(&conn).unwrap();
        assert_eq!(seeded, 3);

        let registry = ConfigRegistry::load(&conn).unwrap();
        for task in [
            Task::SpellCorrect,
            Task::GenerateTitle,
            Task::Summarize,
            Task::Translate,
            Task::Emojify,
        ] {
            let config = registry
                .resolve(task, ContentType::Text, ApiProvider::OpenAi)
                .unwrap();
            assert!(config.chat_template(task).is_some());
        }
        assert!(registry
            .resolve(Task::Transcribe, ContentType::Audio, ApiProvider::OpenAi)
            .is_some());
        let image = registry
            .resolve(Task::Thumbnail, ContentType::Image, ApiProvider::StabilityAi)
            .unwrap();
        assert!(image.sampling.is_some());
        assert!(registry
            .resolve(Task::Thumbnail, ContentType::Image, ApiProvider::OpenAi)
            .is_none());
    }

    #[test]
    fn seeding_twice_keeps_one_row_per_name() {
        let conn = conn();
        seed_defaults(&conn).unwrap();
        seed_defaults(&conn).unwrap();
        let count: i64 = conn
            .query_row("SELECT COUNT(1) FROM ai_api", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 3);
        let name: String = conn
            .query_row(
                "SELECT name FROM ai_api WHERE provider = 'STBAI'",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(name, "stable-diffusion-Stability AI");
    }

    #[test]
    fn seed_from_dir_skips_empty_providers() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("configs.json"),
            r#"{"OPAI": {"configs": "openai.json"}, "GCP": {}}"#,
        )
        .unwrap();
        let mut entries = Map::new();
        entries.insert("chat".into(), chat_config());
        std::fs::write(
            dir.path().join("openai.json"),
            Value::Object(entries).to_string(),
        )
        .unwrap();

        let conn = conn();
        assert_eq!(seed_from_dir(&conn, dir.path()).unwrap(), 1);
        let registry = ConfigRegistry::load(&conn).unwrap();
        assert!(registry
            .resolve(Task::Summarize, ContentType::Text, ApiProvider::OpenAi)
            .is_some());
        assert!(registry
            .resolve(Task::Translate, ContentType::Text, ApiProvider::OpenAi)
            .is_none());
    }

    #[test]
    fn duplicate_configurations_resolve_to_none() {
        let a = ProviderConfiguration::from_json("a", ApiProvider::OpenAi, &chat_config()).unwrap();
        let b = ProviderConfiguration::from_json("b", ApiProvider::OpenAi, &chat_config()).unwrap();
        let registry = ConfigRegistry::new(vec![a, b]);
        assert!(registry
            .resolve(Task::Summarize, ContentType::Text, ApiProvider::OpenAi)
            .is_none());
    }

    #[test]
    fn malformed_templates_fail_at_load() {
        let bad_slot = json!({
            "type": "text",
            "model": "gpt-test",
            "tasks": {
                "summarize": {
                    "system": "From language_1",
                    "user": "original_text",
                    "default_result_key": "NONE"
                }
            }
        });
        let err = ProviderConfiguration::from_json("bad", ApiProvider::OpenAi, &bad_slot).unwrap_err();
        assert_eq!(err.code(), "CFG-1001");

        let missing_steps = json!({
            "type": "image",
            "model": "sd",
            "cfg_scale": 7.0,
            "tasks": { "thumbnail": "article_placeholder" }
        });
        assert!(ProviderConfiguration::from_json("img", ApiProvider::StabilityAi, &missing_steps).is_err());

        let wrong_task = json!({
            "type": "audio",
            "model": "whisper-1",
            "tasks": { "summarize": {} }
        });
        assert!(ProviderConfiguration::from_json("aud", ApiProvider::OpenAi, &wrong_task).is_err());

        let conn = conn();
        conn.execute(
            "INSERT INTO ai_api (id, name, provider, configurations, created_at, updated_at) VALUES ('1', 'bad', 'OPAI', ?1, 0, 0)",
            params![bad_slot.to_string()],
        )
        .unwrap();
        assert!(ConfigRegistry::load(&conn).is_err());
    }

    #[test]
    fn chat_prompts_must_carry_their_task_slots() {
        let chat = |task: &str, user: &str| {
            json!({
                "type": "text",
                "model": "gpt-test",
                "tasks": {
                    task: {
                        "system": "Be helpful.",
                        "user": user,
                        "default_result_key": "NONE"
                    }
                }
            })
        };

        let no_target = chat("translate", "From language_1: original_text");
        let err = ProviderConfiguration::from_json("tr", ApiProvider::OpenAi, &no_target).unwrap_err();
        assert!(err.to_string().contains("language_2"));
        let with_target = chat("translate", "language_1 to language_2: original_text");
        assert!(ProviderConfiguration::from_json("tr", ApiProvider::OpenAi, &with_target).is_ok());

        let no_length = chat("generate_title", "Title for: original_text");
        let err = ProviderConfiguration::from_json("gt", ApiProvider::OpenAi, &no_length).unwrap_err();
        assert!(err.to_string().contains("max_title_length"));
        let with_length = chat("generate_title", "At most max_title_length chars: original_text");
        assert!(ProviderConfiguration::from_json("gt", ApiProvider::OpenAi, &with_length).is_ok());
    }

    #[test]
    fn credentials_round_trip_and_clear() {
        let conn = conn();
        assert_eq!(load_credential(&conn, ApiProvider::OpenAi).unwrap(), None);
        store_credential(&conn, ApiProvider::OpenAi, "  sk-test ").unwrap();
        assert_eq!(
            load_credential(&conn, ApiProvider::OpenAi).unwrap().as_deref(),
            Some("sk-test")
        );
        store_credential(&conn, ApiProvider::OpenAi, "").unwrap();
        assert_eq!(load_credential(&conn, ApiProvider::OpenAi).unwrap(), None);
    }
}
