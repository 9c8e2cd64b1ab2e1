//! Owner of the configuration registry, the provider HTTP client and the
//! audit trail. Adapters go through it for every lookup and call.

use std::sync::{Arc, RwLock};

use serde_json::Value;
use tokio::task::spawn_blocking;

use crate::apis::client::ProviderClient;
use crate::apis::config::{self, ConfigRegistry, ProviderConfiguration};
use crate::db::DbPool;
use crate::errors::{Result, SmartModelsError};
use crate::logging::log_event;
use crate::providers::{ApiProvider, ContentType, Task};
use crate::settings::Settings;

pub struct ModelManager {
    pool: DbPool,
    registry: RwLock<Arc<ConfigRegistry>>,
    client: ProviderClient,
    settings: Settings,
}

impl ModelManager {
    /// Load the registry from `pool` and build the HTTP client. API keys
    /// missing from `settings` are taken from the `ai_credentials` table.
    pub fn new(pool: DbPool, mut settings: Settings) -> Result<Arc<Self>> {
        let registry = {
            let conn = pool.get()?;
            for provider in ApiProvider::ALL {
                let Some(endpoint) = settings.endpoint_mut(provider) else {
                    continue;
                };
                if endpoint.api_key.is_none() {
                    endpoint.api_key = config::load_credential(&conn, provider).map_err(|err| {
                        SmartModelsError::InvalidConfiguration {
                            name: format!("{}-credential", provider.code()),
                            reason: err.to_string(),
                        }
                    })?;
                }
            }
            ConfigRegistry::load(&conn)?
        };
        log::debug!("loaded {} provider task configurations", registry.len());

        let client = ProviderClient::new(&settings)?;
        Ok(Arc::new(Self {
            pool,
            registry: RwLock::new(Arc::new(registry)),
            client,
            settings,
        }))
    }

    pub fn pool(&self) -> DbPool {
        self.pool.clone()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn client(&self) -> &ProviderClient {
        &self.client
    }

    pub fn registry(&self) -> Arc<ConfigRegistry> {
        match self.registry.read() {
            Ok(guard) => Arc::clone(&guard),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    /// Rebuild the registry after the `ai_api` table changed.
    pub fn reload(&self) -> Result<()> {
        let conn = self.pool.get()?;
        let fresh = Arc::new(ConfigRegistry::load(&conn)?);
        match self.registry.write() {
            Ok(mut guard) => *guard = fresh,
            Err(poisoned) => *poisoned.into_inner() = fresh,
        }
        Ok(())
    }

    /// The configuration serving `task`, or `None` when the task should be
    /// skipped.
    pub async fn resolve(
        &self,
        task: Task,
        content_type: ContentType,
        provider: ApiProvider,
    ) -> Option<Arc<ProviderConfiguration>> {
        let resolved = self.registry().resolve(task, content_type, provider);
        if resolved.is_none() {
            self.audit(
                "info",
                "SMF-0101",
                "Transformation skipped",
                Some("No provider configuration matches the task"),
                serde_json::json!({
                    "task": task.as_str(),
                    "type": content_type.as_str(),
                    "provider": provider.code(),
                }),
            )
            .await;
        }
        resolved
    }

    pub async fn log_invocation_success(&self, configuration: &ProviderConfiguration, task: Task) {
        self.audit(
            "info",
            "SMF-0200",
            "Provider invocation succeeded",
            None,
            serde_json::json!({
                "configuration": configuration.name,
                "provider": configuration.provider.code(),
                "model": configuration.model,
                "task": task.as_str(),
            }),
        )
        .await;
    }

    pub async fn log_invocation_failure(
        &self,
        configuration: &ProviderConfiguration,
        task: Task,
        error: &SmartModelsError,
    ) {
        self.audit(
            "warn",
            "SMF-0201",
            "Provider invocation failed",
            Some(error.explain()),
            serde_json::json!({
                "configuration": configuration.name,
                "provider": configuration.provider.code(),
                "model": configuration.model,
                "task": task.as_str(),
                "error": error.to_string(),
            }),
        )
        .await;
    }

    /// Best-effort write to the event log, run on the blocking pool; failures
    /// only reach the `log` facade.
    pub async fn audit(
        &self,
        level: &str,
        code: &str,
        message: &str,
        explain: Option<&str>,
        data: Value,
    ) {
        let pool = self.pool.clone();
        let row = (
            level.to_string(),
            code.to_string(),
            message.to_string(),
            explain.map(str::to_string),
        );
        let written = spawn_blocking(move || -> std::result::Result<(), String> {
            let (level, code, message, explain) = row;
            let conn = pool.get().map_err(|err| err.to_string())?;
            log_event(
                &conn,
                &level,
                Some(&code),
                "smart_models",
                &message,
                explain.as_deref(),
                Some(data),
            )
            .map_err(|err| err.to_string())
        })
        .await
        .map_err(|err| err.to_string())
        .and_then(|written| written);
        if let Err(err) = written {
            log::warn!("could not record {code} in event log: {err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_in_memory;
    use crate::logging::recent_events;

    #[tokio::test]
    async fn resolves_seeded_configuration_and_audits_misses() {
        let pool = init_in_memory().unwrap();
        let manager = ModelManager::new(pool.clone(), Settings::default()).unwrap();

        assert!(manager
            .resolve(Task::Summarize, ContentType::Text, ApiProvider::OpenAi)
            .await
            .is_some());
        assert!(manager
            .resolve(Task::Summarize, ContentType::Text, ApiProvider::Gcp)
            .await
            .is_none());

        let conn = pool.get().unwrap();
        let events = recent_events(&conn, 5).unwrap();
        assert_eq!(events[0].code.as_deref(), Some("SMF-0101"));
    }

    #[test]
    fn stored_credentials_fill_missing_keys() {
        let pool = init_in_memory().unwrap();
        {
            let conn = pool.get().unwrap();
            config::store_credential(&conn, ApiProvider::OpenAi, "sk-stored").unwrap();
        }
        let settings = Settings {
            stability_ai: crate::settings::ProviderEndpoint::new("http://localhost").with_api_key("sk-env"),
            ..Settings::default()
        };
        let manager = ModelManager::new(pool, settings).unwrap();
        assert_eq!(manager.settings().openai.api_key.as_deref(), Some("sk-stored"));
        assert_eq!(manager.settings().stability_ai.api_key.as_deref(), Some("sk-env"));
    }

    #[tokio::test]
    async fn reload_picks_up_removed_rows() {
        let pool = init_in_memory().unwrap();
        let manager = ModelManager::new(pool.clone(), Settings::default()).unwrap();
        {
            let conn = pool.get().unwrap();
            conn.execute("DELETE FROM ai_api WHERE provider = 'STBAI'", []).unwrap();
        }
        assert!(manager
            .resolve(Task::Thumbnail, ContentType::Image, ApiProvider::StabilityAi)
            .await
            .is_some());
        manager.reload().unwrap();
        assert!(manager
            .resolve(Task::Thumbnail, ContentType::Image, ApiProvider::StabilityAi)
            .await
            .is_none());
    }

    #[tokio::test]
    async fn audit_rows_are_written_from_the_blocking_pool() {
        let pool = init_in_memory().unwrap();
        let manager = ModelManager::new(pool.clone(), Settings::default()).unwrap();
        let held = tokio::task::spawn_blocking({
            let pool = pool.clone();
            move || {
                let conn = pool.get().unwrap();
                std::thread::sleep(std::time::Duration::from_millis(50));
                drop(conn);
            }
        });

        manager
            .audit("info", "SMF-0100", "Smart field transformed", None, serde_json::json!({}))
            .await;
        held.await.unwrap();

        let conn = pool.get().unwrap();
        let events = recent_events(&conn, 1).unwrap();
        assert_eq!(events[0].code.as_deref(), Some("SMF-0100"));
        assert_eq!(events[0].module, "smart_models");
    }
}
