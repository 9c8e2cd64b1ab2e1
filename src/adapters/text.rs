//! Chat-completion backed text transformations.

use std::sync::Arc;

use async_trait::async_trait;

use crate::apis::client::ChatMessage;
use crate::apis::config::ChatTemplate;
use crate::apis::template::SlotValues;
use crate::errors::{Result, SmartModelsError};
use crate::model_manager::ModelManager;
use crate::providers::{ApiProvider, ContentType, Task};

/// Language every source text is assumed to be written in.
// TODO: detect the source language from the text instead of assuming it.
pub const SOURCE_LANGUAGE: &str = "english";

const RESULT_MARKER: &str = "Result:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextTask {
    SpellCorrect,
    GenerateTitle { max_title_length: usize },
    Summarize,
    Translate { target_language: String },
    Emojify,
}

impl TextTask {
    pub fn task(&self) -> Task {
        match self {
            Self::SpellCorrect => Task::SpellCorrect,
            Self::GenerateTitle { .. } => Task::GenerateTitle,
            Self::Summarize => Task::Summarize,
            Self::Translate { .. } => Task::Translate,
            Self::Emojify => Task::Emojify,
        }
    }
}

/// `Ok(None)` means "no usable answer": the provider is not supported, no
/// configuration matched, or the response was a fallback.
#[async_trait]
pub trait TextAdapter: Send + Sync {
    async fn run(
        &self,
        task: TextTask,
        original_text: &str,
        provider: ApiProvider,
    ) -> Result<Option<String>>;

    async fn spell_correct(&self, original_text: &str, provider: ApiProvider) -> Result<Option<String>> {
        self.run(TextTask::SpellCorrect, original_text, provider).await
    }

    async fn generate_title(
        &self,
        original_text: &str,
        max_title_length: usize,
        provider: ApiProvider,
    ) -> Result<Option<String>> {
        if max_title_length <= 2 {
            return Err(SmartModelsError::InvalidTitleLength(max_title_length));
        }
        self.run(TextTask::GenerateTitle { max_title_length }, original_text, provider)
            .await
    }

    async fn summarize(&self, original_text: &str, provider: ApiProvider) -> Result<Option<String>> {
        self.run(TextTask::Summarize, original_text, provider).await
    }

    async fn translate(
        &self,
        original_text: &str,
        target_language: &str,
        provider: ApiProvider,
    ) -> Result<Option<String>> {
        let task = TextTask::Translate {
            target_language: target_language.to_string(),
        };
        self.run(task, original_text, provider).await
    }

    async fn emojify(&self, original_text: &str, provider: ApiProvider) -> Result<Option<String>> {
        self.run(TextTask::Emojify, original_text, provider).await
    }
}

pub struct ProviderTextAdapter {
    models: Arc<ModelManager>,
}

impl ProviderTextAdapter {
    pub fn new(models: Arc<ModelManager>) -> Self {
        Self { models }
    }
}

#[async_trait]
impl TextAdapter for ProviderTextAdapter {
    async fn run(
        &self,
        task: TextTask,
        original_text: &str,
        provider: ApiProvider,
    ) -> Result<Option<String>> {
        if provider != ApiProvider::OpenAi {
            return Ok(None);
        }
        let Some(configuration) = self
            .models
            .resolve(task.task(), ContentType::Text, provider)
            .await
        else {
            return Ok(None);
        };
        let Some(template) = configuration.chat_template(task.task()) else {
            return Ok(None);
        };

        let messages = build_messages(template, &task, original_text);
        match self.models.client().chat(&configuration.model, &messages).await {
            Ok(content) => {
                self.models
                    .log_invocation_success(&configuration, task.task())
                    .await;
                Ok(postprocess_result(&content, &template.default_result_key))
            }
            Err(err) => {
                self.models
                    .log_invocation_failure(&configuration, task.task(), &err)
                    .await;
                Err(err)
            }
        }
    }
}

/// System and user messages for `task`; the result-format rules are
/// appended to the system message.
pub fn build_messages(template: &ChatTemplate, task: &TextTask, original_text: &str) -> Vec<ChatMessage> {
    let source = capitalize(SOURCE_LANGUAGE);
    let target = match task {
        TextTask::Translate { target_language } => Some(capitalize(target_language)),
        _ => None,
    };
    let max_title_length = match task {
        TextTask::GenerateTitle { max_title_length } => Some(*max_title_length),
        _ => None,
    };

    let mut values = SlotValues::default();
    if target.is_some() {
        values.source_language = Some(source.as_str());
        values.target_language = target.as_deref();
    } else {
        values.default_language = Some(source.as_str());
    }

    let mut system = template.system.render(&values);
    system.push_str(&template.result_format_rules);

    values.original_text = Some(original_text);
    values.max_title_length = max_title_length;
    let user = template.user.render(&values);

    vec![ChatMessage::system(system), ChatMessage::user(user)]
}

/// Keep the text after `Result:` on the last line of `content`. Answers that
/// mention `default_result_key` are discarded.
pub fn postprocess_result(content: &str, default_result_key: &str) -> Option<String> {
    let last_line = content.split('\n').last().unwrap_or_default().trim();
    match last_line.find(RESULT_MARKER) {
        Some(idx) => {
            let result = last_line[idx + RESULT_MARKER.len()..].trim();
            if result
                .to_lowercase()
                .contains(&default_result_key.to_lowercase())
            {
                None
            } else {
                Some(result.to_string())
            }
        }
        None => Some(last_line.to_string()),
    }
}

fn capitalize(word: &str) -> String {
    let lower = word.to_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::apis::template::PromptTemplate;
    use crate::db::init_in_memory;
    use crate::settings::{ProviderEndpoint, Settings};

    fn template(system: &str, user: &str) -> ChatTemplate {
        ChatTemplate {
            system: PromptTemplate::parse(system),
            user: PromptTemplate::parse(user),
            result_format_rules: " RULES".into(),
            default_result_key: "NO_ANSWER".into(),
        }
    }

    #[test]
    fn extracts_text_after_result_marker() {
        assert_eq!(
            postprocess_result("Text: foo\nResult: bar", "NO_ANSWER").as_deref(),
            Some("bar")
        );
    }

    #[test]
    fn discards_fallback_answers_case_insensitively() {
        assert_eq!(postprocess_result("Text: foo\nResult: no_answer", "NO_ANSWER"), None);
        assert_eq!(postprocess_result("Result: bar", "BAR"), None);
    }

    #[test]
    fn keeps_last_line_without_marker() {
        assert_eq!(
            postprocess_result("preamble\n  plain answer  ", "NO_ANSWER").as_deref(),
            Some("plain answer")
        );
    }

    #[test]
    fn translate_prompt_fills_language_pair() {
        let template = template(
            "Translate from language_1 to language_2.",
            "language_1 -> language_2: original_text",
        );
        let task = TextTask::Translate {
            target_language: "gERMAN".into(),
        };
        let messages = build_messages(&template, &task, "hello");
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[0].content, "Translate from English to German. RULES");
        assert_eq!(messages[1].content, "English -> German: hello");
    }

    #[test]
    fn title_prompt_fills_max_length() {
        let template = template(
            "Title default_language text.",
            "At most max_title_length chars: original_text",
        );
        let task = TextTask::GenerateTitle { max_title_length: 40 };
        let messages = build_messages(&template, &task, "body");
        assert_eq!(messages[0].content, "Title English text. RULES");
        assert_eq!(messages[1].content, "At most 40 chars: body");
    }

    #[tokio::test]
    async fn generate_title_rejects_short_limits() {
        let pool = init_in_memory().unwrap();
        let adapter = ProviderTextAdapter::new(ModelManager::new(pool, Settings::default()).unwrap());
        let err = adapter
            .generate_title("text", 2, ApiProvider::OpenAi)
            .await
            .unwrap_err();
        assert!(matches!(err, SmartModelsError::InvalidTitleLength(2)));
        // Unsupported provider: no call, no error.
        assert_eq!(
            adapter
                .generate_title("text", 3, ApiProvider::Azure)
                .await
                .unwrap(),
            None
        );
    }

    #[tokio::test]
    async fn summarize_round_trips_through_provider() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"content":"Text: long text\nResult: short"}}]}"#)
            .create_async()
            .await;

        let pool = init_in_memory().unwrap();
        let settings = Settings {
            openai: ProviderEndpoint::new(server.url()).with_api_key("sk-test"),
            ..Settings::default()
        };
        let adapter = ProviderTextAdapter::new(ModelManager::new(pool, settings).unwrap());
        let summary = adapter
            .summarize("long text", ApiProvider::OpenAi)
            .await
            .unwrap();
        assert_eq!(summary.as_deref(), Some("short"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn fallback_answer_yields_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"content":"Text: fine\nResult: NO_CHANGES"}}]}"#)
            .create_async()
            .await;

        let pool = init_in_memory().unwrap();
        let settings = Settings {
            openai: ProviderEndpoint::new(server.url()).with_api_key("sk-test"),
            ..Settings::default()
        };
        let adapter = ProviderTextAdapter::new(ModelManager::new(pool, settings).unwrap());
        assert_eq!(
            adapter.spell_correct("fine", ApiProvider::OpenAi).await.unwrap(),
            None
        );
    }
}
