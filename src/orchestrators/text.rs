use crate::errors::Result;
use crate::fields::SmartTextField;
use crate::orchestrators::{gather_text, SmartContext};
use crate::record::{FieldUpdate, RecordSnapshot};

/// Run the enabled text tasks over the field's input. A task that yields no
/// answer leaves its input unchanged for the next one. `None` when there is
/// no input text at all.
pub async fn transform_text(
    field: &SmartTextField,
    ctx: &SmartContext,
    snapshot: &RecordSnapshot,
) -> Result<Option<FieldUpdate>> {
    let options = field.options();
    let input = if options.data_fields.is_empty() {
        snapshot.text(field.attribute()).map(str::to_string)
    } else {
        gather_text(snapshot, &options.data_fields)?
    };
    let Some(mut text) = input else {
        log::debug!("no input text for '{}'; skipping", field.attribute());
        return Ok(None);
    };

    let adapter = ctx.text();
    let provider = options.api_provider;
    if options.spell_correct {
        text = adapter.spell_correct(&text, provider).await?.unwrap_or(text);
    }
    if options.generate_title {
        text = adapter
            .generate_title(&text, options.max_title_length, provider)
            .await?
            .unwrap_or(text);
    }
    if options.summarize {
        text = adapter.summarize(&text, provider).await?.unwrap_or(text);
    }
    if options.translate {
        if let Some(target) = options.target_lang.as_deref() {
            text = adapter.translate(&text, target, provider).await?.unwrap_or(text);
        }
    }
    if options.emojify {
        text = adapter.emojify(&text, provider).await?.unwrap_or(text);
    }

    Ok(Some(FieldUpdate::Text {
        attribute: field.attribute().to_string(),
        value: Some(text),
    }))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::adapters::text::TextTask;
    use crate::fields::TextFieldOptions;
    use crate::orchestrators::testing::{FakeAudio, FakeImage, FakeText};
    use crate::record::{AttributeValue, RecordSchema};

    fn schema() -> RecordSchema {
        RecordSchema::new().text("title").text("intro").text("body")
    }

    fn context(text: Arc<FakeText>) -> SmartContext {
        SmartContext::with_adapters(
            text,
            Arc::new(FakeAudio::default()),
            Arc::new(FakeImage::default()),
            std::env::temp_dir(),
        )
    }

    fn update_value(update: Option<FieldUpdate>) -> Option<String> {
        match update {
            Some(FieldUpdate::Text { value, .. }) => value,
            other => panic!("unexpected update {other:?}"),
        }
    }

    #[tokio::test]
    async fn without_tasks_sources_are_joined() {
        let field = SmartTextField::new(
            "title",
            TextFieldOptions {
                data_fields: vec!["intro".into(), "body".into()],
                ..Default::default()
            },
            &schema(),
        )
        .unwrap();
        let fake = Arc::new(FakeText::default());
        let snapshot = RecordSnapshot::new()
            .with_text("intro", "first")
            .with_text("body", "second");

        let update = transform_text(&field, &context(fake.clone()), &snapshot)
            .await
            .unwrap();
        assert_eq!(update_value(update).as_deref(), Some("first\nsecond"));
        assert!(fake.calls.lock().unwrap().is_empty());
    }

    fn call_log(fake: &FakeText) -> Vec<(TextTask, String)> {
        fake.calls.lock().unwrap().clone()
    }

    #[tokio::test]
    async fn summary_flows_into_translation_then_emoji() {
        let field = SmartTextField::new(
            "body",
            TextFieldOptions {
                spell_correct: true,
                summarize: true,
                translate: true,
                target_lang: Some("german".into()),
                emojify: true,
                ..Default::default()
            },
            &schema(),
        )
        .unwrap();
        let fake = Arc::new(FakeText::default());
        let snapshot = RecordSnapshot::new().with_text("body", "txt");

        let update = transform_text(&field, &context(fake.clone()), &snapshot)
            .await
            .unwrap();
        assert_eq!(
            update_value(update).as_deref(),
            Some("emojify(translate(summarize(spell_correct(txt))))")
        );
        let german = TextTask::Translate {
            target_language: "german".into(),
        };
        assert_eq!(
            call_log(&fake),
            vec![
                (TextTask::SpellCorrect, "txt".to_string()),
                (TextTask::Summarize, "spell_correct(txt)".to_string()),
                (german, "summarize(spell_correct(txt))".to_string()),
                (
                    TextTask::Emojify,
                    "translate(summarize(spell_correct(txt)))".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn title_sits_between_spelling_and_translation() {
        let field = SmartTextField::new(
            "title",
            TextFieldOptions {
                data_fields: vec!["body".into()],
                spell_correct: true,
                generate_title: true,
                max_title_length: 60,
                translate: true,
                target_lang: Some("french".into()),
                emojify: true,
                ..Default::default()
            },
            &schema(),
        )
        .unwrap();
        let fake = Arc::new(FakeText::default());
        let snapshot = RecordSnapshot::new().with_text("body", "txt");

        let update = transform_text(&field, &context(fake.clone()), &snapshot)
            .await
            .unwrap();
        assert_eq!(
            update_value(update).as_deref(),
            Some("emojify(translate(generate_title(spell_correct(txt))))")
        );
        let french = TextTask::Translate {
            target_language: "french".into(),
        };
        assert_eq!(
            call_log(&fake),
            vec![
                (TextTask::SpellCorrect, "txt".to_string()),
                (
                    TextTask::GenerateTitle { max_title_length: 60 },
                    "spell_correct(txt)".to_string()
                ),
                (french, "generate_title(spell_correct(txt))".to_string()),
                (
                    TextTask::Emojify,
                    "translate(generate_title(spell_correct(txt)))".to_string()
                ),
            ]
        );
    }

    #[tokio::test]
    async fn own_value_is_kept_without_sources_or_tasks() {
        let field = SmartTextField::new("body", TextFieldOptions::default(), &schema()).unwrap();
        let fake = Arc::new(FakeText::default());
        let snapshot = RecordSnapshot::new()
            .with_text("body", "as typed")
            .with_text("intro", "ignored");

        let update = transform_text(&field, &context(fake.clone()), &snapshot)
            .await
            .unwrap();
        assert_eq!(update_value(update).as_deref(), Some("as typed"));
        assert!(call_log(&fake).is_empty());
    }

    #[tokio::test]
    async fn declined_task_passes_its_input_through() {
        let field = SmartTextField::new(
            "title",
            TextFieldOptions {
                data_fields: vec!["body".into()],
                generate_title: true,
                max_title_length: 40,
                emojify: true,
                ..Default::default()
            },
            &schema(),
        )
        .unwrap();
        let fake = Arc::new(FakeText {
            decline: vec!["generate_title"],
            ..Default::default()
        });
        let snapshot = RecordSnapshot::new().with_text("body", "long article");

        let update = transform_text(&field, &context(fake.clone()), &snapshot)
            .await
            .unwrap();
        assert_eq!(update_value(update).as_deref(), Some("emojify(long article)"));
        assert_eq!(
            fake.calls.lock().unwrap()[0].0,
            TextTask::GenerateTitle { max_title_length: 40 }
        );
    }

    #[tokio::test]
    async fn null_input_produces_no_update() {
        let field = SmartTextField::new(
            "title",
            TextFieldOptions {
                data_fields: vec!["body".into()],
                summarize: true,
                ..Default::default()
            },
            &schema(),
        )
        .unwrap();
        let fake = Arc::new(FakeText::default());
        let mut snapshot = RecordSnapshot::new();
        snapshot.set("body", AttributeValue::Text(None));

        let update = transform_text(&field, &context(fake.clone()), &snapshot)
            .await
            .unwrap();
        assert_eq!(update, None);
        assert!(fake.calls.lock().unwrap().is_empty());
    }
}
