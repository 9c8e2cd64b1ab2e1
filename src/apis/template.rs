//! Prompt templates with typed slots.
//!
//! Seed files write placeholders as bare tokens (`original_text`,
//! `language_1`, ...). They are parsed once when the registry loads, so an
//! unexpected placeholder is reported before any record is saved.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    OriginalText,
    DefaultLanguage,
    SourceLanguage,
    TargetLanguage,
    MaxTitleLength,
    Article,
}

impl Slot {
    const ALL: [Slot; 6] = [
        Slot::OriginalText,
        Slot::DefaultLanguage,
        Slot::SourceLanguage,
        Slot::TargetLanguage,
        Slot::MaxTitleLength,
        Slot::Article,
    ];

    pub fn token(&self) -> &'static str {
        match self {
            Self::OriginalText => "original_text",
            Self::DefaultLanguage => "default_language",
            Self::SourceLanguage => "language_1",
            Self::TargetLanguage => "language_2",
            Self::MaxTitleLength => "max_title_length",
            Self::Article => "article_placeholder",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Slot(Slot),
}

/// Values substituted into a template. Slots left as `None` render as their
/// raw token.
#[derive(Debug, Clone, Default)]
pub struct SlotValues<'a> {
    pub original_text: Option<&'a str>,
    pub default_language: Option<&'a str>,
    pub source_language: Option<&'a str>,
    pub target_language: Option<&'a str>,
    pub max_title_length: Option<usize>,
    pub article: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    segments: Vec<Segment>,
}

impl PromptTemplate {
    pub fn parse(raw: &str) -> Self {
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut rest = raw;
        while !rest.is_empty() {
            if let Some(slot) = Slot::ALL.iter().find(|s| rest.starts_with(s.token())) {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(Segment::Slot(*slot));
                rest = &rest[slot.token().len()..];
                continue;
            }
            let mut chars = rest.chars();
            if let Some(ch) = chars.next() {
                literal.push(ch);
            }
            rest = chars.as_str();
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        Self { segments }
    }

    pub fn slots(&self) -> impl Iterator<Item = Slot> + '_ {
        self.segments.iter().filter_map(|seg| match seg {
            Segment::Slot(slot) => Some(*slot),
            Segment::Literal(_) => None,
        })
    }

    pub fn contains(&self, slot: Slot) -> bool {
        self.slots().any(|s| s == slot)
    }

    /// Check that the template only uses `allowed` slots and uses every
    /// `required` one.
    pub fn check(&self, allowed: &[Slot], required: &[Slot]) -> Result<(), String> {
        if let Some(unexpected) = self.slots().find(|s| !allowed.contains(s)) {
            return Err(format!("placeholder '{unexpected}' is not allowed here"));
        }
        if let Some(missing) = required.iter().find(|s| !self.contains(**s)) {
            return Err(format!("placeholder '{missing}' is required"));
        }
        Ok(())
    }

    pub fn render(&self, values: &SlotValues<'_>) -> String {
        let mut out = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot(slot) => {
                    let value = match slot {
                        Slot::OriginalText => values.original_text.map(str::to_string),
                        Slot::DefaultLanguage => values.default_language.map(str::to_string),
                        Slot::SourceLanguage => values.source_language.map(str::to_string),
                        Slot::TargetLanguage => values.target_language.map(str::to_string),
                        Slot::MaxTitleLength => values.max_title_length.map(|n| n.to_string()),
                        Slot::Article => values.article.map(str::to_string),
                    };
                    out.push_str(value.as_deref().unwrap_or(slot.token()));
                }
            }
        }
        out
    }
}

impl From<&str> for PromptTemplate {
    fn from(raw: &str) -> Self {
        Self::parse(raw)
    }
}
