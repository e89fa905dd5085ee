//! Language-model stages: summary, flashcards and tags.
//!
//! Each stage loads its instruction template from the prompts directory,
//! combines it with its input and sends one completion request.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use crate::adapters::CompletionModel;
use crate::domain::{Flashcard, Summary, TagSet, Transcript};

/// Instruction template files
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Template {
    Summarization,
    FlashcardGeneration,
    TagsGeneration,
}

impl Template {
    pub const ALL: [Template; 3] = [
        Template::Summarization,
        Template::FlashcardGeneration,
        Template::TagsGeneration,
    ];

    pub fn file_name(self) -> &'static str {
        match self {
            Template::Summarization => "summarization.txt",
            Template::FlashcardGeneration => "flashcard_generation.txt",
            Template::TagsGeneration => "tags_generation.txt",
        }
    }
}

/// Directory of prompt templates, read fresh on every use
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    dir: PathBuf,
}

impl PromptLibrary {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Template text with surrounding whitespace trimmed
    pub fn load(&self, template: Template) -> Result<String> {
        let path = self.dir.join(template.file_name());
        let text = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read prompt template: {}", path.display()))?;
        Ok(text.trim().to_string())
    }

    /// Fail early if any template is missing
    pub fn check(&self) -> Result<()> {
        for template in Template::ALL {
            self.load(template)?;
        }
        Ok(())
    }
}

/// `"<template>: <transcript>"` with every newline removed
pub fn summary_prompt(template: &str, transcript: &Transcript) -> String {
    format!("{}: {}", template, transcript.text).replace('\n', "")
}

/// `"<template>\n\n<summary>"`
pub fn followup_prompt(template: &str, summary: &Summary) -> String {
    format!("{}\n\n{}", template, summary.text)
}

/// Parse the model's flashcard answer: a JSON array of
/// `{question, answer}` objects. A Markdown code fence around the array is
/// tolerated.
pub fn parse_flashcards(raw: &str) -> Result<Vec<Flashcard>> {
    let body = strip_code_fence(raw);
    serde_json::from_str(body).context("Flashcard response is not a JSON array of {question, answer}")
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Drop the info string (e.g. "json") up to the first newline
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Summarise a transcript; the reply is returned verbatim
pub async fn summarize(
    model: &dyn CompletionModel,
    prompts: &PromptLibrary,
    transcript: &Transcript,
) -> Result<Summary> {
    info!(model = model.model_name(), "Summarizing the transcript");
    let template = prompts.load(Template::Summarization)?;
    let reply = model
        .complete(&summary_prompt(&template, transcript))
        .await
        .context("Summary request failed")?;
    Ok(Summary::new(reply))
}

/// Ask for flashcards and parse them, keeping the model's order
pub async fn generate_flashcards(
    model: &dyn CompletionModel,
    prompts: &PromptLibrary,
    summary: &Summary,
) -> Result<Vec<Flashcard>> {
    info!("Generating flashcards from the summary");
    let template = prompts.load(Template::FlashcardGeneration)?;
    let reply = model
        .complete(&followup_prompt(&template, summary))
        .await
        .context("Flashcard request failed")?;
    let cards = parse_flashcards(&reply)?;
    info!("Created {} flashcards for the video", cards.len());
    Ok(cards)
}

/// Ask for tags and split the reply on whitespace
pub async fn generate_tags(
    model: &dyn CompletionModel,
    prompts: &PromptLibrary,
    summary: &Summary,
) -> Result<TagSet> {
    let template = prompts.load(Template::TagsGeneration)?;
    let reply = model
        .complete(&followup_prompt(&template, summary))
        .await
        .context("Tag request failed")?;
    let tags = TagSet::from_response(&reply);
    info!("Generated {} tags: {:?}", tags.len(), tags.as_slice());
    Ok(tags)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use async_trait::async_trait;
    use tempfile::TempDir;

    struct EchoModel {
        reply: String,
        prompts: RefCell<Vec<String>>,
    }

    impl EchoModel {
        fn replying(reply: &str) -> Self {
            Self {
                reply: reply.to_string(),
                prompts: RefCell::new(Vec::new()),
            }
        }
    }

    #[async_trait(?Send)]
    impl CompletionModel for EchoModel {
        fn model_name(&self) -> &str {
            "echo"
        }

        async fn complete(&self, prompt: &str) -> Result<String> {
            self.prompts.borrow_mut().push(prompt.to_string());
            Ok(self.reply.clone())
        }
    }

    fn prompt_dir() -> TempDir {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("summarization.txt"),
            "Summarize this\nvideo transcript\n",
        )
        .unwrap();
        std::fs::write(
            temp.path().join("flashcard_generation.txt"),
            "Write flashcards as JSON\n",
        )
        .unwrap();
        std::fs::write(temp.path().join("tags_generation.txt"), "  List tags  \n").unwrap();
        temp
    }

    #[test]
    fn test_summary_prompt_strips_newlines() {
        let transcript = Transcript {
            text: "line one\nline two".to_string(),
        };
        assert_eq!(
            summary_prompt("Summarize\nplease", &transcript),
            "Summarizeplease: line oneline two"
        );
    }

    #[test]
    fn test_followup_prompt_keeps_newlines() {
        let summary = Summary::new("# Title\nBody");
        assert_eq!(
            followup_prompt("Make cards", &summary),
            "Make cards\n\n# Title\nBody"
        );
    }

    #[test]
    fn test_parse_single_flashcard() {
        let cards = parse_flashcards(r#"[{"question":"Q1","answer":"A1"}]"#).unwrap();
        assert_eq!(
            cards,
            vec![Flashcard {
                question: "Q1".to_string(),
                answer: "A1".to_string(),
            }]
        );
    }

    #[test]
    fn test_parse_preserves_order_and_values() {
        let raw = r#"[
            {"question": "Why <b>borrow</b>?", "answer": "To avoid moves"},
            {"question": "What is 'static?", "answer": "Lives for the whole program", "extra": 1},
            {"question": "Empty?", "answer": ""}
        ]"#;
        let cards = parse_flashcards(raw).unwrap();
        let questions: Vec<&str> = cards.iter().map(|c| c.question.as_str()).collect();
        assert_eq!(
            questions,
            vec!["Why <b>borrow</b>?", "What is 'static?", "Empty?"]
        );
        assert_eq!(cards[0].answer, "To avoid moves");
        assert_eq!(cards[2].answer, "");
    }

    #[test]
    fn test_parse_fenced_json() {
        let raw = "```json\n[{\"question\":\"Q\",\"answer\":\"A\"}]\n```";
        assert_eq!(parse_flashcards(raw).unwrap().len(), 1);
    }

    #[test]
    fn test_parse_rejects_malformed_output() {
        assert!(parse_flashcards("Here are your flashcards: Q1 / A1").is_err());
        assert!(parse_flashcards(r#"[{"question":"Q1"}]"#).is_err());
        assert!(parse_flashcards(r#"{"question":"Q1","answer":"A1"}"#).is_err());
    }

    #[test]
    fn test_missing_template() {
        let temp = TempDir::new().unwrap();
        let prompts = PromptLibrary::new(temp.path());
        let err = prompts.load(Template::Summarization).unwrap_err();
        assert!(err.to_string().contains("summarization.txt"));
        assert!(prompts.check().is_err());
    }

    #[tokio::test]
    async fn test_summarize_sends_template_and_transcript() {
        let temp = prompt_dir();
        let prompts = PromptLibrary::new(temp.path());
        assert!(prompts.check().is_ok());
        let model = EchoModel::replying("# Cats Are Great\nThey are.");

        let summary = summarize(
            &model,
            &prompts,
            &Transcript {
                text: "cats purr".to_string(),
            },
        )
        .await
        .unwrap();

        assert_eq!(summary.text, "# Cats Are Great\nThey are.");
        assert_eq!(
            model.prompts.borrow()[0],
            "Summarize thisvideo transcript: cats purr"
        );
    }

    #[tokio::test]
    async fn test_generate_tags_from_reply() {
        let temp = prompt_dir();
        let prompts = PromptLibrary::new(temp.path());
        let model = EchoModel::replying("cats pets  animals\n");

        let tags = generate_tags(&model, &prompts, &Summary::new("# Cats"))
            .await
            .unwrap();

        assert_eq!(tags.as_slice(), ["cats", "pets", "animals"]);
        assert_eq!(model.prompts.borrow()[0], "List tags\n\n# Cats");
    }

    #[tokio::test]
    async fn test_generate_flashcards_surfaces_bad_json() {
        let temp = prompt_dir();
        let prompts = PromptLibrary::new(temp.path());
        let model = EchoModel::replying("not json at all");

        let result = generate_flashcards(&model, &prompts, &Summary::new("# Cats")).await;
        assert!(result.is_err());
    }
}
