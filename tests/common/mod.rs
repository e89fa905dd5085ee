//! In-memory stand-ins for the external systems.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};
use std::rc::Rc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};
use tempfile::TempDir;

use ytcards::adapters::anki::{AnkiError, AnkiRequest, AnkiResponse, AnkiTransport};
use ytcards::adapters::{
    AnkiClient, CompletionModel, Inbox, MetadataSource, RawMessage, TranscriptSource,
};
use ytcards::core::{FlashcardSink, Orchestrator, PromptLibrary};
use ytcards::domain::{Transcript, VideoMetadata};

pub const SUMMARY_TEMPLATE: &str = "SUMMARIZE";
pub const CARDS_TEMPLATE: &str = "FLASHCARDS";
pub const TAGS_TEMPLATE: &str = "TAGS";

/// Plain-text message with the given body
pub fn plain_message(seq: u32, subject: &str, body: &str) -> RawMessage {
    RawMessage {
        seq,
        source: format!(
            "From: friend@example.com\r\nSubject: {}\r\nContent-Type: text/plain; charset=utf-8\r\n\r\n{}\r\n",
            subject, body
        )
        .into_bytes(),
    }
}

/// Inbox that hands out fixed messages, or fails like a refused login
#[derive(Clone, Default)]
pub struct FakeInbox {
    pub messages: Vec<RawMessage>,
    pub fail: bool,
    pub fetches: Rc<RefCell<usize>>,
}

impl FakeInbox {
    pub fn with(messages: Vec<RawMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }
}

#[async_trait(?Send)]
impl Inbox for FakeInbox {
    fn name(&self) -> &str {
        "fake"
    }

    async fn fetch_unread(&self) -> Result<Vec<RawMessage>> {
        *self.fetches.borrow_mut() += 1;
        if self.fail {
            anyhow::bail!("LOGIN failed: invalid credentials");
        }
        Ok(self.messages.clone())
    }
}

/// Every video belongs to "Chan <id>" unless listed as unknown
#[derive(Clone, Default)]
pub struct FakeMetadata {
    pub unknown: HashSet<String>,
}

#[async_trait(?Send)]
impl MetadataSource for FakeMetadata {
    async fn video_metadata(&self, video_id: &str) -> Result<Option<VideoMetadata>> {
        if self.unknown.contains(video_id) {
            return Ok(None);
        }
        Ok(Some(VideoMetadata {
            title: format!("Title {}", video_id),
            channel_name: format!("Chan {}", video_id),
        }))
    }
}

/// Transcript text ends with the video id so the model can recover it
#[derive(Clone, Default)]
pub struct FakeTranscripts {
    pub disabled: HashSet<String>,
}

#[async_trait(?Send)]
impl TranscriptSource for FakeTranscripts {
    async fn transcript(&self, video_id: &str) -> Result<Transcript> {
        if self.disabled.contains(video_id) {
            anyhow::bail!("Subtitles are disabled for this video");
        }
        Ok(Transcript::from_caption_text(&format!(
            "welcome back\nto the channel\ntoday {}",
            video_id
        )))
    }
}

/// Answers by template, keyed on the video id at the end of the prompt
#[derive(Clone, Default)]
pub struct ScriptedModel {
    /// Flashcard replies overriding the default one-card array
    pub card_replies: HashMap<String, String>,
    pub prompts: Rc<RefCell<Vec<String>>>,
}

impl ScriptedModel {
    pub fn card_reply(mut self, video_id: &str, reply: &str) -> Self {
        self.card_replies
            .insert(video_id.to_string(), reply.to_string());
        self
    }
}

#[async_trait(?Send)]
impl CompletionModel for ScriptedModel {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.borrow_mut().push(prompt.to_string());
        let video_id = prompt.split_whitespace().last().unwrap_or_default();

        if prompt.starts_with(SUMMARY_TEMPLATE) {
            Ok(format!("# Video {}\nNotes about {}", video_id, video_id))
        } else if prompt.starts_with(CARDS_TEMPLATE) {
            Ok(self.card_replies.get(video_id).cloned().unwrap_or_else(|| {
                json!([{"question": format!("Q {}", video_id), "answer": format!("A {}", video_id)}])
                    .to_string()
            }))
        } else if prompt.starts_with(TAGS_TEMPLATE) {
            Ok(format!("tag-{} shared", video_id))
        } else {
            anyhow::bail!("unexpected prompt: {}", prompt)
        }
    }
}

/// Stateful AnkiConnect: remembers decks and notes, refuses duplicates
#[derive(Clone, Default)]
pub struct FakeAnki {
    pub calls: Rc<RefCell<Vec<(String, Value)>>>,
    pub decks: Rc<RefCell<Vec<String>>>,
    pub fronts: Rc<RefCell<HashSet<String>>>,
    /// Number of leading requests that fail as if Anki were still starting
    pub unreachable_for: Rc<RefCell<usize>>,
    pub sync_error: Option<String>,
    pub deck_names_error: Option<String>,
    pub create_deck_error: Option<String>,
    /// Cards whose front ends with one of these are refused by Anki
    pub reject_fronts: HashSet<String>,
    /// Cards whose front ends with one of these never reach Anki
    pub drop_fronts: HashSet<String>,
}

impl FakeAnki {
    pub fn actions(&self) -> Vec<String> {
        self.calls.borrow().iter().map(|(a, _)| a.clone()).collect()
    }

    pub fn notes(&self) -> Vec<Value> {
        self.calls
            .borrow()
            .iter()
            .filter(|(a, _)| a == "addNote")
            .map(|(_, p)| p["note"].clone())
            .collect()
    }
}

#[async_trait(?Send)]
impl AnkiTransport for FakeAnki {
    async fn send(&self, request: &AnkiRequest<'_>) -> Result<AnkiResponse, AnkiError> {
        {
            let mut remaining = self.unreachable_for.borrow_mut();
            if *remaining > 0 {
                *remaining -= 1;
                return Err(AnkiError::Unreachable {
                    action: request.action.to_string(),
                    message: "connection refused".to_string(),
                });
            }
        }

        self.calls
            .borrow_mut()
            .push((request.action.to_string(), request.params.clone()));

        let front = request.params["note"]["fields"]["Front"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        if self.drop_fronts.iter().any(|q| front.ends_with(q.as_str())) {
            return Err(AnkiError::Unreachable {
                action: request.action.to_string(),
                message: "connection reset by peer".to_string(),
            });
        }

        let response = match request.action {
            "deckNames" => match &self.deck_names_error {
                Some(message) => AnkiResponse::err(message.clone()),
                None => AnkiResponse::ok(json!(*self.decks.borrow())),
            },
            "createDeck" if self.create_deck_error.is_some() => {
                AnkiResponse::err(self.create_deck_error.clone().unwrap_or_default())
            }
            "createDeck" => {
                let deck = request.params["deck"].as_str().unwrap_or_default();
                self.decks.borrow_mut().push(deck.to_string());
                AnkiResponse::ok(json!(self.decks.borrow().len()))
            }
            "addNote" if self.reject_fronts.iter().any(|q| front.ends_with(q.as_str())) => {
                AnkiResponse::err("model was not found: Basic")
            }
            "addNote" => {
                if self.fronts.borrow_mut().insert(front) {
                    AnkiResponse::ok(json!(1_000 + self.fronts.borrow().len()))
                } else {
                    AnkiResponse::err("cannot create note because it is a duplicate")
                }
            }
            "sync" => match &self.sync_error {
                Some(message) => AnkiResponse::err(message.clone()),
                None => AnkiResponse::ok(Value::Null),
            },
            other => AnkiResponse::err(format!("unsupported action: {}", other)),
        };
        Ok(response)
    }
}

/// Temp directory with short, recognisable templates
pub fn prompt_dir() -> TempDir {
    let temp = TempDir::new().unwrap();
    std::fs::write(temp.path().join("summarization.txt"), SUMMARY_TEMPLATE).unwrap();
    std::fs::write(temp.path().join("flashcard_generation.txt"), CARDS_TEMPLATE).unwrap();
    std::fs::write(temp.path().join("tags_generation.txt"), TAGS_TEMPLATE).unwrap();
    temp
}

/// Everything a pipeline test needs, with handles to inspect afterwards
pub struct Harness {
    pub prompts: TempDir,
    pub summaries: TempDir,
    pub metadata: FakeMetadata,
    pub transcripts: FakeTranscripts,
    pub model: ScriptedModel,
    pub anki: FakeAnki,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            prompts: prompt_dir(),
            summaries: TempDir::new().unwrap(),
            metadata: FakeMetadata::default(),
            transcripts: FakeTranscripts::default(),
            model: ScriptedModel::default(),
            anki: FakeAnki::default(),
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(
            self.metadata.clone(),
            self.transcripts.clone(),
            self.model.clone(),
            AnkiClient::new(self.anki.clone(), Some("test-key".to_string())),
            PromptLibrary::new(self.prompts.path()),
            FlashcardSink::new("YouTube Flashcards", "Basic"),
            self.summaries.path(),
        )
    }

    pub fn summary_files(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.summaries.path())
            .map(|entries| {
                entries
                    .filter_map(|e| e.ok())
                    .map(|e| e.file_name().to_string_lossy().to_string())
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        names
    }
}
