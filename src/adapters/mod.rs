//! Adapter interfaces for external systems.
//!
//! Each collaborator of the pipeline (mail server, video data API,
//! caption provider, language model, AnkiConnect) sits behind a trait so the
//! orchestrator can be driven by in-memory fakes in tests.
//!
//! The pipeline runs every call in sequence on a single thread, so the
//! traits do not require `Send` futures.

pub mod anki;
pub mod mail;
pub mod openai;
pub mod transcript;
pub mod youtube;

use anyhow::Result;
use async_trait::async_trait;

use crate::domain::{Transcript, VideoMetadata};

pub use anki::{AnkiClient, AnkiError, AnkiTransport, HttpTransport, NewNote, NoteOutcome};
pub use mail::ImapInbox;
pub use openai::OpenAiClient;
pub use transcript::CaptionTranscripts;
pub use youtube::YouTubeDataClient;

/// One message as fetched from the mail server (full RFC 822 source)
#[derive(Debug, Clone)]
pub struct RawMessage {
    /// Server-side sequence number
    pub seq: u32,
    pub source: Vec<u8>,
}

/// Source of unread messages
#[async_trait(?Send)]
pub trait Inbox {
    /// Human-readable adapter name
    fn name(&self) -> &str;

    /// Fetch every unread message in the inbox.
    ///
    /// Fetching a message's content marks it as read on the server.
    async fn fetch_unread(&self) -> Result<Vec<RawMessage>>;
}

/// Lookup of a video's title and channel
#[async_trait(?Send)]
pub trait MetadataSource {
    /// Returns `None` when the API knows no video with this id
    async fn video_metadata(&self, video_id: &str) -> Result<Option<VideoMetadata>>;
}

/// Caption retrieval
#[async_trait(?Send)]
pub trait TranscriptSource {
    /// Fails when the video has no usable captions
    async fn transcript(&self, video_id: &str) -> Result<Transcript>;
}

/// Chat-style completion with a single user turn
#[async_trait(?Send)]
pub trait CompletionModel {
    /// Model identifier sent with each request
    fn model_name(&self) -> &str;

    /// Send `prompt` as the only user message and return the first choice
    async fn complete(&self, prompt: &str) -> Result<String>;
}
