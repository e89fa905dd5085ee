//! Caption retrieval through `yt-transcript-rs`.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::debug;
use yt_transcript_rs::api::YouTubeTranscriptApi;

use super::TranscriptSource;
use crate::config::YouTubeSettings;
use crate::domain::Transcript;

/// Fetches caption tracks and flattens them to a single line of text
pub struct CaptionTranscripts {
    api: YouTubeTranscriptApi,
    /// Preferred caption languages, best first
    languages: Vec<String>,
}

impl CaptionTranscripts {
    pub fn new(languages: Vec<String>) -> Result<Self> {
        let api = YouTubeTranscriptApi::new(None, None, None)
            .map_err(|e| anyhow!("Failed to create transcript client: {}", e))?;
        let languages = if languages.is_empty() {
            vec!["en".to_string()]
        } else {
            languages
        };
        Ok(Self { api, languages })
    }

    /// Create from resolved settings
    pub fn from_settings(settings: &YouTubeSettings) -> Result<Self> {
        Self::new(settings.transcript_languages.clone())
    }

    pub fn languages(&self) -> &[String] {
        &self.languages
    }
}

#[async_trait(?Send)]
impl TranscriptSource for CaptionTranscripts {
    async fn transcript(&self, video_id: &str) -> Result<Transcript> {
        let languages: Vec<&str> = self.languages.iter().map(String::as_str).collect();

        let fetched = self
            .api
            .fetch_transcript(video_id, &languages, false)
            .await
            .map_err(|e| anyhow!("No transcript available for {}: {}", video_id, e))?;

        debug!(
            %video_id,
            language = %fetched.language_code,
            segments = fetched.snippets.len(),
            "Fetched transcript"
        );

        Ok(Transcript::from_caption_text(&fetched.text()))
    }
}
