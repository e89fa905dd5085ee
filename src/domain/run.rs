//! Run state and the report produced at the end of a run.
//!
//! A run walks `Idle -> Extracting -> Processing* -> Syncing -> Done`, or
//! stops at `Aborted` when extraction fails. Each `Processing` step moves a
//! single video through the stages in [`VideoStage`].

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Overall state of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Extracting,
    /// Working on the video at `index` (zero based)
    Processing { index: usize, stage: VideoStage },
    Syncing,
    Done,
    Aborted { error: String },
}

/// Stages of the per-video pipeline, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoStage {
    Fetching,
    Summarizing,
    CardGen,
    TagGen,
    Uploading,
}

impl fmt::Display for VideoStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VideoStage::Fetching => "fetching",
            VideoStage::Summarizing => "summarizing",
            VideoStage::CardGen => "flashcard generation",
            VideoStage::TagGen => "tag generation",
            VideoStage::Uploading => "uploading",
        };
        f.write_str(name)
    }
}

/// A failure confined to one video; the run moves on to the next one
#[derive(Debug, Error)]
#[error("video {video_id}: {stage} failed: {error:#}")]
pub struct VideoError {
    pub video_id: String,
    pub stage: VideoStage,
    pub error: anyhow::Error,
}

impl VideoError {
    pub fn new(video_id: impl Into<String>, stage: VideoStage, error: anyhow::Error) -> Self {
        Self {
            video_id: video_id.into(),
            stage,
            error,
        }
    }
}

/// Result of submitting one video's cards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UploadTally {
    pub added: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

impl UploadTally {
    pub fn total(&self) -> usize {
        self.added + self.duplicates + self.rejected
    }
}

/// What happened to a single video
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum VideoOutcome {
    Completed {
        video_id: String,
        title: String,
        cards: UploadTally,
        tags: usize,
    },
    Skipped {
        video_id: String,
        stage: VideoStage,
        reason: String,
    },
}

impl From<VideoError> for VideoOutcome {
    fn from(err: VideoError) -> Self {
        VideoOutcome::Skipped {
            reason: format!("{:#}", err.error),
            video_id: err.video_id,
            stage: err.stage,
        }
    }
}

/// Counts gathered over a whole run
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub state: RunState,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub unread_messages: usize,
    /// Unread messages that could not be parsed or decoded
    pub skipped_messages: usize,
    pub links_found: usize,
    pub synced: bool,
    pub videos: Vec<VideoOutcome>,
}

impl RunReport {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            state: RunState::Idle,
            started_at: Utc::now(),
            completed_at: None,
            unread_messages: 0,
            skipped_messages: 0,
            links_found: 0,
            synced: false,
            videos: Vec::new(),
        }
    }

    pub fn processed(&self) -> usize {
        self.videos
            .iter()
            .filter(|v| matches!(v, VideoOutcome::Completed { .. }))
            .count()
    }

    pub fn skipped(&self) -> usize {
        self.videos.len() - self.processed()
    }

    /// Card counts summed over every completed video
    pub fn cards(&self) -> UploadTally {
        self.videos
            .iter()
            .fold(UploadTally::default(), |mut acc, outcome| {
                if let VideoOutcome::Completed { cards, .. } = outcome {
                    acc.added += cards.added;
                    acc.duplicates += cards.duplicates;
                    acc.rejected += cards.rejected;
                }
                acc
            })
    }

    pub fn tags_generated(&self) -> usize {
        self.videos
            .iter()
            .map(|v| match v {
                VideoOutcome::Completed { tags, .. } => *tags,
                VideoOutcome::Skipped { .. } => 0,
            })
            .sum()
    }

    pub fn finish(&mut self, state: RunState) {
        self.state = state;
        self.completed_at = Some(Utc::now());
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cards = self.cards();
        writeln!(f, "Run {}", self.run_id)?;
        writeln!(
            f,
            "  unread messages: {} ({} undecodable)",
            self.unread_messages, self.skipped_messages
        )?;
        writeln!(f, "  links found:     {}", self.links_found)?;
        writeln!(
            f,
            "  videos:          {} processed, {} skipped",
            self.processed(),
            self.skipped()
        )?;
        writeln!(
            f,
            "  cards:           {} submitted: {} added, {} duplicate, {} rejected",
            cards.total(),
            cards.added,
            cards.duplicates,
            cards.rejected
        )?;
        writeln!(f, "  tags generated:  {}", self.tags_generated())?;
        for outcome in &self.videos {
            if let VideoOutcome::Skipped {
                video_id,
                stage,
                reason,
            } = outcome
            {
                writeln!(f, "  skipped {} at {}: {}", video_id, stage, reason)?;
            }
        }
        Ok(())
    }
}
