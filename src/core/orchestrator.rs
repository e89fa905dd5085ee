//! Main orchestrator for a ytcards run.
//!
//! Drives extraction, then each video in turn through fetch, summary,
//! flashcards, tags and upload, then a final sync. A failure inside one
//! video is caught at the per-video boundary, recorded in the report and
//! the run moves on; only extraction failure (or a companion that never
//! becomes ready) aborts the run.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{
    AnkiClient, CaptionTranscripts, CompletionModel, Inbox, MetadataSource, OpenAiClient,
    TranscriptSource, YouTubeDataClient,
};
use crate::config::Config;
use crate::domain::{RunReport, RunState, VideoError, VideoOutcome, VideoReference, VideoStage};

use super::companion::{wait_until_ready, Companion};
use super::extract::extract_links;
use super::generate::{generate_flashcards, generate_tags, summarize, PromptLibrary};
use super::sink::FlashcardSink;
use super::summaries::save_summary;

/// How to start the Anki desktop application
#[derive(Debug, Clone)]
pub struct CompanionSettings {
    pub command: String,
    pub log: PathBuf,
    pub ready_timeout: Duration,
    pub poll_interval: Duration,
}

/// Main pipeline orchestrator
pub struct Orchestrator {
    metadata: Box<dyn MetadataSource>,
    transcripts: Box<dyn TranscriptSource>,
    model: Box<dyn CompletionModel>,
    anki: AnkiClient,
    prompts: PromptLibrary,
    sink: FlashcardSink,
    summaries_dir: PathBuf,
    companion: Option<CompanionSettings>,
}

impl Orchestrator {
    /// Create an orchestrator from its collaborators
    pub fn new(
        metadata: impl MetadataSource + 'static,
        transcripts: impl TranscriptSource + 'static,
        model: impl CompletionModel + 'static,
        anki: AnkiClient,
        prompts: PromptLibrary,
        sink: FlashcardSink,
        summaries_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            metadata: Box::new(metadata),
            transcripts: Box::new(transcripts),
            model: Box::new(model),
            anki,
            prompts,
            sink,
            summaries_dir: summaries_dir.into(),
            companion: None,
        }
    }

    /// Build the production adapters from configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let orchestrator = Self::new(
            YouTubeDataClient::from_settings(&config.youtube)?,
            CaptionTranscripts::from_settings(&config.youtube)?,
            OpenAiClient::from_settings(&config.model)?,
            AnkiClient::from_settings(&config.anki),
            PromptLibrary::new(&config.prompts_dir),
            FlashcardSink::new(&config.anki.deck_namespace, &config.anki.note_type),
            &config.summaries_dir,
        );

        Ok(match &config.anki.launch_command {
            Some(command) => orchestrator.with_companion(CompanionSettings {
                command: command.clone(),
                log: config.anki.launch_log.clone(),
                ready_timeout: config.anki.ready_timeout,
                poll_interval: config.anki.poll_interval,
            }),
            None => orchestrator,
        })
    }

    /// Start the Anki application before the first upload
    pub fn with_companion(mut self, settings: CompanionSettings) -> Self {
        self.companion = Some(settings);
        self
    }

    /// Do not start the Anki application; AnkiConnect is assumed to be up
    pub fn without_companion(mut self) -> Self {
        self.companion = None;
        self
    }

    /// Full run: extract links from the inbox and process every video
    #[instrument(skip_all, fields(inbox = inbox.name()))]
    pub async fn run(&self, inbox: &dyn Inbox) -> Result<RunReport> {
        let mut report = RunReport::new(Uuid::new_v4());
        info!(run_id = %report.run_id, "Starting run");

        // Fetching marks mail as read, so refuse to start without templates
        self.prompts.check().context("Prompt templates are not usable")?;

        report.state = RunState::Extracting;
        let extraction = match extract_links(inbox).await {
            Ok(extraction) => extraction,
            Err(e) => {
                error!(error = %format!("{:#}", e), "Extraction failed, aborting run");
                report.finish(RunState::Aborted {
                    error: format!("{:#}", e),
                });
                return Err(e);
            }
        };
        report.unread_messages = extraction.unread_messages;
        report.skipped_messages = extraction.skipped_messages;
        report.links_found = extraction.references.len();

        self.process_all(extraction.references, report).await
    }

    /// Process explicit video references without touching the mailbox
    pub async fn run_videos(&self, references: Vec<VideoReference>) -> Result<RunReport> {
        let mut report = RunReport::new(Uuid::new_v4());
        info!(run_id = %report.run_id, videos = references.len(), "Starting run for given videos");

        self.prompts.check().context("Prompt templates are not usable")?;
        report.links_found = references.len();

        self.process_all(references, report).await
    }

    async fn process_all(
        &self,
        references: Vec<VideoReference>,
        mut report: RunReport,
    ) -> Result<RunReport> {
        if references.is_empty() {
            info!("No new YouTube links found");
            report.finish(RunState::Done);
            return Ok(report);
        }

        let companion = match self.start_companion().await {
            Ok(companion) => companion,
            Err(e) => {
                report.finish(RunState::Aborted {
                    error: format!("{:#}", e),
                });
                return Err(e);
            }
        };

        if let Err(e) = self.anki.sync().await {
            warn!(error = %e, "Initial sync failed");
        }

        for (index, reference) in references.iter().enumerate() {
            info!("----------------------------------");
            info!(
                url = %reference.url(),
                "Processing video {}/{} with ID: {}",
                index + 1,
                references.len(),
                reference
            );

            let outcome = match self.process_video(reference, index, &mut report.state).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(error = %e, "Skipping video");
                    VideoOutcome::from(e)
                }
            };
            report.videos.push(outcome);
        }

        report.state = RunState::Syncing;
        match self.anki.sync().await {
            Ok(()) => {
                report.synced = true;
                info!("Sync completed");
            }
            Err(e) => warn!(error = %e, "Final sync failed"),
        }

        if let Some(companion) = companion {
            companion.stop().await;
        }

        report.finish(RunState::Done);
        info!(
            processed = report.processed(),
            skipped = report.skipped(),
            cards_added = report.cards().added,
            "Run completed"
        );
        Ok(report)
    }

    /// Launch the application (if configured) and wait for AnkiConnect
    async fn start_companion(&self) -> Result<Option<Companion>> {
        let Some(settings) = &self.companion else {
            return Ok(None);
        };

        let companion = match Companion::launch(&settings.command, &settings.log) {
            Ok(companion) => Some(companion),
            Err(e) => {
                // AnkiConnect may already be served by a running instance
                warn!(error = %format!("{:#}", e), "Could not launch companion application");
                None
            }
        };

        if let Err(e) =
            wait_until_ready(&self.anki, settings.ready_timeout, settings.poll_interval).await
        {
            if let Some(companion) = companion {
                companion.stop().await;
            }
            return Err(e);
        }

        Ok(companion)
    }

    /// Run one video through every stage
    #[instrument(skip(self, state), fields(video_id = %reference.video_id))]
    pub async fn process_video(
        &self,
        reference: &VideoReference,
        index: usize,
        state: &mut RunState,
    ) -> Result<VideoOutcome, VideoError> {
        let video_id = reference.video_id.as_str();
        let fail = move |stage: VideoStage| move |e: anyhow::Error| VideoError::new(video_id, stage, e);
        let mut enter = |stage: VideoStage| *state = RunState::Processing { index, stage };

        enter(VideoStage::Fetching);
        let metadata = self
            .metadata
            .video_metadata(video_id)
            .await
            .map_err(fail(VideoStage::Fetching))?
            .ok_or_else(|| anyhow::anyhow!("No video found with this ID"))
            .map_err(fail(VideoStage::Fetching))?;
        info!("Channel name: {}", metadata.channel_name);
        info!("Video title: {}", metadata.title);

        let transcript = self
            .transcripts
            .transcript(video_id)
            .await
            .map_err(fail(VideoStage::Fetching))?;

        enter(VideoStage::Summarizing);
        let summary = summarize(self.model.as_ref(), &self.prompts, &transcript)
            .await
            .map_err(fail(VideoStage::Summarizing))?;
        let path = save_summary(&self.summaries_dir, &summary, video_id)
            .await
            .map_err(fail(VideoStage::Summarizing))?;
        info!(path = %path.display(), "Saved summary");

        enter(VideoStage::CardGen);
        let cards = generate_flashcards(self.model.as_ref(), &self.prompts, &summary)
            .await
            .map_err(fail(VideoStage::CardGen))?;

        enter(VideoStage::TagGen);
        let tags = generate_tags(self.model.as_ref(), &self.prompts, &summary)
            .await
            .map_err(fail(VideoStage::TagGen))?;

        enter(VideoStage::Uploading);
        let tally = self.sink.upload(&self.anki, &metadata, &cards, &tags).await;

        Ok(VideoOutcome::Completed {
            video_id: video_id.to_string(),
            title: metadata.title,
            cards: tally,
            tags: tags.len(),
        })
    }
}
