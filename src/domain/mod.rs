//! Domain types for the ytcards pipeline.
//!
//! This module contains the core data structures:
//! - Video: references, metadata, transcripts, summaries, cards and tags
//! - Run: run state, per-video outcomes and the final report

pub mod run;
pub mod video;

// Re-export commonly used types
pub use run::{RunReport, RunState, UploadTally, VideoError, VideoOutcome, VideoStage};
pub use video::{Flashcard, Summary, TagSet, Transcript, VideoMetadata, VideoReference};
