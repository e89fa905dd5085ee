//! Core pipeline logic.
//!
//! This module contains:
//! - Extract: Video link extraction from unread mail
//! - Generate: Prompt templates and the language-model stages
//! - Summaries: Summary files on disk
//! - Sink: Flashcard upload into Anki
//! - Companion: Anki application launch and readiness
//! - Orchestrator: Main execution engine

pub mod companion;
pub mod extract;
pub mod generate;
pub mod orchestrator;
pub mod sink;
pub mod summaries;

// Re-export commonly used types
pub use companion::{wait_until_ready, Companion};
pub use extract::{extract_links, extract_video_ids, scan_message, scan_messages, Extraction};
pub use generate::{
    generate_flashcards, generate_tags, parse_flashcards, summarize, PromptLibrary, Template,
};
pub use orchestrator::{CompanionSettings, Orchestrator};
pub use sink::FlashcardSink;
pub use summaries::{save_summary, summary_file_name};
