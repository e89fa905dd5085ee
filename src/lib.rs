//! ytcards - YouTube links from your inbox to Anki flashcards
//!
//! Scans unread mail for YouTube links, fetches each video's transcript,
//! has a language model summarise it and write flashcards and tags, then
//! uploads the cards to Anki through AnkiConnect.
//!
//! # Pipeline
//!
//! A run is a single sequential pass:
//! - Extract video ids from every unread message (fetching marks it read)
//! - Per video: metadata and transcript, summary (saved as Markdown),
//!   flashcards, tags, upload
//! - One final AnkiConnect sync
//!
//! A failure inside one video is logged and the run moves on to the next
//! one; only mailbox failures abort a run.
//!
//! # Modules
//!
//! - `adapters`: External system integrations (IMAP, YouTube, OpenAI, AnkiConnect)
//! - `core`: Pipeline logic (extraction, generation, upload, orchestration)
//! - `domain`: Data structures (videos, cards, run report)
//! - `config`: Configuration from environment and config file
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Process every unread YouTube link in the inbox
//! ytcards run
//!
//! # Process specific videos, Anki already running
//! ytcards video dQw4w9WgXcQ --no-launch
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use config::Config;
pub use core::Orchestrator;
pub use domain::{Flashcard, RunReport, RunState, Summary, TagSet, VideoOutcome, VideoReference};
