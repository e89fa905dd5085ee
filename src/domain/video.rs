//! Per-video values that flow through a single pipeline pass.
//!
//! Every value here is transient: it is created by one stage, consumed by a
//! later one and dropped once the video's iteration finishes.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A video identifier extracted from an email body
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VideoReference {
    pub video_id: String,
}

impl VideoReference {
    pub fn new(video_id: impl Into<String>) -> Self {
        Self {
            video_id: video_id.into(),
        }
    }

    /// Canonical watch URL for this video
    pub fn url(&self) -> String {
        format!("https://www.youtube.com/watch?v={}", self.video_id)
    }
}

impl fmt::Display for VideoReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.video_id)
    }
}

/// Display title and channel of a video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub title: String,
    pub channel_name: String,
}

/// Flattened caption text, free of newlines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transcript {
    pub text: String,
}

impl Transcript {
    /// Build a transcript from raw caption text, replacing every newline
    /// with a space. Segments are joined as-is, so words at a boundary may
    /// run together.
    pub fn from_caption_text(raw: &str) -> Self {
        Self {
            text: raw.replace('\n', " "),
        }
    }
}

/// Markdown summary produced by the language model
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Summary {
    pub text: String,
}

impl Summary {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }

    /// First line of the summary, used as its title
    pub fn title_line(&self) -> &str {
        self.text.split('\n').next().unwrap_or_default()
    }

    /// Filesystem-safe slug derived from the title line.
    ///
    /// Markdown markers `#` and `*` are removed, the rest is trimmed,
    /// lowercased, and spaces and path separators become underscores.
    /// Two summaries with the same title share a slug.
    pub fn slug(&self) -> String {
        self.title_line()
            .replace(['#', '*'], "")
            .trim()
            .to_lowercase()
            .replace([' ', '/', '\\'], "_")
    }
}

/// One question/answer pair
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Flashcard {
    pub question: String,
    pub answer: String,
}

/// Tags shared by every card of one video, in model order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TagSet(Vec<String>);

impl TagSet {
    /// Split a free-text model response into tags.
    ///
    /// Any run of whitespace separates tags; empty tokens never appear.
    /// Case and punctuation are kept as the model wrote them, duplicates
    /// included.
    pub fn from_response(raw: &str) -> Self {
        Self(raw.split_whitespace().map(str::to_string).collect())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
