//! Video link extraction from unread mail.
//!
//! Two URL shapes are recognised:
//! - `http(s)://[www.]youtube.com/watch?v=<id>`
//! - `http(s)://youtu.be/<id>`
//!
//! where `<id>` is a run of word characters and hyphens. Matches keep
//! their order of appearance and are never deduplicated.

use std::sync::LazyLock;

use anyhow::{Context, Result};
use mailparse::{MailHeaderMap, ParsedMail};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::adapters::{Inbox, RawMessage};
use crate::domain::VideoReference;

/// Watch URL or short link; group 1 is the video id
static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:https?://(?:www\.)?youtube\.com/watch\?v=|https?://youtu\.be/)([\w-]+)")
        .expect("Invalid link pattern")
});

/// Every video id in `text`, in order of appearance
pub fn extract_video_ids(text: &str) -> Vec<VideoReference> {
    LINK_PATTERN
        .captures_iter(text)
        .filter_map(|caps| caps.get(1))
        .map(|id| VideoReference::new(id.as_str()))
        .collect()
}

/// Links found in one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageScan {
    pub subject: Option<String>,
    pub references: Vec<VideoReference>,
}

/// Parse a raw message and scan its plain-text bodies.
///
/// Multipart messages contribute every `text/plain` part at any depth;
/// a single-part message contributes its one body whatever its type.
pub fn scan_message(source: &[u8]) -> Result<MessageScan> {
    let mail = mailparse::parse_mail(source).context("Failed to parse message")?;
    let subject = mail.get_headers().get_first_value("Subject");

    let mut references = Vec::new();
    if mail.subparts.is_empty() {
        references.extend(extract_video_ids(&decode_text(&mail)?));
    } else {
        let mut parts = Vec::new();
        collect_plain_parts(&mail, &mut parts);
        for part in parts {
            references.extend(extract_video_ids(&decode_text(part)?));
        }
    }

    Ok(MessageScan {
        subject,
        references,
    })
}

/// Transfer-decoded body text.
///
/// Bodies declared (or defaulting to) UTF-8 or ASCII must be valid UTF-8;
/// other charsets are converted by mailparse.
fn decode_text(part: &ParsedMail) -> Result<String> {
    let charset = part.ctype.charset.to_ascii_lowercase();
    if matches!(charset.as_str(), "utf-8" | "utf8" | "us-ascii" | "ascii") {
        let raw = part.get_body_raw().context("Failed to decode message body")?;
        return String::from_utf8(raw)
            .with_context(|| format!("Body declared as {} is not valid UTF-8", charset));
    }
    part.get_body().context("Failed to decode message body")
}

/// Depth-first walk collecting `text/plain` leaves
fn collect_plain_parts<'a>(part: &'a ParsedMail<'a>, out: &mut Vec<&'a ParsedMail<'a>>) {
    if part.subparts.is_empty() {
        if part.ctype.mimetype.eq_ignore_ascii_case("text/plain") {
            out.push(part);
        }
        return;
    }
    for sub in &part.subparts {
        collect_plain_parts(sub, out);
    }
}

/// Result of scanning the inbox
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Unread messages fetched (and thereby marked read)
    pub unread_messages: usize,
    /// Messages that could not be parsed or decoded
    pub skipped_messages: usize,
    pub references: Vec<VideoReference>,
}

/// Scan already-fetched messages.
///
/// A message that fails to parse or decode is logged and skipped; the rest
/// are still scanned.
pub fn scan_messages(messages: &[RawMessage]) -> Extraction {
    let mut extraction = Extraction {
        unread_messages: messages.len(),
        ..Default::default()
    };

    for message in messages {
        match scan_message(&message.source) {
            Ok(scan) => {
                debug!(
                    seq = message.seq,
                    subject = scan.subject.as_deref().unwrap_or("(no subject)"),
                    links = scan.references.len(),
                    "Scanned message"
                );
                extraction.references.extend(scan.references);
            }
            Err(e) => {
                warn!(seq = message.seq, error = %format!("{:#}", e), "Skipping undecodable message");
                extraction.skipped_messages += 1;
            }
        }
    }

    extraction
}

/// Fetch all unread messages and extract their video references.
///
/// Any failure talking to the mail server is returned as-is; nothing is
/// extracted in that case.
pub async fn extract_links(inbox: &dyn Inbox) -> Result<Extraction> {
    info!(inbox = inbox.name(), "Checking email for YouTube links");

    let messages = inbox
        .fetch_unread()
        .await
        .context("Failed to read unread messages")?;
    let extraction = scan_messages(&messages);

    info!(
        "Found {} unread emails with {} YouTube links",
        extraction.unread_messages,
        extraction.references.len()
    );
    Ok(extraction)
}
