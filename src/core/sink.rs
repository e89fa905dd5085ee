//! Flashcard upload into Anki.
//!
//! Cards land in `"<namespace>::<channel>"`. The deck is looked up and
//! created if missing (not atomic; a single run never races itself). Each
//! card is then submitted on its own, and a failed submission is logged and
//! counted without stopping the others.

use tracing::{info, warn};

use crate::adapters::{AnkiClient, NewNote, NoteOutcome};
use crate::domain::{Flashcard, TagSet, UploadTally, VideoMetadata};

/// Deck and note-type settings for uploads
#[derive(Debug, Clone)]
pub struct FlashcardSink {
    namespace: String,
    note_type: String,
}

impl FlashcardSink {
    pub fn new(namespace: impl Into<String>, note_type: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            note_type: note_type.into(),
        }
    }

    /// Full deck name for a channel
    pub fn deck_name(&self, channel_name: &str) -> String {
        format!("{}::{}", self.namespace, channel_name)
    }

    /// Card front: channel and title headings above the question
    pub fn front(metadata: &VideoMetadata, question: &str) -> String {
        format!(
            "<h1>{}</h1><h2>{}</h2><br>{}",
            metadata.channel_name, metadata.title, question
        )
    }

    /// Build the notes for one video, in card order
    pub fn notes(
        &self,
        metadata: &VideoMetadata,
        cards: &[Flashcard],
        tags: &TagSet,
    ) -> Vec<NewNote> {
        let deck_name = self.deck_name(&metadata.channel_name);
        cards
            .iter()
            .map(|card| NewNote {
                deck_name: deck_name.clone(),
                model_name: self.note_type.clone(),
                front: Self::front(metadata, &card.question),
                back: card.answer.clone(),
                tags: tags.as_slice().to_vec(),
            })
            .collect()
    }

    /// Make sure the deck exists. Errors are logged, never raised.
    pub async fn ensure_deck(&self, anki: &AnkiClient, deck_name: &str) {
        match anki.deck_exists(deck_name).await {
            Ok(true) => {}
            Ok(false) => {
                info!(deck = %deck_name, "Creating deck");
                if let Err(e) = anki.create_deck(deck_name).await {
                    warn!(deck = %deck_name, error = %e, "Failed to create deck");
                }
            }
            Err(e) => warn!(deck = %deck_name, error = %e, "Failed to check deck"),
        }
    }

    /// Ensure the channel's deck and submit every card
    pub async fn upload(
        &self,
        anki: &AnkiClient,
        metadata: &VideoMetadata,
        cards: &[Flashcard],
        tags: &TagSet,
    ) -> UploadTally {
        let mut tally = UploadTally::default();
        if cards.is_empty() {
            return tally;
        }

        let deck_name = self.deck_name(&metadata.channel_name);
        self.ensure_deck(anki, &deck_name).await;

        for note in self.notes(metadata, cards, tags) {
            match anki.add_note(&note).await {
                Ok(NoteOutcome::Added(_)) => tally.added += 1,
                Ok(NoteOutcome::Duplicate(message)) => {
                    warn!(deck = %deck_name, %message, "Card already exists");
                    tally.duplicates += 1;
                }
                Ok(NoteOutcome::Rejected(message)) => {
                    warn!(deck = %deck_name, %message, "Card rejected");
                    tally.rejected += 1;
                }
                Err(e) => {
                    warn!(deck = %deck_name, error = %e, "Card submission failed");
                    tally.rejected += 1;
                }
            }
        }

        info!(
            deck = %deck_name,
            added = tally.added,
            duplicates = tally.duplicates,
            rejected = tally.rejected,
            "Uploaded flashcards to Anki"
        );
        tally
    }
}
