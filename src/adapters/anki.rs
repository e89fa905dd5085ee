//! AnkiConnect client.
//!
//! Every request is `{action, version: 6, params, key}` POSTed as JSON to
//! the local endpoint; every response is `{result, error}` where a non-null
//! `error` carries a human-readable failure message.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::debug;

use crate::config::AnkiSettings;

pub const ANKI_CONNECT_VERSION: u8 = 6;

/// AnkiConnect failures
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnkiError {
    #[error("AnkiConnect unreachable during {action}: {message}")]
    Unreachable { action: String, message: String },

    #[error("AnkiConnect returned HTTP {status} for {action}")]
    Http { action: String, status: u16 },

    #[error("AnkiConnect {action} failed: {message}")]
    Endpoint { action: String, message: String },

    #[error("unexpected AnkiConnect response for {action}: {message}")]
    Decode { action: String, message: String },
}

/// Request envelope
#[derive(Debug, Clone, Serialize)]
pub struct AnkiRequest<'a> {
    pub action: &'a str,
    pub version: u8,
    pub params: Value,
    pub key: Option<&'a str>,
}

/// Response envelope
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnkiResponse {
    #[serde(default)]
    pub result: Value,
    #[serde(default)]
    pub error: Option<String>,
}

impl AnkiResponse {
    pub fn ok(result: Value) -> Self {
        Self {
            result,
            error: None,
        }
    }

    pub fn err(message: impl Into<String>) -> Self {
        Self {
            result: Value::Null,
            error: Some(message.into()),
        }
    }
}

/// Carries one request to AnkiConnect and returns its envelope
#[async_trait(?Send)]
pub trait AnkiTransport {
    async fn send(&self, request: &AnkiRequest<'_>) -> Result<AnkiResponse, AnkiError>;
}

/// Transport over HTTP
pub struct HttpTransport {
    url: String,
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait(?Send)]
impl AnkiTransport for HttpTransport {
    async fn send(&self, request: &AnkiRequest<'_>) -> Result<AnkiResponse, AnkiError> {
        let response = self
            .client
            .post(&self.url)
            .json(request)
            .send()
            .await
            .map_err(|e| AnkiError::Unreachable {
                action: request.action.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AnkiError::Http {
                action: request.action.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<AnkiResponse>()
            .await
            .map_err(|e| AnkiError::Decode {
                action: request.action.to_string(),
                message: e.to_string(),
            })
    }
}

/// A note ready for `addNote`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNote {
    pub deck_name: String,
    pub model_name: String,
    pub front: String,
    pub back: String,
    pub tags: Vec<String>,
}

impl NewNote {
    /// Note structure expected by `addNote`; duplicates are refused
    pub fn to_params(&self) -> Value {
        json!({
            "note": {
                "deckName": self.deck_name,
                "modelName": self.model_name,
                "fields": {
                    "Front": self.front,
                    "Back": self.back,
                },
                "tags": self.tags,
                "options": {"allowDuplicate": false},
                "audio": [],
                "video": [],
                "picture": [],
            }
        })
    }
}

/// What AnkiConnect did with a submitted note
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteOutcome {
    Added(i64),
    /// Refused by the note type's duplicate rule
    Duplicate(String),
    Rejected(String),
}

/// Typed wrapper around the actions the pipeline uses
pub struct AnkiClient {
    transport: Box<dyn AnkiTransport>,
    key: Option<String>,
}

impl AnkiClient {
    pub fn new(transport: impl AnkiTransport + 'static, key: Option<String>) -> Self {
        Self {
            transport: Box::new(transport),
            key,
        }
    }

    /// Create an HTTP client from resolved settings
    pub fn from_settings(settings: &AnkiSettings) -> Self {
        Self::new(HttpTransport::new(&settings.url), settings.api_key.clone())
    }

    /// Run an action and return its `result`, or the endpoint's error
    pub async fn invoke(&self, action: &str, params: Value) -> Result<Value, AnkiError> {
        let request = AnkiRequest {
            action,
            version: ANKI_CONNECT_VERSION,
            params,
            key: self.key.as_deref(),
        };
        debug!(%action, "AnkiConnect request");

        let response = self.transport.send(&request).await?;
        match response.error {
            Some(message) => Err(AnkiError::Endpoint {
                action: action.to_string(),
                message,
            }),
            None => Ok(response.result),
        }
    }

    pub async fn deck_names(&self) -> Result<Vec<String>, AnkiError> {
        let result = self.invoke("deckNames", json!({})).await?;
        serde_json::from_value(result).map_err(|e| AnkiError::Decode {
            action: "deckNames".to_string(),
            message: e.to_string(),
        })
    }

    pub async fn deck_exists(&self, deck_name: &str) -> Result<bool, AnkiError> {
        Ok(self.deck_names().await?.iter().any(|name| name == deck_name))
    }

    pub async fn create_deck(&self, deck_name: &str) -> Result<(), AnkiError> {
        self.invoke("createDeck", json!({ "deck": deck_name }))
            .await
            .map(|_| ())
    }

    /// Submit a note. Endpoint-side refusals come back as an outcome;
    /// only transport failures are errors.
    pub async fn add_note(&self, note: &NewNote) -> Result<NoteOutcome, AnkiError> {
        match self.invoke("addNote", note.to_params()).await {
            Ok(result) => Ok(NoteOutcome::Added(result.as_i64().unwrap_or_default())),
            Err(AnkiError::Endpoint { message, .. }) => {
                if message.to_lowercase().contains("duplicate") {
                    Ok(NoteOutcome::Duplicate(message))
                } else {
                    Ok(NoteOutcome::Rejected(message))
                }
            }
            Err(e) => Err(e),
        }
    }

    pub async fn sync(&self) -> Result<(), AnkiError> {
        self.invoke("sync", json!({})).await.map(|_| ())
    }
}
