//! Configuration for ytcards.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (a `.env` file is loaded into the environment
//!    by `main` before anything is resolved)
//! 2. Config file (.ytcards/config.yaml)
//! 3. Defaults
//!
//! Config file discovery:
//! - Searches current directory and parents for .ytcards/config.yaml
//! - Falls back to ~/.ytcards/config.yaml
//! - Relative paths in the config file are resolved against the directory
//!   that contains `.ytcards/`
//!
//! The resolved [`Config`] is built once and handed to each component by
//! reference.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_IMAP_PORT: u16 = 993;
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_ANKI_CONNECT_URL: &str = "http://localhost:8765";
pub const DEFAULT_DECK_NAMESPACE: &str = "YouTube Flashcards";

/// Raised when a component needs a setting nobody provided
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required setting {key} (set it in the environment or .env)")]
    Missing { key: &'static str },

    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub mail: MailFileConfig,
    #[serde(default)]
    pub openai: OpenAiFileConfig,
    #[serde(default)]
    pub youtube: YouTubeFileConfig,
    #[serde(default)]
    pub anki: AnkiFileConfig,
    #[serde(default)]
    pub paths: PathsFileConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MailFileConfig {
    pub server: Option<String>,
    pub port: Option<u16>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OpenAiFileConfig {
    pub model: Option<String>,
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct YouTubeFileConfig {
    pub transcript_languages: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AnkiFileConfig {
    pub url: Option<String>,
    pub deck_namespace: Option<String>,
    pub note_type: Option<String>,
    /// Command used to start the desktop application; empty disables launching
    pub launch_command: Option<String>,
    pub launch_log: Option<String>,
    pub ready_timeout_seconds: Option<u64>,
    pub poll_interval_ms: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsFileConfig {
    pub summaries: Option<String>,
    pub prompts: Option<String>,
}

/// Mail server access
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub server: Option<String>,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Language model endpoint
#[derive(Debug, Clone)]
pub struct ModelSettings {
    pub api_key: Option<String>,
    pub model: String,
    pub base_url: String,
}

/// Video hosting data API and caption retrieval
#[derive(Debug, Clone)]
pub struct YouTubeSettings {
    pub api_key: Option<String>,
    pub transcript_languages: Vec<String>,
}

/// AnkiConnect endpoint and the desktop application that serves it
#[derive(Debug, Clone)]
pub struct AnkiSettings {
    pub url: String,
    pub api_key: Option<String>,
    pub deck_namespace: String,
    pub note_type: String,
    pub launch_command: Option<String>,
    pub launch_log: PathBuf,
    pub ready_timeout: Duration,
    pub poll_interval: Duration,
}

/// Resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub mail: MailSettings,
    pub model: ModelSettings,
    pub youtube: YouTubeSettings,
    pub anki: AnkiSettings,
    /// Directory that receives `<slug>.md` summary files
    pub summaries_dir: PathBuf,
    /// Directory holding the three prompt templates
    pub prompts_dir: PathBuf,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the process environment and any config file
    pub fn load() -> Result<Self> {
        let config_file = find_config_file();
        let (file, base_dir) = match &config_file {
            Some(path) => {
                let file = load_config_file(path)?;
                // .ytcards/config.yaml -> project root
                let base = path
                    .parent()
                    .and_then(|p| p.parent())
                    .unwrap_or(Path::new("."))
                    .to_path_buf();
                (file, base)
            }
            None => (ConfigFile::default(), PathBuf::from(".")),
        };

        let mut config = Self::from_sources(file, &base_dir, |key| std::env::var(key).ok())?;
        config.config_file = config_file;
        Ok(config)
    }

    /// Resolve configuration from a parsed file and an environment lookup
    pub fn from_sources<F>(file: ConfigFile, base_dir: &Path, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let port = match env("IMAP_PORT") {
            Some(raw) => raw.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                key: "IMAP_PORT",
                value: raw.clone(),
            })?,
            None => file.mail.port.unwrap_or(DEFAULT_IMAP_PORT),
        };

        let mail = MailSettings {
            server: env("IMAP_SERVER").or(file.mail.server),
            port,
            username: env("EMAIL").or(file.mail.username),
            password: env("PASSWORD"),
        };

        let model = ModelSettings {
            api_key: env("OPENAI_API_KEY"),
            model: env("OPENAI_MODEL")
                .or(file.openai.model)
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            base_url: env("OPENAI_BASE_URL")
                .or(file.openai.base_url)
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
        };

        let youtube = YouTubeSettings {
            api_key: env("YOUTUBE_DATA_API_KEY"),
            transcript_languages: file
                .youtube
                .transcript_languages
                .filter(|langs| !langs.is_empty())
                .unwrap_or_else(|| vec!["en".to_string()]),
        };

        let launch_command = match file.anki.launch_command {
            Some(cmd) if cmd.trim().is_empty() => None,
            Some(cmd) => Some(cmd),
            None => Some("anki".to_string()),
        };

        let anki = AnkiSettings {
            url: env("ANKI_CONNECT_URL")
                .or(file.anki.url)
                .unwrap_or_else(|| DEFAULT_ANKI_CONNECT_URL.to_string()),
            api_key: env("ANKI_API_KEY"),
            deck_namespace: file
                .anki
                .deck_namespace
                .unwrap_or_else(|| DEFAULT_DECK_NAMESPACE.to_string()),
            note_type: file.anki.note_type.unwrap_or_else(|| "Basic".to_string()),
            launch_command,
            launch_log: resolve_path(
                base_dir,
                file.anki.launch_log.as_deref().unwrap_or("anki_output.log"),
            ),
            ready_timeout: Duration::from_secs(file.anki.ready_timeout_seconds.unwrap_or(30)),
            poll_interval: Duration::from_millis(file.anki.poll_interval_ms.unwrap_or(500)),
        };

        let summaries_dir = match env("YTCARDS_SUMMARIES_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => resolve_path(base_dir, file.paths.summaries.as_deref().unwrap_or("summaries")),
        };
        let prompts_dir = match env("YTCARDS_PROMPTS_DIR") {
            Some(dir) => PathBuf::from(dir),
            None => resolve_path(base_dir, file.paths.prompts.as_deref().unwrap_or("prompts")),
        };

        Ok(Self {
            mail,
            model,
            youtube,
            anki,
            summaries_dir,
            prompts_dir,
            config_file: None,
        })
    }
}

/// Return the value or the error naming the missing setting
pub fn require<'a>(value: &'a Option<String>, key: &'static str) -> Result<&'a str, ConfigError> {
    value.as_deref().ok_or(ConfigError::Missing { key })
}

fn mask(value: &Option<String>) -> &'static str {
    if value.is_some() {
        "********"
    } else {
        "(not set)"
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let or_unset = |v: &Option<String>| v.clone().unwrap_or_else(|| "(not set)".to_string());

        writeln!(
            f,
            "Config file:      {}",
            self.config_file
                .as_ref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "(none, using env/defaults)".to_string())
        )?;
        writeln!(f, "IMAP server:      {}:{}", or_unset(&self.mail.server), self.mail.port)?;
        writeln!(f, "Email:            {}", or_unset(&self.mail.username))?;
        writeln!(f, "Password:         {}", mask(&self.mail.password))?;
        writeln!(f, "Model:            {} @ {}", self.model.model, self.model.base_url)?;
        writeln!(f, "OpenAI key:       {}", mask(&self.model.api_key))?;
        writeln!(f, "YouTube key:      {}", mask(&self.youtube.api_key))?;
        writeln!(
            f,
            "Caption langs:    {}",
            self.youtube.transcript_languages.join(", ")
        )?;
        writeln!(f, "AnkiConnect:      {}", self.anki.url)?;
        writeln!(f, "AnkiConnect key:  {}", mask(&self.anki.api_key))?;
        writeln!(f, "Deck namespace:   {}", self.anki.deck_namespace)?;
        writeln!(f, "Note type:        {}", self.anki.note_type)?;
        writeln!(
            f,
            "Launch command:   {}",
            self.anki.launch_command.as_deref().unwrap_or("(disabled)")
        )?;
        writeln!(f, "Ready timeout:    {:?}", self.anki.ready_timeout)?;
        writeln!(f, "Summaries:        {}", self.summaries_dir.display())?;
        write!(f, "Prompts:          {}", self.prompts_dir.display())
    }
}

/// Find config file by searching current directory and parents, then home
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".ytcards").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    dirs::home_dir()
        .map(|home| home.join(".ytcards").join("config.yaml"))
        .filter(|path| path.exists())
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config_file(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

fn parse_config_file(content: &str) -> Result<ConfigFile> {
    if content.trim().is_empty() {
        return Ok(ConfigFile::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// Resolve a path that may be relative to the project root
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
    }
}
