//! Command-line interface for ytcards.
//!
//! Provides commands for a full inbox run, processing explicit videos and
//! showing the resolved configuration.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use crate::adapters::ImapInbox;
use crate::config::Config;
use crate::core::{extract_video_ids, Orchestrator};
use crate::domain::{RunReport, VideoReference};

/// ytcards - YouTube links from your inbox to Anki flashcards
#[derive(Parser, Debug)]
#[command(name = "ytcards")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Scan unread mail for YouTube links and turn each video into flashcards
    Run {
        #[command(flatten)]
        options: RunOptions,
    },

    /// Process the given videos without touching the mailbox
    Video {
        /// Video IDs or YouTube URLs
        #[arg(required = true)]
        videos: Vec<String>,

        #[command(flatten)]
        options: RunOptions,
    },

    /// Show resolved configuration (secrets masked)
    Config,
}

/// Flags shared by the processing commands
#[derive(Args, Debug, Clone, Default)]
pub struct RunOptions {
    /// Do not start the Anki application; assume AnkiConnect is already up
    #[arg(long)]
    pub no_launch: bool,

    /// Write summaries here instead of the configured directory
    #[arg(long, value_name = "DIR")]
    pub summaries_dir: Option<PathBuf>,
}

impl RunOptions {
    fn apply(&self, config: &mut Config) {
        if let Some(dir) = &self.summaries_dir {
            config.summaries_dir = dir.clone();
        }
        if self.no_launch {
            config.anki.launch_command = None;
        }
    }
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let mut config = Config::load()?;

        match self.command {
            Commands::Run { options } => {
                options.apply(&mut config);
                run_inbox(&config).await
            }
            Commands::Video { videos, options } => {
                options.apply(&mut config);
                run_videos(&config, &videos).await
            }
            Commands::Config => {
                println!("{}", config);
                Ok(())
            }
        }
    }
}

/// Full pipeline against the configured mailbox
async fn run_inbox(config: &Config) -> Result<()> {
    let inbox = ImapInbox::from_settings(&config.mail)?;
    let orchestrator = Orchestrator::from_config(config)?;

    let report = orchestrator.run(&inbox).await?;
    print_report(&report);
    Ok(())
}

/// Per-video pipeline for ids given on the command line
async fn run_videos(config: &Config, videos: &[String]) -> Result<()> {
    let references = parse_video_args(videos);
    let orchestrator = Orchestrator::from_config(config)?;

    let report = orchestrator.run_videos(references).await?;
    print_report(&report);
    Ok(())
}

/// Accept bare ids as well as watch/short URLs
fn parse_video_args(videos: &[String]) -> Vec<VideoReference> {
    videos
        .iter()
        .flat_map(|arg| {
            let found = extract_video_ids(arg);
            if found.is_empty() {
                vec![VideoReference::new(arg.trim())]
            } else {
                found
            }
        })
        .collect()
}

fn print_report(report: &RunReport) {
    eprintln!();
    eprint!("{}", report);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_args() {
        let args = vec![
            "abc123".to_string(),
            "https://youtu.be/short1?t=4".to_string(),
            "https://www.youtube.com/watch?v=long-1&list=x".to_string(),
        ];
        let ids: Vec<String> = parse_video_args(&args)
            .into_iter()
            .map(|r| r.video_id)
            .collect();
        assert_eq!(ids, vec!["abc123", "short1", "long-1"]);
    }

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["ytcards", "run", "--no-launch", "--summaries-dir", "out"])
            .unwrap();
        match cli.command {
            Commands::Run { options } => {
                assert!(options.no_launch);
                assert_eq!(options.summaries_dir, Some(PathBuf::from("out")));
            }
            other => panic!("unexpected command: {:?}", other),
        }

        assert!(Cli::try_parse_from(["ytcards", "video"]).is_err());
    }

    #[test]
    fn test_no_launch_disables_companion() {
        let mut config = Config::from_sources(
            Default::default(),
            std::path::Path::new("."),
            |_| None,
        )
        .unwrap();
        assert!(config.anki.launch_command.is_some());

        RunOptions {
            no_launch: true,
            summaries_dir: Some(PathBuf::from("/tmp/cards")),
        }
        .apply(&mut config);

        assert!(config.anki.launch_command.is_none());
        assert_eq!(config.summaries_dir, PathBuf::from("/tmp/cards"));
    }
}
