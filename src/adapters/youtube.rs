//! YouTube Data API v3 client (video snippets only).

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use super::MetadataSource;
use crate::config::{require, YouTubeSettings};
use crate::domain::VideoMetadata;

const BASE_URL: &str = "https://www.googleapis.com/youtube/v3";

/// Key-authenticated client for the videos endpoint
pub struct YouTubeDataClient {
    api_key: String,
    base_url: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct VideoListResponse {
    #[serde(default)]
    items: Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
struct VideoItem {
    snippet: Snippet,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Snippet {
    title: String,
    channel_title: String,
}

impl YouTubeDataClient {
    /// Create a new client
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Create from resolved settings
    pub fn from_settings(settings: &YouTubeSettings) -> Result<Self> {
        Ok(Self::new(require(&settings.api_key, "YOUTUBE_DATA_API_KEY")?))
    }

    /// Point the client at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn videos_url(&self) -> String {
        format!("{}/videos", self.base_url.trim_end_matches('/'))
    }
}

/// Take the first item's snippet, if any
fn first_snippet(response: VideoListResponse) -> Option<VideoMetadata> {
    response.items.into_iter().next().map(|item| VideoMetadata {
        title: item.snippet.title,
        channel_name: item.snippet.channel_title,
    })
}

#[async_trait(?Send)]
impl MetadataSource for YouTubeDataClient {
    async fn video_metadata(&self, video_id: &str) -> Result<Option<VideoMetadata>> {
        debug!(%video_id, "Requesting video snippet");

        let response = self
            .client
            .get(self.videos_url())
            .query(&[("part", "snippet"), ("id", video_id), ("key", self.api_key.as_str())])
            .send()
            .await
            .context("Failed to reach YouTube Data API")?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("YouTube Data API error ({}): {}", status, text.trim());
        }

        let body: VideoListResponse = response
            .json()
            .await
            .context("Failed to parse YouTube Data API response")?;

        Ok(first_snippet(body))
    }
}
