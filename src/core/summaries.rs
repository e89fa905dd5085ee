//! Summary files on disk: `<slug>.md` under the summaries directory.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tokio::fs;
use tracing::debug;

use crate::domain::Summary;

/// File name for a summary, falling back to `fallback` when the title
/// line yields an empty slug
pub fn summary_file_name(summary: &Summary, fallback: &str) -> String {
    let slug = summary.slug();
    if slug.is_empty() {
        format!("{}.md", fallback)
    } else {
        format!("{}.md", slug)
    }
}

/// Write the summary, replacing any file with the same slug
pub async fn save_summary(dir: &Path, summary: &Summary, fallback: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Failed to create summaries directory: {}", dir.display()))?;

    let path = dir.join(summary_file_name(summary, fallback));
    fs::write(&path, &summary.text)
        .await
        .with_context(|| format!("Failed to write summary: {}", path.display()))?;

    debug!(path = %path.display(), "Saved summary");
    Ok(path)
}
