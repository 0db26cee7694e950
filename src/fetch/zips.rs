use anyhow::{Context, Result};
use reqwest::Client;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info};
use url::Url;

/// Download one archive reference (a path relative to the index URL) into
/// `dest_dir`, saving it under its basename. Archives already on disk are
/// not fetched again. Returns the local path.
pub async fn download_archive(
    client: &Client,
    index_url: &str,
    archive: &str,
    dest_dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let dest_dir = dest_dir.as_ref();
    let filename = archive_basename(archive);
    let dest_path = dest_dir.join(filename);

    if dest_path.is_file() {
        debug!(archive, path = %dest_path.display(), "archive already downloaded");
        return Ok(dest_path);
    }

    fs::create_dir_all(dest_dir)
        .await
        .with_context(|| format!("creating data directory {}", dest_dir.display()))?;

    let url = Url::parse(index_url)
        .and_then(|base| base.join(archive))
        .with_context(|| format!("joining {archive} onto {index_url}"))?;

    info!(%url, "downloading archive");
    let resp = client
        .get(url.as_str())
        .send()
        .await
        .with_context(|| format!("GET {url}"))?
        .error_for_status()?;
    let bytes = resp.bytes().await?;
    fs::write(&dest_path, &bytes)
        .await
        .with_context(|| format!("writing {}", dest_path.display()))?;

    Ok(dest_path)
}

/// The on-disk name for an archive reference.
pub fn archive_basename(archive: &str) -> &str {
    archive.rsplit('/').next().unwrap_or(archive)
}
