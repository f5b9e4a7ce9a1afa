// src/download.rs
use crate::error::{PosterError, Result};
use futures::StreamExt;
use reqwest::Client;
use std::path::Path;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::info;

/// Stream `url` into `local_path`, creating parent directories as needed.
/// Returns the number of bytes written.
pub async fn download_file(client: &Client, url: &str, local_path: &Path) -> Result<u64> {
    info!("⬇️ Downloading from: {}", url);

    let response = client
        .get(url)
        .send()
        .await
        .map_err(|e| PosterError::Download(format!("{}: {}", url, e)))?;

    if !response.status().is_success() {
        return Err(PosterError::Download(format!(
            "{} returned {}",
            url,
            response.status()
        )));
    }

    if let Some(parent) = local_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut file = fs::File::create(local_path).await?;
    let mut written: u64 = 0;
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| PosterError::Download(format!("{}: {}", url, e)))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;

    info!("✅ Saved {} bytes to: {}", written, local_path.display());
    Ok(written)
}
