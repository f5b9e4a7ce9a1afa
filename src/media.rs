// src/media.rs
//! Picking which source video and which music track go into the next post.

use crate::error::{PosterError, Result};
use crate::tracker::PostedMediaTracker;
use crate::types::MediaResource;
use crate::utils::url_extension;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::{info, warn};

pub const SUPPORTED_VIDEO_EXTENSIONS: &[&str] =
    &[".mp4", ".avi", ".mov", ".mkv", ".webm", ".flv", ".wmv"];
pub const SUPPORTED_AUDIO_EXTENSIONS: &[&str] = &[".mp3", ".wav", ".ogg", ".aac", ".flac"];

fn supported_urls<'a>(
    folder: &str,
    resources: &'a [MediaResource],
    extensions: &[&str],
) -> Result<Vec<&'a str>> {
    if resources.is_empty() {
        return Err(PosterError::NoMedia(format!("No files found in folder '{}'", folder)));
    }

    let urls: Vec<&str> = resources
        .iter()
        .map(|r| r.secure_url.as_str())
        .filter(|url| {
            url_extension(url)
                .map(|ext| extensions.contains(&ext.as_str()))
                .unwrap_or(false)
        })
        .collect();

    if urls.is_empty() {
        warn!("No supported files in folder '{}' after filtering by extension", folder);
        return Err(PosterError::NoMedia(format!(
            "No supported files found in folder '{}'",
            folder
        )));
    }

    Ok(urls)
}

/// Random supported video from `resources` that the tracker has not seen.
pub fn select_source_video<R: Rng + ?Sized>(
    folder: &str,
    resources: &[MediaResource],
    tracker: &PostedMediaTracker,
    rng: &mut R,
) -> Result<String> {
    let candidates = supported_urls(folder, resources, SUPPORTED_VIDEO_EXTENSIONS)?;
    let total = candidates.len();
    let unposted: Vec<&str> = candidates
        .into_iter()
        .filter(|url| !tracker.is_source_posted(url))
        .collect();

    info!("🎞️ {} of {} source videos in '{}' are unposted", unposted.len(), total, folder);

    unposted
        .choose(rng)
        .map(|url| url.to_string())
        .ok_or_else(|| {
            PosterError::NothingToPost(format!(
                "All unique source videos from '{}' have been used. Add new videos or clear the tracker.",
                folder
            ))
        })
}

/// Random supported track from `resources`. Tracks may be reused.
pub fn select_background_music<R: Rng + ?Sized>(
    folder: &str,
    resources: &[MediaResource],
    rng: &mut R,
) -> Result<String> {
    let candidates = supported_urls(folder, resources, SUPPORTED_AUDIO_EXTENSIONS)?;
    candidates
        .choose(rng)
        .map(|url| url.to_string())
        .ok_or_else(|| PosterError::NoMedia(format!("No music found in folder '{}'", folder)))
}

/// Extension to give a downloaded copy of `url`, or `default` when the URL
/// has none.
pub fn extension_for_url(url: &str, default: &str) -> String {
    url_extension(url).unwrap_or_else(|| default.to_string())
}
