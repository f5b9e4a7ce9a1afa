// src/pipeline.rs
//! The merge-and-post job: pick an unposted source video and a music track,
//! merge them, host the result, publish it, and record it in the tracker.

use crate::audio::merge_video_with_audio;
use crate::cloudinary_client::{CloudinaryClient, UploadOptions, MAX_RESULTS};
use crate::config::Config;
use crate::download::download_file;
use crate::error::Result;
use crate::facebook_client::FacebookClient;
use crate::media::{extension_for_url, select_background_music, select_source_video};
use crate::runner::PostJob;
use crate::tracker::{PostedMediaTracker, PostedRecord};
use crate::types::{MergeOutput, PostOutcome};
use crate::utils::check_ffmpeg_available;
use async_trait::async_trait;
use reqwest::Client;
use std::path::Path;
use tracing::{info, warn};

pub fn post_message(title: &str, hashtags: &str) -> String {
    let hashtags = hashtags.trim();
    if hashtags.is_empty() {
        title.to_string()
    } else {
        format!("{} {}", title, hashtags)
    }
}

pub struct MergeAndPostJob {
    config: Config,
    cloudinary: CloudinaryClient,
    facebook: FacebookClient,
    http: Client,
}

impl MergeAndPostJob {
    /// Build the job from configuration. Fails fast when any credential is
    /// missing, before anything is downloaded or merged.
    pub fn from_config(config: Config) -> Result<Self> {
        let cloudinary = CloudinaryClient::new(config.cloudinary()?.clone());
        let facebook = FacebookClient::new(config.facebook()?);
        Ok(Self::with_clients(config, cloudinary, facebook))
    }

    pub fn with_clients(config: Config, cloudinary: CloudinaryClient, facebook: FacebookClient) -> Self {
        Self {
            config,
            cloudinary,
            facebook,
            http: Client::new(),
        }
    }

    async fn execute(&self, tracker_path: &Path, work_dir: &Path) -> Result<PostOutcome> {
        let mut tracker = PostedMediaTracker::load(tracker_path)?;
        info!("📒 Tracker has {} posted entries", tracker.len());

        // 1. Source video, never one that was posted before
        let videos = self
            .cloudinary
            .list_resources(&self.config.video_folder, MAX_RESULTS)
            .await?;
        let video_url = select_source_video(
            &self.config.video_folder,
            &videos,
            &tracker,
            &mut rand::thread_rng(),
        )?;

        // 2. Background music
        let tracks = self
            .cloudinary
            .list_resources(&self.config.music_folder, MAX_RESULTS)
            .await?;
        let audio_url =
            select_background_music(&self.config.music_folder, &tracks, &mut rand::thread_rng())?;

        // 3. Download both, keeping the source file name so the title survives
        let video_name = video_url
            .split('?')
            .next()
            .and_then(|p| p.rsplit('/').next())
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("source_video{}", extension_for_url(&video_url, ".mp4")));
        let local_video = work_dir.join("source").join(video_name);
        let local_audio = work_dir.join(format!(
            "source_audio{}",
            extension_for_url(&audio_url, ".mp3")
        ));
        download_file(&self.http, &video_url, &local_video).await?;
        download_file(&self.http, &audio_url, &local_audio).await?;

        // 4. Merge
        let merged = merge_video_with_audio(&local_video, &local_audio, work_dir).await?;

        self.publish(&mut tracker, tracker_path, video_url, audio_url, &merged)
            .await
    }

    /// Host the merged file, publish it unless that URL went out before, then
    /// record the source and save the tracker. Nothing is written to the
    /// tracker when hosting or publishing fails.
    async fn publish(
        &self,
        tracker: &mut PostedMediaTracker,
        tracker_path: &Path,
        video_url: String,
        audio_url: String,
        merged: &MergeOutput,
    ) -> Result<PostOutcome> {
        let merged_url = self
            .cloudinary
            .upload_video(
                &merged.output_path,
                &UploadOptions::into_folder(&self.config.merged_folder),
            )
            .await?;

        // Distinct sources can clean to the same title and so the same merged
        // asset. The source is recorded either way or it would be picked again.
        let outcome = if tracker.is_merged_posted(&merged_url) {
            warn!("Merged video '{}' has already been posted. Skipping.", merged_url);
            PostOutcome::AlreadyPosted {
                merged_url: merged_url.clone(),
            }
        } else {
            let message = post_message(&merged.title, &self.config.hashtags);
            let response = self.facebook.post_video(&merged_url, &message).await?;
            PostOutcome::Posted {
                source_video_url: video_url.clone(),
                source_audio_url: audio_url.clone(),
                merged_url: merged_url.clone(),
                facebook_video_id: response.id,
            }
        };

        tracker.record(PostedRecord::new(
            self.config.run.stamp(),
            video_url,
            audio_url,
            merged_url,
        ));
        tracker.save(tracker_path)?;
        info!("Posted media tracked in '{}'", tracker_path.display());

        Ok(outcome)
    }
}

#[async_trait]
impl PostJob for MergeAndPostJob {
    async fn run(&self, tracker_path: &Path) -> Result<PostOutcome> {
        info!("🚀 Starting automated media process for Facebook post");
        check_ffmpeg_available().await?;

        let work_dir = tempfile::Builder::new().prefix("reel_poster_").tempdir()?;
        info!("Temporary working directory created: {}", work_dir.path().display());

        let result = self.execute(tracker_path, work_dir.path()).await;

        let shown = work_dir.path().display().to_string();
        match work_dir.close() {
            Ok(()) => info!("🧹 Cleaned up temporary directory: {}", shown),
            Err(e) => warn!("Error removing temporary directory '{}': {}", shown, e),
        }

        result
    }
}
