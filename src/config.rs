// src/config.rs
//! Runtime configuration.
//!
//! Values come from the process environment (after `.env` is loaded by
//! `main`) and can be overridden on the command line. Credentials stay
//! optional until the step that needs them asks for them, so commands like
//! `cache-key` and `tracker` run without any secrets set.

use crate::error::{PosterError, Result};
use clap::Args;
use std::path::PathBuf;

pub const DEFAULT_TRACKER_FILE: &str = "posted_media_tracker.json";
pub const DEFAULT_CACHE_DIR: &str = ".reel_cache";
pub const DEFAULT_GRAPH_VERSION: &str = "v19.0";
pub const DEFAULT_HASHTAGS: &str = "#quotes #theunveiledtruth";

pub const SOURCE_VIDEO_FOLDER: &str = "Quotes_Videos";
pub const SOURCE_MUSIC_FOLDER: &str = "backmusic";
pub const MERGED_VIDEO_FOLDER: &str = "Merged_Posts";

#[derive(Debug, Clone, Args)]
pub struct ConfigArgs {
    /// Cloudinary cloud name
    #[arg(long, env = "CLOUDINARY_CLOUD_NAME", hide_env_values = true)]
    pub cloudinary_cloud_name: Option<String>,

    /// Cloudinary API key
    #[arg(long, env = "CLOUDINARY_API_KEY", hide_env_values = true)]
    pub cloudinary_api_key: Option<String>,

    /// Cloudinary API secret
    #[arg(long, env = "CLOUDINARY_API_SECRET", hide_env_values = true)]
    pub cloudinary_api_secret: Option<String>,

    /// Facebook Page ID to publish to
    #[arg(long, env = "PAGE_ID")]
    pub page_id: Option<String>,

    /// Page access token
    #[arg(long, env = "FB_ACCESS_TOKEN", hide_env_values = true)]
    pub fb_access_token: Option<String>,

    /// Graph API version used for publishing
    #[arg(long, env = "FB_GRAPH_VERSION", default_value = DEFAULT_GRAPH_VERSION)]
    pub graph_version: String,

    /// Path of the posted-media tracker file
    #[arg(long, env = "POSTED_MEDIA_TRACKER", default_value = DEFAULT_TRACKER_FILE)]
    pub tracker_path: PathBuf,

    /// Root directory of the local tracker cache
    #[arg(long, env = "REEL_CACHE_DIR", default_value = DEFAULT_CACHE_DIR)]
    pub cache_dir: PathBuf,

    /// Folder holding source videos
    #[arg(long, env = "SOURCE_VIDEO_FOLDER", default_value = SOURCE_VIDEO_FOLDER)]
    pub video_folder: String,

    /// Folder holding background music
    #[arg(long, env = "SOURCE_MUSIC_FOLDER", default_value = SOURCE_MUSIC_FOLDER)]
    pub music_folder: String,

    /// Folder merged videos are uploaded into
    #[arg(long, env = "MERGED_VIDEO_FOLDER", default_value = MERGED_VIDEO_FOLDER)]
    pub merged_folder: String,

    /// Hashtags appended to every post message
    #[arg(long, env = "POST_HASHTAGS", default_value = DEFAULT_HASHTAGS)]
    pub hashtags: String,
}

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
}

#[derive(Debug, Clone)]
pub struct FacebookConfig {
    pub page_id: String,
    pub access_token: String,
    pub graph_version: String,
}

/// Identity of the CI run, stamped on every tracker record.
#[derive(Debug, Clone, PartialEq)]
pub struct RunIdentity {
    pub run_id: String,
    pub attempt: String,
    pub job: String,
}

impl RunIdentity {
    pub fn from_env() -> Self {
        Self {
            run_id: std::env::var("GITHUB_RUN_ID").unwrap_or_else(|_| "local".to_string()),
            attempt: std::env::var("GITHUB_RUN_ATTEMPT").unwrap_or_else(|_| "0".to_string()),
            job: std::env::var("GITHUB_JOB").unwrap_or_else(|_| "default_job".to_string()),
        }
    }

    pub fn stamp(&self) -> String {
        format!("{}_{}_{}", self.run_id, self.attempt, self.job)
    }
}

impl Default for RunIdentity {
    fn default() -> Self {
        Self {
            run_id: "local".to_string(),
            attempt: "0".to_string(),
            job: "default_job".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub cloudinary: Option<CloudinaryConfig>,
    pub page_id: Option<String>,
    pub fb_access_token: Option<String>,
    pub graph_version: String,
    pub tracker_path: PathBuf,
    pub cache_dir: PathBuf,
    pub video_folder: String,
    pub music_folder: String,
    pub merged_folder: String,
    pub hashtags: String,
    pub run: RunIdentity,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl Config {
    pub fn from_args(args: ConfigArgs) -> Self {
        let cloudinary = match (
            non_empty(args.cloudinary_cloud_name),
            non_empty(args.cloudinary_api_key),
            non_empty(args.cloudinary_api_secret),
        ) {
            (Some(cloud_name), Some(api_key), Some(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
            }),
            _ => None,
        };

        Self {
            cloudinary,
            page_id: non_empty(args.page_id),
            fb_access_token: non_empty(args.fb_access_token),
            graph_version: args.graph_version,
            tracker_path: args.tracker_path,
            cache_dir: args.cache_dir,
            video_folder: args.video_folder,
            music_folder: args.music_folder,
            merged_folder: args.merged_folder,
            hashtags: args.hashtags,
            run: RunIdentity::from_env(),
        }
    }

    pub fn cloudinary(&self) -> Result<&CloudinaryConfig> {
        self.cloudinary.as_ref().ok_or_else(|| {
            PosterError::Config(
                "CLOUDINARY_CLOUD_NAME, CLOUDINARY_API_KEY and CLOUDINARY_API_SECRET must all be set"
                    .to_string(),
            )
        })
    }

    pub fn facebook(&self) -> Result<FacebookConfig> {
        match (&self.page_id, &self.fb_access_token) {
            (Some(page_id), Some(access_token)) => Ok(FacebookConfig {
                page_id: page_id.clone(),
                access_token: access_token.clone(),
                graph_version: self.graph_version.clone(),
            }),
            _ => Err(PosterError::Config(
                "Facebook PAGE_ID or FB_ACCESS_TOKEN not set".to_string(),
            )),
        }
    }

    /// Namespace the tracker cache is keyed on. Stable across code changes.
    pub fn cache_namespace(&self) -> String {
        self.page_id.clone().unwrap_or_else(|| "default".to_string())
    }
}
