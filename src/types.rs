// types.rs - Common data structures shared by the clients and the pipeline
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

// A single asset as returned by the Cloudinary Admin API
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MediaResource {
    pub public_id: String,
    pub secure_url: String,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub resource_type: Option<String>,
    #[serde(default)]
    pub bytes: Option<u64>,
    #[serde(default)]
    pub duration: Option<f64>,
}

impl MediaResource {
    pub fn from_url(url: &str) -> Self {
        Self {
            public_id: url.to_string(),
            secure_url: url.to_string(),
            format: None,
            resource_type: None,
            bytes: None,
            duration: None,
        }
    }
}

// Stream summary from ffprobe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaInfo {
    pub file_path: String,
    pub duration_seconds: f64,
    pub has_audio: bool,
    pub has_video: bool,
    pub format: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutput {
    pub output_path: PathBuf,
    pub title: String,
}

/// How the background track was fitted to the video.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AudioFit {
    Exact,
    Trim,
    Loop { loops: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum PostOutcome {
    Posted {
        source_video_url: String,
        source_audio_url: String,
        merged_url: String,
        facebook_video_id: Option<String>,
    },
    /// The merged URL was already published. The source is still recorded
    /// so it is not picked again.
    AlreadyPosted { merged_url: String },
}
