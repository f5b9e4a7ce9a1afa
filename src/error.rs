// src/error.rs
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PosterError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("Tracker error: {0}")]
    Tracker(String),
    #[error("Cache store error: {0}")]
    Cache(String),
    #[error("Another run holds the lock at {0}")]
    Locked(String),
    #[error("Cloudinary error: {0}")]
    Cloudinary(String),
    #[error("Facebook error: {0}")]
    Facebook(String),
    #[error("Download error: {0}")]
    Download(String),
    #[error("FFmpeg error: {0}")]
    Ffmpeg(String),
    #[error("No media found: {0}")]
    NoMedia(String),
    #[error("Nothing left to post: {0}")]
    NothingToPost(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, PosterError>;
