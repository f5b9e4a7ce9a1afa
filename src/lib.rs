// lib.rs - Library root for the merge-and-post job
pub mod audio;
pub mod cache;
pub mod cloudinary_client;
pub mod config;
pub mod core;
pub mod download;
pub mod error;
pub mod facebook_client;
pub mod logging;
pub mod media;
pub mod pipeline;
pub mod runner;
pub mod tracker;
pub mod types;
pub mod utils;

#[cfg(test)]
mod test_support;

// Re-export commonly used types for convenience
pub use cache::{CacheHit, CacheKey, FsCacheStore};
pub use config::Config;
pub use error::{PosterError, Result};
pub use pipeline::MergeAndPostJob;
pub use runner::{run_with_cache, PostJob, RunReport};
pub use tracker::{PostedMediaTracker, PostedRecord};
pub use types::*;
