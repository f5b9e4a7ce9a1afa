// src/tracker.rs
//! Posted-media tracker.
//!
//! A JSON file listing every source video that has already been merged and
//! published. The pipeline consults it before picking a source and before
//! posting, and appends to it only after the post went through.

use crate::error::{PosterError, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostedRecord {
    pub timestamp: String,
    pub source_video_url: String,
    #[serde(default)]
    pub source_audio_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merged_cloudinary_url: Option<String>,
}

impl PostedRecord {
    pub fn new(
        timestamp: impl Into<String>,
        source_video_url: impl Into<String>,
        source_audio_url: impl Into<String>,
        merged_cloudinary_url: impl Into<String>,
    ) -> Self {
        Self {
            timestamp: timestamp.into(),
            source_video_url: source_video_url.into(),
            source_audio_url: source_audio_url.into(),
            merged_cloudinary_url: Some(merged_cloudinary_url.into()),
        }
    }
}

/// On-disk shapes the tracker accepts. The record array is what gets written;
/// the flat `{"<source>": true}` map is read for older tracker files.
#[derive(Deserialize)]
#[serde(untagged)]
enum TrackerFile {
    Records(Vec<PostedRecord>),
    Legacy(BTreeMap<String, Value>),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PostedMediaTracker {
    records: Vec<PostedRecord>,
}

impl PostedMediaTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load the tracker from `path`. A missing, empty or unreadable file
    /// yields an empty tracker.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            info!("📒 No tracker at '{}', starting fresh", path.display());
            return Ok(Self::new());
        }

        let raw = std::fs::read_to_string(path)?;
        Ok(Self::parse(&raw).unwrap_or_else(|e| {
            warn!(
                "Tracker '{}' is empty or corrupted ({}). Starting with an empty tracker.",
                path.display(),
                e
            );
            Self::new()
        }))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        if raw.trim().is_empty() {
            return Err(PosterError::Tracker("tracker file is empty".to_string()));
        }

        let records = match serde_json::from_str::<TrackerFile>(raw)? {
            TrackerFile::Records(records) => records,
            TrackerFile::Legacy(entries) => entries
                .into_iter()
                .filter(|(_, posted)| posted.as_bool().unwrap_or(true))
                .map(|(source, _)| PostedRecord {
                    timestamp: "legacy".to_string(),
                    source_video_url: source,
                    source_audio_url: String::new(),
                    merged_cloudinary_url: None,
                })
                .collect(),
        };

        Ok(Self { records })
    }

    pub fn records(&self) -> &[PostedRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn is_source_posted(&self, source_video_url: &str) -> bool {
        self.records
            .iter()
            .any(|r| r.source_video_url == source_video_url)
    }

    pub fn is_merged_posted(&self, merged_url: &str) -> bool {
        self.records
            .iter()
            .any(|r| r.merged_cloudinary_url.as_deref() == Some(merged_url))
    }

    pub fn record(&mut self, record: PostedRecord) {
        self.records.push(record);
    }

    /// Write the tracker as pretty JSON. The file is replaced atomically so an
    /// interrupted write never leaves a half-written tracker behind.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        self.records.serialize(&mut ser)?;
        buf.push(b'\n');

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&buf)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path)
            .map_err(|e| PosterError::Tracker(format!("failed to replace {}: {}", path.display(), e)))?;

        info!("💾 Tracker saved to '{}' ({} records)", path.display(), self.records.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let tracker = PostedMediaTracker::load(&dir.path().join("none.json")).unwrap();
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_corrupt_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tracker.json");
        std::fs::write(&path, "{ not json").unwrap();
        assert!(PostedMediaTracker::load(&path).unwrap().is_empty());

        std::fs::write(&path, "   ").unwrap();
        assert!(PostedMediaTracker::load(&path).unwrap().is_empty());
    }

    #[test]
    fn test_reads_record_array() {
        let raw = r#"[
            {
                "timestamp": "123_1_post",
                "source_video_url": "https://res.cloudinary.com/demo/video/upload/Quotes_Videos/a.mp4",
                "source_audio_url": "https://res.cloudinary.com/demo/video/upload/backmusic/x.mp3",
                "merged_cloudinary_url": "https://res.cloudinary.com/demo/video/upload/Merged_Posts/merged_a.mp4"
            }
        ]"#;
        let tracker = PostedMediaTracker::parse(raw).unwrap();
        assert_eq!(tracker.len(), 1);
        assert!(tracker.is_source_posted(
            "https://res.cloudinary.com/demo/video/upload/Quotes_Videos/a.mp4"
        ));
        assert!(tracker.is_merged_posted(
            "https://res.cloudinary.com/demo/video/upload/Merged_Posts/merged_a.mp4"
        ));
        assert!(!tracker.is_source_posted("https://example.com/b.mp4"));
    }

    #[test]
    fn test_reads_legacy_map() {
        let tracker = PostedMediaTracker::parse(r#"{"video_A": true, "video_C": false}"#).unwrap();
        assert!(tracker.is_source_posted("video_A"));
        assert!(!tracker.is_source_posted("video_C"));
        assert!(!tracker.is_merged_posted("video_A"));
    }

    #[test]
    fn test_save_keeps_existing_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("posted_media_tracker.json");
        std::fs::write(&path, r#"{"video_A": true}"#).unwrap();

        let mut tracker = PostedMediaTracker::load(&path).unwrap();
        tracker.record(PostedRecord::new("run_1_job", "video_B", "song.mp3", "merged_B.mp4"));
        tracker.save(&path).unwrap();

        let reloaded = PostedMediaTracker::load(&path).unwrap();
        assert_eq!(reloaded.len(), 2);
        assert!(reloaded.is_source_posted("video_A"));
        assert!(reloaded.is_source_posted("video_B"));

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("[\n    {"));
    }
}
