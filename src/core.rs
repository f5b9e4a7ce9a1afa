// src/core.rs

use crate::error::{PosterError, Result};
use crate::types::MediaInfo;
use crate::utils::execute_ffprobe_command;
use serde_json::Value;
use std::path::Path;

pub async fn analyze_media(path: &Path) -> Result<MediaInfo> {
    let file_path = path.to_string_lossy().to_string();
    let args = &[
        "-v",
        "quiet",
        "-print_format",
        "json",
        "-show_format",
        "-show_streams",
        file_path.as_str(),
    ];
    let ffprobe_output = execute_ffprobe_command(args).await?;
    parse_probe_output(&file_path, &ffprobe_output)
}

pub fn parse_probe_output(file_path: &str, ffprobe_output: &str) -> Result<MediaInfo> {
    let json: Value = serde_json::from_str(ffprobe_output)
        .map_err(|e| PosterError::Ffmpeg(format!("Failed to parse ffprobe output: {}", e)))?;

    let format = &json["format"];
    let duration_seconds = format["duration"]
        .as_str()
        .and_then(|d| d.parse::<f64>().ok())
        .unwrap_or(0.0);

    let mut info = MediaInfo {
        file_path: file_path.to_string(),
        duration_seconds,
        has_audio: false,
        has_video: false,
        format: format["format_name"].as_str().unwrap_or("unknown").to_string(),
    };

    if let Some(streams) = json["streams"].as_array() {
        for stream in streams {
            if stream["codec_type"] == "video" {
                info.has_video = true;
            } else if stream["codec_type"] == "audio" {
                info.has_audio = true;
            }
        }
    }

    Ok(info)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_probe_output() {
        let raw = r#"{
            "streams": [
                {"codec_type": "video", "width": 1080, "height": 1920},
                {"codec_type": "audio"}
            ],
            "format": {"duration": "14.733000", "format_name": "mov,mp4,m4a,3gp,3g2,mj2"}
        }"#;
        let info = parse_probe_output("clip.mp4", raw).unwrap();
        assert!((info.duration_seconds - 14.733).abs() < 1e-9);
        assert!(info.has_video);
        assert!(info.has_audio);
        assert_eq!(info.format, "mov,mp4,m4a,3gp,3g2,mj2");
    }

    #[test]
    fn test_parse_probe_output_without_duration() {
        let info = parse_probe_output("song.mp3", r#"{"streams": [{"codec_type": "audio"}], "format": {}}"#).unwrap();
        assert_eq!(info.duration_seconds, 0.0);
        assert!(!info.has_video);
        assert_eq!(info.format, "unknown");
    }

    #[test]
    fn test_parse_probe_output_rejects_garbage() {
        assert!(matches!(parse_probe_output("x", "not json"), Err(PosterError::Ffmpeg(_))));
    }
}
