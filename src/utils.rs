// utils.rs - FFmpeg process helpers and filename handling
use crate::error::{PosterError, Result};
use lazy_static::lazy_static;
use regex::Regex;
use tokio::process::Command;
use tracing::debug;

lazy_static! {
    static ref TRAILING_ID: Regex = Regex::new(r"-\d+$").expect("valid trailing id pattern");
}

/// Format duration in HH:MM:SS.mmm format
pub fn format_duration(seconds: f64) -> String {
    let hours = (seconds / 3600.0) as u32;
    let minutes = ((seconds % 3600.0) / 60.0) as u32;
    let secs = (seconds % 60.0) as u32;
    let millis = ((seconds % 1.0) * 1000.0) as u32;
    format!("{:02}:{:02}:{:02}.{:03}", hours, minutes, secs, millis)
}

/// Execute FFmpeg command and surface stderr on failure
pub async fn execute_ffmpeg_command(mut command: Command) -> Result<String> {
    debug!("Executing FFmpeg: {:?}", command.as_std());

    let output = command
        .output()
        .await
        .map_err(|e| PosterError::Ffmpeg(format!("Failed to execute FFmpeg: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PosterError::Ffmpeg(stderr.trim().to_string()));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Execute FFprobe for media analysis
pub async fn execute_ffprobe_command(args: &[&str]) -> Result<String> {
    let output = Command::new("ffprobe")
        .args(args)
        .output()
        .await
        .map_err(|e| PosterError::Ffmpeg(format!("Failed to execute FFprobe: {}", e)))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(PosterError::Ffmpeg(format!("FFprobe error: {}", stderr.trim())));
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}

/// Check if FFmpeg and FFprobe are available
pub async fn check_ffmpeg_available() -> Result<()> {
    for tool in ["ffmpeg", "ffprobe"] {
        Command::new(tool)
            .arg("-version")
            .output()
            .await
            .map_err(|_| PosterError::Ffmpeg(format!("{} not found. Please install FFmpeg.", tool)))?;
    }
    debug!("✓ FFmpeg and FFprobe are available");
    Ok(())
}

/// Lowercased extension (with leading dot) of a URL's path, ignoring any
/// query string or fragment.
pub fn url_extension(url: &str) -> Option<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let file_name = path.rsplit('/').next().unwrap_or(path);
    let dot = file_name.rfind('.')?;
    if dot == 0 || dot + 1 == file_name.len() {
        return None;
    }
    Some(file_name[dot..].to_lowercase())
}

/// Human-readable title from a file stem: drops a trailing `-<digits>`
/// upload id, turns underscores into spaces and em-dashes into hyphens.
pub fn clean_title(stem: &str) -> String {
    let without_id = TRAILING_ID.replace(stem, "");
    without_id
        .replace('_', " ")
        .replace('\u{2014}', "-")
        .trim()
        .to_string()
}

/// Output filename for a merged video with the given title.
pub fn merged_file_name(title: &str) -> String {
    format!("merged_{}.mp4", title.replace(' ', "_"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(3725.5), "01:02:05.500");
        assert_eq!(format_duration(0.0), "00:00:00.000");
    }

    #[test]
    fn test_url_extension() {
        assert_eq!(
            url_extension("https://res.cloudinary.com/d/video/upload/v1/Quotes_Videos/clip.MP4?x=1"),
            Some(".mp4".to_string())
        );
        assert_eq!(url_extension("https://host/a/b/song.mp3#t=3"), Some(".mp3".to_string()));
        assert_eq!(url_extension("https://host/a/noext"), None);
        assert_eq!(url_extension("https://host/a/.hidden"), None);
        assert_eq!(url_extension("https://host/a/trailing."), None);
    }

    #[test]
    fn test_clean_title() {
        assert_eq!(clean_title("Stay_Strong-1712345678"), "Stay Strong");
        assert_eq!(clean_title("Truth\u{2014}Hurts_"), "Truth-Hurts");
        assert_eq!(clean_title("Year-2024 notes"), "Year-2024 notes");
        assert_eq!(clean_title("Keep-Going-42"), "Keep-Going");
    }

    #[test]
    fn test_merged_file_name() {
        assert_eq!(merged_file_name("Stay Strong"), "merged_Stay_Strong.mp4");
    }
}
