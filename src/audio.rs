// src/audio.rs
//! Background-music merge: replaces a video's soundtrack with a music track,
//! trimming or looping the music so it covers the whole video.

use crate::core::analyze_media;
use crate::error::{PosterError, Result};
use crate::types::{AudioFit, MediaInfo, MergeOutput};
use crate::utils::{clean_title, execute_ffmpeg_command, format_duration, merged_file_name};
use std::path::Path;
use tokio::process::Command;
use tracing::{info, warn};

/// Durations closer than this are treated as equal.
const DURATION_TOLERANCE: f64 = 0.05;

pub fn fit_audio(video_duration: f64, audio_duration: f64) -> AudioFit {
    if (audio_duration - video_duration).abs() <= DURATION_TOLERANCE {
        AudioFit::Exact
    } else if audio_duration > video_duration {
        AudioFit::Trim
    } else {
        AudioFit::Loop {
            loops: (video_duration / audio_duration) as u32 + 1,
        }
    }
}

/// The merge maps the first video stream of one input and the first audio
/// stream of the other; both need a known length.
pub fn check_inputs(video: &MediaInfo, audio: &MediaInfo) -> Result<()> {
    if !video.has_video {
        return Err(PosterError::Ffmpeg(format!(
            "{} ({}) has no video stream",
            video.file_path, video.format
        )));
    }
    if !audio.has_audio {
        return Err(PosterError::Ffmpeg(format!(
            "{} ({}) has no audio stream",
            audio.file_path, audio.format
        )));
    }
    for info in [video, audio] {
        if info.duration_seconds <= 0.0 {
            return Err(PosterError::Ffmpeg(format!(
                "Could not determine duration of {}",
                info.file_path
            )));
        }
    }
    Ok(())
}

pub fn build_merge_args(
    video_path: &Path,
    audio_path: &Path,
    output_path: &Path,
    video_duration: f64,
    fit: AudioFit,
) -> Vec<String> {
    let mut args = vec![
        "-y".to_string(),
        "-i".to_string(),
        video_path.to_string_lossy().to_string(),
    ];

    // -stream_loop counts extra passes and must precede the input it loops
    if let AudioFit::Loop { loops } = fit {
        args.push("-stream_loop".to_string());
        args.push(loops.saturating_sub(1).to_string());
    }

    args.extend([
        "-i".to_string(),
        audio_path.to_string_lossy().to_string(),
        "-map".to_string(),
        "0:v:0".to_string(),
        "-map".to_string(),
        "1:a:0".to_string(),
        "-t".to_string(),
        format!("{:.3}", video_duration),
        "-c:v".to_string(),
        "libx264".to_string(),
        "-c:a".to_string(),
        "aac".to_string(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-movflags".to_string(),
        "+faststart".to_string(),
        output_path.to_string_lossy().to_string(),
    ]);

    args
}

/// Merge `audio_path` over `video_path`, muting the original sound, and
/// write the result into `output_folder`. Returns the output path together
/// with the title derived from the video's file name.
pub async fn merge_video_with_audio(
    video_path: &Path,
    audio_path: &Path,
    output_folder: &Path,
) -> Result<MergeOutput> {
    tokio::fs::create_dir_all(output_folder).await?;

    let stem = video_path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| PosterError::Ffmpeg(format!("Bad video path: {}", video_path.display())))?;
    let title = clean_title(stem);
    if title.is_empty() {
        return Err(PosterError::Ffmpeg(format!(
            "Video name '{}' leaves no usable title",
            stem
        )));
    }

    let video = analyze_media(video_path).await?;
    info!("🎬 Loaded video: {} ({})", video_path.display(), video.format);
    let audio = analyze_media(audio_path).await?;
    info!("🎵 Loaded audio: {} ({})", audio_path.display(), audio.format);
    check_inputs(&video, &audio)?;
    let (video_duration, audio_duration) = (video.duration_seconds, audio.duration_seconds);

    let fit = fit_audio(video_duration, audio_duration);
    match fit {
        AudioFit::Trim => warn!(
            "Audio ({}) is longer than video ({}). Trimming audio.",
            format_duration(audio_duration),
            format_duration(video_duration)
        ),
        AudioFit::Loop { loops } => warn!(
            "Audio ({}) is shorter than video ({}). Looping audio {} times.",
            format_duration(audio_duration),
            format_duration(video_duration),
            loops
        ),
        AudioFit::Exact => {}
    }

    let output_path = output_folder.join(merged_file_name(&title));
    info!("Writing final video to: '{}'", output_path.display());

    let mut command = Command::new("ffmpeg");
    command.args(build_merge_args(
        video_path,
        audio_path,
        &output_path,
        video_duration,
        fit,
    ));
    execute_ffmpeg_command(command).await?;

    info!("✅ Merged and saved locally: '{}'", output_path.display());
    Ok(MergeOutput { output_path, title })
}
