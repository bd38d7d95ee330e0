//! Media inspection helpers built on the FFmpeg command-line tools.
//! Probing shells out to `ffprobe`; thumbnails shell out to `ffmpeg`.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("{0} not found on PATH; please install FFmpeg")]
    ToolMissing(&'static str),
    #[error("{tool} failed: {message}")]
    ToolFailed { tool: &'static str, message: String },
    #[error("parse error: {0}")]
    Parse(String),
    #[error("no duration reported for {0}")]
    NoDuration(PathBuf),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    Video,
    Image,
    Audio,
}

#[derive(Debug, Clone)]
pub struct MediaInfo {
    pub path: PathBuf,
    pub kind: MediaKind,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub duration_seconds: Option<f64>,
    pub audio_channels: Option<u32>,
    pub sample_rate: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    sample_rate: Option<String>,
    channels: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeJson {
    streams: Option<Vec<FfprobeStream>>,
    format: Option<FfprobeFormat>,
}

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "webp", "gif", "bmp"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mov", "webm", "mkv", "avi"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "m4a", "aac", "flac", "ogg"];

fn has_extension(path: &Path, table: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| table.iter().any(|t| t.eq_ignore_ascii_case(e)))
        .unwrap_or(false)
}

pub fn is_image_file(path: &Path) -> bool {
    has_extension(path, IMAGE_EXTENSIONS)
}

pub fn is_video_file(path: &Path) -> bool {
    has_extension(path, VIDEO_EXTENSIONS)
}

pub fn is_audio_file(path: &Path) -> bool {
    has_extension(path, AUDIO_EXTENSIONS)
}

/// Inspects a media file with ffprobe. Stream order is not significant; a
/// file with any video stream counts as video.
pub fn probe_media(path: &Path) -> Result<MediaInfo, ProbeError> {
    let ffprobe = which::which("ffprobe").map_err(|_| ProbeError::ToolMissing("ffprobe"))?;
    let out = Command::new(ffprobe)
        .arg("-v")
        .arg("error")
        .arg("-show_format")
        .arg("-show_streams")
        .arg("-print_format")
        .arg("json")
        .arg(path)
        .output()
        .map_err(|e| ProbeError::ToolFailed {
            tool: "ffprobe",
            message: e.to_string(),
        })?;
    if !out.status.success() {
        return Err(ProbeError::ToolFailed {
            tool: "ffprobe",
            message: String::from_utf8_lossy(&out.stderr).into(),
        });
    }
    let info = parse_probe_output(path, &out.stdout)?;
    debug!(path = %path.display(), kind = ?info.kind, duration = ?info.duration_seconds, "probed media");
    Ok(info)
}

fn parse_probe_output(path: &Path, stdout: &[u8]) -> Result<MediaInfo, ProbeError> {
    let parsed: FfprobeJson =
        serde_json::from_slice(stdout).map_err(|e| ProbeError::Parse(e.to_string()))?;

    let mut kind = if is_image_file(path) {
        MediaKind::Image
    } else {
        MediaKind::Audio
    };
    let mut width = None;
    let mut height = None;
    let mut audio_channels = None;
    let mut sample_rate = None;

    for stream in parsed.streams.iter().flatten() {
        match stream.codec_type.as_deref() {
            Some("video") => {
                if !is_image_file(path) {
                    kind = MediaKind::Video;
                }
                width = width.or(stream.width);
                height = height.or(stream.height);
            }
            Some("audio") => {
                audio_channels = audio_channels.or(stream.channels);
                sample_rate =
                    sample_rate.or(stream.sample_rate.as_deref().and_then(|s| s.parse().ok()));
            }
            _ => {}
        }
    }

    let duration_seconds = parsed
        .format
        .as_ref()
        .and_then(|f| f.duration.as_deref())
        .and_then(|d| d.parse().ok());

    Ok(MediaInfo {
        path: path.to_path_buf(),
        kind,
        width,
        height,
        duration_seconds,
        audio_channels,
        sample_rate,
    })
}

/// Duration of a clip in seconds. Errors when the container reports none.
pub fn probe_duration(path: &Path) -> Result<f64, ProbeError> {
    let info = probe_media(path)?;
    info.duration_seconds
        .ok_or_else(|| ProbeError::NoDuration(path.to_path_buf()))
}

/// Extracts a single scaled frame for the scene strip.
pub fn generate_thumbnail(
    input_path: &Path,
    output_path: &Path,
    time_seconds: f64,
    width: u32,
    height: u32,
) -> Result<(), ProbeError> {
    let ffmpeg = which::which("ffmpeg").map_err(|_| ProbeError::ToolMissing("ffmpeg"))?;
    let output = Command::new(ffmpeg)
        .arg("-ss")
        .arg(format!("{time_seconds:.3}"))
        .arg("-i")
        .arg(input_path)
        .arg("-vframes")
        .arg("1")
        .arg("-vf")
        .arg(format!("scale={width}:{height}"))
        .arg("-y")
        .arg(output_path)
        .output()
        .map_err(|e| ProbeError::ToolFailed {
            tool: "ffmpeg",
            message: e.to_string(),
        })?;
    if !output.status.success() {
        return Err(ProbeError::ToolFailed {
            tool: "ffmpeg",
            message: String::from_utf8_lossy(&output.stderr).into(),
        });
    }
    Ok(())
}
