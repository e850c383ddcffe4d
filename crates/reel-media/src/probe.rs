//! FFprobe media information.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::Stdio;
use tokio::process::Command;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Video stream properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoStream {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
}

/// Media file information.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds; 0 for still images
    pub duration: f64,
    /// File size in bytes
    pub size: u64,
    pub video: Option<VideoStream>,
    pub has_audio: bool,
}

impl MediaInfo {
    /// Video stream or an error naming the file.
    pub fn require_video(&self, path: &Path) -> MediaResult<&VideoStream> {
        self.video
            .as_ref()
            .filter(|v| v.width > 0 && v.height > 0)
            .ok_or_else(|| {
                MediaError::InvalidVideo(format!("No usable video stream in {}", path.display()))
            })
    }
}

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
    size: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// Probe a media file.
pub async fn probe_media(path: impl AsRef<Path>) -> MediaResult<MediaInfo> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(MediaError::FileNotFound(path.to_path_buf()));
    }

    check_ffprobe()?;

    let output = Command::new("ffprobe")
        .args([
            "-v",
            "quiet",
            "-print_format",
            "json",
            "-show_format",
            "-show_streams",
        ])
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await?;

    if !output.status.success() {
        return Err(MediaError::FfprobeFailed {
            message: format!("FFprobe failed on {}", path.display()),
            stderr: Some(String::from_utf8_lossy(&output.stderr).to_string()),
        });
    }

    parse_probe_output(&output.stdout)
}

/// Probe and require a video stream.
pub async fn probe_video(path: impl AsRef<Path>) -> MediaResult<(MediaInfo, VideoStream)> {
    let path = path.as_ref();
    let info = probe_media(path).await?;
    let video = info.require_video(path)?.clone();
    Ok((info, video))
}

fn parse_probe_output(stdout: &[u8]) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .map(|s| VideoStream {
            width: s.width.unwrap_or(0),
            height: s.height.unwrap_or(0),
            fps: s
                .avg_frame_rate
                .as_deref()
                .and_then(parse_frame_rate)
                .or_else(|| s.r_frame_rate.as_deref().and_then(parse_frame_rate))
                .unwrap_or(30.0),
            codec: s.codec_name.clone().unwrap_or_default(),
        });

    Ok(MediaInfo {
        duration: probe
            .format
            .duration
            .as_deref()
            .and_then(|d| d.parse::<f64>().ok())
            .unwrap_or(0.0),
        size: probe
            .format
            .size
            .as_deref()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0),
        video,
        has_audio: probe.streams.iter().any(|s| s.codec_type == "audio"),
    })
}

/// Parse frame rate string (e.g., "30/1" or "29.97"); "0/0" is unknown.
fn parse_frame_rate(s: &str) -> Option<f64> {
    let rate = match s.split_once('/') {
        Some((num, den)) => {
            let num: f64 = num.parse().ok()?;
            let den: f64 = den.parse().ok()?;
            if den <= 0.0 {
                return None;
            }
            num / den
        }
        None => s.parse().ok()?,
    };
    (rate > 0.0).then_some(rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_frame_rate() {
        assert!((parse_frame_rate("30/1").unwrap() - 30.0).abs() < 0.01);
        assert!((parse_frame_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert!((parse_frame_rate("29.97").unwrap() - 29.97).abs() < 0.01);
        assert!(parse_frame_rate("0/0").is_none());
    }

    #[test]
    fn test_parse_video_output() {
        let json = br#"{
            "streams": [
                {"codec_type": "video", "codec_name": "h264", "width": 1920, "height": 1080,
                 "avg_frame_rate": "25/1", "r_frame_rate": "25/1"},
                {"codec_type": "audio", "codec_name": "aac"}
            ],
            "format": {"duration": "12.480000", "size": "3145728"}
        }"#;
        let info = parse_probe_output(json).unwrap();
        assert!((info.duration - 12.48).abs() < 1e-6);
        assert_eq!(info.size, 3_145_728);
        assert!(info.has_audio);
        let video = info.video.unwrap();
        assert_eq!((video.width, video.height), (1920, 1080));
        assert!((video.fps - 25.0).abs() < 1e-9);
    }

    #[test]
    fn test_parse_still_image_and_audio() {
        let photo = br#"{"streams":[{"codec_type":"video","codec_name":"mjpeg","width":800,"height":600,"avg_frame_rate":"0/0","r_frame_rate":"25/1"}],"format":{"size":"50000"}}"#;
        let info = parse_probe_output(photo).unwrap();
        assert_eq!(info.duration, 0.0);
        assert!((info.video.unwrap().fps - 25.0).abs() < 1e-9);

        let audio = br#"{"streams":[{"codec_type":"audio","codec_name":"mp3"}],"format":{"duration":"21.3"}}"#;
        let info = parse_probe_output(audio).unwrap();
        assert!(info.video.is_none());
        assert!(info.require_video(Path::new("voice.mp3")).is_err());
    }
}
