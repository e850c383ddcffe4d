//! Video assembly: fetch, fit, trim and concatenate sources.
//!
//! The assembler works in a private temp directory under the configured
//! work dir. The directory is removed when the call returns, whether or not
//! assembly succeeded.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tempfile::TempDir;
use tracing::{debug, info, warn};

use reel_models::{ClipSource, MediaType, ProcessClipsRequest, TargetFrame};

use crate::command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
use crate::download::download_source;
use crate::error::{MediaError, MediaResult};
use crate::frame_fit::FrameFit;
use crate::plan::plan_segments;
use crate::probe::{probe_media, probe_video};

/// Default allowed deviation from the target duration.
pub const DEFAULT_TOLERANCE_SECS: f64 = 2.0;

/// Output frame rate of every normalized segment.
pub const OUTPUT_FPS: u32 = 30;

/// Segments shorter than this are dropped from the plan.
const MIN_SEGMENT_SECS: f64 = 0.1;

const MB: u64 = 1024 * 1024;

/// Resource ceilings for one assembly.
#[derive(Debug, Clone, PartialEq)]
pub struct AssemblyLimits {
    pub max_clips: u32,
    pub max_source_bytes: u64,
    pub ffmpeg_timeout: Duration,
    pub memory_ceiling_bytes: u64,
}

impl Default for AssemblyLimits {
    fn default() -> Self {
        Self {
            max_clips: 8,
            max_source_bytes: 200 * MB,
            ffmpeg_timeout: Duration::from_secs(300),
            memory_ceiling_bytes: 2048 * MB,
        }
    }
}

impl AssemblyLimits {
    /// Load from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_clips: std::env::var("MAX_CLIPS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_clips),
            max_source_bytes: std::env::var("MAX_SOURCE_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_source_bytes),
            ffmpeg_timeout: std::env::var("FFMPEG_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.ffmpeg_timeout),
            memory_ceiling_bytes: std::env::var("MEMORY_CEILING_MB")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(|mb| mb * MB)
                .unwrap_or(defaults.memory_ceiling_bytes),
        }
    }

    /// Bytes held if every clip slot is filled with a maximum-size source.
    pub fn worst_case_bytes(&self) -> u64 {
        self.max_clips as u64 * self.max_source_bytes
    }

    /// Reject limit combinations that could blow the memory ceiling.
    pub fn validate(&self) -> MediaResult<()> {
        if self.max_clips == 0 {
            return Err(MediaError::InvalidInput("MAX_CLIPS must be at least 1".to_string()));
        }
        if self.worst_case_bytes() > self.memory_ceiling_bytes {
            return Err(MediaError::resource_exceeded(format!(
                "{} clips x {} MB sources needs {} MB, memory ceiling is {} MB",
                self.max_clips,
                self.max_source_bytes / MB,
                self.worst_case_bytes() / MB,
                self.memory_ceiling_bytes / MB
            )));
        }
        Ok(())
    }

    /// Check a clip count against the ceiling.
    pub fn check_clip_count(&self, count: usize) -> MediaResult<()> {
        if count as u64 > self.max_clips as u64 {
            return Err(MediaError::resource_exceeded(format!(
                "{} clips requested, at most {} allowed",
                count, self.max_clips
            )));
        }
        Ok(())
    }
}

/// What the output should look like.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AssemblySpec {
    pub target: TargetFrame,
    pub target_duration: f64,
    pub tolerance: f64,
}

impl AssemblySpec {
    pub fn new(target: TargetFrame, target_duration: f64) -> Self {
        Self {
            target,
            target_duration,
            tolerance: DEFAULT_TOLERANCE_SECS,
        }
    }

    pub fn from_request(request: &ProcessClipsRequest) -> Self {
        Self::new(
            TargetFrame::new(request.target_width, request.target_height),
            request.effective_target_duration(),
        )
    }

    pub fn within_tolerance(&self, actual: f64) -> bool {
        (actual - self.target_duration).abs() <= self.tolerance
    }
}

/// Result of an assembly.
#[derive(Debug, Clone)]
pub struct AssembledVideo {
    pub data: Bytes,
    pub duration: f64,
    pub clips_processed: u32,
    pub within_tolerance: bool,
}

impl AssembledVideo {
    pub fn size_bytes(&self) -> u64 {
        self.data.len() as u64
    }
}

struct PreparedSource {
    url: String,
    path: PathBuf,
    media_type: MediaType,
    fit: FrameFit,
    available: Option<f64>,
}

/// Builds normalized portrait videos out of remote clips.
#[derive(Debug, Clone)]
pub struct VideoAssembler {
    client: reqwest::Client,
    limits: AssemblyLimits,
    work_dir: PathBuf,
    runner: FfmpegRunner,
}

impl VideoAssembler {
    pub fn new(limits: AssemblyLimits, work_dir: impl Into<PathBuf>) -> MediaResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| MediaError::internal(format!("Failed to build HTTP client: {}", e)))?;
        let runner = FfmpegRunner::new().with_timeout(limits.ffmpeg_timeout);
        Ok(Self {
            client,
            limits,
            work_dir: work_dir.into(),
            runner,
        })
    }

    pub fn limits(&self) -> &AssemblyLimits {
        &self.limits
    }

    /// Verify ffmpeg and ffprobe are installed.
    pub fn check_tools() -> MediaResult<()> {
        check_ffmpeg()?;
        check_ffprobe()?;
        Ok(())
    }

    async fn job_dir(&self) -> MediaResult<TempDir> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        Ok(tempfile::Builder::new()
            .prefix("assembly-")
            .tempdir_in(&self.work_dir)?)
    }

    /// Assemble `sources` in order into one video without audio.
    ///
    /// Fails fast: if any source cannot be fetched or decoded no video is
    /// produced.
    pub async fn assemble(
        &self,
        sources: &[ClipSource],
        spec: &AssemblySpec,
    ) -> MediaResult<AssembledVideo> {
        let start = Instant::now();

        if sources.is_empty() {
            return Err(MediaError::InvalidInput("No clips provided".to_string()));
        }
        self.limits.check_clip_count(sources.len())?;
        if let Some(i) = sources.iter().position(|s| s.media_type == MediaType::Audio) {
            return Err(MediaError::InvalidInput(format!(
                "Clip {} is audio; only video and photo clips can be assembled",
                i
            )));
        }

        let dir = self.job_dir().await?;
        info!(
            clips = sources.len(),
            target = %spec.target,
            target_duration = spec.target_duration,
            "Assembling video"
        );

        let mut downloaded = Vec::with_capacity(sources.len());
        for (i, source) in sources.iter().enumerate() {
            let dest = dir
                .path()
                .join(format!("source_{:02}.{}", i, source.media_type.extension()));
            let bytes =
                download_source(&self.client, &source.url, &dest, self.limits.max_source_bytes)
                    .await?;
            debug!(index = i, bytes, url = %source.url, "Fetched clip");
            downloaded.push(dest);
        }

        let mut prepared = Vec::with_capacity(sources.len());
        for (source, path) in sources.iter().zip(downloaded) {
            prepared.push(self.prepare(source, path, spec.target).await?);
        }

        let available: Vec<Option<f64>> = prepared.iter().map(|p| p.available).collect();
        let plan = plan_segments(&available, spec.target_duration);

        let mut segments = Vec::new();
        for (i, (source, secs)) in prepared.iter().zip(plan).enumerate() {
            if secs < MIN_SEGMENT_SECS {
                debug!(index = i, "Skipping clip with no planned time");
                continue;
            }
            let segment = dir.path().join(format!("segment_{:02}.mp4", i));
            self.runner
                .run(&normalize_command(source, &segment, secs))
                .await
                .map_err(|e| undecodable(&source.url, e))?;
            segments.push(segment);
        }

        if segments.is_empty() {
            return Err(MediaError::InvalidInput(
                "No clip contributed any footage".to_string(),
            ));
        }

        let list_path = dir.path().join("concat.txt");
        tokio::fs::write(&list_path, concat_list(&segments)).await?;
        let output = dir.path().join("assembled.mp4");
        self.runner
            .run(
                &FfmpegCommand::new(&list_path, &output)
                    .concat_list()
                    .output_args(["-c", "copy", "-movflags", "+faststart"]),
            )
            .await?;

        let (info, _) = probe_video(&output).await?;
        let within_tolerance = spec.within_tolerance(info.duration);
        if !within_tolerance {
            warn!(
                duration = info.duration,
                target = spec.target_duration,
                tolerance = spec.tolerance,
                "Assembled duration outside tolerance"
            );
        }

        let data = self.read_output(&output).await?;
        info!(
            duration = info.duration,
            clips = segments.len(),
            size_mb = format!("{:.2}", data.len() as f64 / MB as f64),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Video assembled"
        );

        Ok(AssembledVideo {
            data,
            duration: info.duration,
            clips_processed: segments.len() as u32,
            within_tolerance,
        })
    }

    async fn prepare(
        &self,
        source: &ClipSource,
        path: PathBuf,
        target: TargetFrame,
    ) -> MediaResult<PreparedSource> {
        let (info, video) = probe_video(&path).await.map_err(|e| match e {
            MediaError::InvalidVideo(_) | MediaError::FfprobeFailed { .. } => {
                MediaError::source_unavailable(&source.url, format!("undecodable media: {}", e))
            }
            other => other,
        })?;
        let fit = FrameFit::compute(video.width, video.height, target)?;

        let available = match source.media_type {
            MediaType::Photo => None,
            _ => {
                if info.duration <= 0.0 {
                    return Err(MediaError::source_unavailable(
                        &source.url,
                        "video has no duration",
                    ));
                }
                Some(match source.duration {
                    Some(declared) if declared > 0.0 => info.duration.min(declared),
                    _ => info.duration,
                })
            }
        };

        Ok(PreparedSource {
            url: source.url.clone(),
            path,
            media_type: source.media_type,
            fit,
            available,
        })
    }

    async fn read_output(&self, path: &Path) -> MediaResult<Bytes> {
        let size = tokio::fs::metadata(path).await?.len();
        if size > self.limits.memory_ceiling_bytes {
            return Err(MediaError::resource_exceeded(format!(
                "assembled video is {} MB, memory ceiling is {} MB",
                size / MB,
                self.limits.memory_ceiling_bytes / MB
            )));
        }
        Ok(Bytes::from(tokio::fs::read(path).await?))
    }

    /// Mux narration onto `video`, looping or trimming the picture to the
    /// narration length. Returns the output duration.
    pub async fn mux_narration(&self, video: &Path, audio: &Path, out: &Path) -> MediaResult<f64> {
        let narration = probe_media(audio).await?;
        if narration.duration <= 0.0 {
            return Err(MediaError::source_unavailable(
                audio.display().to_string(),
                "narration audio has no duration",
            ));
        }

        self.runner.run(&mux_command(video, audio, out, narration.duration)).await?;

        let (info, _) = probe_video(out).await?;
        debug!(
            duration = info.duration,
            narration = narration.duration,
            "Narration muxed"
        );
        Ok(info.duration)
    }

    /// In-memory wrapper around [`Self::mux_narration`].
    pub async fn compose_reel(&self, video: Bytes, narration: Bytes) -> MediaResult<AssembledVideo> {
        let dir = self.job_dir().await?;
        let video_path = dir.path().join("video.mp4");
        let audio_path = dir.path().join("narration.mp3");
        let out_path = dir.path().join("reel.mp4");
        tokio::fs::write(&video_path, &video).await?;
        tokio::fs::write(&audio_path, &narration).await?;

        let duration = self.mux_narration(&video_path, &audio_path, &out_path).await?;
        let data = self.read_output(&out_path).await?;

        Ok(AssembledVideo {
            data,
            duration,
            clips_processed: 0,
            within_tolerance: true,
        })
    }
}

/// A decode failure names the source; timeouts and missing tools keep their kind.
fn undecodable(url: &str, err: MediaError) -> MediaError {
    match err {
        MediaError::FfmpegFailed {
            message, stderr, ..
        } => MediaError::source_unavailable(
            url,
            format!(
                "undecodable media: {}",
                stderr.filter(|s| !s.is_empty()).unwrap_or(message)
            ),
        ),
        other => other,
    }
}

fn normalize_command(source: &PreparedSource, segment: &Path, secs: f64) -> FfmpegCommand {
    let filter = format!(
        "{},fps={},format=yuv420p",
        source.fit.to_filter(),
        OUTPUT_FPS
    );
    let cmd = match source.media_type {
        MediaType::Photo => FfmpegCommand::new(&source.path, segment).still_image(),
        _ => FfmpegCommand::new(&source.path, segment),
    };
    cmd.duration(secs)
        .video_filter(filter)
        .video_codec("libx264")
        .preset("veryfast")
        .crf(23)
        .no_audio()
        .output_duration(secs)
}

fn mux_command(video: &Path, audio: &Path, out: &Path, narration_secs: f64) -> FfmpegCommand {
    FfmpegCommand::new(video, out)
        .loop_input()
        .add_input(audio)
        .map("0:v:0")
        .map("1:a:0")
        .video_codec("copy")
        .audio_codec("aac")
        .audio_bitrate("192k")
        .output_duration(narration_secs)
        .output_args(["-movflags", "+faststart"])
}

/// Concat demuxer list; single quotes in paths are escaped.
fn concat_list(segments: &[PathBuf]) -> String {
    segments
        .iter()
        .map(|p| format!("file '{}'\n", p.to_string_lossy().replace('\'', "'\\''")))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_models::ErrorKind;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_limits_worst_case() {
        let limits = AssemblyLimits {
            max_clips: 6,
            max_source_bytes: 100 * MB,
            ffmpeg_timeout: Duration::from_secs(60),
            memory_ceiling_bytes: 512 * MB,
        };
        assert_eq!(limits.worst_case_bytes(), 600 * MB);
        assert!(matches!(limits.validate(), Err(MediaError::ResourceExceeded(_))));

        let ok = AssemblyLimits {
            memory_ceiling_bytes: 1024 * MB,
            ..limits
        };
        assert!(ok.validate().is_ok());
        assert!(AssemblyLimits::default().validate().is_ok());
    }

    #[test]
    fn test_tolerance() {
        let spec = AssemblySpec::new(TargetFrame::default(), 30.0);
        assert!(spec.within_tolerance(28.0));
        assert!(spec.within_tolerance(32.0));
        assert!(!spec.within_tolerance(27.9));
    }

    #[test]
    fn test_spec_from_request_sums_declared_durations() {
        let request = ProcessClipsRequest::new(vec![
            ClipSource::video("https://a/1.mp4", Some(3.6)),
            ClipSource::video("https://a/2.mp4", Some(3.6)),
        ]);
        let spec = AssemblySpec::from_request(&request);
        assert!((spec.target_duration - 7.2).abs() < 1e-9);
        assert_eq!(spec.target, TargetFrame::new(1080, 1920));
    }

    #[test]
    fn test_concat_list_escapes_quotes() {
        let list = concat_list(&[PathBuf::from("/tmp/a.mp4"), PathBuf::from("/tmp/it's.mp4")]);
        assert_eq!(list, "file '/tmp/a.mp4'\nfile '/tmp/it'\\''s.mp4'\n");
    }

    #[test]
    fn test_normalize_photo_loops_still() {
        let source = PreparedSource {
            url: "https://cdn/photo.jpg".to_string(),
            path: PathBuf::from("photo.jpg"),
            media_type: MediaType::Photo,
            fit: FrameFit::compute(800, 600, TargetFrame::default()).unwrap(),
            available: None,
        };
        let args = normalize_command(&source, Path::new("seg.mp4"), 4.0).build_args();
        let joined = args.join(" ");
        assert!(joined.contains("-loop 1 -t 4.000 -i photo.jpg"));
        assert!(joined.contains("fps=30,format=yuv420p"));
        assert!(args.contains(&"-an".to_string()));
    }

    #[test]
    fn test_mux_loops_video_to_narration_length() {
        let joined = mux_command(Path::new("v.mp4"), Path::new("a.mp3"), Path::new("o.mp4"), 21.5)
            .build_args()
            .join(" ");
        assert!(joined.contains("-stream_loop -1 -i v.mp4 -i a.mp3"));
        assert!(joined.contains("-t 21.500"));
        assert!(joined.contains("-c:a aac"));
    }

    #[test]
    fn test_decode_failure_names_source() {
        let err = undecodable(
            "https://cdn/3.mp4",
            MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some("moov atom not found".to_string()),
                Some(1),
            ),
        );
        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
        let message = err.to_string();
        assert!(message.contains("https://cdn/3.mp4"));
        assert!(message.contains("moov atom not found"));

        let timeout = undecodable("https://cdn/3.mp4", MediaError::Timeout(300));
        assert!(matches!(timeout, MediaError::Timeout(300)));
    }

    #[tokio::test]
    async fn test_too_many_clips_is_resource_exceeded() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = VideoAssembler::new(
            AssemblyLimits {
                max_clips: 2,
                ..AssemblyLimits::default()
            },
            dir.path(),
        )
        .unwrap();
        let sources: Vec<ClipSource> = (0..3)
            .map(|i| ClipSource::video(format!("https://a/{}.mp4", i), None))
            .collect();

        let err = assembler
            .assemble(&sources, &AssemblySpec::new(TargetFrame::default(), 10.0))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::ResourceExceeded(_)));
    }

    #[tokio::test]
    async fn test_unreachable_source_fails_whole_job() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let assembler = VideoAssembler::new(AssemblyLimits::default(), dir.path()).unwrap();
        let sources = vec![
            ClipSource::video(format!("{}/1.mp4", server.uri()), Some(3.0)),
            ClipSource::video(format!("{}/2.mp4", server.uri()), Some(3.0)),
        ];

        let err = assembler
            .assemble(&sources, &AssemblySpec::new(TargetFrame::default(), 6.0))
            .await
            .unwrap_err();
        assert!(matches!(err, MediaError::SourceUnavailable { .. }));

        // The job directory is gone as well.
        let mut entries = tokio::fs::read_dir(dir.path()).await.unwrap();
        assert!(entries.next_entry().await.unwrap().is_none());
    }

    /// Encode a `secs`-long lavfi test pattern of the given size.
    async fn lavfi_clip(dir: &Path, name: &str, size: &str, secs: u32) -> Vec<u8> {
        let out = dir.join(name);
        let status = tokio::process::Command::new("ffmpeg")
            .args(["-y", "-v", "error", "-f", "lavfi", "-i"])
            .arg(format!("testsrc2=size={}:rate=30:duration={}", size, secs))
            .args(["-c:v", "libx264", "-pix_fmt", "yuv420p", "-movflags", "+faststart"])
            .arg(&out)
            .status()
            .await
            .unwrap();
        assert!(status.success(), "lavfi encode of {} failed", size);
        tokio::fs::read(&out).await.unwrap()
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_six_mixed_clips_fill_portrait_frame() {
        let server = MockServer::start().await;
        let fixtures = tempfile::tempdir().unwrap();
        let sizes = ["1920x1080", "1080x1920", "720x1280", "1280x720", "1082x1920", "1080x1922"];

        let mut sources = Vec::new();
        for (i, size) in sizes.iter().enumerate() {
            let body = lavfi_clip(fixtures.path(), &format!("{}.mp4", i), size, 4).await;
            Mock::given(method("GET"))
                .and(path(format!("/{}.mp4", i)))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(body))
                .mount(&server)
                .await;
            sources.push(ClipSource::video(format!("{}/{}.mp4", server.uri(), i), Some(4.0)));
        }

        let work = tempfile::tempdir().unwrap();
        let assembler = VideoAssembler::new(AssemblyLimits::default(), work.path()).unwrap();
        let spec = AssemblySpec::new(TargetFrame::default(), 24.0);
        let video = assembler.assemble(&sources, &spec).await.unwrap();

        assert_eq!(video.clips_processed, 6);
        assert!((video.duration - 24.0).abs() <= 2.0, "duration {}", video.duration);
        assert!(video.within_tolerance);

        let out = fixtures.path().join("assembled.mp4");
        tokio::fs::write(&out, &video.data).await.unwrap();
        let (_, stream) = probe_video(&out).await.unwrap();
        assert_eq!((stream.width, stream.height), (1080, 1920));
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_undecodable_source_names_url() {
        let server = MockServer::start().await;
        let fixtures = tempfile::tempdir().unwrap();
        let good = lavfi_clip(fixtures.path(), "good.mp4", "1080x1920", 2).await;
        Mock::given(method("GET"))
            .and(path("/good.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(good))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/broken.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"not really an mp4".to_vec()))
            .mount(&server)
            .await;

        let broken_url = format!("{}/broken.mp4", server.uri());
        let sources = vec![
            ClipSource::video(format!("{}/good.mp4", server.uri()), Some(2.0)),
            ClipSource::video(broken_url.clone(), Some(2.0)),
        ];

        let work = tempfile::tempdir().unwrap();
        let assembler = VideoAssembler::new(AssemblyLimits::default(), work.path()).unwrap();
        let err = assembler
            .assemble(&sources, &AssemblySpec::new(TargetFrame::default(), 4.0))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
        assert!(err.to_string().contains(&broken_url));
    }
}
