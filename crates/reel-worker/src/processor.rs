//! Clip processors: turn a list of source URLs into one stored video.

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::info;

use reel_media::{AssemblySpec, VideoAssembler};
use reel_models::{ArtifactId, ArtifactKind, ErrorKind, ProcessClipsRequest, ProcessClipsResponse};
use reel_storage::{ArtifactStore, PutOptions};

use crate::error::{WorkerError, WorkerResult};
use crate::metrics;

/// Downloads, normalizes and concatenates clips, leaving the result in the
/// `ProcessedVideo` table family.
#[async_trait]
pub trait ClipProcessor: Send + Sync {
    async fn process(&self, request: ProcessClipsRequest) -> WorkerResult<ProcessClipsResponse>;

    /// Short name for logs and metrics.
    fn name(&self) -> &'static str;
}

/// Assembles in this process.
pub struct LocalProcessor {
    assembler: Arc<VideoAssembler>,
    store: Arc<dyn ArtifactStore>,
    ttl: Duration,
}

impl LocalProcessor {
    pub fn new(assembler: Arc<VideoAssembler>, store: Arc<dyn ArtifactStore>, ttl: Duration) -> Self {
        Self {
            assembler,
            store,
            ttl,
        }
    }
}

#[async_trait]
impl ClipProcessor for LocalProcessor {
    async fn process(&self, request: ProcessClipsRequest) -> WorkerResult<ProcessClipsResponse> {
        let start = Instant::now();
        request
            .validate(self.assembler.limits().max_clips)
            .map_err(|e| WorkerError::invalid_request(e.to_string()))?;

        let spec = AssemblySpec::from_request(&request);
        let video = self.assembler.assemble(&request.clips, &spec).await?;

        let video_id = ArtifactId::new();
        let mut options = PutOptions::video()
            .with_duration(video.duration)
            .with_ttl(self.ttl);
        if let Some(session) = &request.session_id {
            options = options.with_session(session.clone());
        }
        let clips_processed = video.clips_processed;
        let within_tolerance = video.within_tolerance;
        let duration = video.duration;
        let manifest = self
            .store
            .put(ArtifactKind::ProcessedVideo, &video_id, video.data, options)
            .await?;

        metrics::record_assembly(self.name(), clips_processed, start.elapsed().as_secs_f64());
        info!(
            video_id = %video_id,
            duration,
            size_mb = format!("{:.1}", manifest.size_mb()),
            chunks = manifest.chunk_count,
            "Processed video stored"
        );

        Ok(ProcessClipsResponse {
            video_id,
            duration,
            size_bytes: manifest.total_size,
            chunk_count: manifest.chunk_count,
            clips_processed,
            within_tolerance,
        })
    }

    fn name(&self) -> &'static str {
        "local"
    }
}

/// `{detail, code}` body of a failed processor call.
#[derive(Debug, Deserialize)]
struct RemoteErrorBody {
    detail: String,
    #[serde(default)]
    code: Option<String>,
}

impl RemoteErrorBody {
    /// Kind reported by the processor; codes outside the taxonomy count as
    /// upstream failures.
    fn kind(&self) -> ErrorKind {
        self.code
            .as_deref()
            .and_then(|code| serde_json::from_value(serde_json::Value::from(code)).ok())
            .unwrap_or(ErrorKind::UpstreamApiError)
    }
}

/// Calls `POST {base_url}/process-clips` on a processor deployment that
/// shares this process's store.
pub struct RemoteProcessor {
    client: reqwest::Client,
    base_url: String,
}

impl RemoteProcessor {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> WorkerResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| WorkerError::config_error(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl ClipProcessor for RemoteProcessor {
    async fn process(&self, request: ProcessClipsRequest) -> WorkerResult<ProcessClipsResponse> {
        let start = Instant::now();
        let clips = request.clips.len() as u32;
        let response = self
            .client
            .post(format!("{}/process-clips", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| WorkerError::ProcessorTransport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(match serde_json::from_str::<RemoteErrorBody>(&body) {
                Ok(parsed) if parsed.code.as_deref() == Some("invalid_request") => {
                    WorkerError::invalid_request(parsed.detail)
                }
                Ok(parsed) => WorkerError::Processor {
                    status: status.as_u16(),
                    kind: parsed.kind(),
                    detail: parsed.detail,
                },
                Err(_) => WorkerError::Processor {
                    status: status.as_u16(),
                    kind: ErrorKind::UpstreamApiError,
                    detail: body.chars().take(200).collect(),
                },
            });
        }

        let processed: ProcessClipsResponse = response
            .json()
            .await
            .map_err(|e| WorkerError::ProcessorTransport(format!("Invalid processor response: {}", e)))?;

        metrics::record_assembly(self.name(), clips, start.elapsed().as_secs_f64());
        info!(
            video_id = %processed.video_id,
            duration = processed.duration,
            clips = processed.clips_processed,
            "Remote processing complete"
        );
        Ok(processed)
    }

    fn name(&self) -> &'static str {
        "remote"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reel_media::AssemblyLimits;
    use reel_models::ClipSource;
    use reel_storage::{ChunkingConfig, MemoryArtifactStore};
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request() -> ProcessClipsRequest {
        ProcessClipsRequest::new(vec![
            ClipSource::video("https://cdn/1.mp4", Some(4.0)),
            ClipSource::photo("https://cdn/2.jpg"),
        ])
    }

    #[tokio::test]
    async fn test_local_rejects_invalid_request_before_assembly() {
        let dir = tempfile::tempdir().unwrap();
        let assembler = VideoAssembler::new(AssemblyLimits::default(), dir.path()).unwrap();
        let store = Arc::new(MemoryArtifactStore::new(ChunkingConfig::default()));
        let processor = LocalProcessor::new(Arc::new(assembler), store, Duration::from_secs(60));

        let err = processor
            .process(ProcessClipsRequest::new(vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_remote_posts_wire_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/process-clips"))
            .and(body_partial_json(serde_json::json!({
                "clips": [{"url": "https://cdn/1.mp4", "type": "video", "duration": 4.0},
                          {"url": "https://cdn/2.jpg", "type": "photo"}],
                "target_width": 1080,
                "target_height": 1920
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "video_id": "v-1",
                "duration": 7.1,
                "size_bytes": 2048,
                "chunk_count": 1,
                "clips_processed": 2,
                "within_tolerance": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let processor = RemoteProcessor::new(server.uri(), Duration::from_secs(5)).unwrap();
        let response = processor.process(request()).await.unwrap();
        assert_eq!(response.video_id, ArtifactId::from("v-1"));
        assert_eq!(response.clips_processed, 2);
    }

    #[tokio::test]
    async fn test_remote_error_carries_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_json(serde_json::json!({
                "detail": "Processor busy",
                "code": "upstream_api_error"
            })))
            .mount(&server)
            .await;

        let processor = RemoteProcessor::new(format!("{}/", server.uri()), Duration::from_secs(5)).unwrap();
        let err = processor.process(request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UpstreamApiError);
        assert!(err.is_retryable());
        assert!(err.to_string().contains("Processor busy"));
    }

    #[tokio::test]
    async fn test_remote_error_keeps_processor_kind() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "detail": "Source unavailable: https://cdn/1.mp4: HTTP 404",
                "code": "source_unavailable"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let processor = RemoteProcessor::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = processor.process(request()).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SourceUnavailable);
        assert!(!err.is_retryable());
        assert!(err.to_string().contains("https://cdn/1.mp4"));
    }

    #[tokio::test]
    async fn test_remote_error_kinds() {
        for (status, code, expected) in [
            (413, "resource_exceeded", ErrorKind::ResourceExceeded),
            (404, "not_found", ErrorKind::NotFound),
            (500, "corrupt", ErrorKind::Corrupt),
            (502, "something_new", ErrorKind::UpstreamApiError),
        ] {
            let server = MockServer::start().await;
            Mock::given(method("POST"))
                .respond_with(ResponseTemplate::new(status).set_body_json(serde_json::json!({
                    "detail": "failed",
                    "code": code
                })))
                .mount(&server)
                .await;

            let processor = RemoteProcessor::new(server.uri(), Duration::from_secs(5)).unwrap();
            let err = processor.process(request()).await.unwrap_err();
            assert_eq!(err.kind(), expected, "code {}", code);
        }
    }

    #[tokio::test]
    async fn test_remote_invalid_request_is_not_upstream() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "detail": "clips must not be empty",
                "code": "invalid_request"
            })))
            .mount(&server)
            .await;

        let processor = RemoteProcessor::new(server.uri(), Duration::from_secs(5)).unwrap();
        let err = processor.process(request()).await.unwrap_err();
        assert!(matches!(err, WorkerError::InvalidRequest(_)));
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_local_stores_assembled_video_in_chunks() {
        let server = MockServer::start().await;
        let fixtures = tempfile::tempdir().unwrap();
        let mut clips = Vec::new();
        for i in 0..6 {
            let out = fixtures.path().join(format!("{}.mp4", i));
            let status = tokio::process::Command::new("ffmpeg")
                .args(["-y", "-v", "error", "-f", "lavfi", "-i"])
                .arg("testsrc2=size=1280x720:rate=30:duration=4")
                .args(["-c:v", "libx264", "-pix_fmt", "yuv420p"])
                .arg(&out)
                .status()
                .await
                .unwrap();
            assert!(status.success());
            Mock::given(method("GET"))
                .and(path(format!("/{}.mp4", i)))
                .respond_with(
                    ResponseTemplate::new(200).set_body_bytes(tokio::fs::read(&out).await.unwrap()),
                )
                .mount(&server)
                .await;
            clips.push(ClipSource::video(format!("{}/{}.mp4", server.uri(), i), Some(4.0)));
        }

        let chunk_size: u64 = 64 * 1024;
        let work = tempfile::tempdir().unwrap();
        let assembler = VideoAssembler::new(AssemblyLimits::default(), work.path()).unwrap();
        let store = Arc::new(MemoryArtifactStore::new(ChunkingConfig::new(chunk_size).unwrap()));
        let processor = LocalProcessor::new(Arc::new(assembler), store.clone(), Duration::from_secs(60));

        let response = processor.process(ProcessClipsRequest::new(clips)).await.unwrap();
        assert!((response.duration - 24.0).abs() <= 2.0);
        assert!(response.within_tolerance);
        assert_eq!(response.chunk_count as u64, response.size_bytes.div_ceil(chunk_size));

        let data = store
            .get(ArtifactKind::ProcessedVideo, &response.video_id)
            .await
            .unwrap();
        assert_eq!(data.len() as u64, response.size_bytes);
    }
}
