//! Stock video and photo search.

use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info, warn};

use reel_models::{ClipSource, MediaType};

use crate::config::{require_key, SourcesConfig};
use crate::error::{SourceError, SourceResult};

const SERVICE: &str = "stock";

/// Widest rendition accepted for portrait footage.
const MAX_PORTRAIT_WIDTH: u32 = 720;

/// 9:16 as width / height.
const PORTRAIT_RATIO: f64 = 0.5625;

/// A searchable stock asset resolved to one downloadable URL.
#[derive(Debug, Clone, PartialEq)]
pub struct StockClip {
    pub id: u64,
    pub url: String,
    pub width: u32,
    pub height: u32,
    pub duration: Option<f64>,
    pub media_type: MediaType,
}

impl From<StockClip> for ClipSource {
    fn from(clip: StockClip) -> Self {
        ClipSource {
            url: clip.url,
            media_type: clip.media_type,
            duration: clip.duration,
        }
    }
}

#[derive(Debug, Deserialize)]
struct VideoSearchResponse {
    #[serde(default)]
    videos: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    id: u64,
    #[serde(default)]
    duration: Option<f64>,
    #[serde(default)]
    video_files: Vec<VideoFile>,
}

#[derive(Debug, Clone, Deserialize)]
struct VideoFile {
    link: String,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PhotoSearchResponse {
    #[serde(default)]
    photos: Vec<Photo>,
}

#[derive(Debug, Deserialize)]
struct Photo {
    id: u64,
    #[serde(default)]
    width: u32,
    #[serde(default)]
    height: u32,
    src: PhotoSources,
}

#[derive(Debug, Deserialize)]
struct PhotoSources {
    large2x: Option<String>,
    large: Option<String>,
    original: Option<String>,
}

/// Pick the rendition closest to 9:16, smallest first; prefer portrait files
/// no wider than 720px.
fn pick_video_file(files: &[VideoFile]) -> Option<&VideoFile> {
    let dims = |f: &VideoFile| (f.width.unwrap_or(0), f.height.unwrap_or(0).max(1));
    let mut ranked: Vec<&VideoFile> = files.iter().collect();
    ranked.sort_by(|a, b| {
        let (aw, ah) = dims(a);
        let (bw, bh) = dims(b);
        let ar = (aw as f64 / ah as f64 - PORTRAIT_RATIO).abs();
        let br = (bw as f64 / bh as f64 - PORTRAIT_RATIO).abs();
        ar.total_cmp(&br)
            .then((aw as u64 * ah as u64).cmp(&(bw as u64 * bh as u64)))
    });

    ranked
        .iter()
        .copied()
        .find(|f| {
            let (w, h) = dims(f);
            w < h && w <= MAX_PORTRAIT_WIDTH
        })
        .or_else(|| ranked.first().copied())
}

/// Client for the stock media API.
pub struct StockMediaClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl StockMediaClient {
    pub fn new(config: &SourcesConfig) -> SourceResult<Self> {
        Ok(Self {
            client: config.http_client()?,
            base_url: config.stock_base_url.trim_end_matches('/').to_string(),
            api_key: require_key(&config.stock_api_key, "PEXELS_API_KEY")?,
        })
    }

    async fn search<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &str,
        per_page: u32,
    ) -> SourceResult<T> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .header(AUTHORIZATION, &self.api_key)
            .query(&[
                ("query", query),
                ("per_page", &per_page.to_string()),
                ("orientation", "portrait"),
                ("size", "medium"),
            ])
            .send()
            .await
            .map_err(|e| SourceError::transport(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(SourceError::from_response(SERVICE, response).await);
        }

        response
            .json()
            .await
            .map_err(|e| SourceError::decode(SERVICE, e))
    }

    /// Search portrait videos.
    pub async fn search_videos(&self, query: &str, per_page: u32) -> SourceResult<Vec<StockClip>> {
        let body: VideoSearchResponse = self.search("/videos/search", query, per_page).await?;
        let clips: Vec<StockClip> = body
            .videos
            .into_iter()
            .filter_map(|video| {
                let file = pick_video_file(&video.video_files)?.clone();
                Some(StockClip {
                    id: video.id,
                    url: file.link,
                    width: file.width.unwrap_or(0),
                    height: file.height.unwrap_or(0),
                    duration: video.duration,
                    media_type: MediaType::Video,
                })
            })
            .collect();
        debug!(query, count = clips.len(), "Video search");
        Ok(clips)
    }

    /// Search portrait photos.
    pub async fn search_photos(&self, query: &str, per_page: u32) -> SourceResult<Vec<StockClip>> {
        let body: PhotoSearchResponse = self.search("/v1/search", query, per_page).await?;
        let clips: Vec<StockClip> = body
            .photos
            .into_iter()
            .filter_map(|photo| {
                let url = photo
                    .src
                    .large2x
                    .or(photo.src.large)
                    .or(photo.src.original)?;
                Some(StockClip {
                    id: photo.id,
                    url,
                    width: photo.width,
                    height: photo.height,
                    duration: None,
                    media_type: MediaType::Photo,
                })
            })
            .collect();
        debug!(query, count = clips.len(), "Photo search");
        Ok(clips)
    }

    /// Collect up to `count` distinct clips for `keywords`: videos first,
    /// photos to fill any gap.
    ///
    /// A failing search for one keyword is skipped; the error surfaces only
    /// if nothing at all was found.
    pub async fn find_clips(&self, keywords: &[String], count: usize) -> SourceResult<Vec<ClipSource>> {
        let mut found: Vec<StockClip> = Vec::new();
        let mut last_error = None;
        let per_page = 3;

        let searches: Vec<(bool, &String)> = [false, true]
            .into_iter()
            .flat_map(|photos| keywords.iter().map(move |k| (photos, k)))
            .collect();
        for (search_photos, keyword) in searches {
            if found.len() >= count {
                break;
            }
            let result = if search_photos {
                self.search_photos(keyword, per_page).await
            } else {
                self.search_videos(keyword, per_page).await
            };
            match result {
                Ok(clips) => {
                    for clip in clips {
                        if found.len() >= count {
                            break;
                        }
                        if !found.iter().any(|f| f.url == clip.url) {
                            found.push(clip);
                        }
                    }
                }
                Err(e) => {
                    warn!(keyword = %keyword, "Stock search failed: {}", e);
                    last_error = Some(e);
                }
            }
        }

        if found.is_empty() {
            return Err(last_error.unwrap_or_else(|| {
                SourceError::empty(SERVICE, format!("no media for keywords {:?}", keywords))
            }));
        }

        info!(
            requested = count,
            found = found.len(),
            videos = found.iter().filter(|c| c.media_type == MediaType::Video).count(),
            "Stock media collected"
        );
        Ok(found.into_iter().map(ClipSource::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(base: &str) -> StockMediaClient {
        StockMediaClient::new(&SourcesConfig {
            stock_api_key: Some("pexels-key".to_string()),
            stock_base_url: base.to_string(),
            ..SourcesConfig::default()
        })
        .unwrap()
    }

    fn file(link: &str, width: u32, height: u32) -> VideoFile {
        VideoFile {
            link: link.to_string(),
            width: Some(width),
            height: Some(height),
        }
    }

    #[test]
    fn test_prefers_small_portrait_rendition() {
        let files = vec![
            file("uhd", 2160, 3840),
            file("sd", 540, 960),
            file("hd", 1080, 1920),
            file("landscape", 640, 360),
        ];
        assert_eq!(pick_video_file(&files).unwrap().link, "sd");
    }

    #[test]
    fn test_falls_back_to_closest_ratio() {
        let files = vec![file("wide", 1920, 1080), file("square", 1080, 1080)];
        assert_eq!(pick_video_file(&files).unwrap().link, "square");
        assert!(pick_video_file(&[]).is_none());
    }

    #[tokio::test]
    async fn test_find_clips_fills_with_photos() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos/search"))
            .and(header("authorization", "pexels-key"))
            .and(query_param("orientation", "portrait"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "videos": [{
                    "id": 1, "duration": 12,
                    "video_files": [{"link": "https://v/1-sd.mp4", "width": 540, "height": 960}]
                }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "photos": [
                    {"id": 7, "width": 800, "height": 1200, "src": {"large2x": "https://p/7.jpg"}},
                    {"id": 8, "width": 800, "height": 1200, "src": {"large": "https://p/8.jpg"}}
                ]
            })))
            .mount(&server)
            .await;

        let clips = client(&server.uri())
            .find_clips(&["storm".to_string()], 3)
            .await
            .unwrap();

        assert_eq!(clips.len(), 3);
        assert_eq!(clips[0], ClipSource::video("https://v/1-sd.mp4", Some(12.0)));
        assert_eq!(clips[1].media_type, MediaType::Photo);
        assert_eq!(clips[2].url, "https://p/8.jpg");
    }

    #[tokio::test]
    async fn test_all_searches_failing_surfaces_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .find_clips(&["storm".to_string()], 3)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
