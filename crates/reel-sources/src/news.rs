//! Top stories news client.

use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, info};

use reel_models::GenerateReelRequest;

use crate::config::{require_key, SourcesConfig};
use crate::error::{SourceError, SourceResult};

const SERVICE: &str = "news";

/// Image renditions worth putting in a reel, best first.
const PREFERRED_IMAGE_FORMATS: &[&str] = &[
    "superJumbo",
    "Super Jumbo",
    "mediumThreeByTwo440",
    "threeByTwoSmallAt2X",
];

#[derive(Debug, Deserialize)]
struct TopStoriesResponse {
    #[serde(default)]
    results: Vec<Article>,
}

/// A news article from the top stories feed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub title: String,
    #[serde(default, rename = "abstract")]
    pub summary: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub multimedia: Vec<Multimedia>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Multimedia {
    pub url: String,
    #[serde(default)]
    pub format: String,
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Multimedia>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<Vec<Multimedia>>::deserialize(deserializer)?.unwrap_or_default())
}

impl Article {
    /// Narration text: headline followed by the abstract.
    pub fn commentary(&self) -> String {
        let summary = self.summary.trim();
        if summary.is_empty() {
            self.title.trim().to_string()
        } else {
            format!("{}. {}", self.title.trim().trim_end_matches('.'), summary)
        }
    }

    /// Best available lead image.
    pub fn image_url(&self) -> Option<&str> {
        PREFERRED_IMAGE_FORMATS.iter().find_map(|format| {
            self.multimedia
                .iter()
                .find(|m| m.format == *format)
                .map(|m| m.url.as_str())
        })
    }

    /// Articles without a headline or link cannot be turned into reels.
    pub fn is_usable(&self) -> bool {
        !self.title.trim().is_empty() && !self.url.trim().is_empty()
    }

    /// Reel job for this article, keyed by its URL.
    pub fn to_reel_request(&self) -> GenerateReelRequest {
        let mut request = GenerateReelRequest::new(self.title.trim(), self.commentary());
        request.image_url = self.image_url().map(str::to_string);
        request.source_ref = Some(self.url.clone());
        request
    }
}

/// Client for the top stories API.
pub struct NewsClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl NewsClient {
    pub fn new(config: &SourcesConfig) -> SourceResult<Self> {
        Ok(Self {
            client: config.http_client()?,
            base_url: config.news_base_url.trim_end_matches('/').to_string(),
            api_key: require_key(&config.news_api_key, "NYT_API_KEY")?,
        })
    }

    /// Fetch up to `limit` usable articles from `section`.
    pub async fn top_stories(&self, section: &str, limit: usize) -> SourceResult<Vec<Article>> {
        let url = format!("{}/svc/topstories/v2/{}.json", self.base_url, section);
        debug!(section, "Fetching top stories");

        let response = self
            .client
            .get(&url)
            .query(&[("api-key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| SourceError::transport(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(SourceError::from_response(SERVICE, response).await);
        }

        let body: TopStoriesResponse = response
            .json()
            .await
            .map_err(|e| SourceError::decode(SERVICE, e))?;

        let articles: Vec<Article> = body
            .results
            .into_iter()
            .filter(Article::is_usable)
            .take(limit)
            .collect();
        info!(section, count = articles.len(), "Fetched top stories");
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base: &str) -> SourcesConfig {
        SourcesConfig {
            news_api_key: Some("nyt-key".to_string()),
            news_base_url: base.to_string(),
            ..SourcesConfig::default()
        }
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = NewsClient::new(&SourcesConfig::default()).err().unwrap();
        assert!(matches!(err, SourceError::Config(_)));
    }

    #[test]
    fn test_article_helpers() {
        let article: Article = serde_json::from_value(serde_json::json!({
            "title": "Storm hits coast.",
            "abstract": "Thousands evacuated.",
            "url": "https://news.example/storm",
            "uri": "nyt://article/abc",
            "multimedia": [
                {"url": "https://img/thumb.jpg", "format": "Large Thumbnail"},
                {"url": "https://img/big.jpg", "format": "Super Jumbo"}
            ]
        }))
        .unwrap();

        assert_eq!(article.commentary(), "Storm hits coast. Thousands evacuated.");
        assert_eq!(article.image_url(), Some("https://img/big.jpg"));

        let request = article.to_reel_request();
        assert_eq!(request.source_ref.as_deref(), Some("https://news.example/storm"));
        assert_eq!(request.image_url.as_deref(), Some("https://img/big.jpg"));
    }

    #[tokio::test]
    async fn test_top_stories_filters_and_limits() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/svc/topstories/v2/world.json"))
            .and(query_param("api-key", "nyt-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "status": "OK",
                "results": [
                    {"title": "One", "abstract": "a", "url": "https://n/1", "multimedia": null},
                    {"title": "", "abstract": "no title", "url": "https://n/x"},
                    {"title": "Two", "abstract": "b", "url": "https://n/2"},
                    {"title": "Three", "abstract": "c", "url": "https://n/3"}
                ]
            })))
            .mount(&server)
            .await;

        let client = NewsClient::new(&config(&server.uri())).unwrap();
        let articles = client.top_stories("world", 2).await.unwrap();
        let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["One", "Two"]);
        assert!(articles[0].multimedia.is_empty());
    }

    #[tokio::test]
    async fn test_rate_limit_is_retryable_upstream_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429).set_body_string("slow down"))
            .mount(&server)
            .await;

        let client = NewsClient::new(&config(&server.uri())).unwrap();
        let err = client.top_stories("world", 5).await.unwrap_err();
        assert!(err.is_retryable());
        assert!(err.to_string().contains("slow down"));
    }
}
