//! Text-to-speech narration over the REST API.

use base64::Engine;
use bytes::Bytes;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{require_key, SourcesConfig};
use crate::error::{SourceError, SourceResult};

const SERVICE: &str = "tts";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: SynthesisInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig,
}

#[derive(Debug, Serialize)]
struct SynthesisInput<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig {
    audio_encoding: &'static str,
    speaking_rate: f64,
    pitch: f64,
    effects_profile_id: Vec<&'static str>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    #[serde(default)]
    audio_content: String,
}

/// Synthesizes MP3 narration.
pub struct TtsClient {
    client: Client,
    base_url: String,
    api_key: String,
    voice: String,
}

impl TtsClient {
    pub fn new(config: &SourcesConfig) -> SourceResult<Self> {
        Ok(Self {
            client: config.http_client()?,
            base_url: config.tts_base_url.trim_end_matches('/').to_string(),
            api_key: require_key(&config.tts_api_key, "GOOGLE_TTS_API_KEY")?,
            voice: config.tts_voice.clone(),
        })
    }

    pub fn voice(&self) -> &str {
        &self.voice
    }

    /// Synthesize `text` and return MP3 bytes.
    pub async fn synthesize(&self, text: &str) -> SourceResult<Bytes> {
        if text.trim().is_empty() {
            return Err(SourceError::empty(SERVICE, "narration text is empty"));
        }

        let language_code = language_of(&self.voice);
        let request = SynthesizeRequest {
            input: SynthesisInput { text },
            voice: VoiceSelection {
                language_code: &language_code,
                name: &self.voice,
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
                speaking_rate: 1.0,
                pitch: 0.0,
                effects_profile_id: vec!["small-bluetooth-speaker-class-device"],
            },
        };

        let response = self
            .client
            .post(format!("{}/v1/text:synthesize", self.base_url))
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await
            .map_err(|e| SourceError::transport(SERVICE, e))?;

        if !response.status().is_success() {
            return Err(SourceError::from_response(SERVICE, response).await);
        }

        let body: SynthesizeResponse = response
            .json()
            .await
            .map_err(|e| SourceError::decode(SERVICE, e))?;
        if body.audio_content.is_empty() {
            return Err(SourceError::empty(SERVICE, "no audioContent in response"));
        }

        let audio = base64::engine::general_purpose::STANDARD
            .decode(body.audio_content.as_bytes())
            .map_err(|e| SourceError::decode(SERVICE, e))?;

        info!(
            voice = %self.voice,
            size_kb = format!("{:.1}", audio.len() as f64 / 1024.0),
            "Narration synthesized"
        );
        Ok(Bytes::from(audio))
    }
}

/// "en-US-Neural2-J" -> "en-US".
fn language_of(voice: &str) -> String {
    let mut parts = voice.splitn(3, '-');
    match (parts.next(), parts.next()) {
        (Some(lang), Some(region)) if !lang.is_empty() && !region.is_empty() => {
            format!("{}-{}", lang, region)
        }
        _ => "en-US".to_string(),
    }
}
