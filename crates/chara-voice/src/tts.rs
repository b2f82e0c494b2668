//! Text-to-speech backends.
//!
//! The speech queue talks to a [`TtsBackend`]; the production implementation
//! is a koeiromap-style HTTP API that returns an audio URL (often a `data:`
//! payload) for a message + voice-map position + style.

use crate::error::{VoiceError, VoiceResult};
use crate::screenplay::{Talk, TalkStyle};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Backend that turns one talk segment into audio bytes (WAV/MP3). Returning
/// empty bytes skips playback for that segment.
#[async_trait]
pub trait TtsBackend: Send + Sync {
    async fn synthesize(&self, talk: &Talk) -> VoiceResult<Vec<u8>>;
}

/// Placeholder TTS: returns empty audio so nothing plays. Use for wiring tests
/// and for running without an API key.
#[derive(Debug, Default)]
pub struct PlaceholderTts;

#[async_trait]
impl TtsBackend for PlaceholderTts {
    async fn synthesize(&self, _talk: &Talk) -> VoiceResult<Vec<u8>> {
        Ok(Vec::new())
    }
}

#[derive(Serialize)]
struct SynthesisRequest<'a> {
    text: &'a str,
    speaker_x: f32,
    speaker_y: f32,
    style: TalkStyle,
}

#[derive(Deserialize)]
struct SynthesisResponse {
    audio: Option<String>,
}

/// Koeiromap-style synthesis client: POST the segment, read `{ audio: url }`,
/// then resolve the URL to bytes. `data:` URLs are decoded locally; anything
/// else is fetched over HTTP.
#[derive(Debug, Clone)]
pub struct KoeiromapTts {
    /// Synthesis endpoint, e.g. `https://api.rinna.co.jp/models/cttse/koeiro`.
    pub endpoint: String,
    /// Optional bearer API key.
    pub api_key: Option<String>,
    client: reqwest::Client,
}

impl KoeiromapTts {
    /// Build from environment: `TTS_API_URL` (required), `TTS_API_KEY` (optional).
    pub fn from_env() -> VoiceResult<Self> {
        let endpoint = std::env::var("TTS_API_URL")
            .map_err(|_| VoiceError::Config("TTS requires TTS_API_URL".to_string()))?;
        Self::new(endpoint, std::env::var("TTS_API_KEY").ok())
    }

    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> VoiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        Ok(Self {
            endpoint: endpoint.into(),
            api_key,
            client,
        })
    }

    async fn resolve_audio(&self, url: &str) -> VoiceResult<Vec<u8>> {
        if let Some(rest) = url.strip_prefix("data:") {
            let encoded = rest
                .split_once("base64,")
                .map(|(_, data)| data)
                .ok_or_else(|| VoiceError::Tts("unsupported data URL encoding".to_string()))?;
            return BASE64
                .decode(encoded)
                .map_err(|e| VoiceError::Tts(e.to_string()));
        }

        let res = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| VoiceError::Http(e.to_string()))?;
        if !res.status().is_success() {
            return Err(VoiceError::Http(format!(
                "audio fetch failed with status {}",
                res.status()
            )));
        }
        let bytes = res
            .bytes()
            .await
            .map_err(|e| VoiceError::Http(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl TtsBackend for KoeiromapTts {
    async fn synthesize(&self, talk: &Talk) -> VoiceResult<Vec<u8>> {
        let text = talk.message.trim();
        if text.is_empty() {
            return Ok(Vec::new());
        }

        debug!("synthesizing {} chars, style {}", text.chars().count(), talk.style.as_str());
        let body = SynthesisRequest {
            text,
            speaker_x: talk.speaker_x,
            speaker_y: talk.speaker_y,
            style: talk.style,
        };

        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }

        let res = req
            .send()
            .await
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        if !res.status().is_success() {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            return Err(VoiceError::Tts(format!("TTS API error {}: {}", status, body)));
        }

        let parsed: SynthesisResponse = res
            .json()
            .await
            .map_err(|e| VoiceError::Tts(e.to_string()))?;
        let url = parsed
            .audio
            .ok_or_else(|| VoiceError::Tts("synthesis response had no audio".to_string()))?;
        self.resolve_audio(&url).await
    }
}
