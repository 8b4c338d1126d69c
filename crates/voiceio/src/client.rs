use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use thiserror::Error;

use crate::prosody::prosody_from_confidence;

#[derive(Debug, Error)]
pub enum TtsError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

const ELEVENLABS_BASE_URL: &str = "https://api.elevenlabs.io";
const MODEL_ID: &str = "eleven_multilingual_v2";

pub struct TtsClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    voice_id: Option<String>,
}

impl TtsClient {
    pub fn new(
        api_key: Option<String>,
        voice_id: Option<String>,
        timeout: Duration,
    ) -> Result<Self, TtsError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: ELEVENLABS_BASE_URL.to_string(),
            api_key,
            voice_id,
        })
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn credentials(&self) -> Option<(&str, &str)> {
        match (self.api_key.as_deref(), self.voice_id.as_deref()) {
            (Some(k), Some(v)) if !k.is_empty() && !v.is_empty() => Some((k, v)),
            _ => None,
        }
    }

    /// Render audio bytes for an explanation. Stub bytes when unconfigured so
    /// the pipeline stays exercisable without credentials.
    pub async fn synthesize(&self, text: &str, confidence: f64) -> Result<Vec<u8>, TtsError> {
        let Some((api_key, voice_id)) = self.credentials() else {
            return Ok(format!("STUB-AUDIO: {text}").into_bytes());
        };

        let prosody = prosody_from_confidence(confidence);
        let url = format!(
            "{}/v1/text-to-speech/{voice_id}",
            self.base_url.trim_end_matches('/')
        );
        let payload = json!({
            "text": text,
            "model_id": MODEL_ID,
            "voice_settings": {
                "stability": prosody.stability,
                "similarity_boost": 0.85,
                "style": prosody.style,
                "use_speaker_boost": true
            }
        });

        let resp = self
            .client
            .post(url)
            .header("xi-api-key", api_key)
            .header("Accept", "audio/mpeg")
            .json(&payload)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(TtsError::InvalidResponse(format!(
                "status={status} body={body}"
            )));
        }

        Ok(resp.bytes().await?.to_vec())
    }
}
