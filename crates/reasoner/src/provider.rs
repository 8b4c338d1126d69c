//! Provider transport + normalization only. No policy, no audit, no retries —
//! those belong to the gateway.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value as JsonValue};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("http error: {0}")]
    Http(reqwest::Error),
    #[error("request timed out")]
    Timeout,
    #[error("rate limited by upstream")]
    RateLimited,
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ProviderError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ProviderError::Timeout
        } else {
            ProviderError::Http(e)
        }
    }
}

/// Raw provider output plus the extracted text, if the response carried one.
/// Callers stringify `raw_json` when `text` is absent.
#[derive(Debug, Clone)]
pub struct ProviderResponse {
    pub raw_json: JsonValue,
    pub text: Option<String>,
}

#[async_trait]
pub trait ReasonerProvider: Send + Sync {
    fn model_name(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<ProviderResponse, ProviderError>;
}

// ----------------------------
// Gemini
// ----------------------------

const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiProvider {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: GEMINI_BASE_URL.to_string(),
            api_key,
            model,
        })
    }

    /// Point at a different endpoint (local emulators, proxies).
    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url;
        self
    }

    fn endpoint(&self) -> String {
        let model_path = if self.model.starts_with("models/") {
            self.model.clone()
        } else {
            format!("models/{}", self.model)
        };
        format!(
            "{}/v1beta/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            model_path
        )
    }
}

#[async_trait]
impl ReasonerProvider for GeminiProvider {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<ProviderResponse, ProviderError> {
        let body = json!({
            "contents": [{"parts": [{"text": prompt}]}],
            "generationConfig": {"response_mime_type": "application/json"}
        });

        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::InvalidResponse(format!(
                "status={status} body={text}"
            )));
        }

        let raw: JsonValue = resp.json().await?;
        let text = extract_text(&raw);
        Ok(ProviderResponse { raw_json: raw, text })
    }
}

/// Concatenate candidates[0].content.parts[].text, tolerating absent pieces.
fn extract_text(raw: &JsonValue) -> Option<String> {
    let parts = raw
        .get("candidates")?
        .get(0)?
        .get("content")?
        .get("parts")?
        .as_array()?;
    let mut out = String::new();
    for p in parts {
        if let Some(t) = p.get("text").and_then(|v| v.as_str()) {
            out.push_str(t);
        }
    }
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

// ----------------------------
// Keyless stub
// ----------------------------

/// Deterministic output when no API key is configured. Keeps the pipeline
/// testable end-to-end without network access; the gate still runs over it.
pub struct StubProvider;

#[async_trait]
impl ReasonerProvider for StubProvider {
    fn model_name(&self) -> &str {
        "stub"
    }

    async fn generate(&self, _prompt: &str) -> Result<ProviderResponse, ProviderError> {
        let obj = json!({
            "explanation": "STUB: reasoner API key not configured. Returning deterministic explanation.",
            "confidence_language": {"tone": "uncertain", "markers": ["stub_mode"]},
            "evidence_ids": [],
            "what_would_change_my_mind": ["Configure GEMINI_API_KEY and replay the incident."]
        });
        Ok(ProviderResponse {
            text: Some(obj.to_string()),
            raw_json: obj,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoint_prefixes_bare_model_names() {
        let p = GeminiProvider::new(
            "k".into(),
            "gemini-2.5-flash".into(),
            Duration::from_secs(30),
        )
        .unwrap();
        assert!(p
            .endpoint()
            .ends_with("/v1beta/models/gemini-2.5-flash:generateContent"));

        let p = GeminiProvider::new(
            "k".into(),
            "models/gemini-2.5-flash".into(),
            Duration::from_secs(30),
        )
        .unwrap();
        assert!(p
            .endpoint()
            .ends_with("/v1beta/models/gemini-2.5-flash:generateContent"));
    }

    #[test]
    fn text_extraction_concatenates_parts() {
        let raw = json!({
            "candidates": [{"content": {"parts": [{"text": "{\"a\""}, {"text": ":1}"}]}}]
        });
        assert_eq!(extract_text(&raw).as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn text_extraction_tolerates_missing_shape() {
        assert_eq!(extract_text(&json!({"error": {"code": 500}})), None);
    }

    #[tokio::test]
    async fn stub_output_is_gate_clean() {
        let resp = StubProvider.generate("ignored").await.unwrap();
        let text = resp.text.unwrap();
        assert!(vox_policy::PolicyGate::validate(&text).is_ok());
    }
}
