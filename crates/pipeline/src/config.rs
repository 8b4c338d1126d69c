//! Environment-driven settings, read once at process start and passed down
//! explicitly. Keys are injected by the deployment (secret manager -> env);
//! locally a .env file loaded by the binary does the same job.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_REASONER_MODEL: &str = "models/gemini-2.5-flash";
pub const LLM_TIMEOUT: Duration = Duration::from_secs(30);
pub const TTS_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct Settings {
    /// State directory for the durable store (VOXCORTEX_STATE_DIR).
    pub state_dir: PathBuf,
    /// GEMINI_API_KEY, falling back to GOOGLE_API_KEY.
    pub gemini_api_key: Option<String>,
    /// GEMINI_REASONER_MODEL
    pub reasoner_model: String,
    pub elevenlabs_api_key: Option<String>,
    pub elevenlabs_voice_id: Option<String>,
    /// EVIDENCE_SIGNING_KEY_B64; absent selects the unkeyed digest mode.
    pub evidence_signing_key_b64: Option<String>,
    /// LOG_LEVEL, an env-filter directive string.
    pub log_level: String,
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Settings {
    pub fn from_env() -> Self {
        Settings {
            state_dir: env_nonempty("VOXCORTEX_STATE_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("runtime").join("state")),
            gemini_api_key: env_nonempty("GEMINI_API_KEY").or_else(|| env_nonempty("GOOGLE_API_KEY")),
            reasoner_model: env_nonempty("GEMINI_REASONER_MODEL")
                .unwrap_or_else(|| DEFAULT_REASONER_MODEL.to_string()),
            elevenlabs_api_key: env_nonempty("ELEVENLABS_API_KEY"),
            elevenlabs_voice_id: env_nonempty("ELEVENLABS_VOICE_ID"),
            evidence_signing_key_b64: env_nonempty("EVIDENCE_SIGNING_KEY_B64"),
            log_level: env_nonempty("LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
        }
    }
}
