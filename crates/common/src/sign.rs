//! Provenance signing.
//!
//! Two modes, selected by configuration:
//! - "hmac"   — HMAC-SHA256 keyed by the base64 signing key (production)
//! - "sha256" — plain digest fallback for local/dev when no key is configured
//!
//! The mode actually used is recorded next to the signature so verifiers know
//! what to recompute.

use base64::Engine as _;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;

use crate::sha256_hex;

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum SignError {
    #[error("invalid signing key: {0}")]
    InvalidKey(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureMode {
    Hmac,
    Digest,
}

impl SignatureMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignatureMode::Hmac => "hmac",
            SignatureMode::Digest => "sha256",
        }
    }
}

/// Sign provenance material. `key_b64` empty or absent selects the unkeyed
/// digest fallback.
pub fn sign_provenance(
    key_b64: Option<&str>,
    msg: &[u8],
) -> Result<(String, SignatureMode), SignError> {
    match key_b64 {
        Some(k) if !k.trim().is_empty() => {
            let key = base64::engine::general_purpose::STANDARD
                .decode(k.trim())
                .map_err(|e| SignError::InvalidKey(e.to_string()))?;
            let mut mac = HmacSha256::new_from_slice(&key)
                .map_err(|e| SignError::InvalidKey(e.to_string()))?;
            mac.update(msg);
            let sig = hex::encode(mac.finalize().into_bytes());
            Ok((sig, SignatureMode::Hmac))
        }
        _ => Ok((sha256_hex(msg), SignatureMode::Digest)),
    }
}
