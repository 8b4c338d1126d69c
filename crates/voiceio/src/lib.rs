//! vox_voiceio
//!
//! Best-effort voice rendering of explanations. Non-authoritative: a failed
//! or skipped render never breaks the pipeline; only the byte length is
//! recorded alongside the explanation row.

mod client;
mod prosody;

pub use client::{TtsClient, TtsError};
pub use prosody::{prosody_from_confidence, Prosody};
