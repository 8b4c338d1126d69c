//! vox_reasoner
//!
//! The policy-gated reasoning gateway and its downstream stores:
//! - provider transport (Gemini over reqwest, plus a deterministic stub for
//!   keyless dev)
//! - `explain`: prompt, call, gate, audit unconditionally, persist accepted
//!   hypotheses, fall back on rejection or upstream failure
//! - hypothesis extraction + dedup-safe persistence
//! - deterministic promotion decisions

mod gateway;
mod hypotheses;
mod promoter;
mod provider;

pub use gateway::{explain, ReasonerError, PHASE_EXPLAIN};
pub use hypotheses::{extract_candidates, persist_hypotheses, HypothesisCandidate};
pub use promoter::{decision_from_confidence, promote_latest};
pub use provider::{GeminiProvider, ProviderError, ProviderResponse, ReasonerProvider, StubProvider};
