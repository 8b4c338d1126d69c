//! vox_domain
//!
//! Strongly-typed records for the incident-reasoning pipeline:
//! - ingest/canonical events
//! - beliefs, evidence references, deltas
//! - validated reasoner output
//! - persisted row shapes (one struct per table)
//!
//! All timestamps are RFC-3339 UTC strings. All hashes are bare lowercase hex.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;

// ----------------------------
// Events
// ----------------------------

/// Raw ingest body as received from a connector (datadog/jira/siem/...).
/// Required fields are enforced at the deserialization boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestEvent {
    pub source: String,
    /// canonical-ish type, e.g. alert, incident, change
    pub event_type: String,
    /// ISO timestamp string, stored verbatim
    pub occurred_at: String,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub payload: BTreeMap<String, JsonValue>,
}

/// Deterministic projection of an ingest payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NormalizedPayload {
    pub service: String,
    pub region: String,
    pub message: String,
    pub raw_keys: Vec<String>,
}

/// The only event shape the core consumes. Immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CanonicalEvent {
    pub event_id: String,
    pub trace_id: String,
    pub source: String,
    pub event_type: String,
    pub occurred_at: String,
    #[serde(default)]
    pub severity: Option<String>,
    pub normalized: NormalizedPayload,
}

/// Ingest acknowledgement returned to the transport layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestAck {
    pub ok: bool,
    pub trace_id: String,
    pub event_id: String,
}

// ----------------------------
// Beliefs
// ----------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvidenceKind {
    Event,
    Snapshot,
    External,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceRef {
    pub evidence_id: String,
    pub kind: EvidenceKind,
    #[serde(default)]
    pub pointer: BTreeMap<String, String>,
}

/// The system's current stance about a subject.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Belief {
    pub belief_id: String,
    pub trace_id: String,
    /// e.g. service/api-gateway or site/manchester-dc
    pub subject: String,
    pub hypothesis: String,
    /// always within [0, 1]
    pub confidence: f64,
    #[serde(default)]
    pub evidence: Vec<EvidenceRef>,
    pub updated_at: String,
}

impl Belief {
    pub fn evidence_ids(&self) -> Vec<String> {
        self.evidence.iter().map(|e| e.evidence_id.clone()).collect()
    }
}

/// One confidence transition, never mutated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeliefDelta {
    pub belief_id: String,
    pub trace_id: String,
    pub from_conf: f64,
    pub to_conf: f64,
    pub reason: String,
    pub created_at: String,
}

// ----------------------------
// Reasoner output
// ----------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PolicyStatus {
    Accepted,
    Rejected,
}

impl PolicyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyStatus::Accepted => "ACCEPTED",
            PolicyStatus::Rejected => "REJECTED",
        }
    }
}

/// Model output after the policy gate accepted it. Never partial: all four
/// required members are populated, and `payload` keeps the full validated
/// object for downstream hypothesis extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedExplanation {
    pub explanation: String,
    pub confidence_language: JsonValue,
    pub evidence_ids: Vec<String>,
    pub what_would_change_my_mind: Vec<String>,
    pub payload: JsonValue,
}

// ----------------------------
// Promotion
// ----------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PromotionDecision {
    Promote,
    Hold,
    Reject,
}

impl PromotionDecision {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionDecision::Promote => "PROMOTE",
            PromotionDecision::Hold => "HOLD",
            PromotionDecision::Reject => "REJECT",
        }
    }
}

// ----------------------------
// Persisted rows
// ----------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRow {
    pub event_id: String,
    pub trace_id: String,
    pub source: String,
    pub event_type: String,
    pub occurred_at: String,
    pub severity: Option<String>,
    pub raw_payload: JsonValue,
    pub normalized_payload: JsonValue,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceSnapshotRow {
    pub evidence_id: String,
    pub trace_id: String,
    /// unique; identical payloads under any trace collapse to one row
    pub sha256: String,
    pub created_at: String,
    /// canonical JSON form of the snapshotted payload
    pub payload: JsonValue,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceRow {
    pub evidence_id: String,
    pub trace_id: String,
    pub sha256: String,
    pub actor: String,
    pub signature: String,
    /// "hmac" or "sha256"
    pub sig_mode: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeliefRow {
    pub belief_id: String,
    pub trace_id: String,
    pub subject: String,
    pub hypothesis: String,
    pub confidence: f64,
    pub evidence_ids: Vec<String>,
    pub updated_at: String,
}

impl From<&Belief> for BeliefRow {
    fn from(b: &Belief) -> Self {
        BeliefRow {
            belief_id: b.belief_id.clone(),
            trace_id: b.trace_id.clone(),
            subject: b.subject.clone(),
            hypothesis: b.hypothesis.clone(),
            confidence: b.confidence,
            evidence_ids: b.evidence_ids(),
            updated_at: b.updated_at.clone(),
        }
    }
}

/// One immutable row per model call, accepted or rejected.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiCallAuditRow {
    pub id: i64,
    pub trace_id: String,
    pub phase: String,
    pub model_name: String,
    pub prompt_hash: String,
    /// bounded to 4000 chars
    pub prompt_preview: String,
    /// full model output, unbounded
    pub raw_output: String,
    pub parsed_json: Option<JsonValue>,
    pub policy_status: PolicyStatus,
    pub policy_error: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HypothesisRow {
    pub id: i64,
    pub trace_id: String,
    pub belief_id: String,
    pub ai_call_audit_id: i64,
    pub hypothesis: String,
    pub confidence: Option<f64>,
    pub evidence_ids: Vec<String>,
    /// canonical JSON of the validated object the hypothesis came from
    pub payload: JsonValue,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromotionRow {
    pub trace_id: String,
    pub belief_id: String,
    pub hypothesis_id: i64,
    pub ai_call_audit_id: i64,
    pub decision: PromotionDecision,
    pub decision_reason: String,
    pub promoted_confidence: f64,
    pub evidence_ids: Vec<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplanationRow {
    pub trace_id: String,
    pub belief_id: String,
    pub explanation_json: JsonValue,
    /// TTS render size; 0 when rendering was skipped or failed
    pub audio_bytes_len: u64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditLogRow {
    pub trace_id: String,
    pub actor: String,
    pub action: String,
    pub details: JsonValue,
    pub created_at: String,
}
