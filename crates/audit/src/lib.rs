//! vox_audit
//!
//! Two audit surfaces:
//! - `record_ai_call`: one immutable row per model call, accepted or
//!   rejected. A failed write is logged and swallowed so the user-visible
//!   pipeline keeps going; this is the only mutation allowed to lose
//!   durability silently.
//! - `append_audit_log`: trace-step records. Failures here propagate.

use chrono::Utc;
use serde_json::Value as JsonValue;
use thiserror::Error;
use vox_common::sha256_hex;
use vox_domain::{AiCallAuditRow, AuditLogRow, PolicyStatus};
use vox_store::{CortexStore, StoreError};

/// prompt_preview is bounded; raw_output is stored unbounded.
const PROMPT_PREVIEW_CHARS: usize = 4000;

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// Everything known about one model call at audit time.
#[derive(Debug, Clone)]
pub struct AiCall<'a> {
    pub trace_id: &'a str,
    pub phase: &'a str,
    pub model_name: &'a str,
    pub prompt: &'a str,
    pub raw_output: &'a str,
    pub parsed_json: Option<JsonValue>,
    pub policy_status: PolicyStatus,
    pub policy_error: Option<String>,
}

/// Write the audit row for a model call and return its id. Never fails from
/// the caller's perspective: a store failure is logged at warn and None comes
/// back.
pub fn record_ai_call(store: &dyn CortexStore, call: AiCall<'_>) -> Option<i64> {
    let prompt_hash = sha256_hex(call.prompt.as_bytes());
    let prompt_preview: String = call.prompt.chars().take(PROMPT_PREVIEW_CHARS).collect();

    let row = AiCallAuditRow {
        id: 0, // store-assigned
        trace_id: call.trace_id.to_string(),
        phase: call.phase.to_string(),
        model_name: call.model_name.to_string(),
        prompt_hash,
        prompt_preview,
        raw_output: call.raw_output.to_string(),
        parsed_json: call.parsed_json,
        policy_status: call.policy_status,
        policy_error: call.policy_error,
        created_at: Utc::now().to_rfc3339(),
    };

    match store.insert_ai_call_audit(row) {
        Ok(id) => Some(id),
        Err(e) => {
            tracing::warn!(
                trace_id = call.trace_id,
                phase = call.phase,
                error = %e,
                "ai call audit write failed; continuing without durable audit row"
            );
            None
        }
    }
}

/// Append a trace-step record to the audit log.
pub fn append_audit_log(
    store: &dyn CortexStore,
    trace_id: &str,
    actor: &str,
    action: &str,
    details: JsonValue,
) -> Result<(), AuditError> {
    store.append_audit_log(AuditLogRow {
        trace_id: trace_id.to_string(),
        actor: actor.to_string(),
        action: action.to_string(),
        details,
        created_at: Utc::now().to_rfc3339(),
    })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vox_store::MemoryStore;

    fn call<'a>(trace_id: &'a str, prompt: &'a str) -> AiCall<'a> {
        AiCall {
            trace_id,
            phase: "phase1_explain",
            model_name: "models/gemini-2.5-flash",
            prompt,
            raw_output: "{}",
            parsed_json: None,
            policy_status: PolicyStatus::Rejected,
            policy_error: Some("missing required key: explanation".into()),
        }
    }

    #[test]
    fn records_hash_and_bounded_preview() {
        let store = MemoryStore::new();
        let prompt = "p".repeat(5000);
        let id = record_ai_call(&store, call("trc_1", &prompt)).unwrap();
        assert_eq!(id, 1);

        let rows = store.recent_ai_calls(10).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].prompt_preview.chars().count(), 4000);
        assert_eq!(rows[0].prompt_hash, sha256_hex(prompt.as_bytes()));
        assert_eq!(rows[0].policy_status, PolicyStatus::Rejected);
    }

    #[test]
    fn preview_truncation_respects_char_boundaries() {
        let store = MemoryStore::new();
        let prompt = "é".repeat(4100);
        record_ai_call(&store, call("trc_1", &prompt)).unwrap();
        let rows = store.recent_ai_calls(1).unwrap();
        assert_eq!(rows[0].prompt_preview.chars().count(), 4000);
    }

    #[test]
    fn audit_log_appends_with_trace() {
        let store = MemoryStore::new();
        append_audit_log(&store, "trc_1", "phase0_worker", "ingest", json!({"event_id": "evt_1"}))
            .unwrap();
        let trail = store.audit_trail("trc_1").unwrap();
        assert_eq!(trail.len(), 1);
        assert_eq!(trail[0].action, "ingest");
    }
}
