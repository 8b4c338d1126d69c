//! The reasoning gateway: one model call per reasoning step, one audit row
//! per model call, no exceptions.

use serde_json::json;
use thiserror::Error;
use vox_audit::{record_ai_call, AiCall};
use vox_common::{canonical_value, CanonError};
use vox_domain::{Belief, EvidenceRef, PolicyStatus, ValidatedExplanation};
use vox_policy::PolicyGate;
use vox_store::CortexStore;

use crate::hypotheses::persist_hypotheses;
use crate::provider::{ProviderError, ReasonerProvider};

pub const PHASE_EXPLAIN: &str = "phase1_explain";

#[derive(Debug, Error)]
pub enum ReasonerError {
    #[error("canonical json error: {0}")]
    Canon(#[from] CanonError),
}

fn build_prompt(
    trace_id: &str,
    belief: &Belief,
    evidence: &[EvidenceRef],
) -> Result<String, CanonError> {
    let belief_json = serde_json::to_string(&canonical_value(belief)?)?;
    let evidence_json = serde_json::to_string(&canonical_value(&evidence)?)?;

    Ok(format!(
        r#"You are a reasoning component inside an incident-management system.

ABSOLUTE RULES:
- NO actions
- NO tools
- NO data-store operations
- OUTPUT VALID JSON ONLY
- DO NOT include markdown
- DO NOT include commentary

Required JSON schema:
{{
  "explanation": "...",
  "confidence_language": {{ "...": "..." }},
  "evidence_ids": ["..."],
  "what_would_change_my_mind": ["..."]
}}

Context:
belief = {belief_json}
evidence = {evidence_json}
trace_id = "{trace_id}"

Return ONLY the JSON object."#
    ))
}

/// Stable shape handed downstream when the gate rejects the output.
fn policy_fallback() -> ValidatedExplanation {
    let payload = json!({
        "explanation": "rejected by policy gate",
        "confidence_language": {"level": "unknown", "calibration": "blocked_by_policy_gate"},
        "evidence_ids": [],
        "what_would_change_my_mind": [
            "A JSON-only response that cites evidence_ids and avoids action, tool, and data-store language."
        ]
    });
    fallback_from(payload)
}

/// Stable shape when the upstream provider is unavailable.
fn deferred_fallback() -> ValidatedExplanation {
    let payload = json!({
        "explanation": "deferred due to upstream rate limits",
        "confidence_language": {"tone": "unknown", "markers": ["rate_limited", "deferred"]},
        "evidence_ids": [],
        "what_would_change_my_mind": ["Retry after upstream quota reset."]
    });
    fallback_from(payload)
}

fn fallback_from(payload: serde_json::Value) -> ValidatedExplanation {
    let explanation = payload["explanation"].as_str().unwrap_or_default().to_string();
    let confidence_language = payload["confidence_language"].clone();
    let what = payload["what_would_change_my_mind"]
        .as_array()
        .map(|a| {
            a.iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default();
    ValidatedExplanation {
        explanation,
        confidence_language,
        evidence_ids: vec![],
        what_would_change_my_mind: what,
        payload,
    }
}

/// Produce a bounded, evidence-grounded explanation.
///
/// - prompts the model with belief + evidence as canonical JSON
/// - gates the raw output (the whole of it, not just the JSON)
/// - unconditionally writes exactly one ai_call_audit row
/// - persists extracted hypotheses when accepted (store failures are logged,
///   not propagated)
/// - always returns a complete `ValidatedExplanation`; rejection and upstream
///   failure come back as the constant fallback shapes
pub async fn explain(
    store: &dyn CortexStore,
    provider: &dyn ReasonerProvider,
    trace_id: &str,
    belief: &Belief,
    evidence: &[EvidenceRef],
) -> Result<ValidatedExplanation, ReasonerError> {
    let prompt = build_prompt(trace_id, belief, evidence)?;
    let model_name = provider.model_name();

    let raw_text = match provider.generate(&prompt).await {
        Ok(resp) => match resp.text {
            Some(t) => t,
            None => resp.raw_json.to_string(),
        },
        Err(e) => {
            let policy_error = match &e {
                ProviderError::Timeout => "timeout".to_string(),
                ProviderError::RateLimited => "rate_limited".to_string(),
                other => format!("upstream_unavailable: {other}"),
            };
            tracing::warn!(trace_id, error = %e, "reasoner call failed; deferring explanation");
            record_ai_call(
                store,
                AiCall {
                    trace_id,
                    phase: PHASE_EXPLAIN,
                    model_name,
                    prompt: &prompt,
                    raw_output: "",
                    parsed_json: None,
                    policy_status: PolicyStatus::Rejected,
                    policy_error: Some(policy_error),
                },
            );
            return Ok(deferred_fallback());
        }
    };

    match PolicyGate::validate(&raw_text) {
        Ok(validated) => {
            tracing::info!(trace_id, "policy gate accepted model output");
            let audit_id = record_ai_call(
                store,
                AiCall {
                    trace_id,
                    phase: PHASE_EXPLAIN,
                    model_name,
                    prompt: &prompt,
                    raw_output: &raw_text,
                    parsed_json: Some(validated.payload.clone()),
                    policy_status: PolicyStatus::Accepted,
                    policy_error: None,
                },
            );
            // Hypotheses are keyed to the audit row; without one there is
            // nothing valid to key them to.
            if let Some(id) = audit_id {
                match persist_hypotheses(store, trace_id, &belief.belief_id, id, &validated) {
                    Ok(n) if n > 0 => {
                        tracing::info!(trace_id, inserted = n, "persisted hypotheses")
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(
                        trace_id,
                        error = %e,
                        "hypothesis persistence failed; explanation still returned"
                    ),
                }
            }
            Ok(validated)
        }
        Err(violation) => {
            tracing::warn!(trace_id, reason = %violation, "policy gate rejected model output");
            record_ai_call(
                store,
                AiCall {
                    trace_id,
                    phase: PHASE_EXPLAIN,
                    model_name,
                    prompt: &prompt,
                    raw_output: &raw_text,
                    parsed_json: None,
                    policy_status: PolicyStatus::Rejected,
                    policy_error: Some(violation.0),
                },
            );
            Ok(policy_fallback())
        }
    }
}
