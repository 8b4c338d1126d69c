//! Deterministic promotion of the latest stored hypothesis.

use chrono::Utc;
use vox_domain::{PromotionDecision, PromotionRow};
use vox_store::{CortexStore, StoreError};

/// Fixed policy (the system decides, not the model):
///   >= 0.85 -> PROMOTE
///   >= 0.60 -> HOLD
///   <  0.60 -> REJECT
pub fn decision_from_confidence(conf: f64) -> (PromotionDecision, &'static str) {
    if conf >= 0.85 {
        (PromotionDecision::Promote, "confidence>=0.85")
    } else if conf >= 0.60 {
        (PromotionDecision::Hold, "0.60<=confidence<0.85")
    } else {
        (PromotionDecision::Reject, "confidence<0.60")
    }
}

/// Load the latest hypothesis for (trace_id, belief_id) and write the
/// promotion decision. Idempotent on (belief_id, hypothesis_id); returns None
/// when no hypothesis exists.
pub fn promote_latest(
    store: &dyn CortexStore,
    trace_id: &str,
    belief_id: &str,
) -> Result<Option<PromotionRow>, StoreError> {
    let hyp = match store.latest_hypothesis(trace_id, belief_id)? {
        Some(h) => h,
        None => return Ok(None),
    };

    let confidence = hyp.confidence.unwrap_or(0.0);
    let (decision, reason) = decision_from_confidence(confidence);

    let row = PromotionRow {
        trace_id: trace_id.to_string(),
        belief_id: belief_id.to_string(),
        hypothesis_id: hyp.id,
        ai_call_audit_id: hyp.ai_call_audit_id,
        decision,
        decision_reason: reason.to_string(),
        promoted_confidence: confidence,
        evidence_ids: hyp.evidence_ids,
        created_at: Utc::now().to_rfc3339(),
    };
    store.insert_promotion(row.clone())?;
    Ok(Some(row))
}
