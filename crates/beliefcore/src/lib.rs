//! vox_beliefcore
//!
//! Deterministic belief update. No AI. No heuristics. No I/O — persistence is
//! the orchestrator's job so all of an event's writes land together.

use chrono::Utc;
use std::collections::BTreeMap;
use vox_common::ids::new_id;
use vox_domain::{Belief, BeliefDelta, EvidenceKind, EvidenceRef};

/// How strongly one signal moves confidence. A system constant: the update is
/// `clamp(prior + SIGNAL_COEFFICIENT * signal_strength, 0, 1)`.
pub const SIGNAL_COEFFICIENT: f64 = 0.35;

/// Pure deterministic confidence update. Mints a fresh belief id per call;
/// repeat processing of an event produces a new belief row, not an update of
/// the previous one.
pub fn deterministic_update(
    subject: &str,
    trace_id: &str,
    hypothesis: &str,
    prior: f64,
    signal_strength: f64,
    evidence_id: &str,
) -> (Belief, BeliefDelta) {
    let to_conf = (prior + SIGNAL_COEFFICIENT * signal_strength).clamp(0.0, 1.0);
    let belief_id = new_id("blf");
    let updated_at = Utc::now().to_rfc3339();

    let mut pointer = BTreeMap::new();
    pointer.insert("event_id".to_string(), evidence_id.to_string());

    let belief = Belief {
        belief_id: belief_id.clone(),
        trace_id: trace_id.to_string(),
        subject: subject.to_string(),
        hypothesis: hypothesis.to_string(),
        confidence: to_conf,
        evidence: vec![EvidenceRef {
            evidence_id: evidence_id.to_string(),
            kind: EvidenceKind::Event,
            pointer,
        }],
        updated_at: updated_at.clone(),
    };

    let delta = BeliefDelta {
        belief_id,
        trace_id: trace_id.to_string(),
        from_conf: prior,
        to_conf,
        reason: format!("deterministic_update(prior={prior}, signal={signal_strength})"),
        created_at: updated_at,
    };

    (belief, delta)
}
