//! Hypothesis extraction + dedup-safe persistence, keyed to the audit row of
//! the model call that produced them.

use chrono::Utc;
use serde_json::Value as JsonValue;
use vox_domain::{HypothesisRow, ValidatedExplanation};
use vox_store::{CortexStore, StoreError};

#[derive(Debug, Clone, PartialEq)]
pub struct HypothesisCandidate {
    pub hypothesis: String,
    pub confidence: Option<f64>,
    pub evidence_ids: Vec<String>,
}

/// Pull hypothesis candidates out of a validated object. Two shapes are
/// accepted:
/// - `hypotheses: [{hypothesis, confidence, evidence_ids}, ...]`
/// - top-level `{hypothesis, confidence, evidence_ids}`
///
/// Text is trimmed and required non-empty; confidence is kept only when
/// numeric; evidence_ids fall back to the parent's list.
pub fn extract_candidates(validated: &ValidatedExplanation) -> Vec<HypothesisCandidate> {
    let obj = match validated.payload.as_object() {
        Some(o) => o,
        None => return vec![],
    };

    if let Some(list) = obj.get("hypotheses").and_then(|v| v.as_array()) {
        return list
            .iter()
            .filter_map(|item| candidate_from(item, &validated.evidence_ids))
            .collect();
    }

    if obj.get("hypothesis").is_some() {
        if let Some(c) = candidate_from(&validated.payload, &validated.evidence_ids) {
            return vec![c];
        }
    }

    vec![]
}

fn candidate_from(item: &JsonValue, parent_evidence: &[String]) -> Option<HypothesisCandidate> {
    let obj = item.as_object()?;
    let text = obj.get("hypothesis")?.as_str()?.trim();
    if text.is_empty() {
        return None;
    }
    let confidence = obj.get("confidence").and_then(|v| v.as_f64());
    let evidence_ids = match obj.get("evidence_ids").and_then(|v| v.as_array()) {
        Some(arr) => arr
            .iter()
            .map(|x| match x {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        None => parent_evidence.to_vec(),
    };
    Some(HypothesisCandidate {
        hypothesis: text.to_string(),
        confidence,
        evidence_ids,
    })
}

/// Persist every extracted hypothesis. Duplicates of
/// (ai_call_audit_id, hypothesis) are silently skipped; the actual inserted
/// count is returned.
pub fn persist_hypotheses(
    store: &dyn CortexStore,
    trace_id: &str,
    belief_id: &str,
    ai_call_audit_id: i64,
    validated: &ValidatedExplanation,
) -> Result<usize, StoreError> {
    let mut inserted = 0;
    for cand in extract_candidates(validated) {
        let row = HypothesisRow {
            id: 0, // store-assigned
            trace_id: trace_id.to_string(),
            belief_id: belief_id.to_string(),
            ai_call_audit_id,
            hypothesis: cand.hypothesis,
            confidence: cand.confidence,
            evidence_ids: cand.evidence_ids,
            payload: validated.payload.clone(),
            created_at: Utc::now().to_rfc3339(),
        };
        if store.insert_hypothesis(row)?.is_some() {
            inserted += 1;
        }
    }
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vox_store::MemoryStore;

    fn validated_with(payload: JsonValue) -> ValidatedExplanation {
        ValidatedExplanation {
            explanation: "e".into(),
            confidence_language: json!({}),
            evidence_ids: vec!["evt_parent".into()],
            what_would_change_my_mind: vec![],
            payload,
        }
    }

    #[test]
    fn extracts_hypothesis_list() {
        let v = validated_with(json!({
            "hypotheses": [
                {"hypothesis": "  X  ", "confidence": 0.9, "evidence_ids": ["evt_1"]},
                {"hypothesis": "Y", "confidence": "high"},
                {"hypothesis": "   "},
                {"hypothesis": 42}
            ]
        }));
        let got = extract_candidates(&v);
        assert_eq!(got.len(), 2);
        assert_eq!(got[0].hypothesis, "X");
        assert_eq!(got[0].confidence, Some(0.9));
        assert_eq!(got[0].evidence_ids, vec!["evt_1"]);
        // non-numeric confidence dropped, parent evidence inherited
        assert_eq!(got[1].hypothesis, "Y");
        assert_eq!(got[1].confidence, None);
        assert_eq!(got[1].evidence_ids, vec!["evt_parent"]);
    }

    #[test]
    fn extracts_top_level_shape() {
        let v = validated_with(json!({"hypothesis": "Z", "confidence": 0.4}));
        let got = extract_candidates(&v);
        assert_eq!(got.len(), 1);
        assert_eq!(got[0].hypothesis, "Z");
        assert_eq!(got[0].confidence, Some(0.4));
        assert_eq!(got[0].evidence_ids, vec!["evt_parent"]);
    }

    #[test]
    fn no_hypothesis_shape_yields_nothing() {
        let v = validated_with(json!({"explanation": "just words"}));
        assert!(extract_candidates(&v).is_empty());
    }

    #[test]
    fn persisting_twice_under_one_audit_row_inserts_once() {
        let store = MemoryStore::new();
        let v = validated_with(json!({"hypotheses": [{"hypothesis": "X", "confidence": 0.9}]}));

        let first = persist_hypotheses(&store, "trc_1", "blf_1", 7, &v).unwrap();
        let second = persist_hypotheses(&store, "trc_1", "blf_1", 7, &v).unwrap();
        assert_eq!(first, 1);
        assert_eq!(second, 0);

        // a different audit row is a different dedup scope
        let third = persist_hypotheses(&store, "trc_1", "blf_1", 8, &v).unwrap();
        assert_eq!(third, 1);
    }
}
