use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};

use vox_domain::{
    AiCallAuditRow, AuditLogRow, BeliefDelta, BeliefRow, EventRow, EvidenceSnapshotRow,
    ExplanationRow, HypothesisRow, PromotionRow, ProvenanceRow,
};

use crate::{CortexStore, SnapshotUpsert, StoreError};

/// In-memory store. One mutex over the whole state; per-event writes are
/// sequential so contention is not a concern here.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
pub(crate) struct Inner {
    pub(crate) events: Vec<EventRow>,
    pub(crate) snapshots: Vec<EvidenceSnapshotRow>,
    pub(crate) provenance: Vec<ProvenanceRow>,
    pub(crate) beliefs: BTreeMap<String, BeliefRow>,
    pub(crate) deltas: Vec<BeliefDelta>,
    pub(crate) ai_calls: Vec<AiCallAuditRow>,
    pub(crate) next_ai_call_id: i64,
    pub(crate) hypotheses: Vec<HypothesisRow>,
    pub(crate) next_hypothesis_id: i64,
    pub(crate) promotions: Vec<PromotionRow>,
    pub(crate) explanations: Vec<ExplanationRow>,
    pub(crate) audit_log: Vec<AuditLogRow>,
}

impl Inner {
    pub(crate) fn insert_event(&mut self, row: EventRow) -> bool {
        if self.events.iter().any(|e| e.event_id == row.event_id) {
            return false;
        }
        self.events.push(row);
        true
    }

    pub(crate) fn upsert_snapshot(&mut self, row: EvidenceSnapshotRow) -> SnapshotUpsert {
        if let Some(existing) = self.snapshots.iter_mut().find(|s| s.sha256 == row.sha256) {
            // Deliberately last-writer-wins on trace_id; sha256 uniqueness is
            // the strong invariant.
            existing.trace_id = row.trace_id;
            return SnapshotUpsert {
                evidence_id: existing.evidence_id.clone(),
                inserted: false,
            };
        }
        let id = row.evidence_id.clone();
        self.snapshots.push(row);
        SnapshotUpsert {
            evidence_id: id,
            inserted: true,
        }
    }

    pub(crate) fn insert_provenance(&mut self, row: ProvenanceRow) -> bool {
        let dup = self.provenance.iter().any(|p| {
            p.evidence_id == row.evidence_id && p.sha256 == row.sha256 && p.actor == row.actor
        });
        if dup {
            return false;
        }
        self.provenance.push(row);
        true
    }

    pub(crate) fn upsert_belief(&mut self, row: BeliefRow) {
        self.beliefs.insert(row.belief_id.clone(), row);
    }

    pub(crate) fn insert_ai_call_audit(&mut self, mut row: AiCallAuditRow) -> i64 {
        self.next_ai_call_id += 1;
        row.id = self.next_ai_call_id;
        let id = row.id;
        self.ai_calls.push(row);
        id
    }

    /// Replay path: keep the id the row was persisted with.
    pub(crate) fn replay_ai_call_audit(&mut self, row: AiCallAuditRow) {
        self.next_ai_call_id = self.next_ai_call_id.max(row.id);
        self.ai_calls.push(row);
    }

    pub(crate) fn insert_hypothesis(&mut self, mut row: HypothesisRow) -> Option<i64> {
        let dup = self
            .hypotheses
            .iter()
            .any(|h| h.ai_call_audit_id == row.ai_call_audit_id && h.hypothesis == row.hypothesis);
        if dup {
            return None;
        }
        self.next_hypothesis_id += 1;
        row.id = self.next_hypothesis_id;
        let id = row.id;
        self.hypotheses.push(row);
        Some(id)
    }

    pub(crate) fn replay_hypothesis(&mut self, row: HypothesisRow) {
        self.next_hypothesis_id = self.next_hypothesis_id.max(row.id);
        self.hypotheses.push(row);
    }

    pub(crate) fn insert_promotion(&mut self, row: PromotionRow) -> bool {
        let dup = self
            .promotions
            .iter()
            .any(|p| p.belief_id == row.belief_id && p.hypothesis_id == row.hypothesis_id);
        if dup {
            return false;
        }
        self.promotions.push(row);
        true
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|_| StoreError::Corrupt("store mutex poisoned".into()))
    }
}

impl CortexStore for MemoryStore {
    fn insert_event(&self, row: EventRow) -> Result<bool, StoreError> {
        Ok(self.lock()?.insert_event(row))
    }

    fn upsert_snapshot(&self, row: EvidenceSnapshotRow) -> Result<SnapshotUpsert, StoreError> {
        Ok(self.lock()?.upsert_snapshot(row))
    }

    fn get_snapshot(&self, evidence_id: &str) -> Result<Option<EvidenceSnapshotRow>, StoreError> {
        Ok(self
            .lock()?
            .snapshots
            .iter()
            .find(|s| s.evidence_id == evidence_id)
            .cloned())
    }

    fn snapshot_count(&self) -> Result<u64, StoreError> {
        Ok(self.lock()?.snapshots.len() as u64)
    }

    fn insert_provenance(&self, row: ProvenanceRow) -> Result<bool, StoreError> {
        Ok(self.lock()?.insert_provenance(row))
    }

    fn upsert_belief(&self, row: BeliefRow) -> Result<(), StoreError> {
        self.lock()?.upsert_belief(row);
        Ok(())
    }

    fn get_belief(&self, belief_id: &str) -> Result<Option<BeliefRow>, StoreError> {
        Ok(self.lock()?.beliefs.get(belief_id).cloned())
    }

    fn append_delta(&self, row: BeliefDelta) -> Result<(), StoreError> {
        self.lock()?.deltas.push(row);
        Ok(())
    }

    fn insert_ai_call_audit(&self, row: AiCallAuditRow) -> Result<i64, StoreError> {
        Ok(self.lock()?.insert_ai_call_audit(row))
    }

    fn ai_call_count(&self) -> Result<u64, StoreError> {
        Ok(self.lock()?.ai_calls.len() as u64)
    }

    fn recent_ai_calls(&self, limit: usize) -> Result<Vec<AiCallAuditRow>, StoreError> {
        let inner = self.lock()?;
        Ok(inner.ai_calls.iter().rev().take(limit).cloned().collect())
    }

    fn insert_hypothesis(&self, row: HypothesisRow) -> Result<Option<i64>, StoreError> {
        Ok(self.lock()?.insert_hypothesis(row))
    }

    fn latest_hypothesis(
        &self,
        trace_id: &str,
        belief_id: &str,
    ) -> Result<Option<HypothesisRow>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .hypotheses
            .iter()
            .filter(|h| h.trace_id == trace_id && h.belief_id == belief_id)
            .max_by_key(|h| h.id)
            .cloned())
    }

    fn insert_promotion(&self, row: PromotionRow) -> Result<bool, StoreError> {
        Ok(self.lock()?.insert_promotion(row))
    }

    fn append_explanation(&self, row: ExplanationRow) -> Result<(), StoreError> {
        self.lock()?.explanations.push(row);
        Ok(())
    }

    fn append_audit_log(&self, row: AuditLogRow) -> Result<(), StoreError> {
        self.lock()?.audit_log.push(row);
        Ok(())
    }

    fn audit_trail(&self, trace_id: &str) -> Result<Vec<AuditLogRow>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .audit_log
            .iter()
            .filter(|a| a.trace_id == trace_id)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn snap(evidence_id: &str, trace_id: &str, sha: &str) -> EvidenceSnapshotRow {
        EvidenceSnapshotRow {
            evidence_id: evidence_id.into(),
            trace_id: trace_id.into(),
            sha256: sha.into(),
            created_at: "2026-01-01T00:00:00Z".into(),
            payload: json!({"k": 1}),
        }
    }

    #[test]
    fn snapshot_dedups_by_sha256_and_updates_trace() {
        let store = MemoryStore::new();
        let first = store.upsert_snapshot(snap("evd_a", "trc_1", "aa")).unwrap();
        assert!(first.inserted);

        let second = store.upsert_snapshot(snap("evd_b", "trc_2", "aa")).unwrap();
        assert!(!second.inserted);
        assert_eq!(second.evidence_id, "evd_a");
        assert_eq!(store.snapshot_count().unwrap(), 1);

        let row = store.get_snapshot("evd_a").unwrap().unwrap();
        assert_eq!(row.trace_id, "trc_2");
    }

    #[test]
    fn hypothesis_dedups_on_audit_id_and_text() {
        let store = MemoryStore::new();
        let row = HypothesisRow {
            id: 0,
            trace_id: "trc_1".into(),
            belief_id: "blf_1".into(),
            ai_call_audit_id: 7,
            hypothesis: "X".into(),
            confidence: Some(0.9),
            evidence_ids: vec![],
            payload: json!({}),
            created_at: "2026-01-01T00:00:00Z".into(),
        };
        assert!(store.insert_hypothesis(row.clone()).unwrap().is_some());
        assert!(store.insert_hypothesis(row).unwrap().is_none());
    }

    #[test]
    fn promotion_is_idempotent_on_belief_and_hypothesis() {
        let store = MemoryStore::new();
        let row = PromotionRow {
            trace_id: "trc_1".into(),
            belief_id: "blf_1".into(),
            hypothesis_id: 1,
            ai_call_audit_id: 7,
            decision: vox_domain::PromotionDecision::Promote,
            decision_reason: "confidence>=0.85".into(),
            promoted_confidence: 0.9,
            evidence_ids: vec![],
            created_at: "2026-01-01T00:00:00Z".into(),
        };
        assert!(store.insert_promotion(row.clone()).unwrap());
        assert!(!store.insert_promotion(row).unwrap());
    }

    #[test]
    fn ai_call_ids_are_sequential() {
        let store = MemoryStore::new();
        let row = AiCallAuditRow {
            id: 0,
            trace_id: "trc_1".into(),
            phase: "phase1_explain".into(),
            model_name: "m".into(),
            prompt_hash: "h".into(),
            prompt_preview: "p".into(),
            raw_output: "o".into(),
            parsed_json: None,
            policy_status: vox_domain::PolicyStatus::Rejected,
            policy_error: Some("x".into()),
            created_at: "2026-01-01T00:00:00Z".into(),
        };
        assert_eq!(store.insert_ai_call_audit(row.clone()).unwrap(), 1);
        assert_eq!(store.insert_ai_call_audit(row).unwrap(), 2);
        assert_eq!(store.ai_call_count().unwrap(), 2);
    }
}
