use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use vox_domain::{
    AiCallAuditRow, AuditLogRow, BeliefDelta, BeliefRow, EventRow, EvidenceSnapshotRow,
    ExplanationRow, HypothesisRow, PromotionRow, ProvenanceRow,
};

use crate::memory::MemoryStore;
use crate::{CortexStore, SnapshotUpsert, StoreError};

/// One line per applied mutation, tagged with its table. Replaying the file
/// through the same idempotent apply paths reconstructs the full state, with
/// auto ids preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "table", content = "row", rename_all = "snake_case")]
enum StateRecord {
    Events(EventRow),
    EvidenceSnapshots(EvidenceSnapshotRow),
    EvidenceProvenance(ProvenanceRow),
    Beliefs(BeliefRow),
    BeliefDeltas(BeliefDelta),
    AiCallAudit(AiCallAuditRow),
    Hypotheses(HypothesisRow),
    BeliefPromotions(PromotionRow),
    Explanations(ExplanationRow),
    AuditLog(AuditLogRow),
}

/// Durable store: append-only JSONL write-ahead log under a state dir.
/// Upserts append the row as applied (resolved id, surviving trace_id), so
/// replay converges to the same state; conflicting inserts are not written.
pub struct JsonlStore {
    mem: MemoryStore,
    file: Mutex<File>,
    path: PathBuf,
}

impl JsonlStore {
    pub fn open(state_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = state_dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let path = dir.join("state.jsonl");

        let mem = MemoryStore::new();
        if path.exists() {
            let f = File::open(&path)?;
            let reader = BufReader::new(f);
            for (idx, line) in reader.lines().enumerate() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                let rec: StateRecord = serde_json::from_str(&line).map_err(|e| {
                    StoreError::Corrupt(format!("state.jsonl line {}: {}", idx + 1, e))
                })?;
                Self::replay(&mem, rec)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            mem,
            file: Mutex::new(file),
            path,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn replay(mem: &MemoryStore, rec: StateRecord) -> Result<(), StoreError> {
        let mut inner = mem.lock()?;
        match rec {
            StateRecord::Events(row) => {
                inner.insert_event(row);
            }
            StateRecord::EvidenceSnapshots(row) => {
                inner.upsert_snapshot(row);
            }
            StateRecord::EvidenceProvenance(row) => {
                inner.insert_provenance(row);
            }
            StateRecord::Beliefs(row) => inner.upsert_belief(row),
            StateRecord::BeliefDeltas(row) => inner.deltas.push(row),
            StateRecord::AiCallAudit(row) => inner.replay_ai_call_audit(row),
            StateRecord::Hypotheses(row) => inner.replay_hypothesis(row),
            StateRecord::BeliefPromotions(row) => {
                inner.insert_promotion(row);
            }
            StateRecord::Explanations(row) => inner.explanations.push(row),
            StateRecord::AuditLog(row) => inner.audit_log.push(row),
        }
        Ok(())
    }

    fn append(&self, rec: &StateRecord) -> Result<(), StoreError> {
        let line = serde_json::to_string(rec)?;
        let mut f = self
            .file
            .lock()
            .map_err(|_| StoreError::Corrupt("state file mutex poisoned".into()))?;
        f.write_all(line.as_bytes())?;
        f.write_all(b"\n")?;
        f.flush()?;
        Ok(())
    }
}

impl CortexStore for JsonlStore {
    fn insert_event(&self, row: EventRow) -> Result<bool, StoreError> {
        let inserted = self.mem.insert_event(row.clone())?;
        if inserted {
            self.append(&StateRecord::Events(row))?;
        }
        Ok(inserted)
    }

    fn upsert_snapshot(&self, row: EvidenceSnapshotRow) -> Result<SnapshotUpsert, StoreError> {
        let outcome = self.mem.upsert_snapshot(row.clone())?;
        // Log the row as applied so replay hits the same dedup path.
        let mut applied = row;
        applied.evidence_id = outcome.evidence_id.clone();
        self.append(&StateRecord::EvidenceSnapshots(applied))?;
        Ok(outcome)
    }

    fn get_snapshot(&self, evidence_id: &str) -> Result<Option<EvidenceSnapshotRow>, StoreError> {
        self.mem.get_snapshot(evidence_id)
    }

    fn snapshot_count(&self) -> Result<u64, StoreError> {
        self.mem.snapshot_count()
    }

    fn insert_provenance(&self, row: ProvenanceRow) -> Result<bool, StoreError> {
        let inserted = self.mem.insert_provenance(row.clone())?;
        if inserted {
            self.append(&StateRecord::EvidenceProvenance(row))?;
        }
        Ok(inserted)
    }

    fn upsert_belief(&self, row: BeliefRow) -> Result<(), StoreError> {
        self.mem.upsert_belief(row.clone())?;
        self.append(&StateRecord::Beliefs(row))
    }

    fn get_belief(&self, belief_id: &str) -> Result<Option<BeliefRow>, StoreError> {
        self.mem.get_belief(belief_id)
    }

    fn append_delta(&self, row: BeliefDelta) -> Result<(), StoreError> {
        self.mem.append_delta(row.clone())?;
        self.append(&StateRecord::BeliefDeltas(row))
    }

    fn insert_ai_call_audit(&self, row: AiCallAuditRow) -> Result<i64, StoreError> {
        let id = self.mem.insert_ai_call_audit(row.clone())?;
        let mut applied = row;
        applied.id = id;
        self.append(&StateRecord::AiCallAudit(applied))?;
        Ok(id)
    }

    fn ai_call_count(&self) -> Result<u64, StoreError> {
        self.mem.ai_call_count()
    }

    fn recent_ai_calls(&self, limit: usize) -> Result<Vec<AiCallAuditRow>, StoreError> {
        self.mem.recent_ai_calls(limit)
    }

    fn insert_hypothesis(&self, row: HypothesisRow) -> Result<Option<i64>, StoreError> {
        match self.mem.insert_hypothesis(row.clone())? {
            Some(id) => {
                let mut applied = row;
                applied.id = id;
                self.append(&StateRecord::Hypotheses(applied))?;
                Ok(Some(id))
            }
            None => Ok(None),
        }
    }

    fn latest_hypothesis(
        &self,
        trace_id: &str,
        belief_id: &str,
    ) -> Result<Option<HypothesisRow>, StoreError> {
        self.mem.latest_hypothesis(trace_id, belief_id)
    }

    fn insert_promotion(&self, row: PromotionRow) -> Result<bool, StoreError> {
        let inserted = self.mem.insert_promotion(row.clone())?;
        if inserted {
            self.append(&StateRecord::BeliefPromotions(row))?;
        }
        Ok(inserted)
    }

    fn append_explanation(&self, row: ExplanationRow) -> Result<(), StoreError> {
        self.mem.append_explanation(row.clone())?;
        self.append(&StateRecord::Explanations(row))
    }

    fn append_audit_log(&self, row: AuditLogRow) -> Result<(), StoreError> {
        self.mem.append_audit_log(row.clone())?;
        self.append(&StateRecord::AuditLog(row))
    }

    fn audit_trail(&self, trace_id: &str) -> Result<Vec<AuditLogRow>, StoreError> {
        self.mem.audit_trail(trace_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

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
    fn state_survives_reopen_with_ids_and_dedup_intact() {
        let td = TempDir::new().unwrap();

        {
            let store = JsonlStore::open(td.path()).unwrap();
            store.upsert_snapshot(snap("evd_a", "trc_1", "aa")).unwrap();
            store.upsert_snapshot(snap("evd_b", "trc_2", "aa")).unwrap();

            let audit = AiCallAuditRow {
                id: 0,
                trace_id: "trc_1".into(),
                phase: "phase1_explain".into(),
                model_name: "m".into(),
                prompt_hash: "h".into(),
                prompt_preview: "p".into(),
                raw_output: "o".into(),
                parsed_json: None,
                policy_status: vox_domain::PolicyStatus::Accepted,
                policy_error: None,
                created_at: "2026-01-01T00:00:00Z".into(),
            };
            assert_eq!(store.insert_ai_call_audit(audit).unwrap(), 1);
        }

        let reopened = JsonlStore::open(td.path()).unwrap();
        assert_eq!(reopened.snapshot_count().unwrap(), 1);
        let row = reopened.get_snapshot("evd_a").unwrap().unwrap();
        assert_eq!(row.trace_id, "trc_2");

        // Auto ids continue after replay.
        let audit = AiCallAuditRow {
            id: 0,
            trace_id: "trc_2".into(),
            phase: "phase1_explain".into(),
            model_name: "m".into(),
            prompt_hash: "h".into(),
            prompt_preview: "p".into(),
            raw_output: "o".into(),
            parsed_json: None,
            policy_status: vox_domain::PolicyStatus::Rejected,
            policy_error: Some("timeout".into()),
            created_at: "2026-01-01T00:00:01Z".into(),
        };
        assert_eq!(reopened.insert_ai_call_audit(audit).unwrap(), 2);
    }

    #[test]
    fn conflicting_inserts_are_not_duplicated_across_reopen() {
        let td = TempDir::new().unwrap();
        let row = PromotionRow {
            trace_id: "trc_1".into(),
            belief_id: "blf_1".into(),
            hypothesis_id: 1,
            ai_call_audit_id: 1,
            decision: vox_domain::PromotionDecision::Hold,
            decision_reason: "0.60<=confidence<0.85".into(),
            promoted_confidence: 0.7,
            evidence_ids: vec!["evt_1".into()],
            created_at: "2026-01-01T00:00:00Z".into(),
        };

        {
            let store = JsonlStore::open(td.path()).unwrap();
            assert!(store.insert_promotion(row.clone()).unwrap());
            assert!(!store.insert_promotion(row.clone()).unwrap());
        }

        let reopened = JsonlStore::open(td.path()).unwrap();
        assert!(!reopened.insert_promotion(row).unwrap());
    }
}
