//! vox_store
//!
//! The persistence seam of the pipeline. `CortexStore` is the interface the
//! core consumes from the relational store; every method encodes one table's
//! idempotence contract:
//!
//! - events: PK event_id, duplicate insert is a no-op
//! - evidence_snapshots: unique sha256, conflict updates trace_id and
//!   returns the existing evidence_id
//! - evidence_provenance: idempotent on (evidence_id, sha256, actor)
//! - beliefs: upsert by belief_id
//! - belief_deltas, explanations, audit_log: append-only
//! - ai_call_audit: append-only, store-assigned auto id
//! - hypotheses: unique (ai_call_audit_id, hypothesis), conflict skipped
//! - belief_promotions: unique (belief_id, hypothesis_id), conflict no-op
//!
//! Two implementations ship here: `MemoryStore` (ephemeral) and `JsonlStore`
//! (append-only write-ahead log under a state dir, replayed on open through
//! the same idempotent apply paths). Rows are never deleted.

use thiserror::Error;
use vox_domain::{
    AiCallAuditRow, AuditLogRow, BeliefDelta, BeliefRow, EventRow, EvidenceSnapshotRow,
    ExplanationRow, HypothesisRow, PromotionRow, ProvenanceRow,
};

mod jsonl;
mod memory;

pub use jsonl::JsonlStore;
pub use memory::MemoryStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store corruption: {0}")]
    Corrupt(String),
}

/// Outcome of an upsert-by-sha256. `evidence_id` is the surviving id,
/// whether or not this call inserted the row.
#[derive(Debug, Clone)]
pub struct SnapshotUpsert {
    pub evidence_id: String,
    pub inserted: bool,
}

pub trait CortexStore: Send + Sync {
    /// Insert an event row; returns false when event_id already exists.
    fn insert_event(&self, row: EventRow) -> Result<bool, StoreError>;

    /// Insert-or-dedup a snapshot by sha256. On conflict the stored row's
    /// trace_id is updated to the incoming one (last-writer-wins) and the
    /// existing evidence_id is returned; `row.evidence_id` is used only when
    /// this call actually inserts.
    fn upsert_snapshot(&self, row: EvidenceSnapshotRow) -> Result<SnapshotUpsert, StoreError>;

    fn get_snapshot(&self, evidence_id: &str) -> Result<Option<EvidenceSnapshotRow>, StoreError>;

    fn snapshot_count(&self) -> Result<u64, StoreError>;

    /// Append provenance; returns false when (evidence_id, sha256, actor)
    /// was already recorded.
    fn insert_provenance(&self, row: ProvenanceRow) -> Result<bool, StoreError>;

    fn upsert_belief(&self, row: BeliefRow) -> Result<(), StoreError>;

    fn get_belief(&self, belief_id: &str) -> Result<Option<BeliefRow>, StoreError>;

    fn append_delta(&self, row: BeliefDelta) -> Result<(), StoreError>;

    /// Append an AI call audit row. The store assigns `row.id`; the assigned
    /// id is returned.
    fn insert_ai_call_audit(&self, row: AiCallAuditRow) -> Result<i64, StoreError>;

    fn ai_call_count(&self) -> Result<u64, StoreError>;

    /// Most recent AI call audit rows, newest first.
    fn recent_ai_calls(&self, limit: usize) -> Result<Vec<AiCallAuditRow>, StoreError>;

    /// Insert a hypothesis; `row.id` is store-assigned. Returns None when
    /// (ai_call_audit_id, hypothesis) already exists.
    fn insert_hypothesis(&self, row: HypothesisRow) -> Result<Option<i64>, StoreError>;

    /// Most recent hypothesis for (trace_id, belief_id), if any.
    fn latest_hypothesis(
        &self,
        trace_id: &str,
        belief_id: &str,
    ) -> Result<Option<HypothesisRow>, StoreError>;

    /// Insert a promotion decision; returns false when
    /// (belief_id, hypothesis_id) already exists.
    fn insert_promotion(&self, row: PromotionRow) -> Result<bool, StoreError>;

    fn append_explanation(&self, row: ExplanationRow) -> Result<(), StoreError>;

    fn append_audit_log(&self, row: AuditLogRow) -> Result<(), StoreError>;

    /// Full audit trail for a trace, in append order.
    fn audit_trail(&self, trace_id: &str) -> Result<Vec<AuditLogRow>, StoreError>;
}
