//! vox_evidence
//!
//! Content-addressed evidence snapshots with signed provenance.
//! - Deterministic hash over canonical JSON (replay-immune, sha256 unique)
//! - Duplicate payloads collapse to the existing evidence row
//! - Provenance signature binds evidence_id to its hash and the actor;
//!   HMAC when a signing key is configured, plain digest for local/dev

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use vox_common::ids::new_id;
use vox_common::sign::{sign_provenance, SignError};
use vox_common::{canonical_value, sha256_canonical_json, CanonError};
use vox_domain::{EvidenceSnapshotRow, ProvenanceRow};
use vox_store::{CortexStore, StoreError};

#[derive(Debug, Error)]
pub enum EvidenceError {
    #[error("canonical json error: {0}")]
    Canon(#[from] CanonError),
    #[error("signing error: {0}")]
    Sign(#[from] SignError),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// What `snapshot` hands back to the caller. `deduplicated` is true when the
/// payload hashed to an existing row.
#[derive(Debug, Clone)]
pub struct SnapshotReceipt {
    pub evidence_id: String,
    pub sha256: String,
    pub signature: String,
    pub sig_mode: String,
    pub deduplicated: bool,
}

/// Snapshot a payload: canonicalize, hash, upsert by sha256, sign provenance.
/// Re-running with the same payload returns the same evidence_id and
/// signature; only the stored trace_id moves to the latest caller.
pub fn snapshot<T: Serialize>(
    store: &dyn CortexStore,
    trace_id: &str,
    actor: &str,
    signing_key_b64: Option<&str>,
    payload: &T,
) -> Result<SnapshotReceipt, EvidenceError> {
    let canonical = canonical_value(payload)?;
    let sha256 = sha256_canonical_json(&canonical)?;
    let created_at = Utc::now().to_rfc3339();

    let outcome = store.upsert_snapshot(EvidenceSnapshotRow {
        evidence_id: new_id("evd"),
        trace_id: trace_id.to_string(),
        sha256: sha256.clone(),
        created_at: created_at.clone(),
        payload: canonical,
    })?;

    let material = format!("{}:{}", outcome.evidence_id, sha256);
    let (signature, mode) = sign_provenance(signing_key_b64, material.as_bytes())?;

    store.insert_provenance(ProvenanceRow {
        evidence_id: outcome.evidence_id.clone(),
        trace_id: trace_id.to_string(),
        sha256: sha256.clone(),
        actor: actor.to_string(),
        signature: signature.clone(),
        sig_mode: mode.as_str().to_string(),
        created_at,
    })?;

    Ok(SnapshotReceipt {
        evidence_id: outcome.evidence_id,
        sha256,
        signature,
        sig_mode: mode.as_str().to_string(),
        deduplicated: !outcome.inserted,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use vox_store::MemoryStore;

    #[test]
    fn same_payload_under_any_trace_yields_one_row() {
        let store = MemoryStore::new();
        let payload = json!({"service": "api-gateway", "message": "Latency spike"});

        let a = snapshot(&store, "trc_1", "phase0_worker", None, &payload).unwrap();
        let b = snapshot(&store, "trc_2", "phase0_worker", None, &payload).unwrap();

        assert_eq!(a.evidence_id, b.evidence_id);
        assert_eq!(a.sha256, b.sha256);
        assert_eq!(a.signature, b.signature);
        assert!(!a.deduplicated);
        assert!(b.deduplicated);
        assert_eq!(store.snapshot_count().unwrap(), 1);

        // last-writer-wins on trace_id
        let row = store.get_snapshot(&a.evidence_id).unwrap().unwrap();
        assert_eq!(row.trace_id, "trc_2");
    }

    #[test]
    fn key_order_does_not_change_the_address() {
        let store = MemoryStore::new();
        let a = snapshot(&store, "trc_1", "w", None, &json!({"a": 1, "b": 2})).unwrap();
        let b = snapshot(&store, "trc_1", "w", None, &json!({"b": 2, "a": 1})).unwrap();
        assert_eq!(a.sha256, b.sha256);
        assert_eq!(store.snapshot_count().unwrap(), 1);
    }

    #[test]
    fn sha256_covers_the_stored_canonical_payload() {
        let store = MemoryStore::new();
        let r = snapshot(&store, "trc_1", "w", None, &json!({"z": 1, "a": [2, 3]})).unwrap();
        let row = store.get_snapshot(&r.evidence_id).unwrap().unwrap();
        assert_eq!(sha256_canonical_json(&row.payload).unwrap(), row.sha256);
    }

    #[test]
    fn signature_mode_follows_key_configuration() {
        let store = MemoryStore::new();
        let keyless = snapshot(&store, "trc_1", "w", None, &json!({"k": 1})).unwrap();
        assert_eq!(keyless.sig_mode, "sha256");

        let store2 = MemoryStore::new();
        let key = "ZGV2LWluc2VjdXJlLWtleQ=="; // base64 of a dev key
        let keyed = snapshot(&store2, "trc_1", "w", Some(key), &json!({"k": 1})).unwrap();
        assert_eq!(keyed.sig_mode, "hmac");
        assert_ne!(keyed.signature, keyless.signature);
    }
}
