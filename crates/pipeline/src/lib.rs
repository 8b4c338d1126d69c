//! vox_pipeline
//!
//! The single-event workflow tying the components together under one trace:
//! snapshot evidence, update belief, append delta, consult the reasoner,
//! record the explanation, compute the promotion, close the trace step in the
//! audit log. This crate is the only writer that combines those tables; the
//! components return values and do not persist across their own boundary.

use chrono::Utc;
use serde_json::json;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use vox_audit::{append_audit_log, AuditError};
use vox_common::ids::new_id;
use vox_common::CanonError;
use vox_domain::{
    BeliefRow, CanonicalEvent, EventRow, EvidenceKind, EvidenceRef, ExplanationRow, IngestAck,
    IngestEvent, PromotionRow, ValidatedExplanation,
};
use vox_evidence::EvidenceError;
use vox_reasoner::{
    explain, promote_latest, GeminiProvider, ProviderError, ReasonerError, ReasonerProvider,
    StubProvider,
};
use vox_store::{CortexStore, StoreError};
use vox_voiceio::{TtsClient, TtsError};

mod config;
mod normalizer;

pub use config::{Settings, DEFAULT_REASONER_MODEL, LLM_TIMEOUT, TTS_TIMEOUT};
pub use normalizer::normalize;

pub const ACTOR_WORKER: &str = "phase0_worker";
pub const ACTOR_INGEST: &str = "signalmesh";

/// Baseline prior before any signal is applied.
pub const PRIOR: f64 = 0.35;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("canonical json error: {0}")]
    Canon(#[from] CanonError),
    #[error("evidence error: {0}")]
    Evidence(#[from] EvidenceError),
    #[error("reasoner error: {0}")]
    Reasoner(#[from] ReasonerError),
    #[error("audit error: {0}")]
    Audit(#[from] AuditError),
    #[error("provider construction error: {0}")]
    Provider(#[from] ProviderError),
    #[error("tts construction error: {0}")]
    Tts(#[from] TtsError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Explicit dependencies, constructed once at process start. No ambient
/// singletons: everything a worker touches arrives through here.
pub struct Deps {
    pub store: Arc<dyn CortexStore>,
    pub provider: Arc<dyn ReasonerProvider>,
    pub tts: TtsClient,
    pub signing_key_b64: Option<String>,
}

impl Deps {
    /// Wire providers from settings: Gemini when a key is configured, the
    /// deterministic stub otherwise.
    pub fn from_settings(
        settings: &Settings,
        store: Arc<dyn CortexStore>,
    ) -> Result<Self, PipelineError> {
        let provider: Arc<dyn ReasonerProvider> = match &settings.gemini_api_key {
            Some(key) => Arc::new(GeminiProvider::new(
                key.clone(),
                settings.reasoner_model.clone(),
                LLM_TIMEOUT,
            )?),
            None => Arc::new(StubProvider),
        };
        let tts = TtsClient::new(
            settings.elevenlabs_api_key.clone(),
            settings.elevenlabs_voice_id.clone(),
            TTS_TIMEOUT,
        )?;
        Ok(Deps {
            store,
            provider,
            tts,
            signing_key_b64: settings.evidence_signing_key_b64.clone(),
        })
    }

    /// Stub-provider deps over an arbitrary store, for offline use.
    pub fn stubbed(store: Arc<dyn CortexStore>) -> Result<Self, PipelineError> {
        Ok(Deps {
            store,
            provider: Arc::new(StubProvider),
            tts: TtsClient::new(None, None, Duration::from_secs(1))?,
            signing_key_b64: None,
        })
    }
}

/// What one pipeline run produced, for callers that want to print or assert.
#[derive(Debug)]
pub struct PipelineOutcome {
    pub trace_id: String,
    pub event_id: String,
    pub belief_id: String,
    pub evidence_id: String,
    pub sha256: String,
    pub signature: String,
    pub confidence: f64,
    pub explanation: ValidatedExplanation,
    pub promotion: Option<PromotionRow>,
    pub audio_bytes_len: u64,
}

fn signal_strength(severity: Option<&str>) -> f64 {
    match severity {
        Some("high") | Some("critical") => 0.7,
        _ => 0.4,
    }
}

/// Accept an ingest body, normalize it, and persist the event under a trace.
/// The caller decides whether to run the worker on the canonical event next.
pub fn ingest_event(
    deps: &Deps,
    ingest: &IngestEvent,
    trace_id: Option<String>,
) -> Result<(IngestAck, CanonicalEvent), PipelineError> {
    let trace_id = trace_id
        .filter(|t| !t.trim().is_empty())
        .unwrap_or_else(|| new_id("trc"));
    let canonical = normalize(ingest, &trace_id);
    tracing::info!(trace_id = %trace_id, event_id = %canonical.event_id, "ingested event");

    deps.store.insert_event(EventRow {
        event_id: canonical.event_id.clone(),
        trace_id: trace_id.clone(),
        source: canonical.source.clone(),
        event_type: canonical.event_type.clone(),
        occurred_at: canonical.occurred_at.clone(),
        severity: canonical.severity.clone(),
        raw_payload: serde_json::to_value(ingest)?,
        normalized_payload: serde_json::to_value(&canonical.normalized)?,
        created_at: Utc::now().to_rfc3339(),
    })?;

    append_audit_log(
        deps.store.as_ref(),
        &trace_id,
        ACTOR_INGEST,
        "ingest",
        json!({"event_id": canonical.event_id}),
    )?;

    let ack = IngestAck {
        ok: true,
        trace_id,
        event_id: canonical.event_id.clone(),
    };
    Ok((ack, canonical))
}

/// Run the full reasoning workflow for one canonical event.
pub async fn handle_canonical_event(
    deps: &Deps,
    event: &CanonicalEvent,
) -> Result<PipelineOutcome, PipelineError> {
    let trace_id = &event.trace_id;
    tracing::info!(trace_id = %trace_id, event_id = %event.event_id, "pipeline start");

    let service = if event.normalized.service.is_empty() {
        "unknown"
    } else {
        event.normalized.service.as_str()
    };
    let subject = format!("service/{service}");
    let hypothesis = format!("Potential incident affecting {subject}");
    let signal = signal_strength(event.severity.as_deref());

    // 1. Evidence snapshot + provenance. The payload is the identity-free
    //    projection of the event so byte-identical incidents collapse to one
    //    content-addressed row no matter which trace carried them.
    let snap_payload = json!({
        "source": event.source,
        "event_type": event.event_type,
        "occurred_at": event.occurred_at,
        "severity": event.severity,
        "normalized": event.normalized,
    });
    let receipt = vox_evidence::snapshot(
        deps.store.as_ref(),
        trace_id,
        ACTOR_WORKER,
        deps.signing_key_b64.as_deref(),
        &snap_payload,
    )?;

    // 2. Deterministic belief update, persisted here for atomicity with the
    //    rest of the event's writes.
    let (belief, delta) = vox_beliefcore::deterministic_update(
        &subject,
        trace_id,
        &hypothesis,
        PRIOR,
        signal,
        &event.event_id,
    );
    deps.store.upsert_belief(BeliefRow::from(&belief))?;
    deps.store.append_delta(delta)?;

    // 3. Policy-gated explanation.
    let evidence_refs = evidence_refs_for(&event.event_id, &receipt);
    let explanation = explain(
        deps.store.as_ref(),
        deps.provider.as_ref(),
        trace_id,
        &belief,
        &evidence_refs,
    )
    .await?;

    // 4. Voice render, best-effort.
    let audio_bytes_len = match deps
        .tts
        .synthesize(&explanation.explanation, belief.confidence)
        .await
    {
        Ok(audio) => audio.len() as u64,
        Err(e) => {
            tracing::warn!(trace_id = %trace_id, error = %e, "tts render failed; continuing");
            0
        }
    };

    deps.store.append_explanation(ExplanationRow {
        trace_id: trace_id.clone(),
        belief_id: belief.belief_id.clone(),
        explanation_json: explanation.payload.clone(),
        audio_bytes_len,
        created_at: Utc::now().to_rfc3339(),
    })?;

    // 5. Promotion from the latest stored hypothesis, if any survived the gate.
    let promotion = promote_latest(deps.store.as_ref(), trace_id, &belief.belief_id)?;

    // 6. Close the trace step.
    append_audit_log(
        deps.store.as_ref(),
        trace_id,
        ACTOR_WORKER,
        "belief+evidence+explain",
        json!({
            "event_id": event.event_id,
            "belief_id": belief.belief_id,
            "snapshot_id": receipt.evidence_id,
            "signature": receipt.signature,
        }),
    )?;

    tracing::info!(trace_id = %trace_id, belief_id = %belief.belief_id, "pipeline complete");
    Ok(PipelineOutcome {
        trace_id: trace_id.clone(),
        event_id: event.event_id.clone(),
        belief_id: belief.belief_id,
        evidence_id: receipt.evidence_id,
        sha256: receipt.sha256,
        signature: receipt.signature,
        confidence: belief.confidence,
        explanation,
        promotion,
        audio_bytes_len,
    })
}

fn evidence_refs_for(event_id: &str, receipt: &vox_evidence::SnapshotReceipt) -> Vec<EvidenceRef> {
    let mut event_pointer = BTreeMap::new();
    event_pointer.insert("event_id".to_string(), event_id.to_string());
    let mut snap_pointer = BTreeMap::new();
    snap_pointer.insert("sha256".to_string(), receipt.sha256.clone());

    vec![
        EvidenceRef {
            evidence_id: event_id.to_string(),
            kind: EvidenceKind::Event,
            pointer: event_pointer,
        },
        EvidenceRef {
            evidence_id: receipt.evidence_id.clone(),
            kind: EvidenceKind::Snapshot,
            pointer: snap_pointer,
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use vox_domain::PromotionDecision;
    use vox_reasoner::{ProviderResponse, ReasonerProvider};
    use vox_store::MemoryStore;

    fn ingest_body(severity: &str) -> IngestEvent {
        IngestEvent {
            source: "datadog".into(),
            event_type: "alert".into(),
            occurred_at: "2026-07-01T13:31:00Z".into(),
            severity: Some(severity.into()),
            payload: serde_json::from_value(json!({
                "service": "api-gateway",
                "region": "eu-west-2",
                "message": "Latency spike"
            }))
            .unwrap(),
        }
    }

    fn stub_deps() -> (Arc<MemoryStore>, Deps) {
        let store = Arc::new(MemoryStore::new());
        let deps = Deps::stubbed(store.clone()).unwrap();
        (store, deps)
    }

    #[tokio::test]
    async fn high_severity_event_lands_at_0_595() {
        let (store, deps) = stub_deps();
        let (ack, canonical) = ingest_event(&deps, &ingest_body("high"), None).unwrap();
        assert!(ack.ok);
        assert!(ack.trace_id.starts_with("trc_"));

        let out = handle_canonical_event(&deps, &canonical).await.unwrap();
        assert!((out.confidence - 0.595).abs() < 1e-12);
        assert_eq!(store.snapshot_count().unwrap(), 1);
        assert_eq!(store.ai_call_count().unwrap(), 1);

        let belief = store.get_belief(&out.belief_id).unwrap().unwrap();
        assert_eq!(belief.subject, "service/api-gateway");
        assert_eq!(belief.evidence_ids, vec![out.event_id.clone()]);

        let trail = store.audit_trail(&out.trace_id).unwrap();
        let actions: Vec<_> = trail.iter().map(|a| a.action.as_str()).collect();
        assert_eq!(actions, vec!["ingest", "belief+evidence+explain"]);
    }

    #[tokio::test]
    async fn low_severity_event_lands_at_0_49() {
        let (_, deps) = stub_deps();
        let (_, canonical) = ingest_event(&deps, &ingest_body("low"), None).unwrap();
        let out = handle_canonical_event(&deps, &canonical).await.unwrap();
        assert!((out.confidence - 0.49).abs() < 1e-12);
    }

    #[tokio::test]
    async fn identical_payloads_share_one_snapshot() {
        let (store, deps) = stub_deps();
        let (_, c1) = ingest_event(&deps, &ingest_body("high"), None).unwrap();
        let (_, c2) = ingest_event(&deps, &ingest_body("high"), None).unwrap();
        assert_ne!(c1.event_id, c2.event_id);

        let o1 = handle_canonical_event(&deps, &c1).await.unwrap();
        let o2 = handle_canonical_event(&deps, &c2).await.unwrap();
        assert_eq!(o1.evidence_id, o2.evidence_id);
        assert_eq!(o1.sha256, o2.sha256);
        assert_eq!(store.snapshot_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn replaying_one_event_is_safe() {
        let (store, deps) = stub_deps();
        let (_, canonical) = ingest_event(&deps, &ingest_body("high"), None).unwrap();

        let o1 = handle_canonical_event(&deps, &canonical).await.unwrap();
        let o2 = handle_canonical_event(&deps, &canonical).await.unwrap();

        // fresh belief per run, same subject and confidence, same snapshot
        assert_ne!(o1.belief_id, o2.belief_id);
        assert_eq!(o1.confidence, o2.confidence);
        assert_eq!(o1.evidence_id, o2.evidence_id);
        assert_eq!(store.snapshot_count().unwrap(), 1);
        // one audit row per model call
        assert_eq!(store.ai_call_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn explicit_trace_id_is_honored() {
        let (_, deps) = stub_deps();
        let (ack, canonical) =
            ingest_event(&deps, &ingest_body("high"), Some("trc_fixed".into())).unwrap();
        assert_eq!(ack.trace_id, "trc_fixed");
        assert_eq!(canonical.trace_id, "trc_fixed");
    }

    struct HypothesisRich;

    #[async_trait]
    impl ReasonerProvider for HypothesisRich {
        fn model_name(&self) -> &str {
            "canned"
        }
        async fn generate(
            &self,
            _prompt: &str,
        ) -> Result<ProviderResponse, vox_reasoner::ProviderError> {
            let obj = json!({
                "explanation": "saturated connection pool on the gateway",
                "confidence_language": {"tone": "confident"},
                "evidence_ids": ["evt_x"],
                "what_would_change_my_mind": ["a clean canary"],
                "hypotheses": [
                    {"hypothesis": "Connection pool exhaustion", "confidence": 0.9}
                ]
            });
            Ok(ProviderResponse {
                text: Some(obj.to_string()),
                raw_json: obj,
            })
        }
    }

    #[tokio::test]
    async fn accepted_hypotheses_drive_a_promotion() {
        let store = Arc::new(MemoryStore::new());
        let mut deps = Deps::stubbed(store.clone()).unwrap();
        deps.provider = Arc::new(HypothesisRich);

        let (_, canonical) = ingest_event(&deps, &ingest_body("high"), None).unwrap();
        let out = handle_canonical_event(&deps, &canonical).await.unwrap();

        let promo = out.promotion.unwrap();
        assert_eq!(promo.decision, PromotionDecision::Promote);
        assert_eq!(promo.decision_reason, "confidence>=0.85");
        assert_eq!(promo.promoted_confidence, 0.9);

        // replay: promotion stays idempotent, hypotheses dedup per audit row
        let again = handle_canonical_event(&deps, &canonical).await.unwrap();
        assert!(again.promotion.is_some());
    }

    #[tokio::test]
    async fn stub_provider_round_trip_records_explanation() {
        let (store, deps) = stub_deps();
        let (_, canonical) = ingest_event(&deps, &ingest_body("low"), None).unwrap();
        let out = handle_canonical_event(&deps, &canonical).await.unwrap();

        assert!(out.explanation.explanation.starts_with("STUB:"));
        assert!(out.promotion.is_none());
        assert!(out.audio_bytes_len > 0); // stub TTS bytes

        let rows = store.recent_ai_calls(1).unwrap();
        assert_eq!(rows[0].policy_status, vox_domain::PolicyStatus::Accepted);
    }
}
