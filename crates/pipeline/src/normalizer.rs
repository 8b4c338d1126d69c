//! Deterministic normalization only: schema shaping + safe defaults. No
//! enrichment, no lookups.

use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use vox_common::ids::new_id;
use vox_domain::{CanonicalEvent, IngestEvent, NormalizedPayload};

pub fn normalize(ingest: &IngestEvent, trace_id: &str) -> CanonicalEvent {
    let event_id = new_id("evt");
    let payload = &ingest.payload;

    let normalized = NormalizedPayload {
        raw_keys: payload.keys().cloned().collect(), // BTreeMap keys are sorted
        message: pick_string(payload, &["message", "title"]).unwrap_or_default(),
        service: pick_string(payload, &["service", "app"]).unwrap_or_else(|| "unknown".into()),
        region: pick_string(payload, &["region"]).unwrap_or_else(|| "unknown".into()),
    };

    CanonicalEvent {
        event_id,
        trace_id: trace_id.to_string(),
        source: ingest.source.clone(),
        event_type: ingest.event_type.clone(),
        occurred_at: ingest.occurred_at.clone(),
        severity: ingest.severity.clone(),
        normalized,
    }
}

/// First present, non-null, non-empty value among `keys`, as a string.
fn pick_string(payload: &BTreeMap<String, JsonValue>, keys: &[&str]) -> Option<String> {
    for k in keys {
        match payload.get(*k) {
            Some(JsonValue::String(s)) if !s.is_empty() => return Some(s.clone()),
            Some(JsonValue::Null) | None => continue,
            Some(JsonValue::String(_)) => continue,
            Some(other) => return Some(other.to_string()),
        }
    }
    None
}
