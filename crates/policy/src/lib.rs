//! vox_policy
//!
//! The trust boundary between untrusted model text and the rest of the
//! pipeline. `PolicyGate::validate` turns raw output into a
//! `ValidatedExplanation` or a single typed rejection:
//! - must contain a JSON object (code fences and surrounding prose tolerated)
//! - must include the four required keys with the right types
//! - must not contain action/tool/data-store language anywhere in the raw
//!   text, inside or outside the JSON
//!
//! The gate never returns a partial object.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;
use thiserror::Error;
use vox_domain::ValidatedExplanation;

#[derive(Debug, Error)]
#[error("policy violation: {0}")]
pub struct PolicyViolation(pub String);

const REQUIRED_KEYS: [&str; 4] = [
    "explanation",
    "confidence_language",
    "evidence_ids",
    "what_would_change_my_mind",
];

// Cheap but effective guardrails. Each group is a word-boundary alternation
// matched against the lowercased raw text.
const DISALLOWED_PATTERNS: [&str; 5] = [
    r"\b(run|execute|delete|drop|insert|update|commit)\b",
    r"\b(psql|sql|database|db|postgres|pg_)\b",
    r"\b(curl|wget|pip install|apt-get)\b",
    r"\b(call tool|use tool|invoke)\b",
    r"\b(write to|save to)\b",
];

fn disallowed() -> &'static [Regex] {
    static COMPILED: OnceLock<Vec<Regex>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        DISALLOWED_PATTERNS
            .iter()
            .map(|p| Regex::new(p).expect("static pattern"))
            .collect()
    })
}

pub struct PolicyGate;

impl PolicyGate {
    /// Validate raw model output. Ok carries the full validated object;
    /// Err carries a human-readable reason.
    pub fn validate(raw_text: &str) -> Result<ValidatedExplanation, PolicyViolation> {
        if raw_text.trim().is_empty() {
            return Err(PolicyViolation("empty model output".into()));
        }

        // The scan covers the entire original output, not only the JSON, so
        // commentary around the object cannot smuggle instructions. It runs
        // first so a content hit is reported as the matched pattern even when
        // the output is not parseable.
        let low = raw_text.to_lowercase();
        for (re, pat) in disallowed().iter().zip(DISALLOWED_PATTERNS) {
            if re.is_match(&low) {
                return Err(PolicyViolation(format!(
                    "disallowed content detected by pattern: {pat}"
                )));
            }
        }

        let candidate = extract_json_object(raw_text)?;

        let parsed: Value = serde_json::from_str(candidate)
            .map_err(|e| PolicyViolation(format!("output is not valid JSON: {e}")))?;
        let mut obj = match parsed {
            Value::Object(m) => m,
            _ => return Err(PolicyViolation("JSON must be an object".into())),
        };

        for k in REQUIRED_KEYS {
            if !obj.contains_key(k) {
                return Err(PolicyViolation(format!("missing required key: {k}")));
            }
        }

        let explanation = match &obj["explanation"] {
            Value::String(s) => s.clone(),
            _ => return Err(PolicyViolation("explanation must be a string".into())),
        };
        let confidence_language = match &obj["confidence_language"] {
            v @ Value::Object(_) => v.clone(),
            _ => {
                return Err(PolicyViolation(
                    "confidence_language must be an object".into(),
                ))
            }
        };
        let evidence_ids = coerce_string_array(&obj["evidence_ids"], "evidence_ids")?;
        let what_would_change_my_mind = coerce_string_array(
            &obj["what_would_change_my_mind"],
            "what_would_change_my_mind",
        )?;

        // Store the coerced arrays back so the retained payload matches what
        // downstream extraction sees.
        obj.insert(
            "evidence_ids".into(),
            Value::Array(evidence_ids.iter().cloned().map(Value::String).collect()),
        );
        obj.insert(
            "what_would_change_my_mind".into(),
            Value::Array(
                what_would_change_my_mind
                    .iter()
                    .cloned()
                    .map(Value::String)
                    .collect(),
            ),
        );

        Ok(ValidatedExplanation {
            explanation,
            confidence_language,
            evidence_ids,
            what_would_change_my_mind,
            payload: Value::Object(obj),
        })
    }
}

/// Strip leading/trailing code fences (``` or ```json ... ```).
fn strip_code_fences(s: &str) -> &str {
    let s = s.trim();
    let Some(rest) = s.strip_prefix("```") else {
        return s;
    };
    // drop the info string (e.g. "json") up to the first line break
    let rest = match rest.find('\n') {
        Some(i) => &rest[i + 1..],
        None => rest,
    };
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Extract the outermost {...} substring, tolerant of prose around it.
fn extract_json_object(raw: &str) -> Result<&str, PolicyViolation> {
    let s = strip_code_fences(raw);
    if s.starts_with('{') && s.ends_with('}') {
        return Ok(s);
    }
    let start = s.find('{');
    let end = s.rfind('}');
    match (start, end) {
        (Some(a), Some(b)) if b > a => Ok(&s[a..=b]),
        _ => Err(PolicyViolation(
            "output does not contain a JSON object".into(),
        )),
    }
}

fn coerce_string_array(v: &Value, key: &str) -> Result<Vec<String>, PolicyViolation> {
    let arr = v
        .as_array()
        .ok_or_else(|| PolicyViolation(format!("{key} must be a list")))?;
    Ok(arr
        .iter()
        .map(|x| match x {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
        .collect())
}
