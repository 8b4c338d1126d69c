//! Opaque prefixed identifiers.
//!
//! `new_id("trc")` -> "trc_8f0c2a..." (prefix + 128 random bits as 32 hex chars,
//! no separators). Prefixes in use: trc (trace), evt (event), evd (evidence),
//! blf (belief).

use uuid::Uuid;

pub fn new_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().simple())
}
