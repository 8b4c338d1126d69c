use clap::{Parser, Subcommand};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use vox_domain::{CanonicalEvent, IngestEvent};
use vox_pipeline::{handle_canonical_event, ingest_event, Deps, PipelineError, Settings};
use vox_reasoner::promote_latest;
use vox_store::{CortexStore, JsonlStore, StoreError};

#[derive(Debug, Error)]
enum CliError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store error: {0}")]
    Store(#[from] StoreError),
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

#[derive(Parser)]
#[command(name = "vox-control", version, about = "VoxCortex control-plane utilities")]
struct Args {
    /// State directory for the durable store. Defaults to VOXCORTEX_STATE_DIR
    /// or runtime/state.
    #[arg(long, global = true)]
    state_dir: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest an event body ({source, event_type, occurred_at, severity?,
    /// payload}) and run the reasoning pipeline on it.
    Ingest {
        /// Path to the ingest JSON file
        #[arg(long)]
        event_json: PathBuf,

        /// Correlate under an existing trace instead of minting one
        /// (the CLI twin of the X-Trace-Id header).
        #[arg(long)]
        trace_id: Option<String>,

        /// Store the event and stop; do not run the worker.
        #[arg(long, default_value_t = false)]
        no_process: bool,
    },

    /// Run the reasoning pipeline on an already-canonical event JSON.
    ProcessEvent {
        #[arg(long)]
        event_json: PathBuf,
    },

    /// Print the ordered audit trail for a trace.
    AuditGet {
        #[arg(long)]
        trace_id: String,
    },

    /// Print one evidence snapshot row.
    EvidenceGet {
        #[arg(long)]
        evidence_id: String,
    },

    /// Recompute the promotion decision for (trace, belief) from the latest
    /// stored hypothesis. Idempotent.
    Promote {
        #[arg(long)]
        trace_id: String,

        #[arg(long)]
        belief_id: String,
    },

    /// Print the most recent AI call audit rows, newest first.
    AiAuditTail {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("ERROR: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), CliError> {
    // Local-only secrets; deployments inject real env.
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let settings = Settings::from_env();

    // Logs go to stderr so stdout stays parseable JSON.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(settings.log_level.clone()))
        .with_writer(std::io::stderr)
        .try_init();

    let state_dir = args.state_dir.unwrap_or_else(|| settings.state_dir.clone());
    let store: Arc<JsonlStore> = Arc::new(JsonlStore::open(&state_dir)?);

    match args.cmd {
        Command::Ingest {
            event_json,
            trace_id,
            no_process,
        } => {
            let deps = Deps::from_settings(&settings, store.clone())?;
            let bytes = fs::read(&event_json)?;
            let evt: IngestEvent = serde_json::from_slice(&bytes)?;

            let (ack, canonical) = ingest_event(&deps, &evt, trace_id)?;
            if no_process {
                println!("{}", serde_json::to_string(&ack)?);
                return Ok(());
            }

            let out = handle_canonical_event(&deps, &canonical).await?;
            println!(
                "{}",
                serde_json::to_string(&json!({
                    "ok": ack.ok,
                    "trace_id": out.trace_id,
                    "event_id": out.event_id,
                    "belief_id": out.belief_id,
                    "evidence_id": out.evidence_id,
                    "sha256": out.sha256,
                    "confidence": out.confidence,
                    "decision": out.promotion.as_ref().map(|p| p.decision.as_str()),
                }))?
            );
            Ok(())
        }

        Command::ProcessEvent { event_json } => {
            let deps = Deps::from_settings(&settings, store.clone())?;
            let bytes = fs::read(&event_json)?;
            let event: CanonicalEvent = serde_json::from_slice(&bytes)?;

            let out = handle_canonical_event(&deps, &event).await?;
            println!(
                "{}",
                serde_json::to_string(&json!({
                    "trace_id": out.trace_id,
                    "event_id": out.event_id,
                    "belief_id": out.belief_id,
                    "evidence_id": out.evidence_id,
                    "sha256": out.sha256,
                    "signature": out.signature,
                    "confidence": out.confidence,
                    "audio_bytes_len": out.audio_bytes_len,
                    "decision": out.promotion.as_ref().map(|p| p.decision.as_str()),
                }))?
            );
            Ok(())
        }

        Command::AuditGet { trace_id } => {
            let events = store.audit_trail(&trace_id)?;
            let out = json!({
                "trace_id": trace_id,
                "events": events
                    .iter()
                    .map(|e| json!({
                        "created_at": e.created_at,
                        "actor": e.actor,
                        "action": e.action,
                        "details": e.details,
                    }))
                    .collect::<Vec<_>>(),
            });
            println!("{}", serde_json::to_string(&out)?);
            Ok(())
        }

        Command::EvidenceGet { evidence_id } => {
            let row = store.get_snapshot(&evidence_id)?;
            println!("{}", serde_json::to_string(&json!({ "evidence": row }))?);
            Ok(())
        }

        Command::Promote {
            trace_id,
            belief_id,
        } => {
            let decision = promote_latest(store.as_ref(), &trace_id, &belief_id)?;
            println!("{}", serde_json::to_string(&json!({ "decision": decision }))?);
            Ok(())
        }

        Command::AiAuditTail { limit } => {
            let rows = store.recent_ai_calls(limit)?;
            let out = rows
                .iter()
                .map(|r| {
                    json!({
                        "id": r.id,
                        "trace_id": r.trace_id,
                        "phase": r.phase,
                        "model_name": r.model_name,
                        "policy_status": r.policy_status,
                        "policy_error": r.policy_error,
                        "created_at": r.created_at,
                    })
                })
                .collect::<Vec<_>>();
            println!("{}", serde_json::to_string(&out)?);
            Ok(())
        }
    }
}
