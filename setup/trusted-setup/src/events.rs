//! Structured ceremony events and the sinks that consume them.
//!
//! Every stage receives a `&dyn EventSink` instead of printing. The binary
//! installs a [`TracingSink`]; tests install a [`MemorySink`] and assert on the
//! collected events.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// Pipeline stages, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Compile,
    Parameters,
    Phase1,
    Phase2,
    Export,
    Verifier,
    ProofTest,
}

impl Stage {
    pub const ALL: [Stage; 7] = [
        Stage::Compile,
        Stage::Parameters,
        Stage::Phase1,
        Stage::Phase2,
        Stage::Export,
        Stage::Verifier,
        Stage::ProofTest,
    ];

    pub fn title(self) -> &'static str {
        match self {
            Stage::Compile => "Circuit Compilation",
            Stage::Parameters => "Powers of Tau",
            Stage::Phase1 => "Phase 1 Setup",
            Stage::Phase2 => "Phase 2 Contribution",
            Stage::Export => "Verification Key Export",
            Stage::Verifier => "Verifier Contract",
            Stage::ProofTest => "Proof Smoke Test",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    StageStarted,
    StageSkipped { reason: String },
    StageCompleted { elapsed: Duration },
    ArtifactWritten { path: PathBuf },
    ArtifactRemoved { path: PathBuf },
    DownloadAttempt { url: String, tier: u32 },
    DownloadProgress { received: u64, total: Option<u64> },
    DownloadFailed { url: String, reason: String },
    ProofTimed { generation_ms: u128, verification_ms: u128 },
    ProofVerified { valid: bool },
    Message(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct CeremonyEvent {
    pub level: Level,
    pub stage: Stage,
    pub kind: EventKind,
}

/// A consumer of ceremony events
pub trait EventSink: Send + Sync {
    fn emit(&self, event: CeremonyEvent);
}

/// Discards every event
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _: CeremonyEvent) {}
}

/// Forwards events to `tracing` with the stage as a structured field
pub struct TracingSink;

impl EventSink for TracingSink {
    fn emit(&self, event: CeremonyEvent) {
        let stage = event.stage.title();
        let message = describe(&event.kind);
        match event.level {
            Level::Debug => tracing::debug!(stage, "{message}"),
            Level::Info => tracing::info!(stage, "{message}"),
            Level::Warn => tracing::warn!(stage, "{message}"),
            Level::Error => tracing::error!(stage, "{message}"),
        }
    }
}

/// Collects events in memory
#[derive(Default)]
pub struct MemorySink {
    events: Mutex<Vec<CeremonyEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<CeremonyEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Events of one stage
    pub fn for_stage(&self, stage: Stage) -> Vec<CeremonyEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.stage == stage)
            .collect()
    }

    /// Events at or above `level`
    pub fn at_least(&self, level: Level) -> Vec<CeremonyEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.level >= level)
            .collect()
    }

    pub fn was_skipped(&self, stage: Stage) -> bool {
        self.for_stage(stage)
            .iter()
            .any(|e| matches!(e.kind, EventKind::StageSkipped { .. }))
    }
}

impl EventSink for MemorySink {
    fn emit(&self, event: CeremonyEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Stage-scoped helper so call sites stay short
#[derive(Clone, Copy)]
pub struct Narrator<'a> {
    sink: &'a dyn EventSink,
    stage: Stage,
}

impl<'a> Narrator<'a> {
    pub fn new(sink: &'a dyn EventSink, stage: Stage) -> Self {
        Self { sink, stage }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn emit(&self, level: Level, kind: EventKind) {
        self.sink.emit(CeremonyEvent {
            level,
            stage: self.stage,
            kind,
        });
    }

    pub fn debug(&self, message: impl Into<String>) {
        self.emit(Level::Debug, EventKind::Message(message.into()));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.emit(Level::Info, EventKind::Message(message.into()));
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.emit(Level::Warn, EventKind::Message(message.into()));
    }

    pub fn error(&self, message: impl Into<String>) {
        self.emit(Level::Error, EventKind::Message(message.into()));
    }

    pub fn started(&self) {
        self.emit(Level::Info, EventKind::StageStarted);
    }

    pub fn skipped(&self, reason: impl Into<String>) {
        self.emit(
            Level::Info,
            EventKind::StageSkipped {
                reason: reason.into(),
            },
        );
    }

    pub fn completed(&self, elapsed: Duration) {
        self.emit(Level::Info, EventKind::StageCompleted { elapsed });
    }

    pub fn wrote(&self, path: impl Into<PathBuf>) {
        self.emit(Level::Info, EventKind::ArtifactWritten { path: path.into() });
    }

    pub fn removed(&self, path: impl Into<PathBuf>) {
        self.emit(Level::Info, EventKind::ArtifactRemoved { path: path.into() });
    }
}

fn describe(kind: &EventKind) -> String {
    match kind {
        EventKind::StageStarted => "started".to_string(),
        EventKind::StageSkipped { reason } => format!("skipped: {reason}"),
        EventKind::StageCompleted { elapsed } => format!("completed in {elapsed:?}"),
        EventKind::ArtifactWritten { path } => format!("wrote {}", path.display()),
        EventKind::ArtifactRemoved { path } => format!("removed {}", path.display()),
        EventKind::DownloadAttempt { url, tier } => format!("downloading tier {tier} from {url}"),
        EventKind::DownloadProgress { received, total } => match total {
            Some(total) if *total > 0 => format!(
                "downloaded {:.1}% ({received}/{total} bytes)",
                *received as f64 * 100.0 / *total as f64
            ),
            _ => format!("downloaded {received} bytes"),
        },
        EventKind::DownloadFailed { url, reason } => format!("download from {url} failed: {reason}"),
        EventKind::ProofTimed {
            generation_ms,
            verification_ms,
        } => format!("proof generation {generation_ms}ms, verification {verification_ms}ms"),
        EventKind::ProofVerified { valid } => {
            if *valid {
                "proof verified".to_string()
            } else {
                "PROOF VERIFICATION FAILED".to_string()
            }
        }
        EventKind::Message(message) => message.clone(),
    }
}
