use crate::ceremony::CeremonyState;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Fatal errors of the trusted setup pipeline
#[derive(Error, Debug)]
pub enum CeremonyError {
    #[error("missing {what}: {}", .path.display())]
    MissingArtifact { what: &'static str, path: PathBuf },

    #[error("no parameter file could be obtained after {} attempt(s): {}", .attempts.len(), summarize(.attempts))]
    DownloadFailure { attempts: Vec<FailedAttempt> },

    #[error("{tool} failed: {detail}")]
    ExternalToolFailure { tool: String, detail: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("contract generation error: {0}")]
    Template(#[from] solidity_gen::TemplateError),

    #[error("invalid ceremony transition from {from} to {to}")]
    InvalidTransition { from: CeremonyState, to: CeremonyState },

    #[error("insufficient powers of tau: circuit needs 2^{required}, best available is 2^{available}")]
    InsufficientPowers { required: u32, available: u32 },

    #[error("proving key {} is not a finalized contribution", .0.display())]
    UnfinalizedKey(PathBuf),

    #[error("R1CS header error: {0}")]
    R1cs(String),

    #[error("parameter file header error: {0}")]
    Ptau(String),

    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, CeremonyError>;

impl CeremonyError {
    pub(crate) fn tool(tool: impl Into<String>, detail: impl Into<String>) -> Self {
        CeremonyError::ExternalToolFailure {
            tool: tool.into(),
            detail: detail.into(),
        }
    }

    /// Generic remediation hints shown next to a fatal error
    pub fn remediation(&self) -> &'static [&'static str] {
        match self {
            CeremonyError::MissingArtifact { .. } => &[
                "Check that the circuit source path in the configuration is correct",
                "Run the full pipeline again so earlier stages recreate their outputs",
            ],
            CeremonyError::DownloadFailure { .. } => &[
                "Check network access to the parameter hosts",
                "Place a Powers of Tau file in the build directory to skip the download",
                "Add a mirror to [parameters.candidates] in the configuration",
            ],
            CeremonyError::ExternalToolFailure { .. } => &[
                "Is the circuit compiler installed? -> circom --version",
                "Is the proving system installed? -> snarkjs --help",
                "Re-run with RUST_LOG=debug for the full tool output",
            ],
            CeremonyError::InsufficientPowers { .. } => &[
                "Configure a parameter candidate with a larger tier",
            ],
            CeremonyError::UnfinalizedKey(_) => &[
                "Re-run the ceremony with --force to produce a fresh final key",
            ],
            CeremonyError::Config(_) | CeremonyError::Template(_) => &[
                "Regenerate a reference configuration with `run_ceremony generate-config`",
            ],
            _ => &["Re-run with RUST_LOG=debug for more detail"],
        }
    }
}

/// Errors of a single parameter download attempt
#[derive(Error, Debug)]
pub enum DownloadError {
    #[error("HTTP {0}")]
    Status(u16),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("file too small: {bytes} bytes, need more than {min}")]
    TooSmall { bytes: u64, min: u64 },

    #[error("corrupt parameter file: {0}")]
    Corrupt(String),

    #[error("parameter file holds 2^{power}, circuit needs 2^{required}")]
    Capacity { power: u32, required: u32 },

    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One failed candidate, kept for the final error message
#[derive(Debug)]
pub struct FailedAttempt {
    pub url: String,
    pub reason: DownloadError,
}

impl fmt::Display for FailedAttempt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.url, self.reason)
    }
}

fn summarize(attempts: &[FailedAttempt]) -> String {
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
