use crate::events::Stage;
use crate::export::GeneratedContract;
use crate::ptau::{ParameterFile, ParameterOrigin};
use crate::r1cs::CircuitStats;
use crate::smoke_test::ProofOutcome;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseStatus {
    Ran,
    Skipped,
}

/// Information about each stage of the ceremony
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PhaseInfo {
    pub stage: Stage,
    pub status: PhaseStatus,
    pub duration: Duration,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeySummary {
    pub protocol: String,
    pub curve: String,
    pub n_public: usize,
    pub ic_len: usize,
}

/// Everything a completed run produced
#[derive(Debug, Clone)]
pub struct CeremonyReport {
    pub circuit: String,
    pub stats: CircuitStats,
    pub parameters: ParameterFile,
    pub entropy: String,
    pub phases: Vec<PhaseInfo>,
    pub key: KeySummary,
    pub contract: GeneratedContract,
    pub proof: ProofOutcome,
    pub files: Vec<PathBuf>,
    pub total_duration: Duration,
}

impl CeremonyReport {
    pub fn phase(&self, stage: Stage) -> Option<&PhaseInfo> {
        self.phases.iter().find(|p| p.stage == stage)
    }

    pub fn skipped(&self) -> Vec<Stage> {
        self.phases
            .iter()
            .filter(|p| p.status == PhaseStatus::Skipped)
            .map(|p| p.stage)
            .collect()
    }
}

impl fmt::Display for CeremonyReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "🎭 PDM Trusted Setup Ceremony Report")?;
        writeln!(f, "====================================")?;
        writeln!(f, "Circuit: {}", self.circuit)?;
        writeln!(f, "Constraints: {}", self.stats.constraints)?;
        writeln!(f, "Wires: {}", self.stats.wires)?;
        writeln!(
            f,
            "Signals: {} public outputs, {} public inputs, {} private inputs",
            self.stats.public_outputs, self.stats.public_inputs, self.stats.private_inputs
        )?;
        let origin = match &self.parameters.origin {
            ParameterOrigin::Cached => "cached".to_string(),
            ParameterOrigin::Downloaded { url } => format!("downloaded from {url}"),
        };
        writeln!(
            f,
            "Powers of Tau: 2^{} ({} bytes, {})",
            self.parameters.power, self.parameters.bytes, origin
        )?;
        writeln!(f, "Contribution: {}", self.entropy)?;
        writeln!(f, "Total duration: {:.2?}", self.total_duration)?;
        writeln!(f)?;

        writeln!(f, "📊 Stage Summary:")?;
        for phase in &self.phases {
            let status = match phase.status {
                PhaseStatus::Ran => "✅",
                PhaseStatus::Skipped => "⏭️ ",
            };
            writeln!(
                f,
                "  {} {}: {:.2?} - {}",
                status, phase.stage, phase.duration, phase.details
            )?;
        }
        writeln!(f)?;

        writeln!(f, "🔑 Verification Key:")?;
        writeln!(f, "  Protocol: {} over {}", self.key.protocol, self.key.curve)?;
        writeln!(f, "  Public signals: {}", self.key.n_public)?;
        writeln!(f, "  IC points: {}", self.key.ic_len)?;
        writeln!(f)?;

        writeln!(f, "🧪 Proof Smoke Test:")?;
        writeln!(
            f,
            "  Verification: {}",
            if self.proof.verified { "✅ Valid" } else { "❌ Invalid" }
        )?;
        writeln!(
            f,
            "  Public signals match input: {}",
            if self.proof.signals_match_input { "✅ Yes" } else { "❌ No" }
        )?;
        writeln!(f, "  Public signals: [{}]", self.proof.public_signals.join(", "))?;
        writeln!(
            f,
            "  Proof generation: {} ms",
            self.proof.performance.proof_generation_ms
        )?;
        writeln!(f, "  Verification: {} ms", self.proof.performance.verification_ms)?;
        writeln!(f)?;

        writeln!(f, "📁 Generated Files:")?;
        for file in &self.files {
            writeln!(f, "  {}", file.display())?;
        }
        writeln!(f)?;

        writeln!(f, "🚀 Next Steps:")?;
        let contracts = self.contract.contracts.join(" and ");
        writeln!(
            f,
            "  1. Deploy {} from {}",
            contracts,
            self.contract.path.display()
        )?;
        if let Some(verifier) = self.contract.contracts.first() {
            writeln!(
                f,
                "  2. Pass the {verifier} address to the registry constructor"
            )?;
        }
        writeln!(f, "  3. Register models with registerModel(pA, pB, pC, pubSignals)")?;
        if !self.proof.verified {
            writeln!(f)?;
            writeln!(f, "⚠️  The smoke test proof did not verify; do not deploy these artifacts.")?;
        }
        Ok(())
    }
}
