use crate::errors::{CeremonyError, Result};
use crate::ptau::{default_candidates, PtauCandidate};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration for the trusted setup ceremony
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CeremonyConfig {
    pub circuit_name: String,
    pub circuit_source: PathBuf,
    pub build_dir: PathBuf,
    /// Circuit compiler binary
    pub compiler: String,
    /// Proving system command line, e.g. `["npx", "snarkjs"]`
    pub snarkjs: Vec<String>,
    pub contribution_label: String,
    pub entropy: EntropyConfig,
    pub parameters: ParameterConfig,
    pub contracts: ContractConfig,
    pub proof_record: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum EntropyMode {
    /// Fixed bytes, reproducible
    Testing,
    /// Clock and PRNG mix, for development ceremonies
    Random,
    /// Public randomness beacon
    Beacon,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntropyConfig {
    pub mode: EntropyMode,
    /// Hex encoded beacon value, required in beacon mode
    pub beacon_hash: Option<String>,
    pub beacon_iterations_exp: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterConfig {
    /// Tried in order until one yields a valid file
    pub candidates: Vec<PtauCandidate>,
    /// A parameter file must be strictly larger than this
    pub min_bytes: u64,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContractConfig {
    pub verifier_name: String,
    pub system_name: String,
    pub pragma: String,
    pub reputation_reward: u64,
    /// Upper bound the registry accepts for a claimed accuracy
    pub max_accuracy: u64,
    /// How old a proof timestamp may be when registered
    pub freshness_window_secs: u64,
}

impl Default for CeremonyConfig {
    fn default() -> Self {
        Self {
            circuit_name: "pdm_verification".to_string(),
            circuit_source: PathBuf::from("pdm_verification.circom"),
            build_dir: PathBuf::from("./build"),
            compiler: "circom".to_string(),
            snarkjs: vec!["snarkjs".to_string()],
            contribution_label: "PDM Production Circuit v1.0".to_string(),
            entropy: EntropyConfig::default(),
            parameters: ParameterConfig::default(),
            contracts: ContractConfig::default(),
            proof_record: "production_proof.json".to_string(),
        }
    }
}

impl Default for EntropyConfig {
    fn default() -> Self {
        Self {
            mode: EntropyMode::Random,
            beacon_hash: None,
            beacon_iterations_exp: 10,
        }
    }
}

impl Default for ParameterConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates(),
            min_bytes: 1_000_000,
            timeout_secs: 300,
        }
    }
}

impl ParameterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for ContractConfig {
    fn default() -> Self {
        Self {
            verifier_name: "PDMProductionVerifier".to_string(),
            system_name: "PDMProductionSystem".to_string(),
            pragma: solidity_gen::DEFAULT_PRAGMA.to_string(),
            reputation_reward: 10,
            max_accuracy: 100,
            freshness_window_secs: 86_400,
        }
    }
}

impl CeremonyConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)
            .map_err(|err| CeremonyError::Config(format!("unable to parse config: {err}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let encoded = toml::to_string_pretty(self)
            .map_err(|err| CeremonyError::Config(format!("unable to encode config: {err}")))?;
        fs::write(path, encoded)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !solidity_gen::is_identifier(&self.circuit_name) {
            return Err(CeremonyError::Config(format!(
                "circuit name {:?} must be a plain identifier",
                self.circuit_name
            )));
        }
        if self.compiler.trim().is_empty() {
            return Err(CeremonyError::Config("compiler binary is empty".into()));
        }
        if self.snarkjs.first().map_or(true, |bin| bin.trim().is_empty()) {
            return Err(CeremonyError::Config("snarkjs command is empty".into()));
        }
        if self.contribution_label.trim().is_empty() {
            return Err(CeremonyError::Config("contribution label is empty".into()));
        }
        if self.parameters.candidates.is_empty() {
            return Err(CeremonyError::Config(
                "at least one parameter candidate is required".into(),
            ));
        }
        if let Some(candidate) = self.parameters.candidates.iter().find(|c| c.tier == 0 || c.tier > 28) {
            return Err(CeremonyError::Config(format!(
                "candidate {} has tier {}, expected 1..=28",
                candidate.url, candidate.tier
            )));
        }
        if self.parameters.timeout_secs == 0 {
            return Err(CeremonyError::Config("download timeout must be positive".into()));
        }
        if self.proof_record.contains(['/', '\\']) || self.proof_record.is_empty() {
            return Err(CeremonyError::Config(format!(
                "proof record {:?} must be a bare file name",
                self.proof_record
            )));
        }
        self.entropy.validate()?;

        // Surfaces naming and pragma problems before any stage runs
        solidity_gen::VerifierTemplate::new(&self.contracts.verifier_name, &self.contracts.pragma)?;
        solidity_gen::RegistryContract::new(
            &self.contracts.system_name,
            &self.contracts.verifier_name,
            solidity_gen::REGISTRY_SIGNALS.len(),
        )?;
        if self.contracts.max_accuracy == 0 || self.contracts.freshness_window_secs == 0 {
            return Err(CeremonyError::Config(
                "registry max_accuracy and freshness_window_secs must be positive".into(),
            ));
        }
        if self.contracts.verifier_name == self.contracts.system_name {
            return Err(CeremonyError::Config(
                "verifier and system contracts need distinct names".into(),
            ));
        }
        Ok(())
    }
}

impl EntropyConfig {
    pub fn validate(&self) -> Result<()> {
        if !(10..=63).contains(&self.beacon_iterations_exp) {
            return Err(CeremonyError::Config(format!(
                "beacon iteration exponent {} outside 10..=63",
                self.beacon_iterations_exp
            )));
        }
        if self.mode == EntropyMode::Beacon {
            let hash = self.beacon_hash.as_deref().ok_or_else(|| {
                CeremonyError::Config("beacon mode needs entropy.beacon_hash".into())
            })?;
            let bytes = hex::decode(hash).map_err(|err| {
                CeremonyError::Config(format!("beacon hash is not hex: {err}"))
            })?;
            if bytes.is_empty() {
                return Err(CeremonyError::Config("beacon hash is empty".into()));
            }
        }
        Ok(())
    }
}
