use crate::backend::{FinalZkey, ProvingSystem, VerificationKey};
use crate::config::ContractConfig;
use crate::errors::{CeremonyError, Result};
use crate::events::{EventSink, Narrator, Stage};
use crate::layout::ArtifactLayout;
use solidity_gen::{ContractBundle, RegistryContract, VerifierTemplate};
use std::fs;
use std::path::{Path, PathBuf};

/// Export the verification key and write it as pretty JSON
pub fn export_verification_key(
    prover: &dyn ProvingSystem,
    zkey: &FinalZkey,
    layout: &ArtifactLayout,
    sink: &dyn EventSink,
) -> Result<VerificationKey> {
    let log = Narrator::new(sink, Stage::Export);
    let vkey = prover.export_verification_key(zkey)?;
    if !vkey.is_consistent() {
        log.warn(format!(
            "verification key has {} IC points for {} public signals",
            vkey.ic.len(),
            vkey.n_public
        ));
    }

    let path = layout.verification_key();
    fs::write(&path, serde_json::to_string_pretty(&vkey)?)?;
    log.info(format!(
        "{} key over {}: nPublic={}, IC length={}",
        vkey.protocol,
        vkey.curve,
        vkey.n_public,
        vkey.ic.len()
    ));
    log.wrote(&path);
    Ok(vkey)
}

pub fn load_verification_key(path: &Path) -> Result<VerificationKey> {
    if !path.is_file() {
        return Err(CeremonyError::MissingArtifact {
            what: "verification key",
            path: path.to_path_buf(),
        });
    }
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedContract {
    pub path: PathBuf,
    pub contracts: Vec<String>,
    pub pragma: Option<String>,
    pub public_signals: usize,
}

/// Render the verifier under its configured name, followed by the registry
pub fn generate_verifier_contract(
    prover: &dyn ProvingSystem,
    zkey: &FinalZkey,
    vkey: &VerificationKey,
    contracts: &ContractConfig,
    layout: &ArtifactLayout,
    sink: &dyn EventSink,
) -> Result<GeneratedContract> {
    let log = Narrator::new(sink, Stage::Verifier);

    let verifier = VerifierTemplate::new(&contracts.verifier_name, &contracts.pragma)?;
    let mut registry = RegistryContract::new(
        &contracts.system_name,
        &contracts.verifier_name,
        vkey.n_public,
    )?;
    registry.reputation_reward = contracts.reputation_reward;
    registry.max_accuracy = contracts.max_accuracy;
    registry.freshness_window_secs = contracts.freshness_window_secs;
    let bundle = ContractBundle::new(verifier, registry)?;

    let generated = prover.export_solidity_verifier(zkey)?;
    let source = bundle.render(&generated)?;

    let path = layout.verifier_contract(&contracts.verifier_name);
    source.save_to_file(&path)?;
    log.wrote(&path);

    Ok(GeneratedContract {
        path,
        contracts: source
            .declared_contracts()
            .into_iter()
            .map(str::to_string)
            .collect(),
        pragma: source.pragma().map(str::to_string),
        public_signals: vkey.n_public,
    })
}
