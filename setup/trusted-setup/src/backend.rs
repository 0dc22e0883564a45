//! The proving system seam.
//!
//! Setup, contribution, export, proving and verification are delegated to an
//! external Groth16 implementation. [`FinalZkey`] can only be constructed inside
//! this crate, after a contribution or from a manifest entry recording one, so
//! every operation that needs a finished key takes it by type.

use crate::entropy::Contribution;
use crate::errors::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Phase 1 proving key, not yet contributed to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Zkey {
    path: PathBuf,
}

impl Zkey {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Proving key after the phase 2 contribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinalZkey {
    path: PathBuf,
}

impl FinalZkey {
    pub(crate) fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Groth16Proof {
    pub pi_a: Vec<String>,
    pub pi_b: Vec<Vec<String>>,
    pub pi_c: Vec<String>,
    #[serde(default = "groth16")]
    pub protocol: String,
    #[serde(default = "bn128")]
    pub curve: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProofOutput {
    pub proof: Groth16Proof,
    #[serde(rename = "publicSignals")]
    pub public_signals: Vec<String>,
}

/// Verification key JSON as exported by snarkjs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationKey {
    pub protocol: String,
    pub curve: String,
    #[serde(rename = "nPublic")]
    pub n_public: usize,
    pub vk_alpha_1: Vec<String>,
    pub vk_beta_2: Vec<Vec<String>>,
    pub vk_gamma_2: Vec<Vec<String>>,
    pub vk_delta_2: Vec<Vec<String>>,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub vk_alphabeta_12: serde_json::Value,
    #[serde(rename = "IC")]
    pub ic: Vec<Vec<String>>,
}

impl VerificationKey {
    /// One IC point per public signal plus the constant term
    pub fn is_consistent(&self) -> bool {
        self.ic.len() == self.n_public + 1
    }
}

fn groth16() -> String {
    "groth16".to_string()
}

fn bn128() -> String {
    "bn128".to_string()
}

/// Operations the ceremony needs from a Groth16 implementation
pub trait ProvingSystem {
    /// Phase 1: circuit specific key from the constraint system and parameters
    fn setup(&self, r1cs: &Path, ptau: &Path, zkey_out: &Path) -> Result<()>;

    /// Phase 2 contribution of secret entropy
    fn contribute(&self, zkey_in: &Path, zkey_out: &Path, label: &str, entropy: &[u8]) -> Result<()>;

    /// Phase 2 contribution of a public beacon value
    fn beacon(
        &self,
        zkey_in: &Path,
        zkey_out: &Path,
        label: &str,
        hash: &[u8],
        iterations_exp: u32,
    ) -> Result<()>;

    fn export_verification_key(&self, zkey: &FinalZkey) -> Result<VerificationKey>;

    fn export_solidity_verifier(&self, zkey: &FinalZkey) -> Result<String>;

    fn full_prove(
        &self,
        input: &serde_json::Value,
        wasm: &Path,
        zkey: &FinalZkey,
    ) -> Result<ProofOutput>;

    fn verify(
        &self,
        vkey: &VerificationKey,
        public_signals: &[String],
        proof: &Groth16Proof,
    ) -> Result<bool>;
}

/// Runs the phase 2 step for either kind of contribution
pub(crate) fn apply_contribution(
    prover: &dyn ProvingSystem,
    zkey: &Zkey,
    zkey_out: &Path,
    label: &str,
    contribution: &Contribution,
) -> Result<FinalZkey> {
    match contribution {
        Contribution::Entropy(bytes) => prover.contribute(zkey.path(), zkey_out, label, bytes)?,
        Contribution::Beacon {
            hash,
            iterations_exp,
        } => prover.beacon(zkey.path(), zkey_out, label, hash, *iterations_exp)?,
    }
    Ok(FinalZkey::new(zkey_out.to_path_buf()))
}
