//! PDM Groth16 Trusted Setup Pipeline
//!
//! Orchestrates a Groth16 trusted setup ceremony for the predictive-maintenance
//! attestation circuit and emits everything needed on chain: a verification
//! key, a Solidity verifier with its model registry, and a smoke-test proof.
//!
//! ## Core Components
//!
//! - **Circuit Compilation**: drives the circuit compiler, reports R1CS statistics
//! - **Powers of Tau**: downloads public parameters with ordered fallback
//! - **Ceremony Orchestration**: phase 1 setup and phase 2 contribution
//! - **Export**: verification key and verifier contract generation
//! - **Smoke Test**: proves and verifies a reference attestation
//!
//! Cryptography is delegated to an external proving system behind the
//! [`ProvingSystem`] trait.

// Core modules
pub mod backend;
pub mod ceremony;
pub mod compiler;
pub mod config;
pub mod entropy;
pub mod errors;
pub mod events;
pub mod export;
pub mod layout;
pub mod manifest;
pub mod ptau;
pub mod r1cs;
pub mod report;
pub mod snarkjs;

// Re-export all public types
pub use backend::*;
pub use ceremony::*;
pub use compiler::*;
pub use config::*;
pub use entropy::{
    BeaconEntropy, Contribution, DevelopmentEntropy, EntropySource, TestingEntropy,
};
pub use errors::*;
pub use events::*;
pub use export::*;
pub use layout::*;
pub use manifest::*;
pub use ptau::*;
pub use r1cs::*;
pub use report::*;
pub use smoke_test::*;
pub use snarkjs::*;
