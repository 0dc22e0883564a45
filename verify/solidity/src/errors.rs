use thiserror::Error;

/// Errors raised while rendering contract text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("generated verifier declares neither `contract Groth16Verifier` nor `contract Verifier`")]
    MissingContractToken,

    #[error("generated verifier has no `pragma solidity` line")]
    MissingPragma,

    #[error("invalid Solidity identifier: {0:?}")]
    InvalidIdentifier(String),

    #[error("invalid pragma version constraint: {0:?}")]
    InvalidPragma(String),

    #[error("registry needs at least 3 public signals (commitment, claimed accuracy, timestamp), got {0}")]
    TooFewPublicSignals(usize),

    #[error("registry expects verifier {expected}, template renames it to {actual}")]
    VerifierNameMismatch { expected: String, actual: String },
}

pub type Result<T> = std::result::Result<T, TemplateError>;
