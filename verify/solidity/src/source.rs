use crate::errors::{Result, TemplateError};
use crate::registry::RegistryContract;
use crate::verifier::VerifierTemplate;
use std::fs;
use std::io;
use std::path::Path;

/// Verifier template plus the registry that consumes it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractBundle {
    pub verifier: VerifierTemplate,
    pub registry: RegistryContract,
}

impl ContractBundle {
    pub fn new(verifier: VerifierTemplate, registry: RegistryContract) -> Result<Self> {
        if verifier.contract_name() != registry.verifier_name() {
            return Err(TemplateError::VerifierNameMismatch {
                expected: registry.verifier_name().to_string(),
                actual: verifier.contract_name().to_string(),
            });
        }
        Ok(Self { verifier, registry })
    }

    /// Render the generated verifier text followed by the registry
    pub fn render(&self, generated_verifier: &str) -> Result<ContractSource> {
        let mut text = self.verifier.apply(generated_verifier)?;
        if !text.ends_with('\n') {
            text.push('\n');
        }
        text.push_str(&self.registry.render());
        Ok(ContractSource { text })
    }
}

/// Rendered contract text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSource {
    text: String,
}

impl ContractSource {
    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Names of every `contract` declared at the start of a line, in order
    pub fn declared_contracts(&self) -> Vec<&str> {
        self.text
            .lines()
            .filter_map(|line| line.trim_start().strip_prefix("contract "))
            .filter_map(|rest| {
                let end = rest
                    .find(|c: char| !crate::is_identifier_char(c))
                    .unwrap_or(rest.len());
                (end > 0).then(|| &rest[..end])
            })
            .collect()
    }

    /// Version constraint of the first `pragma solidity` line
    pub fn pragma(&self) -> Option<&str> {
        self.text.lines().find_map(|line| {
            line.trim_start()
                .strip_prefix("pragma solidity ")
                .map(|rest| rest.trim_end().trim_end_matches(';').trim())
        })
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        fs::write(path, &self.text)
    }
}
