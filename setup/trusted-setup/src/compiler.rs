use crate::errors::{CeremonyError, Result};
use crate::layout::ArtifactLayout;
use std::path::Path;
use std::process::Command;

/// Turns a circuit source into its constraint system and witness program
pub trait CircuitCompiler {
    fn compile(&self, source: &Path, out_dir: &Path) -> Result<()>;

    fn name(&self) -> &str;
}

/// Drives the `circom` binary
#[derive(Debug, Clone)]
pub struct CircomCompiler {
    binary: String,
}

impl CircomCompiler {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl CircuitCompiler for CircomCompiler {
    fn compile(&self, source: &Path, out_dir: &Path) -> Result<()> {
        std::fs::create_dir_all(out_dir)?;
        let status = Command::new(&self.binary)
            .arg(source)
            .args(["--r1cs", "--wasm", "--sym", "-o"])
            .arg(out_dir)
            .status()
            .map_err(|e| CeremonyError::tool(&self.binary, format!("could not start: {e}")))?;

        if !status.success() {
            return Err(CeremonyError::tool(
                &self.binary,
                format!("compilation exited with {status}"),
            ));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.binary
    }
}

/// Both compiled outputs exist
pub fn outputs_present(layout: &ArtifactLayout) -> bool {
    layout.r1cs().is_file() && layout.wasm().is_file()
}
