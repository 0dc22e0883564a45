use crate::backend::{FinalZkey, Groth16Proof, ProofOutput, ProvingSystem, VerificationKey};
use crate::errors::{CeremonyError, Result};
use std::ffi::OsStr;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const TOOL: &str = "snarkjs";

/// [`ProvingSystem`] backed by the snarkjs command line
#[derive(Debug, Clone)]
pub struct SnarkjsCli {
    program: String,
    prefix: Vec<String>,
}

impl SnarkjsCli {
    /// `command` is the full invocation, e.g. `["npx", "snarkjs"]`
    pub fn new(command: &[String]) -> Result<Self> {
        let (program, prefix) = command
            .split_first()
            .ok_or_else(|| CeremonyError::Config("snarkjs command is empty".into()))?;
        Ok(Self {
            program: program.clone(),
            prefix: prefix.to_vec(),
        })
    }

    fn command<I, S>(&self, args: I) -> Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.prefix).args(args);
        cmd
    }

    fn output(&self, mut cmd: Command) -> Result<Output> {
        tracing::debug!(command = ?cmd, "running proving system");
        let output = cmd
            .output()
            .map_err(|e| CeremonyError::tool(TOOL, format!("could not start {}: {e}", self.program)))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            tracing::debug!(target: "snarkjs", "{}", stdout.trim_end());
        }
        Ok(output)
    }

    fn run(&self, cmd: Command, step: &str) -> Result<Output> {
        let output = self.output(cmd)?;
        if !output.status.success() {
            return Err(CeremonyError::tool(
                TOOL,
                format!("{step} exited with {}: {}", output.status, tail(&output)),
            ));
        }
        Ok(output)
    }

    fn scratch() -> Result<TempDir> {
        Ok(tempfile::Builder::new().prefix("pdm-snarkjs").tempdir()?)
    }
}

impl ProvingSystem for SnarkjsCli {
    fn setup(&self, r1cs: &Path, ptau: &Path, zkey_out: &Path) -> Result<()> {
        let mut cmd = self.command(["groth16", "setup"]);
        cmd.arg(r1cs).arg(ptau).arg(zkey_out);
        self.run(cmd, "groth16 setup")?;
        Ok(())
    }

    fn contribute(&self, zkey_in: &Path, zkey_out: &Path, label: &str, entropy: &[u8]) -> Result<()> {
        let mut cmd = self.command(["zkey", "contribute"]);
        cmd.arg(zkey_in)
            .arg(zkey_out)
            .arg(format!("--name={label}"))
            .arg(format!("-e={}", hex::encode(entropy)));
        self.run(cmd, "zkey contribute")?;
        Ok(())
    }

    fn beacon(
        &self,
        zkey_in: &Path,
        zkey_out: &Path,
        label: &str,
        hash: &[u8],
        iterations_exp: u32,
    ) -> Result<()> {
        let mut cmd = self.command(["zkey", "beacon"]);
        cmd.arg(zkey_in)
            .arg(zkey_out)
            .arg(hex::encode(hash))
            .arg(iterations_exp.to_string())
            .arg(format!("--name={label}"));
        self.run(cmd, "zkey beacon")?;
        Ok(())
    }

    fn export_verification_key(&self, zkey: &FinalZkey) -> Result<VerificationKey> {
        let scratch = Self::scratch()?;
        let out = scratch.path().join("verification_key.json");
        let mut cmd = self.command(["zkey", "export", "verificationkey"]);
        cmd.arg(zkey.path()).arg(&out);
        self.run(cmd, "zkey export verificationkey")?;
        Ok(serde_json::from_str(&fs::read_to_string(&out)?)?)
    }

    fn export_solidity_verifier(&self, zkey: &FinalZkey) -> Result<String> {
        let scratch = Self::scratch()?;
        let out = scratch.path().join("verifier.sol");
        let mut cmd = self.command(["zkey", "export", "solidityverifier"]);
        cmd.arg(zkey.path()).arg(&out);
        self.run(cmd, "zkey export solidityverifier")?;
        Ok(fs::read_to_string(&out)?)
    }

    fn full_prove(
        &self,
        input: &serde_json::Value,
        wasm: &Path,
        zkey: &FinalZkey,
    ) -> Result<ProofOutput> {
        let scratch = Self::scratch()?;
        let input_path = scratch.path().join("input.json");
        let proof_path = scratch.path().join("proof.json");
        let public_path = scratch.path().join("public.json");
        fs::write(&input_path, serde_json::to_vec(input)?)?;

        let mut cmd = self.command(["groth16", "fullprove"]);
        cmd.arg(&input_path)
            .arg(wasm)
            .arg(zkey.path())
            .arg(&proof_path)
            .arg(&public_path);
        self.run(cmd, "groth16 fullprove")?;

        Ok(ProofOutput {
            proof: serde_json::from_str(&fs::read_to_string(&proof_path)?)?,
            public_signals: serde_json::from_str(&fs::read_to_string(&public_path)?)?,
        })
    }

    fn verify(
        &self,
        vkey: &VerificationKey,
        public_signals: &[String],
        proof: &Groth16Proof,
    ) -> Result<bool> {
        let scratch = Self::scratch()?;
        let vkey_path = scratch.path().join("verification_key.json");
        let public_path = scratch.path().join("public.json");
        let proof_path = scratch.path().join("proof.json");
        fs::write(&vkey_path, serde_json::to_vec(vkey)?)?;
        fs::write(&public_path, serde_json::to_vec(public_signals)?)?;
        fs::write(&proof_path, serde_json::to_vec(proof)?)?;

        let mut cmd = self.command(["groth16", "verify"]);
        cmd.arg(&vkey_path).arg(&public_path).arg(&proof_path);
        let output = self.output(cmd)?;
        interpret_verify(&output)
    }
}

fn interpret_verify(output: &Output) -> Result<bool> {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if output.status.success() && stdout.contains("OK") {
        Ok(true)
    } else if stdout.contains("Invalid proof") || stderr.contains("Invalid proof") {
        Ok(false)
    } else {
        Err(CeremonyError::tool(
            TOOL,
            format!("groth16 verify exited with {}: {}", output.status, tail(output)),
        ))
    }
}

/// Last lines of stderr, or stdout when stderr is empty
fn tail(output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let text = if stderr.trim().is_empty() {
        String::from_utf8_lossy(&output.stdout)
    } else {
        stderr
    };
    let lines: Vec<&str> = text.lines().collect();
    lines[lines.len().saturating_sub(5)..].join(" | ")
}
