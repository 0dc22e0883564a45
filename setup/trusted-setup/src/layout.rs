use std::path::{Path, PathBuf};

/// File names of every artifact, relative to the build directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLayout {
    build_dir: PathBuf,
    circuit: String,
}

impl ArtifactLayout {
    pub fn new(build_dir: impl Into<PathBuf>, circuit: impl Into<String>) -> Self {
        Self {
            build_dir: build_dir.into(),
            circuit: circuit.into(),
        }
    }

    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn circuit(&self) -> &str {
        &self.circuit
    }

    pub fn r1cs(&self) -> PathBuf {
        self.build_dir.join(format!("{}.r1cs", self.circuit))
    }

    pub fn wasm(&self) -> PathBuf {
        self.build_dir
            .join(format!("{}_js", self.circuit))
            .join(format!("{}.wasm", self.circuit))
    }

    /// Phase 1 key, removed once the contribution lands
    pub fn zkey(&self) -> PathBuf {
        self.build_dir.join(format!("{}.zkey", self.circuit))
    }

    pub fn final_zkey(&self) -> PathBuf {
        self.build_dir.join(format!("{}_final.zkey", self.circuit))
    }

    pub fn verification_key(&self) -> PathBuf {
        self.build_dir.join(format!("{}_vkey.json", self.circuit))
    }

    pub fn verifier_contract(&self, contract_name: &str) -> PathBuf {
        self.build_dir.join(format!("{contract_name}.sol"))
    }

    pub fn proof_record(&self, file_name: &str) -> PathBuf {
        self.build_dir.join(file_name)
    }

    pub fn test_input(&self) -> PathBuf {
        self.build_dir.join("production_input.json")
    }

    pub fn manifest(&self) -> PathBuf {
        self.build_dir.join("ceremony_manifest.json")
    }

    pub fn ptau(&self, tier: u32) -> PathBuf {
        self.build_dir.join(ptau_file_name(tier))
    }

    /// Path relative to the build directory, for the manifest
    pub fn relative(&self, path: &Path) -> String {
        path.strip_prefix(&self.build_dir)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.build_dir.join(relative)
    }
}

pub fn ptau_file_name(tier: u32) -> String {
    format!("powersOfTau28_hez_final_{tier:02}.ptau")
}
