//! Build manifest recording which stages completed and what they produced.
//!
//! Every entry carries a fingerprint of the stage inputs and of the artifacts
//! it wrote. A stage is fresh only while both still match, so editing the
//! circuit or swapping a file in the build directory invalidates the stages
//! that depended on it.

use crate::backend::FinalZkey;
use crate::errors::{CeremonyError, Result};
use crate::events::Stage;
use crate::layout::ArtifactLayout;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

pub const MANIFEST_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub completed_at: DateTime<Utc>,
    pub inputs: String,
    pub outputs: String,
    /// Relative to the build directory
    pub artifacts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub version: u32,
    pub stages: BTreeMap<Stage, StageRecord>,
}

impl Default for Manifest {
    fn default() -> Self {
        Self {
            version: MANIFEST_VERSION,
            stages: BTreeMap::new(),
        }
    }
}

impl Manifest {
    /// A missing manifest is an empty one
    pub fn load(path: &Path) -> Result<Self> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(serde_json::from_str(&text)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes through a temporary file so a crash never leaves half a manifest
    pub fn save(&self, path: &Path) -> Result<()> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(self)?)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }

    pub fn get(&self, stage: Stage) -> Option<&StageRecord> {
        self.stages.get(&stage)
    }

    pub fn record(
        &mut self,
        stage: Stage,
        inputs: String,
        artifacts: &[PathBuf],
        layout: &ArtifactLayout,
    ) -> Result<()> {
        let outputs = fingerprint_files(artifacts, layout)?;
        self.stages.insert(
            stage,
            StageRecord {
                completed_at: Utc::now(),
                inputs,
                outputs,
                artifacts: artifacts.iter().map(|p| layout.relative(p)).collect(),
            },
        );
        Ok(())
    }

    /// Recorded inputs match and the recorded artifacts are unchanged on disk
    pub fn is_fresh(&self, stage: Stage, inputs: &str, layout: &ArtifactLayout) -> bool {
        let Some(record) = self.get(stage) else {
            return false;
        };
        if record.inputs != inputs {
            return false;
        }
        self.outputs_intact(record, layout)
    }

    /// Drop `stage` and everything after it
    pub fn invalidate_from(&mut self, stage: Stage) {
        self.stages.retain(|recorded, _| *recorded < stage);
    }

    /// The contributed key, if the manifest records one and it is untouched
    pub fn final_zkey(&self, layout: &ArtifactLayout) -> Result<FinalZkey> {
        let path = layout.final_zkey();
        let relative = layout.relative(&path);
        let recorded = self
            .get(Stage::Phase2)
            .filter(|record| record.artifacts == [relative.clone()])
            .filter(|record| self.outputs_intact(record, layout));
        match recorded {
            Some(_) => Ok(FinalZkey::new(path)),
            None => Err(CeremonyError::UnfinalizedKey(path)),
        }
    }

    fn outputs_intact(&self, record: &StageRecord, layout: &ArtifactLayout) -> bool {
        let paths: Vec<PathBuf> = record.artifacts.iter().map(|a| layout.resolve(a)).collect();
        if !paths.iter().all(|p| p.is_file()) {
            return false;
        }
        fingerprint_files(&paths, layout)
            .map(|current| current == record.outputs)
            .unwrap_or(false)
    }
}

/// blake3 over each file's relative name, length and content
pub fn fingerprint_files(paths: &[PathBuf], layout: &ArtifactLayout) -> Result<String> {
    let mut hasher = blake3::Hasher::new();
    for path in paths {
        let name = layout.relative(path);
        hasher.update(&(name.len() as u64).to_le_bytes());
        hasher.update(name.as_bytes());
        let mut file = fs::File::open(path)?;
        hasher.update(&file.metadata()?.len().to_le_bytes());
        io::copy(&mut file, &mut hasher)?;
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// blake3 over length prefixed parts
pub fn fingerprint_parts<I, P>(parts: I) -> String
where
    I: IntoIterator<Item = P>,
    P: AsRef<[u8]>,
{
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        let part = part.as_ref();
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.finalize().to_hex().to_string()
}
