use crate::backend::{apply_contribution, FinalZkey, ProvingSystem, VerificationKey, Zkey};
use crate::compiler::{outputs_present, CircuitCompiler};
use crate::config::CeremonyConfig;
use crate::entropy::{self, EntropySource};
use crate::errors::{CeremonyError, Result};
use crate::events::{EventSink, Narrator, Stage};
use crate::export::{self, GeneratedContract};
use crate::layout::ArtifactLayout;
use crate::manifest::{fingerprint_files, fingerprint_parts, Manifest};
use crate::ptau::{ParameterFetcher, ParameterFile, ParameterOrigin};
use crate::r1cs::{CircuitStats, R1csHeader};
use crate::report::{CeremonyReport, KeySummary, PhaseInfo, PhaseStatus};
use crate::smoke_test::{ProofOutcome, ProofRecord, SmokeTest, SystemInfo, TestInput};
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// Progress of a single run. Transitions are strictly linear.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CeremonyState {
    NotStarted,
    Phase1Complete,
    Phase2Complete,
    Exported,
    VerifierGenerated,
    ProofTested,
    Done,
}

impl CeremonyState {
    pub fn next(self) -> Option<Self> {
        use CeremonyState::*;
        match self {
            NotStarted => Some(Phase1Complete),
            Phase1Complete => Some(Phase2Complete),
            Phase2Complete => Some(Exported),
            Exported => Some(VerifierGenerated),
            VerifierGenerated => Some(ProofTested),
            ProofTested => Some(Done),
            Done => None,
        }
    }

    pub fn advance(&mut self, to: CeremonyState) -> Result<()> {
        if self.next() != Some(to) {
            return Err(CeremonyError::InvalidTransition { from: *self, to });
        }
        *self = to;
        Ok(())
    }
}

impl fmt::Display for CeremonyState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            CeremonyState::NotStarted => "not started",
            CeremonyState::Phase1Complete => "phase 1 complete",
            CeremonyState::Phase2Complete => "phase 2 complete",
            CeremonyState::Exported => "exported",
            CeremonyState::VerifierGenerated => "verifier generated",
            CeremonyState::ProofTested => "proof tested",
            CeremonyState::Done => "done",
        };
        f.write_str(name)
    }
}

/// Complete trusted setup ceremony orchestrator
pub struct TrustedSetupCeremony<'a> {
    config: CeremonyConfig,
    layout: ArtifactLayout,
    compiler: &'a dyn CircuitCompiler,
    prover: &'a dyn ProvingSystem,
    entropy: Box<dyn EntropySource>,
    fetcher: ParameterFetcher,
    sink: &'a dyn EventSink,
    force: bool,
    test_input: Option<TestInput>,
    state: CeremonyState,
}

impl<'a> TrustedSetupCeremony<'a> {
    pub fn new(
        config: CeremonyConfig,
        compiler: &'a dyn CircuitCompiler,
        prover: &'a dyn ProvingSystem,
        sink: &'a dyn EventSink,
    ) -> Result<Self> {
        config.validate()?;
        let layout = ArtifactLayout::new(&config.build_dir, &config.circuit_name);
        let entropy = entropy::from_config(&config.entropy)?;
        let fetcher =
            ParameterFetcher::new(config.parameters.min_bytes, config.parameters.timeout())?;
        Ok(Self {
            config,
            layout,
            compiler,
            prover,
            entropy,
            fetcher,
            sink,
            force: false,
            test_input: None,
            state: CeremonyState::NotStarted,
        })
    }

    pub fn with_entropy(mut self, entropy: Box<dyn EntropySource>) -> Self {
        self.entropy = entropy;
        self
    }

    /// Redo the setup, contribution and export even when the manifest has them
    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    pub fn with_test_input(mut self, input: TestInput) -> Self {
        self.test_input = Some(input);
        self
    }

    pub fn layout(&self) -> &ArtifactLayout {
        &self.layout
    }

    pub fn state(&self) -> CeremonyState {
        self.state
    }

    /// Run every stage in order, saving the manifest after each one
    pub async fn run(&mut self) -> Result<CeremonyReport> {
        let started = Instant::now();
        self.state = CeremonyState::NotStarted;
        fs::create_dir_all(self.layout.build_dir())?;
        let manifest_path = self.layout.manifest();
        let mut manifest = Manifest::load(&manifest_path)?;
        if self.force {
            manifest.invalidate_from(Stage::Phase1);
        }
        let mut phases = Vec::new();

        let stats = self.compile_stage(&mut manifest, &mut phases)?;
        manifest.save(&manifest_path)?;

        let parameters = self.parameter_stage(&stats, &mut manifest, &mut phases).await?;
        manifest.save(&manifest_path)?;

        let zkey = self.contribution_stages(&stats, &parameters, &mut manifest, &mut phases)?;
        manifest.save(&manifest_path)?;

        let vkey = self.export_stage(&zkey, &mut manifest, &mut phases)?;
        manifest.save(&manifest_path)?;

        let contract = self.verifier_stage(&zkey, &vkey, &mut manifest, &mut phases)?;
        manifest.save(&manifest_path)?;

        let proof = self.proof_stage(&zkey, &vkey, &mut manifest, &mut phases)?;
        manifest.save(&manifest_path)?;

        self.state.advance(CeremonyState::Done)?;

        let files = vec![
            self.layout.r1cs(),
            self.layout.wasm(),
            parameters.path.clone(),
            zkey.path().to_path_buf(),
            self.layout.verification_key(),
            contract.path.clone(),
            self.layout.test_input(),
            proof.record_path.clone(),
            manifest_path,
        ];

        Ok(CeremonyReport {
            circuit: self.config.circuit_name.clone(),
            stats,
            parameters,
            entropy: self.entropy.describe(),
            phases,
            key: KeySummary {
                protocol: vkey.protocol.clone(),
                curve: vkey.curve.clone(),
                n_public: vkey.n_public,
                ic_len: vkey.ic.len(),
            },
            contract,
            proof,
            files,
            total_duration: started.elapsed(),
        })
    }

    fn compile_stage(
        &mut self,
        manifest: &mut Manifest,
        phases: &mut Vec<PhaseInfo>,
    ) -> Result<CircuitStats> {
        let log = Narrator::new(self.sink, Stage::Compile);
        log.started();
        let started = Instant::now();

        let source = self.config.circuit_source.clone();
        let source_fp = if source.is_file() {
            Some(fingerprint_files(&[source.clone()], &self.layout)?)
        } else {
            None
        };
        let outputs = vec![self.layout.r1cs(), self.layout.wasm()];

        let adopt = if !outputs_present(&self.layout) {
            None
        } else {
            match manifest.get(Stage::Compile) {
                // compiled outside the pipeline, adopt as is
                None => Some(source_fp.clone().unwrap_or_else(|| "adopted".to_string())),
                Some(record) => {
                    let inputs = source_fp.clone().unwrap_or_else(|| record.inputs.clone());
                    if manifest.is_fresh(Stage::Compile, &inputs, &self.layout) {
                        Some(inputs)
                    } else if source_fp.is_none() {
                        log.warn(format!(
                            "compiled outputs changed and {} is absent, adopting them as is",
                            source.display()
                        ));
                        Some(inputs)
                    } else {
                        None
                    }
                }
            }
        };

        let status = if let Some(inputs) = adopt {
            if !manifest.is_fresh(Stage::Compile, &inputs, &self.layout) {
                manifest.record(Stage::Compile, inputs, &outputs, &self.layout)?;
            }
            log.skipped("compiled circuit already present");
            PhaseStatus::Skipped
        } else {
            let Some(source_fp) = source_fp else {
                return Err(CeremonyError::MissingArtifact {
                    what: "circuit source",
                    path: source,
                });
            };
            log.info(format!(
                "compiling {} with {}",
                source.display(),
                self.compiler.name()
            ));
            self.compiler.compile(&source, self.layout.build_dir())?;
            for path in &outputs {
                if !path.is_file() {
                    return Err(CeremonyError::MissingArtifact {
                        what: "compiler output",
                        path: path.clone(),
                    });
                }
                log.wrote(path);
            }
            manifest.record(Stage::Compile, source_fp, &outputs, &self.layout)?;
            PhaseStatus::Ran
        };

        let stats = R1csHeader::read(self.layout.r1cs())?.stats();
        log.info(stats.to_string());
        finish(log, started, status, stats.to_string(), phases);
        Ok(stats)
    }

    async fn parameter_stage(
        &mut self,
        stats: &CircuitStats,
        manifest: &mut Manifest,
        phases: &mut Vec<PhaseInfo>,
    ) -> Result<ParameterFile> {
        let log = Narrator::new(self.sink, Stage::Parameters);
        log.started();
        let started = Instant::now();

        let required = stats.required_power();
        log.debug(format!("circuit needs 2^{required} powers"));
        let file = self
            .fetcher
            .fetch(&self.config.parameters.candidates, &self.layout, required, self.sink)
            .await?;

        let (status, details) = match &file.origin {
            ParameterOrigin::Cached => {
                log.skipped(format!("{} already present", file.path.display()));
                (PhaseStatus::Skipped, format!("reused tier {} file", file.tier))
            }
            ParameterOrigin::Downloaded { url } => {
                (PhaseStatus::Ran, format!("downloaded tier {} from {url}", file.tier))
            }
        };
        manifest.record(
            Stage::Parameters,
            fingerprint_parts([file.tier.to_string()]),
            &[file.path.clone()],
            &self.layout,
        )?;
        finish(log, started, status, details, phases);
        Ok(file)
    }

    fn contribution_stages(
        &mut self,
        stats: &CircuitStats,
        parameters: &ParameterFile,
        manifest: &mut Manifest,
        phases: &mut Vec<PhaseInfo>,
    ) -> Result<FinalZkey> {
        let key_inputs = fingerprint_parts([
            recorded_outputs(manifest, Stage::Compile),
            recorded_outputs(manifest, Stage::Parameters),
            self.config.contribution_label.clone(),
        ]);

        if manifest.is_fresh(Stage::Phase2, &key_inputs, &self.layout) {
            let zkey = manifest.final_zkey(&self.layout)?;
            for stage in [Stage::Phase1, Stage::Phase2] {
                let log = Narrator::new(self.sink, stage);
                log.skipped("final key matches recorded inputs");
                finish(
                    log,
                    Instant::now(),
                    PhaseStatus::Skipped,
                    format!("{} up to date", zkey.path().display()),
                    phases,
                );
            }
            self.state.advance(CeremonyState::Phase1Complete)?;
            self.state.advance(CeremonyState::Phase2Complete)?;
            return Ok(zkey);
        }
        manifest.invalidate_from(Stage::Phase1);

        // phase 1
        let log = Narrator::new(self.sink, Stage::Phase1);
        log.started();
        let started = Instant::now();
        let r1cs = self.layout.r1cs();
        if !r1cs.is_file() {
            return Err(CeremonyError::MissingArtifact {
                what: "constraint system",
                path: r1cs,
            });
        }
        if !parameters.path.is_file() {
            return Err(CeremonyError::MissingArtifact {
                what: "parameter file",
                path: parameters.path.clone(),
            });
        }
        let required = stats.required_power();
        if parameters.power < required {
            return Err(CeremonyError::InsufficientPowers {
                required,
                available: parameters.power,
            });
        }
        let zkey_path = self.layout.zkey();
        self.prover.setup(&r1cs, &parameters.path, &zkey_path)?;
        let zkey = Zkey::new(expect_output(zkey_path, "phase 1 key")?);
        log.wrote(zkey.path());
        manifest.record(
            Stage::Phase1,
            key_inputs.clone(),
            &[zkey.path().to_path_buf()],
            &self.layout,
        )?;
        self.state.advance(CeremonyState::Phase1Complete)?;
        finish(
            log,
            started,
            PhaseStatus::Ran,
            format!("setup over 2^{} powers", parameters.power),
            phases,
        );

        // phase 2
        let log = Narrator::new(self.sink, Stage::Phase2);
        log.started();
        let started = Instant::now();
        if !self.entropy.is_production_grade() {
            log.warn(format!(
                "contributing with {}, not suitable for a production ceremony",
                self.entropy.describe()
            ));
        }
        let contribution = self.entropy.contribution()?;
        let final_path = self.layout.final_zkey();
        let final_zkey = apply_contribution(
            self.prover,
            &zkey,
            &final_path,
            &self.config.contribution_label,
            &contribution,
        )?;
        expect_output(final_path, "final key")?;
        log.wrote(final_zkey.path());

        fs::remove_file(zkey.path())?;
        log.removed(zkey.path());

        manifest.record(
            Stage::Phase2,
            key_inputs,
            &[final_zkey.path().to_path_buf()],
            &self.layout,
        )?;
        self.state.advance(CeremonyState::Phase2Complete)?;
        let kind = if contribution.is_beacon() { "beacon" } else { "contribution" };
        finish(
            log,
            started,
            PhaseStatus::Ran,
            format!("{kind} \"{}\"", self.config.contribution_label),
            phases,
        );
        Ok(final_zkey)
    }

    fn export_stage(
        &mut self,
        zkey: &FinalZkey,
        manifest: &mut Manifest,
        phases: &mut Vec<PhaseInfo>,
    ) -> Result<VerificationKey> {
        let log = Narrator::new(self.sink, Stage::Export);
        log.started();
        let started = Instant::now();

        let inputs = recorded_outputs(manifest, Stage::Phase2);
        let (vkey, status) = if manifest.is_fresh(Stage::Export, &inputs, &self.layout) {
            log.skipped("verification key matches the final key");
            (
                export::load_verification_key(&self.layout.verification_key())?,
                PhaseStatus::Skipped,
            )
        } else {
            let vkey = export::export_verification_key(self.prover, zkey, &self.layout, self.sink)?;
            manifest.record(
                Stage::Export,
                inputs,
                &[self.layout.verification_key()],
                &self.layout,
            )?;
            (vkey, PhaseStatus::Ran)
        };
        self.state.advance(CeremonyState::Exported)?;
        finish(
            log,
            started,
            status,
            format!("nPublic={}, IC length={}", vkey.n_public, vkey.ic.len()),
            phases,
        );
        Ok(vkey)
    }

    fn verifier_stage(
        &mut self,
        zkey: &FinalZkey,
        vkey: &VerificationKey,
        manifest: &mut Manifest,
        phases: &mut Vec<PhaseInfo>,
    ) -> Result<GeneratedContract> {
        let log = Narrator::new(self.sink, Stage::Verifier);
        log.started();
        let started = Instant::now();

        let contract = export::generate_verifier_contract(
            self.prover,
            zkey,
            vkey,
            &self.config.contracts,
            &self.layout,
            self.sink,
        )?;
        manifest.record(
            Stage::Verifier,
            recorded_outputs(manifest, Stage::Export),
            &[contract.path.clone()],
            &self.layout,
        )?;
        self.state.advance(CeremonyState::VerifierGenerated)?;
        finish(
            log,
            started,
            PhaseStatus::Ran,
            format!(
                "{} for {} public signals",
                contract.contracts.join(" + "),
                contract.public_signals
            ),
            phases,
        );
        Ok(contract)
    }

    fn proof_stage(
        &mut self,
        zkey: &FinalZkey,
        vkey: &VerificationKey,
        manifest: &mut Manifest,
        phases: &mut Vec<PhaseInfo>,
    ) -> Result<ProofOutcome> {
        let log = Narrator::new(self.sink, Stage::ProofTest);
        log.started();
        let started = Instant::now();

        let input = match self.test_input {
            Some(input) => input,
            None => TestInput::reference(unix_now()?),
        };
        let system = SystemInfo {
            circuit: self.config.circuit_name.clone(),
            protocol: vkey.protocol.clone(),
            curve: vkey.curve.clone(),
            contribution_label: self.config.contribution_label.clone(),
            verifier_contract: self.config.contracts.verifier_name.clone(),
        };
        let smoke_test = SmokeTest {
            prover: self.prover,
            layout: &self.layout,
            sink: self.sink,
        };
        let outcome = smoke_test.run(&input, vkey, zkey, &self.config.proof_record, system)?;
        if !outcome.verified {
            log.error("the exported key does not verify its own proof");
        }

        manifest.record(
            Stage::ProofTest,
            recorded_outputs(manifest, Stage::Export),
            &[outcome.record_path.clone(), self.layout.test_input()],
            &self.layout,
        )?;
        self.state.advance(CeremonyState::ProofTested)?;
        let details = if outcome.verified {
            "proof verified"
        } else {
            "VERIFICATION MISMATCH"
        };
        finish(log, started, PhaseStatus::Ran, details.to_string(), phases);
        Ok(outcome)
    }
}

/// Re-verify a stored proof record against the exported verification key
pub fn verify_record(
    prover: &dyn ProvingSystem,
    layout: &ArtifactLayout,
    record_path: &std::path::Path,
) -> Result<bool> {
    let vkey = export::load_verification_key(&layout.verification_key())?;
    if !record_path.is_file() {
        return Err(CeremonyError::MissingArtifact {
            what: "proof record",
            path: record_path.to_path_buf(),
        });
    }
    let record = ProofRecord::load(record_path)?;
    prover.verify(&vkey, &record.public_signals, &record.proof)
}

fn finish(
    log: Narrator<'_>,
    started: Instant,
    status: PhaseStatus,
    details: String,
    phases: &mut Vec<PhaseInfo>,
) {
    let duration = started.elapsed();
    if status == PhaseStatus::Ran {
        log.completed(duration);
    }
    phases.push(PhaseInfo {
        stage: log.stage(),
        status,
        duration,
        details,
    });
}

fn recorded_outputs(manifest: &Manifest, stage: Stage) -> String {
    manifest
        .get(stage)
        .map(|record| record.outputs.clone())
        .unwrap_or_default()
}

fn expect_output(path: PathBuf, what: &'static str) -> Result<PathBuf> {
    if path.is_file() {
        Ok(path)
    } else {
        Err(CeremonyError::MissingArtifact { what, path })
    }
}

fn unix_now() -> Result<u64> {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|e| CeremonyError::Config(format!("system clock before epoch: {e}")))
}
