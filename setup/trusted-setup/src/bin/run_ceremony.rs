use clap::{Parser, Subcommand};
use pdm_trusted_setup::{
    verify_record, ArtifactLayout, CeremonyConfig, CeremonyError, CircomCompiler, EntropyMode,
    Manifest, SnarkjsCli, Stage, TracingSink, TrustedSetupCeremony,
};
use std::error::Error as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "PDM Groth16 trusted setup ceremony", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the full pipeline
    Run {
        /// TOML configuration file
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        #[arg(long, value_name = "DIR")]
        build_dir: Option<PathBuf>,

        /// Circuit source file
        #[arg(long, value_name = "FILE")]
        circuit: Option<PathBuf>,

        #[arg(long, value_enum, value_name = "MODE")]
        entropy_mode: Option<EntropyMode>,

        /// Hex encoded beacon value
        #[arg(long, value_name = "HEX")]
        beacon_hash: Option<String>,

        /// Contribution label recorded in the final key
        #[arg(long)]
        label: Option<String>,

        /// Redo setup, contribution and export even if the manifest has them
        #[arg(long)]
        force: bool,
    },
    /// Write a reference configuration file
    GenerateConfig {
        #[arg(long, default_value = "ceremony.toml")]
        path: PathBuf,
    },
    /// Print the recorded stages of a build directory
    Status {
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Re-verify a stored proof record against the exported verification key
    Verify {
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,

        /// Proof record, defaults to the configured one
        #[arg(long, value_name = "FILE")]
        proof: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Run {
            config,
            build_dir,
            circuit,
            entropy_mode,
            beacon_hash,
            label,
            force,
        } => {
            let overrides = Overrides {
                build_dir,
                circuit,
                entropy_mode,
                beacon_hash,
                label,
            };
            run(config.as_deref(), overrides, force).await
        }
        Commands::GenerateConfig { path } => generate_config(&path),
        Commands::Status { config } => status(config.as_deref()),
        Commands::Verify { config, proof } => verify(config.as_deref(), proof),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report_failure(&err);
            ExitCode::FAILURE
        }
    }
}

struct Overrides {
    build_dir: Option<PathBuf>,
    circuit: Option<PathBuf>,
    entropy_mode: Option<EntropyMode>,
    beacon_hash: Option<String>,
    label: Option<String>,
}

fn load_config(path: Option<&Path>) -> Result<CeremonyConfig, CeremonyError> {
    match path {
        Some(path) => CeremonyConfig::load(path),
        None => Ok(CeremonyConfig::default()),
    }
}

async fn run(path: Option<&Path>, overrides: Overrides, force: bool) -> Result<(), CeremonyError> {
    let mut config = load_config(path)?;
    if let Some(dir) = overrides.build_dir {
        config.build_dir = dir;
    }
    if let Some(circuit) = overrides.circuit {
        config.circuit_source = circuit;
    }
    if let Some(mode) = overrides.entropy_mode {
        config.entropy.mode = mode;
    }
    if let Some(hash) = overrides.beacon_hash {
        config.entropy.beacon_hash = Some(hash);
    }
    if let Some(label) = overrides.label {
        config.contribution_label = label;
    }

    tracing::info!(
        circuit = %config.circuit_name,
        build_dir = %config.build_dir.display(),
        label = %config.contribution_label,
        "starting PDM trusted setup ceremony"
    );

    let compiler = CircomCompiler::new(&config.compiler);
    let prover = SnarkjsCli::new(&config.snarkjs)?;
    let sink = TracingSink;
    let mut ceremony = TrustedSetupCeremony::new(config, &compiler, &prover, &sink)?.force(force);
    let report = ceremony.run().await?;

    println!("\n{report}");
    if !report.proof.verified {
        tracing::error!("smoke test proof failed verification, see the report above");
    }
    Ok(())
}

fn generate_config(path: &Path) -> Result<(), CeremonyError> {
    CeremonyConfig::default().save(path)?;
    println!("wrote reference configuration to {}", path.display());
    Ok(())
}

fn status(path: Option<&Path>) -> Result<(), CeremonyError> {
    let config = load_config(path)?;
    let layout = ArtifactLayout::new(&config.build_dir, &config.circuit_name);
    let manifest = Manifest::load(&layout.manifest())?;

    println!("📋 Ceremony status for {}", layout.build_dir().display());
    for stage in Stage::ALL {
        match manifest.get(stage) {
            Some(record) => {
                let intact = manifest.is_fresh(stage, &record.inputs, &layout);
                println!(
                    "  {} {}: {} ({})",
                    if intact { "✅" } else { "⚠️ " },
                    stage,
                    record.completed_at.to_rfc3339(),
                    if intact {
                        record.artifacts.join(", ")
                    } else {
                        "artifacts changed since recorded".to_string()
                    }
                );
            }
            None => println!("  ⬜ {stage}: not recorded"),
        }
    }
    Ok(())
}

fn verify(path: Option<&Path>, proof: Option<PathBuf>) -> Result<(), CeremonyError> {
    let config = load_config(path)?;
    let layout = ArtifactLayout::new(&config.build_dir, &config.circuit_name);
    let record = proof.unwrap_or_else(|| layout.proof_record(&config.proof_record));
    let prover = SnarkjsCli::new(&config.snarkjs)?;

    if verify_record(&prover, &layout, &record)? {
        println!("✅ {} verifies", record.display());
    } else {
        println!("❌ {} does not verify", record.display());
    }
    Ok(())
}

fn report_failure(err: &CeremonyError) {
    eprintln!("\n❌ Ceremony failed: {err}");
    let mut source = err.source();
    while let Some(cause) = source {
        eprintln!("   caused by: {cause}");
        source = cause.source();
    }
    eprintln!("\n🔧 Troubleshooting:");
    for hint in err.remediation() {
        eprintln!("   - {hint}");
    }
}
