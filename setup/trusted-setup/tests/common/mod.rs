#![allow(dead_code)]

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::Router;
use pdm_trusted_setup::{
    CeremonyConfig, CeremonyError, CircuitCompiler, EntropyMode, FinalZkey, Groth16Proof,
    ProofOutput, ProvingSystem, PtauCandidate, R1csHeader, Result, VerificationKey,
};
use std::collections::HashMap;
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const MIN_BYTES: u64 = 2_048;

pub const GENERATED_VERIFIER: &str = "// SPDX-License-Identifier: GPL-3.0
pragma solidity >=0.7.0 <0.9.0;

contract Groth16Verifier {
    function verifyProof(uint[2] calldata _pA, uint[2][2] calldata _pB, uint[2] calldata _pC, uint[3] calldata _pubSignals) public view returns (bool) {
        return true;
    }
}
";

pub fn r1cs_bytes(constraints: u32, outputs: u32, inputs: u32, private: u32) -> Vec<u8> {
    let mut header = Vec::new();
    header.extend_from_slice(&32u32.to_le_bytes());
    header.extend_from_slice(&[0x30; 32]);
    header.extend_from_slice(&(constraints + 10).to_le_bytes());
    header.extend_from_slice(&outputs.to_le_bytes());
    header.extend_from_slice(&inputs.to_le_bytes());
    header.extend_from_slice(&private.to_le_bytes());
    header.extend_from_slice(&0u64.to_le_bytes());
    header.extend_from_slice(&constraints.to_le_bytes());

    let mut data = b"r1cs".to_vec();
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&(header.len() as u64).to_le_bytes());
    data.extend_from_slice(&header);
    data
}

/// A parameter file with a valid header, padded past [`MIN_BYTES`]
pub fn ptau_bytes(power: u32) -> Vec<u8> {
    ptau_bytes_with_len(power, MIN_BYTES as usize + 512)
}

pub fn ptau_bytes_with_len(power: u32, len: usize) -> Vec<u8> {
    let mut data = b"ptau".to_vec();
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&11u32.to_le_bytes());
    data.extend_from_slice(&1u32.to_le_bytes());
    data.extend_from_slice(&44u64.to_le_bytes());
    data.extend_from_slice(&32u32.to_le_bytes());
    data.extend_from_slice(&[0x47; 32]);
    data.extend_from_slice(&power.to_le_bytes());
    data.extend_from_slice(&power.to_le_bytes());
    data.resize(len.max(data.len()), 0x5a);
    data
}

fn tool_failure(detail: &str) -> CeremonyError {
    CeremonyError::ExternalToolFailure {
        tool: "scripted".to_string(),
        detail: detail.to_string(),
    }
}

fn digest(parts: &[&[u8]]) -> String {
    let mut hasher = blake3::Hasher::new();
    for part in parts {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part);
    }
    hasher.finalize().to_hex().to_string()
}

/// Writes the outputs a circuit compiler would, with a fixed R1CS header
pub struct ScriptedCompiler {
    pub constraints: u32,
    pub public_outputs: u32,
    pub calls: AtomicUsize,
}

impl ScriptedCompiler {
    pub fn new(constraints: u32) -> Self {
        Self {
            constraints,
            public_outputs: 0,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl CircuitCompiler for ScriptedCompiler {
    fn compile(&self, source: &Path, out_dir: &Path) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let circuit = source
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| tool_failure("source has no file stem"))?;
        fs::create_dir_all(out_dir.join(format!("{circuit}_js")))?;
        fs::write(
            out_dir.join(format!("{circuit}.r1cs")),
            r1cs_bytes(self.constraints, self.public_outputs, 3, 3),
        )?;
        fs::write(
            out_dir.join(format!("{circuit}_js")).join(format!("{circuit}.wasm")),
            fs::read(source)?,
        )?;
        Ok(())
    }

    fn name(&self) -> &str {
        "scripted-circom"
    }
}

/// In-memory Groth16 stand-in.
///
/// Keys are files whose content chains the digests of their inputs. The
/// verification key commits to the final key in `vk_alpha_1`, and a proof is
/// valid iff its `pi_a` equals the digest of that commitment and the public
/// signals. The mock circuit rejects `claimedAccuracy > actualAccuracy`.
pub struct ScriptedProver {
    pub n_public: usize,
    reject_proofs: bool,
    calls: Mutex<HashMap<&'static str, usize>>,
}

impl ScriptedProver {
    pub fn new() -> Self {
        Self {
            n_public: 3,
            reject_proofs: false,
            calls: Mutex::new(HashMap::new()),
        }
    }

    /// Proves normally but reports every proof as invalid
    pub fn rejecting() -> Self {
        Self {
            reject_proofs: true,
            ..Self::new()
        }
    }

    pub fn calls(&self, op: &str) -> usize {
        self.calls.lock().unwrap().get(op).copied().unwrap_or(0)
    }

    fn count(&self, op: &'static str) {
        *self.calls.lock().unwrap().entry(op).or_default() += 1;
    }

    fn contributed(&self, zkey_in: &Path, zkey_out: &Path, parts: &[&[u8]]) -> Result<()> {
        let previous = fs::read(zkey_in)?;
        if !previous.starts_with(b"phase1:") && !previous.starts_with(b"final:") {
            return Err(tool_failure("input is not a proving key"));
        }
        let mut all: Vec<&[u8]> = vec![previous.as_slice()];
        all.extend_from_slice(parts);
        fs::write(zkey_out, format!("final:{}", digest(&all)))?;
        Ok(())
    }
}

fn field(input: &serde_json::Value, name: &str) -> Result<u64> {
    input[name]
        .as_u64()
        .ok_or_else(|| tool_failure(&format!("input lacks {name}")))
}

impl ProvingSystem for ScriptedProver {
    fn setup(&self, r1cs: &Path, ptau: &Path, zkey_out: &Path) -> Result<()> {
        self.count("setup");
        R1csHeader::read(r1cs)?;
        let r1cs = fs::read(r1cs)?;
        let ptau = fs::read(ptau)?;
        fs::write(zkey_out, format!("phase1:{}", digest(&[&r1cs[..], &ptau[..]])))?;
        Ok(())
    }

    fn contribute(&self, zkey_in: &Path, zkey_out: &Path, label: &str, entropy: &[u8]) -> Result<()> {
        self.count("contribute");
        self.contributed(zkey_in, zkey_out, &[label.as_bytes(), entropy])
    }

    fn beacon(
        &self,
        zkey_in: &Path,
        zkey_out: &Path,
        label: &str,
        hash: &[u8],
        iterations_exp: u32,
    ) -> Result<()> {
        self.count("beacon");
        self.contributed(
            zkey_in,
            zkey_out,
            &[label.as_bytes(), hash, &iterations_exp.to_le_bytes()[..]],
        )
    }

    fn export_verification_key(&self, zkey: &FinalZkey) -> Result<VerificationKey> {
        self.count("export_verification_key");
        let key = fs::read(zkey.path())?;
        let point = |tag: &str| vec![digest(&[&key[..], tag.as_bytes()]), "1".to_string()];
        Ok(VerificationKey {
            protocol: "groth16".into(),
            curve: "bn128".into(),
            n_public: self.n_public,
            vk_alpha_1: vec![digest(&[&key[..]]), "1".into()],
            vk_beta_2: vec![point("beta")],
            vk_gamma_2: vec![point("gamma")],
            vk_delta_2: vec![point("delta")],
            vk_alphabeta_12: serde_json::Value::Null,
            ic: (0..=self.n_public).map(|i| point(&format!("ic{i}"))).collect(),
        })
    }

    fn export_solidity_verifier(&self, zkey: &FinalZkey) -> Result<String> {
        self.count("export_solidity_verifier");
        fs::metadata(zkey.path())?;
        Ok(GENERATED_VERIFIER.replace("uint[3]", &format!("uint[{}]", self.n_public)))
    }

    fn full_prove(
        &self,
        input: &serde_json::Value,
        wasm: &Path,
        zkey: &FinalZkey,
    ) -> Result<ProofOutput> {
        self.count("full_prove");
        fs::metadata(wasm)?;
        if field(input, "claimedAccuracy")? > field(input, "actualAccuracy")? {
            return Err(tool_failure(
                "Error: Assert Failed. claimedAccuracy <= actualAccuracy",
            ));
        }
        let mut public_signals = Vec::new();
        if self.n_public == 4 {
            public_signals.push("1".to_string());
        }
        for name in ["modelCommitment", "claimedAccuracy", "timestamp"] {
            public_signals.push(field(input, name)?.to_string());
        }

        let key = fs::read(zkey.path())?;
        let commitment = digest(&[&key[..]]);
        let proof = Groth16Proof {
            pi_a: vec![proof_digest(&commitment, &public_signals), "1".into()],
            pi_b: vec![vec!["0".into(), "1".into()]],
            pi_c: vec![digest(&[commitment.as_bytes(), &b"c"[..]]), "1".into()],
            protocol: "groth16".into(),
            curve: "bn128".into(),
        };
        Ok(ProofOutput {
            proof,
            public_signals,
        })
    }

    fn verify(
        &self,
        vkey: &VerificationKey,
        public_signals: &[String],
        proof: &Groth16Proof,
    ) -> Result<bool> {
        self.count("verify");
        if self.reject_proofs {
            return Ok(false);
        }
        let Some(commitment) = vkey.vk_alpha_1.first() else {
            return Ok(false);
        };
        Ok(public_signals.len() == vkey.n_public
            && proof.pi_a.first() == Some(&proof_digest(commitment, public_signals)))
    }
}

fn proof_digest(commitment: &str, public_signals: &[String]) -> String {
    let mut parts: Vec<&[u8]> = vec![commitment.as_bytes()];
    parts.extend(public_signals.iter().map(|s| s.as_bytes()));
    digest(&parts)
}

/// Build directory, circuit source and a config pointing at `candidates`
pub fn test_config(root: &Path, candidates: Vec<PtauCandidate>) -> CeremonyConfig {
    let source = root.join("pdm_verification.circom");
    fs::write(&source, "pragma circom 2.0.0;\ntemplate PDM() {}\n").unwrap();

    let mut config = CeremonyConfig::default();
    config.build_dir = root.join("build");
    config.circuit_source = source;
    config.entropy.mode = EntropyMode::Testing;
    config.parameters.candidates = candidates;
    config.parameters.min_bytes = MIN_BYTES;
    config.parameters.timeout_secs = 5;
    config
}

#[derive(Clone, Default)]
pub struct ServerState {
    pub hits: Arc<Mutex<HashMap<String, usize>>>,
}

impl ServerState {
    pub fn hits(&self, route: &str) -> usize {
        self.hits.lock().unwrap().get(route).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.hits.lock().unwrap().values().sum()
    }

    fn hit(&self, route: &str) {
        *self.hits.lock().unwrap().entry(route.to_string()).or_default() += 1;
    }
}

async fn serve_ptau12(State(state): State<ServerState>) -> Response {
    state.hit("/ptau12");
    ptau_bytes(12).into_response()
}

async fn serve_ptau10(State(state): State<ServerState>) -> Response {
    state.hit("/ptau10");
    ptau_bytes(10).into_response()
}

async fn serve_small(State(state): State<ServerState>) -> Response {
    state.hit("/small");
    ptau_bytes_with_len(12, 256).into_response()
}

async fn serve_garbage(State(state): State<ServerState>) -> Response {
    state.hit("/garbage");
    vec![0u8; MIN_BYTES as usize * 2].into_response()
}

async fn serve_error(State(state): State<ServerState>) -> Response {
    state.hit("/error");
    (StatusCode::INTERNAL_SERVER_ERROR, "bucket unavailable").into_response()
}

async fn serve_missing(State(state): State<ServerState>) -> Response {
    state.hit("/missing");
    StatusCode::NOT_FOUND.into_response()
}

async fn redirect_once(State(state): State<ServerState>) -> Redirect {
    state.hit("/redirect-once");
    Redirect::temporary("/ptau12")
}

async fn redirect_twice(State(state): State<ServerState>) -> Redirect {
    state.hit("/redirect-twice");
    Redirect::temporary("/redirect-once")
}

async fn serve_slow(State(state): State<ServerState>) -> Response {
    state.hit("/slow");
    tokio::time::sleep(std::time::Duration::from_secs(10)).await;
    ptau_bytes(12).into_response()
}

/// Parameter host on an ephemeral loopback port
pub async fn spawn_parameter_server() -> (SocketAddr, ServerState) {
    let state = ServerState::default();
    let app = Router::new()
        .route("/ptau12", get(serve_ptau12))
        .route("/ptau10", get(serve_ptau10))
        .route("/small", get(serve_small))
        .route("/garbage", get(serve_garbage))
        .route("/error", get(serve_error))
        .route("/missing", get(serve_missing))
        .route("/redirect-once", get(redirect_once))
        .route("/redirect-twice", get(redirect_twice))
        .route("/slow", get(serve_slow))
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind test listener");
    let addr = listener.local_addr().expect("addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (addr, state)
}

pub fn candidate(addr: SocketAddr, route: &str, tier: u32) -> PtauCandidate {
    PtauCandidate::new(route.trim_start_matches('/'), format!("http://{addr}{route}"), tier)
}

pub fn files_in(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .map(|entries| entries.filter_map(|e| e.ok()).map(|e| e.path()).collect())
        .unwrap_or_default();
    files.sort();
    files
}
