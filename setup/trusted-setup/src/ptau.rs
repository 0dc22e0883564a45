//! Powers of Tau parameter files: header parsing and the download fetcher.

use crate::errors::{CeremonyError, DownloadError, FailedAttempt, Result};
use crate::events::{EventKind, EventSink, Level, Narrator, Stage};
use crate::layout::ArtifactLayout;
use futures_util::StreamExt;
use nom::{
    bytes::complete::take,
    number::complete::{le_u32, le_u64},
    IResult,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;

const HEADER_PROBE_BYTES: u64 = 4096;
const UNKNOWN_LENGTH_PROGRESS_STEP: u64 = 8 * 1024 * 1024;

/// One place a parameter file can be downloaded from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PtauCandidate {
    pub name: String,
    pub url: String,
    /// Power of two exponent the file supports
    pub tier: u32,
}

impl PtauCandidate {
    pub fn new(name: impl Into<String>, url: impl Into<String>, tier: u32) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            tier,
        }
    }
}

/// Hermez tier 12 first, its mirror second, the smaller tier 10 file last
pub fn default_candidates() -> Vec<PtauCandidate> {
    vec![
        PtauCandidate::new(
            "hermez-12",
            "https://hermez.s3-eu-west-1.amazonaws.com/powersOfTau28_hez_final_12.ptau",
            12,
        ),
        PtauCandidate::new(
            "zkevm-mirror-12",
            "https://storage.googleapis.com/zkevm/ptau/powersOfTau28_hez_final_12.ptau",
            12,
        ),
        PtauCandidate::new(
            "hermez-10",
            "https://hermez.s3-eu-west-1.amazonaws.com/powersOfTau28_hez_final_10.ptau",
            10,
        ),
    ]
}

/// Header of a `.ptau` file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PtauHeader {
    pub version: u32,
    pub field_size: u32,
    pub power: u32,
    pub ceremony_power: u32,
}

impl PtauHeader {
    /// Reads only the leading bytes of the file
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut probe = Vec::new();
        fs::File::open(path)?
            .take(HEADER_PROBE_BYTES)
            .read_to_end(&mut probe)?;
        Self::parse(&probe)
    }

    pub fn parse(data: &[u8]) -> Result<Self> {
        let (_, header) =
            parse_ptau(data).map_err(|e| CeremonyError::Ptau(format!("{e:?}")))?;
        Ok(header)
    }
}

fn parse_ptau(input: &[u8]) -> IResult<&[u8], PtauHeader> {
    let (input, magic) = take(4usize)(input)?;
    if magic != b"ptau" {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Tag,
        )));
    }
    let (input, version) = le_u32(input)?;
    let (input, _sections) = le_u32(input)?;
    // the header is always the first section
    let (input, section_type) = le_u32(input)?;
    if section_type != 1 {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }
    let (input, _section_size) = le_u64(input)?;
    let (input, field_size) = le_u32(input)?;
    let (input, _prime) = take(field_size)(input)?;
    let (input, power) = le_u32(input)?;
    let (input, ceremony_power) = le_u32(input)?;

    Ok((
        input,
        PtauHeader {
            version,
            field_size,
            power,
            ceremony_power,
        },
    ))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParameterOrigin {
    Cached,
    Downloaded { url: String },
}

/// A validated parameter file on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterFile {
    pub path: PathBuf,
    pub tier: u32,
    pub bytes: u64,
    pub power: u32,
    pub origin: ParameterOrigin,
}

/// Downloads parameter files with ordered fallback
pub struct ParameterFetcher {
    client: reqwest::Client,
    min_bytes: u64,
    timeout: Duration,
}

impl ParameterFetcher {
    pub fn new(min_bytes: u64, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::limited(1))
            .timeout(timeout)
            .build()
            .map_err(|err| CeremonyError::Config(format!("unable to build HTTP client: {err}")))?;
        Ok(Self {
            client,
            min_bytes,
            timeout,
        })
    }

    pub fn min_bytes(&self) -> u64 {
        self.min_bytes
    }

    /// Returns the first candidate that yields a valid file
    pub async fn fetch(
        &self,
        candidates: &[PtauCandidate],
        layout: &ArtifactLayout,
        required_power: u32,
        sink: &dyn EventSink,
    ) -> Result<ParameterFile> {
        let log = Narrator::new(sink, Stage::Parameters);

        let usable: Vec<&PtauCandidate> = candidates
            .iter()
            .filter(|candidate| {
                let fits = candidate.tier >= required_power;
                if !fits {
                    log.warn(format!(
                        "skipping {}: tier {} cannot hold a circuit needing 2^{}",
                        candidate.name, candidate.tier, required_power
                    ));
                }
                fits
            })
            .collect();
        if usable.is_empty() {
            return Err(CeremonyError::InsufficientPowers {
                required: required_power,
                available: candidates.iter().map(|c| c.tier).max().unwrap_or(0),
            });
        }

        // any valid file already on disk wins over a download
        let mut seen = Vec::new();
        for candidate in &usable {
            let path = layout.ptau(candidate.tier);
            if seen.contains(&path) {
                continue;
            }
            match self.check_existing(&path, required_power) {
                Ok(Some(file)) => {
                    log.info(format!(
                        "reusing {} ({} bytes, 2^{})",
                        path.display(),
                        file.bytes,
                        file.power
                    ));
                    return Ok(ParameterFile {
                        tier: candidate.tier,
                        ..file
                    });
                }
                Ok(None) => {}
                Err(reason) => {
                    log.warn(format!("discarding {}: {reason}", path.display()));
                    remove_quietly(&path);
                    log.removed(&path);
                }
            }
            seen.push(path);
        }

        let mut attempts = Vec::new();
        for candidate in usable {
            let path = layout.ptau(candidate.tier);
            log.emit(
                Level::Info,
                EventKind::DownloadAttempt {
                    url: candidate.url.clone(),
                    tier: candidate.tier,
                },
            );
            match self.download(&candidate.url, &path, required_power, log).await {
                Ok((bytes, power)) => {
                    log.wrote(&path);
                    return Ok(ParameterFile {
                        path,
                        tier: candidate.tier,
                        bytes,
                        power,
                        origin: ParameterOrigin::Downloaded {
                            url: candidate.url.clone(),
                        },
                    });
                }
                Err(reason) => {
                    remove_quietly(&path);
                    log.emit(
                        Level::Warn,
                        EventKind::DownloadFailed {
                            url: candidate.url.clone(),
                            reason: reason.to_string(),
                        },
                    );
                    attempts.push(FailedAttempt {
                        url: candidate.url.clone(),
                        reason,
                    });
                }
            }
        }

        Err(CeremonyError::DownloadFailure { attempts })
    }

    /// `Ok(None)` when nothing usable is on disk yet
    fn check_existing(
        &self,
        path: &Path,
        required_power: u32,
    ) -> std::result::Result<Option<ParameterFile>, DownloadError> {
        let bytes = match fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(_) => return Ok(None),
        };
        let power = self.validate(path, bytes, required_power)?;
        Ok(Some(ParameterFile {
            path: path.to_path_buf(),
            tier: power,
            bytes,
            power,
            origin: ParameterOrigin::Cached,
        }))
    }

    fn validate(
        &self,
        path: &Path,
        bytes: u64,
        required_power: u32,
    ) -> std::result::Result<u32, DownloadError> {
        if bytes <= self.min_bytes {
            return Err(DownloadError::TooSmall {
                bytes,
                min: self.min_bytes,
            });
        }
        let header = PtauHeader::read(path).map_err(|e| DownloadError::Corrupt(e.to_string()))?;
        if header.power < required_power {
            return Err(DownloadError::Capacity {
                power: header.power,
                required: required_power,
            });
        }
        Ok(header.power)
    }

    async fn download(
        &self,
        url: &str,
        path: &Path,
        required_power: u32,
        log: Narrator<'_>,
    ) -> std::result::Result<(u64, u32), DownloadError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| self.classify(e))?;
        if response.status() != reqwest::StatusCode::OK {
            return Err(DownloadError::Status(response.status().as_u16()));
        }

        let total = response.content_length();
        let step = match total {
            Some(total) if total > 0 => (total / 10).max(1),
            _ => UNKNOWN_LENGTH_PROGRESS_STEP,
        };

        let mut file = tokio::fs::File::create(path).await?;
        let mut received = 0u64;
        let mut next_report = step;
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| self.classify(e))?;
            file.write_all(&chunk).await?;
            received += chunk.len() as u64;
            if received >= next_report {
                log.emit(Level::Debug, EventKind::DownloadProgress { received, total });
                next_report = received + step;
            }
        }
        file.flush().await?;
        drop(file);

        let power = self.validate(path, received, required_power)?;
        Ok((received, power))
    }

    fn classify(&self, err: reqwest::Error) -> DownloadError {
        if err.is_timeout() {
            DownloadError::Timeout(self.timeout)
        } else {
            DownloadError::Transport(err)
        }
    }
}

fn remove_quietly(path: &Path) {
    let _ = fs::remove_file(path);
}
