use crate::config::{EntropyConfig, EntropyMode};
use crate::errors::{CeremonyError, Result};
use rand::Rng;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

/// What the phase 2 contribution mixes into the key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Contribution {
    /// Secret randomness, discarded after use
    Entropy(Vec<u8>),
    /// Public beacon value applied `2^iterations_exp` times
    Beacon { hash: Vec<u8>, iterations_exp: u32 },
}

impl Contribution {
    pub fn is_beacon(&self) -> bool {
        matches!(self, Contribution::Beacon { .. })
    }
}

/// Source of contribution randomness
pub trait EntropySource {
    fn contribution(&mut self) -> Result<Contribution>;

    fn describe(&self) -> String;

    /// Whether the output is suitable for a production ceremony
    fn is_production_grade(&self) -> bool;
}

/// Start time, a PRNG draw and clock bits mixed into one string.
///
/// Not cryptographically sound: anyone who can bound the start time can narrow
/// the search space. Only for development ceremonies.
pub struct DevelopmentEntropy {
    started: Instant,
}

impl DevelopmentEntropy {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
        }
    }
}

impl Default for DevelopmentEntropy {
    fn default() -> Self {
        Self::new()
    }
}

impl EntropySource for DevelopmentEntropy {
    fn contribution(&mut self) -> Result<Contribution> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|e| CeremonyError::Config(format!("system clock before epoch: {e}")))?;
        let draw: u64 = rand::thread_rng().gen();
        let clock = self.started.elapsed().as_nanos();
        let material = format!("PDM-Production-{}{}{}", now.as_millis(), draw, clock);
        Ok(Contribution::Entropy(material.into_bytes()))
    }

    fn describe(&self) -> String {
        "development entropy (clock and PRNG)".to_string()
    }

    fn is_production_grade(&self) -> bool {
        false
    }
}

/// Fixed bytes for reproducible runs
pub struct TestingEntropy {
    bytes: Vec<u8>,
}

impl TestingEntropy {
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }
}

impl Default for TestingEntropy {
    fn default() -> Self {
        Self::new([0u8; 32])
    }
}

impl EntropySource for TestingEntropy {
    fn contribution(&mut self) -> Result<Contribution> {
        Ok(Contribution::Entropy(self.bytes.clone()))
    }

    fn describe(&self) -> String {
        "fixed testing entropy".to_string()
    }

    fn is_production_grade(&self) -> bool {
        false
    }
}

/// Public randomness beacon, e.g. a future block hash
pub struct BeaconEntropy {
    hash: Vec<u8>,
    iterations_exp: u32,
}

impl BeaconEntropy {
    pub fn new(hash: Vec<u8>, iterations_exp: u32) -> Self {
        Self {
            hash,
            iterations_exp,
        }
    }

    pub fn from_hex(hash: &str, iterations_exp: u32) -> Result<Self> {
        let hash = hex::decode(hash)
            .map_err(|e| CeremonyError::Config(format!("beacon hash is not hex: {e}")))?;
        Ok(Self::new(hash, iterations_exp))
    }
}

impl EntropySource for BeaconEntropy {
    fn contribution(&mut self) -> Result<Contribution> {
        Ok(Contribution::Beacon {
            hash: self.hash.clone(),
            iterations_exp: self.iterations_exp,
        })
    }

    fn describe(&self) -> String {
        format!(
            "beacon {} with 2^{} iterations",
            hex::encode(&self.hash),
            self.iterations_exp
        )
    }

    fn is_production_grade(&self) -> bool {
        true
    }
}

/// Entropy source selected by the configuration
pub fn from_config(config: &EntropyConfig) -> Result<Box<dyn EntropySource>> {
    Ok(match config.mode {
        EntropyMode::Testing => Box::new(TestingEntropy::default()),
        EntropyMode::Random => Box::new(DevelopmentEntropy::new()),
        EntropyMode::Beacon => {
            let hash = config.beacon_hash.as_deref().ok_or_else(|| {
                CeremonyError::Config("beacon mode needs entropy.beacon_hash".into())
            })?;
            Box::new(BeaconEntropy::from_hex(hash, config.beacon_iterations_exp)?)
        }
    })
}
