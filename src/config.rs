//! Campaign configuration.
//!
//! Every field has a default matching the reference firmware build, so an empty TOML document is
//! a valid configuration:
//!
//! ```toml
//! lanes = 4
//! batches = 1024
//! jitter_max_rounds = 4
//! cipher = "aes"
//! key = "2b7e151628aed2a6abf7158809cf4f3c"
//!
//! [idle]
//! policy = "spin"
//! iterations = 50000
//! ```

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use static_assertions::const_assert;
use try_from::TryFrom;

use crate::{util::parse_hex, Block, ChaffError, Result};

/// The largest supported number of lanes.
pub const MAX_LANES: usize = 16;

/// The largest supported jitter round bound.
pub const MAX_JITTER_ROUNDS: u8 = 8;

// Lane tags are stored in a byte.
const_assert!(MAX_LANES <= 1 + u8::MAX as usize);

/// Number of lanes in the reference build: the genuine lane, two decoys and the jitter lane.
pub const DEFAULT_LANES: usize = 4;

/// Number of batch iterations in the reference build.
pub const DEFAULT_BATCHES: u32 = 1024;

/// FIPS-197 Appendix B key.
pub const DEFAULT_KEY: &str = "2b7e151628aed2a6abf7158809cf4f3c";

/// The plaintext the first iteration encrypts.
pub const DEFAULT_INITIAL_STATE: &str = "40414041404141414141414141414141";

/// Device key of the emulated physical identity function.
pub const DEFAULT_PUF_KEY: &str = "2a7114b63f1e0217abf710b809cf7a9a";

/// How the batch scheduler idles between the fall of one iteration and the rise of the next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum IdlePolicy {
    /// Busy-loop for a fixed number of iterations, as bare-metal firmware does.
    Spin { iterations: u32 },

    /// Sleep the scheduler thread.
    Sleep { micros: u64 },
}

impl Default for IdlePolicy {
    fn default() -> Self {
        IdlePolicy::Spin { iterations: 50_000 }
    }
}

impl IdlePolicy {
    pub fn idle(&self) {
        match *self {
            IdlePolicy::Spin { iterations } => {
                for i in 0..iterations {
                    std::hint::black_box(i);
                }
            }

            IdlePolicy::Sleep { micros } => std::thread::sleep(Duration::from_micros(micros)),
        }
    }
}

/// How the batch scheduler waits for the genuine lane to finish.
///
/// `Spin` polls the completion flag and yields between polls. It keeps the scheduler's own
/// activity inside the measurement window, which changes the trace shape but matches the
/// firmware. `Notify` blocks on a condition variable until the genuine lane signals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitStrategy {
    Spin,
    Notify,
}

impl Default for WaitStrategy {
    fn default() -> Self {
        WaitStrategy::Spin
    }
}

/// The cipher a campaign protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CipherKind {
    Aes,
    MaskedAes,
    Clefia,
}

impl Default for CipherKind {
    fn default() -> Self {
        CipherKind::Aes
    }
}

impl FromStr for CipherKind {
    type Err = ChaffError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "aes" => Ok(CipherKind::Aes),
            "masked_aes" => Ok(CipherKind::MaskedAes),
            "clefia" => Ok(CipherKind::Clefia),
            _ => Err(ChaffError::UnknownCipher(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ChaffConfig {
    /// Total lanes, including the genuine one. `1` runs the cipher alone as a baseline.
    pub lanes: usize,

    /// Number of batch iterations before the scheduler halts.
    pub batches: u32,

    /// The jitter lane runs between 1 and this many rounds.
    pub jitter_max_rounds: u8,

    pub idle: IdlePolicy,

    pub wait: WaitStrategy,

    /// Stack size of each lane thread on the hosted runtime.
    pub stack_size: usize,

    /// Halt permanently once the campaign completes instead of returning.
    pub halt_on_complete: bool,

    pub cipher: CipherKind,

    /// The real key, as hex.
    pub key: String,

    /// The first plaintext, as hex.
    pub initial_state: String,

    /// Device key of the emulated physical identity function, as hex.
    pub puf_key: String,
}

impl Default for ChaffConfig {
    fn default() -> Self {
        ChaffConfig {
            lanes: DEFAULT_LANES,
            batches: DEFAULT_BATCHES,
            jitter_max_rounds: 4,
            idle: IdlePolicy::default(),
            wait: WaitStrategy::default(),
            stack_size: 64 * 1024,
            halt_on_complete: true,
            cipher: CipherKind::default(),
            key: DEFAULT_KEY.to_owned(),
            initial_state: DEFAULT_INITIAL_STATE.to_owned(),
            puf_key: DEFAULT_PUF_KEY.to_owned(),
        }
    }
}

impl ChaffConfig {
    /// Loads and validates a configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ChaffError::ConfigIo)?;
        Self::from_toml(&content)
    }

    /// Parses and validates a TOML document.
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ChaffConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the lane, batch and jitter bounds and that all hex fields parse.
    pub fn validate(&self) -> Result<()> {
        if self.lanes == 0 || self.lanes > MAX_LANES {
            return Err(ChaffError::InvalidLaneCount { lanes: self.lanes, max: MAX_LANES });
        }

        if self.batches == 0 {
            return Err(ChaffError::EmptyCampaign);
        }

        if self.jitter_max_rounds == 0 || self.jitter_max_rounds > MAX_JITTER_ROUNDS {
            return Err(ChaffError::InvalidJitterBound {
                bound: self.jitter_max_rounds,
                max: MAX_JITTER_ROUNDS,
            });
        }

        self.key_bytes()?;
        self.initial_block()?;
        self.puf_key_bytes()?;
        Ok(())
    }

    pub fn key_bytes(&self) -> Result<Vec<u8>> {
        parse_hex(&self.key)
    }

    pub fn initial_block(&self) -> Result<Block> {
        Block::try_from(&parse_hex(&self.initial_state)?[..])
    }

    pub fn puf_key_bytes(&self) -> Result<Vec<u8>> {
        parse_hex(&self.puf_key)
    }
}
