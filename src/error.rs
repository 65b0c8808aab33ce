//! Errors raised while setting up or running a chaff campaign.
//!
//! Every error is fatal: setup errors are reported before the scheduler starts, and runtime
//! errors stop the campaign. Nothing is retried.

use std::io;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChaffError {
    #[error("invalid key length: {len} bytes")]
    InvalidKeyLength { len: usize },

    #[error("invalid block length: expected 16 bytes, got {len}")]
    InvalidBlockLength { len: usize },

    #[error("invalid lane count {lanes}: expected 1..={max}")]
    InvalidLaneCount { lanes: usize, max: usize },

    #[error("batch count must be at least 1")]
    EmptyCampaign,

    #[error("jitter round bound {bound} outside 1..={max}")]
    InvalidJitterBound { bound: u8, max: u8 },

    #[error("unknown cipher `{0}`")]
    UnknownCipher(String),

    #[error("invalid hex digit {ch:?}")]
    InvalidHex { ch: char },

    #[error("hex string has odd length {len}")]
    OddHexLength { len: usize },

    #[error("failed to spawn task for lane {tag}")]
    Spawn {
        tag: u8,
        #[source]
        source: io::Error,
    },

    #[error("task `{name}` terminated abnormally")]
    TaskFault { name: String },

    #[error("failed to read config: {0}")]
    ConfigIo(#[source] io::Error),

    #[error("failed to parse config: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

pub type Result<T> = core::result::Result<T, ChaffError>;
