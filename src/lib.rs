//! Chaff scheduling for side-channel resistant block encryption.
//!
//! A power or EM trace of a single AES encryption leaks its key. This crate runs the genuine
//! encryption concurrently with several *chaff* encryptions under keys derived from the real one,
//! so that the trace captured between the rise and fall triggers is a superposition of all of
//! them and cannot be attributed to the genuine computation.
//!
//! - [`derive`] builds one real and `L - 1` decoy key schedules by iterating a physical identity
//!   function (a PUF) from the real key.
//! - [`lane`] holds the fixed registry of lane control blocks.
//! - [`task`] contains the bodies of the full-round and jitter chaff tasks.
//! - [`scheduler`] is the batch scheduler: it respawns every lane each iteration, releases them
//!   together at the rise trigger, waits for the genuine lane and tears the rest down.
//! - [`runtime`] abstracts the preemptive task primitives the host RTOS provides;
//!   [`runtime::hosted`] implements them on OS threads.
//!
//! Ciphers are pluggable through [`BlockTransform`]:
//!
//! -  AES-128/192/256 ✓
//! -  Masked AES-128/192/256 ✓
//! -  CLEFIA-128 ✓

#[macro_use] mod util;

pub mod aes;
mod block;
pub mod clefia;
pub mod config;
pub mod derive;
pub mod entropy;
mod error;
pub mod fault;
pub mod lane;
pub mod runtime;
pub mod scheduler;
pub mod task;
pub mod trigger;

pub use self::block::{Block, BLOCK_LEN};
pub use self::config::ChaffConfig;
pub use self::error::{ChaffError, Result};
pub use self::scheduler::BatchScheduler;
pub use self::util::{parse_hex, to_hex};

use core::cmp;

/// A keyed block transform which can be stopped after any round.
///
/// Implementations must be safe to call concurrently from independent lanes as long as each call
/// uses its own schedule and state.
pub trait BlockTransform: Send + Sync + 'static {
    /// An expanded key.
    type Schedule: Send + Sync + 'static;

    /// A short name used in logs and configuration.
    const NAME: &'static str;

    /// Expands a raw key into a key schedule.
    fn key_expand(&self, key: &[u8]) -> Result<Self::Schedule>;

    /// The raw key material a schedule was expanded from.
    fn raw_key<'a>(&self, schedule: &'a Self::Schedule) -> &'a [u8];

    /// The number of rounds in a full encryption.
    fn rounds(&self, schedule: &Self::Schedule) -> usize;

    /// Applies one step of the encryption in-place.
    ///
    /// Step `0` is the initial key whitening. Steps `1..=rounds` are the rounds; step `rounds`
    /// also applies any final whitening.
    fn apply_round(&self, schedule: &Self::Schedule, state: &mut Block, step: usize);

    /// Encrypts `state` in-place.
    fn encrypt_full(&self, schedule: &Self::Schedule, state: &mut Block) {
        for step in 0..=self.rounds(schedule) {
            self.apply_round(schedule, state, step);
        }
    }

    /// Runs the key whitening and the first `count` rounds of an encryption in-place.
    ///
    /// A `count` of at least `rounds` is a full encryption.
    fn encrypt_rounds(&self, schedule: &Self::Schedule, state: &mut Block, count: usize) {
        let last = cmp::min(count, self.rounds(schedule));
        for step in 0..=last {
            self.apply_round(schedule, state, step);
        }
    }
}
