//! Sources of randomness for the jitter lane.

use core::ptr;
use core::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;
use rand_core::RngCore;

/// Address of the TRNG output register on the reference SoC.
pub const TRNG_ADDRESS: usize = 0x0040_0000;

/// Yields one fresh unsigned word per call, blocking if the source must.
pub trait RandomSource: Send + Sync {
    fn next_word(&self) -> u32;
}

/// Reduces a random word to a jitter round count in `1..=bound`.
pub fn jitter_rounds(word: u32, bound: u8) -> usize {
    debug_assert!(bound > 0);
    (word % u32::from(bound)) as usize + 1
}

/// A memory-mapped hardware TRNG. Every read of its register yields a fresh word.
#[derive(Debug)]
pub struct MmioTrng {
    register: *const u32,
}

// The register is read-only and every read is independent.
unsafe impl Send for MmioTrng {}
unsafe impl Sync for MmioTrng {}

impl MmioTrng {
    /// # Safety
    ///
    /// `address` must be the aligned address of a readable TRNG output register for the life of
    /// the returned value.
    pub const unsafe fn new(address: usize) -> Self {
        MmioTrng { register: address as *const u32 }
    }
}

impl RandomSource for MmioTrng {
    fn next_word(&self) -> u32 {
        unsafe { ptr::read_volatile(self.register) }
    }
}

/// A software RNG shared between lanes.
pub struct SeededSource<R>(Mutex<R>);

impl<R: RngCore + Send> SeededSource<R> {
    pub fn new(rng: R) -> Self {
        SeededSource(Mutex::new(rng))
    }
}

impl<R: RngCore + Send> RandomSource for SeededSource<R> {
    fn next_word(&self) -> u32 {
        self.0.lock().next_u32()
    }
}

/// Cycles through a fixed list of words.
#[derive(Debug)]
pub struct FixedSequence {
    words: Vec<u32>,
    next: AtomicUsize,
}

impl FixedSequence {
    /// # Panics
    ///
    /// Panics if `words` is empty.
    pub fn new(words: Vec<u32>) -> Self {
        assert!(!words.is_empty(), "a fixed sequence needs at least one word");
        FixedSequence { words, next: AtomicUsize::new(0) }
    }
}

impl RandomSource for FixedSequence {
    fn next_word(&self) -> u32 {
        let i = self.next.fetch_add(1, Ordering::Relaxed);
        self.words[i % self.words.len()]
    }
}
