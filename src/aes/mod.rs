//! The AES block cipher, implemented with a 256-byte S-box table.
//!
//! This is the cipher the chaff campaign protects by default. The table lookups are *not*
//! constant-time; hiding them is the job of the surrounding chaff lanes. [`MaskedAes`] adds
//! Boolean masking of the state on top of the same round operations.

pub mod key;
mod masked;
pub mod ops;
mod table;

pub use crate::block::{Block, BLOCK_LEN};
pub use self::key::{Key, Schedule};
pub use self::masked::{MaskedAes, MaskedSchedule};

use crate::{BlockTransform, Result};
use self::ops::AesRounds;

include!(concat!(env!("OUT_DIR"), "/sbox.rs"));

/// AES-128/192/256 as a pluggable `BlockTransform`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Aes;

impl BlockTransform for Aes {
    type Schedule = Schedule;

    const NAME: &'static str = "aes";

    fn key_expand(&self, key: &[u8]) -> Result<Schedule> {
        Ok(Key::from_bytes(key)?.into())
    }

    fn raw_key<'a>(&self, schedule: &'a Schedule) -> &'a [u8] {
        schedule.key_bytes()
    }

    fn rounds(&self, schedule: &Schedule) -> usize {
        schedule.rounds()
    }

    fn apply_round(&self, schedule: &Schedule, state: &mut Block, step: usize) {
        state.encrypt_step(schedule.as_slice(), step);
    }
}

#[cfg(test)]
mod tests {
    use crate::util::test::hex;
    use super::*;

    struct Kat<'a> {
        key: &'a str,
        plain: &'a str,
        cipher: &'a str,
    }

    /// FIPS-197 Appendix C.
    const KNOWN_ANSWER_TESTS: &[Kat] = &[
        Kat {
            key:    "000102030405060708090a0b0c0d0e0f",
            plain:  "00112233445566778899aabbccddeeff",
            cipher: "69c4e0d86a7b0430d8cdb78070b4c55a",
        },
        Kat {
            key:    "000102030405060708090a0b0c0d0e0f1011121314151617",
            plain:  "00112233445566778899aabbccddeeff",
            cipher: "dda97ca4864cdfe06eaf70a0ec0d7191",
        },
        Kat {
            key:    "000102030405060708090a0b0c0d0e0f101112131415161718191a1b1c1d1e1f",
            plain:  "00112233445566778899aabbccddeeff",
            cipher: "8ea2b7ca516745bfeafc49904b496089",
        },
        // FIPS-197 Appendix B, the key the firmware campaign uses.
        Kat {
            key:    "2b7e151628aed2a6abf7158809cf4f3c",
            plain:  "3243f6a8885a308d313198a2e0370734",
            cipher: "3925841d02dc09fbdc118597196a0b32",
        },
    ];

    fn block(s: &str) -> Block {
        let mut b = Block::default();
        b.0.copy_from_slice(&hex(s));
        b
    }

    #[test]
    fn known_answers() {
        for Kat { key, plain, cipher } in KNOWN_ANSWER_TESTS {
            let sched = Aes.key_expand(&hex(key)).unwrap();
            let mut state = block(plain);

            Aes.encrypt_full(&sched, &mut state);
            assert_eq!(state, block(cipher));
        }
    }

    #[test]
    fn round_counts() {
        for &(len, rounds) in &[(16, 10), (24, 12), (32, 14)] {
            let sched = Aes.key_expand(&vec![0u8; len]).unwrap();
            assert_eq!(Aes.rounds(&sched), rounds);
            assert_eq!(Aes.raw_key(&sched).len(), len);
        }
    }

    #[test]
    fn partial_rounds_are_a_prefix_of_full_encryption() {
        let sched = Aes.key_expand(&hex("2b7e151628aed2a6abf7158809cf4f3c")).unwrap();
        let plain = block("3243f6a8885a308d313198a2e0370734");

        // FIPS-197 Appendix B: state at the start of round 2 is the output of round 1.
        let mut one = plain;
        Aes.encrypt_rounds(&sched, &mut one, 1);
        assert_eq!(one, block("a49c7ff2689f352b6b5bea43026a5049"));

        let mut stepped = plain;
        for step in 0..=Aes.rounds(&sched) {
            Aes.apply_round(&sched, &mut stepped, step);
        }
        let mut full = plain;
        Aes.encrypt_full(&sched, &mut full);
        assert_eq!(stepped, full);

        // Asking for more rounds than the cipher has is a full encryption.
        let mut clamped = plain;
        Aes.encrypt_rounds(&sched, &mut clamped, 99);
        assert_eq!(clamped, full);
    }
}
