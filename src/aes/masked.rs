//! AES with first-order Boolean masking of the state.
//!
//! Every key expansion draws two mask bytes, `m` for S-box inputs and `m'` for S-box outputs, and
//! precomputes `S'(x) = S(x ⊕ m) ⊕ m'`. The masks are folded into the round keys so that between
//! steps every state byte carries `m`:
//!
//! ```text
//! rk'[0]    = rk[0]    ⊕ m
//! rk'[r]    = rk[r]    ⊕ m' ⊕ m     (0 < r < last)
//! rk'[last] = rk[last] ⊕ m'
//! ```
//!
//! A state byte masked with `m'` in every position stays masked with `m'` through `ShiftRows`
//! and through `MixColumns`, whose coefficients `2 ⊕ 3 ⊕ 1 ⊕ 1` sum to one. The final step
//! removes the mask, so the ciphertext is that of plain AES.

use std::fmt;
use std::sync::Arc;

use zeroize::Zeroize;

use crate::{
    aes::{
        ops::{AddRoundKey, MixColumns, ShiftRows},
        Aes, Schedule, SBOX,
    },
    entropy::RandomSource,
    Block, BlockTransform, Result,
};

/// Masked AES-128/192/256. Masks are drawn from `entropy` once per key expansion.
#[derive(Clone)]
pub struct MaskedAes {
    entropy: Arc<dyn RandomSource>,
}

impl MaskedAes {
    pub fn new(entropy: Arc<dyn RandomSource>) -> Self {
        MaskedAes { entropy }
    }
}

impl fmt::Debug for MaskedAes {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("MaskedAes")
    }
}

/// Masked round keys and S-box for one key. Everything is wiped on drop.
pub struct MaskedSchedule {
    key: Schedule,
    masked: Schedule,
    sbox: [u8; 256],
    input_mask: u8,
    output_mask: u8,
}

impl MaskedSchedule {
    fn new(key: Schedule, input_mask: u8, output_mask: u8) -> Self {
        let mut sbox = [0u8; 256];
        for (x, out) in sbox.iter_mut().enumerate() {
            *out = SBOX[x ^ usize::from(input_mask)] ^ output_mask;
        }

        let mut masked = key.clone();
        let rks = masked.as_mut_slice();
        let last = rks.len() - 1;
        for (r, rk) in rks.iter_mut().enumerate() {
            let mask = match r {
                0 => input_mask,
                r if r == last => output_mask,
                _ => input_mask ^ output_mask,
            };

            rk.xor_in_place(&Block([mask; 16]));
        }

        MaskedSchedule { key, masked, sbox, input_mask, output_mask }
    }

    /// The S-box input and output masks.
    pub fn masks(&self) -> (u8, u8) {
        (self.input_mask, self.output_mask)
    }

    fn sub_bytes(&self, state: &mut Block) {
        for byte in state.iter_mut() {
            *byte = self.sbox[*byte as usize];
        }
    }
}

impl Drop for MaskedSchedule {
    fn drop(&mut self) {
        self.sbox.zeroize();
        self.input_mask.zeroize();
        self.output_mask.zeroize();
    }
}

impl fmt::Debug for MaskedSchedule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "MaskedSchedule(aes-{}, ..)", 8 * self.key.key_len())
    }
}

impl BlockTransform for MaskedAes {
    type Schedule = MaskedSchedule;

    const NAME: &'static str = "masked-aes";

    fn key_expand(&self, key: &[u8]) -> Result<MaskedSchedule> {
        let key = Aes.key_expand(key)?;
        let [input_mask, output_mask, ..] = self.entropy.next_word().to_le_bytes();
        Ok(MaskedSchedule::new(key, input_mask, output_mask))
    }

    fn raw_key<'a>(&self, schedule: &'a MaskedSchedule) -> &'a [u8] {
        schedule.key.key_bytes()
    }

    fn rounds(&self, schedule: &MaskedSchedule) -> usize {
        schedule.key.rounds()
    }

    fn apply_round(&self, schedule: &MaskedSchedule, state: &mut Block, step: usize) {
        let rks = schedule.masked.as_slice();
        let last = rks.len() - 1;
        debug_assert!(step <= last);

        if step > 0 {
            schedule.sub_bytes(state);
            state.shift_rows();
            if step != last {
                state.mix_columns();
            }
        }

        state.add_round_key(&rks[step]);
    }
}

#[cfg(test)]
mod tests {
    use crate::{entropy::FixedSequence, util::test::hex};
    use super::*;

    const FIPS_KEY: &str = "2b7e151628aed2a6abf7158809cf4f3c";

    fn block(s: &str) -> Block {
        let mut b = Block::default();
        b.0.copy_from_slice(&hex(s));
        b
    }

    fn masked(words: Vec<u32>) -> MaskedAes {
        MaskedAes::new(Arc::new(FixedSequence::new(words)))
    }

    #[test]
    fn ciphertext_matches_plain_aes() {
        let plain = block("3243f6a8885a308d313198a2e0370734");

        for &word in &[0, 0x0000_5a3c, 0x0000_ff01, 0xdead_beef] {
            for key in &[FIPS_KEY, "000102030405060708090a0b0c0d0e0f1011121314151617"] {
                let cipher = masked(vec![word]);
                let sched = cipher.key_expand(&hex(key)).unwrap();

                let mut state = plain;
                cipher.encrypt_full(&sched, &mut state);

                let mut expected = plain;
                Aes.encrypt_full(&Aes.key_expand(&hex(key)).unwrap(), &mut expected);
                assert_eq!(state, expected, "masks {:08x}", word);
            }
        }

        let cipher = masked(vec![0x1234]);
        let sched = cipher.key_expand(&hex(FIPS_KEY)).unwrap();
        let mut state = plain;
        cipher.encrypt_full(&sched, &mut state);
        assert_eq!(state, block("3925841d02dc09fbdc118597196a0b32"));
    }

    #[test]
    fn intermediate_states_carry_the_input_mask() {
        let cipher = masked(vec![0x0000_c35a]);
        let sched = cipher.key_expand(&hex(FIPS_KEY)).unwrap();
        assert_eq!(sched.masks(), (0x5a, 0xc3));

        let plain = block("3243f6a8885a308d313198a2e0370734");
        let aes = Aes.key_expand(&hex(FIPS_KEY)).unwrap();

        for rounds in 0..10 {
            let mut masked_state = plain;
            cipher.encrypt_rounds(&sched, &mut masked_state, rounds);

            let mut state = plain;
            Aes.encrypt_rounds(&aes, &mut state, rounds);
            state.xor_in_place(&Block([0x5a; 16]));

            assert_eq!(masked_state, state, "after {} rounds", rounds);
        }
    }

    #[test]
    fn masks_are_drawn_per_schedule() {
        let cipher = masked(vec![0x0000_0201, 0x0000_0403]);
        let a = cipher.key_expand(&hex(FIPS_KEY)).unwrap();
        let b = cipher.key_expand(&hex(FIPS_KEY)).unwrap();

        assert_eq!(a.masks(), (0x01, 0x02));
        assert_eq!(b.masks(), (0x03, 0x04));
        assert_eq!(cipher.raw_key(&a), &hex(FIPS_KEY)[..]);
        assert_eq!(cipher.rounds(&a), 10);
    }
}
