//! Types for storing AES key material.

use core::{fmt, slice};

use zeroize::Zeroize;

use crate::{aes::{Block, SBOX}, ChaffError};

/// The round constants used for key expansion.
pub const ROUND_CONSTANTS: [u8; 10] = [
    0x01, 0x02, 0x04, 0x08, 0x10,
    0x20, 0x40, 0x80, 0x1b, 0x36,
];

/// A secret key which has not yet been expanded.
///
/// Must be either 128, 192, or 256 bits long.
#[derive(Clone, Copy)]
pub enum Key<'a> {
    /// A 128-bit key.
    Aes128(&'a [u8; 16]),

    /// A 192-bit key.
    Aes192(&'a [u8; 24]),

    /// A 256-bit key.
    Aes256(&'a [u8; 32]),
}

impl Key<'_> {
    /// Creates a `Key` from a byte slice.
    ///
    /// The slice must be either 16, 24, or 32 bytes long.
    pub fn from_bytes(key: &[u8]) -> crate::Result<Key<'_>> {
        let invalid = |()| ChaffError::InvalidKeyLength { len: key.len() };

        let key = match key.len() {
            16 => Key::Aes128(slice_as_array_ref!(key, 16).map_err(invalid)?),
            24 => Key::Aes192(slice_as_array_ref!(key, 24).map_err(invalid)?),
            32 => Key::Aes256(slice_as_array_ref!(key, 32).map_err(invalid)?),

            len => return Err(ChaffError::InvalidKeyLength { len }),
        };

        Ok(key)
    }

    /// Returns the number of rounds which should be used for a key of this length.
    pub fn rounds(&self) -> usize {
        match self {
            Key::Aes128(_) => 10,
            Key::Aes192(_) => 12,
            Key::Aes256(_) => 14,
        }
    }

    /// The number of 128-bit round keys used for encryption with a key of this length.
    pub fn num_round_keys(&self) -> usize {
        self.rounds() + 1
    }

    /// Returns the length of this key in bytes.
    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    /// A byte slice containing the key material.
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Key::Aes128(a) => &a[..],
            Key::Aes192(a) => &a[..],
            Key::Aes256(a) => &a[..],
        }
    }
}

impl AsRef<[u8]> for Key<'_> {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// An expanded AES key. Round keys are wiped when the schedule is dropped.
#[derive(Clone)]
pub enum Schedule {
    /// The round keys for a 128-bit key.
    Aes128([Block; 11]),

    /// The round keys for a 192-bit key.
    Aes192([Block; 13]),

    /// The round keys for a 256-bit key.
    Aes256([Block; 15]),
}

impl Schedule {
    /// Creates a zero-initialized key schedule with the same length as the given key.
    fn new(key: Key) -> Self {
        let rk = Block::default();
        match key {
            Key::Aes128(_) => Schedule::Aes128([rk; 11]),
            Key::Aes192(_) => Schedule::Aes192([rk; 13]),
            Key::Aes256(_) => Schedule::Aes256([rk; 15]),
        }
    }

    /// The round keys in this key schedule.
    pub fn as_slice(&self) -> &[Block] {
        match self {
            Schedule::Aes128(s) => s,
            Schedule::Aes192(s) => s,
            Schedule::Aes256(s) => s,
        }
    }

    /// The round keys in this key schedule.
    pub fn as_mut_slice(&mut self) -> &mut [Block] {
        match self {
            Schedule::Aes128(s) => s,
            Schedule::Aes192(s) => s,
            Schedule::Aes256(s) => s,
        }
    }

    /// The number of full AES rounds this schedule drives.
    pub fn rounds(&self) -> usize {
        self.as_slice().len() - 1
    }

    /// The length in bytes of the key this schedule was expanded from.
    pub fn key_len(&self) -> usize {
        match self {
            Schedule::Aes128(_) => 16,
            Schedule::Aes192(_) => 24,
            Schedule::Aes256(_) => 32,
        }
    }

    /// The original key, which always occupies the leading bytes of the schedule.
    pub fn key_bytes(&self) -> &[u8] {
        let rks = self.as_slice();
        debug_assert!(self.key_len() <= rks.len() * crate::BLOCK_LEN);

        // `Block` is `repr(transparent)` over a byte array, so the round keys are contiguous.
        unsafe { slice::from_raw_parts(rks.as_ptr() as *const u8, self.key_len()) }
    }

    fn word(&self, n: usize) -> u32 {
        let Block(rk) = self.as_slice()[n / 4];
        let i = 4 * (n % 4);
        u32::from_be_bytes([rk[i], rk[i+1], rk[i+2], rk[i+3]])
    }

    fn set_word(&mut self, n: usize, word: u32) {
        let Block(rk) = &mut self.as_mut_slice()[n / 4];
        let i = 4 * (n % 4);
        rk[i..i+4].copy_from_slice(&word.to_be_bytes());
    }
}

fn sub_word(word: u32) -> u32 {
    let mut bytes = word.to_be_bytes();
    for byte in &mut bytes {
        *byte = SBOX[*byte as usize];
    }

    u32::from_be_bytes(bytes)
}

impl From<Key<'_>> for Schedule {
    fn from(key: Key<'_>) -> Self {
        let mut sched = Schedule::new(key);

        // 0..N
        let rks = sched.as_mut_slice();
        for (i, key) in key.as_slice().chunks(crate::BLOCK_LEN).enumerate() {
            let Block(block) = &mut rks[i];
            block[..key.len()].copy_from_slice(key);
        }

        // N..(4*rk)
        let n = key.len() / 4;
        for i in n..(4 * key.num_round_keys()) {
            let mut a = sched.word(i - 1);
            match i % n {
                0 => {
                    a = a.rotate_left(8);
                    a = sub_word(a);
                    a ^= (ROUND_CONSTANTS[(i / n) - 1] as u32) << 24;
                }

                4 if n > 6 => {
                    a = sub_word(a);
                }

                _ => (),
            }

            sched.set_word(i, a ^ sched.word(i - n));
        }

        sched
    }
}

impl Drop for Schedule {
    fn drop(&mut self) {
        for rk in self.as_mut_slice() {
            rk.zeroize();
        }
    }
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "Schedule(aes-{}, ..)", 8 * self.key_len())
    }
}
