//! The 128-bit-key CLEFIA block cipher ([RFC 6114][rfc]).
//!
//! CLEFIA is a four-branch generalized Feistel network (GFN₄,₁₈) with key whitening before the
//! first and after the last round. It is a drop-in alternative to AES for the chaff campaign,
//! which only needs its round structure.
//!
//! [rfc]: https://www.rfc-editor.org/rfc/rfc6114

mod tables;

use core::fmt;

use gf256::Clefia as Gf;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::{Block, BlockTransform, ChaffError, Result};
use self::tables::{S0, S1};

/// The number of rounds for a 128-bit key.
pub const ROUNDS: usize = 18;

/// The key length in bytes.
pub const KEY_LEN: usize = 16;

/// Rounds of GFN₄,₁₂ used to derive the intermediate key `L`.
const KEY_ROUNDS: usize = 12;

/// Diffusion matrix of `F0`.
const M0: [[u8; 4]; 4] = [
    [0x1, 0x2, 0x4, 0x6],
    [0x2, 0x1, 0x6, 0x4],
    [0x4, 0x6, 0x1, 0x2],
    [0x6, 0x4, 0x2, 0x1],
];

/// Diffusion matrix of `F1`.
const M1: [[u8; 4]; 4] = [
    [0x1, 0x8, 0x2, 0xa],
    [0x8, 0x1, 0xa, 0x2],
    [0x2, 0xa, 0x1, 0x8],
    [0xa, 0x2, 0x8, 0x1],
];

type Word = [u8; 4];

/// An expanded CLEFIA-128 key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct Schedule {
    /// The raw key. Its halves double as the whitening keys.
    key: [u8; KEY_LEN],
    round_keys: [Word; 2 * ROUNDS],
}

impl Schedule {
    /// The round keys `RK0..RK35`.
    pub fn round_keys(&self) -> &[Word] {
        &self.round_keys
    }

    fn whitening_key(&self, n: usize) -> &[u8] {
        &self.key[4*n..4*n + 4]
    }
}

impl fmt::Debug for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("Schedule(clefia-128, ..)")
    }
}

fn xor(dst: &mut [u8], src: &[u8]) {
    for (d, s) in dst.iter_mut().zip(src) {
        *d ^= s;
    }
}

/// Key addition, substitution through alternating S-boxes, then diffusion by `m`.
fn f(x: &[u8], rk: &Word, sboxes: [&[u8; 256]; 4], m: &[[u8; 4]; 4]) -> Word {
    let mut z = [0u8; 4];
    for (i, z) in z.iter_mut().enumerate() {
        *z = sboxes[i][(x[i] ^ rk[i]) as usize];
    }

    let mut y = [0u8; 4];
    for (row, y) in m.iter().zip(y.iter_mut()) {
        *y = row.iter()
            .zip(z.iter())
            .fold(Gf(0), |acc, (&c, &b)| acc + Gf(c) * Gf(b))
            .0;
    }

    y
}

fn f0(x: &[u8], rk: &Word) -> Word {
    f(x, rk, [&S0, &S1, &S0, &S1], &M0)
}

fn f1(x: &[u8], rk: &Word) -> Word {
    f(x, rk, [&S1, &S0, &S1, &S0], &M1)
}

/// One round of GFN₄. Every round but the last rotates the four branches left by one.
fn gfn4_round(state: &mut [u8; 16], rk0: &Word, rk1: &Word, last: bool) {
    let y0 = f0(&state[0..4], rk0);
    let y1 = f1(&state[8..12], rk1);
    xor(&mut state[4..8], &y0);
    xor(&mut state[12..16], &y1);

    if !last {
        state.rotate_left(4);
    }
}

/// The sixty 32-bit constants `CON⁽¹²⁸⁾`, generated from the cubic root of two.
fn constants() -> [Word; 60] {
    const P: u16 = 0xb7e1;
    const Q: u16 = 0x243f;

    let mut t: u16 = 0x428a;
    let mut con = [[0u8; 4]; 60];

    for pair in con.chunks_exact_mut(2) {
        let a = (u32::from(t ^ P) << 16) | u32::from(!t.rotate_left(1));
        let b = (u32::from(!t ^ Q) << 16) | u32::from(t.rotate_left(8));
        pair[0] = a.to_be_bytes();
        pair[1] = b.to_be_bytes();

        // Multiply by x⁻¹ in GF(2¹⁶).
        if t & 1 != 0 {
            t ^= 0xa830;
        }
        t = t.rotate_right(1);
    }

    con
}

/// The `DoubleSwap` permutation of the intermediate key.
fn double_swap(l: &mut [u8; 16]) {
    let mut t = [0u8; 16];

    for i in 0..7 {
        t[i] = (l[i] << 7) | (l[i + 1] >> 1);
    }
    t[7] = (l[7] << 7) | (l[15] & 0x7f);

    t[8] = (l[8] >> 7) | (l[0] & 0xfe);
    for i in 9..16 {
        t[i] = (l[i] >> 7) | (l[i - 1] << 1);
    }

    *l = t;
    t.zeroize();
}

fn expand(key: &[u8; KEY_LEN]) -> Schedule {
    let con = constants();

    let mut l = *key;
    for r in 0..KEY_ROUNDS {
        gfn4_round(&mut l, &con[2*r], &con[2*r + 1], r == KEY_ROUNDS - 1);
    }

    let mut round_keys = [[0u8; 4]; 2 * ROUNDS];
    for (i, rks) in round_keys.chunks_exact_mut(4).enumerate() {
        let mut t = l;
        for (j, b) in t.iter_mut().enumerate() {
            *b ^= con[2*KEY_ROUNDS + 4*i + j/4][j % 4];
        }

        if i % 2 == 1 {
            xor(&mut t, key);
        }

        for (rk, w) in rks.iter_mut().zip(t.chunks_exact(4)) {
            rk.copy_from_slice(w);
        }

        t.zeroize();
        double_swap(&mut l);
    }
    l.zeroize();

    Schedule { key: *key, round_keys }
}

/// CLEFIA-128 as a pluggable `BlockTransform`.
#[derive(Clone, Copy, Debug, Default)]
pub struct Clefia;

impl BlockTransform for Clefia {
    type Schedule = Schedule;

    const NAME: &'static str = "clefia";

    fn key_expand(&self, key: &[u8]) -> Result<Schedule> {
        let key = slice_as_array_ref!(key, KEY_LEN)
            .map_err(|()| ChaffError::InvalidKeyLength { len: key.len() })?;

        Ok(expand(key))
    }

    fn raw_key<'a>(&self, schedule: &'a Schedule) -> &'a [u8] {
        &schedule.key
    }

    fn rounds(&self, _: &Schedule) -> usize {
        ROUNDS
    }

    fn apply_round(&self, schedule: &Schedule, state: &mut Block, step: usize) {
        debug_assert!(step <= ROUNDS);
        let Block(state) = state;

        if step == 0 {
            xor(&mut state[4..8], schedule.whitening_key(0));
            xor(&mut state[12..16], schedule.whitening_key(1));
            return;
        }

        let rk = &schedule.round_keys[2 * (step - 1)..];
        gfn4_round(state, &rk[0], &rk[1], step == ROUNDS);

        if step == ROUNDS {
            xor(&mut state[4..8], schedule.whitening_key(2));
            xor(&mut state[12..16], schedule.whitening_key(3));
        }
    }
}
