//! AES round operations on a `Block` using the 256-byte S-box table.

use gf256::Rijndael;

use crate::aes::{ops::*, Block, SBOX};

impl SubBytes for Block {
    fn sub_bytes(&mut self) {
        for byte in self.iter_mut() {
            *byte = SBOX[*byte as usize];
        }
    }
}

impl ShiftRows for Block {
    /// Rotates row `r` left by `r` positions.
    fn shift_rows(&mut self) {
        for row in 1..4 {
            let mut tmp = [0u8; 4];
            for (col, t) in tmp.iter_mut().enumerate() {
                *t = self[(row, (col + row) % 4)];
            }

            for (col, &t) in tmp.iter().enumerate() {
                self[(row, col)] = t;
            }
        }
    }
}

impl MixColumns for Block {
    fn mix_columns(&mut self) {
        let elem = |r, c| Rijndael(self[(r % 4, c)]);

        let mut tmp: Block = Block::default();
        for col in 0..4 {
            for row in 0..4 {
                let el = Rijndael(2) * elem(row,   col)
                       + Rijndael(3) * elem(row+1, col)
                       + Rijndael(1) * elem(row+2, col)
                       + Rijndael(1) * elem(row+3, col);

                tmp[(row, col)] = el.0;
            }
        }

        *self = tmp;
    }
}

impl AddRoundKey for Block {
    type RoundKey = Self;

    fn add_round_key(&mut self, rk: &Self::RoundKey) {
        self.xor_in_place(rk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sbox_spot_checks() {
        assert_eq!(SBOX[0x00], 0x63);
        assert_eq!(SBOX[0x01], 0x7c);
        assert_eq!(SBOX[0x53], 0xed);
        assert_eq!(SBOX[0xff], 0x16);
    }

    #[test]
    fn shift_rows() {
        let mut block = Block::from_row_major([
             0,  1,  2,  3,
             4,  5,  6,  7,
             8,  9, 10, 11,
            12, 13, 14, 15,
        ]);

        block.shift_rows();

        assert_eq!(block, Block::from_row_major([
             0,  1,  2,  3,
             5,  6,  7,  4, // << 1
            10, 11,  8,  9, // << 2
            15, 12, 13, 14, // << 3
        ]));
    }

    #[test]
    /// From https://en.wikipedia.org/wiki/Rijndael_MixColumns#Test_vectors_for_MixColumn()
    fn mix_columns() {
        let cases: &[([u8; 4], [u8; 4])] = &[
            ([0xdb, 0x13, 0x53, 0x45], [0x8e, 0x4d, 0xa1, 0xbc]),
            ([0xf2, 0x0a, 0x22, 0x5c], [0x9f, 0xdc, 0x58, 0x9d]),
            ([0x01, 0x01, 0x01, 0x01], [0x01, 0x01, 0x01, 0x01]),
            ([0xc6, 0xc6, 0xc6, 0xc6], [0xc6, 0xc6, 0xc6, 0xc6]),
            ([0xd4, 0xd4, 0xd4, 0xd5], [0xd5, 0xd5, 0xd7, 0xd6]),
            ([0x2d, 0x26, 0x31, 0x4c], [0x4d, 0x7e, 0xbd, 0xf8]),
        ];

        for (input, output) in cases {
            let mut block = Block::default();
            block.0[..4].copy_from_slice(input);
            block.mix_columns();
            assert_eq!(&block.0[..4], &output[..]);
        }
    }
}
