//! Generates the AES S-box from arithmetic in GF(2⁸).

use std::env;
use std::fmt::Write as _;
use std::fs;
use std::path::Path;

use gf256::{inverse_table, Rijndael};

/// The affine transformation applied to the multiplicative inverse of each byte.
fn affine(b: u8) -> u8 {
    b ^ b.rotate_left(1) ^ b.rotate_left(2) ^ b.rotate_left(3) ^ b.rotate_left(4) ^ 0x63
}

fn table(name: &str, values: impl Iterator<Item = u8>) -> String {
    let mut out = String::new();
    writeln!(out, "pub const {}: [u8; 256] = [", name).unwrap();
    for (i, v) in values.enumerate() {
        if i % 16 == 0 {
            out.push_str("   ");
        }
        write!(out, " 0x{:02x},", v).unwrap();
        if i % 16 == 15 {
            out.push('\n');
        }
    }
    out.push_str("];\n");
    out
}

fn main() {
    let sbox = inverse_table::<Rijndael>()
        .into_iter()
        .map(|Rijndael(b)| affine(b));

    let out_dir = env::var("OUT_DIR").unwrap();
    let dest = Path::new(&out_dir).join("sbox.rs");
    fs::write(&dest, table("SBOX", sbox)).unwrap();

    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-changed=gf256/src/lib.rs");
}
