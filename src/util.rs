use std::fmt::Write;

use crate::{ChaffError, Result};

macro_rules! slice_as_array_ref {
    ($s:expr, $len:expr) => {
        if $s.len() != $len {
            Err(())
        } else {
            Ok(unsafe {
                &*($s.as_ptr() as *const [_; $len])
            })
        }
    }
}

/// Parses a string of hex digits into bytes.
///
/// Whitespace is ignored, so test vectors can be written in the grouped form FIPS-197 and
/// RFC 6114 use.
pub fn parse_hex(s: &str) -> Result<Vec<u8>> {
    let digits: Vec<u8> = s.chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| c.to_digit(16).map(|d| d as u8).ok_or(ChaffError::InvalidHex { ch: c }))
        .collect::<Result<_>>()?;

    if digits.len() % 2 != 0 {
        return Err(ChaffError::OddHexLength { len: digits.len() });
    }

    Ok(digits.chunks_exact(2).map(|pair| pair[0] << 4 | pair[1]).collect())
}

/// Formats bytes as lowercase hex without separators.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(2 * bytes.len());
    for b in bytes {
        let _ = write!(out, "{:02x}", b);
    }

    out
}

#[cfg(test)]
pub(crate) mod test {
    /// Parses a hex literal in tests.
    pub fn hex(s: &str) -> Vec<u8> {
        super::parse_hex(s).unwrap()
    }
}
