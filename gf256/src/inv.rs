use super::Field;

fn find_inverse<F: Field>(a: F) -> Option<F> {
    (0..=255)
        .map(F::from_byte)
        .find(|&b| a * b == F::from_byte(1))
}

/// Returns the multiplicative inverse of every element, indexed by its byte value.
///
/// Zero has no inverse and maps to itself.
pub fn inverse_table<F: Field>() -> Vec<F> {
    let mut ret = vec![F::from_byte(0)];

    let inv = (1..=255)
        .map(F::from_byte)
        .map(|el| find_inverse(el).expect("Non-invertible element"));

    ret.extend(inv);
    ret
}
