/// The rounds of AES encryption, built from the four round operations below.
pub trait AesRounds: Sized + Copy + AddRoundKey {
    /// Performs a normal round of AES encryption.
    fn encrypt_round(&mut self, rk: &Self::RoundKey);

    /// Performs the final round of AES encryption (no `MixColumns`).
    fn encrypt_round_last(&mut self, rk: &Self::RoundKey);

    /// Performs one step of an AES encryption in-place.
    ///
    /// Step `0` is the initial `AddRoundKey`; steps `1..round_keys.len()` are the rounds, the
    /// last of which omits `MixColumns`.
    fn encrypt_step(&mut self, round_keys: &[Self::RoundKey], step: usize) {
        let last = round_keys.len() - 1;
        debug_assert!(step <= last);

        match step {
            0 => self.add_round_key(&round_keys[0]),
            s if s == last => self.encrypt_round_last(&round_keys[s]),
            s => self.encrypt_round(&round_keys[s]),
        }
    }
}

impl<T> AesRounds for T
    where T: Copy + ShiftRows + MixColumns + SubBytes + AddRoundKey
{
    fn encrypt_round(&mut self, rk: &Self::RoundKey) {
        self.sub_bytes();
        self.shift_rows();
        self.mix_columns();
        self.add_round_key(rk);
    }

    fn encrypt_round_last(&mut self, rk: &Self::RoundKey) {
        self.sub_bytes();
        self.shift_rows();
        self.add_round_key(rk);
    }
}

pub trait ShiftRows {
    /// Executes `ShiftRows` in-place.
    fn shift_rows(&mut self);
}

pub trait MixColumns {
    /// Executes `MixColumns` in-place.
    ///
    /// ```text
    /// c = 3•x³ ⊕  x² ⊕  x ⊕ 2
    ///
    /// c[i] = 2 • b[i]
    ///      ⊕ 3 • b[i+1]
    ///      ⊕     b[i+2]
    ///      ⊕     b[i+3]
    /// ```
    fn mix_columns(&mut self);
}

pub trait SubBytes {
    /// Executes `SubBytes` in-place.
    fn sub_bytes(&mut self);
}

pub trait AddRoundKey {
    type RoundKey;

    fn add_round_key(&mut self, rk: &Self::RoundKey);
}
