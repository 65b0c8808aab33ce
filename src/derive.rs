//! The key derivation chain.
//!
//! Lane 0 runs under the real key. Every other lane's key is the physical identity function's
//! response to the previous lane's key, so decoy keys are related to the real one only through a
//! device-bound one-way function:
//!
//! ```text
//! schedules[0] = expand(real_key)
//! schedules[i] = expand(puf(raw_key(schedules[i - 1])))
//! ```

use tracing::debug;
use zeroize::{Zeroize, Zeroizing};

use crate::{Block, BlockTransform, ChaffError, Result, BLOCK_LEN};

/// A deterministic, device-bound one-way function.
pub trait PhysicalIdentity: Send + Sync {
    /// Replaces `challenge` with the device's response to it.
    fn respond(&self, challenge: &mut [u8]) -> Result<()>;
}

impl<P: PhysicalIdentity + ?Sized> PhysicalIdentity for &P {
    fn respond(&self, challenge: &mut [u8]) -> Result<()> {
        (**self).respond(challenge)
    }
}

impl<P: PhysicalIdentity + ?Sized> PhysicalIdentity for Box<P> {
    fn respond(&self, challenge: &mut [u8]) -> Result<()> {
        (**self).respond(challenge)
    }
}

/// Answers every challenge with the challenge itself, so every lane runs under the real key.
#[derive(Clone, Copy, Debug, Default)]
pub struct Passthrough;

impl PhysicalIdentity for Passthrough {
    fn respond(&self, _: &mut [u8]) -> Result<()> {
        Ok(())
    }
}

/// Stands in for a PUF by encrypting the challenge under a fixed device key.
///
/// Challenges must be exactly one block long.
pub struct EmulatedPuf<C: BlockTransform> {
    cipher: C,
    device: C::Schedule,
}

impl<C: BlockTransform> EmulatedPuf<C> {
    pub fn new(cipher: C, device_key: &[u8]) -> Result<Self> {
        let device = cipher.key_expand(device_key)?;
        Ok(EmulatedPuf { cipher, device })
    }
}

impl<C: BlockTransform> PhysicalIdentity for EmulatedPuf<C> {
    fn respond(&self, challenge: &mut [u8]) -> Result<()> {
        if challenge.len() != BLOCK_LEN {
            return Err(ChaffError::InvalidBlockLength { len: challenge.len() });
        }

        let mut state = Block::default();
        state.0.copy_from_slice(challenge);
        self.cipher.encrypt_full(&self.device, &mut state);
        challenge.copy_from_slice(&state.0);

        state.zeroize();
        Ok(())
    }
}

/// Expands the real key and `lanes - 1` derived keys, in lane order.
pub fn derive_schedules<C, P>(
    cipher: &C,
    real_key: &[u8],
    puf: &P,
    lanes: usize,
) -> Result<Vec<C::Schedule>>
    where C: BlockTransform,
          P: PhysicalIdentity + ?Sized,
{
    let mut schedules = Vec::with_capacity(lanes);
    schedules.push(cipher.key_expand(real_key)?);

    for i in 1..lanes {
        let mut challenge = Zeroizing::new(cipher.raw_key(&schedules[i - 1]).to_vec());
        puf.respond(&mut challenge)?;
        schedules.push(cipher.key_expand(&challenge)?);
    }

    debug!(cipher = C::NAME, lanes, "derived key chain");
    Ok(schedules)
}
