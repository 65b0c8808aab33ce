//! Measurement boundaries.
//!
//! A capture rig arms on `rise` and disarms on `fall`. The boundaries carry no data; all that
//! matters is that they sit at stable, recognizable code locations. [`MarkerTrigger`] routes them
//! through exported, never-inlined functions whose symbols a debugger or trace unit can break on:
//!
//! - `chaff_rise_trg`
//! - `chaff_fall_trg`
//! - `chaff_end_batch`

use cfg_if::cfg_if;
use tracing::trace;

pub trait Trigger {
    /// Called immediately before every lane is released.
    fn rise(&self);

    /// Called once the genuine lane has completed and every decoy has stopped.
    fn fall(&self);

    /// Called once after the last iteration.
    fn end_batch(&self) {}
}

impl<T: Trigger + ?Sized> Trigger for &T {
    fn rise(&self) {
        (**self).rise()
    }

    fn fall(&self) {
        (**self).fall()
    }

    fn end_batch(&self) {
        (**self).end_batch()
    }
}

/// Marks each boundary by calling its exported marker function.
#[derive(Clone, Copy, Debug, Default)]
pub struct MarkerTrigger;

impl Trigger for MarkerTrigger {
    fn rise(&self) {
        trace!("rise");
        chaff_rise_trg();
    }

    fn fall(&self) {
        chaff_fall_trg();
        trace!("fall");
    }

    fn end_batch(&self) {
        chaff_end_batch();
        trace!("end of batch");
    }
}

cfg_if! {
    if #[cfg(any(
        target_arch = "x86",
        target_arch = "x86_64",
        target_arch = "arm",
        target_arch = "aarch64",
        target_arch = "riscv32",
        target_arch = "riscv64",
    ))] {
        #[inline(always)]
        fn nop() {
            unsafe { core::arch::asm!("nop", options(nomem, nostack, preserves_flags)) }
        }
    } else {
        #[inline(always)]
        fn nop() {
            core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
        }
    }
}

// The markers differ in length so that identical code folding cannot merge their symbols.

#[no_mangle]
#[inline(never)]
pub extern "C" fn chaff_rise_trg() {
    nop();
}

#[no_mangle]
#[inline(never)]
pub extern "C" fn chaff_fall_trg() {
    nop();
    nop();
}

#[no_mangle]
#[inline(never)]
pub extern "C" fn chaff_end_batch() {
    nop();
    nop();
    nop();
}
