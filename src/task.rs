//! Lane task bodies.
//!
//! Every lane runs its cipher one step at a time, each step a separate slice on the core, and
//! publishes completion in the same critical section as its final step. Decoys check the batch
//! signal before each step: once the genuine lane has completed they stop where they are and
//! wait to be deleted.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::{Condvar, Mutex};
use tracing::trace;

use crate::{
    entropy::{jitter_rounds, RandomSource},
    lane::{Lane, Role},
    runtime::{Runtime, TaskContext},
    BlockTransform,
};

/// The per-iteration batch completion signal.
///
/// Raised by the genuine lane when it finishes. The scheduler waits on it, and decoys treat it as
/// their cancellation token.
#[derive(Default)]
pub struct BatchSignal {
    raised: AtomicBool,
    raises: AtomicU32,
    lock: Mutex<()>,
    cond: Condvar,
}

impl BatchSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_raised(&self) -> bool {
        self.raised.load(Ordering::Acquire)
    }

    /// How many times the signal was raised this iteration.
    pub fn raises(&self) -> u32 {
        self.raises.load(Ordering::SeqCst)
    }

    pub(crate) fn raise(&self) {
        let _guard = self.lock.lock();
        self.raises.fetch_add(1, Ordering::SeqCst);
        self.raised.store(true, Ordering::Release);
        self.cond.notify_all();
    }

    /// Blocks until the signal is raised.
    pub fn wait(&self) {
        let mut guard = self.lock.lock();
        while !self.is_raised() {
            self.cond.wait(&mut guard);
        }
    }
}

/// What every lane task of one iteration shares.
pub struct LaneEnv<C, R> {
    pub cipher: Arc<C>,
    pub runtime: Arc<R>,
    pub batch: Arc<BatchSignal>,
    pub entropy: Arc<dyn RandomSource>,
    pub jitter_bound: u8,
}

/// How a lane's run ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    Finished,

    /// Stopped early by the batch signal or by deletion.
    Stopped,
}

/// The full-round variant, used by the genuine lane and every decoy.
pub fn full_round<C, R>(lane: &Lane<C>, env: &LaneEnv<C, R>, ctx: &R::Context) -> Outcome
    where C: BlockTransform,
          R: Runtime,
{
    let last = env.cipher.rounds(lane.schedule());
    let outcome = run_steps(lane, env, ctx, last);
    park(ctx);
    outcome
}

/// The jitter variant: a random number of rounds in `1..=jitter_bound`.
pub fn jitter<C, R>(lane: &Lane<C>, env: &LaneEnv<C, R>, ctx: &R::Context) -> Outcome
    where C: BlockTransform,
          R: Runtime,
{
    let rounds = jitter_rounds(env.entropy.next_word(), env.jitter_bound);
    lane.set_jitter_rounds(rounds);

    let last = rounds.min(env.cipher.rounds(lane.schedule()));
    let outcome = run_steps(lane, env, ctx, last);
    park(ctx);
    outcome
}

fn run_steps<C, R>(lane: &Lane<C>, env: &LaneEnv<C, R>, ctx: &R::Context, last: usize) -> Outcome
    where C: BlockTransform,
          R: Runtime,
{
    let cipher = &*env.cipher;
    let schedule = lane.schedule();
    let preemptible = lane.role() != Role::Genuine;
    let mut state = lane.state().lock();

    let stopped = || ctx.is_deleted() || (preemptible && env.batch.is_raised());

    for step in 0..last {
        let ran = env.runtime.slice(|| {
            if stopped() {
                return false;
            }

            cipher.apply_round(schedule, &mut state, step);
            true
        });

        if !ran {
            trace!(lane = lane.tag(), step, "stopped");
            return Outcome::Stopped;
        }
    }

    // The last step and the completion it publishes are one critical section, so no decoy can
    // run a step after the genuine lane's last one.
    let finished = env.runtime.critical(|| {
        if stopped() {
            return false;
        }

        cipher.apply_round(schedule, &mut state, last);
        lane.set_finished();
        if lane.role() == Role::Genuine {
            env.batch.raise();
        }

        true
    });

    if finished {
        Outcome::Finished
    } else {
        trace!(lane = lane.tag(), step = last, "stopped");
        Outcome::Stopped
    }
}

/// Waits to be deleted. A lane never resumes once it has finished or stopped.
fn park<C: TaskContext>(ctx: &C) {
    while !ctx.is_deleted() {
        ctx.park();
    }
}
