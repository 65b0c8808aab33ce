//! The batch scheduler.
//!
//! Each iteration is strictly sequential:
//!
//! 1. **Quiesce.** Hold the runnable set, resynchronize every lane's buffer from the genuine
//!    lane's and give each lane a fresh task.
//! 2. **Rise.** Release every lane at once.
//! 3. **Run.** Wait for the genuine lane. Decoys stop as soon as it signals.
//! 4. **Fall.** Delete every task and clear completion flags.
//! 5. **Idle** before the next rise.
//!
//! After the last iteration the scheduler marks the end of the batch and either returns a report
//! or halts forever.

use std::sync::Arc;

use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::{
    config::{ChaffConfig, IdlePolicy, WaitStrategy},
    derive::{derive_schedules, PhysicalIdentity},
    entropy::RandomSource,
    fault,
    lane::{Lane, Registry, Role},
    runtime::{Runtime, TaskSpec},
    task::{self, BatchSignal, LaneEnv},
    trigger::{MarkerTrigger, Trigger},
    Block, BlockTransform, ChaffError, Result,
};

/// What happened in one iteration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct IterationReport {
    pub index: u32,

    /// The genuine lane's plaintext.
    pub input: Block,

    /// The genuine lane's ciphertext, which is the next iteration's input.
    pub ciphertext: Block,

    /// Rounds the jitter lane drew, or `None` without a jitter lane.
    pub jitter_rounds: Option<usize>,

    /// Lanes other than the genuine one which had not finished at the fall.
    pub decoys_stopped: usize,

    /// Times the batch completion signal was raised.
    pub completion_signals: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CampaignReport {
    pub iterations: Vec<IterationReport>,
}

impl CampaignReport {
    /// The genuine ciphertexts, in order.
    pub fn ciphertexts(&self) -> impl Iterator<Item = Block> + '_ {
        self.iterations.iter().map(|it| it.ciphertext)
    }

    pub fn last_ciphertext(&self) -> Option<Block> {
        self.iterations.last().map(|it| it.ciphertext)
    }
}

pub struct BatchScheduler<C: BlockTransform, R: Runtime, T = MarkerTrigger> {
    cipher: Arc<C>,
    runtime: Arc<R>,
    entropy: Arc<dyn RandomSource>,
    trigger: T,
    registry: Registry<C, R::Task>,

    batches: u32,
    jitter_bound: u8,
    idle: IdlePolicy,
    wait: WaitStrategy,
}

impl<C: BlockTransform, R: Runtime> BatchScheduler<C, R> {
    /// Creates a scheduler over already expanded key schedules, one per lane.
    pub fn new(
        config: &ChaffConfig,
        cipher: C,
        runtime: Arc<R>,
        entropy: Arc<dyn RandomSource>,
        schedules: Vec<C::Schedule>,
        initial: Block,
    ) -> Result<Self> {
        config.validate()?;
        if schedules.len() != config.lanes {
            return Err(ChaffError::InvalidLaneCount { lanes: schedules.len(), max: config.lanes });
        }

        Ok(BatchScheduler {
            cipher: Arc::new(cipher),
            runtime,
            entropy,
            trigger: MarkerTrigger,
            registry: Registry::new(schedules, initial)?,
            batches: config.batches,
            jitter_bound: config.jitter_max_rounds,
            idle: config.idle,
            wait: config.wait,
        })
    }

    /// Derives the key chain from the configured key and creates a scheduler over it.
    pub fn from_config<P>(
        config: &ChaffConfig,
        cipher: C,
        puf: &P,
        runtime: Arc<R>,
        entropy: Arc<dyn RandomSource>,
    ) -> Result<Self>
        where P: PhysicalIdentity + ?Sized
    {
        config.validate()?;

        let key = Zeroizing::new(config.key_bytes()?);
        let schedules = derive_schedules(&cipher, &key, puf, config.lanes)?;
        Self::new(config, cipher, runtime, entropy, schedules, config.initial_block()?)
    }
}

impl<C: BlockTransform, R: Runtime, T: Trigger> BatchScheduler<C, R, T> {
    /// Replaces the measurement trigger.
    pub fn with_trigger<U: Trigger>(self, trigger: U) -> BatchScheduler<C, R, U> {
        BatchScheduler {
            cipher: self.cipher,
            runtime: self.runtime,
            entropy: self.entropy,
            trigger,
            registry: self.registry,
            batches: self.batches,
            jitter_bound: self.jitter_bound,
            idle: self.idle,
            wait: self.wait,
        }
    }

    pub fn registry(&self) -> &Registry<C, R::Task> {
        &self.registry
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn trigger(&self) -> &T {
        &self.trigger
    }

    /// Runs every iteration and returns what happened.
    ///
    /// Fails on the first task that cannot be created or that faults. No task is left alive on
    /// return.
    pub fn run(&mut self) -> Result<CampaignReport> {
        info!(
            cipher = C::NAME,
            lanes = self.registry.len(),
            batches = self.batches,
            "starting chaff campaign"
        );

        let mut report = CampaignReport::default();
        for index in 0..self.batches {
            report.iterations.push(self.iterate(index)?);
        }

        self.trigger.end_batch();
        info!(iterations = report.iterations.len(), "chaff campaign complete");
        Ok(report)
    }

    /// Runs the campaign, then halts forever. Any error halts immediately.
    pub fn run_forever(mut self) -> ! {
        match self.run() {
            Ok(report) => {
                if let Some(ct) = report.last_ciphertext() {
                    info!(ciphertext = %ct, "halting");
                }

                self.runtime.halt()
            }

            Err(e) => fault::fail_stop(&*self.runtime, &e),
        }
    }

    fn iterate(&mut self, index: u32) -> Result<IterationReport> {
        let batch = Arc::new(BatchSignal::new());
        let input = self.registry.genuine().snapshot();

        self.quiesce(&batch)?;

        self.trigger.rise();
        self.runtime.resume_all();

        self.wait_for_genuine(&batch);

        self.trigger.fall();

        let decoys_stopped = self.runtime.critical(|| {
            self.registry.lanes()
                .filter(|lane| lane.role() != Role::Genuine && !lane.is_finished())
                .count()
        });
        self.teardown()?;

        let ciphertext = self.registry.genuine().snapshot();
        let jitter_rounds = self.registry.jitter().map(Lane::jitter_rounds);
        let completion_signals = batch.raises();

        debug!(index, ?jitter_rounds, decoys_stopped, "iteration complete");
        self.idle.idle();

        Ok(IterationReport {
            index,
            input,
            ciphertext,
            jitter_rounds,
            decoys_stopped,
            completion_signals,
        })
    }

    fn quiesce(&mut self, batch: &Arc<BatchSignal>) -> Result<()> {
        self.runtime.suspend_all();

        let input = self.registry.genuine().snapshot();
        let env = Arc::new(LaneEnv {
            cipher: Arc::clone(&self.cipher),
            runtime: Arc::clone(&self.runtime),
            batch: Arc::clone(batch),
            entropy: Arc::clone(&self.entropy),
            jitter_bound: self.jitter_bound,
        });

        let mut spawned = Ok(());
        for slot in self.registry.slots_mut() {
            slot.lane.reset(input);

            let role = slot.lane.role();
            let spec = TaskSpec {
                name: role.task_name(),
                tag: slot.lane.tag(),
                priority: role.priority(),
            };

            let lane = Arc::clone(&slot.lane);
            let env = Arc::clone(&env);
            let handle = match role {
                Role::Jitter => self.runtime.spawn(spec, move |ctx| {
                    task::jitter(&lane, &env, ctx);
                }),

                Role::Genuine | Role::Decoy => self.runtime.spawn(spec, move |ctx| {
                    task::full_round(&lane, &env, ctx);
                }),
            };

            match handle {
                Ok(handle) => slot.task = Some(handle),
                Err(e) => {
                    spawned = Err(e);
                    break;
                }
            }
        }

        if let Err(e) = &spawned {
            // Tasks still waiting for release are deleted without running.
            if let Err(teardown) = self.teardown() {
                warn!(error = %teardown, spawn_error = %e, "teardown after failed spawn");
            }
            self.runtime.resume_all();
        }

        spawned
    }

    fn wait_for_genuine(&self, batch: &BatchSignal) {
        match self.wait {
            WaitStrategy::Spin => {
                let genuine = self.registry.genuine();
                while !self.runtime.critical(|| genuine.is_finished()) {
                    self.runtime.yield_now();
                }
            }

            WaitStrategy::Notify => batch.wait(),
        }
    }

    /// Deletes every live task and clears every completion flag.
    fn teardown(&mut self) -> Result<()> {
        let mut result = Ok(());
        for slot in self.registry.slots_mut() {
            if let Some(task) = slot.task.take() {
                if let Err(e) = self.runtime.delete(task) {
                    result = result.and(Err(e));
                }
            }
        }

        let registry = &self.registry;
        self.runtime.critical(|| {
            for lane in registry.lanes() {
                lane.clear_finished();
            }
        });

        result
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    use crate::{
        aes::Aes,
        derive::Passthrough,
        entropy::{FixedSequence, SeededSource},
        runtime::{
            hosted::{HostedContext, HostedTask},
            HostedRuntime,
        },
    };
    use super::*;

    /// A hosted runtime which cannot create the task for one lane and reports a fault when
    /// deleting the genuine lane's task.
    struct Flaky {
        inner: HostedRuntime,
        fail_tag: u8,
    }

    impl Runtime for Flaky {
        type Task = HostedTask;
        type Context = HostedContext;

        fn suspend_all(&self) {
            self.inner.suspend_all()
        }

        fn resume_all(&self) {
            self.inner.resume_all()
        }

        fn spawn<F>(&self, spec: TaskSpec, body: F) -> Result<HostedTask>
            where F: FnOnce(&HostedContext) + Send + 'static
        {
            if spec.tag == self.fail_tag {
                let source = io::Error::new(io::ErrorKind::Other, "out of task memory");
                return Err(ChaffError::Spawn { tag: spec.tag, source });
            }

            self.inner.spawn(spec, body)
        }

        fn delete(&self, task: HostedTask) -> Result<()> {
            let name = task.name().to_owned();
            let genuine = task.tag() == 0;
            self.inner.delete(task)?;

            if genuine {
                return Err(ChaffError::TaskFault { name });
            }
            Ok(())
        }

        fn critical<T>(&self, f: impl FnOnce() -> T) -> T {
            self.inner.critical(f)
        }

        fn yield_now(&self) {
            self.inner.yield_now()
        }

        fn halt(&self) -> ! {
            self.inner.halt()
        }
    }

    fn config(lanes: usize, batches: u32) -> ChaffConfig {
        ChaffConfig {
            lanes,
            batches,
            idle: IdlePolicy::Spin { iterations: 10 },
            ..ChaffConfig::default()
        }
    }

    fn scheduler(config: &ChaffConfig) -> BatchScheduler<Aes, HostedRuntime> {
        let entropy = Arc::new(SeededSource::new(ChaCha8Rng::seed_from_u64(1)));
        BatchScheduler::from_config(
            config,
            Aes,
            &Passthrough,
            Arc::new(HostedRuntime::default()),
            entropy,
        ).unwrap()
    }

    #[test]
    fn iterations_chain() {
        let mut sched = scheduler(&config(4, 3));
        let report = sched.run().unwrap();
        assert_eq!(report.iterations.len(), 3);

        for pair in report.iterations.windows(2) {
            assert_eq!(pair[1].input, pair[0].ciphertext);
        }

        for (i, it) in report.iterations.iter().enumerate() {
            assert_eq!(it.index as usize, i);
            assert_eq!(it.completion_signals, 1);
            assert!(it.decoys_stopped <= 3);
            let rounds = it.jitter_rounds.unwrap();
            assert!(rounds >= 1 && rounds <= 4);
        }

        assert_eq!(sched.registry().live_tasks(), 0);
        assert_eq!(sched.runtime().live_tasks(), 0);
        assert_eq!(sched.runtime().spawned_tasks(), 12);
        assert!(sched.registry().lanes().all(|lane| !lane.is_finished()));
    }

    #[test]
    fn baseline_has_no_jitter() {
        let mut sched = scheduler(&config(1, 2));
        let report = sched.run().unwrap();

        for it in &report.iterations {
            assert_eq!(it.jitter_rounds, None);
            assert_eq!(it.decoys_stopped, 0);
        }
        assert_eq!(sched.runtime().spawned_tasks(), 2);
    }

    #[test]
    fn notify_matches_spin() {
        let spin = scheduler(&config(3, 4)).run().unwrap();

        let notify_config = ChaffConfig { wait: WaitStrategy::Notify, ..config(3, 4) };
        let notify = scheduler(&notify_config).run().unwrap();

        assert_eq!(
            spin.ciphertexts().collect::<Vec<_>>(),
            notify.ciphertexts().collect::<Vec<_>>(),
        );
    }

    #[test]
    fn rejects_mismatched_schedules() {
        let schedules = derive_schedules(&Aes, &[0u8; 16], &Passthrough, 2).unwrap();
        let result = BatchScheduler::new(
            &config(3, 1),
            Aes,
            Arc::new(HostedRuntime::default()),
            Arc::new(FixedSequence::new(vec![0])),
            schedules,
            Block::default(),
        );

        assert!(matches!(result, Err(ChaffError::InvalidLaneCount { lanes: 2, max: 3 })));
    }

    #[test]
    fn failed_spawn_reports_the_spawn_error_and_leaves_no_task() {
        let runtime = Arc::new(Flaky { inner: HostedRuntime::default(), fail_tag: 2 });
        let entropy = Arc::new(FixedSequence::new(vec![0]));
        let mut sched = BatchScheduler::from_config(
            &config(4, 2),
            Aes,
            &Passthrough,
            Arc::clone(&runtime),
            entropy,
        ).unwrap();

        let result = sched.run();
        assert!(matches!(result, Err(ChaffError::Spawn { tag: 2, .. })), "{:?}", result);

        assert_eq!(sched.registry().live_tasks(), 0);
        assert_eq!(runtime.inner.live_tasks(), 0);
        assert_eq!(runtime.inner.spawned_tasks(), 2);
        assert_eq!(runtime.inner.deleted_tasks(), 2);

        // The start gate was reopened.
        let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let spec = TaskSpec { name: "after", tag: 7, priority: crate::runtime::Priority::LANE };
        let task = runtime.inner.spawn(spec, move |_| {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
        }).unwrap();

        while !ran.load(std::sync::atomic::Ordering::SeqCst) {
            std::thread::yield_now();
        }
        runtime.inner.delete(task).unwrap();
    }
}
