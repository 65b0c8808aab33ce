//! Lane control blocks.
//!
//! The registry is allocated once, before the first iteration, and lives as long as the
//! scheduler. Each running lane task holds a shared reference to its own `Lane` and nothing
//! else; the scheduler owns the task handles.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::{
    config::MAX_LANES,
    runtime::Priority,
    Block, BlockTransform, ChaffError, Result,
};

/// A lane's index in the registry. Tag `0` is the genuine lane.
pub type Tag = u8;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    /// Lane 0: the real key, whose ciphertext is the campaign output.
    Genuine,

    /// A full encryption under a derived key.
    Decoy,

    /// The last lane of a multi-lane campaign. Runs a random number of rounds.
    Jitter,
}

impl Role {
    /// The role of lane `tag` in a campaign with `lanes` lanes.
    pub fn of(tag: Tag, lanes: usize) -> Role {
        match usize::from(tag) {
            0 => Role::Genuine,
            t if t == lanes - 1 => Role::Jitter,
            _ => Role::Decoy,
        }
    }

    pub fn priority(self) -> Priority {
        match self {
            Role::Genuine | Role::Decoy => Priority::LANE,
            Role::Jitter => Priority::JITTER,
        }
    }

    pub fn task_name(self) -> &'static str {
        match self {
            Role::Genuine => "genuine",
            Role::Decoy => "decoy",
            Role::Jitter => "jitter",
        }
    }
}

/// The persistent state of one lane.
pub struct Lane<C: BlockTransform> {
    tag: Tag,
    role: Role,
    schedule: C::Schedule,
    state: Mutex<Block>,

    /// Written only by the lane's own task and cleared only by the scheduler, in both cases inside
    /// a critical section.
    finished: AtomicBool,

    /// Rounds requested by the jitter lane in the current iteration.
    jitter_rounds: AtomicUsize,
}

impl<C: BlockTransform> Lane<C> {
    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn schedule(&self) -> &C::Schedule {
        &self.schedule
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// A copy of the state buffer.
    ///
    /// Blocks while the lane's task is encrypting.
    pub fn snapshot(&self) -> Block {
        *self.state.lock()
    }

    pub fn jitter_rounds(&self) -> usize {
        self.jitter_rounds.load(Ordering::Relaxed)
    }

    pub(crate) fn state(&self) -> &Mutex<Block> {
        &self.state
    }

    pub(crate) fn set_finished(&self) {
        self.finished.store(true, Ordering::Release);
    }

    pub(crate) fn clear_finished(&self) {
        self.finished.store(false, Ordering::Release);
    }

    pub(crate) fn set_jitter_rounds(&self, rounds: usize) {
        self.jitter_rounds.store(rounds, Ordering::Relaxed);
    }

    /// Prepares the lane for a new iteration starting from `input`.
    pub(crate) fn reset(&self, input: Block) {
        self.clear_finished();
        self.set_jitter_rounds(0);
        *self.state.lock() = input;
    }
}

/// A lane plus the handle of its task in the current iteration.
pub struct Slot<C: BlockTransform, T> {
    pub(crate) lane: Arc<Lane<C>>,
    pub(crate) task: Option<T>,
}

/// A fixed arena of lanes, indexed by tag.
pub struct Registry<C: BlockTransform, T> {
    slots: Box<[Slot<C, T>]>,
}

impl<C: BlockTransform, T> Registry<C, T> {
    /// Creates one lane per schedule, every buffer holding `initial`.
    pub fn new(schedules: Vec<C::Schedule>, initial: Block) -> Result<Self> {
        let lanes = schedules.len();
        if lanes == 0 || lanes > MAX_LANES {
            return Err(ChaffError::InvalidLaneCount { lanes, max: MAX_LANES });
        }

        let slots = schedules.into_iter()
            .enumerate()
            .map(|(i, schedule)| {
                let tag = i as Tag;
                let lane = Lane {
                    tag,
                    role: Role::of(tag, lanes),
                    schedule,
                    state: Mutex::new(initial),
                    finished: AtomicBool::new(false),
                    jitter_rounds: AtomicUsize::new(0),
                };

                Slot { lane: Arc::new(lane), task: None }
            })
            .collect();

        Ok(Registry { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn genuine(&self) -> &Lane<C> {
        &self.slots[0].lane
    }

    /// The jitter lane, if the campaign has more than one lane.
    pub fn jitter(&self) -> Option<&Lane<C>> {
        self.lanes().find(|lane| lane.role() == Role::Jitter).map(|lane| &**lane)
    }

    pub fn lanes(&self) -> impl Iterator<Item = &Arc<Lane<C>>> {
        self.slots.iter().map(|slot| &slot.lane)
    }

    /// Lanes which currently have a task.
    pub fn live_tasks(&self) -> usize {
        self.slots.iter().filter(|slot| slot.task.is_some()).count()
    }

    pub(crate) fn slots_mut(&mut self) -> &mut [Slot<C, T>] {
        &mut self.slots
    }
}

#[cfg(test)]
mod tests {
    use crate::{aes::Aes, derive::{derive_schedules, Passthrough}};
    use super::*;

    fn registry(lanes: usize) -> Registry<Aes, ()> {
        let schedules = derive_schedules(&Aes, &[0u8; 16], &Passthrough, lanes).unwrap();
        Registry::new(schedules, Block([0x41; 16])).unwrap()
    }

    #[test]
    fn roles() {
        let roles: Vec<_> = (0..4).map(|tag| Role::of(tag, 4)).collect();
        assert_eq!(roles, [Role::Genuine, Role::Decoy, Role::Decoy, Role::Jitter]);

        assert_eq!(Role::of(0, 1), Role::Genuine);
        assert_eq!(Role::of(1, 2), Role::Jitter);
        assert!(Role::Jitter.priority() > Role::Decoy.priority());
        assert_eq!(Role::Genuine.priority(), Role::Decoy.priority());
    }

    #[test]
    fn baseline_has_no_jitter_lane() {
        let reg = registry(1);
        assert_eq!(reg.len(), 1);
        assert!(reg.jitter().is_none());
        assert_eq!(reg.genuine().role(), Role::Genuine);
    }

    #[test]
    fn lanes_start_from_the_initial_state() {
        let reg = registry(4);
        for (i, lane) in reg.lanes().enumerate() {
            assert_eq!(usize::from(lane.tag()), i);
            assert_eq!(lane.snapshot(), Block([0x41; 16]));
            assert!(!lane.is_finished());
        }
        assert_eq!(reg.jitter().map(Lane::tag), Some(3));
        assert_eq!(reg.live_tasks(), 0);
    }

    #[test]
    fn reset_clears_completion() {
        let reg = registry(2);
        let lane = reg.genuine();
        lane.set_finished();
        lane.set_jitter_rounds(3);

        lane.reset(Block([7; 16]));
        assert!(!lane.is_finished());
        assert_eq!(lane.jitter_rounds(), 0);
        assert_eq!(lane.snapshot(), Block([7; 16]));
    }

    #[test]
    fn rejects_bad_lane_counts() {
        assert!(matches!(
            Registry::<Aes, ()>::new(Vec::new(), Block::default()),
            Err(ChaffError::InvalidLaneCount { lanes: 0, .. })
        ));

        let schedules = derive_schedules(&Aes, &[0u8; 16], &Passthrough, MAX_LANES + 1).unwrap();
        assert!(matches!(
            Registry::<Aes, ()>::new(schedules, Block::default()),
            Err(ChaffError::InvalidLaneCount { lanes: 17, .. })
        ));
    }
}
