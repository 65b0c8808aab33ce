//! The task primitives a campaign needs from its host.
//!
//! On the target these come from a preemptive RTOS running on one core. [`hosted`] emulates them
//! with OS threads so that campaigns can run (and be tested) on a development machine.

pub mod hosted;

pub use self::hosted::HostedRuntime;

use crate::{lane::Tag, Result};

/// A scheduling priority band. Higher runs first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(pub u8);

impl Priority {
    pub const IDLE: Priority = Priority(0);

    /// The batch scheduler itself.
    pub const MANAGER: Priority = Priority::IDLE;

    /// Genuine and decoy lanes.
    pub const LANE: Priority = Priority(Priority::IDLE.0 + 3);

    /// The jitter lane runs one band above the others.
    pub const JITTER: Priority = Priority(Priority::LANE.0 + 1);
}

/// What the runtime needs to know to create a lane task.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskSpec {
    pub name: &'static str,
    pub tag: Tag,
    pub priority: Priority,
}

/// The view a running task has of itself.
pub trait TaskContext {
    /// Blocks until the scheduler deletes this task. May return spuriously.
    fn park(&self);

    fn is_deleted(&self) -> bool;
}

pub trait Runtime: Send + Sync + 'static {
    type Task: Send;
    type Context: TaskContext;

    /// Holds every task created from now on until `resume_all`.
    fn suspend_all(&self);

    /// Releases every held task at once.
    fn resume_all(&self);

    /// Creates a task which starts running `body` once the runnable set is resumed.
    fn spawn<F>(&self, spec: TaskSpec, body: F) -> Result<Self::Task>
        where F: FnOnce(&Self::Context) + Send + 'static;

    /// Destroys a task. A task parked or waiting for release is destroyed without running
    /// further; a task between slices stops at its next checkpoint.
    fn delete(&self, task: Self::Task) -> Result<()>;

    /// Runs `f` with preemption disabled.
    fn critical<T>(&self, f: impl FnOnce() -> T) -> T;

    /// Runs one indivisible unit of lane work.
    fn slice<T>(&self, f: impl FnOnce() -> T) -> T {
        self.critical(f)
    }

    fn yield_now(&self);

    /// Disables preemption and stops the calling context forever.
    fn halt(&self) -> !;
}
