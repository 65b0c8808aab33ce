//! A `Runtime` on OS threads.
//!
//! The target has a single core, so lanes interleave rather than run in parallel. This backend
//! keeps that property with a *core lock*: critical sections and lane slices all serialize on it,
//! and the thread holding it is the one "on the core". Priorities are recorded on each task but
//! the host OS schedules the threads.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use parking_lot::{Condvar, Mutex};
use tracing::{trace, warn};

use crate::{lane::Tag, ChaffError, Result};
use super::{Priority, Runtime, TaskContext, TaskSpec};

/// Default stack size of a lane thread.
pub const DEFAULT_STACK_SIZE: usize = 64 * 1024;

struct Inner {
    core: Mutex<()>,

    /// `true` while the runnable set is released.
    gate: Mutex<bool>,
    wake: Condvar,

    live: AtomicUsize,
    spawned: AtomicUsize,
    deleted: AtomicUsize,

    stack_size: usize,
}

#[derive(Clone)]
pub struct HostedRuntime {
    inner: Arc<Inner>,
}

impl Default for HostedRuntime {
    fn default() -> Self {
        HostedRuntime::new(DEFAULT_STACK_SIZE)
    }
}

impl HostedRuntime {
    /// Creates a runtime whose runnable set starts released.
    pub fn new(stack_size: usize) -> Self {
        HostedRuntime {
            inner: Arc::new(Inner {
                core: Mutex::new(()),
                gate: Mutex::new(true),
                wake: Condvar::new(),
                live: AtomicUsize::new(0),
                spawned: AtomicUsize::new(0),
                deleted: AtomicUsize::new(0),
                stack_size,
            }),
        }
    }

    /// Tasks spawned and not yet deleted.
    pub fn live_tasks(&self) -> usize {
        self.inner.live.load(Ordering::SeqCst)
    }

    pub fn spawned_tasks(&self) -> usize {
        self.inner.spawned.load(Ordering::SeqCst)
    }

    pub fn deleted_tasks(&self) -> usize {
        self.inner.deleted.load(Ordering::SeqCst)
    }
}

/// A lane thread.
pub struct HostedTask {
    handle: JoinHandle<()>,
    deleted: Arc<AtomicBool>,
    name: String,
    tag: Tag,
    priority: Priority,
}

impl HostedTask {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> Tag {
        self.tag
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }
}

pub struct HostedContext {
    inner: Arc<Inner>,
    deleted: Arc<AtomicBool>,
}

impl HostedContext {
    /// Blocks until the runnable set is released. Returns `false` if the task was deleted first.
    fn wait_for_release(&self) -> bool {
        let mut released = self.inner.gate.lock();
        loop {
            if self.is_deleted() {
                return false;
            }

            if *released {
                return true;
            }

            self.inner.wake.wait(&mut released);
        }
    }
}

impl TaskContext for HostedContext {
    fn park(&self) {
        let mut gate = self.inner.gate.lock();
        if !self.is_deleted() {
            self.inner.wake.wait(&mut gate);
        }
    }

    fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::Acquire)
    }
}

impl Runtime for HostedRuntime {
    type Task = HostedTask;
    type Context = HostedContext;

    fn suspend_all(&self) {
        *self.inner.gate.lock() = false;
    }

    fn resume_all(&self) {
        *self.inner.gate.lock() = true;
        self.inner.wake.notify_all();
    }

    fn spawn<F>(&self, spec: TaskSpec, body: F) -> Result<HostedTask>
        where F: FnOnce(&HostedContext) + Send + 'static
    {
        let name = format!("{}-{}", spec.name, spec.tag);
        let deleted = Arc::new(AtomicBool::new(false));
        let ctx = HostedContext {
            inner: Arc::clone(&self.inner),
            deleted: Arc::clone(&deleted),
        };

        let handle = thread::Builder::new()
            .name(name.clone())
            .stack_size(self.inner.stack_size)
            .spawn(move || {
                if ctx.wait_for_release() {
                    body(&ctx);
                }
            })
            .map_err(|source| ChaffError::Spawn { tag: spec.tag, source })?;

        self.inner.live.fetch_add(1, Ordering::SeqCst);
        self.inner.spawned.fetch_add(1, Ordering::SeqCst);
        trace!(task = %name, priority = spec.priority.0, "spawned");

        Ok(HostedTask { handle, deleted, name, tag: spec.tag, priority: spec.priority })
    }

    fn delete(&self, task: HostedTask) -> Result<()> {
        {
            // Set under the gate lock so a task between its check and its wait cannot miss it.
            let _gate = self.inner.gate.lock();
            task.deleted.store(true, Ordering::Release);
        }
        self.inner.wake.notify_all();

        let HostedTask { handle, name, .. } = task;
        let joined = handle.join();

        self.inner.live.fetch_sub(1, Ordering::SeqCst);
        self.inner.deleted.fetch_add(1, Ordering::SeqCst);
        trace!(task = %name, "deleted");

        joined.map_err(|_| {
            warn!(task = %name, "task panicked");
            ChaffError::TaskFault { name }
        })
    }

    fn critical<T>(&self, f: impl FnOnce() -> T) -> T {
        let _core = self.inner.core.lock();
        f()
    }

    fn yield_now(&self) {
        thread::yield_now();
    }

    fn halt(&self) -> ! {
        // Holding the core lock keeps every other task off the core.
        let _core = self.inner.core.lock();
        loop {
            thread::park();
        }
    }
}
