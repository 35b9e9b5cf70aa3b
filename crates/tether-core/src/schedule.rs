#![forbid(unsafe_code)]

//! Idle queue: the deferred-execution substrate.
//!
//! GUI hosts distinguish "fire a callback now" from "fire it soon, once the
//! toolkit is idle". [`IdleQueue`] models the latter as an explicit FIFO
//! queue the embedding application pumps from its idle hook.
//!
//! # Invariants
//!
//! 1. `defer` never executes the task inline.
//! 2. `pump` runs exactly the tasks that were queued when it was called, in
//!    FIFO order. Tasks deferred during a pump wait for the next pump — a
//!    firing schedules for the *next* idle tick, never the current one.
//! 3. There is no cancellation primitive; a task whose referent died is
//!    expected to check liveness itself at execution time and no-op.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

type Task = Box<dyn FnOnce()>;

/// Cloneable handle to a FIFO queue of deferred tasks.
#[derive(Clone, Default)]
pub struct IdleQueue {
    tasks: Rc<RefCell<VecDeque<Task>>>,
}

impl IdleQueue {
    /// Create an empty queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue `task` to run on the next pump.
    pub fn defer(&self, task: impl FnOnce() + 'static) {
        self.tasks.borrow_mut().push_back(Box::new(task));
    }

    /// Run the tasks queued at the moment of this call, in FIFO order.
    ///
    /// Returns how many tasks ran. Tasks deferred by a running task are left
    /// queued for the next pump.
    pub fn pump(&self) -> usize {
        // Snapshot so reentrant defers do not extend this tick.
        let batch = self.tasks.borrow().len();
        for _ in 0..batch {
            let task = self.tasks.borrow_mut().pop_front();
            let Some(task) = task else { break };
            task();
        }
        batch
    }

    /// Number of queued tasks.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tasks.borrow().len()
    }

    /// Whether the queue is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tasks.borrow().is_empty()
    }
}

impl std::fmt::Debug for IdleQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IdleQueue").field("len", &self.len()).finish()
    }
}
