//! # Ready and Delay Queues
//!
//! - [`ReadyQueues`]: one FIFO per priority level. Round robin within a level
//!   falls out of push-tail / pop-head.
//! - [`DelayQueue`]: a single list of sleeping tasks ordered by wake tick,
//!   compared relative to the current tick so ordering survives counter
//!   wraparound.

use crate::list::TaskList;
use crate::task::{Priority, TaskControlBlock, TaskId, Tick};

// ---------------------------------------------------------------------------
// Ready queues
// ---------------------------------------------------------------------------

pub struct ReadyQueues {
    queues: [TaskList; Priority::COUNT],
}

impl ReadyQueues {
    pub const fn new() -> Self {
        Self { queues: [TaskList::new(); Priority::COUNT] }
    }

    /// FIFO for `priority`. `priority` must be a real level.
    #[inline]
    pub fn queue(&self, priority: Priority) -> &TaskList {
        &self.queues[priority.queue_index()]
    }

    #[inline]
    pub fn queue_mut(&mut self, priority: Priority) -> &mut TaskList {
        &mut self.queues[priority.queue_index()]
    }

    /// Bit `n` set means level `n + 1` (`Idle` is bit 0) has a ready task.
    pub fn bitmap(&self) -> u8 {
        self.queues
            .iter()
            .enumerate()
            .fold(0u8, |bits, (i, queue)| bits | ((!queue.is_empty() as u8) << i))
    }

    /// Highest level with a non-empty queue, or `Priority::None`.
    ///
    /// The position of the highest set bit plus one is exactly the raw
    /// priority value, and an empty bitmap yields 0 (`None`).
    pub fn highest_nonempty_priority(&self) -> Priority {
        let bits = self.bitmap();
        Priority::from_raw((u8::BITS - bits.leading_zeros()) as u8)
    }

    pub fn is_empty(&self) -> bool {
        self.bitmap() == 0
    }
}

impl Default for ReadyQueues {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Delay queue
// ---------------------------------------------------------------------------

pub struct DelayQueue {
    list: TaskList,
}

impl DelayQueue {
    pub const fn new() -> Self {
        Self { list: TaskList::new() }
    }

    /// Insert a task whose `wake_tick` is already set, keeping the queue in
    /// chronological order as seen from `now`.
    ///
    /// Distance forward from `now` is the sort key: a wake tick numerically
    /// below `now` has wrapped and is further away than any tick between
    /// `now` and `Tick::MAX`. Equal deadlines keep arrival order.
    pub fn insert(&mut self, tasks: &mut [TaskControlBlock], id: TaskId, now: Tick) {
        self.list
            .insert_by_key(tasks, id, |tcb| tcb.wake_tick.wrapping_sub(now));
    }

    /// Pop the head if its deadline is exactly `now`.
    pub fn pop_due(&mut self, tasks: &mut [TaskControlBlock], now: Tick) -> Option<TaskId> {
        let head = self.list.head()?;
        if tasks[head.index()].wake_tick != now {
            return None;
        }
        self.list.pop_head(tasks)
    }

    pub fn remove(&mut self, tasks: &mut [TaskControlBlock], id: TaskId) -> bool {
        self.list.remove(tasks, id)
    }

    pub fn list(&self) -> &TaskList {
        &self.list
    }
}

impl Default for DelayQueue {
    fn default() -> Self {
        Self::new()
    }
}
