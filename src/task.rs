//! # Task Control Block
//!
//! Defines the task model for Tern: the fixed priority levels, the task
//! state machine, and the per-slot record the scheduler owns.
//!
//! Task records live in a fixed array inside the scheduler and are never
//! freed; a slot is recycled through the inactive pool when its task exits.
//! Queue membership is expressed by the `next` index, so a record can sit in
//! exactly one list at a time.

use crate::mutex::MutexId;
use crate::port::Context;
use crate::semaphore::SemaphoreId;

/// Kernel time in ticks. Wraps at `u32::MAX`.
pub type Tick = u32;

/// Task entry point. Receives the argument given at creation. Returning
/// from it exits the task.
pub type TaskEntry = extern "C" fn(usize);

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// Stable identity of a task slot (its index in the task pool).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(usize);

impl TaskId {
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    /// Slot index in the task pool.
    #[inline]
    pub const fn index(self) -> usize {
        self.0
    }
}

// ---------------------------------------------------------------------------
// Priorities
// ---------------------------------------------------------------------------

/// Fixed priority levels, lowest to highest.
///
/// `None` is never the priority of a task; passing it to task creation
/// selects [`Priority::DEFAULT`].
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Priority {
    None = 0,
    Idle,
    Low,
    BelowNormal,
    Normal,
    AboveNormal,
    High,
    Realtime,
}

impl Priority {
    /// Number of real priority levels (everything except `None`).
    pub const COUNT: usize = 7;

    /// Priority assigned when creation asks for `None`.
    pub const DEFAULT: Priority = Priority::Normal;

    /// Real levels in ascending order.
    pub const LEVELS: [Priority; Self::COUNT] = [
        Priority::Idle,
        Priority::Low,
        Priority::BelowNormal,
        Priority::Normal,
        Priority::AboveNormal,
        Priority::High,
        Priority::Realtime,
    ];

    /// Map a raw level (0 = `None`, 7 = `Realtime`) back to a priority.
    /// Out-of-range values saturate at `Realtime`.
    pub const fn from_raw(raw: u8) -> Priority {
        match raw {
            0 => Priority::None,
            1..=7 => Self::LEVELS[raw as usize - 1],
            _ => Priority::Realtime,
        }
    }

    /// Index into per-level arrays (ready queues). Only meaningful for real
    /// levels.
    #[inline]
    pub(crate) const fn queue_index(self) -> usize {
        self as usize - 1
    }

    /// Substitute the default for `None`.
    #[inline]
    pub const fn or_default(self) -> Priority {
        match self {
            Priority::None => Self::DEFAULT,
            p => p,
        }
    }
}

// ---------------------------------------------------------------------------
// Task state machine
// ---------------------------------------------------------------------------

/// Execution state of a task.
///
/// ```text
///   Inactive ──create()──► Ready ◄──────── preempt / yield ───────┐
///      ▲                    │  ▲                                   │
///      │                    │  └── release / timeout / delete ──┐  │
///      │               perform_switch()                         │  │
///      │                    ▼                                   │  │
///      │                 Running ── acquire / delay ──► Blocked[WithDeadline]
///      │                    │
///      └── switch away ── Terminated ◄── exit_current()
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    /// Free slot in the inactive pool.
    Inactive,
    /// Waiting in its priority's ready queue.
    Ready,
    /// Currently executing. Belongs to no list.
    Running,
    /// Waiting on a primitive with no deadline.
    Blocked,
    /// Waiting with a deadline at `wake_tick`.
    BlockedWithDeadline,
    /// Exited; the slot returns to the pool once switched away from.
    Terminated,
}

// ---------------------------------------------------------------------------
// Wait records
// ---------------------------------------------------------------------------

/// The primitive a blocked task is queued on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitObject {
    Semaphore(SemaphoreId),
    Mutex(MutexId),
}

/// Why a waiting task was made ready again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakeReason {
    /// The primitive was released.
    Released,
    /// The deadline sweep expired the wait.
    Timeout,
    /// The primitive was deleted.
    Deleted,
}

/// An acquire in progress. Kept on the task across resumptions so a retry
/// after a lost race keeps the original deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Wait {
    pub object: WaitObject,
    /// Tick at which the acquire started.
    pub started: Tick,
    /// Requested timeout, or `WAIT_FOREVER`.
    pub timeout: u32,
    /// Arrival order among waiters; blocked lists are kept sorted by it.
    pub ticket: u32,
}

impl Wait {
    pub const fn new(object: WaitObject, started: Tick, timeout: u32, ticket: u32) -> Self {
        Self { object, started, timeout, ticket }
    }

    /// Absolute deadline, or `None` for an unbounded wait.
    pub fn deadline(&self) -> Option<Tick> {
        if self.timeout == crate::config::WAIT_FOREVER {
            None
        } else {
            Some(self.started.wrapping_add(self.timeout))
        }
    }

    /// Whether the timeout has fully elapsed at `now`. Correct across tick
    /// counter wraparound for any timeout below `WAIT_FOREVER`.
    pub fn expired(&self, now: Tick) -> bool {
        self.deadline().is_some() && now.wrapping_sub(self.started) >= self.timeout
    }
}

// ---------------------------------------------------------------------------
// Task Control Block
// ---------------------------------------------------------------------------

/// Task Control Block (TCB): the kernel's per-task state.
///
/// TCBs are stored in a fixed array in the scheduler, with no heap allocation.
/// The task's stack lives with the port; the TCB only keeps the opaque
/// context handle the port produced.
#[derive(Debug, Clone, Copy)]
pub struct TaskControlBlock {
    /// Slot identity, stable for the lifetime of the kernel.
    pub id: TaskId,

    /// Current (possibly inherited) priority.
    pub priority: Priority,

    /// Current execution state.
    pub state: TaskState,

    /// Saved execution context. Meaningful only while not Running.
    pub context: Context,

    /// Absolute deadline while `BlockedWithDeadline`.
    pub wake_tick: Tick,

    /// Next task in whichever list this record belongs to.
    pub(crate) next: Option<TaskId>,

    /// Acquire in progress, if the task is waiting on a primitive.
    pub wait: Option<Wait>,

    /// How the last wait ended, consumed by the retrying acquire.
    pub wake: Option<WakeReason>,

    pub entry: Option<TaskEntry>,
    pub argument: usize,
}

impl TaskControlBlock {
    /// An inactive slot. Used to initialize the static array.
    pub const EMPTY: Self = Self {
        id: TaskId(0),
        priority: Priority::None,
        state: TaskState::Inactive,
        context: Context::NULL,
        wake_tick: 0,
        next: None,
        wait: None,
        wake: None,
        entry: None,
        argument: 0,
    };

    /// Prepare a recycled slot for a new task. The caller supplies the
    /// initial context and enqueues the task.
    pub fn init(&mut self, entry: TaskEntry, argument: usize, priority: Priority, context: Context) {
        self.priority = priority.or_default();
        self.state = TaskState::Ready;
        self.context = context;
        self.wake_tick = 0;
        self.wait = None;
        self.wake = None;
        self.entry = Some(entry);
        self.argument = argument;
    }

    /// Blocked on a primitive or the delay queue, with or without deadline.
    #[inline]
    pub fn is_blocked(&self) -> bool {
        matches!(self.state, TaskState::Blocked | TaskState::BlockedWithDeadline)
    }

    /// Whether the deadline sweep should wake this task at `now`.
    #[inline]
    pub fn deadline_reached(&self, now: Tick) -> bool {
        self.state == TaskState::BlockedWithDeadline && self.wake_tick == now
    }
}

// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WAIT_FOREVER;

    extern "C" fn nop(_: usize) {}

    #[test]
    fn test_tcb_initialization() {
        let mut tcb = TaskControlBlock::EMPTY;
        assert_eq!(tcb.state, TaskState::Inactive);

        tcb.init(nop, 42, Priority::High, Context::from_raw(0x1000));

        assert_eq!(tcb.state, TaskState::Ready);
        assert_eq!(tcb.priority, Priority::High);
        assert_eq!(tcb.argument, 42);
        assert_eq!(tcb.context, Context::from_raw(0x1000));
        assert!(tcb.wait.is_none());
    }

    #[test]
    fn test_none_priority_maps_to_normal() {
        let mut tcb = TaskControlBlock::EMPTY;
        tcb.init(nop, 0, Priority::None, Context::NULL);
        assert_eq!(tcb.priority, Priority::Normal);
    }

    #[test]
    fn test_priority_ordering_and_raw_mapping() {
        assert!(Priority::Realtime > Priority::High);
        assert!(Priority::Idle > Priority::None);
        for (i, p) in Priority::LEVELS.iter().enumerate() {
            assert_eq!(p.queue_index(), i);
            assert_eq!(Priority::from_raw(*p as u8), *p);
        }
        assert_eq!(Priority::from_raw(0), Priority::None);
        assert_eq!(Priority::from_raw(200), Priority::Realtime);
    }

    #[test]
    fn test_deadline_reached_only_with_deadline_state() {
        let mut tcb = TaskControlBlock::EMPTY;
        tcb.wake_tick = 7;
        tcb.state = TaskState::Blocked;
        assert!(!tcb.deadline_reached(7));
        tcb.state = TaskState::BlockedWithDeadline;
        assert!(tcb.deadline_reached(7));
        assert!(!tcb.deadline_reached(8));
    }

    #[test]
    fn test_wait_expiry_across_wraparound() {
        let object = WaitObject::Semaphore(SemaphoreId::dangling());
        let wait = Wait::new(object, u32::MAX - 2, 5, 0);
        assert_eq!(wait.deadline(), Some(2));
        assert!(!wait.expired(u32::MAX));
        assert!(!wait.expired(1));
        assert!(wait.expired(2));
        assert!(wait.expired(3));
    }

    #[test]
    fn test_forever_wait_never_expires() {
        let object = WaitObject::Semaphore(SemaphoreId::dangling());
        let wait = Wait::new(object, 0, WAIT_FOREVER, 0);
        assert_eq!(wait.deadline(), None);
        assert!(!wait.expired(u32::MAX));
    }
}
