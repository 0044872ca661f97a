//! # Port Boundary
//!
//! The scheduler never touches registers or stacks. Everything
//! hardware-specific sits behind [`Port`]:
//!
//! - synthesizing the initial context of a new task,
//! - pending the deferred, lowest-priority switch interrupt.
//!
//! The store/restore primitive pair lives in the switch handler itself: it
//! stores the outgoing registers, passes the resulting [`Context`] to
//! `Scheduler::perform_switch`, and restores whatever handle comes back.

use crate::task::{TaskEntry, TaskId};

/// Opaque saved-context handle (a process stack pointer on Cortex-M).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Context(usize);

impl Context {
    /// Handle of a task that has never been given a context.
    pub const NULL: Context = Context(0);

    pub const fn from_raw(raw: usize) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> usize {
        self.0
    }

    pub fn from_stack_pointer(sp: *mut u32) -> Self {
        Self(sp as usize)
    }

    pub fn as_stack_pointer(self) -> *mut u32 {
        self.0 as *mut u32
    }
}

/// Hardware collaborator of the scheduler.
pub trait Port {
    /// Build the initial saved context for `task` such that restoring it
    /// starts executing `entry(argument)`.
    fn init_context(&mut self, task: TaskId, entry: TaskEntry, argument: usize) -> Context;

    /// Request an asynchronous context switch. The port later calls
    /// `Scheduler::perform_switch` with preemption masked. Repeated
    /// requests before the switch runs collapse into one.
    fn request_switch(&mut self);
}
