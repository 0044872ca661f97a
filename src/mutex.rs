//! # Mutexes
//!
//! Binary lock with an owner and optional priority inheritance.
//!
//! Same acquire/retry shape as [`crate::semaphore`]: a blocked acquirer is
//! readied on release and claims the lock itself when it next runs, so the
//! owner is established by the acquiring task, never by the releasing one.
//!
//! ## Priority inheritance
//!
//! When a task is about to block on an inherit-enabled mutex held by a
//! lower-priority owner, the owner is raised to the waiter's priority (and
//! moved to that level's ready queue if it is waiting for the CPU). Release
//! puts the owner back to the priority it had when it acquired the lock.

use core::task::Poll;

use log::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::list::TaskList;
use crate::port::Port;
use crate::registry::Handle;
use crate::scheduler::{ready_waiter, Scheduler};
use crate::task::{Priority, TaskId, WaitObject, WakeReason};

/// Handle to a mutex in the global registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MutexId(Handle);

impl MutexId {
    pub(crate) const fn handle(self) -> Handle {
        self.0
    }
}

/// Creation attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct MutexAttr {
    pub name: &'static str,
    /// Boost the owner to the priority of a higher-priority waiter.
    pub priority_inherit: bool,
}

impl MutexAttr {
    pub const fn inherit(name: &'static str) -> Self {
        Self { name, priority_inherit: true }
    }
}

pub struct Mutex {
    pub name: &'static str,
    priority_inherit: bool,
    pub(crate) blocked: TaskList,
    owner: Option<TaskId>,
    /// Owner's priority at the moment it acquired the lock.
    owner_priority: Priority,
}

impl Mutex {
    #[inline]
    pub fn is_held(&self) -> bool {
        self.owner.is_some()
    }

    #[inline]
    pub fn owner(&self) -> Option<TaskId> {
        self.owner
    }

    #[inline]
    pub fn priority_inherit(&self) -> bool {
        self.priority_inherit
    }
}

impl<P: Port> Scheduler<P> {
    pub fn mutex_create(&mut self, attr: MutexAttr) -> Result<MutexId> {
        let mutex = Mutex {
            name: attr.name,
            priority_inherit: attr.priority_inherit,
            blocked: TaskList::new(),
            owner: None,
            owner_priority: Priority::None,
        };
        let handle = self.mutexes.insert(mutex).map_err(|_| Error::ResourceExhausted)?;
        debug!("mutex '{}' created (inherit: {})", attr.name, attr.priority_inherit);
        Ok(MutexId(handle))
    }

    /// Claim the mutex for the running task, blocking for up to `timeout`
    /// ticks while another task holds it.
    ///
    /// Asking for a mutex the caller already holds fails with
    /// `ResourceUnavailable`; the lock is not recursive.
    pub fn mutex_acquire(&mut self, id: MutexId, timeout: u32) -> Poll<Result<()>> {
        let object = WaitObject::Mutex(id);
        let resumed = self.take_wait(object);
        if matches!(resumed, Some((_, Some(WakeReason::Deleted)))) {
            return Poll::Ready(Err(Error::Deleted));
        }

        let Some(caller) = self.running() else {
            return Poll::Ready(Err(Error::Generic));
        };
        let caller_priority = self.tasks[caller.index()].priority;
        let Some(mutex) = self.mutexes.get_mut(id.0) else {
            let error = if resumed.is_some() { Error::Deleted } else { Error::InvalidArgument };
            return Poll::Ready(Err(error));
        };
        let (owner, inherit) = match mutex.owner {
            None => {
                mutex.owner = Some(caller);
                mutex.owner_priority = caller_priority;
                trace!("mutex '{}' taken by task {}", mutex.name, caller.index());
                return Poll::Ready(Ok(()));
            }
            Some(owner) if owner == caller => return Poll::Ready(Err(Error::ResourceUnavailable)),
            Some(owner) => (owner, mutex.priority_inherit),
        };

        let wait = match self.wait_step(object, timeout, resumed) {
            Ok(wait) => wait,
            Err(outcome) => return outcome,
        };

        if inherit && caller_priority > self.tasks[owner.index()].priority {
            trace!("task {} inherits {:?} from task {}", owner.index(), caller_priority, caller.index());
            self.set_priority(owner, caller_priority);
        }

        let task = match self.block_running(wait) {
            Ok(task) => task,
            Err(e) => return Poll::Ready(Err(e)),
        };
        self.enqueue_waiter(object, task);
        self.invoke();
        Poll::Pending
    }

    /// Release a mutex held by the running task.
    pub fn mutex_release(&mut self, id: MutexId) -> Result<()> {
        let running = self.running();
        let mutex = self.mutexes.get_mut(id.0).ok_or(Error::InvalidArgument)?;
        let owner = match mutex.owner {
            Some(owner) if Some(owner) == running => owner,
            _ => return Err(Error::OwnershipViolation),
        };
        mutex.owner = None;
        let restore = mutex.priority_inherit.then_some(mutex.owner_priority);
        let waiter = mutex.blocked.pop_head(&mut self.tasks);

        let mut reschedule = false;
        if let Some(original) = restore {
            if self.tasks[owner.index()].priority != original {
                trace!("task {} drops back to {:?}", owner.index(), original);
                self.set_priority(owner, original);
                reschedule = true;
            }
        }
        if let Some(waiter) = waiter {
            self.wake_waiter(waiter, WakeReason::Released);
            reschedule = true;
        }
        if reschedule {
            self.invoke();
        }
        Ok(())
    }

    /// Remove the mutex, waking every waiter with `Deleted`. A boosted
    /// owner returns to its pre-boost priority.
    pub fn mutex_delete(&mut self, id: MutexId) -> Result<()> {
        let mut mutex = self.mutexes.remove(id.0).ok_or(Error::InvalidArgument)?;
        let mut reschedule = false;

        if let (Some(owner), true) = (mutex.owner, mutex.priority_inherit) {
            if self.tasks[owner.index()].priority != mutex.owner_priority {
                self.set_priority(owner, mutex.owner_priority);
                reschedule = true;
            }
        }
        while let Some(waiter) = mutex.blocked.pop_head(&mut self.tasks) {
            self.wake_waiter(waiter, WakeReason::Deleted);
            reschedule = true;
        }
        debug!("mutex '{}' deleted", mutex.name);
        if reschedule {
            self.invoke();
        }
        Ok(())
    }

    /// Give up every mutex `task` still owns, readying the head waiter of
    /// each. Used when the owner exits; the priority snapshot is dropped
    /// with it.
    pub(crate) fn abandon_mutexes(&mut self, task: TaskId) {
        for mutex in self.mutexes.iter_mut() {
            if mutex.owner != Some(task) {
                continue;
            }
            warn!("mutex '{}' abandoned by exiting task {}", mutex.name, task.index());
            mutex.owner = None;
            if let Some(waiter) = mutex.blocked.pop_head(&mut self.tasks) {
                ready_waiter(&mut self.tasks, &mut self.ready, waiter, WakeReason::Released);
            }
        }
    }

    pub fn mutex_owner(&self, id: MutexId) -> Result<Option<TaskId>> {
        self.mutexes.get(id.0).map(Mutex::owner).ok_or(Error::InvalidArgument)
    }

    /// Tasks blocked on the mutex, oldest first.
    pub fn mutex_waiters(&self, id: MutexId) -> Result<impl Iterator<Item = TaskId> + '_> {
        let mutex = self.mutexes.get(id.0).ok_or(Error::InvalidArgument)?;
        Ok(mutex.blocked.iter(&self.tasks))
    }
}
