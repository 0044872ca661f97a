//! # Counting Semaphores
//!
//! A count in `[0, max]` with a FIFO of blocked acquirers. Release never
//! hands the unit to a waiter directly: it bumps the count and readies the
//! oldest waiter, which takes the unit when it next runs.
//!
//! Acquire is a step function over the calling task. `Pending` means the
//! task is now blocked; the caller lets the switch happen and calls again
//! with the same arguments once the task runs.

use core::task::Poll;

use log::debug;

use crate::error::{Error, Result};
use crate::list::TaskList;
use crate::port::Port;
use crate::registry::Handle;
use crate::scheduler::Scheduler;
use crate::task::{WaitObject, WakeReason};

/// Handle to a semaphore in the global registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SemaphoreId(Handle);

impl SemaphoreId {
    pub(crate) const fn handle(self) -> Handle {
        self.0
    }

    #[cfg(test)]
    pub(crate) const fn dangling() -> Self {
        Self(Handle::dangling())
    }
}

/// Creation attributes.
#[derive(Debug, Clone, Copy, Default)]
pub struct SemaphoreAttr {
    pub name: &'static str,
}

pub struct Semaphore {
    pub name: &'static str,
    count: u32,
    max: u32,
    pub(crate) blocked: TaskList,
}

impl Semaphore {
    #[inline]
    pub fn count(&self) -> u32 {
        self.count
    }

    #[inline]
    pub fn max(&self) -> u32 {
        self.max
    }
}

impl<P: Port> Scheduler<P> {
    /// Register a semaphore holding `initial` of `max` units.
    pub fn semaphore_create(&mut self, max: u32, initial: u32, attr: SemaphoreAttr) -> Result<SemaphoreId> {
        if initial > max {
            return Err(Error::InvalidArgument);
        }
        let semaphore = Semaphore { name: attr.name, count: initial, max, blocked: TaskList::new() };
        let handle = self.semaphores.insert(semaphore).map_err(|_| Error::ResourceExhausted)?;
        debug!("semaphore '{}' created ({}/{})", attr.name, initial, max);
        Ok(SemaphoreId(handle))
    }

    /// Take one unit, blocking the running task for up to `timeout` ticks.
    ///
    /// `timeout == 0` never blocks. After a wake the outcome is decided by
    /// re-checking: deleted → `Deleted`; a unit available → `Ok`; deadline
    /// passed → `Timeout`; otherwise wait again with the original deadline
    /// and the original place in line.
    pub fn semaphore_acquire(&mut self, id: SemaphoreId, timeout: u32) -> Poll<Result<()>> {
        let object = WaitObject::Semaphore(id);
        let resumed = self.take_wait(object);
        if matches!(resumed, Some((_, Some(WakeReason::Deleted)))) {
            return Poll::Ready(Err(Error::Deleted));
        }

        let Some(semaphore) = self.semaphores.get_mut(id.0) else {
            // deleted after this waiter was readied for another reason
            let error = if resumed.is_some() { Error::Deleted } else { Error::InvalidArgument };
            return Poll::Ready(Err(error));
        };
        if semaphore.count > 0 {
            semaphore.count -= 1;
            return Poll::Ready(Ok(()));
        }

        let wait = match self.wait_step(object, timeout, resumed) {
            Ok(wait) => wait,
            Err(outcome) => return outcome,
        };
        let task = match self.block_running(wait) {
            Ok(task) => task,
            Err(e) => return Poll::Ready(Err(e)),
        };
        self.enqueue_waiter(object, task);
        self.invoke();
        Poll::Pending
    }

    /// Take one unit if available, without touching the running task.
    /// Safe to call from interrupt context.
    pub fn semaphore_try_acquire(&mut self, id: SemaphoreId) -> Result<()> {
        let semaphore = self.semaphores.get_mut(id.0).ok_or(Error::InvalidArgument)?;
        if semaphore.count == 0 {
            return Err(Error::ResourceUnavailable);
        }
        semaphore.count -= 1;
        Ok(())
    }

    /// Return one unit and ready the oldest waiter, if any.
    pub fn semaphore_release(&mut self, id: SemaphoreId) -> Result<()> {
        let semaphore = self.semaphores.get_mut(id.0).ok_or(Error::InvalidArgument)?;
        if semaphore.count >= semaphore.max {
            return Err(Error::InvariantViolation);
        }
        semaphore.count += 1;

        if let Some(waiter) = semaphore.blocked.pop_head(&mut self.tasks) {
            self.wake_waiter(waiter, WakeReason::Released);
            self.invoke();
        }
        Ok(())
    }

    /// Remove the semaphore, waking every waiter with `Deleted`.
    pub fn semaphore_delete(&mut self, id: SemaphoreId) -> Result<()> {
        let mut semaphore = self.semaphores.remove(id.0).ok_or(Error::InvalidArgument)?;
        let mut woken = false;
        while let Some(waiter) = semaphore.blocked.pop_head(&mut self.tasks) {
            self.wake_waiter(waiter, WakeReason::Deleted);
            woken = true;
        }
        debug!("semaphore '{}' deleted", semaphore.name);
        if woken {
            self.invoke();
        }
        Ok(())
    }

    pub fn semaphore_count(&self, id: SemaphoreId) -> Result<u32> {
        self.semaphores.get(id.0).map(Semaphore::count).ok_or(Error::InvalidArgument)
    }

    /// Tasks blocked on the semaphore, oldest first.
    pub fn semaphore_waiters(&self, id: SemaphoreId) -> Result<impl Iterator<Item = crate::task::TaskId> + '_> {
        let semaphore = self.semaphores.get(id.0).ok_or(Error::InvalidArgument)?;
        Ok(semaphore.blocked.iter(&self.tasks))
    }
}
