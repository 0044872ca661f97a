//! # Scheduler
//!
//! Core scheduling logic for Tern: fixed-priority preemption across levels,
//! round robin within a level, tick-driven delays and timeouts.
//!
//! ## Scheduling Algorithm
//!
//! `invoke()` runs on every tick and after every blocking or unblocking
//! operation:
//! 1. **Delay sweep**: tasks whose wake tick is now re-enter their ready
//!    queue (head or tail per `Config::timer_wake`)
//! 2. **Timeout sweep**: waiters on any registered semaphore or mutex whose
//!    deadline is now are made ready with a timeout outcome
//! 3. **Preemption check**: a switch is required if the running task has
//!    left `Running`, a higher level is ready, or an equal level is ready and
//!    the timeslice is used up
//! 4. **Switch request**: a still-running task is demoted to the tail of its
//!    queue and the port pends the deferred switch interrupt
//!
//! `perform_switch()` then runs from that interrupt with preemption masked:
//! it files the outgoing context and hands back the context of the head of
//! the highest non-empty ready queue.
//!
//! ## Design Notes
//!
//! - All kernel state lives in one [`Scheduler`] value; the ARM kernel keeps
//!   the single instance inside the kernel lock
//! - Task slots are a fixed array; lists link them by index
//! - Slots are never freed, only recycled through the inactive pool

use core::task::Poll;

use log::{debug, trace, warn};

use crate::config::{Config, WakePolicy, MAX_MUTEXES, MAX_SEMAPHORES, MAX_TASKS};
use crate::error::{Error, Result};
use crate::list::TaskList;
use crate::mutex::Mutex;
use crate::port::{Context, Port};
use crate::queue::{DelayQueue, ReadyQueues};
use crate::registry::Registry;
use crate::semaphore::Semaphore;
use crate::task::{
    Priority, TaskControlBlock, TaskEntry, TaskId, TaskState, Tick, Wait, WaitObject, WakeReason,
};

// ---------------------------------------------------------------------------
// Scheduler struct
// ---------------------------------------------------------------------------

/// The kernel context: task pool, queues, object registries and time.
pub struct Scheduler<P: Port> {
    port: P,
    config: Config,

    /// Fixed-size task pool. Never shrinks; exited slots are recycled.
    pub(crate) tasks: [TaskControlBlock; MAX_TASKS],

    /// Free slots, in the order they will be handed out.
    inactive: TaskList,

    pub(crate) ready: ReadyQueues,
    delayed: DelayQueue,

    pub(crate) semaphores: Registry<Semaphore, MAX_SEMAPHORES>,
    pub(crate) mutexes: Registry<Mutex, MAX_MUTEXES>,

    /// The task currently on the CPU, if the scheduler has started.
    running: Option<TaskId>,

    /// Monotonic tick counter, wraps at `Tick::MAX`.
    tick_count: Tick,

    /// Tick of the last completed switch, for timeslice accounting.
    last_switch_tick: Tick,

    idle_task: Option<TaskId>,
    started: bool,

    /// Ticket handed to the next fresh wait.
    next_ticket: u32,
}

impl<P: Port> Scheduler<P> {
    pub const fn new(port: P) -> Self {
        Self::with_config(port, Config::DEFAULT)
    }

    /// Create a scheduler with every task slot in the inactive pool.
    pub const fn with_config(port: P, config: Config) -> Self {
        let mut tasks = [TaskControlBlock::EMPTY; MAX_TASKS];
        let mut i = 0;
        while i < MAX_TASKS {
            tasks[i].id = TaskId::new(i);
            tasks[i].next = if i + 1 < MAX_TASKS { Some(TaskId::new(i + 1)) } else { None };
            i += 1;
        }

        Self {
            port,
            config,
            tasks,
            inactive: TaskList::from_parts(Some(TaskId::new(0)), Some(TaskId::new(MAX_TASKS - 1))),
            ready: ReadyQueues::new(),
            delayed: DelayQueue::new(),
            semaphores: Registry::new(),
            mutexes: Registry::new(),
            running: None,
            tick_count: 0,
            last_switch_tick: 0,
            idle_task: None,
            started: false,
            next_ticket: 0,
        }
    }

    // -----------------------------------------------------------------------
    // Introspection
    // -----------------------------------------------------------------------

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn tick_count(&self) -> Tick {
        self.tick_count
    }

    pub fn tick_frequency(&self) -> u32 {
        self.config.tick_hz
    }

    /// Record a new tick frequency. The port is responsible for
    /// reprogramming the timer.
    pub fn set_tick_frequency(&mut self, hz: u32) -> Result<()> {
        if hz == 0 {
            return Err(Error::InvalidArgument);
        }
        self.config.tick_hz = hz;
        Ok(())
    }

    #[inline]
    pub fn running(&self) -> Option<TaskId> {
        self.running
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn idle_task(&self) -> Option<TaskId> {
        self.idle_task
    }

    pub fn task(&self, id: TaskId) -> &TaskControlBlock {
        &self.tasks[id.index()]
    }

    /// Highest priority level with a ready task, or `Priority::None`.
    pub fn highest_nonempty_priority(&self) -> Priority {
        self.ready.highest_nonempty_priority()
    }

    pub fn ready_queue(&self, priority: Priority) -> impl Iterator<Item = TaskId> + '_ {
        self.ready.queue(priority).iter(&self.tasks)
    }

    pub fn delay_queue(&self) -> impl Iterator<Item = TaskId> + '_ {
        self.delayed.list().iter(&self.tasks)
    }

    /// Number of slots left in the inactive pool.
    pub fn free_slots(&self) -> usize {
        self.inactive.len(&self.tasks)
    }

    // -----------------------------------------------------------------------
    // Task lifecycle
    // -----------------------------------------------------------------------

    /// Create a task running `entry(argument)` at `priority`.
    ///
    /// `Priority::None` selects the default level. The new task is appended
    /// to its ready queue; once the scheduler has started it may preempt the
    /// caller straight away.
    pub fn create(
        &mut self,
        entry: Option<TaskEntry>,
        argument: usize,
        priority: Priority,
    ) -> Result<TaskId> {
        let entry = entry.ok_or(Error::InvalidArgument)?;
        let id = self.inactive.pop_head(&mut self.tasks).ok_or(Error::ResourceExhausted)?;

        let context = self.port.init_context(id, entry, argument);
        self.tasks[id.index()].init(entry, argument, priority, context);
        let priority = self.tasks[id.index()].priority;
        self.ready.queue_mut(priority).push_tail(&mut self.tasks, id);
        debug!("task {} created at {:?}", id.index(), priority);

        if self.started {
            self.invoke();
        }
        Ok(id)
    }

    /// Create the idle task and pick the first task to run.
    ///
    /// Returns the context the startup interrupt restores. Ticks delivered
    /// before this call only advance the counter.
    pub fn start(&mut self, idle: TaskEntry) -> Result<Context> {
        if self.started {
            return Err(Error::Generic);
        }
        let idle = self.create(Some(idle), 0, Priority::Idle)?;
        self.idle_task = Some(idle);

        let priority = self.ready.highest_nonempty_priority();
        let first = self.ready.queue_mut(priority).pop_head(&mut self.tasks).ok_or(Error::Generic)?;
        self.tasks[first.index()].state = TaskState::Running;
        self.running = Some(first);
        self.last_switch_tick = self.tick_count;
        self.started = true;
        debug!("scheduler started with task {}", first.index());
        Ok(self.tasks[first.index()].context)
    }

    /// Terminate the running task. Its slot returns to the inactive pool
    /// once the switch away from it completes. The idle task cannot exit.
    pub fn exit_current(&mut self) -> Result<()> {
        let id = self.running.ok_or(Error::Generic)?;
        if self.idle_task == Some(id) {
            return Err(Error::InvalidArgument);
        }
        let tcb = &mut self.tasks[id.index()];
        tcb.state = TaskState::Terminated;
        tcb.wait = None;
        tcb.wake = None;
        tcb.entry = None;
        self.abandon_mutexes(id);
        debug!("task {} exited", id.index());
        self.invoke();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Time
    // -----------------------------------------------------------------------

    /// Advance time by one tick and re-evaluate. Called from the tick
    /// interrupt.
    pub fn tick(&mut self) {
        self.tick_count = self.tick_count.wrapping_add(1);
        if self.started {
            self.invoke();
        }
    }

    /// Block the running task for `ticks` ticks.
    pub fn delay(&mut self, ticks: Tick) -> Result<()> {
        self.delay_until(self.tick_count.wrapping_add(ticks))
    }

    /// Block the running task until the tick counter reads `wake`.
    pub fn delay_until(&mut self, wake: Tick) -> Result<()> {
        let id = self.running.ok_or(Error::Generic)?;
        let tcb = &mut self.tasks[id.index()];
        if tcb.state != TaskState::Running {
            return Err(Error::Generic);
        }
        tcb.state = TaskState::BlockedWithDeadline;
        tcb.wake_tick = wake;
        self.delayed.insert(&mut self.tasks, id, self.tick_count);
        trace!("task {} sleeps until tick {}", id.index(), wake);
        self.invoke();
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Scheduling decisions
    // -----------------------------------------------------------------------

    /// Re-evaluate which task should run.
    pub fn invoke(&mut self) {
        let now = self.tick_count;

        while let Some(id) = self.delayed.pop_due(&mut self.tasks, now) {
            let tcb = &mut self.tasks[id.index()];
            tcb.state = TaskState::Ready;
            let priority = tcb.priority;
            let queue = self.ready.queue_mut(priority);
            match self.config.timer_wake {
                WakePolicy::Head => queue.push_head(&mut self.tasks, id),
                WakePolicy::Tail => queue.push_tail(&mut self.tasks, id),
            }
            trace!("task {} woke at tick {}", id.index(), now);
        }

        for semaphore in self.semaphores.iter_mut() {
            expire_waiters(&mut semaphore.blocked, &mut self.tasks, &mut self.ready, now);
        }
        for mutex in self.mutexes.iter_mut() {
            expire_waiters(&mut mutex.blocked, &mut self.tasks, &mut self.ready, now);
        }

        let Some(current) = self.running else {
            return;
        };
        let highest = self.ready.highest_nonempty_priority();
        let tcb = &self.tasks[current.index()];
        let still_running = tcb.state == TaskState::Running;
        let slice_used = now.wrapping_sub(self.last_switch_tick) >= self.config.timeslice;

        let required = !still_running
            || highest > tcb.priority
            || (highest == tcb.priority && slice_used);
        if !required {
            return;
        }

        if still_running {
            self.requeue_running(current);
        }
        self.port.request_switch();
    }

    /// Give the CPU to another ready task of the same priority, if any.
    pub fn yield_now(&mut self) {
        let Some(id) = self.running else {
            return;
        };
        let tcb = &self.tasks[id.index()];
        if tcb.state != TaskState::Running || self.ready.queue(tcb.priority).is_empty() {
            return;
        }
        self.requeue_running(id);
        self.port.request_switch();
    }

    /// Complete a switch requested by `invoke()`.
    ///
    /// `saved` is the context the switch handler just stored for the
    /// outgoing task. Returns the context to restore, or `None` when no task
    /// is ready (only possible before an idle task exists).
    pub fn perform_switch(&mut self, saved: Context) -> Option<Context> {
        if let Some(outgoing) = self.running {
            match self.tasks[outgoing.index()].state {
                // Nothing demoted it since the request; keep running.
                TaskState::Running => return Some(saved),
                TaskState::Terminated => {
                    let tcb = &mut self.tasks[outgoing.index()];
                    tcb.state = TaskState::Inactive;
                    tcb.context = Context::NULL;
                    self.inactive.push_tail(&mut self.tasks, outgoing);
                    self.running = None;
                }
                _ => self.tasks[outgoing.index()].context = saved,
            }
        }

        let priority = self.ready.highest_nonempty_priority();
        if priority == Priority::None {
            warn!("switch requested with no ready task");
            return None;
        }
        let next = self.ready.queue_mut(priority).pop_head(&mut self.tasks)?;
        let tcb = &mut self.tasks[next.index()];
        tcb.state = TaskState::Running;
        self.running = Some(next);
        self.last_switch_tick = self.tick_count;
        trace!("switch to task {} at {:?}", next.index(), priority);
        Some(tcb.context)
    }

    fn requeue_running(&mut self, id: TaskId) {
        let tcb = &mut self.tasks[id.index()];
        tcb.state = TaskState::Ready;
        let priority = tcb.priority;
        self.ready.queue_mut(priority).push_tail(&mut self.tasks, id);
    }

    // -----------------------------------------------------------------------
    // Block / unblock machinery shared by semaphores and mutexes
    // -----------------------------------------------------------------------

    /// Priority of the running task.
    pub(crate) fn running_priority(&self) -> Option<Priority> {
        self.running.map(|id| self.tasks[id.index()].priority)
    }

    /// Take the running task's wait record if it was waiting on `object`,
    /// together with the reason it was woken.
    pub(crate) fn take_wait(&mut self, object: WaitObject) -> Option<(Wait, Option<WakeReason>)> {
        let id = self.running?;
        let tcb = &mut self.tasks[id.index()];
        match tcb.wait {
            Some(wait) if wait.object == object => {
                tcb.wait = None;
                Some((wait, tcb.wake.take()))
            }
            _ => None,
        }
    }

    /// Mark the running task as waiting. The caller links it into the
    /// primitive's blocked list and invokes the scheduler.
    pub(crate) fn block_running(&mut self, wait: Wait) -> Result<TaskId> {
        let id = self.running.ok_or(Error::Generic)?;
        let tcb = &mut self.tasks[id.index()];
        if tcb.state != TaskState::Running {
            return Err(Error::Generic);
        }
        match wait.deadline() {
            Some(deadline) => {
                tcb.state = TaskState::BlockedWithDeadline;
                tcb.wake_tick = deadline;
            }
            None => tcb.state = TaskState::Blocked,
        }
        tcb.wait = Some(wait);
        tcb.wake = None;
        Ok(id)
    }

    /// Make a waiter that was just unlinked from a primitive ready again.
    pub(crate) fn wake_waiter(&mut self, id: TaskId, reason: WakeReason) {
        ready_waiter(&mut self.tasks, &mut self.ready, id, reason);
    }

    /// Change a task's priority, moving it to the tail of the new level's
    /// queue if it is currently ready.
    pub(crate) fn set_priority(&mut self, id: TaskId, priority: Priority) {
        let tcb = &self.tasks[id.index()];
        let old = tcb.priority;
        if old == priority {
            return;
        }
        if tcb.state == TaskState::Ready {
            self.ready.queue_mut(old).remove(&mut self.tasks, id);
            self.tasks[id.index()].priority = priority;
            self.ready.queue_mut(priority).push_tail(&mut self.tasks, id);
        } else {
            self.tasks[id.index()].priority = priority;
        }
    }

    /// Run one acquire step: on a fresh call build the wait record, on a
    /// retry reuse the stored one. Returns `Ready` with the outcome when the
    /// caller should not block.
    pub(crate) fn wait_step(
        &mut self,
        object: WaitObject,
        timeout: u32,
        resumed: Option<(Wait, Option<WakeReason>)>,
    ) -> core::result::Result<Wait, Poll<Result<()>>> {
        let now = self.tick_count;
        match resumed {
            Some((wait, reason)) => {
                if reason == Some(WakeReason::Timeout) || wait.expired(now) {
                    trace!("wait on {:?} timed out", object);
                    Err(Poll::Ready(Err(Error::Timeout)))
                } else {
                    Ok(wait)
                }
            }
            None if timeout == 0 => Err(Poll::Ready(Err(Error::ResourceUnavailable))),
            None => {
                let ticket = self.next_ticket;
                self.next_ticket = ticket.wrapping_add(1);
                Ok(Wait::new(object, now, timeout, ticket))
            }
        }
    }

    /// Link a task just marked waiting by `block_running` into `blocked`.
    /// The list stays in arrival order, so a waiter that lost the race for
    /// a released unit goes back ahead of everyone who arrived after it.
    pub(crate) fn enqueue_waiter(&mut self, object: WaitObject, task: TaskId) {
        let newest = self.next_ticket;
        let blocked = match object {
            WaitObject::Semaphore(id) => self.semaphores.get_mut(id.handle()).map(|s| &mut s.blocked),
            WaitObject::Mutex(id) => self.mutexes.get_mut(id.handle()).map(|m| &mut m.blocked),
        };
        if let Some(blocked) = blocked {
            // distance back from the newest ticket, so wraparound sorts right
            blocked.insert_by_key(&mut self.tasks, task, |tcb| {
                tcb.wait.map_or(0, |w| w.ticket.wrapping_sub(newest))
            });
        }
    }
}

/// Put an unlinked waiter back on its ready queue with `reason`.
pub(crate) fn ready_waiter(tasks: &mut [TaskControlBlock], ready: &mut ReadyQueues, id: TaskId, reason: WakeReason) {
    let tcb = &mut tasks[id.index()];
    tcb.state = TaskState::Ready;
    tcb.wake = Some(reason);
    let priority = tcb.priority;
    ready.queue_mut(priority).push_tail(tasks, id);
}

/// Wake every waiter in `blocked` whose deadline is `now`, in list order.
fn expire_waiters(
    blocked: &mut TaskList,
    tasks: &mut [TaskControlBlock],
    ready: &mut ReadyQueues,
    now: Tick,
) {
    loop {
        let due = blocked.iter(tasks).find(|&id| tasks[id.index()].deadline_reached(now));
        let Some(id) = due else {
            break;
        };
        blocked.remove(tasks, id);
        ready_waiter(tasks, ready, id, WakeReason::Timeout);
        trace!("task {} wait expired at tick {}", id.index(), now);
    }
}

// ---------------------------------------------------------------------------
// Host test support
// ---------------------------------------------------------------------------


// ---------------------------------------------------------------------------
// Unit tests (host-only)
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;

    #[test]
    fn test_fresh_scheduler_has_full_pool() {
        let s = scheduler();
        assert_eq!(s.free_slots(), MAX_TASKS);
        assert_eq!(s.running(), None);
        assert_eq!(s.highest_nonempty_priority(), Priority::None);
    }

    #[test]
    fn test_create_enqueues_ready_at_tail() {
        let mut s = scheduler();
        let a = spawn(&mut s, Priority::Normal);
        let b = spawn(&mut s, Priority::Normal);
        assert_eq!(s.task(a).state, TaskState::Ready);
        assert_eq!(s.task(a).context, MockPort::initial_context(a));
        assert_eq!(s.ready_queue(Priority::Normal).collect::<Vec<_>>(), vec![a, b]);
        assert_eq!(s.port().contexts_built, 2);
    }

    #[test]
    fn test_create_without_entry_is_invalid() {
        let mut s = scheduler();
        assert_eq!(s.create(None, 0, Priority::Low), Err(Error::InvalidArgument));
        assert_eq!(s.free_slots(), MAX_TASKS);
    }

    #[test]
    fn test_create_none_priority_defaults_to_normal() {
        let mut s = scheduler();
        let id = spawn(&mut s, Priority::None);
        assert_eq!(s.task(id).priority, Priority::Normal);
    }

    #[test]
    fn test_pool_exhaustion_leaves_state_unchanged() {
        let mut s = scheduler();
        for _ in 0..MAX_TASKS {
            spawn(&mut s, Priority::Low);
        }
        let before: Vec<_> = s.ready_queue(Priority::Low).collect();
        assert_eq!(s.create(Some(body), 0, Priority::High), Err(Error::ResourceExhausted));
        assert_eq!(s.ready_queue(Priority::Low).collect::<Vec<_>>(), before);
        assert_eq!(s.highest_nonempty_priority(), Priority::Low);
    }

    #[test]
    fn test_start_runs_highest_priority_task() {
        let mut s = scheduler();
        spawn(&mut s, Priority::Low);
        let high = spawn(&mut s, Priority::High);
        let ctx = start(&mut s);
        assert_eq!(s.running(), Some(high));
        assert_eq!(ctx, MockPort::initial_context(high));
        assert_eq!(s.task(high).state, TaskState::Running);
        assert!(s.idle_task().is_some());
        assert_eq!(s.start(idle), Err(Error::Generic));
    }

    #[test]
    fn test_ticks_before_start_only_count() {
        let mut s = scheduler();
        spawn(&mut s, Priority::Low);
        s.tick();
        s.tick();
        assert_eq!(s.tick_count(), 2);
        assert_eq!(s.port().switch_requests, 0);
    }

    #[test]
    fn test_delayed_high_task_preempts_at_wake_tick() {
        // A (LOW) runs alone while B (HIGH) sleeps 100 ticks.
        let mut s = scheduler();
        let a = spawn(&mut s, Priority::Low);
        let b = spawn(&mut s, Priority::High);
        start(&mut s);
        assert_eq!(s.running(), Some(b));

        s.delay(100).unwrap();
        assert_eq!(s.task(b).state, TaskState::BlockedWithDeadline);
        assert_eq!(s.task(b).wake_tick, 100);
        service_switch(&mut s);
        assert_eq!(s.running(), Some(a));

        advance(&mut s, 99);
        assert_eq!(s.running(), Some(a));
        assert_eq!(s.task(b).state, TaskState::BlockedWithDeadline);

        advance(&mut s, 1);
        assert_eq!(s.tick_count(), 100);
        assert_eq!(s.running(), Some(b));
        assert_eq!(s.task(a).state, TaskState::Ready);
    }

    #[test]
    fn test_outgoing_context_is_stored() {
        let mut s = scheduler();
        let a = spawn(&mut s, Priority::Low);
        let b = spawn(&mut s, Priority::High);
        start(&mut s);
        s.delay(5).unwrap();
        service_switch(&mut s);
        assert_eq!(s.running(), Some(a));
        assert_eq!(s.task(b).context.raw(), MockPort::initial_context(b).raw() + 0x40);
    }

    #[test]
    fn test_round_robin_every_timeslice() {
        let mut s = scheduler();
        let a = spawn(&mut s, Priority::Normal);
        let b = spawn(&mut s, Priority::Normal);
        start(&mut s);
        let slice = s.config().timeslice;

        let mut order = vec![s.running().unwrap()];
        for _ in 0..4 {
            advance(&mut s, slice - 1);
            assert_eq!(s.running(), Some(*order.last().unwrap()));
            advance(&mut s, 1);
            order.push(s.running().unwrap());
        }
        assert_eq!(order, vec![a, b, a, b, a]);
    }

    #[test]
    fn test_lone_task_keeps_cpu_past_timeslice() {
        let mut s = scheduler();
        let a = spawn(&mut s, Priority::Normal);
        start(&mut s);
        let requests = s.port().switch_requests;
        let slices = 3 * s.config().timeslice;
        advance(&mut s, slices);
        assert_eq!(s.running(), Some(a));
        assert_eq!(s.port().switch_requests, requests);
    }

    #[test]
    fn test_yield_with_peer_switches() {
        let mut s = scheduler();
        let a = spawn(&mut s, Priority::Normal);
        let b = spawn(&mut s, Priority::Normal);
        start(&mut s);
        s.yield_now();
        service_switch(&mut s);
        assert_eq!(s.running(), Some(b));
        assert_eq!(s.ready_queue(Priority::Normal).collect::<Vec<_>>(), vec![a]);
    }

    #[test]
    fn test_yield_without_peer_is_noop() {
        let mut s = scheduler();
        let a = spawn(&mut s, Priority::Normal);
        spawn(&mut s, Priority::Low);
        start(&mut s);
        s.yield_now();
        assert!(!s.port().switch_pending);
        assert_eq!(s.running(), Some(a));
    }

    #[test]
    fn test_timer_wake_goes_to_queue_head() {
        let mut s = scheduler();
        let a = spawn(&mut s, Priority::Normal);
        let b = spawn(&mut s, Priority::Normal);
        let c = spawn(&mut s, Priority::Normal);
        start(&mut s);
        assert_eq!(s.running(), Some(a));
        s.delay(3).unwrap();
        service_switch(&mut s);
        assert_eq!(s.running(), Some(b));

        advance(&mut s, 3);
        // a jumps ahead of c, which has been ready since creation
        assert_eq!(s.running(), Some(b));
        assert_eq!(s.ready_queue(Priority::Normal).collect::<Vec<_>>(), vec![a, c]);
    }

    #[test]
    fn test_timer_wake_tail_policy() {
        let config = Config { timer_wake: WakePolicy::Tail, ..Config::DEFAULT };
        let mut s = Scheduler::with_config(MockPort::new(), config);
        let a = spawn(&mut s, Priority::Normal);
        let b = spawn(&mut s, Priority::Normal);
        let c = spawn(&mut s, Priority::Normal);
        start(&mut s);
        s.delay(3).unwrap();
        service_switch(&mut s);
        advance(&mut s, 3);
        assert_eq!(s.running(), Some(b));
        assert_eq!(s.ready_queue(Priority::Normal).collect::<Vec<_>>(), vec![c, a]);
    }

    #[test]
    fn test_delay_queue_wraparound_order() {
        let mut s = scheduler();
        let x = spawn(&mut s, Priority::High);
        let y = spawn(&mut s, Priority::AboveNormal);
        let low = spawn(&mut s, Priority::Low);
        s.tick_count = Tick::MAX - 5;
        start(&mut s);
        assert_eq!(s.running(), Some(x));

        // X sleeps 10 ticks and wraps to a small wake tick.
        s.delay(10).unwrap();
        assert_eq!(s.task(x).wake_tick, 4);
        service_switch(&mut s);
        assert_eq!(s.running(), Some(y));

        // Y sleeps to a larger, not-yet-wrapped tick.
        s.delay_until(Tick::MAX - 1).unwrap();
        service_switch(&mut s);
        assert_eq!(s.running(), Some(low));

        assert_eq!(s.delay_queue().collect::<Vec<_>>(), vec![y, x]);

        advance(&mut s, 4);
        assert_eq!(s.tick_count(), Tick::MAX - 1);
        assert_eq!(s.running(), Some(y));
        assert_eq!(s.task(x).state, TaskState::BlockedWithDeadline);

        advance(&mut s, 6);
        assert_eq!(s.tick_count(), 4);
        assert_eq!(s.running(), Some(x));
    }

    #[test]
    fn test_exit_recycles_slot_after_switch() {
        let mut s = scheduler();
        let a = spawn(&mut s, Priority::High);
        let b = spawn(&mut s, Priority::Low);
        start(&mut s);
        let free = s.free_slots();
        s.exit_current().unwrap();
        assert_eq!(s.task(a).state, TaskState::Terminated);
        assert_eq!(s.free_slots(), free);

        service_switch(&mut s);
        assert_eq!(s.running(), Some(b));
        assert_eq!(s.task(a).state, TaskState::Inactive);
        assert_eq!(s.free_slots(), free + 1);

        // the recycled slot is handed out last
        let mut again = None;
        for _ in 0..s.free_slots() {
            again = Some(spawn(&mut s, Priority::Low));
        }
        assert_eq!(again, Some(a));
        assert_eq!(s.task(a).state, TaskState::Ready);
        assert_eq!(s.task(a).context, MockPort::initial_context(a));
    }

    #[test]
    fn test_idle_task_cannot_exit() {
        let mut s = scheduler();
        start(&mut s);
        assert_eq!(s.running(), s.idle_task());
        assert_eq!(s.exit_current(), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_create_after_start_preempts_lower_task() {
        let mut s = scheduler();
        spawn(&mut s, Priority::Low);
        start(&mut s);
        let high = spawn(&mut s, Priority::High);
        assert!(s.port().switch_pending);
        service_switch(&mut s);
        assert_eq!(s.running(), Some(high));
    }

    #[test]
    fn test_spurious_switch_keeps_running_task() {
        let mut s = scheduler();
        let a = spawn(&mut s, Priority::Normal);
        start(&mut s);
        let saved = Context::from_raw(0xBEEF);
        assert_eq!(s.perform_switch(saved), Some(saved));
        assert_eq!(s.running(), Some(a));
    }

    #[test]
    fn test_tick_frequency() {
        let mut s = scheduler();
        assert_eq!(s.tick_frequency(), crate::config::TICK_HZ);
        assert_eq!(s.set_tick_frequency(0), Err(Error::InvalidArgument));
        s.set_tick_frequency(100).unwrap();
        assert_eq!(s.tick_frequency(), 100);
    }

    #[test]
    fn test_delay_before_start_fails() {
        let mut s = scheduler();
        spawn(&mut s, Priority::Low);
        assert_eq!(s.delay(10), Err(Error::Generic));
    }
}
