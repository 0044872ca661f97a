//! # Kernel
//!
//! The global kernel instance and the task-facing API for Tern on
//! Cortex-M3. Every call takes the kernel lock, drives the [`Scheduler`]
//! and lets any switch it pended happen once the lock is dropped.
//!
//! ## Startup Sequence
//!
//! ```text
//! reset_handler (cortex-m-rt)
//!   └─► main()
//!         ├─► kernel::create_task()     ← register tasks (×N)
//!         ├─► kernel::semaphore_create() / mutex_create()
//!         └─► kernel::start()           ← no return on success
//!               ├─► SysTick + handler priorities
//!               ├─► Scheduler::start()  ← idle task, pick first task
//!               └─► svc 0               ← SVCall restores the first task
//! ```
//!
//! ## Blocking
//!
//! A blocking call that cannot complete leaves its task blocked with a
//! PendSV pending. Leaving the critical section takes the switch; when the
//! task is resumed the call is retried, which decides the outcome.
//! Blocking calls from an exception handler fail with [`Error::Isr`].

use core::convert::Infallible;
use core::sync::atomic::{AtomicUsize, Ordering};
use core::task::Poll;

use log::{error, info};

use crate::arch::cortex_m3::{self, CortexM3};
use crate::config::{ms_to_ticks, systick_reload, SYSTEM_CLOCK_HZ};
use crate::error::{Error, Result};
use crate::mutex::{MutexAttr, MutexId};
use crate::port::Context;
use crate::scheduler::Scheduler;
use crate::semaphore::{SemaphoreAttr, SemaphoreId};
use crate::sync::KernelCell;
use crate::task::{Priority, TaskEntry, TaskId, Tick};

// ---------------------------------------------------------------------------
// Global kernel instance
// ---------------------------------------------------------------------------

static KERNEL: KernelCell<Scheduler<CortexM3>> = KernelCell::new(Scheduler::new(CortexM3::new()));

/// Context SVCall restores to enter the first task.
static FIRST_CONTEXT: AtomicUsize = AtomicUsize::new(0);

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

/// Start the scheduler. Does not return on success.
///
/// # Errors
/// - `Error::Generic` if already started
/// - `Error::ResourceExhausted` if no slot is left for the idle task
/// - `Error::InvalidArgument` if the tick frequency cannot be programmed
pub fn start(mut core: cortex_m::Peripherals) -> Result<Infallible> {
    let tick_hz = KERNEL.with(|s| s.tick_frequency());
    cortex_m3::set_interrupt_priorities(&mut core.SCB);

    // Ticks may arrive from here on; they stay pending until SVCall.
    cortex_m3::mask_scheduler_interrupts();
    let first = cortex_m3::configure_systick(&mut core.SYST, tick_hz)
        .and_then(|()| KERNEL.with(|s| s.start(cortex_m3::idle)))
        .inspect_err(|_| cortex_m3::unmask_scheduler_interrupts())?;
    FIRST_CONTEXT.store(first.raw(), Ordering::Release);
    info!("tern: scheduler started at {} Hz", tick_hz);

    cortex_m3::start_first_task()
}

// ---------------------------------------------------------------------------
// Tasks and time
// ---------------------------------------------------------------------------

/// Create a task running `entry(argument)`. `Priority::None` selects the
/// default level. After start a higher-priority task preempts the caller.
pub fn create_task(entry: TaskEntry, argument: usize, priority: Priority) -> Result<TaskId> {
    KERNEL.with(|s| s.create(Some(entry), argument, priority))
}

/// Terminate the calling task. Returns only on failure.
pub fn exit_task() -> Result<Infallible> {
    thread_mode()?;
    KERNEL.with(|s| s.exit_current())?;
    loop {
        cortex_m::asm::wfi();
    }
}

/// Let another ready task of the same priority run.
pub fn yield_task() -> Result<()> {
    thread_mode()?;
    KERNEL.with(|s| s.yield_now());
    Ok(())
}

/// Block the calling task for `ticks` ticks.
pub fn delay(ticks: Tick) -> Result<()> {
    thread_mode()?;
    KERNEL.with(|s| s.delay(ticks))
}

/// Block the calling task for at least `ms` milliseconds.
pub fn delay_ms(ms: u32) -> Result<()> {
    delay(ms_to_ticks(ms, tick_frequency()))
}

/// Block the calling task until the tick counter reads `wake`.
pub fn delay_until(wake: Tick) -> Result<()> {
    thread_mode()?;
    KERNEL.with(|s| s.delay_until(wake))
}

pub fn tick_count() -> Tick {
    KERNEL.with(|s| s.tick_count())
}

pub fn tick_frequency() -> u32 {
    KERNEL.with(|s| s.tick_frequency())
}

/// Change the tick rate, reprogramming SysTick if already running.
pub fn set_tick_frequency(hz: u32) -> Result<()> {
    systick_reload(SYSTEM_CLOCK_HZ, hz).ok_or(Error::InvalidArgument)?;
    KERNEL.with(|s| {
        s.set_tick_frequency(hz)?;
        if s.is_started() {
            cortex_m3::reprogram_systick(hz)?;
        }
        Ok(())
    })
}

pub fn current_task() -> Option<TaskId> {
    KERNEL.with(|s| s.running())
}

// ---------------------------------------------------------------------------
// Semaphores
// ---------------------------------------------------------------------------

pub fn semaphore_create(max: u32, initial: u32, attr: SemaphoreAttr) -> Result<SemaphoreId> {
    KERNEL.with(|s| s.semaphore_create(max, initial, attr))
}

/// Take one unit, waiting up to `timeout` ticks (`WAIT_FOREVER` for no
/// limit). From an exception handler only `timeout == 0` is allowed.
pub fn semaphore_acquire(id: SemaphoreId, timeout: u32) -> Result<()> {
    if cortex_m3::in_interrupt() {
        if timeout != 0 {
            return Err(Error::Isr);
        }
        return KERNEL.with(|s| s.semaphore_try_acquire(id));
    }
    block_on(|s| s.semaphore_acquire(id, timeout))
}

pub fn semaphore_release(id: SemaphoreId) -> Result<()> {
    KERNEL.with(|s| s.semaphore_release(id))
}

pub fn semaphore_delete(id: SemaphoreId) -> Result<()> {
    KERNEL.with(|s| s.semaphore_delete(id))
}

pub fn semaphore_count(id: SemaphoreId) -> Result<u32> {
    KERNEL.with(|s| s.semaphore_count(id))
}

// ---------------------------------------------------------------------------
// Mutexes
// ---------------------------------------------------------------------------

pub fn mutex_create(attr: MutexAttr) -> Result<MutexId> {
    KERNEL.with(|s| s.mutex_create(attr))
}

/// Lock the mutex for the calling task, waiting up to `timeout` ticks.
pub fn mutex_acquire(id: MutexId, timeout: u32) -> Result<()> {
    thread_mode()?;
    block_on(|s| s.mutex_acquire(id, timeout))
}

pub fn mutex_release(id: MutexId) -> Result<()> {
    thread_mode()?;
    KERNEL.with(|s| s.mutex_release(id))
}

pub fn mutex_delete(id: MutexId) -> Result<()> {
    KERNEL.with(|s| s.mutex_delete(id))
}

pub fn mutex_owner(id: MutexId) -> Result<Option<TaskId>> {
    KERNEL.with(|s| s.mutex_owner(id))
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

fn thread_mode() -> Result<()> {
    if cortex_m3::in_interrupt() {
        return Err(Error::Isr);
    }
    Ok(())
}

/// Drive an acquire step until it completes. Each `Pending` is followed by
/// the switch it pended; the next iteration runs once the task is resumed.
fn block_on(mut step: impl FnMut(&mut Scheduler<CortexM3>) -> Poll<Result<()>>) -> Result<()> {
    loop {
        if let Poll::Ready(result) = KERNEL.with(&mut step) {
            return result;
        }
    }
}

/// Tick interrupt body.
pub(crate) fn tick() {
    KERNEL.with(|s| s.tick());
}

/// PendSV body: file `saved` and return the context to restore.
pub(crate) fn switch_context(saved: Context) -> Context {
    KERNEL.with(|s| s.perform_switch(saved)).unwrap_or_else(|| {
        error!("tern: no runnable task, resuming the interrupted one");
        saved
    })
}

pub(crate) fn first_context() -> Context {
    Context::from_raw(FIRST_CONTEXT.load(Ordering::Acquire))
}
