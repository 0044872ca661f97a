//! # Tern Configuration
//!
//! Compile-time constants governing the scheduler and system behavior.
//! All limits are fixed at compile time. No dynamic allocation.

use crate::task::Tick;

/// Number of task slots in the task pool, including the idle task.
/// Each slot reserves `STACK_SIZE` bytes of RAM on target.
pub const MAX_TASKS: usize = 6;

/// Capacity of the global semaphore registry.
pub const MAX_SEMAPHORES: usize = 10;

/// Capacity of the global mutex registry.
pub const MAX_MUTEXES: usize = 10;

/// SysTick frequency in Hz. Determines scheduler tick granularity.
pub const TICK_HZ: u32 = 1000;

/// Ticks a task may run before an equal-priority ready task preempts it.
pub const TIMESLICE: Tick = 10;

/// Per-task stack size in bytes. Must hold the deepest call chain plus the
/// hardware exception frame (32 bytes) and the software-saved R4–R11.
pub const STACK_SIZE: usize = 0x1000;

/// System clock frequency in Hz (LPC1768 at 100 MHz).
pub const SYSTEM_CLOCK_HZ: u32 = 100_000_000;

/// Timeout sentinel: block until the resource becomes available.
pub const WAIT_FOREVER: u32 = u32::MAX;

/// Where a task woken by the delay-queue sweep re-enters its ready queue.
pub const TIMER_WAKE_POLICY: WakePolicy = WakePolicy::Head;

/// Ready-queue placement for timer-driven wakeups.
///
/// `Head` lets a task whose delay just expired run before equal-priority
/// tasks that have been waiting longer; `Tail` keeps strict arrival order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WakePolicy {
    Head,
    Tail,
}

/// Runtime scheduler parameters. Defaults come from the constants above.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    /// Round-robin budget in ticks for equal-priority tasks.
    pub timeslice: Tick,
    /// Placement of tasks released by the delay queue.
    pub timer_wake: WakePolicy,
    /// Tick interrupt frequency in Hz.
    pub tick_hz: u32,
}

impl Config {
    pub const DEFAULT: Config = Config {
        timeslice: TIMESLICE,
        timer_wake: TIMER_WAKE_POLICY,
        tick_hz: TICK_HZ,
    };
}

impl Default for Config {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Convert milliseconds to ticks at `tick_hz`, rounding up so a delay is
/// never shorter than requested.
pub const fn ms_to_ticks(ms: u32, tick_hz: u32) -> Tick {
    let ticks = (ms as u64 * tick_hz as u64 + 999) / 1000;
    if ticks >= WAIT_FOREVER as u64 {
        WAIT_FOREVER - 1
    } else {
        ticks as Tick
    }
}

/// SysTick reload value for `tick_hz` at `clock_hz`, or `None` if the
/// rate is zero, faster than the clock, or too slow for the 24-bit counter.
pub const fn systick_reload(clock_hz: u32, tick_hz: u32) -> Option<u32> {
    if tick_hz == 0 || tick_hz > clock_hz {
        return None;
    }
    let reload = clock_hz / tick_hz - 1;
    if reload > 0x00FF_FFFF {
        None
    } else {
        Some(reload)
    }
}
