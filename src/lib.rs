//! # Tern
//!
//! A small fixed-priority preemptive RTOS kernel for single-core ARM
//! Cortex-M microcontrollers (LPC17xx).
//!
//! ## Overview
//!
//! - **Preemptive priority scheduling** across seven levels, round robin
//!   within a level every `TIMESLICE` ticks
//! - **Tick-based delays and timeouts**, correct across tick counter
//!   wraparound
//! - **Counting semaphores** and **mutexes with priority inheritance**,
//!   both with FIFO waiter queues
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────────────────┐
//! │                    Application Tasks                    │
//! ├────────────────────────────────────────────────────────┤
//! │            Kernel API (kernel.rs, ARM only)             │
//! │  create_task · start · delay · semaphore_* · mutex_*    │
//! ├────────────────────────────────────────────────────────┤
//! │        Kernel lock (sync.rs) · KernelCell<Scheduler>    │
//! ├──────────────┬───────────────────┬─────────────────────┤
//! │  Scheduler   │  Semaphore        │  Mutex              │
//! │  scheduler.rs│  semaphore.rs     │  mutex.rs           │
//! │  ─ invoke()  │  ─ acquire()      │  ─ acquire()        │
//! │  ─ tick()    │  ─ release()      │  ─ release()        │
//! │  ─ perform_  │  ─ delete()       │  ─ inheritance      │
//! │    switch()  │                   │                     │
//! ├──────────────┴───────────────────┴─────────────────────┤
//! │  Ready / delay queues (queue.rs) · registries           │
//! │  Task lists (list.rs) · TCB and priorities (task.rs)    │
//! ├────────────────────────────────────────────────────────┤
//! │  Port trait (port.rs) ◄── Cortex-M3 (arch/cortex_m3.rs) │
//! │    PendSV · SVCall · SysTick · stack frames             │
//! └────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything above the port is plain data driven through `&mut self`,
//! so the scheduling logic is unit-tested on the host against a mock port.
//!
//! ## Memory Model
//!
//! - **No heap**: all state is statically allocated
//! - **Fixed pools**: `MAX_TASKS` task slots, `MAX_SEMAPHORES` and
//!   `MAX_MUTEXES` registry entries
//! - **Task slots are recycled, never freed**
//! - **One kernel lock**: `critical-section`, PRIMASK on target

#![cfg_attr(not(test), no_std)]

pub mod config;
pub mod error;
pub mod list;
pub mod mutex;
pub mod port;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod semaphore;
pub mod sync;
pub mod task;

#[cfg(target_arch = "arm")]
pub mod arch;
#[cfg(target_arch = "arm")]
pub mod kernel;

pub use error::{Error, Result};
pub use scheduler::Scheduler;
