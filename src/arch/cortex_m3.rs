//! # Cortex-M3 Port Layer
//!
//! Hardware-specific code for the ARM Cortex-M3 (LPC17xx, Thumb-2).
//! Implements [`Port`] on top of PendSV, starts the first task through
//! SVCall and drives the tick from SysTick.
//!
//! ## Context Layout
//!
//! Tasks run in Thread mode on the process stack (PSP). On exception entry
//! the hardware stacks R0–R3, R12, LR, PC and xPSR; the switch handler
//! pushes R4–R11 below that. A task's [`Context`] is the PSP value after
//! both pushes:
//!
//! ```text
//!  high  ┌──────────┐
//!        │ xPSR     │  0x0100_0000 (Thumb)
//!        │ PC       │  task entry
//!        │ LR       │  task_return
//!        │ R12..R1  │  0
//!        │ R0       │  argument
//!        │ R11..R4  │  0
//!  low   └──────────┘ ◄── Context
//! ```
//!
//! ## Interrupt Priorities
//!
//! PendSV and SysTick both sit at the lowest priority, so a switch never
//! preempts an application ISR and the tick never interrupts a switch.

use core::arch::global_asm;
use core::ptr::addr_of_mut;

use cortex_m::peripheral::scb::{SystemHandler, VectActive};
use cortex_m::peripheral::syst::SystClkSource;
use cortex_m::peripheral::{SCB, SYST};
use log::error;

use crate::config::{MAX_TASKS, STACK_SIZE, SYSTEM_CLOCK_HZ};
use crate::error::{Error, Result};
use crate::port::{Context, Port};
use crate::task::{TaskEntry, TaskId};

const STACK_WORDS: usize = STACK_SIZE / 4;

/// Hardware frame plus the software-saved R4–R11.
const FRAME_WORDS: usize = 16;

/// Initial xPSR: only the Thumb bit.
const INITIAL_XPSR: u32 = 0x0100_0000;

#[repr(C, align(8))]
struct Stack([u32; STACK_WORDS]);

/// One stack per task slot. A slot's stack is reused when the slot is.
static mut STACKS: [Stack; MAX_TASKS] = [const { Stack([0; STACK_WORDS]) }; MAX_TASKS];

// ---------------------------------------------------------------------------
// Port
// ---------------------------------------------------------------------------

/// The Cortex-M3 implementation of [`Port`].
pub struct CortexM3;

impl CortexM3 {
    pub const fn new() -> Self {
        Self
    }
}

impl Default for CortexM3 {
    fn default() -> Self {
        Self::new()
    }
}

impl Port for CortexM3 {
    fn init_context(&mut self, task: TaskId, entry: TaskEntry, argument: usize) -> Context {
        // SAFETY: the slot's previous task (if any) has been switched away
        // from for good, so nothing else touches this stack. Called inside
        // the kernel lock.
        unsafe {
            let stack = addr_of_mut!(STACKS[task.index()]) as *mut u32;
            let frame = stack.add(STACK_WORDS - FRAME_WORDS);
            for word in 0..FRAME_WORDS {
                frame.add(word).write_volatile(0);
            }
            frame.add(8).write_volatile(argument as u32);
            frame.add(13).write_volatile(task_return as usize as u32);
            // stacked PC must have the Thumb bit clear
            frame.add(14).write_volatile(entry as usize as u32 & !1);
            frame.add(15).write_volatile(INITIAL_XPSR);
            Context::from_stack_pointer(frame)
        }
    }

    #[inline]
    fn request_switch(&mut self) {
        SCB::set_pendsv();
    }
}

/// Where a task body lands if its entry function returns.
extern "C" fn task_return() -> ! {
    if let Err(e) = crate::kernel::exit_task() {
        error!("tern: returning task could not exit: {}", e);
    }
    loop {
        cortex_m::asm::wfi();
    }
}

/// Body of the idle task.
pub extern "C" fn idle(_: usize) {
    loop {
        cortex_m::asm::wfi();
    }
}

// ---------------------------------------------------------------------------
// Core peripherals
// ---------------------------------------------------------------------------

/// Whether the CPU is currently executing an exception handler.
#[inline]
pub fn in_interrupt() -> bool {
    SCB::vect_active() != VectActive::ThreadMode
}

/// Start SysTick at `tick_hz` from the core clock.
pub fn configure_systick(syst: &mut SYST, tick_hz: u32) -> Result<()> {
    let reload = crate::config::systick_reload(SYSTEM_CLOCK_HZ, tick_hz).ok_or(Error::InvalidArgument)?;
    syst.set_reload(reload);
    syst.clear_current();
    syst.set_clock_source(SystClkSource::Core);
    syst.enable_counter();
    syst.enable_interrupt();
    Ok(())
}

/// Reprogram a running SysTick to `tick_hz`.
pub fn reprogram_systick(tick_hz: u32) -> Result<()> {
    let reload = crate::config::systick_reload(SYSTEM_CLOCK_HZ, tick_hz).ok_or(Error::InvalidArgument)?;
    // SAFETY: SysTick is only reconfigured here and in `configure_systick`,
    // which ran before the scheduler started. Called inside the kernel lock.
    let mut syst = unsafe { cortex_m::Peripherals::steal() }.SYST;
    syst.set_reload(reload);
    syst.clear_current();
    Ok(())
}

/// Put PendSV and SysTick at the lowest priority.
pub fn set_interrupt_priorities(scb: &mut SCB) {
    // SAFETY: changing system handler priorities before the scheduler
    // starts cannot break a priority-based critical section.
    unsafe {
        scb.set_priority(SystemHandler::PendSV, 0xFF);
        scb.set_priority(SystemHandler::SysTick, 0xFF);
    }
}

/// Hold off SysTick and PendSV (BASEPRI) until SVCall hands over to the
/// first task. SVCall itself stays enabled.
pub fn mask_scheduler_interrupts() {
    // SAFETY: only raises the masking level; SVCall (priority 0) and
    // faults are unaffected.
    unsafe { cortex_m::register::basepri::write(0x80) }
}

pub fn unmask_scheduler_interrupts() {
    // SAFETY: restores the reset value.
    unsafe { cortex_m::register::basepri::write(0) }
}

/// Enter the first task. Its context must already be published through
/// `kernel::first_context`.
pub fn start_first_task() -> ! {
    // SAFETY: SVCall restores the published context and returns to Thread
    // mode on the process stack; this call never comes back.
    unsafe {
        core::arch::asm!("cpsie i", "svc 0", options(noreturn));
    }
}

// ---------------------------------------------------------------------------
// Exception handlers
// ---------------------------------------------------------------------------

#[no_mangle]
extern "C" fn tern_switch_context(saved: *mut u32) -> *mut u32 {
    crate::kernel::switch_context(Context::from_stack_pointer(saved)).as_stack_pointer()
}

#[no_mangle]
extern "C" fn tern_first_context() -> *mut u32 {
    crate::kernel::first_context().as_stack_pointer()
}

#[no_mangle]
extern "C" fn SysTick() {
    crate::kernel::tick();
}

// PendSV: store R4–R11 below the hardware frame, hand the resulting PSP to
// the scheduler, restore whatever comes back.
//
// SVCall: lift the startup BASEPRI mask and restore the first task's
// context; only used once by start.
// Both return to Thread mode on the process stack (EXC_RETURN 0xFFFFFFFD).
global_asm!(
    ".section .text.PendSV,\"ax\",%progbits",
    ".global PendSV",
    ".type PendSV,%function",
    ".thumb_func",
    "PendSV:",
    "    mrs r0, psp",
    "    stmdb r0!, {{r4-r11}}",
    "    bl tern_switch_context",
    "    ldmia r0!, {{r4-r11}}",
    "    msr psp, r0",
    "    ldr r0, =0xFFFFFFFD",
    "    bx r0",
    "    .ltorg",
    "",
    ".section .text.SVCall,\"ax\",%progbits",
    ".global SVCall",
    ".type SVCall,%function",
    ".thumb_func",
    "SVCall:",
    "    movs r0, #0",
    "    msr basepri, r0",
    "    bl tern_first_context",
    "    ldmia r0!, {{r4-r11}}",
    "    msr psp, r0",
    "    ldr r0, =0xFFFFFFFD",
    "    bx r0",
    "    .ltorg",
);
