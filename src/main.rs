//! # Tern Example Firmware
//!
//! Runs the classic priority-inversion setup on an LPC1768:
//!
//! | Task | Priority | Behavior |
//! |------|----------|----------|
//! | `worker` | Low | Holds `LOCK` for 20 ticks at a time |
//! | `hog` | Normal | Busy-loops forever once awake, never blocks |
//! | `control` | High | Periodically needs `LOCK`, with a 50-tick timeout |
//!
//! `LOCK` is created with priority inheritance. When `control` blocks on
//! it, `worker` is raised to High, runs ahead of `hog`, finishes and
//! releases, and `control` gets the lock well within its timeout. Create
//! it with `MutexAttr::default()` instead and `hog` starves `worker`, so
//! every `control` attempt times out.
//!
//! Progress is visible in the `*_COUNT` statics from a debugger.

#![cfg_attr(target_os = "none", no_std)]
#![cfg_attr(target_os = "none", no_main)]

#[cfg(target_os = "none")]
mod firmware {
    use core::sync::atomic::{AtomicU32, Ordering};

    use cortex_m_rt::entry;
    use panic_halt as _;

    use tern::error::Error;
    use tern::kernel;
    use tern::mutex::{MutexAttr, MutexId};
    use tern::sync::KernelCell;
    use tern::task::Priority;

    static LOCK: KernelCell<Option<MutexId>> = KernelCell::new(None);

    static WORKER_COUNT: AtomicU32 = AtomicU32::new(0);
    static CONTROL_COUNT: AtomicU32 = AtomicU32::new(0);
    static TIMEOUT_COUNT: AtomicU32 = AtomicU32::new(0);
    static HOG_COUNT: AtomicU32 = AtomicU32::new(0);

    fn lock() -> MutexId {
        match LOCK.with(|l| *l) {
            Some(id) => id,
            None => loop {
                cortex_m::asm::wfi();
            },
        }
    }

    /// Spin for `ticks` ticks of wall time, preemptible throughout.
    fn busy(ticks: u32) {
        let start = kernel::tick_count();
        while kernel::tick_count().wrapping_sub(start) < ticks {}
    }

    extern "C" fn worker(_: usize) {
        loop {
            if kernel::mutex_acquire(lock(), tern::config::WAIT_FOREVER).is_ok() {
                busy(20);
                WORKER_COUNT.fetch_add(1, Ordering::Relaxed);
                let _ = kernel::mutex_release(lock());
            }
            let _ = kernel::delay(5);
        }
    }

    extern "C" fn hog(_: usize) {
        // let worker take the lock first
        let _ = kernel::delay(2);
        loop {
            HOG_COUNT.fetch_add(1, Ordering::Relaxed);
        }
    }

    extern "C" fn control(_: usize) {
        loop {
            let _ = kernel::delay(10);
            match kernel::mutex_acquire(lock(), 50) {
                Ok(()) => {
                    CONTROL_COUNT.fetch_add(1, Ordering::Relaxed);
                    let _ = kernel::mutex_release(lock());
                }
                Err(Error::Timeout) => {
                    TIMEOUT_COUNT.fetch_add(1, Ordering::Relaxed);
                }
                Err(_) => {}
            }
        }
    }

    #[entry]
    fn main() -> ! {
        let cp = cortex_m::Peripherals::take().unwrap();

        let id = kernel::mutex_create(MutexAttr::inherit("shared")).expect("Failed to create mutex");
        LOCK.with(|l| *l = Some(id));

        kernel::create_task(worker, 0, Priority::Low).expect("Failed to create worker");
        kernel::create_task(hog, 0, Priority::Normal).expect("Failed to create hog");
        kernel::create_task(control, 0, Priority::High).expect("Failed to create control");

        match kernel::start(cp) {
            Ok(never) => match never {},
            Err(_) => loop {
                cortex_m::asm::wfi();
            },
        }
    }
}

#[cfg(not(target_os = "none"))]
fn main() {}
