//! # Architecture Abstraction Layer
//!
//! Hardware ports implementing [`crate::port::Port`]. Currently the
//! Cortex-M3 (LPC17xx); other cores go in sibling modules.

pub mod cortex_m3;
