// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Thin wrappers around the handful of AArch64 instructions the boot path needs.
//!
//! On other architectures (including the host, for unit tests) these are no-ops or return fixed
//! values.

use arm_sysregs::ExceptionLevel;
#[cfg(target_arch = "aarch64")]
use core::arch::asm;

/// Issues a full-system data synchronization barrier (`dsb sy`) instruction.
pub fn dsb_sy() {
    // SAFETY: `dsb` does not violate safe Rust guarantees.
    #[cfg(target_arch = "aarch64")]
    unsafe {
        asm!("dsb sy", options(nostack));
    }
}

/// Issues an instruction synchronization barrier (`isb`) instruction.
pub fn isb() {
    // SAFETY: `isb` does not violate safe Rust guarantees.
    #[cfg(target_arch = "aarch64")]
    unsafe {
        asm!("isb", options(nostack));
    }
}

/// Sends an event to all cores (`sev`).
pub fn sev() {
    // SAFETY: `sev` does not violate safe Rust guarantees.
    #[cfg(target_arch = "aarch64")]
    unsafe {
        asm!("sev", options(nomem, nostack, preserves_flags));
    }
}

/// Waits for an interrupt (`wfi`).
pub fn wfi() {
    // SAFETY: `wfi` does not violate safe Rust guarantees.
    #[cfg(target_arch = "aarch64")]
    unsafe {
        asm!("wfi", options(nomem, nostack, preserves_flags));
    }
}

/// Returns the current value of the physical counter, `CNTPCT_EL0`.
#[cfg(target_arch = "aarch64")]
pub fn read_cntpct_el0() -> u64 {
    let value: u64;
    // SAFETY: Reading the physical counter has no side effects.
    unsafe {
        asm!("isb", "mrs {}, cntpct_el0", out(reg) value, options(nostack, nomem, preserves_flags));
    }
    value
}

/// Returns the current value of the physical counter, `CNTPCT_EL0`.
#[cfg(not(target_arch = "aarch64"))]
pub fn read_cntpct_el0() -> u64 {
    0
}

/// Returns the frequency of the system counter in Hz, from `CNTFRQ_EL0`.
#[cfg(target_arch = "aarch64")]
pub fn read_cntfrq_el0() -> u64 {
    let value: u64;
    // SAFETY: Reading the counter frequency has no side effects.
    unsafe {
        asm!("mrs {}, cntfrq_el0", out(reg) value, options(nostack, nomem, preserves_flags));
    }
    value
}

/// Returns the frequency of the system counter in Hz, from `CNTFRQ_EL0`.
#[cfg(not(target_arch = "aarch64"))]
pub fn read_cntfrq_el0() -> u64 {
    0
}

/// Returns the exception level the CPU is currently executing at.
#[cfg(target_arch = "aarch64")]
pub fn current_el() -> ExceptionLevel {
    let value: u64;
    // SAFETY: Reading `CurrentEL` has no side effects.
    unsafe {
        asm!("mrs {}, CurrentEL", out(reg) value, options(nostack, nomem, preserves_flags));
    }
    match (value >> 2) & 0b11 {
        0 => ExceptionLevel::El0,
        1 => ExceptionLevel::El1,
        2 => ExceptionLevel::El2,
        _ => ExceptionLevel::El3,
    }
}

/// Returns the exception level the CPU is currently executing at.
#[cfg(not(target_arch = "aarch64"))]
pub fn current_el() -> ExceptionLevel {
    ExceptionLevel::El3
}
