// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Microsecond busy-wait delays and timestamps.
//!
//! Nothing here yields: the boot path runs before any scheduler exists, so a delay is a spin on
//! the system counter. Hardware protocols take a [`Delay`] so that unit tests can substitute a
//! fake clock.

use crate::aarch64::{read_cntfrq_el0, read_cntpct_el0};
use core::hint::spin_loop;

const MICROS_PER_SECOND: u64 = 1_000_000;

/// A source of busy-wait delays.
///
/// A delay is a lower bound: implementations may wait longer, never shorter.
pub trait Delay {
    /// Waits for at least `us` microseconds.
    fn udelay(&mut self, us: u32);
}

impl<D: Delay + ?Sized> Delay for &mut D {
    fn udelay(&mut self, us: u32) {
        (**self).udelay(us);
    }
}

/// Delays and timestamps based on the Arm generic timer.
#[derive(Clone, Copy, Debug, Default)]
pub struct GenericTimer;

impl GenericTimer {
    /// Returns the number of microseconds since the system counter started, i.e. since reset.
    pub fn timestamp_us() -> u64 {
        let frequency = read_cntfrq_el0();
        if frequency == 0 {
            return 0;
        }
        ticks_to_us(read_cntpct_el0(), frequency)
    }
}

impl Delay for GenericTimer {
    fn udelay(&mut self, us: u32) {
        let frequency = read_cntfrq_el0();
        let ticks = us_to_ticks(us, frequency);
        let start = read_cntpct_el0();
        while read_cntpct_el0().wrapping_sub(start) < ticks {
            spin_loop();
        }
    }
}

/// Converts a microsecond interval to counter ticks, rounding up so the delay is never short.
fn us_to_ticks(us: u32, frequency: u64) -> u64 {
    (u64::from(us) * frequency).div_ceil(MICROS_PER_SECOND)
}

fn ticks_to_us(ticks: u64, frequency: u64) -> u64 {
    // Split to avoid overflowing for large tick counts.
    let seconds = ticks / frequency;
    let remainder = ticks % frequency;
    seconds * MICROS_PER_SECOND + remainder * MICROS_PER_SECOND / frequency
}
