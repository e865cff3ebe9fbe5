// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Boot progress markers and timing.

use arrayvec::ArrayVec;
use core::fmt::{self, Display, Formatter};
use log::warn;

/// The maximum number of markers kept for one boot.
const MAX_MARKS: usize = 8;

/// A point in the boot whose time is recorded.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BootStageId {
    /// The system counter started. This is always at time zero.
    Reset,
    /// The boot command started.
    BootmStart,
    /// Control is about to pass to the kernel.
    RunOs,
    /// The final announcement before the kernel starts.
    StartKernel,
}

/// The timestamps of the markers passed so far.
#[derive(Clone, Debug)]
pub struct BootStage {
    marks: ArrayVec<(BootStageId, u64), MAX_MARKS>,
}

impl BootStage {
    /// Creates a record with only the reset marker.
    pub fn new() -> Self {
        let mut marks = ArrayVec::new();
        marks.push((BootStageId::Reset, 0));
        Self { marks }
    }

    /// Records that `id` was reached at `timestamp_us`.
    ///
    /// A marker which is passed again keeps its first time.
    pub fn mark(&mut self, id: BootStageId, timestamp_us: u64) {
        if self.get(id).is_some() {
            return;
        }
        if self.marks.try_push((id, timestamp_us)).is_err() {
            warn!("Bootstage: no room to record {id:?}");
        }
    }

    /// Returns the time at which `id` was reached.
    pub fn get(&self, id: BootStageId) -> Option<u64> {
        self.marks
            .iter()
            .find(|(mark, _)| *mark == id)
            .map(|(_, timestamp)| *timestamp)
    }

    /// Returns the time elapsed between reset and `now_us`, and between the start of the boot
    /// command and `now_us`.
    pub fn report(&self, now_us: u64) -> TimingReport {
        let since = |id| {
            self.get(id)
                .map(|timestamp| now_us.saturating_sub(timestamp))
        };
        TimingReport {
            since_reset_us: since(BootStageId::Reset).unwrap_or(now_us),
            since_bootm_us: since(BootStageId::BootmStart),
        }
    }
}

impl Default for BootStage {
    fn default() -> Self {
        Self::new()
    }
}

/// Elapsed times at the point of hand-off.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct TimingReport {
    /// Microseconds since reset.
    pub since_reset_us: u64,
    /// Microseconds since the boot command started, if it was marked.
    pub since_bootm_us: Option<u64>,
}

impl Display for TimingReport {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "{}.{:03} ms since reset",
            self.since_reset_us / 1000,
            self.since_reset_us % 1000
        )?;
        if let Some(since_bootm) = self.since_bootm_us {
            write!(
                f,
                ", {}.{:03} ms since bootm",
                since_bootm / 1000,
                since_bootm % 1000
            )?;
        }
        Ok(())
    }
}
