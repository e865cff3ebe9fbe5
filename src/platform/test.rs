// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use super::{Board, Platform};
use crate::{
    bootm::{
        BootError, BootImage, OsArch,
        entry::KernelEntry,
        transfer::{CoreStateError, ExecutionState, KernelJump},
    },
    bootparams::{BootParamsArea, FdtBlob, FdtError, MemoryBank},
    efuse::{
        Efuse, EfuseError, RK3399,
        fake::{FakeClock, FakeFuses},
    },
    logger::{self, LogSink},
};
use arm_sysregs::{ExceptionLevel, MpidrEl1};
use core::fmt;
use percore::ExceptionFree;
use std::io::{Write, stdout};

const BOOT_PARAMS_SIZE: usize = 0x1000;

/// A fake platform for unit tests.
pub struct TestPlatform;

impl Platform for TestPlatform {
    type LogSinkImpl = StdOutSink;
    type BoardImpl = TestBoard;

    fn init_console() {
        // Several tests may initialise the logger, only the first one wins.
        let _ = logger::init(StdOutSink);
    }

    fn take_board() -> Option<TestBoard> {
        Some(TestBoard::new())
    }

    unsafe fn boot_params_area() -> BootParamsArea<'static> {
        BootParamsArea {
            addr: 0x100,
            buf: Box::leak(vec![0; BOOT_PARAMS_SIZE].into_boxed_slice()),
        }
    }
}

/// Something the hand-off asked the board to do.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BoardEvent {
    SetupFdt(FdtBlob),
    UsbDisconnect,
    QuiesceDevices,
    RemoveActiveDevices,
    CleanupBeforeLinux,
    NotifySecondaryCores(OsArch),
    SetCoreState(MpidrEl1, ExecutionState),
    EnterKernel(KernelJump),
}

/// A board which records the calls made to it, with a simulated RK3399 fuse array.
pub struct TestBoard {
    pub events: Vec<BoardEvent>,
    pub banks: Vec<MemoryBank>,
    pub fdt_result: Result<(), FdtError>,
    pub efuse_present: bool,
    pub firmware_state: ExecutionState,
    /// The exception level the hand-off pretends to run at.
    pub el: ExceptionLevel,
    pub secondary_cores: Vec<MpidrEl1>,
    /// Status returned by the firmware for the core of that MPIDR, if it refuses.
    pub failing_core: Option<(MpidrEl1, i32)>,
    pub now_us: u64,
    clock: &'static FakeClock,
    fuses: FakeFuses<'static>,
}

impl TestBoard {
    // Entering the kernel never returns, which would make it impossible to test the hand-off. The
    // test board panics with this magic string instead, which can be caught by `catch_unwind`.
    pub const ENTER_KERNEL_MAGIC: &str = "ENTER_KERNEL_MAGIC";

    pub const MACHINE_TYPE: u32 = 0xffff_ffff;

    pub fn new() -> Self {
        let clock: &'static FakeClock = Box::leak(Box::new(FakeClock::new()));
        Self {
            events: Vec::new(),
            banks: vec![MemoryBank {
                start: 0,
                size: 0x8000_0000,
            }],
            fdt_result: Ok(()),
            efuse_present: true,
            firmware_state: ExecutionState::Aarch64,
            el: ExceptionLevel::El3,
            secondary_cores: vec![
                MpidrEl1::from_bits_retain(0x001),
                MpidrEl1::from_bits_retain(0x100),
            ],
            failing_core: None,
            now_us: 1_500_000,
            clock,
            fuses: FakeFuses::new(&RK3399, clock),
        }
    }
}

impl Board for TestBoard {
    type Fuses<'a> = &'a mut FakeFuses<'static>;
    type Delay = &'static FakeClock;

    fn dram_banks(&self) -> &[MemoryBank] {
        &self.banks
    }

    fn machine_type(&self) -> u32 {
        Self::MACHINE_TYPE
    }

    fn setup_fdt(&mut self, _image: &BootImage, fdt: &FdtBlob) -> Result<(), FdtError> {
        self.events.push(BoardEvent::SetupFdt(*fdt));
        self.fdt_result
    }

    fn efuse(&mut self) -> Result<Efuse<Self::Fuses<'_>, Self::Delay>, EfuseError> {
        if !self.efuse_present {
            return Err(EfuseError::NoDevice);
        }
        Ok(Efuse::new(&mut self.fuses, self.clock, &RK3399))
    }

    fn timestamp_us(&self) -> u64 {
        self.now_us + self.clock.now()
    }

    fn usb_disconnect(&mut self) {
        self.events.push(BoardEvent::UsbDisconnect);
    }

    fn quiesce_devices(&mut self) {
        self.events.push(BoardEvent::QuiesceDevices);
    }

    fn remove_active_devices(&mut self) {
        self.events.push(BoardEvent::RemoveActiveDevices);
    }

    fn cleanup_before_linux(&mut self) {
        self.events.push(BoardEvent::CleanupBeforeLinux);
    }

    fn firmware_state(&self) -> ExecutionState {
        self.firmware_state
    }

    fn notify_secondary_cores(&mut self, os_arch: OsArch) {
        self.events.push(BoardEvent::NotifySecondaryCores(os_arch));
    }

    fn set_secondary_cores_state(&mut self, state: ExecutionState) -> Result<(), CoreStateError> {
        for &mpidr in &self.secondary_cores {
            if let Some((failing, status)) = self.failing_core
                && failing == mpidr
            {
                return Err(CoreStateError { mpidr, status });
            }
            self.events.push(BoardEvent::SetCoreState(mpidr, state));
        }
        Ok(())
    }

    fn check_entry(&self, jump: &KernelJump) -> Result<(), BootError> {
        KernelEntry::plan(self.el, jump).map(|_| ())
    }

    unsafe fn enter_kernel(&mut self, jump: &KernelJump) -> ! {
        self.events.push(BoardEvent::EnterKernel(*jump));
        panic!("{}", Self::ENTER_KERNEL_MAGIC);
    }
}

/// This is a fake version of `percore::exception_free` for use in unit tests only, which must be
/// run on a single thread.
pub fn exception_free<T>(f: impl FnOnce(ExceptionFree) -> T) -> T {
    // SAFETY: This is only used in unit tests, which are run on the host where there are no
    // hardware exceptions nor multiple threads.
    let token = unsafe { ExceptionFree::new() };
    f(token)
}

/// A log sink for tests which writes logs to standard output.
pub struct StdOutSink;

impl LogSink for StdOutSink {
    fn write_fmt(&self, args: fmt::Arguments) {
        stdout().write_fmt(args).unwrap();
    }

    fn flush(&self) {
        stdout().flush().unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stdout_sink() {
        let writer = StdOutSink;
        writeln!(writer, "hello");
        writer.flush();
    }

    #[test]
    fn efuse_session_reuses_fuses() {
        let mut board = TestBoard::new();
        board.fuses.set_word(0, 0x1234_5678);
        let mut buf = [0; 4];
        assert_eq!(board.efuse().unwrap().read(0, &mut buf), Ok(4));
        assert_eq!(buf, [0x78, 0x56, 0x34, 0x12]);
        assert!(board.fuses.in_standby());
    }

    #[test]
    fn params_area() {
        TestPlatform::init_console();
        // SAFETY: Each call leaks a new buffer, so there is no aliasing.
        let area = unsafe { TestPlatform::boot_params_area() };
        assert_eq!(area.buf.len(), BOOT_PARAMS_SIZE);
        assert!(TestPlatform::take_board().is_some());
    }
}
