// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

use super::{Board, Platform};
use crate::{
    aarch64::{current_el, dsb_sy, isb},
    bootm::{
        BootError,
        entry::KernelEntry,
        transfer::{CoreStateError, ExecutionState, KernelJump},
    },
    bootparams::{BootParamsArea, MemoryBank},
    efuse::{Efuse, EfuseError, EfuseRegisters, RK3399},
    logger::{self, LogSink},
    timer::GenericTimer,
};
use arm_sysregs::MpidrEl1;
use core::{
    fmt::{self, Write},
    hint::spin_loop,
    ptr::NonNull,
    sync::atomic::{AtomicBool, Ordering},
};
use safe_mmio::{
    UniqueMmioPointer, field,
    fields::{ReadOnly, ReadPureWrite, WriteOnly},
};
use spin::mutex::SpinMutex;

const EFUSE_BASE_ADDRESS: *mut EfuseRegisters = 0xff69_0000 as _;
const UART2_BASE_ADDRESS: *mut Dw8250Registers = 0xff1a_0000 as _;

const BOOT_PARAMS_BASE: usize = 0x100;
const BOOT_PARAMS_SIZE: usize = 0x1000;

const DRAM_BANKS: [MemoryBank; 1] = [MemoryBank {
    start: 0,
    size: 0xf800_0000,
}];

/// The first core after the boot core, cluster 0 core 0.
const FIRST_SECONDARY_CORE: MpidrEl1 = MpidrEl1::from_bits_retain(0x001);

/// Status for a firmware service which is not available.
const NOT_SUPPORTED: i32 = -95;

/// Line status: transmit holding register empty.
const LSR_THRE: u32 = 1 << 5;
/// Line status: transmitter empty.
const LSR_TEMT: u32 = 1 << 6;

static BOARD_TAKEN: AtomicBool = AtomicBool::new(false);

/// The Rockchip RK3399.
pub struct Rk3399;

impl Platform for Rk3399 {
    type LogSinkImpl = Console;
    type BoardImpl = Rk3399Board;

    fn init_console() {
        // SAFETY: `UART2_BASE_ADDRESS` is the base address of the DW 8250 UART used as the debug
        // console, and nothing else accesses that address range.
        let regs = unsafe { UniqueMmioPointer::new(NonNull::new_unchecked(UART2_BASE_ADDRESS)) };
        // The baud rate and line settings are kept from the earlier boot stages. If the logger is
        // already set, the first console stays in use.
        let _ = logger::init(Console {
            uart: SpinMutex::new(Dw8250Uart { regs }),
        });
    }

    fn take_board() -> Option<Rk3399Board> {
        if BOARD_TAKEN.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(Rk3399Board {
                // SAFETY: `EFUSE_BASE_ADDRESS` is not null.
                efuse: unsafe { NonNull::new_unchecked(EFUSE_BASE_ADDRESS) },
            })
        }
    }

    unsafe fn boot_params_area() -> BootParamsArea<'static> {
        BootParamsArea {
            addr: BOOT_PARAMS_BASE as u64,
            // SAFETY: The area is identity mapped normal memory which is not used by the firmware
            // image, and the caller promises not to create any other reference to it.
            buf: unsafe {
                core::slice::from_raw_parts_mut(BOOT_PARAMS_BASE as *mut u8, BOOT_PARAMS_SIZE)
            },
        }
    }
}

/// The RK3399 board.
pub struct Rk3399Board {
    efuse: NonNull<EfuseRegisters>,
}

impl Board for Rk3399Board {
    type Fuses<'a> = UniqueMmioPointer<'a, EfuseRegisters>;
    type Delay = GenericTimer;

    fn dram_banks(&self) -> &[MemoryBank] {
        &DRAM_BANKS
    }

    fn machine_type(&self) -> u32 {
        // RK3399 has no registered machine type, so 32-bit kernels must boot with a device tree.
        0xffff_ffff
    }

    fn efuse(&mut self) -> Result<Efuse<Self::Fuses<'_>, GenericTimer>, EfuseError> {
        // SAFETY: `self.efuse` points to the eFUSE controller registers, and only one
        // `Rk3399Board` exists. The returned pointer borrows the board mutably, so there can be
        // only one at a time.
        let regs = unsafe { UniqueMmioPointer::new(self.efuse) };
        Ok(Efuse::new(regs, GenericTimer, &RK3399))
    }

    fn timestamp_us(&self) -> u64 {
        GenericTimer::timestamp_us()
    }

    /// Completes every write to the boot parameters before the kernel runs.
    ///
    /// Nothing in this firmware enables the MMU or the data cache at its exception level, and the
    /// earlier boot stages leave them off, so there is nothing to clean or disable.
    fn cleanup_before_linux(&mut self) {
        dsb_sy();
        isb();
    }

    fn set_secondary_cores_state(&mut self, state: ExecutionState) -> Result<(), CoreStateError> {
        match state {
            ExecutionState::Aarch64 => Ok(()),
            // Switching a core's execution state is a trusted firmware service which this board
            // does not provide.
            ExecutionState::Aarch32 => Err(CoreStateError {
                mpidr: FIRST_SECONDARY_CORE,
                status: NOT_SUPPORTED,
            }),
        }
    }

    fn check_entry(&self, jump: &KernelJump) -> Result<(), BootError> {
        KernelEntry::plan(current_el(), jump).map(|_| ())
    }

    #[cfg(target_arch = "aarch64")]
    unsafe fn enter_kernel(&mut self, jump: &KernelJump) -> ! {
        match KernelEntry::plan(current_el(), jump) {
            // SAFETY: The caller promises that `jump` describes a loaded kernel, and it was planned
            // at the current exception level.
            Ok(entry) => unsafe { entry.enter(jump) },
            // The caller checked the jump with `check_entry`.
            Err(_) => crate::hang(),
        }
    }

    #[cfg(not(target_arch = "aarch64"))]
    unsafe fn enter_kernel(&mut self, _jump: &KernelJump) -> ! {
        crate::hang()
    }
}

/// The registers of a DesignWare 8250 UART, 32 bits apart.
#[repr(C, align(4))]
pub struct Dw8250Registers {
    /// Transmit holding register.
    pub thr: WriteOnly<u32>,
    /// Interrupt enable.
    pub ier: ReadPureWrite<u32>,
    /// FIFO control.
    pub fcr: WriteOnly<u32>,
    /// Line control.
    pub lcr: ReadPureWrite<u32>,
    /// Modem control.
    pub mcr: ReadPureWrite<u32>,
    /// Line status. Reading clears the error bits.
    pub lsr: ReadOnly<u32>,
}

struct Dw8250Uart<'a> {
    regs: UniqueMmioPointer<'a, Dw8250Registers>,
}

impl Dw8250Uart<'_> {
    fn line_status(&mut self) -> u32 {
        field!(self.regs, lsr).read()
    }

    fn write_byte(&mut self, byte: u8) {
        while self.line_status() & LSR_THRE == 0 {
            spin_loop();
        }
        field!(self.regs, thr).write(byte.into());
    }

    /// Waits until the transmitter has sent everything.
    fn flush(&mut self) {
        while self.line_status() & LSR_TEMT == 0 {
            spin_loop();
        }
    }
}

impl Write for Dw8250Uart<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                self.write_byte(b'\r');
            }
            self.write_byte(byte);
        }
        Ok(())
    }
}

/// The debug console on UART2.
pub struct Console {
    uart: SpinMutex<Dw8250Uart<'static>>,
}

impl LogSink for Console {
    fn write_fmt(&self, args: fmt::Arguments) {
        // Ignore errors.
        let _ = self.uart.lock().write_fmt(args);
    }

    fn flush(&self) {
        self.uart.lock().flush();
    }
}
