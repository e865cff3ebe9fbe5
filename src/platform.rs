// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

macro_rules! select_platform {
    (not(test), $mod:ident::$plat_impl:ident) => {
        #[cfg(not(test))]
        mod $mod;

        #[cfg(not(test))]
        pub use $mod::$plat_impl as PlatformImpl;
    };
    (test, $mod:ident::$plat_impl:ident) => {
        #[cfg(test)]
        pub mod $mod;

        #[cfg(test)]
        pub use $mod::$plat_impl as PlatformImpl;
    };
}

select_platform!(not(test), rk3399::Rk3399);
select_platform!(test, test::TestPlatform);

use crate::{
    aarch64::sev,
    bootm::{
        BootError, BootImage, OsArch,
        transfer::{CoreStateError, ExecutionState, FIRMWARE_STATE, KernelJump},
    },
    bootparams::{BootParamsArea, FdtBlob, FdtError, MemoryBank, ParamError, atags::TagWriter},
    efuse::{Efuse, EfuseError, FuseController},
    logger::LogSink,
    timer::Delay,
};
#[cfg(not(test))]
pub use percore::exception_free;
#[cfg(test)]
pub use test::exception_free;

/// Type alias for convenience, to avoid having to use the complicated type name everywhere.
pub type LogSinkImpl = <PlatformImpl as Platform>::LogSinkImpl;

/// Type alias for the board of the selected platform.
pub type BoardImpl = <PlatformImpl as Platform>::BoardImpl;

/// The hooks implemented by all platforms.
pub trait Platform {
    /// Platform dependent LogSink implementation type for Logger.
    type LogSinkImpl: LogSink;

    /// Platform dependent Board implementation type.
    type BoardImpl: Board;

    /// Initialises the logger and anything else the platform needs before the boot command runs.
    ///
    /// Any logs sent before this is called will be ignored.
    fn init_console();

    /// Returns an option with the board handle. The function should only be called once, when it
    /// returns `Some`. All subsequent calls must return `None`.
    fn take_board() -> Option<Self::BoardImpl>;

    /// Returns the memory area reserved for boot parameters.
    ///
    /// # Safety
    ///
    /// This must only be called once, to avoid creating aliases of the area. Nothing else may use
    /// the memory of the area until the kernel is entered.
    unsafe fn boot_params_area() -> BootParamsArea<'static>;
}

/// The board-specific collaborators of the hand-off sequencer.
pub trait Board {
    /// Handle to the eFUSE controller, borrowed from the board for one session.
    type Fuses<'a>: FuseController
    where
        Self: 'a;

    /// The delay used for fuse timing.
    type Delay: Delay;

    /// Returns the banks of RAM to describe to the kernel.
    fn dram_banks(&self) -> &[MemoryBank];

    /// Returns the default machine type passed to 32-bit kernels.
    fn machine_type(&self) -> u32;

    /// Returns the board serial number, if it has one.
    fn serial_number(&self) -> Option<u64> {
        None
    }

    /// Returns the board revision, if known.
    fn revision(&self) -> Option<u32> {
        None
    }

    /// Appends any board-specific tags to an ATAG list.
    fn setup_board_tags(&self, _tags: &mut TagWriter) -> Result<(), ParamError> {
        Ok(())
    }

    /// Asks the image formatter to fix up the device tree for `image` before it is handed over.
    fn setup_fdt(&mut self, _image: &BootImage, _fdt: &FdtBlob) -> Result<(), FdtError> {
        Err(FdtError::NotSupported)
    }

    /// Opens a session with the eFUSE controller.
    fn efuse(&mut self) -> Result<Efuse<Self::Fuses<'_>, Self::Delay>, EfuseError>;

    /// Returns the number of microseconds since reset.
    fn timestamp_us(&self) -> u64;

    /// Disconnects from any USB host, so that it sees the device go away.
    fn usb_disconnect(&mut self) {}

    /// Stops any board devices which must not be running when the kernel starts.
    fn quiesce_devices(&mut self) {}

    /// Removes all active devices still flagged as in use.
    fn remove_active_devices(&mut self) {}

    /// Cleans and disables caches, and anything else needed immediately before the kernel runs.
    fn cleanup_before_linux(&mut self) {}

    /// Returns the execution state this firmware runs in.
    fn firmware_state(&self) -> ExecutionState {
        FIRMWARE_STATE
    }

    /// Switches every core except the boot core to `state`, so that the kernel can bring them up
    /// in the state it runs in.
    ///
    /// Boards without secondary cores need not implement this.
    fn set_secondary_cores_state(&mut self, _state: ExecutionState) -> Result<(), CoreStateError> {
        Ok(())
    }

    /// Checks that the kernel can be entered as described by `jump` from where the firmware runs.
    ///
    /// This is called before the hand-off is announced; [`Board::enter_kernel`] must not be called
    /// with a jump which failed the check.
    fn check_entry(&self, jump: &KernelJump) -> Result<(), BootError>;

    /// Signals the secondary cores that a kernel of the given architecture is about to start.
    fn notify_secondary_cores(&mut self, _os_arch: OsArch) {
        sev();
    }

    /// Enters the kernel as described by `jump`.
    ///
    /// # Safety
    ///
    /// `jump` must describe a loaded kernel image, and its arguments must point to valid boot
    /// parameters. No memory owned by Rust code may be used by the kernel. `jump` must have passed
    /// [`Board::check_entry`].
    unsafe fn enter_kernel(&mut self, jump: &KernelJump) -> !;
}
