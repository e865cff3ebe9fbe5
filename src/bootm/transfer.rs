// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! How control passes to the kernel for each combination of firmware and kernel architecture.

use super::{BootError, OsArch};
use arm_sysregs::MpidrEl1;
use core::fmt::{self, Display, Formatter};

/// The execution state in which code runs.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExecutionState {
    /// 64-bit.
    Aarch64,
    /// 32-bit.
    Aarch32,
}

/// The security state in which the kernel is entered.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum World {
    /// Secure world.
    Secure,
    /// Non-secure world.
    NonSecure,
}

/// The execution state of this firmware.
pub const FIRMWARE_STATE: ExecutionState = if cfg!(target_arch = "aarch64") {
    ExecutionState::Aarch64
} else {
    ExecutionState::Aarch32
};

/// Everything the board needs to enter the kernel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct KernelJump {
    /// The kernel entry point.
    pub entry: u64,
    /// Values for the first four argument registers (`x0`-`x3` or `r0`-`r3`).
    pub args: [u64; 4],
    /// The execution state in which to enter the kernel.
    pub state: ExecutionState,
    /// The security state in which to enter the kernel.
    pub world: World,
}

/// A secondary core could not be set up to run the kernel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct CoreStateError {
    /// The core which failed.
    pub mpidr: MpidrEl1,
    /// Negative status returned by the firmware service.
    pub status: i32,
}

impl Display for CoreStateError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "CPU@{:#x} init failed: {}",
            self.mpidr.bits() & !(MpidrEl1::MT | MpidrEl1::U).bits(),
            self.status
        )
    }
}

/// The values from which a [`KernelJump`] is made.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HandoffArgs {
    /// The kernel entry point.
    pub entry: u64,
    /// Machine type, for 32-bit kernels.
    pub machine_type: u32,
    /// Address of the device tree or ATAG list.
    pub params_addr: u64,
    /// Whether a 32-bit kernel started from 32-bit firmware runs in the non-secure world.
    pub nonsec: bool,
}

/// A way of entering the kernel.
pub trait Transfer {
    /// Name for logs.
    fn name(&self) -> &'static str;

    /// Returns the entry state and register values for the kernel.
    fn kernel_jump(&self, args: &HandoffArgs) -> KernelJump;

    /// Returns whether secondary cores must be told about the new kernel before it is entered.
    fn notify_secondary_cores(&self) -> bool;

    /// Returns the execution state the secondary cores must be switched to before the kernel
    /// brings them up, if it differs from the firmware's.
    fn secondary_state(&self) -> Option<ExecutionState> {
        None
    }

    /// Returns whether the `machid` environment variable overrides the board's machine type.
    fn machine_type_from_env(&self) -> bool {
        false
    }
}

/// A 64-bit kernel from 64-bit firmware, with the device tree in `x0`.
pub struct Aarch64Transfer;

impl Transfer for Aarch64Transfer {
    fn name(&self) -> &'static str {
        "AArch64"
    }

    fn kernel_jump(&self, args: &HandoffArgs) -> KernelJump {
        KernelJump {
            entry: args.entry,
            args: [args.params_addr, 0, 0, 0],
            state: ExecutionState::Aarch64,
            world: World::NonSecure,
        }
    }

    fn notify_secondary_cores(&self) -> bool {
        true
    }
}

/// A 32-bit kernel from 64-bit firmware. The lower exception levels are switched to AArch32 on
/// the way down.
pub struct Aarch64ToAarch32Transfer;

impl Transfer for Aarch64ToAarch32Transfer {
    fn name(&self) -> &'static str {
        "AArch64 to AArch32"
    }

    fn kernel_jump(&self, args: &HandoffArgs) -> KernelJump {
        KernelJump {
            entry: args.entry,
            args: [0, args.machine_type.into(), args.params_addr, 0],
            state: ExecutionState::Aarch32,
            world: World::NonSecure,
        }
    }

    fn notify_secondary_cores(&self) -> bool {
        true
    }

    fn secondary_state(&self) -> Option<ExecutionState> {
        Some(ExecutionState::Aarch32)
    }
}

/// A 32-bit kernel from 32-bit firmware, entered with `r0 = 0`, `r1` the machine type and `r2`
/// the boot parameters.
pub struct Arm32Transfer;

impl Transfer for Arm32Transfer {
    fn name(&self) -> &'static str {
        "AArch32"
    }

    fn kernel_jump(&self, args: &HandoffArgs) -> KernelJump {
        KernelJump {
            entry: args.entry,
            args: [0, args.machine_type.into(), args.params_addr, 0],
            state: ExecutionState::Aarch32,
            world: if args.nonsec {
                World::NonSecure
            } else {
                World::Secure
            },
        }
    }

    fn notify_secondary_cores(&self) -> bool {
        false
    }

    fn machine_type_from_env(&self) -> bool {
        true
    }
}

/// Returns the transfer for a kernel of architecture `os` started by firmware running in
/// `firmware`.
pub fn select(firmware: ExecutionState, os: OsArch) -> Result<&'static dyn Transfer, BootError> {
    match (firmware, os) {
        (ExecutionState::Aarch64, OsArch::Arm64) => Ok(&Aarch64Transfer),
        (ExecutionState::Aarch64, OsArch::Arm) => Ok(&Aarch64ToAarch32Transfer),
        (ExecutionState::Aarch32, OsArch::Arm) => Ok(&Arm32Transfer),
        (ExecutionState::Aarch32, OsArch::Arm64) => Err(BootError::UnsupportedArch),
    }
}
