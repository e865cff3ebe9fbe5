// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Exception return from the firmware's exception level into the kernel.
//!
//! [`KernelEntry::plan`] works out how a [`KernelJump`] is made before anything is announced, so
//! that a jump the CPU cannot make is refused while the boot command can still report it.

use super::{
    BootError,
    transfer::{ExecutionState, KernelJump, World},
};
use crate::aarch64::isb;
use arm_sysregs::{
    ExceptionLevel, HcrEl2, ScrEl3, Spsr, read_hcr_el2, write_hcr_el2, write_scr_el3,
};
#[cfg(all(not(test), target_arch = "aarch64"))]
use core::arch::asm;

/// AArch32 Hyp mode.
const SPSR_M_AARCH32_HYP: Spsr = Spsr::M_EXECUTION_STATE.union(Spsr::from_bits_retain(0b1010));
/// AArch32 Supervisor mode.
const SPSR_M_AARCH32_SVC: Spsr = Spsr::M_EXECUTION_STATE.union(Spsr::from_bits_retain(0b0011));

/// How the CPU gets from the firmware's exception level to the kernel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KernelEntry {
    /// Exception return from EL3 with the given `SCR_EL3` and `SPSR_EL3`.
    FromEl3 { scr: ScrEl3, spsr: Spsr },
    /// Exception return from EL2 to AArch32 EL1, with `HCR_EL2.RW` cleared.
    FromEl2 { spsr: Spsr },
    /// Branch to the kernel without changing exception level.
    Branch,
}

impl KernelEntry {
    /// Returns how to enter the kernel described by `jump` from exception level `el`.
    ///
    /// Below EL3 the security state cannot be changed, and is assumed to be non-secure.
    pub fn plan(el: ExceptionLevel, jump: &KernelJump) -> Result<Self, BootError> {
        match (el, jump.state, jump.world) {
            (ExceptionLevel::El3, state, world) => Ok(Self::FromEl3 {
                scr: scr_el3(state, world),
                spsr: spsr(state, world),
            }),
            (ExceptionLevel::El2, ExecutionState::Aarch32, World::NonSecure) => Ok(Self::FromEl2 {
                spsr: spsr(ExecutionState::Aarch32, World::Secure),
            }),
            (
                ExceptionLevel::El2 | ExceptionLevel::El1,
                ExecutionState::Aarch64,
                World::NonSecure,
            ) => Ok(Self::Branch),
            _ => Err(BootError::UnsupportedEntry),
        }
    }

    /// Writes the system registers which control the state the exception return lands in.
    pub fn program(&self) {
        match self {
            Self::FromEl3 { scr, .. } => {
                write_scr_el3(*scr);
                isb();
            }
            Self::FromEl2 { .. } => {
                write_hcr_el2(read_hcr_el2().difference(HcrEl2::RW));
                isb();
            }
            Self::Branch => {}
        }
    }

    /// Enters the kernel.
    ///
    /// # Safety
    ///
    /// `jump.entry` must be the entry point of a loaded kernel, and `self` must have been planned
    /// for `jump` at the current exception level.
    #[cfg(all(not(test), target_arch = "aarch64"))]
    pub unsafe fn enter(self, jump: &KernelJump) -> ! {
        self.program();
        let [x0, x1, x2, x3] = jump.args;
        match self {
            // SAFETY: The caller promises that the entry point is a kernel, which takes over the
            // whole system from here.
            Self::FromEl3 { spsr, .. } => unsafe {
                asm!(
                    "msr spsr_el3, {spsr}",
                    "msr elr_el3, {entry}",
                    "eret",
                    spsr = in(reg) spsr.bits(),
                    entry = in(reg) jump.entry,
                    in("x0") x0,
                    in("x1") x1,
                    in("x2") x2,
                    in("x3") x3,
                    options(noreturn),
                )
            },
            // SAFETY: As above.
            Self::FromEl2 { spsr } => unsafe {
                asm!(
                    "msr spsr_el2, {spsr}",
                    "msr elr_el2, {entry}",
                    "eret",
                    spsr = in(reg) spsr.bits(),
                    entry = in(reg) jump.entry,
                    in("x0") x0,
                    in("x1") x1,
                    in("x2") x2,
                    in("x3") x3,
                    options(noreturn),
                )
            },
            // SAFETY: As above.
            Self::Branch => unsafe {
                asm!(
                    "br {entry}",
                    entry = in(reg) jump.entry,
                    in("x0") x0,
                    in("x1") x1,
                    in("x2") x2,
                    in("x3") x3,
                    options(noreturn),
                )
            },
        }
    }
}

fn scr_el3(state: ExecutionState, world: World) -> ScrEl3 {
    let mut scr = ScrEl3::RES1 | ScrEl3::SIF;
    if state == ExecutionState::Aarch64 {
        scr |= ScrEl3::RW;
    }
    if world == World::NonSecure {
        scr |= ScrEl3::NS | ScrEl3::HCE;
    }
    scr
}

/// Returns the SPSR for entering the kernel with all exceptions masked: EL2 or Hyp in the
/// non-secure world, EL1 or Supervisor in the secure world.
fn spsr(state: ExecutionState, world: World) -> Spsr {
    match (state, world) {
        (ExecutionState::Aarch64, World::NonSecure) => {
            Spsr::M_AARCH64_EL2H | Spsr::D | Spsr::A | Spsr::I | Spsr::F
        }
        (ExecutionState::Aarch64, World::Secure) => {
            Spsr::M_AARCH64_EL1H | Spsr::D | Spsr::A | Spsr::I | Spsr::F
        }
        (ExecutionState::Aarch32, World::NonSecure) => {
            SPSR_M_AARCH32_HYP | Spsr::A | Spsr::I | Spsr::F
        }
        (ExecutionState::Aarch32, World::Secure) => {
            SPSR_M_AARCH32_SVC | Spsr::A | Spsr::I | Spsr::F
        }
    }
}
