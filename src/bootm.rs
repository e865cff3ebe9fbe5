// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Hand-off from the bootloader to a Linux kernel.
//!
//! [`Bootm::run`] prepares the boot parameters, announces the hand-off and quiesces the board,
//! then enters the kernel. A fake run goes through every step except the last, for tracing.

pub mod entry;
pub mod transfer;

use crate::{
    bootparams::{
        BootParamsArea, FdtBlob, ParamError, ParamFormat,
        atags::{self, AtagInputs},
        select_initrd,
    },
    bootstage::{BootStage, BootStageId, TimingReport},
    config::{BootConfig, KeyCheck},
    efuse::{EfuseError, key::PublicKey},
    env::{self, Environment},
    platform::Board,
};
use bitflags::bitflags;
use core::{
    fmt::{self, Display, Formatter},
    ops::Range,
};
use log::{debug, info, warn};
use transfer::{CoreStateError, HandoffArgs, KernelJump};

/// The architecture a kernel image is built for.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum OsArch {
    /// 32-bit Arm.
    Arm,
    /// 64-bit Arm.
    Arm64,
}

/// A kernel image which has been loaded, with its device tree and ramdisk.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct BootImage {
    /// Physical address of the kernel entry point.
    pub entry_point: u64,
    /// The architecture of the kernel.
    pub os_arch: OsArch,
    /// The device tree loaded for the kernel, if any.
    pub fdt: Option<FdtBlob>,
    /// Physical range at which the ramdisk was loaded, if any.
    pub ramdisk: Option<Range<u64>>,
    /// Physical range to which the ramdisk was moved, if it was.
    pub relocated_ramdisk: Option<Range<u64>>,
}

bitflags! {
    /// Steps of the boot command requested of the OS hand-off.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct BootmStates: u32 {
        /// Set up the command line in board-specific memory.
        const OS_CMDLINE = 1 << 6;
        /// Set up a board info structure.
        const OS_BD_T = 1 << 7;
        /// Prepare the boot parameters.
        const OS_PREP = 1 << 8;
        /// Do everything up to entering the kernel, then return.
        const OS_FAKE_GO = 1 << 9;
        /// Enter the kernel.
        const OS_GO = 1 << 10;
    }
}

/// The result of preparing the boot parameters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Prepared {
    /// The format of the boot parameters.
    pub format: ParamFormat,
    /// Address of the boot parameters, to pass to the kernel.
    pub params_addr: u64,
    /// Whether a 32-bit kernel is to run in the non-secure world.
    pub nonsec: bool,
}

/// What was found in the key fuses at hand-off.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyStatus {
    /// The fuses were not read.
    NotChecked,
    /// No key has been programmed.
    Blank,
    /// A key is present.
    Present,
    /// The fuses could not be read.
    Unreadable(EfuseError),
}

/// What a fake run would have done.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct HandoffReport {
    /// Times at the point of hand-off.
    pub timing: TimingReport,
    /// The state of the key fuses.
    pub key: KeyStatus,
    /// How the kernel would have been entered.
    pub jump: KernelJump,
}

/// The outcome of a boot command which returned.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BootmOutcome {
    /// The boot parameters were prepared, and nothing more was asked.
    Prepared(Prepared),
    /// Everything was done except entering the kernel.
    FakeRun(HandoffReport),
}

/// An error preventing hand-off to the kernel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BootError {
    /// No boot parameter format is enabled for the image.
    NoParamFormat,
    /// Building the boot parameters failed.
    Params(ParamError),
    /// The `machid` environment variable is not a hexadecimal number.
    InvalidMachineId,
    /// The requested steps are not supported.
    UnsupportedState,
    /// The kernel architecture cannot be started by this firmware.
    UnsupportedArch,
    /// The kernel was to be entered before the boot parameters were prepared.
    NotPrepared,
    /// The key fuses could not be read.
    Key(EfuseError),
    /// No key has been programmed, and one is required.
    KeyBlank,
    /// The CPU cannot reach the kernel's execution state or world from where the firmware runs.
    UnsupportedEntry,
    /// A secondary core could not be switched to the kernel's execution state.
    SecondaryCore(CoreStateError),
}

impl BootError {
    /// Returns the negative errno equivalent of the error.
    pub const fn errno(self) -> i32 {
        match self {
            Self::NoParamFormat => -38,
            Self::Params(error) => error.errno(),
            Self::InvalidMachineId | Self::NotPrepared => -22,
            Self::UnsupportedState | Self::UnsupportedArch | Self::UnsupportedEntry => -95,
            Self::Key(error) => error.errno(),
            Self::KeyBlank => -1,
            Self::SecondaryCore(error) if error.status < 0 => error.status,
            Self::SecondaryCore(_) => -5,
        }
    }
}

impl From<ParamError> for BootError {
    fn from(error: ParamError) -> Self {
        Self::Params(error)
    }
}

impl From<BootError> for i32 {
    fn from(error: BootError) -> Self {
        error.errno()
    }
}

impl Display for BootError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::NoParamFormat => write!(f, "no boot parameter format configured"),
            Self::Params(error) => write!(f, "{error}"),
            Self::InvalidMachineId => write!(f, "invalid machid"),
            Self::UnsupportedState => write!(f, "unsupported boot state"),
            Self::UnsupportedArch => write!(f, "unsupported kernel architecture"),
            Self::NotPrepared => write!(f, "boot parameters not prepared"),
            Self::Key(error) => write!(f, "cannot read public key: {error}"),
            Self::KeyBlank => write!(f, "no public key programmed"),
            Self::UnsupportedEntry => write!(f, "kernel entry state unreachable"),
            Self::SecondaryCore(error) => write!(f, "{error}"),
        }
    }
}

/// The boot command for one kernel image.
pub struct Bootm<'a, B: Board, E: Environment> {
    board: &'a mut B,
    env: &'a E,
    params: BootParamsArea<'a>,
    config: BootConfig,
    stage: BootStage,
    prepared: Option<Prepared>,
}

impl<'a, B: Board, E: Environment> Bootm<'a, B, E> {
    /// Starts a boot command, building any boot parameters in `params`.
    pub fn new(
        board: &'a mut B,
        env: &'a E,
        params: BootParamsArea<'a>,
        config: BootConfig,
    ) -> Self {
        let mut stage = BootStage::new();
        stage.mark(BootStageId::BootmStart, board.timestamp_us());
        Self {
            board,
            env,
            params,
            config,
            stage,
            prepared: None,
        }
    }

    /// Returns the prepared boot parameters, if they have been prepared.
    pub fn prepared(&self) -> Option<Prepared> {
        self.prepared
    }

    /// Runs the requested steps for `image`.
    ///
    /// With no steps the boot parameters are prepared and the kernel is entered. `OS_PREP` only
    /// prepares; `OS_GO` and `OS_FAKE_GO` only enter the kernel, using parameters prepared by an
    /// earlier call. This returns only if the kernel was not entered.
    pub fn run(
        &mut self,
        states: BootmStates,
        image: &BootImage,
    ) -> Result<BootmOutcome, BootError> {
        if states.intersects(BootmStates::OS_BD_T | BootmStates::OS_CMDLINE) {
            return Err(BootError::UnsupportedState);
        }

        if states.contains(BootmStates::OS_PREP) {
            return self.prepare(image).map(BootmOutcome::Prepared);
        }
        if states.intersects(BootmStates::OS_GO | BootmStates::OS_FAKE_GO) {
            let fake = states.contains(BootmStates::OS_FAKE_GO);
            return self.jump(image, fake).map(BootmOutcome::FakeRun);
        }

        self.prepare(image)?;
        self.jump(image, false).map(BootmOutcome::FakeRun)
    }

    /// Builds the boot parameters and decides the world for a 32-bit kernel.
    pub fn prepare(&mut self, image: &BootImage) -> Result<Prepared, BootError> {
        if self.config.key_check == KeyCheck::Require {
            let key = self.read_key().map_err(BootError::Key)?;
            if key.is_blank() {
                return Err(BootError::KeyBlank);
            }
        }

        let format = ParamFormat::select(&self.config, image).ok_or(BootError::NoParamFormat)?;
        let params_addr = match format {
            ParamFormat::Fdt => self.prepare_fdt(image)?,
            ParamFormat::Atags => self.prepare_atags(image)?,
        };

        let prepared = Prepared {
            format,
            params_addr,
            nonsec: self.boot_nonsec(),
        };
        self.prepared = Some(prepared);
        Ok(prepared)
    }

    fn prepare_fdt(&mut self, image: &BootImage) -> Result<u64, BootError> {
        let fdt = image.fdt.ok_or(BootError::NoParamFormat)?;
        self.board
            .setup_fdt(image, &fdt)
            .map_err(ParamError::from)?;
        debug!("Using device tree at {:#x}, {} bytes", fdt.addr, fdt.len);
        Ok(fdt.addr)
    }

    fn prepare_atags(&mut self, image: &BootImage) -> Result<u64, BootError> {
        let inputs = AtagInputs {
            serial: self.board.serial_number(),
            cmdline: self.env.get(env::BOOTARGS).unwrap_or_default(),
            revision: self.board.revision(),
            banks: self.board.dram_banks(),
            initrd: select_initrd(image),
        };
        let board = &*self.board;
        let len = atags::build(self.params.buf, &inputs, |tags| {
            board.setup_board_tags(tags)
        })?;
        debug!("Built {len} bytes of ATAGs at {:#x}", self.params.addr);
        Ok(self.params.addr)
    }

    /// Returns whether a 32-bit kernel should run in the non-secure world.
    fn boot_nonsec(&self) -> bool {
        match self.env.get(env::BOOT_MODE) {
            Some("sec") => false,
            Some("nonsec") => true,
            _ => self.config.nonsec_default,
        }
    }

    /// Returns the machine type for a 32-bit kernel, preferring the `machid` environment variable.
    fn machine_type(&self) -> Result<u32, BootError> {
        match self.env.get(env::MACHINE_ID) {
            Some(machid) => {
                let machine_type = env::parse_hex(machid).ok_or(BootError::InvalidMachineId)?;
                info!("Using machid {machine_type:#x} from environment");
                Ok(machine_type)
            }
            None => Ok(self.board.machine_type()),
        }
    }

    fn jump(&mut self, image: &BootImage, fake: bool) -> Result<HandoffReport, BootError> {
        let prepared = self.prepared.ok_or(BootError::NotPrepared)?;
        let transfer = transfer::select(self.board.firmware_state(), image.os_arch)?;
        let machine_type = if transfer.machine_type_from_env() {
            self.machine_type()?
        } else {
            self.board.machine_type()
        };
        let jump = transfer.kernel_jump(&HandoffArgs {
            entry: image.entry_point,
            machine_type,
            params_addr: prepared.params_addr,
            nonsec: prepared.nonsec,
        });

        self.board.check_entry(&jump)?;
        if !fake && let Some(state) = transfer.secondary_state() {
            self.board
                .set_secondary_cores_state(state)
                .map_err(BootError::SecondaryCore)?;
        }

        self.stage.mark(BootStageId::RunOs, self.board.timestamp_us());
        debug!(
            "## Transferring control to Linux (at address {:#x}) via {} ...",
            jump.entry,
            transfer.name()
        );

        let report = self.announce_and_cleanup(jump, fake);
        if fake {
            return Ok(report);
        }

        if transfer.notify_secondary_cores() {
            self.board.notify_secondary_cores(image.os_arch);
        }
        // SAFETY: The image was loaded by the caller, and the boot parameters it is given were
        // built above in memory reserved for them.
        unsafe { self.board.enter_kernel(&jump) }
    }

    /// Reports the hand-off and stops everything the kernel must not find running.
    ///
    /// Nothing may be logged after this, as the console has been flushed.
    fn announce_and_cleanup(&mut self, jump: KernelJump, fake: bool) -> HandoffReport {
        self.stage
            .mark(BootStageId::StartKernel, self.board.timestamp_us());
        info!(
            "Starting kernel ...{}",
            if fake { "(fake run for tracing)" } else { "" }
        );
        let timing = self.stage.report(self.board.timestamp_us());
        info!("Boot timing: {timing}");

        let key = match self.config.key_check {
            KeyCheck::Off => KeyStatus::NotChecked,
            KeyCheck::Report | KeyCheck::Require => self.key_status(),
        };

        log::logger().flush();
        self.board.usb_disconnect();
        self.board.quiesce_devices();
        self.board.remove_active_devices();
        self.board.cleanup_before_linux();

        HandoffReport { timing, key, jump }
    }

    fn read_key(&mut self) -> Result<PublicKey, EfuseError> {
        let mut efuse = self.board.efuse()?;
        PublicKey::read(&mut efuse)
    }

    fn key_status(&mut self) -> KeyStatus {
        match self.read_key() {
            Ok(key) if key.is_blank() => {
                warn!("No public key programmed");
                KeyStatus::Blank
            }
            Ok(key) => {
                debug!("Public key:\n{}", key.dump());
                KeyStatus::Present
            }
            Err(error) => {
                warn!("Cannot read public key: {error}");
                KeyStatus::Unreadable(error)
            }
        }
    }
}
