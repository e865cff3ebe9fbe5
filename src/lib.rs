// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Linux kernel hand-off for Rockchip boards, with a driver for the Rockchip eFUSE controller
//! which holds the boot public key.

#![cfg_attr(not(test), no_std)]

pub mod aarch64;
pub mod bootm;
pub mod bootparams;
pub mod bootstage;
pub mod config;
pub mod efuse;
pub mod env;
pub mod logger;
pub mod platform;
pub mod timer;

use aarch64::wfi;
use bootm::{BootImage, Bootm, BootmStates};
use config::BootConfig;
use env::Environment;
use log::error;
use platform::{Platform, PlatformImpl};

/// Boots `image` on the selected platform, and never returns.
///
/// Any error before the kernel is entered is logged and the core halts; there is nothing to fall
/// back to once the boot command has started.
pub fn boot_linux(env: &impl Environment, image: &BootImage) -> ! {
    PlatformImpl::init_console();
    let Some(mut board) = PlatformImpl::take_board() else {
        error!("Board already in use");
        hang();
    };
    // SAFETY: The board can only be taken once, so this is the only call.
    let params = unsafe { PlatformImpl::boot_params_area() };

    let mut bootm = Bootm::new(&mut board, env, params, BootConfig::build_time());
    match bootm.run(BootmStates::empty(), image) {
        Ok(outcome) => error!("Boot returned without entering the kernel: {outcome:?}"),
        Err(e) => error!("Boot failed: {e} ({})", e.errno()),
    }
    log::logger().flush();
    hang()
}

/// Halts the core.
pub fn hang() -> ! {
    loop {
        wfi();
    }
}
