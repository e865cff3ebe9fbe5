// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Build-time configuration of the boot path.

/// True if the build is configured with debug assertions on.
pub const DEBUG: bool = cfg!(debug_assertions);

/// What the hand-off does with the public key held in the fuses.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyCheck {
    /// The fuses are not touched.
    Off,
    /// The key is read and logged, but the boot goes ahead whatever the result.
    Report,
    /// The boot is refused unless a non-blank key can be read.
    Require,
}

/// Options controlling how the kernel is prepared and entered.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BootConfig {
    /// Support handing over a flattened device tree.
    pub fdt: bool,
    /// Support building an ATAG list.
    pub atags: bool,
    /// Boot 32-bit kernels in the non-secure world unless the environment says otherwise.
    pub nonsec_default: bool,
    /// What to do with the fused public key.
    pub key_check: KeyCheck,
}

impl BootConfig {
    /// Returns the configuration selected by cargo features and the build-time environment.
    pub const fn build_time() -> Self {
        Self {
            fdt: cfg!(feature = "fdt"),
            atags: cfg!(feature = "atags"),
            nonsec_default: !cfg!(feature = "boot-sec-default"),
            key_check: build_time_key_check(),
        }
    }
}

impl Default for BootConfig {
    fn default() -> Self {
        Self::build_time()
    }
}

/// Returns the [`KeyCheck`] set by the build-time environment variable `BOOTM_KEY_CHECK`.
/// `BOOTM_KEY_CHECK` can have the values "off", "report" or "require". If it is absent or has some
/// other value, this function returns `KeyCheck::Report`.
pub const fn build_time_key_check() -> KeyCheck {
    let check = match option_env!("BOOTM_KEY_CHECK") {
        Some(check) => check,
        None => "",
    };
    match check.as_bytes() {
        b"off" => KeyCheck::Off,
        b"require" => KeyCheck::Require,
        _ => KeyCheck::Report,
    }
}
