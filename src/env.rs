// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Interface to the bootloader's environment variables.

/// Selects whether a 32-bit kernel boots in the secure (`sec`) or non-secure (`nonsec`) world.
pub const BOOT_MODE: &str = "bootm_boot_mode";

/// Overrides the machine type passed to a 32-bit kernel, in hexadecimal.
pub const MACHINE_ID: &str = "machid";

/// The kernel command line.
pub const BOOTARGS: &str = "bootargs";

/// Read access to environment variables.
pub trait Environment {
    /// Returns the value of the variable `name`, if it is set.
    fn get(&self, name: &str) -> Option<&str>;
}

/// An environment backed by a fixed list of name/value pairs.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticEnv<'a> {
    vars: &'a [(&'a str, &'a str)],
}

impl<'a> StaticEnv<'a> {
    /// Creates an environment holding the given variables.
    pub const fn new(vars: &'a [(&'a str, &'a str)]) -> Self {
        Self { vars }
    }
}

impl Environment for StaticEnv<'_> {
    fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .iter()
            .find(|(var, _)| *var == name)
            .map(|(_, value)| *value)
    }
}

/// Parses a hexadecimal number, with or without a `0x` prefix.
pub fn parse_hex(value: &str) -> Option<u32> {
    let digits = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .unwrap_or(value);
    if digits.is_empty() || digits.starts_with('+') {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}
