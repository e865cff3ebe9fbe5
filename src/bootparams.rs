// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Boot parameters handed to the kernel: either a flattened device tree prepared by the image
//! formatter, or an ATAG list built here.

pub mod atags;

use crate::{
    bootm::{BootImage, OsArch},
    config::BootConfig,
};
use core::{
    fmt::{self, Display, Formatter},
    ops::Range,
};

/// A bank of RAM.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct MemoryBank {
    /// Physical start address.
    pub start: u64,
    /// Size in bytes.
    pub size: u64,
}

/// A flattened device tree loaded in memory.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FdtBlob {
    /// Physical address of the blob.
    pub addr: u64,
    /// Length of the blob in bytes.
    pub len: usize,
}

/// How boot parameters are passed to the kernel.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParamFormat {
    /// A flattened device tree.
    Fdt,
    /// An ATAG list.
    Atags,
}

impl ParamFormat {
    /// Chooses the format for `image`.
    ///
    /// A device tree is preferred when it is supported and the image has one. 64-bit kernels only
    /// take a device tree. Returns `None` if no usable format is configured, in which case the
    /// kernel must not be started.
    pub fn select(config: &BootConfig, image: &BootImage) -> Option<Self> {
        if config.fdt && image.fdt.is_some() {
            Some(Self::Fdt)
        } else if config.atags && image.os_arch == OsArch::Arm {
            Some(Self::Atags)
        } else {
            None
        }
    }
}

/// A memory area in which boot parameters are built.
#[derive(Debug)]
pub struct BootParamsArea<'a> {
    /// Physical address of the area, as seen by the kernel.
    pub addr: u64,
    /// The area itself.
    pub buf: &'a mut [u8],
}

/// An error from the image formatter while setting up the device tree.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FdtError {
    /// The board has no device tree support.
    NotSupported,
    /// The formatter failed with the given status.
    Formatter(i32),
}

impl Display for FdtError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::NotSupported => write!(f, "device tree not supported"),
            Self::Formatter(status) => write!(f, "device tree setup failed ({status})"),
        }
    }
}

/// An error building boot parameters.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParamError {
    /// The parameters do not fit in the area reserved for them.
    BufferTooSmall,
    /// A value cannot be expressed in the chosen format.
    Unrepresentable,
    /// The device tree could not be set up.
    Fdt(FdtError),
}

impl ParamError {
    /// Returns the negative errno equivalent of the error.
    pub const fn errno(self) -> i32 {
        match self {
            Self::BufferTooSmall => -28,
            Self::Unrepresentable => -34,
            Self::Fdt(FdtError::Formatter(status)) if status < 0 => status,
            Self::Fdt(_) => -95,
        }
    }
}

impl From<FdtError> for ParamError {
    fn from(error: FdtError) -> Self {
        Self::Fdt(error)
    }
}

impl From<ParamError> for i32 {
    fn from(error: ParamError) -> Self {
        error.errno()
    }
}

impl Display for ParamError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::BufferTooSmall => write!(f, "boot parameters do not fit"),
            Self::Unrepresentable => write!(f, "value cannot be expressed in boot parameters"),
            Self::Fdt(error) => write!(f, "{error}"),
        }
    }
}

/// Returns the initrd to pass to the kernel: the relocated copy if there is one, otherwise the
/// one originally loaded.
pub fn select_initrd(image: &BootImage) -> Option<Range<u64>> {
    let usable = |range: &&Range<u64>| range.start != 0 && range.end > range.start;
    image
        .relocated_ramdisk
        .as_ref()
        .filter(usable)
        .or(image.ramdisk.as_ref().filter(usable))
        .cloned()
}
