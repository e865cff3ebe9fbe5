// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Driver for the Rockchip eFUSE controller.
//!
//! The fuse array is read and programmed one fuse word at a time by pulsing the strobe bit in the
//! control register with the word (or, when programming, the bit) address encoded in the address
//! field. Programmed bits can never be cleared again, so [`Efuse::write`] refuses anything it
//! cannot verify.

#[cfg(test)]
pub mod fake;
pub mod key;

use crate::{platform::exception_free, timer::Delay};
use bitflags::bitflags;
use core::fmt::{self, Display, Formatter};
use log::{debug, error, info};
use safe_mmio::{
    UniqueMmioPointer, field,
    fields::{ReadPure, ReadPureWrite},
};

/// Width of the address field of the control register, in bits.
pub const ADDRESS_FIELD_BITS: u32 = 10;

bitflags! {
    /// Bits of the eFUSE control register.
    ///
    /// The address field is not named here; it sits at a per-variant shift, see
    /// [`EfuseVariant::address`].
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    #[repr(transparent)]
    pub struct EfuseCtrl: u32 {
        /// Chip select, active low.
        const CSB = 1 << 0;
        /// Strobe: senses or programs the addressed fuse while high.
        const STROBE = 1 << 1;
        /// Load the sensed value into the data out register.
        const LOAD = 1 << 2;
        /// Program enable, active low.
        const PGENB = 1 << 3;
        /// Program select, routing the strobe to the program path.
        const PS = 1 << 4;
        /// Power down.
        const PD = 1 << 5;
        /// Redundancy select, active low.
        const RSB = 1 << 7;
        /// Strobe soft select, bypassing charge sharing.
        const STROBSFTSEL = 1 << 9;

        const _ = !0;
    }
}

/// The fixed geometry and protocol constants of one eFUSE controller variant.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EfuseVariant {
    /// Name of the SoC, for logs.
    pub name: &'static str,
    /// Number of fuse words in the array.
    pub fuse_count: usize,
    /// Number of bytes sensed by one strobe.
    pub bytes_per_fuse: usize,
    /// Position of the lowest bit of the address field in the control register.
    pub address_shift: u32,
    /// Control bits held while reading.
    pub read_mode: EfuseCtrl,
    /// Control bits held while programming.
    pub program_mode: EfuseCtrl,
    /// Control bits left in place when the controller is idle.
    pub standby: EfuseCtrl,
    /// Time to hold after entering read or program mode, in microseconds.
    pub setup_us: u32,
    /// Minimum strobe high and low time for a read, in microseconds.
    pub read_strobe_us: u32,
    /// Minimum strobe high time for programming a bit, in microseconds.
    pub program_strobe_us: u32,
}

impl EfuseVariant {
    /// Mask applied to addresses before they are shifted into the control register.
    pub const ADDRESS_MASK: u32 = (1 << ADDRESS_FIELD_BITS) - 1;

    /// Total size of the fuse array in bytes.
    pub const fn capacity(&self) -> usize {
        self.fuse_count * self.bytes_per_fuse
    }

    /// Number of fuse bits in one fuse word.
    pub const fn bits_per_fuse(&self) -> u32 {
        (self.bytes_per_fuse * 8) as u32
    }

    /// Returns the address field of the control register set to `address`.
    pub const fn address(&self, address: u32) -> EfuseCtrl {
        EfuseCtrl::from_bits_retain((address & Self::ADDRESS_MASK) << self.address_shift)
    }

    /// Returns the address of bit `bit` of fuse word `word`, as used for programming.
    pub const fn bit_address(&self, word: usize, bit: u32) -> u32 {
        word as u32 * self.bits_per_fuse() + bit
    }

    /// Returns the mask of the bits of a fuse word which the data out register carries.
    pub const fn word_mask(&self) -> u32 {
        if self.bytes_per_fuse >= 4 {
            u32::MAX
        } else {
            (1 << self.bits_per_fuse()) - 1
        }
    }

    /// Returns whether every bit of the array can be addressed through the address field.
    pub const fn fits_address_field(&self) -> bool {
        self.fuse_count * self.bytes_per_fuse * 8 <= 1 << ADDRESS_FIELD_BITS
    }
}

/// The eFUSE controller of the RK3399: 32 words of 4 bytes.
pub const RK3399: EfuseVariant = EfuseVariant {
    name: "rk3399",
    fuse_count: 32,
    bytes_per_fuse: 4,
    address_shift: 16,
    read_mode: EfuseCtrl::LOAD
        .union(EfuseCtrl::PGENB)
        .union(EfuseCtrl::STROBSFTSEL)
        .union(EfuseCtrl::RSB),
    program_mode: EfuseCtrl::PS
        .union(EfuseCtrl::STROBSFTSEL)
        .union(EfuseCtrl::RSB),
    standby: EfuseCtrl::PD.union(EfuseCtrl::CSB),
    setup_us: 1,
    read_strobe_us: 1,
    program_strobe_us: 13,
};

/// The eFUSE controller of the RK3288: 32 words of 1 byte.
pub const RK3288: EfuseVariant = EfuseVariant {
    name: "rk3288",
    fuse_count: 32,
    bytes_per_fuse: 1,
    address_shift: 6,
    read_mode: EfuseCtrl::LOAD.union(EfuseCtrl::PGENB),
    program_mode: EfuseCtrl::empty(),
    standby: EfuseCtrl::PGENB.union(EfuseCtrl::CSB),
    setup_us: 1,
    read_strobe_us: 1,
    program_strobe_us: 12,
};

const _: () = assert!(RK3399.fits_address_field());
const _: () = assert!(RK3288.fits_address_field());

/// The memory-mapped registers of the eFUSE controller.
#[repr(C, align(4))]
pub struct EfuseRegisters {
    /// Control.
    pub ctrl: ReadPureWrite<u32>,
    /// Data out, valid after a read strobe.
    pub dout: ReadPure<u32>,
    /// Redundancy bits used.
    pub rf: ReadPureWrite<u32>,
    _reserved0: u32,
    /// JTAG password.
    pub jtag_pass: ReadPureWrite<u32>,
    /// Strobe finish control.
    pub strobe_finish_ctrl: ReadPureWrite<u32>,
    /// Interrupt status, used by the automatic mode.
    pub int_status: ReadPureWrite<u32>,
    _reserved1: u32,
    /// Data out of the automatic mode.
    pub dout2: ReadPure<u32>,
    /// Automatic mode control.
    pub auto_ctrl: ReadPureWrite<u32>,
}

/// Register-level access to an eFUSE controller.
///
/// Implementations hold exclusive access to the controller for as long as they exist.
pub trait FuseController {
    /// Writes the control register.
    fn write_ctrl(&mut self, value: EfuseCtrl);

    /// Reads the data out register.
    fn read_dout(&mut self) -> u32;
}

impl FuseController for UniqueMmioPointer<'_, EfuseRegisters> {
    fn write_ctrl(&mut self, value: EfuseCtrl) {
        field!(*self, ctrl).write(value.bits());
    }

    fn read_dout(&mut self) -> u32 {
        field!(*self, dout).read()
    }
}

impl<C: FuseController + ?Sized> FuseController for &mut C {
    fn write_ctrl(&mut self, value: EfuseCtrl) {
        (**self).write_ctrl(value);
    }

    fn read_dout(&mut self) -> u32 {
        (**self).read_dout()
    }
}

/// An error accessing the fuse array.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum EfuseError {
    /// The controller could not be found.
    NoDevice,
    /// The requested range is outside the fuse array.
    OutOfRange,
    /// A write was attempted without a confirmation matching its range.
    NotConfirmed,
    /// Writing would require clearing bits which are already blown.
    WouldClearBits {
        /// Index of the fuse word.
        word: usize,
        /// The current contents of the word.
        current: u32,
        /// The contents the caller asked for.
        requested: u32,
    },
    /// A fuse word did not read back as programmed.
    VerifyFailed {
        /// Index of the fuse word.
        word: usize,
        /// The value that should have been read back.
        expected: u32,
        /// The value which was read back.
        actual: u32,
    },
    /// Fewer bytes were available than were requested.
    Truncated {
        /// The number of bytes requested.
        requested: usize,
        /// The number of bytes actually read.
        actual: usize,
    },
}

impl EfuseError {
    /// Returns the negative errno equivalent of the error.
    pub const fn errno(self) -> i32 {
        match self {
            Self::NoDevice => -19,
            Self::OutOfRange | Self::WouldClearBits { .. } => -22,
            Self::NotConfirmed => -1,
            Self::VerifyFailed { .. } | Self::Truncated { .. } => -5,
        }
    }
}

impl From<EfuseError> for i32 {
    fn from(error: EfuseError) -> Self {
        error.errno()
    }
}

impl Display for EfuseError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::NoDevice => write!(f, "eFUSE controller not found"),
            Self::OutOfRange => write!(f, "range outside the fuse array"),
            Self::NotConfirmed => write!(f, "fuse write not confirmed"),
            Self::WouldClearBits {
                word,
                current,
                requested,
            } => write!(
                f,
                "fuse word {word} holds {current:#010x}, cannot change it to {requested:#010x}"
            ),
            Self::VerifyFailed {
                word,
                expected,
                actual,
            } => write!(
                f,
                "fuse word {word} read back {actual:#010x}, expected {expected:#010x}"
            ),
            Self::Truncated { requested, actual } => {
                write!(f, "read {actual} of {requested} bytes")
            }
        }
    }
}

/// A byte range of the fuse array expressed in fuse words.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FuseRange {
    /// Byte offset of the range.
    pub offset: usize,
    /// First fuse word touched.
    pub start_word: usize,
    /// Offset of the first byte within the first word.
    pub word_offset: usize,
    /// One past the last fuse word touched.
    pub end_word: usize,
    /// Number of bytes of the range inside the array.
    pub len: usize,
}

impl FuseRange {
    /// Computes the fuse words covering `len` bytes at `offset`, clamped to the array.
    pub fn clamped(variant: &EfuseVariant, offset: usize, len: usize) -> Self {
        let capacity = variant.capacity();
        let len = len.min(capacity.saturating_sub(offset));
        let end = offset.saturating_add(len);
        Self {
            offset,
            start_word: offset / variant.bytes_per_fuse,
            word_offset: offset % variant.bytes_per_fuse,
            end_word: end.div_ceil(variant.bytes_per_fuse).min(variant.fuse_count),
            len,
        }
    }

    /// Computes the fuse words covering `len` bytes at `offset`, failing if any byte is outside
    /// the array.
    pub fn exact(variant: &EfuseVariant, offset: usize, len: usize) -> Result<Self, EfuseError> {
        match offset.checked_add(len) {
            Some(end) if end <= variant.capacity() => Ok(Self::clamped(variant, offset, len)),
            _ => Err(EfuseError::OutOfRange),
        }
    }

    /// Returns whether the range contains no bytes.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the mask of the bits of fuse word `word` covered by the range.
    fn word_mask(&self, variant: &EfuseVariant, word: usize) -> u32 {
        let word_start = word * variant.bytes_per_fuse;
        (0..variant.bytes_per_fuse)
            .filter(|byte| {
                let position = word_start + byte;
                position >= self.offset && position < self.offset + self.len
            })
            .fold(0, |mask, byte| mask | 0xff << (byte * 8))
    }
}

/// Explicit permission to program a range of fuses.
///
/// [`Efuse::write`] only proceeds if the confirmation names exactly the range being written, so a
/// miscalculated offset or length cannot silently program the wrong fuses.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BurnConfirmation {
    offset: usize,
    len: usize,
}

impl BurnConfirmation {
    /// Confirms that the `len` bytes at `offset` may be permanently programmed.
    pub const fn new(offset: usize, len: usize) -> Self {
        Self { offset, len }
    }

    fn covers(&self, offset: usize, len: usize) -> bool {
        self.offset == offset && self.len == len
    }
}

/// A session with an eFUSE controller.
///
/// The session owns the controller handle, so no other code can touch the registers while it
/// exists. Interrupts are masked for the duration of each read or write.
pub struct Efuse<C: FuseController, D: Delay> {
    controller: C,
    delay: D,
    variant: &'static EfuseVariant,
}

impl<C: FuseController, D: Delay> Efuse<C, D> {
    /// Creates a session for a controller of the given variant.
    pub fn new(controller: C, delay: D, variant: &'static EfuseVariant) -> Self {
        Self {
            controller,
            delay,
            variant,
        }
    }

    /// Returns the variant of the controller.
    pub fn variant(&self) -> &'static EfuseVariant {
        self.variant
    }

    /// Reads fuses starting at byte `offset` into `buf`.
    ///
    /// The range is clamped to the array, so fewer bytes than `buf.len()` may be read. Returns the
    /// number of bytes read; callers must check it against the length they asked for.
    pub fn read(&mut self, offset: usize, buf: &mut [u8]) -> Result<usize, EfuseError> {
        let range = FuseRange::clamped(self.variant, offset, buf.len());
        if range.is_empty() {
            return Ok(0);
        }

        exception_free(|_| {
            self.enter(self.variant.read_mode);
            for word in range.start_word..range.end_word {
                let value = self.sense(word);
                copy_word_bytes(self.variant, &range, word, value, buf);
            }
            self.standby();
        });

        Ok(range.len)
    }

    /// Permanently programs `data` into the fuses starting at byte `offset`.
    ///
    /// `confirmation` must name exactly this range. Nothing is programmed if any byte is outside
    /// the array or if a requested byte already has a bit blown which `data` leaves clear. Each
    /// affected word is programmed once and then read back; a mismatch stops the write and is
    /// reported, since it cannot be undone.
    pub fn write(
        &mut self,
        offset: usize,
        data: &[u8],
        confirmation: BurnConfirmation,
    ) -> Result<(), EfuseError> {
        if !confirmation.covers(offset, data.len()) {
            return Err(EfuseError::NotConfirmed);
        }
        let range = FuseRange::exact(self.variant, offset, data.len())?;
        if range.is_empty() {
            return Ok(());
        }

        // Check every word before blowing anything.
        for word in range.start_word..range.end_word {
            let (current, wanted, mask) = self.plan_word(&range, word, data);
            if current & mask & !wanted != 0 {
                return Err(EfuseError::WouldClearBits {
                    word,
                    current,
                    requested: (current & !mask) | wanted,
                });
            }
        }

        for word in range.start_word..range.end_word {
            let (current, wanted, mask) = self.plan_word(&range, word, data);
            let bits = wanted & !current;
            if bits == 0 {
                continue;
            }
            let expected = current | bits;
            info!(
                "eFUSE {}: programming word {word} with {bits:#010x} (now {current:#010x})",
                self.variant.name
            );
            exception_free(|_| {
                self.enter(self.variant.program_mode);
                for bit in (0..self.variant.bits_per_fuse()).filter(|bit| bits & 1 << bit != 0) {
                    self.program_bit(word, bit);
                }
                self.standby();
            });

            let actual = self.read_word(word);
            if actual & mask != expected & mask {
                error!(
                    "eFUSE {}: word {word} read back {actual:#010x}, expected {expected:#010x}",
                    self.variant.name
                );
                return Err(EfuseError::VerifyFailed {
                    word,
                    expected,
                    actual,
                });
            }
        }

        Ok(())
    }

    /// Returns the current contents of `word`, the bits `data` asks for in it, and the mask of the
    /// bits of the word which `range` covers.
    fn plan_word(&mut self, range: &FuseRange, word: usize, data: &[u8]) -> (u32, u32, u32) {
        let mask = range.word_mask(self.variant, word);
        let word_start = word * self.variant.bytes_per_fuse;
        let wanted = (0..self.variant.bytes_per_fuse)
            .filter_map(|byte| {
                let position = (word_start + byte).checked_sub(range.offset)?;
                data.get(position).map(|value| u32::from(*value) << (byte * 8))
            })
            .fold(0, |word, byte| word | byte);
        (self.read_word(word), wanted & mask, mask)
    }

    fn read_word(&mut self, word: usize) -> u32 {
        exception_free(|_| {
            self.enter(self.variant.read_mode);
            let value = self.sense(word);
            self.standby();
            value
        })
    }

    fn enter(&mut self, mode: EfuseCtrl) {
        self.controller.write_ctrl(mode);
        self.delay.udelay(self.variant.setup_us);
    }

    /// Strobes the read of one fuse word. The controller must be in read mode.
    fn sense(&mut self, word: usize) -> u32 {
        let mode = self.variant.read_mode | self.variant.address(word as u32);
        self.controller.write_ctrl(mode | EfuseCtrl::STROBE);
        self.delay.udelay(self.variant.read_strobe_us);
        let value = self.controller.read_dout() & self.variant.word_mask();
        self.controller.write_ctrl(mode);
        self.delay.udelay(self.variant.read_strobe_us);
        value
    }

    /// Strobes the programming of one fuse bit. The controller must be in program mode.
    fn program_bit(&mut self, word: usize, bit: u32) {
        let address = self.variant.bit_address(word, bit);
        debug!("eFUSE {}: program strobe at bit address {address}", self.variant.name);
        let mode = self.variant.program_mode | self.variant.address(address);
        self.controller.write_ctrl(mode | EfuseCtrl::STROBE);
        self.delay.udelay(self.variant.program_strobe_us);
        self.controller.write_ctrl(mode);
        self.delay.udelay(self.variant.read_strobe_us);
    }

    fn standby(&mut self) {
        self.controller.write_ctrl(self.variant.standby);
    }
}

/// Copies the bytes of fuse word `word` which fall inside `range` into `buf`.
fn copy_word_bytes(
    variant: &EfuseVariant,
    range: &FuseRange,
    word: usize,
    value: u32,
    buf: &mut [u8],
) {
    let bytes = value.to_le_bytes();
    let word_start = word * variant.bytes_per_fuse;
    for (byte, value) in bytes.iter().take(variant.bytes_per_fuse).enumerate() {
        let Some(position) = (word_start + byte).checked_sub(range.offset) else {
            continue;
        };
        if position < range.len {
            buf[position] = *value;
        }
    }
}
