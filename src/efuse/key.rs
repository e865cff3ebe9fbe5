// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! Access to the public key held in the fuse array.

use super::{BurnConfirmation, Efuse, EfuseError, FuseController};
use crate::timer::Delay;
use core::fmt::{self, Display, Formatter};

/// Byte offset of the key within the fuse array.
pub const KEY_OFFSET: usize = 0;

/// Size of the key in bytes.
pub const KEY_SIZE: usize = 128;

/// The public key material stored in the fuses.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PublicKey([u8; KEY_SIZE]);

impl PublicKey {
    /// Reads the key from the fuses.
    ///
    /// Fails with [`EfuseError::Truncated`] if the array is too small to hold a whole key.
    pub fn read<C: FuseController, D: Delay>(efuse: &mut Efuse<C, D>) -> Result<Self, EfuseError> {
        let mut key = [0; KEY_SIZE];
        let actual = efuse.read(KEY_OFFSET, &mut key)?;
        if actual != KEY_SIZE {
            return Err(EfuseError::Truncated {
                requested: KEY_SIZE,
                actual,
            });
        }
        Ok(Self(key))
    }

    /// Returns whether no key bit has been programmed.
    pub fn is_blank(&self) -> bool {
        self.0.iter().all(|byte| *byte == 0)
    }

    /// Returns the raw key bytes.
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.0
    }

    /// Returns a hex and character dump of the key, for diagnostics.
    pub fn dump(&self) -> HexDump<'_> {
        HexDump::new(&self.0, 4)
    }
}

/// Permanently programs `pattern` into the key fuses, starting at the beginning of the key.
///
/// `confirmation` must name the fuse range `KEY_OFFSET..KEY_OFFSET + pattern.len()`.
pub fn write_key<C: FuseController, D: Delay>(
    efuse: &mut Efuse<C, D>,
    pattern: &[u8],
    confirmation: BurnConfirmation,
) -> Result<(), EfuseError> {
    if pattern.len() > KEY_SIZE {
        return Err(EfuseError::OutOfRange);
    }
    efuse.write(KEY_OFFSET, pattern, confirmation)
}

/// Formats bytes as rows of offset, hex values and printable characters.
///
/// Non-printable bytes are shown as `.` in the character column.
pub struct HexDump<'a> {
    bytes: &'a [u8],
    row_len: usize,
}

impl<'a> HexDump<'a> {
    /// Creates a dump with `row_len` bytes on each row.
    pub fn new(bytes: &'a [u8], row_len: usize) -> Self {
        Self {
            bytes,
            row_len: row_len.max(1),
        }
    }
}

impl Display for HexDump<'_> {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for (row, chunk) in self.bytes.chunks(self.row_len).enumerate() {
            write!(f, "{:08x}:", row * self.row_len)?;
            for byte in chunk {
                write!(f, " {byte:02x}")?;
            }
            for _ in chunk.len()..self.row_len {
                write!(f, "   ")?;
            }
            write!(f, "  ")?;
            for byte in chunk {
                let c = if byte.is_ascii_graphic() || *byte == b' ' {
                    char::from(*byte)
                } else {
                    '.'
                };
                write!(f, "{c}")?;
            }
            writeln!(f)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::efuse::{
        RK3288, RK3399,
        fake::{FakeClock, FakeFuses},
    };

    #[test]
    fn read_blank_key() {
        let clock = FakeClock::new();
        let mut fuses = FakeFuses::new(&RK3399, &clock);
        let mut efuse = Efuse::new(&mut fuses, &clock, &RK3399);

        let key = PublicKey::read(&mut efuse).unwrap();
        assert!(key.is_blank());
    }

    #[test]
    fn write_and_read_key() {
        let clock = FakeClock::new();
        let mut fuses = FakeFuses::new(&RK3399, &clock);
        let mut efuse = Efuse::new(&mut fuses, &clock, &RK3399);

        let pattern: Vec<u8> = (0..KEY_SIZE as u8).map(|i| i.wrapping_mul(37)).collect();
        write_key(
            &mut efuse,
            &pattern,
            BurnConfirmation::new(KEY_OFFSET, KEY_SIZE),
        )
        .unwrap();

        let key = PublicKey::read(&mut efuse).unwrap();
        assert!(!key.is_blank());
        assert_eq!(key.as_bytes()[..], pattern[..]);
    }

    #[test]
    fn oversized_pattern_is_rejected() {
        let clock = FakeClock::new();
        let mut fuses = FakeFuses::new(&RK3399, &clock);
        let mut efuse = Efuse::new(&mut fuses, &clock, &RK3399);

        let pattern = [0xff; KEY_SIZE + 1];
        assert_eq!(
            write_key(
                &mut efuse,
                &pattern,
                BurnConfirmation::new(KEY_OFFSET, KEY_SIZE + 1)
            ),
            Err(EfuseError::OutOfRange)
        );
        assert_eq!(fuses.program_strobes(), 0);
    }

    #[test]
    fn small_array_truncates_key() {
        let clock = FakeClock::new();
        let mut fuses = FakeFuses::new(&RK3288, &clock);
        let mut efuse = Efuse::new(&mut fuses, &clock, &RK3288);

        assert_eq!(
            PublicKey::read(&mut efuse),
            Err(EfuseError::Truncated {
                requested: KEY_SIZE,
                actual: 32,
            })
        );
    }

    #[test]
    fn hex_dump() {
        let bytes = [0x52, 0x4b, 0x00, 0x33, 0x39, 0x7f];
        assert_eq!(
            HexDump::new(&bytes, 4).to_string(),
            "00000000: 52 4b 00 33  RK.3\n00000004: 39 7f        9.\n"
        );
        assert_eq!(HexDump::new(&[], 4).to_string(), "");
    }

    #[test]
    fn key_dump_has_one_row_per_fuse_word() {
        let key = PublicKey([0x41; KEY_SIZE]);
        let dump = key.dump().to_string();
        assert_eq!(dump.lines().count(), KEY_SIZE / 4);
        assert_eq!(dump.lines().last(), Some("0000007c: 41 41 41 41  AAAA"));
    }
}
