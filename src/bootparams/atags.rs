// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! The ARM Linux tagged list (ATAG) boot parameter format.
//!
//! Each tag is a header giving its size in 32-bit words (header included) and its type, followed
//! by the payload. The list ends with a `NONE` tag of size zero.

use super::{MemoryBank, ParamError};
use core::{mem::size_of, ops::Range};
use log::debug;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

const HEADER_SIZE: usize = size_of::<TagHeader>();

/// Tag types understood by the kernel.
#[derive(Clone, Copy, Debug, Eq, IntoPrimitive, PartialEq, TryFromPrimitive)]
#[repr(u32)]
pub enum TagId {
    /// Ends the list.
    None = 0,
    /// Must be the first tag.
    Core = 0x5441_0001,
    /// A bank of RAM.
    Mem = 0x5441_0002,
    /// The board serial number.
    Serial = 0x5441_0006,
    /// The board revision.
    Revision = 0x5441_0007,
    /// Physical location of the initial ramdisk.
    Initrd2 = 0x5442_0005,
    /// The kernel command line.
    Cmdline = 0x5441_0009,
}

/// The header at the start of every tag.
#[derive(Clone, Copy, Debug, Eq, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq)]
#[repr(C)]
pub struct TagHeader {
    /// Size of the tag in words, including this header.
    pub size: u32,
    /// The [`TagId`] of the tag.
    pub tag: u32,
}

/// Payload of [`TagId::Core`]. All zero, as nothing reads it any more.
#[derive(Clone, Copy, Debug, Default, Eq, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq)]
#[repr(C)]
pub struct TagCore {
    /// Bit 0 set for a read-only root.
    pub flags: u32,
    /// System page size.
    pub pagesize: u32,
    /// Root device number.
    pub rootdev: u32,
}

/// Payload of [`TagId::Mem`].
#[derive(Clone, Copy, Debug, Eq, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq)]
#[repr(C)]
pub struct TagMem32 {
    /// Size of the bank in bytes.
    pub size: u32,
    /// Physical start address.
    pub start: u32,
}

/// Payload of [`TagId::Serial`].
#[derive(Clone, Copy, Debug, Eq, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq)]
#[repr(C)]
pub struct TagSerial {
    /// Low 32 bits.
    pub low: u32,
    /// High 32 bits.
    pub high: u32,
}

/// Payload of [`TagId::Revision`].
#[derive(Clone, Copy, Debug, Eq, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq)]
#[repr(C)]
pub struct TagRevision {
    /// Board revision.
    pub rev: u32,
}

/// Payload of [`TagId::Initrd2`].
#[derive(Clone, Copy, Debug, Eq, FromBytes, Immutable, IntoBytes, KnownLayout, PartialEq)]
#[repr(C)]
pub struct TagInitrd {
    /// Physical start address.
    pub start: u32,
    /// Size in bytes.
    pub size: u32,
}

/// Appends tags to a buffer.
///
/// Room for the terminating tag is always kept free, so [`TagWriter::finish`] only fails if the
/// buffer could never hold a list at all.
pub struct TagWriter<'a> {
    buf: &'a mut [u8],
    len: usize,
}

impl<'a> TagWriter<'a> {
    /// Creates a writer which starts an empty list at the beginning of `buf`.
    pub fn new(buf: &'a mut [u8]) -> Self {
        Self { buf, len: 0 }
    }

    /// Returns the number of bytes of tags written so far, not counting the terminator.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns whether no tags have been written.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Appends a tag with the given fixed-size payload.
    pub fn push<T: IntoBytes + Immutable>(
        &mut self,
        id: TagId,
        payload: &T,
    ) -> Result<(), ParamError> {
        let payload = payload.as_bytes();
        let tag = self.reserve(id, HEADER_SIZE + payload.len())?;
        tag.copy_from_slice(payload);
        Ok(())
    }

    /// Appends a command line tag holding `cmdline` and a NUL terminator.
    pub fn push_cmdline(&mut self, cmdline: &str) -> Result<(), ParamError> {
        let words = (HEADER_SIZE + cmdline.len() + 1 + 4) >> 2;
        let tag = self.reserve(TagId::Cmdline, words * 4)?;
        let (text, padding) = tag.split_at_mut(cmdline.len());
        text.copy_from_slice(cmdline.as_bytes());
        padding.fill(0);
        Ok(())
    }

    /// Terminates the list, returning its total length in bytes.
    pub fn finish(self) -> Result<usize, ParamError> {
        let Self { buf, len } = self;
        let end = len + HEADER_SIZE;
        let terminator = buf.get_mut(len..end).ok_or(ParamError::BufferTooSmall)?;
        let header = TagHeader {
            size: 0,
            tag: TagId::None.into(),
        };
        terminator.copy_from_slice(header.as_bytes());
        Ok(end)
    }

    /// Writes the header of a tag of `size` bytes and returns the space for its payload.
    fn reserve(&mut self, id: TagId, size: usize) -> Result<&mut [u8], ParamError> {
        debug_assert_eq!(size % 4, 0);
        let words = u32::try_from(size / 4).map_err(|_| ParamError::Unrepresentable)?;
        let start = self.len;
        let end = start + size;
        if end + HEADER_SIZE > self.buf.len() {
            return Err(ParamError::BufferTooSmall);
        }
        let header = TagHeader {
            size: words,
            tag: id.into(),
        };
        let tag = &mut self.buf[start..end];
        tag[..HEADER_SIZE].copy_from_slice(header.as_bytes());
        self.len = end;
        Ok(&mut tag[HEADER_SIZE..])
    }
}

/// A tag read back from a list.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Tag<'a> {
    /// The raw tag type.
    pub tag: u32,
    /// The payload following the header.
    pub payload: &'a [u8],
}

impl<'a> Tag<'a> {
    /// Returns the tag type, if it is one this crate knows.
    pub fn id(&self) -> Option<TagId> {
        TagId::try_from(self.tag).ok()
    }

    /// Interprets the start of the payload as `T`.
    pub fn read<T: FromBytes>(&self) -> Option<T> {
        T::read_from_prefix(self.payload).ok().map(|(value, _)| value)
    }

    /// Returns the command line held by a [`TagId::Cmdline`] tag.
    pub fn cmdline(&self) -> Option<&'a str> {
        if self.id() != Some(TagId::Cmdline) {
            return None;
        }
        let len = self
            .payload
            .iter()
            .position(|byte| *byte == 0)
            .unwrap_or(self.payload.len());
        core::str::from_utf8(&self.payload[..len]).ok()
    }
}

/// Iterates over the tags of a list, stopping at the terminator or at the first malformed tag.
#[derive(Clone, Debug)]
pub struct TagIter<'a> {
    remaining: &'a [u8],
}

impl<'a> TagIter<'a> {
    /// Creates an iterator over the list at the start of `list`.
    pub fn new(list: &'a [u8]) -> Self {
        Self { remaining: list }
    }
}

impl<'a> Iterator for TagIter<'a> {
    type Item = Tag<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (header, _) = TagHeader::read_from_prefix(self.remaining).ok()?;
        let size = header.size as usize * 4;
        if header.tag == u32::from(TagId::None) || size < HEADER_SIZE || size > self.remaining.len()
        {
            self.remaining = &[];
            return None;
        }
        let (tag, rest) = self.remaining.split_at(size);
        self.remaining = rest;
        Some(Tag {
            tag: header.tag,
            payload: &tag[HEADER_SIZE..],
        })
    }
}

/// The values from which an ATAG list is built.
#[derive(Clone, Debug, Default)]
pub struct AtagInputs<'a> {
    /// Board serial number.
    pub serial: Option<u64>,
    /// Kernel command line. Leading whitespace is dropped, and no tag is written if nothing is
    /// left.
    pub cmdline: &'a str,
    /// Board revision.
    pub revision: Option<u32>,
    /// Banks of RAM, one tag each.
    pub banks: &'a [MemoryBank],
    /// Physical range of the initial ramdisk.
    pub initrd: Option<Range<u64>>,
}

/// Builds an ATAG list in `buf`, returning its length in bytes.
///
/// `board_tags` may append board-specific tags just before the terminator.
pub fn build(
    buf: &mut [u8],
    inputs: &AtagInputs,
    board_tags: impl FnOnce(&mut TagWriter) -> Result<(), ParamError>,
) -> Result<usize, ParamError> {
    let mut tags = TagWriter::new(buf);

    tags.push(TagId::Core, &TagCore::default())?;
    if let Some(serial) = inputs.serial {
        tags.push(
            TagId::Serial,
            &TagSerial {
                low: serial as u32,
                high: (serial >> 32) as u32,
            },
        )?;
    }
    let cmdline = inputs.cmdline.trim_start();
    if !cmdline.is_empty() {
        tags.push_cmdline(cmdline)?;
    }
    if let Some(rev) = inputs.revision {
        tags.push(TagId::Revision, &TagRevision { rev })?;
    }
    for bank in inputs.banks {
        tags.push(
            TagId::Mem,
            &TagMem32 {
                size: to_u32(bank.size)?,
                start: to_u32(bank.start)?,
            },
        )?;
    }
    if let Some(initrd) = &inputs.initrd {
        tags.push(
            TagId::Initrd2,
            &TagInitrd {
                start: to_u32(initrd.start)?,
                size: to_u32(initrd.end - initrd.start)?,
            },
        )?;
    }
    board_tags(&mut tags)?;

    let len = tags.finish()?;
    for tag in TagIter::new(&buf[..len]) {
        debug!("ATAG {:#010x} {:?}: {} bytes", tag.tag, tag.id(), tag.payload.len());
    }
    Ok(len)
}

fn to_u32(value: u64) -> Result<u32, ParamError> {
    u32::try_from(value).map_err(|_| ParamError::Unrepresentable)
}
