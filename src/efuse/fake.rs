// Copyright The Rusted Firmware-A Contributors.
//
// SPDX-License-Identifier: BSD-3-Clause

//! A simulated eFUSE controller and clock for unit tests.

use super::{EfuseCtrl, EfuseVariant, FuseController};
use crate::timer::Delay;
use std::cell::Cell;

/// A clock which only advances when something delays on it.
#[derive(Debug, Default)]
pub struct FakeClock {
    now_us: Cell<u64>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total time delayed so far, in microseconds.
    pub fn now(&self) -> u64 {
        self.now_us.get()
    }
}

impl Delay for &FakeClock {
    fn udelay(&mut self, us: u32) {
        self.now_us.set(self.now_us.get() + u64::from(us));
    }
}

/// A fuse array behind a simulated controller.
///
/// Read strobes latch the addressed word into the data out register; program strobes blow the
/// addressed bit. The fake panics if the protocol is violated: a strobe while in standby, a read
/// strobe without `LOAD`, a strobe released before its minimum time, or data out read before the
/// strobe settled.
pub struct FakeFuses<'a> {
    variant: &'static EfuseVariant,
    clock: &'a FakeClock,
    words: Vec<u32>,
    stuck: Vec<u32>,
    ctrl: EfuseCtrl,
    strobe_since: Option<u64>,
    dout: u32,
    read_strobes: usize,
    program_strobes: usize,
    last_program: Option<(EfuseCtrl, u32)>,
}

impl<'a> FakeFuses<'a> {
    /// Creates a blank fuse array, powered down.
    pub fn new(variant: &'static EfuseVariant, clock: &'a FakeClock) -> Self {
        Self {
            variant,
            clock,
            words: vec![0; variant.fuse_count],
            stuck: vec![0; variant.fuse_count],
            ctrl: variant.standby,
            strobe_since: None,
            dout: 0,
            read_strobes: 0,
            program_strobes: 0,
            last_program: None,
        }
    }

    /// Sets the contents of a fuse word directly, as if programmed at the factory.
    pub fn set_word(&mut self, word: usize, value: u32) {
        self.words[word] = value & self.variant.word_mask();
    }

    /// Returns the contents of a fuse word.
    pub fn word(&self, word: usize) -> u32 {
        self.words[word]
    }

    /// Marks bits of a word which will not blow when programmed.
    pub fn set_stuck_bits(&mut self, word: usize, bits: u32) {
        self.stuck[word] = bits;
    }

    /// Returns whether the controller was last left in standby.
    pub fn in_standby(&self) -> bool {
        self.ctrl == self.variant.standby
    }

    pub fn read_strobes(&self) -> usize {
        self.read_strobes
    }

    pub fn program_strobes(&self) -> usize {
        self.program_strobes
    }

    /// Returns the control bits of the last program strobe, without the strobe and address.
    pub fn program_mode(&self) -> Option<EfuseCtrl> {
        self.last_program.map(|(mode, _)| mode)
    }

    /// Returns the bit address of the last program strobe.
    pub fn program_address(&self) -> Option<u32> {
        self.last_program.map(|(_, address)| address)
    }

    fn address(&self, ctrl: EfuseCtrl) -> u32 {
        (ctrl.bits() >> self.variant.address_shift) & EfuseVariant::ADDRESS_MASK
    }

    fn strobe_rising(&mut self, ctrl: EfuseCtrl) {
        assert!(
            !ctrl.intersects(EfuseCtrl::CSB | EfuseCtrl::PD),
            "strobe while in standby: {ctrl:?}"
        );
        let address = self.address(ctrl) as usize;
        if ctrl.contains(EfuseCtrl::PGENB) {
            assert!(ctrl.contains(EfuseCtrl::LOAD), "read strobe without LOAD");
            assert!(address < self.variant.fuse_count, "read of word {address}");
            self.read_strobes += 1;
            self.dout = self.words[address];
        } else {
            let bits = self.variant.bits_per_fuse() as usize;
            let (word, bit) = (address / bits, address % bits);
            assert!(word < self.variant.fuse_count, "program of word {word}");
            self.program_strobes += 1;
            let mode = ctrl.difference(EfuseCtrl::STROBE).bits()
                & !(EfuseVariant::ADDRESS_MASK << self.variant.address_shift);
            self.last_program = Some((EfuseCtrl::from_bits_retain(mode), address as u32));
            self.words[word] |= (1 << bit) & !self.stuck[word];
        }
        self.strobe_since = Some(self.clock.now());
    }

    fn strobe_falling(&mut self, ctrl: EfuseCtrl) {
        let since = self.strobe_since.take().expect("strobe was not high");
        let minimum = if ctrl.contains(EfuseCtrl::PGENB) {
            self.variant.read_strobe_us
        } else {
            self.variant.program_strobe_us
        };
        assert!(
            self.clock.now() - since >= u64::from(minimum),
            "strobe released after {}us, minimum {minimum}us",
            self.clock.now() - since
        );
    }
}

impl FuseController for FakeFuses<'_> {
    fn write_ctrl(&mut self, value: EfuseCtrl) {
        let was_high = self.ctrl.contains(EfuseCtrl::STROBE);
        let is_high = value.contains(EfuseCtrl::STROBE);
        if is_high && !was_high {
            self.strobe_rising(value);
        } else if was_high && !is_high {
            self.strobe_falling(value);
        }
        self.ctrl = value;
    }

    fn read_dout(&mut self) -> u32 {
        if let Some(since) = self.strobe_since {
            assert!(
                self.clock.now() - since >= u64::from(self.variant.read_strobe_us),
                "data out read before the strobe settled"
            );
        }
        self.dout
    }
}
