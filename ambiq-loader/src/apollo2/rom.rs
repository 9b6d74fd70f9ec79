//! Fixed addresses, keys and boot-ROM entry points of the Apollo2.
//!
//! Everything the call protocol needs to know about the chip lives in this
//! table; the protocol engine in [`crate::flashing`] is parameterized by it
//! and carries no Apollo2 knowledge of its own.

use bitfield::bitfield;
use static_assertions::const_assert;
use static_assertions::const_assert_eq;

use crate::flashing::{RomRoutine, StagingWindow};

/// Part number register; identifies the chip family and its configuration.
pub const CHIPPN: u32 = 0x4002_0000;

/// [`CHIPPN`] value of the Apollo2 parts this driver supports.
pub const APOLLO2_CHIPPN: u32 = 0x036422c9;

/// Unique device id, low word.
pub const CHIPID0: u32 = 0x4002_0004;

/// Unique device id, high word.
pub const CHIPID1: u32 = 0x4002_0008;

/// Bootloader visibility register: `0` maps the boot ROM at address zero,
/// `1` restores the application image's view.
pub const BOOTLOADER_LOW: u32 = 0x4002_01a0;

/// First address of the main flash.
pub const FLASH_BASE: u32 = 0x0000_0000;

/// Total main flash size: 1 MiB.
pub const FLASH_TOTAL: u32 = 0x0010_0000;

/// Size of one flash instance: 512 KiB, two instances per device.
pub const FLASH_INSTANCE: u32 = 0x0008_0000;

/// Size of one erase page: 8 KiB.
pub const FLASH_PAGE: u32 = 0x2000;

/// Smallest programmable unit in bytes.
pub const WRITE_GRANULARITY: u32 = 4;

/// Value erased flash bytes read as.
pub const ERASED_BYTE: u8 = 0xff;

/// First address of the on-chip SRAM.
pub const SRAM_BASE: u32 = 0x1000_0000;

/// The RAM window ROM calls run out of: arguments from the SRAM base
/// upward, the routine's stack growing down from 1 KiB above it, less a
/// 32 byte margin.
pub const STAGING: StagingWindow = StagingWindow {
    base: SRAM_BASE,
    stack_top: SRAM_BASE + 0x400 - 32,
};

/// RAM buffer the programming routines read their payload from.
pub const WRITE_BUFFER: u32 = 0x1000_1000;

/// Unlock key for the main-flash routines.
pub const PROGRAM_KEY: u32 = 0x1234_4321;

/// Unlock key for the info-space routines.
pub const INFO_KEY: u32 = 0x8765_5678;

/// Program words into main flash from [`WRITE_BUFFER`].
pub const PROGRAM_MAIN: RomRoutine = RomRoutine {
    name: "program_main",
    entry: 0x0800_005c,
};

/// Program words into the info space from [`WRITE_BUFFER`].
pub const PROGRAM_INFO: RomRoutine = RomRoutine {
    name: "program_info",
    entry: 0x0800_0060,
};

/// Erase a run of pages inside one main-flash instance.
pub const ERASE_MAIN_PAGES: RomRoutine = RomRoutine {
    name: "erase_main_pages",
    entry: 0x0800_0064,
};

/// Erase one main-flash instance completely.
pub const MASS_ERASE: RomRoutine = RomRoutine {
    name: "mass_erase",
    entry: 0x0800_0068,
};

/// Erase the info space of one instance.
pub const ERASE_INFO: RomRoutine = RomRoutine {
    name: "erase_info",
    entry: 0x0800_0084,
};

/// Erase one instance's main flash and info space together.
pub const ERASE_MAIN_PLUS_INFO: RomRoutine = RomRoutine {
    name: "erase_main_plus_info",
    entry: 0x0800_0088,
};

const_assert!(FLASH_TOTAL % FLASH_INSTANCE == 0);
const_assert!(FLASH_INSTANCE % FLASH_PAGE == 0);
// The routine's stack must stay clear of the payload buffer.
const_assert!(STAGING.stack_top < WRITE_BUFFER);
const_assert!(STAGING.base < STAGING.stack_top);
// Entry addresses carry no Thumb bit; the invoker selects Thumb state
// through xPSR and the link register.
const_assert_eq!(PROGRAM_MAIN.entry & 1, 0);
const_assert_eq!(PROGRAM_INFO.entry & 1, 0);
const_assert_eq!(ERASE_MAIN_PAGES.entry & 1, 0);
const_assert_eq!(MASS_ERASE.entry & 1, 0);
const_assert_eq!(ERASE_INFO.entry & 1, 0);
const_assert_eq!(ERASE_MAIN_PLUS_INFO.entry & 1, 0);

bitfield! {
    /// The part number register ([`CHIPPN`]).
    pub struct ChipPn(u32);
    impl Debug;

    /// Part number of the chip family.
    pub u8, partnum, _: 31, 24;
    /// Flash size as a shift count: 16 KiB << code.
    pub u8, flash_size_code, _: 23, 20;
    /// SRAM size as a shift count: 16 KiB << code.
    pub u8, sram_size_code, _: 19, 16;
    /// Major silicon revision.
    pub u8, rev_major, _: 15, 12;
    /// Minor silicon revision.
    pub u8, rev_minor, _: 11, 8;
    /// Package type.
    pub u8, package, _: 7, 6;
    /// Pin count code.
    pub u8, pins, _: 5, 3;
    /// Temperature range code.
    pub u8, temperature, _: 2, 1;
    /// Whether the part is qualified.
    pub bool, qualified, _: 0;
}

impl From<u32> for ChipPn {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<ChipPn> for u32 {
    fn from(value: ChipPn) -> Self {
        value.0
    }
}

bitfield! {
    /// The bootloader visibility register ([`BOOTLOADER_LOW`]).
    pub struct Bootldr(u32);
    impl Debug;

    /// `false` maps the boot ROM at address zero, `true` the application
    /// image.
    pub bool, app_visible, set_app_visible: 0;
}

impl From<u32> for Bootldr {
    fn from(value: u32) -> Self {
        Self(value)
    }
}

impl From<Bootldr> for u32 {
    fn from(value: Bootldr) -> Self {
        value.0
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn chippn_fields_decode_the_apollo2_literal() {
        let pn = ChipPn(APOLLO2_CHIPPN);

        assert_eq!(pn.partnum(), 0x03);
        // 16 KiB << 6 = 1 MiB of flash, 16 KiB << 4 = 256 KiB of SRAM.
        assert_eq!(pn.flash_size_code(), 6);
        assert_eq!(pn.sram_size_code(), 4);
        assert_eq!(pn.rev_major(), 2);
        assert_eq!(pn.rev_minor(), 2);
        assert!(pn.qualified());
    }

    #[test]
    fn bootldr_bit_zero_selects_the_view() {
        let mut reg = Bootldr(0);
        assert!(!reg.app_visible());

        reg.set_app_visible(true);
        assert_eq!(reg.0, 1);
    }
}
