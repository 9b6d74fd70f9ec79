//! Flash driver for the Ambiq Apollo2.
//!
//! The Apollo2 has no loadable flash algorithm; instead its boot ROM exposes
//! programming and erase routines that are invoked through the call protocol
//! in [`crate::flashing`]. This module supplies the chip-specific half:
//! the constant table in [`rom`], identification, and [`Apollo2Flash`],
//! which builds the argument vector for each operation and manages the
//! bootloader visibility register around the calls.

pub mod commands;
pub mod rom;

use crate::core::CoreInterface;
use crate::error::Error;
use crate::flashing::{
    FlashError, FlashGeometry, FlashProgress, RomCaller, BREAKPOINT_WORD, THREAD_MODE_TAG,
};
use crate::memory::{InvalidDataLengthError, MemoryNotAlignedError};

/// What the part number register says about a recognized chip.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChipInfo {
    /// Main flash size in bytes.
    pub flash_size: u32,
    /// SRAM size in bytes.
    pub sram_size: u32,
    /// Major silicon revision.
    pub rev_major: u8,
    /// Minor silicon revision.
    pub rev_minor: u8,
    /// Package type code.
    pub package: u8,
}

/// Read the part number register and decide whether this driver applies.
///
/// Returns the decoded [`ChipInfo`] for a supported Apollo2, `None` for
/// anything else. An unknown nonzero part number is logged, since it
/// usually means a related Ambiq part this driver does not know yet.
pub fn identify<C: CoreInterface>(core: &mut C) -> Result<Option<ChipInfo>, Error> {
    let value = core.read_word_32(rom::CHIPPN)?;
    if value != rom::APOLLO2_CHIPPN {
        if value != 0 {
            tracing::info!("Apollo2: Unknown IDCODE {value:#010x}");
        }
        return Ok(None);
    }

    let pn = rom::ChipPn::from(value);
    Ok(Some(ChipInfo {
        flash_size: (16 * 1024) << pn.flash_size_code(),
        sram_size: (16 * 1024) << pn.sram_size_code(),
        rev_major: pn.rev_major(),
        rev_minor: pn.rev_minor(),
        package: pn.package(),
    }))
}

/// Read the 8 byte unique device id, high word first.
pub fn read_unique_id<C: CoreInterface>(core: &mut C) -> Result<u64, Error> {
    let high = core.read_word_32(rom::CHIPID1)?;
    let low = core.read_word_32(rom::CHIPID0)?;
    Ok(u64::from(high) << 32 | u64::from(low))
}

/// The flash operations of one Apollo2, driven over a halted core.
///
/// Every operation runs the full stage → invoke → check → clear sequence of
/// [`RomCaller`] under the bootloader visibility toggle. The core must be
/// halted for the whole lifetime of this struct; a call that times out
/// leaves the core's registers and stack where the timeout found them, and
/// recovering from that (usually by a reset) is the caller's business.
pub struct Apollo2Flash<'core, C: CoreInterface> {
    core: &'core mut C,
    layout: FlashGeometry,
    progress: FlashProgress,
}

impl<'core, C: CoreInterface> Apollo2Flash<'core, C> {
    /// Create a driver for the core, discarding progress events.
    pub fn new(core: &'core mut C) -> Result<Self, FlashError> {
        Self::with_progress(core, FlashProgress::empty())
    }

    /// Create a driver that reports call progress to `progress`.
    pub fn with_progress(core: &'core mut C, progress: FlashProgress) -> Result<Self, FlashError> {
        let layout = FlashGeometry::new(
            rom::FLASH_BASE,
            rom::FLASH_TOTAL,
            rom::FLASH_INSTANCE,
            rom::FLASH_PAGE,
            rom::WRITE_GRANULARITY,
            rom::ERASED_BYTE,
        )?;
        Ok(Apollo2Flash {
            core,
            layout,
            progress,
        })
    }

    /// The flash layout the operations work against.
    pub fn layout(&self) -> &FlashGeometry {
        &self.layout
    }

    /// Program `data` into main flash at `dest`.
    ///
    /// The payload is copied to the chip's write buffer verbatim and
    /// programmed from there by the ROM. `dest` must be word aligned and
    /// the payload length a multiple of the write granularity. The boot ROM
    /// stays mapped low afterwards, since programming sequences chain
    /// further calls.
    pub fn write(&mut self, dest: u32, data: &[u8]) -> Result<(), FlashError> {
        if dest % rom::WRITE_GRANULARITY != 0 {
            return Err(MemoryNotAlignedError {
                address: dest,
                alignment: rom::WRITE_GRANULARITY as usize,
            }
            .into());
        }
        if data.len() % rom::WRITE_GRANULARITY as usize != 0 {
            return Err(
                InvalidDataLengthError::new("write", rom::WRITE_GRANULARITY as usize).into(),
            );
        }
        if !self.layout.contains_range(dest, data.len() as u32) {
            return Err(FlashError::AddressNotInFlash {
                start: dest,
                end: dest.saturating_add(data.len() as u32),
            });
        }
        if data.is_empty() {
            return Ok(());
        }

        tracing::debug!("Programming {} bytes to {dest:#010x}", data.len());
        self.with_rom_mapped(false, |caller| {
            caller.core().write_8(rom::WRITE_BUFFER, data)?;
            let vector = [
                dest,
                data.len() as u32 / 4,
                rom::PROGRAM_KEY,
                BREAKPOINT_WORD,
                THREAD_MODE_TAG,
            ];
            caller.call(rom::PROGRAM_MAIN, &vector)
        })
    }

    /// Erase all pages covered by `length` bytes starting at `address`.
    ///
    /// A range crossing the instance boundary becomes one ROM call per
    /// instance. The application view is restored afterwards only when the
    /// range starts at page 0 of an instance; an erase elsewhere cannot have
    /// touched the vector table the visibility bit exposes, and the ROM is
    /// left mapped for the programming calls that typically follow.
    pub fn erase(&mut self, address: u32, length: u32) -> Result<(), FlashError> {
        if length == 0 {
            return Ok(());
        }
        if !self.layout.contains_range(address, length) {
            return Err(FlashError::AddressNotInFlash {
                start: address,
                end: address.saturating_add(length),
            });
        }

        let ranges = self.layout.page_ranges(address, length);
        let restore_after = self.layout.page_in_instance(address) == 0;

        tracing::debug!("Erasing {length:#x} bytes at {address:#010x}");
        self.with_rom_mapped(restore_after, |caller| {
            for range in ranges {
                let vector = [
                    range.instance,
                    range.pages,
                    rom::PROGRAM_KEY,
                    BREAKPOINT_WORD,
                    range.first_page,
                    THREAD_MODE_TAG,
                ];
                caller.call(rom::ERASE_MAIN_PAGES, &vector)?;
            }
            Ok(())
        })
    }

    /// Erase one flash instance completely.
    pub fn mass_erase(&mut self, instance: u32) -> Result<(), FlashError> {
        tracing::debug!("Mass erasing instance {instance}");
        self.with_rom_mapped(true, |caller| {
            let vector = [instance, rom::PROGRAM_KEY, BREAKPOINT_WORD, THREAD_MODE_TAG];
            caller.call(rom::MASS_ERASE, &vector)
        })
    }

    /// Erase the whole main flash, instance by instance.
    ///
    /// Fails on the first instance whose erase fails.
    pub fn erase_all(&mut self) -> Result<(), FlashError> {
        for instance in 0..self.layout.instance_count() {
            self.mass_erase(instance)?;
        }
        Ok(())
    }

    /// Program `data` into the info space at word offset `offset`.
    ///
    /// Keyed separately from main flash; otherwise behaves like
    /// [`Apollo2Flash::write`], including leaving the boot ROM mapped low.
    pub fn program_info(&mut self, offset: u32, data: &[u8]) -> Result<(), FlashError> {
        if data.len() % rom::WRITE_GRANULARITY as usize != 0 {
            return Err(
                InvalidDataLengthError::new("program_info", rom::WRITE_GRANULARITY as usize)
                    .into(),
            );
        }
        if data.is_empty() {
            return Ok(());
        }

        tracing::debug!("Programming {} info bytes at offset {offset:#x}", data.len());
        self.with_rom_mapped(false, |caller| {
            caller.core().write_8(rom::WRITE_BUFFER, data)?;
            let vector = [
                offset,
                data.len() as u32 / 4,
                rom::INFO_KEY,
                BREAKPOINT_WORD,
                THREAD_MODE_TAG,
            ];
            caller.call(rom::PROGRAM_INFO, &vector)
        })
    }

    /// Erase the info space of one instance.
    pub fn erase_info(&mut self, instance: u32) -> Result<(), FlashError> {
        tracing::debug!("Erasing info space of instance {instance}");
        self.with_rom_mapped(true, |caller| {
            let vector = [instance, rom::INFO_KEY, BREAKPOINT_WORD, THREAD_MODE_TAG];
            caller.call(rom::ERASE_INFO, &vector)
        })
    }

    /// Return the device to the factory-blank state: erase main flash and
    /// info space of every instance.
    pub fn recover(&mut self) -> Result<(), FlashError> {
        for instance in 0..self.layout.instance_count() {
            tracing::debug!("Recovering instance {instance}");
            self.with_rom_mapped(true, |caller| {
                let vector = [instance, rom::PROGRAM_KEY, BREAKPOINT_WORD, THREAD_MODE_TAG];
                caller.call(rom::ERASE_MAIN_PLUS_INFO, &vector)
            })?;
        }
        Ok(())
    }

    /// Run `operation` with the boot ROM mapped at address zero.
    ///
    /// The ROM must be mapped low before any of its routines is invoked.
    /// Whether the application view is restored afterwards is a documented
    /// property of each operation, not an accident of control flow; when it
    /// is, it is restored even if the call failed. A failed restore after a
    /// failed call is logged, and the call's own error wins.
    fn with_rom_mapped<T>(
        &mut self,
        restore_after: bool,
        operation: impl FnOnce(&mut RomCaller<'_, C>) -> Result<T, FlashError>,
    ) -> Result<T, FlashError> {
        self.set_rom_visible(true)?;

        let mut caller = RomCaller::new(&mut *self.core, rom::STAGING, &self.progress);
        let result = operation(&mut caller);

        if restore_after {
            if let Err(restore_error) = self.set_rom_visible(false) {
                match result {
                    Ok(_) => return Err(restore_error.into()),
                    Err(_) => tracing::warn!(
                        "Restoring the bootloader visibility after a failed call also failed: {restore_error}"
                    ),
                }
            }
        }
        result
    }

    /// Select what is mapped at address zero: the boot ROM or the
    /// application image.
    fn set_rom_visible(&mut self, rom_visible: bool) -> Result<(), Error> {
        let mut reg = rom::Bootldr::from(0);
        reg.set_app_visible(!rom_visible);
        self.core.write_word_32(rom::BOOTLOADER_LOW, reg.into())
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test::{MockCore, RomBehavior};

    #[test]
    fn write_stages_the_program_vector_and_uploads_the_payload() {
        let mut core = MockCore::new();
        let data: Vec<u8> = (0..16).collect();

        Apollo2Flash::new(&mut core)
            .unwrap()
            .write(0x1000, &data)
            .unwrap();

        let call = &core.calls[0];
        assert_eq!(call.pc, rom::PROGRAM_MAIN.entry);
        assert_eq!(
            &call.staged[..5],
            &[
                0x1000,
                4,
                rom::PROGRAM_KEY,
                BREAKPOINT_WORD,
                THREAD_MODE_TAG
            ]
        );
        assert_eq!(core.read_bytes(rom::WRITE_BUFFER, 16), data);
    }

    #[test]
    fn write_leaves_the_rom_mapped() {
        let mut core = MockCore::new();

        Apollo2Flash::new(&mut core)
            .unwrap()
            .write(0x1000, &[0; 8])
            .unwrap();

        assert_eq!(core.visibility_writes, &[0]);
    }

    #[test]
    fn write_fails_with_the_reported_status_code() {
        let mut core = MockCore::new();
        core.push_status(2);

        let result = Apollo2Flash::new(&mut core).unwrap().write(0x1000, &[0; 4]);

        assert!(matches!(
            result,
            Err(FlashError::RoutineCallFailed {
                name: "program_main",
                error_code: 2,
            })
        ));
    }

    #[test]
    fn misaligned_write_is_rejected_before_the_target_is_touched() {
        let mut core = MockCore::new();

        let result = Apollo2Flash::new(&mut core).unwrap().write(0x1002, &[0; 4]);

        assert!(matches!(result, Err(FlashError::NotAligned(_))));
        assert!(core.calls.is_empty());
        assert!(core.visibility_writes.is_empty());
    }

    #[test]
    fn unpadded_write_is_rejected() {
        let mut core = MockCore::new();

        let result = Apollo2Flash::new(&mut core).unwrap().write(0x1000, &[0; 3]);

        assert!(matches!(result, Err(FlashError::InvalidDataLength(_))));
        assert!(core.calls.is_empty());
    }

    #[test]
    fn write_outside_the_flash_is_rejected() {
        let mut core = MockCore::new();

        let result = Apollo2Flash::new(&mut core)
            .unwrap()
            .write(0x000f_fffc, &[0; 8]);

        assert!(matches!(result, Err(FlashError::AddressNotInFlash { .. })));
        assert!(core.calls.is_empty());
    }

    #[test]
    fn erase_stages_the_page_range_vector() {
        let mut core = MockCore::new();

        Apollo2Flash::new(&mut core)
            .unwrap()
            .erase(0x0000_2000, 0x2001)
            .unwrap();

        let call = &core.calls[0];
        assert_eq!(call.pc, rom::ERASE_MAIN_PAGES.entry);
        assert_eq!(
            &call.staged[..6],
            &[0, 2, rom::PROGRAM_KEY, BREAKPOINT_WORD, 1, THREAD_MODE_TAG]
        );
    }

    #[test]
    fn erase_from_page_zero_restores_the_application_view() {
        let mut core = MockCore::new();

        Apollo2Flash::new(&mut core)
            .unwrap()
            .erase(0x0000_0000, 0x2000)
            .unwrap();

        assert_eq!(core.visibility_writes, &[0, 1]);
    }

    #[test]
    fn erase_elsewhere_leaves_the_rom_mapped() {
        let mut core = MockCore::new();

        Apollo2Flash::new(&mut core)
            .unwrap()
            .erase(0x0000_2000, 0x2000)
            .unwrap();

        assert_eq!(core.visibility_writes, &[0]);
    }

    #[test]
    fn erase_across_the_instance_boundary_issues_one_call_per_instance() {
        let mut core = MockCore::new();

        Apollo2Flash::new(&mut core)
            .unwrap()
            .erase(0x0007_e000, 0x4000)
            .unwrap();

        assert_eq!(core.calls.len(), 2);
        assert_eq!(
            &core.calls[0].staged[..6],
            &[0, 1, rom::PROGRAM_KEY, BREAKPOINT_WORD, 63, THREAD_MODE_TAG]
        );
        assert_eq!(
            &core.calls[1].staged[..6],
            &[1, 1, rom::PROGRAM_KEY, BREAKPOINT_WORD, 0, THREAD_MODE_TAG]
        );
    }

    #[test]
    fn empty_erase_is_a_no_op() {
        let mut core = MockCore::new();

        Apollo2Flash::new(&mut core).unwrap().erase(0x4000, 0).unwrap();

        assert!(core.calls.is_empty());
        assert!(core.visibility_writes.is_empty());
    }

    #[test]
    fn erase_all_mass_erases_both_instances() {
        let mut core = MockCore::new();

        Apollo2Flash::new(&mut core).unwrap().erase_all().unwrap();

        assert_eq!(core.calls.len(), 2);
        assert_eq!(core.calls[0].pc, rom::MASS_ERASE.entry);
        assert_eq!(
            &core.calls[0].staged[..4],
            &[0, rom::PROGRAM_KEY, BREAKPOINT_WORD, THREAD_MODE_TAG]
        );
        assert_eq!(
            &core.calls[1].staged[..4],
            &[1, rom::PROGRAM_KEY, BREAKPOINT_WORD, THREAD_MODE_TAG]
        );
        // Each instance call restores the application view.
        assert_eq!(core.visibility_writes, &[0, 1, 0, 1]);
    }

    #[test]
    fn erase_all_fails_if_the_second_instance_fails() {
        let mut core = MockCore::new();
        core.push_status(0);
        core.push_status(7);

        let result = Apollo2Flash::new(&mut core).unwrap().erase_all();

        assert!(matches!(
            result,
            Err(FlashError::RoutineCallFailed {
                name: "mass_erase",
                error_code: 7,
            })
        ));
        assert_eq!(core.calls.len(), 2);
    }

    #[test]
    fn mass_erase_restores_the_view_even_on_failure() {
        let mut core = MockCore::new();
        core.push_status(1);

        let result = Apollo2Flash::new(&mut core).unwrap().mass_erase(0);

        assert!(result.is_err());
        assert_eq!(core.visibility(), Some(1));
    }

    #[test]
    fn program_info_uses_the_info_key_and_leaves_the_rom_mapped() {
        let mut core = MockCore::new();

        Apollo2Flash::new(&mut core)
            .unwrap()
            .program_info(2, &[0xaa; 8])
            .unwrap();

        let call = &core.calls[0];
        assert_eq!(call.pc, rom::PROGRAM_INFO.entry);
        assert_eq!(
            &call.staged[..5],
            &[2, 2, rom::INFO_KEY, BREAKPOINT_WORD, THREAD_MODE_TAG]
        );
        assert_eq!(core.visibility_writes, &[0]);
    }

    #[test]
    fn erase_info_restores_the_view() {
        let mut core = MockCore::new();

        Apollo2Flash::new(&mut core).unwrap().erase_info(1).unwrap();

        let call = &core.calls[0];
        assert_eq!(call.pc, rom::ERASE_INFO.entry);
        assert_eq!(
            &call.staged[..4],
            &[1, rom::INFO_KEY, BREAKPOINT_WORD, THREAD_MODE_TAG]
        );
        assert_eq!(core.visibility_writes, &[0, 1]);
    }

    #[test]
    fn recover_erases_main_and_info_of_every_instance() {
        let mut core = MockCore::new();

        Apollo2Flash::new(&mut core).unwrap().recover().unwrap();

        assert_eq!(core.calls.len(), 2);
        assert_eq!(core.calls[0].pc, rom::ERASE_MAIN_PLUS_INFO.entry);
        assert_eq!(core.calls[1].pc, rom::ERASE_MAIN_PLUS_INFO.entry);
        assert_eq!(core.visibility(), Some(1));
    }

    #[test]
    fn locked_up_call_still_restores_the_view() {
        let mut core = MockCore::new();
        core.set_behavior(RomBehavior::LockUp);

        let result = Apollo2Flash::new(&mut core).unwrap().mass_erase(0);

        assert!(matches!(
            result,
            Err(FlashError::UnexpectedCoreStatus { .. })
        ));
        assert_eq!(core.visibility(), Some(1));
    }

    #[test]
    fn identify_decodes_the_apollo2_part_number() {
        let mut core = MockCore::new();
        core.write_u32(rom::CHIPPN, rom::APOLLO2_CHIPPN);

        let info = identify(&mut core).unwrap().unwrap();

        assert_eq!(
            info,
            ChipInfo {
                flash_size: 0x0010_0000,
                sram_size: 0x0004_0000,
                rev_major: 2,
                rev_minor: 2,
                package: 3,
            }
        );
    }

    #[test]
    fn identify_rejects_other_part_numbers() {
        let mut core = MockCore::new();
        core.write_u32(rom::CHIPPN, 0x0123_4567);

        assert_eq!(identify(&mut core).unwrap(), None);
    }

    #[test]
    fn unique_id_is_assembled_high_word_first() {
        let mut core = MockCore::new();
        core.write_u32(rom::CHIPID0, 0x89ab_cdef);
        core.write_u32(rom::CHIPID1, 0x0123_4567);

        assert_eq!(read_unique_id(&mut core).unwrap(), 0x0123_4567_89ab_cdef);
    }
}
