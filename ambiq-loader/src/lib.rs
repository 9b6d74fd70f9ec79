//! # Boot-ROM flash loader for the Ambiq Apollo2
//!
//! The Apollo2's flash is programmed by routines in the chip's boot ROM.
//! This crate drives those routines remotely over a debug probe: arguments
//! are staged in target RAM, the halted core is pointed at a ROM entry with
//! a return address that halts it again, and the status word the ROM leaves
//! behind decides success. A small remote procedure call, built out of
//! register writes, memory writes and polling.
//!
//! The debug transport itself is not part of the crate; implement
//! [`CoreInterface`] (and its supertrait [`MemoryInterface`]) on top of
//! whatever performs the raw halted-core accesses.
//!
//! ## Erasing and programming
//!
//! ```no_run
//! use ambiq_loader::CoreInterface;
//! use ambiq_loader::apollo2::Apollo2Flash;
//! use ambiq_loader::flashing::FlashError;
//!
//! fn flash_program(core: &mut impl CoreInterface) -> Result<(), FlashError> {
//!     let mut flash = Apollo2Flash::new(core)?;
//!
//!     // Erase the first page, then program an image into it.
//!     flash.erase(0x0000_0000, 0x2000)?;
//!     flash.write(0x0000_0000, &[0xff; 0x100])?;
//!     Ok(())
//! }
//! ```

pub mod apollo2;
#[warn(missing_docs)]
mod core;
mod error;
#[warn(missing_docs)]
pub mod flashing;
#[warn(missing_docs)]
mod memory;

pub use crate::core::{CoreInterface, CoreStatus, HaltReason, RegisterId};
pub use crate::error::Error;
pub use crate::memory::{InvalidDataLengthError, MemoryInterface, MemoryNotAlignedError};
