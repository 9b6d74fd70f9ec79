//! The boot-ROM call protocol and the flash layout math behind it.
//!
//! [`RomCaller`] is the chip-independent protocol engine: it stages an
//! argument vector in target RAM, points the core at a ROM entry, waits for
//! the return and reads the status word back. [`FlashGeometry`] translates
//! erase requests into the per-instance page ranges the ROM routines take.

mod caller;
mod error;
mod geometry;
mod progress;

pub use caller::{RomCaller, RomRoutine, StagingWindow, BREAKPOINT_WORD, THREAD_MODE_TAG};
pub use error::FlashError;
pub use geometry::{FlashGeometry, PageRange};
pub use progress::{FlashProgress, ProgressEvent};
