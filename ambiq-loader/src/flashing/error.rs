#![allow(missing_docs)]

use thiserror::Error;

use crate::core::CoreStatus;
use crate::error;
use crate::memory::{InvalidDataLengthError, MemoryNotAlignedError};

/// Describes any error that happened during a flash operation or in
/// preparation for it.
#[derive(Error, Debug)]
pub enum FlashError {
    #[error("Something during the interaction with the core went wrong")]
    Core(#[from] error::Error),

    #[error("The execution of '{name}' failed with code {error_code}")]
    RoutineCallFailed { name: &'static str, error_code: u32 },

    #[error("The ROM routine '{name}' did not halt the core within the time budget")]
    RoutineTimeout { name: &'static str },

    #[error("Unexpected core status: {status:?}")]
    UnexpectedCoreStatus { status: CoreStatus },

    // Caller bug, not a hardware condition: the calling convention requires
    // exactly one completion marker per vector.
    #[error("A ROM call vector must contain the completion marker exactly once, found it {sentinels} times")]
    InvalidCallVector { sentinels: usize },

    #[error("Refusing to clear staging memory below its base ({address:#010x} < {base:#010x})")]
    ClearOutsideStaging { address: u32, base: u32 },

    #[error("Flash address range {start:#010x}..{end:#010x} is not contained in the device flash")]
    AddressNotInFlash { start: u32, end: u32 },

    #[error("Inconsistent flash geometry: {reason}")]
    InvalidGeometry { reason: &'static str },

    #[error(transparent)]
    NotAligned(#[from] MemoryNotAlignedError),

    #[error(transparent)]
    InvalidDataLength(#[from] InvalidDataLengthError),
}
