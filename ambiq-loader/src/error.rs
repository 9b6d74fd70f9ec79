use thiserror::Error;

use crate::memory::{InvalidDataLengthError, MemoryNotAlignedError};

#[derive(Error, Debug)]
pub enum Error {
    #[error("Timeout occurred during operation.")]
    Timeout,
    #[error(transparent)]
    MemoryNotAligned(#[from] MemoryNotAlignedError),
    #[error(transparent)]
    InvalidDataLength(#[from] InvalidDataLengthError),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
