//! Generic access to a single target core.

use std::time::Duration;

use crate::error::Error;
use crate::memory::MemoryInterface;

/// The id of a core register as used by the debug transport.
///
/// For Cortex-M targets this is the register selector written to `DCRSR`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct RegisterId(pub u16);

impl RegisterId {
    /// Stack pointer (R13).
    pub const SP: RegisterId = RegisterId(13);
    /// Link register (R14).
    pub const LR: RegisterId = RegisterId(14);
    /// Program counter (R15).
    pub const PC: RegisterId = RegisterId(15);
    /// Program status register.
    pub const XPSR: RegisterId = RegisterId(16);
}

/// The status of a core.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CoreStatus {
    /// The core is currently running.
    Running,
    /// The core is currently halted. This also specifies the reason as a payload.
    Halted(HaltReason),
    /// This is a Cortex-M specific status: the core is currently locked up.
    LockedUp,
    /// The core is currently sleeping.
    Sleeping,
}

impl CoreStatus {
    /// Returns `true` if the core is halted.
    pub fn is_halted(&self) -> bool {
        matches!(self, CoreStatus::Halted(_))
    }
}

/// The reason why a core was halted.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum HaltReason {
    /// A breakpoint was hit.
    Breakpoint,
    /// An exception or fault occurred.
    Exception,
    /// The core was explicitly requested to halt.
    Request,
    /// The transport could not determine the reason.
    Unknown,
}

/// A generic interface to control a single core of a target.
///
/// Implemented by the debug transport underneath (SWD, JTAG, a simulator);
/// everything in this crate is written against this trait.
pub trait CoreInterface: MemoryInterface {
    /// Returns the current status of the core.
    fn status(&mut self) -> Result<CoreStatus, Error>;

    /// Try to halt the core.
    ///
    /// Implementations ensure the core actually stopped and return
    /// [`Error::Timeout`] if it did not do so within `timeout`.
    fn halt(&mut self, timeout: Duration) -> Result<(), Error>;

    /// Continue the core to execute instructions.
    fn run(&mut self) -> Result<(), Error>;

    /// Read the value of a core register.
    fn read_core_reg(&mut self, id: RegisterId) -> Result<u32, Error>;

    /// Write the value of a core register.
    fn write_core_reg(&mut self, id: RegisterId, value: u32) -> Result<(), Error>;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn only_halted_counts_as_halted() {
        assert!(CoreStatus::Halted(HaltReason::Breakpoint).is_halted());
        assert!(CoreStatus::Halted(HaltReason::Request).is_halted());
        assert!(!CoreStatus::Running.is_halted());
        assert!(!CoreStatus::LockedUp.is_halted());
        assert!(!CoreStatus::Sleeping.is_halted());
    }
}
