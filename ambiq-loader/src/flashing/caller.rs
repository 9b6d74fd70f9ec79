//! The boot-ROM call protocol.
//!
//! A call is a small remote procedure invocation built out of nothing but
//! memory writes, register writes and polling: the arguments are staged as a
//! word vector in target RAM, the core is pointed at the ROM entry with a
//! return address inside the staging window, and the ROM reports back by
//! overwriting the completion slot and returning there, which stops the core
//! under debug.

use std::time::{Duration, Instant};

use crate::core::{CoreInterface, CoreStatus, RegisterId};
use crate::flashing::{FlashError, FlashProgress};

/// Reserved word marking the completion slot of a staged argument vector.
///
/// Its staged address doubles as the call's return address; the ROM
/// overwrites it with the routine's status code before returning.
pub const BREAKPOINT_WORD: u32 = 0xffff_fffe;

/// Trailing thread-mode return word every argument vector ends with.
pub const THREAD_MODE_TAG: u32 = 0xffff_fff9;

/// Value written to xPSR so the core enters the routine in Thumb state.
const XPSR_THUMB: u32 = 1 << 24;

/// Total time budget for a single ROM routine call.
const CALL_TIMEOUT: Duration = Duration::from_millis(3000);

/// Period of the in-progress events emitted while waiting for a call.
const PROGRESS_PERIOD: Duration = Duration::from_millis(150);

/// A named boot-ROM entry point.
///
/// Entry addresses are stored with bit 0 clear; Thumb state is selected
/// through xPSR and the link register instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RomRoutine {
    /// Name of the routine, used in errors and progress events.
    pub name: &'static str,
    /// Address of the routine's first instruction.
    pub entry: u32,
}

/// Layout of the reserved RAM window a ROM call runs out of.
///
/// Arguments are staged upward from `base`; the invoked routine gets
/// `stack_top` as its initial stack pointer, above anything staged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StagingWindow {
    /// First address arguments are staged at.
    pub base: u32,
    /// Initial stack pointer for the invoked routine.
    pub stack_top: u32,
}

/// Addresses produced by staging one argument vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StagedVector {
    /// Address of the completion slot the ROM reports its status to.
    completion: u32,
    /// Highest staged word address; clearing starts here.
    top: u32,
}

/// The registers prepared for a ROM routine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct CallFrame {
    sp: u32,
    lr: u32,
    pc: u32,
    xpsr: u32,
}

impl CallFrame {
    fn read<C: CoreInterface>(core: &mut C) -> Result<Self, FlashError> {
        Ok(CallFrame {
            sp: core.read_core_reg(RegisterId::SP)?,
            lr: core.read_core_reg(RegisterId::LR)?,
            pc: core.read_core_reg(RegisterId::PC)?,
            xpsr: core.read_core_reg(RegisterId::XPSR)?,
        })
    }

    fn write<C: CoreInterface>(&self, core: &mut C) -> Result<(), FlashError> {
        core.write_core_reg(RegisterId::SP, self.sp)?;
        core.write_core_reg(RegisterId::LR, self.lr)?;
        core.write_core_reg(RegisterId::PC, self.pc)?;
        core.write_core_reg(RegisterId::XPSR, self.xpsr)?;
        Ok(())
    }
}

/// Drives boot-ROM routine calls on a halted core.
///
/// One call runs the full stage → invoke → check → clear sequence; the
/// staging window is scrubbed afterwards on every path, so no call leaves
/// its arguments (or flash keys) behind in target RAM.
pub struct RomCaller<'core, C: CoreInterface> {
    core: &'core mut C,
    window: StagingWindow,
    progress: &'core FlashProgress,
    timeout: Duration,
}

impl<'core, C: CoreInterface> RomCaller<'core, C> {
    /// Create a caller staging into `window`.
    pub fn new(core: &'core mut C, window: StagingWindow, progress: &'core FlashProgress) -> Self {
        RomCaller {
            core,
            window,
            progress,
            timeout: CALL_TIMEOUT,
        }
    }

    /// Target memory access between calls, for payload upload.
    pub fn core(&mut self) -> &mut C {
        self.core
    }

    /// Invoke `routine` with the given argument vector and wait for its
    /// completion status.
    ///
    /// The core must be halted. A call that times out leaves the core's
    /// registers and stack wherever the timeout found them; recovery
    /// (usually a reset) is up to the caller.
    pub fn call(&mut self, routine: RomRoutine, vector: &[u32]) -> Result<(), FlashError> {
        let status = self.core.status()?;
        if !status.is_halted() {
            return Err(FlashError::UnexpectedCoreStatus { status });
        }

        let staged = self.stage(vector)?;

        self.progress.call_started(routine.name);
        let started = Instant::now();

        let result = self
            .invoke(routine, staged.completion)
            .and_then(|()| self.wait_for_halt(routine))
            .and_then(|()| self.check_status(routine, staged.completion));

        match &result {
            Ok(()) => self.progress.call_returned(routine.name, started.elapsed()),
            Err(_) => self.progress.call_failed(routine.name),
        }

        // The window is cleared even when the call failed; stale arguments
        // must never leak into the next call.
        match self.clear_staging(staged.top) {
            Ok(()) => result,
            Err(clear_error) => match result {
                Ok(()) => Err(clear_error),
                Err(error) => {
                    tracing::warn!(
                        "Clearing the staging window after a failed call also failed: {clear_error}"
                    );
                    Err(error)
                }
            },
        }
    }

    /// Write the argument vector into the staging window and locate its
    /// completion slot.
    ///
    /// Exactly one element must be [`BREAKPOINT_WORD`]; the calling
    /// convention derives both the return address and the status location
    /// from its staged position.
    fn stage(&mut self, vector: &[u32]) -> Result<StagedVector, FlashError> {
        let mut sentinel = None;
        let mut sentinels = 0;
        for (index, &word) in vector.iter().enumerate() {
            if word == BREAKPOINT_WORD {
                sentinel = Some(index);
                sentinels += 1;
            }
        }
        let index = match (sentinels, sentinel) {
            (1, Some(index)) => index,
            _ => return Err(FlashError::InvalidCallVector { sentinels }),
        };

        self.core.write_32(self.window.base, vector)?;

        let staged = StagedVector {
            completion: self.window.base + 4 * index as u32,
            top: self.window.base + 4 * (vector.len() as u32 - 1),
        };
        tracing::debug!(
            "Staged {} words at {:#010x}, completion slot at {:#010x}",
            vector.len(),
            self.window.base,
            staged.completion
        );
        Ok(staged)
    }

    /// Point the core at `routine` and resume it.
    ///
    /// The register frame is read, modified and written back as a whole;
    /// registers outside the frame stay untouched. The link register gets
    /// the completion address with bit 0 set and xPSR the T bit, so the core
    /// enters and leaves the routine in Thumb state.
    fn invoke(&mut self, routine: RomRoutine, return_address: u32) -> Result<(), FlashError> {
        let mut frame = CallFrame::read(self.core)?;
        tracing::debug!("Core frame before the call: {:08x?}", frame);

        frame.sp = self.window.stack_top;
        frame.lr = return_address | 1;
        frame.pc = routine.entry;
        frame.xpsr = XPSR_THUMB;
        frame.write(self.core)?;

        tracing::debug!("Calling {} at {:#010x}", routine.name, routine.entry);
        self.core.run()?;
        Ok(())
    }

    /// Wait until the resumed core stops again.
    ///
    /// Observing the core halted is the only signal that the routine
    /// returned. A core that locks up fails the call immediately; one that
    /// keeps running past the time budget fails it with a timeout.
    #[tracing::instrument(skip(self))]
    fn wait_for_halt(&mut self, routine: RomRoutine) -> Result<(), FlashError> {
        let start = Instant::now();
        let mut last_report = Duration::ZERO;

        while start.elapsed() < self.timeout {
            match self.core.status()? {
                CoreStatus::Halted(_) => {
                    tracing::debug!("{} returned after {:?}", routine.name, start.elapsed());
                    return Ok(());
                }
                CoreStatus::LockedUp => {
                    return Err(FlashError::UnexpectedCoreStatus {
                        status: CoreStatus::LockedUp,
                    });
                }
                // Still running; keep polling.
                _ => {}
            }

            let elapsed = start.elapsed();
            if elapsed - last_report >= PROGRESS_PERIOD {
                last_report = elapsed;
                self.progress.call_in_progress(routine.name, elapsed);
            }

            std::thread::sleep(Duration::from_millis(1));
        }

        Err(FlashError::RoutineTimeout { name: routine.name })
    }

    /// Read the routine's status word from the completion slot.
    ///
    /// Zero means success; anything else is the failure code the ROM
    /// reported. The read has no side effect.
    fn check_status(&mut self, routine: RomRoutine, completion: u32) -> Result<(), FlashError> {
        let status = self.core.read_word_32(completion)?;
        if status != 0 {
            return Err(FlashError::RoutineCallFailed {
                name: routine.name,
                error_code: status,
            });
        }
        Ok(())
    }

    /// Scrub the staging window, walking backward from `from` down to the
    /// window base.
    fn clear_staging(&mut self, from: u32) -> Result<(), FlashError> {
        if from < self.window.base {
            return Err(FlashError::ClearOutsideStaging {
                address: from,
                base: self.window.base,
            });
        }

        let mut address = from;
        loop {
            self.core.write_word_32(address, 0)?;
            if address == self.window.base {
                break;
            }
            address -= 4;
        }
        Ok(())
    }
}
