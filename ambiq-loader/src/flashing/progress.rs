use std::time::Duration;

/// A structure to manage progress reporting for boot-ROM calls.
///
/// This struct stores a handler closure which will be called every time an
/// event happens during a flash operation. Such an event can be the start or
/// the return of a ROM routine call, or a periodic report while the routine
/// is still running.
///
/// # Example
///
/// ```
/// use ambiq_loader::flashing::FlashProgress;
///
/// // Print events
/// let progress = FlashProgress::new(|event| println!("Event: {:#?}", event));
/// ```
pub struct FlashProgress {
    handler: Box<dyn Fn(ProgressEvent)>,
}

impl FlashProgress {
    /// Create a new `FlashProgress` structure with a given `handler` to be
    /// called on events.
    pub fn new(handler: impl Fn(ProgressEvent) + 'static) -> Self {
        Self {
            handler: Box::new(handler),
        }
    }

    /// Create a progress sink that discards all events.
    pub fn empty() -> Self {
        Self {
            handler: Box::new(|_| {}),
        }
    }

    /// Emit a progress event.
    fn emit(&self, event: ProgressEvent) {
        (self.handler)(event);
    }

    /// Signalize that a ROM routine was invoked.
    pub(super) fn call_started(&self, name: &'static str) {
        self.emit(ProgressEvent::CallStarted { name });
    }

    /// Signalize that an invoked routine has not returned yet.
    pub(super) fn call_in_progress(&self, name: &'static str, elapsed: Duration) {
        self.emit(ProgressEvent::CallInProgress { name, elapsed });
    }

    /// Signalize that an invoked routine returned successfully.
    pub(super) fn call_returned(&self, name: &'static str, elapsed: Duration) {
        self.emit(ProgressEvent::CallReturned { name, elapsed });
    }

    /// Signalize that an invoked routine failed or timed out.
    pub(super) fn call_failed(&self, name: &'static str) {
        self.emit(ProgressEvent::CallFailed { name });
    }
}

/// Possible events during a flash operation.
///
/// If a call works without problems, the events arrive in the following
/// order:
///
/// * `CallStarted`
/// * `CallInProgress` at a fixed period while the routine runs
/// * `CallReturned`
///
/// If the call fails or times out, `CallFailed` is emitted instead of
/// `CallReturned` and no further events follow for that call.
#[derive(Debug)]
pub enum ProgressEvent {
    /// A ROM routine call was started.
    CallStarted {
        /// Name of the invoked routine.
        name: &'static str,
    },
    /// The invoked routine has been running for `elapsed` without returning
    /// yet.
    CallInProgress {
        /// Name of the invoked routine.
        name: &'static str,
        /// Time since the routine was invoked.
        elapsed: Duration,
    },
    /// The invoked routine returned to the completion address and reported
    /// success.
    CallReturned {
        /// Name of the invoked routine.
        name: &'static str,
        /// Time from invocation to the status check.
        elapsed: Duration,
    },
    /// The invoked routine timed out, left the core in an unexpected state
    /// or reported a failure code.
    CallFailed {
        /// Name of the invoked routine.
        name: &'static str,
    },
}
