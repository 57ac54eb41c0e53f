//! Completion signalling between the hardware event context and the storage.
//!
//! The storage arms the flag of an operation kind before issuing the
//! hardware command, then waits on it. Whatever context receives the
//! controller or radio stack events forwards them to [`FlashEvents::notify`],
//! which stores the result and clears the flag.
//!
//! Only one operation per kind may be outstanding at a time. The storage
//! never issues overlapping commands itself, callers sharing one
//! [`FlashEvents`] between several storages must serialize them.

use core::sync::atomic::{AtomicBool, Ordering};

use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, signal::Signal};

use crate::error::{Error, HardwareError};

type Completion = Signal<CriticalSectionRawMutex, Result<(), HardwareError>>;

/// Hardware notification, tagged by the operation it completes
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashEvent {
    WriteResult(Result<(), HardwareError>),
    EraseResult(Result<(), HardwareError>),
    StackInitialized(Result<(), HardwareError>),
}

/// Operation kinds owning a completion flag
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Write,
    Erase,
    StackInit,
}

struct Flag {
    pending: AtomicBool,
    completion: Completion,
}

impl Flag {
    const fn new() -> Self {
        Self {
            pending: AtomicBool::new(false),
            completion: Signal::new(),
        }
    }
}

/// Completion flags for writes, erases and radio stack start-up.
///
/// Can live in a `static`, the constructor is `const`.
pub struct FlashEvents {
    write: Flag,
    erase: Flag,
    stack: Flag,
}

impl Default for FlashEvents {
    fn default() -> Self {
        Self::new()
    }
}

impl FlashEvents {
    pub const fn new() -> Self {
        Self {
            write: Flag::new(),
            erase: Flag::new(),
            stack: Flag::new(),
        }
    }

    fn flag(&self, kind: OperationKind) -> &Flag {
        match kind {
            OperationKind::Write => &self.write,
            OperationKind::Erase => &self.erase,
            OperationKind::StackInit => &self.stack,
        }
    }

    /// Deliver a hardware notification. Safe to call from any context.
    pub fn notify(&self, event: FlashEvent) {
        let (kind, result) = match event {
            FlashEvent::WriteResult(result) => (OperationKind::Write, result),
            FlashEvent::EraseResult(result) => (OperationKind::Erase, result),
            FlashEvent::StackInitialized(result) => (OperationKind::StackInit, result),
        };
        if result.is_err() {
            warn!("{:?} completed with {:?}", kind, result);
        } else {
            trace!("{:?} completed", kind);
        }
        let flag = self.flag(kind);
        flag.completion.signal(result);
        flag.pending.store(false, Ordering::Release);
    }

    /// Whether an operation of `kind` was issued and not yet notified
    pub fn is_pending(&self, kind: OperationKind) -> bool {
        self.flag(kind).pending.load(Ordering::Acquire)
    }

    /// Mark `kind` as in flight, dropping any stale notification.
    pub(crate) fn arm(&self, kind: OperationKind) {
        let flag = self.flag(kind);
        flag.completion.reset();
        flag.pending.store(true, Ordering::Release);
    }

    /// Undo [`Self::arm`] when the command was rejected before reaching the hardware.
    pub(crate) fn disarm(&self, kind: OperationKind) {
        let flag = self.flag(kind);
        flag.pending.store(false, Ordering::Release);
        flag.completion.reset();
    }

    /// Wait for the notification of the armed `kind`.
    pub(crate) async fn wait(&self, kind: OperationKind) -> Result<(), Error> {
        let result = self.flag(kind).completion.wait().await;
        result.map_err(|code| match kind {
            OperationKind::StackInit => Error::StackInit(code),
            _ => Error::Hardware(code),
        })
    }
}
