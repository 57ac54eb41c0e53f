//! Keeps the radio stack running while the shared flash controller is in use.
//!
//! With a radio stack present, flash commands go through the stack, which
//! reports completion from its event dispatch. When the application has not
//! started the stack, the guard starts it on demand, together with a
//! background context dispatching its events, and tears both down afterwards.

use crate::{
    error::{Error, HardwareError},
    event::{FlashEvents, OperationKind},
    softdevice::RadioStack,
};

/// Background context running the radio stack's event dispatch.
pub trait EventLoop {
    /// Start dispatching stack events until [`Self::stop`] is called.
    fn start(&mut self) -> Result<(), HardwareError>;

    /// Stop dispatching, wait for the context to finish and drop its queue.
    fn stop(&mut self);
}

/// Activates the radio stack around flash operations.
///
/// [`Self::ensure_active`] and [`Self::release`] must be paired around every
/// operation. The guard is not reentrant: a nested `ensure_active` sees the
/// stack running and returns immediately, the outer `release` still stops it.
pub struct StackGuard<L> {
    event_loop: L,
    activated_by_guard: bool,
}

impl<L: EventLoop> StackGuard<L> {
    pub fn new(event_loop: L) -> Self {
        Self {
            event_loop,
            activated_by_guard: false,
        }
    }

    /// The stack is running because this guard started it
    pub fn activated_by_guard(&self) -> bool {
        self.activated_by_guard
    }

    /// Start the stack unless it is already running.
    ///
    /// A stack started elsewhere is left alone, its owner must forward the
    /// stack events to the same [`FlashEvents`]. Blocks until initialization
    /// completed, fails with [`Error::StackInit`].
    pub async fn ensure_active<S: RadioStack>(&mut self, stack: &S, events: &FlashEvents) -> Result<(), Error> {
        if stack.is_active() {
            trace!("radio stack already active");
            return Ok(());
        }

        debug!("starting radio stack for flash access");
        events.arm(OperationKind::StackInit);
        self.event_loop.start().map_err(|code| {
            events.disarm(OperationKind::StackInit);
            Error::StackInit(code)
        })?;

        if let Err(code) = stack.init() {
            error!("radio stack init rejected: {:?}", code);
            events.disarm(OperationKind::StackInit);
            self.event_loop.stop();
            return Err(Error::StackInit(code));
        }
        self.activated_by_guard = true;

        events.wait(OperationKind::StackInit).await
    }

    /// Stop the stack if [`Self::ensure_active`] started it.
    ///
    /// Also shuts down a stack whose initialization is still in flight,
    /// as left behind by an operation dropped while waiting for it.
    pub fn release<S: RadioStack>(&mut self, stack: &S) {
        if !self.activated_by_guard {
            return;
        }

        debug!("stopping radio stack");
        if stack.is_active() {
            stack.shutdown();
        }
        self.event_loop.stop();
        self.activated_by_guard = false;
    }
}

#[cfg(any(test, feature = "std"))]
pub use thread::ThreadEventLoop;

#[cfg(any(test, feature = "std"))]
mod thread {
    use std::{
        sync::{
            atomic::{AtomicBool, Ordering},
            Arc,
        },
        thread::{self, JoinHandle},
        time::Duration,
    };

    use super::EventLoop;
    use crate::{error::HardwareError, event::FlashEvents, softdevice::RadioStack};

    /// Sleep between two dispatch rounds
    const DISPATCH_INTERVAL: Duration = Duration::from_millis(1);

    /// Dispatches stack events on a dedicated OS thread.
    ///
    /// The stack offers no wake-up, the thread dispatches once per
    /// millisecond and is unparked early when stopped.
    pub struct ThreadEventLoop<S> {
        stack: Arc<S>,
        events: Arc<FlashEvents>,
        stop: Arc<AtomicBool>,
        worker: Option<JoinHandle<()>>,
    }

    impl<S> ThreadEventLoop<S> {
        pub fn new(stack: Arc<S>, events: Arc<FlashEvents>) -> Self {
            Self {
                stack,
                events,
                stop: Arc::new(AtomicBool::new(false)),
                worker: None,
            }
        }

        pub fn is_running(&self) -> bool {
            self.worker.is_some()
        }

        fn join(&mut self) {
            self.stop.store(true, Ordering::Release);
            if let Some(worker) = self.worker.take() {
                worker.thread().unpark();
                let _ = worker.join();
            }
        }
    }

    impl<S: RadioStack + Send + Sync + 'static> EventLoop for ThreadEventLoop<S> {
        fn start(&mut self) -> Result<(), HardwareError> {
            if self.worker.is_some() {
                return Ok(());
            }
            self.stop.store(false, Ordering::Release);

            let stack = self.stack.clone();
            let events = self.events.clone();
            let stop = self.stop.clone();
            let worker = thread::Builder::new()
                .name("radio-events".into())
                .spawn(move || {
                    while !stop.load(Ordering::Acquire) {
                        stack.process_events(&events);
                        thread::park_timeout(DISPATCH_INTERVAL);
                    }
                })
                .map_err(|_| HardwareError::NO_MEM)?;
            self.worker = Some(worker);
            Ok(())
        }

        fn stop(&mut self) {
            self.join();
        }
    }

    impl<S> Drop for ThreadEventLoop<S> {
        fn drop(&mut self) {
            self.join();
        }
    }
}
