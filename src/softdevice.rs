//! Programmer going through the radio stack's flash driver.

use crate::{
    address::{PageIndex, Region},
    error::{Error, HardwareError},
    event::FlashEvents,
    guard::{EventLoop, StackGuard},
    programmer::{FlashArray, FlashProgrammer},
};

/// The radio stack sharing the flash controller.
///
/// Flash requests are accepted and return immediately, the outcome is
/// delivered later by [`Self::process_events`] as a
/// [`FlashEvent`](crate::event::FlashEvent).
pub trait RadioStack: FlashArray {
    /// Request stack initialization, completion is reported as `StackInitialized`.
    fn init(&self) -> Result<(), HardwareError>;

    fn shutdown(&self);

    /// The stack is enabled
    fn is_active(&self) -> bool;

    /// Initialization completed successfully
    fn has_initialized(&self) -> bool;

    /// Dispatch pending stack events, forwarding flash and init results to `events`.
    fn process_events(&self, events: &FlashEvents);

    /// Request programming `words` at the absolute `address`.
    fn flash_write(&self, address: u32, words: &[u32]) -> Result<(), HardwareError>;

    /// Request erasing `page_count` pages from the absolute `page_address`.
    fn flash_erase(&self, page_address: u32, page_count: u8) -> Result<(), HardwareError>;
}

impl<T: RadioStack + ?Sized> RadioStack for &T {
    fn init(&self) -> Result<(), HardwareError> {
        (**self).init()
    }
    fn shutdown(&self) {
        (**self).shutdown()
    }
    fn is_active(&self) -> bool {
        (**self).is_active()
    }
    fn has_initialized(&self) -> bool {
        (**self).has_initialized()
    }
    fn process_events(&self, events: &FlashEvents) {
        (**self).process_events(events)
    }
    fn flash_write(&self, address: u32, words: &[u32]) -> Result<(), HardwareError> {
        (**self).flash_write(address, words)
    }
    fn flash_erase(&self, page_address: u32, page_count: u8) -> Result<(), HardwareError> {
        (**self).flash_erase(page_address, page_count)
    }
}

#[cfg(any(test, feature = "std"))]
impl<T: RadioStack + ?Sized> RadioStack for std::sync::Arc<T> {
    fn init(&self) -> Result<(), HardwareError> {
        (**self).init()
    }
    fn shutdown(&self) {
        (**self).shutdown()
    }
    fn is_active(&self) -> bool {
        (**self).is_active()
    }
    fn has_initialized(&self) -> bool {
        (**self).has_initialized()
    }
    fn process_events(&self, events: &FlashEvents) {
        (**self).process_events(events)
    }
    fn flash_write(&self, address: u32, words: &[u32]) -> Result<(), HardwareError> {
        (**self).flash_write(address, words)
    }
    fn flash_erase(&self, page_address: u32, page_count: u8) -> Result<(), HardwareError> {
        (**self).flash_erase(page_address, page_count)
    }
}

/// Programmer for builds with a radio stack, the stack is started on demand
/// around each operation by a [`StackGuard`].
pub struct SoftDeviceProgrammer<S, L> {
    stack: S,
    guard: StackGuard<L>,
    region: Region,
}

impl<S: RadioStack, L: EventLoop> SoftDeviceProgrammer<S, L> {
    pub fn new(stack: S, event_loop: L, region: Region) -> Self {
        Self {
            stack,
            guard: StackGuard::new(event_loop),
            region,
        }
    }

    pub fn stack(&self) -> &S {
        &self.stack
    }

    pub fn guard(&self) -> &StackGuard<L> {
        &self.guard
    }
}

impl<S: RadioStack, L: EventLoop> FlashProgrammer for SoftDeviceProgrammer<S, L> {
    fn region(&self) -> &Region {
        &self.region
    }

    fn read_word(&self, address: u32) -> u32 {
        self.stack.read_word(address)
    }

    fn program(&mut self, address: u32, words: &[u32], _events: &FlashEvents) -> Result<(), Error> {
        self.region.check_program(address, words.len())?;
        trace!("stack write {=u32:#x} ({=usize} words)", address, words.len());
        self.stack.flash_write(address, words).map_err(Error::Hardware)
    }

    fn erase(&mut self, first_page: PageIndex, page_count: u8, _events: &FlashEvents) -> Result<(), Error> {
        let address = self.region.check_erase(first_page, page_count)?;
        debug!("stack erase {=u32:#x} ({=u8} pages)", address, page_count);
        self.stack.flash_erase(address, page_count).map_err(Error::Hardware)
    }

    async fn acquire(&mut self, events: &FlashEvents) -> Result<(), Error> {
        self.guard.ensure_active(&self.stack, events).await
    }

    fn release(&mut self) {
        self.guard.release(&self.stack);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use embassy_futures::block_on;

    use super::*;
    use crate::{
        address::NRF52_PAGE_SIZE,
        event::OperationKind,
        guard::ThreadEventLoop,
        sim::SimRadioStack,
    };

    type Programmer = SoftDeviceProgrammer<Arc<SimRadioStack>, ThreadEventLoop<SimRadioStack>>;

    fn setup() -> (Programmer, Arc<FlashEvents>) {
        let region = Region::new(0x7_0000, NRF52_PAGE_SIZE, 2).unwrap();
        let stack = Arc::new(SimRadioStack::new(region));
        let events = Arc::new(FlashEvents::new());
        let event_loop = ThreadEventLoop::new(stack.clone(), events.clone());
        (SoftDeviceProgrammer::new(stack, event_loop, region), events)
    }

    #[test]
    fn program_completes_on_event_thread() {
        let (mut programmer, events) = setup();

        block_on(programmer.acquire(&events)).unwrap();
        events.arm(OperationKind::Write);
        programmer.program(0x7_0010, &[0xA5A5_0000], &events).unwrap();
        block_on(events.wait(OperationKind::Write)).unwrap();
        programmer.release();

        assert_eq!(programmer.read_word(0x7_0010), 0xA5A5_0000);
        assert!(!programmer.stack().is_active());
        assert!(!programmer.guard().activated_by_guard());
    }

    #[test]
    fn stack_must_be_running() {
        let (mut programmer, events) = setup();
        assert_eq!(
            programmer.program(0x7_0000, &[0], &events),
            Err(Error::Hardware(HardwareError::INVALID_STATE))
        );
    }

    #[test]
    fn rejects_before_reaching_stack() {
        let (mut programmer, events) = setup();
        assert_eq!(programmer.program(0x7_0002, &[0], &events), Err(Error::InvalidAddress));
        assert_eq!(programmer.erase(PageIndex(2), 1, &events), Err(Error::InvalidAddress));
        assert_eq!(programmer.stack().flash_requests(), 0);
    }
}
