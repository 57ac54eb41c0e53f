//! Contract of the low level programmers driving the flash controller.

use crate::{
    address::{PageIndex, Region},
    error::Error,
    event::FlashEvents,
};

/// Memory-mapped view of the flash array.
pub trait FlashArray {
    /// Read the word at the absolute, word aligned `address`
    fn read_word(&self, address: u32) -> u32;
}

impl<T: FlashArray + ?Sized> FlashArray for &T {
    fn read_word(&self, address: u32) -> u32 {
        (**self).read_word(address)
    }
}

#[cfg(any(test, feature = "std"))]
impl<T: FlashArray + ?Sized> FlashArray for std::sync::Arc<T> {
    fn read_word(&self, address: u32) -> u32 {
        (**self).read_word(address)
    }
}

/// The array of the chip the code runs from, read through the system bus.
#[derive(Debug, Default, Clone, Copy)]
pub struct MappedFlash;

impl FlashArray for MappedFlash {
    fn read_word(&self, address: u32) -> u32 {
        // SAFETY: the internal flash is mapped at its physical address and
        // the storage only passes aligned addresses inside its region.
        unsafe { core::ptr::read_volatile(address as *const u32) }
    }
}

/// Issues program and erase commands for one [`Region`].
///
/// Both operations only issue the command: completion, with the controller
/// result, is delivered through `events`, possibly from another context and
/// possibly before the call returns. Arguments are validated before anything
/// reaches the hardware.
#[allow(async_fn_in_trait)]
pub trait FlashProgrammer {
    fn region(&self) -> &Region;

    /// Read the word at the absolute, word aligned `address`
    fn read_word(&self, address: u32) -> u32;

    /// Program `words` starting at the absolute `address`.
    ///
    /// Fails with [`Error::InvalidAddress`] when `address` is not word
    /// aligned or the run leaves the region, [`Error::InvalidLength`] when
    /// `words` is empty.
    fn program(&mut self, address: u32, words: &[u32], events: &FlashEvents) -> Result<(), Error>;

    /// Erase `page_count` pages from `first_page`.
    ///
    /// Fails with [`Error::InvalidLength`] when `page_count` is zero and
    /// [`Error::InvalidAddress`] when the pages leave the region.
    fn erase(&mut self, first_page: PageIndex, page_count: u8, events: &FlashEvents) -> Result<(), Error>;

    /// Make the controller usable, called before every program or erase.
    async fn acquire(&mut self, _events: &FlashEvents) -> Result<(), Error> {
        Ok(())
    }

    /// Undo [`Self::acquire`], called after every program or erase, even failed ones.
    fn release(&mut self) {}
}
