use embedded_storage_async::nor_flash::{ErrorType, NorFlash, ReadNorFlash};

use crate::{
    address::{PageIndex, Region, NRF52_PAGE_SIZE},
    blocking::FlashStorage,
    error::Error,
    event::FlashEvents,
    programmer::FlashProgrammer,
};

/// Largest request the storage accepts in one call
const MAX_REQUEST: usize = u16::MAX as usize;

/// Async flavour of [`FlashStorage`].
///
/// Writes and erases await the completion notification instead of blocking
/// on it, leaving the executor free to run the task that forwards the
/// controller or radio stack events.
pub struct AsyncFlashStorage<'a, P> {
    inner: FlashStorage<'a, P>,
}

impl<'a, P: FlashProgrammer> AsyncFlashStorage<'a, P> {
    pub fn new(programmer: P, events: &'a FlashEvents) -> Self {
        Self {
            inner: FlashStorage::new(programmer, events),
        }
    }

    pub fn region(&self) -> &Region {
        self.inner.region()
    }

    pub fn start_address(&self) -> u32 {
        self.inner.start_address()
    }

    pub fn end_address(&self) -> u32 {
        self.inner.end_address()
    }

    pub fn size(&self) -> u32 {
        self.inner.size()
    }

    pub fn programmer(&self) -> &P {
        self.inner.programmer()
    }

    /// Back to the blocking storage
    pub fn into_inner(self) -> FlashStorage<'a, P> {
        self.inner
    }

    /// Read `length` bytes at the region relative `offset` into `buffer`
    pub async fn read(&self, offset: u32, buffer: &mut [u8], length: u16) -> Result<(), Error> {
        self.inner.read(offset, buffer, length)
    }

    /// Write `length` bytes of `data` at the region relative `offset`
    pub async fn write(&mut self, offset: u32, data: &[u8], length: u16) -> Result<(), Error> {
        self.inner.write_async(offset, data, length).await
    }

    pub async fn erase_page(&mut self, page: PageIndex) -> Result<(), Error> {
        self.inner.erase_pages_async(page, 1).await
    }

    pub async fn erase_pages(&mut self, first_page: PageIndex, page_count: u8) -> Result<(), Error> {
        self.inner.erase_pages_async(first_page, page_count).await
    }
}

impl<'a, P: FlashProgrammer> From<FlashStorage<'a, P>> for AsyncFlashStorage<'a, P> {
    fn from(inner: FlashStorage<'a, P>) -> Self {
        Self { inner }
    }
}

impl<P: FlashProgrammer> ErrorType for AsyncFlashStorage<'_, P> {
    type Error = Error;
}

impl<P: FlashProgrammer> ReadNorFlash for AsyncFlashStorage<'_, P> {
    const READ_SIZE: usize = 1;

    async fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
        self.inner.check_span(offset, bytes.len())?;
        let mut offset = offset;
        for chunk in bytes.chunks_mut(MAX_REQUEST) {
            self.inner.read(offset, chunk, chunk.len() as u16)?;
            offset += chunk.len() as u32;
        }
        Ok(())
    }

    fn capacity(&self) -> usize {
        self.inner.size() as usize
    }
}

impl<P: FlashProgrammer> NorFlash for AsyncFlashStorage<'_, P> {
    const WRITE_SIZE: usize = 1;
    const ERASE_SIZE: usize = NRF52_PAGE_SIZE as usize;

    async fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
        match self.inner.page_span(from, to)? {
            (_, 0) => Ok(()),
            (first_page, page_count) => self.inner.erase_pages_async(first_page, page_count).await,
        }
    }

    async fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
        self.inner.check_span(offset, bytes.len())?;
        let mut offset = offset;
        for chunk in bytes.chunks(MAX_REQUEST) {
            self.inner.write_async(offset, chunk, chunk.len() as u16).await?;
            offset += chunk.len() as u32;
        }
        Ok(())
    }
}
