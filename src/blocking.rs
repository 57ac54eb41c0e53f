use embassy_futures::block_on;

use crate::{
    address::{PageIndex, Region, WordWindow},
    codec::{self, WORD_SIZE},
    error::Error,
    event::{FlashEvents, OperationKind},
    programmer::FlashProgrammer,
    ERASED,
};

/// Words converted and programmed per hardware command
pub const CHUNK_WORDS: usize = 64;
const CHUNK_BYTES: usize = CHUNK_WORDS * WORD_SIZE;

/// Byte addressable storage on a flash region.
///
/// Reads are plain memory reads. Writes are write-once: every target byte
/// must still be erased (`0xFF`), otherwise the write fails with
/// [`Error::NotErased`] and nothing is programmed. Writes and erases block
/// until the completion notification arrives through the [`FlashEvents`],
/// polling it in a busy loop (`embassy_futures::block_on`). Use
/// [`AsyncFlashStorage`](crate::AsyncFlashStorage) to wait without spinning.
///
/// One call at a time: the storage relies on a single outstanding write and
/// a single outstanding erase.
pub struct FlashStorage<'a, P> {
    programmer: P,
    events: &'a FlashEvents,
}

impl<'a, P: FlashProgrammer> FlashStorage<'a, P> {
    /// Create a new instance over `programmer`'s region.
    ///
    /// `events` must receive the notifications of the programmer's backend.
    pub fn new(programmer: P, events: &'a FlashEvents) -> Self {
        let region = programmer.region();
        info!(
            "flash storage {=u32:#x}..{=u32:#x}, {=u8} pages",
            region.start_address(),
            region.end_address(),
            region.page_count()
        );
        Self { programmer, events }
    }

    pub fn region(&self) -> &Region {
        self.programmer.region()
    }

    /// Absolute address of the first byte of the region
    pub fn start_address(&self) -> u32 {
        self.region().start_address()
    }

    /// Absolute address one past the last byte of the region
    pub fn end_address(&self) -> u32 {
        self.region().end_address()
    }

    pub fn size(&self) -> u32 {
        self.region().size()
    }

    pub fn page_size(&self) -> u32 {
        self.region().page_size()
    }

    pub fn page_count(&self) -> u8 {
        self.region().page_count()
    }

    pub fn events(&self) -> &'a FlashEvents {
        self.events
    }

    pub fn programmer(&self) -> &P {
        &self.programmer
    }

    pub fn into_inner(self) -> P {
        self.programmer
    }

    /// Read `length` bytes at the region relative `offset` into `buffer`
    pub fn read(&self, offset: u32, buffer: &mut [u8], length: u16) -> Result<(), Error> {
        let length = check_length(buffer.len(), length)?;
        let window = WordWindow::new(self.region(), offset, length)?;
        let requested = window.requested();
        let out = &mut buffer[..length];

        self.for_each_chunk(&window, |start, bytes| {
            let (lo, hi) = overlap(&requested, start, bytes.len());
            if lo < hi {
                out[lo - requested.start..hi - requested.start].copy_from_slice(&bytes[lo - start..hi - start]);
            }
            Ok(())
        })
    }

    /// Write `length` bytes of `data` at the region relative `offset`
    pub fn write(&mut self, offset: u32, data: &[u8], length: u16) -> Result<(), Error> {
        block_on(self.write_async(offset, data, length))
    }

    /// Erase one page
    pub fn erase_page(&mut self, page: PageIndex) -> Result<(), Error> {
        self.erase_pages(page, 1)
    }

    /// Erase `page_count` pages from `first_page`
    pub fn erase_pages(&mut self, first_page: PageIndex, page_count: u8) -> Result<(), Error> {
        block_on(self.erase_pages_async(first_page, page_count))
    }

    pub(crate) async fn write_async(&mut self, offset: u32, data: &[u8], length: u16) -> Result<(), Error> {
        let length = check_length(data.len(), length)?;
        let window = WordWindow::new(self.region(), offset, length)?;
        trace!(
            "write {=u32:#x}, {=usize} bytes (aligned {=u32:#x}, {=usize} bytes)",
            offset,
            length,
            window.aligned_offset,
            window.aligned_length
        );

        self.check_erased(&window)?;

        let base = self.start_address() + window.aligned_offset;
        let mut session = Session::open(&mut self.programmer, self.events).await?;
        let result = session.program_window(base, &window, &data[..length]).await;
        drop(session);
        result
    }

    pub(crate) async fn erase_pages_async(&mut self, first_page: PageIndex, page_count: u8) -> Result<(), Error> {
        if first_page.0 >= self.page_count() {
            return Err(Error::OutOfRange);
        }
        self.region().check_erase(first_page, page_count)?;
        debug!("erase {=u8} pages from {=u8}", page_count, first_page.0);

        let mut session = Session::open(&mut self.programmer, self.events).await?;
        let result = session.erase(first_page, page_count).await;
        drop(session);
        result
    }

    /// Pages covered by the region relative range `from..to`, both ends page aligned.
    pub(crate) fn page_span(&self, from: u32, to: u32) -> Result<(PageIndex, u8), Error> {
        if from > to || to > self.size() {
            return Err(Error::OutOfRange);
        }
        let page_size = self.page_size();
        if from % page_size != 0 || to % page_size != 0 {
            return Err(Error::InvalidAddress);
        }
        Ok((PageIndex((from / page_size) as u8), ((to - from) / page_size) as u8))
    }

    /// Check that `length` bytes at `offset` stay inside the region
    pub(crate) fn check_span(&self, offset: u32, length: usize) -> Result<(), Error> {
        if offset as u64 + length as u64 > self.size() as u64 {
            return Err(Error::OutOfRange);
        }
        Ok(())
    }

    fn check_erased(&self, window: &WordWindow) -> Result<(), Error> {
        let requested = window.requested();
        self.for_each_chunk(window, |start, bytes| {
            let (lo, hi) = overlap(&requested, start, bytes.len());
            if lo < hi && bytes[lo - start..hi - start].iter().any(|&b| b != ERASED) {
                warn!("flash not erased in {=usize}..{=usize}", lo, hi);
                return Err(Error::NotErased);
            }
            Ok(())
        })
    }

    /// Feed the aligned window to `f` chunk by chunk, with the offset of the chunk in the window.
    fn for_each_chunk<F>(&self, window: &WordWindow, mut f: F) -> Result<(), Error>
    where
        F: FnMut(usize, &[u8]) -> Result<(), Error>,
    {
        let base = self.start_address() + window.aligned_offset;
        let mut words = [0u32; CHUNK_WORDS];
        let mut bytes = [0u8; CHUNK_BYTES];

        let mut start = 0;
        while start < window.aligned_length {
            let len = CHUNK_BYTES.min(window.aligned_length - start);
            for (i, word) in words[..len / WORD_SIZE].iter_mut().enumerate() {
                *word = self.programmer.read_word(base + (start + i * WORD_SIZE) as u32);
            }
            codec::words_to_bytes(&words, len, &mut bytes)?;
            f(start, &bytes[..len])?;
            start += len;
        }
        Ok(())
    }
}

/// Controller access between `acquire` and `release`.
///
/// Released on drop, so an operation that fails, or whose future is
/// dropped while waiting, still stops a radio stack started for it.
struct Session<'s, P: FlashProgrammer> {
    programmer: &'s mut P,
    events: &'s FlashEvents,
}

impl<'s, P: FlashProgrammer> Session<'s, P> {
    async fn open(programmer: &'s mut P, events: &'s FlashEvents) -> Result<Self, Error> {
        let mut session = Self { programmer, events };
        session.programmer.acquire(events).await?;
        Ok(session)
    }

    async fn erase(&mut self, first_page: PageIndex, page_count: u8) -> Result<(), Error> {
        self.events.arm(OperationKind::Erase);
        if let Err(e) = self.programmer.erase(first_page, page_count, self.events) {
            self.events.disarm(OperationKind::Erase);
            return Err(e);
        }
        self.events.wait(OperationKind::Erase).await
    }

    /// Program the window at the absolute `base`, padding bytes stay erased.
    async fn program_window(&mut self, base: u32, window: &WordWindow, data: &[u8]) -> Result<(), Error> {
        let requested = window.requested();
        let mut scratch = [ERASED; CHUNK_BYTES];
        let mut words = [0u32; CHUNK_WORDS];

        let mut start = 0;
        while start < window.aligned_length {
            let len = CHUNK_BYTES.min(window.aligned_length - start);
            let bytes = &mut scratch[..len];
            bytes.fill(ERASED);
            let (lo, hi) = overlap(&requested, start, len);
            if lo < hi {
                bytes[lo - start..hi - start].copy_from_slice(&data[lo - requested.start..hi - requested.start]);
            }
            codec::bytes_to_words(bytes, len, &mut words)?;

            let address = base + start as u32;
            self.events.arm(OperationKind::Write);
            if let Err(e) = self.programmer.program(address, &words[..len / WORD_SIZE], self.events) {
                self.events.disarm(OperationKind::Write);
                return Err(e);
            }
            self.events.wait(OperationKind::Write).await?;

            start += len;
        }
        Ok(())
    }
}

impl<P: FlashProgrammer> Drop for Session<'_, P> {
    fn drop(&mut self) {
        self.programmer.release();
    }
}

fn check_length(capacity: usize, length: u16) -> Result<usize, Error> {
    let length = length as usize;
    if length == 0 || capacity < length {
        return Err(Error::InvalidArgument);
    }
    Ok(length)
}

/// Intersection of `requested` with the chunk `[start, start + len)`, as window positions
fn overlap(requested: &core::ops::Range<usize>, start: usize, len: usize) -> (usize, usize) {
    (requested.start.max(start), requested.end.min(start + len))
}

/// Implementation of the `NorFlash` traits of the `embedded_storage` crate. Offsets are relative to
/// the region start, erases must cover whole pages.
mod es {
    use super::*;
    use crate::address::NRF52_PAGE_SIZE;
    use embedded_storage::nor_flash::{
        check_erase, check_read, check_write, ErrorType, NorFlash, NorFlashError, NorFlashErrorKind,
        ReadNorFlash,
    };

    /// Largest request the storage accepts in one call
    const MAX_REQUEST: usize = u16::MAX as usize;

    impl From<NorFlashErrorKind> for Error {
        fn from(e: NorFlashErrorKind) -> Self {
            match e {
                NorFlashErrorKind::NotAligned => Error::InvalidAddress,
                NorFlashErrorKind::OutOfBounds => Error::OutOfRange,
                _ => Error::InvalidArgument,
            }
        }
    }

    impl NorFlashError for Error {
        fn kind(&self) -> NorFlashErrorKind {
            match self {
                Error::OutOfRange => NorFlashErrorKind::OutOfBounds,
                Error::InvalidAddress => NorFlashErrorKind::NotAligned,
                _ => NorFlashErrorKind::Other,
            }
        }
    }

    impl<P: FlashProgrammer> ErrorType for FlashStorage<'_, P> {
        type Error = Error;
    }

    impl<P: FlashProgrammer> ReadNorFlash for FlashStorage<'_, P> {
        const READ_SIZE: usize = 1;

        fn read(&mut self, offset: u32, bytes: &mut [u8]) -> Result<(), Self::Error> {
            check_read(self, offset, bytes.len())?;
            let mut offset = offset;
            for chunk in bytes.chunks_mut(MAX_REQUEST) {
                FlashStorage::read(self, offset, chunk, chunk.len() as u16)?;
                offset += chunk.len() as u32;
            }
            Ok(())
        }

        fn capacity(&self) -> usize {
            self.size() as usize
        }
    }

    /// Writes are checked: programming over data that was not erased fails
    /// with [`Error::NotErased`], hence no `MultiwriteNorFlash`.
    impl<P: FlashProgrammer> NorFlash for FlashStorage<'_, P> {
        const WRITE_SIZE: usize = 1;
        const ERASE_SIZE: usize = NRF52_PAGE_SIZE as usize;

        fn erase(&mut self, from: u32, to: u32) -> Result<(), Self::Error> {
            check_erase(self, from, to)?;
            match self.page_span(from, to)? {
                (_, 0) => Ok(()),
                (first_page, page_count) => self.erase_pages(first_page, page_count),
            }
        }

        fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Self::Error> {
            check_write(self, offset, bytes.len())?;
            let mut offset = offset;
            for chunk in bytes.chunks(MAX_REQUEST) {
                FlashStorage::write(self, offset, chunk, chunk.len() as u16)?;
                offset += chunk.len() as u32;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use embedded_storage::nor_flash::{NorFlash, NorFlashError, NorFlashErrorKind, ReadNorFlash};

    use super::*;
    use crate::{
        address::NRF52_PAGE_SIZE,
        direct::DirectProgrammer,
        error::HardwareError,
        guard::{EventLoop, ThreadEventLoop},
        sim::{SimNvmc, SimRadioStack},
        softdevice::{RadioStack, SoftDeviceProgrammer},
    };

    const START: u32 = 0x7_0000;

    const DATA: [u8; 16] = [
        0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0xF6, 0x07, 0x18, 0x29, 0x3A, 0x4B, 0x5C, 0x6D, 0x7E, 0x8F, 0x90,
    ];

    type DirectStorage<'a> = FlashStorage<'a, DirectProgrammer<SimNvmc>>;
    type StackStorage<'a> =
        FlashStorage<'a, SoftDeviceProgrammer<Arc<SimRadioStack>, ThreadEventLoop<SimRadioStack>>>;

    fn region(pages: u8) -> Region {
        Region::new(START, NRF52_PAGE_SIZE, pages).unwrap()
    }

    fn direct(events: &FlashEvents, pages: u8) -> DirectStorage<'_> {
        let region = region(pages);
        FlashStorage::new(DirectProgrammer::new(SimNvmc::new(region), region), events)
    }

    fn stack_backed(events: &Arc<FlashEvents>, pages: u8) -> (StackStorage<'_>, Arc<SimRadioStack>) {
        let region = region(pages);
        let stack = Arc::new(SimRadioStack::new(region));
        let event_loop = ThreadEventLoop::new(stack.clone(), events.clone());
        let programmer = SoftDeviceProgrammer::new(stack.clone(), event_loop, region);
        (FlashStorage::new(programmer, events), stack)
    }

    fn nvmc<'s>(storage: &'s DirectStorage<'_>) -> &'s SimNvmc {
        storage.programmer().nvmc()
    }

    #[test]
    fn bounds() {
        let events = FlashEvents::new();
        let storage = direct(&events, 4);
        assert_eq!(storage.start_address(), START);
        assert_eq!(storage.end_address(), START + 4 * NRF52_PAGE_SIZE);
        assert_eq!(storage.end_address() - storage.start_address(), storage.size());
    }

    #[test]
    fn write_read_round_trip() {
        let events = FlashEvents::new();
        let mut storage = direct(&events, 4);

        let mut offset = 0;
        for length in 1..=DATA.len() {
            storage.write(offset, &DATA, length as u16).unwrap();
            let mut buf = [0u8; 16];
            storage.read(offset, &mut buf, length as u16).unwrap();
            assert_eq!(&buf[..length], &DATA[..length]);
            offset += length as u32 + 3;
        }
    }

    #[test]
    fn write_twice_without_erase() {
        let events = FlashEvents::new();
        let mut storage = direct(&events, 1);

        storage.write(6, &[0x00, 0x11], 2).unwrap();
        let writes = nvmc(&storage).word_writes();

        assert_eq!(storage.write(7, &[0x22], 1), Err(Error::NotErased));
        assert_eq!(storage.write(0, &DATA, 16), Err(Error::NotErased));
        assert_eq!(nvmc(&storage).word_writes(), writes);

        let mut buf = [0u8; 4];
        storage.read(5, &mut buf, 4).unwrap();
        assert_eq!(buf, [0xFF, 0x00, 0x11, 0xFF]);
    }

    #[test]
    fn write_after_erase() {
        let events = FlashEvents::new();
        let mut storage = direct(&events, 1);

        storage.write(0, &[1, 2, 3], 3).unwrap();
        storage.erase_page(PageIndex(0)).unwrap();
        storage.write(0, &[4, 5, 6], 3).unwrap();

        let mut buf = [0u8; 3];
        storage.read(0, &mut buf, 3).unwrap();
        assert_eq!(buf, [4, 5, 6]);
    }

    #[test]
    fn write_above_end_address() {
        let events = FlashEvents::new();
        let mut storage = direct(&events, 2);
        let location = storage.end_address() - storage.start_address();

        assert_eq!(storage.write(location, &[0xEA], 1), Err(Error::OutOfRange));
        for k in 1..4u32 {
            for length in (k as u16 + 1)..=8 {
                assert_eq!(storage.write(location - k, &DATA, length), Err(Error::OutOfRange));
            }
        }
        assert_eq!(nvmc(&storage).word_writes(), 0);

        let mut buf = [0u8; 4];
        assert_eq!(storage.read(location, &mut buf, 1), Err(Error::OutOfRange));
        storage.read(location - 4, &mut buf, 4).unwrap();
        assert_eq!(buf, [0xFF; 4]);
    }

    #[test]
    fn last_bytes_of_region() {
        let events = FlashEvents::new();
        let mut storage = direct(&events, 1);
        let size = storage.size();

        storage.write(size - 3, &[7, 8, 9], 3).unwrap();
        let mut buf = [0u8; 3];
        storage.read(size - 3, &mut buf, 3).unwrap();
        assert_eq!(buf, [7, 8, 9]);
    }

    #[test]
    fn invalid_arguments() {
        let events = FlashEvents::new();
        let mut storage = direct(&events, 1);
        let mut buf = [0u8; 4];

        assert_eq!(storage.read(0, &mut buf, 0), Err(Error::InvalidArgument));
        assert_eq!(storage.read(0, &mut buf, 5), Err(Error::InvalidArgument));
        assert_eq!(storage.write(0, &DATA, 0), Err(Error::InvalidArgument));
        assert_eq!(storage.write(0, &DATA[..2], 3), Err(Error::InvalidArgument));
        assert_eq!(nvmc(&storage).word_writes(), 0);
    }

    #[test]
    fn write_subsequent_bytes() {
        let events = FlashEvents::new();
        let mut storage = direct(&events, 1);
        let mut expected = vec![0xFFu8; 512];

        let mut location = 0usize;
        for index in 0..4 {
            for number in 1..(16 - index) {
                storage
                    .write((location + index) as u32, &DATA[index..], number as u16)
                    .unwrap();
                expected[location + index..location + index + number].copy_from_slice(&DATA[index..index + number]);

                let mut read = [0u8; 16];
                storage.read(location as u32, &mut read, 16).unwrap();
                assert_eq!(&read[index..index + number], &DATA[index..index + number]);
                location += number;
            }
        }

        let mut all = vec![0u8; expected.len()];
        storage.read(0, &mut all, expected.len() as u16).unwrap();
        assert_eq!(all, expected);
        assert_eq!(nvmc(&storage).contents(0, expected.len()), expected);
    }

    #[test]
    fn write_over_page_border() {
        let events = FlashEvents::new();
        let mut storage = direct(&events, 2);
        let location = NRF52_PAGE_SIZE - 8;

        storage.write(location, &DATA, 16).unwrap();
        let mut read = [0u8; 16];
        storage.read(location, &mut read, 16).unwrap();
        assert_eq!(read, DATA);
    }

    #[test]
    fn write_big_buffer() {
        let events = FlashEvents::new();
        let mut storage = direct(&events, 3);
        let length: u16 = 0x280;
        let location = 0x2000 - (length as u32 >> 1) + 1;
        let data: Vec<u8> = (0..length).map(|i| i as u8).collect();

        storage.write(location, &data, length).unwrap();
        let mut read = vec![0u8; length as usize];
        storage.read(location, &mut read, length).unwrap();
        assert_eq!(read, data);

        let mut edges = [0u8; 2];
        storage.read(location - 1, &mut edges[..1], 1).unwrap();
        storage.read(location + length as u32, &mut edges[1..], 1).unwrap();
        assert_eq!(edges, [0xFF, 0xFF]);
    }

    #[test]
    fn erase_pages() {
        let events = FlashEvents::new();
        let mut storage = direct(&events, 4);
        let page_size = storage.page_size();

        for page in 0..4u32 {
            let address = page * page_size + (page * 0x3A7) % page_size;
            storage.write(address, &[0x5A], 1).unwrap();
        }

        storage.erase_page(PageIndex(1)).unwrap();
        let mut page = vec![0u8; page_size as usize];
        storage.read(page_size, &mut page, page_size as u16).unwrap();
        assert!(page.iter().all(|&b| b == 0xFF));

        for other in [0u32, 2, 3] {
            let mut byte = [0u8];
            storage.read(other * page_size + (other * 0x3A7) % page_size, &mut byte, 1).unwrap();
            assert_eq!(byte, [0x5A]);
        }

        storage.erase_pages(PageIndex(2), 2).unwrap();
        assert_eq!(nvmc(&storage).contents(2 * page_size, 2 * page_size as usize), vec![0xFF; 2 * page_size as usize]);
        assert_eq!(nvmc(&storage).contents(0, 1), vec![0x5A]);
    }

    #[test]
    fn erase_out_of_range() {
        let events = FlashEvents::new();
        let mut storage = direct(&events, 4);

        assert_eq!(storage.erase_page(PageIndex(4)), Err(Error::OutOfRange));
        assert_eq!(storage.erase_pages(PageIndex(1), 0), Err(Error::InvalidLength));
        assert_eq!(storage.erase_pages(PageIndex(2), 3), Err(Error::InvalidAddress));
        assert_eq!(nvmc(&storage).page_erases(), 0);
        assert!(!events.is_pending(OperationKind::Erase));
    }

    #[test]
    fn stack_is_started_per_operation() {
        let events = Arc::new(FlashEvents::new());
        let (mut storage, stack) = stack_backed(&events, 2);

        storage.write(0xFFA, &DATA, 16).unwrap();
        assert!(!stack.is_active());
        assert!(!storage.programmer().guard().activated_by_guard());

        let mut read = [0u8; 16];
        storage.read(0xFFA, &mut read, 16).unwrap();
        assert_eq!(read, DATA);

        storage.erase_page(PageIndex(0)).unwrap();
        assert_eq!(stack.contents(0xFFA, 6), vec![0xFF; 6]);
        assert_eq!(stack.contents(0x1000, 10), DATA[6..].to_vec());

        assert_eq!(stack.init_calls(), 2);
        assert_eq!(stack.shutdown_calls(), 2);
        assert!(!stack.is_active());
    }

    #[test]
    fn stack_already_running() {
        let events = Arc::new(FlashEvents::new());
        let (mut storage, stack) = stack_backed(&events, 1);

        let mut app_loop = ThreadEventLoop::new(stack.clone(), events.clone());
        app_loop.start().unwrap();
        stack.init().unwrap();
        while !stack.has_initialized() {
            thread::yield_now();
        }

        storage.write(3, &[1, 2, 3, 4, 5], 5).unwrap();
        storage.erase_page(PageIndex(0)).unwrap();
        storage.write(0, &[9], 1).unwrap();

        assert!(stack.is_active());
        assert_eq!(stack.init_calls(), 1);
        assert_eq!(stack.shutdown_calls(), 0);
        assert_eq!(stack.contents(0, 8), vec![9, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]);
        app_loop.stop();
    }

    #[test]
    fn stack_init_failure() {
        let events = Arc::new(FlashEvents::new());
        let (mut storage, stack) = stack_backed(&events, 1);
        stack.fail_init(HardwareError::INTERNAL);

        assert_eq!(storage.write(0, &DATA, 4), Err(Error::StackInit(HardwareError::INTERNAL)));
        assert_eq!(storage.erase_page(PageIndex(0)), Err(Error::StackInit(HardwareError::INTERNAL)));
        assert_eq!(stack.flash_requests(), 0);
        assert!(!stack.is_active());
        assert!(!storage.programmer().guard().activated_by_guard());
    }

    #[test]
    fn controller_failure_is_reported() {
        let events = Arc::new(FlashEvents::new());
        let (mut storage, stack) = stack_backed(&events, 1);
        stack.fail_flash(HardwareError::TIMEOUT);

        assert_eq!(storage.write(0, &DATA, 4), Err(Error::Hardware(HardwareError::TIMEOUT)));
        assert_eq!(storage.erase_page(PageIndex(0)), Err(Error::Hardware(HardwareError::TIMEOUT)));
        assert_eq!(stack.init_calls(), 2);
        assert!(!stack.is_active());
    }

    #[test]
    fn rejected_requests_leave_stack_off() {
        let events = Arc::new(FlashEvents::new());
        let (mut storage, stack) = stack_backed(&events, 1);

        storage.write(0, &DATA, 4).unwrap();
        assert_eq!(storage.write(2, &DATA, 4), Err(Error::NotErased));
        assert_eq!(storage.write(storage.size(), &DATA, 1), Err(Error::OutOfRange));
        assert_eq!(storage.erase_page(PageIndex(1)), Err(Error::OutOfRange));
        assert_eq!(stack.init_calls(), 1);
        assert_eq!(stack.flash_requests(), 1);
    }

    #[test]
    fn nor_flash_traits() {
        let events = FlashEvents::new();
        let mut storage = direct(&events, 2);
        const ERASE: u32 = 2 * NRF52_PAGE_SIZE;

        assert_eq!(storage.capacity(), 2 * NRF52_PAGE_SIZE as usize);

        let data = [0x55u8; 0x1800];
        NorFlash::write(&mut storage, 0, &data).unwrap();
        let mut buf = [0u8; 0x1800];
        ReadNorFlash::read(&mut storage, 0, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0x55));

        NorFlash::erase(&mut storage, 0, ERASE).unwrap();
        ReadNorFlash::read(&mut storage, 0, &mut buf).unwrap();
        assert!(buf.iter().all(|&b| b == 0xFF));

        assert_eq!(<DirectStorage<'_> as NorFlash>::ERASE_SIZE as u32, storage.page_size());
        let erases = nvmc(&storage).page_erases();
        assert_eq!(NorFlash::erase(&mut storage, 0, 0x400), Err(Error::InvalidAddress));
        assert_eq!(NorFlash::erase(&mut storage, 0x2000, 0x1000), Err(Error::OutOfRange));
        assert_eq!(nvmc(&storage).page_erases(), erases);

        let err = NorFlash::erase(&mut storage, 0x100, ERASE).unwrap_err();
        assert_eq!(err.kind(), NorFlashErrorKind::NotAligned);
        let err = ReadNorFlash::read(&mut storage, ERASE, &mut buf[..1]).unwrap_err();
        assert_eq!(err.kind(), NorFlashErrorKind::OutOfBounds);

        NorFlash::write(&mut storage, 4, &[1]).unwrap();
        assert_eq!(NorFlash::write(&mut storage, 4, &[1]), Err(Error::NotErased));
    }
}
