use crate::{codec::WORD_SIZE, error::Error};

/// Code page size of the nRF52 internal flash
pub const NRF52_PAGE_SIZE: u32 = 0x1000;

/// A page id, relative to the first page of the region
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PageIndex(pub u8);

impl From<u8> for PageIndex {
    fn from(page_id: u8) -> PageIndex {
        PageIndex(page_id)
    }
}

impl From<PageIndex> for u8 {
    fn from(page: PageIndex) -> u8 {
        page.0
    }
}

/// The flash range handed to the storage, made of whole pages.
///
/// Offsets used by the storage are relative to `start_address`, the
/// hardware programmer works with absolute addresses.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct Region {
    start_address: u32,
    page_size: u32,
    page_count: u8,
}

impl Region {
    /// Represents `page_count` pages of `page_size` bytes starting at `start_address`.
    ///
    /// The controller erases [`NRF52_PAGE_SIZE`] bytes at a time, any other
    /// `page_size` is rejected with [`Error::InvalidArgument`].
    pub fn new(start_address: u32, page_size: u32, page_count: u8) -> Result<Self, Error> {
        if page_size != NRF52_PAGE_SIZE || page_count == 0 {
            return Err(Error::InvalidArgument);
        }
        if start_address % page_size != 0 {
            return Err(Error::InvalidAddress);
        }
        page_size
            .checked_mul(page_count as u32)
            .and_then(|size| start_address.checked_add(size))
            .ok_or(Error::InvalidArgument)?;

        Ok(Self {
            start_address,
            page_size,
            page_count,
        })
    }

    /// Represents the pages between `start_address` (inclusive) and `end_address` (exclusive).
    pub fn from_bounds(start_address: u32, end_address: u32, page_size: u32) -> Result<Self, Error> {
        if end_address <= start_address || page_size == 0 {
            return Err(Error::InvalidArgument);
        }
        let size = end_address - start_address;
        if size % page_size != 0 {
            return Err(Error::InvalidAddress);
        }
        let page_count = u8::try_from(size / page_size).map_err(|_| Error::InvalidArgument)?;
        Self::new(start_address, page_size, page_count)
    }

    pub const fn start_address(&self) -> u32 {
        self.start_address
    }

    pub const fn end_address(&self) -> u32 {
        self.start_address + self.size()
    }

    pub const fn page_size(&self) -> u32 {
        self.page_size
    }

    pub const fn page_count(&self) -> u8 {
        self.page_count
    }

    /// Number of bytes in the region
    pub const fn size(&self) -> u32 {
        self.page_size * self.page_count as u32
    }

    /// Absolute address of the first byte of `page`
    pub fn page_address(&self, page: PageIndex) -> u32 {
        self.start_address + page.0 as u32 * self.page_size
    }

    /// Check that a run of `words` words at the absolute `address` fits in the region.
    pub(crate) fn check_program(&self, address: u32, words: usize) -> Result<(), Error> {
        if words == 0 {
            return Err(Error::InvalidLength);
        }
        if address % WORD_SIZE as u32 != 0 {
            return Err(Error::InvalidAddress);
        }
        let length = words as u64 * WORD_SIZE as u64;
        if address < self.start_address || address as u64 + length > self.end_address() as u64 {
            return Err(Error::InvalidAddress);
        }
        Ok(())
    }

    /// Check an erase of `page_count` pages from `first`, returns the absolute address of `first`.
    pub(crate) fn check_erase(&self, first: PageIndex, page_count: u8) -> Result<u32, Error> {
        if page_count == 0 {
            return Err(Error::InvalidLength);
        }
        if first.0 as u32 + page_count as u32 > self.page_count as u32 {
            return Err(Error::InvalidAddress);
        }
        Ok(self.page_address(first))
    }
}

/// Word aligned superset of a byte request.
///
/// `aligned_offset` is relative to the region start, `pre_padding` is the
/// number of bytes between `aligned_offset` and the requested offset.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WordWindow {
    pub aligned_offset: u32,
    pub pre_padding: usize,
    pub length: usize,
    pub aligned_length: usize,
}

impl WordWindow {
    /// Align `length` bytes at `offset`, fails with [`Error::OutOfRange`] if they leave the region.
    pub fn new(region: &Region, offset: u32, length: usize) -> Result<Self, Error> {
        let pre_padding = offset as usize % WORD_SIZE;
        let aligned_offset = offset - pre_padding as u32;
        let aligned_length = (length + pre_padding).next_multiple_of(WORD_SIZE);

        if offset as u64 + length as u64 > region.size() as u64
            || aligned_offset as u64 + aligned_length as u64 > region.size() as u64
        {
            return Err(Error::OutOfRange);
        }

        Ok(Self {
            aligned_offset,
            pre_padding,
            length,
            aligned_length,
        })
    }

    /// Position of the requested bytes inside the window
    pub fn requested(&self) -> core::ops::Range<usize> {
        self.pre_padding..self.pre_padding + self.length
    }

    pub fn words(&self) -> usize {
        self.aligned_length / WORD_SIZE
    }
}
