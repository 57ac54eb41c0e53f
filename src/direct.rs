//! Programmer driving the NVMC registers directly, for builds without a radio stack.

use crate::{
    address::{PageIndex, Region},
    error::Error,
    event::{FlashEvent, FlashEvents},
    programmer::{FlashArray, FlashProgrammer, MappedFlash},
    register::{ConfigRegister, ReadyRegister, WriteMode},
};

/// Register level access to the non-volatile memory controller
pub trait Nvmc: FlashArray {
    fn read_config(&self) -> u32;

    fn write_config(&mut self, value: u32);

    fn read_ready(&self) -> u32;

    /// Start erasing the page at `address`, erase must be enabled
    fn write_erase_page(&mut self, address: u32);

    /// Store one word into the array, write must be enabled
    fn write_word(&mut self, address: u32, word: u32);
}

const NVMC_BASE: usize = 0x4001_E000;
const READY: usize = NVMC_BASE + 0x400;
const CONFIG: usize = NVMC_BASE + 0x504;
const ERASEPAGE: usize = NVMC_BASE + 0x508;

/// The NVMC peripheral of the running chip, accessed at its fixed register addresses.
pub struct MappedNvmc {
    _private: (),
}

impl MappedNvmc {
    /// # Safety
    ///
    /// The caller must own the NVMC: no other driver (HAL, radio stack) may
    /// use it while this value exists.
    pub unsafe fn steal() -> Self {
        Self { _private: () }
    }
}

impl FlashArray for MappedNvmc {
    fn read_word(&self, address: u32) -> u32 {
        MappedFlash.read_word(address)
    }
}

impl Nvmc for MappedNvmc {
    fn read_config(&self) -> u32 {
        // SAFETY: fixed NVMC register, owned per `steal`
        unsafe { core::ptr::read_volatile(CONFIG as *const u32) }
    }

    fn write_config(&mut self, value: u32) {
        // SAFETY: fixed NVMC register, owned per `steal`
        unsafe { core::ptr::write_volatile(CONFIG as *mut u32, value) }
    }

    fn read_ready(&self) -> u32 {
        // SAFETY: fixed NVMC register, owned per `steal`
        unsafe { core::ptr::read_volatile(READY as *const u32) }
    }

    fn write_erase_page(&mut self, address: u32) {
        // SAFETY: fixed NVMC register, owned per `steal`
        unsafe { core::ptr::write_volatile(ERASEPAGE as *mut u32, address) }
    }

    fn write_word(&mut self, address: u32, word: u32) {
        // SAFETY: the programmer only stores aligned words inside its region,
        // with write enabled in CONFIG.
        unsafe { core::ptr::write_volatile(address as *mut u32, word) }
    }
}

/// The programmer drives the controller synchronously, polling READY around
/// every word and page, then reports completion before returning.
pub struct DirectProgrammer<N> {
    nvmc: N,
    region: Region,
}

impl<N: Nvmc> DirectProgrammer<N> {
    /// Create a new instance, leaving the controller in read-only mode.
    pub fn new(nvmc: N, region: Region) -> Self {
        let mut this = Self { nvmc, region };
        this.set_mode(WriteMode::ReadOnly);
        this
    }

    pub fn nvmc(&self) -> &N {
        &self.nvmc
    }

    pub fn release_nvmc(self) -> N {
        self.nvmc
    }

    fn wait_ready(&self) {
        while !ReadyRegister::from(self.nvmc.read_ready()).ready {
            core::hint::spin_loop();
        }
    }

    fn set_mode(&mut self, write_mode: WriteMode) {
        self.nvmc.write_config(ConfigRegister { write_mode }.into());
        self.wait_ready();
    }

    /// Current CONFIG register content
    pub fn config(&self) -> ConfigRegister {
        self.nvmc.read_config().into()
    }
}

impl<N: Nvmc> FlashProgrammer for DirectProgrammer<N> {
    fn region(&self) -> &Region {
        &self.region
    }

    fn read_word(&self, address: u32) -> u32 {
        self.nvmc.read_word(address)
    }

    fn program(&mut self, address: u32, words: &[u32], events: &FlashEvents) -> Result<(), Error> {
        self.region.check_program(address, words.len())?;
        trace!("NVMC store {=u32:#x} ({=usize} words)", address, words.len());

        let mut dest = address;
        for &word in words {
            self.set_mode(WriteMode::Write);
            self.nvmc.write_word(dest, word);
            self.wait_ready();
            self.set_mode(WriteMode::ReadOnly);
            dest += 4;
        }

        events.notify(FlashEvent::WriteResult(Ok(())));
        Ok(())
    }

    fn erase(&mut self, first_page: PageIndex, page_count: u8, events: &FlashEvents) -> Result<(), Error> {
        let mut address = self.region.check_erase(first_page, page_count)?;

        for _ in 0..page_count {
            debug!("NVMC erase {=u32:#x}", address);
            self.set_mode(WriteMode::Erase);
            self.nvmc.write_erase_page(address);
            self.wait_ready();
            self.set_mode(WriteMode::ReadOnly);
            address += self.region.page_size();
        }

        events.notify(FlashEvent::EraseResult(Ok(())));
        Ok(())
    }
}
