//! Simulated flash hardware for host tests.
//!
//! The simulated array behaves like NOR flash: erased bytes read `0xFF`,
//! programming can only clear bits, only whole pages return to `0xFF`.

use std::{
    cell::Cell,
    collections::VecDeque,
    sync::{Mutex, MutexGuard, PoisonError},
};

use crate::{
    address::Region,
    direct::Nvmc,
    error::HardwareError,
    event::{FlashEvent, FlashEvents},
    programmer::FlashArray,
    register::{ConfigRegister, WriteMode},
    softdevice::RadioStack,
};

/// Number of READY polls reporting busy after each command
const BUSY_POLLS: u32 = 2;

/// Backing memory of a simulated region
#[derive(Debug)]
struct FlashCells {
    base: u32,
    page_size: u32,
    bytes: Vec<u8>,
}

impl FlashCells {
    fn new(region: Region) -> Self {
        Self {
            base: region.start_address(),
            page_size: region.page_size(),
            bytes: vec![0xFF; region.size() as usize],
        }
    }

    fn index(&self, address: u32, len: usize) -> Option<usize> {
        let index = address.checked_sub(self.base)? as usize;
        (index + len <= self.bytes.len()).then_some(index)
    }

    fn read_word(&self, address: u32) -> u32 {
        match self.index(address, 4) {
            Some(i) => u32::from_le_bytes([self.bytes[i], self.bytes[i + 1], self.bytes[i + 2], self.bytes[i + 3]]),
            None => 0xFFFF_FFFF,
        }
    }

    fn program_word(&mut self, address: u32, word: u32) {
        if let Some(i) = self.index(address, 4) {
            for (cell, byte) in self.bytes[i..i + 4].iter_mut().zip(word.to_le_bytes()) {
                *cell &= byte;
            }
        }
    }

    fn erase_page(&mut self, address: u32) {
        if address % self.page_size != 0 {
            return;
        }
        if let Some(i) = self.index(address, self.page_size as usize) {
            self.bytes[i..i + self.page_size as usize].fill(0xFF);
        }
    }

    fn contents(&self, offset: u32, len: usize) -> Vec<u8> {
        self.bytes[offset as usize..offset as usize + len].to_vec()
    }
}

/// NVMC registers in front of a simulated array
#[derive(Debug)]
pub struct SimNvmc {
    cells: FlashCells,
    config: u32,
    busy: Cell<u32>,
    word_writes: usize,
    page_erases: usize,
    ignored_commands: usize,
}

impl SimNvmc {
    pub fn new(region: Region) -> Self {
        Self {
            cells: FlashCells::new(region),
            config: 0,
            busy: Cell::new(0),
            word_writes: 0,
            page_erases: 0,
            ignored_commands: 0,
        }
    }

    /// Copy of `len` bytes at the region relative `offset`
    pub fn contents(&self, offset: u32, len: usize) -> Vec<u8> {
        self.cells.contents(offset, len)
    }

    /// Words stored into the array
    pub fn word_writes(&self) -> usize {
        self.word_writes
    }

    /// Pages erased
    pub fn page_erases(&self) -> usize {
        self.page_erases
    }

    /// Stores and erases issued without the matching CONFIG mode
    pub fn ignored_commands(&self) -> usize {
        self.ignored_commands
    }

    fn mode(&self) -> WriteMode {
        ConfigRegister::from(self.config).write_mode
    }
}

impl FlashArray for SimNvmc {
    fn read_word(&self, address: u32) -> u32 {
        self.cells.read_word(address)
    }
}

impl Nvmc for SimNvmc {
    fn read_config(&self) -> u32 {
        self.config
    }

    fn write_config(&mut self, value: u32) {
        self.config = value;
        self.busy.set(BUSY_POLLS);
    }

    fn read_ready(&self) -> u32 {
        match self.busy.get() {
            0 => 1,
            n => {
                self.busy.set(n - 1);
                0
            }
        }
    }

    fn write_erase_page(&mut self, address: u32) {
        if self.mode() != WriteMode::Erase {
            self.ignored_commands += 1;
            return;
        }
        self.cells.erase_page(address);
        self.page_erases += 1;
        self.busy.set(BUSY_POLLS);
    }

    fn write_word(&mut self, address: u32, word: u32) {
        if self.mode() != WriteMode::Write {
            self.ignored_commands += 1;
            return;
        }
        self.cells.program_word(address, word);
        self.word_writes += 1;
        self.busy.set(BUSY_POLLS);
    }
}

#[derive(Debug)]
enum Request {
    Init,
    Write { address: u32, words: Vec<u32> },
    Erase { address: u32, page_count: u8 },
}

#[derive(Debug)]
struct StackState {
    cells: FlashCells,
    active: bool,
    initialized: bool,
    queue: VecDeque<Request>,
    reject_init: Option<HardwareError>,
    fail_init: Option<HardwareError>,
    fail_flash: Option<HardwareError>,
    init_calls: usize,
    shutdown_calls: usize,
    flash_requests: usize,
}

/// Radio stack whose flash driver completes requests from [`RadioStack::process_events`]
#[derive(Debug)]
pub struct SimRadioStack {
    state: Mutex<StackState>,
}

impl SimRadioStack {
    pub fn new(region: Region) -> Self {
        Self {
            state: Mutex::new(StackState {
                cells: FlashCells::new(region),
                active: false,
                initialized: false,
                queue: VecDeque::new(),
                reject_init: None,
                fail_init: None,
                fail_flash: None,
                init_calls: 0,
                shutdown_calls: 0,
                flash_requests: 0,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, StackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make `init` reject the request
    pub fn reject_init(&self, code: HardwareError) {
        self.state().reject_init = Some(code);
    }

    /// Make initialization accept the request, then report `code`
    pub fn fail_init(&self, code: HardwareError) {
        self.state().fail_init = Some(code);
    }

    /// Report `code` for every following flash request
    pub fn fail_flash(&self, code: HardwareError) {
        self.state().fail_flash = Some(code);
    }

    pub fn init_calls(&self) -> usize {
        self.state().init_calls
    }

    pub fn shutdown_calls(&self) -> usize {
        self.state().shutdown_calls
    }

    /// Flash write and erase requests received, accepted or not
    pub fn flash_requests(&self) -> usize {
        self.state().flash_requests
    }

    /// Copy of `len` bytes at the region relative `offset`
    pub fn contents(&self, offset: u32, len: usize) -> Vec<u8> {
        self.state().cells.contents(offset, len)
    }

    fn complete(&self, request: Request) -> FlashEvent {
        let mut state = self.state();
        match request {
            Request::Init => match state.fail_init {
                Some(code) => {
                    state.active = false;
                    FlashEvent::StackInitialized(Err(code))
                }
                None => {
                    // a shutdown may have overtaken the queued request
                    state.initialized = state.active;
                    FlashEvent::StackInitialized(Ok(()))
                }
            },
            Request::Write { address, words } => {
                if let Some(code) = state.fail_flash {
                    return FlashEvent::WriteResult(Err(code));
                }
                for (i, word) in words.into_iter().enumerate() {
                    state.cells.program_word(address + 4 * i as u32, word);
                }
                FlashEvent::WriteResult(Ok(()))
            }
            Request::Erase { address, page_count } => {
                if let Some(code) = state.fail_flash {
                    return FlashEvent::EraseResult(Err(code));
                }
                let page_size = state.cells.page_size;
                for page in 0..page_count as u32 {
                    state.cells.erase_page(address + page * page_size);
                }
                FlashEvent::EraseResult(Ok(()))
            }
        }
    }

    fn submit(&self, request: Request) -> Result<(), HardwareError> {
        let mut state = self.state();
        state.flash_requests += 1;
        if !state.initialized {
            return Err(HardwareError::INVALID_STATE);
        }
        state.queue.push_back(request);
        Ok(())
    }
}

impl FlashArray for SimRadioStack {
    fn read_word(&self, address: u32) -> u32 {
        self.state().cells.read_word(address)
    }
}

impl RadioStack for SimRadioStack {
    fn init(&self) -> Result<(), HardwareError> {
        let mut state = self.state();
        state.init_calls += 1;
        if state.active {
            return Err(HardwareError::INVALID_STATE);
        }
        if let Some(code) = state.reject_init {
            return Err(code);
        }
        state.active = true;
        state.queue.push_back(Request::Init);
        Ok(())
    }

    fn shutdown(&self) {
        let mut state = self.state();
        state.shutdown_calls += 1;
        state.active = false;
        state.initialized = false;
        state.queue.clear();
    }

    fn is_active(&self) -> bool {
        self.state().active
    }

    fn has_initialized(&self) -> bool {
        self.state().initialized
    }

    fn process_events(&self, events: &FlashEvents) {
        loop {
            let Some(request) = self.state().queue.pop_front() else {
                break;
            };
            let event = self.complete(request);
            events.notify(event);
        }
    }

    fn flash_write(&self, address: u32, words: &[u32]) -> Result<(), HardwareError> {
        self.submit(Request::Write {
            address,
            words: words.to_vec(),
        })
    }

    fn flash_erase(&self, page_address: u32, page_count: u8) -> Result<(), HardwareError> {
        self.submit(Request::Erase {
            address: page_address,
            page_count,
        })
    }
}
