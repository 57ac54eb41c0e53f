#![cfg_attr(not(any(test, feature = "std")), no_std)]
//! Byte addressable storage on the internal flash of nRF52 microcontrollers.
//!
//! The flash controller (NVMC) only programs aligned 32-bit words and erases
//! whole pages. [`FlashStorage`] maps byte-granular reads and writes onto
//! word operations, refuses to program over data that was not erased, and
//! erases pages of its [`Region`].
//!
//! Two backends drive the controller:
//! * [`DirectProgrammer`] writes the NVMC registers itself, for builds without a radio stack.
//! * [`SoftDeviceProgrammer`] goes through the radio stack's flash driver and starts the stack on
//!   demand with a [`StackGuard`].
//!
//! Completion of every write and erase is delivered through [`FlashEvents`],
//! the storage waits on it either blocking ([`FlashStorage`]) or async
//! ([`AsyncFlashStorage`]). Both implement the `embedded-storage` traits.

// This mod MUST go first, so that the others see its macros.
mod fmt;

pub mod address;
pub mod asynchronous;
pub mod blocking;
pub mod codec;
pub mod direct;
pub mod error;
pub mod event;
pub mod guard;
pub mod programmer;
pub mod register;
#[cfg(any(test, feature = "std"))]
pub mod sim;
pub mod softdevice;

pub use address::{PageIndex, Region, NRF52_PAGE_SIZE};
pub use asynchronous::AsyncFlashStorage;
pub use blocking::FlashStorage;
pub use direct::{DirectProgrammer, MappedNvmc, Nvmc};
pub use error::{Error, HardwareError};
pub use event::{FlashEvent, FlashEvents, OperationKind};
pub use guard::{EventLoop, StackGuard};
pub use programmer::{FlashArray, FlashProgrammer, MappedFlash};
pub use softdevice::{RadioStack, SoftDeviceProgrammer};

/// Value of every byte of an erased page
pub const ERASED: u8 = 0xFF;
