/// Status code reported by the flash controller or the radio stack.
///
/// The numbering follows the nRF SDK error codes.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HardwareError(pub u32);

impl HardwareError {
    pub const INTERNAL: Self = Self(3);
    pub const NO_MEM: Self = Self(4);
    pub const INVALID_STATE: Self = Self(8);
    pub const INVALID_ADDR: Self = Self(16);
    pub const TIMEOUT: Self = Self(13);
    pub const BUSY: Self = Self(17);
}

/// All possible errors emitted by the storage
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Empty request or a buffer shorter than the requested length
    InvalidArgument,

    /// Request exceeds the storage region
    OutOfRange,

    /// Hardware request not word or page aligned, or outside the region
    InvalidAddress,

    /// Zero-sized hardware request
    InvalidLength,

    /// Target bytes are already programmed, erase the page first
    NotErased,

    /// Byte and word buffers of mismatched size
    Conversion,

    /// The radio stack failed to start
    StackInit(HardwareError),

    /// Failure reported by the controller or the stack's flash driver
    Hardware(HardwareError),
}
