use bit::BitIndex;

/// Write/erase enable field of the NVMC CONFIG register
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteMode {
    ReadOnly,
    Write,
    Erase,
}

impl From<u32> for WriteMode {
    fn from(val: u32) -> Self {
        match val.bit_range(0..2) {
            1 => WriteMode::Write,
            2 => WriteMode::Erase,
            _ => WriteMode::ReadOnly,
        }
    }
}

impl From<WriteMode> for u32 {
    fn from(mode: WriteMode) -> u32 {
        let wen = match mode {
            WriteMode::ReadOnly => 0,
            WriteMode::Write => 1,
            WriteMode::Erase => 2,
        };
        let mut val = 0u32;
        val.set_bit_range(0..2, wen);
        val
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct ConfigRegister {
    pub write_mode: WriteMode,
}

impl From<u32> for ConfigRegister {
    fn from(val: u32) -> ConfigRegister {
        ConfigRegister {
            write_mode: val.into(),
        }
    }
}

impl From<ConfigRegister> for u32 {
    fn from(reg: ConfigRegister) -> u32 {
        reg.write_mode.into()
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug, Clone, Copy)]
pub struct ReadyRegister {
    /// The controller accepts a new write or erase
    pub ready: bool,
}

impl From<u32> for ReadyRegister {
    fn from(val: u32) -> ReadyRegister {
        ReadyRegister { ready: val.bit(0) }
    }
}
