//! Per-pin configuration values and helpers for the packed registers that
//! hold them.

use std::fmt;

/// Functional role of a pin, as configured by 2 bits of the `MODER` register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Input,
    Output,
    AlternateFunction,
    Analog,
}

impl Mode {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0b00 => Mode::Input,
            0b01 => Mode::Output,
            0b10 => Mode::AlternateFunction,
            _ => Mode::Analog,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            Mode::Input => 0b00,
            Mode::Output => 0b01,
            Mode::AlternateFunction => 0b10,
            Mode::Analog => 0b11,
        }
    }
}

/// Bias applied to a pin, as configured by 2 bits of the `PUPDR` register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pull {
    None,
    Up,
    Down,
}

impl Pull {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0b01 => Pull::Up,
            0b10 => Pull::Down,
            // 0b11 is reserved and behaves as no pull.
            _ => Pull::None,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            Pull::None => 0b00,
            Pull::Up => 0b01,
            Pull::Down => 0b10,
        }
    }
}

/// What an external agent does to a pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drive {
    /// Nothing drives the pin from outside (or it's connected to a passive
    /// load).
    Disconnected,
    Low,
    High,
}

impl Drive {
    pub fn level(self) -> Option<bool> {
        match self {
            Drive::Disconnected => None,
            Drive::Low => Some(false),
            Drive::High => Some(true),
        }
    }
}

impl From<bool> for Drive {
    fn from(level: bool) -> Self {
        if level {
            Drive::High
        } else {
            Drive::Low
        }
    }
}

impl From<Option<bool>> for Drive {
    fn from(level: Option<bool>) -> Self {
        level.map_or(Drive::Disconnected, Drive::from)
    }
}

impl fmt::Display for Drive {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Drive::Disconnected => write!(f, "Z"),
            Drive::Low => write!(f, "0"),
            Drive::High => write!(f, "1"),
        }
    }
}

/// A snapshot of everything that decides the level of a single pin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PinState {
    pub mode: Mode,
    pub pull: Pull,
    /// Level requested through `ODR`.
    pub requested: bool,
    pub drive: Drive,
    /// Level the pin actually presents, as visible in `IDR`.
    pub level: bool,
}

/// Arbitrates between all the sources that may set a pin's level. An external
/// driver always wins; then goes the output driver, and finally the pull-up
/// resistor. Pins with a pull-down or no bias at all read as low.
pub fn resolve_level(mode: Mode, pull: Pull, requested: bool, drive: Drive) -> bool {
    if let Some(level) = drive.level() {
        level
    } else if mode == Mode::Output {
        requested
    } else {
        pull == Pull::Up
    }
}

/// Returns `true` if both an external driver and the output driver try to set
/// the pin's level.
pub fn is_short_circuit(mode: Mode, drive: Drive) -> bool {
    mode == Mode::Output && drive != Drive::Disconnected
}

/// Pins past the register width read as 0.
pub fn bit(register: u32, pin: usize) -> bool {
    shifted(register, pin) & 1 != 0
}

pub fn with_bit(register: u32, pin: usize, value: bool) -> u32 {
    if value {
        register | (1 << pin)
    } else {
        register & !(1 << pin)
    }
}

/// Extracts a 2-bit field of a given pin from a packed register.
pub fn field2(register: u32, pin: usize) -> u32 {
    shifted(register, pin.saturating_mul(2)) & 0b11
}

fn shifted(register: u32, by: usize) -> u32 {
    u32::try_from(by)
        .ok()
        .and_then(|by| register.checked_shr(by))
        .unwrap_or(0)
}

/// Bit mask with one bit set for each of `pin_count` pins.
pub fn pin_mask(pin_count: usize) -> u32 {
    if pin_count >= 32 {
        u32::MAX
    } else {
        (1 << pin_count) - 1
    }
}
