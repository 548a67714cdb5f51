//! Chip families, port names and the table of register values that each port
//! takes after reset.
//!
//! Reset values are plain data: a [`ResetTable`] maps a (family, port) pair to
//! a set of [`RegisterDefaults`], and everything missing from the table resets
//! to zero. Adding a family or a port is a matter of adding a row, either in
//! [`ResetTable::builtin`] or in a JSON file loaded with
//! [`ResetTable::from_json`].

use enum_map::Enum;
use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::port::MAX_PINS;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    // High performance
    F2,
    F4,
    H5,
    F7,
    H7,
    // Mainstream
    C0,
    F0,
    G0,
    F1,
    F3,
    G4,
    // Ultra low power
    L0,
    L4,
    L4P,
    L5,
    U5,
    // Wireless
    WL,
    WB0,
    WB,
    WBA,
}

impl Family {
    pub const ALL: [Family; 20] = [
        Family::F2,
        Family::F4,
        Family::H5,
        Family::F7,
        Family::H7,
        Family::C0,
        Family::F0,
        Family::G0,
        Family::F1,
        Family::F3,
        Family::G4,
        Family::L0,
        Family::L4,
        Family::L4P,
        Family::L5,
        Family::U5,
        Family::WL,
        Family::WB0,
        Family::WB,
        Family::WBA,
    ];

    /// Whether the GPIO ports of this family have the legacy bit reset
    /// register (`BRR`).
    pub fn has_brr(self) -> bool {
        self != Family::F4
    }

    fn name(self) -> &'static str {
        use Family::*;
        match self {
            F2 => "F2",
            F4 => "F4",
            H5 => "H5",
            F7 => "F7",
            H7 => "H7",
            C0 => "C0",
            F0 => "F0",
            G0 => "G0",
            F1 => "F1",
            F3 => "F3",
            G4 => "G4",
            L0 => "L0",
            L4 => "L4",
            L4P => "L4P",
            L5 => "L5",
            U5 => "U5",
            WL => "WL",
            WB0 => "WB0",
            WB => "WB",
            WBA => "WBA",
        }
    }
}

impl fmt::Display for Family {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "STM32{}", self.name())
    }
}

impl FromStr for Family {
    type Err = ConfigError;

    /// Accepts both `f4` and `STM32F4` spellings, case-insensitive.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        let name = upper.strip_prefix("STM32").unwrap_or(&upper);
        Family::ALL
            .iter()
            .copied()
            .find(|family| family.name() == name)
            .ok_or_else(|| ConfigError::UnknownFamily(s.to_string()))
    }
}

/// Name of a GPIO port within a chip. Ports are laid out in the address space
/// in this order.
#[derive(Debug, Enum, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortName {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
    J,
    K,
}

impl PortName {
    pub const ALL: [PortName; 11] = [
        PortName::A,
        PortName::B,
        PortName::C,
        PortName::D,
        PortName::E,
        PortName::F,
        PortName::G,
        PortName::H,
        PortName::I,
        PortName::J,
        PortName::K,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn letter(self) -> char {
        (b'A' + self as u8) as char
    }
}

impl fmt::Display for PortName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.letter())
    }
}

impl FromStr for PortName {
    type Err = ConfigError;

    /// Accepts `a`, `A`, `gpioa` or `GPIOA`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.to_ascii_uppercase();
        let name = upper.strip_prefix("GPIO").unwrap_or(&upper);
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(letter), None) if letter.is_ascii_uppercase() => {
                PortName::from_index((letter as u8 - b'A') as usize)
            }
            _ => None,
        }
        .ok_or_else(|| ConfigError::UnknownPort(s.to_string()))
    }
}

/// Values that the configuration registers take after reset. `IDR` isn't here,
/// since it's always computed, and neither are the write-only registers.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegisterDefaults {
    pub moder: u32,
    pub otyper: u32,
    pub ospeedr: u32,
    pub pupdr: u32,
    pub odr: u32,
    pub lckr: u32,
    pub afrl: u32,
    pub afrh: u32,
}

/// A single row of a [`ResetTable`], as it appears in JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetEntry {
    pub family: Family,
    pub port: PortName,
    #[serde(flatten)]
    pub registers: RegisterDefaults,
}

/// Maps family and port to register reset values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<ResetEntry>", into = "Vec<ResetEntry>")]
pub struct ResetTable {
    entries: HashMap<(Family, PortName), RegisterDefaults>,
}

impl ResetTable {
    /// A table where every port of every family resets to zero.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// The reset values documented in the reference manuals. On STM32F4,
    /// ports A and B come out of reset with the debug pins (JTAG/SWD) already
    /// configured.
    pub fn builtin() -> Self {
        let mut table = Self::empty();
        table.insert(
            Family::F4,
            PortName::A,
            RegisterDefaults {
                moder: 0xA800_0000,
                pupdr: 0x6400_0000,
                ..Default::default()
            },
        );
        table.insert(
            Family::F4,
            PortName::B,
            RegisterDefaults {
                moder: 0x0000_0280,
                ospeedr: 0x0000_00C0,
                pupdr: 0x0000_0100,
                ..Default::default()
            },
        );
        return table;
    }

    /// Parses a JSON array of [`ResetEntry`] rows.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn insert(&mut self, family: Family, port: PortName, registers: RegisterDefaults) {
        self.entries.insert((family, port), registers);
    }

    /// Adds all rows of `other`, replacing the ones that are already there.
    pub fn extend(&mut self, other: ResetTable) {
        self.entries.extend(other.entries);
    }

    pub fn defaults(&self, family: Family, port: PortName) -> RegisterDefaults {
        self.entries
            .get(&(family, port))
            .copied()
            .unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ResetTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl From<Vec<ResetEntry>> for ResetTable {
    fn from(entries: Vec<ResetEntry>) -> Self {
        let mut table = Self::empty();
        for entry in entries {
            table.insert(entry.family, entry.port, entry.registers);
        }
        return table;
    }
}

impl From<ResetTable> for Vec<ResetEntry> {
    fn from(table: ResetTable) -> Self {
        let mut entries: Vec<ResetEntry> = table
            .entries
            .into_iter()
            .map(|((family, port), registers)| ResetEntry {
                family,
                port,
                registers,
            })
            .collect();
        // Keep the output stable.
        entries.sort_by_key(|entry| (entry.family as usize, entry.port.index()));
        return entries;
    }
}

/// Construction-time parameters of a GPIO port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortConfig {
    pub family: Family,
    pub port: PortName,
    pub pin_count: usize,
}

impl PortConfig {
    pub fn new(family: Family, port: PortName) -> Self {
        Self {
            family,
            port,
            pin_count: MAX_PINS,
        }
    }

    pub fn with_pin_count(self, pin_count: usize) -> Self {
        Self { pin_count, ..self }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.pin_count == 0 || self.pin_count > MAX_PINS {
            return Err(ConfigError::PinCount(self.pin_count));
        }
        Ok(())
    }
}

impl Default for PortConfig {
    fn default() -> Self {
        Self::new(Family::F2, PortName::A)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("Illegal pin count: {0}. A port has between 1 and 16 pins")]
    PinCount(usize),

    #[error("Unknown chip family: {0}")]
    UnknownFamily(String),

    #[error("Unknown GPIO port: {0}")]
    UnknownPort(String),

    #[error("Unable to parse the reset table: {0}")]
    Json(#[from] serde_json::Error),
}
