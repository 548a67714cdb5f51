use std::fmt;
use std::result::Result;

pub trait Read {
    /// Reads a 32-bit word from a given offset. Returns the word or error if
    /// the location is unsupported. Bus-facing callers that emulate hardware
    /// usually collapse the error to a zero read; the error is there so that
    /// tests and debugging tools can see what went wrong.
    fn read(&self, offset: u32) -> ReadResult;
}

pub trait Write {
    /// Writes a 32-bit word to a given offset. Returns error if the location
    /// is unsupported or the peripheral refuses the write. As with reads, a
    /// refused write never changes the peripheral state.
    fn write(&mut self, offset: u32, value: u32) -> WriteResult;
}

pub trait Memory: Read + Write {}

pub type ReadResult = Result<u32, AccessError>;

pub type WriteResult = Result<(), AccessError>;

/// Direction of a bus access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Read,
    Write,
}

impl fmt::Display for Access {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Access::Read => write!(f, "read"),
            Access::Write => write!(f, "write"),
        }
    }
}

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessError {
    /// No register at this offset, or the register doesn't support this
    /// access direction.
    #[error("Bad {access} offset {offset:#05X}")]
    InvalidOffset { access: Access, offset: u32 },

    #[error("Unable to {access} offset {offset:#05X}: peripheral is disabled")]
    Disabled { access: Access, offset: u32 },

    #[error("Unable to write {value:#010X} to offset {offset:#05X}: peripheral is held in reset")]
    HeldInReset { offset: u32, value: u32 },

    /// Nothing is mapped at this bus address.
    #[error("Unable to {access} address {address:#010X}: nothing is mapped there")]
    Unmapped { access: Access, address: u32 },
}

impl AccessError {
    pub fn access(&self) -> Access {
        match *self {
            AccessError::InvalidOffset { access, .. } => access,
            AccessError::Disabled { access, .. } => access,
            AccessError::HeldInReset { .. } => Access::Write,
            AccessError::Unmapped { access, .. } => access,
        }
    }
}
