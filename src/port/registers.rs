//! Byte offsets of the GPIO port registers. All registers are 32 bits wide
//! and only word accesses are supported.

/// Pin modes, 2 bits per pin. See [`Mode`](crate::pin::Mode).
pub const MODER: u32 = 0x00;
/// Output types (push-pull/open-drain), 1 bit per pin.
pub const OTYPER: u32 = 0x04;
/// Output speeds, 2 bits per pin.
pub const OSPEEDR: u32 = 0x08;
/// Pull-up/pull-down resistors, 2 bits per pin. See [`Pull`](crate::pin::Pull).
pub const PUPDR: u32 = 0x0C;
/// Input data: the levels actually present on the pins. Read-only.
pub const IDR: u32 = 0x10;
/// Output data: the levels requested for output pins.
pub const ODR: u32 = 0x14;
/// Bit set/reset. Write-only. Bits 15:0 set, bits 31:16 reset `ODR` bits.
pub const BSRR: u32 = 0x18;
/// Configuration lock.
pub const LCKR: u32 = 0x1C;
/// Alternate function selection for pins 0-7, 4 bits per pin.
pub const AFRL: u32 = 0x20;
/// Alternate function selection for pins 8-15, 4 bits per pin.
pub const AFRH: u32 = 0x24;
/// Bit reset. Write-only, and missing on some families.
pub const BRR: u32 = 0x28;

/// Size of the address window that a single port occupies.
pub const PERIPHERAL_SIZE: u32 = 0x400;

pub fn name(offset: u32) -> Option<&'static str> {
    Some(match offset {
        MODER => "MODER",
        OTYPER => "OTYPER",
        OSPEEDR => "OSPEEDR",
        PUPDR => "PUPDR",
        IDR => "IDR",
        ODR => "ODR",
        BSRR => "BSRR",
        LCKR => "LCKR",
        AFRL => "AFRL",
        AFRH => "AFRH",
        BRR => "BRR",
        _ => return None,
    })
}

/// Looks up a register offset by its name, case-insensitive.
pub fn offset(name: &str) -> Option<u32> {
    (0..=BRR)
        .step_by(4)
        .find(|&offset| self::name(offset).map_or(false, |n| n.eq_ignore_ascii_case(name)))
}
