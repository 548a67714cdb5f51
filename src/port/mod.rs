pub mod registers;
mod snapshot;
mod tests;

pub use snapshot::PortState;
pub use snapshot::SnapshotError;

use crate::diagnostics::Diagnostic;
use crate::diagnostics::DiagnosticSink;
use crate::diagnostics::Diagnostics;
use crate::family::ConfigError;
use crate::family::Family;
use crate::family::PortConfig;
use crate::family::PortName;
use crate::family::RegisterDefaults;
use crate::family::ResetTable;
use crate::pin::{self, Drive, Mode, PinState, Pull};
use crate::signal::{Event, Loopback, Signals, Sink};
use log::{debug, trace, warn};
use mmio::memory::{Access, AccessError, Memory, Read, ReadResult, Write, WriteResult};

/// Maximum number of pins in a single port.
pub const MAX_PINS: usize = 16;

/// How many times a resolution may be repeated because sinks keep changing
/// the external drive in response to notifications.
const MAX_SETTLE_PASSES: usize = 16;

/// A single STM32 GPIO port.
///
/// The level of each pin is computed from the mode and pull configuration, the
/// `ODR` register and whatever drives the pin from outside the chip. The
/// result lands in `IDR` and never comes from a register write. Every
/// operation that may affect any of these inputs ends with a full
/// [`resolve`](Port::resolve).
#[derive(Debug)]
pub struct Port {
    family: Family,
    name: PortName,
    pin_count: usize,
    defaults: RegisterDefaults,

    // *** REGISTERS ***
    /// Pin modes, 2 bits per pin.
    reg_moder: u32,
    /// Output types. Stored, but doesn't affect the pin levels.
    reg_otyper: u32,
    /// Output speeds. Stored, but doesn't affect the pin levels.
    reg_ospeedr: u32,
    /// Pull-up/pull-down configuration, 2 bits per pin.
    reg_pupdr: u32,
    /// Actual levels of the pins.
    reg_idr: u32,
    /// Levels requested by the chip on output pins.
    reg_odr: u32,
    /// Lock bits. The locking sequence isn't emulated.
    reg_lckr: u32,
    reg_afrl: u32,
    reg_afrh: u32,

    // *** LIFECYCLE ***
    /// Clock enable, as set by the reset and clock controller. A disabled
    /// port ignores all register accesses.
    powered: bool,
    /// While set, the port keeps its reset configuration and refuses writes.
    held_in_reset: bool,

    // *** EXTERNAL DRIVE ***
    /// Levels forced onto the pins from outside. Only meaningful for pins
    /// that have their bit set in `external_mask`.
    external_levels: u32,
    /// Pins that are driven from outside at all.
    external_mask: u32,

    signals: Signals,
    diagnostics: Diagnostics,
    loopback: Loopback,
}

impl Port {
    /// Creates a port that takes its reset values from a given table. The
    /// port starts disabled, with the reset configuration already applied.
    pub fn new(config: PortConfig, reset_table: &ResetTable) -> Result<Self, ConfigError> {
        config.validate()?;
        let mut port = Self {
            family: config.family,
            name: config.port,
            pin_count: config.pin_count,
            defaults: reset_table.defaults(config.family, config.port),

            reg_moder: 0,
            reg_otyper: 0,
            reg_ospeedr: 0,
            reg_pupdr: 0,
            reg_idr: 0,
            reg_odr: 0,
            reg_lckr: 0,
            reg_afrl: 0,
            reg_afrh: 0,

            powered: false,
            held_in_reset: false,

            external_levels: 0,
            external_mask: 0,

            signals: Signals::new(config.pin_count),
            diagnostics: Diagnostics::new(config.port),
            loopback: Loopback::default(),
        };
        port.reset();
        Ok(port)
    }

    /// Creates a port with the built-in reset values.
    pub fn with_config(config: PortConfig) -> Result<Self, ConfigError> {
        Self::new(config, &ResetTable::builtin())
    }

    pub fn family(&self) -> Family {
        self.family
    }

    pub fn name(&self) -> PortName {
        self.name
    }

    pub fn pin_count(&self) -> usize {
        self.pin_count
    }

    pub fn powered(&self) -> bool {
        self.powered
    }

    pub fn held_in_reset(&self) -> bool {
        self.held_in_reset
    }

    /// Resolved levels of all pins, the same as `IDR`, but readable even if
    /// the port is disabled.
    pub fn levels(&self) -> u32 {
        self.reg_idr
    }

    pub fn level(&self, pin: usize) -> bool {
        self.debug_check_pin(pin);
        pin::bit(self.reg_idr, pin)
    }

    pub fn mode(&self, pin: usize) -> Mode {
        self.debug_check_pin(pin);
        Mode::from_bits(pin::field2(self.reg_moder, pin))
    }

    pub fn pull(&self, pin: usize) -> Pull {
        self.debug_check_pin(pin);
        Pull::from_bits(pin::field2(self.reg_pupdr, pin))
    }

    pub fn external_drive(&self, pin: usize) -> Drive {
        self.debug_check_pin(pin);
        if pin::bit(self.external_mask, pin) {
            Drive::from(pin::bit(self.external_levels, pin))
        } else {
            Drive::Disconnected
        }
    }

    pub fn pin(&self, pin: usize) -> PinState {
        PinState {
            mode: self.mode(pin),
            pull: self.pull(pin),
            requested: pin::bit(self.reg_odr, pin),
            drive: self.external_drive(pin),
            level: self.level(pin),
        }
    }

    /// Connects a sink to the "state changed" line.
    pub fn connect_state(&mut self, sink: impl Sink + 'static) {
        self.signals.connect_state(sink);
    }

    /// Connects a sink to the "input changed" line of a given pin.
    pub fn connect_input(&mut self, pin: usize, sink: impl Sink + 'static) {
        self.signals.connect_input(pin, sink);
    }

    pub fn connect_diagnostics(&mut self, sink: impl DiagnosticSink + 'static) {
        self.diagnostics.connect(sink);
    }

    /// Reads a register the way the bus sees it: refused reads return 0.
    pub fn read_register(&self, offset: u32) -> u32 {
        self.read(offset).unwrap_or(0)
    }

    /// Writes a register the way the bus sees it: refused writes are dropped.
    pub fn write_register(&mut self, offset: u32, value: u32) {
        // Refusals have already been reported.
        let _ = self.write(offset, value);
    }

    /// Connects the pin to an external driver, or disconnects it. Pins
    /// outside of the port are a programming error.
    pub fn set_external_drive(&mut self, pin: usize, drive: impl Into<Drive>) {
        let drive = drive.into();
        self.debug_check_pin(pin);
        if pin >= self.pin_count {
            warn!("GPIO{}: ignoring drive {} on missing pin {}", self.name, drive, pin);
            return;
        }
        trace!("GPIO{}: pin {} driven {}", self.name, pin, drive);
        self.apply_drive(pin, drive);
        self.resolve();
    }

    /// Handles the clock enable line. Only transitions have any effect.
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.powered == enabled {
            return;
        }
        debug!(
            "GPIO{}: {}",
            self.name,
            if enabled { "enabled" } else { "disabled" }
        );
        self.powered = enabled;
        self.resolve();
    }

    /// Handles the reset line. Entering reset restores the reset
    /// configuration; leaving it keeps the registers as they are.
    pub fn set_held_in_reset(&mut self, held: bool) {
        if self.held_in_reset == held {
            return;
        }
        debug!(
            "GPIO{}: {} reset",
            self.name,
            if held { "entering" } else { "leaving" }
        );
        self.held_in_reset = held;
        if held {
            self.load_defaults();
        }
        self.resolve();
    }

    /// Restores the reset configuration of the registers. Doesn't touch the
    /// enable and reset lines or the external drive.
    pub fn reset(&mut self) {
        self.load_defaults();
        self.resolve();
    }

    /// Recomputes the level of every pin and notifies the connected sinks.
    /// If the sinks request external drive changes, these are applied and the
    /// resolution is repeated until the port settles.
    pub fn resolve(&mut self) {
        let mut passes = 1;
        loop {
            self.resolve_pass();
            let requests = self.loopback.take();
            if requests.is_empty() {
                return;
            }
            if passes == MAX_SETTLE_PASSES {
                warn!(
                    "GPIO{}: pins didn't settle after {} passes, dropping {} drive requests",
                    self.name,
                    passes,
                    requests.len()
                );
                return;
            }
            for (pin, drive) in requests {
                if pin < self.pin_count {
                    self.apply_drive(pin, drive);
                } else {
                    warn!("GPIO{}: ignoring drive {} on missing pin {}", self.name, drive, pin);
                }
            }
            passes += 1;
        }
    }

    fn resolve_pass(&mut self) {
        for pin in 0..self.pin_count {
            let previous = pin::bit(self.reg_idr, pin);
            let mode = self.mode(pin);
            let drive = self.external_drive(pin);

            if pin::is_short_circuit(mode, drive) {
                self.diagnostics.report(Diagnostic::DriveHazard { pin });
            }

            let level = pin::resolve_level(mode, self.pull(pin), pin::bit(self.reg_odr, pin), drive);
            self.reg_idr = pin::with_bit(self.reg_idr, pin, level);

            // Only input pins are wired to other peripherals.
            if level != previous && mode == Mode::Input {
                self.signals
                    .emit(Event::InputChanged { pin, level }, &mut self.loopback);
            }
        }
        self.signals.emit(Event::StateChanged, &mut self.loopback);
    }

    fn debug_check_pin(&self, pin: usize) {
        debug_assert!(
            pin < self.pin_count,
            "Pin {} out of range, GPIO{} has {} pins",
            pin,
            self.name,
            self.pin_count
        );
    }

    fn apply_drive(&mut self, pin: usize, drive: Drive) {
        match drive.level() {
            Some(level) => {
                self.external_mask = pin::with_bit(self.external_mask, pin, true);
                self.external_levels = pin::with_bit(self.external_levels, pin, level);
            }
            None => self.external_mask = pin::with_bit(self.external_mask, pin, false),
        }
    }

    fn load_defaults(&mut self) {
        let defaults = self.defaults;
        self.reg_moder = defaults.moder;
        self.reg_otyper = defaults.otyper;
        self.reg_ospeedr = defaults.ospeedr;
        self.reg_pupdr = defaults.pupdr;
        self.reg_odr = defaults.odr;
        self.reg_lckr = defaults.lckr;
        self.reg_afrl = defaults.afrl;
        self.reg_afrh = defaults.afrh;
    }

    fn refuse(&self, error: AccessError) -> AccessError {
        self.diagnostics.report(error);
        error
    }

    fn store(&mut self, offset: u32, value: u32) -> WriteResult {
        match offset {
            registers::MODER => self.reg_moder = value,
            registers::OTYPER => self.reg_otyper = value,
            registers::OSPEEDR => self.reg_ospeedr = value,
            registers::PUPDR => self.reg_pupdr = value,
            // Read-only, updated by `resolve`.
            registers::IDR => {}
            registers::ODR => self.reg_odr = value,
            registers::BSRR => {
                // Set bits win over reset bits.
                self.reg_odr &= !(value >> 16);
                self.reg_odr |= value & 0xFFFF;
            }
            registers::LCKR => self.reg_lckr = value,
            registers::AFRL => self.reg_afrl = value,
            registers::AFRH => self.reg_afrh = value,
            registers::BRR if self.family.has_brr() => self.reg_odr &= !(value & 0xFFFF),
            _ => {
                return Err(self.refuse(AccessError::InvalidOffset {
                    access: Access::Write,
                    offset,
                }))
            }
        };
        Ok(())
    }
}

impl Read for Port {
    fn read(&self, offset: u32) -> ReadResult {
        if !self.powered {
            return Err(self.refuse(AccessError::Disabled {
                access: Access::Read,
                offset,
            }));
        }
        let value = match offset {
            registers::MODER => self.reg_moder,
            registers::OTYPER => self.reg_otyper,
            registers::OSPEEDR => self.reg_ospeedr,
            registers::PUPDR => self.reg_pupdr,
            registers::IDR => self.reg_idr,
            registers::ODR => self.reg_odr,
            // Write-only.
            registers::BSRR => 0,
            registers::LCKR => self.reg_lckr,
            registers::AFRL => self.reg_afrl,
            registers::AFRH => self.reg_afrh,
            // Write-only.
            registers::BRR if self.family.has_brr() => 0,
            _ => {
                return Err(self.refuse(AccessError::InvalidOffset {
                    access: Access::Read,
                    offset,
                }))
            }
        };
        trace!("GPIO{}: read {:#05X} -> {:#010X}", self.name, offset, value);
        Ok(value)
    }
}

impl Write for Port {
    fn write(&mut self, offset: u32, value: u32) -> WriteResult {
        trace!("GPIO{}: write {:#05X} <- {:#010X}", self.name, offset, value);
        if !self.powered {
            return Err(self.refuse(AccessError::Disabled {
                access: Access::Write,
                offset,
            }));
        }
        if self.held_in_reset {
            return Err(self.refuse(AccessError::HeldInReset { offset, value }));
        }
        let result = self.store(offset, value);
        // Resolve even if nothing was stored: the port always presents a
        // consistent state after a bus write.
        self.resolve();
        return result;
    }
}

impl Memory for Port {}
