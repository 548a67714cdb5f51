use crate::family::PortName;
use crate::port::registers::PERIPHERAL_SIZE;
use crate::port::Port;
use enum_map::EnumMap;
use log::warn;
use mmio::memory::Access;
use mmio::memory::AccessError;
use mmio::memory::Memory;
use mmio::memory::Read;
use mmio::memory::ReadResult;
use mmio::memory::Write;
use mmio::memory::WriteResult;
use std::fmt;

/// The GPIO block of an STM32 chip, as visible from the CPU: port A starts at
/// the base address, and each following port occupies the next
/// `PERIPHERAL_SIZE` bytes. Ports that the chip doesn't have are left
/// unmapped.
pub struct AddressSpace {
    base: u32,
    ports: EnumMap<PortName, Option<Port>>,
}

impl AddressSpace {
    /// Panics if the ports don't fit between `base` and the end of the
    /// 32-bit address range.
    pub fn new(base: u32) -> Self {
        let size = PortName::ALL.len() as u32 * PERIPHERAL_SIZE;
        assert!(
            base.checked_add(size - 1).is_some(),
            "GPIO block at {:#010X} doesn't fit in the address range",
            base
        );
        Self {
            base,
            ports: EnumMap::default(),
        }
    }

    /// Maps a port at its place in the address space. Returns the port that
    /// was previously mapped there, if any.
    pub fn attach(&mut self, port: Port) -> Option<Port> {
        let name = port.name();
        self.ports[name].replace(port)
    }

    pub fn detach(&mut self, name: PortName) -> Option<Port> {
        self.ports[name].take()
    }

    pub fn port(&self, name: PortName) -> Option<&Port> {
        self.ports[name].as_ref()
    }

    pub fn port_mut(&mut self, name: PortName) -> Option<&mut Port> {
        self.ports[name].as_mut()
    }

    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.values().flatten()
    }

    pub fn ports_mut(&mut self) -> impl Iterator<Item = &mut Port> {
        self.ports.values_mut().flatten()
    }

    /// Base address of a given port.
    pub fn port_base(&self, name: PortName) -> u32 {
        self.base + name.index() as u32 * PERIPHERAL_SIZE
    }

    /// Splits an address into the port name and the register offset.
    pub fn decode(&self, address: u32) -> Option<(PortName, u32)> {
        let relative = address.checked_sub(self.base)?;
        let name = PortName::from_index((relative / PERIPHERAL_SIZE) as usize)?;
        Some((name, relative % PERIPHERAL_SIZE))
    }

    /// Reads like the bus does: every failed read returns 0.
    pub fn read_word(&self, address: u32) -> u32 {
        self.read(address).unwrap_or(0)
    }

    /// Writes like the bus does: failed writes are dropped.
    pub fn write_word(&mut self, address: u32, value: u32) {
        let _ = self.write(address, value);
    }

    fn unmapped(&self, access: Access, address: u32) -> AccessError {
        let error = AccessError::Unmapped { access, address };
        warn!("GPIO: {}", error);
        error
    }
}

impl Read for AddressSpace {
    fn read(&self, address: u32) -> ReadResult {
        match self.decode(address) {
            Some((name, offset)) => match &self.ports[name] {
                Some(port) => port.read(offset),
                None => Err(self.unmapped(Access::Read, address)),
            },
            None => Err(self.unmapped(Access::Read, address)),
        }
    }
}

impl Write for AddressSpace {
    fn write(&mut self, address: u32, value: u32) -> WriteResult {
        match self.decode(address) {
            Some((name, offset)) => match &mut self.ports[name] {
                Some(port) => port.write(offset, value),
                None => Err(self.unmapped(Access::Write, address)),
            },
            None => Err(self.unmapped(Access::Write, address)),
        }
    }
}

impl Memory for AddressSpace {}

impl fmt::Debug for AddressSpace {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mapped: Vec<String> = self
            .ports()
            .map(|port| format!("GPIO{}@{:#010X}", port.name(), self.port_base(port.name())))
            .collect();
        f.debug_struct("AddressSpace")
            .field("base", &format_args!("{:#010X}", self.base))
            .field("ports", &mapped)
            .finish()
    }
}
