//! Scripted scenarios: a list of steps played against a single port, with a
//! record of everything the port reported back.

use crate::diagnostics::Diagnostic;
use crate::port::registers;
use crate::port::Port;
use crate::signal::Event;
use serde::Deserialize;
use serde::Serialize;
use std::fmt;
use std::sync::mpsc;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Sets the clock enable line.
    Enable { value: bool },
    /// Sets the reset line.
    Reset { hold: bool },
    /// Resets the registers without touching the lines.
    DeviceReset,
    Write { offset: Offset, value: u32 },
    Read { offset: Offset },
    /// Drives a pin from outside; `null` disconnects it.
    Drive { pin: usize, level: Option<bool> },
}

/// A register offset, given either as a number or as a register name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Offset {
    Number(u32),
    Name(String),
}

impl Offset {
    pub fn resolve(&self) -> Result<u32, ScriptError> {
        match self {
            Offset::Number(offset) => Ok(*offset),
            Offset::Name(name) => {
                registers::offset(name).ok_or_else(|| ScriptError::UnknownRegister(name.clone()))
            }
        }
    }
}

/// Something that the port reported while playing a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Record {
    Read { offset: u32, value: u32 },
    Event(Event),
    Diagnostic(Diagnostic),
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Record::Read { offset, value } => match registers::name(*offset) {
                Some(name) => write!(f, "read {} = {:#010X}", name, value),
                None => write!(f, "read {:#05X} = {:#010X}", offset, value),
            },
            Record::Event(event) => write!(f, "event: {}", event),
            Record::Diagnostic(diagnostic) => write!(f, "diagnostic: {}", diagnostic),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ScriptError {
    #[error("Unable to parse the script: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Unknown register: {0}")]
    UnknownRegister(String),

    #[error("Pin {pin} out of range, the port has {pin_count} pins")]
    PinOutOfRange { pin: usize, pin_count: usize },
}

pub fn parse(json: &str) -> Result<Vec<Step>, ScriptError> {
    Ok(serde_json::from_str(json)?)
}

/// Plays steps against a port and collects what it reports.
pub struct Runner {
    port: Port,
    events: mpsc::Receiver<Event>,
    diagnostics: mpsc::Receiver<Diagnostic>,
}

impl Runner {
    pub fn new(mut port: Port) -> Self {
        let (event_sender, events) = mpsc::channel();
        port.connect_state(event_sender.clone());
        for pin in 0..port.pin_count() {
            port.connect_input(pin, event_sender.clone());
        }
        let (diagnostic_sender, diagnostics) = mpsc::channel();
        port.connect_diagnostics(diagnostic_sender);
        Self {
            port,
            events,
            diagnostics,
        }
    }

    pub fn port(&self) -> &Port {
        &self.port
    }

    /// Plays a single step. Diagnostics come first in the returned records,
    /// then the read value, if any, and then the notifications in the order
    /// they were sent.
    pub fn step(&mut self, step: &Step) -> Result<Vec<Record>, ScriptError> {
        let mut read = None;
        match step {
            Step::Enable { value } => self.port.set_enabled(*value),
            Step::Reset { hold } => self.port.set_held_in_reset(*hold),
            Step::DeviceReset => self.port.reset(),
            Step::Write { offset, value } => self.port.write_register(offset.resolve()?, *value),
            Step::Read { offset } => {
                let offset = offset.resolve()?;
                read = Some(Record::Read {
                    offset,
                    value: self.port.read_register(offset),
                });
            }
            Step::Drive { pin, level } => {
                if *pin >= self.port.pin_count() {
                    return Err(ScriptError::PinOutOfRange {
                        pin: *pin,
                        pin_count: self.port.pin_count(),
                    });
                }
                self.port.set_external_drive(*pin, *level);
            }
        }
        let records = self
            .diagnostics
            .try_iter()
            .map(Record::Diagnostic)
            .chain(read)
            .chain(self.events.try_iter().map(Record::Event))
            .collect();
        Ok(records)
    }

    pub fn run(&mut self, steps: &[Step]) -> Result<Vec<Record>, ScriptError> {
        let mut records = Vec::new();
        for step in steps {
            records.extend(self.step(step)?);
        }
        Ok(records)
    }
}
