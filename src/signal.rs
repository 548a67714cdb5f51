//! Output lines of a GPIO port and the sinks connected to them.
//!
//! A port has one "state changed" line, pulsed after every pin resolution, and
//! one "input changed" line per pin. Sinks are called synchronously, in the
//! order they were connected. A sink can't borrow the port that calls it, so
//! anything it wants to drive back onto the port's pins goes through a
//! [`Loopback`]; the port applies these requests once the current resolution
//! pass has been fully delivered.

use crate::pin::Drive;
use log::debug;
use std::fmt;
use std::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    /// The level of a pin configured as input has changed.
    InputChanged { pin: usize, level: bool },
    /// The port has finished resolving its pins. Emitted after every
    /// resolution, whether anything changed or not.
    StateChanged,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Event::InputChanged { pin, level } => {
                write!(f, "input {} -> {}", pin, if *level { 1 } else { 0 })
            }
            Event::StateChanged => write!(f, "state changed"),
        }
    }
}

#[cfg_attr(test, mockall::automock)]
pub trait Sink {
    fn notify(&mut self, event: Event, loopback: &mut Loopback);
}

/// Forwards events to a channel. A hung-up receiver is not an error: the
/// events are simply dropped.
impl Sink for mpsc::Sender<Event> {
    fn notify(&mut self, event: Event, _loopback: &mut Loopback) {
        if self.send(event).is_err() {
            debug!("Dropping {:?}, receiver is gone", event);
        }
    }
}

/// Collects external drive changes requested by sinks while a port is
/// notifying them.
#[derive(Debug, Default)]
pub struct Loopback {
    requests: Vec<(usize, Drive)>,
}

impl Loopback {
    pub fn drive(&mut self, pin: usize, drive: impl Into<Drive>) {
        self.requests.push((pin, drive.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub(crate) fn take(&mut self) -> Vec<(usize, Drive)> {
        std::mem::take(&mut self.requests)
    }
}

/// Subscriber lists of all output lines of a port.
pub struct Signals {
    state: Vec<Box<dyn Sink>>,
    inputs: Vec<Vec<Box<dyn Sink>>>,
}

impl Signals {
    pub fn new(pin_count: usize) -> Self {
        Self {
            state: Vec::new(),
            inputs: (0..pin_count).map(|_| Vec::new()).collect(),
        }
    }

    pub fn connect_state(&mut self, sink: impl Sink + 'static) {
        self.state.push(Box::new(sink));
    }

    /// Connects a sink to the "input changed" line of a given pin. Panics if
    /// the pin doesn't exist.
    pub fn connect_input(&mut self, pin: usize, sink: impl Sink + 'static) {
        assert!(
            pin < self.inputs.len(),
            "Pin {} out of range, the port has {} pins",
            pin,
            self.inputs.len()
        );
        self.inputs[pin].push(Box::new(sink));
    }

    pub fn emit(&mut self, event: Event, loopback: &mut Loopback) {
        let sinks = match event {
            Event::InputChanged { pin, .. } => &mut self.inputs[pin],
            Event::StateChanged => &mut self.state,
        };
        for sink in sinks.iter_mut() {
            sink.notify(event, loopback);
        }
    }
}

impl fmt::Debug for Signals {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let input_sinks: Vec<usize> = self.inputs.iter().map(Vec::len).collect();
        f.debug_struct("Signals")
            .field("state sinks", &self.state.len())
            .field("input sinks", &input_sinks)
            .finish()
    }
}
