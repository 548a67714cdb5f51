//! Reporting of guest errors: register accesses the port refuses and pins
//! shorted between the chip and an external driver. None of these stop the
//! emulation. Each is logged as a warning and handed to the connected
//! [`DiagnosticSink`]s.

use crate::family::PortName;
use log::warn;
use mmio::memory::AccessError;
use std::cell::RefCell;
use std::fmt;
use std::sync::mpsc;

#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Diagnostic {
    #[error(transparent)]
    Access(#[from] AccessError),

    /// The pin is configured as output and driven from outside at the same
    /// time.
    #[error("Pin {pin} short circuited")]
    DriveHazard { pin: usize },
}

impl Diagnostic {
    pub fn is_drive_hazard(&self) -> bool {
        matches!(self, Diagnostic::DriveHazard { .. })
    }

    pub fn is_invalid_offset(&self) -> bool {
        matches!(self, Diagnostic::Access(AccessError::InvalidOffset { .. }))
    }

    pub fn is_disabled_access(&self) -> bool {
        matches!(self, Diagnostic::Access(AccessError::Disabled { .. }))
    }
}

pub trait DiagnosticSink {
    fn report(&mut self, port: PortName, diagnostic: &Diagnostic);
}

impl DiagnosticSink for mpsc::Sender<Diagnostic> {
    fn report(&mut self, _port: PortName, diagnostic: &Diagnostic) {
        // Nobody listens anymore; the warning has been logged anyway.
        let _ = self.send(*diagnostic);
    }
}

/// Diagnostic output of a single port. Reports may come from read accesses,
/// hence the interior mutability.
pub struct Diagnostics {
    port: PortName,
    sinks: RefCell<Vec<Box<dyn DiagnosticSink>>>,
}

impl Diagnostics {
    pub fn new(port: PortName) -> Self {
        Self {
            port,
            sinks: RefCell::new(Vec::new()),
        }
    }

    pub fn connect(&mut self, sink: impl DiagnosticSink + 'static) {
        self.sinks.get_mut().push(Box::new(sink));
    }

    pub fn report(&self, diagnostic: impl Into<Diagnostic>) {
        let diagnostic = diagnostic.into();
        warn!("GPIO{}: {}", self.port, diagnostic);
        for sink in self.sinks.borrow_mut().iter_mut() {
            sink.report(self.port, &diagnostic);
        }
    }
}

impl fmt::Debug for Diagnostics {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Diagnostics")
            .field("port", &self.port)
            .field("sinks", &self.sinks.borrow().len())
            .finish()
    }
}
