//! An emulated STM32 general purpose I/O port: the register file, the pin
//! level resolution and the signals that connect a port to the rest of an
//! emulated board.

pub mod address_space;
pub mod diagnostics;
pub mod family;
pub mod pin;
pub mod port;
pub mod script;
pub mod signal;

pub use address_space::AddressSpace;
pub use diagnostics::{Diagnostic, DiagnosticSink};
pub use family::{Family, PortConfig, PortName, ResetTable};
pub use pin::{Drive, Mode, Pull};
pub use port::{Port, PortState};
pub use signal::{Event, Loopback, Sink};
