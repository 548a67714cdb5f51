//! Export and import of the complete port state, for saving and restoring a
//! running emulation.

use super::Port;
use crate::pin;
use serde::Deserialize;
use serde::Serialize;

/// Everything that a port needs to resume exactly where it left off. The
/// family, port name and pin count are construction parameters, so they are
/// not part of the state.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortState {
    pub moder: u32,
    pub otyper: u32,
    pub ospeedr: u32,
    pub pupdr: u32,
    pub idr: u32,
    pub odr: u32,
    pub lckr: u32,
    pub afrl: u32,
    pub afrh: u32,
    pub held_in_reset: bool,
    pub powered: bool,
    pub external_levels: u32,
    pub external_mask: u32,
}

impl PortState {
    pub fn to_json(&self) -> Result<String, SnapshotError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, SnapshotError> {
        Ok(serde_json::from_str(json)?)
    }
}

#[derive(thiserror::Error, Debug)]
pub enum SnapshotError {
    #[error("Snapshot drives pins {mask:#06X} from outside, but the port only has {pin_count} pins")]
    MissingPins { mask: u32, pin_count: usize },

    #[error("Snapshot has levels {levels:#06X} on pins that the port doesn't have ({pin_count} pins)")]
    MissingPinLevels { levels: u32, pin_count: usize },

    #[error("Unable to (de)serialize the snapshot: {0}")]
    Json(#[from] serde_json::Error),
}

impl Port {
    pub fn export_state(&self) -> PortState {
        PortState {
            moder: self.reg_moder,
            otyper: self.reg_otyper,
            ospeedr: self.reg_ospeedr,
            pupdr: self.reg_pupdr,
            idr: self.reg_idr,
            odr: self.reg_odr,
            lckr: self.reg_lckr,
            afrl: self.reg_afrl,
            afrh: self.reg_afrh,
            held_in_reset: self.held_in_reset,
            powered: self.powered,
            external_levels: self.external_levels,
            external_mask: self.external_mask,
        }
    }

    /// Restores a previously exported state. Nothing gets resolved and no
    /// sinks are notified; `IDR` comes straight from the snapshot. Since
    /// resolution is idempotent, the caller may still call
    /// [`resolve`](Port::resolve) afterwards to let the neighbors catch up.
    pub fn import_state(&mut self, state: PortState) -> Result<(), SnapshotError> {
        let pin_mask = pin::pin_mask(self.pin_count);
        let missing_pins = state.external_mask & !pin_mask;
        if missing_pins != 0 {
            return Err(SnapshotError::MissingPins {
                mask: missing_pins,
                pin_count: self.pin_count,
            });
        }
        let missing_levels = state.idr & !pin_mask;
        if missing_levels != 0 {
            return Err(SnapshotError::MissingPinLevels {
                levels: missing_levels,
                pin_count: self.pin_count,
            });
        }
        self.reg_moder = state.moder;
        self.reg_otyper = state.otyper;
        self.reg_ospeedr = state.ospeedr;
        self.reg_pupdr = state.pupdr;
        self.reg_idr = state.idr;
        self.reg_odr = state.odr;
        self.reg_lckr = state.lckr;
        self.reg_afrl = state.afrl;
        self.reg_afrh = state.afrh;
        self.held_in_reset = state.held_in_reset;
        self.powered = state.powered;
        self.external_levels = state.external_levels;
        self.external_mask = state.external_mask;
        Ok(())
    }
}
