#![cfg(test)]

use super::*;
use crate::signal::MockSink;
use std::sync::mpsc;

/// Pin mode bits for a given pin, ready to be OR-ed into `MODER`.
fn moder(pin: usize, mode: Mode) -> u32 {
    mode.bits() << (2 * pin)
}

fn pupdr(pin: usize, pull: Pull) -> u32 {
    pull.bits() << (2 * pin)
}

fn port_with(family: Family, name: PortName) -> Port {
    let mut port = Port::with_config(PortConfig::new(family, name)).unwrap();
    port.set_enabled(true);
    return port;
}

/// An enabled 16-pin port that resets to all-zero registers.
fn plain_port() -> Port {
    port_with(Family::F1, PortName::A)
}

/// Connects a channel to the state line and to the input lines of all pins.
fn listen(port: &mut Port) -> mpsc::Receiver<Event> {
    let (tx, rx) = mpsc::channel();
    port.connect_state(tx.clone());
    for pin in 0..port.pin_count() {
        port.connect_input(pin, tx.clone());
    }
    return rx;
}

fn listen_diagnostics(port: &mut Port) -> mpsc::Receiver<Diagnostic> {
    let (tx, rx) = mpsc::channel();
    port.connect_diagnostics(tx);
    return rx;
}

fn input_events(rx: &mpsc::Receiver<Event>) -> Vec<Event> {
    rx.try_iter()
        .filter(|event| *event != Event::StateChanged)
        .collect()
}

#[test]
fn rejects_illegal_pin_counts() {
    for pin_count in [0, 17, 32] {
        let config = PortConfig::default().with_pin_count(pin_count);
        assert!(matches!(
            Port::with_config(config),
            Err(ConfigError::PinCount(n)) if n == pin_count
        ));
    }
}

#[test]
fn starts_disabled_with_reset_values() {
    let port = Port::with_config(PortConfig::new(Family::F4, PortName::A)).unwrap();
    assert!(!port.powered());
    assert!(!port.held_in_reset());
    assert_eq!(port.export_state().moder, 0xA800_0000);
    assert_eq!(port.export_state().pupdr, 0x6400_0000);
    // Pin 13 is pulled up, pin 14 pulled down, pin 15 pulled up; none of them
    // is an input, but with no driver the pull still decides.
    assert_eq!(port.levels(), 0b1010_0000_0000_0000);
}

#[test]
fn pull_up_inputs_read_high() {
    let mut port = plain_port();
    port.write_register(registers::ODR, 0x0000);
    port.write_register(registers::PUPDR, pupdr(0, Pull::Up) | pupdr(1, Pull::Down));
    assert_eq!(port.read_register(registers::IDR), 0b01);

    // ODR doesn't matter for input pins.
    for odr in [0x0000, 0xFFFF, 0x0001, 0x0002] {
        port.write_register(registers::ODR, odr);
        assert_eq!(port.read_register(registers::IDR), 0b01);
    }
}

#[test]
fn output_pins_follow_odr() {
    let mut port = plain_port();
    port.write_register(registers::MODER, 0x5555_5555);
    for pin in 0..16 {
        port.write_register(registers::ODR, 1 << pin);
        assert_eq!(port.read_register(registers::IDR), 1 << pin);
    }
    port.write_register(registers::ODR, 0xBEEF);
    assert_eq!(port.read_register(registers::IDR), 0xBEEF);
}

#[test]
fn output_driver_beats_pull() {
    let mut port = plain_port();
    port.write_register(registers::MODER, moder(4, Mode::Output));
    port.write_register(registers::PUPDR, pupdr(4, Pull::Up));
    assert!(!port.level(4));
    port.write_register(registers::ODR, 1 << 4);
    assert!(port.level(4));
}

#[test]
fn external_drive_overrides_output() {
    let mut port = plain_port();
    let diagnostics = listen_diagnostics(&mut port);
    port.write_register(registers::MODER, moder(5, Mode::Output));
    port.write_register(registers::ODR, 0);
    assert!(diagnostics.try_iter().next().is_none());

    port.set_external_drive(5, true);
    assert!(port.level(5));
    itertools::assert_equal(
        diagnostics.try_iter(),
        [Diagnostic::DriveHazard { pin: 5 }],
    );

    port.set_external_drive(5, false);
    port.write_register(registers::ODR, 1 << 5);
    assert!(!port.level(5));

    port.set_external_drive(5, None);
    assert!(port.level(5));
}

#[test]
fn external_drive_on_other_modes_is_no_hazard() {
    let mut port = plain_port();
    let diagnostics = listen_diagnostics(&mut port);
    port.write_register(
        registers::MODER,
        moder(0, Mode::AlternateFunction) | moder(1, Mode::Analog),
    );
    port.set_external_drive(0, true);
    port.set_external_drive(1, true);
    port.set_external_drive(2, true);
    assert_eq!(port.levels(), 0b111);
    assert!(diagnostics.try_iter().next().is_none());
}

#[test]
fn bsrr_set_wins_over_reset() {
    let mut port = plain_port();
    port.write_register(registers::ODR, 0b1100);
    // Set bits 0 and 1, reset bits 1 and 2.
    port.write_register(registers::BSRR, 0b0110 << 16 | 0b0011);
    assert_eq!(port.read_register(registers::ODR), 0b1011);
    // BSRR is write-only.
    assert_eq!(port.read_register(registers::BSRR), 0);
    assert_eq!(port.read(registers::BSRR), Ok(0));
}

#[test]
fn brr_clears_requested_bits() {
    let mut port = plain_port();
    port.write_register(registers::ODR, 0xF0F0);
    assert_eq!(port.write(registers::BRR, 0x1_8010), Ok(()));
    assert_eq!(port.read_register(registers::ODR), 0x70E0);
    assert_eq!(port.read(registers::BRR), Ok(0));
}

#[test]
fn brr_missing_on_f4() {
    let mut port = port_with(Family::F4, PortName::C);
    let diagnostics = listen_diagnostics(&mut port);
    port.write_register(registers::ODR, 0xF0F0);
    assert_eq!(
        port.write(registers::BRR, 0x8010),
        Err(AccessError::InvalidOffset {
            access: Access::Write,
            offset: registers::BRR
        })
    );
    assert_eq!(port.read_register(registers::ODR), 0xF0F0);
    assert_eq!(
        port.read(registers::BRR),
        Err(AccessError::InvalidOffset {
            access: Access::Read,
            offset: registers::BRR
        })
    );
    let reported: Vec<Diagnostic> = diagnostics.try_iter().collect();
    assert_eq!(reported.len(), 2);
    assert!(reported.iter().all(Diagnostic::is_invalid_offset));
}

#[test]
fn idr_is_read_only() {
    let mut port = plain_port();
    port.write_register(registers::PUPDR, pupdr(7, Pull::Up));
    let before = port.export_state();
    assert_eq!(port.write(registers::IDR, 0x1234), Ok(()));
    assert_eq!(port.export_state(), before);
    assert_eq!(port.read_register(registers::IDR), 1 << 7);
    assert_eq!(port.read_register(registers::IDR), port.levels());
}

#[test]
fn stores_configuration_registers() {
    let mut port = plain_port();
    let values = [
        (registers::OTYPER, 0x0000_00FF),
        (registers::OSPEEDR, 0xFFFF_0000),
        (registers::LCKR, 0x0001_0003),
        (registers::AFRL, 0x7777_7777),
        (registers::AFRH, 0x0000_AAAA),
    ];
    for (offset, value) in values {
        port.write_register(offset, value);
    }
    for (offset, value) in values {
        assert_eq!(port.read_register(offset), value, "{:?}", registers::name(offset));
    }
    // None of these affects the pin levels.
    assert_eq!(port.levels(), 0);
}

#[test]
fn invalid_offsets() {
    let mut port = plain_port();
    let diagnostics = listen_diagnostics(&mut port);
    let events = listen(&mut port);
    let before = port.export_state();

    assert_eq!(
        port.write(0x2C, 0xFFFF_FFFF),
        Err(AccessError::InvalidOffset {
            access: Access::Write,
            offset: 0x2C
        })
    );
    assert_eq!(port.read_register(0x3FC), 0);
    assert_eq!(port.read_register(0x02), 0);
    assert_eq!(port.export_state(), before);
    assert_eq!(diagnostics.try_iter().count(), 3);
    // A write always ends with a resolution, even a refused one.
    itertools::assert_equal(events.try_iter(), [Event::StateChanged]);
}

#[test]
fn input_change_notifications() {
    let mut port = plain_port();
    let events = listen(&mut port);

    port.write_register(registers::PUPDR, pupdr(2, Pull::Up) | pupdr(9, Pull::Up));
    itertools::assert_equal(
        events.try_iter(),
        [
            Event::InputChanged { pin: 2, level: true },
            Event::InputChanged { pin: 9, level: true },
            Event::StateChanged,
        ],
    );

    // Nothing changes, but the state line pulses anyway.
    port.write_register(registers::PUPDR, pupdr(2, Pull::Up) | pupdr(9, Pull::Up));
    itertools::assert_equal(events.try_iter(), [Event::StateChanged]);

    port.set_external_drive(9, false);
    itertools::assert_equal(
        events.try_iter(),
        [
            Event::InputChanged { pin: 9, level: false },
            Event::StateChanged,
        ],
    );
}

#[test]
fn non_input_pins_dont_notify() {
    let mut port = plain_port();
    port.write_register(
        registers::MODER,
        moder(0, Mode::Output) | moder(1, Mode::AlternateFunction) | moder(2, Mode::Analog),
    );
    let events = listen(&mut port);
    port.write_register(registers::ODR, 0b001);
    port.set_external_drive(1, true);
    port.set_external_drive(2, true);
    assert_eq!(port.levels(), 0b111);
    assert!(input_events(&events).is_empty());
}

#[test]
fn input_lines_are_separate() {
    let mut port = plain_port();
    let mut pin3 = MockSink::new();
    pin3.expect_notify()
        .withf(|event, _| *event == Event::InputChanged { pin: 3, level: true })
        .times(1)
        .return_const(());
    let mut state = MockSink::new();
    state
        .expect_notify()
        .withf(|event, _| *event == Event::StateChanged)
        .times(2)
        .return_const(());
    port.connect_input(3, pin3);
    port.connect_state(state);

    port.set_external_drive(4, true);
    port.set_external_drive(3, true);
}

#[test]
fn disabled_port_ignores_accesses() {
    let mut port = plain_port();
    port.write_register(registers::MODER, 0x5555_5555);
    port.write_register(registers::ODR, 0x00FF);
    port.write_register(registers::AFRH, 0x1111_1111);
    let diagnostics = listen_diagnostics(&mut port);

    port.set_enabled(false);
    assert!(!port.powered());
    for offset in (registers::MODER..=registers::BRR).step_by(4) {
        assert_eq!(port.read_register(offset), 0);
    }
    assert_eq!(
        port.write(registers::ODR, 0xFF00),
        Err(AccessError::Disabled {
            access: Access::Write,
            offset: registers::ODR
        })
    );
    port.write_register(registers::MODER, 0);
    assert!(diagnostics.try_iter().all(|d| d.is_disabled_access()));

    port.set_enabled(true);
    assert_eq!(port.read_register(registers::MODER), 0x5555_5555);
    assert_eq!(port.read_register(registers::ODR), 0x00FF);
    assert_eq!(port.read_register(registers::AFRH), 0x1111_1111);
    assert_eq!(port.read_register(registers::IDR), 0x00FF);
}

#[test]
fn enable_acts_on_transitions_only() {
    let mut port = plain_port();
    let events = listen(&mut port);
    port.set_enabled(true);
    assert_eq!(events.try_iter().count(), 0);
    port.set_enabled(false);
    port.set_enabled(false);
    port.set_enabled(true);
    itertools::assert_equal(events.try_iter(), [Event::StateChanged, Event::StateChanged]);
}

#[test]
fn drive_works_while_disabled() {
    let mut port = Port::with_config(PortConfig::default()).unwrap();
    let events = listen(&mut port);
    port.set_external_drive(0, true);
    assert!(port.level(0));
    assert_eq!(port.read_register(registers::IDR), 0);
    itertools::assert_equal(
        events.try_iter(),
        [Event::InputChanged { pin: 0, level: true }, Event::StateChanged],
    );
}

#[test]
fn entering_reset_restores_defaults() {
    let mut port = port_with(Family::F4, PortName::B);
    let defaults = ResetTable::builtin().defaults(Family::F4, PortName::B);
    port.write_register(registers::MODER, 0xFFFF_FFFF);
    port.write_register(registers::OSPEEDR, 0);
    port.write_register(registers::PUPDR, 0x5555_5555);
    port.write_register(registers::ODR, 0xFFFF);
    port.write_register(registers::LCKR, 0x1_0000);

    port.set_held_in_reset(true);
    let state = port.export_state();
    assert_eq!(state.moder, defaults.moder);
    assert_eq!(state.otyper, defaults.otyper);
    assert_eq!(state.ospeedr, defaults.ospeedr);
    assert_eq!(state.pupdr, defaults.pupdr);
    assert_eq!(state.odr, defaults.odr);
    assert_eq!(state.lckr, defaults.lckr);
    assert_eq!(state.afrl, defaults.afrl);
    assert_eq!(state.afrh, defaults.afrh);
    // Pin 4 is pulled up.
    assert_eq!(state.idr, 1 << 4);
    assert!(state.powered);
}

#[test]
fn writes_refused_while_held_in_reset() {
    let mut port = plain_port();
    port.set_held_in_reset(true);
    let events = listen(&mut port);
    let diagnostics = listen_diagnostics(&mut port);

    assert_eq!(
        port.write(registers::ODR, 0xFFFF),
        Err(AccessError::HeldInReset {
            offset: registers::ODR,
            value: 0xFFFF
        })
    );
    assert_eq!(port.read_register(registers::ODR), 0);
    assert_eq!(diagnostics.try_iter().count(), 1);
    assert_eq!(events.try_iter().count(), 0);
}

#[test]
fn leaving_reset_only_resolves() {
    let mut port = plain_port();
    port.set_held_in_reset(true);
    let events = listen(&mut port);
    let before = port.export_state();

    port.set_held_in_reset(false);
    assert_eq!(
        port.export_state(),
        PortState {
            held_in_reset: false,
            ..before
        }
    );
    itertools::assert_equal(events.try_iter(), [Event::StateChanged]);

    port.write_register(registers::ODR, 0x0F);
    assert_eq!(port.read_register(registers::ODR), 0x0F);
}

#[test]
fn reset_line_acts_on_transitions_only() {
    let mut port = plain_port();
    let events = listen(&mut port);
    port.set_held_in_reset(false);
    assert_eq!(events.try_iter().count(), 0);
}

#[test]
fn device_reset_keeps_lifecycle_and_drive() {
    let mut port = port_with(Family::F4, PortName::A);
    port.write_register(registers::MODER, 0);
    port.set_external_drive(0, true);
    port.reset();
    assert!(port.powered());
    assert_eq!(port.read_register(registers::MODER), 0xA800_0000);
    assert_eq!(port.external_drive(0), Drive::High);
    assert!(port.level(0));
}

#[test]
fn custom_reset_table() {
    let mut table = ResetTable::empty();
    table.insert(
        Family::G4,
        PortName::D,
        RegisterDefaults {
            moder: 0xFFFF_FFFF,
            ..Default::default()
        },
    );
    let port = Port::new(PortConfig::new(Family::G4, PortName::D), &table).unwrap();
    assert_eq!(port.mode(0), Mode::Analog);
    assert_eq!(port.mode(15), Mode::Analog);
    let port = Port::new(PortConfig::new(Family::G4, PortName::E), &table).unwrap();
    assert_eq!(port.mode(0), Mode::Input);
}

#[test]
fn short_ports() {
    let mut port =
        Port::with_config(PortConfig::new(Family::L0, PortName::H).with_pin_count(2)).unwrap();
    port.set_enabled(true);
    port.write_register(registers::PUPDR, 0x5555_5555);
    // Only the existing pins get resolved.
    assert_eq!(port.read_register(registers::IDR), 0b11);
    assert_eq!(port.read_register(registers::PUPDR), 0x5555_5555);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic]
fn drive_on_missing_pin_panics_in_debug() {
    let mut port =
        Port::with_config(PortConfig::new(Family::L0, PortName::H).with_pin_count(2)).unwrap();
    port.set_external_drive(2, true);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "Pin 16 out of range")]
fn mode_of_missing_pin_panics_in_debug() {
    plain_port().mode(16);
}

#[test]
#[cfg(debug_assertions)]
#[should_panic(expected = "Pin 4 out of range")]
fn level_of_missing_pin_panics_in_debug() {
    let port =
        Port::with_config(PortConfig::new(Family::G4, PortName::F).with_pin_count(4)).unwrap();
    port.level(4);
}

#[test]
fn resolution_is_idempotent() {
    let mut port = plain_port();
    port.write_register(registers::MODER, 0x0000_5555);
    port.write_register(registers::PUPDR, 0x5A5A_0000);
    port.write_register(registers::ODR, 0x00C3);
    port.set_external_drive(12, true);
    let state = port.export_state();
    let events = listen(&mut port);
    port.resolve();
    port.resolve();
    assert_eq!(port.export_state(), state);
    assert!(input_events(&events).is_empty());
}

#[test]
fn sinks_can_drive_pins_back() {
    let mut port = plain_port();
    // Whatever appears on pin 0 gets mirrored to pin 1.
    let mut mirror = MockSink::new();
    mirror
        .expect_notify()
        .returning(|event, loopback| {
            if let Event::InputChanged { level, .. } = event {
                loopback.drive(1, level);
            }
        });
    port.connect_input(0, mirror);
    let events = listen(&mut port);

    port.set_external_drive(0, true);
    assert!(port.level(1));
    assert_eq!(port.external_drive(1), Drive::High);
    itertools::assert_equal(
        events.try_iter(),
        [
            Event::InputChanged { pin: 0, level: true },
            Event::StateChanged,
            Event::InputChanged { pin: 1, level: true },
            Event::StateChanged,
        ],
    );

    port.set_external_drive(0, false);
    assert!(!port.level(1));
}

#[test]
fn oscillating_sinks_are_cut_off() {
    let mut port = plain_port();
    // Inverts pin 0 every time it changes.
    let mut inverter = MockSink::new();
    inverter
        .expect_notify()
        .returning(|event, loopback| {
            if let Event::InputChanged { pin: 0, level } = event {
                loopback.drive(0, !level);
            }
        });
    port.connect_input(0, inverter);
    let events = listen(&mut port);

    port.set_external_drive(0, true);
    let state_pulses = events
        .try_iter()
        .filter(|event| *event == Event::StateChanged)
        .count();
    assert_eq!(state_pulses, MAX_SETTLE_PASSES);
}

#[test]
fn pin_state() {
    let mut port = plain_port();
    port.write_register(registers::MODER, moder(6, Mode::Output));
    port.write_register(registers::PUPDR, pupdr(6, Pull::Down));
    port.write_register(registers::ODR, 1 << 6);
    assert_eq!(
        port.pin(6),
        PinState {
            mode: Mode::Output,
            pull: Pull::Down,
            requested: true,
            drive: Drive::Disconnected,
            level: true,
        }
    );
}

/// Walks through a typical hazard: an externally driven input is switched to
/// output, and then the external driver goes away.
#[test]
fn hazard_scenario() {
    let mut port = plain_port();
    let events = listen(&mut port);
    let diagnostics = listen_diagnostics(&mut port);

    port.set_external_drive(3, true);
    itertools::assert_equal(
        events.try_iter(),
        [Event::InputChanged { pin: 3, level: true }, Event::StateChanged],
    );

    port.write_register(registers::MODER, 0x1 << (2 * 3));
    itertools::assert_equal(
        diagnostics.try_iter(),
        [Diagnostic::DriveHazard { pin: 3 }],
    );
    assert!(port.level(3));
    itertools::assert_equal(events.try_iter(), [Event::StateChanged]);

    port.set_external_drive(3, None);
    assert!(!port.level(3));
    assert_eq!(port.read_register(registers::IDR) & (1 << 3), 0);
    // The pin isn't an input anymore, so only the state line pulses.
    itertools::assert_equal(events.try_iter(), [Event::StateChanged]);
    assert!(diagnostics.try_iter().next().is_none());
}
