//! The `.in`/`.expected` test battery harness, exercised end to end: load
//! a fixture pair, install its state, run it through a tracing bus, and
//! check the result (spec.md §4.6, §6).

use std::path::Path;

use spectrum_z80_core::cpu::Z80;
use spectrum_z80_core::io::IoBus;
use spectrum_z80_core::memory::{Memory, Model};
use spectrum_z80_core::testing::{TestBattery, TracingBus, install_registers};

fn fixture(name: &str) -> std::path::PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}

#[test]
fn ld_a_n_fixture_matches_its_expectation() {
    let battery = TestBattery::load(&fixture("ld_a_n")).expect("fixture pair should parse");
    assert_eq!(battery.count(), 1);

    let case = battery.case("ld a,n").expect("case should be named 'ld a,n'");
    let expectation = case.expectation.as_ref().expect("expectation should be joined by name");

    let mut cpu = Z80::new();
    install_registers(&mut cpu, &case.test.registers);

    let mut memory = Memory::new(Model::Spec48);
    for block in &case.test.memory {
        for (offset, &byte) in block.data.iter().enumerate() {
            memory.write_byte(block.address.wrapping_add(offset as u16), byte);
        }
    }

    let mut io = IoBus::new();
    let mut bus = TracingBus::new(&mut memory, &mut io);

    let mut t_states = 0;
    while t_states < case.test.run_t_states {
        t_states += cpu.step(&mut bus).t_states;
    }

    let failures = expectation.check(&cpu, &memory, t_states);
    assert!(failures.is_empty(), "unexpected mismatches: {failures:?}");
    assert_eq!(bus.events.len(), expectation.events.len());
    for (actual, expected) in bus.events.iter().zip(expectation.events.iter()) {
        assert_eq!(actual.time, expected.time);
        assert_eq!(actual.kind, expected.kind);
        assert_eq!(actual.address, expected.address);
        assert_eq!(actual.data, expected.data);
    }
}

#[test]
fn a_deliberately_wrong_expectation_is_caught() {
    let battery = TestBattery::load(&fixture("ld_a_n")).expect("fixture pair should parse");
    let case = battery.case("ld a,n").unwrap();
    let mut expectation = case.expectation.clone().unwrap();
    expectation.registers.af = 0xFFFF; // deliberately wrong

    let mut cpu = Z80::new();
    install_registers(&mut cpu, &case.test.registers);
    let mut memory = Memory::new(Model::Spec48);
    for block in &case.test.memory {
        for (offset, &byte) in block.data.iter().enumerate() {
            memory.write_byte(block.address.wrapping_add(offset as u16), byte);
        }
    }
    let mut io = IoBus::new();
    let mut bus = TracingBus::new(&mut memory, &mut io);

    let mut t_states = 0;
    while t_states < case.test.run_t_states {
        t_states += cpu.step(&mut bus).t_states;
    }

    let failures = expectation.check(&cpu, &memory, t_states);
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].kind, spectrum_z80_core::testing::FailureKind::AfIncorrect);
}
