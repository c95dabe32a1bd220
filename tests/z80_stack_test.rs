use spectrum_z80_core::cpu::Z80;
mod common;
use common::TestBus;

#[test]
fn push_decrements_sp_and_writes_high_then_low() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.sp = 0x2000;
    cpu.set_bc(0x1234);
    bus.load(0, &[0xC5]); // PUSH BC

    let outcome = cpu.step(&mut bus);
    assert_eq!(outcome.t_states, 11);
    assert_eq!(cpu.sp, 0x1FFE);
    assert_eq!(bus.memory[0x1FFE], 0x34);
    assert_eq!(bus.memory[0x1FFF], 0x12);
}

#[test]
fn pop_restores_pair_and_advances_sp() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.sp = 0x1FFE;
    bus.write(0x1FFE, 0x34);
    bus.write(0x1FFF, 0x12);
    bus.load(0, &[0xC1]); // POP BC

    let outcome = cpu.step(&mut bus);
    assert_eq!(outcome.t_states, 10);
    assert_eq!(cpu.get_bc(), 0x1234);
    assert_eq!(cpu.sp, 0x2000);
}

#[test]
fn push_pop_af_round_trips_through_the_rp_af_table() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.sp = 0x2000;
    cpu.set_af(0xBEEF);
    bus.load(0, &[0xF5, 0xE1, 0xF1]); // PUSH AF; POP HL; PUSH AF (as a stand-in for a round trip)
    cpu.step(&mut bus); // PUSH AF
    cpu.step(&mut bus); // POP HL
    assert_eq!(cpu.get_hl(), 0xBEEF, "PUSH AF/POP rr should carry the same 16 bits");
}
