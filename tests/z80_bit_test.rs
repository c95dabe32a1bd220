use spectrum_z80_core::cpu::Z80;
mod common;
use common::TestBus;

#[test]
fn rlc_r_rotates_and_sets_carry() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.b = 0x80;
    bus.load(0, &[0xCB, 0x00]); // RLC B

    let outcome = cpu.step(&mut bus);
    assert_eq!(outcome.t_states, 8);
    assert_eq!(cpu.b, 0x01);
    assert_ne!(cpu.f & 0x01, 0, "C should carry the old bit 7");
}

#[test]
fn sll_sets_bit_zero_undocumented() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.b = 0x00;
    bus.load(0, &[0xCB, 0x30]); // SLL B (undocumented)

    cpu.step(&mut bus);
    assert_eq!(cpu.b, 0x01, "SLL always sets bit 0");
}

#[test]
fn bit_b_hl_uses_memptr_high_byte_for_xy() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.set_hl(0x4200);
    cpu.memptr = 0xABCD;
    bus.write(0x4200, 0x00);
    bus.load(0, &[0xCB, 0x46]); // BIT 0,(HL)

    let outcome = cpu.step(&mut bus);
    assert_eq!(outcome.t_states, 12);
    assert_ne!(cpu.f & 0x40, 0, "Z should be set, bit is 0");
    assert_eq!(cpu.f & 0x28, 0xAB & 0x28, "X/Y come from MEMPTR high byte");
}

#[test]
fn res_and_set_touch_no_flags() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.a = 0xFF;
    cpu.f = 0x00;
    bus.load(0, &[0xCB, 0xBF]); // RES 7,A

    cpu.step(&mut bus);
    assert_eq!(cpu.a, 0x7F);
    assert_eq!(cpu.f, 0x00, "RES must not touch flags");
}

#[test]
fn ddcb_bit_instruction_is_20t_and_leaves_register_untouched() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.ix = 0x5000;
    bus.write(0x5003, 0x80);
    bus.load(0, &[0xDD, 0xCB, 0x03, 0x7E]); // BIT 7,(IX+3)

    let outcome = cpu.step(&mut bus);
    assert_eq!(outcome.t_states, 20);
    assert_ne!(cpu.f & 0x80, 0, "S set because tested bit 7 is 1");
}

#[test]
fn ddcb_rotate_copies_result_into_named_register() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.ix = 0x5000;
    bus.write(0x5003, 0x80);
    bus.load(0, &[0xDD, 0xCB, 0x03, 0x00]); // RLC (IX+3),B (undocumented copy-back)

    let outcome = cpu.step(&mut bus);
    assert_eq!(outcome.t_states, 23);
    assert_eq!(bus.memory[0x5003], 0x01);
    assert_eq!(cpu.b, 0x01, "the shifted result is copied into B too");
}

#[test]
fn rrd_rotates_bcd_nibble_from_memory_into_a() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.a = 0x84;
    cpu.set_hl(0x6000);
    bus.write(0x6000, 0x20);
    bus.load(0, &[0xED, 0x67]); // RRD

    let outcome = cpu.step(&mut bus);
    assert_eq!(outcome.t_states, 18);
    assert_eq!(cpu.a, 0x80);
    assert_eq!(bus.memory[0x6000], 0x42);
}
