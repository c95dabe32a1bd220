use spectrum_z80_core::cpu::Z80;
mod common;
use common::TestBus;

#[test]
fn nmi_is_edge_triggered_and_preserves_iff2() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.pc = 0x0100;
    cpu.sp = 0x1000;
    cpu.iff1 = true;
    cpu.iff2 = true;
    bus.load(0x0100, &[0x00]); // NOP
    bus.load(0x0066, &[0x00]);

    cpu.step(&mut bus); // NOP
    assert_eq!(cpu.pc, 0x0101);

    bus.nmi = true;
    let outcome = cpu.step(&mut bus);
    assert_eq!(outcome.t_states, 11);
    assert_eq!(cpu.pc, 0x0066);
    assert_eq!(cpu.sp, 0x0FFE);
    assert_eq!(bus.memory[0x0FFF], 0x01);
    assert_eq!(bus.memory[0x0FFE], 0x01);
    assert!(!cpu.iff1, "IFF1 should be cleared");
    assert!(cpu.iff2, "IFF2 should be preserved for RETN");
}

#[test]
fn nmi_does_not_retrigger_while_held_high() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.pc = 0x0100;
    bus.load(0x0100, &[0x00, 0x00, 0x00]);
    bus.load(0x0066, &[0x00]);

    bus.nmi = true;
    cpu.step(&mut bus);
    assert_eq!(cpu.pc, 0x0066, "rising edge on the very first sample fires");

    cpu.pc = 0x0100;
    cpu.step(&mut bus); // nmi still held high, no new edge
    assert_eq!(cpu.pc, 0x0101, "no retrigger without a falling-then-rising edge");
}

#[test]
fn irq_im1_vectors_to_0038() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.pc = 0x0200;
    cpu.sp = 0x1000;
    cpu.iff1 = true;
    cpu.iff2 = true;
    cpu.im = 1;
    bus.load(0x0200, &[0x00]);
    bus.load(0x0038, &[0x00]);
    bus.irq = true;

    let outcome = cpu.step(&mut bus);
    assert_eq!(outcome.t_states, 13);
    assert_eq!(cpu.pc, 0x0038);
    assert!(!cpu.iff1);
    assert!(!cpu.iff2);
}

#[test]
fn irq_is_masked_by_iff1() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.pc = 0x0200;
    cpu.iff1 = false;
    cpu.im = 1;
    bus.load(0x0200, &[0x00, 0x00]);
    bus.irq = true;

    cpu.step(&mut bus);
    assert_eq!(cpu.pc, 0x0201, "masked IRQ should just let the NOP run");
}

#[test]
fn irq_im0_behaves_as_im1() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.pc = 0x0200;
    cpu.sp = 0x1000;
    cpu.iff1 = true;
    cpu.im = 0;
    bus.load(0x0200, &[0x00]);
    bus.load(0x0038, &[0x00]);
    bus.irq = true;

    cpu.step(&mut bus);
    assert_eq!(cpu.pc, 0x0038);
}

#[test]
fn irq_im2_reads_a_vector_from_the_i_register_table() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.pc = 0x0200;
    cpu.sp = 0x1000;
    cpu.iff1 = true;
    cpu.im = 2;
    cpu.i = 0x80;
    bus.irq_vector = 0xFE;
    bus.write(0x80FE, 0x34);
    bus.write(0x80FF, 0x12);
    bus.load(0x0200, &[0x00]);
    bus.irq = true;

    let outcome = cpu.step(&mut bus);
    assert_eq!(outcome.t_states, 19);
    assert_eq!(cpu.pc, 0x1234);
}

#[test]
fn halt_re_executes_as_a_4t_nop_until_woken() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.pc = 0x0100;
    bus.load(0x0100, &[0x76]); // HALT

    cpu.step(&mut bus);
    assert!(cpu.halted);

    let outcome = cpu.step(&mut bus);
    assert_eq!(outcome.t_states, 4);
    assert!(cpu.halted);
}

#[test]
fn halt_wakes_on_irq_and_returns_past_the_halt() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.pc = 0x0100;
    cpu.sp = 0x1000;
    cpu.iff1 = true;
    cpu.im = 1;
    bus.load(0x0100, &[0x76]);
    bus.load(0x0038, &[0x00]);

    cpu.step(&mut bus); // HALT
    assert!(cpu.halted);

    bus.irq = true;
    cpu.step(&mut bus);
    assert!(!cpu.halted);
    assert_eq!(cpu.pc, 0x0038);
    assert_eq!(bus.memory[0x0FFE], 0x01, "return address is past the HALT opcode");
}

#[test]
fn nmi_takes_priority_over_a_simultaneous_irq() {
    let mut cpu = Z80::new();
    let mut bus = TestBus::new();
    cpu.pc = 0x0100;
    cpu.sp = 0x1000;
    cpu.iff1 = true;
    cpu.im = 1;
    bus.load(0x0100, &[0x00]);
    bus.load(0x0038, &[0x00]);
    bus.load(0x0066, &[0x00]);
    bus.nmi = true;
    bus.irq = true;

    cpu.step(&mut bus);
    assert_eq!(cpu.pc, 0x0066);
}
