//! Jumps, calls, returns, RST, DI/EI, IM, and RETN/RETI.
//!
//! Grounded on the teacher's `core/src/cpu/z80/branch.rs`: condition-code
//! evaluation, MEMPTR updates on every jump/call/return, and the "CALL
//! cc,nn still reads both address bytes even when not taken" detail are
//! all kept. Collapsed to one push/pop per call instead of the teacher's
//! byte-at-a-time handler cycles.

use crate::bus::Bus;
use crate::cpu::z80::Z80;

impl Z80 {
    fn push16(&mut self, bus: &mut dyn Bus, val: u16) {
        self.sp = self.sp.wrapping_sub(1);
        bus.write(self.sp, (val >> 8) as u8);
        self.sp = self.sp.wrapping_sub(1);
        bus.write(self.sp, val as u8);
    }

    fn pop16(&mut self, bus: &mut dyn Bus) -> u16 {
        let low = bus.read(self.sp);
        self.sp = self.sp.wrapping_add(1);
        let high = bus.read(self.sp);
        self.sp = self.sp.wrapping_add(1);
        ((high as u16) << 8) | low as u16
    }

    fn read_nn(&mut self, bus: &mut dyn Bus) -> u16 {
        let low = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        let high = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        ((high as u16) << 8) | low as u16
    }

    /// JP nn — 10T
    pub(super) fn op_jp_nn(&mut self, bus: &mut dyn Bus) -> u32 {
        let addr = self.read_nn(bus);
        self.memptr = addr;
        self.pc = addr;
        6
    }

    /// JP cc,nn — 10T always (condition only gates whether PC is loaded)
    pub(super) fn op_jp_cc_nn(&mut self, opcode: u8, bus: &mut dyn Bus) -> u32 {
        let cc = (opcode >> 3) & 0x07;
        let addr = self.read_nn(bus);
        self.memptr = addr;
        if self.eval_condition(cc) {
            self.pc = addr;
        }
        6
    }

    /// JR e — 12T
    pub(super) fn op_jr_e(&mut self, bus: &mut dyn Bus) -> u32 {
        let disp = bus.read(self.pc) as i8;
        self.pc = self.pc.wrapping_add(1);
        self.pc = self.pc.wrapping_add(disp as i16 as u16);
        self.memptr = self.pc;
        8
    }

    /// JR cc,e — 12T taken / 7T not taken
    pub(super) fn op_jr_cc_e(&mut self, opcode: u8, bus: &mut dyn Bus) -> u32 {
        let cc = (opcode >> 3) & 0x03;
        let disp = bus.read(self.pc) as i8;
        self.pc = self.pc.wrapping_add(1);
        if self.eval_condition(cc) {
            self.pc = self.pc.wrapping_add(disp as i16 as u16);
            self.memptr = self.pc;
            8
        } else {
            3
        }
    }

    /// JP (HL)/(IX)/(IY) — 4T
    pub(super) fn op_jp_hl(&mut self) -> u32 {
        self.pc = self.get_rp(2);
        0
    }

    /// DJNZ e — 13T taken / 8T not taken
    pub(super) fn op_djnz(&mut self, bus: &mut dyn Bus) -> u32 {
        self.b = self.b.wrapping_sub(1);
        let disp = bus.read(self.pc) as i8;
        self.pc = self.pc.wrapping_add(1);
        if self.b != 0 {
            self.pc = self.pc.wrapping_add(disp as i16 as u16);
            self.memptr = self.pc;
            9
        } else {
            4
        }
    }

    /// CALL nn — 17T
    pub(super) fn op_call_nn(&mut self, bus: &mut dyn Bus) -> u32 {
        let addr = self.read_nn(bus);
        self.memptr = addr;
        self.push16(bus, self.pc);
        self.pc = addr;
        13
    }

    /// CALL cc,nn — 17T taken / 10T not taken
    pub(super) fn op_call_cc_nn(&mut self, opcode: u8, bus: &mut dyn Bus) -> u32 {
        let cc = (opcode >> 3) & 0x07;
        let addr = self.read_nn(bus);
        self.memptr = addr;
        if self.eval_condition(cc) {
            self.push16(bus, self.pc);
            self.pc = addr;
            13
        } else {
            6
        }
    }

    /// RET — 10T
    pub(super) fn op_ret(&mut self, bus: &mut dyn Bus) -> u32 {
        let addr = self.pop16(bus);
        self.pc = addr;
        self.memptr = addr;
        6
    }

    /// RET cc — 11T taken / 5T not taken
    pub(super) fn op_ret_cc(&mut self, opcode: u8, bus: &mut dyn Bus) -> u32 {
        let cc = (opcode >> 3) & 0x07;
        if self.eval_condition(cc) {
            let addr = self.pop16(bus);
            self.pc = addr;
            self.memptr = addr;
            7
        } else {
            1
        }
    }

    /// RST p — 11T
    pub(super) fn op_rst(&mut self, opcode: u8, bus: &mut dyn Bus) -> u32 {
        let target = (opcode & 0x38) as u16;
        self.push16(bus, self.pc);
        self.pc = target;
        self.memptr = self.pc;
        7
    }

    pub(super) fn op_di(&mut self) -> u32 {
        self.iff1 = false;
        self.iff2 = false;
        0
    }

    pub(super) fn op_ei(&mut self) -> u32 {
        self.iff1 = true;
        self.iff2 = true;
        self.ei_delay = true;
        0
    }

    /// RETN/RETI (ED) — 14T: pop PC, copy IFF2 into IFF1.
    pub(super) fn op_retn(&mut self, _opcode: u8, bus: &mut dyn Bus) -> u32 {
        self.iff1 = self.iff2;
        let addr = self.pop16(bus);
        self.pc = addr;
        self.memptr = addr;
        6
    }

    /// IM 0/1/2 (ED) — 8T
    pub(super) fn op_im(&mut self, opcode: u8) -> u32 {
        self.im = match (opcode >> 3) & 0x03 {
            0 | 1 => 0,
            2 => 1,
            3 => 2,
            _ => unreachable!(),
        };
        0
    }
}
