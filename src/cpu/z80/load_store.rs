//! 8/16-bit loads, exchanges, and port I/O.
//!
//! Grounded on the teacher's `core/src/cpu/z80/load_store.rs`: register/
//! memory/immediate load addressing, EX instruction semantics, and the
//! `LD A,I`/`LD A,R` PV-from-IFF2 quirk are kept. The teacher's `(IX+d)`/
//! `(IY+d)` loads and IN/OUT were stubs; here they're completed via
//! [`Z80::read_index_addr`] and [`crate::bus::Bus::io_read`]/`io_write`
//! instead of the teacher's hardcoded 0xFF/discard placeholders, since
//! this core drives a real `IoBus` (spec.md §4.2).

use crate::bus::Bus;
use crate::cpu::z80::{Flag, IndexMode, Z80};

impl Z80 {
    /// LD r,n / LD (HL),n / LD (IX+d),n — 7T (reg) / 10T ((HL)) / 19T (indexed)
    pub(super) fn op_ld_r_n(&mut self, opcode: u8, bus: &mut dyn Bus) -> u32 {
        let r = (opcode >> 3) & 0x07;
        if r == 6 {
            let addr = self.read_index_addr(bus);
            bus.contend(self.pc, 2);
            let n = bus.read(self.pc);
            self.pc = self.pc.wrapping_add(1);
            bus.write(addr, n);
            if self.index_mode == IndexMode::Hl { 6 } else { 11 }
        } else {
            bus.contend(self.pc, 3);
            let n = bus.read(self.pc);
            self.pc = self.pc.wrapping_add(1);
            self.set_reg8_ix(r, n);
            3
        }
    }

    /// LD r,r' / LD r,(HL) / LD (HL),r / LD r,(IX+d) / LD (IX+d),r — 4T
    /// (reg-reg) / 7T ((HL) either direction) / 19T (indexed either direction)
    pub(super) fn op_ld_r_r(&mut self, opcode: u8, bus: &mut dyn Bus) -> u32 {
        let dst = (opcode >> 3) & 0x07;
        let src = opcode & 0x07;

        if dst == 6 && src == 6 {
            unreachable!("0x76 is HALT, handled before dispatch");
        } else if src == 6 {
            let addr = self.read_index_addr(bus);
            bus.contend(addr, 3);
            let val = bus.read(addr);
            self.set_reg8(dst, val);
            if self.index_mode == IndexMode::Hl { 3 } else { 11 }
        } else if dst == 6 {
            let addr = self.read_index_addr(bus);
            let val = self.get_reg8(src);
            bus.contend(addr, 3);
            bus.write(addr, val);
            if self.index_mode == IndexMode::Hl { 3 } else { 11 }
        } else {
            let val = self.get_reg8_ix(src);
            self.set_reg8_ix(dst, val);
            0
        }
    }

    /// LD rr,nn / LD IX,nn / LD IY,nn — 10T
    pub(super) fn op_ld_rr_nn(&mut self, opcode: u8, bus: &mut dyn Bus) -> u32 {
        let rp = (opcode >> 4) & 0x03;
        let low = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        let high = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        self.set_rp(rp, ((high as u16) << 8) | low as u16);
        6
    }

    /// LD A,(BC) — 7T
    pub(super) fn op_ld_a_bc(&mut self, bus: &mut dyn Bus) -> u32 {
        let addr = self.get_bc();
        bus.contend(addr, 3);
        self.a = bus.read(addr);
        self.memptr = addr.wrapping_add(1);
        3
    }

    /// LD A,(DE) — 7T
    pub(super) fn op_ld_a_de(&mut self, bus: &mut dyn Bus) -> u32 {
        let addr = self.get_de();
        bus.contend(addr, 3);
        self.a = bus.read(addr);
        self.memptr = addr.wrapping_add(1);
        3
    }

    /// LD (BC),A — 7T
    pub(super) fn op_ld_bc_a(&mut self, bus: &mut dyn Bus) -> u32 {
        let addr = self.get_bc();
        bus.contend(addr, 3);
        bus.write(addr, self.a);
        self.memptr = (addr.wrapping_add(1) & 0x00FF) | ((self.a as u16) << 8);
        3
    }

    /// LD (DE),A — 7T
    pub(super) fn op_ld_de_a(&mut self, bus: &mut dyn Bus) -> u32 {
        let addr = self.get_de();
        bus.contend(addr, 3);
        bus.write(addr, self.a);
        self.memptr = (addr.wrapping_add(1) & 0x00FF) | ((self.a as u16) << 8);
        3
    }

    fn read_nn(&mut self, bus: &mut dyn Bus) -> u16 {
        let low = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        let high = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        ((high as u16) << 8) | low as u16
    }

    /// LD A,(nn) — 13T
    pub(super) fn op_ld_a_nn(&mut self, bus: &mut dyn Bus) -> u32 {
        let addr = self.read_nn(bus);
        bus.contend(addr, 3);
        self.a = bus.read(addr);
        self.memptr = addr.wrapping_add(1);
        9
    }

    /// LD (nn),A — 13T
    pub(super) fn op_ld_nn_a(&mut self, bus: &mut dyn Bus) -> u32 {
        let addr = self.read_nn(bus);
        bus.contend(addr, 3);
        bus.write(addr, self.a);
        self.memptr = (addr.wrapping_add(1) & 0x00FF) | ((self.a as u16) << 8);
        9
    }

    /// LD SP,HL/IX/IY — 6T
    pub(super) fn op_ld_sp_hl(&mut self) -> u32 {
        self.sp = self.get_rp(2);
        2
    }

    /// LD (nn),HL/IX/IY — 16T
    pub(super) fn op_ld_nn_hl(&mut self, bus: &mut dyn Bus) -> u32 {
        let addr = self.read_nn(bus);
        let val = self.get_rp(2);
        bus.write(addr, val as u8);
        bus.write(addr.wrapping_add(1), (val >> 8) as u8);
        self.memptr = addr.wrapping_add(1);
        12
    }

    /// LD HL,(nn) / LD IX,(nn) / LD IY,(nn) — 16T
    pub(super) fn op_ld_hl_nn_ind(&mut self, bus: &mut dyn Bus) -> u32 {
        let addr = self.read_nn(bus);
        let low = bus.read(addr);
        let high = bus.read(addr.wrapping_add(1));
        self.set_rp(2, ((high as u16) << 8) | low as u16);
        self.memptr = addr.wrapping_add(1);
        12
    }

    /// EX AF,AF' — 4T
    pub(super) fn op_ex_af_af(&mut self) -> u32 {
        std::mem::swap(&mut self.a, &mut self.a_prime);
        std::mem::swap(&mut self.f, &mut self.f_prime);
        0
    }

    /// EXX — 4T
    pub(super) fn op_exx(&mut self) -> u32 {
        std::mem::swap(&mut self.b, &mut self.b_prime);
        std::mem::swap(&mut self.c, &mut self.c_prime);
        std::mem::swap(&mut self.d, &mut self.d_prime);
        std::mem::swap(&mut self.e, &mut self.e_prime);
        std::mem::swap(&mut self.h, &mut self.h_prime);
        std::mem::swap(&mut self.l, &mut self.l_prime);
        0
    }

    /// EX DE,HL — 4T
    pub(super) fn op_ex_de_hl(&mut self) -> u32 {
        let de = self.get_de();
        let hl = self.get_hl();
        self.set_de(hl);
        self.set_hl(de);
        0
    }

    /// EX (SP),HL / EX (SP),IX / EX (SP),IY — 19T
    pub(super) fn op_ex_sp_hl(&mut self, bus: &mut dyn Bus) -> u32 {
        let low = bus.read(self.sp);
        let high = bus.read(self.sp.wrapping_add(1));
        let mem_val = ((high as u16) << 8) | low as u16;
        let reg_val = self.get_rp(2);
        bus.write(self.sp, reg_val as u8);
        bus.write(self.sp.wrapping_add(1), (reg_val >> 8) as u8);
        self.set_rp(2, mem_val);
        self.memptr = mem_val;
        15
    }

    /// LD A,I (ED) — 9T. PV takes IFF2 instead of parity.
    pub(super) fn op_ld_a_i(&mut self) -> u32 {
        self.a = self.i;
        self.p = true;
        self.set_iorr_flags();
        1
    }

    /// LD A,R (ED) — 9T. PV takes IFF2 instead of parity.
    pub(super) fn op_ld_a_r(&mut self) -> u32 {
        self.a = self.r;
        self.p = true;
        self.set_iorr_flags();
        1
    }

    fn set_iorr_flags(&mut self) {
        let mut f = self.f & Flag::C as u8;
        if self.a == 0 {
            f |= Flag::Z as u8;
        }
        if (self.a & 0x80) != 0 {
            f |= Flag::S as u8;
        }
        if self.iff2 {
            f |= Flag::PV as u8;
        }
        f |= self.a & (Flag::X as u8 | Flag::Y as u8);
        self.f = f;
        self.q = self.f;
        self.p = false;
    }

    /// LD (nn),rr (ED, BC/DE/SP) — 20T
    pub(super) fn op_ld_nn_rr_ed(&mut self, opcode: u8, bus: &mut dyn Bus) -> u32 {
        let rp = (opcode >> 4) & 0x03;
        let addr = self.read_nn(bus);
        let val = self.get_rp(rp);
        bus.write(addr, val as u8);
        bus.write(addr.wrapping_add(1), (val >> 8) as u8);
        self.memptr = addr.wrapping_add(1);
        12
    }

    /// LD rr,(nn) (ED, BC/DE/SP) — 20T
    pub(super) fn op_ld_rr_nn_ed(&mut self, opcode: u8, bus: &mut dyn Bus) -> u32 {
        let rp = (opcode >> 4) & 0x03;
        let addr = self.read_nn(bus);
        let low = bus.read(addr);
        let high = bus.read(addr.wrapping_add(1));
        self.set_rp(rp, ((high as u16) << 8) | low as u16);
        self.memptr = addr.wrapping_add(1);
        12
    }

    /// IN A,(n) — 11T
    pub(super) fn op_in_a_n(&mut self, bus: &mut dyn Bus) -> u32 {
        let n = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        let port = ((self.a as u16) << 8) | n as u16;
        bus.contend_port(port);
        self.a = bus.io_read(port);
        self.memptr = port.wrapping_add(1);
        7
    }

    /// OUT (n),A — 11T
    pub(super) fn op_out_n_a(&mut self, bus: &mut dyn Bus) -> u32 {
        let n = bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        let port = ((self.a as u16) << 8) | n as u16;
        bus.contend_port(port);
        bus.io_write(port, self.a);
        self.memptr = (port & 0xFF00) | (n.wrapping_add(1) as u16);
        7
    }

    /// IN r,(C) (ED) — 12T. `r` == 6 reads to set flags only (IN F,(C)).
    pub(super) fn op_in_r_c(&mut self, opcode: u8, bus: &mut dyn Bus) -> u32 {
        let r = (opcode >> 3) & 0x07;
        let port = self.get_bc();
        bus.contend_port(port);
        let val = bus.io_read(port);
        self.memptr = port.wrapping_add(1);
        if r != 6 {
            self.set_reg8(r, val);
        }
        let mut f = self.f & Flag::C as u8;
        if val == 0 {
            f |= Flag::Z as u8;
        }
        if (val & 0x80) != 0 {
            f |= Flag::S as u8;
        }
        if Self::get_parity(val) {
            f |= Flag::PV as u8;
        }
        f |= val & (Flag::X as u8 | Flag::Y as u8);
        self.f = f;
        self.q = self.f;
        4
    }

    /// OUT (C),r (ED) — 12T. `r` == 6 writes 0 (OUT (C),0).
    pub(super) fn op_out_c_r(&mut self, opcode: u8, bus: &mut dyn Bus) -> u32 {
        let r = (opcode >> 3) & 0x07;
        let port = self.get_bc();
        let val = if r == 6 { 0 } else { self.get_reg8(r) };
        bus.contend_port(port);
        bus.io_write(port, val);
        self.memptr = port.wrapping_add(1);
        4
    }
}
