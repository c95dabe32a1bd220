//! The ED block transfer/search/IO instruction groups: LDI/LDD(R),
//! CPI/CPD(R), INI/IND(R), OUTI/OUTD(R).
//!
//! Grounded on the teacher's `core/src/cpu/z80/block.rs` for the transfer/
//! compare flag algorithms (the undocumented X/Y come from `A + transferred
//! byte` for LDI/LDD and `A - (HL) - H` for CPI/CPD, per the same
//! documented-undocumented-behavior table the teacher cites). The teacher
//! stubs INI/IND/OUTI/OUTD's device access (hardcoded 0xFF in / discarded
//! out); here they're wired to [`crate::bus::Bus::io_read`]/`io_write`
//! since this core has a real `IoBus` (spec.md §4.2), with the flag
//! algorithm for those four kept from the same undocumented-behavior table.

use crate::cpu::z80::{Flag, Z80};
use crate::bus::Bus;

impl Z80 {
    fn ldi_ldd_flags(&mut self, n: u8, bc_nonzero: bool) {
        let mut f = self.f & (Flag::S as u8 | Flag::Z as u8 | Flag::C as u8);
        if bc_nonzero {
            f |= Flag::PV as u8;
        }
        if (n & 0x02) != 0 {
            f |= Flag::Y as u8;
        }
        if (n & 0x08) != 0 {
            f |= Flag::X as u8;
        }
        self.f = f;
        self.q = self.f;
    }

    /// LDI/LDD (ED) — 16T
    pub(super) fn op_ldi_ldd(&mut self, opcode: u8, bus: &mut dyn Bus) -> u32 {
        let is_dec = opcode == 0xA8;
        let hl = self.get_hl();
        let de = self.get_de();
        let val = bus.read(hl);
        bus.write(de, val);

        let step: i32 = if is_dec { -1 } else { 1 };
        self.set_hl(hl.wrapping_add(step as u16));
        self.set_de(de.wrapping_add(step as u16));
        let bc = self.get_bc().wrapping_sub(1);
        self.set_bc(bc);

        let n = val.wrapping_add(self.a);
        self.ldi_ldd_flags(n, bc != 0);
        8
    }

    /// LDIR/LDDR (ED) — 21T (BC != 0 after decrement) / 16T (BC == 0)
    pub(super) fn op_ldir_lddr(&mut self, opcode: u8, bus: &mut dyn Bus) -> u32 {
        let base_opcode = if opcode == 0xB8 { 0xA8 } else { 0xA0 };
        let extra = self.op_ldi_ldd(base_opcode, bus);
        if self.get_bc() != 0 {
            self.pc = self.pc.wrapping_sub(2);
            self.memptr = self.pc.wrapping_add(1);
            extra + 5
        } else {
            extra
        }
    }

    fn cpi_cpd_flags(&mut self, result: u8, half: bool, n: u8, bc_nonzero: bool) {
        let mut f = Flag::N as u8 | (self.f & Flag::C as u8);
        if result == 0 {
            f |= Flag::Z as u8;
        }
        if (result & 0x80) != 0 {
            f |= Flag::S as u8;
        }
        if half {
            f |= Flag::H as u8;
        }
        if bc_nonzero {
            f |= Flag::PV as u8;
        }
        if (n & 0x02) != 0 {
            f |= Flag::Y as u8;
        }
        if (n & 0x08) != 0 {
            f |= Flag::X as u8;
        }
        self.f = f;
        self.q = self.f;
    }

    /// CPI/CPD (ED) — 16T
    pub(super) fn op_cpi_cpd(&mut self, opcode: u8, bus: &mut dyn Bus) -> u32 {
        let is_dec = opcode == 0xA9;
        let hl = self.get_hl();
        let val = bus.read(hl);
        let a = self.a;
        let result = a.wrapping_sub(val);
        let half = (a & 0x0F) < (val & 0x0F);

        let step: i32 = if is_dec { -1 } else { 1 };
        self.set_hl(hl.wrapping_add(step as u16));
        self.memptr = self.memptr.wrapping_add(step as u16);
        let bc = self.get_bc().wrapping_sub(1);
        self.set_bc(bc);

        let n = result.wrapping_sub(if half { 1 } else { 0 });
        self.cpi_cpd_flags(result, half, n, bc != 0);
        8
    }

    /// CPIR/CPDR (ED) — 21T (BC != 0 and no match) / 16T (otherwise)
    pub(super) fn op_cpir_cpdr(&mut self, opcode: u8, bus: &mut dyn Bus) -> u32 {
        let base_opcode = if opcode == 0xB9 { 0xA9 } else { 0xA1 };
        let extra = self.op_cpi_cpd(base_opcode, bus);
        if self.get_bc() != 0 && (self.f & Flag::Z as u8) == 0 {
            self.pc = self.pc.wrapping_sub(2);
            self.memptr = self.pc.wrapping_add(1);
            extra + 5
        } else {
            extra
        }
    }

    fn in_out_flags(&mut self, temp: u8, k: u16, new_b: u8) {
        let mut f = 0u8;
        if new_b == 0 {
            f |= Flag::Z as u8;
        }
        if (new_b & 0x80) != 0 {
            f |= Flag::S as u8;
        }
        if (temp & 0x80) != 0 {
            f |= Flag::N as u8;
        }
        if k > 0xFF {
            f |= Flag::H as u8 | Flag::C as u8;
        }
        if (((k as u8) & 0x07) ^ new_b).count_ones() % 2 == 0 {
            f |= Flag::PV as u8;
        }
        f |= new_b & (Flag::X as u8 | Flag::Y as u8);
        self.f = f;
        self.q = self.f;
    }

    /// INI/IND (ED) — 16T
    pub(super) fn op_ini_ind(&mut self, opcode: u8, bus: &mut dyn Bus) -> u32 {
        let is_dec = opcode == 0xAA;
        let port = self.get_bc();
        bus.contend_port(port);
        let temp = bus.io_read(port);
        let hl = self.get_hl();
        bus.write(hl, temp);

        let new_b = self.b.wrapping_sub(1);
        self.b = new_b;
        let step: i32 = if is_dec { -1 } else { 1 };
        self.set_hl(hl.wrapping_add(step as u16));
        self.memptr = port.wrapping_add(step as u16);

        let c_adj = if is_dec {
            self.c.wrapping_sub(1)
        } else {
            self.c.wrapping_add(1)
        };
        let k = temp as u16 + c_adj as u16;
        self.in_out_flags(temp, k, new_b);
        8
    }

    /// INIR/INDR (ED) — 21T (B != 0) / 16T (B == 0)
    pub(super) fn op_inir_indr(&mut self, opcode: u8, bus: &mut dyn Bus) -> u32 {
        let base_opcode = if opcode == 0xBA { 0xAA } else { 0xA2 };
        let extra = self.op_ini_ind(base_opcode, bus);
        if self.b != 0 {
            self.pc = self.pc.wrapping_sub(2);
            extra + 5
        } else {
            extra
        }
    }

    /// OUTI/OUTD (ED) — 16T
    pub(super) fn op_outi_outd(&mut self, opcode: u8, bus: &mut dyn Bus) -> u32 {
        let is_dec = opcode == 0xAB;
        let hl = self.get_hl();
        let temp = bus.read(hl);

        let step: i32 = if is_dec { -1 } else { 1 };
        let new_hl = hl.wrapping_add(step as u16);
        self.set_hl(new_hl);
        let new_b = self.b.wrapping_sub(1);
        self.b = new_b;

        let port = self.get_bc();
        bus.contend_port(port);
        bus.io_write(port, temp);
        self.memptr = port.wrapping_add(step as u16);

        let k = temp as u16 + (new_hl as u8) as u16;
        self.in_out_flags(temp, k, new_b);
        8
    }

    /// OTIR/OTDR (ED) — 21T (B != 0) / 16T (B == 0)
    pub(super) fn op_otir_otdr(&mut self, opcode: u8, bus: &mut dyn Bus) -> u32 {
        let base_opcode = if opcode == 0xBB { 0xAB } else { 0xA3 };
        let extra = self.op_outi_outd(base_opcode, bus);
        if self.b != 0 {
            self.pc = self.pc.wrapping_sub(2);
            extra + 5
        } else {
            extra
        }
    }
}
