//! The interface the executor drives memory and I/O through.
//!
//! Grounded on the teacher's `core::Bus` trait (`core/src/core/bus.rs`):
//! one trait carries memory access, port access, and interrupt-line
//! sampling so the executor is generic over "a real system" and "a
//! recording system" (see [`crate::testing`]) without duplicating its
//! dispatch logic. The multi-bus-master arbitration (`BusMaster`,
//! `is_halted_for`) the teacher needs for DMA is dropped — no DMA-like
//! device is in scope for this core (spec.md §1).

/// Interrupt lines the host latches between `step()` calls (spec.md §5).
#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct InterruptLines {
    pub nmi: bool,
    pub irq: bool,
    /// Data byte the interrupting device places on the bus during an IM 2
    /// acknowledge cycle (spec.md §4.5, end-to-end scenario 6).
    pub irq_vector: u8,
}

/// Everything the Z80 executor needs from its environment for one `step()`.
pub trait Bus {
    fn read(&mut self, address: u16) -> u8;
    fn write(&mut self, address: u16, value: u8);

    /// Contention hook called before every memory access. No-op by default;
    /// a host modeling ULA raster contention overrides it.
    fn contend(&mut self, _address: u16, _cycles: u8) {}

    fn io_read(&mut self, port: u16) -> u8;
    fn io_write(&mut self, port: u16, value: u8);

    /// Contention hook called before every I/O access. No-op by default.
    fn contend_port(&mut self, _port: u16) {}

    fn check_interrupts(&self) -> InterruptLines;
}
