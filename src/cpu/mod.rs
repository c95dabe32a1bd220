//! CPU core and its snapshot type (spec.md §1-§5).
//!
//! Grounded on the teacher's `core/src/cpu/mod.rs`, which hosts several CPU
//! families (`Z80`, `M6809`, `M6502`, ...) behind a shared `Cpu` trait and
//! `state` module. This crate has exactly one CPU family in scope, so the
//! generic `Cpu`/`Component`/`BusMasterComponent` traits the teacher uses
//! to plug a CPU into a multi-device bus arbitration scheme are dropped;
//! `Z80` is used directly against the `Bus` trait instead.

pub mod state;
pub mod z80;

pub use state::Z80State;
pub use z80::Z80;
