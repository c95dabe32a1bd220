//! Crate-level error type.
//!
//! Mirrors the plain enum + hand-written `Display`/`Error` impl idiom used
//! throughout this codebase (no `thiserror`/`anyhow`): a public enum with
//! one variant per failure kind, a `Display` impl for human-readable
//! messages, and a blanket `impl std::error::Error`.

use std::fmt;

/// Errors that can be raised by code outside the hot instruction-dispatch
/// path. `InvalidOpcode` is deliberately *not* a variant here — it never
/// unwinds; it is carried as data on [`crate::cpu::z80::StepOutcome`]
/// instead, so the interpreter's common case never pays for error handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Z80Error {
    /// `im` requested outside `{0, 1, 2}`. The request is rejected and the
    /// CPU's interrupt mode is left unchanged.
    InvalidInterruptMode(u8),

    /// A `.in`/`.expected` test battery file could not be parsed.
    TestFileParse {
        file: String,
        line: usize,
        message: String,
    },
}

impl fmt::Display for Z80Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidInterruptMode(mode) => {
                write!(f, "invalid interrupt mode {mode}, expected 0, 1 or 2")
            }
            Self::TestFileParse {
                file,
                line,
                message,
            } => write!(f, "{file}:{line}: {message}"),
        }
    }
}

impl std::error::Error for Z80Error {}
