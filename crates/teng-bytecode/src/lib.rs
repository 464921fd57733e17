//! Bytecode instruction set and compiled program representation.
//!
//! A compiled program is a flat vector of typed instructions plus a string
//! pool and a regex pool; operands reference pool entries by integer index,
//! which keeps the program trivially serializable and free of pointer
//! entanglement with the parser. Programs are immutable after compilation
//! and may be shared across threads.

mod dump;
mod format;
mod instr;
mod program;

pub use format::ProgramFormatError;
pub use instr::{Instr, InstrKind, RegexId, StrId};
pub use program::{Program, StringPool};

#[cfg(test)]
mod format_tests;
#[cfg(test)]
mod program_tests;
