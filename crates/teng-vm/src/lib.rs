//! The back-end virtual machine.
//!
//! Executes a compiled program against a borrowed data tree, writing output
//! through an abstract sink and appending diagnostics to the shared log.
//! Execution is single-threaded and synchronous; recoverable problems
//! produce `Undefined` and keep going, fatal ones abort the page leaving
//! whatever was already written in the sink.

mod builtins;
mod escape;
mod ops;
mod sink;
mod space;
mod vm;

pub use escape::{ContentType, lookup_content_type};
pub use sink::{Sink, StringSink, WriterSink};
pub use vm::Vm;

#[cfg(test)]
mod escape_tests;
#[cfg(test)]
mod space_tests;
#[cfg(test)]
mod vm_tests;
