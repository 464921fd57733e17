//! Core data structures for the Teng templating engine.
//!
//! This crate carries everything the compiler and the virtual machine share:
//! source positions, the diagnostic log, the runtime value model and the
//! fragment data tree with its builder API. It knows nothing about template
//! syntax or bytecode.

mod diag;
mod dict;
mod fragment;
mod position;
mod value;

pub use diag::{Entry, ErrorLog, Severity};
pub use dict::{Dictionary, EmptyDictionary};
pub use fragment::{Fragment, FragmentList, FragmentValue, Scalar};
pub use position::Pos;
pub use value::{CompiledRegex, Number, Value};

#[cfg(test)]
mod diag_tests;
#[cfg(test)]
mod value_tests;
