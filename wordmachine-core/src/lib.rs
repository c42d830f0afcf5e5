//! A software simulator of a small custom 32-bit computer: a fetch-decode-execute processor
//! with 32 general-purpose data registers, a status register, a comparison register, a 16-bit
//! program counter, and a unified word-addressed memory fronted by a per-section tree-PLRU
//! cache.
//!
//! Programs can be supplied either as raw 32-bit machine code words or as assembly source that
//! [`assembler::assemble`] translates into machine code before it is loaded with
//! [`cpu::Computer::set_memory_chunk`].
//!
//! The crate is organized leaf-first:
//! - [`bits`] fixes the instruction-word layout and opcode constants.
//! - [`registers`] is the 32-register data file.
//! - [`memory`] is the word-addressed main array fronted by the tree-PLRU cache.
//! - [`instruction`] decodes, encodes, and executes the nine core opcodes plus the four shift/
//!   compare extensions.
//! - [`cpu`] wires all of the above into the fetch-decode-execute loop.
//! - [`assembler`] translates assembly source into a machine-code image.
//! - [`observer`] is the host-side hook contract for cost metrics.
//! - [`error`] holds the typed error enums returned across the crate boundary.

#[macro_use]
extern crate static_assertions;

pub mod assembler;
pub mod bits;
pub mod cpu;
pub mod error;
pub mod instruction;
pub mod memory;
pub mod observer;
pub mod registers;

pub use cpu::Computer;
pub use error::{ConfigError, Fault, SyntaxError};
