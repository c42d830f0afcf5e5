//! Typed error categories returned across the crate boundary (§7/§10.2).
//!
//! Faults propagate out of [`crate::cpu::Computer::execute`]/[`crate::cpu::Computer::step`]
//! unchanged; the core never catches them or attempts recovery. A fault always leaves the
//! machine in the state it had immediately before the faulting access, since every bounds check
//! precedes any mutation.

use thiserror::Error;

/// A fault raised by the CPU core while fetching, decoding, or executing an instruction.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum Fault {
    /// A memory access (instruction fetch, LOAD/STORE address, PRINT address, or JUMP target)
    /// landed outside `[0, memory_size)`.
    #[error("segmentation fault: address {address:#06x} is out of bounds (memory size {memory_size:#06x})")]
    SegmentationFault { address: u32, memory_size: u32 },

    /// The fetched instruction word's opcode is not present in the instruction table.
    #[error("decoding error: opcode {opcode:#04x} is not a recognized instruction")]
    DecodingError { opcode: u32 },
}

/// A syntax error produced by [`crate::assembler::assemble`], annotated with the offending
/// line's zero-based instruction index and original text (§4.F/§7).
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("syntax error on line {line}: {reason} (in: {text:?})")]
pub struct SyntaxError {
    /// The instruction index of the offending line (labels do not count towards this index).
    pub line: usize,
    /// The original, comment-stripped text of the offending line.
    pub text: String,
    /// A human-readable description of what went wrong.
    pub reason: String,
}

/// A construction-time configuration error: these are rejected up front rather than silently
/// clamped, matching the "bounds check precedes any mutation" policy used for runtime faults.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum ConfigError {
    /// `memory_size` was outside the allowed range `[2, 65536]`.
    #[error("invalid memory size {size}: must be in [2, 65536]")]
    InvalidMemorySize { size: usize },

    /// A [`crate::cpu::Computer::set_memory_chunk`] call's word buffer would overrun the
    /// address space starting at `address`.
    #[error(
        "memory chunk of {len} words at address {address:#06x} overruns the {memory_size:#06x}-word address space"
    )]
    ChunkOverrun {
        address: u32,
        len: usize,
        memory_size: usize,
    },

    /// A slice write's vector length did not match the length of the target address range.
    #[error("slice write of {got} values does not match the {expected}-word target range")]
    SliceLengthMismatch { expected: usize, got: usize },
}
