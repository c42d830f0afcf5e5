//! The CPU core: status register, comparison register, program counter, and the fetch-decode-
//! execute loop that ties the register file, memory, and instruction set together (§4.E).

use bitvec::order::Lsb0;
use bitvec::view::BitView;
use log::{debug, info, trace};

use crate::bits::status_bit;
use crate::error::{ConfigError, Fault};
use crate::instruction::{CopyFlags, Instruction};
use crate::memory::Memory;
use crate::observer::{NoopObserver, Observer};
use crate::registers::DataRegisters;

/// A bit vector with two defined positions: `RUNNING` (index 0) and `OVERFLOW` (index 1).
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct StatusRegister(u32);

impl StatusRegister {
    /// Set on entry to the execution loop, cleared by `HALT`.
    pub fn running(&self) -> bool {
        self.0.view_bits::<Lsb0>()[status_bit::RUNNING]
    }

    pub fn set_running(&mut self, value: bool) {
        self.0.view_bits_mut::<Lsb0>().set(status_bit::RUNNING, value);
    }

    /// Written by every `ADD`/`SUB` to reflect over/underflow of that operation.
    pub fn overflow(&self) -> bool {
        self.0.view_bits::<Lsb0>()[status_bit::OVERFLOW]
    }

    pub fn set_overflow(&mut self, value: bool) {
        self.0
            .view_bits_mut::<Lsb0>()
            .set(status_bit::OVERFLOW, value);
    }
}

/// 32 independent single-bit comparison slots, written by `COMP`/`COMPGRT`/`COMPLST`.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct ComparisonRegister(u32);

impl ComparisonRegister {
    pub fn get(&self, index: u8) -> bool {
        self.0.view_bits::<Lsb0>()[index as usize]
    }

    pub fn set(&mut self, index: u8, value: bool) {
        self.0.view_bits_mut::<Lsb0>().set(index as usize, value);
    }
}

/// The default memory size used by [`Computer::new`], matching the architecture's full 16-bit
/// address space.
pub const DEFAULT_MEMORY_SIZE: usize = 65536;

/// The simulated machine: data registers, memory + cache, comparison register, status register,
/// and program counter, generic over an [`Observer`] that is notified of decode/cache/register
/// events without being able to alter core semantics.
#[derive(Debug, Clone)]
pub struct Computer<O: Observer = NoopObserver> {
    data_registers: DataRegisters,
    memory: Memory,
    comp_reg: ComparisonRegister,
    status_reg: StatusRegister,
    pc: u16,
    debug_mode: bool,
    observer: O,
}

impl Computer<NoopObserver> {
    /// Constructs a machine with `memory_size` words of memory and no observer.
    ///
    /// # Panics
    ///
    /// Panics if `memory_size` is outside `[2, 65536]`. Use [`Self::try_new`] for a recoverable
    /// error.
    pub fn new(memory_size: usize) -> Self {
        Self::try_new(memory_size).expect("invalid memory size")
    }

    /// Fallible form of [`Self::new`].
    pub fn try_new(memory_size: usize) -> Result<Self, ConfigError> {
        Self::try_new_with_observer(memory_size, NoopObserver)
    }
}

impl Default for Computer<NoopObserver> {
    fn default() -> Self {
        Self::new(DEFAULT_MEMORY_SIZE)
    }
}

impl<O: Observer> Computer<O> {
    /// Constructs a machine with `memory_size` words of memory and the given observer attached.
    pub fn try_new_with_observer(memory_size: usize, observer: O) -> Result<Self, ConfigError> {
        Ok(Self {
            data_registers: DataRegisters::new(),
            memory: Memory::try_new(memory_size)?,
            comp_reg: ComparisonRegister::default(),
            status_reg: StatusRegister::default(),
            pc: 0,
            debug_mode: false,
            observer,
        })
    }

    /// The current program counter.
    pub fn pc(&self) -> u16 {
        self.pc
    }

    /// Sets the program counter directly; useful for host-side test setup.
    pub fn set_pc(&mut self, pc: u16) {
        self.pc = pc;
    }

    pub fn status_reg(&self) -> StatusRegister {
        self.status_reg
    }

    pub fn comp_reg(&self) -> ComparisonRegister {
        self.comp_reg
    }

    /// The attached observer, e.g. to read a [`crate::observer::CostMetricTracker`]'s summary
    /// after a run.
    pub fn observer(&self) -> &O {
        &self.observer
    }

    /// The number of addressable memory words.
    pub fn memory_size(&self) -> usize {
        self.memory.size()
    }

    /// Reads a data register without notifying the observer; for host-side introspection
    /// (tests, a debugger surface) rather than guest-visible instruction execution.
    pub fn register(&self, index: u8) -> u32 {
        self.data_registers.read(index)
    }

    /// Writes a data register without notifying the observer, obeying the same read-only rule
    /// as instruction execution. For host-side bulk initialization.
    pub fn set_register(&mut self, index: u8, value: u32) {
        self.data_registers.write(index, value);
    }

    /// Bulk-loads `words` starting at `address`, e.g. to install an assembled program.
    ///
    /// Returns [`ConfigError::ChunkOverrun`] if the buffer would not fit starting at `address`.
    pub fn set_memory_chunk(&mut self, address: u32, words: &[u32]) -> Result<(), ConfigError> {
        let end = address as usize + words.len();
        if end > self.memory.size() {
            return Err(ConfigError::ChunkOverrun {
                address,
                len: words.len(),
                memory_size: self.memory.size(),
            });
        }
        for (offset, &word) in words.iter().enumerate() {
            // Bounds were just checked above; a single-word write here cannot fault.
            let hit = self
                .memory
                .write(address + offset as u32, word)
                .expect("bounds checked above");
            self.observer.on_cache_lookup(address + offset as u32, hit);
        }
        Ok(())
    }

    /// Bulk-writes `values` into the `len`-word range starting at `address`. `values.len()` must
    /// equal `len`, else [`ConfigError::SliceLengthMismatch`] is returned before any write takes
    /// place; an out-of-range `address`/`len` pair returns [`ConfigError::ChunkOverrun`] instead
    /// (§4.C's "a slice write with a vector requires the vector length to equal the slice
    /// length, else fail").
    pub fn set_memory_slice(
        &mut self,
        address: u32,
        len: usize,
        values: &[u32],
    ) -> Result<(), ConfigError> {
        self.memory.write_slice(address, len, values)
    }

    /// Writes a single word to main memory; bounds-checked against `[0, memory_size)`.
    pub fn set_memory_address(&mut self, address: u32, value: u32) -> Result<(), Fault> {
        self.write_memory(address, value)
    }

    /// Reads a single word from main memory; bounds-checked against `[0, memory_size)`.
    pub fn get_memory_address(&mut self, address: u32) -> Result<u32, Fault> {
        self.read_memory(address)
    }

    fn read_memory(&mut self, address: u32) -> Result<u32, Fault> {
        let (value, hit) = self.memory.read(address)?;
        self.observer.on_cache_lookup(address, hit);
        Ok(value)
    }

    fn write_memory(&mut self, address: u32, value: u32) -> Result<(), Fault> {
        let hit = self.memory.write(address, value)?;
        self.observer.on_cache_lookup(address, hit);
        Ok(())
    }

    fn read_register(&mut self, index: u8) -> u32 {
        self.observer.on_register_read(index);
        self.data_registers.read(index)
    }

    fn write_register(&mut self, index: u8, value: u32) {
        self.observer.on_register_write(index);
        self.data_registers.write(index, value);
    }

    /// Runs the fetch-decode-execute loop to `HALT` or to a fault.
    ///
    /// Entering `execute` sets the `RUNNING` status bit; `debug_mode` only gates extra
    /// `log::debug!`/`log::trace!` call sites and never changes observable register, memory,
    /// comparison, or status state (§9).
    pub fn execute(&mut self, debug_mode: bool) -> Result<(), Fault> {
        self.debug_mode = debug_mode;
        self.status_reg.set_running(true);
        while self.status_reg.running() {
            self.step()?;
        }
        Ok(())
    }

    /// Runs exactly one fetch-decode-execute cycle, returning whether `RUNNING` is still set
    /// afterward. If the machine was `IDLE`, this also transitions it to `RUNNING` first, so a
    /// host can single-step a freshly constructed machine without calling [`Self::execute`].
    pub fn step(&mut self) -> Result<bool, Fault> {
        if !self.status_reg.running() {
            self.status_reg.set_running(true);
        }
        self.cycle()?;
        Ok(self.status_reg.running())
    }

    fn cycle(&mut self) -> Result<(), Fault> {
        let pc = self.pc as u32;
        let instruction_word = self.read_memory(pc)?;
        self.observer.before_decode();
        let instruction = Instruction::decode(instruction_word)?;
        if self.debug_mode {
            debug!(pc, opcode:? = instruction; "fetched instruction");
        }

        self.execute_instruction(instruction)?;
        self.pc = self.pc.wrapping_add(1);
        Ok(())
    }

    fn execute_instruction(&mut self, instruction: Instruction) -> Result<(), Fault> {
        match instruction {
            Instruction::Nop => {
                trace!("nop");
                Ok(())
            }
            Instruction::Halt => {
                trace!("halt");
                self.status_reg.set_running(false);
                Ok(())
            }
            Instruction::Add { r1, r2, r3 } => {
                let a = self.read_register(r1);
                let b = self.read_register(r2);
                let sum = a as u64 + b as u64;
                let overflow = sum >= 1u64 << 32;
                if overflow {
                    log::warn!(r1, r2, r3; "integer overflow in ADD, OVERFLOW flag set");
                }
                self.status_reg.set_overflow(overflow);
                self.write_register(r3, sum as u32);
                Ok(())
            }
            Instruction::Sub { r1, r2, r3 } => {
                let a = self.read_register(r1);
                let b = self.read_register(r2);
                let underflow = a < b;
                if underflow {
                    log::warn!(r1, r2, r3; "integer underflow in SUB, OVERFLOW flag set");
                }
                self.status_reg.set_overflow(underflow);
                self.write_register(r3, a.wrapping_sub(b));
                Ok(())
            }
            Instruction::LShift { r1, r2, r3 } => {
                let a = self.read_register(r1);
                let shift = self.read_register(r2) & 0x1F;
                self.write_register(r3, a << shift);
                Ok(())
            }
            Instruction::RShift { r1, r2, r3 } => {
                let a = self.read_register(r1);
                let shift = self.read_register(r2) & 0x1F;
                self.write_register(r3, a >> shift);
                Ok(())
            }
            Instruction::Comp { r1, r2, c } => {
                let a = self.read_register(r1);
                let b = self.read_register(r2);
                self.comp_reg.set(c, a == b);
                Ok(())
            }
            Instruction::CompGrt { r1, r2, c } => {
                let a = self.read_register(r1);
                let b = self.read_register(r2);
                self.comp_reg.set(c, a > b);
                Ok(())
            }
            Instruction::CompLst { r1, r2, c } => {
                let a = self.read_register(r1);
                let b = self.read_register(r2);
                self.comp_reg.set(c, a < b);
                Ok(())
            }
            Instruction::Load { reg, addr, flags } => self.execute_load(reg, addr, flags),
            Instruction::Store { reg, addr, flags } => self.execute_store(reg, addr, flags),
            Instruction::Jump { c, amount, flags } => self.execute_jump(c, amount, flags),
            Instruction::Print { r1, r2, addr } => {
                let v1 = self.read_register(r1);
                let v2 = self.read_register(r2);
                let m = self.read_memory(addr as u32)?;
                info!(
                    "print: register {r1}: {v1:032b} = {v1}, register {r2}: {v2:032b} = {v2}, \
                     address {addr}: {m:032b} = {m}"
                );
                Ok(())
            }
        }
    }

    fn execute_load(&mut self, reg: u8, addr: u16, flags: CopyFlags) -> Result<(), Fault> {
        let src = if flags.immediate() {
            self.read_memory(self.pc as u32)?
        } else {
            self.read_memory(addr as u32)?
        };

        if !flags.half_copy() {
            self.write_register(reg, src);
            return Ok(());
        }

        let half = if flags.sig_source() {
            src >> 16
        } else {
            src & 0xFFFF
        };
        let new_value = if flags.sig_dest() {
            if flags.overwrite() {
                half << 16
            } else {
                let dst_old = self.read_register(reg);
                (half << 16) | (dst_old & 0x0000_FFFF)
            }
        } else if flags.overwrite() {
            half
        } else {
            let dst_old = self.read_register(reg);
            half | (dst_old & 0xFFFF_0000)
        };
        self.write_register(reg, new_value);
        Ok(())
    }

    fn execute_store(&mut self, reg: u8, addr: u16, flags: CopyFlags) -> Result<(), Fault> {
        // The address is bounds-checked before any side effect, regardless of IMMEDIATE.
        let memory_size = self.memory.size() as u32;
        if addr as u32 >= memory_size {
            return Err(Fault::SegmentationFault {
                address: addr as u32,
                memory_size,
            });
        }

        let src = if flags.immediate() {
            self.read_memory(self.pc as u32)?
        } else {
            self.read_register(reg)
        };

        if !flags.half_copy() {
            self.write_memory(addr as u32, src)?;
            return Ok(());
        }

        let half = if flags.sig_source() {
            src >> 16
        } else {
            src & 0xFFFF
        };
        let new_value = if flags.sig_dest() {
            if flags.overwrite() {
                half << 16
            } else {
                let dst_old = self.read_memory(addr as u32)?;
                (half << 16) | (dst_old & 0x0000_FFFF)
            }
        } else if flags.overwrite() {
            half
        } else {
            let dst_old = self.read_memory(addr as u32)?;
            half | (dst_old & 0xFFFF_0000)
        };
        self.write_memory(addr as u32, new_value)
    }

    fn execute_jump(
        &mut self,
        c: u8,
        amount: u16,
        flags: crate::instruction::JumpFlags,
    ) -> Result<(), Fault> {
        if self.comp_reg.get(c) != flags.on_high() {
            return Ok(());
        }

        let current_pc = self.pc as i64;
        let amount = amount as i64;
        // Subtract 1 to compensate for the unconditional PC += 1 at the end of the cycle.
        let new_pc = if flags.dec() {
            current_pc - amount - 1
        } else {
            current_pc + amount - 1
        };

        let memory_size = self.memory.size() as i64;
        if new_pc < 0 || new_pc >= memory_size {
            return Err(Fault::SegmentationFault {
                address: new_pc as u32,
                memory_size: memory_size as u32,
            });
        }
        self.pc = new_pc as u16;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instruction::JumpFlags;

    #[test]
    fn set_memory_slice_requires_matching_length() {
        let mut cpu = Computer::new(16);
        assert_eq!(
            cpu.set_memory_slice(0, 3, &[1, 2]),
            Err(ConfigError::SliceLengthMismatch { expected: 3, got: 2 })
        );
        cpu.set_memory_slice(0, 3, &[1, 2, 3]).unwrap();
        assert_eq!(cpu.get_memory_address(0).unwrap(), 1);
        assert_eq!(cpu.get_memory_address(1).unwrap(), 2);
        assert_eq!(cpu.get_memory_address(2).unwrap(), 3);
    }

    #[test]
    fn halt_clears_running() {
        let mut cpu = Computer::new(16);
        cpu.set_memory_chunk(0, &[Instruction::Halt.encode()])
            .unwrap();
        cpu.execute(false).unwrap();
        assert!(!cpu.status_reg().running());
    }

    #[test]
    fn add_without_overflow() {
        let mut cpu = Computer::new(16);
        cpu.set_register(2, 10);
        cpu.set_register(3, 20);
        cpu.set_memory_chunk(
            0,
            &[Instruction::Add { r1: 2, r2: 3, r3: 4 }.encode(), Instruction::Halt.encode()],
        )
        .unwrap();
        cpu.execute(false).unwrap();
        assert_eq!(cpu.register(4), 30);
        assert!(!cpu.status_reg().overflow());
    }

    #[test]
    fn add_overflow_sets_status_bit() {
        let mut cpu = Computer::new(16);
        cpu.set_register(2, u32::MAX);
        cpu.set_register(3, 1);
        cpu.set_memory_chunk(
            0,
            &[Instruction::Add { r1: 2, r2: 3, r3: 4 }.encode(), Instruction::Halt.encode()],
        )
        .unwrap();
        cpu.execute(false).unwrap();
        assert_eq!(cpu.register(4), 0);
        assert!(cpu.status_reg().overflow());
    }

    #[test]
    fn sub_underflow_sets_status_bit() {
        let mut cpu = Computer::new(16);
        cpu.set_register(2, 3);
        cpu.set_register(3, 5);
        cpu.set_memory_chunk(
            0,
            &[Instruction::Sub { r1: 2, r2: 3, r3: 4 }.encode(), Instruction::Halt.encode()],
        )
        .unwrap();
        cpu.execute(false).unwrap();
        assert_eq!(cpu.register(4), 3u32.wrapping_sub(5));
        assert!(cpu.status_reg().overflow());
    }

    #[test]
    fn in_place_add_matches_out_of_place() {
        let mut cpu = Computer::new(16);
        cpu.set_register(2, 7);
        cpu.set_register(3, 8);
        cpu.set_memory_chunk(
            0,
            &[Instruction::Add { r1: 2, r2: 3, r3: 2 }.encode(), Instruction::Halt.encode()],
        )
        .unwrap();
        cpu.execute(false).unwrap();
        assert_eq!(cpu.register(2), 15);
    }

    #[test]
    fn load_store_flag_matrix() {
        // From §8: A=0x8000 B=0x9999 C=0xB332 D=0xCCCB E=0xE664 F=0xFFFF
        let (a, b, c, d, e, f) = (0x8000u32, 0x9999u32, 0xB332u32, 0xCCCBu32, 0xE664u32, 0xFFFFu32);
        let src = (a << 16) | b;
        let reg_initial = (c << 16) | d;
        let mem_initial = (e << 16) | f;

        // Exercises `execute_load` directly rather than through `step()`: in IMMEDIATE mode the
        // "source word" is memory[PC] itself (§4.D), which here is an arbitrary bit pattern, not
        // necessarily one that decodes to a valid instruction.
        let case = |flags: CopyFlags, expected: u32| {
            let mut cpu = Computer::new(16);
            cpu.set_register(2, reg_initial);
            cpu.set_memory_address(10, mem_initial).unwrap();
            cpu.set_pc(0);
            cpu.set_memory_address(0, src).unwrap();
            cpu.execute_load(2, 10, flags).unwrap();
            assert_eq!(cpu.register(2), expected, "flags {:#07b}", flags.bits());
        };

        // LOAD from mem, full copy.
        {
            let mut cpu = Computer::new(16);
            cpu.set_register(2, reg_initial);
            cpu.set_memory_address(10, mem_initial).unwrap();
            cpu.set_pc(0);
            cpu.execute_load(2, 10, CopyFlags::from_bits(0)).unwrap();
            assert_eq!(cpu.register(2), mem_initial);
        }

        case(CopyFlags::HALF, (c << 16) | f);
        case(CopyFlags::HALF ^ CopyFlags::TO_SIG, (f << 16) | d);
        case(CopyFlags::HALF ^ CopyFlags::FRM_SIG, (c << 16) | e);
        case(CopyFlags::HALF ^ CopyFlags::OVERWRITE, f);
        case(
            CopyFlags::HALF ^ CopyFlags::FRM_SIG ^ CopyFlags::TO_SIG ^ CopyFlags::OVERWRITE,
            e << 16,
        );
        case(CopyFlags::IMMEDIATE, src);
        case(CopyFlags::HALF ^ CopyFlags::OVERWRITE ^ CopyFlags::IMMEDIATE, b);
        case(
            CopyFlags::HALF ^ CopyFlags::TO_SIG ^ CopyFlags::OVERWRITE ^ CopyFlags::IMMEDIATE,
            b << 16,
        );
    }

    #[test]
    fn jump_forward_and_backward() {
        let mut cpu = Computer::new(16);
        cpu.set_pc(5);
        cpu.comp_reg.set(0, false);
        cpu.execute_jump(0, 3, JumpFlags::from_bits(0)).unwrap();
        assert_eq!(cpu.pc(), 6); // amount - 1, the final +1 happens in cycle(), not here

        let mut cpu = Computer::new(16);
        cpu.set_pc(5);
        cpu.comp_reg.set(1, true);
        cpu.execute_jump(1, 3, JumpFlags::ON_HIGH ^ JumpFlags::DEC)
            .unwrap();
        assert_eq!(cpu.pc(), 0);
    }

    #[test]
    fn jump_condition_mismatch_leaves_pc_unchanged() {
        let mut cpu = Computer::new(16);
        cpu.set_pc(5);
        cpu.execute_jump(0, 3, JumpFlags::ON_HIGH).unwrap();
        assert_eq!(cpu.pc(), 5);
    }

    #[test]
    fn jump_out_of_bounds_faults() {
        let mut cpu = Computer::new(16);
        cpu.set_pc(0);
        assert!(matches!(
            cpu.execute_jump(0, 65535, JumpFlags::from_bits(0)),
            Err(Fault::SegmentationFault { .. })
        ));
    }

    #[test]
    fn unknown_opcode_faults_decoding_error() {
        let mut cpu = Computer::new(16);
        // 0b111110 is not a recognized opcode.
        cpu.set_memory_chunk(0, &[0b111110 << 26]).unwrap();
        assert!(matches!(
            cpu.execute(false),
            Err(Fault::DecodingError { opcode: 0b111110 })
        ));
    }

    #[test]
    fn pc_out_of_bounds_faults_segmentation() {
        let mut cpu = Computer::new(2);
        cpu.set_pc(2);
        assert!(matches!(
            cpu.execute(false),
            Err(Fault::SegmentationFault { .. })
        ));
    }

    #[test]
    fn fetch_fault_does_not_count_as_a_decoded_instruction() {
        use crate::observer::CostMetricTracker;

        let mut cpu =
            Computer::try_new_with_observer(2, CostMetricTracker::new()).unwrap();
        cpu.set_pc(2);
        assert!(matches!(cpu.execute(false), Err(Fault::SegmentationFault { .. })));
        assert_eq!(cpu.observer().instructions_executed(), 0);
    }
}
