//! A two-pass assembler translating assembly source into a machine-code image (§4.F).
//!
//! The first pass strips comments and blank lines and records `[label]` lines as jump targets,
//! without those lines contributing to the instruction index. The second pass parses each
//! remaining line into an [`Instruction`] by mnemonic, resolving any `[label]` jump argument to
//! the unsigned distance between the label and the referencing line — the assembly author is
//! responsible for choosing the matching `DEC`/`INC` flag.

use std::collections::HashMap;

use crate::error::SyntaxError;
use crate::instruction::{CopyFlags, Instruction, JumpFlags};

const REGISTER_COUNT: u32 = 32;
/// The upper bound (exclusive) of the 16-bit address/data argument range, independent of any
/// particular machine's configured memory size.
const MAX_ADDRESS: u32 = 1 << 16;

/// Assembles `source` into a sequence of machine-code words, ready for
/// [`crate::cpu::Computer::set_memory_chunk`].
pub fn assemble(source: &str) -> Result<Vec<u32>, SyntaxError> {
    let (lines, labels) = strip_comments_and_labels(source);

    let mut program = Vec::with_capacity(lines.len());
    for (line_index, text) in lines.iter().enumerate() {
        let instruction = parse_line(text, line_index, &labels).map_err(|reason| SyntaxError {
            line: line_index,
            text: text.clone(),
            reason,
        })?;
        program.push(instruction.encode());
    }
    Ok(program)
}

fn strip_comments_and_labels(source: &str) -> (Vec<String>, HashMap<String, usize>) {
    let mut lines = Vec::new();
    let mut labels = HashMap::new();
    let mut line_index = 0usize;

    for raw_line in source.lines() {
        let without_comment = raw_line.split('#').next().unwrap_or("");
        let Some(first_token) = without_comment.split_whitespace().next() else {
            continue; // blank line
        };
        if first_token.starts_with('[') && first_token.ends_with(']') {
            labels.insert(first_token[1..first_token.len() - 1].to_string(), line_index);
        } else {
            lines.push(without_comment.trim().to_string());
            line_index += 1;
        }
    }
    (lines, labels)
}

fn parse_line(
    text: &str,
    line_index: usize,
    labels: &HashMap<String, usize>,
) -> Result<Instruction, String> {
    let mut tokens = text.split_whitespace();
    let mnemonic = tokens.next().ok_or("could not decompose line")?;
    let args: Vec<&str> = tokens.collect();

    match mnemonic {
        "NOP" => Ok(Instruction::Nop),
        "HALT" => Ok(Instruction::Halt),
        "ADD" => parse_three_registers(&args).map(|(r1, r2, r3)| Instruction::Add { r1, r2, r3 }),
        "SUB" => parse_three_registers(&args).map(|(r1, r2, r3)| Instruction::Sub { r1, r2, r3 }),
        "LSHIFT" => {
            parse_three_registers(&args).map(|(r1, r2, r3)| Instruction::LShift { r1, r2, r3 })
        }
        "RSHIFT" => {
            parse_three_registers(&args).map(|(r1, r2, r3)| Instruction::RShift { r1, r2, r3 })
        }
        "COMP" => parse_three_registers(&args).map(|(r1, r2, c)| Instruction::Comp { r1, r2, c }),
        "COMPGRT" => {
            parse_three_registers(&args).map(|(r1, r2, c)| Instruction::CompGrt { r1, r2, c })
        }
        "COMPLST" => {
            parse_three_registers(&args).map(|(r1, r2, c)| Instruction::CompLst { r1, r2, c })
        }
        "LOAD" => parse_load(&args),
        "STORE" => parse_store(&args),
        "JUMP" => parse_jump(&args, line_index, labels),
        "PRINT" => parse_print(&args),
        other => Err(format!("unknown token {other}")),
    }
}

fn require_args(args: &[&str], min: usize) -> Result<(), String> {
    if args.len() < min {
        return Err(format!(
            "instruction requires at least {min} arguments, but only given {}",
            args.len()
        ));
    }
    Ok(())
}

/// Parses a decimal or `B`-prefixed binary literal, range-checked to `[0, max)`.
fn parse_arg(token: &str, max: u32) -> Result<u32, String> {
    let value: i64 = if token.len() >= 2 && token.starts_with('B') {
        i64::from_str_radix(&token[1..], 2)
            .map_err(|_| format!("failed to parse argument '{token}'"))?
    } else {
        token
            .parse()
            .map_err(|_| format!("failed to parse argument '{token}'"))?
    };
    if value < 0 || value >= max as i64 {
        return Err(format!(
            "argument {value} is out of range (min 0, max {max})"
        ));
    }
    Ok(value as u32)
}

fn parse_register(token: &str) -> Result<u8, String> {
    parse_arg(token, REGISTER_COUNT).map(|v| v as u8)
}

fn parse_address(token: &str) -> Result<u16, String> {
    parse_arg(token, MAX_ADDRESS).map(|v| v as u16)
}

fn parse_three_registers(args: &[&str]) -> Result<(u8, u8, u8), String> {
    require_args(args, 3)?;
    Ok((
        parse_register(args[0])?,
        parse_register(args[1])?,
        parse_register(args[2])?,
    ))
}

fn parse_copy_flags(tokens: &[&str]) -> Result<CopyFlags, String> {
    let mut flags = CopyFlags::default();
    for &token in tokens {
        let bit = match token {
            "HALF" => CopyFlags::HALF,
            "FULL" => CopyFlags::default(),
            "FRM_SIG" => CopyFlags::FRM_SIG,
            "FROM_LOW" => CopyFlags::default(),
            "TO_SIG" => CopyFlags::TO_SIG,
            "TO_LOW" => CopyFlags::default(),
            "OVERWRITE" => CopyFlags::OVERWRITE,
            "NO_OVERWRITE" => CopyFlags::default(),
            "IMMEDIATE" => CopyFlags::IMMEDIATE,
            "NORMAL" => CopyFlags::default(),
            other => return Err(format!("unknown flag {other}")),
        };
        flags ^= bit;
    }
    Ok(flags)
}

fn parse_jump_flags(tokens: &[&str]) -> Result<JumpFlags, String> {
    let mut flags = JumpFlags::default();
    for &token in tokens {
        let bit = match token {
            "ON_HIGH" => JumpFlags::ON_HIGH,
            "ON_LOW" => JumpFlags::default(),
            "DEC" => JumpFlags::DEC,
            "INC" => JumpFlags::default(),
            other => return Err(format!("unknown flag {other}")),
        };
        flags ^= bit;
    }
    Ok(flags)
}

fn parse_load(args: &[&str]) -> Result<Instruction, String> {
    require_args(args, 2)?;
    let addr = parse_address(args[0])?;
    let reg = parse_register(args[1])?;
    let flags = parse_copy_flags(&args[2..])?;
    Ok(Instruction::Load { reg, addr, flags })
}

fn parse_store(args: &[&str]) -> Result<Instruction, String> {
    require_args(args, 2)?;
    let reg = parse_register(args[0])?;
    let addr = parse_address(args[1])?;
    let flags = parse_copy_flags(&args[2..])?;
    Ok(Instruction::Store { reg, addr, flags })
}

fn parse_jump(
    args: &[&str],
    line_index: usize,
    labels: &HashMap<String, usize>,
) -> Result<Instruction, String> {
    require_args(args, 2)?;
    let c = parse_register(args[0])?;
    let amount_token = args[1];
    let amount = if amount_token.starts_with('[') && amount_token.ends_with(']') {
        let name = &amount_token[1..amount_token.len() - 1];
        let label_line = labels
            .get(name)
            .ok_or_else(|| format!("undefined label '{name}'"))?;
        (*label_line as i64 - line_index as i64).unsigned_abs() as u16
    } else {
        parse_address(amount_token)?
    };
    let flags = parse_jump_flags(&args[2..])?;
    Ok(Instruction::Jump { c, amount, flags })
}

fn parse_print(args: &[&str]) -> Result<Instruction, String> {
    require_args(args, 3)?;
    Ok(Instruction::Print {
        r1: parse_register(args[0])?,
        r2: parse_register(args[1])?,
        addr: parse_address(args[2])?,
    })
}
