//! Parsing of individual trace lines.
//!
//! One line of a trace is a `|`-delimited snapshot of a single executed instruction:
//!
//! ```text
//! step(hex) | address | offset | "instruction" | x0 | x1 | ... | x28 | x29 | x30 | sp | pc
//! ```
//!
//! Numeric fields other than `step` accept decimal or prefixed (`0x`, `0o`, `0b`) values. The
//! parser is all-or-nothing: a single bad field discards the line.

use std::fmt;
use std::num::IntErrorKind;

use serde::{Serialize, Serializer};
use thiserror::Error;

/// Number of `|`-delimited fields in a well-formed line.
pub const FIELD_COUNT: usize = 37;

/// General purpose registers x0..=x30.
pub const REGISTER_COUNT: usize = 31;

const FIRST_REGISTER_FIELD: usize = 4;
const SP_FIELD: usize = FIRST_REGISTER_FIELD + REGISTER_COUNT;
const PC_FIELD: usize = SP_FIELD + 1;

/// One parsed snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceRecord {
    pub step: u32,
    pub address: u64,
    pub offset: u64,
    pub instruction: String,
    pub registers: [u64; REGISTER_COUNT],
    pub sp: u64,
    pub pc: u64,
}

/// Identifies a field of a trace line in diagnostics and register diffs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Step,
    Address,
    Offset,
    Register(u8),
    StackPointer,
    ProgramCounter,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Step => f.write_str("step"),
            Field::Address => f.write_str("address"),
            Field::Offset => f.write_str("offset"),
            Field::Register(n) => write!(f, "x{n}"),
            Field::StackPointer => f.write_str("sp"),
            Field::ProgramCounter => f.write_str("pc"),
        }
    }
}

impl Serialize for Field {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NumberError {
    #[error("empty value")]
    Empty,
    #[error("signed values are not allowed")]
    Signed,
    #[error("invalid digit")]
    InvalidDigit,
    #[error("value out of range")]
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordParseError {
    #[error("expected {} fields, found {found}", FIELD_COUNT)]
    FieldCount { found: usize },

    #[error("failed to parse {field} from {value:?}: {reason}")]
    Field {
        field: Field,
        value: String,
        reason: NumberError,
    },

    #[error("line is not valid UTF-8")]
    InvalidUtf8,
}

/// A register whose value differs between two consecutive snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RegisterChange {
    pub register: Field,
    pub before: u64,
    pub after: u64,
}

/// Parses one trace line. A trailing `\r` or `\n` is ignored.
pub fn parse_line(line: &str) -> Result<TraceRecord, RecordParseError> {
    let line = line.trim_end_matches(['\r', '\n']);
    let fields: Vec<&str> = line.split('|').collect();
    if fields.len() != FIELD_COUNT {
        return Err(RecordParseError::FieldCount {
            found: fields.len(),
        });
    }

    let step = parse_hex_u32(fields[0].trim())
        .map_err(|reason| field_error(Field::Step, fields[0], reason))?;
    let address = parse_field(&fields, 1, Field::Address)?;
    let offset = parse_field(&fields, 2, Field::Offset)?;
    let instruction = strip_quotes(fields[3].trim()).to_string();

    let mut registers = [0u64; REGISTER_COUNT];
    for (n, reg) in registers.iter_mut().enumerate() {
        *reg = parse_field(&fields, FIRST_REGISTER_FIELD + n, Field::Register(n as u8))?;
    }

    let sp = parse_field(&fields, SP_FIELD, Field::StackPointer)?;
    let pc = parse_field(&fields, PC_FIELD, Field::ProgramCounter)?;

    Ok(TraceRecord {
        step,
        address,
        offset,
        instruction,
        registers,
        sp,
        pc,
    })
}

/// [`parse_line`] over raw bytes, as read from a file span.
pub fn parse_bytes(raw: &[u8]) -> Result<TraceRecord, RecordParseError> {
    let line = std::str::from_utf8(raw).map_err(|_| RecordParseError::InvalidUtf8)?;
    parse_line(line)
}

impl TraceRecord {
    /// Formats the record back into a trace line (without a line terminator).
    ///
    /// The instruction is written verbatim between quotes, so an instruction containing `|`
    /// does not survive a round trip.
    pub fn to_line(&self) -> String {
        let mut out = format!(
            "{:x}|{:#x}|{:#x}|\"{}\"",
            self.step, self.address, self.offset, self.instruction
        );
        for value in self.registers.iter().chain([&self.sp, &self.pc]) {
            out.push_str(&format!("|{value:#x}"));
        }
        out
    }

    pub fn frame_pointer(&self) -> u64 {
        self.registers[29]
    }

    pub fn link_register(&self) -> u64 {
        self.registers[30]
    }

    /// Registers (including `sp` and `pc`) whose value differs from `previous`.
    pub fn changed_registers(&self, previous: &TraceRecord) -> Vec<RegisterChange> {
        let mut changes: Vec<RegisterChange> = previous
            .registers
            .iter()
            .zip(self.registers.iter())
            .enumerate()
            .filter(|(_, (before, after))| before != after)
            .map(|(n, (&before, &after))| RegisterChange {
                register: Field::Register(n as u8),
                before,
                after,
            })
            .collect();

        if previous.sp != self.sp {
            changes.push(RegisterChange {
                register: Field::StackPointer,
                before: previous.sp,
                after: self.sp,
            });
        }
        if previous.pc != self.pc {
            changes.push(RegisterChange {
                register: Field::ProgramCounter,
                before: previous.pc,
                after: self.pc,
            });
        }
        changes
    }
}

fn field_error(field: Field, raw: &str, reason: NumberError) -> RecordParseError {
    RecordParseError::Field {
        field,
        value: raw.trim().to_string(),
        reason,
    }
}

fn parse_field(fields: &[&str], idx: usize, field: Field) -> Result<u64, RecordParseError> {
    parse_u64_auto(fields[idx].trim()).map_err(|reason| field_error(field, fields[idx], reason))
}

fn strip_quotes(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(s)
}

fn check_unsigned(s: &str) -> Result<(), NumberError> {
    match s.as_bytes().first() {
        None => Err(NumberError::Empty),
        Some(b'+' | b'-') => Err(NumberError::Signed),
        Some(_) => Ok(()),
    }
}

fn map_int_error(err: std::num::ParseIntError) -> NumberError {
    match err.kind() {
        IntErrorKind::PosOverflow => NumberError::Overflow,
        IntErrorKind::Empty => NumberError::Empty,
        _ => NumberError::InvalidDigit,
    }
}

fn parse_hex_u32(s: &str) -> Result<u32, NumberError> {
    check_unsigned(s)?;
    u32::from_str_radix(s, 16).map_err(map_int_error)
}

/// Parses an unsigned 64-bit value, picking the radix from an optional `0x`/`0o`/`0b` prefix.
pub fn parse_u64_auto(s: &str) -> Result<u64, NumberError> {
    check_unsigned(s)?;
    let (radix, digits) = match s.get(..2) {
        Some("0x" | "0X") => (16, &s[2..]),
        Some("0o" | "0O") => (8, &s[2..]),
        Some("0b" | "0B") => (2, &s[2..]),
        _ => (10, s),
    };
    // `from_str_radix` would accept a sign after the prefix.
    match digits.as_bytes().first() {
        None | Some(b'+' | b'-') => return Err(NumberError::InvalidDigit),
        Some(_) => {}
    }
    u64::from_str_radix(digits, radix).map_err(map_int_error)
}
