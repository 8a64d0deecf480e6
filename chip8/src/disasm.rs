//! Disassembler.
use std::fmt::{self, Write as FmtWrite};

use crate::{constants::MEM_START, decode::Instruction};

/// Walks a program two bytes at a time, as loaded at 0x200.
///
/// Data embedded in the program, such as sprites, is decoded as if it were
/// code. A trailing odd byte is reported as a single data byte.
pub struct Disassembler<'a> {
    bytecode: &'a [u8],
    cursor: usize,
}

/// One line of a program listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Line {
    Instr {
        address: usize,
        opcode: u16,
        instr: Instruction,
    },
    Data {
        address: usize,
        byte: u8,
    },
}

impl<'a> Disassembler<'a> {
    pub fn new(bytecode: &'a [u8]) -> Self {
        Self {
            bytecode,
            cursor: 0,
        }
    }

    /// Write the remaining program listing to the given writer.
    pub fn disassemble<W: FmtWrite>(&mut self, w: &mut W) -> fmt::Result {
        for line in self.by_ref() {
            writeln!(w, "{line}")?;
        }
        Ok(())
    }

    /// The complete program listing.
    pub fn listing(bytecode: &[u8]) -> Result<String, fmt::Error> {
        let mut buf = String::new();
        Disassembler::new(bytecode).disassemble(&mut buf)?;
        Ok(buf)
    }
}

impl<'a> Iterator for Disassembler<'a> {
    type Item = Line;

    fn next(&mut self) -> Option<Self::Item> {
        let address = MEM_START + self.cursor;

        let line = match self.bytecode.get(self.cursor..)? {
            [] => return None,
            [a, b, ..] => {
                let opcode = u16::from_be_bytes([*a, *b]);
                Line::Instr {
                    address,
                    opcode,
                    instr: Instruction::from(opcode),
                }
            }
            [byte] => Line::Data {
                address,
                byte: *byte,
            },
        };

        self.cursor += 2;
        Some(line)
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Line::Instr {
                address,
                opcode,
                instr,
            } => write!(f, "{address:04X}: {opcode:04X}  {instr}"),
            Line::Data { address, byte } => write!(f, "{address:04X}: {byte:02X}    DB 0x{byte:02X}"),
        }
    }
}
