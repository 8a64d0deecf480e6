//! Instruction decoding.
//!
//! Each instruction is two bytes, with the opcode family in the first 4-bit nibble.
//! Operands are named after the nibbles they occupy:
//!
//! - `x`   second nibble, register Vx (`_X__`)
//! - `y`   third nibble, register Vy (`__Y_`)
//! - `n`   fourth nibble, 4-bit constant (`___N`)
//! - `nn`  low byte, 8-bit constant (`__NN`)
//! - `nnn` low 12 bits, address (`_NNN`)
use std::fmt;

use crate::constants::Address;

/// Extract opcode family from the top nibble.
#[inline(always)]
pub fn op_code(opcode: u16) -> u8 {
    (opcode >> 12) as u8
}

/// Extract operand X.
#[inline(always)]
pub fn op_x(opcode: u16) -> u8 {
    ((opcode & 0x0F00) >> 8) as u8
}

/// Extract operand Y.
#[inline(always)]
pub fn op_y(opcode: u16) -> u8 {
    ((opcode & 0x00F0) >> 4) as u8
}

/// Extract operand N.
#[inline(always)]
pub fn op_n(opcode: u16) -> u8 {
    (opcode & 0x000F) as u8
}

/// Extract operand NN.
#[inline(always)]
pub fn op_nn(opcode: u16) -> u8 {
    (opcode & 0x00FF) as u8
}

/// Extract operand NNN.
#[inline(always)]
pub fn op_nnn(opcode: u16) -> Address {
    opcode & 0x0FFF
}

/// A decoded instruction, carrying only the operands it uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Instruction {
    /// 0NNN (SYS addr). Machine code routines are not emulated.
    Sys { nnn: Address },
    /// 00E0 (CLS)
    ClearScreen,
    /// 00EE (RET)
    Return,
    /// 1NNN (JP addr)
    Jump { nnn: Address },
    /// 2NNN (CALL addr)
    Call { nnn: Address },
    /// 3XNN (SE Vx, byte)
    SkipEqImm { x: u8, nn: u8 },
    /// 4XNN (SNE Vx, byte)
    SkipNeImm { x: u8, nn: u8 },
    /// 5XY0 (SE Vx, Vy)
    SkipEqReg { x: u8, y: u8 },
    /// 6XNN (LD Vx, byte)
    LoadImm { x: u8, nn: u8 },
    /// 7XNN (ADD Vx, byte)
    AddImm { x: u8, nn: u8 },
    /// 8XY0 (LD Vx, Vy)
    Move { x: u8, y: u8 },
    /// 8XY1 (OR Vx, Vy)
    Or { x: u8, y: u8 },
    /// 8XY2 (AND Vx, Vy)
    And { x: u8, y: u8 },
    /// 8XY3 (XOR Vx, Vy)
    Xor { x: u8, y: u8 },
    /// 8XY4 (ADD Vx, Vy)
    Add { x: u8, y: u8 },
    /// 8XY5 (SUB Vx, Vy)
    Sub { x: u8, y: u8 },
    /// 8XY6 (SHR Vx, Vy)
    ShiftRight { x: u8, y: u8 },
    /// 8XY7 (SUBN Vx, Vy)
    SubReverse { x: u8, y: u8 },
    /// 8XYE (SHL Vx, Vy)
    ShiftLeft { x: u8, y: u8 },
    /// 9XY0 (SNE Vx, Vy)
    SkipNeReg { x: u8, y: u8 },
    /// ANNN (LD I, addr)
    LoadIndex { nnn: Address },
    /// BNNN (JP V0, addr)
    JumpOffset { nnn: Address },
    /// CXNN (RND Vx, byte)
    Random { x: u8, nn: u8 },
    /// DXYN (DRW Vx, Vy, nibble)
    Draw { x: u8, y: u8, n: u8 },
    /// EX9E (SKP Vx)
    SkipKey { x: u8 },
    /// EXA1 (SKNP Vx)
    SkipNotKey { x: u8 },
    /// FX07 (LD Vx, DT)
    LoadDelay { x: u8 },
    /// FX0A (LD Vx, K)
    WaitKey { x: u8 },
    /// FX15 (LD DT, Vx)
    SetDelay { x: u8 },
    /// FX18 (LD ST, Vx)
    SetSound { x: u8 },
    /// FX1E (ADD I, Vx)
    AddIndex { x: u8 },
    /// FX29 (LD F, Vx)
    LoadFont { x: u8 },
    /// FX33 (LD B, Vx)
    StoreBcd { x: u8 },
    /// FX55 (LD [I], Vx)
    StoreRegisters { x: u8 },
    /// FX65 (LD Vx, [I])
    LoadRegisters { x: u8 },
    /// Undefined encoding. Executes as a no-op.
    Unknown(u16),
}

impl Instruction {
    /// Decode a raw opcode. Undefined encodings decode to [`Instruction::Unknown`].
    pub fn decode(opcode: u16) -> Self {
        use Instruction as I;

        let x = op_x(opcode);
        let y = op_y(opcode);
        let n = op_n(opcode);
        let nn = op_nn(opcode);
        let nnn = op_nnn(opcode);

        match op_code(opcode) {
            0x0 => match nnn {
                0x0E0 => I::ClearScreen,
                0x0EE => I::Return,
                _ => I::Sys { nnn },
            },
            0x1 => I::Jump { nnn },
            0x2 => I::Call { nnn },
            0x3 => I::SkipEqImm { x, nn },
            0x4 => I::SkipNeImm { x, nn },
            0x5 => I::SkipEqReg { x, y },
            0x6 => I::LoadImm { x, nn },
            0x7 => I::AddImm { x, nn },
            // Arithmetic instructions identified by n
            0x8 => match n {
                0x0 => I::Move { x, y },
                0x1 => I::Or { x, y },
                0x2 => I::And { x, y },
                0x3 => I::Xor { x, y },
                0x4 => I::Add { x, y },
                0x5 => I::Sub { x, y },
                0x6 => I::ShiftRight { x, y },
                0x7 => I::SubReverse { x, y },
                0xE => I::ShiftLeft { x, y },
                _ => I::Unknown(opcode),
            },
            0x9 => I::SkipNeReg { x, y },
            0xA => I::LoadIndex { nnn },
            0xB => I::JumpOffset { nnn },
            0xC => I::Random { x, nn },
            0xD => I::Draw { x, y, n },
            // Keyboard instructions identified by nn
            0xE => match nn {
                0x9E => I::SkipKey { x },
                0xA1 => I::SkipNotKey { x },
                _ => I::Unknown(opcode),
            },
            // Miscellaneous instructions identified by nn
            0xF => match nn {
                0x07 => I::LoadDelay { x },
                0x0A => I::WaitKey { x },
                0x15 => I::SetDelay { x },
                0x18 => I::SetSound { x },
                0x1E => I::AddIndex { x },
                0x29 => I::LoadFont { x },
                0x33 => I::StoreBcd { x },
                0x55 => I::StoreRegisters { x },
                0x65 => I::LoadRegisters { x },
                _ => I::Unknown(opcode),
            },
            _ => unreachable!("opcode family is a 4-bit nibble"),
        }
    }

    /// Conventional assembly mnemonic, without operands.
    pub fn mnemonic(&self) -> &'static str {
        use Instruction as I;

        match self {
            I::Sys { .. } => "SYS",
            I::ClearScreen => "CLS",
            I::Return => "RET",
            I::Jump { .. } | I::JumpOffset { .. } => "JP",
            I::Call { .. } => "CALL",
            I::SkipEqImm { .. } | I::SkipEqReg { .. } => "SE",
            I::SkipNeImm { .. } | I::SkipNeReg { .. } => "SNE",
            I::LoadImm { .. }
            | I::Move { .. }
            | I::LoadIndex { .. }
            | I::LoadDelay { .. }
            | I::WaitKey { .. }
            | I::SetDelay { .. }
            | I::SetSound { .. }
            | I::LoadFont { .. }
            | I::StoreBcd { .. }
            | I::StoreRegisters { .. }
            | I::LoadRegisters { .. } => "LD",
            I::AddImm { .. } | I::Add { .. } | I::AddIndex { .. } => "ADD",
            I::Or { .. } => "OR",
            I::And { .. } => "AND",
            I::Xor { .. } => "XOR",
            I::Sub { .. } => "SUB",
            I::ShiftRight { .. } => "SHR",
            I::SubReverse { .. } => "SUBN",
            I::ShiftLeft { .. } => "SHL",
            I::Random { .. } => "RND",
            I::Draw { .. } => "DRW",
            I::SkipKey { .. } => "SKP",
            I::SkipNotKey { .. } => "SKNP",
            I::Unknown(_) => "DW",
        }
    }
}

impl From<u16> for Instruction {
    fn from(opcode: u16) -> Self {
        Self::decode(opcode)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Instruction as I;

        let name = self.mnemonic();

        match *self {
            I::ClearScreen | I::Return => write!(f, "{name}"),
            I::Sys { nnn } | I::Jump { nnn } | I::Call { nnn } => write!(f, "{name} 0x{nnn:03X}"),
            I::JumpOffset { nnn } => write!(f, "{name} V0, 0x{nnn:03X}"),
            I::LoadIndex { nnn } => write!(f, "{name} I, 0x{nnn:03X}"),
            I::SkipEqImm { x, nn }
            | I::SkipNeImm { x, nn }
            | I::LoadImm { x, nn }
            | I::AddImm { x, nn }
            | I::Random { x, nn } => write!(f, "{name} V{x:X}, 0x{nn:02X}"),
            I::SkipEqReg { x, y }
            | I::SkipNeReg { x, y }
            | I::Move { x, y }
            | I::Or { x, y }
            | I::And { x, y }
            | I::Xor { x, y }
            | I::Add { x, y }
            | I::Sub { x, y }
            | I::ShiftRight { x, y }
            | I::SubReverse { x, y }
            | I::ShiftLeft { x, y } => write!(f, "{name} V{x:X}, V{y:X}"),
            I::Draw { x, y, n } => write!(f, "{name} V{x:X}, V{y:X}, {n}"),
            I::SkipKey { x } | I::SkipNotKey { x } => write!(f, "{name} V{x:X}"),
            I::LoadDelay { x } => write!(f, "{name} V{x:X}, DT"),
            I::WaitKey { x } => write!(f, "{name} V{x:X}, K"),
            I::SetDelay { x } => write!(f, "{name} DT, V{x:X}"),
            I::SetSound { x } => write!(f, "{name} ST, V{x:X}"),
            I::AddIndex { x } => write!(f, "{name} I, V{x:X}"),
            I::LoadFont { x } => write!(f, "{name} F, V{x:X}"),
            I::StoreBcd { x } => write!(f, "{name} B, V{x:X}"),
            I::StoreRegisters { x } => write!(f, "{name} [I], V{x:X}"),
            I::LoadRegisters { x } => write!(f, "{name} V{x:X}, [I]"),
            I::Unknown(opcode) => write!(f, "{name} 0x{opcode:04X}"),
        }
    }
}
