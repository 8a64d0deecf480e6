mod clock;
pub mod constants;
mod cpu;
mod decode;
pub mod devices;
mod disasm;
mod display;
mod error;
mod interp;
mod vm;

pub use self::{
    clock::Hz,
    cpu::KeyWait,
    decode::Instruction,
    disasm::{Disassembler, Line},
    display::{DisplayBuffer, SharedDisplay},
    vm::Flow,
};

pub mod prelude {
    pub use super::{
        clock::Hz,
        devices::{Backend, KeyCode, Keypad},
        disasm::Disassembler,
        display::DisplayBuffer,
        error::{Chip8Error, Chip8Result},
        vm::{Chip8Conf, Chip8Vm, Flow},
    };
}
