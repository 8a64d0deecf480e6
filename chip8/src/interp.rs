//! Instruction executors.
//!
//! The program counter has already been advanced past the instruction when
//! it executes. Jumps, calls, returns and skips adjust it from there.
use log::{debug, warn};
use rand::RngCore;

use crate::{
    constants::*,
    cpu::{Chip8Cpu, KeyWait},
    decode::Instruction,
    devices::Input,
    display::{self, SharedDisplay},
    vm::Flow,
};

/// Machine state an instruction may touch.
pub(crate) struct Exec<'a, K: ?Sized, R> {
    pub cpu: &'a mut Chip8Cpu,
    pub display: &'a SharedDisplay,
    pub input: &'a K,
    pub rng: &'a mut R,
}

impl<'a, K, R> Exec<'a, K, R>
where
    K: Input + ?Sized,
    R: RngCore,
{
    /// Execute a single decoded instruction.
    pub(crate) fn execute(&mut self, instr: Instruction) -> Flow {
        use Instruction as Op;

        match instr {
            Op::Sys { .. } | Op::Unknown(_) => Flow::Ok,
            // 00E0 (CLS)
            //
            // Clear display
            Op::ClearScreen => {
                display::write(self.display).clear();
                Flow::Draw
            }
            // 00EE (RET)
            //
            // Return from a subroutine.
            // Subtract 1 from the stack pointer, then jump to the address it points to.
            Op::Return => match self.cpu.pop() {
                Some(address) => {
                    self.cpu.pc = address;
                    Flow::Jump
                }
                None => {
                    warn!("call stack underflow at {:04X}", self.cpu.pc.wrapping_sub(2));
                    Flow::Ok
                }
            },
            // 1NNN (JP addr)
            Op::Jump { nnn } => {
                self.cpu.pc = nnn;
                Flow::Jump
            }
            // 2NNN (CALL addr)
            //
            // Push the address of the next instruction, then jump to NNN.
            Op::Call { nnn } => {
                if !self.cpu.push(self.cpu.pc) {
                    warn!("call stack overflow at {:04X}", self.cpu.pc.wrapping_sub(2));
                }
                self.cpu.pc = nnn;
                Flow::Jump
            }
            // 3XNN (SE Vx, byte)
            Op::SkipEqImm { x, nn } => self.skip_if(self.reg(x) == nn),
            // 4XNN (SNE Vx, byte)
            Op::SkipNeImm { x, nn } => self.skip_if(self.reg(x) != nn),
            // 5XY0 (SE Vx, Vy)
            Op::SkipEqReg { x, y } => self.skip_if(self.reg(x) == self.reg(y)),
            // 9XY0 (SNE Vx, Vy)
            Op::SkipNeReg { x, y } => self.skip_if(self.reg(x) != self.reg(y)),
            // 6XNN (LD Vx, byte)
            Op::LoadImm { x, nn } => {
                self.set_reg(x, nn);
                Flow::Ok
            }
            // 7XNN (ADD Vx, byte)
            //
            // Carry flag is not set.
            Op::AddImm { x, nn } => {
                self.set_reg(x, self.reg(x).wrapping_add(nn));
                Flow::Ok
            }
            Op::Move { .. }
            | Op::Or { .. }
            | Op::And { .. }
            | Op::Xor { .. }
            | Op::Add { .. }
            | Op::Sub { .. }
            | Op::ShiftRight { .. }
            | Op::SubReverse { .. }
            | Op::ShiftLeft { .. } => {
                self.exec_math(instr);
                Flow::Ok
            }
            // ANNN (LD I, addr)
            Op::LoadIndex { nnn } => {
                self.cpu.index = nnn;
                Flow::Ok
            }
            // BNNN (JP V0, addr)
            Op::JumpOffset { nnn } => {
                self.cpu.pc = nnn.wrapping_add(self.reg(0) as Address);
                Flow::Jump
            }
            // CXNN (RND Vx, byte)
            Op::Random { x, nn } => {
                let value = (self.rng.next_u32() & 0xFF) as u8;
                self.set_reg(x, value & nn);
                Flow::Ok
            }
            Op::Draw { x, y, n } => {
                self.exec_draw(x, y, n);
                Flow::Draw
            }
            // EX9E (SKP Vx)
            Op::SkipKey { x } => {
                let pressed = self.input.is_pressed(self.reg(x));
                self.skip_if(pressed)
            }
            // EXA1 (SKNP Vx)
            Op::SkipNotKey { x } => {
                let pressed = self.input.is_pressed(self.reg(x));
                self.skip_if(!pressed)
            }
            // FX07 (LD Vx, DT)
            Op::LoadDelay { x } => {
                self.set_reg(x, self.cpu.delay_timer);
                Flow::Ok
            }
            Op::WaitKey { x } => self.exec_key_wait(x),
            // FX15 (LD DT, Vx)
            Op::SetDelay { x } => {
                self.cpu.delay_timer = self.reg(x);
                Flow::Ok
            }
            // FX18 (LD ST, Vx)
            Op::SetSound { x } => {
                self.cpu.sound_timer = self.reg(x);
                Flow::Sound
            }
            // FX1E (ADD I, Vx)
            Op::AddIndex { x } => {
                self.cpu.index = self.cpu.index.wrapping_add(self.reg(x) as Address);
                Flow::Ok
            }
            // FX29 (LD F, Vx)
            //
            // Set I = location of sprite for digit Vx.
            Op::LoadFont { x } => {
                self.cpu.index = FONTSET_START + self.reg(x) as Address * FONTSET_HEIGHT as Address;
                Flow::Ok
            }
            // FX33 (LD B, Vx)
            //
            // Store the binary-coded decimal representation of Vx
            // in the memory locations I, I+1, and I+2.
            #[rustfmt::skip]
            Op::StoreBcd { x } => {
                let addr = self.cpu.index;
                let value = self.reg(x);
                self.cpu.write(addr,                   value / 100 % 10);
                self.cpu.write(addr.wrapping_add(1),   value / 10  % 10);
                self.cpu.write(addr.wrapping_add(2),   value       % 10);
                Flow::Ok
            }
            // FX55 (LD [I], Vx)
            //
            // Store registers V0 through Vx in memory starting at location I,
            // then advance I past the stored bytes.
            Op::StoreRegisters { x } => {
                let addr = self.cpu.index;
                for v in 0..=x {
                    let value = self.reg(v);
                    self.cpu.write(addr.wrapping_add(v as Address), value);
                }
                self.cpu.index = addr.wrapping_add(x as Address + 1);
                Flow::Ok
            }
            // FX65 (LD Vx, [I])
            //
            // Read registers V0 through Vx from memory starting at location I,
            // then advance I past the loaded bytes.
            Op::LoadRegisters { x } => {
                let addr = self.cpu.index;
                for v in 0..=x {
                    let value = self.cpu.read(addr.wrapping_add(v as Address));
                    self.set_reg(v, value);
                }
                self.cpu.index = addr.wrapping_add(x as Address + 1);
                Flow::Ok
            }
        }
    }

    #[inline(always)]
    fn reg(&self, v: u8) -> u8 {
        self.cpu.registers[v as usize & 0xF]
    }

    #[inline(always)]
    fn set_reg(&mut self, v: u8, value: u8) {
        self.cpu.registers[v as usize & 0xF] = value;
    }

    #[inline(always)]
    fn skip_if(&mut self, condition: bool) -> Flow {
        if condition {
            self.cpu.skip();
        }
        Flow::Ok
    }

    /// Execute an arithmetic instruction.
    ///
    /// The order in which the result and VF are written matters when X is F.
    fn exec_math(&mut self, instr: Instruction) {
        use Instruction as Op;

        match instr {
            // 8XY0 (LD Vx, Vy)
            Op::Move { x, y } => self.set_reg(x, self.reg(y)),
            // 8XY1 (OR Vx, Vy)
            Op::Or { x, y } => self.set_reg(x, self.reg(x) | self.reg(y)),
            // 8XY2 (AND Vx, Vy)
            Op::And { x, y } => self.set_reg(x, self.reg(x) & self.reg(y)),
            // 8XY3 (XOR Vx, Vy)
            Op::Xor { x, y } => self.set_reg(x, self.reg(x) ^ self.reg(y)),
            // 8XY4 (ADD Vx, Vy)
            //
            // VF is set to 1 on overflow, written before the sum.
            Op::Add { x, y } => {
                let (result, carry) = self.reg(x).overflowing_add(self.reg(y));
                self.cpu.set_flag(carry);
                self.set_reg(x, result);
            }
            // 8XY5 (SUB Vx, Vy)
            //
            // VF is set to 1 when the stored difference is not negative as a
            // signed byte. Compatible interpreters compare signed values here.
            Op::Sub { x, y } => {
                let result = self.reg(x).wrapping_sub(self.reg(y));
                self.set_reg(x, result);
                self.cpu.set_flag(result as i8 >= 0);
            }
            // 8XY6 (SHR Vx, Vy)
            //
            // VF takes the low bit of Vx. Vx takes Vy shifted right.
            Op::ShiftRight { x, y } => {
                self.cpu.set_flag(self.reg(x) & 0x1 == 1);
                self.set_reg(x, self.reg(y) >> 1);
            }
            // 8XY7 (SUBN Vx, Vy)
            //
            // VF compares Vy against the updated Vx.
            Op::SubReverse { x, y } => {
                let result = self.reg(y).wrapping_sub(self.reg(x));
                self.set_reg(x, result);
                self.cpu.set_flag(self.reg(y) >= self.reg(x));
            }
            // 8XYE (SHL Vx, Vy)
            //
            // VF takes the high bit of Vx. Vx takes Vy shifted left.
            Op::ShiftLeft { x, y } => {
                self.cpu.set_flag(self.reg(x) & 0x80 == 0x80);
                self.set_reg(x, self.reg(y) << 1);
            }
            _ => unreachable!("not an arithmetic instruction: {instr}"),
        }
    }

    /// DXYN (DRW Vx, Vy, nibble)
    ///
    /// Draw sprite to the display buffer, at coordinate as per registers Vx and Vy.
    /// Sprite is encoded as 8 pixels wide, N pixels high, stored in bits located in
    /// memory pointed to by address register I.
    ///
    /// If the sprite is drawn outside of the display area, it is wrapped around to the other side.
    ///
    /// If the drawing operation erases existing pixels in the display buffer, register VF is set to
    /// 1, and set to 0 if no display bits are unset. This is used for collision detection.
    fn exec_draw(&mut self, vx: u8, vy: u8, n: u8) {
        // Coordinates are read after the flag reset, so VF as an operand reads 0.
        self.cpu.set_flag(false);

        let (x, y) = (self.reg(vx) as usize, self.reg(vy) as usize);
        let mut is_erased = false;

        {
            let mut screen = display::write(self.display);

            for r in 0..n as usize {
                let row = self.cpu.read(self.cpu.index.wrapping_add(r as Address));

                // Each row is 8 bits representing the 8 pixels of the sprite.
                for c in 0..SPRITE_WIDTH {
                    if row & (0x80 >> c) == 0 {
                        continue;
                    }

                    is_erased |= screen.toggle(x + c, y + r);
                }
            }
        }

        // If a pixel was erased, then a collision occurred.
        self.cpu.set_flag(is_erased);
    }

    /// FX0A (LD Vx, K)
    ///
    /// Wait for a key to be pressed and released, then store it in Vx.
    ///
    /// Execution never blocks. While waiting, the program counter is
    /// rewound so the instruction is polled again on the next tick.
    fn exec_key_wait(&mut self, x: u8) -> Flow {
        let keys = self.input.keys();

        if let KeyWait::Waiting { key, .. } = self.cpu.key_wait {
            if !keys[key as usize] {
                debug!("key wait complete: V{x:X} = {key:X}");
                self.set_reg(x, key);
                self.cpu.key_wait = KeyWait::Idle;
                return Flow::Ok;
            }
        }

        // The highest pressed key wins.
        if let Some(key) = (0..KEY_COUNT).rev().find(|k| keys[*k as usize]) {
            if self.cpu.key_wait == KeyWait::Idle {
                debug!("key wait: k{key:x} pressed");
            }
            self.cpu.key_wait = KeyWait::Waiting { register: x, key };
        }

        // rewind the program counter to stall the machine
        self.cpu.rewind();
        Flow::KeyWait
    }
}

#[cfg(test)]
mod test {
    use std::sync::{Arc, RwLock};

    use rand::{rngs::StdRng, SeedableRng};

    use super::*;
    use crate::{devices::Keys, display::DisplayBuffer};

    struct Machine {
        cpu: Chip8Cpu,
        display: SharedDisplay,
        keys: Keys,
        rng: StdRng,
    }

    impl Machine {
        fn new() -> Self {
            Self {
                cpu: Chip8Cpu::new(),
                display: Arc::new(RwLock::new(DisplayBuffer::new())),
                keys: [false; 16],
                rng: StdRng::seed_from_u64(7),
            }
        }

        /// Run an opcode as if it had just been fetched from 0x200.
        fn run(&mut self, opcode: u16) -> Flow {
            self.cpu.pc = self.cpu.pc.wrapping_add(2);
            Exec {
                cpu: &mut self.cpu,
                display: &self.display,
                input: &self.keys,
                rng: &mut self.rng,
            }
            .execute(Instruction::decode(opcode))
        }

        fn v(&self, x: usize) -> u8 {
            self.cpu.registers[x]
        }
    }

    #[test]
    fn test_load_and_add_immediate() {
        let mut m = Machine::new();
        m.run(0x6A42);
        assert_eq!(m.v(0xA), 0x42);

        m.run(0x7AC0);
        assert_eq!(m.v(0xA), 0x02);
        assert_eq!(m.v(0xF), 0, "7XNN must not touch the carry flag");
    }

    #[test]
    fn test_add_carry() {
        let mut m = Machine::new();
        m.cpu.registers[0] = 0xFF;
        m.cpu.registers[1] = 0x01;
        m.run(0x8014);
        assert_eq!(m.v(0), 0x00);
        assert_eq!(m.v(0xF), 1);

        m.cpu.registers[0] = 0x01;
        m.cpu.registers[1] = 0x01;
        m.run(0x8014);
        assert_eq!(m.v(0), 0x02);
        assert_eq!(m.v(0xF), 0);
    }

    #[test]
    fn test_add_into_flag_register() {
        let mut m = Machine::new();
        m.cpu.registers[0xF] = 0xFF;
        m.cpu.registers[1] = 0x02;
        m.run(0x8F14);
        // flag is written first, then overwritten by the sum
        assert_eq!(m.v(0xF), 0x01);
    }

    #[test]
    fn test_move_leaves_flag() {
        let mut m = Machine::new();
        m.cpu.registers[1] = 0x42;
        m.cpu.registers[0xF] = 0x77;
        m.run(0x8010);
        assert_eq!(m.v(0), 0x42);
        assert_eq!(m.v(1), 0x42);
        assert_eq!(m.v(0xF), 0x77);
    }

    #[test]
    fn test_sub_into_flag_register() {
        let mut m = Machine::new();
        m.cpu.registers[0xF] = 3;
        m.cpu.registers[1] = 5;
        m.run(0x8F15);
        // difference is stored first, then overwritten by the flag
        assert_eq!(m.v(0xF), 0);
    }

    #[test]
    fn test_shift_right_into_flag_register() {
        let mut m = Machine::new();
        m.cpu.registers[0xF] = 0b11;
        m.cpu.registers[1] = 0x80;
        m.run(0x8F16);
        // flag is written first, then overwritten by the shifted value
        assert_eq!(m.v(0xF), 0x40);
    }

    #[test]
    fn test_sub_reverse_into_flag_register() {
        let mut m = Machine::new();
        m.cpu.registers[0xF] = 5;
        m.cpu.registers[1] = 2;
        m.run(0x8F17);
        // 2 - 5 wraps to 0xFD, which is then compared against V1
        assert_eq!(m.v(0xF), 0);
    }

    #[test]
    fn test_shift_left_into_flag_register() {
        let mut m = Machine::new();
        m.cpu.registers[0xF] = 0x80;
        m.cpu.registers[1] = 0x21;
        m.run(0x8F1E);
        assert_eq!(m.v(0xF), 0x42);
    }

    #[test]
    fn test_sub_borrow() {
        let mut m = Machine::new();
        m.cpu.registers[0] = 5;
        m.cpu.registers[1] = 3;
        m.run(0x8015);
        assert_eq!(m.v(0), 2);
        assert_eq!(m.v(0xF), 1);

        m.cpu.registers[0] = 3;
        m.cpu.registers[1] = 5;
        m.run(0x8015);
        assert_eq!(m.v(0), 0xFE);
        assert_eq!(m.v(0xF), 0);
    }

    #[test]
    fn test_sub_signed_quirk() {
        let mut m = Machine::new();
        // 200 - 10 = 190 does not borrow, but 190 is negative as a signed byte.
        m.cpu.registers[0] = 200;
        m.cpu.registers[1] = 10;
        m.run(0x8015);
        assert_eq!(m.v(0), 190);
        assert_eq!(m.v(0xF), 0);

        // 10 - 200 borrows, but the wrapped result 66 is positive.
        m.cpu.registers[0] = 10;
        m.cpu.registers[1] = 200;
        m.run(0x8015);
        assert_eq!(m.v(0), 66);
        assert_eq!(m.v(0xF), 1);
    }

    #[test]
    fn test_subn_compares_updated_register() {
        let mut m = Machine::new();
        m.cpu.registers[0] = 3;
        m.cpu.registers[1] = 5;
        m.run(0x8017);
        assert_eq!(m.v(0), 2);
        assert_eq!(m.v(0xF), 1);

        m.cpu.registers[0] = 5;
        m.cpu.registers[1] = 3;
        m.run(0x8017);
        assert_eq!(m.v(0), 0xFE);
        assert_eq!(m.v(0xF), 0);
    }

    #[test]
    fn test_shifts_use_vy() {
        let mut m = Machine::new();
        m.cpu.registers[0] = 0b0000_0001;
        m.cpu.registers[1] = 0b1000_0100;
        m.run(0x8016);
        assert_eq!(m.v(0), 0b0100_0010);
        assert_eq!(m.v(0xF), 1);

        m.cpu.registers[0] = 0b1000_0000;
        m.cpu.registers[1] = 0b0100_0001;
        m.run(0x801E);
        assert_eq!(m.v(0), 0b1000_0010);
        assert_eq!(m.v(0xF), 1);

        m.cpu.registers[0] = 0b0000_0000;
        m.run(0x801E);
        assert_eq!(m.v(0xF), 0);
    }

    #[test]
    fn test_bitwise_leaves_flag() {
        let mut m = Machine::new();
        m.cpu.registers[0xF] = 0x5A;
        m.cpu.registers[0] = 0b1100;
        m.cpu.registers[1] = 0b1010;

        m.run(0x8011);
        assert_eq!(m.v(0), 0b1110);
        m.run(0x8012);
        assert_eq!(m.v(0), 0b1010);
        m.run(0x8013);
        assert_eq!(m.v(0), 0b0000);
        assert_eq!(m.v(0xF), 0x5A);
    }

    #[test]
    fn test_skips() {
        let mut m = Machine::new();
        m.cpu.registers[1] = 0x11;
        m.cpu.registers[2] = 0x11;

        m.run(0x3111);
        assert_eq!(m.cpu.pc, 0x204);
        m.run(0x4111);
        assert_eq!(m.cpu.pc, 0x206);
        m.run(0x5120);
        assert_eq!(m.cpu.pc, 0x20A);
        m.run(0x9120);
        assert_eq!(m.cpu.pc, 0x20C);
    }

    #[test]
    fn test_call_and_return() {
        let mut m = Machine::new();

        assert_eq!(m.run(0x2400), Flow::Jump);
        assert_eq!(m.cpu.pc, 0x400);
        assert_eq!(m.cpu.sp, 1);
        assert_eq!(m.cpu.stack[0], 0x202);

        assert_eq!(m.run(0x00EE), Flow::Jump);
        assert_eq!(m.cpu.pc, 0x202);
        assert_eq!(m.cpu.sp, 0);
    }

    #[test]
    fn test_return_on_empty_stack_is_noop() {
        let mut m = Machine::new();
        assert_eq!(m.run(0x00EE), Flow::Ok);
        assert_eq!(m.cpu.pc, 0x202);
        assert_eq!(m.cpu.sp, 0);
    }

    #[test]
    fn test_jump_with_offset() {
        let mut m = Machine::new();
        m.cpu.registers[0] = 0x10;
        m.run(0xB300);
        assert_eq!(m.cpu.pc, 0x310);
    }

    #[test]
    fn test_random_masked() {
        let mut m = Machine::new();
        for _ in 0..32 {
            m.run(0xC30F);
            assert_eq!(m.v(3) & 0xF0, 0);
        }
        m.run(0xC300);
        assert_eq!(m.v(3), 0);
    }

    #[test]
    fn test_timers() {
        let mut m = Machine::new();
        m.cpu.registers[4] = 42;

        m.run(0xF415);
        assert_eq!(m.cpu.delay_timer, 42);
        assert_eq!(m.run(0xF418), Flow::Sound);
        assert_eq!(m.cpu.sound_timer, 42);

        m.cpu.delay_timer = 7;
        m.run(0xF507);
        assert_eq!(m.v(5), 7);
    }

    #[test]
    fn test_index_add_wraps() {
        let mut m = Machine::new();
        m.cpu.index = 0xFFFF;
        m.cpu.registers[0] = 2;
        m.run(0xF01E);
        assert_eq!(m.cpu.index, 0x0001);
    }

    #[test]
    fn test_font_address() {
        let mut m = Machine::new();
        m.cpu.registers[0] = 0xA;
        m.run(0xF029);
        assert_eq!(m.cpu.index, 50);
        assert_eq!(
            &m.cpu.ram[50..55],
            &[0xF0, 0x90, 0xF0, 0x90, 0x90],
            "glyph for 'A'"
        );
    }

    #[test]
    fn test_bcd() {
        let mut m = Machine::new();
        m.cpu.index = 0x300;
        m.cpu.registers[0] = 234;
        m.run(0xF033);
        assert_eq!(&m.cpu.ram[0x300..0x303], &[2, 3, 4]);

        m.cpu.registers[0] = 7;
        m.run(0xF033);
        assert_eq!(&m.cpu.ram[0x300..0x303], &[0, 0, 7]);
    }

    #[test]
    fn test_register_dump_and_load_advance_index() {
        let mut m = Machine::new();
        m.cpu.index = 0x300;
        m.cpu.registers[..4].copy_from_slice(&[1, 2, 3, 4]);

        m.run(0xF355);
        assert_eq!(&m.cpu.ram[0x300..0x305], &[1, 2, 3, 4, 0]);
        assert_eq!(m.cpu.index, 0x304);

        m.cpu.index = 0x300;
        m.cpu.registers.fill(0);
        m.run(0xF265);
        assert_eq!(&m.cpu.registers[..4], &[1, 2, 3, 0]);
        assert_eq!(m.cpu.index, 0x303);
    }

    #[test]
    fn test_draw_wraps_around() {
        let mut m = Machine::new();
        m.cpu.index = 0x300;
        m.cpu.ram[0x300] = 0b1100_0000;
        m.cpu.registers[0] = 63;
        m.cpu.registers[1] = 31;

        m.run(0xD011);
        let screen = m.display.read().unwrap();
        assert!(screen.get(63, 31));
        assert!(screen.get(0, 31));
        assert_eq!(screen.lit_count(), 2);
    }

    #[test]
    fn test_draw_at_flag_register() {
        let mut m = Machine::new();
        m.cpu.index = 0x300;
        m.cpu.ram[0x300] = 0x80;
        m.cpu.registers[0xF] = 10;

        // VF is cleared before the coordinates are read
        m.run(0xDF01);
        let screen = m.display.read().unwrap();
        assert!(screen.get(0, 0));
        assert!(!screen.get(10, 0));
        assert_eq!(m.v(0xF), 0);
    }

    #[test]
    fn test_draw_collision() {
        let mut m = Machine::new();
        m.cpu.index = 0x300;
        m.cpu.ram[0x300] = 0b1111_0000;

        // Draw two sprites next to each other.
        // The zero bits of the second draw must not erase the pixels of the first.
        m.cpu.registers[0] = 4;
        m.run(0xD011);
        assert_eq!(m.v(0xF), 0);
        m.cpu.registers[0] = 0;
        m.run(0xD011);
        assert_eq!(m.v(0xF), 0);
        assert_eq!(m.display.read().unwrap().lit_count(), 8);

        // Drawing over existing pixels erases them and sets the flag.
        m.run(0xD011);
        assert_eq!(m.v(0xF), 1);
        assert_eq!(m.display.read().unwrap().lit_count(), 4);
    }

    #[test]
    fn test_clear_screen() {
        let mut m = Machine::new();
        m.display.write().unwrap().set(10, 10, true);
        assert_eq!(m.run(0x00E0), Flow::Draw);
        assert_eq!(m.display.read().unwrap().lit_count(), 0);
    }

    #[test]
    fn test_key_skips() {
        let mut m = Machine::new();
        m.cpu.registers[0] = 0x7;

        m.run(0xE09E);
        assert_eq!(m.cpu.pc, 0x202);
        m.run(0xE0A1);
        assert_eq!(m.cpu.pc, 0x206);

        m.keys[0x7] = true;
        m.run(0xE09E);
        assert_eq!(m.cpu.pc, 0x20A);
        m.run(0xE0A1);
        assert_eq!(m.cpu.pc, 0x20C);
    }

    #[test]
    fn test_key_wait_press_then_release() {
        let mut m = Machine::new();

        // nothing pressed, instruction is repeated
        assert_eq!(m.run(0xF30A), Flow::KeyWait);
        assert_eq!(m.cpu.pc, 0x200);
        assert_eq!(m.cpu.key_wait, KeyWait::Idle);

        m.keys[0xB] = true;
        assert_eq!(m.run(0xF30A), Flow::KeyWait);
        assert_eq!(m.cpu.pc, 0x200);
        assert_eq!(m.cpu.key_wait, KeyWait::Waiting { register: 3, key: 0xB });

        // still held
        assert_eq!(m.run(0xF30A), Flow::KeyWait);
        assert_eq!(m.cpu.pc, 0x200);

        m.keys[0xB] = false;
        assert_eq!(m.run(0xF30A), Flow::Ok);
        assert_eq!(m.cpu.pc, 0x202);
        assert_eq!(m.v(3), 0xB);
        assert_eq!(m.cpu.key_wait, KeyWait::Idle);
    }

    #[test]
    fn test_unknown_is_noop() {
        let mut m = Machine::new();
        let before = m.cpu.registers;
        assert_eq!(m.run(0x812F), Flow::Ok);
        assert_eq!(m.run(0x0123), Flow::Ok);
        assert_eq!(m.cpu.registers, before);
        assert_eq!(m.cpu.pc, 0x204);
    }
}
