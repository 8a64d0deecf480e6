//! CPU and memory state.
use crate::constants::*;

/// Core state for a chip8 interpreter.
pub struct Chip8Cpu {
    // ------------------------------------------------------------------------
    // Registers
    /// Program counter pointing to the next instruction to fetch.
    pub(crate) pc: Address,
    /// Stack pointer, the number of return addresses on the stack (0-16).
    pub(crate) sp: usize,
    /// General purpose registers for temporary values.
    ///
    /// Register 16 (VF) is used for either the carry flag or borrow switch depending on opcode.
    pub(crate) registers: [u8; REGISTER_COUNT],
    /// Index register used for addressing sprites, BCD output and register dumps.
    pub(crate) index: Address,
    /// (DT) Delay timer that counts down to 0.
    pub(crate) delay_timer: u8,
    /// (ST) Sound timer that counts down to 0. When it has a non-zero value, a beep is played.
    pub(crate) sound_timer: u8,
    /// Progress of the `Fx0A` instruction.
    pub(crate) key_wait: KeyWait,

    // ------------------------------------------------------------------------
    // Memory
    /// Main memory storage space.
    pub(crate) ram: Box<[u8; MEM_SIZE]>,
    /// Stack of return pointers used for jumping when a routine call finishes.
    pub(crate) stack: [Address; STACK_SIZE],
}

/// Sub-state of the interpreter while `Fx0A` (`LD Vx, K`) is executing.
///
/// The instruction never blocks. While waiting the program counter is rewound
/// so the same instruction is fetched again on the next tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum KeyWait {
    /// Normal execution.
    #[default]
    Idle,
    /// A key was seen pressed. The wait completes when it is released.
    Waiting {
        /// Register that receives the key code.
        register: u8,
        /// Key that must be released.
        key: u8,
    },
}

impl Default for Chip8Cpu {
    fn default() -> Self {
        let mut cpu = Self {
            pc: MEM_START as Address,
            sp: 0,
            registers: [0; REGISTER_COUNT],
            index: 0,
            delay_timer: 0,
            sound_timer: 0,
            key_wait: KeyWait::Idle,

            ram: Box::new([0; MEM_SIZE]),
            stack: [0; STACK_SIZE],
        };
        cpu.load_font();
        cpu
    }
}

impl Chip8Cpu {
    /// Create a fresh machine with the builtin font seeded into low memory.
    pub fn new() -> Self {
        Default::default()
    }

    /// Erase the contents of the memory buffers `ram` and `stack`.
    pub(crate) fn clear_memory(&mut self) {
        self.ram.fill(0);
        self.stack.fill(0);
    }

    fn load_font(&mut self) {
        let start = FONTSET_START as usize;
        self.ram[start..start + FONTSET_DATA_LENGTH].copy_from_slice(&FONTSET);
    }

    /// Reset every register and memory cell, then load the given program at `MEM_START`.
    ///
    /// Programs that don't fit in memory are truncated. Returns the number of bytes loaded.
    pub(crate) fn load_program(&mut self, bytecode: &[u8]) -> usize {
        // Start with clean memory to avoid leaking previous program.
        self.clear_memory();
        self.load_font();

        let len = bytecode.len().min(MAX_PROGRAM_SIZE);
        self.ram[MEM_START..MEM_START + len].copy_from_slice(&bytecode[..len]);

        self.pc = MEM_START as Address;
        self.sp = 0;
        self.registers.fill(0);
        self.index = 0;
        self.delay_timer = 0;
        self.sound_timer = 0;
        self.key_wait = KeyWait::Idle;

        len
    }

    /// Read a byte from memory. The address is masked to 12 bits.
    #[inline(always)]
    pub fn read(&self, address: Address) -> u8 {
        self.ram[address as usize & ADDRESS_MASK]
    }

    /// Write a byte to memory. The address is masked to 12 bits.
    #[inline(always)]
    pub fn write(&mut self, address: Address, value: u8) {
        self.ram[address as usize & ADDRESS_MASK] = value;
    }

    /// Fetch the big-endian instruction at the program counter and advance past it.
    #[inline]
    pub(crate) fn fetch(&mut self) -> u16 {
        let a = self.read(self.pc);
        let b = self.read(self.pc.wrapping_add(1));
        self.pc = self.pc.wrapping_add(2);
        u16::from_be_bytes([a, b])
    }

    /// Skip over the next instruction.
    #[inline(always)]
    pub(crate) fn skip(&mut self) {
        self.pc = self.pc.wrapping_add(2);
    }

    /// Step the program counter back so the current instruction runs again.
    #[inline(always)]
    pub(crate) fn rewind(&mut self) {
        self.pc = self.pc.wrapping_sub(2);
    }

    #[inline(always)]
    pub(crate) fn set_flag(&mut self, value: bool) {
        self.registers[FLAG_REGISTER] = value as u8;
    }

    /// Push a return address.
    ///
    /// When all 16 levels are used the top frame is overwritten,
    /// and `false` is returned.
    pub(crate) fn push(&mut self, address: Address) -> bool {
        if self.sp < STACK_SIZE {
            self.stack[self.sp] = address;
            self.sp += 1;
            true
        } else {
            self.stack[STACK_SIZE - 1] = address;
            false
        }
    }

    /// Pop a return address, or `None` when the stack is empty.
    pub(crate) fn pop(&mut self) -> Option<Address> {
        let (sp, underflow) = self.sp.overflowing_sub(1);
        if underflow {
            None
        } else {
            self.sp = sp;
            Some(self.stack[sp])
        }
    }

    /// Count down the delay and sound timers, stopping at zero.
    #[inline]
    pub fn tick_timers(&mut self) {
        self.delay_timer = self.delay_timer.saturating_sub(1);
        self.sound_timer = self.sound_timer.saturating_sub(1);
    }

    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        &self.registers
    }

    pub fn pc(&self) -> Address {
        self.pc
    }

    pub fn sp(&self) -> usize {
        self.sp
    }

    pub fn index(&self) -> Address {
        self.index
    }

    pub fn delay_timer(&self) -> u8 {
        self.delay_timer
    }

    pub fn sound_timer(&self) -> u8 {
        self.sound_timer
    }

    pub fn key_wait(&self) -> KeyWait {
        self.key_wait
    }

    pub fn memory(&self) -> &[u8; MEM_SIZE] {
        &self.ram
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_font_seeded() {
        let cpu = Chip8Cpu::new();

        assert_eq!(&cpu.ram[..FONTSET_DATA_LENGTH], &FONTSET[..]);
        assert!(cpu.ram[FONTSET_DATA_LENGTH..].iter().all(|b| *b == 0));
        assert_eq!(cpu.pc, MEM_START as Address);
    }

    #[test]
    fn test_load_program_truncates() {
        let mut cpu = Chip8Cpu::new();
        let program = vec![0xAB; MAX_PROGRAM_SIZE + 10];

        assert_eq!(cpu.load_program(&program), MAX_PROGRAM_SIZE);
        assert_eq!(cpu.ram[MEM_SIZE - 1], 0xAB);
        // font must survive
        assert_eq!(&cpu.ram[..FONTSET_DATA_LENGTH], &FONTSET[..]);
    }

    #[test]
    fn test_fetch_is_big_endian() {
        let mut cpu = Chip8Cpu::new();
        cpu.load_program(&[0xAA, 0xBB]);

        assert_eq!(cpu.fetch(), 0xAABB);
        assert_eq!(cpu.pc, 0x202);
    }

    #[test]
    fn test_memory_access_masked() {
        let mut cpu = Chip8Cpu::new();
        cpu.write(0x1300, 0x7F);

        assert_eq!(cpu.read(0x300), 0x7F);
        assert_eq!(cpu.read(0xF300), 0x7F);
    }

    #[test]
    fn test_stack_limits() {
        let mut cpu = Chip8Cpu::new();

        assert_eq!(cpu.pop(), None);
        assert_eq!(cpu.sp, 0);

        for i in 0..STACK_SIZE {
            assert!(cpu.push(i as Address));
        }
        assert_eq!(cpu.sp, STACK_SIZE);

        // overflow replaces the top frame
        assert!(!cpu.push(0xABC));
        assert_eq!(cpu.sp, STACK_SIZE);
        assert_eq!(cpu.pop(), Some(0xABC));
        assert_eq!(cpu.pop(), Some(14));
    }

    #[test]
    fn test_timers_saturate() {
        let mut cpu = Chip8Cpu::new();
        cpu.delay_timer = 1;
        cpu.sound_timer = 2;

        cpu.tick_timers();
        assert_eq!((cpu.delay_timer, cpu.sound_timer), (0, 1));
        cpu.tick_timers();
        cpu.tick_timers();
        assert_eq!((cpu.delay_timer, cpu.sound_timer), (0, 0));
    }
}
