//! Virtual machine.
use std::{
    fmt::{self, Write},
    sync::{Arc, RwLock},
    thread,
    time::{Duration, Instant},
};

use log::{debug, info, warn};
use rand::prelude::*;

use crate::{
    clock::{Clock, Hz},
    constants::*,
    cpu::{Chip8Cpu, KeyWait},
    decode::Instruction,
    devices::{Backend, Input},
    display::{self, DisplayBuffer, SharedDisplay},
    error::{Chip8Error, Chip8Result},
    interp::Exec,
};

pub struct Chip8Vm<I> {
    cpu: Chip8Cpu,
    display: SharedDisplay,
    input: I,
    rng: StdRng,
    conf: Chip8Conf,
}

impl<I: Input> Chip8Vm<I> {
    /// Create a machine with default configuration, with the ROM loaded at 0x200.
    pub fn new(input: I, rom: &[u8]) -> Self {
        Self::with_conf(input, rom, Chip8Conf::default())
    }

    pub fn with_conf(input: I, rom: &[u8], conf: Chip8Conf) -> Self {
        let rng = match conf.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        let mut vm = Chip8Vm {
            cpu: Chip8Cpu::new(),
            display: Arc::new(RwLock::new(DisplayBuffer::new())),
            input,
            rng,
            conf,
        };
        vm.load_rom(rom);
        vm
    }

    /// Configuration that was used to instantiate the VM.
    pub fn config(&self) -> &Chip8Conf {
        &self.conf
    }

    /// Reset the machine and load a new program.
    ///
    /// Programs larger than the available memory are truncated.
    /// Returns the number of bytes loaded.
    pub fn load_rom(&mut self, rom: &[u8]) -> usize {
        let len = self.cpu.load_program(rom);
        if len < rom.len() {
            warn!(
                "program is {} bytes, truncated to {len} bytes",
                rom.len()
            );
        }

        display::write(&self.display).clear();

        info!("loaded program of {len} bytes");
        len
    }

    pub fn input(&self) -> &I {
        &self.input
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Flow {
    Ok,
    Interrupt,
    /// Program counter has jumped to a new address.
    ///
    /// This is useful for the caller to avoid being
    /// blocked on infinite or long running loops.
    ///
    /// This is returned when the interpreter encounters:
    ///
    /// - 1nnn (`JP addr`)
    /// - 2nnn (`CALL addr`)
    /// - 00EE (`RET`)
    /// - Bnnn (`JP V0, addr`)
    Jump,
    /// The framebuffer was changed by `CLS` or `DRW`.
    Draw,
    /// The sound timer was set.
    Sound,
    /// Wait for a keypress.
    ///
    /// This is triggered by the opcode `Fx0A` (`LD Vx, K`), which stalls
    /// execution until a key is pressed and released, and loads the key value into `Vx`.
    KeyWait,
}

/// VM Configuration Parameters.
#[derive(Debug, Clone)]
pub struct Chip8Conf {
    pub cpu_frequency: Hz,
    /// Rate at which timers count down and the screen is refreshed.
    pub display_frequency: Hz,
    /// Seed for the random number generator. When `None`, the generator is
    /// seeded from system entropy.
    pub seed: Option<u64>,
}

impl Default for Chip8Conf {
    fn default() -> Self {
        Self {
            cpu_frequency: Hz(CPU_FREQUENCY),
            display_frequency: Hz(DELAY_FREQUENCY),
            seed: None,
        }
    }
}

/// Interpreter
impl<I: Input> Chip8Vm<I> {
    /// Fetch, decode and execute one instruction.
    pub fn tick(&mut self) -> Flow {
        let opcode = self.cpu.fetch();
        let instr = Instruction::decode(opcode);

        #[cfg(feature = "op_trace")]
        log::trace!(
            "{:04X}: {opcode:04X}  {instr}",
            self.cpu.pc.wrapping_sub(2) & ADDRESS_MASK as Address
        );

        Exec {
            cpu: &mut self.cpu,
            display: &self.display,
            input: &self.input,
            rng: &mut self.rng,
        }
        .execute(instr)
    }

    /// Execute a number of instructions, ignoring timing.
    ///
    /// Returns the control flow of the last instruction.
    pub fn run_steps(&mut self, step_count: usize) -> Flow {
        let mut flow = Flow::Ok;
        for _ in 0..step_count {
            flow = self.tick();
        }
        flow
    }

    /// One display refresh.
    ///
    /// Counts down the timers, pushes the framebuffer to the backend, and
    /// triggers the buzzer if the sound timer was running at the start of the frame.
    pub fn frame<B>(&mut self, backend: &mut B) -> Chip8Result<()>
    where
        B: Backend + ?Sized,
    {
        // Sampled before the countdown, so a sound timer of 1 still beeps.
        let buzz = self.should_buzz();
        self.cpu.tick_timers();

        {
            let screen = display::read(&self.display);
            backend
                .render(&screen)
                .map_err(|source| Chip8Error::Render {
                    backend: backend.name().to_string(),
                    source,
                })?;
        }

        if buzz {
            backend.buzz().map_err(Chip8Error::Sound)?;
        }

        Ok(())
    }

    /// Run the machine with the rates from its configuration.
    pub fn execute<B>(&mut self, backend: &mut B) -> Chip8Result<()>
    where
        B: Backend + ?Sized,
    {
        let Chip8Conf {
            cpu_frequency,
            display_frequency,
            ..
        } = self.conf;
        self.run(backend, cpu_frequency, display_frequency)
    }

    /// Execution loop.
    ///
    /// Runs the CPU and the display at independent rates until the backend
    /// interrupts, or a device fails.
    pub fn run<B>(&mut self, backend: &mut B, cpu_rate: Hz, display_rate: Hz) -> Chip8Result<()>
    where
        B: Backend + ?Sized,
    {
        if cpu_rate.0 == 0 {
            return Err(Chip8Error::InvalidRate("cpu"));
        }
        if display_rate.0 == 0 {
            return Err(Chip8Error::InvalidRate("display"));
        }

        let start = Instant::now();
        let mut cpu_clock = Clock::new(cpu_rate, start);
        let mut display_clock = Clock::new(display_rate, start);
        let idle_sleep = Duration::from_nanos(IDLE_SLEEP_NANOS);

        debug!(
            "starting {} backend, cpu {} Hz, display {} Hz",
            backend.name(),
            cpu_rate.0,
            display_rate.0
        );

        loop {
            let now = Instant::now();
            let mut idle = true;

            // When the loop falls behind, the owed cycles run back to back,
            // but never more than one display frame's worth.
            cpu_clock.limit_backlog(now, display_clock.interval());

            while cpu_clock.tick(now) {
                idle = false;

                if backend.update().map_err(Chip8Error::Input)? == Flow::Interrupt {
                    debug!("{} backend interrupted execution", backend.name());
                    return Ok(());
                }

                self.tick();

                // A burst must not hold up the display cadence.
                if display_clock.is_due(Instant::now()) {
                    break;
                }
            }

            if display_clock.tick(now) {
                idle = false;
                self.frame(backend)?;
            }

            if idle {
                let due = cpu_clock.next_due().min(display_clock.next_due());
                let wait = due.saturating_duration_since(Instant::now());
                thread::sleep(wait.min(idle_sleep));
            }
        }
    }
}

/// State
impl<I> Chip8Vm<I> {
    pub fn registers(&self) -> &[u8; REGISTER_COUNT] {
        self.cpu.registers()
    }

    pub fn pc(&self) -> Address {
        self.cpu.pc()
    }

    pub fn index(&self) -> Address {
        self.cpu.index()
    }

    pub fn sp(&self) -> usize {
        self.cpu.sp()
    }

    pub fn delay_timer(&self) -> u8 {
        self.cpu.delay_timer()
    }

    pub fn sound_timer(&self) -> u8 {
        self.cpu.sound_timer()
    }

    pub fn key_wait(&self) -> KeyWait {
        self.cpu.key_wait()
    }

    pub fn memory(&self) -> &[u8; MEM_SIZE] {
        self.cpu.memory()
    }

    /// Shared handle to the framebuffer, for renderers on other threads.
    pub fn display(&self) -> SharedDisplay {
        self.display.clone()
    }

    /// Copy of the current framebuffer.
    pub fn display_snapshot(&self) -> DisplayBuffer {
        display::read(&self.display).clone()
    }

    /// The buzzer must sound while the sound timer is running.
    pub fn should_buzz(&self) -> bool {
        self.cpu.sound_timer() > 0
    }
}

/// Troubleshooting
#[doc(hidden)]
impl<I> Chip8Vm<I> {
    /// Returns the program memory as a human readable string.
    pub fn dump_ram(&self, count: usize) -> Result<String, fmt::Error> {
        let ram = self.cpu.memory();
        let end = (MEM_START + count).min(MEM_SIZE);
        let mut buf = String::new();

        for (i, pair) in ram[MEM_START..end].chunks(2).enumerate() {
            write!(buf, "{:04X}:", MEM_START + i * 2)?;
            for byte in pair {
                write!(buf, " {byte:02X}")?;
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }

    pub fn dump_display(&self) -> Result<String, fmt::Error> {
        display::read(&self.display).dump()
    }
}
