//! Entrypoint for CLI
use std::{fs, path::PathBuf};

use chip8::{
    constants::{CPU_FREQUENCY, DELAY_FREQUENCY},
    prelude::*,
};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::{error, info, warn, LevelFilter};

use crate::{error::AppError, headless::HeadlessBackend, keymap::KeyMap, terminal::TerminalBackend};

mod error;
mod headless;
mod keymap;
mod terminal;

#[derive(Parser, Debug)]
#[command(name = "chip8", version, about = "CHIP-8 interpreter")]
struct Cli {
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Run the target ROM file
    Run(RunArgs),
    /// Disassemble the target ROM into readable assembly
    Dis {
        /// ROM file to disassemble
        rom: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// ROM file to load at 0x200
    #[arg(short = 'f', long)]
    rom_file: PathBuf,

    #[arg(short, long, value_enum, default_value_t = BackendKind::Terminal)]
    backend: BackendKind,

    /// Instructions per second
    #[arg(long, default_value_t = CPU_FREQUENCY)]
    cpu_hz: u64,

    /// Display refresh and timer rate
    #[arg(long, default_value_t = DELAY_FREQUENCY)]
    display_hz: u64,

    /// Seed for the random number instruction
    #[arg(long)]
    seed: Option<u64>,

    /// YAML file mapping keyboard characters to keypad keys
    #[arg(long)]
    keymap: Option<PathBuf>,

    /// Stop the headless backend after this many display frames
    #[arg(long)]
    frames: Option<usize>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum BackendKind {
    Terminal,
    Headless,
}

fn run_rom(args: RunArgs) -> Result<(), AppError> {
    let rom = fs::read(&args.rom_file)?;
    info!("running {}", args.rom_file.display());

    let conf = Chip8Conf {
        cpu_frequency: Hz(args.cpu_hz),
        display_frequency: Hz(args.display_hz),
        seed: args.seed,
    };

    let keypad = Keypad::new();
    let mut vm = Chip8Vm::with_conf(keypad.clone(), &rom, conf);

    match args.backend {
        BackendKind::Terminal => {
            if args.frames.is_some() {
                warn!("--frames only applies to the headless backend");
            }

            let keymap = match &args.keymap {
                Some(filepath) => KeyMap::from_file(filepath)?,
                None => KeyMap::default(),
            };

            let mut backend = TerminalBackend::new(keypad, keymap)?;
            vm.execute(&mut backend)?;
        }
        BackendKind::Headless => {
            let mut backend = HeadlessBackend::new(args.frames);
            let result = vm.execute(&mut backend);

            print!("{}", vm.dump_display().map_err(Chip8Error::from)?);
            result?;
        }
    }

    Ok(())
}

fn run_disassembler(filepath: PathBuf) -> Result<(), AppError> {
    let rom = fs::read(&filepath)?;
    let listing = Disassembler::listing(&rom).map_err(Chip8Error::from)?;
    print!("{listing}");
    Ok(())
}

fn run(cli: Cli) -> Result<(), AppError> {
    simple_logger::SimpleLogger::new()
        .with_level(LevelFilter::Warn)
        .env()
        .init()?;

    match cli.cmd {
        Cmd::Run(args) => run_rom(args),
        Cmd::Dis { rom } => run_disassembler(rom),
    }
}

fn main() {
    let cli = Cli::parse();

    if let Err(err) = run(cli) {
        error!("{err}");
        std::process::exit(1);
    }
}

#[cfg(test)]
mod test {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["chip8", "run", "-f", "maze.ch8"]).unwrap();

        match cli.cmd {
            Cmd::Run(args) => {
                assert_eq!(args.rom_file, PathBuf::from("maze.ch8"));
                assert_eq!(args.backend, BackendKind::Terminal);
                assert_eq!(args.cpu_hz, 600);
                assert_eq!(args.display_hz, 60);
                assert_eq!(args.seed, None);
            }
            cmd => panic!("unexpected command: {cmd:?}"),
        }
    }

    #[test]
    fn test_run_headless() {
        let cli = Cli::try_parse_from([
            "chip8", "run", "--rom-file", "maze.ch8", "-b", "headless", "--frames", "10",
            "--seed", "42",
        ])
        .unwrap();

        match cli.cmd {
            Cmd::Run(args) => {
                assert_eq!(args.backend, BackendKind::Headless);
                assert_eq!(args.frames, Some(10));
                assert_eq!(args.seed, Some(42));
            }
            cmd => panic!("unexpected command: {cmd:?}"),
        }
    }

    #[test]
    fn test_dis() {
        let cli = Cli::try_parse_from(["chip8", "dis", "maze.ch8"]).unwrap();
        assert!(matches!(cli.cmd, Cmd::Dis { rom } if rom == PathBuf::from("maze.ch8")));
    }
}
