//! Terminal front-end.
use std::{
    io::{self, Stdout, Write},
    time::{Duration, Instant},
};

use chip8::{
    constants::{DISPLAY_WIDTH, KEY_COUNT},
    devices::{Backend, DeviceResult, Display, Sound},
    prelude::{DisplayBuffer, Flow, KeyCode, Keypad},
};
use crossterm::{
    cursor,
    event::{self, Event, KeyCode as TermKey, KeyEvent, KeyEventKind, KeyModifiers},
    execute, queue,
    style::Print,
    terminal::{self, Clear, ClearType, EnterAlternateScreen, LeaveAlternateScreen},
};
use log::trace;

use crate::keymap::KeyMap;

/// Terminals only report key presses, so a key is considered
/// released this long after its last press or repeat.
const KEY_RELEASE_DELAY: Duration = Duration::from_millis(250);

/// Minimum time between two rings of the terminal bell.
const BELL_INTERVAL: Duration = Duration::from_millis(100);

const PIXEL_ON: &str = "██";
const PIXEL_OFF: &str = "  ";

pub struct TerminalBackend {
    stdout: Stdout,
    keypad: Keypad,
    keymap: KeyMap,
    /// Time of the last press, per keypad key.
    pressed_at: [Option<Instant>; KEY_COUNT as usize],
    last_bell: Option<Instant>,
    /// Reusable line buffer.
    line: String,
}

impl TerminalBackend {
    /// Switch the terminal to raw mode on the alternate screen.
    ///
    /// The terminal is restored when the backend is dropped.
    pub fn new(keypad: Keypad, keymap: KeyMap) -> io::Result<Self> {
        let mut stdout = io::stdout();

        terminal::enable_raw_mode()?;
        execute!(
            stdout,
            EnterAlternateScreen,
            cursor::Hide,
            Clear(ClearType::All)
        )?;

        Ok(Self {
            stdout,
            keypad,
            keymap,
            pressed_at: [None; KEY_COUNT as usize],
            last_bell: None,
            line: String::new(),
        })
    }

    fn press(&mut self, c: char, now: Instant) {
        match self.keymap.map_key(c) {
            Some(keycode) => {
                self.keypad.press(keycode);
                self.pressed_at[keycode.as_u8() as usize] = Some(now);
            }
            None => trace!("no key mapping for {c:?}"),
        }
    }

    fn release(&mut self, c: char) {
        if let Some(keycode) = self.keymap.map_key(c) {
            self.keypad.release(keycode);
            self.pressed_at[keycode.as_u8() as usize] = None;
        }
    }

    /// Release keys that have not been pressed again within the delay.
    fn release_stale(&mut self, now: Instant) {
        for (keycode, pressed_at) in KeyCode::ALL.iter().zip(self.pressed_at.iter_mut()) {
            if let Some(at) = *pressed_at {
                if now.duration_since(at) >= KEY_RELEASE_DELAY {
                    self.keypad.release(*keycode);
                    *pressed_at = None;
                }
            }
        }
    }

    fn border(&mut self, left: char, right: char) -> io::Result<()> {
        self.line.clear();
        self.line.push(left);
        for _ in 0..DISPLAY_WIDTH * 2 {
            self.line.push('─');
        }
        self.line.push(right);
        queue!(self.stdout, Print(&self.line), cursor::MoveToNextLine(1))
    }
}

impl Drop for TerminalBackend {
    fn drop(&mut self) {
        let _ = execute!(self.stdout, LeaveAlternateScreen, cursor::Show);
        let _ = terminal::disable_raw_mode();
    }
}

impl Display for TerminalBackend {
    fn render(&mut self, display: &DisplayBuffer) -> DeviceResult<()> {
        queue!(self.stdout, cursor::MoveTo(0, 0))?;

        self.border('┌', '┐')?;
        for row in display.rows() {
            self.line.clear();
            self.line.push('│');
            for px in row {
                self.line.push_str(if *px { PIXEL_ON } else { PIXEL_OFF });
            }
            self.line.push('│');
            queue!(self.stdout, Print(&self.line), cursor::MoveToNextLine(1))?;
        }
        self.border('└', '┘')?;

        queue!(self.stdout, Print("esc: quit"))?;
        self.stdout.flush()?;

        Ok(())
    }
}

impl Sound for TerminalBackend {
    fn buzz(&mut self) -> DeviceResult<()> {
        let now = Instant::now();
        let ring = self
            .last_bell
            .map(|at| now.duration_since(at) >= BELL_INTERVAL)
            .unwrap_or(true);

        if ring {
            self.last_bell = Some(now);
            execute!(self.stdout, Print('\x07'))?;
        }

        Ok(())
    }
}

impl Backend for TerminalBackend {
    fn name(&self) -> &str {
        "terminal"
    }

    fn update(&mut self) -> DeviceResult<Flow> {
        let now = Instant::now();

        while event::poll(Duration::ZERO)? {
            match event::read()? {
                Event::Key(KeyEvent {
                    code: TermKey::Esc, ..
                }) => return Ok(Flow::Interrupt),
                Event::Key(KeyEvent {
                    code: TermKey::Char('c'),
                    modifiers,
                    ..
                }) if modifiers.contains(KeyModifiers::CONTROL) => return Ok(Flow::Interrupt),
                Event::Key(KeyEvent {
                    code: TermKey::Char(c),
                    kind: KeyEventKind::Release,
                    ..
                }) => self.release(c),
                Event::Key(KeyEvent {
                    code: TermKey::Char(c),
                    ..
                }) => self.press(c, now),
                Event::Resize(..) => {
                    queue!(self.stdout, Clear(ClearType::All))?;
                }
                _ => {}
            }
        }

        self.release_stale(now);

        Ok(Flow::Ok)
    }
}
