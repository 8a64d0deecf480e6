//! Front-end without any output devices.
use chip8::{
    devices::{Backend, DeviceResult, Display, Sound},
    prelude::{DisplayBuffer, Flow},
};
use log::trace;

/// Runs the machine without rendering or sound, optionally
/// for a limited number of display frames.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    frames: usize,
    max_frames: Option<usize>,
}

impl HeadlessBackend {
    pub fn new(max_frames: Option<usize>) -> Self {
        Self {
            frames: 0,
            max_frames,
        }
    }

    /// Number of display frames that have elapsed.
    pub fn frames(&self) -> usize {
        self.frames
    }
}

impl Display for HeadlessBackend {
    fn render(&mut self, _display: &DisplayBuffer) -> DeviceResult<()> {
        self.frames += 1;
        Ok(())
    }
}

impl Sound for HeadlessBackend {
    fn buzz(&mut self) -> DeviceResult<()> {
        trace!("buzz at frame {}", self.frames);
        Ok(())
    }
}

impl Backend for HeadlessBackend {
    fn name(&self) -> &str {
        "headless"
    }

    fn update(&mut self) -> DeviceResult<Flow> {
        match self.max_frames {
            Some(max) if self.frames >= max => Ok(Flow::Interrupt),
            _ => Ok(Flow::Ok),
        }
    }
}
