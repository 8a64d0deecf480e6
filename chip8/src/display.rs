//! Monochrome framebuffer.
use std::{
    fmt::{self, Write},
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use crate::constants::*;

/// Framebuffer shared between the interpreter and an asynchronous renderer.
///
/// The interpreter is the single writer. Renderers only take read locks.
pub type SharedDisplay = Arc<RwLock<DisplayBuffer>>;

/// Screen buffer of 64x32 pixels that are either on or off.
///
/// Pixels are stored row-major, `x + y * DISPLAY_WIDTH`.
#[derive(Clone, PartialEq, Eq)]
pub struct DisplayBuffer {
    pixels: Box<[bool; DISPLAY_BUFFER_SIZE]>,
}

impl Default for DisplayBuffer {
    fn default() -> Self {
        Self {
            pixels: Box::new([false; DISPLAY_BUFFER_SIZE]),
        }
    }
}

impl DisplayBuffer {
    pub fn new() -> Self {
        Default::default()
    }

    #[inline(always)]
    fn offset(x: usize, y: usize) -> usize {
        (x % DISPLAY_WIDTH) + (y % DISPLAY_HEIGHT) * DISPLAY_WIDTH
    }

    /// State of the pixel at the given coordinate.
    ///
    /// Coordinates outside the screen wrap around to the other side.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.pixels[Self::offset(x, y)]
    }

    #[inline]
    pub fn set(&mut self, x: usize, y: usize, on: bool) {
        self.pixels[Self::offset(x, y)] = on;
    }

    /// Flip the pixel at the given coordinate.
    ///
    /// Returns `true` when the pixel was on before, meaning it was erased.
    #[inline]
    pub fn toggle(&mut self, x: usize, y: usize) -> bool {
        let px = &mut self.pixels[Self::offset(x, y)];
        let was_on = *px;
        *px = !was_on;
        was_on
    }

    pub fn clear(&mut self) {
        self.pixels.fill(false);
    }

    /// Raw pixel slice, row-major.
    pub fn pixels(&self) -> &[bool; DISPLAY_BUFFER_SIZE] {
        &self.pixels
    }

    /// Iterate the rows of the screen from top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> + '_ {
        self.pixels.chunks(DISPLAY_WIDTH)
    }

    /// Number of pixels that are switched on.
    pub fn lit_count(&self) -> usize {
        self.pixels.iter().filter(|px| **px).count()
    }

    /// Returns the contents of the screen as a human readable string.
    pub fn dump(&self) -> Result<String, fmt::Error> {
        let mut buf = String::with_capacity(DISPLAY_BUFFER_SIZE + DISPLAY_HEIGHT);

        for row in self.rows() {
            for px in row {
                buf.write_char(if *px { '#' } else { '.' })?;
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }
}

impl fmt::Debug for DisplayBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayBuffer")
            .field("size", &DISPLAY_SIZE)
            .field("lit", &self.lit_count())
            .finish()
    }
}

/// Acquire the framebuffer for reading.
///
/// A poisoned lock still holds a valid pixel grid, so the guard is recovered.
pub(crate) fn read(display: &SharedDisplay) -> RwLockReadGuard<'_, DisplayBuffer> {
    display.read().unwrap_or_else(PoisonError::into_inner)
}

/// Acquire the framebuffer for exclusive writing.
pub(crate) fn write(display: &SharedDisplay) -> RwLockWriteGuard<'_, DisplayBuffer> {
    display.write().unwrap_or_else(PoisonError::into_inner)
}
