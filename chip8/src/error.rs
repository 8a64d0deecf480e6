//! Result and errors.
use std::fmt::{self, Display, Formatter};

use crate::devices::DeviceError;

pub type Chip8Result<T> = std::result::Result<T, Chip8Error>;

/// Errors that stop the execution loop.
///
/// The interpreter itself has no failure states. Everything here originates
/// at the device boundary or in the loop configuration.
#[derive(Debug)]
pub enum Chip8Error {
    /// The display device failed to render a frame.
    Render {
        backend: String,
        source: DeviceError,
    },
    /// The sound device failed to start the buzzer.
    Sound(DeviceError),
    /// The backend failed while processing host events.
    Input(DeviceError),
    /// A clock rate of zero was given.
    InvalidRate(&'static str),
    Fmt(fmt::Error),
}

impl Display for Chip8Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Render { backend, source } => write!(f, "render ({backend}): {source}"),
            Self::Sound(err) => write!(f, "sound error: {err}"),
            Self::Input(err) => write!(f, "input error: {err}"),
            Self::InvalidRate(which) => write!(f, "{which} rate must be greater than zero"),
            Self::Fmt(err) => write!(f, "{}", err),
        }
    }
}

impl std::error::Error for Chip8Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Render { source, .. } => Some(source.as_ref()),
            Self::Sound(err) | Self::Input(err) => Some(err.as_ref()),
            Self::Fmt(err) => Some(err),
            Self::InvalidRate(_) => None,
        }
    }
}

impl From<fmt::Error> for Chip8Error {
    fn from(err: fmt::Error) -> Self {
        Chip8Error::Fmt(err)
    }
}
