//! Application errors
use std::fmt;

#[derive(Debug)]
pub struct AppError {
    pub kind: ErrorKind,
}

impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Chip8(err) => Some(err),
            ErrorKind::Io(err) => Some(err),
            ErrorKind::Keymap(err) => Some(err),
            ErrorKind::Logger(err) => Some(err),
        }
    }
}

#[derive(Debug)]
pub enum ErrorKind {
    Chip8(chip8::prelude::Chip8Error),
    Io(std::io::Error),
    Keymap(serde_yaml::Error),
    Logger(log::SetLoggerError),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "application error: {}", self.kind)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Chip8(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "{err}"),
            Self::Keymap(err) => write!(f, "keymap: {err}"),
            Self::Logger(err) => write!(f, "{err}"),
        }
    }
}

impl From<chip8::prelude::Chip8Error> for AppError {
    fn from(err: chip8::prelude::Chip8Error) -> Self {
        Self {
            kind: ErrorKind::Chip8(err),
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        Self {
            kind: ErrorKind::Io(err),
        }
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        Self {
            kind: ErrorKind::Keymap(err),
        }
    }
}

impl From<log::SetLoggerError> for AppError {
    fn from(err: log::SetLoggerError) -> Self {
        Self {
            kind: ErrorKind::Logger(err),
        }
    }
}
