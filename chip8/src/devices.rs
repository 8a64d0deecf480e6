//! IO device interface
//!
//! The interpreter core never touches a window, terminal or audio device
//! directly. Front-ends implement these traits and hand them to the VM.
use std::{
    error::Error,
    sync::{
        atomic::{AtomicU16, Ordering},
        Arc,
    },
};

use crate::{constants::*, display::DisplayBuffer, vm::Flow};

/// Error raised by a front-end device.
pub type DeviceError = Box<dyn Error + Send + Sync + 'static>;

pub type DeviceResult<T> = Result<T, DeviceError>;

/// Snapshot of the hexadecimal keypad, indexed by key value 0x0-0xF.
pub type Keys = [bool; KEY_COUNT as usize];

/// Screen output.
pub trait Display {
    /// Blit the display buffer to screen output.
    ///
    /// Called once per display refresh with the current pixel state.
    fn render(&mut self, display: &DisplayBuffer) -> DeviceResult<()>;
}

/// Keyboard input.
pub trait Input {
    /// Instantaneous state of all 16 keys.
    fn keys(&self) -> Keys;

    /// Checks immediately whether the given key is currently pressed.
    fn is_pressed(&self, key: u8) -> bool {
        self.keys()
            .get(key as usize)
            .copied()
            .unwrap_or(false)
    }
}

/// Sound buzzer.
pub trait Sound {
    /// Trigger the buzzer.
    ///
    /// Must not block. Calling it again while the buzzer is sounding is a no-op.
    fn buzz(&mut self) -> DeviceResult<()>;
}

/// Bundle of devices driving the execution loop.
pub trait Backend: Display + Sound {
    /// Human readable name, used in error messages.
    fn name(&self) -> &str;

    /// Process pending host events, such as keyboard input.
    ///
    /// Called before every CPU cycle. Returning [`Flow::Interrupt`] stops the
    /// execution loop.
    fn update(&mut self) -> DeviceResult<Flow>;
}

impl Input for Keys {
    fn keys(&self) -> Keys {
        *self
    }
}

impl<T: Input + ?Sized> Input for &T {
    fn keys(&self) -> Keys {
        (**self).keys()
    }
}

impl<T: Input + ?Sized> Input for Box<T> {
    fn keys(&self) -> Keys {
        (**self).keys()
    }
}

/// Keyboard state that can be shared between a front-end and the VM.
///
/// Pressed is a 1 bit, released is a 0 bit. Clones share the same state.
#[derive(Debug, Default, Clone)]
pub struct Keypad {
    state: Arc<AtomicU16>,
}

impl Keypad {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn set(&self, key: KeyCode, pressed: bool) {
        let bit = 1 << key.as_u8();
        if pressed {
            self.state.fetch_or(bit, Ordering::Relaxed);
        } else {
            self.state.fetch_and(!bit, Ordering::Relaxed);
        }
    }

    pub fn press(&self, key: KeyCode) {
        self.set(key, true)
    }

    pub fn release(&self, key: KeyCode) {
        self.set(key, false)
    }

    /// Clear the keyboard input state, setting all keys to up.
    pub fn release_all(&self) {
        self.state.store(0, Ordering::Relaxed);
    }

    /// Check whether any key is pressed down.
    #[inline(always)]
    pub fn any_key(&self) -> bool {
        self.state.load(Ordering::Relaxed) > 0
    }

    /// Raw bitmask of the pressed keys.
    pub fn bits(&self) -> u16 {
        self.state.load(Ordering::Relaxed)
    }
}

impl Input for Keypad {
    fn keys(&self) -> Keys {
        let bits = self.bits();
        let mut keys = [false; KEY_COUNT as usize];
        for (i, key) in keys.iter_mut().enumerate() {
            *key = bits & (1 << i) != 0;
        }
        keys
    }

    fn is_pressed(&self, key: u8) -> bool {
        key < KEY_COUNT && self.bits() & (1 << key) != 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum KeyCode {
    Key0 = 0,
    Key1,
    Key2,
    Key3,
    Key4,
    Key5,
    Key6,
    Key7,
    Key8,
    Key9,
    KeyA,
    KeyB,
    KeyC,
    KeyD,
    KeyE,
    KeyF = 0xF,
}

impl KeyCode {
    pub const ALL: [KeyCode; KEY_COUNT as usize] = [
        Self::Key0,
        Self::Key1,
        Self::Key2,
        Self::Key3,
        Self::Key4,
        Self::Key5,
        Self::Key6,
        Self::Key7,
        Self::Key8,
        Self::Key9,
        Self::KeyA,
        Self::KeyB,
        Self::KeyC,
        Self::KeyD,
        Self::KeyE,
        Self::KeyF,
    ];

    pub fn as_u8(&self) -> u8 {
        *self as u8
    }

    /// Parse a single hexadecimal digit, either case.
    pub fn from_hex_digit(c: char) -> Option<Self> {
        c.to_digit(16)
            .and_then(|d| KeyCode::try_from(d as u8).ok())
    }
}

impl std::fmt::Display for KeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let key_id = self.as_u8();
        write!(f, "k{key_id:x}")
    }
}

impl From<KeyCode> for u8 {
    fn from(keycode: KeyCode) -> Self {
        keycode.as_u8()
    }
}

impl TryFrom<u8> for KeyCode {
    type Error = InvalidKeyCode;

    fn try_from(key_id: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .get(key_id as usize)
            .copied()
            .ok_or(InvalidKeyCode)
    }
}

#[derive(Debug)]
pub struct InvalidKeyCode;

impl std::error::Error for InvalidKeyCode {}

impl std::fmt::Display for InvalidKeyCode {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "keycode must be in range 0 <= keycode < 16")
    }
}

#[cfg(feature = "serde")]
mod de {
    use std::fmt::Display;

    use serde::de::{Deserialize, Error, Expected, Unexpected, Visitor};

    use super::*;

    impl Expected for InvalidKeyCode {
        fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            <Self as Display>::fmt(self, f)
        }
    }

    impl<'de> Deserialize<'de> for KeyCode {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            // YAML integers or single hex digit strings
            deserializer.deserialize_any(KeyCodeVisitor)
        }
    }

    struct KeyCodeVisitor;

    impl<'de> Visitor<'de> for KeyCodeVisitor {
        type Value = KeyCode;

        fn expecting(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
            write!(f, "an integer between 0 and 15, or a hexadecimal digit")
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            u8::try_from(v)
                .ok()
                .and_then(|v| KeyCode::try_from(v).ok())
                .ok_or_else(|| E::invalid_value(Unexpected::Signed(v), &InvalidKeyCode))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: Error,
        {
            u8::try_from(v)
                .ok()
                .and_then(|v| KeyCode::try_from(v).ok())
                .ok_or_else(|| E::invalid_value(Unexpected::Unsigned(v), &InvalidKeyCode))
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: Error,
        {
            let mut chars = v.trim().chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => KeyCode::from_hex_digit(c),
                _ => None,
            }
            .ok_or_else(|| E::invalid_value(Unexpected::Str(v), &InvalidKeyCode))
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_key_state() {
        let keypad = Keypad::new();

        keypad.set(KeyCode::Key0, true);
        assert_eq!(keypad.bits(), 0b00000000_00000001);
        assert!(keypad.is_pressed(0));
        assert!(!keypad.is_pressed(1));
        assert!(!keypad.is_pressed(7));

        keypad.set(KeyCode::Key7, true);
        assert_eq!(keypad.bits(), 0b00000000_10000001);
        assert!(keypad.is_pressed(0));
        assert!(keypad.is_pressed(7));

        keypad.set(KeyCode::Key0, false);
        assert_eq!(keypad.bits(), 0b00000000_10000000);
        assert!(!keypad.is_pressed(0));

        keypad.set(KeyCode::KeyF, true);
        assert_eq!(keypad.bits(), 0b10000000_10000000);
        assert!(keypad.is_pressed(15));
        assert!(!keypad.is_pressed(16));
    }

    #[test]
    fn test_keypad_clones_share_state() {
        let keypad = Keypad::new();
        let front_end = keypad.clone();

        front_end.press(KeyCode::KeyA);
        let keys = keypad.keys();
        assert!(keys[0xA]);
        assert_eq!(keys.iter().filter(|k| **k).count(), 1);

        front_end.release_all();
        assert!(!keypad.any_key());
    }

    #[test]
    fn test_keycode_conversion() {
        assert_eq!(KeyCode::try_from(0xB).unwrap(), KeyCode::KeyB);
        assert!(KeyCode::try_from(16).is_err());
        assert_eq!(KeyCode::from_hex_digit('c'), Some(KeyCode::KeyC));
        assert_eq!(KeyCode::from_hex_digit('C'), Some(KeyCode::KeyC));
        assert_eq!(KeyCode::from_hex_digit('g'), None);
        assert_eq!(KeyCode::Key9.to_string(), "k9");
    }

    #[test]
    fn test_fixed_keys_input() {
        let mut keys: Keys = [false; 16];
        keys[3] = true;

        assert!(keys.is_pressed(3));
        assert!(!keys.is_pressed(4));
        assert!(!keys.is_pressed(0xFF));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_deserialize_keycode() {
        let keys: Vec<KeyCode> = serde_yaml::from_str("[0, 15, 'a', 'F']").unwrap();
        assert_eq!(
            keys,
            vec![KeyCode::Key0, KeyCode::KeyF, KeyCode::KeyA, KeyCode::KeyF]
        );

        assert!(serde_yaml::from_str::<KeyCode>("16").is_err());
        assert!(serde_yaml::from_str::<KeyCode>("'ab'").is_err());
    }
}
