use std::{fs::File, path::Path};

use chip8::prelude::KeyCode;
use serde::Deserialize;

use crate::error::AppError;

/// Keyboard mapper
///
/// Maps characters typed on the host keyboard to the 16 keys of the
/// COSMAC VIP keypad.
#[derive(Debug)]
pub struct KeyMap {
    /// Host keyboard characters and the keypad key they press.
    keys: Box<[(char, KeyCode)]>,
}

#[derive(Debug, Deserialize)]
struct KeyDef {
    chip8: KeyCode,
    #[serde(default)]
    keyboard_keys: Vec<char>,
}

impl Default for KeyMap {
    /// Hexadecimal digits map to their own key, `0`-`9` and `a`-`f`.
    fn default() -> Self {
        let keys = KeyCode::ALL
            .iter()
            .filter_map(|keycode| {
                char::from_digit(keycode.as_u8() as u32, 16).map(|c| (c, *keycode))
            })
            .collect();

        KeyMap { keys }
    }
}

impl KeyMap {
    pub fn from_file(filepath: impl AsRef<Path>) -> Result<Self, AppError> {
        let file = File::open(filepath.as_ref())?;

        let defs: Vec<KeyDef> = serde_yaml::from_reader(file)?;
        log::debug!("loaded key definitions: {:#?}", defs);

        Ok(Self::from_defs(&defs))
    }

    pub fn from_yaml(source: &str) -> Result<Self, serde_yaml::Error> {
        let defs: Vec<KeyDef> = serde_yaml::from_str(source)?;
        Ok(Self::from_defs(&defs))
    }

    fn from_defs(defs: &[KeyDef]) -> Self {
        let keys = defs
            .iter()
            // flatten borrowed characters into one iterator of (char, key) pairs
            .flat_map(|def| def.keyboard_keys.iter().map(move |c| (*c, def.chip8)))
            .collect();

        KeyMap { keys }
    }

    /// Given a typed character, map it to a keypad key.
    ///
    /// Letters match regardless of case.
    pub fn map_key(&self, c: char) -> Option<KeyCode> {
        self.find(c).or_else(|| self.find(c.to_ascii_lowercase()))
    }

    fn find(&self, c: char) -> Option<KeyCode> {
        self.keys
            .iter()
            .find(|(key, _)| *key == c)
            .map(|(_, keycode)| *keycode)
    }
}
