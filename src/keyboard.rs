//! Keyboard shortcuts for the player.
//!
//! | Key | Action |
//! |---|---|
//! | Space | play / pause |
//! | ArrowLeft | skip backward |
//! | ArrowRight | skip forward |
//! | Escape | stop |

use crate::clock::Clock;
use crate::player::AudioPlayer;
use crate::preferences::PreferenceStore;
use crate::SpeechEngine;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Space,
    ArrowLeft,
    ArrowRight,
    Escape,
}

impl Key {
    /// Map a DOM `KeyboardEvent.code` value to a player key.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "Space" => Some(Key::Space),
            "ArrowLeft" => Some(Key::ArrowLeft),
            "ArrowRight" => Some(Key::ArrowRight),
            "Escape" => Some(Key::Escape),
            _ => None,
        }
    }
}

impl<E: SpeechEngine, C: Clock, S: PreferenceStore> AudioPlayer<E, C, S> {
    /// Apply a shortcut. `typing` is true while focus is in a text input or
    /// textarea, where keys belong to the field.
    ///
    /// Returns whether the key was consumed, i.e. whether the host should
    /// suppress its default action.
    pub fn handle_key(&mut self, key: Key, typing: bool) -> bool {
        if typing || !self.audio_enabled() {
            return false;
        }

        match key {
            Key::Space => self.toggle_play_pause(),
            Key::ArrowLeft => self.skip_backward(None),
            Key::ArrowRight => self.skip_forward(None),
            Key::Escape => self.stop(),
        }
        true
    }
}
