//! Persisted playback preferences.
//!
//! The player only needs a string key-value store; where it lives (browser
//! storage, a settings file, a database) is up to the host.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::NarratorError;

pub const PREFERRED_VOICE_KEY: &str = "preferred-voice";
pub const PLAYBACK_SPEED_KEY: &str = "playback-speed";

/// Key under which the last playback position of a lesson is stored.
///
/// The value is seconds at rate 1.0, so it stays valid when the playback
/// speed changes between sessions.
pub fn position_key(lesson_id: &str) -> String {
    format!("audio-position-{lesson_id}")
}

/// String key-value persistence.
pub trait PreferenceStore {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), NarratorError>;
    fn remove(&mut self, key: &str) -> Result<(), NarratorError>;
}

/// Non-persistent store, for tests and hosts without storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PreferenceStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), NarratorError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), NarratorError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Store backed by a flat JSON object on disk, rewritten on every change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl JsonFileStore {
    /// Open the store at `path`. A missing file starts an empty store.
    pub fn open(path: &Path) -> Result<Self, NarratorError> {
        let entries = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            serde_json::from_str(&content)?
        } else {
            log::info!("Preference file {} not found, starting empty", path.display());
            BTreeMap::new()
        };

        Ok(Self {
            path: path.to_path_buf(),
            entries,
        })
    }

    fn flush(&self) -> Result<(), NarratorError> {
        let json = serde_json::to_string_pretty(&self.entries)?;
        std::fs::write(&self.path, json)?;
        Ok(())
    }
}

impl PreferenceStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), NarratorError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), NarratorError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }
}

/// Speeds offered by the player controls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub enum PlaybackSpeed {
    Half,
    ThreeQuarters,
    #[default]
    Normal,
    OneAndQuarter,
    OneAndHalf,
    Double,
}

impl PlaybackSpeed {
    pub const ALL: [PlaybackSpeed; 6] = [
        PlaybackSpeed::Half,
        PlaybackSpeed::ThreeQuarters,
        PlaybackSpeed::Normal,
        PlaybackSpeed::OneAndQuarter,
        PlaybackSpeed::OneAndHalf,
        PlaybackSpeed::Double,
    ];

    pub fn rate(self) -> f32 {
        match self {
            PlaybackSpeed::Half => 0.5,
            PlaybackSpeed::ThreeQuarters => 0.75,
            PlaybackSpeed::Normal => 1.0,
            PlaybackSpeed::OneAndQuarter => 1.25,
            PlaybackSpeed::OneAndHalf => 1.5,
            PlaybackSpeed::Double => 2.0,
        }
    }
}

impl TryFrom<f32> for PlaybackSpeed {
    type Error = NarratorError;

    fn try_from(rate: f32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|speed| (speed.rate() - rate).abs() < f32::EPSILON)
            .ok_or(NarratorError::InvalidSpeed(rate))
    }
}

impl From<PlaybackSpeed> for f32 {
    fn from(speed: PlaybackSpeed) -> Self {
        speed.rate()
    }
}

impl fmt::Display for PlaybackSpeed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x", self.rate())
    }
}

/// User preferences restored at startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaybackPreferences {
    pub speed: PlaybackSpeed,
    pub selected_voice_name: Option<String>,
}

impl PlaybackPreferences {
    /// Read preferences from `store`, ignoring unparsable values.
    pub fn load(store: &dyn PreferenceStore) -> Self {
        let speed = store
            .get(PLAYBACK_SPEED_KEY)
            .and_then(|raw| match raw.parse::<f32>() {
                Ok(rate) => PlaybackSpeed::try_from(rate).ok(),
                Err(e) => {
                    log::warn!("Ignoring stored playback speed {raw:?}: {e}");
                    None
                }
            })
            .unwrap_or_default();

        Self {
            speed,
            selected_voice_name: store.get(PREFERRED_VOICE_KEY),
        }
    }
}
