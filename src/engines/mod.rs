//! Speech synthesis engines.
//!
//! This module contains implementations of [`SpeechEngine`](crate::SpeechEngine).
//!
//! # Available Engines
//!
//! - [`UnsupportedEngine`] - stands in where the platform has no speech capability
//! - `espeak::EspeakEngine` - plays utterances through espeak-ng
//!
//! Enable engines via Cargo features:
//! - `espeak` - espeak-ng subprocess playback (espeak-ng must be installed)

#[cfg(feature = "espeak")]
pub mod espeak;

use crate::{EngineEvent, NarratorError, SpeechEngine, Utterance, Voice};

/// The engine for platforms without speech synthesis.
///
/// Reports `is_supported() == false`; everything else is a no-op.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedEngine;

impl SpeechEngine for UnsupportedEngine {
    fn is_supported(&self) -> bool {
        false
    }

    fn voices(&self) -> Vec<Voice> {
        Vec::new()
    }

    fn enqueue(&mut self, _utterance: Utterance) -> Result<(), NarratorError> {
        Err(NarratorError::Unsupported)
    }

    fn pause(&mut self) {}

    fn resume(&mut self) {}

    fn cancel(&mut self) {}

    fn poll_events(&mut self) -> Vec<EngineEvent> {
        Vec::new()
    }
}
