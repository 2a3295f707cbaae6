//! # lesson-narrator
//!
//! A Rust library that reads language lessons aloud through a platform
//! text-to-speech engine and keeps the lesson view in step with the narration.
//!
//! ## Features
//!
//! - **Narration**: lesson markdown is stripped to plain text and queued on the
//!   speech engine one section at a time
//! - **Timing**: elapsed time and per-section windows are estimated from word
//!   counts, driving a progress display and section highlighting
//! - **Preferences**: playback speed, preferred voice and the last position in
//!   each lesson are persisted through a pluggable key-value store
//! - **Engines**: any platform capability implementing [`SpeechEngine`]; an
//!   espeak-ng backend ships behind the `espeak` feature
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! lesson-narrator = { version = "2026.2", features = ["espeak"] }
//! ```
//!
//! ```ignore
//! use std::path::Path;
//! use lesson_narrator::{
//!     engines::espeak::EspeakEngine, AudioPlayer, LessonContent, MemoryStore, PlayerConfig,
//!     SystemClock,
//! };
//!
//! let lesson = LessonContent::load(Path::new("content/de/a1/basics/greetings.json"))?;
//! let mut player = AudioPlayer::new(
//!     EspeakEngine::new(),
//!     SystemClock::new(),
//!     MemoryStore::new(),
//!     PlayerConfig::default(),
//! );
//! player.load_lesson(lesson);
//! player.play();
//! loop {
//!     player.pump();
//!     if !player.state().is_playing {
//!         break;
//!     }
//!     std::thread::sleep(player.config().tick_interval);
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod clock;
pub mod config;
pub mod content;
pub mod engines;
pub mod error;
pub mod highlight;
pub mod keyboard;
pub mod markdown;
pub mod player;
pub mod preferences;
pub mod speech;
pub mod timing;
pub mod voice;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PlayerConfig, PlayerConfigBuilder};
pub use content::{LessonAudioConfig, LessonContent, NarrationUnit};
pub use error::NarratorError;
pub use player::{AudioPlayer, PlayerEvent, PlayerState};
pub use preferences::{JsonFileStore, MemoryStore, PlaybackSpeed, PreferenceStore};
pub use speech::{PlaybackState, SpeechController};
pub use timing::SectionTimestamp;
pub use voice::Voice;

/// Identifies one utterance within one speak session.
///
/// Every speak request opens a new session, so events that arrive late from
/// a cancelled queue can be told apart from the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtteranceId {
    pub session: u64,
    /// Position of the utterance within the session's unit list.
    pub index: usize,
}

/// A single request to vocalize one narration unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub id: UtteranceId,
    pub text: String,
    /// Requested BCP 47 language, if any.
    pub language: Option<String>,
    /// Resolved voice. `None` uses the engine default.
    pub voice: Option<Voice>,
    /// Speech rate multiplier, 0.5–2.0.
    pub rate: f32,
    /// Pitch, 0–2 with 1 neutral.
    pub pitch: f32,
    /// Volume, 0–1.
    pub volume: f32,
}

/// Notifications delivered by a [`SpeechEngine`], in the order they happened.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Started(UtteranceId),
    Ended(UtteranceId),
    Failed { id: UtteranceId, message: String },
    /// The set of available voices changed; call [`SpeechEngine::voices`] again.
    VoicesChanged,
}

/// Parameters for a speak request.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeakOptions {
    /// BCP 47 tag, e.g. `"de-DE"`.
    pub language: Option<String>,
    /// Preferred voice name. Falls back by language, then to the engine default.
    pub voice_name: Option<String>,
    /// Speech rate. Clamped to 0.5–2.0.
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for SpeakOptions {
    fn default() -> Self {
        Self {
            language: None,
            voice_name: None,
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

/// Common interface for platform speech-synthesis capabilities.
///
/// Engines play queued utterances one after another and report progress
/// through [`poll_events`](SpeechEngine::poll_events). Only one queue exists
/// per engine; [`SpeechController`] guarantees at most one session uses it.
pub trait SpeechEngine {
    /// Whether the capability exists at all on this platform.
    fn is_supported(&self) -> bool {
        true
    }

    /// Voices currently available. May be empty until the platform has
    /// enumerated them; a later [`EngineEvent::VoicesChanged`] signals more.
    fn voices(&self) -> Vec<Voice>;

    /// Append an utterance to the playback queue.
    fn enqueue(&mut self, utterance: Utterance) -> Result<(), NarratorError>;

    /// Pause the utterance being spoken.
    fn pause(&mut self);

    /// Continue after [`pause`](SpeechEngine::pause).
    fn resume(&mut self);

    /// Stop speaking and discard every queued utterance.
    fn cancel(&mut self);

    /// Drain the events that happened since the last call.
    fn poll_events(&mut self) -> Vec<EngineEvent>;
}
