use std::time::Duration;

use derive_builder::Builder;

/// Tunables for [`AudioPlayer`](crate::player::AudioPlayer).
///
/// ```
/// use std::time::Duration;
/// use lesson_narrator::PlayerConfigBuilder;
///
/// let config = PlayerConfigBuilder::default()
///     .tick_interval(Duration::from_millis(50))
///     .stall_timeout(Some(Duration::from_secs(30)))
///     .build()
///     .unwrap();
/// assert_eq!(config.skip_seconds, 10.0);
/// ```
#[derive(Debug, Clone, PartialEq, Builder)]
#[builder(default)]
pub struct PlayerConfig {
    /// How often the elapsed-time display is refreshed while playing.
    pub tick_interval: Duration,
    /// Step used by skip forward/backward when no amount is given.
    pub skip_seconds: f64,
    /// Minimum position change, in seconds, before the lesson position is
    /// written to the preference store again.
    pub position_save_interval: f64,
    /// Stop playback when the engine sends no event for this long while
    /// playing. `None` waits forever.
    pub stall_timeout: Option<Duration>,
    /// Pitch passed to every utterance (0–2, 1 is neutral).
    pub pitch: f32,
    /// Volume passed to every utterance (0–1).
    pub volume: f32,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            skip_seconds: 10.0,
            position_save_interval: 1.0,
            stall_timeout: None,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}
