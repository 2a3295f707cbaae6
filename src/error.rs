/// Errors surfaced by the narration core.
///
/// The [`AudioPlayer`](crate::player::AudioPlayer) never propagates these to its
/// caller; they are logged and playback degrades to a no-op.
#[derive(thiserror::Error, Debug)]
pub enum NarratorError {
    #[error("Speech synthesis is not supported on this platform")]
    Unsupported,
    #[error("Speech synthesis failed: {0}")]
    Synthesis(String),
    #[error("Unsupported playback speed {0}. Expected one of 0.5, 0.75, 1, 1.25, 1.5, 2.")]
    InvalidSpeed(f32),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "espeak")]
    #[error(
        "espeak-ng not found. Install: Linux: `sudo apt-get install espeak-ng`, \
         macOS: `brew install espeak-ng`, Windows: https://espeak-ng.org/download"
    )]
    EspeakNotFound,
}
