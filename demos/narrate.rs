use std::path::PathBuf;
use std::time::Instant;

use lesson_narrator::{
    engines::espeak::EspeakEngine, timing::format_time, AudioPlayer, JsonFileStore,
    LessonContent, PlayerConfigBuilder, PlayerEvent, SpeechEngine, SystemClock,
};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();

    let lesson_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or("usage: narrate <lesson.json>")?;
    let lesson = LessonContent::load(&lesson_path)?;

    let engine = EspeakEngine::new();
    if !engine.is_supported() {
        return Err("espeak-ng is not installed".into());
    }
    println!("Available voices: {}", engine.voices().len());

    let store = JsonFileStore::open(&PathBuf::from("narrator-preferences.json"))?;
    let config = PlayerConfigBuilder::default().skip_seconds(5.0).build()?;
    let mut player = AudioPlayer::new(engine, SystemClock::new(), store, config);

    player.load_lesson(lesson);
    let sections = player
        .lesson()
        .map(|lesson| lesson.sections.clone())
        .unwrap_or_default();

    let start = Instant::now();
    player.play();
    loop {
        for event in player.pump() {
            let state = player.state();
            match event {
                PlayerEvent::HighlightChanged(Some(index)) => {
                    let preview: String = sections[index].content.chars().take(60).collect();
                    println!(
                        "[{} / {}] section {index}: {preview}",
                        format_time(state.current_time),
                        format_time(state.total_duration)
                    );
                }
                PlayerEvent::Failed(message) => return Err(message.into()),
                PlayerEvent::Finished => {
                    println!("Finished in {:.2?}", start.elapsed());
                    return Ok(());
                }
                _ => {}
            }
        }

        let state = player.state();
        if !state.is_playing && !state.is_loading {
            return Ok(());
        }
        std::thread::sleep(player.config().tick_interval);
    }
}
