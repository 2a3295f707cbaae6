//! Lesson-level playback orchestration.
//!
//! [`AudioPlayer`] turns user intents into [`SpeechController`] calls, owns
//! the UI-facing state the controller does not (current lesson, speed, voice
//! selection, minimized flag) and persists preferences. Narration is an
//! enhancement to reading a lesson, so nothing here returns an error: failures
//! are logged and the operation becomes a no-op.

use serde::Serialize;

use crate::clock::Clock;
use crate::config::PlayerConfig;
use crate::content::{LessonContent, NarrationUnit};
use crate::highlight;
use crate::preferences::{
    position_key, PlaybackPreferences, PlaybackSpeed, PreferenceStore, PLAYBACK_SPEED_KEY,
    PREFERRED_VOICE_KEY,
};
use crate::speech::{PlaybackState, SpeechController, SpeechEvent};
use crate::timing::{generate_timestamps, SectionTimestamp};
use crate::voice::{locale_for, Voice, DEFAULT_LOCALE};
use crate::{SpeakOptions, SpeechEngine};

/// What changed during a [`pump`](AudioPlayer::pump).
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Started,
    Finished,
    Failed(String),
    Stalled,
    /// The section to highlight (and scroll to) changed.
    HighlightChanged(Option<usize>),
}

/// Read-only snapshot for the presentation layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerState {
    pub lesson_id: Option<String>,
    pub is_playing: bool,
    pub is_paused: bool,
    pub playback_speed: PlaybackSpeed,
    pub current_time: f64,
    pub total_duration: f64,
    pub is_minimized: bool,
    pub is_loading: bool,
    pub timestamps: Vec<SectionTimestamp>,
    pub available_voices: Vec<Voice>,
    pub selected_voice: Option<Voice>,
    pub is_supported: bool,
    pub highlighted_section: Option<usize>,
}

pub struct AudioPlayer<E: SpeechEngine, C: Clock, S: PreferenceStore> {
    speech: SpeechController<E, C>,
    store: S,
    config: PlayerConfig,
    lesson: Option<LessonContent>,
    speed: PlaybackSpeed,
    preferred_voice_name: Option<String>,
    selected_voice: Option<Voice>,
    is_minimized: bool,
    resume_position: Option<f64>,
    last_saved_position: f64,
    last_highlight: Option<usize>,
}

impl<E: SpeechEngine, C: Clock, S: PreferenceStore> AudioPlayer<E, C, S> {
    pub fn new(engine: E, clock: C, store: S, config: PlayerConfig) -> Self {
        let mut speech = SpeechController::new(engine, clock);
        speech.set_tick_interval(config.tick_interval);
        speech.set_stall_timeout(config.stall_timeout);

        let prefs = PlaybackPreferences::load(&store);
        speech.set_rate(prefs.speed.rate());

        let mut player = Self {
            speech,
            store,
            config,
            lesson: None,
            speed: prefs.speed,
            preferred_voice_name: prefs.selected_voice_name,
            selected_voice: None,
            is_minimized: false,
            resume_position: None,
            last_saved_position: 0.0,
            last_highlight: None,
        };
        player.apply_saved_voice();
        player
    }

    /// Make `lesson` current without starting playback.
    pub fn load_lesson(&mut self, lesson: LessonContent) {
        let switching = self.lesson.as_ref().is_some_and(|current| current.id != lesson.id);
        if switching && self.speech.is_active() {
            self.speech.stop();
        }

        self.resume_position = None;
        if lesson.audio_enabled() {
            log::info!("Audio enabled for lesson '{}'", lesson.id);
            self.resume_position = self
                .store
                .get(&position_key(&lesson.id))
                .and_then(|raw| raw.parse::<f64>().ok())
                .filter(|position| position.is_finite() && *position > 0.0);
            if let Some(position) = self.resume_position {
                log::debug!("Saved position {position:.1}s found for '{}'", lesson.id);
            }
        }

        self.lesson = Some(lesson);
        self.last_saved_position = 0.0;
        self.apply_saved_voice();
    }

    /// Stop playback and forget the current lesson.
    pub fn clear_lesson(&mut self) {
        self.speech.stop();
        self.lesson = None;
        self.resume_position = None;
    }

    /// Narrate the current lesson from the start, or from its saved position
    /// the first time after loading.
    pub fn play(&mut self) {
        let Some(lesson) = &self.lesson else {
            log::debug!("Play ignored: no lesson loaded");
            return;
        };
        if !lesson.audio_enabled() {
            log::debug!("Play ignored: audio disabled for '{}'", lesson.id);
            return;
        }

        let units = lesson.narration_units();
        let options = self.speak_options(lesson);
        let first_unit = self
            .resume_position
            .take()
            .and_then(|position| {
                let stamps = generate_timestamps(&units, options.rate);
                highlight::unit_at(&stamps, position / f64::from(options.rate))
            })
            .unwrap_or(0);

        self.start(&units, &options, first_unit, false);
    }

    pub fn pause(&mut self) {
        self.speech.pause();
    }

    pub fn resume(&mut self) {
        self.speech.resume();
    }

    pub fn stop(&mut self) {
        self.speech.stop();
    }

    /// Idle → play, playing → pause, paused → resume. A session still
    /// waiting for the engine to start counts as playing. Ignored unless the
    /// lesson has audio enabled.
    pub fn toggle_play_pause(&mut self) {
        if !self.audio_enabled() {
            return;
        }

        match self.speech.state() {
            PlaybackState::Idle if self.speech.is_awaiting_start() => self.pause(),
            PlaybackState::Idle => self.play(),
            PlaybackState::Paused => self.resume(),
            PlaybackState::Playing => self.pause(),
        }
    }

    /// Store the new speed and apply it.
    ///
    /// An utterance in flight cannot change rate, so an active session
    /// restarts at the beginning of the current section. A paused session
    /// stays paused.
    pub fn set_playback_speed(&mut self, speed: PlaybackSpeed) {
        self.speed = speed;
        self.persist(PLAYBACK_SPEED_KEY, &speed.rate().to_string());

        let paused = self.speech.is_paused();
        let resume_unit = if self.speech.is_active() {
            self.speech.unit_at(self.speech.current_time())
        } else {
            None
        };
        if self.speech.set_rate(speed.rate()) {
            if let Some(unit) = resume_unit {
                self.restart_at_unit(unit, paused);
            }
        }
    }

    /// Select `voice` for this session and remember it as the preference.
    pub fn set_voice(&mut self, voice: Voice) {
        self.persist(PREFERRED_VOICE_KEY, &voice.name);
        self.preferred_voice_name = Some(voice.name.clone());
        self.selected_voice = Some(voice);
    }

    /// Jump to the section containing `time`.
    ///
    /// Speech engines cannot seek, so the session is re-issued from the start
    /// of that section, paused if playback was paused. Only acts while playing
    /// or paused; seeking to or past the end stops playback.
    pub fn seek(&mut self, time: f64) {
        if !self.speech.is_speaking() {
            log::debug!("Seek to {time:.1}s ignored while idle");
            return;
        }

        let target = if time.is_nan() { 0.0 } else { time.max(0.0) };
        match self.speech.unit_at(target) {
            Some(unit) => {
                log::debug!("Seeking to {target:.1}s (unit {unit})");
                self.restart_at_unit(unit, self.speech.is_paused());
            }
            None => {
                log::debug!("Seek to {target:.1}s is past the end; stopping");
                self.stop();
            }
        }
    }

    /// Move ahead by `seconds` (default from config), always at least to the
    /// next section.
    pub fn skip_forward(&mut self, seconds: Option<f64>) {
        if !self.speech.is_speaking() {
            return;
        }

        let now = self.speech.current_time();
        let amount = seconds.unwrap_or(self.config.skip_seconds);
        let current = self.speech.unit_at(now);
        let target = self.speech.unit_at(now + amount);
        match (current, target) {
            (Some(current), Some(target)) if target <= current => {
                if current + 1 < self.speech.timestamps().len() {
                    self.restart_at_unit(current + 1, self.speech.is_paused());
                } else {
                    self.stop();
                }
            }
            _ => self.seek(now + amount),
        }
    }

    /// Move back by `seconds` (default from config).
    pub fn skip_backward(&mut self, seconds: Option<f64>) {
        let amount = seconds.unwrap_or(self.config.skip_seconds);
        self.seek((self.speech.current_time() - amount).max(0.0));
    }

    pub fn toggle_minimize(&mut self) {
        self.is_minimized = !self.is_minimized;
    }

    pub fn set_minimized(&mut self, minimized: bool) {
        self.is_minimized = minimized;
    }

    /// Process engine events and timers. Call regularly from the host loop,
    /// at least as often as [`PlayerConfig::tick_interval`].
    pub fn pump(&mut self) -> Vec<PlayerEvent> {
        let mut events = Vec::new();
        for event in self.speech.pump() {
            match event {
                SpeechEvent::Started => events.push(PlayerEvent::Started),
                SpeechEvent::Finished => {
                    self.forget_position();
                    events.push(PlayerEvent::Finished);
                }
                SpeechEvent::Failed(message) => events.push(PlayerEvent::Failed(message)),
                SpeechEvent::Stalled => events.push(PlayerEvent::Stalled),
                SpeechEvent::VoicesChanged => self.apply_saved_voice(),
            }
        }

        self.save_position();

        let highlight = self.speech.highlighted_section();
        if highlight != self.last_highlight {
            self.last_highlight = highlight;
            events.push(PlayerEvent::HighlightChanged(highlight));
        }
        events
    }

    pub fn state(&self) -> PlayerState {
        PlayerState {
            lesson_id: self.lesson.as_ref().map(|lesson| lesson.id.clone()),
            is_playing: self.speech.is_speaking(),
            is_paused: self.speech.is_paused(),
            playback_speed: self.speed,
            current_time: self.speech.current_time(),
            total_duration: self.speech.total_duration(),
            is_minimized: self.is_minimized,
            is_loading: self.speech.is_awaiting_start(),
            timestamps: self.speech.timestamps().to_vec(),
            available_voices: self.speech.voices().to_vec(),
            selected_voice: self.selected_voice.clone(),
            is_supported: self.speech.is_supported(),
            highlighted_section: self.speech.highlighted_section(),
        }
    }

    pub fn lesson(&self) -> Option<&LessonContent> {
        self.lesson.as_ref()
    }

    pub fn audio_enabled(&self) -> bool {
        self.lesson.as_ref().is_some_and(LessonContent::audio_enabled)
    }

    pub fn highlighted_section(&self) -> Option<usize> {
        self.speech.highlighted_section()
    }

    pub fn playback_speed(&self) -> PlaybackSpeed {
        self.speed
    }

    pub fn selected_voice(&self) -> Option<&Voice> {
        self.selected_voice.as_ref()
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn speech(&self) -> &SpeechController<E, C> {
        &self.speech
    }

    pub fn engine(&self) -> &E {
        self.speech.engine()
    }

    pub fn engine_mut(&mut self) -> &mut E {
        self.speech.engine_mut()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn speak_options(&self, lesson: &LessonContent) -> SpeakOptions {
        let audio = lesson.audio.as_ref();
        let language = audio
            .and_then(|audio| audio.language.clone())
            .or_else(|| {
                lesson
                    .metadata
                    .as_ref()
                    .and_then(|metadata| locale_for(&metadata.language_code))
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_LOCALE.to_string());
        let voice_name = self
            .selected_voice
            .as_ref()
            .map(|voice| voice.name.clone())
            .or_else(|| audio.and_then(|audio| audio.voice.clone()));

        SpeakOptions {
            language: Some(language),
            voice_name,
            rate: self.speed.rate(),
            pitch: self.config.pitch,
            volume: self.config.volume,
        }
    }

    fn start(
        &mut self,
        units: &[NarrationUnit],
        options: &SpeakOptions,
        first_unit: usize,
        paused: bool,
    ) {
        let result = if paused {
            self.speech.speak_paused_from(units, options, first_unit)
        } else {
            self.speech.speak_from(units, options, first_unit)
        };
        if let Err(e) = result {
            log::warn!("Could not start narration: {e}");
        }
    }

    fn restart_at_unit(&mut self, unit: usize, paused: bool) {
        let Some(lesson) = &self.lesson else {
            return;
        };
        let units = lesson.narration_units();
        let options = self.speak_options(lesson);
        self.start(&units, &options, unit, paused);
    }

    fn apply_saved_voice(&mut self) {
        if self.selected_voice.is_some() {
            return;
        }
        let Some(name) = &self.preferred_voice_name else {
            return;
        };
        if let Some(voice) = self.speech.voices().iter().find(|voice| &voice.name == name) {
            log::debug!("Restored preferred voice '{name}'");
            self.selected_voice = Some(voice.clone());
        }
    }

    fn save_position(&mut self) {
        let Some(lesson) = &self.lesson else {
            return;
        };
        let position = self.speech.current_time();
        if !self.speech.is_speaking()
            || position <= 0.0
            || (position - self.last_saved_position).abs() < self.config.position_save_interval
        {
            return;
        }

        // Stored on the rate 1.0 timeline.
        let normalized = position * f64::from(self.speech.rate());
        let key = position_key(&lesson.id);
        self.persist(&key, &format!("{normalized:.2}"));
        self.last_saved_position = position;
    }

    fn forget_position(&mut self) {
        self.last_saved_position = 0.0;
        let Some(lesson) = &self.lesson else {
            return;
        };
        let key = position_key(&lesson.id);
        if let Err(e) = self.store.remove(&key) {
            log::warn!("Failed to clear saved position for '{}': {e}", lesson.id);
        }
    }

    fn persist(&mut self, key: &str, value: &str) {
        if let Err(e) = self.store.set(key, value) {
            log::warn!("Failed to persist preference '{key}': {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::clock::ManualClock;
    use crate::content::{ContentSection, LessonAudioConfig, LessonMetadata, SectionKind};
    use crate::engines::scripted::ScriptedEngine;
    use crate::preferences::MemoryStore;

    type Player = AudioPlayer<ScriptedEngine, Rc<ManualClock>, MemoryStore>;

    fn lesson(language_code: &str, audio: Option<LessonAudioConfig>) -> LessonContent {
        LessonContent {
            id: "lesson-1".to_string(),
            title: "Lesson".to_string(),
            sections: vec![
                ContentSection {
                    kind: SectionKind::Text,
                    content: "Eins zwei drei vier".to_string(),
                    audio_url: None,
                    video_url: None,
                },
                ContentSection {
                    kind: SectionKind::Grammar,
                    content: "**Fünf** sechs".to_string(),
                    audio_url: None,
                    video_url: None,
                },
            ],
            metadata: Some(LessonMetadata {
                language_code: language_code.to_string(),
                level_id: None,
                section_id: None,
            }),
            audio,
        }
    }

    fn enabled() -> Option<LessonAudioConfig> {
        Some(LessonAudioConfig {
            enabled: true,
            ..LessonAudioConfig::default()
        })
    }

    fn player_with(store: MemoryStore) -> Player {
        let engine = ScriptedEngine::with_voices(vec![
            Voice::new("Anna", "de-DE"),
            Voice::new("Amélie", "fr-FR"),
            Voice::new("Tom", "en-US"),
        ]);
        AudioPlayer::new(
            engine,
            Rc::new(ManualClock::new()),
            store,
            PlayerConfig::default(),
        )
    }

    #[test]
    fn play_derives_locale_from_language_code() {
        let mut player = player_with(MemoryStore::new());
        player.load_lesson(lesson("fr", enabled()));
        player.play();

        let queued = &player.engine().queue;
        assert_eq!(queued.len(), 2);
        assert_eq!(queued[0].language.as_deref(), Some("fr-FR"));
        assert_eq!(queued[0].voice.as_ref().unwrap().name, "Amélie");
        assert_eq!(queued[1].text, "Fünf sechs");
    }

    #[test]
    fn lesson_audio_language_and_voice_take_precedence() {
        let mut player = player_with(MemoryStore::new());
        player.load_lesson(lesson(
            "fr",
            Some(LessonAudioConfig {
                enabled: true,
                language: Some("de-DE".to_string()),
                voice: Some("Tom".to_string()),
            }),
        ));
        player.play();
        let first = &player.engine().queue[0];
        assert_eq!(first.language.as_deref(), Some("de-DE"));
        assert_eq!(first.voice.as_ref().unwrap().name, "Tom");
    }

    #[test]
    fn unknown_language_code_defaults_to_us_english() {
        let mut player = player_with(MemoryStore::new());
        player.load_lesson(lesson("xx", enabled()));
        player.play();
        assert_eq!(player.engine().queue[0].language.as_deref(), Some("en-US"));
    }

    #[test]
    fn play_without_lesson_or_audio_is_a_no_op() {
        let mut player = player_with(MemoryStore::new());
        player.play();
        player.toggle_play_pause();
        assert!(player.engine().queue.is_empty());

        player.load_lesson(lesson("de", None));
        player.play();
        player.toggle_play_pause();
        assert!(player.engine().queue.is_empty());
        assert!(!player.state().is_loading);
    }

    #[test]
    fn toggle_while_waiting_for_the_engine_pauses_the_pending_session() {
        let mut store = MemoryStore::new();
        store.set(&position_key("lesson-1"), "1.8").unwrap();
        let mut player = player_with(store);
        player.load_lesson(lesson("de", enabled()));
        player.play();
        assert!(player.state().is_loading);

        player.toggle_play_pause();
        assert!(player.state().is_paused);
        assert_eq!(player.engine().cancels, 1);
        assert_eq!(player.engine().queue[0].id.index, 1);

        player.engine_mut().start_next();
        player.pump();
        assert!(player.state().is_paused);
        assert_eq!(player.highlighted_section(), Some(1));

        player.toggle_play_pause();
        let state = player.state();
        assert!(state.is_playing && !state.is_paused);
        assert_eq!(player.engine().cancels, 1);
    }

    #[test]
    fn selected_voice_is_persisted_and_used() {
        let mut player = player_with(MemoryStore::new());
        player.load_lesson(lesson("de", enabled()));
        player.set_voice(Voice::new("Tom", "en-US"));
        assert_eq!(
            player.store().get(PREFERRED_VOICE_KEY).as_deref(),
            Some("Tom")
        );

        player.play();
        assert_eq!(player.engine().queue[0].voice.as_ref().unwrap().name, "Tom");
    }

    #[test]
    fn saved_preferences_are_restored_at_startup() {
        let mut store = MemoryStore::new();
        store.set(PREFERRED_VOICE_KEY, "Anna").unwrap();
        store.set(PLAYBACK_SPEED_KEY, "1.5").unwrap();

        let player = player_with(store);
        assert_eq!(player.playback_speed(), PlaybackSpeed::OneAndHalf);
        assert_eq!(player.selected_voice().unwrap().name, "Anna");
        assert_eq!(player.speech().rate(), 1.5);
    }

    #[test]
    fn saved_voice_applies_once_voices_arrive() {
        let mut store = MemoryStore::new();
        store.set(PREFERRED_VOICE_KEY, "Léa").unwrap();
        let mut player = player_with(store);
        assert!(player.selected_voice().is_none());

        player.engine_mut().voices.push(Voice::new("Léa", "fr-FR"));
        player
            .engine_mut()
            .push_event(crate::EngineEvent::VoicesChanged);
        player.pump();
        assert_eq!(player.selected_voice().unwrap().name, "Léa");
    }

    #[test]
    fn explicit_selection_is_not_overridden_by_voice_updates() {
        let mut store = MemoryStore::new();
        store.set(PREFERRED_VOICE_KEY, "Léa").unwrap();
        let mut player = player_with(store);
        player.set_voice(Voice::new("Tom", "en-US"));

        player.engine_mut().voices.push(Voice::new("Léa", "fr-FR"));
        player
            .engine_mut()
            .push_event(crate::EngineEvent::VoicesChanged);
        player.pump();
        assert_eq!(player.selected_voice().unwrap().name, "Tom");
    }

    #[test]
    fn speed_change_is_persisted() {
        let mut player = player_with(MemoryStore::new());
        player.set_playback_speed(PlaybackSpeed::Double);
        assert_eq!(player.store().get(PLAYBACK_SPEED_KEY).as_deref(), Some("2"));
        assert_eq!(player.speech().rate(), 2.0);
        assert_eq!(player.state().playback_speed, PlaybackSpeed::Double);
    }

    #[test]
    fn minimize_flag_has_no_playback_effect() {
        let mut player = player_with(MemoryStore::new());
        player.toggle_minimize();
        assert!(player.state().is_minimized);
        player.set_minimized(false);
        assert!(!player.state().is_minimized);
        assert!(player.engine().queue.is_empty());
    }

    #[test]
    fn clear_lesson_stops_and_forgets() {
        let mut player = player_with(MemoryStore::new());
        player.load_lesson(lesson("de", enabled()));
        player.play();
        player.engine_mut().start_next();
        player.pump();
        assert!(player.state().is_playing);

        player.clear_lesson();
        let state = player.state();
        assert!(!state.is_playing);
        assert_eq!(state.current_time, 0.0);
        assert_eq!(state.lesson_id, None);
        assert!(player.engine().queue.is_empty());
    }

    #[test]
    fn state_serializes_in_camel_case() {
        let player = player_with(MemoryStore::new());
        let json = serde_json::to_value(player.state()).unwrap();
        assert_eq!(json["isPlaying"], false);
        assert_eq!(json["playbackSpeed"], 1.0);
        assert_eq!(json["availableVoices"][0]["name"], "Anna");
        assert!(json["highlightedSection"].is_null());
    }
}
