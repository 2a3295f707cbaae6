//! Speech engine adapter: queue management, playback state and elapsed time.

use std::time::Duration;

use crate::clock::Clock;
use crate::content::NarrationUnit;
use crate::highlight;
use crate::timing::{generate_timestamps, total_duration, SectionTimestamp};
use crate::voice::{resolve_voice, Voice};
use crate::{EngineEvent, NarratorError, SpeakOptions, SpeechEngine, Utterance, UtteranceId};

pub const MIN_RATE: f32 = 0.5;
pub const MAX_RATE: f32 = 2.0;

const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(100);

/// Clamp a speech rate into the supported 0.5–2.0 range.
pub fn clamp_rate(rate: f32) -> f32 {
    if rate.is_nan() {
        1.0
    } else {
        rate.clamp(MIN_RATE, MAX_RATE)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PlaybackState {
    #[default]
    Idle,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn is_speaking(self) -> bool {
        self != PlaybackState::Idle
    }

    pub fn is_paused(self) -> bool {
        self == PlaybackState::Paused
    }
}

/// Noteworthy transitions produced while processing engine events.
#[derive(Debug, Clone, PartialEq)]
pub enum SpeechEvent {
    /// The first utterance of a session began.
    Started,
    /// The last utterance ended normally.
    Finished,
    /// An utterance failed; the session was abandoned.
    Failed(String),
    /// The engine went quiet for longer than the stall timeout.
    Stalled,
    VoicesChanged,
}

/// Refreshes the observable elapsed time while playing.
#[derive(Debug, Clone, Copy)]
struct ElapsedTimer {
    interval: Duration,
    next_due: Duration,
}

/// Owns a [`SpeechEngine`] and all playback timing.
///
/// At most one speak session is active: every [`speak`](Self::speak) cancels
/// the engine queue and opens a new session id, and events carrying an older
/// id are dropped.
pub struct SpeechController<E: SpeechEngine, C: Clock> {
    engine: E,
    clock: C,
    supported: bool,
    voices: Vec<Voice>,

    state: PlaybackState,
    session: u64,
    awaiting_start: bool,
    unit_count: usize,
    position: usize,

    accumulated: f64,
    segment_started: Option<Duration>,
    current_time: f64,
    timestamps: Vec<SectionTimestamp>,
    total_duration: f64,
    rate: f32,

    tick_interval: Duration,
    timer: Option<ElapsedTimer>,
    stall_timeout: Option<Duration>,
    last_activity: Duration,
}

impl<E: SpeechEngine, C: Clock> SpeechController<E, C> {
    pub fn new(engine: E, clock: C) -> Self {
        let supported = engine.is_supported();
        let voices = if supported {
            engine.voices()
        } else {
            log::warn!("Text-to-speech is not supported on this platform");
            Vec::new()
        };

        Self {
            engine,
            clock,
            supported,
            voices,
            state: PlaybackState::Idle,
            session: 0,
            awaiting_start: false,
            unit_count: 0,
            position: 0,
            accumulated: 0.0,
            segment_started: None,
            current_time: 0.0,
            timestamps: Vec::new(),
            total_duration: 0.0,
            rate: 1.0,
            tick_interval: DEFAULT_TICK_INTERVAL,
            timer: None,
            stall_timeout: None,
            last_activity: Duration::ZERO,
        }
    }

    pub fn set_tick_interval(&mut self, interval: Duration) {
        self.tick_interval = interval;
    }

    pub fn set_stall_timeout(&mut self, timeout: Option<Duration>) {
        self.stall_timeout = timeout;
    }

    /// Speak `units` in order from the beginning.
    pub fn speak(
        &mut self,
        units: &[NarrationUnit],
        options: &SpeakOptions,
    ) -> Result<(), NarratorError> {
        self.speak_from(units, options, 0)
    }

    /// Speak `units` starting at position `first_unit`.
    ///
    /// Timestamps always cover every unit, so elapsed time starts at the
    /// window of `first_unit` rather than at zero.
    pub fn speak_from(
        &mut self,
        units: &[NarrationUnit],
        options: &SpeakOptions,
        first_unit: usize,
    ) -> Result<(), NarratorError> {
        if !self.supported {
            log::warn!("Ignoring speak request: text-to-speech is not supported");
            return Err(NarratorError::Unsupported);
        }

        self.engine.cancel();
        self.reset_session();

        self.rate = clamp_rate(options.rate);
        self.timestamps = generate_timestamps(units, self.rate);
        self.total_duration = total_duration(&self.timestamps);
        self.unit_count = units.len();

        let Some(first) = self.timestamps.get(first_unit) else {
            log::debug!(
                "Nothing to speak: start unit {first_unit} of {} units",
                units.len()
            );
            return Ok(());
        };
        self.accumulated = first.start;
        self.current_time = first.start;
        self.position = first_unit;

        let voice = resolve_voice(
            &self.voices,
            options.voice_name.as_deref(),
            options.language.as_deref(),
        )
        .cloned();
        match &voice {
            Some(voice) => log::debug!("Using voice '{}' ({})", voice.name, voice.lang),
            None => log::debug!("No matching voice, using engine default"),
        }

        for (index, unit) in units.iter().enumerate().skip(first_unit) {
            let utterance = Utterance {
                id: UtteranceId {
                    session: self.session,
                    index,
                },
                text: unit.text.clone(),
                language: options.language.clone(),
                voice: voice.clone(),
                rate: self.rate,
                pitch: options.pitch,
                volume: options.volume,
            };
            if let Err(e) = self.engine.enqueue(utterance) {
                log::error!("Failed to queue unit {index}: {e}");
                self.engine.cancel();
                self.reset_session();
                return Err(e);
            }
        }

        self.awaiting_start = true;
        self.last_activity = self.clock.now();
        log::info!(
            "Speaking {} of {} units at rate {} ({:.1}s estimated)",
            units.len() - first_unit,
            units.len(),
            self.rate,
            self.total_duration
        );
        Ok(())
    }

    /// Speak `units` from `first_unit`, holding the new session paused until
    /// [`resume`](Self::resume).
    pub fn speak_paused_from(
        &mut self,
        units: &[NarrationUnit],
        options: &SpeakOptions,
        first_unit: usize,
    ) -> Result<(), NarratorError> {
        self.speak_from(units, options, first_unit)?;
        self.pause();
        Ok(())
    }

    /// Pause while playing, or while a submitted session waits to start.
    /// Returns whether anything changed.
    pub fn pause(&mut self) -> bool {
        let pausable = self.state == PlaybackState::Playing
            || (self.state == PlaybackState::Idle && self.awaiting_start);
        if !pausable {
            log::debug!("Pause ignored while {:?}", self.state);
            return false;
        }

        self.engine.pause();
        let now = self.clock.now();
        self.fold_segment(now);
        self.current_time = self.accumulated;
        self.state = PlaybackState::Paused;
        self.timer = None;
        true
    }

    /// Resume while paused. Returns whether anything changed.
    pub fn resume(&mut self) -> bool {
        if self.state != PlaybackState::Paused {
            log::debug!("Resume ignored while {:?}", self.state);
            return false;
        }

        self.engine.resume();
        let now = self.clock.now();
        self.state = PlaybackState::Playing;
        self.segment_started = Some(now);
        self.last_activity = now;
        self.start_timer(now);
        true
    }

    /// Cancel everything and return to idle at time zero.
    pub fn stop(&mut self) {
        self.engine.cancel();
        self.reset_session();
        log::debug!("Playback stopped");
    }

    /// Set the rate for the next speak request, clamped to 0.5–2.0.
    ///
    /// Speech engines cannot change the rate of an utterance in flight, so an
    /// active session is stopped and `true` is returned: the caller has to
    /// speak again from wherever it wants to continue.
    pub fn set_rate(&mut self, rate: f32) -> bool {
        self.rate = clamp_rate(rate);
        if !self.is_active() {
            return false;
        }

        log::info!(
            "Rate changed to {} mid-session; stopping until speech is re-issued",
            self.rate
        );
        self.stop();
        true
    }

    /// Process pending engine events and advance the elapsed-time ticker.
    pub fn pump(&mut self) -> Vec<SpeechEvent> {
        let mut events: Vec<SpeechEvent> = self
            .engine
            .poll_events()
            .into_iter()
            .filter_map(|event| self.handle_event(event))
            .collect();
        events.extend(self.tick());
        events
    }

    /// Apply one engine notification.
    pub fn handle_event(&mut self, event: EngineEvent) -> Option<SpeechEvent> {
        let now = self.clock.now();
        match event {
            EngineEvent::VoicesChanged => {
                self.refresh_voices();
                Some(SpeechEvent::VoicesChanged)
            }
            EngineEvent::Started(id) => {
                if !self.is_current(id) {
                    return None;
                }
                self.last_activity = now;
                self.position = id.index;
                let first = std::mem::take(&mut self.awaiting_start);
                if self.state == PlaybackState::Paused {
                    return None;
                }

                self.state = PlaybackState::Playing;
                self.segment_started = Some(now);
                if self.timer.is_none() {
                    self.start_timer(now);
                }
                first.then_some(SpeechEvent::Started)
            }
            EngineEvent::Ended(id) => {
                if !self.is_current(id) {
                    return None;
                }
                self.last_activity = now;
                self.fold_segment(now);
                self.position = id.index + 1;

                if self.position < self.unit_count {
                    self.current_time = self.accumulated;
                    return None;
                }

                self.state = PlaybackState::Idle;
                self.awaiting_start = false;
                self.timer = None;
                self.current_time = self.total_duration;
                log::info!("Narration finished ({:.1}s)", self.total_duration);
                Some(SpeechEvent::Finished)
            }
            EngineEvent::Failed { id, message } => {
                if !self.is_current(id) {
                    return None;
                }
                log::error!("Speech synthesis error on unit {}: {message}", id.index);
                // The remaining queue belongs to an abandoned session now.
                self.engine.cancel();
                self.session += 1;
                self.state = PlaybackState::Idle;
                self.awaiting_start = false;
                self.segment_started = None;
                self.timer = None;
                Some(SpeechEvent::Failed(message))
            }
        }
    }

    /// Recompute the observable elapsed time when the ticker is due, and
    /// enforce the stall timeout.
    pub fn tick(&mut self) -> Option<SpeechEvent> {
        let now = self.clock.now();

        if self.is_stalled(now) {
            log::warn!(
                "Speech engine silent past the stall timeout of {:?}; stopping",
                self.stall_timeout
            );
            self.stop();
            return Some(SpeechEvent::Stalled);
        }

        let timer = self.timer.as_mut()?;
        if now < timer.next_due {
            return None;
        }
        timer.next_due = now + timer.interval;
        self.current_time = self.elapsed_at(now);
        None
    }

    pub fn refresh_voices(&mut self) {
        if !self.supported {
            return;
        }
        self.voices = self.engine.voices();
        log::debug!("{} voices available", self.voices.len());
    }

    /// Position within the current unit list of the timestamp containing `time`.
    pub fn unit_at(&self, time: f64) -> Option<usize> {
        highlight::unit_at(&self.timestamps, time)
    }

    /// Section to highlight right now, `None` while idle.
    pub fn highlighted_section(&self) -> Option<usize> {
        if !self.state.is_speaking() {
            return None;
        }
        highlight::section_at(&self.timestamps, self.current_time)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_speaking(&self) -> bool {
        self.state.is_speaking()
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    pub fn is_supported(&self) -> bool {
        self.supported
    }

    /// A session was submitted but the engine has not started it yet.
    pub fn is_awaiting_start(&self) -> bool {
        self.awaiting_start
    }

    /// Whether a session is submitted or speaking.
    pub fn is_active(&self) -> bool {
        self.state.is_speaking() || self.awaiting_start
    }

    pub fn timer_active(&self) -> bool {
        self.timer.is_some()
    }

    /// Elapsed seconds as of the last tick or transition.
    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn total_duration(&self) -> f64 {
        self.total_duration
    }

    pub fn timestamps(&self) -> &[SectionTimestamp] {
        &self.timestamps
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    fn is_current(&self, id: UtteranceId) -> bool {
        if id.session == self.session {
            return true;
        }
        log::trace!("Dropping event for stale utterance {id:?}");
        false
    }

    /// Waiting for a start longer than the timeout, or playing longer than
    /// the timeout past the estimated end of the current unit.
    fn is_stalled(&self, now: Duration) -> bool {
        let Some(limit) = self.stall_timeout else {
            return false;
        };
        match self.state {
            PlaybackState::Paused => false,
            _ if self.awaiting_start => now.saturating_sub(self.last_activity) >= limit,
            PlaybackState::Playing => self.timestamps.get(self.position).is_some_and(|stamp| {
                self.elapsed_at(now) >= stamp.end + limit.as_secs_f64()
            }),
            PlaybackState::Idle => false,
        }
    }

    fn reset_session(&mut self) {
        self.session += 1;
        self.state = PlaybackState::Idle;
        self.awaiting_start = false;
        self.position = 0;
        self.accumulated = 0.0;
        self.segment_started = None;
        self.current_time = 0.0;
        self.timer = None;
    }

    fn fold_segment(&mut self, now: Duration) {
        if let Some(started) = self.segment_started.take() {
            self.accumulated += now.saturating_sub(started).as_secs_f64();
        }
    }

    fn elapsed_at(&self, now: Duration) -> f64 {
        let running = self
            .segment_started
            .map_or(0.0, |started| now.saturating_sub(started).as_secs_f64());
        self.accumulated + running
    }

    fn start_timer(&mut self, now: Duration) {
        self.timer = Some(ElapsedTimer {
            interval: self.tick_interval,
            next_due: now + self.tick_interval,
        });
    }
}

impl<E: SpeechEngine, C: Clock> Drop for SpeechController<E, C> {
    fn drop(&mut self) {
        self.timer = None;
        if self.is_active() {
            self.engine.cancel();
        }
    }
}
