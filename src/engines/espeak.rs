//! espeak-ng speech engine.
//!
//! Plays each utterance by running one `espeak-ng` process, text on stdin,
//! audio straight to the default output device.
//!
//! # System Requirements
//!
//! **espeak-ng** must be installed on your system:
//! - **Linux**: `sudo apt-get install espeak-ng`
//! - **macOS**: `brew install espeak-ng`
//! - **Windows**: Download installer from <https://espeak-ng.org/download>
//!
//! # Limitations
//!
//! A running process cannot be frozen portably, so pausing kills it and
//! resuming speaks the interrupted utterance again from its beginning.

use std::borrow::Cow;
use std::collections::VecDeque;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use crate::{EngineEvent, NarratorError, SpeechEngine, Utterance, Voice};

/// espeak-ng's own speaking pace, used as rate 1.0.
const ESPEAK_DEFAULT_WPM: f32 = 175.0;

/// Location of the espeak-ng binary and voice data.
#[derive(Debug, Clone, Default)]
pub struct EspeakConfig {
    /// `None` runs `espeak-ng` from PATH.
    pub bin_path: Option<PathBuf>,
    /// `None` uses the data directory compiled into the binary.
    pub data_path: Option<PathBuf>,
}

impl EspeakConfig {
    fn command(&self) -> Command {
        let bin = self
            .bin_path
            .as_deref()
            .unwrap_or_else(|| Path::new("espeak-ng"));
        let mut command = Command::new(bin);
        if let Some(data) = &self.data_path {
            command.arg(format!("--path={}", data.display()));
        }
        command
    }
}

struct Speaking {
    utterance: Utterance,
    /// `None` while paused.
    child: Option<Child>,
}

/// [`SpeechEngine`] backed by espeak-ng processes.
///
/// ```rust,no_run
/// use lesson_narrator::{engines::espeak::EspeakEngine, SpeechEngine};
///
/// let engine = EspeakEngine::new();
/// if engine.is_supported() {
///     println!("{} voices", engine.voices().len());
/// }
/// ```
pub struct EspeakEngine {
    espeak: EspeakConfig,
    supported: bool,
    voices: Vec<Voice>,
    queue: VecDeque<Utterance>,
    current: Option<Speaking>,
    paused: bool,
    events: Vec<EngineEvent>,
}

impl Default for EspeakEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl EspeakEngine {
    /// Create an engine that uses `espeak-ng` from PATH.
    pub fn new() -> Self {
        Self::with_espeak(None, None)
    }

    /// Create an engine with explicit espeak-ng binary and data paths.
    ///
    /// Use this when bundling espeak-ng with your application. Either path
    /// can be `None` to fall back to the system default.
    pub fn with_espeak(bin_path: Option<PathBuf>, data_path: Option<PathBuf>) -> Self {
        let espeak = EspeakConfig {
            bin_path,
            data_path,
        };
        let (supported, voices) = match list_voices(&espeak) {
            Ok(voices) => {
                log::info!("espeak-ng ready with {} voices", voices.len());
                (true, voices)
            }
            Err(e) => {
                log::warn!("espeak-ng unavailable: {e}");
                (false, Vec::new())
            }
        };

        Self {
            espeak,
            supported,
            voices,
            queue: VecDeque::new(),
            current: None,
            paused: false,
            events: Vec::new(),
        }
    }

    fn spawn(&self, utterance: &Utterance) -> Result<Child, NarratorError> {
        let mut child = self
            .espeak
            .command()
            .args(["-v", &self.voice_arg(utterance)])
            .args(["-s", &words_per_minute(utterance.rate).to_string()])
            .args(["-p", &pitch_arg(utterance.pitch).to_string()])
            .args(["-a", &amplitude_arg(utterance.volume).to_string()])
            .arg("--stdin")
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(spawn_error)?;

        // Dropping stdin after the write closes the pipe, which ends input.
        if let Some(mut stdin) = child.stdin.take() {
            let payload = canonicalize_stdin_payload(&utterance.text);
            if let Err(e) = stdin.write_all(payload.as_bytes()) {
                terminate(&mut child);
                return Err(e.into());
            }
        }
        Ok(child)
    }

    fn voice_arg(&self, utterance: &Utterance) -> String {
        if let Some(voice) = &utterance.voice {
            return voice.uri.clone();
        }
        match &utterance.language {
            Some(tag) => espeak_language(tag, &self.voices),
            None => "en".to_string(),
        }
    }

    fn start_next(&mut self) {
        let Some(utterance) = self.queue.pop_front() else {
            return;
        };
        match self.spawn(&utterance) {
            Ok(child) => {
                self.events.push(EngineEvent::Started(utterance.id));
                self.current = Some(Speaking {
                    utterance,
                    child: Some(child),
                });
            }
            Err(e) => self.events.push(EngineEvent::Failed {
                id: utterance.id,
                message: e.to_string(),
            }),
        }
    }

    fn kill_current(&mut self) {
        if let Some(mut speaking) = self.current.take() {
            if let Some(child) = speaking.child.as_mut() {
                terminate(child);
            }
        }
    }
}

impl Drop for EspeakEngine {
    fn drop(&mut self) {
        self.kill_current();
    }
}

impl SpeechEngine for EspeakEngine {
    fn is_supported(&self) -> bool {
        self.supported
    }

    fn voices(&self) -> Vec<Voice> {
        self.voices.clone()
    }

    fn enqueue(&mut self, utterance: Utterance) -> Result<(), NarratorError> {
        if !self.supported {
            return Err(NarratorError::Unsupported);
        }
        self.queue.push_back(utterance);
        if self.current.is_none() && !self.paused {
            self.start_next();
        }
        Ok(())
    }

    fn pause(&mut self) {
        if let Some(speaking) = self.current.as_mut() {
            if let Some(mut child) = speaking.child.take() {
                terminate(&mut child);
            }
        }
        self.paused = true;
    }

    fn resume(&mut self) {
        if !self.paused {
            return;
        }
        self.paused = false;

        let Some(speaking) = self.current.as_ref() else {
            self.start_next();
            return;
        };
        if speaking.child.is_some() {
            return;
        }

        let id = speaking.utterance.id;
        match self.spawn(&speaking.utterance) {
            Ok(child) => {
                if let Some(speaking) = self.current.as_mut() {
                    speaking.child = Some(child);
                }
            }
            Err(e) => {
                self.current = None;
                self.events.push(EngineEvent::Failed {
                    id,
                    message: e.to_string(),
                });
            }
        }
    }

    fn cancel(&mut self) {
        self.kill_current();
        self.queue.clear();
        self.paused = false;
        self.events.clear();
    }

    fn poll_events(&mut self) -> Vec<EngineEvent> {
        let finished = match self.current.as_mut() {
            Some(Speaking {
                utterance,
                child: Some(child),
            }) => match child.try_wait() {
                Ok(Some(status)) if status.success() => Some(EngineEvent::Ended(utterance.id)),
                Ok(Some(status)) => Some(EngineEvent::Failed {
                    id: utterance.id,
                    message: format!("espeak-ng exited with code {:?}", status.code()),
                }),
                Ok(None) => None,
                Err(e) => Some(EngineEvent::Failed {
                    id: utterance.id,
                    message: e.to_string(),
                }),
            },
            _ => None,
        };

        if let Some(event) = finished {
            let ended = matches!(event, EngineEvent::Ended(_));
            self.current = None;
            self.events.push(event);
            if ended && !self.paused {
                self.start_next();
            }
        }

        std::mem::take(&mut self.events)
    }
}

fn spawn_error(e: std::io::Error) -> NarratorError {
    if e.kind() == std::io::ErrorKind::NotFound {
        NarratorError::EspeakNotFound
    } else {
        NarratorError::Io(e)
    }
}

fn terminate(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::debug!("espeak-ng process already gone: {e}");
    }
    if let Err(e) = child.wait() {
        log::debug!("Failed to reap espeak-ng process: {e}");
    }
}

fn list_voices(espeak: &EspeakConfig) -> Result<Vec<Voice>, NarratorError> {
    let output = espeak
        .command()
        .arg("--voices")
        .stdin(Stdio::null())
        .output()
        .map_err(spawn_error)?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(NarratorError::Synthesis(format!(
            "espeak-ng --voices exited with code {:?}: {stderr}",
            output.status.code()
        )));
    }

    Ok(parse_voice_list(&String::from_utf8_lossy(&output.stdout)))
}

/// Parse the table printed by `espeak-ng --voices`:
///
/// ```text
/// Pty Language       Age/Gender VoiceName          File                 Other Languages
///  5  de              --/M      German             gmw/de
/// ```
fn parse_voice_list(table: &str) -> Vec<Voice> {
    table
        .lines()
        .filter(|line| !line.trim_start().starts_with("Pty"))
        .filter_map(|line| {
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.len() < 5 {
                return None;
            }
            Some(Voice {
                name: fields[3].replace('_', " "),
                lang: fields[1].to_string(),
                uri: fields[1].to_string(),
                local_service: true,
                default: false,
            })
        })
        .collect()
}

/// Map a BCP 47 tag onto an espeak-ng language: the full lowercase tag when
/// espeak knows it (`en-gb`), else its primary subtag (`de-DE` → `de`).
fn espeak_language(tag: &str, voices: &[Voice]) -> String {
    let lower = tag.to_ascii_lowercase().replace('_', "-");
    if voices.iter().any(|voice| voice.lang == lower) {
        return lower;
    }
    lower.split('-').next().unwrap_or("en").to_string()
}

fn words_per_minute(rate: f32) -> u32 {
    (ESPEAK_DEFAULT_WPM * rate).round().max(80.0) as u32
}

fn pitch_arg(pitch: f32) -> u32 {
    (pitch * 50.0).round().clamp(0.0, 99.0) as u32
}

fn amplitude_arg(volume: f32) -> u32 {
    (volume * 100.0).round().clamp(0.0, 200.0) as u32
}

fn canonicalize_stdin_payload(input: &str) -> Cow<'_, str> {
    // espeak-ng reads stdin line by line and can drop an unterminated last line.
    if input.ends_with('\n') {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(format!("{input}\n"))
    }
}

#[cfg(test)]
mod tests {
    use std::process::Command;

    use super::*;

    const VOICE_TABLE: &str = "\
Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  de              --/M      German             gmw/de
 2  en-gb           --/M      English_(Great_Britain) gmw/en            (en 2)
 5  fr-fr           --/M      French             roa/fr               (fr 5)
";

    #[test]
    fn parses_voice_table() {
        let voices = parse_voice_list(VOICE_TABLE);
        assert_eq!(voices.len(), 3);
        assert_eq!(voices[0].name, "German");
        assert_eq!(voices[0].lang, "de");
        assert_eq!(voices[1].name, "English (Great Britain)");
        assert_eq!(voices[2].uri, "fr-fr");
    }

    #[test]
    fn maps_tags_onto_espeak_languages() {
        let voices = parse_voice_list(VOICE_TABLE);
        assert_eq!(espeak_language("en-GB", &voices), "en-gb");
        assert_eq!(espeak_language("de-DE", &voices), "de");
        assert_eq!(espeak_language("es_ES", &voices), "es");
    }

    #[test]
    fn converts_speech_parameters() {
        assert_eq!(words_per_minute(1.0), 175);
        assert_eq!(words_per_minute(2.0), 350);
        assert_eq!(words_per_minute(0.1), 80);
        assert_eq!(pitch_arg(1.0), 50);
        assert_eq!(pitch_arg(2.0), 99);
        assert_eq!(amplitude_arg(1.0), 100);
        assert_eq!(amplitude_arg(0.0), 0);
    }

    #[test]
    fn appends_trailing_newline_for_stdin() {
        assert_eq!(canonicalize_stdin_payload("Bonjour"), "Bonjour\n");
        assert_eq!(canonicalize_stdin_payload("Bonjour\n"), "Bonjour\n");
    }

    #[test]
    fn failed_stdin_write_reaps_the_process() {
        // `true` exits without reading stdin, so a large payload hits a broken pipe.
        if Command::new("true").output().is_err() {
            return;
        }

        let engine = EspeakEngine::with_espeak(Some(PathBuf::from("true")), None);
        let utterance = Utterance {
            id: crate::UtteranceId {
                session: 1,
                index: 0,
            },
            text: "wort ".repeat(1 << 20),
            language: None,
            voice: None,
            rate: 1.0,
            pitch: 1.0,
            volume: 1.0,
        };
        match engine.spawn(&utterance) {
            Ok(mut child) => {
                // The pipe buffer absorbed the write before the process exited.
                assert!(child.wait().is_ok());
            }
            Err(e) => assert!(matches!(e, NarratorError::Io(_))),
        }
    }

    #[test]
    fn missing_binary_reports_unsupported() {
        let engine =
            EspeakEngine::with_espeak(Some(PathBuf::from("/nonexistent/espeak-ng")), None);
        assert!(!engine.is_supported());
        assert!(engine.voices().is_empty());
    }

    #[test]
    fn lists_installed_voices() {
        // Skip when espeak-ng is unavailable in the execution environment.
        if Command::new("espeak-ng").arg("--version").output().is_err() {
            return;
        }

        let engine = EspeakEngine::new();
        assert!(engine.is_supported());
        assert!(engine.voices().iter().any(|voice| voice.lang.starts_with("en")));
    }
}
