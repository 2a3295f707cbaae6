//! Lesson content model, as stored in the lesson JSON files.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::markdown::strip_markdown;
use crate::NarratorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Text,
    Vocabulary,
    Grammar,
    Dialogue,
    Audio,
    Video,
}

/// One block of lesson content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentSection {
    #[serde(rename = "type")]
    pub kind: SectionKind,
    /// Markdown source.
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonMetadata {
    /// Two-letter language code of the lesson (`"de"`, `"fr"`, ...).
    pub language_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
}

/// Narration settings for a lesson.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonAudioConfig {
    pub enabled: bool,
    /// BCP 47 tag requested for narration, e.g. `"de-DE"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Preferred voice name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LessonContent {
    pub id: String,
    pub title: String,
    pub sections: Vec<ContentSection>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<LessonMetadata>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<LessonAudioConfig>,
}

/// One section's plain text, queued for speech in reading order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NarrationUnit {
    pub text: String,
    /// Index of the originating section in [`LessonContent::sections`].
    pub section_index: usize,
}

impl NarrationUnit {
    pub fn new(text: impl Into<String>, section_index: usize) -> Self {
        Self {
            text: text.into(),
            section_index,
        }
    }
}

impl LessonContent {
    pub fn from_json_str(json: &str) -> Result<Self, NarratorError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load a lesson from a JSON file on disk.
    pub fn load(path: &Path) -> Result<Self, NarratorError> {
        let content = std::fs::read_to_string(path)?;
        let lesson = Self::from_json_str(&content)?;
        log::debug!(
            "Loaded lesson '{}' with {} sections from {}",
            lesson.id,
            lesson.sections.len(),
            path.display()
        );
        Ok(lesson)
    }

    pub fn audio_enabled(&self) -> bool {
        self.audio.as_ref().is_some_and(|audio| audio.enabled)
    }

    /// Strip every section down to narration text.
    ///
    /// Sections with nothing left to say (a bare video embed, an emoji-only
    /// line) are skipped; the remaining units keep their original section index.
    pub fn narration_units(&self) -> Vec<NarrationUnit> {
        self.sections
            .iter()
            .enumerate()
            .filter_map(|(index, section)| {
                let text = strip_markdown(&section.content);
                (!text.is_empty()).then(|| NarrationUnit::new(text, index))
            })
            .collect()
    }
}
