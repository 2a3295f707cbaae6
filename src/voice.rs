//! Voice descriptors and voice/language resolution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Locale used when neither the lesson nor its language code names one.
pub const DEFAULT_LOCALE: &str = "en-US";

/// A voice offered by the speech engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Voice {
    /// Human-readable name, also the key persisted as the user's preference.
    pub name: String,
    /// BCP 47 language tag (`"de-DE"`), or whatever the engine reports.
    pub lang: String,
    /// Engine-specific identifier used to select the voice.
    pub uri: String,
    #[serde(default)]
    pub local_service: bool,
    #[serde(default)]
    pub default: bool,
}

impl Voice {
    pub fn new(name: impl Into<String>, lang: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            uri: name.clone(),
            name,
            lang: lang.into(),
            local_service: true,
            default: false,
        }
    }
}

/// Map a two-letter lesson language code to the locale requested from the engine.
pub fn locale_for(language_code: &str) -> Option<&'static str> {
    match language_code {
        "de" => Some("de-DE"),
        "fr" => Some("fr-FR"),
        "es" => Some("es-ES"),
        "en" => Some("en-US"),
        _ => None,
    }
}

fn lang_has_prefix(lang: &str, prefix: &str) -> bool {
    lang.get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}

/// Pick the voice for a speak request.
///
/// Resolution order: exact name match, then the first voice whose language
/// starts with `language`, then the first voice sharing its primary subtag
/// (`de` for `de-DE`). `None` leaves the choice to the engine default.
pub fn resolve_voice<'a>(
    voices: &'a [Voice],
    name: Option<&str>,
    language: Option<&str>,
) -> Option<&'a Voice> {
    if let Some(name) = name {
        if let Some(voice) = voices.iter().find(|v| v.name == name) {
            return Some(voice);
        }
        log::debug!("Voice '{name}' not available, falling back to language match");
    }

    let language = language?;
    voices
        .iter()
        .find(|v| lang_has_prefix(&v.lang, language))
        .or_else(|| {
            let primary = language.split(['-', '_']).next()?;
            voices.iter().find(|v| lang_has_prefix(&v.lang, primary))
        })
}

/// Voices whose language starts with `language`, compared case-insensitively.
pub fn voices_for_language<'a>(voices: &'a [Voice], language: &str) -> Vec<&'a Voice> {
    voices
        .iter()
        .filter(|v| lang_has_prefix(&v.lang, language))
        .collect()
}

/// Group voices by their language tag, in tag order, for a voice picker.
pub fn group_by_language(voices: &[Voice]) -> BTreeMap<&str, Vec<&Voice>> {
    let mut groups: BTreeMap<&str, Vec<&Voice>> = BTreeMap::new();
    for voice in voices {
        groups.entry(voice.lang.as_str()).or_default().push(voice);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<Voice> {
        vec![
            Voice::new("Anna", "de-DE"),
            Voice::new("Tom", "en-US"),
            Voice::new("Amélie", "fr-CA"),
            Voice::new("Thomas", "fr-FR"),
        ]
    }

    #[test]
    fn exact_name_wins_over_language() {
        let voices = catalog();
        let voice = resolve_voice(&voices, Some("Tom"), Some("de-DE")).unwrap();
        assert_eq!(voice.name, "Tom");
    }

    #[test]
    fn unknown_name_falls_back_to_language_prefix() {
        let voices = catalog();
        let voice = resolve_voice(&voices, Some("Nonexistent Voice"), Some("de-DE")).unwrap();
        assert_eq!(voice.name, "Anna");
    }

    #[test]
    fn falls_back_to_primary_subtag() {
        let voices = vec![Voice::new("Klaus", "de"), Voice::new("Tom", "en-US")];
        let voice = resolve_voice(&voices, None, Some("de-AT")).unwrap();
        assert_eq!(voice.name, "Klaus");
    }

    #[test]
    fn language_match_is_case_insensitive() {
        let voices = catalog();
        let voice = resolve_voice(&voices, None, Some("fr-fr")).unwrap();
        assert_eq!(voice.name, "Thomas");
    }

    #[test]
    fn no_match_leaves_engine_default() {
        let voices = catalog();
        assert!(resolve_voice(&voices, Some("Nobody"), Some("ja-JP")).is_none());
        assert!(resolve_voice(&voices, None, None).is_none());
        assert!(resolve_voice(&[], Some("Anna"), Some("de-DE")).is_none());
    }

    #[test]
    fn maps_language_codes_to_locales() {
        assert_eq!(locale_for("de"), Some("de-DE"));
        assert_eq!(locale_for("es"), Some("es-ES"));
        assert_eq!(locale_for("xx"), None);
    }

    #[test]
    fn filters_and_groups_voices() {
        let voices = catalog();
        let french: Vec<&str> = voices_for_language(&voices, "FR")
            .iter()
            .map(|v| v.name.as_str())
            .collect();
        assert_eq!(french, vec!["Amélie", "Thomas"]);

        let groups = group_by_language(&voices);
        assert_eq!(
            groups.keys().copied().collect::<Vec<_>>(),
            vec!["de-DE", "en-US", "fr-CA", "fr-FR"]
        );
    }
}
