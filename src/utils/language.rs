use once_cell::sync::Lazy;
use regex::Regex;
use whatlang::{detect, Script};

const MIN_ALPHA_CHARS: usize = 2;
const LATIN_CONFIDENCE_THRESHOLD: f64 = 0.68;
const NON_LATIN_CONFIDENCE_THRESHOLD: f64 = 0.5;

static URL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://\S+|www\.\S+").expect("valid url regex"));
static COMMAND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(^|\s)/[a-z0-9_@]+").expect("valid command regex"));
static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("valid whitespace regex"));

fn normalize_prompt_for_detection(text: &str) -> String {
    let without_urls = URL_RE.replace_all(text, " ");
    let without_commands = COMMAND_RE.replace_all(&without_urls, " ");
    WHITESPACE_RE
        .replace_all(&without_commands, " ")
        .trim()
        .to_string()
}

fn alphabetic_char_count(text: &str) -> usize {
    text.chars().filter(|ch| ch.is_alphabetic()).count()
}

/// Best-effort guess at the language a prompt is written in. Short or
/// low-confidence prompts yield `None`.
pub fn detect_prompt_language(text: &str) -> Option<String> {
    let normalized = normalize_prompt_for_detection(text);
    if normalized.is_empty() || alphabetic_char_count(&normalized) < MIN_ALPHA_CHARS {
        return None;
    }

    let info = detect(&normalized)?;
    if info.is_reliable() {
        return Some(info.lang().eng_name().to_string());
    }

    let threshold = match info.script() {
        Script::Latin => LATIN_CONFIDENCE_THRESHOLD,
        _ => NON_LATIN_CONFIDENCE_THRESHOLD,
    };
    if info.confidence() >= threshold {
        return Some(info.lang().eng_name().to_string());
    }

    None
}

fn language_name_from_ietf_tag(language_code: &str) -> Option<&'static str> {
    let primary = language_code.split('-').next()?.trim().to_lowercase();
    match primary.as_str() {
        "en" => Some("English"),
        "ru" => Some("Russian"),
        "uk" => Some("Ukrainian"),
        "zh" => Some("Chinese"),
        "ja" => Some("Japanese"),
        "ko" => Some("Korean"),
        "es" => Some("Spanish"),
        "pt" => Some("Portuguese"),
        "it" => Some("Italian"),
        "fr" => Some("French"),
        "de" => Some("German"),
        "ar" => Some("Arabic"),
        "tr" => Some("Turkish"),
        "pl" => Some("Polish"),
        _ => None,
    }
}

/// Language hint for the translator: detection first, then the sender's
/// Telegram client language, then `None` when nothing is reliable.
pub fn prompt_language_hint(prompt: &str, user_language_code: Option<&str>) -> Option<String> {
    if let Some(language) = detect_prompt_language(prompt) {
        return Some(language);
    }

    user_language_code
        .and_then(language_name_from_ietf_tag)
        .map(|language| language.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_russian_prompts() {
        let hint =
            prompt_language_hint("нарисуй пожалуйста большого рыжего кота в сапогах на крыше", None);
        assert_eq!(hint.as_deref(), Some("Russian"));
    }

    #[test]
    fn falls_back_to_client_language_for_short_prompts() {
        let hint = prompt_language_hint("👍", Some("ru"));
        assert_eq!(hint.as_deref(), Some("Russian"));
    }

    #[test]
    fn yields_nothing_without_signal() {
        assert_eq!(prompt_language_hint("12345", None), None);
    }

    #[test]
    fn strips_urls_and_commands_before_detection() {
        let normalized = normalize_prompt_for_detection("/img https://example.com un gato");
        assert_eq!(normalized, "un gato");
    }
}
