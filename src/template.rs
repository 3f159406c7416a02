//! Template engine for prompt variable substitution.
//!
//! Prompt templates reference context values with `{{name}}` placeholders.
//! Substitution is fail-safe: an absent key renders as a bracketed `[name]`
//! marker instead of erroring, so a half-filled context still produces a
//! usable prompt with visible gaps.
//!
//! Substitution happens in a single pass over the original text. Values are
//! never re-scanned, so a value that itself contains `{{...}}` cannot trigger
//! a second substitution. Literal braces that do not form a `{{word}}` token
//! pass through untouched; there is no escaping mechanism.

use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

/// Matches `{{name}}` placeholder tokens with word-character names.
fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{\{(\w+)\}\}").expect("valid template token pattern"))
}

/// Matches single-brace `{name}` tokens, the command-template flavor.
fn arg_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"\{(\w+)\}").expect("valid argument token pattern"))
}

/// Substitute `{{name}}` placeholders in `text` using `context`.
///
/// Every occurrence of a known key is replaced with its value; unknown keys
/// become `[name]`. Repeated occurrences and multiple distinct keys are all
/// handled in one sweep.
pub fn substitute(text: &str, context: &HashMap<String, String>) -> String {
    token_pattern()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            let key = &caps[1];
            match context.get(key) {
                Some(value) => value.clone(),
                None => format!("[{}]", key),
            }
        })
        .into_owned()
}

/// Substitute single-brace `{name}` placeholders, as used by command and
/// probe templates.
///
/// Unlike [`substitute`], unknown keys pass through untouched: a command
/// line may legitimately contain brace text that is not a placeholder, and
/// mangling it would corrupt the argv.
pub fn substitute_args(text: &str, context: &HashMap<String, String>) -> String {
    arg_pattern()
        .replace_all(text, |caps: &regex::Captures<'_>| {
            match context.get(&caps[1]) {
                Some(value) => value.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Helper to build a context map from key-value pairs.
pub fn context_from<I, K, V>(pairs: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: Into<String>,
    V: Into<String>,
{
    pairs
        .into_iter()
        .map(|(k, v)| (k.into(), v.into()))
        .collect()
}
