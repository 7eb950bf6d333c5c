//! Placeholder substitution and small text helpers shared by prompts and progress output

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use std::time::Duration;

static PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\{[A-Za-z0-9_]+\}").unwrap());

/// Replace `{KEY}` placeholders in `template` with the given values
///
/// Keys may be passed with or without braces. Placeholders with no value are left as-is.
/// Substitution is a single pass, so braces inside substituted values are never expanded.
pub fn format_template(template: &str, values: &[(&str, &str)]) -> String {
    if template.is_empty() {
        return String::new();
    }

    PLACEHOLDER
        .replace_all(template, |caps: &Captures| {
            let placeholder = &caps[0];
            let name = &placeholder[1..placeholder.len() - 1];
            values
                .iter()
                .find(|(key, _)| key.trim_start_matches('{').trim_end_matches('}') == name)
                .map(|(_, value)| value.to_string())
                .unwrap_or_else(|| placeholder.to_string())
        })
        .into_owned()
}

/// Unicode-aware case-insensitive equality, used for category and folder names
pub fn eq_ignore_case(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Cut `text` to at most `max_chars` characters, appending `indicator` when shortened
pub fn truncate_chars(text: &str, max_chars: usize, indicator: &str) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(max_chars).collect();
        out.push_str(indicator);
        out
    }
}

/// Render a wait duration as `mm:ss` (or `h:mm:ss` past an hour), rounding up partial seconds
pub fn format_duration(duration: Duration) -> String {
    let mut secs = duration.as_secs();
    if duration.subsec_nanos() > 0 {
        secs += 1;
    }

    let hours = secs / 3600;
    let minutes = (secs % 3600) / 60;
    let seconds = secs % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}
