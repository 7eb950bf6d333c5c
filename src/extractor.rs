//! Turns a raw message into the canonical subject/sender/body used for matching and prompting

use crate::config::ContentConfig;
use crate::error::{ClassifierError, Result};
use crate::models::{ExtractedContent, MessageRecord};
use crate::template::{format_template, truncate_chars};
use once_cell::sync::Lazy;
use regex::{Regex, RegexBuilder};

/// Thread separators used when none are configured
static BUILTIN_SEPARATORS: Lazy<Vec<&'static str>> = Lazy::new(|| {
    vec![
        "-----Original Message-----",
        "From:",
        "On ",
        "________________________________",
    ]
});

/// Strips previously added subject tags
///
/// Shared by the extractor and the applicator so both agree on what a "clean" subject is.
#[derive(Debug, Clone)]
pub struct SubjectCleaner {
    patterns: Vec<Regex>,
}

impl SubjectCleaner {
    pub fn new(patterns: &[String]) -> Result<Self> {
        let patterns = patterns
            .iter()
            .filter(|p| !p.trim().is_empty())
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        ClassifierError::ConfigError(format!("Invalid AI tag pattern '{}': {}", p, e))
                    })
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { patterns })
    }

    pub fn clean(&self, subject: &str) -> String {
        if subject.trim().is_empty() {
            return subject.trim().to_string();
        }

        let mut cleaned = subject.to_string();
        for pattern in &self.patterns {
            cleaned = pattern.replace_all(&cleaned, "").into_owned();
        }
        cleaned.trim().to_string()
    }
}

#[derive(Debug, Clone)]
pub struct ContentExtractor {
    cleaner: SubjectCleaner,
    separators: Vec<Regex>,
    signature_prefixes: Vec<String>,
    fallback_template: String,
    max_body_length: usize,
    fallback_body_length: usize,
    truncation_indicator: String,
}

impl ContentExtractor {
    pub fn new(config: &ContentConfig) -> Result<Self> {
        let mut separator_texts: Vec<String> = config
            .separators
            .iter()
            .chain(config.message_separators.iter())
            .filter(|s| !s.trim().is_empty())
            .cloned()
            .collect();

        if separator_texts.is_empty() {
            separator_texts = BUILTIN_SEPARATORS.iter().map(|s| s.to_string()).collect();
        }

        let separators = separator_texts
            .iter()
            .map(|s| {
                RegexBuilder::new(&regex::escape(s))
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| ClassifierError::ConfigError(format!("Invalid separator '{}': {}", s, e)))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            cleaner: SubjectCleaner::new(&config.ai_tag_patterns)?,
            separators,
            signature_prefixes: config
                .signature_prefixes
                .iter()
                .filter(|p| !p.is_empty())
                .map(|p| p.to_lowercase())
                .collect(),
            fallback_template: config.fallback_content_template.clone(),
            max_body_length: if config.max_body_length > 0 {
                config.max_body_length
            } else {
                800
            },
            fallback_body_length: config.fallback_body_length,
            truncation_indicator: config.truncation_indicator.clone(),
        })
    }

    pub fn extract(&self, record: &MessageRecord) -> ExtractedContent {
        self.extract_parts(&record.subject, &record.sender, &record.body)
    }

    pub fn extract_parts(&self, subject: &str, sender: &str, body: &str) -> ExtractedContent {
        let subject = self.cleaner.clean(subject);

        let mut content = self.cut_at_separator(body);
        content = self.strip_signature(&content);

        if content.trim().is_empty() && !body.trim().is_empty() {
            content = truncate_chars(
                body.trim(),
                self.fallback_body_length,
                &self.truncation_indicator,
            );
        }

        if content.trim().is_empty() {
            content = format_template(&self.fallback_template, &[("{SUBJECT}", &subject)]);
        }

        let content = truncate_chars(&content, self.max_body_length, &self.truncation_indicator);

        ExtractedContent {
            subject: subject.trim().to_string(),
            sender: sender.trim().to_string(),
            body: content.trim().to_string(),
        }
    }

    /// Truncate at the earliest separator
    ///
    /// Only the first occurrence of each separator counts; a separator whose first
    /// occurrence opens the body is skipped entirely.
    fn cut_at_separator(&self, body: &str) -> String {
        let first = self
            .separators
            .iter()
            .filter_map(|re| re.find(body).map(|m| m.start()).filter(|&pos| pos > 0))
            .min();

        match first {
            Some(pos) => body[..pos].trim().to_string(),
            None => body.trim().to_string(),
        }
    }

    fn strip_signature(&self, body: &str) -> String {
        if self.signature_prefixes.is_empty() {
            return body.to_string();
        }

        let kept: Vec<&str> = body
            .lines()
            .take_while(|line| {
                let trimmed = line.trim().to_lowercase();
                !self
                    .signature_prefixes
                    .iter()
                    .any(|prefix| trimmed.starts_with(prefix.as_str()))
            })
            .collect();

        kept.join("\n").trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn extractor() -> ContentExtractor {
        ContentExtractor::new(&ContentConfig::default()).unwrap()
    }

    #[test]
    fn test_subject_tags_removed() {
        let content = extractor().extract_parts("[urgent] Server down", "ops@example.com", "Help");
        assert_eq!(content.subject, "Server down");
        assert_eq!(content.sender, "ops@example.com");
    }

    #[test]
    fn test_cut_at_earliest_separator() {
        let body = "Latest reply\n\nOn Monday Bob wrote:\n> old\n-----Original Message-----\nolder";
        let content = extractor().extract_parts("Re: plan", "a@b.com", body);
        assert_eq!(content.body, "Latest reply");
    }

    #[test]
    fn test_separator_at_start_does_not_truncate() {
        let content = extractor().extract_parts("Fwd", "a@b.com", "From: someone\nHello there");
        assert_eq!(content.body, "From: someone\nHello there");
    }

    #[test]
    fn test_configured_separators_replace_builtin() {
        let config = ContentConfig {
            separators: vec!["##".to_string()],
            ..ContentConfig::default()
        };
        let extractor = ContentExtractor::new(&config).unwrap();
        let content = extractor.extract_parts("s", "a@b.com", "Talk On Monday\n## history");
        assert_eq!(content.body, "Talk On Monday");
    }

    #[test]
    fn test_separator_at_start_then_again() {
        let body = "From: the desk of Alice\nLunch at noon?\nFrom: Bob\nearlier thread";
        let content = extractor().extract_parts("Lunch", "alice@example.com", body);
        assert_eq!(content.body, body);

        let body = "From: Alice\nLunch?\n-----Original Message-----\nolder";
        let content = extractor().extract_parts("Lunch", "alice@example.com", body);
        assert_eq!(content.body, "From: Alice\nLunch?");
    }

    #[test]
    fn test_signature_stripped() {
        let body = "Please review the draft.\nBest regards,\nAlice";
        let content = extractor().extract_parts("Draft", "alice@example.com", body);
        assert_eq!(content.body, "Please review the draft.");
    }

    #[test]
    fn test_signature_only_body_falls_back_to_original() {
        let body = "Best regards,\nAlice";
        let content = extractor().extract_parts("Hi", "alice@example.com", body);
        assert_eq!(content.body, "Best regards,\nAlice");
    }

    #[test]
    fn test_empty_body_uses_subject_template() {
        let content = extractor().extract_parts("[FYI] Quarterly numbers", "cfo@example.com", "   ");
        assert_eq!(content.body, "Subject: Quarterly numbers");
    }

    #[test]
    fn test_body_capped() {
        let config = ContentConfig {
            max_body_length: 10,
            ..ContentConfig::default()
        };
        let extractor = ContentExtractor::new(&config).unwrap();
        let content = extractor.extract_parts("s", "a@b.com", "abcdefghijklmnopqrstuvwxyz");
        assert_eq!(content.body, "abcdefghij...");
    }

    #[test]
    fn test_invalid_tag_pattern_is_config_error() {
        let result = SubjectCleaner::new(&["(".to_string()]);
        assert!(matches!(result, Err(ClassifierError::ConfigError(_))));
    }
}
