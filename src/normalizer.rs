//! Maps free-form model output onto the closed set of classification keys

use crate::config::Config;
use tracing::debug;

/// Used only when no classification keys are configured at all
pub const LAST_RESORT_KEY: &str = "DEFAULT";

#[derive(Debug, Clone)]
pub struct ResponseNormalizer {
    keys: Vec<String>,
    no_content_indicators: Vec<String>,
    default_key: String,
}

impl ResponseNormalizer {
    pub fn new(config: &Config) -> Self {
        let keys = config.classification_keys();
        let default_key = resolve_default(&config.retry.fallback_order, &keys);
        Self {
            no_content_indicators: config
                .api_response
                .no_content_indicators
                .iter()
                .filter(|i| !i.trim().is_empty())
                .map(|i| i.to_uppercase())
                .collect(),
            keys,
            default_key,
        }
    }

    pub fn default_key(&self) -> &str {
        &self.default_key
    }

    pub fn is_valid_key(&self, key: &str) -> bool {
        self.keys.iter().any(|k| k == key)
    }

    /// Return a configured key for `raw`, falling back to the default classification
    pub fn normalize(&self, raw: &str) -> String {
        let text = raw.trim().to_uppercase();
        if text.is_empty() {
            return self.default_key.clone();
        }

        if self
            .no_content_indicators
            .iter()
            .any(|indicator| text.contains(indicator.as_str()))
        {
            debug!("Model reported missing email content: '{}'", text);
            return self.default_key.clone();
        }

        if let Some(key) = self.keys.iter().find(|k| k.to_uppercase() == text) {
            debug!("Exact classification match: '{}'", key);
            return key.clone();
        }

        if let Some(key) = self
            .keys
            .iter()
            .find(|k| text.contains(k.to_uppercase().as_str()))
        {
            debug!("Substring classification match: '{}' in '{}'", key, text);
            return key.clone();
        }

        debug!(
            "No classification key in '{}', using default '{}'",
            text, self.default_key
        );
        self.default_key.clone()
    }
}

/// First fallback entry that is a configured key, else the first configured key
pub fn resolve_default(fallback_order: &[String], keys: &[String]) -> String {
    fallback_order
        .iter()
        .find(|candidate| keys.contains(candidate))
        .or_else(|| keys.first())
        .cloned()
        .unwrap_or_else(|| LAST_RESORT_KEY.to_string())
}
