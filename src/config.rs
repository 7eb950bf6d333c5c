use regex::RegexBuilder;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use crate::error::{ClassifierError, Result};

/// Fallback request timeout when neither the rate-limit nor the API section sets one
pub const FALLBACK_REQUEST_TIMEOUT_SECS: u64 = 45;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub mailbox: MailboxConfig,
    #[serde(default)]
    pub classification: ClassificationConfig,
    #[serde(default)]
    pub rules: RulesConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub rate_limiting: RateLimitConfig,
    #[serde(default)]
    pub retry: RetryConfig,
    #[serde(default)]
    pub content: ContentConfig,
    #[serde(default)]
    pub api_response: ApiResponseConfig,
    #[serde(default)]
    pub progress: ProgressConfig,
    #[serde(default)]
    pub messages: MessageTemplates,
}

/// Classification endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default = "default_message_role")]
    pub message_role: String,
    #[serde(default = "default_response_content_path")]
    pub response_content_path: String,
    /// Header templates; `{API_KEY}` is substituted
    #[serde(default = "default_headers")]
    pub headers: BTreeMap<String, String>,
    /// Request body template; string values support `{MODEL_NAME}`, `{PROMPT}`, `{MESSAGES}`
    #[serde(default = "default_parameters")]
    pub parameters: BTreeMap<String, serde_json::Value>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            api_key: String::new(),
            model_name: default_model_name(),
            timeout_secs: None,
            message_role: default_message_role(),
            response_content_path: default_response_content_path(),
            headers: default_headers(),
            parameters: default_parameters(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailboxConfig {
    #[serde(default = "default_folder")]
    pub folder: String,
}

impl Default for MailboxConfig {
    fn default() -> Self {
        Self {
            folder: default_folder(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationConfig {
    #[serde(default = "default_prompt")]
    pub prompt: String,
    /// The closed set of classification keys, in declaration order
    #[serde(default = "default_categories")]
    pub categories: Vec<CategoryDefinition>,
}

impl Default for ClassificationConfig {
    fn default() -> Self {
        Self {
            prompt: default_prompt(),
            categories: default_categories(),
        }
    }
}

/// Visual treatment for one classification key
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryDefinition {
    pub key: String,
    #[serde(default)]
    pub category_prefix: String,
    #[serde(default)]
    pub importance: String,
    #[serde(default)]
    pub flag_icon: String,
    #[serde(default)]
    pub flag_request: String,
    #[serde(default)]
    pub subject_prefix: String,
    #[serde(default)]
    pub category_color: String,
}

impl CategoryDefinition {
    /// Name of the mailbox category this key maps to
    pub fn category_name(&self) -> &str {
        if self.category_prefix.is_empty() {
            &self.key
        } else {
            &self.category_prefix
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RulesConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, rename = "rule")]
    pub rules: Vec<ClassificationRule>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassificationRule {
    #[serde(default)]
    pub name: String,
    pub classification: String,
    #[serde(default = "default_rule_priority")]
    pub priority: i32,
    #[serde(default)]
    pub conditions: RuleConditions,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct RuleConditions {
    #[serde(default)]
    pub match_type: MatchType,
    #[serde(default)]
    pub subject_keywords: Vec<String>,
    #[serde(default)]
    pub sender_domains: Vec<String>,
    #[serde(default)]
    pub sender_addresses: Vec<String>,
    #[serde(default)]
    pub body_keywords: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(try_from = "String", into = "String")]
pub enum MatchType {
    #[default]
    Any,
    All,
}

impl TryFrom<String> for MatchType {
    type Error = String;

    fn try_from(value: String) -> std::result::Result<Self, Self::Error> {
        match value.trim().to_uppercase().as_str() {
            "ANY" | "" => Ok(MatchType::Any),
            "ALL" => Ok(MatchType::All),
            other => Err(format!(
                "Invalid match_type: '{}'. Must be 'ANY' or 'ALL'",
                other
            )),
        }
    }
}

impl From<MatchType> for String {
    fn from(value: MatchType) -> Self {
        match value {
            MatchType::Any => "ANY".to_string(),
            MatchType::All => "ALL".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_true")]
    pub use_ai_for_unmatched: bool,
    #[serde(default)]
    pub dynamic_prompts: DynamicPromptConfig,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            use_ai_for_unmatched: true,
            dynamic_prompts: DynamicPromptConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DynamicPromptConfig {
    /// Render the category-aware template instead of the static prompt
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub template: Option<String>,
    #[serde(default)]
    pub category_descriptions: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// 0 disables the per-minute cap
    #[serde(default = "default_requests_per_minute")]
    pub requests_per_minute: u32,
    #[serde(default = "default_min_delay_ms")]
    pub min_delay_between_requests_ms: u64,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
    #[serde(default = "default_base_cooldown_secs")]
    pub base_cooldown_secs: u64,
    #[serde(default = "default_max_cooldown_minutes")]
    pub max_cooldown_minutes: u64,
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_minute: default_requests_per_minute(),
            min_delay_between_requests_ms: default_min_delay_ms(),
            request_timeout_secs: None,
            base_cooldown_secs: default_base_cooldown_secs(),
            max_cooldown_minutes: default_max_cooldown_minutes(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    #[serde(default = "default_fallback_order")]
    pub fallback_order: Vec<String>,
    #[serde(default)]
    pub backoff: BackoffConfig,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            fallback_order: default_fallback_order(),
            backoff: BackoffConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackoffConfig {
    #[serde(default = "default_timeout_retry_base")]
    pub timeout_retry_base_secs: u64,
    /// Falls back to `rate_limiting.base_cooldown_secs` when unset
    #[serde(default)]
    pub error_retry_base_secs: Option<u64>,
    #[serde(default = "default_exponential_base")]
    pub exponential_base: u32,
    #[serde(default = "default_extended_cooldown_factor")]
    pub extended_cooldown_factor: u64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            timeout_retry_base_secs: default_timeout_retry_base(),
            error_retry_base_secs: None,
            exponential_base: default_exponential_base(),
            extended_cooldown_factor: default_extended_cooldown_factor(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentConfig {
    /// Case-insensitive regexes for tags previously added to subjects
    #[serde(default = "default_ai_tag_patterns")]
    pub ai_tag_patterns: Vec<String>,
    #[serde(default = "default_fallback_content_template")]
    pub fallback_content_template: String,
    /// Categories containing any of these are treated as engine-owned
    #[serde(default)]
    pub classification_keywords: Vec<String>,
    #[serde(default)]
    pub separators: Vec<String>,
    #[serde(default)]
    pub message_separators: Vec<String>,
    #[serde(default = "default_signature_prefixes")]
    pub signature_prefixes: Vec<String>,
    #[serde(default = "default_max_body_length")]
    pub max_body_length: usize,
    #[serde(default = "default_fallback_body_length")]
    pub fallback_body_length: usize,
    #[serde(default = "default_truncation_indicator")]
    pub truncation_indicator: String,
    #[serde(default = "default_no_subject")]
    pub no_subject: String,
    #[serde(default = "default_no_sender")]
    pub no_sender: String,
    #[serde(default = "default_no_body")]
    pub no_body: String,
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            ai_tag_patterns: default_ai_tag_patterns(),
            fallback_content_template: default_fallback_content_template(),
            classification_keywords: Vec::new(),
            separators: Vec::new(),
            message_separators: Vec::new(),
            signature_prefixes: default_signature_prefixes(),
            max_body_length: default_max_body_length(),
            fallback_body_length: default_fallback_body_length(),
            truncation_indicator: default_truncation_indicator(),
            no_subject: default_no_subject(),
            no_sender: default_no_sender(),
            no_body: default_no_body(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponseConfig {
    #[serde(default = "default_fallback_content_paths")]
    pub fallback_content_paths: Vec<String>,
    /// Uppercase phrases meaning the model saw no email content
    #[serde(default = "default_no_content_indicators")]
    pub no_content_indicators: Vec<String>,
    #[serde(default = "default_rate_limit_markers")]
    pub rate_limit_markers: Vec<String>,
}

impl Default for ApiResponseConfig {
    fn default() -> Self {
        Self {
            fallback_content_paths: default_fallback_content_paths(),
            no_content_indicators: default_no_content_indicators(),
            rate_limit_markers: default_rate_limit_markers(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressConfig {
    #[serde(default = "default_status_template")]
    pub status_template: String,
    #[serde(default = "default_cooldown_template")]
    pub cooldown_template: String,
    #[serde(default = "default_wait_template")]
    pub wait_template: String,
    #[serde(default = "default_percentage_template")]
    pub percentage_template: String,
    #[serde(default = "default_preview_length")]
    pub preview_length: usize,
    #[serde(default = "default_truncation_indicator")]
    pub truncation_indicator: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            status_template: default_status_template(),
            cooldown_template: default_cooldown_template(),
            wait_template: default_wait_template(),
            percentage_template: default_percentage_template(),
            preview_length: default_preview_length(),
            truncation_indicator: default_truncation_indicator(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageTemplates {
    #[serde(default = "default_no_unread")]
    pub no_unread: String,
    #[serde(default = "default_confirm")]
    pub confirm: String,
    #[serde(default = "default_completion_summary")]
    pub completion_summary: String,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self {
            no_unread: default_no_unread(),
            confirm: default_confirm(),
            completion_summary: default_completion_summary(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_endpoint() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_model_name() -> String {
    "gpt-4o-mini".to_string()
}

fn default_message_role() -> String {
    "user".to_string()
}

fn default_response_content_path() -> String {
    "choices[0].message.content".to_string()
}

fn default_headers() -> BTreeMap<String, String> {
    let mut headers = BTreeMap::new();
    headers.insert("Authorization".to_string(), "Bearer {API_KEY}".to_string());
    headers
}

fn default_parameters() -> BTreeMap<String, serde_json::Value> {
    let mut params = BTreeMap::new();
    params.insert("model".to_string(), serde_json::json!("{MODEL_NAME}"));
    params.insert("messages".to_string(), serde_json::json!("{MESSAGES}"));
    params.insert("temperature".to_string(), serde_json::json!(0.0));
    params.insert("stream".to_string(), serde_json::json!(false));
    params
}

fn default_folder() -> String {
    "Inbox".to_string()
}

fn default_prompt() -> String {
    "Classify the following email into exactly one of: URGENT, ACTION, FYI, PROMO.\n\
     Answer with the category name only.\n\n{EMAIL_CONTENT}"
        .to_string()
}

fn default_categories() -> Vec<CategoryDefinition> {
    vec![
        CategoryDefinition {
            key: "URGENT".to_string(),
            category_prefix: "AI: Urgent".to_string(),
            importance: "high".to_string(),
            flag_icon: "red".to_string(),
            flag_request: "Follow up".to_string(),
            subject_prefix: "[URGENT]".to_string(),
            category_color: "red".to_string(),
        },
        CategoryDefinition {
            key: "ACTION".to_string(),
            category_prefix: "AI: Action".to_string(),
            importance: "normal".to_string(),
            flag_icon: "yellow".to_string(),
            flag_request: "Action required".to_string(),
            subject_prefix: "[ACTION]".to_string(),
            category_color: "orange".to_string(),
        },
        CategoryDefinition {
            key: "FYI".to_string(),
            category_prefix: "AI: FYI".to_string(),
            importance: "normal".to_string(),
            flag_icon: "none".to_string(),
            flag_request: String::new(),
            subject_prefix: String::new(),
            category_color: "blue".to_string(),
        },
        CategoryDefinition {
            key: "PROMO".to_string(),
            category_prefix: "AI: Promo".to_string(),
            importance: "low".to_string(),
            flag_icon: "none".to_string(),
            flag_request: String::new(),
            subject_prefix: "[PROMO]".to_string(),
            category_color: "gray".to_string(),
        },
    ]
}

fn default_rule_priority() -> i32 {
    100
}

fn default_requests_per_minute() -> u32 {
    15
}

fn default_min_delay_ms() -> u64 {
    1500
}

fn default_base_cooldown_secs() -> u64 {
    10
}

fn default_max_cooldown_minutes() -> u64 {
    5
}

fn default_max_consecutive_failures() -> u32 {
    3
}

fn default_max_attempts() -> u32 {
    3
}

fn default_fallback_order() -> Vec<String> {
    vec!["FYI".to_string(), "ACTION".to_string()]
}

fn default_timeout_retry_base() -> u64 {
    5
}

fn default_exponential_base() -> u32 {
    2
}

fn default_extended_cooldown_factor() -> u64 {
    6
}

fn default_ai_tag_patterns() -> Vec<String> {
    vec![r"^\s*\[(URGENT|ACTION|FYI|PROMO)\]\s*".to_string()]
}

fn default_fallback_content_template() -> String {
    "Subject: {SUBJECT}".to_string()
}

fn default_signature_prefixes() -> Vec<String> {
    vec![
        "--".to_string(),
        "Best regards".to_string(),
        "Kind regards".to_string(),
        "Sent from my".to_string(),
    ]
}

fn default_max_body_length() -> usize {
    800
}

fn default_fallback_body_length() -> usize {
    200
}

fn default_truncation_indicator() -> String {
    "...".to_string()
}

fn default_no_subject() -> String {
    "[No Subject]".to_string()
}

fn default_no_sender() -> String {
    "[No Sender]".to_string()
}

fn default_no_body() -> String {
    "[No Body]".to_string()
}

fn default_fallback_content_paths() -> Vec<String> {
    vec![
        "choices[0].text".to_string(),
        "content[0].text".to_string(),
        "message.content".to_string(),
        "response".to_string(),
        "output".to_string(),
    ]
}

fn default_no_content_indicators() -> Vec<String> {
    vec![
        "NO EMAIL CONTENT".to_string(),
        "NO CONTENT PROVIDED".to_string(),
        "EMAIL CONTENT IS EMPTY".to_string(),
    ]
}

fn default_rate_limit_markers() -> Vec<String> {
    vec!["rate limit".to_string(), "too many requests".to_string()]
}

fn default_status_template() -> String {
    "{CURRENT}/{TOTAL}: {SUBJECT}".to_string()
}

fn default_cooldown_template() -> String {
    "  [Cooldown {TIME}]".to_string()
}

fn default_wait_template() -> String {
    "{REASON} - waiting {TIME}".to_string()
}

fn default_percentage_template() -> String {
    "{PERCENTAGE}%".to_string()
}

fn default_preview_length() -> usize {
    100
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_no_unread() -> String {
    "No unread emails found in {FOLDER}".to_string()
}

fn default_confirm() -> String {
    "Process {COUNT} unread emails in {FOLDER}?\n\nAI Classification: {AI_STATUS}\nRule-based Classification: {RULE_STATUS}".to_string()
}

fn default_completion_summary() -> String {
    "Classification complete.\n\nProcessed: {PROCESSED}\nSuccessful: {SUCCESS}\nFailed: {FAILED}"
        .to_string()
}

impl Config {
    pub async fn load(path: &Path) -> Result<Self> {
        // If file doesn't exist, return default config with warning
        if !path.exists() {
            tracing::warn!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| ClassifierError::ConfigError(format!("Failed to read config file: {}", e)))?;

        let config = Self::from_toml(&content)?;

        tracing::info!("Loaded configuration from {:?}", path);
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn save(&self, path: &Path) -> Result<()> {
        // Create parent directory if it doesn't exist
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                ClassifierError::ConfigError(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| ClassifierError::ConfigError(format!("Failed to serialize config: {}", e)))?;

        tokio::fs::write(path, content)
            .await
            .map_err(|e| ClassifierError::ConfigError(format!("Failed to write config file: {}", e)))?;

        tracing::info!("Saved configuration to {:?}", path);
        Ok(())
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.classification.prompt.trim().is_empty() {
            return Err(ClassifierError::ConfigError(
                "classification.prompt is missing".to_string(),
            ));
        }

        if self.classification.categories.is_empty() {
            return Err(ClassifierError::ConfigError(
                "classification.categories must define at least one class".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for category in &self.classification.categories {
            if category.key.trim().is_empty() {
                return Err(ClassifierError::ConfigError(
                    "classification.categories contains an empty key".to_string(),
                ));
            }
            if !seen.insert(category.key.as_str()) {
                return Err(ClassifierError::ConfigError(format!(
                    "Duplicate classification key: '{}'",
                    category.key
                )));
            }
        }

        // AI endpoint settings only matter when the AI path can run
        if self.ai.enabled {
            if self.api.endpoint.trim().is_empty() {
                return Err(ClassifierError::ConfigError(
                    "api.endpoint is missing".to_string(),
                ));
            }
            if self.api.model_name.trim().is_empty() {
                return Err(ClassifierError::ConfigError(
                    "api.model_name is missing".to_string(),
                ));
            }
        }

        for rule in &self.rules.rules {
            if !seen.contains(rule.classification.as_str()) {
                return Err(ClassifierError::ConfigError(format!(
                    "Rule '{}' uses unknown classification '{}'",
                    rule.name, rule.classification
                )));
            }
        }

        if self.retry.max_attempts == 0 {
            return Err(ClassifierError::ConfigError(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }

        if self.retry.backoff.exponential_base == 0 {
            return Err(ClassifierError::ConfigError(
                "retry.backoff.exponential_base must be greater than 0".to_string(),
            ));
        }

        if self.rate_limiting.max_consecutive_failures == 0 {
            return Err(ClassifierError::ConfigError(
                "rate_limiting.max_consecutive_failures must be greater than 0".to_string(),
            ));
        }

        for pattern in &self.content.ai_tag_patterns {
            RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| {
                    ClassifierError::ConfigError(format!(
                        "Invalid content.ai_tag_patterns entry '{}': {}",
                        pattern, e
                    ))
                })?;
        }

        tracing::debug!("Configuration validation passed");
        Ok(())
    }

    /// Create an example configuration file
    pub async fn create_example(path: &Path) -> Result<()> {
        let config = Self::default();
        config.save(path).await
    }

    /// Classification keys in declaration order
    pub fn classification_keys(&self) -> Vec<String> {
        self.classification
            .categories
            .iter()
            .map(|c| c.key.clone())
            .collect()
    }

    /// Look up the definition for a classification key
    pub fn category(&self, key: &str) -> Option<&CategoryDefinition> {
        self.classification.categories.iter().find(|c| c.key == key)
    }

    /// Per-request timeout: rate-limit section, then API section, then a fixed fallback
    pub fn request_timeout(&self) -> Duration {
        let secs = self
            .rate_limiting
            .request_timeout_secs
            .filter(|s| *s > 0)
            .or(self.api.timeout_secs.filter(|s| *s > 0))
            .unwrap_or(FALLBACK_REQUEST_TIMEOUT_SECS);
        Duration::from_secs(secs)
    }

    /// Base cooldown for rate-limit backoff; zero falls back to the default
    pub fn base_cooldown_secs(&self) -> u64 {
        positive_or(self.rate_limiting.base_cooldown_secs, default_base_cooldown_secs())
    }

    /// Upper bound on any single cooldown; zero falls back to the default
    pub fn max_cooldown(&self) -> Duration {
        let minutes = positive_or(
            self.rate_limiting.max_cooldown_minutes,
            default_max_cooldown_minutes(),
        );
        Duration::from_secs(minutes.saturating_mul(60))
    }

    pub fn timeout_retry_base_secs(&self) -> u64 {
        positive_or(
            self.retry.backoff.timeout_retry_base_secs,
            default_timeout_retry_base(),
        )
    }

    pub fn extended_cooldown_factor(&self) -> u64 {
        positive_or(
            self.retry.backoff.extended_cooldown_factor,
            default_extended_cooldown_factor(),
        )
    }

    /// Base for generic error backoff, defaulting to the rate-limit base cooldown
    pub fn error_retry_base_secs(&self) -> u64 {
        self.retry
            .backoff
            .error_retry_base_secs
            .filter(|s| *s > 0)
            .unwrap_or_else(|| self.base_cooldown_secs())
    }
}

fn positive_or(value: u64, default: u64) -> u64 {
    if value > 0 {
        value
    } else {
        default
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.rate_limiting.requests_per_minute, 15);
        assert_eq!(config.rate_limiting.min_delay_between_requests_ms, 1500);
        assert_eq!(config.rate_limiting.base_cooldown_secs, 10);
        assert_eq!(config.rate_limiting.max_cooldown_minutes, 5);
        assert_eq!(config.rate_limiting.max_consecutive_failures, 3);

        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.backoff.timeout_retry_base_secs, 5);
        assert_eq!(config.retry.backoff.exponential_base, 2);
        assert_eq!(config.retry.backoff.extended_cooldown_factor, 6);

        assert!(config.ai.enabled);
        assert!(config.ai.use_ai_for_unmatched);
        assert!(!config.rules.enabled);

        assert_eq!(
            config.classification_keys(),
            vec!["URGENT", "ACTION", "FYI", "PROMO"]
        );
    }

    #[test]
    fn test_config_validation_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation_empty_prompt() {
        let mut config = Config::default();
        config.classification.prompt = "   ".to_string();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("prompt"));
    }

    #[test]
    fn test_config_validation_no_categories() {
        let mut config = Config::default();
        config.classification.categories.clear();
        let result = config.validate();
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("at least one class"));
    }

    #[test]
    fn test_config_validation_duplicate_keys() {
        let mut config = Config::default();
        let dup = config.classification.categories[0].clone();
        config.classification.categories.push(dup);
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("Duplicate"));
    }

    #[test]
    fn test_config_validation_rule_unknown_key() {
        let mut config = Config::default();
        config.rules.rules.push(ClassificationRule {
            name: "finance".to_string(),
            classification: "FINANCE".to_string(),
            priority: 100,
            conditions: RuleConditions::default(),
        });
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("unknown classification"));
    }

    #[test]
    fn test_config_validation_bad_regex() {
        let mut config = Config::default();
        config.content.ai_tag_patterns = vec!["[unclosed".to_string()];
        let result = config.validate();
        assert!(result.unwrap_err().to_string().contains("ai_tag_patterns"));
    }

    #[test]
    fn test_config_validation_zero_attempts() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_api_settings_ignored_when_ai_disabled() {
        let mut config = Config::default();
        config.api.endpoint = String::new();
        assert!(config.validate().is_err());

        config.ai.enabled = false;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_request_timeout_resolution() {
        let mut config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(45));

        config.api.timeout_secs = Some(30);
        assert_eq!(config.request_timeout(), Duration::from_secs(30));

        config.rate_limiting.request_timeout_secs = Some(12);
        assert_eq!(config.request_timeout(), Duration::from_secs(12));
    }

    #[test]
    fn test_error_retry_base_resolution() {
        let mut config = Config::default();
        config.rate_limiting.base_cooldown_secs = 7;
        assert_eq!(config.error_retry_base_secs(), 7);

        config.retry.backoff.error_retry_base_secs = Some(3);
        assert_eq!(config.error_retry_base_secs(), 3);
    }

    #[test]
    fn test_zero_cooldown_settings_fall_back_to_defaults() {
        let mut config = Config::default();
        config.rate_limiting.base_cooldown_secs = 0;
        config.rate_limiting.max_cooldown_minutes = 0;
        config.retry.backoff.timeout_retry_base_secs = 0;
        config.retry.backoff.extended_cooldown_factor = 0;
        config.retry.backoff.error_retry_base_secs = Some(0);

        assert_eq!(config.base_cooldown_secs(), 10);
        assert_eq!(config.max_cooldown(), Duration::from_secs(300));
        assert_eq!(config.timeout_retry_base_secs(), 5);
        assert_eq!(config.extended_cooldown_factor(), 6);
        assert_eq!(config.error_retry_base_secs(), 10);
    }

    #[test]
    fn test_parse_toml_with_rules() {
        let toml = r#"
            [classification]
            prompt = "Classify: {EMAIL_CONTENT}"

            [[classification.categories]]
            key = "FINANCE"
            category_prefix = "Finance"

            [[classification.categories]]
            key = "OTHER"

            [rules]
            enabled = true

            [[rules.rule]]
            name = "acme billing"
            classification = "FINANCE"
            [rules.rule.conditions]
            match_type = "all"
            sender_domains = ["acme.com"]
        "#;

        let config = Config::from_toml(toml).unwrap();
        assert_eq!(config.classification_keys(), vec!["FINANCE", "OTHER"]);
        assert!(config.rules.enabled);
        assert_eq!(config.rules.rules.len(), 1);
        assert_eq!(config.rules.rules[0].priority, 100);
        assert_eq!(config.rules.rules[0].conditions.match_type, MatchType::All);
        assert_eq!(config.category("FINANCE").unwrap().category_name(), "Finance");
        assert_eq!(config.category("OTHER").unwrap().category_name(), "OTHER");
    }

    #[test]
    fn test_parse_invalid_match_type() {
        let toml = r#"
            [[rules.rule]]
            classification = "FYI"
            [rules.rule.conditions]
            match_type = "SOME"
        "#;
        let result = Config::from_toml(toml);
        assert!(matches!(result, Err(ClassifierError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_save_and_load_round_trip() {
        let file = NamedTempFile::new().unwrap();
        let mut config = Config::default();
        config.rate_limiting.requests_per_minute = 42;
        config.api.timeout_secs = Some(20);

        config.save(file.path()).await.unwrap();
        let loaded = Config::load(file.path()).await.unwrap();

        assert_eq!(loaded.rate_limiting.requests_per_minute, 42);
        assert_eq!(loaded.api.timeout_secs, Some(20));
        assert_eq!(loaded.classification_keys(), config.classification_keys());
        assert_eq!(loaded.api.parameters.get("messages"), Some(&serde_json::json!("{MESSAGES}")));
    }

    #[tokio::test]
    async fn test_load_missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.toml")).await.unwrap();
        assert_eq!(config.retry.max_attempts, 3);
    }
}
