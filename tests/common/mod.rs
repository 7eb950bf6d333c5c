//! Common test utilities and fixtures

#![allow(dead_code)]

use mail_classifier::config::{CategoryDefinition, ClassificationRule, Config, RuleConditions};
use mail_classifier::error::Result;
use mail_classifier::models::{CategoryColor, CategoryInfo, MessageRecord};
use mockall::mock;
use serde_json::json;

/// Create a test message in the Inbox with default values
pub fn create_test_message(id: &str, sender: &str, subject: &str) -> MessageRecord {
    MessageRecord::new(id, subject, sender, "Hello,\nplease see below.\n\nThanks")
}

/// Config with pacing turned off so tests only wait on backoff and cooldowns
pub fn fast_config() -> Config {
    let mut config = Config::default();
    config.api.api_key = "sk-test".to_string();
    config.rate_limiting.min_delay_between_requests_ms = 0;
    config.rate_limiting.requests_per_minute = 0;
    config
}

/// Add a FINANCE category plus a sender-domain rule for acme.com
pub fn with_finance_rule(mut config: Config) -> Config {
    config.classification.categories.push(CategoryDefinition {
        key: "FINANCE".to_string(),
        category_prefix: "AI: Finance".to_string(),
        importance: "normal".to_string(),
        flag_icon: "none".to_string(),
        flag_request: String::new(),
        subject_prefix: "[FIN]".to_string(),
        category_color: "green".to_string(),
    });
    config.rules.enabled = true;
    config.rules.rules.push(ClassificationRule {
        name: "acme billing".to_string(),
        classification: "FINANCE".to_string(),
        priority: 100,
        conditions: RuleConditions {
            sender_domains: vec!["acme.com".to_string()],
            ..Default::default()
        },
    });
    config
}

/// Chat-completions style response carrying `content`
pub fn chat_response(content: &str) -> serde_json::Value {
    json!({
        "id": "chatcmpl-test",
        "object": "chat.completion",
        "choices": [
            {
                "index": 0,
                "message": {"role": "assistant", "content": content},
                "finish_reason": "stop"
            }
        ]
    })
}

// Mock implementation of the classification endpoint
mock! {
    pub ClassificationApi {}

    #[async_trait::async_trait]
    impl mail_classifier::client::ClassificationApi for ClassificationApi {
        async fn classify(&self, prompt: &str) -> Result<String>;
    }
}

// Mock implementation of the mailbox store
mock! {
    pub Mailbox {}

    #[async_trait::async_trait]
    impl mail_classifier::mailbox::Mailbox for Mailbox {
        async fn unread_messages(&self, folder: &str) -> Result<Vec<MessageRecord>>;
        async fn save_message(&self, message: &MessageRecord) -> Result<()>;
        async fn list_categories(&self) -> Result<Vec<CategoryInfo>>;
        async fn create_category(&self, name: &str, color: CategoryColor) -> Result<()>;
    }
}
