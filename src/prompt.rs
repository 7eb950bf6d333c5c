//! Classification prompt rendering

use crate::config::{Config, ContentConfig};
use crate::models::ExtractedContent;
use crate::template::format_template;
use std::collections::HashMap;

/// Renders static or category-aware prompts from extracted content
#[derive(Debug, Clone)]
pub struct PromptBuilder {
    base_prompt: String,
    dynamic: Option<DynamicPrompt>,
    no_subject: String,
    no_sender: String,
    no_body: String,
}

#[derive(Debug, Clone)]
struct DynamicPrompt {
    template: String,
    available_categories: String,
    category_descriptions: String,
}

impl PromptBuilder {
    pub fn new(config: &Config) -> Self {
        let dynamic_config = &config.ai.dynamic_prompts;
        let dynamic = if dynamic_config.enabled {
            let keys = config.classification_keys();
            Some(DynamicPrompt {
                template: dynamic_config
                    .template
                    .clone()
                    .filter(|t| !t.trim().is_empty())
                    .unwrap_or_else(|| config.classification.prompt.clone()),
                available_categories: keys.join(", "),
                category_descriptions: describe_categories(
                    &keys,
                    &dynamic_config.category_descriptions,
                ),
            })
        } else {
            None
        };

        let ContentConfig {
            no_subject,
            no_sender,
            no_body,
            ..
        } = &config.content;

        Self {
            base_prompt: config.classification.prompt.clone(),
            dynamic,
            no_subject: no_subject.clone(),
            no_sender: no_sender.clone(),
            no_body: no_body.clone(),
        }
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic.is_some()
    }

    pub fn build(&self, content: &ExtractedContent) -> String {
        let subject = or_default(&content.subject, &self.no_subject);
        let sender = or_default(&content.sender, &self.no_sender);
        let body = or_default(&content.body, &self.no_body);
        let email_content = format!("Subject: {}\nSender: {}\nContent: {}", subject, sender, body);

        let (template, categories, descriptions) = match &self.dynamic {
            Some(d) => (
                d.template.as_str(),
                Some(d.available_categories.as_str()),
                Some(d.category_descriptions.as_str()),
            ),
            None => (self.base_prompt.as_str(), None, None),
        };

        let mut values: Vec<(&str, &str)> = Vec::with_capacity(8);
        if let (Some(categories), Some(descriptions)) = (categories, descriptions) {
            values.push(("{AVAILABLE_CATEGORIES}", categories));
            values.push(("{CATEGORY_DESCRIPTIONS}", descriptions));
        }
        values.extend([
            ("{EMAIL_CONTENT}", email_content.as_str()),
            ("{CONTENT}", email_content.as_str()),
            ("{EMAIL}", email_content.as_str()),
            ("{SUBJECT}", subject),
            ("{SENDER}", sender),
            ("{BODY}", body),
        ]);

        format_template(template, &values)
    }
}

fn or_default<'a>(value: &'a str, default: &'a str) -> &'a str {
    if value.trim().is_empty() {
        default
    } else {
        value
    }
}

/// One `- KEY: description` line per key, in key order
fn describe_categories(keys: &[String], descriptions: &HashMap<String, String>) -> String {
    keys.iter()
        .map(|key| match descriptions.get(key).filter(|d| !d.trim().is_empty()) {
            Some(desc) => format!("- {}: {}", key, desc),
            None => format!("- {}: {} emails", key, key),
        })
        .collect::<Vec<_>>()
        .join("\n")
}
