//! Writes a classification onto a message: importance, flag, categories and subject tag

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::{CategoryDefinition, Config};
use crate::error::{ClassifierError, Result};
use crate::extractor::SubjectCleaner;
use crate::mailbox::Mailbox;
use crate::models::{CategoryColor, FlagIcon, FlagStatus, Importance, MessageRecord};
use crate::template::eq_ignore_case;

/// Applies outcomes idempotently: re-applying the same key leaves the record unchanged
pub struct ClassificationApplicator {
    mailbox: Arc<dyn Mailbox>,
    definitions: Vec<CategoryDefinition>,
    /// Uppercase markers identifying categories owned by the engine
    owned_markers: Vec<String>,
    cleaner: SubjectCleaner,
    dry_run: bool,
}

impl ClassificationApplicator {
    pub fn new(config: &Config, mailbox: Arc<dyn Mailbox>) -> Result<Self> {
        let definitions = config.classification.categories.clone();

        let mut owned_markers: Vec<String> = config
            .content
            .classification_keywords
            .iter()
            .filter(|k| !k.trim().is_empty())
            .map(|k| k.to_uppercase())
            .collect();
        for definition in &definitions {
            if !definition.category_prefix.is_empty() {
                owned_markers.push(definition.category_prefix.to_uppercase());
            }
            owned_markers.push(definition.key.to_uppercase());
        }

        Ok(Self {
            mailbox,
            definitions,
            owned_markers,
            cleaner: SubjectCleaner::new(&config.content.ai_tag_patterns)?,
            dry_run: false,
        })
    }

    /// Compute changes but never persist them
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    fn definition(&self, key: &str) -> Option<&CategoryDefinition> {
        self.definitions.iter().find(|d| d.key == key)
    }

    /// Mutate `message` in place for `key` and persist it
    pub async fn apply(&self, message: &mut MessageRecord, key: &str) -> Result<()> {
        let definition = self
            .definition(key)
            .ok_or_else(|| ClassifierError::UnknownClassification(key.to_string()))?
            .clone();

        self.apply_visuals(message, &definition);

        if self.dry_run {
            debug!("Dry run: not saving message {}", message.id);
            return Ok(());
        }

        self.mailbox.save_message(message).await?;
        debug!("Applied '{}' to message {}", key, message.id);
        Ok(())
    }

    /// Pure part of `apply`: the record mutation without persistence
    pub fn apply_visuals(&self, message: &mut MessageRecord, definition: &CategoryDefinition) {
        message.importance = Importance::parse(&definition.importance);

        match FlagIcon::parse(&definition.flag_icon) {
            Some(icon) => {
                message.flag_status = FlagStatus::Marked;
                message.flag_icon = icon;
            }
            None => {
                message.flag_status = FlagStatus::NoFlag;
                message.flag_icon = FlagIcon::None;
            }
        }

        if !definition.flag_request.is_empty() {
            message.flag_request = definition.flag_request.clone();
        }

        message.categories = self.merge_categories(message, definition.category_name());

        if !definition.subject_prefix.trim().is_empty() {
            message.subject = self.tag_subject(&message.subject, &definition.subject_prefix);
        }
    }

    fn merge_categories(&self, message: &MessageRecord, category_name: &str) -> String {
        let mut kept: Vec<String> = Vec::new();
        for category in message.category_list() {
            let upper = category.to_uppercase();
            let owned = self
                .owned_markers
                .iter()
                .any(|marker| upper.contains(marker.as_str()));
            if !owned && !kept.iter().any(|k| eq_ignore_case(k, &category)) {
                kept.push(category);
            }
        }

        if !category_name.is_empty() && !kept.iter().any(|k| eq_ignore_case(k, category_name)) {
            kept.push(category_name.to_string());
        }

        kept.join(", ")
    }

    fn tag_subject(&self, subject: &str, prefix: &str) -> String {
        let cleaned = self.cleaner.clean(subject);
        if cleaned.to_lowercase().starts_with(&prefix.to_lowercase()) {
            cleaned
        } else {
            format!("{} {}", prefix, cleaned).trim().to_string()
        }
    }

    /// Create every configured category the mailbox does not have yet
    ///
    /// Failures are logged and skipped; a missing category does not stop a batch.
    pub async fn ensure_categories(&self) -> usize {
        let existing = match self.mailbox.list_categories().await {
            Ok(categories) => categories,
            Err(e) => {
                warn!("Could not list mailbox categories: {}", e);
                return 0;
            }
        };

        let mut created = 0;
        for definition in &self.definitions {
            let name = definition.category_name();
            if existing.iter().any(|c| eq_ignore_case(&c.name, name)) {
                continue;
            }
            if self.dry_run {
                debug!("Dry run: would create category '{}'", name);
                continue;
            }

            let color = CategoryColor::parse(&definition.category_color);
            match self.mailbox.create_category(name, color).await {
                Ok(()) => {
                    info!("Created category '{}'", name);
                    created += 1;
                }
                Err(e) => warn!("Failed to create category '{}': {}", name, e),
            }
        }
        created
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mailbox::LocalMailbox;

    fn setup(messages: Vec<MessageRecord>) -> (Arc<LocalMailbox>, ClassificationApplicator) {
        let mailbox = Arc::new(LocalMailbox::in_memory(messages));
        let applicator = ClassificationApplicator::new(&Config::default(), mailbox.clone()).unwrap();
        (mailbox, applicator)
    }

    #[tokio::test]
    async fn test_apply_urgent() {
        let message = MessageRecord::new("1", "Server down", "ops@x.com", "help");
        let (mailbox, applicator) = setup(vec![message.clone()]);

        let mut message = message;
        applicator.apply(&mut message, "URGENT").await.unwrap();

        let saved = mailbox.message("1").await.unwrap();
        assert_eq!(saved.subject, "[URGENT] Server down");
        assert_eq!(saved.categories, "AI: Urgent");
        assert_eq!(saved.importance, Importance::High);
        assert_eq!(saved.flag_status, FlagStatus::Marked);
        assert_eq!(saved.flag_icon, FlagIcon::Red);
        assert_eq!(saved.flag_request, "Follow up");
    }

    #[tokio::test]
    async fn test_apply_is_idempotent() {
        let mut message = MessageRecord::new("1", "Server down", "ops@x.com", "help");
        message.categories = "Work".to_string();
        let (_mailbox, applicator) = setup(vec![message.clone()]);

        applicator.apply(&mut message, "URGENT").await.unwrap();
        let once = message.clone();
        applicator.apply(&mut message, "URGENT").await.unwrap();

        assert_eq!(message, once);
        assert_eq!(message.categories, "Work, AI: Urgent");
        assert_eq!(message.subject.matches("[URGENT]").count(), 1);
    }

    #[tokio::test]
    async fn test_reclassification_replaces_engine_category_and_tag() {
        let mut message = MessageRecord::new("1", "Sale today", "shop@x.com", "50% off");
        let (_mailbox, applicator) = setup(vec![message.clone()]);

        applicator.apply(&mut message, "URGENT").await.unwrap();
        applicator.apply(&mut message, "PROMO").await.unwrap();

        assert_eq!(message.categories, "AI: Promo");
        assert_eq!(message.subject, "[PROMO] Sale today");
        assert_eq!(message.importance, Importance::Low);
        assert_eq!(message.flag_status, FlagStatus::NoFlag);
        assert_eq!(message.flag_icon, FlagIcon::None);
    }

    #[tokio::test]
    async fn test_category_dedup_is_unicode_case_insensitive() {
        let mut message = MessageRecord::new("1", "Bill", "a@b.com", "due");
        message.categories = "Rechnungen Ü, rechnungen ü, ai: fyi".to_string();
        let (_mailbox, applicator) = setup(vec![message.clone()]);

        applicator.apply(&mut message, "FYI").await.unwrap();
        assert_eq!(message.categories, "Rechnungen Ü, AI: FYI");
    }

    #[tokio::test]
    async fn test_no_subject_prefix_leaves_subject() {
        let mut message = MessageRecord::new("1", "Minutes", "a@b.com", "notes");
        let (_mailbox, applicator) = setup(vec![message.clone()]);
        applicator.apply(&mut message, "FYI").await.unwrap();
        assert_eq!(message.subject, "Minutes");
        assert_eq!(message.categories, "AI: FYI");
    }

    #[tokio::test]
    async fn test_unknown_key_is_rejected() {
        let mut message = MessageRecord::new("1", "x", "a@b.com", "y");
        let (_mailbox, applicator) = setup(vec![message.clone()]);
        let result = applicator.apply(&mut message, "NOPE").await;
        assert!(matches!(result, Err(ClassifierError::UnknownClassification(_))));
    }

    #[tokio::test]
    async fn test_dry_run_does_not_persist() {
        let message = MessageRecord::new("1", "Server down", "ops@x.com", "help");
        let mailbox = Arc::new(LocalMailbox::in_memory(vec![message.clone()]));
        let applicator = ClassificationApplicator::new(&Config::default(), mailbox.clone())
            .unwrap()
            .with_dry_run(true);

        let mut working = message.clone();
        applicator.apply(&mut working, "URGENT").await.unwrap();
        assert_eq!(working.subject, "[URGENT] Server down");
        assert_eq!(mailbox.message("1").await.unwrap(), message);
    }

    #[tokio::test]
    async fn test_ensure_categories() {
        let (mailbox, applicator) = setup(vec![]);
        mailbox
            .create_category("ai: fyi", CategoryColor::Green)
            .await
            .unwrap();

        let created = applicator.ensure_categories().await;
        assert_eq!(created, 3);

        let names: Vec<String> = mailbox
            .list_categories()
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.name)
            .collect();
        assert_eq!(names, vec!["ai: fyi", "AI: Urgent", "AI: Action", "AI: Promo"]);
        assert_eq!(applicator.ensure_categories().await, 0);
    }
}
