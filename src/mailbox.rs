//! Mailbox capability used by the engine, plus a JSON-backed local store

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{ClassifierError, Result};
use crate::models::{CategoryColor, CategoryInfo, MessageRecord};
use crate::template::eq_ignore_case;

/// Narrow view of a mail store: enumerate, persist, and manage category definitions
#[async_trait]
pub trait Mailbox: Send + Sync {
    /// Unread messages in `folder`, in store order
    async fn unread_messages(&self, folder: &str) -> Result<Vec<MessageRecord>>;

    /// Persist the classification fields of a message
    async fn save_message(&self, message: &MessageRecord) -> Result<()>;

    async fn list_categories(&self) -> Result<Vec<CategoryInfo>>;

    async fn create_category(&self, name: &str, color: CategoryColor) -> Result<()>;
}

/// On-disk layout of a local mailbox file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MailboxDocument {
    #[serde(default)]
    pub messages: Vec<MessageRecord>,
    #[serde(default)]
    pub categories: Vec<CategoryInfo>,
}

/// Mailbox held in memory and optionally mirrored to a JSON file after every write
pub struct LocalMailbox {
    path: Option<PathBuf>,
    document: Mutex<MailboxDocument>,
}

impl LocalMailbox {
    pub fn in_memory(messages: Vec<MessageRecord>) -> Self {
        Self {
            path: None,
            document: Mutex::new(MailboxDocument {
                messages,
                categories: Vec::new(),
            }),
        }
    }

    pub async fn open(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(ClassifierError::MailboxError(format!(
                "Mailbox file not found: {}",
                path.display()
            )));
        }

        let content = tokio::fs::read_to_string(path).await?;
        let document: MailboxDocument = serde_json::from_str(&content)?;
        info!(
            "Loaded mailbox {:?} ({} messages, {} categories)",
            path,
            document.messages.len(),
            document.categories.len()
        );

        Ok(Self {
            path: Some(path.to_path_buf()),
            document: Mutex::new(document),
        })
    }

    pub async fn messages(&self) -> Vec<MessageRecord> {
        self.document.lock().await.messages.clone()
    }

    pub async fn message(&self, id: &str) -> Option<MessageRecord> {
        self.document
            .lock()
            .await
            .messages
            .iter()
            .find(|m| m.id == id)
            .cloned()
    }

    async fn persist(&self, document: &MailboxDocument) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_string_pretty(document)?;
        tokio::fs::write(path, json).await?;
        debug!("Saved mailbox to {:?}", path);
        Ok(())
    }
}

#[async_trait]
impl Mailbox for LocalMailbox {
    async fn unread_messages(&self, folder: &str) -> Result<Vec<MessageRecord>> {
        let document = self.document.lock().await;
        Ok(document
            .messages
            .iter()
            .filter(|m| m.unread && eq_ignore_case(&m.folder, folder))
            .cloned()
            .collect())
    }

    async fn save_message(&self, message: &MessageRecord) -> Result<()> {
        let mut document = self.document.lock().await;
        let slot = document
            .messages
            .iter_mut()
            .find(|m| m.id == message.id)
            .ok_or_else(|| ClassifierError::MessageNotFound(message.id.clone()))?;
        *slot = message.clone();
        self.persist(&document).await
    }

    async fn list_categories(&self) -> Result<Vec<CategoryInfo>> {
        Ok(self.document.lock().await.categories.clone())
    }

    async fn create_category(&self, name: &str, color: CategoryColor) -> Result<()> {
        let mut document = self.document.lock().await;
        if document
            .categories
            .iter()
            .any(|c| eq_ignore_case(&c.name, name))
        {
            return Ok(());
        }
        document.categories.push(CategoryInfo {
            name: name.to_string(),
            color,
        });
        debug!("Created category '{}' ({})", name, color);
        self.persist(&document).await
    }
}
