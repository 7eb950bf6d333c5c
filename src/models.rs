use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// A message as held by the mailbox store
///
/// Only the applicator mutates the visual fields; everything else is read-only
/// from the engine's point of view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessageRecord {
    pub id: String,
    #[serde(default = "default_folder")]
    pub folder: String,
    #[serde(default = "default_unread")]
    pub unread: bool,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub sender: String,
    #[serde(default)]
    pub body: String,
    /// Comma-joined category names
    #[serde(default)]
    pub categories: String,
    #[serde(default)]
    pub importance: Importance,
    #[serde(default)]
    pub flag_status: FlagStatus,
    #[serde(default)]
    pub flag_icon: FlagIcon,
    #[serde(default)]
    pub flag_request: String,
}

fn default_folder() -> String {
    "Inbox".to_string()
}

fn default_unread() -> bool {
    true
}

impl MessageRecord {
    pub fn new(id: &str, subject: &str, sender: &str, body: &str) -> Self {
        Self {
            id: id.to_string(),
            folder: default_folder(),
            unread: true,
            subject: subject.to_string(),
            sender: sender.to_string(),
            body: body.to_string(),
            categories: String::new(),
            importance: Importance::Normal,
            flag_status: FlagStatus::NoFlag,
            flag_icon: FlagIcon::None,
            flag_request: String::new(),
        }
    }

    /// Split the comma-joined category string into trimmed, non-empty names
    pub fn category_list(&self) -> Vec<String> {
        self.categories
            .split(',')
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .map(|c| c.to_string())
            .collect()
    }
}

/// Canonical text used for rule matching and prompting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub subject: String,
    pub sender: String,
    pub body: String,
}

/// How a classification was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutcomeSource {
    Rule,
    Ai,
    Default,
}

/// Result of classifying one message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationOutcome {
    pub success: bool,
    pub classification_key: String,
    pub source: OutcomeSource,
}

impl ClassificationOutcome {
    pub fn from_rule(key: impl Into<String>) -> Self {
        Self {
            success: true,
            classification_key: key.into(),
            source: OutcomeSource::Rule,
        }
    }

    pub fn from_ai(key: impl Into<String>) -> Self {
        Self {
            success: true,
            classification_key: key.into(),
            source: OutcomeSource::Ai,
        }
    }

    pub fn fallback(key: impl Into<String>) -> Self {
        Self {
            success: false,
            classification_key: key.into(),
            source: OutcomeSource::Default,
        }
    }
}

/// A progress update for whatever presentation layer drives the batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressEvent {
    pub status: String,
    /// `None` marks a wait-only update that should not move the progress bar
    pub current: Option<usize>,
    pub total: usize,
}

impl ProgressEvent {
    pub fn step(status: impl Into<String>, current: usize, total: usize) -> Self {
        Self {
            status: status.into(),
            current: Some(current),
            total,
        }
    }

    pub fn waiting(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            current: None,
            total: 0,
        }
    }
}

/// Progress sink, callable from any thread
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Category as known to the mailbox store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CategoryInfo {
    pub name: String,
    #[serde(default)]
    pub color: CategoryColor,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum Importance {
    Low,
    #[default]
    Normal,
    High,
}

impl Importance {
    /// Parse a configured importance, accepting Outlook-style names and common synonyms
    ///
    /// Unknown or empty values map to `Normal`.
    pub fn parse(value: &str) -> Self {
        let t = strip_ol_prefix(value, "olimportance");
        match t.as_str() {
            "high" => Importance::High,
            "low" => Importance::Low,
            _ => Importance::Normal,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum FlagStatus {
    #[default]
    NoFlag,
    Marked,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum FlagIcon {
    #[default]
    None,
    Purple,
    Orange,
    Green,
    Yellow,
    Blue,
    Red,
}

impl FlagIcon {
    /// Parse a configured flag icon
    ///
    /// Returns `None` when no flag should be shown (empty, "none", "off", or unrecognized).
    pub fn parse(value: &str) -> Option<Self> {
        let t = strip_ol_prefix(value, "ol");
        let t = t.strip_suffix("flagicon").unwrap_or(&t);
        let icon = match t {
            "red" => FlagIcon::Red,
            "yellow" => FlagIcon::Yellow,
            "blue" => FlagIcon::Blue,
            "green" => FlagIcon::Green,
            "orange" => FlagIcon::Orange,
            "purple" => FlagIcon::Purple,
            _ => FlagIcon::None,
        };
        if icon == FlagIcon::None {
            None
        } else {
            Some(icon)
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum CategoryColor {
    #[default]
    None,
    Red,
    Orange,
    Yellow,
    Green,
    Teal,
    Blue,
    Purple,
    DarkGray,
}

impl CategoryColor {
    pub fn parse(value: &str) -> Self {
        let t = strip_ol_prefix(value, "olcategorycolor");
        match t.as_str() {
            "red" => CategoryColor::Red,
            "orange" => CategoryColor::Orange,
            "yellow" => CategoryColor::Yellow,
            "green" => CategoryColor::Green,
            "teal" => CategoryColor::Teal,
            "blue" => CategoryColor::Blue,
            "purple" => CategoryColor::Purple,
            "gray" | "grey" | "darkgray" | "darkgrey" => CategoryColor::DarkGray,
            _ => CategoryColor::None,
        }
    }
}

impl fmt::Display for CategoryColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Lowercase and trim, then drop an Outlook enum prefix such as `olImportance`
fn strip_ol_prefix(value: &str, prefix: &str) -> String {
    let t = value.trim().to_lowercase();
    match t.strip_prefix(prefix) {
        Some(rest) if !rest.is_empty() => rest.to_string(),
        _ => t,
    }
}
