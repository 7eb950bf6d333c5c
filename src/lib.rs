//! Mail Classifier
//!
//! Classifies unread email into a closed, user-defined set of categories. Cheap
//! local rules run first; unmatched messages go to a remote AI endpoint under a
//! strict request budget with adaptive backoff.
//!
//! # Overview
//!
//! - **Extraction**: strip earlier subject tags, quoted threads and signatures
//! - **Rules**: prioritized keyword/domain/address rules that skip the AI call
//! - **AI classification**: templated prompts, one non-streaming HTTP call per attempt
//! - **Normalization**: free-form model output mapped onto the configured keys
//! - **Pacing**: sliding-window request cap, minimum spacing, cooldowns
//! - **Application**: idempotent importance/flag/category/subject updates
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use mail_classifier::{BatchOrchestrator, Config, HttpClassificationClient, LocalMailbox};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml".as_ref()).await?;
//!     let mailbox = Arc::new(LocalMailbox::open("mailbox.json".as_ref()).await?);
//!     let api = Arc::new(HttpClassificationClient::from_config(&config)?);
//!
//!     let mut orchestrator = BatchOrchestrator::new(&config, mailbox, Some(api))?;
//!     let report = orchestrator.run(&config.mailbox.folder).await?;
//!     println!("{}", report.summary);
//!     Ok(())
//! }
//! ```
//!
//! # Module Organization
//!
//! - [`applicator`] - Writes outcomes onto message records
//! - [`backoff`] - Retry delays and extended cooldown policy
//! - [`batch`] - Batch orchestration and progress events
//! - [`classifier`] - Per-message rules → AI → default flow
//! - [`cli`] - Command-line interface
//! - [`client`] - Classification endpoint client
//! - [`config`] - Configuration management
//! - [`content_path`] - Field paths into JSON responses
//! - [`error`] - Error types and result aliases
//! - [`extractor`] - Canonical subject/sender/body extraction
//! - [`mailbox`] - Mailbox capability and local JSON store
//! - [`models`] - Core data structures
//! - [`normalizer`] - Model output to classification key
//! - [`prompt`] - Prompt rendering
//! - [`rate_limiter`] - Request pacing
//! - [`rules`] - Local rule matching
//! - [`template`] - Placeholder substitution helpers

pub mod applicator;
pub mod backoff;
pub mod batch;
pub mod classifier;
pub mod cli;
pub mod client;
pub mod config;
pub mod content_path;
pub mod error;
pub mod extractor;
pub mod mailbox;
pub mod models;
pub mod normalizer;
pub mod prompt;
pub mod rate_limiter;
pub mod rules;
pub mod template;

// Re-export commonly used types for convenience
pub use error::{ClassifierError, Result, RetryKind};

// Core data models
pub use models::{
    CategoryColor, CategoryInfo, ClassificationOutcome, ExtractedContent, FlagIcon, FlagStatus,
    Importance, MessageRecord, OutcomeSource, ProgressCallback, ProgressEvent,
};

// Config types
pub use config::{CategoryDefinition, ClassificationRule, Config, MatchType, RuleConditions};

// Engine components
pub use applicator::ClassificationApplicator;
pub use backoff::BackoffPolicy;
pub use batch::{BatchOrchestrator, BatchReport};
pub use classifier::ClassificationEngine;
pub use client::{ClassificationApi, HttpClassificationClient};
pub use extractor::ContentExtractor;
pub use mailbox::{LocalMailbox, Mailbox};
pub use normalizer::ResponseNormalizer;
pub use prompt::PromptBuilder;
pub use rate_limiter::RateLimiter;
pub use rules::RuleMatcher;

// CLI types (for binary usage)
pub use cli::{Cli, Commands, ProgressReporter};
