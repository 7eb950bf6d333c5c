//! Batch orchestration: classify every unread message in a folder, one at a time

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::applicator::ClassificationApplicator;
use crate::classifier::ClassificationEngine;
use crate::client::ClassificationApi;
use crate::config::{Config, MessageTemplates, ProgressConfig};
use crate::error::Result;
use crate::extractor::ContentExtractor;
use crate::mailbox::Mailbox;
use crate::models::{ClassificationOutcome, MessageRecord, OutcomeSource};
use crate::rate_limiter::RateLimiter;
use crate::template::{format_duration, format_template, truncate_chars};

pub use crate::models::{ProgressCallback, ProgressEvent};

/// Aggregate result of one batch run
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub run_id: Uuid,
    pub folder: String,
    pub started_at: DateTime<Utc>,
    pub processed: usize,
    pub successful: usize,
    pub failed: usize,
    pub rule_matched: usize,
    pub ai_classified: usize,
    #[serde(with = "duration_secs")]
    pub duration: Duration,
    /// Human-readable summary rendered from the message templates
    pub summary: String,
}

mod duration_secs {
    use serde::Serializer;
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }
}

impl BatchReport {
    fn new(folder: &str) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            folder: folder.to_string(),
            started_at: Utc::now(),
            processed: 0,
            successful: 0,
            failed: 0,
            rule_matched: 0,
            ai_classified: 0,
            duration: Duration::ZERO,
            summary: String::new(),
        }
    }
}

/// Drives extraction, classification and application across a batch
///
/// Owns the rate limiter; `run` takes `&mut self`, so one orchestrator can never
/// have two batches in flight.
pub struct BatchOrchestrator {
    mailbox: Arc<dyn Mailbox>,
    extractor: ContentExtractor,
    engine: ClassificationEngine,
    applicator: ClassificationApplicator,
    limiter: RateLimiter,
    progress: Option<ProgressCallback>,
    progress_config: ProgressConfig,
    messages: MessageTemplates,
}

impl BatchOrchestrator {
    pub fn new(
        config: &Config,
        mailbox: Arc<dyn Mailbox>,
        api: Option<Arc<dyn ClassificationApi>>,
    ) -> Result<Self> {
        Ok(Self {
            extractor: ContentExtractor::new(&config.content)?,
            engine: ClassificationEngine::new(config, api),
            applicator: ClassificationApplicator::new(config, mailbox.clone())?,
            limiter: RateLimiter::new(config),
            mailbox,
            progress: None,
            progress_config: config.progress.clone(),
            messages: config.messages.clone(),
        })
    }

    pub fn with_progress(mut self, progress: ProgressCallback) -> Self {
        self.limiter.set_progress(Some(progress.clone()));
        self.progress = Some(progress);
        self
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.applicator = self.applicator.with_dry_run(dry_run);
        self
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Classify all unread messages in `folder`
    pub async fn run(&mut self, folder: &str) -> Result<BatchReport> {
        let messages = self.mailbox.unread_messages(folder).await?;
        Ok(self.run_messages(folder, messages).await)
    }

    /// Classify the given messages in order
    pub async fn run_messages(&mut self, folder: &str, messages: Vec<MessageRecord>) -> BatchReport {
        let started = Instant::now();
        let mut report = BatchReport::new(folder);

        if messages.is_empty() {
            report.summary = format_template(&self.messages.no_unread, &[("{FOLDER}", folder)]);
            info!("{}", report.summary);
            return report;
        }

        info!(
            "Starting batch {} over {} messages in '{}'",
            report.run_id,
            messages.len(),
            folder
        );

        self.limiter.reset();
        let created = self.applicator.ensure_categories().await;
        if created > 0 {
            debug!("Created {} missing categories", created);
        }

        let total = messages.len();
        for (index, mut message) in messages.into_iter().enumerate() {
            report.processed += 1;
            self.report_status(&message, index + 1, total);

            match self.process_message(&mut message).await {
                Ok(outcome) => {
                    if outcome.success {
                        report.successful += 1;
                        self.limiter.record_success();
                    } else {
                        report.failed += 1;
                    }
                    match outcome.source {
                        OutcomeSource::Rule => report.rule_matched += 1,
                        OutcomeSource::Ai => report.ai_classified += 1,
                        OutcomeSource::Default => {}
                    }
                }
                Err(e) => {
                    report.failed += 1;
                    error!("Error processing message '{}': {}", message.subject, e);
                    let default_key = self.engine.default_key().to_string();
                    if let Err(e) = self.applicator.apply(&mut message, &default_key).await {
                        warn!(
                            "Could not apply default classification to message {}: {}",
                            message.id, e
                        );
                    }
                }
            }
        }

        report.duration = started.elapsed();
        report.summary = format_template(
            &self.messages.completion_summary,
            &[
                ("{PROCESSED}", report.processed.to_string().as_str()),
                ("{SUCCESS}", report.successful.to_string().as_str()),
                ("{FAILED}", report.failed.to_string().as_str()),
            ],
        );
        info!(
            "Batch {} finished in {:?}: {} processed, {} successful, {} failed ({} by rule, {} by AI)",
            report.run_id,
            report.duration,
            report.processed,
            report.successful,
            report.failed,
            report.rule_matched,
            report.ai_classified
        );
        report
    }

    async fn process_message(&mut self, message: &mut MessageRecord) -> Result<ClassificationOutcome> {
        self.limiter.wait_for_slot().await;

        let content = self.extractor.extract(message);
        let outcome = self.engine.classify(&content, &mut self.limiter).await;

        self.applicator
            .apply(message, &outcome.classification_key)
            .await?;
        Ok(outcome)
    }

    fn report_status(&self, message: &MessageRecord, current: usize, total: usize) {
        let Some(progress) = &self.progress else {
            return;
        };

        let preview = truncate_chars(
            &message.subject,
            self.progress_config.preview_length,
            &self.progress_config.truncation_indicator,
        );
        let mut status = format_template(
            &self.progress_config.status_template,
            &[
                ("{CURRENT}", current.to_string().as_str()),
                ("{TOTAL}", total.to_string().as_str()),
                ("{SUBJECT}", preview.as_str()),
            ],
        );

        if let Some(remaining) = self.limiter.pause_remaining() {
            status.push_str(&format_template(
                &self.progress_config.cooldown_template,
                &[("{TIME}", format_duration(remaining).as_str())],
            ));
        }

        progress(ProgressEvent::step(status, current, total));
    }
}

/// Render the progress percentage for display
pub fn format_percentage(template: &str, current: usize, total: usize) -> String {
    let percentage = if total == 0 { 0 } else { current * 100 / total };
    format_template(template, &[("{PERCENTAGE}", percentage.to_string().as_str())])
}
