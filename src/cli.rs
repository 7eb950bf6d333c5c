//! Command-line interface

use clap::{Parser, Subcommand};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::batch::{format_percentage, BatchOrchestrator, BatchReport, ProgressCallback, ProgressEvent};
use crate::client::{ClassificationApi, HttpClassificationClient};
use crate::config::Config;
use crate::error::Result;
use crate::extractor::ContentExtractor;
use crate::mailbox::{LocalMailbox, Mailbox};
use crate::models::ExtractedContent;
use crate::rules::RuleMatcher;
use crate::template::format_template;

#[derive(Parser, Debug)]
#[command(name = "mail-classify")]
#[command(version)]
#[command(about = "Classify unread email with local rules and an AI endpoint", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Path to the local mailbox file
    #[arg(short, long, default_value = "mailbox.json")]
    pub mailbox: PathBuf,

    /// API key for the classification endpoint (overrides the config file)
    #[arg(long, env = "MAIL_CLASSIFIER_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Classify all unread messages in a folder
    Classify {
        /// Folder to process (defaults to mailbox.folder from the config)
        #[arg(short, long)]
        folder: Option<String>,

        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,

        /// Classify without saving anything to the mailbox
        #[arg(long)]
        dry_run: bool,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate the configuration and print a summary
    CheckConfig,

    /// Run content extraction and rule matching on ad-hoc input
    TestRules {
        #[arg(long, default_value = "")]
        subject: String,

        #[arg(long, default_value = "")]
        sender: String,

        #[arg(long, default_value = "")]
        body: String,
    },
}

/// Progress reporter using indicatif
pub struct ProgressReporter {
    multi: MultiProgress,
    bar_style: ProgressStyle,
}

impl ProgressReporter {
    pub fn with_multi_progress(multi: MultiProgress) -> Self {
        let bar_style = ProgressStyle::default_bar()
            .template("[{elapsed:>6}] {bar:40.cyan/blue} {pos:>4}/{len:4} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-");

        Self { multi, bar_style }
    }

    pub fn multi_progress(&self) -> &MultiProgress {
        &self.multi
    }

    pub fn add_progress_bar(&self, len: u64, msg: &str) -> ProgressBar {
        let pb = self.multi.add(ProgressBar::new(len));
        pb.set_style(self.bar_style.clone());
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));
        pb
    }

    /// Bridge batch progress events onto a progress bar
    pub fn callback(pb: ProgressBar, percentage_template: String) -> ProgressCallback {
        Arc::new(move |event: ProgressEvent| match event.current {
            Some(current) => {
                pb.set_position(current.saturating_sub(1) as u64);
                pb.set_message(format!(
                    "{} ({})",
                    event.status,
                    format_percentage(&percentage_template, current, event.total)
                ));
            }
            None => pb.set_message(event.status),
        })
    }
}

/// Outcome of `test-rules`
#[derive(Debug, Clone)]
pub struct RuleTestResult {
    pub content: ExtractedContent,
    pub rule_name: Option<String>,
    pub classification: Option<String>,
}

/// Extract and rule-match a single ad-hoc message
pub fn test_rules(config: &Config, subject: &str, sender: &str, body: &str) -> Result<RuleTestResult> {
    let extractor = ContentExtractor::new(&config.content)?;
    let content = extractor.extract_parts(subject, sender, body);
    let matcher = RuleMatcher::new(&config.rules.rules);
    let hit = matcher.find_match(&content);

    Ok(RuleTestResult {
        rule_name: hit.map(|r| r.name.clone()),
        classification: hit.map(|r| r.classification.clone()),
        content,
    })
}

/// One line per notable setting, for `check-config`
pub fn describe_config(config: &Config) -> Vec<String> {
    vec![
        format!("Classification keys: {}", config.classification_keys().join(", ")),
        format!(
            "Rule-based classification: {} ({} rules)",
            enabled_label(config.rules.enabled),
            config.rules.rules.len()
        ),
        format!(
            "AI classification: {} (model {}, endpoint {})",
            enabled_label(config.ai.enabled),
            config.api.model_name,
            config.api.endpoint
        ),
        format!(
            "Rate limit: {} requests/min, {} ms minimum spacing, {:?} timeout",
            config.rate_limiting.requests_per_minute,
            config.rate_limiting.min_delay_between_requests_ms,
            config.request_timeout()
        ),
        format!(
            "Retries: {} attempts, default classification order [{}]",
            config.retry.max_attempts,
            config.retry.fallback_order.join(", ")
        ),
    ]
}

fn enabled_label(enabled: bool) -> &'static str {
    if enabled {
        "Enabled"
    } else {
        "Disabled"
    }
}

/// Load the config file and apply command-line overrides
pub async fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load(&cli.config).await?;
    if let Some(key) = cli.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
        config.api.api_key = key.clone();
    }
    Ok(config)
}

/// Run the `classify` command end to end
pub async fn run_classify(
    cli: &Cli,
    config: &Config,
    folder: Option<String>,
    yes: bool,
    dry_run: bool,
    multi: MultiProgress,
) -> Result<Option<BatchReport>> {
    let reporter = ProgressReporter::with_multi_progress(multi);
    let folder = folder.unwrap_or_else(|| config.mailbox.folder.clone());

    // Fails before any message is touched if the endpoint is misconfigured
    let api: Option<Arc<dyn ClassificationApi>> = if config.ai.enabled {
        Some(Arc::new(HttpClassificationClient::from_config(config)?))
    } else {
        None
    };

    let mailbox = Arc::new(LocalMailbox::open(&cli.mailbox).await?);
    let messages = mailbox.unread_messages(&folder).await?;

    if !messages.is_empty() && !yes {
        let prompt = format_template(
            &config.messages.confirm,
            &[
                ("{COUNT}", messages.len().to_string().as_str()),
                ("{FOLDER}", folder.as_str()),
                ("{AI_STATUS}", enabled_label(config.ai.enabled)),
                ("{RULE_STATUS}", enabled_label(config.rules.enabled)),
            ],
        );
        if !confirm_action(&prompt)? {
            info!("Classification cancelled by user");
            return Ok(None);
        }
    }

    if dry_run {
        let _ = reporter
            .multi_progress()
            .println("Running in DRY RUN mode - no changes will be saved");
    }

    let pb = reporter.add_progress_bar(messages.len() as u64, "Classifying...");
    let mut orchestrator = BatchOrchestrator::new(config, mailbox, api)?
        .with_dry_run(dry_run)
        .with_progress(ProgressReporter::callback(
            pb.clone(),
            config.progress.percentage_template.clone(),
        ));

    let report = orchestrator.run_messages(&folder, messages).await;
    pb.finish_and_clear();

    Ok(Some(report))
}

/// Prompt user for confirmation
fn confirm_action(prompt: &str) -> Result<bool> {
    print!("{} [y/N]: ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    Ok(input.trim().to_lowercase() == "y")
}
