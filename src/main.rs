use anyhow::Result;
use clap::Parser;
use indicatif::MultiProgress;
use mail_classifier::cli::{self, Cli, Commands};
use mail_classifier::config::Config;
use mail_classifier::error::ClassifierError;
use std::io::Write;
use std::process;
use std::sync::{Arc, Mutex};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

/// A writer that prints through MultiProgress to avoid progress bar conflicts
#[derive(Clone)]
struct MultiProgressWriter {
    multi: Arc<MultiProgress>,
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl MultiProgressWriter {
    fn new(multi: Arc<MultiProgress>) -> Self {
        Self {
            multi,
            buffer: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Write for MultiProgressWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        let mut buffer = self.buffer.lock().unwrap_or_else(|e| e.into_inner());
        if !buffer.is_empty() {
            let msg = String::from_utf8_lossy(&buffer);
            let msg = msg.trim_end_matches('\n');
            if !msg.is_empty() {
                let _ = self.multi.println(msg);
            }
            buffer.clear();
        }
        Ok(())
    }
}

impl Drop for MultiProgressWriter {
    fn drop(&mut self) {
        let _ = self.flush();
    }
}

/// MakeWriter implementation for tracing
#[derive(Clone)]
struct MultiProgressMakeWriter {
    multi: Arc<MultiProgress>,
}

impl<'a> MakeWriter<'a> for MultiProgressMakeWriter {
    type Writer = MultiProgressWriter;

    fn make_writer(&'a self) -> Self::Writer {
        MultiProgressWriter::new(Arc::clone(&self.multi))
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        display_error(&e);
        eprintln!("\nFor help, run: mail-classify --help");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("mail_classifier=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    // Logs print above the progress bar
    let multi_progress = Arc::new(MultiProgress::new());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(MultiProgressMakeWriter {
            multi: Arc::clone(&multi_progress),
        })
        .with_target(false)
        .init();

    match &cli.command {
        Commands::Classify {
            folder,
            yes,
            dry_run,
        } => {
            let config = cli::load_config(&cli).await?;
            let report = cli::run_classify(
                &cli,
                &config,
                folder.clone(),
                *yes,
                *dry_run,
                (*multi_progress).clone(),
            )
            .await?;

            if let Some(report) = report {
                println!("{}", report.summary);
                if report.processed > 0 {
                    println!(
                        "\nBy rule: {}  By AI: {}  Run: {}  ({:.1}s)",
                        report.rule_matched,
                        report.ai_classified,
                        report.run_id,
                        report.duration.as_secs_f64()
                    );
                }
            }
            Ok(())
        }

        Commands::InitConfig { output, force } => {
            tracing::info!("Generating example configuration file");

            if output.exists() && !force {
                return Err(ClassifierError::ConfigError(format!(
                    "Configuration file already exists at {:?}. Use --force to overwrite.",
                    output
                ))
                .into());
            }

            Config::create_example(output).await?;

            println!("Created example configuration file at: {:?}", output);
            println!("\nPlease edit this file to customize your settings.");
            println!("Key settings to review:");
            println!("  - api.endpoint / api.model_name: the classification endpoint");
            println!("  - classification.categories: your closed set of categories");
            println!("  - rules: local rules evaluated before any AI call");
            println!("  - rate_limiting.requests_per_minute: your API budget");
            println!("\nSet the API key with MAIL_CLASSIFIER_API_KEY or api.api_key.");

            Ok(())
        }

        Commands::CheckConfig => {
            let config = cli::load_config(&cli).await?;
            config.validate()?;
            for line in cli::describe_config(&config) {
                println!("{}", line);
            }
            println!("\nConfiguration OK");
            Ok(())
        }

        Commands::TestRules {
            subject,
            sender,
            body,
        } => {
            let config = cli::load_config(&cli).await?;
            let result = cli::test_rules(&config, subject, sender, body)?;

            println!("Subject: {}", result.content.subject);
            println!("Sender:  {}", result.content.sender);
            println!("Body:    {}", result.content.body);
            match (result.rule_name, result.classification) {
                (Some(name), Some(key)) => println!("\nMatched rule '{}' -> {}", name, key),
                _ => println!("\nNo rule matched"),
            }
            if !config.rules.enabled {
                println!("(rule-based classification is disabled in the config)");
            }
            Ok(())
        }
    }
}

fn display_error(error: &anyhow::Error) {
    eprintln!("Error: {}", error);

    let mut cause = error.source();
    while let Some(e) = cause {
        eprintln!("  Caused by: {}", e);
        cause = e.source();
    }

    if let Some(err) = error.downcast_ref::<ClassifierError>() {
        match err {
            ClassifierError::ConfigError(_) => {
                eprintln!("\nHint: Check your configuration file for errors.");
                eprintln!("      Run: mail-classify check-config");
            }
            ClassifierError::MailboxError(_) => {
                eprintln!("\nHint: Point --mailbox at an existing mailbox JSON file.");
            }
            ClassifierError::Timeout { .. } | ClassifierError::NetworkError(_) => {
                eprintln!("\nHint: The classification endpoint could not be reached.");
                eprintln!("      Check api.endpoint and your network connection.");
            }
            ClassifierError::RateLimited(_) => {
                eprintln!("\nHint: The endpoint is rate limiting you.");
                eprintln!("      Lower rate_limiting.requests_per_minute in the config.");
            }
            _ => {}
        }
    }
}
