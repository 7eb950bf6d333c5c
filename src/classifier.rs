//! Per-message classification: local rules first, then the AI endpoint with retries,
//! then the default classification

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::backoff::BackoffPolicy;
use crate::client::ClassificationApi;
use crate::config::Config;
use crate::error::{ClassifierError, Result};
use crate::models::{ClassificationOutcome, ExtractedContent};
use crate::normalizer::ResponseNormalizer;
use crate::prompt::PromptBuilder;
use crate::rate_limiter::RateLimiter;
use crate::rules::RuleMatcher;

pub struct ClassificationEngine {
    rules: RuleMatcher,
    rules_enabled: bool,
    ai_enabled: bool,
    use_ai_for_unmatched: bool,
    prompts: PromptBuilder,
    normalizer: ResponseNormalizer,
    policy: BackoffPolicy,
    api: Option<Arc<dyn ClassificationApi>>,
}

impl ClassificationEngine {
    /// Build the engine; `api` may be `None` when only rules should run
    pub fn new(config: &Config, api: Option<Arc<dyn ClassificationApi>>) -> Self {
        Self {
            rules: RuleMatcher::new(&config.rules.rules),
            rules_enabled: config.rules.enabled,
            ai_enabled: config.ai.enabled,
            use_ai_for_unmatched: config.ai.use_ai_for_unmatched,
            prompts: PromptBuilder::new(config),
            normalizer: ResponseNormalizer::new(config),
            policy: BackoffPolicy::from_config(config),
            api,
        }
    }

    pub fn default_key(&self) -> &str {
        self.normalizer.default_key()
    }

    fn rules_active(&self) -> bool {
        self.rules_enabled && !self.rules.is_empty()
    }

    /// Rule lookup only, no network
    pub fn match_rules(&self, content: &ExtractedContent) -> Option<String> {
        if !self.rules_active() {
            return None;
        }
        self.rules.classify(content)
    }

    /// Classify one message
    pub async fn classify(
        &self,
        content: &ExtractedContent,
        limiter: &mut RateLimiter,
    ) -> ClassificationOutcome {
        if let Some(key) = self.match_rules(content) {
            if self.normalizer.is_valid_key(&key) {
                info!("Classified by rule: {}", key);
                return ClassificationOutcome::from_rule(key);
            }
            warn!("Rule produced unknown classification '{}', ignoring", key);
        }

        let ai_allowed = self.ai_enabled && (self.use_ai_for_unmatched || !self.rules_active());
        match (&self.api, ai_allowed) {
            (Some(api), true) => self.classify_with_retry(api.as_ref(), content, limiter).await,
            _ => {
                debug!("AI classification not used, falling back to default");
                ClassificationOutcome::fallback(self.default_key())
            }
        }
    }

    /// The AI retry loop
    ///
    /// Every attempt is paced by the limiter and recorded, successful or not. Exhausting
    /// all attempts yields `(false, default)`.
    pub async fn classify_with_retry(
        &self,
        api: &dyn ClassificationApi,
        content: &ExtractedContent,
        limiter: &mut RateLimiter,
    ) -> ClassificationOutcome {
        let prompt = self.prompts.build(content);
        let max_attempts = self.policy.max_attempts;
        let mut last_error: Option<ClassifierError> = None;

        for attempt in 1..=max_attempts {
            limiter.wait_for_slot().await;
            limiter.record_attempt();

            match self.attempt(api, &prompt).await {
                Ok(key) => {
                    limiter.record_success();
                    info!("Classified by AI: {} (attempt {})", key, attempt);
                    return ClassificationOutcome::from_ai(key);
                }
                Err(error) => {
                    let failures = limiter.record_failure();
                    warn!(
                        "Classification attempt {}/{} failed: {}",
                        attempt, max_attempts, error
                    );

                    if let Some(wait) = self.policy.plan(error.retry_kind(), attempt) {
                        if wait.pause {
                            limiter.pause_for(wait.delay, &wait.reason).await;
                        } else {
                            limiter.wait_with_progress(wait.delay, &wait.reason).await;
                        }
                    }

                    if let Some(pause) = self.policy.extended_cooldown_for(failures) {
                        let reason = format!("Extended cooldown ({} failures)", failures);
                        limiter.pause_for(pause, &reason).await;
                        limiter.reset_failures();
                    }

                    last_error = Some(error);
                }
            }
        }

        warn!(
            "All {} classification attempts failed, using default '{}'. Last error: {}",
            max_attempts,
            self.default_key(),
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "none".to_string())
        );
        ClassificationOutcome::fallback(self.default_key())
    }

    async fn attempt(&self, api: &dyn ClassificationApi, prompt: &str) -> Result<String> {
        let raw = api.classify(prompt).await?;
        if raw.trim().is_empty() {
            return Err(ClassifierError::InvalidResponse(
                "Empty classification content".to_string(),
            ));
        }
        let key = self.normalizer.normalize(&raw);
        if self.normalizer.is_valid_key(&key) {
            Ok(key)
        } else {
            Err(ClassifierError::InvalidResponse(format!(
                "Invalid classification result: '{}'",
                key
            )))
        }
    }
}
