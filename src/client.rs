//! HTTP client for the AI classification endpoint

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, trace, warn};

use crate::config::Config;
use crate::content_path::ContentPath;
use crate::error::{ClassifierError, Result};
use crate::template::format_template;

const API_KEY_PLACEHOLDER: &str = "{API_KEY}";
const MESSAGES_PLACEHOLDER: &str = "{MESSAGES}";

/// One classification call: prompt in, raw model text out
///
/// Implementations perform exactly one request per call; retries and pacing
/// belong to the caller.
#[async_trait]
pub trait ClassificationApi: Send + Sync {
    async fn classify(&self, prompt: &str) -> Result<String>;
}

pub struct HttpClassificationClient {
    http: reqwest::Client,
    endpoint: String,
    headers: HeaderMap,
    parameters: Map<String, Value>,
    model_name: String,
    message_role: String,
    content_path: ContentPath,
    fallback_paths: Vec<ContentPath>,
    rate_limit_markers: Vec<String>,
    timeout: Duration,
}

impl HttpClassificationClient {
    pub fn from_config(config: &Config) -> Result<Self> {
        let api = &config.api;

        if api.endpoint.trim().is_empty() {
            return Err(ClassifierError::ConfigError(
                "api.endpoint is missing".to_string(),
            ));
        }

        let needs_key = api.headers.values().any(|v| v.contains(API_KEY_PLACEHOLDER));
        if needs_key && api.api_key.trim().is_empty() {
            return Err(ClassifierError::ConfigError(
                "api.api_key is missing (set it in the config file or MAIL_CLASSIFIER_API_KEY)"
                    .to_string(),
            ));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in &api.headers {
            let value = format_template(value, &[(API_KEY_PLACEHOLDER, api.api_key.as_str())]);
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                ClassifierError::ConfigError(format!("Invalid header name '{}': {}", name, e))
            })?;
            let value = HeaderValue::from_str(&value).map_err(|_| {
                ClassifierError::ConfigError(format!("Invalid value for header '{}'", name))
            })?;
            headers.insert(name, value);
        }

        let timeout = config.request_timeout();
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifierError::ConfigError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            endpoint: api.endpoint.clone(),
            headers,
            parameters: api
                .parameters
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            model_name: api.model_name.clone(),
            message_role: api.message_role.clone(),
            content_path: ContentPath::parse(&api.response_content_path),
            fallback_paths: config
                .api_response
                .fallback_content_paths
                .iter()
                .map(|p| ContentPath::parse(p))
                .collect(),
            rate_limit_markers: config
                .api_response
                .rate_limit_markers
                .iter()
                .filter(|m| !m.trim().is_empty())
                .map(|m| m.to_lowercase())
                .collect(),
            timeout,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Render the JSON request body for `prompt`
    pub fn build_body(&self, prompt: &str) -> Value {
        let mut body = Map::new();
        for (key, value) in &self.parameters {
            let rendered = match value {
                Value::String(s) if s.trim() == MESSAGES_PLACEHOLDER => {
                    json!([{ "role": self.message_role, "content": prompt }])
                }
                Value::String(s) => Value::String(format_template(
                    s,
                    &[("{MODEL_NAME}", self.model_name.as_str()), ("{PROMPT}", prompt)],
                )),
                other => other.clone(),
            };
            body.insert(key.clone(), rendered);
        }

        // Responses are read whole; streaming is never requested
        if body.contains_key("stream") {
            body.insert("stream".to_string(), Value::Bool(false));
        }

        Value::Object(body)
    }

    /// Pull the classification text out of a parsed response
    pub fn extract_content(&self, response: &Value) -> Result<String> {
        let primary = self.content_path.extract_text(response);
        if !primary.trim().is_empty() {
            return Ok(primary.trim().to_string());
        }

        for path in &self.fallback_paths {
            let text = path.extract_text(response);
            if !text.trim().is_empty() {
                debug!("Primary content path empty, used fallback '{}'", path);
                return Ok(text.trim().to_string());
            }
        }

        Err(ClassifierError::InvalidResponse(format!(
            "No classification content at '{}' or any fallback path",
            self.content_path
        )))
    }

    fn mentions_rate_limit(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.rate_limit_markers
            .iter()
            .any(|marker| lower.contains(marker.as_str()))
    }

    fn map_transport_error(&self, error: reqwest::Error) -> ClassifierError {
        if error.is_timeout() {
            return ClassifierError::Timeout {
                timeout_secs: self.timeout.as_secs(),
            };
        }
        let message = error.to_string();
        if self.mentions_rate_limit(&message) {
            return ClassifierError::RateLimited(message);
        }
        ClassifierError::from(error)
    }
}

#[async_trait]
impl ClassificationApi for HttpClassificationClient {
    async fn classify(&self, prompt: &str) -> Result<String> {
        let body = self.build_body(prompt);
        debug!("POST {} (timeout {:?})", self.endpoint, self.timeout);
        trace!("Classification prompt: {}", prompt);

        let response = self
            .http
            .post(&self.endpoint)
            .headers(self.headers.clone())
            .json(&body)
            .send()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| self.map_transport_error(e))?;

        debug!("Classification endpoint responded with {}", status);
        trace!("Response body: {}", text);

        if status.as_u16() == 429 {
            warn!("Classification endpoint returned 429");
            return Err(ClassifierError::RateLimited(format!("HTTP 429: {}", text)));
        }

        if !status.is_success() {
            if self.mentions_rate_limit(&text) {
                warn!("Classification endpoint reported rate limiting ({})", status);
                return Err(ClassifierError::RateLimited(format!("HTTP {}: {}", status.as_u16(), text)));
            }
            return Err(ClassifierError::ApiError {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: Value = serde_json::from_str(&text)
            .map_err(|e| ClassifierError::InvalidResponse(format!("Response is not JSON: {}", e)))?;

        self.extract_content(&parsed)
    }
}
