use thiserror::Error;

/// Type alias for Result with ClassifierError
pub type Result<T> = std::result::Result<T, ClassifierError>;

/// Error types for the classification engine
#[derive(Error, Debug)]
pub enum ClassifierError {
    /// Configuration missing or invalid - fatal before a batch starts
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Request to the classification endpoint timed out
    #[error("Request timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Network-related error (connection refused, DNS, reset, etc.)
    #[error("Network error: {0}")]
    NetworkError(String),

    /// Endpoint signalled rate limiting (HTTP 429 or a rate-limit phrase)
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Endpoint returned a non-success status
    #[error("API error (HTTP {status}): {body}")]
    ApiError { status: u16, body: String },

    /// Response was empty, unparseable, or carried no usable classification
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A classification key that is not part of the configured set
    #[error("Unknown classification: {0}")]
    UnknownClassification(String),

    /// Mailbox store failure
    #[error("Mailbox error: {0}")]
    MailboxError(String),

    /// Message not present in the mailbox
    #[error("Message not found: {0}")]
    MessageNotFound(String),

    /// IO error (file operations, etc.)
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

/// Which backoff branch a failed classification attempt falls into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryKind {
    /// Timeout or connection failure
    Timeout,
    /// HTTP 429 or a rate-limit phrase
    RateLimit,
    /// Everything else: API errors, invalid responses
    Generic,
}

impl ClassifierError {
    /// Check if the error is transient network trouble (timeouts, connection failures)
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClassifierError::Timeout { .. } | ClassifierError::NetworkError(_)
        )
    }

    /// Check if the error signals rate limiting
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, ClassifierError::RateLimited(_))
    }

    /// Map the error onto the backoff branch used by the retry loop
    pub fn retry_kind(&self) -> RetryKind {
        if self.is_rate_limit() {
            RetryKind::RateLimit
        } else if self.is_transient() {
            RetryKind::Timeout
        } else {
            RetryKind::Generic
        }
    }
}

impl From<reqwest::Error> for ClassifierError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            // reqwest does not expose the configured timeout on the error
            return ClassifierError::Timeout { timeout_secs: 0 };
        }

        if error.is_connect() || error.is_request() {
            return ClassifierError::NetworkError(format!("Connection error: {}", error));
        }

        if let Some(status) = error.status() {
            return ClassifierError::ApiError {
                status: status.as_u16(),
                body: error.to_string(),
            };
        }

        if error.is_decode() || error.is_body() {
            return ClassifierError::InvalidResponse(error.to_string());
        }

        ClassifierError::NetworkError(error.to_string())
    }
}

impl From<toml::de::Error> for ClassifierError {
    fn from(error: toml::de::Error) -> Self {
        ClassifierError::ConfigError(format!("Failed to parse config file: {}", error))
    }
}
