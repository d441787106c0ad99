//! Error types for the rpgforge domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error variant.

use thiserror::Error;

/// The top-level error type for all rpgforge operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Provider errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Storage errors ---
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    // --- Upload errors ---
    #[error("Upload error: {0}")]
    Upload(#[from] UploadError),

    // --- Tool errors ---
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    // --- Configuration errors ---
    #[error("Configuration error: {message}")]
    Config { message: String },

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    /// Whether the retry policy may attempt the call again.
    ///
    /// Authentication, configuration and client-side 4xx failures are final.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(_) | Self::Network(_) => true,
            Self::ApiError { status_code, .. } => *status_code >= 500 || *status_code == 408,
            Self::InvalidResponse(_) => true,
            Self::AuthenticationFailed(_) | Self::NotConfigured(_) => false,
        }
    }
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate id: {0}")]
    DuplicateId(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Storage I/O error: {0}")]
    Io(String),

    #[error("Serialization failed: {0}")]
    Serialization(String),
}

/// Failures turning uploaded bytes into a document. Never retried.
#[derive(Debug, Clone, Error)]
pub enum UploadError {
    #[error("Unsupported file type '{extension}' (expected .pdf, .md or .markdown)")]
    UnsupportedFormat { extension: String },

    #[error("Corrupt or unreadable {format} file '{filename}': {reason}")]
    Corrupt {
        filename: String,
        format: String,
        reason: String,
    },

    #[error("File '{0}' is empty")]
    Empty(String),

    #[error("File '{filename}' is too large ({size} bytes, max {max} bytes)")]
    TooLarge { filename: String, size: usize, max: usize },
}

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Invalid arguments for {tool_name}: {reason}")]
    InvalidArguments { tool_name: String, reason: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upload failed: {0}")]
    Upload(#[from] UploadError),

    #[error("Tool execution failed: {tool_name} ({source})")]
    ExecutionFailed {
        tool_name: String,
        #[source]
        source: ProviderError,
    },

    #[error("Authentication with the completion backend failed: {0}")]
    Authentication(String),

    #[error("Storage failure: {0}")]
    Store(StoreError),
}

impl From<StoreError> for ToolError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(what) => ToolError::NotFound(what),
            other => ToolError::Store(other),
        }
    }
}

impl ToolError {
    pub fn invalid(tool_name: &str, reason: impl Into<String>) -> Self {
        Self::InvalidArguments {
            tool_name: tool_name.to_string(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_error_displays_correctly() {
        let err = Error::Provider(ProviderError::ApiError {
            status_code: 429,
            message: "Too many requests".into(),
        });
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Too many requests"));
    }

    #[test]
    fn authentication_is_not_retryable() {
        assert!(!ProviderError::AuthenticationFailed("bad key".into()).is_retryable());
        assert!(!ProviderError::NotConfigured("no endpoint".into()).is_retryable());
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert!(ProviderError::Timeout("120s".into()).is_retryable());
        assert!(ProviderError::RateLimited { retry_after_secs: 5 }.is_retryable());
        assert!(ProviderError::Network("reset".into()).is_retryable());
        assert!(
            ProviderError::ApiError {
                status_code: 503,
                message: "unavailable".into()
            }
            .is_retryable()
        );
        assert!(
            !ProviderError::ApiError {
                status_code: 400,
                message: "bad request".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn store_not_found_maps_to_tool_not_found() {
        let err: ToolError = StoreError::NotFound("artifact abc".into()).into();
        assert!(matches!(err, ToolError::NotFound(_)));
        let err: ToolError = StoreError::Io("disk full".into()).into();
        assert!(matches!(err, ToolError::Store(_)));
    }

    #[test]
    fn execution_failure_carries_cause() {
        let err = ToolError::ExecutionFailed {
            tool_name: "generate_code".into(),
            source: ProviderError::Timeout("after 120s".into()),
        };
        let text = err.to_string();
        assert!(text.contains("generate_code"));
        assert!(text.contains("after 120s"));
    }
}
