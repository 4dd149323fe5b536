use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("{provider} request failed: {message}")]
    Request {
        provider: &'static str,
        message: String,
    },

    #[error("JSON parse failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timed out after {0:?}")]
    Timeout(Duration),

    #[error("rate limited")]
    RateLimited,

    #[error("provider unavailable")]
    Unavailable,

    #[error("empty response from {provider}")]
    EmptyResponse { provider: &'static str },

    #[error("embedding not supported by {provider}")]
    EmbedUnsupported { provider: &'static str },

    #[error("model loading failed: {0}")]
    ModelLoad(String),

    #[error("inference failed: {0}")]
    Inference(String),

    #[cfg(feature = "candle")]
    #[error("candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("{0}")]
    Other(String),
}

impl LlmError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Request { .. } | Self::Timeout(_) | Self::RateLimited | Self::Unavailable
        )
    }
}

pub type Result<T> = std::result::Result<T, LlmError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_failures_are_transient() {
        let err = LlmError::Request {
            provider: "ollama",
            message: "connection refused".into(),
        };
        assert!(err.is_transient());
        assert!(LlmError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(LlmError::RateLimited.is_transient());
    }

    #[test]
    fn contract_failures_are_not_transient() {
        assert!(!LlmError::EmptyResponse { provider: "ollama" }.is_transient());
        assert!(!LlmError::EmbedUnsupported { provider: "mock" }.is_transient());
        assert!(!LlmError::ModelLoad("missing weights".into()).is_transient());
    }

    #[test]
    fn display_includes_provider() {
        let err = LlmError::Request {
            provider: "ollama",
            message: "503".into(),
        };
        assert_eq!(err.to_string(), "ollama request failed: 503");
    }
}
