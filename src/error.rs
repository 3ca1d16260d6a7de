//! Error types for wellsignal
//!
//! Missing history is not an error: it surfaces as `None` baselines and
//! `stable` trends. Errors here are either recoverable provider failures
//! (callers log and degrade) or invariant violations that must propagate.

use thiserror::Error;

/// Errors that can occur during analysis
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("External provider '{provider}' failed: {message}")]
    ExternalProvider {
        provider: &'static str,
        message: String,
    },

    #[error("Malformed provider response: {0}")]
    MalformedResponse(String),

    #[error("Vector dimension mismatch in {scheme} index: expected {expected}, got {actual}")]
    DimensionMismatch {
        scheme: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AnalysisError {
    /// Shorthand for a failed collaborator call
    pub fn provider(provider: &'static str, message: impl Into<String>) -> Self {
        AnalysisError::ExternalProvider {
            provider,
            message: message.into(),
        }
    }

    /// Whether the error signals a programming error rather than a data or
    /// network condition. These are never swallowed by fallback paths.
    pub fn is_invariant_violation(&self) -> bool {
        matches!(self, AnalysisError::DimensionMismatch { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dimension_mismatch_is_invariant_violation() {
        let err = AnalysisError::DimensionMismatch {
            scheme: "behavioral",
            expected: 128,
            actual: 3,
        };
        assert!(err.is_invariant_violation());
        assert_eq!(
            err.to_string(),
            "Vector dimension mismatch in behavioral index: expected 128, got 3"
        );
    }

    #[test]
    fn test_provider_error_is_recoverable() {
        let err = AnalysisError::provider("embedding", "timeout");
        assert!(!err.is_invariant_violation());
        assert_eq!(err.to_string(), "External provider 'embedding' failed: timeout");
    }
}
