use std::time::Duration;

use thiserror::Error;

/// Top-level error type for cascade construction and analytics.
///
/// Record-level and account-level problems are absorbed where they happen
/// (a malformed record is dropped, an unresolvable account is omitted from
/// the graph); only the variants here reach callers.
#[derive(Debug, Error)]
pub enum Error {
    /// A raw record is missing a required field or carries an unparsable
    /// id/timestamp. Batch normalization drops the record and moves on;
    /// this only surfaces when a single record is normalized directly.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// No retweet events were found for the post. An explicit "no data"
    /// outcome, distinct from a provider failure.
    #[error("no retweet events found")]
    EmptyCascade,

    /// The provider stayed unreachable (or rate-limited) after the full
    /// retry budget. Fails the whole batch.
    #[error("provider unavailable after {attempts} attempts: {last_error}")]
    SourceUnavailable { attempts: u32, last_error: String },

    /// A direct provider call failed (benchmark and ranking lookups, which
    /// have no per-account degradation to fall back on).
    #[error(transparent)]
    Provider(#[from] ProviderError),
}

/// Classified failure from a social-media provider call.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("account not found")]
    NotFound,

    #[error("account suspended, private, or unauthorized")]
    Forbidden,

    /// Recoverable: the caller should suspend requests until the limit
    /// window resets, then retry.
    #[error("rate limited, window resets in {reset_after:?}")]
    RateLimited { reset_after: Duration },

    /// Recoverable: server-side or network hiccup worth retrying.
    #[error("transient provider failure: {0}")]
    Transient(String),

    #[error("provider error: {0}")]
    Other(String),
}

impl ProviderError {
    /// Whether a retry can possibly succeed.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimited { .. } | ProviderError::Transient(_)
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        // Connection failures and timeouts are worth retrying; anything
        // that made it to a status code is classified at the call site.
        ProviderError::Transient(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limited_is_recoverable() {
        let err = ProviderError::RateLimited {
            reset_after: Duration::from_secs(60),
        };
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_transient_is_recoverable() {
        assert!(ProviderError::Transient("HTTP 503".to_string()).is_recoverable());
    }

    #[test]
    fn test_terminal_errors_are_not_recoverable() {
        assert!(!ProviderError::NotFound.is_recoverable());
        assert!(!ProviderError::Forbidden.is_recoverable());
        assert!(!ProviderError::Other("HTTP 418".to_string()).is_recoverable());
    }
}
