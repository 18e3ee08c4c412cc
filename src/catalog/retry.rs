//! Retry policy with exponential backoff for transient catalog failures.
//!
//! The catalog sits behind an unreliable tunnel and sheds load with 429/5xx
//! responses, so every request made by [`CatalogClient`](super::CatalogClient)
//! goes through one [`RetryPolicy`]: transient statuses retry with
//! exponential backoff plus jitter up to a bounded attempt count; everything
//! else surfaces immediately.

use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use super::CatalogError;

/// Default base delay for exponential backoff (1 second).
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap (32 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Maximum jitter added to delays (500ms).
const MAX_JITTER: Duration = Duration::from_millis(500);

/// Maximum honored Retry-After duration (1 hour).
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Status codes retried with backoff; all other error statuses surface
/// immediately.
const TRANSIENT_STATUSES: [u16; 5] = [429, 500, 502, 503, 504];

/// Decision on whether to retry a failed catalog request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay; `attempt` is the upcoming attempt
    /// number (1-indexed, so the first retry is attempt 2).
    Retry { delay: Duration, attempt: u32 },
    /// Do not retry.
    DoNotRetry { reason: String },
}

/// Bounded exponential backoff for transient failures.
///
/// Delay formula: `min(base * 2^(attempt-1), max) + jitter`, so with defaults
/// the sequence is roughly 1s, 2s, 4s.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: crate::config::DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with a custom attempt ceiling (minimum 1), defaults
    /// for delays.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Returns the configured attempt ceiling.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Determines whether the attempt that just failed should be retried.
    ///
    /// `attempt` is 1-indexed. `retry_after` is the parsed Retry-After value
    /// of a 429 response, honored in place of the computed backoff when
    /// longer.
    pub fn should_retry(
        &self,
        error: &CatalogError,
        attempt: u32,
        retry_after: Option<Duration>,
    ) -> RetryDecision {
        if !is_transient(error) {
            return RetryDecision::DoNotRetry {
                reason: "non-transient failure".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let mut delay = self.calculate_delay(attempt);
        if let Some(server_delay) = retry_after
            && server_delay > delay
        {
            debug!(delay_ms = server_delay.as_millis(), "honoring Retry-After");
            delay = server_delay;
        }

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let exponent = f64::from(attempt - 1);
        let delay_ms = base_ms * 2f64.powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        let jitter_ms = rand::thread_rng().gen_range(0..=MAX_JITTER.as_millis() as u64);

        Duration::from_millis(capped_ms as u64) + Duration::from_millis(jitter_ms)
    }
}

/// Whether a catalog error may succeed on retry.
///
/// Only the fixed transient status set (429/500/502/503/504) and request
/// timeouts retry; connect-level and protocol failures surface immediately so
/// the caller can report upstream.
#[must_use]
pub fn is_transient(error: &CatalogError) -> bool {
    match error {
        CatalogError::HttpStatus { status, .. } => TRANSIENT_STATUSES.contains(status),
        CatalogError::Timeout { .. } => true,
        CatalogError::Network { .. }
        | CatalogError::ProxyRequired { .. }
        | CatalogError::InvalidUrl { .. } => false,
    }
}

/// Parses a Retry-After header value: integer seconds or HTTP-date.
///
/// Returns `None` for unparseable or negative values. Capped at 1 hour.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let header_value = header_value.trim();

    if let Ok(seconds) = header_value.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }
        #[allow(clippy::cast_sign_loss)]
        let duration = Duration::from_secs(seconds as u64);
        return Some(duration.min(MAX_RETRY_AFTER));
    }

    if let Ok(datetime) = httpdate::parse_http_date(header_value) {
        let now = std::time::SystemTime::now();
        if let Ok(duration) = datetime.duration_since(now) {
            if duration > MAX_RETRY_AFTER {
                warn!(
                    delay_secs = duration.as_secs(),
                    "Retry-After date exceeds maximum, capping at 1 hour"
                );
                return Some(MAX_RETRY_AFTER);
            }
            return Some(duration);
        }
        // Date in the past: retry immediately.
        return Some(Duration::ZERO);
    }

    None
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_status_set() {
        for status in [429, 500, 502, 503, 504] {
            let error = CatalogError::http_status("http://x", status);
            assert!(is_transient(&error), "{status} should be transient");
        }
        for status in [400, 401, 403, 404, 410, 451] {
            let error = CatalogError::http_status("http://x", status);
            assert!(!is_transient(&error), "{status} should not be transient");
        }
    }

    #[test]
    fn test_timeout_is_transient() {
        assert!(is_transient(&CatalogError::timeout("http://x")));
    }

    #[test]
    fn test_proxy_required_is_not_transient() {
        assert!(!is_transient(&CatalogError::proxy_required("http://x.onion")));
    }

    #[test]
    fn test_should_retry_respects_max_attempts() {
        let policy = RetryPolicy::with_max_attempts(3);
        let error = CatalogError::http_status("http://x", 503);

        assert!(matches!(
            policy.should_retry(&error, 1, None),
            RetryDecision::Retry { attempt: 2, .. }
        ));
        assert!(matches!(
            policy.should_retry(&error, 2, None),
            RetryDecision::Retry { attempt: 3, .. }
        ));
        let decision = policy.should_retry(&error, 3, None);
        assert!(matches!(decision, RetryDecision::DoNotRetry { .. }));
        if let RetryDecision::DoNotRetry { reason } = decision {
            assert!(reason.contains("exhausted"));
        }
    }

    #[test]
    fn test_should_retry_rejects_permanent_status() {
        let policy = RetryPolicy::default();
        let error = CatalogError::http_status("http://x", 404);
        assert!(matches!(
            policy.should_retry(&error, 1, None),
            RetryDecision::DoNotRetry { .. }
        ));
    }

    #[test]
    fn test_delay_grows_and_respects_cap() {
        let policy = RetryPolicy::with_max_attempts(10);
        // attempt 1: ~1s, attempt 2: ~2s, attempt 3: ~4s (+ up to 500ms jitter)
        let d1 = policy.calculate_delay(1);
        let d3 = policy.calculate_delay(3);
        assert!(d1 >= Duration::from_secs(1) && d1 <= Duration::from_millis(1500));
        assert!(d3 >= Duration::from_secs(4) && d3 <= Duration::from_millis(4500));
        // Far attempts are capped at max_delay + jitter.
        let d9 = policy.calculate_delay(9);
        assert!(d9 <= DEFAULT_MAX_DELAY + MAX_JITTER);
    }

    #[test]
    fn test_retry_after_overrides_shorter_backoff() {
        let policy = RetryPolicy::with_max_attempts(5);
        let error = CatalogError::http_status("http://x", 429);
        let decision = policy.should_retry(&error, 1, Some(Duration::from_secs(30)));
        match decision {
            RetryDecision::Retry { delay, .. } => assert!(delay >= Duration::from_secs(30)),
            RetryDecision::DoNotRetry { .. } => panic!("expected retry"),
        }
    }

    #[test]
    fn test_parse_retry_after_seconds() {
        assert_eq!(parse_retry_after("120"), Some(Duration::from_secs(120)));
        assert_eq!(parse_retry_after("0"), Some(Duration::ZERO));
        assert_eq!(parse_retry_after(" 5 "), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_parse_retry_after_rejects_garbage() {
        assert_eq!(parse_retry_after("soon"), None);
        assert_eq!(parse_retry_after("-3"), None);
        assert_eq!(parse_retry_after(""), None);
    }

    #[test]
    fn test_parse_retry_after_caps_large_values() {
        assert_eq!(parse_retry_after("999999"), Some(MAX_RETRY_AFTER));
    }

    #[test]
    fn test_parse_retry_after_http_date_in_past_is_zero() {
        assert_eq!(
            parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"),
            Some(Duration::ZERO)
        );
    }
}
