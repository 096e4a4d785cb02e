//! Rate-limit header parsing.
//!
//! All parsing here is best-effort by design: a provider that emits a
//! malformed `retry-after` gets the exponential-backoff fallback instead of
//! an error, and quota headers that don't parse are simply ignored.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};

use crate::config::{
    RETRY_AFTER_HEADER, X_RATELIMIT_LIMIT_HEADER, X_RATELIMIT_REMAINING_HEADER,
    X_RATELIMIT_RESET_HEADER,
};

use super::ProviderLimitState;

/// Case-insensitive header lookup (transports are not required to normalize
/// header-name casing).
fn header_value<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.trim())
}

/// The server-requested retry delay, when one was sent and parses.
///
/// `retry-after` is either an integer number of seconds or an HTTP date; a
/// date already in the past yields a zero delay rather than a negative one.
/// Unparseable values return `None` so the caller falls back to exponential
/// backoff.
pub(crate) fn retry_after_delay(headers: &HashMap<String, String>) -> Option<Duration> {
    let raw = header_value(headers, RETRY_AFTER_HEADER)?;

    if let Ok(seconds) = raw.parse::<u64>() {
        return Some(Duration::from_secs(seconds));
    }
    if let Ok(when) = DateTime::parse_from_rfc2822(raw) {
        let delta = when.with_timezone(&Utc) - Utc::now();
        return Some(delta.to_std().unwrap_or(Duration::ZERO));
    }

    log::debug!("unparseable retry-after value '{raw}', falling back to exponential backoff");
    None
}

/// Quota feedback from a successful response, when both counters are present
/// and numeric.
pub(crate) fn parse_limit_state(headers: &HashMap<String, String>) -> Option<ProviderLimitState> {
    let limit = header_value(headers, X_RATELIMIT_LIMIT_HEADER)?.parse::<u64>().ok()?;
    let remaining = header_value(headers, X_RATELIMIT_REMAINING_HEADER)?
        .parse::<u64>()
        .ok()?;
    let reset_at = header_value(headers, X_RATELIMIT_RESET_HEADER).and_then(parse_reset);
    Some(ProviderLimitState {
        limit,
        remaining,
        reset_at,
        updated_at: Utc::now(),
    })
}

/// Providers disagree on the reset format: epoch seconds, seconds-from-now,
/// or an RFC 3339 timestamp. Integers at or above 1e9 are read as epoch,
/// smaller ones as a delta. Informational only — never drives throttling.
fn parse_reset(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(value) = raw.parse::<i64>() {
        return if value >= 1_000_000_000 {
            Utc.timestamp_opt(value, 0).single()
        } else {
            Some(Utc::now() + chrono::Duration::seconds(value))
        };
    }
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|when| when.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_retry_after_integer_seconds() {
        let h = headers(&[("retry-after", "2")]);
        assert_eq!(retry_after_delay(&h), Some(Duration::from_secs(2)));
    }

    #[test]
    fn test_retry_after_is_case_insensitive() {
        let h = headers(&[("Retry-After", "5")]);
        assert_eq!(retry_after_delay(&h), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_retry_after_http_date_in_future() {
        let when = Utc::now() + chrono::Duration::seconds(30);
        let h = headers(&[("retry-after", &when.to_rfc2822())]);
        let delay = retry_after_delay(&h).expect("date should parse");
        // to_rfc2822 keeps sub-second precision out, so allow a 1s skew
        assert!(delay >= Duration::from_secs(28));
        assert!(delay <= Duration::from_secs(31));
    }

    #[test]
    fn test_retry_after_date_in_past_clamps_to_zero() {
        let when = Utc::now() - chrono::Duration::seconds(30);
        let h = headers(&[("retry-after", &when.to_rfc2822())]);
        assert_eq!(retry_after_delay(&h), Some(Duration::ZERO));
    }

    #[test]
    fn test_retry_after_garbage_yields_none() {
        let h = headers(&[("retry-after", "soon-ish")]);
        assert_eq!(retry_after_delay(&h), None);
    }

    #[test]
    fn test_retry_after_missing_yields_none() {
        assert_eq!(retry_after_delay(&headers(&[])), None);
    }

    #[test]
    fn test_limit_state_requires_both_counters() {
        let h = headers(&[("x-ratelimit-limit", "100")]);
        assert!(parse_limit_state(&h).is_none());

        let h = headers(&[
            ("x-ratelimit-limit", "100"),
            ("x-ratelimit-remaining", "5"),
        ]);
        let state = parse_limit_state(&h).expect("both counters present");
        assert_eq!(state.limit, 100);
        assert_eq!(state.remaining, 5);
        assert!(state.reset_at.is_none());
    }

    #[test]
    fn test_limit_state_non_numeric_is_ignored() {
        let h = headers(&[
            ("x-ratelimit-limit", "lots"),
            ("x-ratelimit-remaining", "5"),
        ]);
        assert!(parse_limit_state(&h).is_none());
    }

    #[test]
    fn test_reset_epoch_seconds() {
        let epoch = (Utc::now() + chrono::Duration::seconds(60)).timestamp();
        let parsed = parse_reset(&epoch.to_string()).expect("epoch should parse");
        assert_eq!(parsed.timestamp(), epoch);
    }

    #[test]
    fn test_reset_delta_seconds() {
        let parsed = parse_reset("30").expect("delta should parse");
        let delta = parsed - Utc::now();
        assert!(delta.num_seconds() >= 29 && delta.num_seconds() <= 30);
    }

    #[test]
    fn test_reset_rfc3339() {
        let when = "2026-01-01T00:00:00Z";
        let parsed = parse_reset(when).expect("rfc3339 should parse");
        assert_eq!(parsed.to_rfc3339(), "2026-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_reset_garbage_is_dropped() {
        assert!(parse_reset("whenever").is_none());
    }
}
