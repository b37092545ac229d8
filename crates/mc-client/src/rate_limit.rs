//! `X-RateLimit-*` header parsing

use chrono::{DateTime, Duration, TimeZone, Utc};
use mc_common::RateLimitInfo;
use reqwest::header::{HeaderMap, RETRY_AFTER};

pub const HEADER_LIMIT: &str = "x-ratelimit-limit";
pub const HEADER_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RESET: &str = "x-ratelimit-reset";

/// Values below this are read as "seconds from now" rather than a unix timestamp
const EPOCH_THRESHOLD: i64 = 1_000_000_000;

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim)
}

fn parse_reset(raw: &str) -> Option<DateTime<Utc>> {
    let value: i64 = raw.parse().ok()?;
    if value >= EPOCH_THRESHOLD {
        Utc.timestamp_opt(value, 0).single()
    } else if value >= 0 {
        Some(Utc::now() + Duration::seconds(value))
    } else {
        None
    }
}

/// Read rate-limit headers into a `RateLimitInfo`.
///
/// Returns `None` when none of the headers are present. A header that is
/// present but unparsable becomes a `None` field, never an error.
pub fn parse_rate_limit_headers(headers: &HeaderMap) -> Option<RateLimitInfo> {
    let limit = header_str(headers, HEADER_LIMIT);
    let remaining = header_str(headers, HEADER_REMAINING);
    let reset = header_str(headers, HEADER_RESET);
    let retry_after = headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim);

    if limit.is_none() && remaining.is_none() && reset.is_none() && retry_after.is_none() {
        return None;
    }

    Some(RateLimitInfo {
        limit: limit.and_then(|v| v.parse().ok()),
        remaining: remaining.and_then(|v| v.parse().ok()),
        reset: reset.and_then(parse_reset),
        retry_after_secs: retry_after.and_then(|v| v.parse().ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    fn headers(pairs: &[(&'static str, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (k, v) in pairs {
            map.insert(*k, HeaderValue::from_static(v));
        }
        map
    }

    #[test]
    fn test_no_headers() {
        assert!(parse_rate_limit_headers(&HeaderMap::new()).is_none());
    }

    #[test]
    fn test_all_headers() {
        let info = parse_rate_limit_headers(&headers(&[
            ("x-ratelimit-limit", "10"),
            ("x-ratelimit-remaining", "7"),
            ("x-ratelimit-reset", "1700000000"),
        ]))
        .unwrap();

        assert_eq!(info.limit, Some(10));
        assert_eq!(info.remaining, Some(7));
        assert_eq!(info.reset, Utc.timestamp_opt(1_700_000_000, 0).single());
        assert_eq!(info.retry_after_secs, None);
    }

    #[test]
    fn test_garbage_values_become_none() {
        let info = parse_rate_limit_headers(&headers(&[
            ("x-ratelimit-limit", "lots"),
            ("x-ratelimit-remaining", "-1"),
            ("retry-after", "30"),
        ]))
        .unwrap();

        assert_eq!(info.limit, None);
        assert_eq!(info.remaining, None);
        assert_eq!(info.retry_after_secs, Some(30));
    }

    #[test]
    fn test_relative_reset() {
        let before = Utc::now();
        let info = parse_rate_limit_headers(&headers(&[("x-ratelimit-reset", "60")])).unwrap();
        let reset = info.reset.unwrap();
        assert!(reset >= before + Duration::seconds(59));
    }
}
