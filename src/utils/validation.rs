// src/utils/validation.rs
//! Format checks that serde's type-level validation cannot express.

use chrono::DateTime;
use url::Url;

/// Whether `value` is an ISO-8601 / RFC 3339 date-time, e.g. `2024-02-26T14:13:12.174Z`.
pub fn is_iso_datetime(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok()
}

/// Whether `value` is an absolute `http` or `https` URL with a host.
pub fn is_http_url(value: &str) -> bool {
    match Url::parse(value) {
        Ok(url) => matches!(url.scheme(), "http" | "https") && url.host().is_some(),
        Err(_) => false,
    }
}
