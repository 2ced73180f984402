//! Small helpers shared by the API layer and the CLI

use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Url;

/// Make a possibly-relative resource path absolute against the API origin.
///
/// Absolute `http(s)://` URLs are returned unchanged; empty input stays
/// empty.
pub fn to_absolute_url(url: &str, api_base: &str) -> String {
    if url.is_empty() {
        return String::new();
    }
    let lower = url.to_ascii_lowercase();
    if lower.starts_with("http://") || lower.starts_with("https://") {
        return url.to_string();
    }

    let Ok(base) = Url::parse(api_base) else {
        return url.to_string();
    };
    let origin = base.origin().ascii_serialization();
    if url.starts_with('/') {
        format!("{}{}", origin, url)
    } else {
        format!("{}/{}", origin, url)
    }
}

/// Parse the timestamp formats the backend emits
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Human-friendly age of a timestamp ("just now", "5 minutes ago", …)
pub fn format_relative(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let diff = now.signed_duration_since(then);
    let secs = diff.num_seconds();

    if secs < 60 {
        "just now".to_string()
    } else if secs < 3_600 {
        plural(diff.num_minutes(), "minute")
    } else if secs < 86_400 {
        plural(diff.num_hours(), "hour")
    } else if secs < 30 * 86_400 {
        plural(diff.num_days(), "day")
    } else {
        then.format("%Y-%m-%d").to_string()
    }
}

fn plural(n: i64, unit: &str) -> String {
    if n == 1 {
        format!("1 {} ago", unit)
    } else {
        format!("{} {}s ago", n, unit)
    }
}
