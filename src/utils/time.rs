use chrono::{DateTime, TimeZone, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Parses provider epoch-second timestamps such as `"1699999999"`.
pub fn from_epoch_str(raw: &str) -> Option<DateTime<Utc>> {
    let secs = raw.trim().parse::<i64>().ok()?;
    Utc.timestamp_opt(secs, 0).single()
}

/// Long human date used in prompts, e.g. `March 05, 2025`.
pub fn format_long_date(dt: DateTime<Utc>) -> String {
    dt.format("%B %d, %Y").to_string()
}
