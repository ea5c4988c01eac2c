use once_cell::sync::Lazy;
use regex::Regex;

static PLAIN_INTERVAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(\d+)\s*(ms|msec|us|usec|s|sec|m|min|h|hr)?\s*$")
        .expect("static interval pattern")
});

static ISO8601_INTERVAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^P(?:(\d+)Y)?(?:(\d+)M)?(?:(\d+)W)?(?:(\d+)D)?(?:T(?:(\d+)H)?(?:(\d+)M)?(?:(\d+)S)?)?$",
    )
    .expect("static ISO 8601 pattern")
});

const SECOND: u64 = 1000;
const MINUTE: u64 = 60 * SECOND;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;

/// Parse a cluster duration (`"10"`, `"10s"`, `"500ms"`, `"2min"`, `"PT1M30S"`)
/// into milliseconds. A bare number is seconds.
pub fn parse_interval_ms(raw: &str) -> Option<u64> {
    if let Some(caps) = PLAIN_INTERVAL.captures(raw) {
        let amount: u64 = caps[1].parse().ok()?;
        let unit = caps.get(2).map(|m| m.as_str().to_ascii_lowercase());
        return match unit.as_deref() {
            None | Some("s") | Some("sec") => amount.checked_mul(SECOND),
            Some("ms") | Some("msec") => Some(amount),
            Some("us") | Some("usec") => Some(amount / 1000),
            Some("m") | Some("min") => amount.checked_mul(MINUTE),
            Some("h") | Some("hr") => amount.checked_mul(HOUR),
            Some(_) => None,
        };
    }

    let caps = ISO8601_INTERVAL.captures(raw.trim())?;
    // "P" and "PT" alone carry no components and are not durations.
    if caps.iter().skip(1).all(|group| group.is_none()) {
        return None;
    }
    let scales = [365 * DAY, 30 * DAY, 7 * DAY, DAY, HOUR, MINUTE, SECOND];
    let mut total: u64 = 0;
    for (index, scale) in scales.iter().enumerate() {
        if let Some(group) = caps.get(index + 1) {
            let amount: u64 = group.as_str().parse().ok()?;
            total = total.checked_add(amount.checked_mul(*scale)?)?;
        }
    }
    Some(total)
}
