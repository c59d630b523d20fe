use chrono::Duration;
use regex::Regex;

/// Parses a compact duration string such as `30m`, `1d2h` or `1w3d12h` into
/// a [`Duration`]. Returns `None` when no unit matches or anything besides
/// whitespace is left over.
pub fn parse_duration(input: &str) -> Option<Duration> {
    let re = Regex::new(r"(\d+)\s*([wdhms])").unwrap();

    let mut total_seconds = 0i64;
    let mut matched_chars = 0usize;
    let mut found = false;

    for cap in re.captures_iter(input) {
        found = true;
        let value: i64 = cap[1].parse().ok()?;
        let per_unit = match &cap[2] {
            "w" => 7 * 24 * 3600,
            "d" => 24 * 3600,
            "h" => 3600,
            "m" => 60,
            "s" => 1,
            _ => return None,
        };
        total_seconds = total_seconds.checked_add(value.checked_mul(per_unit)?)?;
        matched_chars += cap[0].chars().filter(|c| !c.is_whitespace()).count();
    }

    if !found {
        return None;
    }

    // Reject inputs like "5x2h" where some characters never matched a unit.
    let input_chars = input.chars().filter(|c| !c.is_whitespace()).count();
    if matched_chars != input_chars {
        return None;
    }

    Some(Duration::seconds(total_seconds))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_single_and_stacked_units() {
        assert_eq!(parse_duration("45s"), Some(Duration::seconds(45)));
        assert_eq!(parse_duration("10m30s"), Some(Duration::seconds(630)));
        assert_eq!(parse_duration("1h30m"), Some(Duration::seconds(5400)));
        assert_eq!(parse_duration("2d"), Some(Duration::seconds(2 * 86400)));
        assert_eq!(parse_duration("1w"), Some(Duration::seconds(7 * 86400)));
    }

    #[test]
    fn tolerates_whitespace_between_parts() {
        assert_eq!(parse_duration("1d 2h"), Some(Duration::seconds(93600)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_duration("soon"), None);
        assert_eq!(parse_duration(""), None);
        assert_eq!(parse_duration("5x"), None);
        assert_eq!(parse_duration("5x2h"), None);
    }
}
