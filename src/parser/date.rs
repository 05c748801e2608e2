//! Date normalization for historical mail-client formats.
//!
//! Dates are matched against an ordered rule list after a small amount of
//! clean-up (comments, day-of-week and the zone token are removed first).
//! The first rule that consumes the whole remaining string wins, so rules
//! that are prefixes of others must come first: a two-digit-year rule never
//! accepts a four-digit year, but chrono's `%Y` happily reads `94` as the
//! year 94, hence two-digit rules are listed before four-digit ones.

use std::sync::LazyLock;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDateTime, TimeZone};
use regex::Regex;
use tracing::debug;

/// One accepted layout, applied after zone and weekday removal.
#[derive(Debug, Clone, Copy)]
pub struct DateRule {
    pub name: &'static str,
    pub format: &'static str,
    pub two_digit_year: bool,
}

const fn rule(name: &'static str, format: &'static str, two_digit_year: bool) -> DateRule {
    DateRule {
        name,
        format,
        two_digit_year,
    }
}

/// Ordered rule list; first full match wins.
pub const DATE_RULES: [DateRule; 13] = [
    rule("rfc822-short-year", "%d %b %y %H:%M:%S", true),
    rule("rfc822-short-year-no-seconds", "%d %b %y %H:%M", true),
    rule("rfc822", "%d %b %Y %H:%M:%S", false),
    rule("rfc822-no-seconds", "%d %b %Y %H:%M", false),
    rule("ctime-short-year", "%b %d %H:%M:%S %y", true),
    rule("ctime", "%b %d %H:%M:%S %Y", false),
    rule("month-first", "%b %d %Y %H:%M:%S", false),
    rule("vms-short-year", "%d-%b-%y %H:%M:%S", true),
    rule("vms", "%d-%b-%Y %H:%M:%S", false),
    rule("iso-space", "%Y-%m-%d %H:%M:%S", false),
    rule("iso-t", "%Y-%m-%dT%H:%M:%S", false),
    rule("us-numeric-short-year", "%m/%d/%y %H:%M:%S", true),
    rule("us-numeric", "%m/%d/%Y %H:%M:%S", false),
];

/// Zone abbreviations seen in the archive, with offsets in hours.
const NAMED_ZONES: [(&str, i32); 27] = [
    ("UT", 0),
    ("UTC", 0),
    ("GMT", 0),
    ("Z", 0),
    ("EST", -5),
    ("EDT", -4),
    ("CST", -6),
    ("CDT", -5),
    ("MST", -7),
    ("MDT", -6),
    ("PST", -8),
    ("PDT", -7),
    ("AKST", -9),
    ("AKDT", -8),
    ("HST", -10),
    ("BST", 1),
    ("MET", 1),
    ("MEST", 2),
    ("CET", 1),
    ("CEST", 2),
    ("EET", 2),
    ("EEST", 3),
    ("JST", 9),
    ("AEST", 10),
    ("NZST", 12),
    ("NZDT", 13),
    ("WET", 0),
];

static COMMENT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\([^)]*\)").expect("valid comment regex"));

static DAY_OF_WEEK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(mon|tue|wed|thu|fri|sat|sun)[a-z]*\.?,?\s*").expect("valid weekday regex")
});

static NUMERIC_ZONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([+-])(\d{2}):?(\d{2})$").expect("valid zone regex"));

/// Date fragment inside relay junk such as `... by toad.com (4.1/SMI-4.1) id AA...`.
static EMBEDDED_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)((?:mon|tue|wed|thu|fri|sat|sun)[a-z]*,?\s+\d{1,2}\s+[a-z]{3,}\s+\d{2,4}\s+\d{1,2}:\d{2}(?::\d{2})?(?:\s+(?:[+-]\d{4}|[a-z]{1,5}))?)",
    )
    .expect("valid embedded date regex")
});

/// Result of normalizing one `Date` header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateOutcome {
    /// Absolute timestamp with the sender's offset, or `None` on failure.
    pub parsed: Option<DateTime<FixedOffset>>,
    /// The raw value carried relay junk and a date had to be dug out of it.
    pub corrupted: bool,
}

/// Normalize a raw `Date` header value. Never fails; see [`DateOutcome`].
pub fn normalize(raw: &str) -> DateOutcome {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return DateOutcome {
            parsed: None,
            corrupted: false,
        };
    }

    let corrupted = is_corrupted(trimmed);
    let candidate = if corrupted {
        EMBEDDED_DATE_RE
            .find(trimmed)
            .map_or(trimmed, |m| m.as_str())
    } else {
        trimmed
    };

    let parsed = parse_date(candidate);
    if parsed.is_none() {
        debug!(date = trimmed, "Could not parse date");
    }
    DateOutcome { parsed, corrupted }
}

/// Parse one cleaned-up date string.
pub fn parse_date(input: &str) -> Option<DateTime<FixedOffset>> {
    let input = input.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt);
    }

    let without_comments = COMMENT_RE.replace_all(input, " ");
    let collapsed = without_comments
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    let no_dow = DAY_OF_WEEK_RE.replace(&collapsed, "");

    let (remaining, offset) = take_zone(&no_dow);
    let offset = offset.unwrap_or_else(utc);

    DATE_RULES.iter().find_map(|rule| {
        let naive = NaiveDateTime::parse_from_str(&remaining, rule.format).ok()?;
        let naive = fix_century(naive, rule.two_digit_year)?;
        offset.from_local_datetime(&naive).single()
    })
}

/// Remove the first zone token and return the rest plus its offset.
fn take_zone(s: &str) -> (String, Option<FixedOffset>) {
    let tokens: Vec<&str> = s.split_whitespace().collect();
    for (i, token) in tokens.iter().enumerate() {
        if let Some(offset) = zone_offset(token) {
            let rest: Vec<&str> = tokens
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != i)
                .map(|(_, t)| *t)
                .collect();
            return (rest.join(" "), Some(offset));
        }
    }
    (tokens.join(" "), None)
}

/// Offset for a numeric (`-0800`, `+05:30`) or named (`PST`) zone token.
fn zone_offset(token: &str) -> Option<FixedOffset> {
    if let Some(caps) = NUMERIC_ZONE_RE.captures(token) {
        let hours: i32 = caps[2].parse().ok()?;
        let minutes: i32 = caps[3].parse().ok()?;
        let secs = hours * 3600 + minutes * 60;
        let secs = if &caps[1] == "-" { -secs } else { secs };
        return FixedOffset::east_opt(secs);
    }
    let upper = token.to_ascii_uppercase();
    NAMED_ZONES
        .iter()
        .find(|(name, _)| *name == upper)
        .and_then(|(_, hours)| FixedOffset::east_opt(hours * 3600))
}

fn utc() -> FixedOffset {
    FixedOffset::east_opt(0).expect("zero offset is valid")
}

/// Map two-digit years onto 19xx (the archive spans 1992-1998).
fn fix_century(naive: NaiveDateTime, two_digit_rule: bool) -> Option<NaiveDateTime> {
    let year = naive.year();
    if two_digit_rule && year >= 2000 {
        naive.with_year(year - 100)
    } else if year < 100 {
        naive.with_year(year + 1900)
    } else {
        Some(naive)
    }
}

fn is_corrupted(s: &str) -> bool {
    s.to_ascii_lowercase().contains("sendmail") || s.contains("id AA")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iso(raw: &str) -> Option<String> {
        normalize(raw).parsed.map(|d| d.to_rfc3339())
    }

    #[test]
    fn test_every_rule_round_trips() {
        let cases = [
            ("Sat, 5 Mar 94 12:34:56 PST", "1994-03-05T12:34:56-08:00"),
            ("5 Mar 94 12:34 -0500", "1994-03-05T12:34:00-05:00"),
            ("Tue, 07 Sep 1993 12:36:54 +0100", "1993-09-07T12:36:54+01:00"),
            ("7 Sep 1993 12:36 GMT", "1993-09-07T12:36:00+00:00"),
            ("Tue Sep 7 12:36:54 PDT 93", "1993-09-07T12:36:54-07:00"),
            ("Tue Sep 07 12:36:54 1993", "1993-09-07T12:36:54+00:00"),
            ("Sep 07 1993 12:36:54 EST", "1993-09-07T12:36:54-05:00"),
            ("7-SEP-93 12:36:54", "1993-09-07T12:36:54+00:00"),
            ("7-Sep-1993 12:36:54 +0000", "1993-09-07T12:36:54+00:00"),
            ("1993-09-07 12:36:54 -0700", "1993-09-07T12:36:54-07:00"),
            ("1993-09-07T12:36:54", "1993-09-07T12:36:54+00:00"),
            ("09/07/93 12:36:54", "1993-09-07T12:36:54+00:00"),
            ("09/07/1993 12:36:54 CDT", "1993-09-07T12:36:54-05:00"),
        ];
        assert_eq!(cases.len(), DATE_RULES.len());
        for (raw, expected) in cases {
            assert_eq!(iso(raw).as_deref(), Some(expected), "input: {raw}");
        }
    }

    #[test]
    fn test_rfc3339_passthrough() {
        assert_eq!(
            iso("1996-02-29T23:59:59-03:30").as_deref(),
            Some("1996-02-29T23:59:59-03:30")
        );
    }

    #[test]
    fn test_two_digit_years_map_to_1900s() {
        assert_eq!(
            iso("Mon, 3 Jan 05 10:00:00 +0000").as_deref(),
            Some("1905-01-03T10:00:00+00:00")
        );
    }

    #[test]
    fn test_comment_and_long_weekday() {
        assert_eq!(
            iso("Thursday, 10 Feb 1994 09:15:00 -0800 (PST)").as_deref(),
            Some("1994-02-10T09:15:00-08:00")
        );
    }

    #[test]
    fn test_mismatched_weekday_is_ignored() {
        // 5 Mar 1994 was a Saturday.
        assert!(iso("Mon, 5 Mar 1994 12:00:00 -0800").is_some());
    }

    #[test]
    fn test_corrupted_date_recovered() {
        let raw = "by toad.com (4.1/SMI-4.1) id AA12345; Wed, 9 Feb 94 17:01:02 PST sendmail";
        let outcome = normalize(raw);
        assert!(outcome.corrupted);
        assert_eq!(
            outcome.parsed.map(|d| d.to_rfc3339()).as_deref(),
            Some("1994-02-09T17:01:02-08:00")
        );
    }

    #[test]
    fn test_unsupported_yields_none() {
        let outcome = normalize("sometime last tuesday");
        assert!(outcome.parsed.is_none());
        assert!(!outcome.corrupted);
        assert!(normalize("").parsed.is_none());
        assert!(normalize("32 Foo 1994 99:99:99").parsed.is_none());
    }

    #[test]
    fn test_offset_kept_in_serialization() {
        let dt = normalize("Sat, 5 Mar 94 12:34:56 GMT").parsed.unwrap();
        assert_eq!(
            serde_json::to_string(&dt).unwrap(),
            "\"1994-03-05T12:34:56+00:00\""
        );
    }
}
