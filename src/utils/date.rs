// src/utils/date.rs

//! Repair of the malformed timestamps found in work order attributes.
//!
//! Certificate-style attributes arrive as `Nov  5 21:08:38 2019 GMT`, which
//! the index maps as a date field but cannot parse. They are rewritten to
//! `2019-11-05T21:08:38` before the work order is indexed.

use std::collections::BTreeMap;

use chrono::{FixedOffset, NaiveDateTime};
use regex::Regex;

/// The only attribute the normalizer is applied to.
pub const EXPIRES_ON: &str = "expires_on";

/// Output shape, seconds precision and no offset.
const CANONICAL_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Malformed shapes, tried in order: one space or two spaces before the day.
const MALFORMED_PATTERNS: [&str; 2] = [
    r"^([A-Za-z]{3}) (\d{1,2}) (\d{2}:\d{2}:\d{2}) (\d{4}) ([A-Za-z][A-Za-z0-9_+:/-]*)$",
    r"^([A-Za-z]{3})  (\d{1,2}) (\d{2}:\d{2}:\d{2}) (\d{4}) ([A-Za-z][A-Za-z0-9_+:/-]*)$",
];

/// Convert a malformed timestamp to canonical form.
///
/// The zone token is resolved to an offset and the result is expressed in
/// UTC. Returns `None` when the value matches neither known shape, names an
/// unknown zone, or does not name a real calendar instant.
pub fn normalize_timestamp(value: &str) -> Option<String> {
    MALFORMED_PATTERNS
        .iter()
        .find_map(|pattern| parse_with(pattern, value))
}

fn parse_with(pattern: &str, value: &str) -> Option<String> {
    let re = Regex::new(pattern).ok()?;
    let caps = re.captures(value)?;

    // month day year time
    let reassembled = format!("{} {} {} {}", &caps[1], &caps[2], &caps[4], &caps[3]);
    let parsed = NaiveDateTime::parse_from_str(&reassembled, "%b %d %Y %H:%M:%S").ok()?;
    let offset = zone_offset(&caps[5])?;
    let utc = parsed.and_local_timezone(offset).single()?.naive_utc();

    Some(utc.format(CANONICAL_FORMAT).to_string())
}

/// Offset of a zone name, limited to the universal and US zone names.
fn zone_offset(name: &str) -> Option<FixedOffset> {
    let hours = match name.to_ascii_uppercase().as_str() {
        "UT" | "UTC" | "GMT" | "Z" => 0,
        "EST" => -5,
        "EDT" => -4,
        "CST" => -6,
        "CDT" => -5,
        "MST" => -7,
        "MDT" => -6,
        "PST" => -8,
        "PDT" => -7,
        _ => return None,
    };
    FixedOffset::east_opt(hours * 3600)
}

/// Rewrite `attributes[name]` in place if it holds a malformed timestamp.
///
/// Anything else, including a missing key, is left untouched.
pub fn normalize_field(attributes: &mut BTreeMap<String, String>, name: &str) {
    if let Some(value) = attributes.get_mut(name) {
        if let Some(fixed) = normalize_timestamp(value) {
            *value = fixed;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_timestamp_table() {
        let cases: &[(&str, Option<&str>)] = &[
            ("Nov 5 21:08:38 2019 GMT", Some("2019-11-05T21:08:38")),
            ("Nov  5 21:08:38 2019 GMT", Some("2019-11-05T21:08:38")),
            ("Jan 22 18:21:47 2020 GMT", Some("2020-01-22T18:21:47")),
            ("Jan  22 18:21:47 2020 GMT", Some("2020-01-22T18:21:47")),
            ("Nov 05 21:08:38 2019 UTC", Some("2019-11-05T21:08:38")),
            ("nov 5 21:08:38 2019 GMT", Some("2019-11-05T21:08:38")),
            // converted to UTC
            ("Nov 5 21:08:38 2019 PST", Some("2019-11-06T05:08:38")),
            ("Nov 5 21:08:38 2019 EDT", Some("2019-11-06T01:08:38")),
            ("Dec 31 23:30:00 2019 CST", Some("2020-01-01T05:30:00")),
            ("Nov 5 21:08:38 2019 utc", Some("2019-11-05T21:08:38")),
            // unknown zones leave the value untouched
            ("Nov 5 21:08:38 2019 XYZ", None),
            ("Nov 5 21:08:38 2019 Q9", None),
            ("Nov  5 21:08:38 2019 Mars/Olympus", None),
            ("2019-11-05T21:08:38", None),
            ("", None),
            ("   ", None),
            (" Nov 5 21:08:38 2019 GMT", None),
            ("Nov 5 21:08:38 2019 GMT ", None),
            ("Nov   5 21:08:38 2019 GMT", None),
            ("Nov\t5 21:08:38 2019 GMT", None),
            ("Nov 5 21:08:38 2019", None),
            ("Nov 5 21:08 2019 GMT", None),
            ("Feb 30 10:00:00 2020 GMT", None),
            ("Nov 5 25:08:38 2019 GMT", None),
            ("Foo 5 21:08:38 2019 GMT", None),
            ("never", None),
        ];

        for (input, expected) in cases {
            assert_eq!(
                normalize_timestamp(input).as_deref(),
                *expected,
                "input: {input:?}"
            );
        }
    }

    #[test]
    fn test_normalize_field_rewrites_in_place() {
        let mut attrs = BTreeMap::from([
            (EXPIRES_ON.to_string(), "Nov  5 21:08:38 2019 GMT".to_string()),
            ("issued_on".to_string(), "Nov  5 21:08:38 2018 GMT".to_string()),
        ]);

        normalize_field(&mut attrs, EXPIRES_ON);

        assert_eq!(attrs[EXPIRES_ON], "2019-11-05T21:08:38");
        assert_eq!(attrs["issued_on"], "Nov  5 21:08:38 2018 GMT");
    }

    #[test]
    fn test_normalize_field_leaves_unrecognized_and_missing() {
        let mut attrs = BTreeMap::from([(EXPIRES_ON.to_string(), "soon".to_string())]);
        normalize_field(&mut attrs, EXPIRES_ON);
        assert_eq!(attrs[EXPIRES_ON], "soon");

        let mut empty = BTreeMap::new();
        normalize_field(&mut empty, EXPIRES_ON);
        assert!(empty.is_empty());
    }

    #[test]
    fn test_canonical_output_is_stable() {
        let once = normalize_timestamp("Nov 5 21:08:38 2019 GMT").unwrap();
        assert_eq!(normalize_timestamp(&once), None);
    }
}
