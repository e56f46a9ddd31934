//! Field rules for ExhibitStream events
//!
//! Each `validate_*` function inspects one key of a raw event and returns the
//! parsed value or the reason it was rejected. [`EventValidator`] runs them in
//! a fixed order and stops at the first rejection.

use std::sync::{Arc, OnceLock};

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime};
use regex::Regex;
use tracing::Level;

use super::error::{FieldResult, RejectionReason};
use super::event::{Field, JsonInteger, RawEvent, ValidatedEvent};
use super::rules::ValidationRules;
use crate::diagnostics::DiagnosticSink;

static DIGITS_REGEX: OnceLock<Regex> = OnceLock::new();
static COMPACT_TIME_REGEX: OnceLock<Regex> = OnceLock::new();

fn digits_regex() -> &'static Regex {
    DIGITS_REGEX.get_or_init(|| Regex::new(r"^\p{Nd}+$").expect("Invalid digits regex pattern"))
}

fn compact_time_regex() -> &'static Regex {
    COMPACT_TIME_REGEX.get_or_init(|| {
        Regex::new(
            r"^([0-9]{4})-?([0-9]{2})-?([0-9]{2})(?:[T ]([0-9]{2})(?::?([0-9]{2}))?(?::?([0-9]{2}))?([.,][0-9]+)?(Z|[+-][0-9]{2}(?::?[0-9]{2})?)?)?$",
        )
        .expect("Invalid compact time regex pattern")
    })
}

/// Check that a string is non-empty and made only of decimal digits
pub fn is_decimal_digits(value: &str) -> bool {
    digits_regex().is_match(value)
}

const OFFSET_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%dT%H:%M:%S%.f%z",
    "%Y-%m-%d %H:%M:%S%.f%z",
    "%Y-%m-%dT%H:%M%:z",
    "%Y-%m-%d %H:%M%:z",
];

const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Parse an ISO-8601 timestamp
///
/// Timestamps without an offset are read as UTC, and a bare date is read as
/// midnight. Reduced precision (`2025-03-11T17`) and the basic format
/// (`20250311T170000`) are accepted too.
pub fn parse_event_time(value: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(value) {
        return Some(parsed);
    }

    if let Some(parsed) = OFFSET_FORMATS
        .iter()
        .find_map(|format| DateTime::parse_from_str(value, format).ok())
    {
        return Some(parsed);
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(value, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        });

    match naive {
        Some(naive) => Some(naive.and_utc().fixed_offset()),
        None => parse_compact_time(value),
    }
}

/// Reduced-precision and basic-format ISO-8601, such as `2025-03-11T17` or
/// `20250311T170000+0100`
fn parse_compact_time(value: &str) -> Option<DateTime<FixedOffset>> {
    let caps = compact_time_regex().captures(value)?;
    let part = |index: usize| caps.get(index).map_or("00", |m| m.as_str());

    let fraction = caps.get(7).map_or(String::new(), |m| m.as_str().replacen(',', ".", 1));
    let canonical = format!(
        "{}-{}-{}T{}:{}:{}{}",
        part(1),
        part(2),
        part(3),
        part(4),
        part(5),
        part(6),
        fraction
    );

    match caps.get(8).map(|m| m.as_str()) {
        None => NaiveDateTime::parse_from_str(&canonical, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc().fixed_offset()),
        Some(offset) => {
            let offset = canonical_offset(offset);
            DateTime::parse_from_str(&format!("{}{}", canonical, offset), "%Y-%m-%dT%H:%M:%S%.f%:z")
                .ok()
        },
    }
}

/// `Z`, `+05`, `+0530` and `+05:30` all become `+hh:mm`
fn canonical_offset(offset: &str) -> String {
    if offset == "Z" {
        return "+00:00".to_string();
    }

    let (sign_and_hours, minutes) = offset.split_at(3);
    let minutes = minutes.trim_start_matches(':');
    let minutes = if minutes.is_empty() { "00" } else { minutes };
    format!("{}:{}", sign_and_hours, minutes)
}

/// `at` must be a timestamp recorded while the floor is open
pub fn validate_time(
    event: &RawEvent,
    rules: &ValidationRules,
) -> FieldResult<DateTime<FixedOffset>> {
    let at = match &event.at {
        Field::Missing => return Err(RejectionReason::MissingTime),
        Field::Mistyped(_) => return Err(RejectionReason::InvalidTime),
        Field::Present(at) => at,
    };

    let occurred_at = parse_event_time(at).ok_or(RejectionReason::InvalidTime)?;

    // wall clock in the event's own offset
    if !rules.opening_hours.contains(occurred_at.time()) {
        return Err(RejectionReason::OutsideOpeningHours);
    }

    Ok(occurred_at)
}

/// `site` must be a digit string naming a known exhibition
///
/// The digit check runs before the membership check, so `"-1"` is reported as
/// malformed rather than unknown.
pub fn validate_exhibition(event: &RawEvent, rules: &ValidationRules) -> FieldResult<u16> {
    let site = match &event.site {
        Field::Missing => return Err(RejectionReason::MissingSite),
        Field::Mistyped(_) => return Err(RejectionReason::SiteNotString),
        Field::Present(site) => site,
    };

    if !is_decimal_digits(site) {
        return Err(RejectionReason::SiteNotNumeric);
    }

    if !rules.is_known_site(site) {
        return Err(RejectionReason::UnknownSite);
    }

    site.parse::<u16>().map_err(|_| RejectionReason::UnknownSite)
}

/// `val` must be an integer inside the rating range
pub fn validate_rating(event: &RawEvent, rules: &ValidationRules) -> FieldResult<i16> {
    let value = match &event.val {
        Field::Missing => return Err(RejectionReason::MissingValue),
        Field::Mistyped(_) => return Err(RejectionReason::ValueNotInteger),
        Field::Present(value) => value,
    };

    value
        .as_i64()
        .filter(|&value| rules.rating_in_range(value))
        .and_then(|value| i16::try_from(value).ok())
        .ok_or(RejectionReason::ValueOutOfBounds)
}

/// `type` must be present exactly when `val` is the request sentinel
pub fn validate_request(event: &RawEvent, rules: &ValidationRules) -> FieldResult<Option<i16>> {
    let is_request = event.val.present().and_then(JsonInteger::as_i64)
        == Some(i64::from(rules.request_sentinel));

    match &event.request_type {
        Field::Missing if is_request => Err(RejectionReason::MissingType),
        Field::Missing => Ok(None),
        _ if !is_request => Err(RejectionReason::TypeWithoutSentinel),
        Field::Mistyped(_) => Err(RejectionReason::TypeNotInteger),
        Field::Present(request_type) => request_type
            .as_i64()
            .filter(|&value| rules.is_known_request_type(value))
            .and_then(|value| i16::try_from(value).ok())
            .map(Some)
            .ok_or(RejectionReason::UnknownType),
    }
}

/// Accept/reject decision for whole events
///
/// Cloning is cheap; the rules are shared.
#[derive(Debug, Clone, Default)]
pub struct EventValidator {
    rules: Arc<ValidationRules>,
}

impl EventValidator {
    /// Create a validator for the given floor
    pub fn new(rules: ValidationRules) -> Self {
        Self {
            rules: Arc::new(rules),
        }
    }

    /// The rules this validator applies
    pub fn rules(&self) -> &ValidationRules {
        &self.rules
    }

    /// Run every field rule in order, stopping at the first rejection
    pub fn check(&self, event: &RawEvent) -> FieldResult<ValidatedEvent> {
        let occurred_at = validate_time(event, &self.rules)?;
        let site = validate_exhibition(event, &self.rules)?;
        let value = validate_rating(event, &self.rules)?;
        let request_type = validate_request(event, &self.rules)?;

        Ok(ValidatedEvent::new(occurred_at, site, value, request_type))
    }

    /// Boolean form of [`check`](Self::check)
    ///
    /// An absent event is rejected without a diagnostic; any other rejection
    /// reports exactly one error diagnostic.
    pub fn validate(&self, event: Option<&RawEvent>, diagnostics: &dyn DiagnosticSink) -> bool {
        let Some(event) = event else {
            return false;
        };

        match self.check(event) {
            Ok(_) => true,
            Err(reason) => {
                diagnostics.report(Level::ERROR, event, reason);
                false
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rules::OpeningHours;
    use crate::test_utils::CollectingDiagnostics;
    use chrono::{NaiveTime, Timelike};
    use serde_json::json;

    const OPEN: &str = "2025-03-11T17:00:00.000000+00:00";

    fn event(value: serde_json::Value) -> RawEvent {
        RawEvent::decode(value.to_string().as_bytes()).unwrap()
    }

    fn rules() -> ValidationRules {
        ValidationRules::default()
    }

    #[test]
    fn test_is_decimal_digits() {
        assert!(is_decimal_digits("0"));
        assert!(is_decimal_digits("0123"));
        assert!(!is_decimal_digits(""));
        assert!(!is_decimal_digits("-1"));
        assert!(!is_decimal_digits("1.0"));
        assert!(!is_decimal_digits("abcd"));
        assert!(!is_decimal_digits(" 1"));
    }

    #[test]
    fn test_parse_event_time_formats() {
        let accepted = vec![
            "2025-03-11T17:00:00+00:00",
            "2025-03-11T17:00:00.000000+00:00",
            "2025-03-11T17:00:00Z",
            "2025-03-11 17:00:00+01:00",
            "2025-03-11T17:00:00+0100",
            "2025-03-11T17:00+00:00",
            "2025-03-11T17:00:00",
            "2025-03-11 17:00:00.5",
            "2025-03-11T17:00",
            "2025-03-11",
            "2025-03-11T17",
            "20250311T170000",
            "20250311T1700Z",
            "20250311",
            "2025-03-11T17+01",
            "20250311T170000,25-0530",
        ];
        for value in accepted {
            assert!(parse_event_time(value).is_some(), "{} should parse", value);
        }

        let rejected = vec![
            "",
            "yesterday",
            "17:00",
            "2025-13-01T10:00:00",
            "2025-03-11T25:00",
            "2025-03-11T25",
            "20250311T1",
            "20250311T170000+25",
            "2025031",
        ];
        for value in rejected {
            assert!(parse_event_time(value).is_none(), "{} should not parse", value);
        }
    }

    #[test]
    fn test_parse_event_time_keeps_offset() {
        let parsed = parse_event_time("2025-03-11T09:00:00+02:00").unwrap();
        assert_eq!(parsed.time().hour(), 9);
        assert_eq!(parsed.offset().local_minus_utc(), 2 * 3600);

        let naive = parse_event_time("2025-03-11T09:00:00").unwrap();
        assert_eq!(naive.offset().local_minus_utc(), 0);
    }

    #[test]
    fn test_parse_compact_times() {
        let expected = parse_event_time("2025-03-11T17:00:00+00:00").unwrap();
        assert_eq!(parse_event_time("2025-03-11T17"), Some(expected));
        assert_eq!(parse_event_time("20250311T170000"), Some(expected));
        assert_eq!(parse_event_time("20250311T1700Z"), Some(expected));

        let shifted = parse_event_time("20250311T183000+0130").unwrap();
        assert_eq!(shifted.offset().local_minus_utc(), 90 * 60);
        assert_eq!(shifted, expected);

        let hour_offset = parse_event_time("2025-03-11T17-05").unwrap();
        assert_eq!(hour_offset.offset().local_minus_utc(), -5 * 3600);
        assert_eq!(hour_offset.time().hour(), 17);
    }

    #[test]
    fn test_validate_time() {
        let rules = rules();
        assert!(validate_time(&event(json!({"at": OPEN})), &rules).is_ok());
        assert_eq!(
            validate_time(&event(json!({})), &rules),
            Err(RejectionReason::MissingTime)
        );
        assert_eq!(
            validate_time(&event(json!({"at": null})), &rules),
            Err(RejectionReason::MissingTime)
        );
        assert_eq!(
            validate_time(&event(json!({"at": "teatime"})), &rules),
            Err(RejectionReason::InvalidTime)
        );
        assert_eq!(
            validate_time(&event(json!({"at": 1741712400})), &rules),
            Err(RejectionReason::InvalidTime)
        );
        assert_eq!(
            validate_time(&event(json!({"at": "2025-03-11T18:15:01+00:00"})), &rules),
            Err(RejectionReason::OutsideOpeningHours)
        );
        assert_eq!(
            validate_time(&event(json!({"at": "2025-03-11T08:44:59+00:00"})), &rules),
            Err(RejectionReason::OutsideOpeningHours)
        );
    }

    #[test]
    fn test_validate_time_window_edges() {
        let rules = rules();
        assert!(validate_time(&event(json!({"at": "2025-03-11T08:45:00+00:00"})), &rules).is_ok());
        assert!(validate_time(&event(json!({"at": "2025-03-11T18:15:00+00:00"})), &rules).is_ok());
        assert_eq!(
            validate_time(&event(json!({"at": "2025-03-11T18:15:00.000001+00:00"})), &rules),
            Err(RejectionReason::OutsideOpeningHours)
        );
        // local wall clock is what counts, not UTC
        assert!(validate_time(&event(json!({"at": "2025-03-11T09:00:00+05:00"})), &rules).is_ok());
    }

    #[test]
    fn test_validate_exhibition() {
        let rules = rules();
        assert_eq!(validate_exhibition(&event(json!({"site": "0"})), &rules), Ok(0));
        assert_eq!(validate_exhibition(&event(json!({"site": "5"})), &rules), Ok(5));
        assert_eq!(
            validate_exhibition(&event(json!({})), &rules),
            Err(RejectionReason::MissingSite)
        );
        assert_eq!(
            validate_exhibition(&event(json!({"site": 3})), &rules),
            Err(RejectionReason::SiteNotString)
        );
        assert_eq!(
            validate_exhibition(&event(json!({"site": "abcd"})), &rules),
            Err(RejectionReason::SiteNotNumeric)
        );
        assert_eq!(
            validate_exhibition(&event(json!({"site": "-1"})), &rules),
            Err(RejectionReason::SiteNotNumeric)
        );
        assert_eq!(
            validate_exhibition(&event(json!({"site": "6"})), &rules),
            Err(RejectionReason::UnknownSite)
        );
        assert_eq!(
            validate_exhibition(&event(json!({"site": "01"})), &rules),
            Err(RejectionReason::UnknownSite)
        );
    }

    #[test]
    fn test_validate_rating() {
        let rules = rules();
        assert_eq!(validate_rating(&event(json!({"val": -1})), &rules), Ok(-1));
        assert_eq!(validate_rating(&event(json!({"val": 4})), &rules), Ok(4));
        assert_eq!(
            validate_rating(&event(json!({})), &rules),
            Err(RejectionReason::MissingValue)
        );
        assert_eq!(
            validate_rating(&event(json!({"val": "2"})), &rules),
            Err(RejectionReason::ValueNotInteger)
        );
        assert_eq!(
            validate_rating(&event(json!({"val": 2.5})), &rules),
            Err(RejectionReason::ValueNotInteger)
        );
        assert_eq!(
            validate_rating(&event(json!({"val": true})), &rules),
            Err(RejectionReason::ValueNotInteger)
        );
        assert_eq!(
            validate_rating(&event(json!({"val": 5})), &rules),
            Err(RejectionReason::ValueOutOfBounds)
        );
        assert_eq!(
            validate_rating(&event(json!({"val": -2})), &rules),
            Err(RejectionReason::ValueOutOfBounds)
        );
    }

    #[test]
    fn test_validate_request() {
        let rules = rules();
        assert_eq!(validate_request(&event(json!({"val": 3})), &rules), Ok(None));
        assert_eq!(
            validate_request(&event(json!({"val": -1, "type": 1})), &rules),
            Ok(Some(1))
        );
        assert_eq!(
            validate_request(&event(json!({"val": -1})), &rules),
            Err(RejectionReason::MissingType)
        );
        assert_eq!(
            validate_request(&event(json!({"val": -1, "type": null})), &rules),
            Err(RejectionReason::MissingType)
        );
        assert_eq!(
            validate_request(&event(json!({"val": 2, "type": 0})), &rules),
            Err(RejectionReason::TypeWithoutSentinel)
        );
        assert_eq!(
            validate_request(&event(json!({"val": 2, "type": "help"})), &rules),
            Err(RejectionReason::TypeWithoutSentinel)
        );
        assert_eq!(
            validate_request(&event(json!({"val": -1, "type": "0"})), &rules),
            Err(RejectionReason::TypeNotInteger)
        );
        assert_eq!(
            validate_request(&event(json!({"val": -1, "type": 2})), &rules),
            Err(RejectionReason::UnknownType)
        );
        assert_eq!(
            validate_request(&event(json!({"val": -1, "type": -1})), &rules),
            Err(RejectionReason::UnknownType)
        );
    }

    #[test]
    fn test_integers_wider_than_i64_are_out_of_range() {
        let rules = rules();
        let decoded = |payload: &[u8]| RawEvent::decode(payload).unwrap();

        assert_eq!(
            validate_rating(&decoded(br#"{"val":99999999999999999999}"#), &rules),
            Err(RejectionReason::ValueOutOfBounds)
        );
        assert_eq!(
            validate_rating(&decoded(br#"{"val":9223372036854775808}"#), &rules),
            Err(RejectionReason::ValueOutOfBounds)
        );
        assert_eq!(
            validate_rating(&decoded(br#"{"val":-99999999999999999999}"#), &rules),
            Err(RejectionReason::ValueOutOfBounds)
        );
        assert_eq!(
            validate_request(&decoded(br#"{"val":-1,"type":18446744073709551615}"#), &rules),
            Err(RejectionReason::UnknownType)
        );
        // a huge val is never the sentinel
        assert_eq!(
            validate_request(&decoded(br#"{"val":18446744073709551615,"type":0}"#), &rules),
            Err(RejectionReason::TypeWithoutSentinel)
        );
    }

    #[test]
    fn test_booleans_are_not_integers() {
        let rules = rules();
        assert_eq!(
            validate_rating(&event(json!({"val": false})), &rules),
            Err(RejectionReason::ValueNotInteger)
        );
        assert_eq!(
            validate_request(&event(json!({"val": -1, "type": false})), &rules),
            Err(RejectionReason::TypeNotInteger)
        );
        assert_eq!(
            validate_request(&event(json!({"val": -1, "type": true})), &rules),
            Err(RejectionReason::TypeNotInteger)
        );
    }

    #[test]
    fn test_check_stops_at_first_rejection() {
        let validator = EventValidator::default();
        // bad time, bad site, bad value and bad type: only the time is reported
        let raw = event(json!({"at": "never", "site": "x", "val": 9, "type": 7}));
        assert_eq!(validator.check(&raw), Err(RejectionReason::InvalidTime));

        let raw = event(json!({"at": OPEN, "site": "9", "val": 9}));
        assert_eq!(validator.check(&raw), Err(RejectionReason::UnknownSite));
    }

    #[test]
    fn test_check_accepts_rating_and_request() {
        let validator = EventValidator::default();

        let rating = validator.check(&event(json!({"at": OPEN, "site": "5", "val": 4}))).unwrap();
        assert_eq!(rating.site(), 5);
        assert_eq!(rating.value(), 4);
        assert!(!rating.is_request());

        let request = validator
            .check(&event(json!({"at": OPEN, "site": "1", "val": -1, "type": 0})))
            .unwrap();
        assert_eq!(request.request_type(), Some(0));
        assert!(request.is_request());
    }

    #[test]
    fn test_validate_reports_one_diagnostic() {
        let validator = EventValidator::default();
        let diagnostics = CollectingDiagnostics::new();

        let raw = event(json!({"at": OPEN, "site": "6", "val": 1}));
        assert!(!validator.validate(Some(&raw), &diagnostics));

        let messages = diagnostics.messages();
        assert_eq!(messages.len(), 1);
        assert!(messages[0].ends_with(" - Invalid: Event site ID does not currently exist"));
    }

    #[test]
    fn test_validate_absent_event_is_silent() {
        let validator = EventValidator::default();
        let diagnostics = CollectingDiagnostics::new();

        assert!(!validator.validate(None, &diagnostics));
        assert!(diagnostics.messages().is_empty());
    }

    #[test]
    fn test_validate_accepts_without_diagnostics() {
        let validator = EventValidator::default();
        let diagnostics = CollectingDiagnostics::new();

        let raw = event(json!({"at": OPEN, "site": "0", "val": 0}));
        assert!(validator.validate(Some(&raw), &diagnostics));
        assert!(diagnostics.messages().is_empty());
    }

    #[test]
    fn test_custom_rules() {
        let validator = EventValidator::new(ValidationRules {
            known_sites: vec!["7".to_string()],
            opening_hours: OpeningHours::new(
                NaiveTime::from_hms_opt(6, 0, 0).unwrap(),
                NaiveTime::from_hms_opt(7, 0, 0).unwrap(),
            ),
            ..Default::default()
        });

        let raw = event(json!({"at": "2025-03-11T06:30:00Z", "site": "7", "val": 2}));
        assert_eq!(validator.check(&raw).unwrap().site(), 7);

        let raw = event(json!({"at": OPEN, "site": "7", "val": 2}));
        assert_eq!(validator.check(&raw), Err(RejectionReason::OutsideOpeningHours));
    }

    #[test]
    fn test_builder_events() {
        let validator = EventValidator::default();
        let request = RawEvent::default()
            .with_at(OPEN)
            .with_site("3")
            .with_val(-1)
            .with_request_type(1);

        let validated = validator.check(&request).unwrap();
        assert!(validated.is_request());
        assert_eq!(validated.request_type(), Some(1));
        assert_eq!(validator.rules().request_sentinel, validated.value());
    }
}
