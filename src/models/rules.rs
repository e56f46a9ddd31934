//! Domain rules an event is validated against
//!
//! The exhibition floor's constants (known sites, rating range, request types
//! and opening hours) are carried in one immutable value so that alternate
//! floors can be validated without recompiling.

use std::borrow::Cow;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use super::validation::is_decimal_digits;

/// Inclusive time-of-day window during which events are accepted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpeningHours {
    /// First accepted clock time
    pub opens: NaiveTime,
    /// Last accepted clock time
    pub closes: NaiveTime,
}

impl OpeningHours {
    /// Create a window from two clock times
    pub fn new(opens: NaiveTime, closes: NaiveTime) -> Self {
        Self { opens, closes }
    }

    /// Check whether a clock time lies inside the window, bounds included
    pub fn contains(&self, time: NaiveTime) -> bool {
        self.opens <= time && time <= self.closes
    }
}

impl Default for OpeningHours {
    fn default() -> Self {
        Self {
            opens: NaiveTime::from_hms_opt(8, 45, 0).expect("08:45 is a valid clock time"),
            closes: NaiveTime::from_hms_opt(18, 15, 0).expect("18:15 is a valid clock time"),
        }
    }
}

/// Everything the field validators need to know about the exhibition floor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_rule_ranges"))]
pub struct ValidationRules {
    /// Site identifiers that map to an exhibition
    #[validate(length(min = 1), custom(function = "validate_site_ids"))]
    pub known_sites: Vec<String>,

    /// Lowest accepted `val`
    pub rating_min: i16,

    /// Highest accepted `val`
    pub rating_max: i16,

    /// The `val` that marks an event as a request rather than a rating
    pub request_sentinel: i16,

    /// Accepted `type` values for request events
    #[validate(length(min = 1))]
    pub request_types: Vec<i16>,

    /// When the floor is open
    pub opening_hours: OpeningHours,
}

impl Default for ValidationRules {
    fn default() -> Self {
        Self {
            known_sites: ["0", "1", "2", "3", "4", "5"].iter().map(|s| s.to_string()).collect(),
            rating_min: -1,
            rating_max: 4,
            request_sentinel: -1,
            request_types: vec![0, 1],
            opening_hours: OpeningHours::default(),
        }
    }
}

impl ValidationRules {
    /// Check whether a site identifier names a known exhibition
    pub fn is_known_site(&self, site: &str) -> bool {
        self.known_sites.iter().any(|known| known == site)
    }

    /// Check whether a rating value is inside the accepted range
    pub fn rating_in_range(&self, value: i64) -> bool {
        i64::from(self.rating_min) <= value && value <= i64::from(self.rating_max)
    }

    /// Check whether a request type is one of the accepted types
    pub fn is_known_request_type(&self, request_type: i64) -> bool {
        self.request_types.iter().any(|&known| i64::from(known) == request_type)
    }
}

fn rule_error(code: &'static str, message: String) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::Owned(message));
    error
}

/// Site ids must be decimal digit strings (any Unicode `Nd` digit) that also
/// parse as a `u16` storage key. `str::parse` only reads ASCII digits, so other
/// scripts fail the second check.
fn validate_site_ids(sites: &[String]) -> Result<(), ValidationError> {
    for site in sites {
        if !is_decimal_digits(site) || site.parse::<u16>().is_err() {
            return Err(rule_error(
                "site_id",
                format!("Site ID '{}' must be a small decimal number", site),
            ));
        }
    }
    Ok(())
}

fn validate_rule_ranges(rules: &ValidationRules) -> Result<(), ValidationError> {
    if rules.rating_min > rules.rating_max {
        return Err(rule_error(
            "rating_range",
            format!(
                "Rating minimum {} exceeds maximum {}",
                rules.rating_min, rules.rating_max
            ),
        ));
    }

    if !rules.rating_in_range(i64::from(rules.request_sentinel)) {
        return Err(rule_error(
            "request_sentinel",
            format!(
                "Request sentinel {} is outside the rating range",
                rules.request_sentinel
            ),
        ));
    }

    if let Some(negative) = rules.request_types.iter().find(|&&t| t < 0) {
        return Err(rule_error(
            "request_types",
            format!("Request type {} must not be negative", negative),
        ));
    }

    if rules.opening_hours.opens > rules.opening_hours.closes {
        return Err(rule_error(
            "opening_hours",
            format!(
                "Opening time {} is after closing time {}",
                rules.opening_hours.opens, rules.opening_hours.closes
            ),
        ));
    }

    Ok(())
}
