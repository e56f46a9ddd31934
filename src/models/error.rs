//! Rejection reasons for ExhibitStream events
//!
//! Every field rule has its own reason so that a rejected event can be traced
//! back to exactly one violated rule. The `Display` text of each reason is the
//! wording log-based monitoring keys on, so it must not change.

use thiserror::Error;

/// The first rule an event violated
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RejectionReason {
    /// `at` is absent or null
    #[error("Event has no recorded time")]
    MissingTime,

    /// `at` is not an ISO-8601 timestamp
    #[error("Event time is not a valid time")]
    InvalidTime,

    /// `at` falls outside the opening window
    #[error("Event recorded outside opening hours")]
    OutsideOpeningHours,

    /// `site` is absent or null
    #[error("Event has no site ID")]
    MissingSite,

    /// `site` is not a JSON string
    #[error("Event site is not a valid string")]
    SiteNotString,

    /// `site` contains something other than decimal digits
    #[error("Event site does not have a valid ID")]
    SiteNotNumeric,

    /// `site` is numeric but not a known exhibition
    #[error("Event site ID does not currently exist")]
    UnknownSite,

    /// `val` is absent or null
    #[error("Event has no value ID")]
    MissingValue,

    /// `val` is not a JSON integer
    #[error("Event value is not a valid integer")]
    ValueNotInteger,

    /// `val` is outside the rating range
    #[error("Event value is out of bounds")]
    ValueOutOfBounds,

    /// `val` is the request sentinel but `type` is absent
    #[error("Event has no type ID")]
    MissingType,

    /// `type` is present on an event whose `val` is a real rating
    #[error("Event type cannot exist if value is not -1")]
    TypeWithoutSentinel,

    /// `type` is not a JSON integer
    #[error("Event type is not a valid integer")]
    TypeNotInteger,

    /// `type` is not one of the known request types
    #[error("Event type must be -1 or 0")]
    UnknownType,
}

impl RejectionReason {
    /// All reasons, in rule evaluation order
    pub const ALL: [RejectionReason; 14] = [
        RejectionReason::MissingTime,
        RejectionReason::InvalidTime,
        RejectionReason::OutsideOpeningHours,
        RejectionReason::MissingSite,
        RejectionReason::SiteNotString,
        RejectionReason::SiteNotNumeric,
        RejectionReason::UnknownSite,
        RejectionReason::MissingValue,
        RejectionReason::ValueNotInteger,
        RejectionReason::ValueOutOfBounds,
        RejectionReason::MissingType,
        RejectionReason::TypeWithoutSentinel,
        RejectionReason::TypeNotInteger,
        RejectionReason::UnknownType,
    ];

    /// The event key the violated rule inspects
    pub fn field(&self) -> &'static str {
        match self {
            RejectionReason::MissingTime
            | RejectionReason::InvalidTime
            | RejectionReason::OutsideOpeningHours => "at",
            RejectionReason::MissingSite
            | RejectionReason::SiteNotString
            | RejectionReason::SiteNotNumeric
            | RejectionReason::UnknownSite => "site",
            RejectionReason::MissingValue
            | RejectionReason::ValueNotInteger
            | RejectionReason::ValueOutOfBounds => "val",
            RejectionReason::MissingType
            | RejectionReason::TypeWithoutSentinel
            | RejectionReason::TypeNotInteger
            | RejectionReason::UnknownType => "type",
        }
    }

    /// Stable machine-readable code, used as a log attribute and metric label
    pub fn code(&self) -> &'static str {
        match self {
            RejectionReason::MissingTime => "missing_time",
            RejectionReason::InvalidTime => "invalid_time",
            RejectionReason::OutsideOpeningHours => "outside_opening_hours",
            RejectionReason::MissingSite => "missing_site",
            RejectionReason::SiteNotString => "site_not_string",
            RejectionReason::SiteNotNumeric => "site_not_numeric",
            RejectionReason::UnknownSite => "unknown_site",
            RejectionReason::MissingValue => "missing_value",
            RejectionReason::ValueNotInteger => "value_not_integer",
            RejectionReason::ValueOutOfBounds => "value_out_of_bounds",
            RejectionReason::MissingType => "missing_type",
            RejectionReason::TypeWithoutSentinel => "type_without_sentinel",
            RejectionReason::TypeNotInteger => "type_not_integer",
            RejectionReason::UnknownType => "unknown_type",
        }
    }
}

/// Result of a single field rule
pub type FieldResult<T> = Result<T, RejectionReason>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_reason_text_matches_monitoring_wording() {
        let expected = [
            (RejectionReason::MissingTime, "Event has no recorded time"),
            (RejectionReason::InvalidTime, "Event time is not a valid time"),
            (RejectionReason::OutsideOpeningHours, "Event recorded outside opening hours"),
            (RejectionReason::MissingSite, "Event has no site ID"),
            (RejectionReason::SiteNotString, "Event site is not a valid string"),
            (RejectionReason::SiteNotNumeric, "Event site does not have a valid ID"),
            (RejectionReason::UnknownSite, "Event site ID does not currently exist"),
            (RejectionReason::MissingValue, "Event has no value ID"),
            (RejectionReason::ValueNotInteger, "Event value is not a valid integer"),
            (RejectionReason::ValueOutOfBounds, "Event value is out of bounds"),
            (RejectionReason::MissingType, "Event has no type ID"),
            (RejectionReason::TypeWithoutSentinel, "Event type cannot exist if value is not -1"),
            (RejectionReason::TypeNotInteger, "Event type is not a valid integer"),
            (RejectionReason::UnknownType, "Event type must be -1 or 0"),
        ];

        let reasons: Vec<_> = expected.iter().map(|(reason, _)| *reason).collect();
        assert_eq!(reasons, RejectionReason::ALL.to_vec());

        for (reason, text) in expected {
            assert_eq!(reason.to_string(), text, "{:?}", reason);
        }
    }

    #[test]
    fn test_reason_fields_follow_rule_order() {
        let fields: Vec<_> = RejectionReason::ALL.iter().map(|r| r.field()).collect();
        let mut order = fields.clone();
        order.dedup();
        assert_eq!(order, vec!["at", "site", "val", "type"]);
    }

    #[test]
    fn test_reason_codes_are_unique() {
        let codes: HashSet<_> = RejectionReason::ALL.iter().map(|r| r.code()).collect();
        let texts: HashSet<_> = RejectionReason::ALL.iter().map(|r| r.to_string()).collect();
        assert_eq!(codes.len(), RejectionReason::ALL.len());
        assert_eq!(texts.len(), RejectionReason::ALL.len());
    }
}
